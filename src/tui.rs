use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::api::HttpApi;
use crate::models::{NotificationFrequency, Topic};
use crate::render;
use crate::search::{self, EventSearchState, SearchMsg, SearchRequest, SearchView};
use crate::topics::{self, Effect, Msg, Phase, TopicListState};

const TICK: Duration = Duration::from_millis(100);
/// Cards skipped by PageUp/PageDown.
const EVENT_PAGE: usize = 4;
/// Lines per event card in the results body, leading blank line included.
const CARD_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Search,
    Topics,
}

/// A request the front end wants issued.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Topics(Effect),
    Search(SearchRequest),
    /// Open an event page in the system browser.
    Open(String),
}

/// A completed request, fed back into the owning state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum AppMsg {
    Topics(Msg),
    Search(SearchMsg),
}

pub struct App {
    tab: Tab,
    topics: TopicListState,
    search: EventSearchState,
    selected: usize,
    selected_event: usize,
    quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            tab: Tab::Search,
            topics: TopicListState::new(),
            search: EventSearchState::new(),
            selected: 0,
            selected_event: 0,
            quit: false,
        }
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn topics(&self) -> &TopicListState {
        &self.topics
    }

    pub fn search(&self) -> &EventSearchState {
        &self.search
    }

    pub fn selected_event(&self) -> usize {
        self.selected_event
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Loads the topic list once at startup.
    pub fn mount(&mut self) -> Option<Command> {
        self.topic_msg(Msg::Refresh)
    }

    pub fn apply(&mut self, msg: AppMsg) -> Option<Command> {
        match msg {
            AppMsg::Topics(msg) => self.topic_msg(msg),
            AppMsg::Search(msg) => self.search_msg(msg),
        }
    }

    fn topic_msg(&mut self, msg: Msg) -> Option<Command> {
        let (state, effect) = std::mem::take(&mut self.topics).transition(msg);
        self.topics = state;
        let len = self.topics.topics().len();
        self.selected = self.selected.min(len.saturating_sub(1));
        effect.map(Command::Topics)
    }

    fn search_msg(&mut self, msg: SearchMsg) -> Option<Command> {
        let new_request = matches!(msg, SearchMsg::Submit);
        let (state, request) = std::mem::take(&mut self.search).transition(msg);
        self.search = state;
        if new_request && request.is_some() {
            self.selected_event = 0;
        }
        let len = self.search.results().map_or(0, |r| r.events.len());
        self.selected_event = self.selected_event.min(len.saturating_sub(1));
        request.map(Command::Search)
    }

    fn selected_topic(&self) -> Option<Topic> {
        self.topics
            .visible_topics()
            .and_then(|topics| topics.get(self.selected))
            .cloned()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return None;
        }

        if self.topics.pending_delete().is_some() {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    self.topic_msg(Msg::ConfirmDelete)
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.topic_msg(Msg::CancelDelete)
                }
                _ => None,
            };
        }

        if self.topics.dialog().open {
            return self.handle_dialog_key(key);
        }

        if matches!(key.code, KeyCode::Tab | KeyCode::BackTab) {
            self.tab = match self.tab {
                Tab::Search => Tab::Topics,
                Tab::Topics => Tab::Search,
            };
            return None;
        }

        match self.tab {
            Tab::Search => self.handle_search_key(key),
            Tab::Topics => self.handle_topics_key(key),
        }
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) -> Option<Command> {
        let dialog = self.topics.dialog();
        match key.code {
            KeyCode::Esc => self.topic_msg(Msg::CancelCreate),
            KeyCode::Enter => self.topic_msg(Msg::SubmitCreate),
            KeyCode::Tab | KeyCode::Right => {
                let next = dialog.frequency.next();
                self.topic_msg(Msg::SelectFrequency(next))
            }
            KeyCode::BackTab | KeyCode::Left => {
                let prev = dialog.frequency.prev();
                self.topic_msg(Msg::SelectFrequency(prev))
            }
            KeyCode::Backspace => {
                let mut keyword = dialog.keyword.clone();
                keyword.pop();
                self.topic_msg(Msg::EditKeyword(keyword))
            }
            KeyCode::Char(c) => {
                let mut keyword = dialog.keyword.clone();
                keyword.push(c);
                self.topic_msg(Msg::EditKeyword(keyword))
            }
            _ => None,
        }
    }

    fn move_event(&mut self, delta: isize) {
        let len = self.search.results().map_or(0, |r| r.events.len());
        let target = self.selected_event as isize + delta;
        self.selected_event = target.clamp(0, len.saturating_sub(1) as isize) as usize;
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('o') {
            let url = self
                .search
                .results()?
                .events
                .get(self.selected_event)?
                .url
                .clone();
            return Some(Command::Open(url));
        }

        match key.code {
            KeyCode::Down => {
                self.move_event(1);
                None
            }
            KeyCode::Up => {
                self.move_event(-1);
                None
            }
            KeyCode::PageDown => {
                self.move_event(EVENT_PAGE as isize);
                None
            }
            KeyCode::PageUp => {
                self.move_event(-(EVENT_PAGE as isize));
                None
            }
            KeyCode::Esc => {
                self.quit = true;
                None
            }
            KeyCode::Enter => self.search_msg(SearchMsg::Submit),
            KeyCode::Backspace => {
                let mut keyword = self.search.keyword().to_string();
                keyword.pop();
                self.search_msg(SearchMsg::EditKeyword(keyword))
            }
            KeyCode::Char(c) => {
                let mut keyword = self.search.keyword().to_string();
                keyword.push(c);
                self.search_msg(SearchMsg::EditKeyword(keyword))
            }
            _ => None,
        }
    }

    fn handle_topics_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Esc if self.topics.notice().is_some() => self.topic_msg(Msg::DismissNotice),
            KeyCode::Char('q') | KeyCode::Esc => {
                self.quit = true;
                None
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let len = self.topics.topics().len();
                if self.selected + 1 < len {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Char('n') => self.topic_msg(Msg::OpenCreate),
            KeyCode::Char('r') => {
                if matches!(self.topics.phase(), Phase::Error(_)) {
                    self.topic_msg(Msg::Retry)
                } else {
                    self.topic_msg(Msg::Refresh)
                }
            }
            KeyCode::Char(' ') => {
                let topic = self.selected_topic()?;
                self.topic_msg(Msg::ToggleActive(topic))
            }
            KeyCode::Char('f') => {
                let topic = self.selected_topic()?;
                let next = topic.notification_frequency.next();
                self.topic_msg(Msg::SetFrequency(topic, next))
            }
            KeyCode::Char('d') => {
                let topic = self.selected_topic()?;
                self.topic_msg(Msg::RequestDelete(topic))
            }
            _ => None,
        }
    }
}

/// Issues commands on the runtime and posts their completions back.
struct Dispatcher {
    api: Arc<HttpApi>,
    runtime: Handle,
    tx: UnboundedSender<AppMsg>,
}

impl Dispatcher {
    fn spawn(&self, command: Command) {
        debug!(?command, "dispatch");
        let command = match command {
            Command::Open(url) => {
                if let Err(err) = open_in_browser(&url) {
                    warn!(%url, error = %err, "failed to open browser");
                }
                return;
            }
            command => command,
        };
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let msg = match command {
                Command::Topics(effect) => AppMsg::Topics(topics::run_effect(&*api, effect).await),
                Command::Search(request) => {
                    AppMsg::Search(search::run_search(&*api, request).await)
                }
                Command::Open(_) => return,
            };
            // receiver is gone once the UI has exited
            let _ = tx.send(msg);
        });
    }
}

fn open_in_browser(url: &str) -> io::Result<()> {
    let open_cmd = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };

    std::process::Command::new(open_cmd)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Runs the interactive front end until the user quits. Blocks the calling
/// thread; requests run on `runtime`.
pub fn run(api: Arc<HttpApi>, runtime: Handle) -> Result<()> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher { api, runtime, tx };
    let mut app = App::new();
    if let Some(command) = app.mount() {
        dispatcher.spawn(command);
    }

    let res = run_app(&mut terminal, &mut app, &dispatcher, &mut rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    dispatcher: &Dispatcher,
    rx: &mut UnboundedReceiver<AppMsg>,
) -> Result<()> {
    loop {
        while let Ok(msg) = rx.try_recv() {
            if let Some(command) = app.apply(msg) {
                dispatcher.spawn(command);
            }
        }

        terminal.draw(|f| ui(f, app))?;
        if app.should_quit() {
            return Ok(());
        }

        if event::poll(TICK)? {
            if let TermEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(command) = app.handle_key(key) {
                        dispatcher.spawn(command);
                    }
                }
            }
        }
    }
}

pub fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(5),    // Body
            Constraint::Length(3), // Footer
        ])
        .split(f.size());

    render_tabs(f, chunks[0], app);
    match app.tab {
        Tab::Search => render_search(f, chunks[1], app),
        Tab::Topics => render_topics(f, chunks[1], app),
    }
    render_footer(f, chunks[2], app);

    if app.tab == Tab::Topics {
        if app.topics.dialog().open {
            render_create_dialog(f, app);
        } else if let Some(topic) = app.topics.pending_delete() {
            render_delete_confirm(f, topic);
        }
    }
}

fn render_tabs(f: &mut Frame, area: Rect, app: &App) {
    let selected = match app.tab {
        Tab::Search => 0,
        Tab::Topics => 1,
    };
    let tabs = Tabs::new(vec!["Event Search", "Topics"])
        .select(selected)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue))
                .title(" EventWatch ")
                .title_alignment(Alignment::Center),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn render_search(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let input_title = if app.search.is_loading() {
        " Searching... "
    } else {
        " Keyword "
    };
    let input = Paragraph::new(app.search.keyword().to_string()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray))
            .title(input_title),
    );
    f.render_widget(input, chunks[0]);

    let mut lines = Vec::new();
    if let Some(error) = app.search.error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }

    let width = chunks[1].width.saturating_sub(2) as usize;
    let mut scroll = 0;
    match app.search.view() {
        SearchView::Prompt => {
            if app.search.error().is_none() {
                lines.push(Line::from(Span::styled(
                    render::PROMPT_TITLE,
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(render::PROMPT_HINT));
            }
        }
        SearchView::Searching => lines.push(Line::from(render::SEARCHING_MESSAGE)),
        SearchView::NoResults(results) => {
            lines.push(summary(results));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                render::NO_RESULTS_MESSAGE,
                Style::default().fg(Color::DarkGray),
            )));
        }
        SearchView::Results(results) => {
            lines.push(summary(results));
            // the first card keeps the summary in view, later ones scroll to their top
            if app.selected_event > 0 {
                scroll = lines.len() + app.selected_event * CARD_LINES;
            }
            for (i, event) in results.events.iter().enumerate() {
                let mut title_style = Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
                if i == app.selected_event {
                    title_style = title_style.add_modifier(Modifier::REVERSED);
                }
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    render::truncate_to_width(&event.title, width),
                    title_style,
                )));
                lines.push(Line::from(vec![
                    Span::styled("  When:  ", Style::default().fg(Color::Blue)),
                    Span::raw(event.datetime.clone()),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("  Where: ", Style::default().fg(Color::Green)),
                    Span::raw(event.location.clone()),
                ]));
                lines.push(Line::from(Span::styled(
                    format!("  {}", event.url),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
    }

    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM))
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(scroll).unwrap_or(u16::MAX), 0));
    f.render_widget(body, chunks[1]);
}

fn summary(results: &crate::models::SearchResponse) -> Line<'static> {
    Line::from(Span::styled(
        render::summary_line(results),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn frequency_color(frequency: NotificationFrequency) -> Color {
    match frequency {
        NotificationFrequency::Daily => Color::Red,
        NotificationFrequency::Weekly => Color::Blue,
        NotificationFrequency::Custom => Color::Magenta,
    }
}

fn render_topics(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray))
        .title(" Topics ");

    let message = |lines: Vec<Line<'static>>| {
        Paragraph::new(lines)
            .block(block.clone())
            .alignment(Alignment::Center)
    };

    match app.topics.phase() {
        Phase::Idle | Phase::Loading => {
            f.render_widget(message(vec![Line::from(render::LOADING_MESSAGE)]), area);
        }
        Phase::Error(error) => {
            let lines = vec![
                Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
                Line::from(""),
                Line::from("Press r to retry"),
            ];
            f.render_widget(message(lines), area);
        }
        Phase::Loaded if app.topics.topics().is_empty() => {
            let lines = vec![
                Line::from(Span::styled(
                    render::NO_TOPICS_TITLE,
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(render::NO_TOPICS_HINT),
            ];
            f.render_widget(message(lines), area);
        }
        Phase::Loaded => {
            let items: Vec<ListItem> = app
                .topics
                .topics()
                .iter()
                .map(|topic| {
                    let (state, color) = if topic.is_active {
                        ("● on ", Color::Green)
                    } else {
                        ("○ off", Color::DarkGray)
                    };
                    ListItem::new(Line::from(vec![
                        Span::raw(render::pad_to_width(&topic.keyword, 28)),
                        Span::styled(
                            format!(" {:<7}", topic.notification_frequency.label()),
                            Style::default().fg(frequency_color(topic.notification_frequency)),
                        ),
                        Span::styled(format!(" {} ", state), Style::default().fg(color)),
                        Span::styled(
                            format!(" created {}", topic.created_at.format("%Y-%m-%d")),
                            Style::default().fg(Color::DarkGray),
                        ),
                    ]))
                })
                .collect();

            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
                .highlight_symbol("> ");
            let mut state = ListState::default().with_selected(Some(app.selected));
            f.render_stateful_widget(list, area, &mut state);
        }
    }
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let key = |k: &'static str| {
        Span::styled(k, Style::default().bg(Color::DarkGray).fg(Color::White))
    };

    let line = if let Some(notice) = app.topics.notice().filter(|_| app.tab == Tab::Topics) {
        Line::from(vec![
            Span::styled(notice.to_string(), Style::default().fg(Color::Red)),
            Span::raw("  "),
            key(" Esc "),
            Span::raw(" Dismiss"),
        ])
    } else {
        match app.tab {
            Tab::Search => Line::from(vec![
                key(" Enter "),
                Span::raw(" Search  "),
                key(" ↑/↓ "),
                Span::raw(" Select  "),
                key(" Ctrl-O "),
                Span::raw(" Open  "),
                key(" Tab "),
                Span::raw(" Topics  "),
                key(" Esc "),
                Span::raw(" Quit  "),
            ]),
            Tab::Topics => Line::from(vec![
                key(" n "),
                Span::raw(" New  "),
                key(" space "),
                Span::raw(" Notify on/off  "),
                key(" f "),
                Span::raw(" Frequency  "),
                key(" d "),
                Span::raw(" Delete  "),
                key(" r "),
                Span::raw(" Reload  "),
                key(" q "),
                Span::raw(" Quit  "),
            ]),
        }
    };

    let footer = Paragraph::new(line)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        )
        .alignment(Alignment::Center);

    f.render_widget(footer, area);
}

fn render_create_dialog(f: &mut Frame, app: &App) {
    let dialog = app.topics.dialog();
    let area = centered_rect(60, 11, f.size());

    let mut frequencies = Vec::new();
    for frequency in NotificationFrequency::ALL {
        let style = if frequency == dialog.frequency {
            Style::default()
                .fg(frequency_color(frequency))
                .add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(Color::Gray)
        };
        frequencies.push(Span::styled(format!(" {} ", frequency.label()), style));
        frequencies.push(Span::raw(" "));
    }

    let mut lines = vec![
        Line::from("Enter a keyword you are interested in"),
        Line::from(""),
        Line::from(vec![
            Span::raw("Keyword:   "),
            Span::styled(
                format!("{}_", dialog.keyword),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Line::from([vec![Span::raw("Frequency: ")], frequencies].concat()),
        Line::from(""),
    ];
    if let Some(error) = &dialog.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(if dialog.creating {
        "Creating..."
    } else {
        "Enter create · Tab frequency · Esc cancel"
    }));

    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" New topic "),
    );

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn render_delete_confirm(f: &mut Frame, topic: &Topic) {
    let area = centered_rect(50, 5, f.size());
    let popup = Paragraph::new(vec![
        Line::from(format!("Delete topic \"{}\"?", topic.keyword)),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::Red).fg(Color::White)),
            Span::raw(" Delete  "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" Cancel"),
        ]),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Confirm "),
    );

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
