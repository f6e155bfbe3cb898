use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::models::{Event, SearchResponse, Topic};
use crate::search::{EventSearchState, SearchView};
use crate::topics::{Phase, TopicListState};

pub const PROMPT_TITLE: &str = "Find events";
pub const PROMPT_HINT: &str = "Enter a keyword to search upcoming events";
pub const NO_RESULTS_MESSAGE: &str = "No events found. Try a different keyword.";
pub const SEARCHING_MESSAGE: &str = "Searching...";
pub const LOADING_MESSAGE: &str = "Loading...";
pub const NO_TOPICS_TITLE: &str = "No topics yet";
pub const NO_TOPICS_HINT: &str = "Create your first topic to start receiving event updates";

const KEYWORD_COLUMN: usize = 24;

pub fn summary_line(results: &SearchResponse) -> String {
    format!(
        "Found {} events for \"{}\"",
        results.count, results.keyword
    )
}

/// One event as a block of lines, the title wrapped to `width`.
pub fn event_card(event: &Event, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = textwrap::wrap(&event.title, width.max(10))
        .into_iter()
        .map(|line| line.into_owned())
        .collect();
    lines.push(format!("  When:  {}", event.datetime));
    lines.push(format!("  Where: {}", event.location));
    lines.push(format!("  {}", event.url));
    lines
}

pub fn search_text(state: &EventSearchState, width: usize) -> String {
    let mut out = Vec::new();
    if let Some(error) = state.error() {
        out.push(format!("Error: {}", error));
    }

    match state.view() {
        SearchView::Prompt => {
            // a validation error replaces the prompt
            if state.error().is_none() {
                out.push(PROMPT_TITLE.to_string());
                out.push(PROMPT_HINT.to_string());
            }
        }
        SearchView::Searching => out.push(SEARCHING_MESSAGE.to_string()),
        SearchView::NoResults(results) => {
            out.push(summary_line(results));
            out.push(String::new());
            out.push(NO_RESULTS_MESSAGE.to_string());
        }
        SearchView::Results(results) => {
            out.push(summary_line(results));
            for event in &results.events {
                out.push(String::new());
                out.extend(event_card(event, width));
            }
        }
    }

    out.join("\n")
}

pub fn active_label(is_active: bool) -> &'static str {
    if is_active {
        "on"
    } else {
        "off"
    }
}

pub fn topic_row(topic: &Topic) -> String {
    format!(
        "#{:<4} {} {:<7} {:<3}  created {}",
        topic.id,
        pad_to_width(&topic.keyword, KEYWORD_COLUMN),
        topic.notification_frequency.label(),
        active_label(topic.is_active),
        topic.created_at.format("%Y-%m-%d")
    )
}

pub fn topics_text(state: &TopicListState) -> String {
    let mut out = Vec::new();
    match state.phase() {
        Phase::Idle | Phase::Loading => out.push(LOADING_MESSAGE.to_string()),
        Phase::Error(message) => out.push(format!("Error: {}", message)),
        Phase::Loaded if state.topics().is_empty() => {
            out.push(NO_TOPICS_TITLE.to_string());
            out.push(NO_TOPICS_HINT.to_string());
        }
        Phase::Loaded => out.extend(state.topics().iter().map(topic_row)),
    }
    if let Some(notice) = state.notice() {
        out.push(format!("Error: {}", notice));
    }
    out.join("\n")
}

/// Cuts `s` to at most `width` terminal columns, marking the cut with `…`.
pub fn truncate_to_width(s: &str, width: usize) -> String {
    if s.width() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

pub fn pad_to_width(s: &str, width: usize) -> String {
    let cut = truncate_to_width(s, width);
    let pad = width.saturating_sub(cut.width());
    format!("{}{}", cut, " ".repeat(pad))
}
