//! Local view of the remote topic collection.
//!
//! `TopicListState` is a pure state machine: every user action and every
//! request completion is a [`Msg`], and [`TopicListState::transition`] returns
//! the next state plus at most one [`Effect`] (a request to issue). The list
//! is only ever replaced wholesale by a fetch response; writes never patch it
//! locally, each successful write is followed by a refetch instead.
//!
//! [`TopicListController`] drives the machine against a [`TopicApi`], running
//! each effect to completion before feeding the result back in.

use tracing::{info, warn};

use crate::api::TopicApi;
use crate::error::{ApiError, Operation};
use crate::models::{NewTopic, NotificationFrequency, Topic, TopicPatch, MAX_KEYWORD_LEN};

pub const EMPTY_KEYWORD_MESSAGE: &str = "Please enter a keyword";
pub const CREATE_IN_FLIGHT_MESSAGE: &str = "A topic is still being created";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    /// Nothing requested yet.
    #[default]
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// Inputs of the "new topic" dialog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateDialog {
    pub open: bool,
    pub keyword: String,
    pub frequency: NotificationFrequency,
    /// Busy flag: a create request is in flight.
    pub creating: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Reload the collection from any phase.
    Refresh,
    /// Reload after a failed fetch; ignored outside `Phase::Error`.
    Retry,
    Fetched {
        seq: u64,
        result: Result<Vec<Topic>, ApiError>,
    },
    OpenCreate,
    CancelCreate,
    EditKeyword(String),
    SelectFrequency(NotificationFrequency),
    SubmitCreate,
    Created(Result<Topic, ApiError>),
    ToggleActive(Topic),
    SetFrequency(Topic, NotificationFrequency),
    Updated(Result<Topic, ApiError>),
    /// First half of a delete; nothing is sent until `ConfirmDelete`.
    RequestDelete(Topic),
    ConfirmDelete,
    CancelDelete,
    Deleted(Result<(), ApiError>),
    DismissNotice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch { seq: u64 },
    Create(NewTopic),
    Update { id: i64, patch: TopicPatch },
    Delete { id: i64 },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicListState {
    phase: Phase,
    topics: Vec<Topic>,
    dialog: CreateDialog,
    pending_delete: Option<Topic>,
    notice: Option<String>,
    latest_fetch: u64,
}

impl TopicListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Snapshot from the last successful fetch.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// What the list view shows: the snapshot once loaded, nothing while a
    /// fetch is in flight or after one failed.
    pub fn visible_topics(&self) -> Option<&[Topic]> {
        match self.phase {
            Phase::Loaded => Some(&self.topics),
            _ => None,
        }
    }

    pub fn dialog(&self) -> &CreateDialog {
        &self.dialog
    }

    pub fn pending_delete(&self) -> Option<&Topic> {
        self.pending_delete.as_ref()
    }

    /// Error from the last toggle, update or delete.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// The first error the user should see, if any.
    pub fn failure(&self) -> Option<&str> {
        if let Phase::Error(msg) = &self.phase {
            return Some(msg.as_str());
        }
        self.mutation_error()
    }

    /// Error from the last create, update or delete, ignoring how the
    /// refetch after it went.
    pub fn mutation_error(&self) -> Option<&str> {
        self.dialog.error.as_deref().or(self.notice.as_deref())
    }

    pub fn transition(mut self, msg: Msg) -> (Self, Option<Effect>) {
        let effect = match msg {
            Msg::Refresh => Some(self.begin_fetch()),
            Msg::Retry if matches!(self.phase, Phase::Error(_)) => Some(self.begin_fetch()),
            Msg::Retry => None,
            Msg::Fetched { seq, result } => {
                if seq != self.latest_fetch {
                    // superseded by a later fetch
                    return (self, None);
                }
                match result {
                    Ok(topics) => {
                        self.topics = topics;
                        self.phase = Phase::Loaded;
                    }
                    Err(err) => {
                        warn!(error = %err, "topic fetch failed");
                        self.topics.clear();
                        self.phase = Phase::Error(err.user_message(Operation::FetchTopics));
                    }
                }
                None
            }
            Msg::OpenCreate if self.dialog.creating => {
                // the dialog was cancelled mid-request; its outcome is still pending
                self.notice = Some(CREATE_IN_FLIGHT_MESSAGE.to_string());
                None
            }
            Msg::OpenCreate => {
                self.dialog.open = true;
                self.dialog.error = None;
                None
            }
            Msg::CancelCreate => {
                self.dialog = CreateDialog {
                    creating: self.dialog.creating,
                    ..CreateDialog::default()
                };
                None
            }
            Msg::EditKeyword(keyword) => {
                self.dialog.keyword = keyword;
                self.dialog.error = None;
                None
            }
            Msg::SelectFrequency(frequency) => {
                self.dialog.frequency = frequency;
                None
            }
            Msg::SubmitCreate => self.submit_create(),
            Msg::Created(Ok(topic)) => {
                info!(id = topic.id, keyword = %topic.keyword, "topic created");
                self.dialog = CreateDialog::default();
                Some(self.begin_fetch())
            }
            Msg::Created(Err(err)) => {
                self.dialog.creating = false;
                let message = err.user_message(Operation::CreateTopic);
                if self.dialog.open {
                    self.dialog.error = Some(message);
                } else {
                    self.notice = Some(message);
                }
                None
            }
            Msg::ToggleActive(topic) => {
                self.notice = None;
                Some(Effect::Update {
                    id: topic.id,
                    patch: TopicPatch::active(!topic.is_active),
                })
            }
            Msg::SetFrequency(topic, frequency) => {
                self.notice = None;
                Some(Effect::Update {
                    id: topic.id,
                    patch: TopicPatch::frequency(frequency),
                })
            }
            Msg::Updated(Ok(topic)) => {
                info!(id = topic.id, is_active = topic.is_active, "topic updated");
                Some(self.begin_fetch())
            }
            Msg::Updated(Err(err)) => {
                self.notice = Some(err.user_message(Operation::UpdateTopic));
                None
            }
            Msg::RequestDelete(topic) => {
                self.pending_delete = Some(topic);
                None
            }
            Msg::ConfirmDelete => self.pending_delete.take().map(|topic| {
                self.notice = None;
                Effect::Delete { id: topic.id }
            }),
            Msg::CancelDelete => {
                self.pending_delete = None;
                None
            }
            Msg::Deleted(Ok(())) => Some(self.begin_fetch()),
            Msg::Deleted(Err(err)) => {
                self.notice = Some(err.user_message(Operation::DeleteTopic));
                None
            }
            Msg::DismissNotice => {
                self.notice = None;
                None
            }
        };

        (self, effect)
    }

    fn begin_fetch(&mut self) -> Effect {
        self.latest_fetch += 1;
        self.phase = Phase::Loading;
        Effect::Fetch {
            seq: self.latest_fetch,
        }
    }

    fn submit_create(&mut self) -> Option<Effect> {
        if !self.dialog.open || self.dialog.creating {
            return None;
        }

        let keyword = self.dialog.keyword.trim();
        if keyword.is_empty() {
            self.dialog.error = Some(EMPTY_KEYWORD_MESSAGE.to_string());
            return None;
        }
        if keyword.chars().count() > MAX_KEYWORD_LEN {
            self.dialog.error = Some(format!(
                "Keyword must be at most {} characters",
                MAX_KEYWORD_LEN
            ));
            return None;
        }

        let topic = NewTopic {
            keyword: keyword.to_string(),
            notification_frequency: self.dialog.frequency,
            is_active: true,
        };
        self.dialog.creating = true;
        self.dialog.error = None;
        Some(Effect::Create(topic))
    }
}

/// Performs one effect and returns the completion message for it.
pub async fn run_effect<A: TopicApi + ?Sized>(api: &A, effect: Effect) -> Msg {
    match effect {
        Effect::Fetch { seq } => Msg::Fetched {
            seq,
            result: api.list_topics().await,
        },
        Effect::Create(topic) => Msg::Created(api.create_topic(&topic).await),
        Effect::Update { id, patch } => Msg::Updated(api.update_topic(id, &patch).await),
        Effect::Delete { id } => Msg::Deleted(api.delete_topic(id).await),
    }
}

/// Runs the topic state machine to quiescence after each user action.
pub struct TopicListController<A> {
    api: A,
    state: TopicListState,
}

impl<A: TopicApi> TopicListController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: TopicListState::new(),
        }
    }

    pub fn state(&self) -> &TopicListState {
        &self.state
    }

    pub async fn dispatch(&mut self, msg: Msg) {
        let mut next = Some(msg);
        while let Some(msg) = next.take() {
            let (state, effect) = std::mem::take(&mut self.state).transition(msg);
            self.state = state;
            if let Some(effect) = effect {
                next = Some(run_effect(&self.api, effect).await);
            }
        }
    }

    /// Loads the full collection, replacing whatever was held before.
    pub async fn fetch_all(&mut self) {
        self.dispatch(Msg::Refresh).await;
    }

    pub async fn retry(&mut self) {
        self.dispatch(Msg::Retry).await;
    }

    /// Fills in and submits the create dialog. On failure the dialog stays
    /// open with its inputs and an error.
    pub async fn create(&mut self, keyword: &str, frequency: NotificationFrequency) {
        self.dispatch(Msg::OpenCreate).await;
        self.dispatch(Msg::EditKeyword(keyword.to_string())).await;
        self.dispatch(Msg::SelectFrequency(frequency)).await;
        self.dispatch(Msg::SubmitCreate).await;
    }

    pub async fn toggle_active(&mut self, topic: &Topic) {
        self.dispatch(Msg::ToggleActive(topic.clone())).await;
    }

    pub async fn set_frequency(&mut self, topic: &Topic, frequency: NotificationFrequency) {
        self.dispatch(Msg::SetFrequency(topic.clone(), frequency)).await;
    }

    pub async fn request_delete(&mut self, topic: &Topic) {
        self.dispatch(Msg::RequestDelete(topic.clone())).await;
    }

    pub async fn confirm_delete(&mut self) {
        self.dispatch(Msg::ConfirmDelete).await;
    }

    pub async fn cancel_delete(&mut self) {
        self.dispatch(Msg::CancelDelete).await;
    }

    pub fn find(&self, id: i64) -> Option<&Topic> {
        self.state.topics().iter().find(|topic| topic.id == id)
    }
}

#[cfg(test)]
#[path = "topics_tests.rs"]
mod tests;
