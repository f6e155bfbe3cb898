//! Event search: one keyword in, one `{keyword, count, events}` envelope out.
//!
//! Each submitted search is tagged with a sequence number and a completion
//! is applied only if it answers the latest submission, so a slow earlier
//! response can never overwrite a newer one.

use tracing::{info, warn};

use crate::api::EventApi;
use crate::error::{ApiError, Operation};
use crate::models::SearchResponse;

pub const EMPTY_SEARCH_MESSAGE: &str = "Please enter a search keyword";

#[derive(Debug, Clone, PartialEq)]
pub enum SearchMsg {
    EditKeyword(String),
    Submit,
    Completed {
        seq: u64,
        result: Result<SearchResponse, ApiError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub seq: u64,
    pub keyword: String,
}

/// What the results area shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchView<'a> {
    /// No search has produced anything yet.
    Prompt,
    Searching,
    NoResults(&'a SearchResponse),
    Results(&'a SearchResponse),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventSearchState {
    keyword: String,
    loading: bool,
    results: Option<SearchResponse>,
    error: Option<String>,
    latest: u64,
}

impl EventSearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn results(&self) -> Option<&SearchResponse> {
        self.results.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn view(&self) -> SearchView<'_> {
        if self.loading {
            return SearchView::Searching;
        }
        match &self.results {
            Some(results) if results.count == 0 => SearchView::NoResults(results),
            Some(results) => SearchView::Results(results),
            None => SearchView::Prompt,
        }
    }

    pub fn transition(mut self, msg: SearchMsg) -> (Self, Option<SearchRequest>) {
        let request = match msg {
            SearchMsg::EditKeyword(keyword) => {
                self.keyword = keyword;
                None
            }
            SearchMsg::Submit => {
                let keyword = self.keyword.trim();
                if keyword.is_empty() {
                    self.error = Some(EMPTY_SEARCH_MESSAGE.to_string());
                    None
                } else {
                    let keyword = keyword.to_string();
                    self.latest += 1;
                    self.loading = true;
                    self.error = None;
                    self.results = None;
                    Some(SearchRequest {
                        seq: self.latest,
                        keyword,
                    })
                }
            }
            SearchMsg::Completed { seq, result } => {
                if seq != self.latest {
                    return (self, None);
                }
                self.loading = false;
                match result {
                    Ok(results) => {
                        info!(keyword = %results.keyword, count = results.count, "search completed");
                        self.results = Some(results);
                    }
                    Err(err) => {
                        warn!(error = %err, "search failed");
                        self.error = Some(match err {
                            ApiError::Validation(msg) => msg,
                            _ => Operation::Search.failure_message().to_string(),
                        });
                    }
                }
                None
            }
        };

        (self, request)
    }
}

pub async fn run_search<A: EventApi + ?Sized>(api: &A, request: SearchRequest) -> SearchMsg {
    SearchMsg::Completed {
        seq: request.seq,
        result: api.search_events(&request.keyword).await,
    }
}

pub struct EventSearchController<A> {
    api: A,
    state: EventSearchState,
}

impl<A: EventApi> EventSearchController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: EventSearchState::new(),
        }
    }

    pub fn state(&self) -> &EventSearchState {
        &self.state
    }

    pub async fn dispatch(&mut self, msg: SearchMsg) {
        let mut next = Some(msg);
        while let Some(msg) = next.take() {
            let (state, request) = std::mem::take(&mut self.state).transition(msg);
            self.state = state;
            if let Some(request) = request {
                next = Some(run_search(&self.api, request).await);
            }
        }
    }

    pub async fn search(&mut self, keyword: &str) {
        self.dispatch(SearchMsg::EditKeyword(keyword.to_string())).await;
        self.dispatch(SearchMsg::Submit).await;
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
