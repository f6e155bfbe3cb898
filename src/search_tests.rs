use super::*;
use crate::models::Event;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

struct FakeEventApi {
    queries: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeEventApi {
    fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl EventApi for FakeEventApi {
    async fn search_events(&self, keyword: &str) -> Result<SearchResponse, ApiError> {
        self.queries.lock().unwrap().push(keyword.to_string());
        if self.fail {
            return Err(ApiError::Server("検索エラー: timeout".into()));
        }
        let events = if keyword == "AI" {
            vec![
                Event {
                    title: "AI Conf".into(),
                    datetime: "2024-06-01".into(),
                    location: "Tokyo".into(),
                    url: "https://x/1".into(),
                },
                Event {
                    title: "AI Night".into(),
                    datetime: "2024-06-02".into(),
                    location: "Osaka".into(),
                    url: "https://x/2".into(),
                },
            ]
        } else {
            Vec::new()
        };
        Ok(SearchResponse {
            keyword: keyword.to_string(),
            count: events.len(),
            events,
        })
    }
}

fn response(keyword: &str, count: usize) -> SearchResponse {
    SearchResponse {
        keyword: keyword.to_string(),
        count,
        events: Vec::new(),
    }
}

#[tokio::test]
async fn test_blank_search_sends_nothing() {
    let api = Arc::new(FakeEventApi::new());
    let mut controller = EventSearchController::new(api.clone());

    for keyword in ["", "  ", "\u{3000}"] {
        controller.search(keyword).await;
        assert_eq!(controller.state().error(), Some(EMPTY_SEARCH_MESSAGE));
        assert_eq!(controller.state().view(), SearchView::Prompt);
    }
    assert!(api.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_holds_envelope() {
    let api = Arc::new(FakeEventApi::new());
    let mut controller = EventSearchController::new(api.clone());

    controller.search("AI").await;

    match controller.state().view() {
        SearchView::Results(results) => {
            assert_eq!(results.count, 2);
            assert_eq!(results.events.len(), 2);
            assert_eq!(results.events[0].title, "AI Conf");
        }
        other => panic!("unexpected view: {:?}", other),
    }
    assert_eq!(api.queries.lock().unwrap().as_slice(), ["AI"]);
}

#[tokio::test]
async fn test_zero_hits_are_not_the_prompt() {
    let mut controller = EventSearchController::new(FakeEventApi::new());
    controller.search("zzznotfound").await;

    assert!(matches!(controller.state().view(), SearchView::NoResults(r) if r.count == 0));
    assert_eq!(controller.state().error(), None);
}

#[tokio::test]
async fn test_failure_shows_generic_message() {
    let mut controller = EventSearchController::new(FakeEventApi::failing());
    controller.search("AI").await;

    assert_eq!(controller.state().error(), Some("Search failed"));
    assert_eq!(controller.state().results(), None);
    assert!(!controller.state().is_loading());
}

#[test]
fn test_new_search_clears_previous_outcome() {
    let (state, _) = EventSearchState::new().transition(SearchMsg::EditKeyword("AI".into()));
    let (state, request) = state.transition(SearchMsg::Submit);
    let (state, _) = state.transition(SearchMsg::Completed {
        seq: request.unwrap().seq,
        result: Err(ApiError::Status(500)),
    });
    assert!(state.error().is_some());

    let (state, request) = state.transition(SearchMsg::Submit);
    assert!(request.is_some());
    assert_eq!(state.error(), None);
    assert_eq!(state.results(), None);
    assert_eq!(state.view(), SearchView::Searching);
}

#[test]
fn test_stale_response_is_discarded() {
    let (state, _) = EventSearchState::new().transition(SearchMsg::EditKeyword("first".into()));
    let (state, first) = state.transition(SearchMsg::Submit);
    let (state, _) = state.transition(SearchMsg::EditKeyword("second".into()));
    let (state, second) = state.transition(SearchMsg::Submit);
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(second.seq > first.seq);
    assert_eq!(second.keyword, "second");

    let (state, _) = state.transition(SearchMsg::Completed {
        seq: second.seq,
        result: Ok(response("second", 3)),
    });
    let (state, _) = state.transition(SearchMsg::Completed {
        seq: first.seq,
        result: Ok(response("first", 1)),
    });

    assert_eq!(state.results().map(|r| r.keyword.as_str()), Some("second"));

    // a stale failure must not clobber the result either
    let (state, _) = state.transition(SearchMsg::Completed {
        seq: first.seq,
        result: Err(ApiError::Status(500)),
    });
    assert_eq!(state.error(), None);
}

#[test]
fn test_keyword_is_trimmed_before_sending() {
    let (state, _) = EventSearchState::new().transition(SearchMsg::EditKeyword("  Rust ".into()));
    let (_, request) = state.transition(SearchMsg::Submit);
    assert_eq!(request.unwrap().keyword, "Rust");
}
