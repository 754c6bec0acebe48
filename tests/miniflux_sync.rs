//! End-to-end tests of refresh, pagination and mutations against a mock
//! Miniflux server.
//!
//! Each test starts its own `wiremock` server so the mounted expectations are
//! isolated.

use pretty_assertions::assert_eq;
use reflux::api::{ApiError, EntryContext, EntrySource, MinifluxClient};
use reflux::auth::Credentials;
use reflux::store::{EntryStatus, EntryStore};
use reflux::sync::{FilterState, ListKind, MutationCoordinator, Pagination, RefreshResponse};
use wiremock::matchers::{body_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> MinifluxClient {
    MinifluxClient::new(&Credentials::with_token(server.uri(), "token")).unwrap()
}

fn raw_entry(id: i64, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "feed_id": 4,
        "status": status,
        "title": format!("Entry {}", id),
        "url": format!("https://example.com/{}", id),
        "author": "",
        "content": "<p>body</p>",
        "published_at": format!("2024-03-01T10:{:02}:00Z", id),
        "created_at": format!("2024-03-01T10:{:02}:00Z", id),
        "starred": false,
        "feed": {"id": 4, "title": "Example"}
    })
}

fn body(total: u64, entries: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "total": total, "entries": entries })
}

/// Run a full refresh the way the UI task does.
async fn refresh(
    client: &MinifluxClient,
    pagination: &mut Pagination,
    store: &mut EntryStore,
    filter: &FilterState,
) {
    let plan = pagination.begin_refresh(filter);
    let all = client.fetch_entries(&plan.all).await.unwrap();
    let unread = match &plan.unread {
        Some(params) => Some(client.fetch_entries(params).await.unwrap()),
        None => None,
    };
    pagination
        .apply_refresh(plan.generation, RefreshResponse { all, unread }, store)
        .unwrap();
}

#[tokio::test]
async fn test_feed_refresh_and_load_more() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/feeds/4/entries"))
        .and(query_param("offset", "0"))
        .and(query_param_is_missing("status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(
            3,
            vec![raw_entry(1, "unread"), raw_entry(2, "read")],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/feeds/4/entries"))
        .and(query_param("status", "unread"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(body(1, vec![raw_entry(1, "unread")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/feeds/4/entries"))
        .and(query_param("offset", "2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(body(3, vec![raw_entry(3, "read")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut pagination = Pagination::new(EntryContext::Feed(4), 2);
    let mut store = EntryStore::new();
    let filter = FilterState::default();

    refresh(&client, &mut pagination, &mut store, &filter).await;
    assert_eq!(pagination.list(ListKind::All).ids(), &[1, 2]);
    assert_eq!(pagination.unread_count(), 1);

    let plan = pagination.begin_load_more(ListKind::All, &filter).unwrap();
    let page = client.fetch_entries(&plan.params).await.unwrap();
    let appended = pagination.apply_load_more(&plan, page, &mut store).unwrap();

    assert_eq!(appended, 1);
    assert_eq!(pagination.list(ListKind::All).ids(), &[1, 2, 3]);
    assert!(!pagination.list(ListKind::All).load_more_visible());
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_searched_refresh_counts_whole_context() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entries"))
        .and(query_param("search", "rust"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(body(1, vec![raw_entry(2, "unread")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/entries"))
        .and(query_param("status", "unread"))
        .and(query_param_is_missing("search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body(
            7,
            vec![raw_entry(1, "unread"), raw_entry(2, "unread")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut pagination = Pagination::new(EntryContext::All, 2);
    let mut store = EntryStore::new();
    let filter = FilterState {
        filter_string: "rust".to_string(),
        ..FilterState::default()
    };

    refresh(&client, &mut pagination, &mut store, &filter).await;
    assert_eq!(pagination.list(ListKind::All).ids(), &[2]);
    assert_eq!(pagination.unread_count(), 7);
}

#[tokio::test]
async fn test_mark_read_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entries"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(body(1, vec![raw_entry(7, "unread")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/entries"))
        .and(body_json(serde_json::json!({"entry_ids": [7], "status": "read"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut pagination = Pagination::new(EntryContext::All, 50);
    let mut store = EntryStore::new();
    let mut mutations = MutationCoordinator::new();
    refresh(&client, &mut pagination, &mut store, &FilterState::default()).await;

    let applied = mutations
        .set_status(&mut store, 7, EntryStatus::Read)
        .unwrap();
    pagination.adjust_unread_count(applied.unread_delta);
    let request = applied.request.unwrap();

    let result = client
        .update_entry_status(&[request.entry_id()], EntryStatus::Read)
        .await;
    let settlement = mutations.settle(&mut store, &request, result);

    assert!(settlement.error.is_none());
    assert_eq!(store.get(7).unwrap().status, EntryStatus::Read);
    assert_eq!(pagination.unread_count(), 0);
}

#[tokio::test]
async fn test_rejected_star_rolls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/entries"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(body(1, vec![raw_entry(5, "read")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/entries/5/bookmark"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"error_message": "Access Unauthorized"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut pagination = Pagination::new(EntryContext::All, 50);
    let mut store = EntryStore::new();
    let mut mutations = MutationCoordinator::new();
    refresh(&client, &mut pagination, &mut store, &FilterState::default()).await;

    let request = mutations
        .toggle_starred(&mut store, 5)
        .unwrap()
        .request
        .unwrap();
    assert!(store.get(5).unwrap().starred);

    let result = client.update_entry_starred(5).await;
    let settlement = mutations.settle(&mut store, &request, result);

    assert!(!store.get(5).unwrap().starred);
    assert!(matches!(settlement.error, Some(ApiError::Auth { .. })));
}
