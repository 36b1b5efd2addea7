use looker_rtl::client::ApiClient;
use looker_rtl::error::ApiErrorKind;
use looker_rtl::methods::{SearchUsers, User};
use looker_rtl::paging::{PageRel, Pager};
use looker_rtl::settings::Settings;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/api/4.0/users/search";

fn page_link(uri: &str, offset: u64, rel: &str) -> String {
    format!(
        "<{}{}?limit=2&offset={}>; rel=\"{}\"",
        uri, SEARCH_PATH, offset, rel
    )
}

fn users(ids: &[&str]) -> serde_json::Value {
    json!(ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>())
}

/// Five users served two per page, with first/prev/next/last links.
async fn mount_search_pages(server: &MockServer) {
    let uri = server.uri();

    Mock::given(method("POST"))
        .and(path("/api/4.0/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;

    let pages: [(u64, &[&str], Vec<String>); 3] = [
        (
            0,
            &["1", "2"],
            vec![
                page_link(&uri, 0, "first"),
                page_link(&uri, 2, "next"),
                page_link(&uri, 4, "last"),
            ],
        ),
        (
            2,
            &["3", "4"],
            vec![
                page_link(&uri, 0, "first"),
                page_link(&uri, 0, "prev"),
                page_link(&uri, 4, "next"),
                page_link(&uri, 4, "last"),
            ],
        ),
        (
            4,
            &["5"],
            vec![
                page_link(&uri, 0, "first"),
                page_link(&uri, 2, "prev"),
                page_link(&uri, 4, "last"),
            ],
        ),
    ];

    for (offset, ids, links) in pages {
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("limit", "2"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(users(ids))
                    .insert_header("Link", links.join(", ").as_str())
                    .insert_header("X-Total-Count", "5"),
            )
            .mount(server)
            .await;
    }
}

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::http(Settings::new(server.uri(), "a", "b").unwrap()).unwrap()
}

fn first_page_search() -> SearchUsers {
    SearchUsers {
        limit: Some(2),
        offset: Some(0),
        ..Default::default()
    }
}

fn ids(items: &[User]) -> Vec<&str> {
    items.iter().filter_map(|u| u.id.as_deref()).collect()
}

#[tokio::test]
async fn test_pager_reads_paging_headers() {
    let server = MockServer::start().await;
    mount_search_pages(&server).await;
    let client = client_for(&server);

    let pager = client.pager(&first_page_search()).await.unwrap().unwrap();

    assert_eq!(ids(pager.items()), vec!["1", "2"]);
    assert_eq!(pager.total(), Some(5));
    assert_eq!(pager.limit(), Some(2));
    assert_eq!(pager.offset(), Some(0));
    assert_eq!(pager.page(), Some(1));
    assert_eq!(pager.pages(), Some(3));
    assert!(pager.has_rel(PageRel::First));
    assert!(pager.has_rel(PageRel::Last));
    assert!(!pager.has_rel(PageRel::Prev));
    assert!(pager.more());
}

#[tokio::test]
async fn test_pager_walks_next_and_prev() {
    let server = MockServer::start().await;
    mount_search_pages(&server).await;
    let client = client_for(&server);

    let mut pager = client.pager(&first_page_search()).await.unwrap().unwrap();

    let page = pager.next_page().await.unwrap().unwrap();
    assert_eq!(ids(page), vec!["3", "4"]);
    assert_eq!(pager.page(), Some(2));
    assert!(pager.has_rel(PageRel::Prev));

    let page = pager.last_page().await.unwrap().unwrap();
    assert_eq!(ids(page), vec!["5"]);
    assert_eq!(pager.page(), Some(3));
    assert!(!pager.more());

    let page = pager.prev_page().await.unwrap().unwrap();
    assert_eq!(ids(page), vec!["3", "4"]);
}

#[tokio::test]
async fn test_collect_all_follows_next_links() {
    let server = MockServer::start().await;
    mount_search_pages(&server).await;
    let client = client_for(&server);

    let pager: Pager<User> = Pager::new(&client, &first_page_search())
        .await
        .unwrap()
        .unwrap();
    let all = pager.collect_all().await.unwrap().unwrap();

    assert_eq!(ids(&all), vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_missing_rel_clears_pager() {
    let server = MockServer::start().await;
    mount_search_pages(&server).await;
    let client = client_for(&server);

    let mut pager = client.pager(&first_page_search()).await.unwrap().unwrap();

    let page = pager.prev_page().await.unwrap().unwrap();
    assert!(page.is_empty());
    assert_eq!(pager.total(), None);
    assert!(pager.links().is_empty());
}

#[tokio::test]
async fn test_get_rel_with_limit_override() {
    let server = MockServer::start().await;
    mount_search_pages(&server).await;
    let client = client_for(&server);

    let mut pager = client.pager(&first_page_search()).await.unwrap().unwrap();

    let page = pager
        .get_rel(PageRel::First, Some(2), Some(4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ids(page), vec!["5"]);
    assert_eq!(pager.offset(), Some(4));
}

#[tokio::test]
async fn test_get_rel_rejects_zero_limit() {
    let server = MockServer::start().await;
    mount_search_pages(&server).await;
    let client = client_for(&server);

    let mut pager = client.pager(&first_page_search()).await.unwrap().unwrap();

    let error = pager
        .get_rel(PageRel::Next, Some(0), None)
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(error.kind, ApiErrorKind::Validation);
}

#[tokio::test]
async fn test_pager_error_status_is_api_error() {
    let server = MockServer::start().await;
    mount_search_pages(&server).await;
    let client = client_for(&server);

    // No mock serves offset 9
    let search = SearchUsers {
        limit: Some(2),
        offset: Some(9),
        ..Default::default()
    };
    let error = client.pager(&search).await.unwrap().unwrap_err();

    assert_eq!(error.status, Some(404));
}

#[tokio::test]
async fn test_negative_offset_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let search = SearchUsers {
        limit: Some(2),
        offset: Some(-1),
        ..Default::default()
    };
    let error = client.pager(&search).await.unwrap().unwrap_err();

    assert_eq!(error.kind, ApiErrorKind::Validation);
    assert!(server.received_requests().await.unwrap().is_empty());
}
