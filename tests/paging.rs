mod common;

use common::{FakeApi, items, page_param};
use dhis2::{Api, Method, Params, Result};
use serde_json::{Value, json};

/// Serves `sizes[i]` items for page `i + 1`.
fn paged_api(sizes: &'static [usize]) -> FakeApi {
    FakeApi::new().on(Method::Get, "/api/dataElements", move |req| {
        let page = page_param(req) as usize;
        let offset: usize = sizes.iter().take(page - 1).sum();
        let n = sizes.get(page - 1).copied().unwrap_or(0);
        Ok(json!({
            "pager": {"page": page, "pageSize": 50},
            "dataElements": items("de", offset, n),
        }))
    })
}

#[test]
fn walks_pages_until_short_page() {
    let api = paged_api(&[50, 50, 23]);
    let all = api
        .fetch_all("/api/dataElements", Params::new(), None, None)
        .unwrap();

    assert_eq!(all.len(), 123);
    assert_eq!(all[0]["id"], "de0");
    assert_eq!(all[122]["id"], "de122");
    assert_eq!(api.count(Method::Get, "/api/dataElements"), 3);

    let pages: Vec<_> = api.requests().iter().map(page_param).collect();
    assert_eq!(pages, [1, 2, 3]);
    assert!(
        api.requests()
            .iter()
            .all(|r| r.params.get("pageSize") == Some("50"))
    );
}

#[test]
fn empty_first_page_is_one_request() {
    let api = paged_api(&[0]);
    let all = api
        .fetch_all("/api/dataElements", Params::new(), None, None)
        .unwrap();
    assert!(all.is_empty());
    assert_eq!(api.requests().len(), 1);
}

#[test]
fn full_last_page_needs_an_empty_probe() {
    let api = paged_api(&[50, 50]);
    let all = api
        .fetch_all("/api/dataElements", Params::new(), None, None)
        .unwrap();
    assert_eq!(all.len(), 100);
    assert_eq!(api.requests().len(), 3);
}

#[test]
fn pages_are_fetched_lazily() {
    let api = paged_api(&[50, 50, 23]);
    let first: Vec<Value> = api
        .list_paged("/api/dataElements", Params::new(), None, None)
        .take(10)
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(api.requests().len(), 1);
}

#[test]
fn caller_page_size_and_start_page_win() {
    let api = FakeApi::new().on(Method::Get, "/api/users", |req| {
        let n = if page_param(req) == 3 { 2 } else { 5 };
        Ok(json!({"users": items("u", 0, n)}))
    });
    let params = Params::from([("pageSize", "5"), ("page", "3"), ("fields", "id")]);
    let all = api.fetch_all("/api/users", params, Some(99), None).unwrap();

    assert_eq!(all.len(), 2);
    let request = &api.requests()[0];
    assert_eq!(request.params.get("pageSize"), Some("5"));
    assert_eq!(request.params.get("page"), Some("3"));
    assert_eq!(request.params.get("fields"), Some("id"));
}

#[test]
fn page_size_argument_beats_client_default() {
    let api = FakeApi::new()
        .with_page_size(7)
        .respond(Method::Get, "/api/users", json!({"users": []}));
    api.fetch_all("/api/users", Params::new(), Some(20), None).unwrap();
    api.fetch_all("/api/users", Params::new(), None, None).unwrap();

    let sizes: Vec<_> = api
        .requests()
        .iter()
        .map(|r| r.params.get("pageSize").unwrap().to_string())
        .collect();
    assert_eq!(sizes, ["20", "7"]);
}

#[test]
fn explicit_item_key() {
    let api = FakeApi::new().respond(
        Method::Get,
        "/api/analytics/rawData",
        json!({"rows": items("r", 0, 3), "headers": items("h", 0, 4)}),
    );
    let rows = api
        .fetch_all("/api/analytics/rawData", Params::new(), None, Some("rows"))
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn error_is_yielded_once_then_iteration_ends() {
    let api = FakeApi::new().on(Method::Get, "/api/dataElements", |req| {
        if page_param(req) == 2 {
            Err(common::not_found(&req.path))
        } else {
            Ok(json!({"dataElements": items("de", 0, 50)}))
        }
    });
    let mut pages = api.list_paged("/api/dataElements", Params::new(), None, None);

    let ok = pages.by_ref().take(50).filter(|r| r.is_ok()).count();
    assert_eq!(ok, 50);
    let err = pages.next().unwrap().unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    assert!(pages.next().is_none());
    assert_eq!(api.requests().len(), 2);
}

#[test]
fn each_call_restarts_from_first_page() {
    let api = paged_api(&[3]);
    for _ in 0..2 {
        let all = api
            .fetch_all("/api/dataElements", Params::new(), None, None)
            .unwrap();
        assert_eq!(all.len(), 3);
    }
    let pages: Vec<_> = api.requests().iter().map(page_param).collect();
    assert_eq!(pages, [1, 1]);
}

#[test]
fn resource_list_uses_collection_key() {
    let api = FakeApi::new().respond(
        Method::Get,
        "/api/organisationUnits",
        json!({"pager": {}, "organisationUnits": items("ou", 0, 4)}),
    );
    let units = api
        .organisation_units()
        .list(Params::from([("level", "2")]))
        .collect::<Result<Vec<_>>>()
        .unwrap();
    assert_eq!(units.len(), 4);
    let request = api.last(Method::Get, "/api/organisationUnits").unwrap();
    assert_eq!(request.params.get("level"), Some("2"));
}

#[test]
fn zero_page_size_falls_back_to_default() {
    let api = paged_api(&[50, 7]);
    let all = api
        .fetch_all("/api/dataElements", Params::from([("pageSize", "0")]), None, None)
        .unwrap();
    assert_eq!(all.len(), 57);
    assert_eq!(api.requests().len(), 2);
    assert!(
        api.requests()
            .iter()
            .all(|r| r.params.get_all("pageSize").collect::<Vec<_>>() == ["50"])
    );

    let api = paged_api(&[3]);
    let pages = api.list_paged("/api/dataElements", Params::new(), Some(0), None);
    assert_eq!(pages.page_size(), 50);
}
