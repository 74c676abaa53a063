#![allow(dead_code)]

use std::cell::RefCell;

use dhis2::{Api, ApiRequest, Error, Method, Result};
use reqwest::StatusCode;
use serde_json::{Value, json};

type Handler = Box<dyn Fn(&ApiRequest) -> Result<Value>>;

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// In-memory `Api` answering from scripted routes and recording every
/// request it sees.
#[derive(Default)]
pub struct FakeApi {
    routes: Vec<Route>,
    requests: RefCell<Vec<ApiRequest>>,
    page_size: Option<u32>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn on(
        mut self,
        method: Method,
        path: &str,
        handler: impl Fn(&ApiRequest) -> Result<Value> + 'static,
    ) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(handler),
        });
        self
    }

    /// Always answers `method path` with `body`.
    pub fn respond(self, method: Method, path: &str, body: Value) -> Self {
        self.on(method, path, move |_| Ok(body.clone()))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.borrow().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last(&self, method: Method, path: &str) -> Option<ApiRequest> {
        self.requests
            .borrow()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }
}

impl Api for FakeApi {
    fn send(&self, request: ApiRequest) -> Result<Value> {
        self.requests.borrow_mut().push(request.clone());
        match self
            .routes
            .iter()
            .rev()
            .find(|r| r.method == request.method && r.path == request.path)
        {
            Some(route) => (route.handler)(&request),
            None => Err(not_found(&request.path)),
        }
    }

    fn default_page_size(&self) -> u32 {
        self.page_size.unwrap_or(dhis2::DEFAULT_PAGE_SIZE)
    }
}

pub fn not_found(path: &str) -> Error {
    Error::Http {
        status: StatusCode::NOT_FOUND,
        path: path.to_string(),
        payload: json!({"httpStatus": "Not Found"}),
        message: format!("HTTP 404 on {path}"),
    }
}

/// `n` objects with ids `{prefix}{offset}..`.
pub fn items(prefix: &str, offset: usize, n: usize) -> Vec<Value> {
    (offset..offset + n)
        .map(|i| json!({"id": format!("{prefix}{i}")}))
        .collect()
}

pub fn page_param(request: &ApiRequest) -> u32 {
    request
        .params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1)
}
