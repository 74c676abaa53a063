//! The raw request surface shared by the HTTP [`Client`](crate::Client) and
//! anything else that can answer DHIS2 requests.
//!
//! Requests are plain data ([`ApiRequest`]); an [`Api`] implementor executes
//! them and returns the decoded JSON body. Paging, the period resolver and
//! the resource helpers are all written against this trait, so they run the
//! same way over the network or over a scripted fake.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::paging::Pages;
use crate::resources::{
    Analytics, Collection, DataValues, OrganisationUnits, Sharing, System, Users,
};

pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered query parameters. Keys may repeat (`orgUnit=a&orgUnit=b`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `key=value` and returns `self`.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    /// Replaces every value of `key` with a single `value`.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.0.retain(|(k, _)| k != key);
        self.0.push((key.to_string(), value.to_string()));
    }

    /// Sets `key` only when the caller has not already provided it.
    pub fn set_default(&mut self, key: &str, value: impl ToString) {
        if !self.contains(key) {
            self.0.push((key.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    /// Appends `fields=<fields>` when `fields` is given.
    pub(crate) fn with_fields(self, fields: Option<&str>) -> Self {
        match fields {
            Some(fields) => self.with("fields", fields),
            None => self,
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: ToString, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// An API request described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the server root, e.g. `/api/dataElements`.
    pub path: String,
    pub params: Params,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Params::new(),
            body: None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

fn to_body<T: Serialize + ?Sized>(path: &str, body: &T) -> Result<Value> {
    serde_json::to_value(body).map_err(|source| Error::Encode {
        path: path.to_string(),
        source,
    })
}

/// Something that can execute DHIS2 API requests.
///
/// Only [`Api::send`] is required; everything else is built on it.
pub trait Api {
    /// Executes `request` and returns the decoded JSON body (`{}` for an
    /// empty body). Non-2xx responses are [`Error::Http`].
    fn send(&self, request: ApiRequest) -> Result<Value>;

    /// Page size used by [`Api::list_paged`] when neither the call nor the
    /// params name one.
    fn default_page_size(&self) -> u32 {
        DEFAULT_PAGE_SIZE
    }

    /// Runs `f` with this API's log subscriber active. Work that spans
    /// several requests (paging, the period resolver) logs through it.
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        f()
    }

    fn get(&self, path: &str, params: Params) -> Result<Value> {
        self.send(ApiRequest::new(Method::Get, path).with_params(params))
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, params: Params, body: &T) -> Result<Value> {
        let body = to_body(path, body)?;
        self.send(
            ApiRequest::new(Method::Post, path)
                .with_params(params)
                .with_body(body),
        )
    }

    fn put<T: Serialize + ?Sized>(&self, path: &str, params: Params, body: &T) -> Result<Value> {
        let body = to_body(path, body)?;
        self.send(
            ApiRequest::new(Method::Put, path)
                .with_params(params)
                .with_body(body),
        )
    }

    /// Sends a JSON Patch document (`application/json-patch+json`).
    fn patch<T: Serialize + ?Sized>(&self, path: &str, params: Params, body: &T) -> Result<Value> {
        let body = to_body(path, body)?;
        self.send(
            ApiRequest::new(Method::Patch, path)
                .with_params(params)
                .with_body(body),
        )
    }

    fn delete(&self, path: &str, params: Params) -> Result<Value> {
        self.send(ApiRequest::new(Method::Delete, path).with_params(params))
    }

    /// Lazily walks a paged collection endpoint. See [`Pages`].
    fn list_paged(
        &self,
        path: &str,
        params: Params,
        page_size: Option<u32>,
        item_key: Option<&str>,
    ) -> Pages<'_, Self> {
        Pages::new(self, path, params, page_size, item_key)
    }

    /// [`Api::list_paged`] drained into a vector.
    fn fetch_all(
        &self,
        path: &str,
        params: Params,
        page_size: Option<u32>,
        item_key: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.list_paged(path, params, page_size, item_key).collect()
    }

    fn system(&self) -> System<'_, Self> {
        System::new(self)
    }

    fn users(&self) -> Users<'_, Self> {
        Users::new(self)
    }

    fn organisation_units(&self) -> OrganisationUnits<'_, Self> {
        OrganisationUnits::new(self)
    }

    fn data_elements(&self) -> Collection<'_, Self> {
        Collection::new(self, "/api/dataElements", "dataElements")
    }

    fn data_sets(&self) -> Collection<'_, Self> {
        Collection::new(self, "/api/dataSets", "dataSets")
    }

    fn data_values(&self) -> DataValues<'_, Self> {
        DataValues::new(self)
    }

    fn analytics(&self) -> Analytics<'_, Self> {
        Analytics::new(self)
    }

    fn sharing(&self) -> Sharing<'_, Self> {
        Sharing::new(self)
    }
}

impl<A: Api + ?Sized> Api for &A {
    fn send(&self, request: ApiRequest) -> Result<Value> {
        (**self).send(request)
    }

    fn default_page_size(&self) -> u32 {
        (**self).default_page_size()
    }

    fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        (**self).scoped(f)
    }
}
