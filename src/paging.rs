//! Lazy iteration over DHIS2's paged collection endpoints.

use std::vec;

use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{Api, DEFAULT_PAGE_SIZE, Params};
use crate::error::Result;

/// Iterator over the items of a paged collection, fetching one page at a
/// time as items are consumed.
///
/// Paging starts at `page=1` (or the caller's `page` param) and stops after
/// the first page holding fewer items than the page size. The server's
/// `pager` totals are not consulted. The first failed request is yielded
/// as an `Err`, after which the iterator is exhausted.
///
/// Dropping the iterator early issues no further requests.
#[derive(Debug)]
pub struct Pages<'a, A: ?Sized> {
    api: &'a A,
    path: String,
    params: Params,
    item_key: Option<String>,
    page: u32,
    page_size: u32,
    buffer: vec::IntoIter<Value>,
    done: bool,
}

impl<'a, A: Api + ?Sized> Pages<'a, A> {
    pub(crate) fn new(
        api: &'a A,
        path: &str,
        mut params: Params,
        page_size: Option<u32>,
        item_key: Option<&str>,
    ) -> Self {
        let fallback = page_size
            .filter(|&n| n > 0)
            .or_else(|| Some(api.default_page_size()).filter(|&n| n > 0))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        // A zero or unparsable `pageSize` would never produce a short page.
        let page_size = match params.get("pageSize").map(str::parse::<u32>) {
            Some(Ok(n)) if n > 0 => n,
            _ => {
                params.set("pageSize", fallback);
                fallback
            }
        };
        let page = params
            .get("page")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        Self {
            api,
            path: path.to_string(),
            params,
            item_key: item_key.map(str::to_string),
            page,
            page_size,
            buffer: Vec::new().into_iter(),
            done: false,
        }
    }

    /// Number of the page the next request will ask for.
    pub fn next_page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    fn fetch_page(&mut self) -> Result<()> {
        self.params.set("page", self.page);
        debug!(path = %self.path, page = self.page, page_size = self.page_size, "fetching page");

        let data = self.api.get(&self.path, self.params.clone())?;
        let items = take_items(data, self.item_key.as_deref(), &self.path);

        if items.is_empty() || (items.len() as u64) < u64::from(self.page_size) {
            self.done = true;
        } else {
            self.page += 1;
        }
        self.buffer = items.into_iter();
        Ok(())
    }
}

impl<A: Api + ?Sized> Iterator for Pages<'_, A> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            let api = self.api;
            if let Err(err) = api.scoped(|| self.fetch_page()) {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

/// Pulls the item array out of one page of results.
///
/// Looks under `item_key` when given, else under the collection name (the
/// last path segment), else the first array of objects, else the first
/// array. A bare array body is taken as the items themselves.
pub(crate) fn take_items(data: Value, item_key: Option<&str>, path: &str) -> Vec<Value> {
    let mut obj = match data {
        Value::Object(obj) => obj,
        Value::Array(items) => return items,
        _ => return Vec::new(),
    };

    if let Some(key) = item_key {
        return match obj.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
    }

    let key = collection_key(path)
        .filter(|k| obj.get(*k).is_some_and(Value::is_array))
        .map(str::to_string)
        .or_else(|| infer_item_key(&obj));

    match key.and_then(|k| obj.remove(&k)) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// `/api/organisationUnits.json?x=1` -> `organisationUnits`
fn collection_key(path: &str) -> Option<&str> {
    let path = path.split('?').next().unwrap_or(path);
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let segment = segment.split('.').next().unwrap_or(segment);
    (!segment.is_empty()).then_some(segment)
}

fn infer_item_key(obj: &Map<String, Value>) -> Option<String> {
    let arrays = || obj.iter().filter_map(|(k, v)| v.as_array().map(|a| (k, a)));
    arrays()
        .find(|(_, a)| a.first().is_some_and(Value::is_object))
        .or_else(|| arrays().next())
        .map(|(k, _)| k.clone())
}
