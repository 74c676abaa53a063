use serde_json::Value;

use crate::api::{Api, Params};
use crate::error::Result;

#[derive(Debug)]
pub struct Analytics<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: Api + ?Sized> Analytics<'a, A> {
    pub(crate) fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Queries `/api/{table}`, e.g. `analytics` or `analytics/rawData`.
    /// `dimension` and `filter` may be repeated in `params`.
    pub fn get(&self, table: &str, params: Params) -> Result<Value> {
        let table = table.trim_start_matches('/');
        let table = table.strip_prefix("api/").unwrap_or(table);
        self.api.get(&format!("/api/{table}"), params)
    }
}
