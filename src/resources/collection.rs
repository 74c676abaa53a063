use serde::Serialize;
use serde_json::Value;

use crate::api::{Api, Params};
use crate::error::Result;
use crate::paging::Pages;

/// CRUD over a metadata collection such as `/api/dataElements`.
#[derive(Debug)]
pub struct Collection<'a, A: ?Sized> {
    api: &'a A,
    endpoint: &'static str,
    item_key: &'static str,
}

impl<'a, A: Api + ?Sized> Collection<'a, A> {
    pub(crate) fn new(api: &'a A, endpoint: &'static str, item_key: &'static str) -> Self {
        Self {
            api,
            endpoint,
            item_key,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    /// Lazily pages through the collection.
    pub fn list(&self, params: Params) -> Pages<'a, A> {
        self.api
            .list_paged(self.endpoint, params, None, Some(self.item_key))
    }

    pub fn get(&self, uid: &str, fields: Option<&str>) -> Result<Value> {
        self.api
            .get(&self.item_path(uid), Params::new().with_fields(fields))
    }

    pub fn create<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Value> {
        self.api.post(self.endpoint, Params::new(), payload)
    }

    pub fn update<T: Serialize + ?Sized>(&self, uid: &str, payload: &T) -> Result<Value> {
        self.api.put(&self.item_path(uid), Params::new(), payload)
    }

    pub fn delete(&self, uid: &str) -> Result<Value> {
        self.api.delete(&self.item_path(uid), Params::new())
    }

    pub(crate) fn item_path(&self, uid: &str) -> String {
        format!("{}/{}", self.endpoint, uid)
    }
}
