use serde_json::Value;

use crate::api::{Api, Params};
use crate::calendar::Calendar;
use crate::error::Result;

#[derive(Debug)]
pub struct System<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: Api + ?Sized> System<'a, A> {
    pub(crate) fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// `/api/system/info`
    pub fn info(&self) -> Result<Value> {
        self.api.get("/api/system/info", Params::new())
    }

    /// The server's calendar. Servers that do not report one run ISO 8601.
    pub fn calendar(&self) -> Result<Calendar> {
        let info = self.info()?;
        match info.get("calendar").and_then(Value::as_str) {
            Some(name) => name.parse(),
            None => Ok(Calendar::Iso8601),
        }
    }
}
