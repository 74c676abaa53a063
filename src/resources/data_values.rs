use serde::Serialize;
use serde_json::Value;

use crate::api::{Api, Params};
use crate::error::Result;

/// A single value for `POST /api/dataValues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValue {
    pub data_element: String,
    pub period: String,
    pub org_unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_option_combo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_option_combo: Option<String>,
    pub value: String,
}

impl DataValue {
    pub fn new(
        data_element: impl Into<String>,
        period: impl Into<String>,
        org_unit: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            data_element: data_element.into(),
            period: period.into(),
            org_unit: org_unit.into(),
            category_option_combo: None,
            attribute_option_combo: None,
            value: value.to_string(),
        }
    }

    #[must_use]
    pub fn with_category_option_combo(mut self, coc: impl Into<String>) -> Self {
        self.category_option_combo = Some(coc.into());
        self
    }

    #[must_use]
    pub fn with_attribute_option_combo(mut self, aoc: impl Into<String>) -> Self {
        self.attribute_option_combo = Some(aoc.into());
        self
    }
}

/// `/api/dataValues` and `/api/dataValueSets`.
///
/// Single-value reads and deletes use the short query keys `de`, `pe`,
/// `ou` (plus `co`/`ao` in `extra`).
#[derive(Debug)]
pub struct DataValues<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: Api + ?Sized> DataValues<'a, A> {
    pub(crate) fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub fn get(&self, de: &str, pe: &str, ou: &str, extra: Params) -> Result<Value> {
        self.api.get("/api/dataValues", key_params(de, pe, ou, extra))
    }

    pub fn set(&self, value: &DataValue) -> Result<Value> {
        self.api.post("/api/dataValues", Params::new(), value)
    }

    pub fn delete(&self, de: &str, pe: &str, ou: &str, extra: Params) -> Result<Value> {
        self.api
            .delete("/api/dataValues", key_params(de, pe, ou, extra))
    }

    pub fn get_set(&self, params: Params) -> Result<Value> {
        self.api.get("/api/dataValueSets", params)
    }

    pub fn post_set<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Value> {
        self.api.post("/api/dataValueSets", Params::new(), payload)
    }
}

fn key_params(de: &str, pe: &str, ou: &str, extra: Params) -> Params {
    let mut params = Params::new().with("de", de).with("pe", pe).with("ou", ou);
    for (k, v) in extra.iter() {
        params.push(k, v);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_is_stringified_and_optional_combos_skipped() {
        let value = DataValue::new("de1", "202401", "ou1", 12.5).with_category_option_combo("coc1");
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({
                "dataElement": "de1",
                "period": "202401",
                "orgUnit": "ou1",
                "categoryOptionCombo": "coc1",
                "value": "12.5"
            })
        );
    }

    #[test]
    fn extra_params_follow_keys() {
        let params = key_params("de1", "202401", "ou1", Params::from([("co", "c1")]));
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(
            pairs,
            [("de", "de1"), ("pe", "202401"), ("ou", "ou1"), ("co", "c1")]
        );
    }
}
