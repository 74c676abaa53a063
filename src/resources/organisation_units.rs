use serde::Serialize;
use serde_json::{Value, json};

use crate::api::{Api, Params};
use crate::error::Result;
use crate::paging::Pages;
use crate::resources::Collection;

const ENDPOINT: &str = "/api/organisationUnits";
const TREE_FIELDS: &str = "id,displayName,level";

/// `/api/organisationUnits`, including the hierarchy and GeoJSON views.
#[derive(Debug)]
pub struct OrganisationUnits<'a, A: ?Sized> {
    api: &'a A,
    units: Collection<'a, A>,
}

impl<'a, A: Api + ?Sized> OrganisationUnits<'a, A> {
    pub(crate) fn new(api: &'a A) -> Self {
        Self {
            api,
            units: Collection::new(api, ENDPOINT, "organisationUnits"),
        }
    }

    pub fn list(&self, params: Params) -> Pages<'a, A> {
        self.units.list(params)
    }

    pub fn get(&self, uid: &str, fields: Option<&str>) -> Result<Value> {
        self.units.get(uid, fields)
    }

    pub fn create<T: Serialize + ?Sized>(&self, payload: &T) -> Result<Value> {
        self.units.create(payload)
    }

    pub fn update<T: Serialize + ?Sized>(&self, uid: &str, payload: &T) -> Result<Value> {
        self.units.update(uid, payload)
    }

    pub fn delete(&self, uid: &str) -> Result<Value> {
        self.units.delete(uid)
    }

    /// Hierarchy below `root`, or below every level-1 unit when `root` is
    /// `None`. `levels` bounds how many `children` levels are expanded
    /// (default 2).
    ///
    /// Without a root the result is `{"organisationUnits": [...]}`.
    pub fn tree(&self, root: Option<&str>, levels: Option<u32>) -> Result<Value> {
        let fields = tree_fields(levels.unwrap_or(2));
        match root {
            Some(uid) => self.units.get(uid, Some(fields.as_str())),
            None => {
                let params = Params::new().with("level", 1).with("fields", fields);
                let roots = self.units.list(params).collect::<Result<Vec<_>>>()?;
                Ok(json!({ "organisationUnits": roots }))
            }
        }
    }

    /// `/api/organisationUnits.geojson`
    pub fn geojson(&self, params: Params) -> Result<Value> {
        self.api.get(&format!("{ENDPOINT}.geojson"), params)
    }

    /// A single unit as a GeoJSON feature collection.
    pub fn geojson_one(&self, uid: &str, params: Params) -> Result<Value> {
        self.api.get(&format!("{ENDPOINT}/{uid}.geojson"), params)
    }

    pub fn geojson_by_level(&self, level: u32, mut params: Params) -> Result<Value> {
        params.set("level", level);
        self.geojson(params)
    }

    /// Direct children of `parent`.
    pub fn geojson_children(&self, parent: &str, mut params: Params) -> Result<Value> {
        params.set("includeChildren", true);
        self.geojson_one(parent, params)
    }

    /// `root` and every unit below it.
    pub fn geojson_subtree(&self, root: &str, mut params: Params) -> Result<Value> {
        params.set("includeDescendants", true);
        self.geojson_one(root, params)
    }
}

/// `id,displayName,level,children[id,displayName,level,children[...]]`
fn tree_fields(levels: u32) -> String {
    let mut fields = TREE_FIELDS.to_string();
    for _ in 0..levels {
        fields = format!("{TREE_FIELDS},children[{fields}]");
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_fields_nest() {
        assert_eq!(tree_fields(0), "id,displayName,level");
        assert_eq!(
            tree_fields(2),
            "id,displayName,level,children[id,displayName,level,children[id,displayName,level]]"
        );
    }
}
