//! `/api/sharing`, with helpers that merge into the current sharing
//! instead of overwriting it.
//!
//! Access masks are eight characters: metadata read/write followed by data
//! read/write, then four reserved positions.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::api::{Api, Params};
use crate::error::{Error, Result};
use crate::resources::users::current_user_id;

/// Metadata read/write, data read.
pub const DATA_READ: &str = "rwr-----";
/// Metadata read/write, data read/write. Typical for data capture.
pub const DATA_WRITE: &str = "rwrw----";
pub const META_READ: &str = "r-------";
pub const META_WRITE: &str = "rw------";
pub const NO_ACCESS: &str = "--------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharingDefaults {
    pub public_access: &'static str,
    pub allow_public_access: bool,
    pub allow_external_access: bool,
}

impl Default for SharingDefaults {
    fn default() -> Self {
        Self {
            public_access: META_WRITE,
            allow_public_access: true,
            allow_external_access: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub id: String,
    #[serde(default = "default_entry_access")]
    pub access: String,
}

impl AccessEntry {
    pub fn new(id: impl Into<String>, access: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            access: access.into(),
        }
    }
}

/// The `object` part of a sharing document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingObject {
    #[serde(default = "default_public_access")]
    pub public_access: String,
    #[serde(default)]
    pub user_accesses: Vec<AccessEntry>,
    #[serde(default)]
    pub user_group_accesses: Vec<AccessEntry>,
}

impl Default for SharingObject {
    fn default() -> Self {
        Self {
            public_access: default_public_access(),
            user_accesses: Vec::new(),
            user_group_accesses: Vec::new(),
        }
    }
}

fn default_entry_access() -> String {
    DATA_READ.to_string()
}

fn default_public_access() -> String {
    SharingDefaults::default().public_access.to_string()
}

#[derive(Debug)]
pub struct Sharing<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: Api + ?Sized> Sharing<'a, A> {
    pub(crate) fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub fn get(&self, object_type: &str, object_id: &str) -> Result<Value> {
        self.api.get("/api/sharing", target(object_type, object_id))
    }

    /// Replaces the whole sharing definition of an object.
    pub fn set(
        &self,
        object_type: &str,
        object_id: &str,
        object: &SharingObject,
        defaults: SharingDefaults,
    ) -> Result<Value> {
        let body = json!({
            "meta": {
                "allowPublicAccess": defaults.allow_public_access,
                "allowExternalAccess": defaults.allow_external_access,
            },
            "object": object,
        });
        self.api
            .post("/api/sharing", target(object_type, object_id), &body)
    }

    /// Gives the current user `access`, keeping everyone else's entries.
    /// `public_access` of `None` keeps the current public access.
    pub fn grant_self_access(
        &self,
        object_type: &str,
        object_id: &str,
        access: &str,
        public_access: Option<&str>,
    ) -> Result<Value> {
        let me = current_user_id(self.api)?;
        let mut object = self.current(object_type, object_id)?;
        merge_accesses(&mut object.user_accesses, [me.as_str()], access);
        if let Some(public_access) = public_access {
            object.public_access = public_access.to_string();
        }
        self.set(object_type, object_id, &object, SharingDefaults::default())
    }

    /// Changes only `publicAccess`.
    pub fn set_public_access(&self, object_type: &str, object_id: &str, public_access: &str) -> Result<Value> {
        let mut object = self.current(object_type, object_id)?;
        object.public_access = public_access.to_string();
        self.set(object_type, object_id, &object, SharingDefaults::default())
    }

    /// Gives the same mask to several users and groups. Without
    /// `keep_public`, public access is revoked.
    pub fn grant_access(
        &self,
        object_type: &str,
        object_id: &str,
        user_ids: &[&str],
        user_group_ids: &[&str],
        access: &str,
        keep_public: bool,
    ) -> Result<Value> {
        let mut object = self.current(object_type, object_id)?;
        merge_accesses(&mut object.user_accesses, user_ids.iter().copied(), access);
        merge_accesses(&mut object.user_group_accesses, user_group_ids.iter().copied(), access);
        if !keep_public {
            object.public_access = NO_ACCESS.to_string();
        }
        self.set(object_type, object_id, &object, SharingDefaults::default())
    }

    pub fn grant_self_data_write_on_dataset(&self, dataset_id: &str, access: &str) -> Result<Value> {
        self.grant_self_access("dataSet", dataset_id, access, None)
    }

    /// Gives users and groups data write on a data set and sets its public
    /// access.
    pub fn set_dataset_data_write(
        &self,
        dataset_id: &str,
        user_ids: &[&str],
        user_group_ids: &[&str],
        public_access: &str,
    ) -> Result<Value> {
        let mut object = self.current("dataSet", dataset_id)?;
        merge_accesses(&mut object.user_accesses, user_ids.iter().copied(), DATA_WRITE);
        merge_accesses(&mut object.user_group_accesses, user_group_ids.iter().copied(), DATA_WRITE);
        object.public_access = public_access.to_string();
        self.set("dataSet", dataset_id, &object, SharingDefaults::default())
    }

    fn current(&self, object_type: &str, object_id: &str) -> Result<SharingObject> {
        let mut doc = self.get(object_type, object_id)?;
        match doc.get_mut("object").map(Value::take) {
            Some(Value::Null) | None => Ok(SharingObject::default()),
            Some(object) => serde_json::from_value(object).map_err(|source| Error::Decode {
                path: "/api/sharing".to_string(),
                source,
            }),
        }
    }
}

fn target(object_type: &str, object_id: &str) -> Params {
    Params::new().with("type", object_type).with("id", object_id)
}

/// Sets `access` for each id, updating existing entries in place and
/// appending new ones.
fn merge_accesses<'i>(entries: &mut Vec<AccessEntry>, ids: impl IntoIterator<Item = &'i str>, access: &str) {
    for id in ids {
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.access = access.to_string(),
            None => entries.push(AccessEntry::new(id, access)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_order_and_others() {
        let mut entries = vec![
            AccessEntry::new("u1", DATA_READ),
            AccessEntry::new("u2", DATA_READ),
        ];
        merge_accesses(&mut entries, ["u2", "u3"], DATA_WRITE);
        assert_eq!(
            entries,
            vec![
                AccessEntry::new("u1", DATA_READ),
                AccessEntry::new("u2", DATA_WRITE),
                AccessEntry::new("u3", DATA_WRITE),
            ]
        );
    }

    #[test]
    fn masks_are_eight_characters() {
        for mask in [DATA_READ, DATA_WRITE, META_READ, META_WRITE, NO_ACCESS] {
            assert_eq!(mask.len(), 8, "{mask}");
        }
    }

    #[test]
    fn object_defaults_when_fields_missing() {
        let object: SharingObject = serde_json::from_value(json!({"userAccesses": []})).unwrap();
        assert_eq!(object.public_access, META_WRITE);
        assert!(object.user_group_accesses.is_empty());
    }
}
