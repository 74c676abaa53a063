//! `/api/users`, with JSON Patch helpers for organisation-unit scopes.
//!
//! A user has three scope lists:
//! - capture: `/organisationUnits`
//! - view: `/dataViewOrganisationUnits`
//! - tracker search: `/teiSearchOrganisationUnits`

use std::collections::HashSet;

use serde_json::{Value, json};

use crate::api::{Api, Params};
use crate::error::{Error, Result};
use crate::paging::Pages;

const SCOPE_FIELDS: &str =
    "organisationUnits[id],dataViewOrganisationUnits[id],teiSearchOrganisationUnits[id]";

#[derive(Debug, Clone, Copy)]
enum Scope {
    Capture,
    View,
    Tei,
}

impl Scope {
    const ALL: [Scope; 3] = [Scope::Capture, Scope::View, Scope::Tei];

    fn field(self) -> &'static str {
        match self {
            Scope::Capture => "organisationUnits",
            Scope::View => "dataViewOrganisationUnits",
            Scope::Tei => "teiSearchOrganisationUnits",
        }
    }
}

/// Org-unit ids per scope. `None` leaves that scope alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgUnitScopes {
    pub capture: Option<Vec<String>>,
    pub view: Option<Vec<String>>,
    pub tei: Option<Vec<String>>,
}

impl OrgUnitScopes {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn capture<I: IntoIterator<Item = S>, S: Into<String>>(mut self, ids: I) -> Self {
        self.capture = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn view<I: IntoIterator<Item = S>, S: Into<String>>(mut self, ids: I) -> Self {
        self.view = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn tei<I: IntoIterator<Item = S>, S: Into<String>>(mut self, ids: I) -> Self {
        self.tei = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    fn ids(&self, scope: Scope) -> Option<&[String]> {
        match scope {
            Scope::Capture => self.capture.as_deref(),
            Scope::View => self.view.as_deref(),
            Scope::Tei => self.tei.as_deref(),
        }
    }
}

#[derive(Debug)]
pub struct Users<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: Api + ?Sized> Users<'a, A> {
    pub(crate) fn new(api: &'a A) -> Self {
        Self { api }
    }

    pub fn list(&self, params: Params) -> Pages<'a, A> {
        self.api.list_paged("/api/users", params, None, Some("users"))
    }

    pub fn get(&self, uid: &str, fields: Option<&str>) -> Result<Value> {
        self.api
            .get(&format!("/api/users/{uid}"), Params::new().with_fields(fields))
    }

    /// The authenticated user (`/api/me`).
    pub fn me(&self, fields: Option<&str>) -> Result<Value> {
        self.api.get("/api/me", Params::new().with_fields(fields))
    }

    /// Appends org units to the given scopes. With `dedupe`, ids already
    /// present are skipped.
    pub fn add_org_unit_scopes(&self, uid: &str, scopes: &OrgUnitScopes, dedupe: bool) -> Result<Value> {
        let current = if dedupe {
            Some(self.get(uid, Some(SCOPE_FIELDS))?)
        } else {
            None
        };

        let mut ops = Vec::new();
        for scope in Scope::ALL {
            let Some(ids) = scope_ids(scopes, scope) else {
                continue;
            };
            let existing = current
                .as_ref()
                .map(|cur| id_set(cur, scope))
                .unwrap_or_default();
            for id in ids.iter().filter(|id| !existing.contains(id.as_str())) {
                ops.push(json!({
                    "op": "add",
                    "path": format!("/{}/-", scope.field()),
                    "value": {"id": id},
                }));
            }
        }
        self.apply(uid, ops)
    }

    /// Replaces only the scopes that are `Some`, even with an empty list.
    pub fn replace_org_unit_scopes(&self, uid: &str, scopes: &OrgUnitScopes) -> Result<Value> {
        let ops = Scope::ALL
            .into_iter()
            .filter_map(|scope| {
                let ids = scopes.ids(scope)?;
                Some(json!({
                    "op": "replace",
                    "path": format!("/{}", scope.field()),
                    "value": id_objects(ids.iter().map(String::as_str)),
                }))
            })
            .collect();
        self.apply(uid, ops)
    }

    /// Removes ids from the given scopes by reading the current lists and
    /// replacing them filtered.
    pub fn remove_org_unit_scopes(&self, uid: &str, scopes: &OrgUnitScopes) -> Result<Value> {
        let current = self.get(uid, Some(SCOPE_FIELDS))?;

        let mut ops = Vec::new();
        for scope in Scope::ALL {
            let Some(remove) = scope_ids(scopes, scope) else {
                continue;
            };
            let keep = current_ids(&current, scope)
                .filter(|id| !remove.iter().any(|r| r == *id))
                .collect::<Vec<_>>();
            ops.push(json!({
                "op": "replace",
                "path": format!("/{}", scope.field()),
                "value": id_objects(keep),
            }));
        }
        self.apply(uid, ops)
    }

    pub fn add_my_org_unit_scopes(&self, scopes: &OrgUnitScopes, dedupe: bool) -> Result<Value> {
        self.add_org_unit_scopes(&self.me_id()?, scopes, dedupe)
    }

    pub fn replace_my_org_unit_scopes(&self, scopes: &OrgUnitScopes) -> Result<Value> {
        self.replace_org_unit_scopes(&self.me_id()?, scopes)
    }

    pub fn remove_my_org_unit_scopes(&self, scopes: &OrgUnitScopes) -> Result<Value> {
        self.remove_org_unit_scopes(&self.me_id()?, scopes)
    }

    /// Id of the authenticated user.
    pub fn me_id(&self) -> Result<String> {
        current_user_id(self.api)
    }

    fn apply(&self, uid: &str, ops: Vec<Value>) -> Result<Value> {
        if ops.is_empty() {
            return Ok(json!({"status": "NOOP"}));
        }
        self.api
            .patch(&format!("/api/users/{uid}"), Params::new(), &ops)
    }
}

pub(crate) fn current_user_id<A: Api + ?Sized>(api: &A) -> Result<String> {
    let me = api.get("/api/me", Params::new().with("fields", "id"))?;
    me.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(Error::CurrentUser)
}

/// Non-empty id list for `scope`.
fn scope_ids(scopes: &OrgUnitScopes, scope: Scope) -> Option<&[String]> {
    scopes.ids(scope).filter(|ids| !ids.is_empty())
}

fn current_ids(user: &Value, scope: Scope) -> impl Iterator<Item = &str> {
    user.get(scope.field())
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("id").and_then(Value::as_str))
}

fn id_set(user: &Value, scope: Scope) -> HashSet<&str> {
    current_ids(user, scope).collect()
}

fn id_objects<'s>(ids: impl IntoIterator<Item = &'s str>) -> Value {
    Value::Array(ids.into_iter().map(|id| json!({"id": id})).collect())
}
