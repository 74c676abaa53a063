mod common;

use common::FakeApi;
use dhis2::resources::{AccessEntry, DataValue, OrgUnitScopes, SharingDefaults, SharingObject};
use dhis2::{Api, Calendar, DATA_READ, DATA_WRITE, Error, META_WRITE, Method, NO_ACCESS, Params};
use serde_json::{Value, json};

fn body(api: &FakeApi, method: Method, path: &str) -> Value {
    api.last(method, path)
        .and_then(|r| r.body)
        .unwrap_or_else(|| panic!("no {method} {path} with a body"))
}

fn user_with_scopes() -> Value {
    json!({
        "organisationUnits": [{"id": "A"}, {"id": "B"}, {"id": "C"}],
        "dataViewOrganisationUnits": [{"id": "V1"}],
        "teiSearchOrganisationUnits": []
    })
}

fn users_api() -> FakeApi {
    FakeApi::new()
        .respond(Method::Get, "/api/users/U1", user_with_scopes())
        .respond(Method::Get, "/api/me", json!({"id": "Ume"}))
        .respond(Method::Get, "/api/users/Ume", user_with_scopes())
        .on(Method::Patch, "/api/users/U1", |_| Ok(json!({"status": "OK"})))
        .on(Method::Patch, "/api/users/Ume", |_| Ok(json!({"status": "OK"})))
}

#[test]
fn add_scopes_skips_existing_ids() {
    let api = users_api();
    let scopes = OrgUnitScopes::new().capture(["B", "D"]).view(["V2"]);
    let reply = api.users().add_org_unit_scopes("U1", &scopes, true).unwrap();

    assert_eq!(reply["status"], "OK");
    assert_eq!(
        body(&api, Method::Patch, "/api/users/U1"),
        json!([
            {"op": "add", "path": "/organisationUnits/-", "value": {"id": "D"}},
            {"op": "add", "path": "/dataViewOrganisationUnits/-", "value": {"id": "V2"}},
        ])
    );
    let read = api.last(Method::Get, "/api/users/U1").unwrap();
    assert!(read.params.get("fields").unwrap().contains("teiSearchOrganisationUnits[id]"));
}

#[test]
fn add_without_dedupe_does_not_read_user() {
    let api = users_api();
    let scopes = OrgUnitScopes::new().capture(["A"]);
    api.users().add_org_unit_scopes("U1", &scopes, false).unwrap();
    assert_eq!(api.count(Method::Get, "/api/users/U1"), 0);
    assert_eq!(
        body(&api, Method::Patch, "/api/users/U1"),
        json!([{"op": "add", "path": "/organisationUnits/-", "value": {"id": "A"}}])
    );
}

#[test]
fn nothing_to_add_is_noop() {
    let api = users_api();
    let scopes = OrgUnitScopes::new().capture(["A", "C"]);
    let reply = api.users().add_org_unit_scopes("U1", &scopes, true).unwrap();
    assert_eq!(reply, json!({"status": "NOOP"}));
    assert_eq!(api.count(Method::Patch, "/api/users/U1"), 0);
}

#[test]
fn replace_only_given_scopes() {
    let api = users_api();
    let scopes = OrgUnitScopes::new().view(["V9"]).tei(Vec::<String>::new());
    api.users().replace_org_unit_scopes("U1", &scopes).unwrap();
    assert_eq!(
        body(&api, Method::Patch, "/api/users/U1"),
        json!([
            {"op": "replace", "path": "/dataViewOrganisationUnits", "value": [{"id": "V9"}]},
            {"op": "replace", "path": "/teiSearchOrganisationUnits", "value": []},
        ])
    );
}

#[test]
fn remove_filters_current_list() {
    let api = users_api();
    let scopes = OrgUnitScopes::new().capture(["B", "Z"]);
    api.users().remove_org_unit_scopes("U1", &scopes).unwrap();
    assert_eq!(
        body(&api, Method::Patch, "/api/users/U1"),
        json!([{"op": "replace", "path": "/organisationUnits", "value": [{"id": "A"}, {"id": "C"}]}])
    );
}

#[test]
fn my_scopes_resolve_current_user() {
    let api = users_api();
    api.users()
        .add_my_org_unit_scopes(&OrgUnitScopes::new().tei(["T1"]), true)
        .unwrap();
    assert_eq!(api.last(Method::Get, "/api/me").unwrap().params.get("fields"), Some("id"));
    assert_eq!(api.count(Method::Get, "/api/users/Ume"), 1);
    assert_eq!(api.count(Method::Patch, "/api/users/Ume"), 1);
}

#[test]
fn me_without_id_is_an_error() {
    let api = FakeApi::new().respond(Method::Get, "/api/me", json!({"username": "admin"}));
    let err = api
        .users()
        .replace_my_org_unit_scopes(&OrgUnitScopes::new().capture(["A"]))
        .unwrap_err();
    assert!(matches!(err, Error::CurrentUser));
}

fn sharing_api(current: Value) -> FakeApi {
    FakeApi::new()
        .respond(Method::Get, "/api/me", json!({"id": "Ume"}))
        .respond(Method::Get, "/api/sharing", current)
        .on(Method::Post, "/api/sharing", |_| Ok(json!({"status": "OK"})))
}

fn current_sharing() -> Value {
    json!({
        "meta": {"allowPublicAccess": true},
        "object": {
            "id": "ds1",
            "publicAccess": "r-------",
            "userAccesses": [
                {"id": "u1", "access": DATA_READ, "displayName": "One"},
                {"id": "Ume", "access": DATA_READ}
            ],
            "userGroupAccesses": [{"id": "g1", "access": DATA_READ}]
        }
    })
}

#[test]
fn grant_self_access_merges_by_id() {
    let api = sharing_api(current_sharing());
    api.sharing()
        .grant_self_access("dataSet", "ds1", DATA_WRITE, None)
        .unwrap();

    let post = api.last(Method::Post, "/api/sharing").unwrap();
    assert_eq!(post.params.get("type"), Some("dataSet"));
    assert_eq!(post.params.get("id"), Some("ds1"));
    assert_eq!(
        post.body.unwrap(),
        json!({
            "meta": {"allowPublicAccess": true, "allowExternalAccess": false},
            "object": {
                "publicAccess": "r-------",
                "userAccesses": [
                    {"id": "u1", "access": DATA_READ},
                    {"id": "Ume", "access": DATA_WRITE}
                ],
                "userGroupAccesses": [{"id": "g1", "access": DATA_READ}]
            }
        })
    );
}

#[test]
fn grant_access_can_revoke_public() {
    let api = sharing_api(current_sharing());
    api.sharing()
        .grant_access("dataSet", "ds1", &["u2"], &["g1", "g2"], DATA_WRITE, false)
        .unwrap();

    let sent = body(&api, Method::Post, "/api/sharing");
    let object = &sent["object"];
    assert_eq!(object["publicAccess"], NO_ACCESS);
    assert_eq!(object["userAccesses"].as_array().unwrap().len(), 3);
    assert_eq!(
        object["userGroupAccesses"],
        json!([{"id": "g1", "access": DATA_WRITE}, {"id": "g2", "access": DATA_WRITE}])
    );
}

#[test]
fn set_public_access_keeps_entries() {
    let api = sharing_api(current_sharing());
    api.sharing()
        .set_public_access("dataSet", "ds1", "rw------")
        .unwrap();
    let sent = body(&api, Method::Post, "/api/sharing");
    let object = &sent["object"];
    assert_eq!(object["publicAccess"], "rw------");
    assert_eq!(object["userAccesses"].as_array().unwrap().len(), 2);
}

#[test]
fn dataset_data_write_on_unshared_object() {
    let api = sharing_api(json!({"meta": {}}));
    api.sharing()
        .set_dataset_data_write("ds1", &["u5"], &[], META_WRITE)
        .unwrap();
    let sent = body(&api, Method::Post, "/api/sharing");
    let object = &sent["object"];
    assert_eq!(object["userAccesses"], json!([{"id": "u5", "access": DATA_WRITE}]));
    assert_eq!(object["userGroupAccesses"], json!([]));
    assert_eq!(object["publicAccess"], META_WRITE);
}

#[test]
fn explicit_set_uses_given_defaults() {
    let api = sharing_api(json!({}));
    let object = SharingObject {
        public_access: NO_ACCESS.to_string(),
        user_accesses: vec![AccessEntry::new("u1", DATA_READ)],
        user_group_accesses: vec![],
    };
    let defaults = SharingDefaults {
        allow_external_access: true,
        ..SharingDefaults::default()
    };
    api.sharing().set("dataElement", "de1", &object, defaults).unwrap();
    let sent = body(&api, Method::Post, "/api/sharing");
    assert_eq!(sent["meta"]["allowExternalAccess"], true);
    assert_eq!(sent["object"]["publicAccess"], NO_ACCESS);
    assert_eq!(api.count(Method::Get, "/api/sharing"), 0);
}

#[test]
fn single_data_value_helpers() {
    let api = FakeApi::new()
        .on(Method::Post, "/api/dataValues", |_| Ok(json!({})))
        .respond(Method::Get, "/api/dataValues", json!(["7"]))
        .on(Method::Delete, "/api/dataValues", |_| Ok(json!({})));

    let values = api.data_values();
    values
        .set(&DataValue::new("de1", "202401", "ou1", 7).with_attribute_option_combo("aoc"))
        .unwrap();
    assert_eq!(
        body(&api, Method::Post, "/api/dataValues"),
        json!({
            "dataElement": "de1",
            "period": "202401",
            "orgUnit": "ou1",
            "attributeOptionCombo": "aoc",
            "value": "7"
        })
    );

    values
        .get("de1", "202401", "ou1", Params::from([("co", "coc")]))
        .unwrap();
    let get = api.last(Method::Get, "/api/dataValues").unwrap();
    assert_eq!(get.params.get("de"), Some("de1"));
    assert_eq!(get.params.get("co"), Some("coc"));

    values.delete("de1", "202401", "ou1", Params::new()).unwrap();
    assert_eq!(api.count(Method::Delete, "/api/dataValues"), 1);
}

#[test]
fn data_value_sets() {
    let api = FakeApi::new()
        .respond(Method::Get, "/api/dataValueSets", json!({"dataValues": []}))
        .on(Method::Post, "/api/dataValueSets", |_| Ok(json!({"status": "SUCCESS"})));
    let payload = json!({"dataSet": "ds1", "period": "202401", "orgUnit": "ou1", "dataValues": []});

    let reply = api.data_values().post_set(&payload).unwrap();
    assert_eq!(reply["status"], "SUCCESS");
    assert_eq!(body(&api, Method::Post, "/api/dataValueSets"), payload);

    api.data_values()
        .get_set(Params::from([("dataSet", "ds1"), ("period", "202401")]))
        .unwrap();
    assert_eq!(api.count(Method::Get, "/api/dataValueSets"), 1);
}

#[test]
fn metadata_crud_paths() {
    let api = FakeApi::new()
        .respond(Method::Get, "/api/dataSets/ds1", json!({"id": "ds1"}))
        .on(Method::Post, "/api/dataElements", |_| Ok(json!({"httpStatus": "Created"})))
        .on(Method::Put, "/api/dataElements/de1", |_| Ok(json!({})))
        .on(Method::Delete, "/api/organisationUnits/ou1", |_| Ok(json!({})));

    api.data_sets().get("ds1", Some("id,periodType")).unwrap();
    assert_eq!(
        api.last(Method::Get, "/api/dataSets/ds1").unwrap().params.get("fields"),
        Some("id,periodType")
    );
    api.data_elements().create(&json!({"name": "ANC 1"})).unwrap();
    api.data_elements().update("de1", &json!({"name": "ANC 1st"})).unwrap();
    api.organisation_units().delete("ou1").unwrap();
    assert_eq!(api.requests().len(), 4);
}

#[test]
fn org_unit_tree_and_geojson() {
    let api = FakeApi::new()
        .respond(
            Method::Get,
            "/api/organisationUnits",
            json!({"organisationUnits": [{"id": "root", "children": []}]}),
        )
        .respond(Method::Get, "/api/organisationUnits/ou1.geojson", json!({"type": "FeatureCollection"}))
        .respond(Method::Get, "/api/organisationUnits.geojson", json!({"type": "FeatureCollection"}));

    let tree = api.organisation_units().tree(None, Some(1)).unwrap();
    assert_eq!(tree["organisationUnits"][0]["id"], "root");
    let list = api.last(Method::Get, "/api/organisationUnits").unwrap();
    assert_eq!(list.params.get("level"), Some("1"));
    assert_eq!(
        list.params.get("fields"),
        Some("id,displayName,level,children[id,displayName,level]")
    );

    let units = api.organisation_units();
    units.geojson_subtree("ou1", Params::new()).unwrap();
    assert_eq!(
        api.last(Method::Get, "/api/organisationUnits/ou1.geojson").unwrap().params.get("includeDescendants"),
        Some("true")
    );
    units.geojson_children("ou1", Params::new()).unwrap();
    assert_eq!(
        api.last(Method::Get, "/api/organisationUnits/ou1.geojson").unwrap().params.get("includeChildren"),
        Some("true")
    );
    units.geojson_by_level(3, Params::new()).unwrap();
    assert_eq!(
        api.last(Method::Get, "/api/organisationUnits.geojson").unwrap().params.get("level"),
        Some("3")
    );
}

#[test]
fn system_calendar_and_analytics() {
    let api = FakeApi::new()
        .respond(Method::Get, "/api/system/info", json!({"version": "2.40", "calendar": "ethiopian"}))
        .respond(Method::Get, "/api/analytics/rawData", json!({"rows": []}));

    assert_eq!(api.system().calendar().unwrap(), Calendar::Ethiopian);
    api.analytics()
        .get("analytics/rawData", Params::new().with("dimension", "dx:de1").with("dimension", "pe:LAST_12_MONTHS"))
        .unwrap();
    let req = api.last(Method::Get, "/api/analytics/rawData").unwrap();
    assert_eq!(req.params.get_all("dimension").count(), 2);
}

#[test]
fn system_without_calendar_is_iso() {
    let api = FakeApi::new().respond(Method::Get, "/api/system/info", json!({"version": "2.40"}));
    assert_eq!(api.system().calendar().unwrap(), Calendar::Iso8601);
}
