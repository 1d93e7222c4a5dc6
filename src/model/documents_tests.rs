use super::*;
use crate::model::ResourcePattern;
use crate::model::WarningKind;

#[test]
fn legacy_user_document_resolves_roles_in_source_db() {
    let doc = json!({
        "_id": "x1",
        "user": "bob",
        "pwd": "5f4dcc3b",
        "roles": ["read", "dbAdmin"],
        "privileges": [{"resource": {"db": "app", "collection": "audit"}, "actions": ["find"]}]
    });
    let (u, warnings) = PrivilegeDocument::parse(&doc, 1, "app").unwrap();
    assert!(warnings.is_empty());
    assert_eq!(u.name, UserName::new("bob", "app"));
    assert_eq!(u.roles, vec![RoleName::new("read", "app"), RoleName::new("dbAdmin", "app")]);
    assert_eq!(u.privileges.len(), 1);
    assert_eq!(u.privileges[0].resource, ResourcePattern::collection("app", "audit"));
    assert_eq!(u.credentials, Some(json!({"MONGODB-CR": "5f4dcc3b"})));
}

#[test]
fn legacy_other_db_roles_only_for_admin_users() {
    let doc = json!({"user": "ops", "pwd": "h", "roles": [], "otherDBRoles": {"app": ["readWrite"]}});
    let (admin_user, _) = PrivilegeDocument::parse(&doc, 1, "admin").unwrap();
    assert_eq!(admin_user.roles, vec![RoleName::new("readWrite", "app")]);
    let (app_user, _) = PrivilegeDocument::parse(&doc, 1, "app").unwrap();
    assert!(app_user.roles.is_empty());
}

#[test]
fn unified_user_document_ignores_inline_privileges() {
    let doc = json!({
        "_id": "app.alice",
        "user": "alice",
        "db": "app",
        "credentials": {"SCRAM-SHA-1": {"iterationCount": 10000}},
        "roles": [{"role": "admin", "db": "app"}, {"role": "admin", "db": "app"}],
        "privileges": [{"resource": {"db": "app"}, "actions": ["find"]}]
    });
    let (u, warnings) = PrivilegeDocument::parse(&doc, 2, "admin").unwrap();
    assert!(warnings.is_empty());
    assert_eq!(u.name, UserName::new("alice", "app"));
    assert_eq!(u.roles, vec![RoleName::new("admin", "app")]);
    assert!(u.privileges.is_empty());
    assert!(u.credentials.is_some());
}

#[test]
fn bad_role_reference_is_a_warning_not_an_error() {
    let doc = json!({"user": "alice", "db": "app", "credentials": {"x": 1}, "roles": [{"db": "app"}, {"role": "read", "db": "app"}]});
    let (u, warnings) = PrivilegeDocument::parse(&doc, 2, "admin").unwrap();
    assert_eq!(u.roles, vec![RoleName::new("read", "app")]);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::MalformedRoleReference);
    assert_eq!(warnings[0].subject, "alice@app");
}

#[test]
fn missing_identity_is_fatal() {
    assert!(PrivilegeDocument::parse(&json!({"db": "app"}), 2, "admin").is_err());
    assert!(PrivilegeDocument::parse(&json!({"user": "alice"}), 2, "admin").is_err());
    assert!(PrivilegeDocument::parse(&json!(["user"]), 1, "app").is_err());
    assert!(RoleDocument::parse(&json!({"role": "r"})).is_err());
}

#[test]
fn external_users_do_not_expect_credentials() {
    let doc = json!({"user": "CN=svc", "db": "$external", "roles": []});
    let (u, _) = PrivilegeDocument::parse(&doc, 2, "admin").unwrap();
    assert!(u.credentials.is_none());
    assert!(!u.expects_credentials());
}

#[test]
fn role_document_round_trips_through_to_document() {
    let doc = json!({
        "_id": "app.admin",
        "role": "admin",
        "db": "app",
        "roles": [{"role": "readWrite", "db": "app"}],
        "privileges": [{"resource": {"db": "app", "collection": ""}, "actions": ["dropCollection"]}]
    });
    let (r, warnings) = RoleDocument::parse(&doc).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(r.to_document(), doc);
}

#[test]
fn malformed_privilege_in_role_is_skipped() {
    let doc = json!({"role": "r", "db": "app", "privileges": [{"resource": {"db": "app"}, "actions": []}]});
    let (r, warnings) = RoleDocument::parse(&doc).unwrap();
    assert!(r.privileges.is_empty());
    assert_eq!(warnings[0].kind, WarningKind::MalformedPrivilege);
}
