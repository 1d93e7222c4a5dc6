use super::*;

#[test]
fn numeric_code_mapping() {
    assert_eq!(AuthzError::user_not_found("alice@app").code(), 11);
    assert_eq!(AuthzError::role_not_found("admin@app").code(), 31);
    assert_eq!(AuthzError::no_match("nothing").code(), 47);
    assert_eq!(AuthzError::duplicate_key("dup").code(), 11000);
    assert_eq!(AuthzError::ns_exists("x.y").code(), 48);
    assert_eq!(AuthzError::ns_not_found("x.y").code(), 26);
    assert_eq!(AuthzError::parse("bad").code(), 9);
    assert_eq!(AuthzError::bad_value("bad").code(), 2);
}

#[test]
fn display_carries_code_and_message() {
    let e = AuthzError::user_not_found("Could not find user alice@app");
    assert_eq!(e.to_string(), "user_not_found: Could not find user alice@app");
    assert_eq!(e.code_str(), "user_not_found");
    assert_eq!(e.message(), "Could not find user alice@app");
}

#[test]
fn not_found_family() {
    assert!(AuthzError::user_not_found("u").is_not_found());
    assert!(AuthzError::role_not_found("r").is_not_found());
    assert!(AuthzError::no_match("q").is_not_found());
    assert!(!AuthzError::duplicate_key("k").is_not_found());
    assert!(!AuthzError::storage("disk").is_not_found());
}

#[test]
fn anyhow_maps_to_storage_verbatim() {
    let e: AuthzError = anyhow::anyhow!("disk full").into();
    assert_eq!(e, AuthzError::storage("disk full"));
}

#[test]
fn serializes_as_tagged_enum() {
    let v = serde_json::to_value(AuthzError::role_not_found("r@db")).unwrap();
    assert_eq!(v["type"], "role_not_found");
    assert_eq!(v["message"], "r@db");
}
