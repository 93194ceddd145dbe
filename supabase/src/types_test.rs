use super::*;

fn user() -> User {
    User { id: Uuid::nil(), email: Some("ada@example.org".into()), role: Some(Role::Ngo) }
}

// =============================================================================
// Role
// =============================================================================

#[test]
fn role_parse_known_values() {
    assert_eq!(Role::parse("individual"), Some(Role::Individual));
    assert_eq!(Role::parse("ngo"), Some(Role::Ngo));
    assert_eq!(Role::parse("organization"), Some(Role::Organization));
}

#[test]
fn role_parse_is_case_insensitive_and_trimmed() {
    assert_eq!(Role::parse("  NGO "), Some(Role::Ngo));
}

#[test]
fn role_parse_unknown_is_none() {
    assert_eq!(Role::parse("admin"), None);
    assert_eq!(Role::parse(""), None);
}

#[test]
fn role_serializes_lowercase() {
    let json = serde_json::to_string(&Role::Organization).unwrap();
    assert_eq!(json, "\"organization\"");
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn session_expiry_in_millis() {
    let session = Session { access_token: "a".into(), refresh_token: "r".into(), expires_at: 1_700_000_000, user: user() };
    assert_eq!(session.expires_at_ms(), 1_700_000_000_000);
}

#[test]
fn session_expired_at_boundary() {
    let session = Session { access_token: "a".into(), refresh_token: "r".into(), expires_at: 100, user: user() };
    assert!(!session.is_expired_at(99_999));
    assert!(session.is_expired_at(100_000));
    assert!(session.is_expired_at(100_001));
}

// =============================================================================
// Profile::from_row
// =============================================================================

#[test]
fn profile_from_complete_row() {
    let id = Uuid::new_v4();
    let row = serde_json::json!({ "id": id.to_string(), "role": "ngo", "profile_completed": true });
    let profile = Profile::from_row(&row).unwrap();
    assert_eq!(profile.id, id);
    assert_eq!(profile.role, Some(Role::Ngo));
    assert!(profile.profile_completed);
}

#[test]
fn profile_missing_flag_reads_incomplete() {
    let row = serde_json::json!({ "id": Uuid::new_v4().to_string(), "role": "individual" });
    let profile = Profile::from_row(&row).unwrap();
    assert!(!profile.profile_completed);
}

#[test]
fn profile_non_boolean_flag_reads_incomplete() {
    let row = serde_json::json!({ "id": Uuid::new_v4().to_string(), "profile_completed": "yes" });
    let profile = Profile::from_row(&row).unwrap();
    assert!(!profile.profile_completed);
    assert!(profile.role.is_none());
}

#[test]
fn profile_without_id_is_none() {
    let row = serde_json::json!({ "profile_completed": true });
    assert!(Profile::from_row(&row).is_none());
}

#[test]
fn profile_with_garbage_id_is_none() {
    let row = serde_json::json!({ "id": "not-a-uuid", "profile_completed": true });
    assert!(Profile::from_row(&row).is_none());
}

// =============================================================================
// AuthError display
// =============================================================================

#[test]
fn auth_error_response_display_has_status() {
    let err = AuthError::Response { status: 503, body: "down".into() };
    assert!(err.to_string().contains("503"));
}

#[test]
fn auth_error_request_display_has_cause() {
    let err = AuthError::Request("connection refused".into());
    assert!(err.to_string().contains("connection refused"));
}
