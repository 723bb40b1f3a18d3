use crate::auth::{ApiError, AuthError, Identity, Permission};

#[test]
fn test_permission_parsing() {
    let permission: Permission = "get /api/users".parse().unwrap();
    assert_eq!(permission.method(), "GET");
    assert_eq!(permission.pattern(), "/api/users");
    assert_eq!(permission.to_string(), "GET /api/users");

    assert!("GET".parse::<Permission>().is_err());
    assert!("GET /a /b".parse::<Permission>().is_err());
}

#[test]
fn test_permission_matching() {
    let exact = Permission::new("GET", "/api/users");
    assert!(exact.matches("GET", "/api/users"));
    assert!(exact.matches("get", "/api/users"));
    assert!(!exact.matches("POST", "/api/users"));
    assert!(!exact.matches("GET", "/api/users/1"));

    let prefix = Permission::new("*", "/api/orders/*");
    assert!(prefix.matches("DELETE", "/api/orders/7"));
    assert!(prefix.matches("GET", "/api/orders/"));
    assert!(!prefix.matches("GET", "/api/orders"));

    let everything = Permission::new("*", "*");
    assert!(everything.matches("PATCH", "/anything"));
}

#[test]
fn test_permissions_deserialize_from_strings() {
    let identity: Identity = serde_json::from_str(
        r#"{"subject": "svc-billing", "roles": ["reader"], "permissions": ["POST /api/invoices"]}"#,
    )
    .unwrap();
    assert!(identity.is_allowed("POST", "/api/invoices"));
    assert!(!identity.is_allowed("GET", "/api/invoices"));

    let bad = serde_json::from_str::<Identity>(r#"{"subject": "x", "permissions": ["nonsense"]}"#);
    assert!(bad.is_err());
}

#[test]
fn test_api_error_wire_shape() {
    let error: ApiError = AuthError::UnknownIdentity.into();
    assert_eq!(error.http_code, 401);
    assert_eq!(error.error_code, 2);
    assert_eq!(error.error_name, "UNAUTHORIZED");

    let body = serde_json::to_value(&error).unwrap();
    assert_eq!(body["httpCode"], 401);
    assert_eq!(body["errorCode"], 2);
    assert_eq!(body["errorName"], "UNAUTHORIZED");
    assert_eq!(body["message"], "unknown identity");
    assert!(body.get("details").is_none());
}
