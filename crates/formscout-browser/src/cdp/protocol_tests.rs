use super::*;

#[test]
fn test_cdp_request_serialize() {
    let req = CdpRequest {
        id: 7,
        method: "Target.createBrowserContext".to_string(),
        params: Some(serde_json::json!({"disposeOnDetach": true})),
        session_id: None,
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("Target.createBrowserContext"));
    assert!(!json.contains("sessionId"));
}

#[test]
fn test_session_request_carries_session_id() {
    let req = CdpRequest {
        id: 1,
        method: "Runtime.evaluate".to_string(),
        params: None,
        session_id: Some("S1".to_string()),
    };
    let json = serde_json::to_string(&req).unwrap();
    assert!(json.contains("\"sessionId\":\"S1\""));
    assert!(!json.contains("params"));
}

#[test]
fn test_cdp_error_response_deserialize() {
    let json = r#"{"id": 3, "error": {"code": -32000, "message": "Cannot navigate to invalid URL"}}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.id, Some(3));
    let error = resp.error.unwrap();
    assert_eq!(error.code, -32000);
    assert!(resp.result.is_none());
}

#[test]
fn test_event_deserialize() {
    let json = r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}, "sessionId": "S1"}"#;
    let resp: CdpResponse = serde_json::from_str(json).unwrap();
    assert!(resp.id.is_none());
    assert_eq!(resp.method.as_deref(), Some("Page.loadEventFired"));
}

#[test]
fn test_browser_version_deserialize() {
    let json = r#"{
        "Browser": "Chrome/124.0.6367.60",
        "Protocol-Version": "1.3",
        "User-Agent": "Mozilla/5.0",
        "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
    }"#;
    let version: BrowserVersion = serde_json::from_str(json).unwrap();
    assert!(version.browser.starts_with("Chrome"));
    assert_eq!(
        version.web_socket_debugger_url,
        "ws://127.0.0.1:9222/devtools/browser/abc"
    );
}

#[test]
fn test_exception_message_falls_back_to_text() {
    let json = r#"{"text": "Uncaught SyntaxError", "lineNumber": 0, "columnNumber": 0}"#;
    let details: ExceptionDetails = serde_json::from_str(json).unwrap();
    assert_eq!(details.message(), "Uncaught SyntaxError");
}

#[test]
fn test_exception_message_prefers_description() {
    let json = r#"{
        "text": "Uncaught",
        "lineNumber": 0,
        "columnNumber": 5,
        "exception": {"type": "object", "description": "TypeError: x is null"}
    }"#;
    let details: ExceptionDetails = serde_json::from_str(json).unwrap();
    assert_eq!(details.message(), "TypeError: x is null");
}
