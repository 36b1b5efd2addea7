use looker_rtl::error::{ok, ApiError, ApiErrorKind, SdkError, ValidationError};
use looker_rtl::transport::{Response, TransportError};
use looker_rtl::{AuthError, ConfigError};

#[test]
fn test_ok_returns_value() {
    let value = ok(Ok::<_, ApiError>(vec![1, 2, 3])).unwrap();
    assert_eq!(value, vec![1, 2, 3]);
}

#[test]
fn test_ok_raises_contained_error() {
    let error = ApiError::new(ApiErrorKind::Server, Some(404), "not found");

    let result = ok::<String>(Err(error.clone()));

    match result {
        Err(SdkError::Api(raised)) => assert_eq!(raised, error),
        other => panic!("Expected SdkError::Api, got {:?}", other),
    }
}

#[test]
fn test_ok_works_with_question_mark() {
    fn lookup(result: Result<u32, ApiError>) -> Result<u32, SdkError> {
        let value = ok(result)?;
        Ok(value + 1)
    }

    assert_eq!(lookup(Ok(1)).unwrap(), 2);
    assert!(lookup(Err(ApiError::new(ApiErrorKind::Server, Some(500), "boom"))).is_err());
}

#[test]
fn test_from_response_with_message() {
    let response = Response::new(
        400,
        r#"{"message": "bad", "documentation_url": "https://docs.test"}"#,
    );
    let error = ApiError::from_response(&response);

    assert_eq!(error.kind, ApiErrorKind::Server);
    assert_eq!(error.status, Some(400));
    assert_eq!(error.message, "bad");
    assert_eq!(error.documentation_url.as_deref(), Some("https://docs.test"));
}

#[test]
fn test_from_response_without_message_keeps_body() {
    let response = Response::new(409, r#"{"conflict": true}"#);
    let error = ApiError::from_response(&response);
    assert_eq!(error.message, r#"Request failed: {"conflict": true}"#);
}

#[test]
fn test_from_response_json_string_body() {
    let response = Response::new(400, r#""plain message""#);
    let error = ApiError::from_response(&response);
    assert_eq!(error.message, "plain message");
}

#[test]
fn test_from_response_empty_body_uses_reason() {
    let error = ApiError::from_response(&Response::new(404, ""));
    assert_eq!(error.message, "Not Found");

    let error = ApiError::from_response(&Response::new(599, ""));
    assert_eq!(error.message, "HTTP 599");
}

#[test]
fn test_transport_error_conversion() {
    let error: ApiError = TransportError::Connect {
        url: "https://x.test".to_string(),
        reason: "refused".to_string(),
    }
    .into();

    assert_eq!(error.kind, ApiErrorKind::Transport);
    assert_eq!(error.status, None);
    assert!(error.message.contains("refused"));
}

#[test]
fn test_display_includes_field_errors() {
    let response = Response::new(
        422,
        r#"{"message": "Validation Failed", "errors": [{"field": "email", "message": "is invalid"}]}"#,
    );
    let rendered = ApiError::from_response(&response).to_string();

    assert!(rendered.starts_with("Validation Failed (422)"));
    assert!(rendered.contains("email: is invalid"));
}

#[test]
fn test_validation_error_kind() {
    let error = ApiError::validation(ValidationError::MissingArgument("user_id"));
    assert_eq!(error.kind, ApiErrorKind::Validation);
    assert_eq!(error.message, "Missing required argument: user_id");
}

#[test]
fn test_sdk_error_api_error_accessor() {
    let api = ApiError::new(ApiErrorKind::Server, Some(401), "nope");

    assert_eq!(
        SdkError::Auth(AuthError::Rejected(api.clone())).api_error(),
        Some(&api)
    );
    assert_eq!(SdkError::Api(api.clone()).api_error(), Some(&api));
    assert_eq!(
        SdkError::Config(ConfigError::MissingField("base_url")).api_error(),
        None
    );
}
