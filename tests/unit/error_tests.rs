use recipe_harness::errors::RETRYABLE_STATUS_CODES;
use recipe_harness::AppError;

#[test]
fn transient_failures_are_retryable() {
    assert!(AppError::RateLimited("x".into()).is_retryable());
    assert!(AppError::Timeout("x".into()).is_retryable());
    for status in RETRYABLE_STATUS_CODES {
        assert!(AppError::Remote(status, String::new()).is_retryable());
    }
}

#[test]
fn permanent_failures_are_not_retryable() {
    for err in [
        AppError::Remote(400, String::new()),
        AppError::Remote(401, String::new()),
        AppError::Remote(500, String::new()),
        AppError::Http("connection reset".into()),
        AppError::Consistency("x".into()),
        AppError::BadRequest("x".into()),
        AppError::Config("x".into()),
    ] {
        assert!(!err.is_retryable(), "{err} should not be retried");
    }
}

#[test]
fn display_includes_context() {
    assert_eq!(
        AppError::Remote(503, "overloaded".into()).to_string(),
        "remote 503: overloaded"
    );
    assert_eq!(
        AppError::Consistency("out of order".into()).to_string(),
        "consistency: out of order"
    );
    assert_eq!(AppError::NotFound("s".into()).kind(), "not_found");
}

#[test]
fn conversions_pick_the_right_variant() {
    let json_err = serde_json::from_str::<u8>("nope").expect_err("invalid");
    assert!(matches!(AppError::from(json_err), AppError::BadRequest(_)));

    let toml_err = toml::from_str::<toml::Value>("a = [").expect_err("invalid");
    assert!(matches!(AppError::from(toml_err), AppError::Config(_)));

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    assert!(matches!(AppError::from(io_err), AppError::Io(_)));
}
