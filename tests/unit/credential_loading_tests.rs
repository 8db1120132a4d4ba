//! Unit tests for OpenAI credential loading.
//!
//! The test environment has no keychain entry for the service, so the
//! env-var fallback is exercised.
//!
//! NOTE: These tests mutate process-global env vars and run serially.

use recipe_harness::config::GlobalConfig;
use recipe_harness::AppError;

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn env_var_credential_loading() {
    let mut config = GlobalConfig::default();

    unsafe {
        std::env::set_var("OPENAI_API_KEY", "sk-test-key");
    }

    let result = config.load_credentials().await;
    assert!(result.is_ok(), "load_credentials should succeed with env var");
    assert_eq!(config.openai.api_key, "sk-test-key");

    unsafe {
        std::env::remove_var("OPENAI_API_KEY");
    }
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn missing_credential_names_env_var() {
    let mut config = GlobalConfig::default();

    unsafe {
        std::env::remove_var("OPENAI_API_KEY");
    }

    let err = config
        .load_credentials()
        .await
        .expect_err("no credential available");
    match err {
        AppError::Config(message) => assert!(
            message.contains("OPENAI_API_KEY"),
            "error should name the env var: {message}"
        ),
        other => panic!("expected config error, got {other:?}"),
    }
}
