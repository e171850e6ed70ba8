mod parsing;
mod secret;
mod settings;
mod types;

pub(crate) use types::{ConfigError, Settings};

#[cfg(test)]
mod tests {
    use super::{ConfigError, Settings};
    use crate::test_support;

    #[tokio::test]
    async fn load_uses_defaults_for_optional_sections() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("RAG_TIMEOUT_SECONDS");
        std::env::remove_var("DEFAULT_PASS_PERCENTAGE");

        let settings = Settings::load().expect("settings");

        assert_eq!(settings.rag().timeout_seconds, 10);
        assert_eq!(settings.rag().health_timeout_seconds, 5);
        assert_eq!(settings.reporting().default_pass_percentage, 50);
        assert_eq!(settings.cache().ttl_seconds, 300);
        assert_eq!(settings.api().api_v1_str, "/api/v1");
    }

    #[tokio::test]
    async fn load_rejects_zero_rag_timeout() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("RAG_TIMEOUT_SECONDS", "0");

        let result = Settings::load();
        std::env::remove_var("RAG_TIMEOUT_SECONDS");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "RAG_TIMEOUT_SECONDS", .. })
        ));
    }

    #[tokio::test]
    async fn strict_mode_requires_admin_password() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("PORTAL_STRICT_CONFIG", "1");
        std::env::remove_var("FIRST_ADMIN_PASSWORD");

        let result = Settings::load();
        std::env::set_var("PORTAL_STRICT_CONFIG", "0");

        assert!(matches!(result, Err(ConfigError::MissingSecret("FIRST_ADMIN_PASSWORD"))));
    }
}
