use super::parsing::{
    env_flag, env_optional, env_or_default, parse_cors_origins, parse_environment, parse_i64,
    parse_percentage, parse_u16, parse_u64, trim_url,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, CacheSettings, ConfigError, CorsSettings, DatabaseSettings,
    NotificationSettings, RagSettings, RedisSettings, ReportingSettings, RuntimeSettings,
    SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("PORTAL_HOST", "0.0.0.0");
        let port = env_or_default("PORTAL_PORT", "8000");

        let environment =
            parse_environment(env_optional("PORTAL_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config = env_flag("PORTAL_STRICT_CONFIG", false) || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Placement Portal API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");
        let public_url = trim_url(env_or_default("PORTAL_PUBLIC_URL", "http://localhost:8000"));

        let (secret_key, secret_key_generated) = match env_optional("SECRET_KEY") {
            Some(value) => (value, false),
            None => (load_or_create_secret_key(), true),
        };
        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "portal");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "placement_portal");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let cache_enabled = env_flag("CACHE_ENABLED", true);
        let cache_ttl_seconds =
            parse_u64("CACHE_TTL_SECONDS", env_or_default("CACHE_TTL_SECONDS", "300"))?;

        let rag_enabled = env_flag("RAG_ENABLED", true);
        let rag_service_url =
            trim_url(env_or_default("RAG_SERVICE_URL", "http://localhost:8001"));
        let rag_timeout_seconds =
            parse_u64("RAG_TIMEOUT_SECONDS", env_or_default("RAG_TIMEOUT_SECONDS", "10"))?;
        let rag_health_timeout_seconds = parse_u64(
            "RAG_HEALTH_TIMEOUT_SECONDS",
            env_or_default("RAG_HEALTH_TIMEOUT_SECONDS", "5"),
        )?;
        let rag_auto_sync = env_flag("RAG_AUTO_SYNC", true);

        let notify_webhook_url = env_optional("NOTIFY_WEBHOOK_URL");
        let notify_timeout_seconds =
            parse_u64("NOTIFY_TIMEOUT_SECONDS", env_or_default("NOTIFY_TIMEOUT_SECONDS", "10"))?;
        let college_name = env_or_default("COLLEGE_NAME", "Placement Cell");

        let default_pass_percentage = parse_percentage(
            "DEFAULT_PASS_PERCENTAGE",
            env_or_default("DEFAULT_PASS_PERCENTAGE", "50"),
        )?;
        let export_max_rows =
            parse_i64("EXPORT_MAX_ROWS", env_or_default("EXPORT_MAX_ROWS", "10000"))?;

        let first_admin_email = env_or_default("FIRST_ADMIN_EMAIL", "admin@portal.local");
        let first_admin_password = env_or_default("FIRST_ADMIN_PASSWORD", "");

        let log_level = env_or_default("PORTAL_LOG_LEVEL", "info");
        let json = env_flag("PORTAL_LOG_JSON", false);
        let prometheus_enabled = env_flag("PROMETHEUS_ENABLED", false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str, public_url },
            security: SecuritySettings {
                secret_key,
                secret_key_generated,
                access_token_expire_minutes,
                algorithm,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            cache: CacheSettings { enabled: cache_enabled, ttl_seconds: cache_ttl_seconds },
            rag: RagSettings {
                enabled: rag_enabled,
                service_url: rag_service_url,
                timeout_seconds: rag_timeout_seconds,
                health_timeout_seconds: rag_health_timeout_seconds,
                auto_sync: rag_auto_sync,
            },
            notifications: NotificationSettings {
                webhook_url: notify_webhook_url,
                timeout_seconds: notify_timeout_seconds,
                college_name,
            },
            reporting: ReportingSettings { default_pass_percentage, export_max_rows },
            admin: AdminSettings { first_admin_email, first_admin_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn cache(&self) -> &CacheSettings {
        &self.cache
    }

    pub(crate) fn rag(&self) -> &RagSettings {
        &self.rag
    }

    pub(crate) fn notifications(&self) -> &NotificationSettings {
        &self.notifications
    }

    pub(crate) fn reporting(&self) -> &ReportingSettings {
        &self.reporting
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("RAG_TIMEOUT_SECONDS", self.rag.timeout_seconds),
            ("RAG_HEALTH_TIMEOUT_SECONDS", self.rag.health_timeout_seconds),
            ("NOTIFY_TIMEOUT_SECONDS", self.notifications.timeout_seconds),
            ("CACHE_TTL_SECONDS", self.cache.ttl_seconds),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue { field, value: "0".to_string() });
            }
        }

        if self.reporting.export_max_rows <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXPORT_MAX_ROWS",
                value: self.reporting.export_max_rows.to_string(),
            });
        }

        if self.rag.enabled && !self.rag.service_url.starts_with("http") {
            return Err(ConfigError::InvalidValue {
                field: "RAG_SERVICE_URL",
                value: self.rag.service_url.clone(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.security.secret_key_generated {
            return Err(ConfigError::MissingSecret("SECRET_KEY"));
        }
        if self.admin.first_admin_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_ADMIN_PASSWORD"));
        }

        Ok(())
    }
}
