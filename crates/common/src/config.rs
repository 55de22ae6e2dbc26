use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        10
    }
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "AuthConfig::default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

impl AuthConfig {
    const fn default_access_ttl_secs() -> u64 {
        300
    }

    const fn default_refresh_ttl_secs() -> u64 {
        86_400
    }
}

// Keeps the signing secret out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub bind: String,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "ObservabilityConfig::default_metrics_path")]
    pub metrics_path: String,
    #[serde(default = "ObservabilityConfig::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_path: Self::default_metrics_path(),
            log_level: Self::default_log_level(),
            otlp: false,
        }
    }
}

impl ObservabilityConfig {
    fn default_metrics_path() -> String {
        "/metrics".to_string()
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_debug_hides_secret() {
        let auth = AuthConfig {
            jwt_secret: "super-secret".into(),
            access_ttl_secs: 300,
            refresh_ttl_secs: 86_400,
        };
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn observability_defaults() {
        let obs = ObservabilityConfig::default();
        assert_eq!(obs.metrics_path, "/metrics");
        assert_eq!(obs.log_level, "info");
        assert!(!obs.otlp);
    }

    #[test]
    fn sections_fill_defaults_from_toml() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(
                r#"
                [database]
                url = "postgres://localhost/softdesk"

                [auth]
                jwt_secret = "s"

                [api]
                bind = "127.0.0.1:8000"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database.url, "postgres://localhost/softdesk");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.auth.access_ttl_secs, 300);
        assert_eq!(config.auth.refresh_ttl_secs, 86_400);
        assert_eq!(config.api.prefix, "");
        assert_eq!(config.observability.metrics_path, "/metrics");
    }
}
