use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS allowed origins; empty allows all origins (development mode).
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub alert_check: AlertCheckConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_expire_secs")]
    pub token_expire_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_expire_secs: default_token_expire_secs(),
        }
    }
}

/// The external scheduler's entry point: a bearer shared secret plus a
/// fixed-window rate limit on the run endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    #[serde(default = "default_rate_limit_per_hour")]
    pub rate_limit_per_hour: u32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            rate_limit_enabled: true,
            rate_limit_per_hour: default_rate_limit_per_hour(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCheckConfig {
    /// Run the in-process scheduler. Off when an external cron drives the
    /// trigger endpoint instead.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_interval_secs")]
    pub interval_secs: u64,
    /// Rule types evaluated concurrently per run.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Recipients fanned out concurrently per alert.
    #[serde(default = "default_dispatch_in_flight")]
    pub dispatch_in_flight: usize,
}

impl Default for AlertCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_check_interval_secs(),
            max_concurrent: default_max_concurrent(),
            dispatch_in_flight: default_dispatch_in_flight(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub from: String,
    #[serde(default = "default_send_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub enabled: bool,
    /// URL-safe base64 VAPID private key.
    #[serde(default)]
    pub vapid_private_key: Option<String>,
    /// VAPID subject claim, e.g. `mailto:ops@example.org`.
    #[serde(default)]
    pub vapid_subject: Option<String>,
    #[serde(default = "default_send_timeout_secs")]
    pub timeout_secs: u64,
}

// ---- Seed file types (used by the `init-alert-configs` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfigSeedFile {
    #[serde(default)]
    pub configs: Vec<SeedAlertConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAlertConfig {
    pub alert_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub notify_admin: bool,
    #[serde(default)]
    pub notify_coordinator: bool,
    #[serde(default)]
    pub auto_send_email: bool,
    #[serde(default)]
    pub threshold_value: Option<i64>,
    /// Template referenced by name; resolved to an ID at seed time.
    #[serde(default)]
    pub email_template: Option<String>,
}

impl AlertConfigSeedFile {
    /// Deployment defaults applied when no seed file is given.
    pub fn defaults() -> Self {
        let entry = |alert_type: &str, threshold: Option<i64>| SeedAlertConfig {
            alert_type: alert_type.to_string(),
            enabled: true,
            notify_admin: true,
            notify_coordinator: false,
            auto_send_email: false,
            threshold_value: threshold,
            email_template: None,
        };
        Self {
            configs: vec![
                entry("ethics_approval_pending", Some(14)),
                entry("missing_documentation", None),
                entry("upcoming_recruitment_period", Some(30)),
                entry("no_activity_30_days", Some(30)),
                entry("low_completion_rate", Some(65)),
            ],
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite://data/vigia.db?mode=rwc".to_string()
}

fn default_jwt_secret() -> String {
    "vigia-dev-secret".to_string()
}

fn default_token_expire_secs() -> u64 {
    86400
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_per_hour() -> u32 {
    6
}

fn default_check_interval_secs() -> u64 {
    86400
}

fn default_max_concurrent() -> usize {
    4
}

fn default_dispatch_in_flight() -> usize {
    8
}

fn default_smtp_port() -> u16 {
    587
}

fn default_send_timeout_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            trigger: TriggerConfig::default(),
            alert_check: AlertCheckConfig::default(),
            email: EmailConfig::default(),
            push: PushConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gets_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert!(config.alert_check.enabled);
        assert_eq!(config.alert_check.interval_secs, 86400);
        assert!(!config.email.enabled);
        assert!(config.trigger.rate_limit_enabled);
    }

    #[test]
    fn seed_defaults_cover_every_rule_type() {
        let seed = AlertConfigSeedFile::defaults();
        assert_eq!(seed.configs.len(), 5);
        assert!(seed
            .configs
            .iter()
            .any(|c| c.alert_type == "low_completion_rate" && c.threshold_value == Some(65)));
        assert!(seed
            .configs
            .iter()
            .any(|c| c.alert_type == "missing_documentation" && c.threshold_value.is_none()));
    }
}
