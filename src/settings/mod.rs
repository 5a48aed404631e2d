use std::collections::HashSet;
use std::{env, path::Path};
use serde::Deserialize;
use tracing::{debug, info};

mod server;
pub mod logging;
mod error;
mod rule;

pub use server::ServerSettings;
pub use logging::{LogFormat, LogOutput, LogSettings};
pub use error::SettingsError;
pub use rule::{
    AccessLogSettings, BasicAuthSettings, FilterMode, IpFilterSettings, NamedPolicyConfig,
    Network, PolicySettings, RuleConfig, RuleTlsSettings,
};

pub type Result<T> = std::result::Result<T, SettingsError>;
pub use server::parse_env_var;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    // 서버 설정
    #[serde(default)]
    pub server: ServerSettings,

    // 로깅 설정
    #[serde(default)]
    pub logging: LogSettings,

    /// 전역 IP 필터 목록
    #[serde(default)]
    pub ip_filter: IpFilterSettings,

    /// 리버스 프록시 규칙 목록
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Settings {
    pub async fn load() -> Result<Self> {
        if let Ok(config_path) = env::var("PROXY_CONFIG_FILE") {
            Self::from_toml_file(&config_path).await
        } else {
            Self::from_env().await
        }
    }

    pub async fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        debug!("TOML 설정 파일 로드: {}", path_ref.display());

        let content = tokio::fs::read_to_string(path_ref).await.map_err(|e| SettingsError::FileError {
            path: path_ref.to_string_lossy().to_string(),
            error: e,
        })?;

        let settings = Self::from_toml_str(&content)?;
        info!(rules = settings.rules.len(), "설정 파일 로드 완료: {}", path_ref.display());
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| SettingsError::ParseError { source: e })?;

        settings.validate()?;
        Ok(settings)
    }

    pub async fn from_env() -> Result<Self> {
        let settings = Self {
            server: ServerSettings::from_env()?,
            logging: LogSettings::from_env()?,
            ip_filter: IpFilterSettings::default(),
            rules: Vec::new(),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;

        crate::middleware::SafeIpLists::from_settings(&self.ip_filter)
            .map_err(|e| SettingsError::InvalidRule {
                rule_key: "ip_filter".to_string(),
                source: e,
            })?;

        let mut keys = HashSet::new();
        for rule in &self.rules {
            if !keys.insert(rule.key.as_str()) {
                return Err(SettingsError::InvalidRule {
                    rule_key: rule.key.clone(),
                    source: crate::rule::ConfigError::DuplicateRuleKey(rule.key.clone()),
                });
            }
            crate::rule::validate_rule(rule).map_err(|e| SettingsError::InvalidRule {
                rule_key: rule.key.clone(),
                source: e,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_toml() {
        let toml_content = r#"
            [server]
            start_grace_ms = 100

            [logging]
            format = "json"
            level = "debug"

            [ip_filter]
            whitelist = ["10.0.0.0/8", "192.168.1.10"]

            [[rules]]
            key = "r1"
            listen_port = 8080
            [rules.default_policy]
            locations = ["http://127.0.0.1:9000"]
        "#;

        let settings = Settings::from_toml_str(toml_content).unwrap();
        assert_eq!(settings.server.start_grace_ms, 100);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, tracing::Level::DEBUG);
        assert_eq!(settings.ip_filter.whitelist.len(), 2);
        assert_eq!(settings.rules.len(), 1);
    }

    #[test]
    fn test_duplicate_rule_keys_rejected() {
        let toml_content = r#"
            [[rules]]
            key = "r1"
            listen_port = 8080

            [[rules]]
            key = "r1"
            listen_port = 8081
        "#;

        let err = Settings::from_toml_str(toml_content).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidRule { rule_key, .. } if rule_key == "r1"));
    }

    #[test]
    fn test_domain_conflict_rejected_at_load() {
        let toml_content = r#"
            [[rules]]
            key = "r1"
            listen_port = 8080

            [[rules.policies]]
            key = "a"
            domains = ["example.com"]

            [[rules.policies]]
            key = "b"
            domains = ["example.com"]
        "#;

        assert!(Settings::from_toml_str(toml_content).is_err());
    }

    #[test]
    fn test_invalid_ip_filter_entry_rejected() {
        let toml_content = r#"
            [ip_filter]
            blacklist = ["10.0.0.0/33"]
        "#;

        assert!(Settings::from_toml_str(toml_content).is_err());
    }
}
