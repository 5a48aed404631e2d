use serde::{Deserialize, Deserializer};
use std::env;
use tracing::Level;
use super::{server::parse_env_var, SettingsError};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LogOutput {
    #[default]
    Stdout,
    File(String),
}

impl std::str::FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            _ => Ok(LogOutput::File(s.to_string())),
        }
    }
}

/// 프로세스 로그 설정
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub format: LogFormat,
    pub level: Level,
    pub output: LogOutput,
}

impl LogSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let level = env::var("PROXY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        Ok(Self {
            format: parse_env_var("PROXY_LOG_FORMAT", || LogFormat::Text)?,
            level: parse_level(&level).ok_or_else(|| SettingsError::EnvVarInvalid {
                var_name: "PROXY_LOG_LEVEL".to_string(),
                value: level.clone(),
                reason: "유효하지 않은 로그 레벨".to_string(),
            })?,
            output: parse_env_var("PROXY_LOG_OUTPUT", || LogOutput::Stdout)?,
        })
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: Level::INFO,
            output: LogOutput::default(),
        }
    }
}

/// 로그 레벨 문자열을 파싱합니다. 대소문자는 구분하지 않습니다.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for LogSettings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            #[serde(default)]
            format: LogFormat,
            #[serde(default = "default_log_level_string")]
            level: String,
            #[serde(default = "default_output_string")]
            output: String,
        }

        let helper = Helper::deserialize(deserializer)?;
        let level = parse_level(&helper.level)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid log level: {}", helper.level)))?;
        let output = helper.output.parse().map_err(serde::de::Error::custom)?;

        Ok(LogSettings {
            format: helper.format,
            level,
            output,
        })
    }
}

fn default_log_level_string() -> String {
    "info".to_string()
}

fn default_output_string() -> String {
    "stdout".to_string()
}
