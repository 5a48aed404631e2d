use serde::Deserialize;
use std::env;
use std::time::Duration;
use super::SettingsError;

#[derive(Clone, Debug, Deserialize)]
pub struct ServerSettings {
    /// 리스너 시작 후 초기 바인딩/서빙 오류를 기다리는 시간 (기본값: 300ms)
    #[serde(default = "default_start_grace_ms")]
    pub start_grace_ms: u64,
}

fn default_start_grace_ms() -> u64 { 300 }

pub fn parse_env_var<T: std::str::FromStr, F: FnOnce() -> T>(name: &str, default: F) -> Result<T, SettingsError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value: val,
            reason: e.to_string(),
        }),
        Err(env::VarError::NotPresent) => Ok(default()),
        Err(e) => Err(SettingsError::EnvVarInvalid {
            var_name: name.to_string(),
            value: "".to_string(),
            reason: e.to_string(),
        }),
    }
}

impl ServerSettings {
    // 유예 시간 상한
    const MAX_GRACE_MS: u64 = 10_000;

    pub fn from_env() -> Result<Self, SettingsError> {
        let settings = Self {
            start_grace_ms: parse_env_var("PROXY_START_GRACE_MS", default_start_grace_ms)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.start_grace_ms > Self::MAX_GRACE_MS {
            return Err(SettingsError::EnvVarInvalid {
                var_name: "PROXY_START_GRACE_MS".to_string(),
                value: self.start_grace_ms.to_string(),
                reason: format!("유예 시간은 {}ms 이하여야 합니다", Self::MAX_GRACE_MS),
            });
        }
        Ok(())
    }

    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            start_grace_ms: default_start_grace_ms(),
        }
    }
}
