//! 리스닝 규칙과 그 정책들을 실행 가능한 형태로 만듭니다.
//!
//! 규칙은 설정이 바뀔 때마다 통째로 다시 만들어지며, 만들어진 뒤에는
//! 라운드 로빈 인덱스를 제외하고 읽기 전용입니다.

mod error;
mod policy;
mod store;

pub use error::ConfigError;
pub use policy::{Policy, PolicyRole};
pub use store::RuleStore;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use crate::logging::{LogItem, LogSinkRegistry};
use crate::middleware::SafeIpLists;
use crate::routing::DomainTable;
use crate::settings::RuleConfig;

/// 관리 계층에서 기본 정책을 가리키는 별칭
pub const DEFAULT_POLICY_ALIAS: &str = "default";

#[derive(Debug)]
pub struct Rule {
    config: RuleConfig,
    listen_addr: SocketAddr,
    default_policy: Policy,
    policies: Vec<Policy>,
    domains: DomainTable,
}

impl Rule {
    /// 설정에서 규칙을 만듭니다. 검증에 실패하면 아무것도 만들어지지 않습니다.
    pub fn build(
        config: RuleConfig,
        sinks: &LogSinkRegistry,
        ip_lists: Arc<SafeIpLists>,
    ) -> Result<Self, ConfigError> {
        let listen_addr = config.listen_addr()?;
        check_tls(&config)?;
        check_policy_keys(&config)?;
        let domains = DomainTable::build(&config.key, &config.policies)?;

        let default_policy = Policy::build_default(&config, sinks, ip_lists.clone())?;
        let policies = config
            .policies
            .iter()
            .map(|p| Policy::build_named(p, sinks, ip_lists.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            rule = %config.key,
            addr = %listen_addr,
            policies = policies.len(),
            domains = domains.len(),
            "규칙 생성"
        );

        Ok(Self {
            config,
            listen_addr,
            default_policy,
            policies,
            domains,
        })
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn enabled(&self) -> bool {
        self.config.enable
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn default_policy(&self) -> &Policy {
        &self.default_policy
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// 호스트 이름(포트 제외)에 해당하는 이름 있는 정책
    pub fn resolve_domain(&self, host: &str) -> Option<&Policy> {
        self.domains.resolve(host).and_then(|i| self.policies.get(i))
    }

    /// 요청을 처리할 정책을 고릅니다. 일치하는 정책이 없거나 꺼져 있으면 기본 정책입니다.
    pub fn select_policy(&self, host: &str) -> &Policy {
        self.resolve_domain(host)
            .filter(|p| p.enabled())
            .unwrap_or(&self.default_policy)
    }

    /// 키로 정책을 찾습니다. `"default"`와 규칙 키는 기본 정책을 가리킵니다.
    pub fn policy(&self, key: &str) -> Option<&Policy> {
        if key == DEFAULT_POLICY_ALIAS || key == self.config.key {
            return Some(&self.default_policy);
        }
        self.policies.iter().find(|p| p.key() == key)
    }

    /// 정책별 최근 접근 로그. 기본 정책은 `"default"` 키로 반환됩니다.
    pub fn last_logs(&self) -> HashMap<String, Vec<LogItem>> {
        std::iter::once((DEFAULT_POLICY_ALIAS.to_string(), self.default_policy.access_log().last_items()))
            .chain(
                self.policies
                    .iter()
                    .map(|p| (p.key().to_string(), p.access_log().last_items())),
            )
            .collect()
    }
}

/// 규칙 설정을 검증합니다. 로그 싱크나 리스너는 만들지 않습니다.
pub fn validate_rule(config: &RuleConfig) -> Result<(), ConfigError> {
    config.listen_addr()?;
    check_tls(config)?;
    check_policy_keys(config)?;
    DomainTable::build(&config.key, &config.policies)?;

    let settings = std::iter::once(&config.default_policy)
        .chain(config.policies.iter().map(|p| &p.settings));
    for s in settings {
        crate::client_ip::TrustedProxies::parse(&s.trusted_cidrs)?;
        policy::parse_client_ip_header(s)?;
        crate::settings::logging::parse_level(&s.access_log.level).ok_or_else(|| {
            ConfigError::InvalidLogLevel { value: s.access_log.level.clone() }
        })?;
    }
    Ok(())
}

fn check_tls(config: &RuleConfig) -> Result<(), ConfigError> {
    if !config.tls.enabled {
        return Ok(());
    }
    if config.tls.cert_path.is_none() {
        return Err(ConfigError::MissingTlsFile { rule_key: config.key.clone(), which: "cert" });
    }
    if config.tls.key_path.is_none() {
        return Err(ConfigError::MissingTlsFile { rule_key: config.key.clone(), which: "key" });
    }
    Ok(())
}

/// 이름 있는 정책 키는 비어 있지 않고, 규칙 키나 `"default"`와 다르며, 서로 달라야 합니다.
fn check_policy_keys(config: &RuleConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for policy in &config.policies {
        let key = policy.key.as_str();
        if key.trim().is_empty()
            || key == DEFAULT_POLICY_ALIAS
            || key == config.key
            || !seen.insert(key)
        {
            return Err(ConfigError::DuplicatePolicyKey {
                rule_key: config.key.clone(),
                policy_key: key.to_string(),
            });
        }
    }
    Ok(())
}
