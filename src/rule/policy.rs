use std::net::IpAddr;
use std::sync::Arc;
use hyper::header::HeaderName;
use hyper::HeaderMap;

use super::ConfigError;
use crate::client_ip::{ClientIpResolver, TrustedProxies};
use crate::logging::{AccessLogger, LogSinkRegistry};
use crate::middleware::{AccessPipeline, SafeIpLists};
use crate::routing::LoadBalancer;
use crate::settings::{NamedPolicyConfig, PolicySettings, RuleConfig};

/// 규칙 안에서 정책이 맡는 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRole {
    /// 도메인이 일치하지 않을 때 쓰이는 기본 정책. 키는 규칙 키와 같습니다.
    Default,
    /// 도메인으로 선택되는 이름 있는 정책
    Named,
}

/// 설정에서 만들어진 실행용 정책
///
/// CIDR 목록, 라운드 로빈 인덱스, 로그 싱크는 규칙을 만들 때 한 번 준비되고
/// 이후 요청 처리 중에는 바뀌지 않습니다 (인덱스는 원자적으로 증가).
#[derive(Debug)]
pub struct Policy {
    key: String,
    role: PolicyRole,
    enabled: bool,
    remark: String,
    settings: PolicySettings,
    client_ip: ClientIpResolver,
    client_ip_header: Option<HeaderName>,
    balancer: LoadBalancer,
    pipeline: AccessPipeline,
    access_log: AccessLogger,
}

impl Policy {
    pub fn build_default(
        rule: &RuleConfig,
        sinks: &LogSinkRegistry,
        ip_lists: Arc<SafeIpLists>,
    ) -> Result<Self, ConfigError> {
        Self::build(
            &rule.key,
            PolicyRole::Default,
            true,
            String::new(),
            &rule.default_policy,
            sinks,
            ip_lists,
        )
    }

    pub fn build_named(
        config: &NamedPolicyConfig,
        sinks: &LogSinkRegistry,
        ip_lists: Arc<SafeIpLists>,
    ) -> Result<Self, ConfigError> {
        Self::build(
            &config.key,
            PolicyRole::Named,
            config.enable,
            config.remark.clone(),
            &config.settings,
            sinks,
            ip_lists,
        )
    }

    fn build(
        key: &str,
        role: PolicyRole,
        enabled: bool,
        remark: String,
        settings: &PolicySettings,
        sinks: &LogSinkRegistry,
        ip_lists: Arc<SafeIpLists>,
    ) -> Result<Self, ConfigError> {
        let trusted = TrustedProxies::parse(&settings.trusted_cidrs)?;
        let client_ip_header = parse_client_ip_header(settings)?;
        let access_log = AccessLogger::new(key, &settings.access_log, sinks)?;

        Ok(Self {
            key: key.to_string(),
            role,
            enabled,
            remark,
            client_ip: ClientIpResolver::new(
                trusted,
                settings.forwarded_by_client_ip,
                settings.remote_ip_headers.clone(),
            ),
            client_ip_header,
            balancer: LoadBalancer::new(settings.locations.clone()),
            pipeline: AccessPipeline::from_settings(settings, ip_lists),
            access_log,
            settings: settings.clone(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn role(&self) -> PolicyRole {
        self.role
    }

    pub fn is_default(&self) -> bool {
        self.role == PolicyRole::Default
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn remark(&self) -> &str {
        &self.remark
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn pipeline(&self) -> &AccessPipeline {
        &self.pipeline
    }

    pub fn access_log(&self) -> &AccessLogger {
        &self.access_log
    }

    /// 백엔드 요청에 클라이언트 IP를 추가할 헤더 이름
    pub fn client_ip_header(&self) -> Option<&HeaderName> {
        self.client_ip_header.as_ref()
    }

    pub fn resolve_client_ip(&self, remote: IpAddr, headers: &HeaderMap) -> IpAddr {
        self.client_ip.resolve(remote, headers)
    }
}

pub(crate) fn parse_client_ip_header(settings: &PolicySettings) -> Result<Option<HeaderName>, ConfigError> {
    let name = settings.remote_ip_header_key.trim();
    if !settings.add_remote_ip_to_header || name.is_empty() {
        return Ok(None);
    }
    HeaderName::from_bytes(name.as_bytes())
        .map(Some)
        .map_err(|_| ConfigError::InvalidHeaderName { value: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PolicySettings {
        PolicySettings {
            locations: vec!["http://127.0.0.1:9000".to_string()],
            forwarded_by_client_ip: true,
            trusted_cidrs: vec!["10.0.0.0/8".to_string()],
            remote_ip_headers: vec!["X-Forwarded-For".to_string()],
            add_remote_ip_to_header: true,
            remote_ip_header_key: "X-Client-IP".to_string(),
            ..Default::default()
        }
    }

    fn named(settings: PolicySettings) -> NamedPolicyConfig {
        NamedPolicyConfig {
            key: "api".to_string(),
            enable: false,
            remark: "api backend".to_string(),
            domains: vec![],
            settings,
        }
    }

    #[test]
    fn test_build_named_policy() {
        let sinks = LogSinkRegistry::new();
        let policy = Policy::build_named(&named(settings()), &sinks, Arc::default()).unwrap();

        assert_eq!(policy.key(), "api");
        assert_eq!(policy.role(), PolicyRole::Named);
        assert!(!policy.enabled());
        assert_eq!(policy.remark(), "api backend");
        assert_eq!(policy.client_ip_header().unwrap(), "x-client-ip");
        assert_eq!(policy.balancer().len(), 1);
        assert!(sinks.get("api").is_some());
    }

    #[test]
    fn test_client_ip_header_requires_flag_and_name() {
        let mut s = settings();
        s.add_remote_ip_to_header = false;
        let policy = Policy::build_named(&named(s), &LogSinkRegistry::new(), Arc::default()).unwrap();
        assert!(policy.client_ip_header().is_none());

        let mut s = settings();
        s.remote_ip_header_key = " ".to_string();
        let policy = Policy::build_named(&named(s), &LogSinkRegistry::new(), Arc::default()).unwrap();
        assert!(policy.client_ip_header().is_none());
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut s = settings();
        s.trusted_cidrs.push("10.0.0.0/99".to_string());
        assert!(matches!(
            Policy::build_named(&named(s), &LogSinkRegistry::new(), Arc::default()),
            Err(ConfigError::InvalidCidr { .. })
        ));

        let mut s = settings();
        s.remote_ip_header_key = "bad header".to_string();
        assert!(matches!(
            Policy::build_named(&named(s), &LogSinkRegistry::new(), Arc::default()),
            Err(ConfigError::InvalidHeaderName { .. })
        ));
    }

    #[test]
    fn test_resolve_client_ip_through_trusted_proxy() {
        let policy = Policy::build_named(&named(settings()), &LogSinkRegistry::new(), Arc::default()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.9.9.9, 10.0.0.2".parse().unwrap());
        assert_eq!(
            policy.resolve_client_ip("10.0.0.1".parse().unwrap(), &headers),
            "9.9.9.9".parse::<IpAddr>().unwrap()
        );
    }
}
