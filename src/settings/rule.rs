use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::rule::ConfigError;

/// 리스너 전송 계층
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
}

impl Network {
    /// 주소 패밀리가 이 네트워크에서 허용되는지 확인합니다.
    pub fn accepts(&self, ip: &IpAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => ip.is_ipv4(),
            Network::Tcp6 => ip.is_ipv6(),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Tcp4 => write!(f, "tcp4"),
            Network::Tcp6 => write!(f, "tcp6"),
        }
    }
}

/// IP / User-Agent 필터 모드
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    #[serde(alias = "", alias = "none")]
    Disabled,
    Whitelist,
    Blacklist,
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterMode::Disabled => write!(f, "disabled"),
            FilterMode::Whitelist => write!(f, "whitelist"),
            FilterMode::Blacklist => write!(f, "blacklist"),
        }
    }
}

/// 전역 IP 화이트리스트/블랙리스트 (CIDR 또는 단일 IP)
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct IpFilterSettings {
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RuleTlsSettings {
    #[serde(default)]
    pub enabled: bool,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccessLogSettings {
    #[serde(default)]
    pub enable: bool,
    /// 최소 기록 레벨 (error, warn, info, debug, trace)
    #[serde(default = "default_access_level")]
    pub level: String,
    /// 기록과 동시에 프로세스 로그로도 출력
    #[serde(default)]
    pub console: bool,
    /// 싱크에 보관할 최대 레코드 수
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// 관리 화면에 보여줄 최근 레코드 수
    #[serde(default = "default_preview_count")]
    pub preview_count: usize,
    /// 요청 정보 포맷. 비어 있으면 JSON으로 기록합니다.
    #[serde(default)]
    pub request_format: String,
}

fn default_access_level() -> String { "info".to_string() }
fn default_max_count() -> usize { 256 }
fn default_preview_count() -> usize { 50 }

impl Default for AccessLogSettings {
    fn default() -> Self {
        Self {
            enable: false,
            level: default_access_level(),
            console: false,
            max_count: default_max_count(),
            preview_count: default_preview_count(),
            request_format: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct BasicAuthSettings {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub user: String,
    /// 평문 또는 bcrypt 해시 ($2a$, $2b$, $2y$)
    #[serde(default)]
    pub password: String,
}

/// 기본 정책과 이름 있는 정책이 공유하는 설정
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PolicySettings {
    /// 백엔드 주소 목록. 둘 이상이면 라운드 로빈으로 분산합니다.
    #[serde(default)]
    pub locations: Vec<String>,

    #[serde(default)]
    pub access_log: AccessLogSettings,

    #[serde(default)]
    pub forwarded_by_client_ip: bool,
    #[serde(default)]
    pub trusted_cidrs: Vec<String>,
    #[serde(default)]
    pub remote_ip_headers: Vec<String>,

    #[serde(default)]
    pub add_remote_ip_to_header: bool,
    #[serde(default)]
    pub remote_ip_header_key: String,

    #[serde(default)]
    pub basic_auth: BasicAuthSettings,

    #[serde(default)]
    pub ip_filter_mode: FilterMode,
    #[serde(default)]
    pub user_agent_filter_mode: FilterMode,
    #[serde(default)]
    pub user_agent_filter: Vec<String>,

    #[serde(default)]
    pub custom_robots_txt: bool,
    #[serde(default)]
    pub robots_txt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NamedPolicyConfig {
    pub key: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(flatten)]
    pub settings: PolicySettings,
}

fn default_true() -> bool { true }

/// 하나의 리스닝 엔드포인트와 그 라우팅 설정
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleConfig {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub listen_ip: String,
    pub listen_port: u16,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub tls: RuleTlsSettings,
    #[serde(default)]
    pub default_policy: PolicySettings,
    #[serde(default)]
    pub policies: Vec<NamedPolicyConfig>,
}

impl RuleConfig {
    /// 리슨 주소를 계산합니다. 빈 IP는 네트워크에 맞는 와일드카드 주소가 됩니다.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = match self.listen_ip.trim() {
            "" if self.network == Network::Tcp6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            "" => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            raw => raw
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse()
                .map_err(|_| ConfigError::InvalidListenAddress {
                    value: raw.to_string(),
                    reason: "IP 주소 형식이 아닙니다".to_string(),
                })?,
        };

        if !self.network.accepts(&ip) {
            return Err(ConfigError::InvalidListenAddress {
                value: ip.to_string(),
                reason: format!("{} 네트워크에서 사용할 수 없는 주소입니다", self.network),
            });
        }

        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// 규칙에 속한 모든 정책 키 (기본 정책 키는 규칙 키와 같습니다)
    pub fn policy_keys(&self) -> Vec<String> {
        std::iter::once(self.key.clone())
            .chain(self.policies.iter().map(|p| p.key.clone()))
            .collect()
    }
}
