use std::net::IpAddr;
use std::sync::Arc;
use hyper::http::request::Parts;
use hyper::StatusCode;
use ipnet::IpNet;

use super::{response, AccessCheck, AccessContext, AccessOutcome};
use crate::rule::ConfigError;
use crate::settings::{FilterMode, IpFilterSettings};

/// 전역 IP 화이트리스트/블랙리스트
#[derive(Debug, Clone, Default)]
pub struct SafeIpLists {
    whitelist: Vec<IpNet>,
    blacklist: Vec<IpNet>,
}

impl SafeIpLists {
    pub fn from_settings(settings: &IpFilterSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            whitelist: parse_entries(&settings.whitelist)?,
            blacklist: parse_entries(&settings.blacklist)?,
        })
    }

    /// 모드에 따라 통과 여부를 판정합니다.
    pub fn check(&self, mode: FilterMode, ip: &IpAddr) -> bool {
        let ip = ip.to_canonical();
        match mode {
            FilterMode::Disabled => true,
            FilterMode::Whitelist => self.whitelist.iter().any(|net| net.contains(&ip)),
            FilterMode::Blacklist => !self.blacklist.iter().any(|net| net.contains(&ip)),
        }
    }
}

/// CIDR 또는 단일 IP 항목을 파싱합니다.
fn parse_entries(entries: &[String]) -> Result<Vec<IpNet>, ConfigError> {
    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpNet>()
                .map(|net| net.trunc())
                .ok()
                .or_else(|| entry.parse::<IpAddr>().ok().and_then(host_net))
                .ok_or_else(|| ConfigError::InvalidCidr { value: entry.to_string() })
        })
        .collect()
}

fn host_net(ip: IpAddr) -> Option<IpNet> {
    let prefix = if ip.is_ipv4() { 32 } else { 128 };
    IpNet::new(ip, prefix).ok()
}

/// 클라이언트 IP 필터 단계
pub struct IpFilter {
    mode: FilterMode,
    lists: Arc<SafeIpLists>,
}

impl IpFilter {
    pub fn new(mode: FilterMode, lists: Arc<SafeIpLists>) -> Self {
        Self { mode, lists }
    }
}

impl AccessCheck for IpFilter {
    fn name(&self) -> &str {
        "ip-filter"
    }

    fn check(&self, ctx: &AccessContext, _parts: &mut Parts) -> AccessOutcome {
        if self.lists.check(self.mode, &ctx.client_ip) {
            return AccessOutcome::Continue;
        }

        AccessOutcome::Denied {
            reason: format!("IP[{}] 접근 거부, 현재 IP 검사 모드 [{}]", ctx.client_ip, self.mode),
            response: response::empty(StatusCode::FORBIDDEN),
        }
    }
}
