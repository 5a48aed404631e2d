//! 신뢰할 수 있는 프록시 체인을 따라 실제 클라이언트 IP를 결정합니다.
//!
//! 전달 헤더(`X-Forwarded-For` 등)는 오른쪽(가장 최근 홉)부터 왼쪽으로 검사하며,
//! 신뢰하지 않는 첫 번째 홉 또는 가장 왼쪽 항목을 클라이언트로 판단합니다.
//! 모든 실제 중간 홉이 신뢰 목록에 있으면 클라이언트가 앞쪽 홉을 위조해도
//! 결과에 영향을 주지 못합니다.

use std::net::IpAddr;
use hyper::HeaderMap;
use ipnet::IpNet;

use crate::rule::ConfigError;

/// 신뢰하는 프록시 네트워크 목록
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    cidrs: Vec<IpNet>,
}

impl TrustedProxies {
    /// CIDR 문자열 목록을 파싱합니다. 빈 항목은 건너뜁니다.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, ConfigError> {
        let mut cidrs = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            let net = entry.parse::<IpNet>().map_err(|_| ConfigError::InvalidCidr {
                value: entry.to_string(),
            })?;
            cidrs.push(net.trunc());
        }
        Ok(Self { cidrs })
    }

    pub fn is_trusted(&self, ip: &IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.cidrs.iter().any(|net| net.contains(&ip))
    }

    pub fn is_empty(&self) -> bool {
        self.cidrs.is_empty()
    }
}

/// 클라이언트 IP 결정 설정
#[derive(Debug, Clone, Default)]
pub struct ClientIpResolver {
    trusted: TrustedProxies,
    trust_forwarded_header: bool,
    header_names: Vec<String>,
}

impl ClientIpResolver {
    pub fn new(trusted: TrustedProxies, trust_forwarded_header: bool, header_names: Vec<String>) -> Self {
        let header_names = header_names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            trusted,
            trust_forwarded_header,
            header_names,
        }
    }

    pub fn trusted(&self) -> &TrustedProxies {
        &self.trusted
    }

    pub fn resolve(&self, remote: IpAddr, headers: &HeaderMap) -> IpAddr {
        resolve_client_ip(
            remote,
            &self.trusted,
            self.trust_forwarded_header,
            &self.header_names,
            headers,
        )
    }
}

/// 원격 주소와 요청 헤더로부터 클라이언트 IP를 결정합니다.
///
/// 원격 주소를 신뢰하지 않거나, 헤더 신뢰가 꺼져 있거나, 헤더 이름이 없으면
/// 원격 주소를 그대로 반환합니다. 헤더는 설정 순서대로 시도하고 모두 실패하면
/// 원격 주소로 돌아갑니다.
pub fn resolve_client_ip<S: AsRef<str>>(
    remote: IpAddr,
    trusted: &TrustedProxies,
    trust_forwarded_header: bool,
    header_names: &[S],
    headers: &HeaderMap,
) -> IpAddr {
    let remote = remote.to_canonical();

    if !trust_forwarded_header || header_names.is_empty() || !trusted.is_trusted(&remote) {
        return remote;
    }

    header_names
        .iter()
        .filter_map(|name| headers.get(name.as_ref()))
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| parse_forwarded_chain(value, trusted))
        .unwrap_or(remote)
}

/// 쉼표로 구분된 전달 체인을 오른쪽부터 검사합니다.
///
/// 파싱할 수 없는 항목을 만나면 이 헤더 전체를 무효로 봅니다.
pub fn parse_forwarded_chain(value: &str, trusted: &TrustedProxies) -> Option<IpAddr> {
    if value.trim().is_empty() {
        return None;
    }

    let items: Vec<&str> = value.split(',').collect();
    for (i, item) in items.iter().enumerate().rev() {
        let ip = item.trim().parse::<IpAddr>().ok()?.to_canonical();
        if i == 0 || !trusted.is_trusted(&ip) {
            return Some(ip);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_skips_blank_and_rejects_malformed() {
        let trusted = TrustedProxies::parse(&["10.0.0.0/8", "  ", ""]).unwrap();
        assert!(trusted.is_trusted(&ip("10.1.2.3")));
        assert!(!trusted.is_trusted(&ip("11.0.0.1")));

        let err = TrustedProxies::parse(&["10.0.0.0/8", "bogus"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCidr { value } if value == "bogus"));
    }

    #[test]
    fn test_no_prefixes_trusts_nothing() {
        let trusted = TrustedProxies::default();
        assert!(!trusted.is_trusted(&ip("127.0.0.1")));
    }

    #[test]
    fn test_mapped_ipv4_is_canonicalized() {
        let trusted = TrustedProxies::parse(&["127.0.0.0/8"]).unwrap();
        assert!(trusted.is_trusted(&ip("::ffff:127.0.0.1")));
    }

    #[test]
    fn test_chain_walk_right_to_left() {
        let trusted = TrustedProxies::parse(&["10.0.0.0/8"]).unwrap();
        assert_eq!(parse_forwarded_chain("9.9.9.9, 10.0.0.1", &trusted), Some(ip("9.9.9.9")));
        // 위조된 앞쪽 홉은 무시됩니다
        assert_eq!(
            parse_forwarded_chain("6.6.6.6, 9.9.9.9, 10.0.0.1", &trusted),
            Some(ip("9.9.9.9"))
        );
        // 모든 홉을 신뢰하면 가장 왼쪽 항목
        assert_eq!(parse_forwarded_chain("10.0.0.5, 10.0.0.1", &trusted), Some(ip("10.0.0.5")));
        assert_eq!(parse_forwarded_chain("garbage", &trusted), None);
        assert_eq!(parse_forwarded_chain("9.9.9.9, garbage", &trusted), None);
        assert_eq!(parse_forwarded_chain("", &trusted), None);
    }

    #[test]
    fn test_untrusted_remote_ignores_headers() {
        let trusted = TrustedProxies::parse(&["10.0.0.0/8"]).unwrap();
        let map = headers("x-forwarded-for", "9.9.9.9");
        let resolved = resolve_client_ip(ip("8.8.8.8"), &trusted, true, &["X-Forwarded-For"], &map);
        assert_eq!(resolved, ip("8.8.8.8"));
    }

    #[test]
    fn test_falls_through_header_names() {
        let trusted = TrustedProxies::parse(&["10.0.0.0/8"]).unwrap();
        let mut map = headers("x-forwarded-for", "not-an-ip");
        map.insert("x-real-ip", HeaderValue::from_static("7.7.7.7"));

        let resolved = resolve_client_ip(
            ip("10.0.0.1"),
            &trusted,
            true,
            &["X-Forwarded-For", "X-Real-IP"],
            &map,
        );
        assert_eq!(resolved, ip("7.7.7.7"));

        let resolved = resolve_client_ip(ip("10.0.0.1"), &trusted, true, &["X-Forwarded-For"], &map);
        assert_eq!(resolved, ip("10.0.0.1"));
    }

    #[test]
    fn test_disabled_header_trust_returns_remote() {
        let trusted = TrustedProxies::parse(&["10.0.0.0/8"]).unwrap();
        let map = headers("x-forwarded-for", "9.9.9.9");
        let resolver = ClientIpResolver::new(trusted, false, vec!["X-Forwarded-For".into()]);
        assert_eq!(resolver.resolve(ip("10.0.0.1"), &map), ip("10.0.0.1"));
    }
}
