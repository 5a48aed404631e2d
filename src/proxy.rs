use std::net::IpAddr;
use std::time::Instant;
use hyper::body::Incoming;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Request, Uri};
use http_body_util::BodyExt;
use hyper_util::client::legacy;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use url::Url;
use uuid::Uuid;
use tracing::{debug, info, instrument};

use crate::middleware::Response;
use crate::routing::RoutingError;

/// 홉 단위 헤더는 백엔드로 전달하지 않습니다.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// 백엔드 요청을 위한 불변 클라이언트
#[derive(Clone)]
pub struct ProxyClient {
    client: legacy::Client<HttpConnector, Incoming>,
}

impl Default for ProxyClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyClient {
    pub fn new() -> Self {
        let connector = HttpConnector::new();
        let client = legacy::Client::builder(TokioExecutor::new())
            .build::<_, Incoming>(connector);

        Self { client }
    }

    /// 요청을 백엔드 주소로 전달합니다.
    ///
    /// 주소 변환 실패와 백엔드 왕복 실패는 `RoutingError`로 반환되며
    /// 호출자가 502 응답으로 바꿉니다.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), location = %location))]
    pub async fn forward(
        &self,
        location: &str,
        mut parts: Parts,
        body: Incoming,
        client_ip: IpAddr,
        client_ip_header: Option<&HeaderName>,
    ) -> Result<Response, RoutingError> {
        let start_time = Instant::now();
        let target = build_target(location, &parts.uri)?;

        rewrite_headers(&mut parts.headers, &target, client_ip, client_ip_header);
        parts.uri = target;
        debug!(method = %parts.method, uri = %parts.uri, "백엔드 요청");

        let res = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| upstream(location, e))?;

        let (mut parts, body) = res.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        info!(
            status = %parts.status,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "백엔드 응답 수신"
        );
        Ok(Response::from_parts(parts, body.boxed_unsync()))
    }
}

/// 백엔드 주소와 요청 URI로부터 전달할 URI를 만듭니다.
///
/// 백엔드 주소에서는 스킴과 호스트만 사용하고 요청 경로와 쿼리는 그대로 전달합니다.
pub fn build_target(location: &str, request_uri: &Uri) -> Result<Uri, RoutingError> {
    let invalid = |reason: String| RoutingError::InvalidLocation {
        location: location.to_string(),
        reason,
    };

    let url = Url::parse(location.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" {
        return Err(RoutingError::UnsupportedScheme {
            location: location.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    let host = url
        .host_str()
        .ok_or_else(|| invalid("호스트가 없음".to_string()))?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let path_and_query = request_uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");

    format!("http://{}{}", authority, path_and_query)
        .parse::<Uri>()
        .map_err(|e| invalid(e.to_string()))
}

fn upstream(location: &str, error: impl std::fmt::Display) -> RoutingError {
    RoutingError::Upstream {
        location: location.to_string(),
        error: error.to_string(),
    }
}

fn rewrite_headers(
    headers: &mut HeaderMap,
    target: &Uri,
    client_ip: IpAddr,
    client_ip_header: Option<&HeaderName>,
) {
    strip_hop_by_hop(headers);

    if let Some(value) = target
        .authority()
        .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    {
        headers.insert(header::HOST, value);
    }

    if let Some(name) = client_ip_header {
        if let Ok(value) = HeaderValue::from_str(&client_ip.to_string()) {
            headers.append(name.clone(), value);
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_build_target_keeps_request_path_and_query() {
        let target = build_target("http://127.0.0.1:9000", &uri("/api/users?id=1")).unwrap();
        assert_eq!(target, uri("http://127.0.0.1:9000/api/users?id=1"));

        // 백엔드 주소의 경로와 쿼리는 무시
        let target = build_target("http://backend/base?k=v", &uri("/x?y=1")).unwrap();
        assert_eq!(target, uri("http://backend/x?y=1"));

        let target = build_target("http://[::1]:8080/base", &uri("/")).unwrap();
        assert_eq!(target, uri("http://[::1]:8080/"));

        let target = build_target("http://backend:80", &uri("/only/path")).unwrap();
        assert_eq!(target.path_and_query().unwrap().as_str(), "/only/path");
    }

    #[test]
    fn test_build_target_errors() {
        let err = build_target("ht tp://bad", &uri("/")).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidLocation { .. }));
        assert_eq!(err.location(), Some("ht tp://bad"));

        let err = build_target("https://secure.example.com", &uri("/")).unwrap_err();
        assert!(matches!(err, RoutingError::UnsupportedScheme { scheme, .. } if scheme == "https"));
    }

    #[test]
    fn test_rewrite_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("front.example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-secret"));
        headers.insert("x-secret", HeaderValue::from_static("1"));
        headers.insert("x-client-ip", HeaderValue::from_static("1.1.1.1"));
        headers.insert("x-custom", HeaderValue::from_static("kept"));

        let name = HeaderName::from_static("x-client-ip");
        rewrite_headers(
            &mut headers,
            &uri("http://127.0.0.1:9000/"),
            "9.9.9.9".parse().unwrap(),
            Some(&name),
        );

        assert_eq!(headers.get(header::HOST).unwrap(), "127.0.0.1:9000");
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("x-secret").is_none());
        assert_eq!(headers.get("x-custom").unwrap(), "kept");
        let ips: Vec<_> = headers.get_all("x-client-ip").iter().collect();
        assert_eq!(ips, vec!["1.1.1.1", "9.9.9.9"]);
    }
}
