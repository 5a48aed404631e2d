use hyper::header;

use crate::routing::RoutingError;

/// 호스트 정보를 담는 불변 데이터 구조입니다.
///
/// # 필드
///
/// * `name` - 포트를 제거하고 소문자로 정규화한 호스트 이름 (예: "example.com")
/// * `port` - 선택적 포트 번호
#[derive(Clone, Debug, PartialEq)]
pub struct HostInfo {
    pub name: String,
    pub port: Option<u16>,
}

impl HostInfo {
    /// 호스트 헤더 값에서 HostInfo를 생성합니다.
    ///
    /// IPv6 리터럴은 대괄호 표기(`[::1]:8080`)를 지원합니다.
    ///
    /// # 예제
    ///
    /// ```
    /// use reverse_proxy_rules::routing::HostInfo;
    ///
    /// let host_info = HostInfo::from_header_value("Example.com:8080").unwrap();
    /// assert_eq!(host_info.name, "example.com");
    /// assert_eq!(host_info.port, Some(8080));
    /// ```
    pub fn from_header_value(value: &str) -> Result<Self, RoutingError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RoutingError::InvalidHost {
                host: value.to_string(),
                reason: "Invalid format".to_string(),
            });
        }

        if let Some(rest) = value.strip_prefix('[') {
            let (name, tail) = rest.split_once(']').ok_or_else(|| RoutingError::InvalidHost {
                host: value.to_string(),
                reason: "닫는 대괄호가 없음".to_string(),
            })?;
            let port = match tail {
                "" => None,
                tail => Some(Self::parse_port(value, tail.trim_start_matches(':'))?),
            };
            return Ok(HostInfo { name: name.to_lowercase(), port });
        }

        match value.matches(':').count() {
            0 => Ok(HostInfo { name: value.to_lowercase(), port: None }),
            1 => {
                let (name, port) = value.split_once(':').unwrap_or((value, ""));
                if name.is_empty() {
                    return Err(RoutingError::InvalidHost {
                        host: value.to_string(),
                        reason: "Invalid format".to_string(),
                    });
                }
                Ok(HostInfo {
                    name: name.to_lowercase(),
                    port: Some(Self::parse_port(value, port)?),
                })
            }
            // 대괄호 없는 IPv6 리터럴
            _ => Ok(HostInfo { name: value.to_lowercase(), port: None }),
        }
    }

    fn parse_port(host: &str, port: &str) -> Result<u16, RoutingError> {
        port.parse::<u16>().map_err(|_| RoutingError::InvalidHost {
            host: host.to_string(),
            reason: format!("유효하지 않은 포트 {}", port),
        })
    }

    /// HTTP 요청에서 호스트 정보를 추출합니다. Host 헤더가 없으면 URI authority를 사용합니다.
    pub fn from_request<B>(req: &hyper::Request<B>) -> Result<Self, RoutingError> {
        if let Some(value) = req.headers().get(header::HOST) {
            let host = value.to_str().map_err(|e| RoutingError::InvalidHost {
                host: String::from_utf8_lossy(value.as_bytes()).to_string(),
                reason: e.to_string(),
            })?;
            return Self::from_header_value(host);
        }

        match req.uri().authority() {
            Some(authority) => Self::from_header_value(authority.as_str()),
            None => Err(RoutingError::MissingHost),
        }
    }
}
