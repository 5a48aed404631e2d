/// 요청 단위 라우팅 오류. 규칙이나 다른 요청에는 영향을 주지 않습니다.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum RoutingError {
    /// Host 헤더 누락
    #[error("Host 헤더가 누락됨")]
    MissingHost,

    /// 유효하지 않은 호스트 이름
    #[error("유효하지 않은 호스트 {host}: {reason}")]
    InvalidHost { host: String, reason: String },

    /// 백엔드 주소가 설정되지 않음
    #[error("호스트 {host}에 대한 백엔드 주소가 없음")]
    NoBackend { host: String },

    /// 백엔드 주소를 URL로 변환할 수 없음
    #[error("{reason}")]
    InvalidLocation { location: String, reason: String },

    /// 지원하지 않는 백엔드 스킴
    #[error("지원하지 않는 스킴 {scheme}")]
    UnsupportedScheme { location: String, scheme: String },

    /// 백엔드 요청 실패
    #[error("백엔드 {location} 요청 실패: {error}")]
    Upstream { location: String, error: String },
}

impl RoutingError {
    /// 오류가 발생한 백엔드 주소
    pub fn location(&self) -> Option<&str> {
        match self {
            RoutingError::InvalidLocation { location, .. }
            | RoutingError::UnsupportedScheme { location, .. }
            | RoutingError::Upstream { location, .. } => Some(location),
            _ => None,
        }
    }
}
