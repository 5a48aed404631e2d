use std::net::IpAddr;
use hyper::http::request::Parts;

use super::Response;

/// 접근 제어 단계가 참고하는 요청 문맥
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessContext {
    /// 신뢰 프록시 체인을 따라 결정된 클라이언트 IP
    pub client_ip: IpAddr,
    /// 소켓의 원격 주소
    pub remote_ip: IpAddr,
}

/// 접근 제어 단계의 판정 결과
#[derive(Debug)]
pub enum AccessOutcome {
    /// 다음 단계로 진행
    Continue,
    /// 정책에 의해 거부됨 (경고 레벨로 기록)
    Denied { reason: String, response: Response },
    /// 백엔드로 가지 않고 직접 응답함 (정보 레벨로 기록)
    Answered { reason: String, response: Response },
}

impl AccessOutcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, AccessOutcome::Continue)
    }
}

/// 접근 제어 단계 트레이트
///
/// 요청 헤더와 확장을 읽거나 수정할 수 있으며 본문에는 접근하지 않습니다.
pub trait AccessCheck: Send + Sync {
    /// 단계의 고유 이름을 반환합니다.
    fn name(&self) -> &str;

    /// 요청을 검사합니다.
    fn check(&self, ctx: &AccessContext, parts: &mut Parts) -> AccessOutcome;
}
