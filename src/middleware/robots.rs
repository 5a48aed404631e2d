use bytes::Bytes;
use hyper::http::request::Parts;
use hyper::{header, Method, StatusCode};

use super::{response, AccessCheck, AccessContext, AccessOutcome};

const ROBOTS_PATH: &str = "/robots.txt";
const ALLOW: &str = "GET,HEAD,OPTIONS";

/// 설정된 robots.txt를 백엔드 대신 응답하는 단계
pub struct RobotsTxt {
    body: Bytes,
}

impl RobotsTxt {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: Bytes::from(body.into()) }
    }
}

impl AccessCheck for RobotsTxt {
    fn name(&self) -> &str {
        "robots-txt"
    }

    fn check(&self, _ctx: &AccessContext, parts: &mut Parts) -> AccessOutcome {
        if parts.uri.path() != ROBOTS_PATH {
            return AccessOutcome::Continue;
        }

        let response = match parts.method {
            Method::GET | Method::HEAD => response::text(StatusCode::OK, self.body.clone()),
            Method::OPTIONS => with_allow(response::empty(StatusCode::OK)),
            _ => with_allow(response::empty(StatusCode::METHOD_NOT_ALLOWED)),
        };

        AccessOutcome::Answered {
            reason: format!("사용자 정의 robots.txt 응답 ({})", parts.method),
            response,
        }
    }
}

fn with_allow(mut response: super::Response) -> super::Response {
    response
        .headers_mut()
        .insert(header::ALLOW, header::HeaderValue::from_static(ALLOW));
    response
}
