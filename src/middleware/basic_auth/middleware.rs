use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hyper::http::request::Parts;
use hyper::{header, StatusCode};

use super::auth::Authenticator;
use crate::middleware::{response, AccessCheck, AccessContext, AccessOutcome, Response};

pub const REALM: &str = "Authorization Required";

/// 인증에 성공한 사용자. 요청 확장에 저장됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Basic 인증 단계
pub struct BasicAuthMiddleware {
    realm: String,
    authenticator: Box<dyn Authenticator>,
}

impl BasicAuthMiddleware {
    pub fn new(authenticator: Box<dyn Authenticator>) -> Self {
        Self {
            realm: REALM.to_string(),
            authenticator,
        }
    }

    /// Authorization 헤더에서 자격증명을 추출합니다.
    fn extract_credentials(parts: &Parts) -> Option<(String, String)> {
        parts.headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Basic "))
            .and_then(|credentials| BASE64.decode(credentials.trim()).ok())
            .and_then(|decoded| String::from_utf8(decoded).ok())
            .and_then(|pair| {
                let (user, password) = pair.split_once(':')?;
                Some((user.to_string(), password.to_string()))
            })
    }

    /// 401 Unauthorized 응답을 생성합니다.
    fn unauthorized_response(&self) -> Response {
        let mut response = response::empty(StatusCode::UNAUTHORIZED);
        if let Ok(value) = header::HeaderValue::from_str(&format!("Basic realm=\"{}\"", self.realm)) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

impl AccessCheck for BasicAuthMiddleware {
    fn name(&self) -> &str {
        "basic-auth"
    }

    fn check(&self, _ctx: &AccessContext, parts: &mut Parts) -> AccessOutcome {
        match Self::extract_credentials(parts) {
            Some((username, password)) if self.authenticator.verify_credentials(&username, &password) => {
                parts.extensions.insert(AuthenticatedUser(username));
                AccessOutcome::Continue
            }
            Some((username, _)) => AccessOutcome::Denied {
                reason: format!("BasicAuth 인증 실패: 사용자 [{}]", username),
                response: self.unauthorized_response(),
            },
            None => AccessOutcome::Denied {
                reason: "BasicAuth 인증 실패: Authorization 헤더 없음".to_string(),
                response: self.unauthorized_response(),
            },
        }
    }
}
