mod auth;
mod middleware;

pub use auth::{Authenticator, SingleUserAuthenticator};
pub use middleware::{AuthenticatedUser, BasicAuthMiddleware, REALM};

use crate::settings::BasicAuthSettings;

/// 설정에서 Basic 인증 단계를 만듭니다. 비활성화되었거나 사용자 이름이 없으면 `None`입니다.
pub fn create_basic_auth(config: &BasicAuthSettings) -> Option<BasicAuthMiddleware> {
    if !config.enable || config.user.is_empty() {
        return None;
    }
    Some(BasicAuthMiddleware::new(Box::new(SingleUserAuthenticator::new(config))))
}
