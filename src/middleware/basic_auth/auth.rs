use subtle::ConstantTimeEq;

use crate::settings::BasicAuthSettings;

/// Basic 인증을 위한 인증기 트레이트
///
/// # 지원하는 해시 알고리즘
/// - bcrypt ($2a$, $2b$, $2y$ 접두사)
/// - 그 외 값은 평문으로 보고 상수 시간 비교
pub trait Authenticator: Send + Sync {
    /// 사용자 자격증명을 검증합니다.
    fn verify_credentials(&self, username: &str, password: &str) -> bool;
}

/// 단일 사용자 인증기
pub struct SingleUserAuthenticator {
    user: String,
    password: String,
}

impl SingleUserAuthenticator {
    pub fn new(config: &BasicAuthSettings) -> Self {
        Self {
            user: config.user.clone(),
            password: config.password.clone(),
        }
    }
}

impl Authenticator for SingleUserAuthenticator {
    fn verify_credentials(&self, username: &str, password: &str) -> bool {
        let user_ok: bool = username.as_bytes().ct_eq(self.user.as_bytes()).into();
        let password_ok = verify_password(password, &self.password);
        user_ok & password_ok
    }
}

/// 비밀번호 검증 함수
fn verify_password(password: &str, expected: &str) -> bool {
    if expected.starts_with("$2") {
        bcrypt::verify(password, expected).unwrap_or(false)
    } else {
        password.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: String) -> BasicAuthSettings {
        BasicAuthSettings {
            enable: true,
            user: "admin".to_string(),
            password,
        }
    }

    #[test]
    fn test_plain_password() {
        let authenticator = SingleUserAuthenticator::new(&config("secret".to_string()));
        assert!(authenticator.verify_credentials("admin", "secret"));
        assert!(!authenticator.verify_credentials("admin", "wrong"));
        assert!(!authenticator.verify_credentials("root", "secret"));
    }

    #[test]
    fn test_bcrypt_password() {
        let hash = bcrypt::hash("secret", 4).unwrap();
        let authenticator = SingleUserAuthenticator::new(&config(hash));
        assert!(authenticator.verify_credentials("admin", "secret"));
        assert!(!authenticator.verify_credentials("admin", "wrong"));
    }
}
