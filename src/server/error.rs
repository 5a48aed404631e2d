use std::fmt;
use std::net::SocketAddr;

use crate::rule::ConfigError;

/// 리스너 수명 주기 오류. 오류가 나면 규칙은 정지 상태로 남습니다.
#[derive(Debug)]
pub enum Error {
    /// 같은 규칙 키의 리스너가 이미 실행 중
    AlreadyRunning { rule_key: String, addr: SocketAddr },
    /// 주소 바인딩 실패
    Bind { addr: SocketAddr, source: std::io::Error },
    /// 유예 시간 안에 서빙이 종료됨
    Serve(String),
    /// TLS 설정 로드 실패
    Tls(String),
    /// 규칙 설정 오류
    Config(ConfigError),
    Io(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyRunning { rule_key, addr } => {
                write!(f, "규칙 {}이(가) 이미 {}에서 실행 중", rule_key, addr)
            }
            Error::Bind { addr, source } => write!(f, "{} 바인딩 실패: {}", addr, source),
            Error::Serve(msg) => write!(f, "서빙 실패: {}", msg),
            Error::Tls(msg) => write!(f, "TLS 오류: {}", msg),
            Error::Config(e) => write!(f, "설정 오류: {}", e),
            Error::Io(e) => write!(f, "IO 오류: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. } => Some(source),
            Error::Config(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}
