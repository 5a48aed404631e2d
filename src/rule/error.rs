/// 설정 검증 오류. 설정 변경을 요청한 쪽에 동기적으로 반환되며,
/// 오류가 나면 아무것도 반영되거나 활성화되지 않습니다.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("규칙 {rule_key}: 도메인 [{domain}] 충돌")]
    DomainConflict { rule_key: String, domain: String },

    #[error("[{value}] 네트워크 형식 오류")]
    InvalidCidr { value: String },

    #[error("리슨 주소 {value} 오류: {reason}")]
    InvalidListenAddress { value: String, reason: String },

    #[error("유효하지 않은 헤더 이름: {value}")]
    InvalidHeaderName { value: String },

    #[error("유효하지 않은 로그 레벨: {value}")]
    InvalidLogLevel { value: String },

    #[error("규칙 {rule_key}: TLS {which} 경로가 설정되지 않음")]
    MissingTlsFile { rule_key: String, which: &'static str },

    #[error("중복된 규칙 키: {0}")]
    DuplicateRuleKey(String),

    #[error("규칙 {rule_key}: 중복되거나 예약된 정책 키 {policy_key}")]
    DuplicatePolicyKey { rule_key: String, policy_key: String },

    #[error("규칙 {0}을(를) 찾을 수 없음")]
    RuleNotFound(String),

    #[error("규칙 {rule_key}에서 정책 {policy_key}을(를) 찾을 수 없음")]
    PolicyNotFound { rule_key: String, policy_key: String },
}
