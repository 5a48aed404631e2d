use std::collections::HashMap;
use tracing::debug;

use crate::rule::ConfigError;
use crate::settings::NamedPolicyConfig;

/// 가상 호스트 → 이름 있는 정책 인덱스 테이블입니다.
///
/// 규칙 리비전마다 한 번 만들어지고 이후에는 읽기 전용입니다.
/// 설정이 바뀌면 테이블을 부분 수정하지 않고 규칙 전체를 다시 만듭니다.
#[derive(Debug, Clone, Default)]
pub struct DomainTable {
    domains: HashMap<String, usize>,
}

impl DomainTable {
    /// 정책 목록에서 도메인 테이블을 만듭니다.
    ///
    /// 같은 도메인을 두 정책이 선언하면 `DomainConflict`로 실패합니다.
    /// 비활성화된 정책의 도메인도 충돌 검사 대상입니다.
    pub fn build(rule_key: &str, policies: &[NamedPolicyConfig]) -> Result<Self, ConfigError> {
        let mut domains = HashMap::new();

        for (index, policy) in policies.iter().enumerate() {
            for domain in &policy.domains {
                let domain = domain.trim().to_lowercase();
                if domain.is_empty() {
                    continue;
                }
                if domains.insert(domain.clone(), index).is_some() {
                    return Err(ConfigError::DomainConflict {
                        rule_key: rule_key.to_string(),
                        domain,
                    });
                }
            }
        }

        debug!(rule = %rule_key, domains = domains.len(), "도메인 테이블 생성");
        Ok(Self { domains })
    }

    /// 포트가 제거된 호스트 이름으로 정책 인덱스를 찾습니다.
    pub fn resolve(&self, host: &str) -> Option<usize> {
        self.domains.get(host).copied()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
