use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use super::{validate_rule, ConfigError, DEFAULT_POLICY_ALIAS};
use crate::settings::{PolicySettings, RuleConfig};

/// 규칙 설정 목록
///
/// 모든 변경은 검증을 먼저 통과해야 하며, 실패하면 목록은 그대로 남습니다.
/// 검색은 항상 목록 자체를 대상으로 합니다.
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: RwLock<Vec<RuleConfig>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정 목록으로 저장소를 만듭니다. 하나라도 유효하지 않으면 실패합니다.
    pub fn from_rules(rules: Vec<RuleConfig>) -> Result<Self, ConfigError> {
        let store = Self::new();
        for rule in rules {
            store.add(rule)?;
        }
        Ok(store)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<RuleConfig>> {
        self.rules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<RuleConfig>> {
        self.rules.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn list(&self) -> Vec<RuleConfig> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, key: &str) -> Result<RuleConfig, ConfigError> {
        self.read()
            .iter()
            .find(|r| r.key == key)
            .cloned()
            .ok_or_else(|| ConfigError::RuleNotFound(key.to_string()))
    }

    pub fn add(&self, rule: RuleConfig) -> Result<(), ConfigError> {
        validate_rule(&rule)?;

        let mut rules = self.write();
        if rules.iter().any(|r| r.key == rule.key) {
            return Err(ConfigError::DuplicateRuleKey(rule.key));
        }
        check_policy_keys_unique(&rules, &rule)?;

        info!(rule = %rule.key, "규칙 추가");
        rules.push(rule);
        Ok(())
    }

    /// 규칙을 통째로 교체하고 이전 설정을 반환합니다.
    pub fn update(&self, rule: RuleConfig) -> Result<RuleConfig, ConfigError> {
        validate_rule(&rule)?;

        let mut rules = self.write();
        let index = position(&rules, &rule.key)?;
        check_policy_keys_unique(&rules, &rule)?;

        info!(rule = %rule.key, "규칙 수정");
        Ok(std::mem::replace(&mut rules[index], rule))
    }

    pub fn delete(&self, key: &str) -> Result<RuleConfig, ConfigError> {
        let mut rules = self.write();
        let index = position(&rules, key)?;
        info!(rule = %key, "규칙 삭제");
        Ok(rules.remove(index))
    }

    /// 규칙 활성화 플래그를 바꾸고 바뀐 설정을 반환합니다.
    pub fn set_enabled(&self, key: &str, enable: bool) -> Result<RuleConfig, ConfigError> {
        let mut rules = self.write();
        let index = position(&rules, key)?;
        rules[index].enable = enable;
        Ok(rules[index].clone())
    }

    /// 이름 있는 정책의 활성화 플래그를 바꿉니다. 기본 정책은 끌 수 없습니다.
    pub fn set_policy_enabled(&self, rule_key: &str, policy_key: &str, enable: bool) -> Result<RuleConfig, ConfigError> {
        let mut rules = self.write();
        let index = position(&rules, rule_key)?;
        let rule = &mut rules[index];
        let policy = rule
            .policies
            .iter_mut()
            .find(|p| p.key == policy_key)
            .ok_or_else(|| ConfigError::PolicyNotFound {
                rule_key: rule_key.to_string(),
                policy_key: policy_key.to_string(),
            })?;
        policy.enable = enable;
        Ok(rule.clone())
    }

    /// 정책 설정을 찾습니다. `"default"`와 규칙 키는 기본 정책을 가리킵니다.
    pub fn policy(&self, rule_key: &str, policy_key: &str) -> Result<PolicySettings, ConfigError> {
        let rules = self.read();
        let rule = rules
            .iter()
            .find(|r| r.key == rule_key)
            .ok_or_else(|| ConfigError::RuleNotFound(rule_key.to_string()))?;

        if policy_key == DEFAULT_POLICY_ALIAS || policy_key == rule.key {
            return Ok(rule.default_policy.clone());
        }
        rule.policies
            .iter()
            .find(|p| p.key == policy_key)
            .map(|p| p.settings.clone())
            .ok_or_else(|| ConfigError::PolicyNotFound {
                rule_key: rule_key.to_string(),
                policy_key: policy_key.to_string(),
            })
    }

    /// 모든 규칙의 정책 키 (로그 싱크 정리에 사용)
    pub fn policy_keys(&self) -> HashSet<String> {
        self.read().iter().flat_map(|r| r.policy_keys()).collect()
    }
}

fn position(rules: &[RuleConfig], key: &str) -> Result<usize, ConfigError> {
    rules
        .iter()
        .position(|r| r.key == key)
        .ok_or_else(|| ConfigError::RuleNotFound(key.to_string()))
}

/// 로그 싱크는 정책 키로 공유되므로 다른 규칙과 정책 키가 겹치면 안 됩니다.
fn check_policy_keys_unique(rules: &[RuleConfig], rule: &RuleConfig) -> Result<(), ConfigError> {
    let taken: HashSet<String> = rules
        .iter()
        .filter(|r| r.key != rule.key)
        .flat_map(|r| r.policy_keys())
        .collect();

    match rule.policy_keys().into_iter().find(|k| taken.contains(k)) {
        Some(policy_key) => Err(ConfigError::DuplicatePolicyKey {
            rule_key: rule.key.clone(),
            policy_key,
        }),
        None => Ok(()),
    }
}
