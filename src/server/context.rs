use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use super::registry::ListenerRegistry;
use super::Result;
use crate::logging::{LogItem, LogSinkRegistry};
use crate::middleware::SafeIpLists;
use crate::rule::{Rule, RuleStore};
use crate::settings::{RuleConfig, Settings};

/// 규칙 목록, 로그 싱크, 리스너를 소유하는 최상위 서버 문맥
pub struct ServerContext {
    store: RuleStore,
    sinks: LogSinkRegistry,
    ip_lists: Arc<SafeIpLists>,
    listeners: ListenerRegistry,
    // 설정 조회와 리스너 시작/정지를 한 단위로 묶는 잠금
    lifecycle: Mutex<()>,
}

impl ServerContext {
    pub fn new(settings: &Settings) -> Result<Self> {
        let ip_lists = Arc::new(SafeIpLists::from_settings(&settings.ip_filter)?);
        let store = RuleStore::from_rules(settings.rules.clone())?;

        Ok(Self {
            store,
            sinks: LogSinkRegistry::new(),
            ip_lists,
            listeners: ListenerRegistry::new(settings.server.start_grace()),
            lifecycle: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn sinks(&self) -> &LogSinkRegistry {
        &self.sinks
    }

    fn build_rule(&self, key: &str) -> Result<Arc<Rule>> {
        let config = self.store.get(key)?;
        Ok(Arc::new(Rule::build(config, &self.sinks, self.ip_lists.clone())?))
    }

    #[instrument(skip(self), err(Display))]
    pub async fn start_rule(&self, key: &str) -> Result<SocketAddr> {
        let _guard = self.lifecycle.lock().await;
        self.start_locked(key).await
    }

    // `lifecycle` 잠금을 잡은 상태에서만 호출
    async fn start_locked(&self, key: &str) -> Result<SocketAddr> {
        let rule = self.build_rule(key)?;
        self.listeners.start(rule).await
    }

    pub async fn stop_rule(&self, key: &str) -> bool {
        let _guard = self.lifecycle.lock().await;
        self.listeners.stop(key).await
    }

    pub async fn is_running(&self, key: &str) -> bool {
        self.listeners.is_running(key).await
    }

    /// 활성화된 규칙을 모두 시작하고 시작된 수를 반환합니다. 실패한 규칙은 기록만 합니다.
    pub async fn start_enabled(&self) -> usize {
        let mut started = 0;
        for rule in self.store.list().into_iter().filter(|r| r.enable) {
            match self.start_rule(&rule.key).await {
                Ok(addr) => {
                    info!(rule = %rule.key, name = %rule.name, addr = %addr, "규칙 시작");
                    started += 1;
                }
                Err(e) => error!(rule = %rule.key, error = %e, "규칙 시작 실패"),
            }
        }
        started
    }

    pub async fn stop_all(&self) -> usize {
        self.listeners.stop_all().await
    }

    /// 규칙을 추가합니다. 활성화되어 있으면 바로 시작합니다.
    pub async fn add_rule(&self, config: RuleConfig) -> Result<()> {
        let key = config.key.clone();
        let enable = config.enable;
        let _guard = self.lifecycle.lock().await;
        self.store.add(config)?;
        if enable {
            self.start_locked(&key).await?;
        }
        Ok(())
    }

    /// 규칙을 통째로 교체합니다. 실행 중이었다면 새 설정으로 다시 시작합니다.
    pub async fn update_rule(&self, config: RuleConfig) -> Result<()> {
        let key = config.key.clone();
        let _guard = self.lifecycle.lock().await;
        self.store.update(config)?;
        self.tidy_sinks();

        if self.listeners.stop(&key).await {
            self.start_locked(&key).await?;
        }
        Ok(())
    }

    /// 규칙을 정지하고 삭제한 뒤 더 이상 쓰이지 않는 로그 싱크를 정리합니다.
    pub async fn delete_rule(&self, key: &str) -> Result<RuleConfig> {
        let _guard = self.lifecycle.lock().await;
        self.store.get(key)?;
        self.listeners.stop(key).await;
        let removed = self.store.delete(key)?;
        self.tidy_sinks();
        Ok(removed)
    }

    /// 활성화 플래그를 저장한 뒤 규칙을 시작하거나 정지합니다.
    pub async fn enable_rule(&self, key: &str, enable: bool) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        self.store.set_enabled(key, enable)?;
        if enable {
            if !self.listeners.is_running(key).await {
                self.start_locked(key).await?;
            }
        } else {
            self.listeners.stop(key).await;
        }
        Ok(())
    }

    /// 이름 있는 정책의 활성화 플래그를 바꿉니다. 실행 중인 규칙은 다시 시작됩니다.
    pub async fn enable_policy(&self, rule_key: &str, policy_key: &str, enable: bool) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        self.store.set_policy_enabled(rule_key, policy_key, enable)?;
        if self.listeners.stop(rule_key).await {
            self.start_locked(rule_key).await?;
        }
        Ok(())
    }

    /// 규칙의 정책별 최근 접근 로그
    pub async fn last_logs(&self, key: &str) -> Result<HashMap<String, Vec<LogItem>>> {
        if let Some(rule) = self.listeners.rule(key).await {
            return Ok(rule.last_logs());
        }
        Ok(self.build_rule(key)?.last_logs())
    }

    pub async fn local_addr(&self, key: &str) -> Option<SocketAddr> {
        self.listeners.local_addr(key).await
    }

    fn tidy_sinks(&self) {
        let removed = self.sinks.retain(&self.store.policy_keys());
        if !removed.is_empty() {
            info!(keys = ?removed, "사용하지 않는 로그 싱크 제거");
        }
    }
}
