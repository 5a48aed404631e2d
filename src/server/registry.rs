use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, instrument};

use super::error::Error;
use super::listener::RuleListener;
use super::Result;
use crate::proxy::ProxyClient;
use crate::rule::Rule;

struct ListenerHandle {
    rule: Arc<Rule>,
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

/// 규칙 키 → 실행 중인 리스너
///
/// 시작과 정지는 레지스트리 전체 잠금 안에서 일어나므로 같은 키로
/// 동시에 시작해도 리스너는 최대 하나만 만들어집니다.
pub struct ListenerRegistry {
    handles: Mutex<HashMap<String, ListenerHandle>>,
    grace: Duration,
    client: ProxyClient,
}

impl ListenerRegistry {
    pub fn new(grace: Duration) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            grace,
            client: ProxyClient::new(),
        }
    }

    /// 규칙의 리스너를 시작하고 실제 바인딩된 주소를 반환합니다.
    ///
    /// 바인딩 후 유예 시간 동안 서빙 작업이 끝나지 않아야 실행 중으로 등록됩니다.
    #[instrument(skip_all, fields(rule = %rule.key()), err(Display))]
    pub async fn start(&self, rule: Arc<Rule>) -> Result<SocketAddr> {
        let key = rule.key().to_string();
        let mut handles = self.handles.lock().await;

        if let Some(handle) = handles.get(&key) {
            if !handle.task.is_finished() {
                return Err(Error::AlreadyRunning { rule_key: key, addr: handle.addr });
            }
            handles.remove(&key);
        }

        let listener = RuleListener::bind(rule.clone()).await?;
        let addr = listener.local_addr()?;
        let (shutdown, rx) = watch::channel(false);
        let mut task = tokio::spawn(listener.run(self.client.clone(), rx));

        if let Ok(joined) = timeout(self.grace, &mut task).await {
            let err = match joined {
                Ok(Ok(())) => Error::Serve("리스너가 바로 종료됨".to_string()),
                Ok(Err(e)) => e,
                Err(e) => Error::Serve(e.to_string()),
            };
            error!(error = %err, "리스너 시작 실패");
            return Err(err);
        }

        info!(addr = %addr, "리스너 실행 중");
        handles.insert(key, ListenerHandle { rule, addr, shutdown, task });
        Ok(addr)
    }

    /// 리스너를 정지합니다. 실행 중이 아니면 아무것도 하지 않고 `false`를 반환합니다.
    pub async fn stop(&self, key: &str) -> bool {
        let mut handles = self.handles.lock().await;
        let Some(handle) = handles.remove(key) else {
            return false;
        };

        let _ = handle.shutdown.send(true);
        match handle.task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(rule = %key, error = %e, "리스너 종료 중 오류"),
            Err(e) => error!(rule = %key, error = %e, "리스너 작업 실패"),
        }
        info!(rule = %key, addr = %handle.addr, "리스너 정지");
        true
    }

    pub async fn stop_all(&self) -> usize {
        let keys = self.running_keys().await;
        let mut stopped = 0;
        for key in keys {
            if self.stop(&key).await {
                stopped += 1;
            }
        }
        stopped
    }

    pub async fn is_running(&self, key: &str) -> bool {
        self.handles
            .lock()
            .await
            .get(key)
            .is_some_and(|h| !h.task.is_finished())
    }

    pub async fn local_addr(&self, key: &str) -> Option<SocketAddr> {
        self.handles.lock().await.get(key).map(|h| h.addr)
    }

    /// 실행 중인 규칙 인스턴스
    pub async fn rule(&self, key: &str) -> Option<Arc<Rule>> {
        self.handles.lock().await.get(key).map(|h| h.rule.clone())
    }

    pub async fn running_keys(&self) -> Vec<String> {
        self.handles.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogSinkRegistry;
    use crate::settings::RuleConfig;

    fn rule(key: &str) -> Arc<Rule> {
        let config: RuleConfig =
            toml::from_str(&format!("key = \"{}\"\nlisten_ip = \"127.0.0.1\"\nlisten_port = 0", key)).unwrap();
        Arc::new(Rule::build(config, &LogSinkRegistry::new(), Arc::default()).unwrap())
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let registry = ListenerRegistry::new(Duration::from_millis(50));
        let r = rule("r1");

        let addr = registry.start(r.clone()).await.unwrap();
        assert!(registry.is_running("r1").await);
        assert_eq!(registry.local_addr("r1").await, Some(addr));

        let err = registry.start(r).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning { rule_key, .. } if rule_key == "r1"));

        assert!(registry.stop("r1").await);
        assert!(!registry.is_running("r1").await);
    }

    #[tokio::test]
    async fn test_stop_never_started_is_noop() {
        let registry = ListenerRegistry::new(Duration::from_millis(50));
        assert!(!registry.stop("ghost").await);
        assert_eq!(registry.stop_all().await, 0);
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_rule_stopped() {
        let registry = ListenerRegistry::new(Duration::from_millis(50));
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let config: RuleConfig =
            toml::from_str(&format!("key = \"busy\"\nlisten_ip = \"127.0.0.1\"\nlisten_port = {}", port)).unwrap();
        let rule = Arc::new(Rule::build(config, &LogSinkRegistry::new(), Arc::default()).unwrap());

        assert!(matches!(registry.start(rule).await, Err(Error::Bind { .. })));
        assert!(!registry.is_running("busy").await);
    }
}
