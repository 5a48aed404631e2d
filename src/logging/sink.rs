use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, Level};

/// 정책 싱크에 저장되는 한 줄의 접근 로그
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub proxy_key: String,
    pub client_ip: String,
    pub level: Level,
    pub content: String,
    /// 초 단위 유닉스 타임스탬프
    pub timestamp: i64,
}

impl LogRecord {
    pub fn new(proxy_key: impl Into<String>, client_ip: impl Into<String>, level: Level, content: impl Into<String>) -> Self {
        Self {
            proxy_key: proxy_key.into(),
            client_ip: client_ip.into(),
            level,
            content: content.into(),
            timestamp: OffsetDateTime::now_utc().unix_timestamp(),
        }
    }
}

/// 관리 계층에 노출하는 로그 항목
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogItem {
    pub proxy_key: String,
    #[serde(rename = "ClientIP")]
    pub client_ip: String,
    pub log_content: String,
    pub log_time: String,
}

impl From<&LogRecord> for LogItem {
    fn from(record: &LogRecord) -> Self {
        Self {
            proxy_key: record.proxy_key.clone(),
            client_ip: record.client_ip.clone(),
            log_content: record.content.clone(),
            log_time: format_log_time(record.timestamp),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn format_log_time(timestamp: i64) -> String {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|dt| dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]")).ok())
        .unwrap_or_default()
}

pub type FireCallback = Arc<dyn Fn(&LogRecord) + Send + Sync>;

struct SinkState {
    capacity: usize,
    records: VecDeque<LogRecord>,
}

/// 용량이 제한된 링 버퍼 로그 저장소
///
/// 여러 요청이 동시에 추가할 수 있고, 용량 변경은 기존 인스턴스를 수정하므로
/// 모든 추가 주체가 즉시 새 용량을 보게 됩니다.
pub struct LogSink {
    key: String,
    state: Mutex<SinkState>,
    fire: RwLock<Option<FireCallback>>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("key", &self.key)
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl LogSink {
    pub fn new(key: impl Into<String>, capacity: usize) -> Self {
        Self {
            key: key.into(),
            state: Mutex::new(SinkState {
                capacity,
                records: VecDeque::with_capacity(capacity.min(1024)),
            }),
            fire: RwLock::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 레코드를 추가하고, 용량을 넘는 오래된 레코드를 버립니다.
    /// 콜백은 잠금을 해제한 뒤 호출됩니다.
    pub fn append(&self, record: LogRecord) {
        {
            let mut state = self.state();
            if state.capacity > 0 {
                while state.records.len() >= state.capacity {
                    state.records.pop_front();
                }
                state.records.push_back(record.clone());
            }
        }

        let fire = self.fire.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(fire) = fire {
            fire(&record);
        }
    }

    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.state();
        state.capacity = capacity;
        while state.records.len() > capacity {
            state.records.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.state().capacity
    }

    pub fn set_fire_callback(&self, callback: Option<FireCallback>) {
        *self.fire.write().unwrap_or_else(|e| e.into_inner()) = callback;
    }

    /// 최근 `n`개 레코드를 오래된 순서로 반환합니다.
    pub fn last(&self, n: usize) -> Vec<LogRecord> {
        let state = self.state();
        let skip = state.records.len().saturating_sub(n);
        state.records.iter().skip(skip).cloned().collect()
    }

    pub fn last_items(&self, n: usize) -> Vec<LogItem> {
        self.last(n).iter().map(LogItem::from).collect()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 정책 키 → 로그 싱크 레지스트리
#[derive(Debug, Default)]
pub struct LogSinkRegistry {
    sinks: Mutex<HashMap<String, Arc<LogSink>>>,
}

impl LogSinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sinks(&self) -> MutexGuard<'_, HashMap<String, Arc<LogSink>>> {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 키에 해당하는 싱크를 반환합니다. 없으면 만들고, 용량이 다르면 조정합니다.
    pub fn get_or_create(&self, key: &str, capacity: usize) -> Arc<LogSink> {
        let mut sinks = self.sinks();
        match sinks.get(key) {
            Some(sink) => {
                if sink.capacity() != capacity {
                    debug!(key = %key, capacity, "로그 싱크 용량 변경");
                    sink.set_capacity(capacity);
                }
                sink.clone()
            }
            None => {
                let sink = Arc::new(LogSink::new(key, capacity));
                sinks.insert(key.to_string(), sink.clone());
                sink
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<LogSink>> {
        self.sinks().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Arc<LogSink>> {
        self.sinks().remove(key)
    }

    /// 주어진 키 집합에 없는 싱크를 제거하고 제거된 키를 반환합니다.
    pub fn retain(&self, keys: &HashSet<String>) -> Vec<String> {
        let mut sinks = self.sinks();
        let removed: Vec<String> = sinks
            .keys()
            .filter(|key| !keys.contains(*key))
            .cloned()
            .collect();
        for key in &removed {
            sinks.remove(key);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sinks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
