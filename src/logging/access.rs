use std::net::IpAddr;
use std::sync::Arc;
use hyper::header;
use hyper::http::request::Parts;
use tracing::{debug, error, info, trace, warn, Level};

use super::sink::{LogItem, LogRecord, LogSink, LogSinkRegistry};
use crate::rule::ConfigError;
use crate::settings::{logging::parse_level, AccessLogSettings};

/// 접근 로그에 함께 기록되는 요청 정보
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    pub client_ip: IpAddr,
    pub remote_ip: IpAddr,
    pub method: String,
    pub host: String,
    pub url: String,
    pub user_agent: String,
}

impl RequestInfo {
    pub fn new(parts: &Parts, client_ip: IpAddr, remote_ip: IpAddr) -> Self {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        Self {
            client_ip,
            remote_ip,
            method: parts.method.to_string(),
            host,
            url: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| parts.uri.path().to_string()),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{ClientIP}", &self.client_ip.to_string())
            .replace("{RemoteIP}", &self.remote_ip.to_string())
            .replace("{Method}", &self.method)
            .replace("{Host}", &self.host)
            .replace("{URL}", &self.url)
            .replace("{UserAgent}", &self.user_agent)
    }
}

/// 정책 하나의 접근 로그 기록기
#[derive(Debug, Clone)]
pub struct AccessLogger {
    key: String,
    enabled: bool,
    min_level: Level,
    request_format: String,
    preview_count: usize,
    sink: Arc<LogSink>,
}

impl AccessLogger {
    /// 레지스트리에서 정책 키의 싱크를 가져오거나 만들고 콘솔 출력 콜백을 설정합니다.
    pub fn new(key: &str, settings: &AccessLogSettings, sinks: &LogSinkRegistry) -> Result<Self, ConfigError> {
        let min_level = parse_level(&settings.level).ok_or_else(|| ConfigError::InvalidLogLevel {
            value: settings.level.clone(),
        })?;

        let sink = sinks.get_or_create(key, settings.max_count);
        if settings.console {
            sink.set_fire_callback(Some(Arc::new(echo_to_console)));
        } else {
            sink.set_fire_callback(None);
        }

        Ok(Self {
            key: key.to_string(),
            enabled: settings.enable,
            min_level,
            request_format: settings.request_format.clone(),
            preview_count: settings.preview_count,
            sink,
        })
    }

    pub fn enabled(&self, level: Level) -> bool {
        // tracing에서는 상세한 레벨일수록 크다
        self.enabled && level <= self.min_level
    }

    pub fn log(&self, level: Level, info: &RequestInfo, message: impl std::fmt::Display) {
        if !self.enabled(level) {
            return;
        }

        let content = self.format(level, info, &message.to_string());
        self.sink
            .append(LogRecord::new(&self.key, info.client_ip.to_string(), level, content));
    }

    fn format(&self, level: Level, info: &RequestInfo, message: &str) -> String {
        if !self.request_format.is_empty() {
            return format!("{} {}", info.render(&self.request_format), message);
        }

        serde_json::json!({
            "level": level.as_str().to_lowercase(),
            "msg": message,
            "ExtInfo": {
                "ClientIP": info.client_ip.to_string(),
                "RemoteIP": info.remote_ip.to_string(),
                "Method": info.method,
                "Host": info.host,
                "URL": info.url,
                "UserAgent": info.user_agent,
            },
        })
        .to_string()
    }

    pub fn sink(&self) -> &Arc<LogSink> {
        &self.sink
    }

    /// 관리 화면용 최근 로그
    pub fn last_items(&self) -> Vec<LogItem> {
        self.sink.last_items(self.preview_count)
    }
}

fn echo_to_console(record: &LogRecord) {
    let key = record.proxy_key.as_str();
    let client_ip = record.client_ip.as_str();
    match record.level {
        Level::ERROR => error!(target: "access_log", proxy = key, client_ip, "{}", record.content),
        Level::WARN => warn!(target: "access_log", proxy = key, client_ip, "{}", record.content),
        Level::INFO => info!(target: "access_log", proxy = key, client_ip, "{}", record.content),
        Level::DEBUG => debug!(target: "access_log", proxy = key, client_ip, "{}", record.content),
        _ => trace!(target: "access_log", proxy = key, client_ip, "{}", record.content),
    }
}
