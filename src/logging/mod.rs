//! 프로세스 로그 초기화와 정책별 접근 로그.

mod access;
mod sink;

pub use access::{AccessLogger, RequestInfo};
pub use sink::{LogItem, LogRecord, LogSink, LogSinkRegistry};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};
use std::path::Path;

use crate::settings::{LogFormat, LogOutput, LogSettings};

/// 전역 tracing 구독자를 설치합니다.
///
/// 반환되는 가드는 프로세스가 끝날 때까지 유지해야 합니다.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    let level = LevelFilter::from_level(settings.level);
    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    if let Ok(directive) = "reverse_proxy_rules=debug".parse() {
        filter = filter.add_directive(directive);
    }

    let (writer, guard) = match &settings.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::File(path) => {
            let path = Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let file_name = path.file_name().map(|f| f.to_owned()).unwrap_or_else(|| "proxy.log".into());
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let result = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if let Err(e) = result {
        eprintln!("로깅 초기화 실패: {}", e);
    }

    guard
}
