use reverse_proxy_rules::{
    logging::init_logging,
    server::ServerContext,
    settings::Settings,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let settings = match Settings::load().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("설정 로드 실패: {}", e);
            std::process::exit(1);
        }
    };

    let _guard = init_logging(&settings.logging);

    let context = match ServerContext::new(&settings) {
        Ok(context) => context,
        Err(e) => {
            error!(error = %e, "서버 초기화 실패");
            std::process::exit(1);
        }
    };

    let started = context.start_enabled().await;
    info!(started, total = context.store().len(), "리버스 프록시 시작");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "종료 신호 대기 실패");
    }

    let stopped = context.stop_all().await;
    info!(stopped, "리버스 프록시 종료");
}
