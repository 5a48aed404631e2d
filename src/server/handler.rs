use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Level};

use crate::logging::RequestInfo;
use crate::middleware::{response, AccessContext, AccessOutcome, Response};
use crate::proxy::ProxyClient;
use crate::routing::{HostInfo, RoutingError};
use crate::rule::Rule;

/// 규칙 하나의 요청 처리기
pub struct RuleHandler {
    rule: Arc<Rule>,
    client: ProxyClient,
}

impl RuleHandler {
    pub fn new(rule: Arc<Rule>, client: ProxyClient) -> Self {
        Self { rule, client }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub async fn handle_request(
        &self,
        req: Request<Incoming>,
        remote: SocketAddr,
    ) -> Result<Response, Infallible> {
        // 1. 정책 선택
        let host = match HostInfo::from_request(&req) {
            Ok(host) => host.name,
            Err(e) => {
                debug!(error = %e, "호스트 확인 실패, 기본 정책 사용");
                String::new()
            }
        };
        let policy = self.rule.select_policy(&host);
        let access_log = policy.access_log();

        // 2. 클라이언트 IP 결정
        let remote_ip = remote.ip().to_canonical();
        let client_ip = policy.resolve_client_ip(remote_ip, req.headers());
        let (mut parts, body) = req.into_parts();
        let info = RequestInfo::new(&parts, client_ip, remote_ip);

        // 3. 접근 제어
        let ctx = AccessContext { client_ip, remote_ip };
        match policy.pipeline().run(&ctx, &mut parts) {
            AccessOutcome::Continue => {}
            AccessOutcome::Denied { reason, response } => {
                warn!(rule = %self.rule.key(), policy = %policy.key(), client_ip = %client_ip, "{}", reason);
                access_log.log(Level::WARN, &info, reason);
                return Ok(response);
            }
            AccessOutcome::Answered { reason, response } => {
                access_log.log(Level::INFO, &info, reason);
                return Ok(response);
            }
        }

        // 4. 백엔드 선택
        let Some(location) = policy.balancer().next_location() else {
            let e = RoutingError::NoBackend { host: info.host.clone() };
            info!(rule = %self.rule.key(), policy = %policy.key(), "{}", e);
            access_log.log(Level::INFO, &info, &e);
            return Ok(response::json_status(StatusCode::BAD_GATEWAY, 1, e.to_string()));
        };

        if policy.is_default() {
            access_log.log(Level::INFO, &info, format_args!("기본 백엔드 [{}]로 전달", location));
        } else {
            access_log.log(
                Level::INFO,
                &info,
                format_args!("정책 [{}] 백엔드 [{}]로 전달", policy.key(), location),
            );
        }

        // 5. 프록시 요청
        match self
            .client
            .forward(location, parts, body, client_ip, policy.client_ip_header())
            .await
        {
            Ok(response) => Ok(response),
            Err(e) => {
                error!(rule = %self.rule.key(), policy = %policy.key(), error = %e, "프록시 요청 실패");
                access_log.log(Level::ERROR, &info, response::gateway_message(location, &e));
                Ok(response::gateway_error(location, &e))
            }
        }
    }

    /// 연결 하나를 서빙합니다. 종료 신호를 받으면 진행 중인 요청을 마치고 닫습니다.
    pub async fn handle_connection<I>(
        self: Arc<Self>,
        io: I,
        remote: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::result::Result<(), hyper::Error>
    where
        I: hyper::rt::Read + hyper::rt::Write + Send + Unpin + 'static,
    {
        let conn = http1::Builder::new().serve_connection(
            io,
            service_fn(move |req| {
                let handler = self.clone();
                async move { handler.handle_request(req, remote).await }
            }),
        );
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        }
    }
}
