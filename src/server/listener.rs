use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use hyper_util::rt::TokioIo;
use tracing::{debug, error, info};

use super::error::Error;
use super::handler::RuleHandler;
use super::Result;
use crate::proxy::ProxyClient;
use crate::rule::Rule;

/// 규칙 하나의 바인딩된 리스너
pub struct RuleListener {
    rule: Arc<Rule>,
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl RuleListener {
    /// TLS 설정을 먼저 읽고 규칙의 주소에 바인딩합니다.
    pub async fn bind(rule: Arc<Rule>) -> Result<Self> {
        let tls_settings = &rule.config().tls;
        let tls = if tls_settings.enabled {
            match (&tls_settings.cert_path, &tls_settings.key_path) {
                (Some(cert), Some(key)) => Some(crate::tls::load_acceptor(cert, key)?),
                _ => return Err(Error::Tls(format!("규칙 {}: 인증서 경로가 없음", rule.key()))),
            }
        } else {
            None
        };

        let addr = rule.listen_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(error = %e, rule = %rule.key(), addr = %addr, "포트 바인딩 실패");
            Error::Bind { addr, source: e }
        })?;

        info!(rule = %rule.key(), addr = %addr, tls = tls.is_some(), "리스너 바인딩");
        Ok(Self { rule, listener, tls })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 종료 신호가 올 때까지 연결을 받습니다.
    pub async fn run(self, client: ProxyClient, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let key = self.rule.key().to_string();
        let handler = Arc::new(RuleHandler::new(self.rule, client));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!(rule = %key, "리스너 종료");
                    return Ok(());
                }
                result = self.listener.accept() => {
                    let (stream, remote) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(rule = %key, error = %e, "연결 수락 실패");
                            continue;
                        }
                    };

                    let handler = handler.clone();
                    let shutdown = shutdown.clone();
                    match self.tls.clone() {
                        None => {
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                if let Err(err) = handler.handle_connection(io, remote, shutdown).await {
                                    debug!(error = %err, remote = %remote, "HTTP 연결 처리 실패");
                                }
                            });
                        }
                        Some(acceptor) => {
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        let io = TokioIo::new(tls_stream);
                                        if let Err(err) = handler.handle_connection(io, remote, shutdown).await {
                                            debug!(error = %err, remote = %remote, "HTTPS 연결 처리 실패");
                                        }
                                    }
                                    Err(e) => {
                                        debug!(error = %e, remote = %remote, "TLS 핸드쉐이크 실패");
                                    }
                                }
                            });
                        }
                    }
                }
            }
        }
    }
}
