use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::{self, Certificate, PrivateKey};
use tokio_rustls::TlsAcceptor;
use tracing::info;

use crate::server::Error;

/// PEM 인증서와 개인키 파일로 TLS 수락기를 만듭니다.
///
/// 개인키는 PKCS#8을 먼저 찾고 없으면 RSA(PKCS#1) 형식을 찾습니다.
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, Error> {
    let tls_config = load_tls_config(cert_path, key_path)?;
    info!(cert = %cert_path.display(), "TLS 설정 로드 완료");
    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<rustls::ServerConfig, Error> {
    let tls_error = |path: &Path, e: std::io::Error| Error::Tls(format!("{}: {}", path.display(), e));

    let cert_file = File::open(cert_path).map_err(|e| tls_error(cert_path, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs: Vec<Certificate> = rustls_pemfile::certs(&mut cert_reader)
        .map_err(|e| tls_error(cert_path, e))?
        .into_iter()
        .map(Certificate)
        .collect();
    if certs.is_empty() {
        return Err(Error::Tls(format!("{}: 인증서를 찾을 수 없음", cert_path.display())));
    }

    let key = read_private_key(key_path).map_err(|e| tls_error(key_path, e))?.ok_or_else(|| {
        Error::Tls(format!("{}: 개인키를 찾을 수 없음", key_path.display()))
    })?;

    rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::Tls(e.to_string()))
}

fn read_private_key(key_path: &Path) -> std::io::Result<Option<PrivateKey>> {
    let mut reader = BufReader::new(File::open(key_path)?);
    if let Some(key) = rustls_pemfile::pkcs8_private_keys(&mut reader)?.into_iter().next() {
        return Ok(Some(PrivateKey(key)));
    }

    let mut reader = BufReader::new(File::open(key_path)?);
    Ok(rustls_pemfile::rsa_private_keys(&mut reader)?
        .into_iter()
        .next()
        .map(PrivateKey))
}
