use hyper::{header, StatusCode};
use http_body_util::{BodyExt, Full};
use bytes::Bytes;
use tracing::error;

use super::{Body, Response};
use crate::routing::RoutingError;

/// 메모리에 있는 바이트를 응답 본문으로 감쌉니다.
pub fn full(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// 본문 없는 응답
pub fn empty(status: StatusCode) -> Response {
    let mut response = Response::new(full(Bytes::new()));
    *response.status_mut() = status;
    response
}

pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Response {
    hyper::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(full(body))
        .unwrap_or_else(|e| {
            error!(error = %e, "응답 생성 실패");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

/// `{ret, msg}` 형태의 JSON 응답
pub fn json_status(status: StatusCode, ret: i32, msg: impl Into<String>) -> Response {
    let body = serde_json::json!({ "ret": ret, "msg": msg.into() }).to_string();
    hyper::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .body(full(body))
        .unwrap_or_else(|e| {
            error!(error = %e, "응답 생성 실패");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

/// 백엔드 전달 실패 메시지. 주소 변환 실패와 왕복 실패를 구분합니다.
pub fn gateway_message(location: &str, error: &RoutingError) -> String {
    match error {
        RoutingError::Upstream { error, .. } => {
            format!("后端地址[{}] 请求失败: {}", location, error)
        }
        other => format!("后端地址[{}] 转换出错: {}", location, other),
    }
}

/// 502 게이트웨이 오류 응답. 메시지에 실패한 백엔드 주소를 포함합니다.
pub fn gateway_error(location: &str, error: &RoutingError) -> Response {
    json_status(StatusCode::BAD_GATEWAY, 1, gateway_message(location, error))
}
