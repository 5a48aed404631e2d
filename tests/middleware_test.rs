use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use http_body_util::BodyExt;
use hyper::http::request::Parts;
use hyper::{header, Method, Request, StatusCode};
use reverse_proxy_rules::middleware::{
    AccessContext, AccessOutcome, AccessPipeline, AuthenticatedUser, Response, SafeIpLists,
};
use reverse_proxy_rules::settings::{BasicAuthSettings, FilterMode, IpFilterSettings, PolicySettings};

fn ip_lists() -> Arc<SafeIpLists> {
    let settings = IpFilterSettings {
        whitelist: vec!["1.2.3.0/24".to_string()],
        blacklist: vec!["1.2.3.0/24".to_string()],
    };
    Arc::new(SafeIpLists::from_settings(&settings).unwrap())
}

fn ctx(ip: &str) -> AccessContext {
    let ip = ip.parse().unwrap();
    AccessContext { client_ip: ip, remote_ip: ip }
}

fn request(method: Method, path: &str) -> Parts {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::USER_AGENT, "Mozilla/5.0")
        .body(())
        .unwrap()
        .into_parts()
        .0
}

fn denied_status(outcome: AccessOutcome) -> Option<StatusCode> {
    match outcome {
        AccessOutcome::Denied { response, .. } => Some(response.status()),
        _ => None,
    }
}

fn answered(outcome: AccessOutcome) -> Response {
    match outcome {
        AccessOutcome::Answered { response, .. } => response,
        other => panic!("expected answered outcome, got {:?}", other),
    }
}

fn ip_pipeline(mode: FilterMode) -> AccessPipeline {
    let settings = PolicySettings { ip_filter_mode: mode, ..Default::default() };
    AccessPipeline::from_settings(&settings, ip_lists())
}

#[test]
fn test_ip_filter_whitelist() {
    let pipeline = ip_pipeline(FilterMode::Whitelist);
    assert!(pipeline.run(&ctx("1.2.3.4"), &mut request(Method::GET, "/")).is_continue());
    assert_eq!(
        denied_status(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::GET, "/"))),
        Some(StatusCode::FORBIDDEN)
    );
}

#[test]
fn test_ip_filter_blacklist() {
    let pipeline = ip_pipeline(FilterMode::Blacklist);
    assert_eq!(
        denied_status(pipeline.run(&ctx("1.2.3.4"), &mut request(Method::GET, "/"))),
        Some(StatusCode::FORBIDDEN)
    );
    assert!(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::GET, "/")).is_continue());
}

#[test]
fn test_ip_filter_disabled() {
    let pipeline = ip_pipeline(FilterMode::Disabled);
    assert!(pipeline.run(&ctx("1.2.3.4"), &mut request(Method::GET, "/")).is_continue());
    assert!(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::GET, "/")).is_continue());
}

#[test]
fn test_user_agent_filter() {
    let settings = PolicySettings {
        user_agent_filter_mode: FilterMode::Blacklist,
        user_agent_filter: vec!["Mozilla".to_string()],
        ..Default::default()
    };
    let pipeline = AccessPipeline::from_settings(&settings, ip_lists());
    assert_eq!(
        denied_status(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::GET, "/"))),
        Some(StatusCode::FORBIDDEN)
    );
}

fn auth_pipeline() -> AccessPipeline {
    let settings = PolicySettings {
        basic_auth: BasicAuthSettings {
            enable: true,
            user: "admin".to_string(),
            password: "secret".to_string(),
        },
        ..Default::default()
    };
    AccessPipeline::from_settings(&settings, ip_lists())
}

#[test]
fn test_basic_auth_success_attaches_identity() {
    let pipeline = auth_pipeline();
    let mut parts = request(Method::GET, "/");
    parts.headers.insert(
        header::AUTHORIZATION,
        format!("Basic {}", BASE64.encode("admin:secret")).parse().unwrap(),
    );

    assert!(pipeline.run(&ctx("5.6.7.8"), &mut parts).is_continue());
    assert_eq!(
        parts.extensions.get::<AuthenticatedUser>(),
        Some(&AuthenticatedUser("admin".to_string()))
    );
}

#[test]
fn test_basic_auth_failure_challenges() {
    let pipeline = auth_pipeline();

    let mut wrong = request(Method::GET, "/");
    wrong.headers.insert(
        header::AUTHORIZATION,
        format!("Basic {}", BASE64.encode("admin:nope")).parse().unwrap(),
    );

    for mut parts in [request(Method::GET, "/"), wrong] {
        match pipeline.run(&ctx("5.6.7.8"), &mut parts) {
            AccessOutcome::Denied { response, .. } => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
                assert_eq!(
                    response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
                    "Basic realm=\"Authorization Required\""
                );
            }
            other => panic!("expected denial, got {:?}", other),
        }
        assert!(parts.extensions.get::<AuthenticatedUser>().is_none());
    }
}

#[test]
fn test_basic_auth_without_user_passes() {
    let settings = PolicySettings {
        basic_auth: BasicAuthSettings { enable: true, user: String::new(), password: "x".to_string() },
        ..Default::default()
    };
    let pipeline = AccessPipeline::from_settings(&settings, ip_lists());
    assert!(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::GET, "/")).is_continue());
}

fn robots_pipeline() -> AccessPipeline {
    let settings = PolicySettings {
        custom_robots_txt: true,
        robots_txt: "User-agent: *\nDisallow: /".to_string(),
        ..Default::default()
    };
    AccessPipeline::from_settings(&settings, ip_lists())
}

#[tokio::test]
async fn test_robots_txt_get() {
    let response = answered(robots_pipeline().run(&ctx("5.6.7.8"), &mut request(Method::GET, "/robots.txt")));
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"User-agent: *\nDisallow: /");
}

#[test]
fn test_robots_txt_other_methods() {
    let pipeline = robots_pipeline();

    let response = answered(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::POST, "/robots.txt")));
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET,HEAD,OPTIONS");

    let response = answered(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::OPTIONS, "/robots.txt")));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET,HEAD,OPTIONS");

    // 다른 경로는 백엔드로 진행
    assert!(pipeline.run(&ctx("5.6.7.8"), &mut request(Method::GET, "/robots.txt.bak")).is_continue());
}
