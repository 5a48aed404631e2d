//! 규칙 단위로 리스너를 띄우는 멀티 테넌트 리버스 프록시 코어입니다.
//!
//! # 주요 기능
//!
//! - 가상 호스트 기반 정책 선택 (규칙 안에서 도메인 중복 금지)
//! - IP / User-Agent 필터, Basic 인증, robots.txt 응답
//! - 신뢰 프록시 체인을 따른 클라이언트 IP 결정
//! - 라운드 로빈 백엔드 분산
//! - 정책별 접근 로그 링 버퍼
//!
//! # 예제
//!
//! ```
//! use std::sync::Arc;
//! use reverse_proxy_rules::logging::LogSinkRegistry;
//! use reverse_proxy_rules::rule::Rule;
//! use reverse_proxy_rules::settings::RuleConfig;
//!
//! let config: RuleConfig = toml::from_str(r#"
//!     key = "web"
//!     listen_port = 8080
//!
//!     [default_policy]
//!     locations = ["http://127.0.0.1:9000"]
//!
//!     [[policies]]
//!     key = "api"
//!     domains = ["api.example.com"]
//!     locations = ["http://127.0.0.1:9001", "http://127.0.0.1:9002"]
//! "#).unwrap();
//!
//! let rule = Rule::build(config, &LogSinkRegistry::new(), Arc::default()).unwrap();
//!
//! let api = rule.select_policy("api.example.com");
//! assert_eq!(api.balancer().next_location(), Some("http://127.0.0.1:9001"));
//! assert_eq!(api.balancer().next_location(), Some("http://127.0.0.1:9002"));
//!
//! // 일치하는 도메인이 없으면 기본 정책
//! assert!(rule.select_policy("www.example.com").is_default());
//! ```

pub mod client_ip;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod routing;
pub mod rule;
pub mod server;
pub mod settings;
pub mod tls;
