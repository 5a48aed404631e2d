//! 요청이 백엔드로 가기 전에 실행되는 접근 제어 단계들입니다.

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;

pub mod basic_auth;
mod chain;
mod ip_filter;
pub mod response;
mod robots;
mod traits;
mod user_agent;

pub use basic_auth::{AuthenticatedUser, BasicAuthMiddleware};
pub use chain::AccessPipeline;
pub use ip_filter::{IpFilter, SafeIpLists};
pub use robots::RobotsTxt;
pub use traits::{AccessCheck, AccessContext, AccessOutcome};
pub use user_agent::UserAgentFilter;

/// 응답 본문. 백엔드 본문은 버퍼링 없이 그대로 흘려보냅니다.
pub type Body = UnsyncBoxBody<Bytes, hyper::Error>;

pub type Response = hyper::Response<Body>;
