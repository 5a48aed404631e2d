use std::sync::Arc;
use hyper::http::request::Parts;

use super::basic_auth::create_basic_auth;
use super::{AccessCheck, AccessContext, AccessOutcome, IpFilter, RobotsTxt, SafeIpLists, UserAgentFilter};
use crate::settings::{FilterMode, PolicySettings};

/// 정책 하나의 접근 제어 단계 목록
///
/// 순서는 IP 필터, User-Agent 필터, Basic 인증, robots.txt 입니다.
/// 첫 번째로 `Continue`가 아닌 결과를 낸 단계에서 멈춥니다.
#[derive(Default)]
pub struct AccessPipeline {
    checks: Vec<Box<dyn AccessCheck>>,
}

impl AccessPipeline {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn add<C: AccessCheck + 'static>(&mut self, check: C) {
        self.checks.push(Box::new(check));
    }

    /// 정책 설정으로부터 단계 목록을 구성합니다. 꺼진 단계는 추가하지 않습니다.
    pub fn from_settings(settings: &PolicySettings, ip_lists: Arc<SafeIpLists>) -> Self {
        let mut pipeline = Self::new();

        if settings.ip_filter_mode != FilterMode::Disabled {
            pipeline.add(IpFilter::new(settings.ip_filter_mode, ip_lists));
        }
        if settings.user_agent_filter_mode != FilterMode::Disabled {
            pipeline.add(UserAgentFilter::new(
                settings.user_agent_filter_mode,
                &settings.user_agent_filter,
            ));
        }
        if let Some(auth) = create_basic_auth(&settings.basic_auth) {
            pipeline.add(auth);
        }
        if settings.custom_robots_txt {
            pipeline.add(RobotsTxt::new(settings.robots_txt.clone()));
        }

        pipeline
    }

    pub fn run(&self, ctx: &AccessContext, parts: &mut Parts) -> AccessOutcome {
        for check in &self.checks {
            let outcome = check.check(ctx, parts);
            if !outcome.is_continue() {
                return outcome;
            }
        }
        AccessOutcome::Continue
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl std::fmt::Debug for AccessPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPipeline")
            .field("checks", &self.names())
            .finish()
    }
}
