use hyper::http::request::Parts;
use hyper::{header, StatusCode};

use super::{response, AccessCheck, AccessContext, AccessOutcome};
use crate::settings::FilterMode;

/// User-Agent 부분 문자열 필터 단계
pub struct UserAgentFilter {
    mode: FilterMode,
    patterns: Vec<String>,
}

impl UserAgentFilter {
    pub fn new(mode: FilterMode, patterns: &[String]) -> Self {
        Self {
            mode,
            patterns: patterns
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
        }
    }

    pub fn allows(&self, user_agent: &str) -> bool {
        let contains = self.patterns.iter().any(|p| user_agent.contains(p.as_str()));
        match self.mode {
            FilterMode::Disabled => true,
            FilterMode::Whitelist => contains,
            FilterMode::Blacklist => !contains,
        }
    }
}

impl AccessCheck for UserAgentFilter {
    fn name(&self) -> &str {
        "user-agent-filter"
    }

    fn check(&self, ctx: &AccessContext, parts: &mut Parts) -> AccessOutcome {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if self.allows(user_agent) {
            return AccessOutcome::Continue;
        }

        AccessOutcome::Denied {
            reason: format!(
                "IP[{}] UA[{}] 접근 거부, 현재 UA 검사 모드 [{}]",
                ctx.client_ip, user_agent, self.mode
            ),
            response: response::empty(StatusCode::FORBIDDEN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        let patterns = vec!["curl".to_string(), "".to_string()];

        let filter = UserAgentFilter::new(FilterMode::Whitelist, &patterns);
        assert!(filter.allows("curl/8.0"));
        assert!(!filter.allows("Mozilla/5.0"));

        let filter = UserAgentFilter::new(FilterMode::Blacklist, &patterns);
        assert!(!filter.allows("curl/8.0"));
        assert!(filter.allows("Mozilla/5.0"));

        let filter = UserAgentFilter::new(FilterMode::Disabled, &patterns);
        assert!(filter.allows("curl/8.0"));
        assert!(filter.allows(""));
    }
}
