use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;

use reverse_proxy_rules::logging::LogSinkRegistry;
use reverse_proxy_rules::routing::{DomainTable, LoadBalancer};
use reverse_proxy_rules::rule::{ConfigError, Rule};
use reverse_proxy_rules::settings::{NamedPolicyConfig, PolicySettings, RuleConfig};

fn named(key: &str, domains: &[&str]) -> NamedPolicyConfig {
    NamedPolicyConfig {
        key: key.to_string(),
        enable: true,
        remark: String::new(),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        settings: PolicySettings::default(),
    }
}

fn rule_config(policies: Vec<NamedPolicyConfig>) -> RuleConfig {
    let mut config: RuleConfig = toml::from_str("key = \"r1\"\nlisten_port = 8080").unwrap();
    config.policies = policies;
    config
}

#[test]
fn test_overlapping_virtual_hosts_fail() {
    let policies = vec![
        named("a", &["a.example.com", "shared.example.com"]),
        named("b", &["shared.example.com"]),
    ];

    let err = DomainTable::build("r1", &policies).unwrap_err();
    assert_eq!(
        err,
        ConfigError::DomainConflict {
            rule_key: "r1".to_string(),
            domain: "shared.example.com".to_string(),
        }
    );

    let result = Rule::build(rule_config(policies), &LogSinkRegistry::new(), Arc::default());
    assert!(matches!(result, Err(ConfigError::DomainConflict { .. })));
}

#[test]
fn test_disjoint_virtual_hosts_resolve() {
    let rule = Rule::build(
        rule_config(vec![named("a", &["a.example.com"]), named("b", &["b.example.com"])]),
        &LogSinkRegistry::new(),
        Arc::default(),
    )
    .unwrap();

    assert_eq!(rule.select_policy("a.example.com").key(), "a");
    assert_eq!(rule.select_policy("b.example.com").key(), "b");
    assert_eq!(rule.select_policy("c.example.com").key(), "r1");
}

#[test]
fn test_concurrent_round_robin_is_fair() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 125;
    let locations: Vec<String> = (0..3).map(|i| format!("http://backend-{}", i)).collect();
    let balancer = Arc::new(LoadBalancer::new(locations.clone()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let balancer = balancer.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..PER_THREAD)
                    .map(|_| balancer.next_location().unwrap().to_string())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        for location in handle.join().unwrap() {
            *counts.entry(location).or_default() += 1;
        }
    }

    // 1000번 선택 = {0..999} mod 3 → 334, 333, 333
    let total = THREADS * PER_THREAD;
    for (i, location) in locations.iter().enumerate() {
        let expected = (0..total).filter(|n| n % locations.len() == i).count();
        assert_eq!(counts.get(location).copied().unwrap_or(0), expected, "{}", location);
    }
}

#[test]
fn test_empty_balancer_selects_nothing() {
    let balancer = LoadBalancer::new(vec![]);
    assert!(balancer.next_location().is_none());
}
