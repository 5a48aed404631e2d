use std::sync::atomic::{AtomicU64, Ordering};

/// 고정된 백엔드 주소 목록에 대한 라운드 로빈 선택기입니다.
///
/// 인덱스는 원자적으로 증가하므로 동시에 선택하는 요청은 모두 서로 다른
/// 인덱스를 받습니다. 요청 간 순서는 보장하지 않습니다.
#[derive(Debug)]
pub struct LoadBalancer {
    locations: Vec<String>,
    index: AtomicU64,
}

impl LoadBalancer {
    pub fn new(locations: Vec<String>) -> Self {
        Self {
            locations,
            index: AtomicU64::new(0),
        }
    }

    /// 다음 백엔드 주소를 선택합니다. 주소가 없으면 `None`입니다.
    pub fn next_location(&self) -> Option<&str> {
        let len = self.locations.len();
        if len == 0 {
            return None;
        }

        let index = self.index.fetch_add(1, Ordering::Relaxed) % len as u64;
        self.locations.get(index as usize).map(String::as_str)
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_order() {
        let balancer = LoadBalancer::new(vec!["a".into(), "b".into(), "c".into()]);
        let picked: Vec<_> = (0..6).filter_map(|_| balancer.next_location()).collect();
        assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_empty_locations() {
        let balancer = LoadBalancer::new(Vec::new());
        assert!(balancer.next_location().is_none());
        assert!(balancer.is_empty());
    }
}
