//! 가상 호스트 기반 정책 선택과 백엔드 분산을 위한 모듈입니다.

mod balancer;
mod error;
mod host;
mod table;

pub use balancer::LoadBalancer;
pub use error::RoutingError;
pub use host::HostInfo;
pub use table::DomainTable;
