//! Mock 服务路由
//!
//! 每个下游一个模块，各自持有独立的内存状态并导出 Router。

pub mod cart_service;
pub mod catalog_service;
pub mod membership_service;
pub mod order_service;

pub use cart_service::{CartServiceState, cart_routes};
pub use catalog_service::{CatalogServiceState, catalog_routes};
pub use membership_service::{MembershipServiceState, membership_routes};
pub use order_service::{OrderServiceState, order_routes};
