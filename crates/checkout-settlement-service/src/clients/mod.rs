//! 外部协作方客户端
//!
//! 结算核心消费四个下游：商品目录（库存）、订单、会员账本、购物车。
//! 每个下游都以 trait 抽象，便于测试时注入 mock 实现；生产实现基于
//! reqwest 的 REST 调用，地址与超时来自配置。传输层错误统一映射到
//! StorefrontError，超时按所属步骤的失败类型处理。

pub mod cart;
pub mod catalog;
pub mod ledger;
pub mod order;

pub use cart::{CartStore, HttpCartClient};
pub use catalog::{CatalogService, HttpCatalogClient, StockReservation};
pub use ledger::{HttpLedgerClient, MembershipLedger};
pub use order::{HttpOrderClient, OrderService};

use std::time::Duration;

use storefront_shared::error::StorefrontError;

/// 构建出站 HTTP 客户端
///
/// 单个 Client 内部带连接池，clone 是廉价操作，四个下游客户端共享同一个。
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, StorefrontError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(StorefrontError::from)
}

/// 将 reqwest 传输层错误映射为共享错误类型
///
/// 超时单独区分，供重试判定使用；其余一律归为外部服务错误。
pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> StorefrontError {
    if err.is_timeout() {
        StorefrontError::ExternalServiceTimeout {
            service: service.to_string(),
        }
    } else {
        StorefrontError::ExternalService {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

/// 非预期状态码的统一错误构造
pub(crate) fn unexpected_status(service: &str, status: reqwest::StatusCode) -> StorefrontError {
    StorefrontError::ExternalService {
        service: service.to_string(),
        message: format!("非预期状态码: {status}"),
    }
}
