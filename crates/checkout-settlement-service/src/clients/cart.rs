//! 购物车客户端
//!
//! 删除已结算的行是尽力而为的收尾：删除天然幂等（删不存在的行是 no-op），
//! 失败只降级回执并交由后台对账任务重试，不影响订单有效性。

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use storefront_shared::error::StorefrontError;

use crate::clients::{transport_error, unexpected_status};
use crate::model::CartLine;

const SERVICE: &str = "cart";

/// 购物车存储抽象
#[async_trait]
pub trait CartStore: Send + Sync {
    /// 列出用户当前的购物车行
    async fn list_cart_lines(&self, user_id: &str) -> Result<Vec<CartLine>, StorefrontError>;

    /// 删除一条购物车行（幂等：行不存在视为成功）
    async fn delete_cart_line(&self, line_id: &str) -> Result<(), StorefrontError>;
}

/// 购物车服务的 REST 实现
pub struct HttpCartClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpCartClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

#[async_trait]
impl CartStore for HttpCartClient {
    async fn list_cart_lines(&self, user_id: &str) -> Result<Vec<CartLine>, StorefrontError> {
        let url = format!("{}/users/{user_id}/cart", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(unexpected_status(SERVICE, response.status()));
        }

        response
            .json::<Vec<CartLine>>()
            .await
            .map_err(|e| transport_error(SERVICE, e))
    }

    async fn delete_cart_line(&self, line_id: &str) -> Result<(), StorefrontError> {
        let url = format!("{}/cart/{line_id}", self.base_url);
        debug!(line_id, "调用购物车行删除");

        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        match response.status() {
            // 行已不存在等价于删除成功
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            s => Err(unexpected_status(SERVICE, s)),
        }
    }
}
