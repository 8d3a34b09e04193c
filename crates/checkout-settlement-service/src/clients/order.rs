//! 订单服务客户端
//!
//! 结算只负责创建订单并拿到 order_id，订单随后归订单服务所有。
//! confirm_order 属于结算之后的地址/支付选择流程，不在 settle 序列内。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use storefront_shared::error::StorefrontError;

use crate::clients::{transport_error, unexpected_status};
use crate::model::{CartLine, Order};

const SERVICE: &str = "order";

/// 订单服务抽象
#[async_trait]
pub trait OrderService: Send + Sync {
    /// 以完整行集与最终应收金额创建订单，返回 order_id
    async fn create_order(
        &self,
        user_id: &str,
        lines: &[CartLine],
        total_price: f64,
    ) -> Result<String, StorefrontError>;

    /// 确认订单（结算后的地址/支付选择流程使用）
    async fn confirm_order(&self, user_id: &str, order_id: &str) -> Result<(), StorefrontError>;

    /// 查询订单
    async fn get_order(&self, order_id: &str) -> Result<Order, StorefrontError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest<'a> {
    user_id: &'a str,
    lines: &'a [CartLine],
    total_price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    order_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmOrderRequest<'a> {
    user_id: &'a str,
}

/// 订单服务的 REST 实现
pub struct HttpOrderClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpOrderClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

#[async_trait]
impl OrderService for HttpOrderClient {
    async fn create_order(
        &self,
        user_id: &str,
        lines: &[CartLine],
        total_price: f64,
    ) -> Result<String, StorefrontError> {
        let url = format!("{}/orders", self.base_url);
        debug!(user_id, line_count = lines.len(), total_price, "调用订单创建");

        let response = self
            .http
            .post(&url)
            .json(&CreateOrderRequest {
                user_id,
                lines,
                total_price,
            })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(unexpected_status(SERVICE, response.status()));
        }

        let created = response
            .json::<CreateOrderResponse>()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        info!(user_id, order_id = %created.order_id, total_price, "订单创建成功");
        Ok(created.order_id)
    }

    async fn confirm_order(&self, user_id: &str, order_id: &str) -> Result<(), StorefrontError> {
        let url = format!("{}/orders/{order_id}/confirm", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(&ConfirmOrderRequest { user_id })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StorefrontError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }),
            s => Err(unexpected_status(SERVICE, s)),
        }
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, StorefrontError> {
        let url = format!("{}/orders/{order_id}", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        match response.status() {
            s if s.is_success() => response
                .json::<Order>()
                .await
                .map_err(|e| transport_error(SERVICE, e)),
            StatusCode::NOT_FOUND => Err(StorefrontError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }),
            s => Err(unexpected_status(SERVICE, s)),
        }
    }
}
