//! 商品目录客户端（库存扣减）
//!
//! 库存预留是结算中唯一跨用户共享的状态，目录服务自身保证
//! 按 (product_id, variant) 的原子比较扣减，本客户端不重复实现该语义，
//! 只负责调用与结果分类：扣减成功 / 库存不足 / 商品缺失。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use storefront_shared::error::StorefrontError;

use crate::clients::{transport_error, unexpected_status};
use crate::model::{Product, VariantKey};

const SERVICE: &str = "catalog";

/// 单行库存预留的结果
///
/// 三种结果都是正常的业务响应，只有传输层故障才走 Err 通道。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockReservation {
    Reserved,
    InsufficientStock,
    ProductMissing,
}

/// 商品目录服务抽象
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// 查询商品，不存在时返回 None
    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, StorefrontError>;

    /// 预留库存：对 (product_id, variant) 原子扣减 quantity
    async fn reserve_stock(
        &self,
        product_id: &str,
        variant: &VariantKey,
        quantity: u32,
    ) -> Result<StockReservation, StorefrontError>;

    /// 释放库存：预留的补偿操作，将 quantity 加回
    async fn release_stock(
        &self,
        product_id: &str,
        variant: &VariantKey,
        quantity: u32,
    ) -> Result<(), StorefrontError>;
}

/// 库存调整请求体（预留与释放共用）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StockAdjustment<'a> {
    color: &'a str,
    size: &'a str,
    quantity: u32,
}

/// 目录服务的 REST 实现
pub struct HttpCatalogClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn adjustment<'a>(variant: &'a VariantKey, quantity: u32) -> StockAdjustment<'a> {
        StockAdjustment {
            color: &variant.color,
            size: &variant.size,
            quantity,
        }
    }
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    async fn get_product(&self, product_id: &str) -> Result<Option<Product>, StorefrontError> {
        let url = format!("{}/products/{product_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let product = response
                    .json::<Product>()
                    .await
                    .map_err(|e| transport_error(SERVICE, e))?;
                Ok(Some(product))
            }
            s => Err(unexpected_status(SERVICE, s)),
        }
    }

    async fn reserve_stock(
        &self,
        product_id: &str,
        variant: &VariantKey,
        quantity: u32,
    ) -> Result<StockReservation, StorefrontError> {
        let url = format!("{}/products/{product_id}/reserve", self.base_url);
        debug!(product_id, %variant, quantity, "调用库存预留");

        let response = self
            .http
            .post(&url)
            .json(&Self::adjustment(variant, quantity))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        match response.status() {
            s if s.is_success() => Ok(StockReservation::Reserved),
            StatusCode::CONFLICT => Ok(StockReservation::InsufficientStock),
            StatusCode::NOT_FOUND => Ok(StockReservation::ProductMissing),
            s => Err(unexpected_status(SERVICE, s)),
        }
    }

    async fn release_stock(
        &self,
        product_id: &str,
        variant: &VariantKey,
        quantity: u32,
    ) -> Result<(), StorefrontError> {
        let url = format!("{}/products/{product_id}/release", self.base_url);
        debug!(product_id, %variant, quantity, "调用库存释放（补偿）");

        let response = self
            .http
            .post(&url)
            .json(&Self::adjustment(variant, quantity))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected_status(SERVICE, response.status()))
        }
    }
}
