//! Mock 商品目录服务（库存）
//!
//! 库存按 (product_id, variant) 粒度维护。预留是分片锁内的
//! 比较扣减：足够则减，不足返回 409，商品不存在返回 404。

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::MockProduct;
use crate::store::MemoryStore;

/// Mock 目录服务状态
#[derive(Default)]
pub struct CatalogServiceState {
    pub products: MemoryStore<MockProduct>,
}

// ============================================================================
// 请求/响应 DTO
// ============================================================================

/// 库存调整请求（预留与释放共用）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentRequest {
    pub color: String,
    pub size: String,
    pub quantity: u32,
}

impl StockAdjustmentRequest {
    fn stock_key(&self) -> String {
        format!("{}/{}", self.color, self.size)
    }
}

/// 预留/释放后的库存快照
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub product_id: String,
    pub variant: String,
    pub remaining: u32,
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// 路由配置
// ============================================================================

/// 构建目录服务路由
pub fn catalog_routes() -> Router<Arc<CatalogServiceState>> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/{product_id}", get(get_product))
        .route("/products/{product_id}/reserve", post(reserve_stock))
        .route("/products/{product_id}/release", post(release_stock))
}

// ============================================================================
// 端点处理函数
// ============================================================================

/// 创建商品（种子数据用）
#[tracing::instrument(skip(state, product))]
async fn create_product(
    State(state): State<Arc<CatalogServiceState>>,
    Json(product): Json<MockProduct>,
) -> (StatusCode, Json<MockProduct>) {
    tracing::info!("创建商品: {}", product.product_id);
    state.products.insert(&product.product_id, product.clone());
    (StatusCode::CREATED, Json(product))
}

/// 获取商品详情
#[tracing::instrument(skip(state))]
async fn get_product(
    State(state): State<Arc<CatalogServiceState>>,
    Path(product_id): Path<String>,
) -> Result<Json<MockProduct>, (StatusCode, Json<ErrorResponse>)> {
    state.products.get(&product_id).map_or_else(
        || {
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("商品不存在: {}", product_id),
                }),
            ))
        },
        |product| Ok(Json(product)),
    )
}

/// 预留结果（分片锁内判定）
enum ReserveResult {
    Reserved(u32),
    Insufficient(u32),
    VariantMissing,
}

/// 预留库存
///
/// 比较扣减在 mutate 的分片锁内完成，并发请求串行化，
/// 同一变体不会被超卖。
#[tracing::instrument(skip(state))]
async fn reserve_stock(
    State(state): State<Arc<CatalogServiceState>>,
    Path(product_id): Path<String>,
    Json(req): Json<StockAdjustmentRequest>,
) -> Result<Json<StockResponse>, (StatusCode, Json<ErrorResponse>)> {
    let key = req.stock_key();
    let outcome = state.products.mutate(&product_id, |product| {
        match product.stock.get_mut(&key) {
            None => ReserveResult::VariantMissing,
            Some(available) if *available < req.quantity => {
                ReserveResult::Insufficient(*available)
            }
            Some(available) => {
                *available -= req.quantity;
                ReserveResult::Reserved(*available)
            }
        }
    });

    match outcome {
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("商品不存在: {}", product_id),
            }),
        )),
        Some(ReserveResult::VariantMissing) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("变体不存在: {} {}", product_id, key),
            }),
        )),
        Some(ReserveResult::Insufficient(available)) => {
            tracing::info!("库存不足: {} {} 可用 {}", product_id, key, available);
            Err((
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!("库存不足: 需要 {}，可用 {}", req.quantity, available),
                }),
            ))
        }
        Some(ReserveResult::Reserved(remaining)) => {
            tracing::info!("库存预留成功: {} {} 剩余 {}", product_id, key, remaining);
            Ok(Json(StockResponse {
                product_id,
                variant: key,
                remaining,
            }))
        }
    }
}

/// 释放库存（预留的补偿）
#[tracing::instrument(skip(state))]
async fn release_stock(
    State(state): State<Arc<CatalogServiceState>>,
    Path(product_id): Path<String>,
    Json(req): Json<StockAdjustmentRequest>,
) -> Result<Json<StockResponse>, (StatusCode, Json<ErrorResponse>)> {
    let key = req.stock_key();
    let remaining = state.products.mutate(&product_id, |product| {
        let entry = product.stock.entry(key.clone()).or_insert(0);
        *entry += req.quantity;
        *entry
    });

    match remaining {
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("商品不存在: {}", product_id),
            }),
        )),
        Some(remaining) => {
            tracing::info!("库存释放: {} {} 剩余 {}", product_id, key, remaining);
            Ok(Json(StockResponse {
                product_id,
                variant: key,
                remaining,
            }))
        }
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn seeded_state() -> Arc<CatalogServiceState> {
        let state = Arc::new(CatalogServiceState::default());
        let mut stock = HashMap::new();
        stock.insert("black/M".to_string(), 5);
        state.products.insert(
            "prod-a",
            MockProduct {
                product_id: "prod-a".to_string(),
                name: "基础款 T 恤".to_string(),
                unit_price: 50.0,
                stock,
            },
        );
        state
    }

    fn app(state: Arc<CatalogServiceState>) -> Router {
        catalog_routes().with_state(state)
    }

    fn reserve_request(quantity: u32) -> Request<Body> {
        let body = serde_json::json!({
            "color": "black",
            "size": "M",
            "quantity": quantity
        });
        Request::builder()
            .method("POST")
            .uri("/products/prod-a/reserve")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock() {
        let state = seeded_state();

        let response = app(state.clone()).oneshot(reserve_request(3)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let resp: StockResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.remaining, 2);
    }

    #[tokio::test]
    async fn test_reserve_insufficient_is_conflict_and_no_change() {
        let state = seeded_state();

        let response = app(state.clone()).oneshot(reserve_request(6)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // 失败的预留不改库存
        let product = state.products.get("prod-a").unwrap();
        assert_eq!(product.stock["black/M"], 5);
    }

    #[tokio::test]
    async fn test_reserve_unknown_product_is_not_found() {
        let state = seeded_state();
        let body = serde_json::json!({ "color": "black", "size": "M", "quantity": 1 });

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/products/nope/reserve")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_release_restores_stock() {
        let state = seeded_state();

        let _ = app(state.clone()).oneshot(reserve_request(3)).await.unwrap();

        let body = serde_json::json!({ "color": "black", "size": "M", "quantity": 3 });
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/products/prod-a/release")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let product = state.products.get("prod-a").unwrap();
        assert_eq!(product.stock["black/M"], 5);
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_oversell() {
        let state = seeded_state();

        // 5 件库存，10 个并发请求各要 1 件，恰好 5 个成功
        let mut handles = Vec::new();
        for _ in 0..10 {
            let app = app(state.clone());
            handles.push(tokio::spawn(async move {
                app.oneshot(reserve_request(1)).await.unwrap().status()
            }));
        }

        let mut ok = 0;
        let mut conflict = 0;
        for handle in handles {
            match handle.await.unwrap() {
                StatusCode::OK => ok += 1,
                StatusCode::CONFLICT => conflict += 1,
                other => panic!("非预期状态码: {other}"),
            }
        }

        assert_eq!(ok, 5);
        assert_eq!(conflict, 5);
        let product = state.products.get("prod-a").unwrap();
        assert_eq!(product.stock["black/M"], 0);
    }
}
