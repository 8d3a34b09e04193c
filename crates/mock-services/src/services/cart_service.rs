//! Mock 购物车服务
//!
//! 行的增删查。删除幂等：删不存在的行同样返回 204，
//! 结算侧的清理与对账重放因此永远安全。

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{MockCartLine, Variant};
use crate::store::MemoryStore;

/// Mock 购物车状态
#[derive(Default)]
pub struct CartServiceState {
    pub lines: MemoryStore<MockCartLine>,
}

/// 加购请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    pub user_id: String,
    pub product_id: String,
    pub variant: Variant,
    pub unit_price: f64,
    pub quantity: u32,
}

// ============================================================================
// 路由配置
// ============================================================================

/// 构建购物车路由
pub fn cart_routes() -> Router<Arc<CartServiceState>> {
    Router::new()
        .route("/cart", post(add_line))
        .route("/cart/{line_id}", delete(delete_line))
        .route("/users/{user_id}/cart", get(list_user_lines))
}

// ============================================================================
// 端点处理函数
// ============================================================================

/// 加购一行
#[tracing::instrument(skip(state, req))]
async fn add_line(
    State(state): State<Arc<CartServiceState>>,
    Json(req): Json<AddLineRequest>,
) -> (StatusCode, Json<MockCartLine>) {
    let line = MockCartLine {
        id: format!("line-{}", Uuid::new_v4()),
        user_id: req.user_id,
        product_id: req.product_id,
        variant: req.variant,
        unit_price: req.unit_price,
        quantity: req.quantity,
    };
    state.lines.insert(&line.id, line.clone());

    tracing::info!("加购成功: {} 用户 {}", line.id, line.user_id);
    (StatusCode::CREATED, Json(line))
}

/// 删除一行（幂等）
#[tracing::instrument(skip(state))]
async fn delete_line(
    State(state): State<Arc<CartServiceState>>,
    Path(line_id): Path<String>,
) -> StatusCode {
    if state.lines.remove(&line_id).is_some() {
        tracing::info!("购物车行已删除: {}", line_id);
    }
    StatusCode::NO_CONTENT
}

/// 列出用户的购物车行
#[tracing::instrument(skip(state))]
async fn list_user_lines(
    State(state): State<Arc<CartServiceState>>,
    Path(user_id): Path<String>,
) -> Json<Vec<MockCartLine>> {
    Json(state.lines.list_by(|line| line.user_id == user_id))
}

// ============================================================================
// 单元测试
// ============================================================================
