//! Mock 订单服务
//!
//! 创建、查询与确认订单。支持故障注入开关，用于演示订单创建失败时
//! 结算侧的库存补偿路径。

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::models::{MockCartLine, MockOrder, OrderStatus};
use crate::store::MemoryStore;

/// Mock 订单服务状态
#[derive(Default)]
pub struct OrderServiceState {
    pub orders: MemoryStore<MockOrder>,
    /// 故障注入：开启后所有创建请求返回 503
    pub fail_creates: AtomicBool,
}

// ============================================================================
// 请求/响应 DTO
// ============================================================================

/// 创建订单请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub lines: Vec<MockCartLine>,
    pub total_price: f64,
}

/// 创建订单响应
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
}

/// 确认订单请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrderRequest {
    pub user_id: String,
}

/// 故障注入开关请求
#[derive(Debug, Deserialize)]
pub struct FailureModeRequest {
    pub enabled: bool,
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// 路由配置
// ============================================================================

/// 构建订单服务路由
pub fn order_routes() -> Router<Arc<OrderServiceState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{order_id}", get(get_order))
        .route("/orders/{order_id}/confirm", post(confirm_order))
        .route("/failure-mode", post(set_failure_mode))
}

// ============================================================================
// 端点处理函数
// ============================================================================

/// 创建订单
#[tracing::instrument(skip(state, req))]
async fn create_order(
    State(state): State<Arc<OrderServiceState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), (StatusCode, Json<ErrorResponse>)> {
    if state.fail_creates.load(Ordering::SeqCst) {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "订单服务故障注入已开启".to_string(),
            }),
        ));
    }

    let order = MockOrder {
        order_id: format!("ORD-{}", Uuid::new_v4()),
        user_id: req.user_id,
        lines: req.lines,
        total_price: req.total_price,
        status: OrderStatus::Created,
        created_at: Utc::now(),
    };
    let order_id = order.order_id.clone();
    state.orders.insert(&order_id, order);

    tracing::info!("订单创建成功: {}", order_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse { order_id }),
    ))
}

/// 查询订单
#[tracing::instrument(skip(state))]
async fn get_order(
    State(state): State<Arc<OrderServiceState>>,
    Path(order_id): Path<String>,
) -> Result<Json<MockOrder>, (StatusCode, Json<ErrorResponse>)> {
    state.orders.get(&order_id).map_or_else(
        || {
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("订单不存在: {}", order_id),
                }),
            ))
        },
        |order| Ok(Json(order)),
    )
}

/// 确认订单
#[tracing::instrument(skip(state, _req))]
async fn confirm_order(
    State(state): State<Arc<OrderServiceState>>,
    Path(order_id): Path<String>,
    Json(_req): Json<ConfirmOrderRequest>,
) -> Result<Json<MockOrder>, (StatusCode, Json<ErrorResponse>)> {
    let updated = state.orders.mutate(&order_id, |order| {
        order.status = OrderStatus::Confirmed;
        order.clone()
    });

    updated.map_or_else(
        || {
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("订单不存在: {}", order_id),
                }),
            ))
        },
        |order| {
            tracing::info!("订单已确认: {}", order_id);
            Ok(Json(order))
        },
    )
}

/// 设置故障注入开关
async fn set_failure_mode(
    State(state): State<Arc<OrderServiceState>>,
    Json(req): Json<FailureModeRequest>,
) -> StatusCode {
    state.fail_creates.store(req.enabled, Ordering::SeqCst);
    tracing::warn!("订单创建故障注入: {}", req.enabled);
    StatusCode::NO_CONTENT
}

// ============================================================================
// 单元测试
// ============================================================================
