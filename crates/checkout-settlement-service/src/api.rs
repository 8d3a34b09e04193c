//! HTTP API
//!
//! 对外暴露结算入口与若干只读视图。所有响应使用统一信封
//! `{success, code, message, data}`，错误側由 SettlementError 的
//! IntoResponse 实现生成同构信封。

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use membership::TierSchedule;
use reward_engine::RewardOffer;
use storefront_shared::error::StorefrontError;

use crate::clients::{CartStore, CatalogService, MembershipLedger, OrderService};
use crate::error::SettlementError;
use crate::model::{CartLine, CheckoutRequest};
use crate::orchestrator::CheckoutOrchestrator;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// 服务共享状态
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CheckoutOrchestrator>,
    pub catalog: Arc<dyn CatalogService>,
    pub orders: Arc<dyn OrderService>,
    pub ledger: Arc<dyn MembershipLedger>,
    pub cart: Arc<dyn CartStore>,
    pub tiers: TierSchedule,
}

/// 构建路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/checkout/settle", post(settle))
        .route("/checkout/cart/{user_id}", get(cart_view))
        .route("/membership/{user_id}/tier", get(tier_view))
        .route("/membership/{user_id}/redemptions", get(redemptions_view))
        .route("/orders/{order_id}", get(order_view))
        .route("/orders/{order_id}/confirm", post(confirm_order))
        .with_state(state)
}

/// 成功信封
fn ok(data: impl Serialize) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "code": "OK",
        "message": "OK",
        "data": data
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

// ---------------------------------------------------------------------------
// 结算
// ---------------------------------------------------------------------------

/// 结算请求体
///
/// 购物车行由前端从结算页快照传入，不在服务端读全局购物车状态。
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    #[validate(length(min = 1, message = "用户 ID 不能为空"))]
    pub user_id: String,
    pub selected_lines: Vec<CartLine>,
    pub reward: Option<RewardOffer>,
    #[serde(default)]
    pub shipping_base_cost: f64,
}

async fn settle(
    State(state): State<AppState>,
    Json(body): Json<SettleRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    body.validate()
        .map_err(|e| StorefrontError::Validation(e.to_string()))?;

    info!(
        user_id = %body.user_id,
        line_count = body.selected_lines.len(),
        has_reward = body.reward.is_some(),
        "收到结算请求"
    );

    let receipt = state
        .orchestrator
        .settle(CheckoutRequest {
            user_id: body.user_id,
            selected_lines: body.selected_lines,
            reward: body.reward,
            shipping_base_cost: body.shipping_base_cost,
        })
        .await?;

    Ok(ok(receipt))
}

// ---------------------------------------------------------------------------
// 只读视图
// ---------------------------------------------------------------------------

/// 结算页的购物车行视图（附商品名）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartLineView {
    #[serde(flatten)]
    line: CartLine,
    product_name: Option<String>,
}

/// 结算页数据：用户当前购物车行，附目录中的商品名
///
/// 商品名查询并发执行；单个商品查询失败不使整页失败，名字置空即可。
async fn cart_view(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, SettlementError> {
    let lines = state.cart.list_cart_lines(&user_id).await?;

    let lookups = lines.iter().map(|line| {
        let catalog = state.catalog.clone();
        let product_id = line.product_id.clone();
        async move { catalog.get_product(&product_id).await.ok().flatten() }
    });
    let products = join_all(lookups).await;

    let views: Vec<CartLineView> = lines
        .into_iter()
        .zip(products)
        .map(|(line, product)| CartLineView {
            line,
            product_name: product.map(|p| p.name),
        })
        .collect();

    Ok(ok(views))
}

/// 会员等级视图：账户累计消费 + 等级与进度
async fn tier_view(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, SettlementError> {
    let account = state.ledger.get_account(&user_id).await?;
    let status = state.tiers.status_for(account.total_spent);

    Ok(ok(json!({
        "account": account,
        "status": status
    })))
}

async fn redemptions_view(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, SettlementError> {
    let redemptions = state.ledger.list_redemptions(&user_id).await?;
    Ok(ok(redemptions))
}

async fn order_view(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, SettlementError> {
    let order = state.orders.get_order(&order_id).await?;
    Ok(ok(order))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ConfirmOrderBody {
    #[validate(length(min = 1, message = "用户 ID 不能为空"))]
    user_id: String,
}

/// 结算后的订单确认（地址/支付选择完成后调用）
async fn confirm_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<ConfirmOrderBody>,
) -> Result<impl IntoResponse, SettlementError> {
    body.validate()
        .map_err(|e| StorefrontError::Validation(e.to_string()))?;

    state.orders.confirm_order(&body.user_id, &order_id).await?;
    info!(order_id, user_id = %body.user_id, "订单已确认");
    Ok(ok(json!({ "orderId": order_id })))
}
