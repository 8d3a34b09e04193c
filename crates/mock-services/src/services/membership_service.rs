//! Mock 会员账本服务
//!
//! 账户只通过入账变更，等级在每次入账后按门槛表重算。
//! 入账按 idempotencyKey 幂等：重放同一 key 返回首次入账后的
//! 账户快照，不重复累计。

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use membership::{MembershipAccount, RewardRedemption, SpendPosting, Tier, TierSchedule};

use crate::store::MemoryStore;

/// Mock 会员账本状态
pub struct MembershipServiceState {
    pub accounts: MemoryStore<MembershipAccount>,
    /// idempotencyKey -> 首次入账后的账户快照
    pub applied_postings: MemoryStore<MembershipAccount>,
    pub redemptions: MemoryStore<RewardRedemption>,
    pub tiers: TierSchedule,
}

impl Default for MembershipServiceState {
    fn default() -> Self {
        Self {
            accounts: MemoryStore::new(),
            applied_postings: MemoryStore::new(),
            redemptions: MemoryStore::new(),
            tiers: TierSchedule::default(),
        }
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// 路由配置
// ============================================================================

/// 构建会员账本路由
pub fn membership_routes() -> Router<Arc<MembershipServiceState>> {
    Router::new()
        .route("/accounts/{user_id}", get(get_account))
        .route("/accounts/{user_id}/spend", post(post_spend))
        .route("/accounts/{user_id}/redemptions", get(list_redemptions))
}

// ============================================================================
// 端点处理函数
// ============================================================================

/// 查询账户
#[tracing::instrument(skip(state))]
async fn get_account(
    State(state): State<Arc<MembershipServiceState>>,
    Path(user_id): Path<String>,
) -> Result<Json<MembershipAccount>, (StatusCode, Json<ErrorResponse>)> {
    state.accounts.get(&user_id).map_or_else(
        || {
            Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("账户不存在: {}", user_id),
                }),
            ))
        },
        |account| Ok(Json(account)),
    )
}

/// 消费入账
///
/// 首次入账的用户自动开户（Bronze 起步）。重放的 key 直接返回
/// 首次入账后的快照。
#[tracing::instrument(skip(state, posting))]
async fn post_spend(
    State(state): State<Arc<MembershipServiceState>>,
    Path(user_id): Path<String>,
    Json(posting): Json<SpendPosting>,
) -> Json<MembershipAccount> {
    // 幂等检查与入账折叠进同一次 entry 操作，
    // 并发重放同一 key 只有一个请求真正入账，其余拿到快照。
    let (account, first_apply) =
        state
            .applied_postings
            .get_or_insert_with(&posting.idempotency_key, || {
                state.accounts.upsert_with(&user_id, |existing| {
                    let mut account = existing.cloned().unwrap_or(MembershipAccount {
                        user_id: user_id.clone(),
                        tier: Tier::Bronze,
                        total_spent: 0.0,
                        total_points: 0,
                    });
                    account.total_spent += posting.amount;
                    account.total_points += posting.points;
                    account.tier = state.tiers.status_for(account.total_spent).tier;
                    account
                })
            });

    if !first_apply {
        tracing::info!("幂等重放: {}", posting.idempotency_key);
        return Json(account);
    }

    // 使用了奖励的入账留一条兑换记录
    if let Some(redemption_id) = &posting.redemption_id {
        let order_id = posting
            .idempotency_key
            .strip_prefix("settle-")
            .unwrap_or(&posting.idempotency_key)
            .to_string();
        let redemption = RewardRedemption {
            redemption_id: redemption_id.clone(),
            user_id: user_id.clone(),
            order_id,
            reward_kind: posting
                .reward_kind
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            redeemed_at: Utc::now(),
        };
        state.redemptions.insert(redemption_id, redemption);
    }

    tracing::info!(
        "入账成功: {} 金额 {:.2} 积分 {} 等级 {}",
        user_id,
        posting.amount,
        posting.points,
        account.tier
    );
    Json(account)
}

/// 查询用户的兑换记录
#[tracing::instrument(skip(state))]
async fn list_redemptions(
    State(state): State<Arc<MembershipServiceState>>,
    Path(user_id): Path<String>,
) -> Json<Vec<RewardRedemption>> {
    Json(state.redemptions.list_by(|r| r.user_id == user_id))
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
    use tower::ServiceExt;

    fn app(state: Arc<MembershipServiceState>) -> Router {
        membership_routes().with_state(state)
    }

    fn spend_request(amount: f64, key: &str) -> Request<Body> {
        let body = serde_json::json!({
            "amount": amount,
            "points": amount as i64,
            "redemptionId": null,
            "rewardKind": null,
            "idempotencyKey": key
        });
        Request::builder()
            .method("POST")
            .uri("/accounts/user-001/spend")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn account_from(response: axum::response::Response) -> MembershipAccount {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_first_posting_opens_account() {
        let state = Arc::new(MembershipServiceState::default());

        let response = app(state)
            .oneshot(spend_request(107.0, "settle-ORD-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let account = account_from(response).await;
        assert_eq!(account.total_spent, 107.0);
        assert_eq!(account.total_points, 107);
        assert_eq!(account.tier, Tier::Bronze);
    }

    #[tokio::test]
    async fn test_replay_same_key_does_not_double_post() {
        let state = Arc::new(MembershipServiceState::default());

        let _ = app(state.clone())
            .oneshot(spend_request(107.0, "settle-ORD-1"))
            .await
            .unwrap();
        let response = app(state.clone())
            .oneshot(spend_request(107.0, "settle-ORD-1"))
            .await
            .unwrap();

        let account = account_from(response).await;
        assert_eq!(account.total_spent, 107.0);

        let stored = state.accounts.get("user-001").unwrap();
        assert_eq!(stored.total_spent, 107.0);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_postings_apply_once() {
        let state = Arc::new(MembershipServiceState::default());

        // 8 个并发请求带同一幂等键，只有一个真正入账
        let mut handles = Vec::new();
        for _ in 0..8 {
            let app = app(state.clone());
            handles.push(tokio::spawn(async move {
                app.oneshot(spend_request(107.0, "settle-ORD-1")).await.unwrap()
            }));
        }

        for handle in handles {
            let response = handle.await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            // 每个请求拿到的都是首次入账后的快照
            let account = account_from(response).await;
            assert_eq!(account.total_spent, 107.0);
        }

        let stored = state.accounts.get("user-001").unwrap();
        assert_eq!(stored.total_spent, 107.0);
        assert_eq!(stored.total_points, 107);
    }

    #[tokio::test]
    async fn test_tier_recomputed_after_posting() {
        let state = Arc::new(MembershipServiceState::default());

        let _ = app(state.clone())
            .oneshot(spend_request(1500.0, "settle-ORD-1"))
            .await
            .unwrap();
        let response = app(state)
            .oneshot(spend_request(600.0, "settle-ORD-2"))
            .await
            .unwrap();

        // 2100 >= 2000 -> Silver
        let account = account_from(response).await;
        assert_eq!(account.tier, Tier::Silver);
    }

    #[tokio::test]
    async fn test_posting_with_redemption_records_it() {
        let state = Arc::new(MembershipServiceState::default());

        let body = serde_json::json!({
            "amount": 107.0,
            "points": 107,
            "redemptionId": "rdm-001",
            "rewardKind": "DISCOUNT",
            "idempotencyKey": "settle-ORD-9"
        });
        let _ = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/accounts/user-001/spend")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/accounts/user-001/redemptions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let redemptions: Vec<RewardRedemption> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(redemptions.len(), 1);
        assert_eq!(redemptions[0].order_id, "ORD-9");
        assert_eq!(redemptions[0].reward_kind, "DISCOUNT");
    }

    #[tokio::test]
    async fn test_get_unknown_account_is_not_found() {
        let state = Arc::new(MembershipServiceState::default());

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/accounts/nobody")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
