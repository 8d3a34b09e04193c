//! 会员账本客户端
//!
//! 入账（金额 + 积分 + 可选兑换记录）必须以 settle-{order_id} 派生的
//! 幂等键提交：账本侧重放同一键时返回首次入账结果，不重复累计，
//! 这是后台对账任务可以安全重试的前提。

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use membership::{MembershipAccount, RewardRedemption, SpendPosting};
use storefront_shared::error::StorefrontError;

use crate::clients::{transport_error, unexpected_status};

const SERVICE: &str = "membership";

/// 会员账本抽象
///
/// 账户只能通过入账变更；等级由账本从 total_spent 重算，
/// 调用方拿到的 tier 永远是派生值。
#[async_trait]
pub trait MembershipLedger: Send + Sync {
    /// 提交一笔消费入账，返回更新后的账户
    async fn post_spend(
        &self,
        user_id: &str,
        posting: &SpendPosting,
    ) -> Result<MembershipAccount, StorefrontError>;

    /// 查询账户（账户视图使用）
    async fn get_account(&self, user_id: &str) -> Result<MembershipAccount, StorefrontError>;

    /// 查询用户的奖励兑换记录
    async fn list_redemptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<RewardRedemption>, StorefrontError>;
}

/// 会员账本的 REST 实现
pub struct HttpLedgerClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }
}

#[async_trait]
impl MembershipLedger for HttpLedgerClient {
    async fn post_spend(
        &self,
        user_id: &str,
        posting: &SpendPosting,
    ) -> Result<MembershipAccount, StorefrontError> {
        let url = format!("{}/accounts/{user_id}/spend", self.base_url);
        debug!(
            user_id,
            amount = posting.amount,
            points = posting.points,
            idempotency_key = %posting.idempotency_key,
            "调用账本入账"
        );

        let response = self
            .http
            .post(&url)
            .json(posting)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(unexpected_status(SERVICE, response.status()));
        }

        let account = response
            .json::<MembershipAccount>()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        info!(
            user_id,
            total_spent = account.total_spent,
            total_points = account.total_points,
            tier = %account.tier,
            "账本入账成功"
        );
        Ok(account)
    }

    async fn get_account(&self, user_id: &str) -> Result<MembershipAccount, StorefrontError> {
        let url = format!("{}/accounts/{user_id}", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        match response.status() {
            s if s.is_success() => response
                .json::<MembershipAccount>()
                .await
                .map_err(|e| transport_error(SERVICE, e)),
            StatusCode::NOT_FOUND => Err(StorefrontError::NotFound {
                entity: "MembershipAccount".to_string(),
                id: user_id.to_string(),
            }),
            s => Err(unexpected_status(SERVICE, s)),
        }
    }

    async fn list_redemptions(
        &self,
        user_id: &str,
    ) -> Result<Vec<RewardRedemption>, StorefrontError> {
        let url = format!("{}/accounts/{user_id}/redemptions", self.base_url);

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
            .json::<Vec<RewardRedemption>>()
            .await
            .map_err(|e| transport_error(SERVICE, e))
    }
}
