//! 降级成功残留的后台对账
//!
//! 订单创建成功之后的账本入账与购物车清理失败不回滚订单，只在回执上
//! 打降级标记，残留动作进入本模块的队列，由后台任务按指数退避幂等重试。
//! 账本入账携带 settle-{order_id} 幂等键，购物车删除天然幂等，
//! 所以重放永远安全。超过最大重试次数的残留会被放弃并以告警日志留痕，
//! 转入人工处理。

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use membership::SpendPosting;
use storefront_shared::retry::RetryPolicy;

use crate::clients::{CartStore, MembershipLedger};

// ---------------------------------------------------------------------------
// Residual — 残留动作
// ---------------------------------------------------------------------------

/// 一条待补齐的残留动作
#[derive(Debug, Clone)]
pub enum Residual {
    /// 账本入账未完成（订单已存在，金额与积分待记账）
    Ledger {
        user_id: String,
        posting: SpendPosting,
    },
    /// 已结算行的购物车清理未完成
    Prune { line_ids: Vec<String> },
}

impl Residual {
    fn kind(&self) -> &'static str {
        match self {
            Self::Ledger { .. } => "ledger",
            Self::Prune { .. } => "prune",
        }
    }
}

struct ResidualEntry {
    residual: Residual,
    order_id: String,
    attempts: u32,
    next_attempt_at: Instant,
}

// ---------------------------------------------------------------------------
// ResidualQueue — 内存残留队列
// ---------------------------------------------------------------------------

/// 残留队列
///
/// 按 (order_id, 动作类型) 去重：同一订单的同类残留最多一条，
/// 重复入队只会覆盖为最新内容。进程重启会丢失队列内容，
/// 丢失的账本残留依赖幂等键保证人工补账不会重复累计。
#[derive(Default)]
pub struct ResidualQueue {
    entries: DashMap<String, ResidualEntry>,
}

impl ResidualQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队一条残留，立即可被下一轮对账拾取
    pub fn enqueue(&self, order_id: &str, residual: Residual) {
        let kind = residual.kind();
        let key = format!("{order_id}:{kind}");

        warn!(order_id, kind, "残留动作入队，等待后台对账");
        self.entries.insert(
            key,
            ResidualEntry {
                residual,
                order_id: order_id.to_string(),
                attempts: 0,
                next_attempt_at: Instant::now(),
            },
        );
    }

    /// 当前队列长度（诊断用）
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reconciler — 后台对账任务
// ---------------------------------------------------------------------------

/// 后台对账任务
///
/// 周期性扫描残留队列，对到期条目重放其动作。重试间隔由共享的
/// RetryPolicy 计算，失败条目带退避重新排期。
pub struct Reconciler {
    queue: Arc<ResidualQueue>,
    ledger: Arc<dyn MembershipLedger>,
    cart: Arc<dyn CartStore>,
    policy: RetryPolicy,
    interval: Duration,
    max_retries: u32,
}

impl Reconciler {
    pub fn new(
        queue: Arc<ResidualQueue>,
        ledger: Arc<dyn MembershipLedger>,
        cart: Arc<dyn CartStore>,
        policy: RetryPolicy,
        interval: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            queue,
            ledger,
            cart,
            policy,
            interval,
            max_retries,
        }
    }

    /// 启动后台循环
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                max_retries = self.max_retries,
                "后台对账任务启动"
            );
            let mut ticker = tokio::time::interval(self.interval);
            // 错过的 tick 不补偿，对账没有积压追赶的必要
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                self.drain_once().await;
            }
        })
    }

    /// 扫描一轮队列，重放所有到期条目
    ///
    /// 单独拆出来便于测试：测试直接调用它而不依赖时间流逝。
    pub async fn drain_once(&self) {
        let now = Instant::now();
        let due: Vec<String> = self
            .queue
            .entries
            .iter()
            .filter(|entry| entry.next_attempt_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        for key in due {
            // 先取出动作内容再执行，避免跨 await 持有分片锁
            let (residual, order_id, attempts) = match self.queue.entries.get(&key) {
                Some(entry) => (
                    entry.residual.clone(),
                    entry.order_id.clone(),
                    entry.attempts,
                ),
                None => continue,
            };

            match self.replay(&residual).await {
                Ok(()) => {
                    self.queue.entries.remove(&key);
                    counter!("residuals_recovered_total", "kind" => residual.kind()).increment(1);
                    info!(order_id, kind = residual.kind(), attempts, "残留动作补齐成功");
                }
                Err(e) => {
                    let attempts = attempts + 1;
                    if attempts > self.max_retries {
                        self.queue.entries.remove(&key);
                        counter!("residuals_abandoned_total", "kind" => residual.kind())
                            .increment(1);
                        // 放弃后只剩日志留痕，转入人工处理
                        error!(
                            order_id,
                            kind = residual.kind(),
                            attempts,
                            error = %e,
                            "残留动作超过最大重试次数，放弃并转人工处理"
                        );
                    } else {
                        let delay = self.policy.delay_for_attempt(attempts - 1);
                        if let Some(mut entry) = self.queue.entries.get_mut(&key) {
                            entry.attempts = attempts;
                            entry.next_attempt_at = Instant::now() + delay;
                        }
                        warn!(
                            order_id,
                            kind = residual.kind(),
                            attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "残留动作重放失败，退避后重试"
                        );
                    }
                }
            }
        }
    }

    async fn replay(&self, residual: &Residual) -> Result<(), storefront_shared::error::StorefrontError> {
        match residual {
            Residual::Ledger { user_id, posting } => {
                self.ledger.post_spend(user_id, posting).await?;
                Ok(())
            }
            Residual::Prune { line_ids } => {
                for line_id in line_ids {
                    self.cart.delete_cart_line(line_id).await?;
                }
                Ok(())
            }
        }
    }
}
