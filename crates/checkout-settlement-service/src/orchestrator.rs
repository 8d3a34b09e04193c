//! 结算编排器
//!
//! 固定步骤序列：定价 -> 库存预留 -> 订单创建 -> 账本入账 -> 购物车清理。
//! 订单创建是分界点：之前的失败中止结算并补偿已扣库存，之后的失败
//! 一律降级成功——订单已经存在，残留动作进入对账队列幂等重试。
//! 没有跨下游的统一事务，一致性靠补偿与幂等重放收敛。

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{error, info, warn};
use uuid::Uuid;

use membership::{SpendPosting, TierSchedule};
use reward_engine::resolve;
use storefront_shared::error::StorefrontError;

use crate::clients::{CartStore, CatalogService, MembershipLedger, OrderService, StockReservation};
use crate::error::SettlementError;
use crate::model::{CartLine, CheckoutRequest, SettlementReceipt};
use crate::reconciler::{Residual, ResidualQueue};

// ---------------------------------------------------------------------------
// SettlementPhase — 结算阶段
// ---------------------------------------------------------------------------

/// 结算所处的阶段，用于日志与失败定位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementPhase {
    Pricing,
    Reserving,
    OrderCreating,
    LedgerPosting,
    Pruning,
    Compensating,
    Done,
    Failed,
}

impl std::fmt::Display for SettlementPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pricing => "PRICING",
            Self::Reserving => "RESERVING",
            Self::OrderCreating => "ORDER_CREATING",
            Self::LedgerPosting => "LEDGER_POSTING",
            Self::Pruning => "PRUNING",
            Self::Compensating => "COMPENSATING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// 单行库存预留的归类结果（保留首个失败行用于报错）
enum ReserveOutcome {
    Reserved,
    Insufficient,
    Missing,
    Transport(StorefrontError),
}

// ---------------------------------------------------------------------------
// CheckoutOrchestrator
// ---------------------------------------------------------------------------

/// 结算编排器
///
/// 持有四个下游的 trait 对象与等级门槛表。自身无状态，
/// 可被多个并发请求共享。
pub struct CheckoutOrchestrator {
    catalog: Arc<dyn CatalogService>,
    orders: Arc<dyn OrderService>,
    ledger: Arc<dyn MembershipLedger>,
    cart: Arc<dyn CartStore>,
    tiers: TierSchedule,
    residuals: Arc<ResidualQueue>,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        orders: Arc<dyn OrderService>,
        ledger: Arc<dyn MembershipLedger>,
        cart: Arc<dyn CartStore>,
        tiers: TierSchedule,
        residuals: Arc<ResidualQueue>,
    ) -> Self {
        Self {
            catalog,
            orders,
            ledger,
            cart,
            tiers,
            residuals,
        }
    }

    /// 执行一次结算
    ///
    /// 成功（含降级成功）返回回执；中止性失败返回错误，
    /// 返回前已完成对已扣库存的补偿。
    pub async fn settle(
        &self,
        request: CheckoutRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let started = Instant::now();
        let result = self.settle_inner(&request).await;

        histogram!("settlement_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                let outcome = if receipt.ledger_pending || !receipt.cart_pruned {
                    "degraded"
                } else {
                    "success"
                };
                counter!("settlements_total", "outcome" => outcome).increment(1);
            }
            Err(e) => {
                counter!("settlements_total", "outcome" => "failed").increment(1);
                counter!("settlement_failures_total", "code" => e.code()).increment(1);
            }
        }
        result
    }

    async fn settle_inner(
        &self,
        request: &CheckoutRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        let user_id = request.user_id.as_str();

        // 前置条件：空选择与非法奖励在任何远程调用之前被拒绝
        if request.selected_lines.is_empty() {
            return Err(SettlementError::EmptySelection);
        }
        if let Some(reward) = &request.reward {
            reward.validate()?;
        }

        // 阶段一：定价（纯计算，失败不需要补偿）
        info!(user_id, phase = %SettlementPhase::Pricing, "结算开始");
        let quote = resolve(
            request.subtotal(),
            request.reward.as_ref(),
            request.shipping_base_cost,
        )?;
        info!(
            user_id,
            subtotal = quote.subtotal,
            discount = quote.discount,
            shipping_cost = quote.shipping_cost,
            final_total = quote.final_total,
            "定价完成"
        );

        // 阶段二：并发预留库存
        info!(
            user_id,
            phase = %SettlementPhase::Reserving,
            line_count = request.selected_lines.len(),
            "开始预留库存"
        );
        let outcomes = self.reserve_all(&request.selected_lines).await;

        let applied: Vec<&CartLine> = request
            .selected_lines
            .iter()
            .zip(outcomes.iter())
            .filter(|(_, o)| matches!(o, ReserveOutcome::Reserved))
            .map(|(line, _)| line)
            .collect();

        // 按行顺序取首个失败行报错
        let first_failure = request
            .selected_lines
            .iter()
            .zip(outcomes.iter())
            .find(|(_, o)| !matches!(o, ReserveOutcome::Reserved));

        if let Some((line, outcome)) = first_failure {
            self.compensate(user_id, &applied).await;
            let err = match outcome {
                ReserveOutcome::Insufficient => SettlementError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    variant: line.variant.to_string(),
                },
                ReserveOutcome::Missing => SettlementError::LineUnavailable {
                    product_id: line.product_id.clone(),
                },
                ReserveOutcome::Transport(e) => {
                    warn!(user_id, product_id = %line.product_id, error = %e, "目录服务调用失败");
                    SettlementError::LineUnavailable {
                        product_id: line.product_id.clone(),
                    }
                }
                ReserveOutcome::Reserved => unreachable!(),
            };
            info!(user_id, phase = %SettlementPhase::Failed, code = err.code(), "结算中止");
            return Err(err);
        }

        // 阶段三：创建订单。失败则全量补偿后中止。
        info!(user_id, phase = %SettlementPhase::OrderCreating, "创建订单");
        let order_id = match self
            .orders
            .create_order(user_id, &request.selected_lines, quote.final_total)
            .await
        {
            Ok(order_id) => order_id,
            Err(e) => {
                warn!(user_id, error = %e, "订单创建失败，回滚全部库存预留");
                let all: Vec<&CartLine> = request.selected_lines.iter().collect();
                self.compensate(user_id, &all).await;
                info!(user_id, phase = %SettlementPhase::Failed, "结算中止");
                return Err(SettlementError::OrderServiceUnavailable(e.to_string()));
            }
        };

        // 使用奖励的结算生成一条兑换记录 ID，随入账写入账本
        let redemption_id = request
            .reward
            .as_ref()
            .map(|_| format!("rdm-{}", Uuid::now_v7()));

        // 阶段四：账本入账。失败降级，不回滚订单。
        info!(user_id, order_id, phase = %SettlementPhase::LedgerPosting, "账本入账");
        let posting = SpendPosting {
            amount: quote.final_total,
            points: quote.points_awarded,
            redemption_id,
            reward_kind: request.reward.as_ref().map(|r| r.kind().to_string()),
            idempotency_key: format!("settle-{order_id}"),
        };
        let ledger_pending = match self.ledger.post_spend(user_id, &posting).await {
            Ok(account) => {
                let status = self.tiers.status_for(account.total_spent);
                info!(
                    user_id,
                    order_id,
                    tier = %status.tier,
                    progress = status.progress_fraction,
                    "入账完成，等级已刷新"
                );
                false
            }
            Err(e) => {
                warn!(user_id, order_id, error = %e, "账本入账失败，转后台对账");
                counter!("ledger_residuals_total").increment(1);
                self.residuals.enqueue(
                    &order_id,
                    Residual::Ledger {
                        user_id: user_id.to_string(),
                        posting,
                    },
                );
                true
            }
        };

        // 阶段五：清理已结算的购物车行。失败降级。
        info!(user_id, order_id, phase = %SettlementPhase::Pruning, "清理购物车");
        let mut unpruned: Vec<String> = Vec::new();
        for line in &request.selected_lines {
            if let Err(e) = self.cart.delete_cart_line(&line.id).await {
                warn!(user_id, line_id = %line.id, error = %e, "购物车行删除失败");
                unpruned.push(line.id.clone());
            }
        }
        let cart_pruned = unpruned.is_empty();
        if !cart_pruned {
            self.residuals
                .enqueue(&order_id, Residual::Prune { line_ids: unpruned });
        }

        info!(
            user_id,
            order_id,
            phase = %SettlementPhase::Done,
            final_total = quote.final_total,
            points_awarded = quote.points_awarded,
            ledger_pending,
            cart_pruned,
            "结算完成"
        );

        Ok(SettlementReceipt {
            order_id,
            final_total: quote.final_total,
            points_awarded: quote.points_awarded,
            ledger_pending,
            cart_pruned,
        })
    }

    /// 并发预留所有行的库存
    ///
    /// join_all 保证结果按行顺序返回，即使完成顺序不同。
    async fn reserve_all(&self, lines: &[CartLine]) -> Vec<ReserveOutcome> {
        let futures = lines.iter().map(|line| async move {
            match self
                .catalog
                .reserve_stock(&line.product_id, &line.variant, line.quantity)
                .await
            {
                Ok(StockReservation::Reserved) => ReserveOutcome::Reserved,
                Ok(StockReservation::InsufficientStock) => ReserveOutcome::Insufficient,
                Ok(StockReservation::ProductMissing) => ReserveOutcome::Missing,
                Err(e) => ReserveOutcome::Transport(e),
            }
        });
        join_all(futures).await
    }

    /// 补偿：按应用顺序的逆序释放已扣库存
    ///
    /// 单行释放失败不阻断其余行的释放；失败行以告警日志与指标留痕，
    /// 该行库存会一直偏低直到人工修复。
    async fn compensate(&self, user_id: &str, applied: &[&CartLine]) {
        if applied.is_empty() {
            return;
        }
        info!(
            user_id,
            phase = %SettlementPhase::Compensating,
            line_count = applied.len(),
            "开始库存补偿"
        );

        for line in applied.iter().rev() {
            match self
                .catalog
                .release_stock(&line.product_id, &line.variant, line.quantity)
                .await
            {
                Ok(()) => {
                    counter!("stock_compensations_total").increment(1);
                }
                Err(e) => {
                    counter!("compensation_failures_total").increment(1);
                    error!(
                        user_id,
                        product_id = %line.product_id,
                        variant = %line.variant,
                        quantity = line.quantity,
                        error = %e,
                        "库存补偿失败，该行库存将持续偏低，需人工修复"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;

    use membership::{MembershipAccount, RewardRedemption, Tier};
    use reward_engine::RewardOffer;

    use crate::model::{Product, VariantKey};

    // 可配置的目录 mock：按 (product_id, variant) 维护库存并记录释放调用
    struct MockCatalog {
        stock: Mutex<HashMap<(String, String), u32>>,
        releases: Mutex<Vec<(String, String, u32)>>,
        release_fail: AtomicBool,
    }

    impl MockCatalog {
        fn with_stock(entries: &[(&str, &str, u32)]) -> Self {
            let stock = entries
                .iter()
                .map(|(p, v, q)| ((p.to_string(), v.to_string()), *q))
                .collect();
            Self {
                stock: Mutex::new(stock),
                releases: Mutex::new(Vec::new()),
                release_fail: AtomicBool::new(false),
            }
        }

        /// 之后的 release_stock 调用全部失败（调用本身仍被记录）
        fn break_release(&self) {
            self.release_fail.store(true, Ordering::SeqCst);
        }

        fn release_count(&self) -> usize {
            self.releases.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CatalogService for MockCatalog {
        async fn get_product(
            &self,
            product_id: &str,
        ) -> Result<Option<Product>, StorefrontError> {
            Ok(Some(Product {
                product_id: product_id.to_string(),
                name: "测试商品".to_string(),
            }))
        }

        async fn reserve_stock(
            &self,
            product_id: &str,
            variant: &VariantKey,
            quantity: u32,
        ) -> Result<StockReservation, StorefrontError> {
            let key = (product_id.to_string(), variant.to_string());
            let mut stock = self.stock.lock().unwrap();
            match stock.get_mut(&key) {
                None => Ok(StockReservation::ProductMissing),
                Some(available) if *available < quantity => {
                    Ok(StockReservation::InsufficientStock)
                }
                Some(available) => {
                    *available -= quantity;
                    Ok(StockReservation::Reserved)
                }
            }
        }

        async fn release_stock(
            &self,
            product_id: &str,
            variant: &VariantKey,
            quantity: u32,
        ) -> Result<(), StorefrontError> {
            self.releases.lock().unwrap().push((
                product_id.to_string(),
                variant.to_string(),
                quantity,
            ));
            if self.release_fail.load(Ordering::SeqCst) {
                return Err(StorefrontError::external("catalog", "库存释放失败"));
            }
            let key = (product_id.to_string(), variant.to_string());
            if let Some(available) = self.stock.lock().unwrap().get_mut(&key) {
                *available += quantity;
            }
            Ok(())
        }
    }

    struct MockOrders {
        fail: bool,
        created: AtomicU32,
    }

    #[async_trait]
    impl OrderService for MockOrders {
        async fn create_order(
            &self,
            _user_id: &str,
            _lines: &[CartLine],
            _total_price: f64,
        ) -> Result<String, StorefrontError> {
            if self.fail {
                return Err(StorefrontError::ExternalServiceTimeout {
                    service: "order".to_string(),
                });
            }
            let n = self.created.fetch_add(1, Ordering::SeqCst);
            Ok(format!("ORD-{n}"))
        }

        async fn confirm_order(
            &self,
            _user_id: &str,
            _order_id: &str,
        ) -> Result<(), StorefrontError> {
            Ok(())
        }

        async fn get_order(&self, _order_id: &str) -> Result<crate::model::Order, StorefrontError> {
            unimplemented!("测试不使用")
        }
    }

    struct MockLedger {
        fail: bool,
        postings: Mutex<Vec<SpendPosting>>,
    }

    #[async_trait]
    impl MembershipLedger for MockLedger {
        async fn post_spend(
            &self,
            user_id: &str,
            posting: &SpendPosting,
        ) -> Result<MembershipAccount, StorefrontError> {
            if self.fail {
                return Err(StorefrontError::external("membership", "账本不可用"));
            }
            self.postings.lock().unwrap().push(posting.clone());
            Ok(MembershipAccount {
                user_id: user_id.to_string(),
                tier: Tier::Bronze,
                total_spent: posting.amount,
                total_points: posting.points,
            })
        }

        async fn get_account(&self, _user_id: &str) -> Result<MembershipAccount, StorefrontError> {
            unimplemented!("测试不使用")
        }

        async fn list_redemptions(
            &self,
            _user_id: &str,
        ) -> Result<Vec<RewardRedemption>, StorefrontError> {
            Ok(vec![])
        }
    }

    struct MockCart {
        fail: AtomicBool,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CartStore for MockCart {
        async fn list_cart_lines(&self, _user_id: &str) -> Result<Vec<CartLine>, StorefrontError> {
            Ok(vec![])
        }

        async fn delete_cart_line(&self, line_id: &str) -> Result<(), StorefrontError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorefrontError::external("cart", "购物车不可用"));
            }
            self.deleted.lock().unwrap().push(line_id.to_string());
            Ok(())
        }
    }

    struct Fixture {
        catalog: Arc<MockCatalog>,
        orders: Arc<MockOrders>,
        ledger: Arc<MockLedger>,
        cart: Arc<MockCart>,
        residuals: Arc<ResidualQueue>,
        orchestrator: CheckoutOrchestrator,
    }

    fn fixture(catalog: MockCatalog, orders_fail: bool, ledger_fail: bool, cart_fail: bool) -> Fixture {
        let catalog = Arc::new(catalog);
        let orders = Arc::new(MockOrders {
            fail: orders_fail,
            created: AtomicU32::new(1),
        });
        let ledger = Arc::new(MockLedger {
            fail: ledger_fail,
            postings: Mutex::new(Vec::new()),
        });
        let cart = Arc::new(MockCart {
            fail: AtomicBool::new(cart_fail),
            deleted: Mutex::new(Vec::new()),
        });
        let residuals = Arc::new(ResidualQueue::new());
        let orchestrator = CheckoutOrchestrator::new(
            catalog.clone(),
            orders.clone(),
            ledger.clone(),
            cart.clone(),
            TierSchedule::default(),
            residuals.clone(),
        );
        Fixture {
            catalog,
            orders,
            ledger,
            cart,
            residuals,
            orchestrator,
        }
    }

    fn line(id: &str, product_id: &str, unit_price: f64, quantity: u32) -> CartLine {
        CartLine {
            id: id.to_string(),
            product_id: product_id.to_string(),
            variant: VariantKey {
                color: "black".to_string(),
                size: "M".to_string(),
            },
            unit_price,
            quantity,
        }
    }

    fn request(lines: Vec<CartLine>, reward: Option<RewardOffer>) -> CheckoutRequest {
        CheckoutRequest {
            user_id: "user-001".to_string(),
            selected_lines: lines,
            reward,
            shipping_base_cost: 5.0,
        }
    }

    #[tokio::test]
    async fn test_empty_selection_rejected_before_any_call() {
        let f = fixture(MockCatalog::with_stock(&[]), false, false, false);

        let err = f.orchestrator.settle(request(vec![], None)).await.unwrap_err();
        assert!(matches!(err, SettlementError::EmptySelection));
        assert_eq!(f.orders.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_reward_rejected_before_any_call() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10)]),
            false,
            false,
            false,
        );

        // 绕过构造函数模拟反序列化出的非法奖励
        let bad = RewardOffer::Discount {
            percent: 150.0,
            max_cap: 50.0,
        };
        let err = f
            .orchestrator
            .settle(request(vec![line("l1", "prod-a", 10.0, 1)], Some(bad)))
            .await
            .unwrap_err();

        assert!(matches!(err, SettlementError::InvalidReward(_)));
        assert_eq!(f.catalog.release_count(), 0);
    }

    /// 验收场景：小计 120，85 折上限 50，运费 5 -> 实付 107，积分 107
    #[tokio::test]
    async fn test_happy_path_with_discount() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10), ("prod-b", "black/M", 10)]),
            false,
            false,
            false,
        );

        let reward = RewardOffer::discount(15.0, 50.0).unwrap();
        let lines = vec![line("l1", "prod-a", 50.0, 2), line("l2", "prod-b", 20.0, 1)];
        let receipt = f
            .orchestrator
            .settle(request(lines, Some(reward)))
            .await
            .unwrap();

        assert_eq!(receipt.final_total, 107.0);
        assert_eq!(receipt.points_awarded, 107);
        assert!(!receipt.ledger_pending);
        assert!(receipt.cart_pruned);

        // 入账携带幂等键与兑换记录
        let postings = f.ledger.postings.lock().unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].idempotency_key, format!("settle-{}", receipt.order_id));
        assert!(postings[0].redemption_id.as_deref().unwrap().starts_with("rdm-"));
        assert_eq!(postings[0].reward_kind.as_deref(), Some("DISCOUNT"));

        // 两条行都被清理
        assert_eq!(f.cart.deleted.lock().unwrap().len(), 2);
        assert!(f.residuals.is_empty());
    }

    /// 验收场景：第二行库存不足时，第一行的预留被恰好释放一次
    #[tokio::test]
    async fn test_partial_reserve_failure_releases_applied_exactly_once() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10), ("prod-b", "black/M", 0)]),
            false,
            false,
            false,
        );

        let lines = vec![line("l1", "prod-a", 50.0, 2), line("l2", "prod-b", 20.0, 1)];
        let err = f.orchestrator.settle(request(lines, None)).await.unwrap_err();

        match err {
            SettlementError::InsufficientStock { product_id, variant } => {
                assert_eq!(product_id, "prod-b");
                assert_eq!(variant, "black/M");
            }
            other => panic!("期望 InsufficientStock，得到 {other:?}"),
        }

        let releases = f.catalog.releases.lock().unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0], ("prod-a".to_string(), "black/M".to_string(), 2));

        // 库存恢复到初始值
        let stock = f.catalog.stock.lock().unwrap();
        assert_eq!(stock[&("prod-a".to_string(), "black/M".to_string())], 10);
    }

    /// 补偿失败只留告警与指标，不改变用户看到的失败原因
    #[tokio::test]
    async fn test_release_failure_keeps_original_error_classification() {
        let catalog =
            MockCatalog::with_stock(&[("prod-a", "black/M", 10), ("prod-b", "black/M", 0)]);
        catalog.break_release();
        let f = fixture(catalog, false, false, false);

        let lines = vec![line("l1", "prod-a", 50.0, 2), line("l2", "prod-b", 20.0, 1)];
        let err = f.orchestrator.settle(request(lines, None)).await.unwrap_err();

        // 用户看到的仍是库存不足，而不是补偿过程的错误
        match err {
            SettlementError::InsufficientStock { product_id, .. } => {
                assert_eq!(product_id, "prod-b");
            }
            other => panic!("期望 InsufficientStock，得到 {other:?}"),
        }
        // 已预留的 prod-a 仍被尝试释放了一次
        assert_eq!(f.catalog.release_count(), 1);
    }

    /// 单行释放失败不阻断其余行：订单失败回滚时每行各有一次释放尝试
    #[tokio::test]
    async fn test_release_failure_does_not_block_remaining_lines() {
        let catalog =
            MockCatalog::with_stock(&[("prod-a", "black/M", 10), ("prod-b", "black/M", 10)]);
        catalog.break_release();
        let f = fixture(catalog, true, false, false);

        let lines = vec![line("l1", "prod-a", 50.0, 2), line("l2", "prod-b", 20.0, 1)];
        let err = f.orchestrator.settle(request(lines, None)).await.unwrap_err();

        assert!(matches!(err, SettlementError::OrderServiceUnavailable(_)));

        let releases = f.catalog.releases.lock().unwrap();
        assert_eq!(releases.len(), 2);
        // 逆序释放，且第一行的失败没有挡住第二行
        assert_eq!(releases[0].0, "prod-b");
        assert_eq!(releases[1].0, "prod-a");
    }

    #[tokio::test]
    async fn test_missing_product_reports_first_offending_line() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-b", "black/M", 10)]),
            false,
            false,
            false,
        );

        let lines = vec![line("l1", "prod-a", 50.0, 1), line("l2", "prod-b", 20.0, 1)];
        let err = f.orchestrator.settle(request(lines, None)).await.unwrap_err();

        match err {
            SettlementError::LineUnavailable { product_id } => {
                assert_eq!(product_id, "prod-a");
            }
            other => panic!("期望 LineUnavailable，得到 {other:?}"),
        }
        // prod-b 的预留被补偿释放
        assert_eq!(f.catalog.release_count(), 1);
    }

    #[tokio::test]
    async fn test_order_failure_releases_all_reservations() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10), ("prod-b", "black/M", 10)]),
            true,
            false,
            false,
        );

        let lines = vec![line("l1", "prod-a", 50.0, 2), line("l2", "prod-b", 20.0, 1)];
        let err = f.orchestrator.settle(request(lines, None)).await.unwrap_err();

        assert!(matches!(err, SettlementError::OrderServiceUnavailable(_)));
        assert_eq!(f.catalog.release_count(), 2);

        let stock = f.catalog.stock.lock().unwrap();
        assert_eq!(stock[&("prod-a".to_string(), "black/M".to_string())], 10);
        assert_eq!(stock[&("prod-b".to_string(), "black/M".to_string())], 10);
    }

    #[tokio::test]
    async fn test_ledger_failure_degrades_to_pending_receipt() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10)]),
            false,
            true,
            false,
        );

        let receipt = f
            .orchestrator
            .settle(request(vec![line("l1", "prod-a", 40.0, 1)], None))
            .await
            .unwrap();

        // 订单有效，入账残留进入对账队列
        assert!(receipt.ledger_pending);
        assert!(receipt.cart_pruned);
        assert_eq!(receipt.final_total, 45.0);
        assert_eq!(f.residuals.len(), 1);
        // 库存不回滚
        assert_eq!(f.catalog.release_count(), 0);
    }

    #[tokio::test]
    async fn test_prune_failure_degrades_receipt_flag() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10)]),
            false,
            false,
            true,
        );

        let receipt = f
            .orchestrator
            .settle(request(vec![line("l1", "prod-a", 40.0, 1)], None))
            .await
            .unwrap();

        assert!(!receipt.cart_pruned);
        assert!(!receipt.ledger_pending);
        assert_eq!(f.residuals.len(), 1);
    }

    /// 验收场景：免运费奖励，小计 40 运费 5 -> 实付 40
    #[tokio::test]
    async fn test_free_shipping_zeroes_shipping() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10)]),
            false,
            false,
            false,
        );

        let receipt = f
            .orchestrator
            .settle(request(
                vec![line("l1", "prod-a", 40.0, 1)],
                Some(RewardOffer::free_shipping()),
            ))
            .await
            .unwrap();

        assert_eq!(receipt.final_total, 40.0);
        assert_eq!(receipt.points_awarded, 40);
    }

    #[tokio::test]
    async fn test_no_reward_posting_has_no_redemption() {
        let f = fixture(
            MockCatalog::with_stock(&[("prod-a", "black/M", 10)]),
            false,
            false,
            false,
        );

        f.orchestrator
            .settle(request(vec![line("l1", "prod-a", 40.0, 1)], None))
            .await
            .unwrap();

        let postings = f.ledger.postings.lock().unwrap();
        assert!(postings[0].redemption_id.is_none());
    }
}
