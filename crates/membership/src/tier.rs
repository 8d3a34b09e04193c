//! 会员等级计算器
//!
//! 累计消费到等级的确定性映射。纯函数，在每次账本入账后刷新展示状态，
//! 从不用于判定一笔入账是否合法。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 会员等级
///
/// 按门槛升序排列，派生 Ord 使得等级可以直接比较。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Bronze => "BRONZE",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
        };
        write!(f, "{s}")
    }
}

/// 等级配置错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierError {
    #[error("等级门槛次序无效: silver={silver}, gold={gold}，要求 0 < silver < gold")]
    InvalidSchedule { silver: f64, gold: f64 },
}

/// 等级门槛表
///
/// 门槛数值来自配置而非硬编码，但次序与下界包含性是硬约束：
/// Bronze >= 0（恒成立）、Silver >= silver_threshold、Gold >= gold_threshold。
#[derive(Debug, Clone, PartialEq)]
pub struct TierSchedule {
    silver_threshold: f64,
    gold_threshold: f64,
}

/// 等级计算结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStatus {
    pub tier: Tier,
    /// 当前等级区间内的进度，clamp 到 [0, 1]；最高等级恒为 1.0
    pub progress_fraction: f64,
    pub next_tier: Option<Tier>,
}

impl Default for TierSchedule {
    fn default() -> Self {
        Self {
            silver_threshold: 2000.0,
            gold_threshold: 4000.0,
        }
    }
}

impl TierSchedule {
    /// 从配置门槛构造等级表
    ///
    /// 校验 0 < silver < gold；违反次序的配置直接拒绝，
    /// 否则等级派生会产生无意义的进度值。
    pub fn new(silver_threshold: f64, gold_threshold: f64) -> Result<Self, TierError> {
        if !(silver_threshold > 0.0 && silver_threshold < gold_threshold) {
            return Err(TierError::InvalidSchedule {
                silver: silver_threshold,
                gold: gold_threshold,
            });
        }
        Ok(Self {
            silver_threshold,
            gold_threshold,
        })
    }

    /// 计算累计消费对应的等级与进度
    ///
    /// 等级 = 不超过 total_spent 的最高门槛（下界包含）。
    /// 进度 = (spent - 当前门槛) / (下一门槛 - 当前门槛)，clamp 到 [0, 1]。
    pub fn status_for(&self, total_spent: f64) -> TierStatus {
        let (tier, current, next) = if total_spent >= self.gold_threshold {
            (Tier::Gold, self.gold_threshold, None)
        } else if total_spent >= self.silver_threshold {
            (
                Tier::Silver,
                self.silver_threshold,
                Some((Tier::Gold, self.gold_threshold)),
            )
        } else {
            (
                Tier::Bronze,
                0.0,
                Some((Tier::Silver, self.silver_threshold)),
            )
        };

        let (progress_fraction, next_tier) = match next {
            Some((next_tier, next_threshold)) => {
                let fraction = (total_spent - current) / (next_threshold - current);
                (fraction.clamp(0.0, 1.0), Some(next_tier))
            }
            // 已是最高等级，进度恒为满
            None => (1.0, None),
        };

        TierStatus {
            tier,
            progress_fraction,
            next_tier,
        }
    }
}
