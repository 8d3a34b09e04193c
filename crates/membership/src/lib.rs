//! 会员域
//!
//! 提供会员等级计算（累计消费 -> 等级 + 进度）与会员账户/兑换记录模型。
//! 等级永远从 total_spent 派生，不作为可独立漂移的事实来源存储。

pub mod account;
pub mod tier;

pub use account::{MembershipAccount, RewardRedemption, SpendPosting};
pub use tier::{Tier, TierError, TierSchedule, TierStatus};
