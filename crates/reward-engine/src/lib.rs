//! 奖励规则引擎
//!
//! 对选中的奖励计算其对小计金额的货币影响。整个引擎是纯函数：
//! 不触达任何外部服务，所有库存/账本副作用都发生在结算编排器中。
//!
//! 奖励的合法性在构造时校验（如折扣百分比必须落在 [0, 100]），
//! 解析阶段不做静默修正——畸形的奖励根本不应该走到这一步。

pub mod error;
pub mod offer;
pub mod resolve;

pub use error::RewardError;
pub use offer::RewardOffer;
pub use resolve::{PricingQuote, resolve};
