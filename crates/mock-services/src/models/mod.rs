//! Mock 服务数据模型
//!
//! 线格式（camelCase 字段名、变体结构）与结算服务的客户端契约保持一致。

mod cart;
mod order;
mod product;

pub use cart::{MockCartLine, Variant};
pub use order::{MockOrder, OrderStatus};
pub use product::MockProduct;
