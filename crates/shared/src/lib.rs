//! 共享库
//!
//! 包含各服务共用的配置、错误处理、重试策略与可观测性基础设施代码。

pub mod config;
pub mod error;
pub mod observability;
pub mod retry;
