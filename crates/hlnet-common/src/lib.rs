//! hlnet Common - 跨模块共享工具与数据结构
//!
//! 该模块提供 hlnet 项目中所有组件共享的数据结构和错误处理。
//! 包括端点与实体匹配规则、网络配置、身份记录等数据模型以及统一的错误类型。

pub mod models;
pub mod error;

/// 重新导出常用类型，方便使用
pub use error::{CaOperation, ConfigStage, Error, Result};
pub use models::endpoint::*;
pub use models::identity::*;
pub use models::network::*;
