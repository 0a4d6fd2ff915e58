//! 数据模型模块
//!
//! 该模块定义了 hlnet 项目中使用的核心数据模型，包括端点配置、
//! 实体匹配规则、网络配置以及身份与 CA 请求结构，并提供序列化/反序列化功能。

pub mod endpoint;
pub mod identity;
pub mod network;
