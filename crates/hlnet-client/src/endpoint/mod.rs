//! 端点解析模块
//!
//! 该模块负责把配置中或发现得到的主机名解析为可连接的端点。
//! 包含实体匹配器和组合静态配置的端点配置。

mod endpoint_config;
mod entity_matcher;

pub use endpoint_config::EndpointConfig;
pub use entity_matcher::EntityMatcher;
