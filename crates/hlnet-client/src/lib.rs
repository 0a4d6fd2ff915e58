//! hlnet 客户端
//!
//! 该 crate 实现 Fabric 风格网络的端点解析与 CA 身份生命周期管理：
//! 按实体匹配规则把逻辑主机名映射到真实地址，为组织解析 CA 配置，
//! 并通过可替换的协议客户端完成身份的登记、重新登记、注册和吊销。

pub mod config;
pub mod endpoint;
pub mod identity;

pub use config::ConfigLoader;
pub use endpoint::{EndpointConfig, EntityMatcher};
pub use identity::{CaClient, ClientContext};

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use identity::{CryptoSuite, EnrollmentProtocol};

/// 从配置文件初始化客户端上下文
pub async fn init(
    config_path: impl AsRef<Path>,
    crypto_suite: Arc<dyn CryptoSuite>,
    protocol: Arc<dyn EnrollmentProtocol>,
) -> Result<ClientContext> {
    let config_path = config_path.as_ref();
    let mut loader = ConfigLoader::new(config_path);
    let endpoint_config = loader
        .load_endpoint_config()
        .with_context(|| format!("加载配置失败: {}", config_path.display()))?;

    identity::init_identity_system(endpoint_config, crypto_suite, protocol).await
}
