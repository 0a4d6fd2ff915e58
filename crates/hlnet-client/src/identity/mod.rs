//! 身份管理模块
//!
//! 该模块负责组织身份的完整生命周期：解析 CA 配置、管理凭据存储、
//! 物化注册员，并通过 CA 协议完成登记、重新登记、注册和吊销。

mod ca_client;
mod context;
mod crypto;
mod identity_config;
mod identity_manager;
mod protocol;
mod registrar;
mod user_store;

pub use ca_client::CaClient;
pub use context::ClientContext;
pub use crypto::CryptoSuite;
pub use identity_config::{config_for_org, IdentityConfig, NetworkIdentityConfig, ResolvedCaConfig};
pub use identity_manager::IdentityManager;
pub use protocol::{CaTransport, EnrollmentProtocol, ProtocolError};
pub use registrar::RegistrarLocks;
pub use user_store::{FileUserStore, MemoryUserStore, UserStore};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::endpoint::EndpointConfig;

/// 初始化身份管理系统
///
/// 在 `client.credentialStore.path` 下创建文件凭据存储，并组装客户端上下文。
pub async fn init_identity_system(
    endpoint_config: EndpointConfig,
    crypto_suite: Arc<dyn CryptoSuite>,
    protocol: Arc<dyn EnrollmentProtocol>,
) -> Result<ClientContext> {
    let identity_config = NetworkIdentityConfig::new(endpoint_config.clone());
    let store_path = identity_config.credential_store_path();
    let user_store = FileUserStore::new(&store_path)
        .await
        .with_context(|| format!("无法创建凭据存储: {}", store_path.display()))?;

    info!("身份管理系统已初始化，凭据存储: {}", store_path.display());
    Ok(ClientContext::new(
        endpoint_config,
        crypto_suite,
        Arc::new(user_store),
        protocol,
    )
    .with_identity_config(Arc::new(identity_config)))
}
