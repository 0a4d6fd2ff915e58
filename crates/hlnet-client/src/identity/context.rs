//! 客户端上下文
//!
//! 汇总 CA 客户端需要的全部协作者。同一个上下文创建的 CA 客户端共享注册员锁。

use std::sync::Arc;
use std::time::Duration;

use super::crypto::CryptoSuite;
use super::identity_config::{IdentityConfig, NetworkIdentityConfig};
use super::protocol::EnrollmentProtocol;
use super::registrar::RegistrarLocks;
use super::user_store::UserStore;
use crate::endpoint::EndpointConfig;

/// 客户端上下文
#[derive(Clone)]
pub struct ClientContext {
    pub endpoint_config: EndpointConfig,
    pub identity_config: Arc<dyn IdentityConfig>,
    pub crypto_suite: Arc<dyn CryptoSuite>,
    pub user_store: Arc<dyn UserStore>,
    pub protocol: Arc<dyn EnrollmentProtocol>,
    pub registrar_locks: Arc<RegistrarLocks>,
    pub request_timeout: Duration,
}

impl ClientContext {
    /// 创建上下文，身份配置直接取自网络配置
    pub fn new(
        endpoint_config: EndpointConfig,
        crypto_suite: Arc<dyn CryptoSuite>,
        user_store: Arc<dyn UserStore>,
        protocol: Arc<dyn EnrollmentProtocol>,
    ) -> Self {
        let request_timeout =
            Duration::from_secs(endpoint_config.network().client.ca_request_timeout_secs);
        let identity_config = Arc::new(NetworkIdentityConfig::new(endpoint_config.clone()));
        Self {
            endpoint_config,
            identity_config,
            crypto_suite,
            user_store,
            protocol,
            registrar_locks: Arc::new(RegistrarLocks::new()),
            request_timeout,
        }
    }

    /// 替换身份配置
    pub fn with_identity_config(mut self, identity_config: Arc<dyn IdentityConfig>) -> Self {
        self.identity_config = identity_config;
        self
    }

    /// 设置单次 CA 请求超时
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
