//! CA 配置解析模块
//!
//! 该模块为组织解析 CA 配置：CA 地址、TLS 主机名、服务端信任根、
//! 双向 TLS 客户端证书与私钥以及注册员凭据。每个阶段的失败都带有阶段标记，
//! 以便区分配置语法错误和文件缺失。

use hlnet_common::{CaConfig, ConfigStage, EnrollCredentials, Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::protocol::CaTransport;
use crate::endpoint::EndpointConfig;

/// 身份相关配置的访问接口
#[cfg_attr(test, mockall::automock)]
pub trait IdentityConfig: Send + Sync {
    /// 组织当前使用的 CA 配置
    fn ca_config(&self, org_name: &str) -> Result<CaConfig>;

    /// CA 服务端信任根
    fn ca_server_certs(&self, org_name: &str) -> Result<Vec<Vec<u8>>>;

    /// CA 客户端证书
    fn ca_client_cert(&self, org_name: &str) -> Result<Vec<u8>>;

    /// CA 客户端私钥
    fn ca_client_key(&self, org_name: &str) -> Result<Vec<u8>>;

    /// 凭据存储目录
    fn credential_store_path(&self) -> PathBuf;
}

/// 基于网络配置的 [`IdentityConfig`] 实现
#[derive(Debug, Clone)]
pub struct NetworkIdentityConfig {
    endpoint_config: EndpointConfig,
}

impl NetworkIdentityConfig {
    pub fn new(endpoint_config: EndpointConfig) -> Self {
        Self { endpoint_config }
    }
}

impl IdentityConfig for NetworkIdentityConfig {
    fn ca_config(&self, org_name: &str) -> Result<CaConfig> {
        let org = self.endpoint_config.organization(org_name)?;
        let ca_name = org.certificate_authorities.first().ok_or_else(|| {
            Error::config(
                ConfigStage::Organization,
                format!("no CAs configured for organization: {}", org_name),
            )
        })?;

        self.endpoint_config
            .ca_config(ca_name)
            .map_err(|e| e.at_stage(ConfigStage::CaConfig))
    }

    fn ca_server_certs(&self, org_name: &str) -> Result<Vec<Vec<u8>>> {
        let ca = self.ca_config(org_name)?;
        ca.tls_ca_certs
            .sources()
            .iter()
            .map(|source| source.load().map_err(|e| e.at_stage(ConfigStage::ServerCerts)))
            .collect()
    }

    fn ca_client_cert(&self, org_name: &str) -> Result<Vec<u8>> {
        let ca = self.ca_config(org_name)?;
        ca.tls_ca_certs
            .client
            .cert
            .load()
            .map_err(|e| e.at_stage(ConfigStage::ClientCert))
    }

    fn ca_client_key(&self, org_name: &str) -> Result<Vec<u8>> {
        let ca = self.ca_config(org_name)?;
        ca.tls_ca_certs
            .client
            .key
            .load()
            .map_err(|e| e.at_stage(ConfigStage::ClientKey))
    }

    fn credential_store_path(&self) -> PathBuf {
        self.endpoint_config
            .network()
            .client
            .credential_store
            .path
            .clone()
    }
}

/// 已解析的 CA 配置
#[derive(Clone)]
pub struct ResolvedCaConfig {
    pub url: String,
    pub tls_server_name: String,
    pub ca_name: Option<String>,
    pub trusted_server_certs: Vec<Vec<u8>>,
    pub client_cert: Vec<u8>,
    pub client_key: Vec<u8>,
    pub registrar: EnrollCredentials,
}

impl ResolvedCaConfig {
    /// 生成单次请求的传输参数
    pub fn transport(&self, timeout: Duration) -> CaTransport {
        CaTransport {
            url: self.url.clone(),
            tls_server_name: self.tls_server_name.clone(),
            ca_name: self.ca_name.clone(),
            trusted_roots: self.trusted_server_certs.clone(),
            client_cert: self.client_cert.clone(),
            client_key: self.client_key.clone(),
            timeout,
        }
    }
}

impl fmt::Debug for ResolvedCaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCaConfig")
            .field("url", &self.url)
            .field("tls_server_name", &self.tls_server_name)
            .field("ca_name", &self.ca_name)
            .field("trusted_server_certs", &self.trusted_server_certs.len())
            .field("client_cert", &!self.client_cert.is_empty())
            .field("client_key", &"<redacted>")
            .field("registrar", &self.registrar)
            .finish()
    }
}

/// TLS 握手使用的主机名：配置的覆盖优先，其次是 CA 地址中的主机
///
/// 经实体匹配得到的 CA 配置已经带有覆盖（规则模板、规范主机的覆盖或规范主机名）。
fn tls_server_name(ca: &CaConfig) -> Result<String> {
    if let Some(name) = ca.ssl_target_name_override() {
        return Ok(name.to_string());
    }
    let url = Url::parse(&ca.url).map_err(|e| {
        Error::config(
            ConfigStage::CaConfig,
            format!("无效的 CA 地址 {}: {}", ca.url, e),
        )
    })?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => Err(Error::config(
            ConfigStage::CaConfig,
            format!("CA 地址 {} 缺少主机名（需要 https://host:port 形式）", ca.url),
        )),
    }
}

/// 解析组织的 CA 配置
///
/// 依次读取 CA 配置块、服务端信任根、客户端证书和客户端私钥，任何一步失败立即返回。
pub fn config_for_org(config: &dyn IdentityConfig, org_name: &str) -> Result<ResolvedCaConfig> {
    let ca = config
        .ca_config(org_name)
        .map_err(|e| e.at_stage(ConfigStage::CaConfig))?;
    let tls_server_name = tls_server_name(&ca)?;
    let trusted_server_certs = config
        .ca_server_certs(org_name)
        .map_err(|e| e.at_stage(ConfigStage::ServerCerts))?;
    let client_cert = config
        .ca_client_cert(org_name)
        .map_err(|e| e.at_stage(ConfigStage::ClientCert))?;
    let client_key = config
        .ca_client_key(org_name)
        .map_err(|e| e.at_stage(ConfigStage::ClientKey))?;

    debug!(
        "组织 {} 的 CA 配置: url={}, tls={}, 信任根 {} 个",
        org_name,
        ca.url,
        tls_server_name,
        trusted_server_certs.len()
    );

    Ok(ResolvedCaConfig {
        url: ca.url,
        tls_server_name,
        ca_name: ca.ca_name,
        trusted_server_certs,
        client_cert,
        client_key,
        registrar: ca.registrar,
    })
}
