//! 网络配置模型
//!
//! 该模块定义客户端的类型化网络配置：客户端设置、组织、peer、orderer、
//! 证书颁发机构以及实体匹配规则。配置在启动时一次性加载，之后不可变。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::endpoint::{
    EntityMatchers, OrdererConfig, PeerConfig, PemSource, TlsKeyPair, SSL_TARGET_NAME_OVERRIDE,
};

/// 默认 CA 请求超时（秒）
pub const DEFAULT_CA_REQUEST_TIMEOUT_SECS: u64 = 30;

fn default_ca_request_timeout() -> u64 {
    DEFAULT_CA_REQUEST_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 完整网络配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// 网络名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 客户端配置
    #[serde(default)]
    pub client: ClientConfig,
    /// 组织配置（按组织名）
    #[serde(default)]
    pub organizations: HashMap<String, OrganizationConfig>,
    /// Orderer 配置（按主机名）
    #[serde(default)]
    pub orderers: HashMap<String, OrdererConfig>,
    /// Peer 配置（按主机名）
    #[serde(default)]
    pub peers: HashMap<String, PeerConfig>,
    /// CA 配置（按 CA 名称）
    #[serde(default)]
    pub certificate_authorities: HashMap<String, CaConfig>,
    /// 实体匹配规则
    #[serde(default)]
    pub entity_matchers: EntityMatchers,
}

impl NetworkConfig {
    /// 从 YAML 文本解析
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// 从 JSON 文本解析
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// 客户端所属组织
    #[serde(default)]
    pub organization: String,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 凭据存储配置
    #[serde(default)]
    pub credential_store: CredentialStoreConfig,
    /// 单次 CA 请求的超时（秒）
    #[serde(default = "default_ca_request_timeout")]
    pub ca_request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            organization: String::new(),
            logging: LoggingConfig::default(),
            credential_store: CredentialStoreConfig::default(),
            ca_request_timeout_secs: DEFAULT_CA_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// 凭据存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStoreConfig {
    pub path: PathBuf,
}

impl Default for CredentialStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/hlnet/state-store"),
        }
    }
}

/// 组织配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationConfig {
    /// MSP ID
    #[serde(rename = "mspid")]
    pub msp_id: String,
    /// 加密材料目录
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_path: Option<String>,
    /// 内嵌用户（证书 + 私钥）
    #[serde(default)]
    pub users: HashMap<String, TlsKeyPair>,
    /// 组织下的 peer
    #[serde(default)]
    pub peers: Vec<String>,
    /// 组织使用的 CA 名称，第一个为当前 CA
    #[serde(default)]
    pub certificate_authorities: Vec<String>,
}

/// 注册凭据
///
/// 注册密钥只用于换取证书，不随已签发的身份一起保存。
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollCredentials {
    #[serde(default, rename = "enrollId")]
    pub enroll_id: String,
    #[serde(default, rename = "enrollSecret")]
    pub enroll_secret: String,
}

impl EnrollCredentials {
    pub fn new(enroll_id: impl Into<String>, enroll_secret: impl Into<String>) -> Self {
        Self {
            enroll_id: enroll_id.into(),
            enroll_secret: enroll_secret.into(),
        }
    }
}

impl fmt::Debug for EnrollCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollCredentials")
            .field("enroll_id", &self.enroll_id)
            .field("enroll_secret", &"<redacted>")
            .finish()
    }
}

/// CA 的 TLS 配置：服务端信任根与双向 TLS 客户端证书
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaTlsConfig {
    /// 信任根文件路径
    #[serde(default)]
    pub path: Vec<PathBuf>,
    /// 内联信任根
    #[serde(default)]
    pub pem: Vec<String>,
    /// 客户端证书与私钥
    #[serde(default)]
    pub client: TlsKeyPair,
}

impl CaTlsConfig {
    /// 所有信任根来源，内联在前
    pub fn sources(&self) -> Vec<PemSource> {
        self.pem
            .iter()
            .map(PemSource::inline)
            .chain(self.path.iter().map(PemSource::file))
            .collect()
    }
}

/// CA 静态配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaConfig {
    /// CA 服务地址
    pub url: String,
    /// CA 服务端上的 CA 名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: CaTlsConfig,
    /// 注册员凭据
    #[serde(default)]
    pub registrar: EnrollCredentials,
    /// HTTP 连接选项
    #[serde(default)]
    pub http_options: HashMap<String, serde_json::Value>,
}

impl CaConfig {
    pub fn ssl_target_name_override(&self) -> Option<&str> {
        self.http_options
            .get(SSL_TARGET_NAME_OVERRIDE)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn set_ssl_target_name_override(&mut self, name: &str) {
        self.http_options.insert(
            SSL_TARGET_NAME_OVERRIDE.to_string(),
            serde_json::Value::String(name.to_string()),
        );
    }
}
