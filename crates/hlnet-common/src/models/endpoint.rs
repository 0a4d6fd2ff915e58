//! 端点模型
//!
//! 该模块定义了网络实体（peer、orderer、CA）的静态连接配置、实体匹配规则
//! 以及匹配结果。匹配规则把调用方使用的主机名映射到规范主机键，
//! 规范主机键再用于查找 TLS 证书和连接参数。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};

/// gRPC/HTTP 选项中的 TLS 主机名覆盖键
pub const SSL_TARGET_NAME_OVERRIDE: &str = "ssl-target-name-override";

/// 实体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityCategory {
    /// 背书节点
    Peer,
    /// 排序节点
    Orderer,
    /// 证书颁发机构
    CertificateAuthority,
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityCategory::Peer => write!(f, "peer"),
            EntityCategory::Orderer => write!(f, "orderer"),
            EntityCategory::CertificateAuthority => write!(f, "certificateAuthority"),
        }
    }
}

impl FromStr for EntityCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "peer" => Ok(EntityCategory::Peer),
            "orderer" => Ok(EntityCategory::Orderer),
            "ca" | "certificateauthority" | "certificate-authority" => {
                Ok(EntityCategory::CertificateAuthority)
            }
            _ => Err(Error::InvalidArgument(format!("无效的实体类别: {}", s))),
        }
    }
}

/// PEM 数据来源，内联 PEM 优先于文件路径
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PemSource {
    /// PEM 文件路径
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// 内联 PEM 内容
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pem: Option<String>,
}

impl PemSource {
    /// 从内联内容创建
    pub fn inline(pem: impl Into<String>) -> Self {
        Self {
            path: None,
            pem: Some(pem.into()),
        }
    }

    /// 从文件路径创建
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            pem: None,
        }
    }

    /// 是否未配置任何来源
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.pem.as_deref().map_or(true, str::is_empty)
    }

    /// 加载 PEM 字节，未配置时返回空
    pub fn load(&self) -> Result<Vec<u8>> {
        if let Some(pem) = self.pem.as_deref().filter(|p| !p.is_empty()) {
            return check_pem(pem.as_bytes().to_vec(), "inline");
        }
        match &self.path {
            Some(path) => {
                debug!("读取 PEM 文件: {}", path.display());
                let bytes = std::fs::read(path)?;
                check_pem(bytes, &path.display().to_string())
            }
            None => Ok(Vec::new()),
        }
    }
}

fn check_pem(bytes: Vec<u8>, origin: &str) -> Result<Vec<u8>> {
    let text = String::from_utf8_lossy(&bytes);
    if !text.contains("-----BEGIN ") {
        return Err(Error::Decoding(format!("{} 不是有效的 PEM 数据", origin)));
    }
    Ok(bytes)
}

/// 证书与私钥对
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsKeyPair {
    #[serde(default)]
    pub key: PemSource,
    #[serde(default)]
    pub cert: PemSource,
}

/// 从 gRPC/HTTP 选项中读取 TLS 主机名覆盖
fn override_from(options: &HashMap<String, serde_json::Value>) -> Option<&str> {
    options
        .get(SSL_TARGET_NAME_OVERRIDE)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Peer 静态配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConfig {
    /// 连接地址
    pub url: String,
    /// 事件服务地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_url: Option<String>,
    /// gRPC 连接选项
    #[serde(default)]
    pub grpc_options: HashMap<String, serde_json::Value>,
    /// TLS 根证书
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: PemSource,
}

impl PeerConfig {
    pub fn ssl_target_name_override(&self) -> Option<&str> {
        override_from(&self.grpc_options)
    }

    pub fn set_ssl_target_name_override(&mut self, name: &str) {
        self.grpc_options.insert(
            SSL_TARGET_NAME_OVERRIDE.to_string(),
            serde_json::Value::String(name.to_string()),
        );
    }
}

/// Orderer 静态配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdererConfig {
    pub url: String,
    #[serde(default)]
    pub grpc_options: HashMap<String, serde_json::Value>,
    #[serde(default, rename = "tlsCACerts")]
    pub tls_ca_certs: PemSource,
}

impl OrdererConfig {
    pub fn ssl_target_name_override(&self) -> Option<&str> {
        override_from(&self.grpc_options)
    }

    pub fn set_ssl_target_name_override(&mut self, name: &str) {
        self.grpc_options.insert(
            SSL_TARGET_NAME_OVERRIDE.to_string(),
            serde_json::Value::String(name.to_string()),
        );
    }
}

/// 实体匹配规则（配置形式）
///
/// 模板为空表示保留原值；不含 `$N` 的模板按字面值使用。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    /// 针对 `host[:port]` 的正则表达式
    pub pattern: String,
    #[serde(default)]
    pub url_substitution_exp: String,
    #[serde(default)]
    pub event_url_substitution_exp: String,
    #[serde(default)]
    pub ssl_target_override_url_substitution_exp: String,
    /// 规范主机键，不能为空
    #[serde(default)]
    pub mapped_host: String,
}

/// 按类别分组的实体匹配规则，顺序即优先级
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMatchers {
    #[serde(default)]
    pub peer: Vec<MatchConfig>,
    #[serde(default)]
    pub orderer: Vec<MatchConfig>,
    #[serde(default)]
    pub certificate_authority: Vec<MatchConfig>,
}

impl EntityMatchers {
    /// 获取某个类别的规则列表
    pub fn rules(&self, category: EntityCategory) -> &[MatchConfig] {
        match category {
            EntityCategory::Peer => &self.peer,
            EntityCategory::Orderer => &self.orderer,
            EntityCategory::CertificateAuthority => &self.certificate_authority,
        }
    }
}

/// 实体匹配结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEndpoint {
    /// 实际连接地址
    pub connection_url: String,
    /// 事件服务地址（仅 peer）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_url: Option<String>,
    /// TLS 主机名覆盖
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_override: Option<String>,
    /// 规范主机键，用于查找静态配置
    pub canonical_host_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    #[test]
    fn test_category_from_str() {
        assert_eq!("peer".parse::<EntityCategory>().unwrap(), EntityCategory::Peer);
        assert_eq!(
            "certificateAuthority".parse::<EntityCategory>().unwrap(),
            EntityCategory::CertificateAuthority
        );
        assert!("gateway".parse::<EntityCategory>().is_err());
    }

    #[test]
    fn test_pem_source_prefers_inline() {
        let source = PemSource {
            path: Some(PathBuf::from("/nonexistent/cert.pem")),
            pem: Some(CERT.to_string()),
        };
        assert_eq!(source.load().unwrap(), CERT.as_bytes());
    }

    #[test]
    fn test_pem_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CERT.as_bytes()).unwrap();
        let source = PemSource::file(file.path());
        assert_eq!(source.load().unwrap(), CERT.as_bytes());
    }

    #[test]
    fn test_pem_source_errors() {
        assert!(matches!(
            PemSource::file("/nonexistent/cert.pem").load(),
            Err(Error::Io(_))
        ));
        assert!(matches!(
            PemSource::inline("not a certificate").load(),
            Err(Error::Decoding(_))
        ));
        assert!(PemSource::default().load().unwrap().is_empty());
    }

    #[test]
    fn test_peer_override_option() {
        let mut peer = PeerConfig {
            url: "peer0.org1.example.com:7051".to_string(),
            ..Default::default()
        };
        assert_eq!(peer.ssl_target_name_override(), None);
        peer.set_ssl_target_name_override("peer0.org1.example.com");
        assert_eq!(peer.ssl_target_name_override(), Some("peer0.org1.example.com"));
    }
}
