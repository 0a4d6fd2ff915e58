//! CA 协议接口模块
//!
//! 该模块定义与证书颁发机构通信的抽象接口。真正的 HTTP/TLS 交互由外部实现，
//! 这里只负责描述传输参数、请求和响应。

use async_trait::async_trait;
use hlnet_common::{
    EnrollmentRequest, EnrollmentResponse, ReenrollmentRequest, RegistrationRequest,
    RevocationRequest, RevocationResponse, SigningIdentity,
};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// 连接 CA 所需的传输参数
#[derive(Clone)]
pub struct CaTransport {
    /// 解析后的 CA 地址
    pub url: String,
    /// TLS 握手使用的服务端主机名
    pub tls_server_name: String,
    /// CA 服务端上的 CA 名称
    pub ca_name: Option<String>,
    /// 服务端信任根
    pub trusted_roots: Vec<Vec<u8>>,
    /// 双向 TLS 客户端证书
    pub client_cert: Vec<u8>,
    /// 双向 TLS 客户端私钥
    pub client_key: Vec<u8>,
    /// 单次请求的截止时间
    pub timeout: Duration,
}

impl fmt::Debug for CaTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaTransport")
            .field("url", &self.url)
            .field("tls_server_name", &self.tls_server_name)
            .field("ca_name", &self.ca_name)
            .field("trusted_roots", &self.trusted_roots.len())
            .field("client_cert", &!self.client_cert.is_empty())
            .field("client_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// CA 协议错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 网络或 TLS 失败（地址错误、CA 不可达等）
    #[error("传输失败: {0}")]
    Transport(String),

    /// CA 拒绝了请求（密钥错误、权限不足等）
    #[error("CA 拒绝请求 (code {code}): {message}")]
    Rejected { code: u32, message: String },

    /// 请求或响应中的证书、密钥无法解码
    #[error("解码失败: {0}")]
    Decoding(String),
}

/// CA 协议客户端
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentProtocol: Send + Sync {
    /// 用一次性密钥换取证书
    async fn enroll(
        &self,
        transport: &CaTransport,
        request: &EnrollmentRequest,
    ) -> Result<EnrollmentResponse, ProtocolError>;

    /// 使用已有身份重新登记
    async fn reenroll(
        &self,
        transport: &CaTransport,
        identity: &SigningIdentity,
        request: &ReenrollmentRequest,
    ) -> Result<EnrollmentResponse, ProtocolError>;

    /// 由注册员注册新身份，返回一次性登记密钥
    async fn register(
        &self,
        transport: &CaTransport,
        registrar: &SigningIdentity,
        request: &RegistrationRequest,
    ) -> Result<String, ProtocolError>;

    /// 由注册员吊销身份或证书
    async fn revoke(
        &self,
        transport: &CaTransport,
        registrar: &SigningIdentity,
        request: &RevocationRequest,
    ) -> Result<RevocationResponse, ProtocolError>;
}
