//! 错误处理模块
//!
//! 该模块提供 hlnet 项目的统一错误处理机制。端点解析、CA 配置解析和身份生命周期
//! 管理的所有失败都归入 [`Error`]，并携带足够的阶段信息，便于区分配置错误、
//! 网络故障和调用方错误。

use std::fmt;
use std::io;
use thiserror::Error;

use crate::models::endpoint::EntityCategory;

/// 配置解析阶段
///
/// 同一类配置错误可能来自不同阶段（例如语法错误与文件缺失），
/// 通过阶段区分，运维人员可以直接定位问题来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigStage {
    /// 读取或解析配置文件
    Load,
    /// 编译实体匹配规则
    EntityMatchers,
    /// 查找组织配置
    Organization,
    /// 解析 CA 配置块
    CaConfig,
    /// 加载 CA 服务端信任证书
    ServerCerts,
    /// 加载 CA 客户端证书
    ClientCert,
    /// 加载 CA 客户端私钥
    ClientKey,
    /// 加载内嵌用户的证书或私钥
    EmbeddedUser,
}

impl fmt::Display for ConfigStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigStage::Load => write!(f, "load"),
            ConfigStage::EntityMatchers => write!(f, "entityMatchers"),
            ConfigStage::Organization => write!(f, "organization"),
            ConfigStage::CaConfig => write!(f, "CAConfig"),
            ConfigStage::ServerCerts => write!(f, "CAServerCerts"),
            ConfigStage::ClientCert => write!(f, "CAClientCert"),
            ConfigStage::ClientKey => write!(f, "CAClientKey"),
            ConfigStage::EmbeddedUser => write!(f, "embeddedUser"),
        }
    }
}

/// CA 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaOperation {
    Enroll,
    Reenroll,
    Register,
    Revoke,
}

impl fmt::Display for CaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaOperation::Enroll => write!(f, "enroll"),
            CaOperation::Reenroll => write!(f, "reenroll"),
            CaOperation::Register => write!(f, "register"),
            CaOperation::Revoke => write!(f, "revoke"),
        }
    }
}

/// hlnet 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 参数缺失或为空，属于调用方错误，不应重试
    #[error("{0}")]
    InvalidArgument(String),

    /// 没有任何匹配规则命中
    #[error("未找到匹配的 {category} 实体: {name}")]
    NoMatchingEntity {
        category: EntityCategory,
        name: String,
    },

    /// 配置错误
    #[error("配置错误 [{stage}]: {message}")]
    Config { stage: ConfigStage, message: String },

    /// 凭据存储中不存在该身份
    #[error("user not found")]
    UserNotFound,

    /// 未配置可用的注册员身份
    #[error("registrar not found")]
    RegistrarNotFound,

    /// CA 协议或传输失败
    #[error("CA {operation} 失败: {message}")]
    Enrollment {
        operation: CaOperation,
        message: String,
    },

    /// 证书、密钥或请求字段解码失败
    #[error("解码错误: {0}")]
    Decoding(String),

    /// 凭据存储错误
    #[error("凭据存储错误: {0}")]
    Store(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// 创建指定阶段的配置错误
    pub fn config(stage: ConfigStage, message: impl Into<String>) -> Self {
        Error::Config {
            stage,
            message: message.into(),
        }
    }

    /// 创建 CA 操作错误
    pub fn enrollment(operation: CaOperation, message: impl Into<String>) -> Self {
        Error::Enrollment {
            operation,
            message: message.into(),
        }
    }

    /// 将任意错误包装到指定的配置阶段
    ///
    /// 已经是配置错误的保持原样，避免阶段信息被外层覆盖。
    pub fn at_stage(self, stage: ConfigStage) -> Self {
        match self {
            Error::Config { .. } => self,
            other => Error::config(stage, other.to_string()),
        }
    }
}

/// hlnet 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_message_is_verbatim() {
        let err = Error::InvalidArgument("user name missing".to_string());
        assert_eq!(err.to_string(), "user name missing");
    }

    #[test]
    fn test_at_stage_keeps_existing_stage() {
        let err = Error::config(ConfigStage::Organization, "no CAs configured for organization: org1")
            .at_stage(ConfigStage::CaConfig);
        assert!(matches!(
            err,
            Error::Config {
                stage: ConfigStage::Organization,
                ..
            }
        ));
    }

    #[test]
    fn test_at_stage_wraps_foreign_error() {
        let err = Error::Store("CAServerCerts error".to_string()).at_stage(ConfigStage::ServerCerts);
        match err {
            Error::Config { stage, message } => {
                assert_eq!(stage, ConfigStage::ServerCerts);
                assert!(message.contains("CAServerCerts error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
