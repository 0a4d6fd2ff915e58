//! 身份模型
//!
//! 该模块定义身份标识、凭据存储中的身份记录、签名身份，以及注册、登记、
//! 重新登记和吊销请求的数据结构。私钥始终以不透明句柄表示。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// 身份标识（MSP ID + 用户 ID）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityIdentifier {
    pub msp_id: String,
    pub id: String,
}

impl IdentityIdentifier {
    pub fn new(msp_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            msp_id: msp_id.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for IdentityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.msp_id)
    }
}

/// 私钥句柄
///
/// 只保存主体密钥标识（SKI），真正的私钥由加密套件持有。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyHandle {
    ski: String,
}

impl KeyHandle {
    /// 由 SKI 字节创建
    pub fn from_ski(ski: &[u8]) -> Self {
        Self {
            ski: hex::encode(ski),
        }
    }

    /// 十六进制形式的 SKI
    pub fn ski_hex(&self) -> &str {
        &self.ski
    }

    /// 解码后的 SKI 字节
    pub fn ski(&self) -> Result<Vec<u8>> {
        hex::decode(&self.ski).map_err(|e| Error::Decoding(format!("无效的 SKI: {}", e)))
    }
}

/// 凭据存储中的身份记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub identifier: IdentityIdentifier,
    /// 登记证书（PEM 或 DER）
    #[serde(with = "hex_bytes")]
    pub enrollment_certificate: Vec<u8>,
    pub private_key: KeyHandle,
}

impl IdentityRecord {
    pub fn new(identifier: IdentityIdentifier, enrollment_certificate: Vec<u8>, private_key: KeyHandle) -> Self {
        Self {
            identifier,
            enrollment_certificate,
            private_key,
        }
    }
}

/// 可用于签名的身份
///
/// 与 [`IdentityRecord`] 的区别在于私钥句柄已经由加密套件确认可用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    identifier: IdentityIdentifier,
    enrollment_certificate: Vec<u8>,
    private_key: KeyHandle,
}

impl SigningIdentity {
    pub fn new(identifier: IdentityIdentifier, enrollment_certificate: Vec<u8>, private_key: KeyHandle) -> Self {
        Self {
            identifier,
            enrollment_certificate,
            private_key,
        }
    }

    pub fn identifier(&self) -> &IdentityIdentifier {
        &self.identifier
    }

    pub fn enrollment_certificate(&self) -> &[u8] {
        &self.enrollment_certificate
    }

    pub fn private_key(&self) -> &KeyHandle {
        &self.private_key
    }

    /// 转换为可存储的记录
    pub fn to_record(&self) -> IdentityRecord {
        IdentityRecord::new(
            self.identifier.clone(),
            self.enrollment_certificate.clone(),
            self.private_key.clone(),
        )
    }
}

/// 登记时请求写入证书的属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRequest {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

/// 登记请求
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub name: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// 证书类型，默认 x509
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub enrollment_type: Option<String>,
    #[serde(default)]
    pub attr_reqs: Vec<AttributeRequest>,
}

impl EnrollmentRequest {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for EnrollmentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrollmentRequest")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .field("ca_name", &self.ca_name)
            .field("profile", &self.profile)
            .field("label", &self.label)
            .field("enrollment_type", &self.enrollment_type)
            .field("attr_reqs", &self.attr_reqs)
            .finish()
    }
}

/// 重新登记请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReenrollmentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub attr_reqs: Vec<AttributeRequest>,
}

/// 登记/重新登记结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentResponse {
    /// CA 签发的证书
    pub certificate: Vec<u8>,
    /// 与证书对应的私钥句柄
    pub private_key: KeyHandle,
}

/// 注册属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// 是否默认写入登记证书
    #[serde(default)]
    pub ecert: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ecert: false,
        }
    }
}

/// 注册请求
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub name: String,
    /// 身份类型（client、peer、orderer、admin 等）
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    /// 最大登记次数，0 表示使用 CA 默认值，-1 表示不限
    #[serde(default)]
    pub max_enrollments: i32,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    /// 指定的注册密钥，为空时由 CA 生成
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl RegistrationRequest {
    pub fn new(name: impl Into<String>, affiliation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: affiliation.into(),
            ..Default::default()
        }
    }
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("name", &self.name)
            .field("identity_type", &self.identity_type)
            .field("max_enrollments", &self.max_enrollments)
            .field("affiliation", &self.affiliation)
            .field("attributes", &self.attributes)
            .field("ca_name", &self.ca_name)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// 吊销请求
///
/// 按身份吊销时填写 `name`；按证书吊销时填写十六进制的 `serial` 与 `aki`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serial: String,
    #[serde(default)]
    pub aki: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    #[serde(default)]
    pub gen_crl: bool,
}

impl RevocationRequest {
    /// 按身份名吊销
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// 按证书序列号与 AKI 吊销
    pub fn by_certificate(serial: impl Into<String>, aki: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            aki: aki.into(),
            ..Default::default()
        }
    }
}

/// 被吊销的证书
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedCert {
    pub serial: String,
    pub aki: String,
}

/// 吊销结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationResponse {
    pub revoked_certs: Vec<RevokedCert>,
    /// 请求生成时返回的 CRL
    #[serde(default)]
    pub crl: Vec<u8>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_display() {
        let id = IdentityIdentifier::new("Org1MSP", "user1");
        assert_eq!(id.to_string(), "user1@Org1MSP");
    }

    #[test]
    fn test_key_handle_ski() {
        let key = KeyHandle::from_ski(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(key.ski_hex(), "deadbeef");
        assert_eq!(key.ski().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_record_serializes_certificate_as_hex() {
        let record = IdentityRecord::new(
            IdentityIdentifier::new("Org1MSP", "user1"),
            b"cert".to_vec(),
            KeyHandle::from_ski(&[1, 2]),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["enrollmentCertificate"], "63657274");
        assert_eq!(json["identifier"]["mspId"], "Org1MSP");
    }

    #[test]
    fn test_secrets_not_in_debug() {
        let enroll = EnrollmentRequest::new("user1", "s3cret");
        assert!(!format!("{:?}", enroll).contains("s3cret"));

        let mut register = RegistrationRequest::new("user2", "org1.department1");
        register.secret = Some("hunter2".to_string());
        assert!(!format!("{:?}", register).contains("hunter2"));
    }
}
