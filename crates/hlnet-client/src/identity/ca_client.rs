//! CA 客户端模块
//!
//! 该模块实现组织身份的生命周期操作：登记、重新登记、注册和吊销。
//! 登记成功后身份记录写入凭据存储，任何失败都不会留下部分写入。
//! 注册和吊销需要注册员身份，注册员在首次使用时按组织单飞物化。

use hlnet_common::{
    CaOperation, ConfigStage, EnrollmentRequest, Error, IdentityRecord, ReenrollmentRequest,
    RegistrationRequest, Result, RevocationRequest, RevocationResponse, SigningIdentity,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::context::ClientContext;
use super::identity_config::{config_for_org, ResolvedCaConfig};
use super::identity_manager::IdentityManager;
use super::protocol::{EnrollmentProtocol, ProtocolError};

/// 组织的 CA 客户端
#[derive(Clone)]
pub struct CaClient {
    org_name: String,
    ca_config: ResolvedCaConfig,
    identity_manager: IdentityManager,
    protocol: Arc<dyn EnrollmentProtocol>,
    registrar_lock: Arc<AsyncMutex<()>>,
    request_timeout: Duration,
}

impl CaClient {
    /// 为组织创建 CA 客户端
    ///
    /// 组织未配置任何 CA 或 CA 配置无法解析时直接失败。
    pub fn new(org_name: &str, context: &ClientContext) -> Result<Self> {
        let org = context.endpoint_config.organization(org_name)?;
        if org.certificate_authorities.is_empty() {
            return Err(Error::config(
                ConfigStage::Organization,
                format!("no CAs configured for organization: {}", org_name),
            ));
        }

        let ca_config = config_for_org(context.identity_config.as_ref(), org_name)?;
        let identity_manager = IdentityManager::new(
            org_name,
            &context.endpoint_config,
            context.user_store.clone(),
            context.crypto_suite.clone(),
        )?;

        debug!("组织 {} 的 CA 客户端已创建: {}", org_name, ca_config.url);

        Ok(Self {
            org_name: org_name.to_string(),
            ca_config,
            identity_manager,
            protocol: context.protocol.clone(),
            registrar_lock: context.registrar_locks.lock_for(org_name),
            request_timeout: context.request_timeout,
        })
    }

    /// 使用一次性密钥登记身份
    pub async fn enroll(&self, enrollment_id: &str, enrollment_secret: &str) -> Result<()> {
        self.enroll_with(EnrollmentRequest::new(enrollment_id, enrollment_secret))
            .await
    }

    /// 使用完整请求登记身份
    pub async fn enroll_with(&self, request: EnrollmentRequest) -> Result<()> {
        let record = self.enroll_record(request).await?;
        info!("身份 {} 登记成功", record.identifier);
        Ok(())
    }

    /// 重新登记已有身份
    pub async fn reenroll(&self, enrollment_id: &str) -> Result<()> {
        self.reenroll_with(enrollment_id, ReenrollmentRequest::default())
            .await
    }

    /// 使用完整请求重新登记已有身份
    pub async fn reenroll_with(
        &self,
        enrollment_id: &str,
        mut request: ReenrollmentRequest,
    ) -> Result<()> {
        if enrollment_id.is_empty() {
            return Err(Error::InvalidArgument("user name missing".to_string()));
        }

        let identity = self
            .identity_manager
            .get_signing_identity(enrollment_id)
            .await?;
        if request.ca_name.is_none() {
            request.ca_name = self.ca_config.ca_name.clone();
        }

        let transport = self.ca_config.transport(self.request_timeout);
        let response = self
            .call(
                CaOperation::Reenroll,
                self.protocol.reenroll(&transport, &identity, &request),
            )
            .await?;

        let record = IdentityRecord::new(
            identity.identifier().clone(),
            response.certificate,
            response.private_key,
        );
        self.identity_manager.user_store().store(&record).await?;

        info!("身份 {} 重新登记成功", record.identifier);
        Ok(())
    }

    /// 注册新身份，返回一次性登记密钥
    ///
    /// 先检查注册员配置，再检查请求本身。
    pub async fn register(&self, request: Option<&RegistrationRequest>) -> Result<String> {
        self.ensure_registrar_configured()?;

        let request = request.ok_or_else(|| {
            Error::InvalidArgument("registration request is required".to_string())
        })?;
        if request.name.is_empty() {
            return Err(Error::InvalidArgument(
                "registration request name is required".to_string(),
            ));
        }

        let registrar = self.registrar().await?;
        let mut request = request.clone();
        if request.ca_name.is_none() {
            request.ca_name = self.ca_config.ca_name.clone();
        }

        let transport = self.ca_config.transport(self.request_timeout);
        let secret = self
            .call(
                CaOperation::Register,
                self.protocol.register(&transport, &registrar, &request),
            )
            .await?;

        info!("身份 {} 已由注册员 {} 注册", request.name, registrar.identifier());
        Ok(secret)
    }

    /// 吊销身份或证书
    pub async fn revoke(&self, request: Option<&RevocationRequest>) -> Result<RevocationResponse> {
        self.ensure_registrar_configured()?;

        let request = request.ok_or_else(|| {
            Error::InvalidArgument("revocation request is required".to_string())
        })?;
        validate_revocation(request)?;

        let registrar = self.registrar().await?;
        let mut request = request.clone();
        if request.ca_name.is_none() {
            request.ca_name = self.ca_config.ca_name.clone();
        }

        let transport = self.ca_config.transport(self.request_timeout);
        let response = self
            .call(
                CaOperation::Revoke,
                self.protocol.revoke(&transport, &registrar, &request),
            )
            .await?;

        info!(
            "吊销完成，共 {} 个证书被吊销",
            response.revoked_certs.len()
        );
        Ok(response)
    }

    fn ensure_registrar_configured(&self) -> Result<()> {
        if self.ca_config.registrar.enroll_id.is_empty() {
            return Err(Error::RegistrarNotFound);
        }
        Ok(())
    }

    /// 获取注册员签名身份
    ///
    /// 凭据存储中已有时直接返回；否则持有组织锁后再检查一次，
    /// 仍然没有则依次尝试内嵌用户和使用配置的密钥登记。
    async fn registrar(&self) -> Result<SigningIdentity> {
        let credentials = &self.ca_config.registrar;
        if credentials.enroll_id.is_empty() {
            return Err(Error::RegistrarNotFound);
        }

        if let Some(identity) = self.stored_identity(&credentials.enroll_id).await? {
            return Ok(identity);
        }

        let _guard = self.registrar_lock.lock().await;
        match self
            .identity_manager
            .get_signing_identity(&credentials.enroll_id)
            .await
        {
            Ok(identity) => return Ok(identity),
            Err(Error::UserNotFound) => {}
            Err(e) => return Err(e),
        }

        if credentials.enroll_secret.is_empty() {
            warn!(
                "组织 {} 的注册员 {} 未登记且未配置密钥",
                self.org_name, credentials.enroll_id
            );
            return Err(Error::RegistrarNotFound);
        }

        info!("为组织 {} 登记注册员 {}", self.org_name, credentials.enroll_id);
        let record = self
            .enroll_record(EnrollmentRequest::new(
                credentials.enroll_id.clone(),
                credentials.enroll_secret.clone(),
            ))
            .await?;
        self.identity_manager.new_user(&record)
    }

    /// 只查凭据存储，不做任何物化
    async fn stored_identity(&self, id: &str) -> Result<Option<SigningIdentity>> {
        let identifier = self.identity_manager.identifier(id);
        match self.identity_manager.user_store().load(&identifier).await {
            Ok(record) => self.identity_manager.new_user(&record).map(Some),
            Err(Error::UserNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn enroll_record(&self, mut request: EnrollmentRequest) -> Result<IdentityRecord> {
        if request.name.is_empty() {
            return Err(Error::InvalidArgument("enrollment id is required".to_string()));
        }
        if request.secret.is_empty() {
            return Err(Error::InvalidArgument(
                "enrollment secret is required".to_string(),
            ));
        }
        if request.ca_name.is_none() {
            request.ca_name = self.ca_config.ca_name.clone();
        }

        let transport = self.ca_config.transport(self.request_timeout);
        let response = self
            .call(
                CaOperation::Enroll,
                self.protocol.enroll(&transport, &request),
            )
            .await?;

        let record = IdentityRecord::new(
            self.identity_manager.identifier(&request.name),
            response.certificate,
            response.private_key,
        );
        self.identity_manager.user_store().store(&record).await?;
        Ok(record)
    }

    /// 在超时限制内执行一次协议调用并转换错误
    async fn call<T, F>(&self, operation: CaOperation, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ProtocolError>>,
    {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(ProtocolError::Decoding(message))) => Err(Error::Decoding(message)),
            Ok(Err(e)) => {
                warn!("CA {} 失败 ({}): {}", operation, self.ca_config.url, e);
                Err(Error::enrollment(operation, e.to_string()))
            }
            Err(_) => {
                warn!("CA {} 超时 ({})", operation, self.ca_config.url);
                Err(Error::enrollment(
                    operation,
                    format!("请求超时 ({:?})", self.request_timeout),
                ))
            }
        }
    }
}

/// 检查吊销请求中的证书标识
fn validate_revocation(request: &RevocationRequest) -> Result<()> {
    for (field, value) in [("serial", &request.serial), ("aki", &request.aki)] {
        if value.is_empty() {
            if request.name.is_empty() {
                return Err(Error::Decoding(format!(
                    "未指定吊销对象，按证书吊销时 {} 不能为空",
                    field
                )));
            }
            continue;
        }
        hex::decode(value)
            .map_err(|e| Error::Decoding(format!("{} 不是有效的十六进制: {}", field, e)))?;
    }
    Ok(())
}
