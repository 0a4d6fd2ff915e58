//! 凭据存储模块
//!
//! 该模块定义身份记录的持久化接口，并提供内存和文件两种实现。
//! 存储支持并发读取，单个身份的写入是原子的（同一标识后写者生效）。

use async_trait::async_trait;
use hlnet_common::{Error, IdentityIdentifier, IdentityRecord, Result};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// 凭据存储
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 读取身份记录，不存在时返回 [`Error::UserNotFound`]
    async fn load(&self, identifier: &IdentityIdentifier) -> Result<IdentityRecord>;

    /// 写入身份记录，覆盖同一标识的旧记录
    async fn store(&self, record: &IdentityRecord) -> Result<()>;
}

/// 内存凭据存储
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    records: RwLock<HashMap<IdentityIdentifier, IdentityRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录数
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn load(&self, identifier: &IdentityIdentifier) -> Result<IdentityRecord> {
        self.records
            .read()
            .await
            .get(identifier)
            .cloned()
            .ok_or(Error::UserNotFound)
    }

    async fn store(&self, record: &IdentityRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.identifier.clone(), record.clone());
        Ok(())
    }
}

/// 临时文件序号，避免并发写入同一身份时互相覆盖临时文件
static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// 文件凭据存储
///
/// 每个身份一个 JSON 文件：`<id>@<mspid>.json`。写入先落到临时文件再重命名。
#[derive(Debug, Clone)]
pub struct FileUserStore {
    path: PathBuf,
}

impl FileUserStore {
    /// 创建文件存储，目录不存在时自动创建
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        tokio::fs::create_dir_all(&path).await?;
        debug!("凭据存储目录: {}", path.display());
        Ok(Self { path })
    }

    /// 存储目录
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_path(&self, identifier: &IdentityIdentifier) -> Result<PathBuf> {
        for (field, value) in [("id", &identifier.id), ("mspId", &identifier.msp_id)] {
            if value.is_empty() {
                return Err(Error::InvalidArgument(format!("身份标识的 {} 不能为空", field)));
            }
            if value.contains(|c: char| matches!(c, '/' | '\\' | '\0')) || value == "." || value == ".." {
                return Err(Error::InvalidArgument(format!(
                    "身份标识的 {} 包含非法字符: {}",
                    field, value
                )));
            }
        }
        Ok(self
            .path
            .join(format!("{}@{}.json", identifier.id, identifier.msp_id)))
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn load(&self, identifier: &IdentityIdentifier) -> Result<IdentityRecord> {
        let path = self.record_path(identifier)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::UserNotFound),
            Err(e) => return Err(e.into()),
        };

        let record: IdentityRecord = serde_json::from_slice(&content)?;
        if &record.identifier != identifier {
            return Err(Error::Store(format!(
                "{} 中的身份 {} 与请求的 {} 不一致",
                path.display(),
                record.identifier,
                identifier
            )));
        }
        Ok(record)
    }

    async fn store(&self, record: &IdentityRecord) -> Result<()> {
        let path = self.record_path(&record.identifier)?;
        let content = serde_json::to_vec_pretty(record)?;

        let seq = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), seq));
        let written = match tokio::fs::write(&tmp, &content).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        // 写入或替换失败都不留下临时文件
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("身份 {} 已写入 {}", record.identifier, path.display());
        Ok(())
    }
}
