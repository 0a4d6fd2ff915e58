//! 配置加载模块
//!
//! 该模块负责读取网络配置文件，按扩展名选择 YAML 或 JSON 解析，
//! 并在加载时完成实体匹配规则的校验。配置加载后不可变，
//! 需要更新时重新加载生成新的对象。

use hlnet_common::{ConfigStage, Error, NetworkConfig, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::endpoint::EndpointConfig;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// 根据扩展名确定配置文件格式
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(Error::config(
                ConfigStage::Load,
                format!("不支持的配置文件格式，仅支持 YAML 或 JSON: {}", path.display()),
            )),
        }
    }
}

/// 配置加载器
pub struct ConfigLoader {
    /// 配置文件路径
    config_path: PathBuf,
    /// 上次加载时间
    last_loaded: Option<SystemTime>,
}

impl ConfigLoader {
    /// 创建新的配置加载器
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            last_loaded: None,
        }
    }

    /// 加载网络配置
    pub fn load(&mut self) -> Result<NetworkConfig> {
        let path = self.config_path.as_path();
        let format = ConfigFormat::from_path(path)?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(
                ConfigStage::Load,
                format!("无法读取配置文件 {}: {}", path.display(), e),
            )
        })?;

        let config = match format {
            ConfigFormat::Yaml => NetworkConfig::from_yaml_str(&content),
            ConfigFormat::Json => NetworkConfig::from_json_str(&content),
        }
        .map_err(|e| e.at_stage(ConfigStage::Load))?;

        self.last_loaded = Some(SystemTime::now());
        debug!("从 {} 加载配置成功", path.display());

        Ok(config)
    }

    /// 加载配置并构建端点配置（同时校验实体匹配规则）
    pub fn load_endpoint_config(&mut self) -> Result<EndpointConfig> {
        let config = self.load()?;
        let endpoint_config = EndpointConfig::new(config)?;
        info!(
            "网络配置加载完成: {} 个组织, {} 个 peer, {} 个 orderer, {} 个 CA",
            endpoint_config.network().organizations.len(),
            endpoint_config.network().peers.len(),
            endpoint_config.network().orderers.len(),
            endpoint_config.network().certificate_authorities.len(),
        );
        Ok(endpoint_config)
    }

    /// 配置文件路径
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// 获取上次加载时间
    pub fn last_loaded(&self) -> Option<SystemTime> {
        self.last_loaded
    }
}
