//! hlnet - 端点解析与 CA 配置检查工具
//!
//! 运维人员用它验证网络配置：解析实体地址、检查组织的 CA 配置是否完整。

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hlnet_client::identity::{config_for_org, NetworkIdentityConfig};
use hlnet_client::{ConfigLoader, EndpointConfig};
use hlnet_common::EntityCategory;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// hlnet - 端点解析与 CA 配置检查
#[derive(Parser, Debug)]
#[command(name = "hlnet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// 网络配置文件（YAML 或 JSON）
    #[arg(short, long, default_value = "network.yaml")]
    config: PathBuf,

    /// 日志级别，未指定时使用配置文件中的 client.logging.level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 解析实体的连接地址与 TLS 主机名
    Resolve {
        /// 实体类别（peer、orderer、ca）
        category: EntityCategory,
        /// 逻辑主机名
        host: String,
    },

    /// 检查组织的 CA 配置
    CaConfig {
        /// 组织名称
        org: String,
    },

    /// 加载并校验配置文件
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new(&cli.config);
    let loaded = loader.load_endpoint_config();

    let level = cli.log_level.clone().unwrap_or_else(|| match &loaded {
        Ok(config) => config.network().client.logging.level.clone(),
        Err(_) => "info".to_string(),
    });
    init_logging(&level);

    let endpoint_config =
        loaded.with_context(|| format!("加载配置失败: {}", cli.config.display()))?;
    debug!("配置已加载: {}", loader.path().display());

    let output = run(&cli.command, &endpoint_config)?;
    print!("{}", output);
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: &Commands, config: &EndpointConfig) -> Result<String> {
    match command {
        Commands::Resolve { category, host } => resolve(config, *category, host),
        Commands::CaConfig { org } => ca_config(config, org),
        Commands::Check => check(config),
    }
}

fn resolve(config: &EndpointConfig, category: EntityCategory, host: &str) -> Result<String> {
    let endpoint = config
        .resolve(category, host)
        .with_context(|| format!("无法解析 {} {}", category, host))?;
    let tls_override = config.resolve_tls_override(category, host)?;

    let mut out = String::new();
    writeln!(out, "url: {}", endpoint.connection_url)?;
    if let Some(event_url) = &endpoint.event_url {
        writeln!(out, "eventUrl: {}", event_url)?;
    }
    writeln!(out, "sslTargetNameOverride: {}", tls_override)?;
    writeln!(out, "mappedHost: {}", endpoint.canonical_host_key)?;
    Ok(out)
}

fn ca_config(config: &EndpointConfig, org: &str) -> Result<String> {
    let identity_config = NetworkIdentityConfig::new(config.clone());
    let resolved = config_for_org(&identity_config, org)
        .with_context(|| format!("组织 {} 的 CA 配置无效", org))?;

    let mut out = String::new();
    writeln!(out, "url: {}", resolved.url)?;
    writeln!(out, "tlsServerName: {}", resolved.tls_server_name)?;
    if let Some(ca_name) = &resolved.ca_name {
        writeln!(out, "caName: {}", ca_name)?;
    }
    writeln!(out, "trustedServerCerts: {}", resolved.trusted_server_certs.len())?;
    writeln!(out, "clientCert: {}", present(&resolved.client_cert))?;
    writeln!(out, "clientKey: {}", present(&resolved.client_key))?;
    let registrar = if resolved.registrar.enroll_id.is_empty() {
        "<none>"
    } else {
        resolved.registrar.enroll_id.as_str()
    };
    writeln!(out, "registrar: {}", registrar)?;
    Ok(out)
}

fn check(config: &EndpointConfig) -> Result<String> {
    let network = config.network();
    let matcher = config.matcher();

    let mut out = String::new();
    writeln!(out, "organizations: {}", network.organizations.len())?;
    writeln!(out, "peers: {}", network.peers.len())?;
    writeln!(out, "orderers: {}", network.orderers.len())?;
    writeln!(out, "certificateAuthorities: {}", network.certificate_authorities.len())?;
    for category in [
        EntityCategory::Peer,
        EntityCategory::Orderer,
        EntityCategory::CertificateAuthority,
    ] {
        writeln!(out, "entityMatchers.{}: {}", category, matcher.rule_count(category))?;
    }

    let mut orgs: Vec<_> = network.organizations.keys().collect();
    orgs.sort();
    for org in orgs {
        let status = if network.organizations[org].certificate_authorities.is_empty() {
            "no CAs".to_string()
        } else {
            let identity_config = NetworkIdentityConfig::new(config.clone());
            match config_for_org(&identity_config, org) {
                Ok(_) => "ok".to_string(),
                Err(e) => e.to_string(),
            }
        };
        writeln!(out, "org {}: {}", org, status)?;
    }

    info!("配置校验完成");
    Ok(out)
}

fn present(bytes: &[u8]) -> &'static str {
    if bytes.is_empty() {
        "absent"
    } else {
        "present"
    }
}
