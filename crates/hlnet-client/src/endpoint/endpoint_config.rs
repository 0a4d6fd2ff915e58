//! 端点配置模块
//!
//! 该模块组合静态网络配置与实体匹配器：先按名称直接查找静态配置，
//! 找不到时通过实体匹配得到规范主机键，再复制该主机的静态配置并用匹配结果
//! 覆盖地址和 TLS 主机名。

use hlnet_common::{
    CaConfig, ConfigStage, EntityCategory, Error, NetworkConfig, OrdererConfig,
    OrganizationConfig, PeerConfig, ResolvedEndpoint, Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::entity_matcher::EntityMatcher;

/// 按名称查找，先精确匹配，再忽略大小写
fn lookup<'a, T>(map: &'a HashMap<String, T>, name: &str) -> Option<&'a T> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// 去掉 `host:port` 中的端口
fn host_part(host_port: &str) -> &str {
    host_port.split(':').next().unwrap_or(host_port)
}

/// 解析结果的 TLS 主机名：规则或静态覆盖，否则为规范主机名
fn tls_override_of(resolved: &ResolvedEndpoint) -> String {
    resolved
        .tls_override
        .clone()
        .unwrap_or_else(|| host_part(&resolved.canonical_host_key).to_string())
}

/// 端点配置
///
/// 内部数据在构建后不可变，克隆只增加引用计数。
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    network: Arc<NetworkConfig>,
    matcher: Arc<EntityMatcher>,
}

impl EndpointConfig {
    /// 构建端点配置，同时校验客户端超时并编译实体匹配规则
    pub fn new(network: NetworkConfig) -> Result<Self> {
        if network.client.ca_request_timeout_secs == 0 {
            return Err(Error::config(
                ConfigStage::Load,
                "client.caRequestTimeoutSecs 必须大于 0",
            ));
        }
        let matcher = EntityMatcher::from_config(&network.entity_matchers)?;
        Ok(Self {
            network: Arc::new(network),
            matcher: Arc::new(matcher),
        })
    }

    /// 原始网络配置
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// 实体匹配器
    pub fn matcher(&self) -> &EntityMatcher {
        &self.matcher
    }

    /// 查找组织配置（忽略大小写）
    pub fn organization(&self, org_name: &str) -> Result<&OrganizationConfig> {
        lookup(&self.network.organizations, org_name).ok_or_else(|| {
            Error::config(
                ConfigStage::Organization,
                format!("org config retrieval failed for {}", org_name),
            )
        })
    }

    /// 解析端点，规则未给出 TLS 覆盖时使用规范主机自身配置的覆盖
    pub fn resolve(&self, category: EntityCategory, name: &str) -> Result<ResolvedEndpoint> {
        let mut resolved = self.matcher.resolve(category, name)?;
        if resolved.tls_override.is_none() {
            resolved.tls_override = self
                .static_override(category, &resolved.canonical_host_key)
                .map(str::to_string);
        }
        Ok(resolved)
    }

    /// 解析 TLS 主机名覆盖
    ///
    /// 依次使用规则模板、规范主机配置的覆盖，最后退回到规范主机名本身。
    pub fn resolve_tls_override(&self, category: EntityCategory, name: &str) -> Result<String> {
        let resolved = self.resolve(category, name)?;
        Ok(tls_override_of(&resolved))
    }

    fn static_override(&self, category: EntityCategory, host: &str) -> Option<&str> {
        match category {
            EntityCategory::Peer => {
                lookup(&self.network.peers, host).and_then(PeerConfig::ssl_target_name_override)
            }
            EntityCategory::Orderer => lookup(&self.network.orderers, host)
                .and_then(OrdererConfig::ssl_target_name_override),
            EntityCategory::CertificateAuthority => lookup(&self.network.certificate_authorities, host)
                .and_then(CaConfig::ssl_target_name_override),
        }
    }

    fn mapped<'a, T>(
        map: &'a HashMap<String, T>,
        category: EntityCategory,
        resolved: &ResolvedEndpoint,
    ) -> Result<&'a T> {
        lookup(map, &resolved.canonical_host_key).ok_or_else(|| {
            Error::config(
                ConfigStage::EntityMatchers,
                format!(
                    "mappedHost {} 没有对应的 {} 配置",
                    resolved.canonical_host_key, category
                ),
            )
        })
    }

    /// 获取 peer 配置
    pub fn peer_config(&self, name: &str) -> Result<PeerConfig> {
        if let Some(peer) = lookup(&self.network.peers, name) {
            return Ok(peer.clone());
        }

        let resolved = self.resolve(EntityCategory::Peer, name)?;
        let mut peer = Self::mapped(&self.network.peers, EntityCategory::Peer, &resolved)?.clone();
        peer.set_ssl_target_name_override(&tls_override_of(&resolved));
        peer.url = resolved.connection_url;
        peer.event_url = resolved.event_url;
        debug!("peer {} 通过实体匹配映射到 {}", name, resolved.canonical_host_key);
        Ok(peer)
    }

    /// 获取 orderer 配置
    pub fn orderer_config(&self, name: &str) -> Result<OrdererConfig> {
        if let Some(orderer) = lookup(&self.network.orderers, name) {
            return Ok(orderer.clone());
        }

        let resolved = self.resolve(EntityCategory::Orderer, name)?;
        let mut orderer =
            Self::mapped(&self.network.orderers, EntityCategory::Orderer, &resolved)?.clone();
        orderer.set_ssl_target_name_override(&tls_override_of(&resolved));
        orderer.url = resolved.connection_url;
        debug!("orderer {} 通过实体匹配映射到 {}", name, resolved.canonical_host_key);
        Ok(orderer)
    }

    /// 获取 CA 配置
    pub fn ca_config(&self, name: &str) -> Result<CaConfig> {
        if let Some(ca) = lookup(&self.network.certificate_authorities, name) {
            return Ok(ca.clone());
        }

        let resolved = self.resolve(EntityCategory::CertificateAuthority, name)?;
        let mut ca = Self::mapped(
            &self.network.certificate_authorities,
            EntityCategory::CertificateAuthority,
            &resolved,
        )?
        .clone();
        ca.set_ssl_target_name_override(&tls_override_of(&resolved));
        ca.url = resolved.connection_url;
        debug!("CA {} 通过实体匹配映射到 {}", name, resolved.canonical_host_key);
        Ok(ca)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORK_YAML: &str = r#"
client:
  organization: org1
organizations:
  Org1:
    mspid: Org1MSP
    certificateAuthorities: [ca.org1.example.com]
peers:
  peer0.org1.example.com:
    url: grpcs://peer0.org1.example.com:7051
    eventUrl: grpcs://peer0.org1.example.com:7053
    grpcOptions:
      ssl-target-name-override: peer0.org1.example.com
    tlsCACerts:
      pem: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n"
orderers:
  orderer.example.com:
    url: grpcs://orderer.example.com:7050
certificateAuthorities:
  ca.org1.example.com:
    url: https://ca.org1.example.com:7054
    httpOptions:
      ssl-target-name-override: ca.org1.example.com
entityMatchers:
  peer:
    - pattern: (\w+).org1.example.(\w+):(\d+)
      urlSubstitutionExp: grpcs://$1.org1.example.$2:$3
      eventUrlSubstitutionExp: grpcs://$1.org1.example.$2:7053
      sslTargetOverrideUrlSubstitutionExp: $1.org1.example.$2
      mappedHost: peer0.org1.example.com
    - pattern: (\w+).org1.example.(\w+)
      urlSubstitutionExp: localhost:7051
      mappedHost: peer0.org1.example.com
  orderer:
    - pattern: (\w+).example.(\w+)
      urlSubstitutionExp: localhost:7050
      mappedHost: orderer.example.com
  certificateAuthority:
    - pattern: (\w+).org1.example.(\w+)
      urlSubstitutionExp: https://localhost:7054
      mappedHost: ca.org1.example.com
"#;

    fn endpoint_config() -> EndpointConfig {
        EndpointConfig::new(NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap()).unwrap()
    }

    #[test]
    fn test_direct_peer_lookup_wins() {
        let config = endpoint_config();
        let peer = config.peer_config("peer0.org1.example.com").unwrap();
        assert_eq!(peer.url, "grpcs://peer0.org1.example.com:7051");
    }

    #[test]
    fn test_peer_lookup_through_matcher() {
        let config = endpoint_config();

        let peer = config.peer_config("peer1.org1.example.com:8051").unwrap();
        assert_eq!(peer.url, "grpcs://peer1.org1.example.com:8051");
        assert_eq!(peer.event_url.as_deref(), Some("grpcs://peer1.org1.example.com:7053"));
        assert_eq!(peer.ssl_target_name_override(), Some("peer1.org1.example.com"));
        // 证书来自规范主机
        assert!(!peer.tls_ca_certs.is_empty());

        let peer = config.peer_config("peer1.org1.example.com").unwrap();
        assert_eq!(peer.url, "localhost:7051");
        assert_eq!(peer.ssl_target_name_override(), Some("peer0.org1.example.com"));
    }

    #[test]
    fn test_tls_override_falls_back_to_mapped_host() {
        let config = endpoint_config();
        let tls = config
            .resolve_tls_override(EntityCategory::Peer, "peer9.org1.example.com")
            .unwrap();
        assert_eq!(tls, "peer0.org1.example.com");

        // orderer 静态配置没有覆盖，退回规范主机名
        let tls = config
            .resolve_tls_override(EntityCategory::Orderer, "orderer2.example.com")
            .unwrap();
        assert_eq!(tls, "orderer.example.com");
    }

    #[test]
    fn test_orderer_and_ca_through_matcher() {
        let config = endpoint_config();
        let orderer = config.orderer_config("orderer2.example.com").unwrap();
        assert_eq!(orderer.url, "localhost:7050");

        let ca = config.ca_config("ca2.org1.example.com").unwrap();
        assert_eq!(ca.url, "https://localhost:7054");
        assert_eq!(ca.ssl_target_name_override(), Some("ca.org1.example.com"));
    }

    #[test]
    fn test_matched_ca_without_overrides_uses_mapped_host() {
        let mut network = NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap();
        for ca in network.certificate_authorities.values_mut() {
            ca.http_options.clear();
        }
        for orderer in network.orderers.values_mut() {
            orderer.grpc_options.clear();
        }
        let config = EndpointConfig::new(network).unwrap();

        let ca = config.ca_config("ca2.org1.example.com").unwrap();
        assert_eq!(ca.url, "https://localhost:7054");
        assert_eq!(ca.ssl_target_name_override(), Some("ca.org1.example.com"));

        let orderer = config.orderer_config("orderer2.example.com").unwrap();
        assert_eq!(orderer.ssl_target_name_override(), Some("orderer.example.com"));
    }

    #[test]
    fn test_unmatched_names_fail() {
        let config = endpoint_config();
        assert!(matches!(
            config.peer_config("peer0.org5.sample.net"),
            Err(Error::NoMatchingEntity { .. })
        ));
    }

    #[test]
    fn test_mapped_host_without_static_config() {
        let mut network = NetworkConfig::from_yaml_str(NETWORK_YAML).unwrap();
        network.peers.clear();
        let config = EndpointConfig::new(network).unwrap();
        let err = config.peer_config("peer1.org1.example.com").unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                stage: ConfigStage::EntityMatchers,
                ..
            }
        ));
    }

    #[test]
    fn test_organization_lookup_ignores_case() {
        let config = endpoint_config();
        assert_eq!(config.organization("org1").unwrap().msp_id, "Org1MSP");
        assert_eq!(config.organization("ORG1").unwrap().msp_id, "Org1MSP");
        assert!(config.organization("org3").is_err());
    }
}
