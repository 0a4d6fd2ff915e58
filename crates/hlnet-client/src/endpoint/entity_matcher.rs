//! 实体匹配模块
//!
//! 该模块把配置中或服务发现得到的 `host[:port]` 名称映射为可连接的端点。
//! 每个类别的规则按声明顺序逐条尝试，第一条完整匹配的规则生效，
//! 因此更具体的规则必须排在更通用的规则之前。

use hlnet_common::{
    ConfigStage, EntityCategory, EntityMatchers, Error, MatchConfig, ResolvedEndpoint, Result,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

/// 模板中的反向引用：`$$`、`${name}` 或 `$name`
static BACK_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$|\$\{(\w+)\}|\$(\w+)").expect("反向引用正则表达式无效"));

/// 替换模板
#[derive(Debug, Clone)]
struct Template(Option<String>);

impl Template {
    fn compile(exp: &str, pattern: &Regex, field: &str) -> std::result::Result<Self, String> {
        if exp.is_empty() {
            return Ok(Self(None));
        }

        for caps in BACK_REFERENCE.captures_iter(exp) {
            let Some(name) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let name = name.as_str();
            let known = match name.parse::<usize>() {
                Ok(index) => index < pattern.captures_len(),
                Err(_) => pattern.capture_names().flatten().any(|n| n == name),
            };
            if !known {
                return Err(format!("{} 引用了不存在的捕获组 ${}", field, name));
            }
        }

        Ok(Self(Some(exp.to_string())))
    }

    /// 展开模板，空模板返回 None
    fn expand(&self, caps: &Captures<'_>) -> Option<String> {
        let exp = self.0.as_deref()?;
        if !exp.contains('$') {
            return Some(exp.to_string());
        }
        let mut out = String::new();
        caps.expand(exp, &mut out);
        Some(out)
    }
}

/// 编译后的匹配规则
#[derive(Debug, Clone)]
struct MatchRule {
    pattern: Regex,
    url: Template,
    event_url: Template,
    tls_override: Template,
    mapped_host: String,
}

impl MatchRule {
    fn compile(config: &MatchConfig) -> std::result::Result<Self, String> {
        if config.mapped_host.trim().is_empty() {
            return Err(format!("规则 {} 的 mappedHost 不能为空", config.pattern));
        }

        // 整串匹配
        let pattern = Regex::new(&format!("^(?:{})$", config.pattern))
            .map_err(|e| format!("无效的正则表达式 {}: {}", config.pattern, e))?;

        Ok(Self {
            url: Template::compile(&config.url_substitution_exp, &pattern, "urlSubstitutionExp")?,
            event_url: Template::compile(
                &config.event_url_substitution_exp,
                &pattern,
                "eventUrlSubstitutionExp",
            )?,
            tls_override: Template::compile(
                &config.ssl_target_override_url_substitution_exp,
                &pattern,
                "sslTargetOverrideUrlSubstitutionExp",
            )?,
            mapped_host: config.mapped_host.clone(),
            pattern,
        })
    }
}

/// 实体匹配器
///
/// 构建后不可变，可以在线程间共享而无需同步。
#[derive(Debug, Clone, Default)]
pub struct EntityMatcher {
    peer: Vec<MatchRule>,
    orderer: Vec<MatchRule>,
    certificate_authority: Vec<MatchRule>,
}

impl EntityMatcher {
    /// 从配置编译规则，任何一条规则无效都会导致加载失败
    pub fn from_config(config: &EntityMatchers) -> Result<Self> {
        let compile = |category: EntityCategory| -> Result<Vec<MatchRule>> {
            config
                .rules(category)
                .iter()
                .enumerate()
                .map(|(index, rule)| {
                    MatchRule::compile(rule).map_err(|message| {
                        Error::config(
                            ConfigStage::EntityMatchers,
                            format!("{} 规则 #{}: {}", category, index, message),
                        )
                    })
                })
                .collect()
        };

        Ok(Self {
            peer: compile(EntityCategory::Peer)?,
            orderer: compile(EntityCategory::Orderer)?,
            certificate_authority: compile(EntityCategory::CertificateAuthority)?,
        })
    }

    fn rules(&self, category: EntityCategory) -> &[MatchRule] {
        match category {
            EntityCategory::Peer => &self.peer,
            EntityCategory::Orderer => &self.orderer,
            EntityCategory::CertificateAuthority => &self.certificate_authority,
        }
    }

    /// 某个类别的规则数量
    pub fn rule_count(&self, category: EntityCategory) -> usize {
        self.rules(category).len()
    }

    fn find<'r, 'h>(
        &'r self,
        category: EntityCategory,
        name: &'h str,
    ) -> Result<(&'r MatchRule, Captures<'h>)> {
        self.rules(category)
            .iter()
            .find_map(|rule| rule.pattern.captures(name).map(|caps| (rule, caps)))
            .ok_or_else(|| Error::NoMatchingEntity {
                category,
                name: name.to_string(),
            })
    }

    /// 解析端点
    ///
    /// 空模板保留原始输入（TLS 覆盖除外，为空时不返回）；规范主机键总是规则的 mappedHost。
    pub fn resolve(&self, category: EntityCategory, name: &str) -> Result<ResolvedEndpoint> {
        let (rule, caps) = self.find(category, name)?;

        let connection_url = rule.url.expand(&caps).unwrap_or_else(|| name.to_string());
        let event_url = match category {
            EntityCategory::Peer => {
                Some(rule.event_url.expand(&caps).unwrap_or_else(|| name.to_string()))
            }
            _ => None,
        };
        let tls_override = rule.tls_override.expand(&caps);

        debug!(
            "实体匹配: {} {} -> {} (规范主机 {})",
            category, name, connection_url, rule.mapped_host
        );

        Ok(ResolvedEndpoint {
            connection_url,
            event_url,
            tls_override,
            canonical_host_key: rule.mapped_host.clone(),
        })
    }

    /// 只解析 TLS 主机名覆盖，规则模板为空时返回 None
    pub fn resolve_tls_override(
        &self,
        category: EntityCategory,
        name: &str,
    ) -> Result<Option<String>> {
        let (rule, caps) = self.find(category, name)?;
        Ok(rule.tls_override.expand(&caps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rule(pattern: &str, url: &str, event: &str, tls: &str, mapped: &str) -> MatchConfig {
        MatchConfig {
            pattern: pattern.to_string(),
            url_substitution_exp: url.to_string(),
            event_url_substitution_exp: event.to_string(),
            ssl_target_override_url_substitution_exp: tls.to_string(),
            mapped_host: mapped.to_string(),
        }
    }

    fn peer_matcher(rules: Vec<MatchConfig>) -> EntityMatcher {
        EntityMatcher::from_config(&EntityMatchers {
            peer: rules,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_literal_url_substitution() {
        let matcher = peer_matcher(vec![rule(
            r"(\w+).org1.example.(\w+)",
            "localhost:7051",
            "",
            "",
            "peer0.org1.example.com",
        )]);

        let resolved = matcher
            .resolve(EntityCategory::Peer, "peer1.org1.example.com")
            .unwrap();
        assert_eq!(resolved.connection_url, "localhost:7051");
        assert_eq!(resolved.canonical_host_key, "peer0.org1.example.com");
        assert_eq!(resolved.event_url.as_deref(), Some("peer1.org1.example.com"));
        assert_eq!(resolved.tls_override, None);
    }

    #[test]
    fn test_back_reference_substitution() {
        let matcher = peer_matcher(vec![rule(
            r"(\w+).example4.(\w+):(\d+)",
            "$1.org1.example.$2:$3",
            "$1.org1.example.$2:7053",
            "$1.org1.example.$2",
            "peer0.org1.example.com",
        )]);

        let resolved = matcher
            .resolve(EntityCategory::Peer, "foo.example4.com:9999")
            .unwrap();
        assert_eq!(resolved.connection_url, "foo.org1.example.com:9999");
        assert_eq!(resolved.event_url.as_deref(), Some("foo.org1.example.com:7053"));
        assert_eq!(resolved.tls_override.as_deref(), Some("foo.org1.example.com"));
    }

    #[rstest]
    #[case("peer0.org1.example.com", "org1-specific")]
    #[case("peer0.org2.example.com", "catch-all")]
    #[case("peer7.org1.example.com", "org1-specific")]
    fn test_first_match_wins(#[case] input: &str, #[case] expected: &str) {
        let matcher = peer_matcher(vec![
            rule(r"(\w+).org1.example.com", "", "", "", "org1-specific"),
            rule(r".*", "", "", "", "catch-all"),
        ]);
        let resolved = matcher.resolve(EntityCategory::Peer, input).unwrap();
        assert_eq!(resolved.canonical_host_key, expected);
    }

    #[test]
    fn test_superset_rule_declared_second_never_wins() {
        let matcher = peer_matcher(vec![
            rule(r".*", "", "", "", "catch-all"),
            rule(r"(\w+).org1.example.com", "", "", "", "org1-specific"),
        ]);
        let resolved = matcher
            .resolve(EntityCategory::Peer, "peer0.org1.example.com")
            .unwrap();
        assert_eq!(resolved.canonical_host_key, "catch-all");
    }

    #[rstest]
    #[case("peer1.org1.example.com", "peer1.org1.example.com")]
    #[case("peer1.org1.example.com:7051", "peer1.org1.example.com:7051")]
    fn test_empty_template_keeps_input(#[case] input: &str, #[case] expected: &str) {
        let matcher = peer_matcher(vec![rule(
            r"peer1.org1.example.com(:\d+)?",
            "",
            "",
            "",
            "peer0.org1.example.com",
        )]);
        let resolved = matcher.resolve(EntityCategory::Peer, input).unwrap();
        assert_eq!(resolved.connection_url, expected);
    }

    #[test]
    fn test_match_is_full_string() {
        let matcher = peer_matcher(vec![rule(
            r"(\w+).org1.example.(\w+)",
            "localhost:7051",
            "",
            "",
            "peer0.org1.example.com",
        )]);
        let err = matcher
            .resolve(EntityCategory::Peer, "peer1.org1.example.com:7051")
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingEntity { .. }));
    }

    #[test]
    fn test_no_matching_entity() {
        let matcher = peer_matcher(vec![rule(r"(\w+).org1.example.com", "", "", "", "p")]);
        let err = matcher
            .resolve(EntityCategory::Peer, "peer0.org9.example.com")
            .unwrap_err();
        match err {
            Error::NoMatchingEntity { category, name } => {
                assert_eq!(category, EntityCategory::Peer);
                assert_eq!(name, "peer0.org9.example.com");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // 其他类别没有规则
        assert!(matches!(
            matcher.resolve(EntityCategory::Orderer, "orderer.example.com"),
            Err(Error::NoMatchingEntity { .. })
        ));
    }

    #[test]
    fn test_orderer_has_no_event_url() {
        let matcher = EntityMatcher::from_config(&EntityMatchers {
            orderer: vec![rule(
                r"(\w+).example.(\w+)",
                "localhost:7050",
                "ignored:7053",
                "orderer.example.com",
                "orderer.example.com",
            )],
            ..Default::default()
        })
        .unwrap();
        let resolved = matcher
            .resolve(EntityCategory::Orderer, "orderer.example.com")
            .unwrap();
        assert_eq!(resolved.event_url, None);
        assert_eq!(resolved.tls_override.as_deref(), Some("orderer.example.com"));
        assert_eq!(
            matcher
                .resolve_tls_override(EntityCategory::Orderer, "orderer.example.com")
                .unwrap()
                .as_deref(),
            Some("orderer.example.com")
        );
    }

    #[test]
    fn test_unused_capture_groups_are_legal() {
        let matcher = peer_matcher(vec![rule(
            r"(\w+).(org\d).example.(\w+)",
            "$2.internal:7051",
            "",
            "",
            "peer0.org1.example.com",
        )]);
        let resolved = matcher
            .resolve(EntityCategory::Peer, "peer3.org1.example.com")
            .unwrap();
        assert_eq!(resolved.connection_url, "org1.internal:7051");
    }

    #[rstest]
    #[case(rule(r"peer0", "", "", "", ""))]
    #[case(rule(r"peer0", "", "", "", "   "))]
    #[case(rule(r"peer0(", "", "", "", "peer0"))]
    #[case(rule(r"(\w+).example.com", "$2:7051", "", "", "peer0"))]
    #[case(rule(r"(\w+).example.com", "$1abc", "", "", "peer0"))]
    fn test_invalid_rules_rejected(#[case] invalid: MatchConfig) {
        let err = EntityMatcher::from_config(&EntityMatchers {
            peer: vec![invalid],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Config {
                stage: ConfigStage::EntityMatchers,
                ..
            }
        ));
    }

    #[test]
    fn test_named_groups_and_escaped_dollar() {
        let matcher = peer_matcher(vec![rule(
            r"(?P<host>\w+).org1.example.com",
            "${host}.local:$$7051",
            "",
            "",
            "peer0.org1.example.com",
        )]);
        let resolved = matcher
            .resolve(EntityCategory::Peer, "peer2.org1.example.com")
            .unwrap();
        assert_eq!(resolved.connection_url, "peer2.local:$7051");
    }
}
