//! 流量描述符白名单。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主只对 URSP 规则提到过的应用、DNN、FQDN 与连接能力做切片绑定，
//!   其余业务流无需进入选路；白名单在每次发布归属网络规则集时整体重算；
//! - **逻辑（How）**：对规则集中每条可命中的规则取流量描述符的并集，match-all 与不可命中的描述符不贡献条目；
//! - **契约（What）**：应用标识以 `osId#appId` 形式给出，`osId` 为空时只给 `appId`；
//!   [`TrafficWhitelist::to_string_map`] 的各列表以 `,` 连接，与下游的键值通道格式一致。

use std::collections::{BTreeMap, BTreeSet};

use ursp_core::{ConnectionCapability, FlagSet, RuleSet};

/// `to_string_map` 中的应用标识键。
pub const KEY_OS_APP_IDS: &str = "osAppIds";
/// `to_string_map` 中的 DNN 键。
pub const KEY_DNNS: &str = "dnns";
/// `to_string_map` 中的 FQDN 键。
pub const KEY_FQDNS: &str = "fqdns";
/// `to_string_map` 中的连接能力键。
pub const KEY_CCT: &str = "cct";

/// 归属网络规则集提到的流量描述符条目。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TrafficWhitelist {
    /// 应用标识。
    pub os_app_ids: BTreeSet<String>,
    /// DNN，统一小写。
    pub dnns: BTreeSet<String>,
    /// FQDN，统一小写。
    pub fqdns: BTreeSet<String>,
    /// 连接能力。
    pub connection_capabilities: FlagSet<ConnectionCapability>,
}

impl TrafficWhitelist {
    /// 由规则集汇总。
    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut whitelist = Self::default();
        for rule in rules.rules() {
            let descriptor = &rule.traffic_descriptor;
            if descriptor.unsupported || descriptor.match_all {
                continue;
            }
            whitelist
                .os_app_ids
                .extend(descriptor.os_app_ids.iter().map(|id| {
                    if id.os_id.is_empty() {
                        id.app_id.clone()
                    } else {
                        format!("{}#{}", id.os_id, id.app_id)
                    }
                }));
            whitelist
                .dnns
                .extend(descriptor.dnns.iter().map(|dnn| dnn.to_ascii_lowercase()));
            whitelist
                .fqdns
                .extend(descriptor.fqdns.iter().map(|fqdn| fqdn.to_ascii_lowercase()));
            for capability in descriptor.capability_flags().iter() {
                whitelist.connection_capabilities.insert(capability);
            }
        }
        whitelist
    }

    /// 所有列表都为空。
    pub fn is_empty(&self) -> bool {
        self.os_app_ids.is_empty()
            && self.dnns.is_empty()
            && self.fqdns.is_empty()
            && self.connection_capabilities.is_empty()
    }

    /// 应用标识（`osId#appId` 或 `appId`）是否在白名单中。
    pub fn contains_app(&self, raw: &str) -> bool {
        self.os_app_ids.contains(raw)
            || self
                .os_app_ids
                .iter()
                .any(|entry| entry.rsplit('#').next() == Some(raw))
    }

    /// DNN 是否在白名单中，大小写不敏感。
    pub fn contains_dnn(&self, dnn: &str) -> bool {
        self.dnns.contains(&dnn.to_ascii_lowercase())
    }

    /// 以键值形式交付；连接能力使用配置文件中的名称。
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        let join = |items: &BTreeSet<String>| items.iter().cloned().collect::<Vec<_>>().join(",");
        let cct = self
            .connection_capabilities
            .iter()
            .map(ConnectionCapability::name)
            .collect::<Vec<_>>()
            .join(",");
        BTreeMap::from([
            (KEY_OS_APP_IDS.to_owned(), join(&self.os_app_ids)),
            (KEY_DNNS.to_owned(), join(&self.dnns)),
            (KEY_FQDNS.to_owned(), join(&self.fqdns)),
            (KEY_CCT.to_owned(), cct),
        ])
    }
}

#[cfg(test)]
mod tests {
    use ursp_core::{OsAppId, PolicyRule, TrafficDescriptor};

    use super::*;

    fn rule(precedence: u8, traffic_descriptor: TrafficDescriptor) -> PolicyRule {
        PolicyRule {
            precedence,
            traffic_descriptor,
            routes: Vec::new(),
        }
    }

    #[test]
    fn collects_union_of_supported_descriptors() {
        let rules = RuleSet::from_rules(vec![
            rule(
                1,
                TrafficDescriptor {
                    os_app_ids: vec![
                        OsAppId {
                            os_id: "97a498e3fc925c94".into(),
                            app_id: "com.example.game".into(),
                        },
                        OsAppId {
                            os_id: String::new(),
                            app_id: "com.example.video".into(),
                        },
                    ],
                    dnns: vec!["IMS".into()],
                    connection_capabilities: [1, 8].into_iter().collect(),
                    ..TrafficDescriptor::default()
                },
            ),
            rule(
                2,
                TrafficDescriptor {
                    fqdns: vec!["Video.Example.com".into()],
                    dnns: vec!["ims".into(), "mms".into()],
                    ..TrafficDescriptor::default()
                },
            ),
            rule(
                3,
                TrafficDescriptor {
                    dnns: vec!["hidden".into()],
                    unsupported: true,
                    ..TrafficDescriptor::default()
                },
            ),
            rule(255, TrafficDescriptor::match_all()),
        ]);

        let whitelist = TrafficWhitelist::from_rules(&rules);
        assert_eq!(whitelist.dnns.iter().collect::<Vec<_>>(), vec!["ims", "mms"], "DNN 应去重并小写");
        assert!(!whitelist.contains_dnn("hidden"), "不可命中的描述符不贡献条目");
        assert!(whitelist.contains_dnn("MMS"));
        assert!(whitelist.contains_app("97a498e3fc925c94#com.example.game"));
        assert!(whitelist.contains_app("com.example.game"), "只给 appId 也应命中");
        assert!(whitelist.contains_app("com.example.video"));
        assert!(whitelist.connection_capabilities.contains(ConnectionCapability::Ims));
        assert!(whitelist.connection_capabilities.contains(ConnectionCapability::Internet));
        assert!(!whitelist.connection_capabilities.contains(ConnectionCapability::Mms));

        let map = whitelist.to_string_map();
        assert_eq!(map[KEY_DNNS], "ims,mms");
        assert_eq!(map[KEY_FQDNS], "video.example.com");
        assert_eq!(map[KEY_CCT], "ims,internet");
        assert_eq!(
            map[KEY_OS_APP_IDS],
            "97a498e3fc925c94#com.example.game,com.example.video"
        );
    }

    #[test]
    fn match_all_only_rules_give_empty_whitelist() {
        let rules = RuleSet::from_rules(vec![rule(1, TrafficDescriptor::match_all())]);
        let whitelist = TrafficWhitelist::from_rules(&rules);
        assert!(whitelist.is_empty());
        assert_eq!(whitelist.to_string_map()[KEY_CCT], "");
    }
}
