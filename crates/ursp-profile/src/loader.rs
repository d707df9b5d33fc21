//! 配置文件 → 按 PLMN 分组的规则集。
//!
//! # 教案式说明
//! - **意图（Why）**：静态配置与二进制推送落到同一 [`RuleSet`] 形状，匹配引擎不区分来源；
//! - **逻辑（How）**：
//!   1. 遍历根元素下的 `UePolicy` 分组，按 `plmn` 属性归并；
//!   2. 逐条解析 `UrspRule`，任何属性缺失或取值非法只跳过当前规则并记录告警；
//!   3. 指向 IMS 的规则另按优先级写入 IMS 索引；
//!   4. 每个分组最终经 [`RuleSet::from_rules`] 排序冻结。
//! - **契约（What）**：函数永不因单条规则失败而整体失败；[`LoadedProfile::skipped`] 记录被跳过的规则数。

use std::collections::BTreeMap;

use tracing::{debug, warn};
use ursp_core::{Plmn, PolicyRule, RouteSelectionDescriptor, RuleSet, TrafficDescriptor};

use crate::components::{apply_route_component, apply_traffic_component, parse_type_identifier};
use crate::element::Element;
use crate::error::ProfileError;

/// 文档词汇表。
pub mod vocabulary {
    /// 策略分组。
    pub const UE_POLICY: &str = "UePolicy";
    /// 规则。
    pub const URSP_RULE: &str = "UrspRule";
    /// 流量描述符。
    pub const TRAFFIC_DESCRIPTOR: &str = "TrafficDescriptor";
    /// 流量描述符组件。
    pub const TRAFFIC_DESCRIPTOR_COMPONENT: &str = "TrafficDescriptorComponent";
    /// 路由选择描述符。
    pub const ROUTE_SELECTION_DESCRIPTOR: &str = "RouteSelectionDescriptor";
    /// 路由选择描述符组件。
    pub const ROUTE_SELECTION_DESCRIPTOR_COMPONENT: &str = "RouteSelectionDescriptorComponent";
    /// PLMN 属性。
    pub const PLMN: &str = "plmn";
    /// 优先级属性。
    pub const PRECEDENCE: &str = "precedence";
    /// 类型码属性。
    pub const TYPE_IDENTIFIER: &str = "typeIdentifier";
    /// 取值属性。
    pub const VALUE: &str = "value";
}

use vocabulary as v;

/// 加载结果。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadedProfile {
    /// PLMN 文本 → 规则集。
    pub policies: BTreeMap<String, RuleSet>,
    /// IMS 规则，按规则优先级索引。
    pub ims_rules: BTreeMap<u8, PolicyRule>,
    /// 被跳过的规则数。
    pub skipped: usize,
}

/// 从文档树加载。
pub fn load_element(root: &Element) -> LoadedProfile {
    let mut grouped: BTreeMap<String, Vec<PolicyRule>> = BTreeMap::new();
    let mut profile = LoadedProfile::default();

    for group in root.children_named(v::UE_POLICY) {
        let plmn = match group
            .attr(v::PLMN)
            .map(|raw| raw.trim().parse::<Plmn>())
        {
            Some(Ok(plmn)) => plmn.to_string(),
            Some(Err(err)) => {
                warn!(error = %err, "skipping policy group with malformed plmn");
                continue;
            }
            None => {
                warn!("skipping policy group without plmn attribute");
                continue;
            }
        };
        let rules = grouped.entry(plmn.clone()).or_default();
        for element in group.children_named(v::URSP_RULE) {
            match parse_rule(element) {
                Ok(rule) => {
                    if rule.traffic_descriptor.targets_ims() {
                        if let Some(previous) = profile.ims_rules.insert(rule.precedence, rule.clone()) {
                            warn!(
                                precedence = previous.precedence,
                                plmn = %plmn,
                                "ims rule index entry replaced by a later rule with the same precedence"
                            );
                        }
                    }
                    rules.push(rule);
                }
                Err(err) => {
                    profile.skipped += 1;
                    warn!(plmn = %plmn, error = %err, "skipping malformed ursp rule");
                }
            }
        }
    }

    profile.policies = grouped
        .into_iter()
        .map(|(plmn, rules)| (plmn, RuleSet::from_rules(rules)))
        .collect();
    debug!(
        groups = profile.policies.len(),
        ims_rules = profile.ims_rules.len(),
        skipped = profile.skipped,
        "ursp profile loaded"
    );
    profile
}

fn parse_rule(element: &Element) -> Result<PolicyRule, ProfileError> {
    let precedence = parse_precedence(element, "UrspRule")?;
    let descriptor_element =
        element
            .first_child(v::TRAFFIC_DESCRIPTOR)
            .ok_or(ProfileError::MissingElement {
                parent: "UrspRule",
                child: "TrafficDescriptor",
            })?;

    let mut traffic_descriptor = TrafficDescriptor::default();
    for component in descriptor_element.children_named(v::TRAFFIC_DESCRIPTOR_COMPONENT) {
        let (code, value) = component_attrs(component, "TrafficDescriptorComponent")?;
        apply_traffic_component(&mut traffic_descriptor, code, value)?;
    }

    let mut routes = Vec::new();
    for route_element in element.children_named(v::ROUTE_SELECTION_DESCRIPTOR) {
        if let Some(route) = parse_route(route_element)? {
            routes.push(route);
        }
    }
    if routes.is_empty() {
        return Err(ProfileError::MissingElement {
            parent: "UrspRule",
            child: "RouteSelectionDescriptor",
        });
    }
    Ok(PolicyRule {
        precedence,
        traffic_descriptor,
        routes,
    })
}

fn parse_route(element: &Element) -> Result<Option<RouteSelectionDescriptor>, ProfileError> {
    let mut route = RouteSelectionDescriptor {
        precedence: parse_precedence(element, "RouteSelectionDescriptor")?,
        ..RouteSelectionDescriptor::default()
    };
    for component in element.children_named(v::ROUTE_SELECTION_DESCRIPTOR_COMPONENT) {
        let (code, value) = component_attrs(component, "RouteSelectionDescriptorComponent")?;
        if !apply_route_component(&mut route, code, value)? {
            debug!(precedence = route.precedence, "dropping non-3gpp route selection descriptor");
            return Ok(None);
        }
    }
    Ok(Some(route))
}

fn parse_precedence(element: &Element, name: &'static str) -> Result<u8, ProfileError> {
    let raw = element.attr(v::PRECEDENCE).ok_or(ProfileError::MissingAttribute {
        element: name,
        attr: v::PRECEDENCE,
    })?;
    raw.trim()
        .parse()
        .map_err(|_| ProfileError::invalid("precedence", raw))
}

fn component_attrs<'a>(
    element: &'a Element,
    name: &'static str,
) -> Result<(u8, &'a str), ProfileError> {
    let code = element
        .attr(v::TYPE_IDENTIFIER)
        .ok_or(ProfileError::MissingAttribute {
            element: name,
            attr: v::TYPE_IDENTIFIER,
        })?;
    Ok((
        parse_type_identifier(code)?,
        element.attr(v::VALUE).unwrap_or_default(),
    ))
}
