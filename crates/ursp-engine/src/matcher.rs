//! 选路匹配。
//!
//! # 教案式说明
//! - **意图（Why）**：给定一个网络的有序规则集与一条业务流的运行时属性，找出第一条命中的规则，
//!   并在其路由中挑出第一条可用的路由选择描述符；
//! - **逻辑（How）**：
//!   1. 规则按优先级升序遍历，`match_all` 直接命中，否则流量描述符中每个非空字段都必须命中（逻辑与）；
//!   2. 命中后在规则内按路由优先级挑选，路由被禁用或切片未授权时跳过；
//!   3. 规则内无可用路由时继续下一条规则，而不是整体失败；
//! - **契约（What）**：匹配器只读快照，不报错；未命中返回 `None`；相同输入重复调用结果相同。
//!
//! # 风险提示（Trade-offs）
//! - IPv6 比较完整地址而忽略前缀长度，与 IPv4 的掩码比较不对称，保持与网络侧既有行为一致。

use std::net::{Ipv4Addr, Ipv6Addr};

use ursp_core::{
    AllowedSliceRegistry, AppDescriptor, FlagSet, ForbiddenQuery, ForbiddenRoutes, PolicyRule,
    RouteFlag, RouteSelectionDescriptor, RuleSet, SelectedRoute, TrafficDescriptor,
};

/// 规则内选出的路由及其落定的切片与 DNN。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RouteChoice<'r> {
    /// 选中的描述符。
    pub route: &'r RouteSelectionDescriptor,
    /// 注册表中的切片文本，路由未列切片时为空。
    pub slice: String,
    /// 首个未被禁用的 DNN，路由未列 DNN 时为空。
    pub dnn: String,
}

/// 绑定授权注册表与禁用谓词的匹配器。
pub struct PolicyMatcher<'a> {
    registry: &'a AllowedSliceRegistry,
    forbidden: &'a dyn ForbiddenRoutes,
}

impl<'a> PolicyMatcher<'a> {
    /// 构造匹配器。
    pub fn new(registry: &'a AllowedSliceRegistry, forbidden: &'a dyn ForbiddenRoutes) -> Self {
        Self {
            registry,
            forbidden,
        }
    }

    /// 按优先级找出第一条命中且存在可用路由的规则。
    pub fn select_route(&self, rules: &RuleSet, app: &AppDescriptor) -> Option<SelectedRoute> {
        rules.rules().iter().find_map(|rule| {
            let flags = match_traffic(&rule.traffic_descriptor, app)?;
            let choice = self.select_within_rule(&rule.routes)?;
            Some(build_selected(rule, choice, flags.with(RouteFlag::HasUrsp)))
        })
    }

    /// 在单条规则的路由中挑选第一条可用者。
    ///
    /// # 契约说明（What）
    /// - 先以 `(pdu_session_type, ssc_mode)` 询问禁用谓词；
    /// - 同时列出切片与 DNN：切片需被授权，再取首个未被禁用的 DNN；
    /// - 只列切片：切片需被授权，且 `(切片, 空 DNN)` 未被禁用；
    /// - 只列 DNN：取首个未被禁用的 DNN；
    /// - 两者皆无：直接接受，用于兜底路由。
    pub fn select_within_rule<'r>(
        &self,
        routes: &'r [RouteSelectionDescriptor],
    ) -> Option<RouteChoice<'r>> {
        routes.iter().find_map(|route| self.accept_route(route))
    }

    /// 只看规则集最后一条规则的兜底路由，不依赖业务流属性。
    ///
    /// # 契约说明（What）
    /// - 规则集不存在或为空：返回空结果；
    /// - 最后一条规则不是 match-all（或描述符不可命中）：只置 [`RouteFlag::HasUrsp`]；
    /// - 否则取第一条切片可用（或未列切片）的路由，填入切片、首个 DNN 与会话参数，并置
    ///   [`RouteFlag::MatchAll`] 与 [`RouteFlag::HasUrsp`]；没有这样的路由时只置 `HasUrsp`。
    pub fn match_all_route(&self, rules: Option<&RuleSet>) -> SelectedRoute {
        let Some(last) = rules.and_then(RuleSet::last) else {
            return SelectedRoute::default();
        };
        let has_ursp = FlagSet::empty().with(RouteFlag::HasUrsp);
        let descriptor = &last.traffic_descriptor;
        if !descriptor.match_all || descriptor.unsupported {
            return SelectedRoute::flags_only(has_ursp);
        }

        let chosen = last.routes.iter().find_map(|route| {
            if route.slices.is_empty() {
                return Some((route, String::new()));
            }
            self.registry
                .find_first_allowed(&route.slices)
                .map(|slice| (route, slice))
        });
        match chosen {
            Some((route, slice)) => SelectedRoute {
                slice,
                dnn: route.dnns.first().cloned().unwrap_or_default(),
                pdu_session_type: route.pdu_session_type,
                ssc_mode: route.ssc_mode,
                ursp_precedence: last.precedence,
                route_bitmap: has_ursp.with(RouteFlag::MatchAll),
                ..SelectedRoute::default()
            },
            None => SelectedRoute::flags_only(has_ursp),
        }
    }

    /// 业务流的 IP 三元组（远端地址、协议号、远端端口）是否被某条规则列出。
    ///
    /// # 契约说明（What）
    /// - 只看可命中且带有三元组条件的规则，match-all 规则不算列出；
    /// - 规则中列出的三元组条件须全部命中，应用标识、DNN 等其余条件不参与判断；
    /// - 不考虑路由是否可用：宿主据此决定是否下发三元组，而非选路。
    pub fn ip_three_tuple_listed(&self, rules: &RuleSet, app: &AppDescriptor) -> bool {
        rules.rules().iter().any(|rule| {
            let descriptor = &rule.traffic_descriptor;
            !descriptor.unsupported
                && !descriptor.match_all
                && has_three_tuple(descriptor)
                && three_tuple_matches(descriptor, app)
        })
    }

    fn accept_route<'r>(&self, route: &'r RouteSelectionDescriptor) -> Option<RouteChoice<'r>> {
        let session = ForbiddenQuery::session(route.pdu_session_type, route.ssc_mode);
        if self.forbidden.is_forbidden(&session) {
            return None;
        }

        let slice = if route.slices.is_empty() {
            String::new()
        } else {
            self.registry.find_first_allowed(&route.slices)?
        };
        let dnn = if route.dnns.is_empty() {
            if !slice.is_empty() && self.forbidden.is_forbidden(&session.with_target(&slice, "")) {
                return None;
            }
            String::new()
        } else {
            route
                .dnns
                .iter()
                .find(|dnn| !self.forbidden.is_forbidden(&session.with_target(&slice, dnn)))?
                .clone()
        };
        Some(RouteChoice { route, slice, dnn })
    }
}

/// 流量描述符是否命中；命中时返回参与命中的条件标志。
///
/// 不可命中（解码时遇到未知组件）的描述符恒不命中。
pub fn match_traffic(
    descriptor: &TrafficDescriptor,
    app: &AppDescriptor,
) -> Option<FlagSet<RouteFlag>> {
    if descriptor.unsupported {
        return None;
    }
    if descriptor.match_all {
        return Some(FlagSet::empty().with(RouteFlag::MatchAll));
    }

    let mut flags = FlagSet::empty();
    if !descriptor.os_app_ids.is_empty()
        && !descriptor
            .os_app_ids
            .iter()
            .any(|id| id.app_id == app.app_id)
    {
        return None;
    }
    if !three_tuple_matches(descriptor, app) {
        return None;
    }
    if !descriptor.dnns.is_empty() {
        if !descriptor
            .dnns
            .iter()
            .any(|dnn| dnn.eq_ignore_ascii_case(&app.dnn))
        {
            return None;
        }
        flags.insert(RouteFlag::DnnMatched);
    }
    if !descriptor.fqdns.is_empty() {
        if !descriptor
            .fqdns
            .iter()
            .any(|fqdn| fqdn.eq_ignore_ascii_case(&app.fqdn))
        {
            return None;
        }
        flags.insert(RouteFlag::FqdnMatched);
    }
    if !descriptor.connection_capabilities.is_empty() {
        if !app
            .connection_capability
            .is_some_and(|cct| descriptor.connection_capabilities.contains(&cct))
        {
            return None;
        }
        flags.insert(RouteFlag::CctMatched);
    }
    Some(flags)
}

/// 描述符是否带有地址、协议号或端口条件。
fn has_three_tuple(descriptor: &TrafficDescriptor) -> bool {
    !descriptor.ipv4.is_empty()
        || !descriptor.ipv6.is_empty()
        || !descriptor.protocol_ids.is_empty()
        || !descriptor.single_ports.is_empty()
        || !descriptor.port_ranges.is_empty()
}

/// 地址、协议号、端口三项中描述符列出的条件全部命中；未列出的条件视为命中。
fn three_tuple_matches(descriptor: &TrafficDescriptor, app: &AppDescriptor) -> bool {
    if !descriptor.ipv4.is_empty() && !app.ipv4.is_some_and(|addr| ipv4_matches(descriptor, addr)) {
        return false;
    }
    if !descriptor.ipv6.is_empty() && !app.ipv6.is_some_and(|addr| ipv6_matches(descriptor, addr)) {
        return false;
    }
    if !descriptor.protocol_ids.is_empty()
        && !app
            .protocol_id
            .is_some_and(|id| descriptor.protocol_ids.contains(&id))
    {
        return false;
    }
    if (!descriptor.single_ports.is_empty() || !descriptor.port_ranges.is_empty())
        && !app.remote_port.is_some_and(|port| port_matches(descriptor, port))
    {
        return false;
    }
    true
}

fn ipv4_matches(descriptor: &TrafficDescriptor, addr: Ipv4Addr) -> bool {
    let addr = u32::from(addr);
    descriptor.ipv4.iter().any(|entry| {
        let mask = u32::from(entry.mask);
        addr & mask == u32::from(entry.addr) & mask
    })
}

fn ipv6_matches(descriptor: &TrafficDescriptor, addr: Ipv6Addr) -> bool {
    descriptor.ipv6.iter().any(|entry| entry.addr == addr)
}

fn port_matches(descriptor: &TrafficDescriptor, port: u16) -> bool {
    descriptor.single_ports.contains(&port)
        || descriptor.port_ranges.iter().any(|range| range.contains(port))
}

fn build_selected(
    rule: &PolicyRule,
    choice: RouteChoice<'_>,
    route_bitmap: FlagSet<RouteFlag>,
) -> SelectedRoute {
    let descriptor = &rule.traffic_descriptor;
    SelectedRoute {
        slice: choice.slice,
        dnn: choice.dnn,
        pdu_session_type: choice.route.pdu_session_type,
        ssc_mode: choice.route.ssc_mode,
        ursp_precedence: rule.precedence,
        route_bitmap,
        app_ids: descriptor
            .os_app_ids
            .iter()
            .map(|id| id.app_id.clone())
            .collect(),
        ipv4: descriptor.ipv4.clone(),
        ipv6: descriptor.ipv6.clone(),
        protocol_ids: descriptor.protocol_ids.iter().copied().collect(),
        single_ports: descriptor.single_ports.iter().copied().collect(),
        port_ranges: descriptor.port_ranges.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use ursp_core::{
        Ipv4Match, Ipv6Match, NoForbiddenRoutes, OsAppId, PduSessionType, PortRange,
        SliceIdentifier, StaticRadioState,
    };

    use super::*;

    struct ForbidDnn(&'static str);

    impl ForbiddenRoutes for ForbidDnn {
        fn is_forbidden(&self, query: &ForbiddenQuery<'_>) -> bool {
            query.dnn == self.0
        }
    }

    fn registry(entries: &[SliceIdentifier]) -> (Arc<StaticRadioState>, AllowedSliceRegistry) {
        let radio = Arc::new(StaticRadioState::new());
        let registry = AllowedSliceRegistry::new(radio.clone());
        registry.replace(entries.to_vec());
        (radio, registry)
    }

    fn route(precedence: u8, slices: Vec<SliceIdentifier>, dnns: &[&str]) -> RouteSelectionDescriptor {
        RouteSelectionDescriptor {
            precedence,
            pdu_session_type: Some(PduSessionType::Ipv4),
            ssc_mode: Some(1),
            slices,
            dnns: dnns.iter().map(|dnn| (*dnn).to_owned()).collect(),
        }
    }

    fn rule(precedence: u8, traffic_descriptor: TrafficDescriptor, routes: Vec<RouteSelectionDescriptor>) -> PolicyRule {
        PolicyRule {
            precedence,
            traffic_descriptor,
            routes,
        }
    }

    #[test]
    fn match_all_rule_selects_for_default_app() {
        let (_, registry) = registry(&[]);
        let rules = RuleSet::from_rules(vec![rule(1, TrafficDescriptor::match_all(), vec![route(1, vec![], &[])])]);
        let matcher = PolicyMatcher::new(&registry, &NoForbiddenRoutes);
        let selected = matcher
            .select_route(&rules, &AppDescriptor::default())
            .expect("match-all 应命中任意业务流");
        assert!(selected.route_bitmap.contains(RouteFlag::MatchAll));
        assert!(selected.route_bitmap.contains(RouteFlag::HasUrsp));
        assert_eq!(selected.ssc_mode, Some(1));
        assert!(selected.slice.is_empty());
    }

    #[test]
    fn unauthorised_slice_skips_route() {
        let slice = SliceIdentifier::from_parts(1, Some(2), None, None);
        let (_, empty) = registry(&[]);
        let matcher = PolicyMatcher::new(&empty, &NoForbiddenRoutes);
        let only = [route(1, vec![slice.clone()], &["ims"])];
        assert_eq!(matcher.select_within_rule(&only), None, "唯一路由切片未授权时应返回 None");

        let fallback = [route(1, vec![slice.clone()], &["ims"]), route(2, vec![], &["internet"])];
        let choice = matcher.select_within_rule(&fallback).expect("应落到下一条路由");
        assert_eq!(choice.route.precedence, 2);
        assert_eq!(choice.dnn, "internet");

        let (_, allowed) = registry(&[slice.clone()]);
        let matcher = PolicyMatcher::new(&allowed, &NoForbiddenRoutes);
        let choice = matcher.select_within_rule(&only).expect("切片已授权");
        assert_eq!(choice.slice, "01.000002");
        assert_eq!(choice.dnn, "ims");
    }

    #[test]
    fn port_singles_and_ranges() {
        let descriptor = TrafficDescriptor {
            single_ports: [80].into_iter().collect(),
            port_ranges: vec![PortRange { low: 90, high: 100 }],
            ..TrafficDescriptor::default()
        };
        let app = |port| AppDescriptor {
            remote_port: Some(port),
            ..AppDescriptor::default()
        };
        assert!(match_traffic(&descriptor, &app(95)).is_some());
        assert!(match_traffic(&descriptor, &app(80)).is_some());
        assert!(match_traffic(&descriptor, &app(85)).is_none());
        assert!(match_traffic(&descriptor, &AppDescriptor::default()).is_none());
    }

    #[test]
    fn address_matching() {
        let descriptor = TrafficDescriptor {
            ipv4: vec![Ipv4Match {
                addr: Ipv4Addr::new(10, 1, 0, 0),
                mask: Ipv4Addr::new(255, 255, 0, 0),
            }],
            ..TrafficDescriptor::default()
        };
        let app = AppDescriptor {
            ipv4: Some(Ipv4Addr::new(10, 1, 7, 9)),
            ..AppDescriptor::default()
        };
        assert!(match_traffic(&descriptor, &app).is_some());

        let rule_addr: Ipv6Addr = "2001:db8::1".parse().expect("合法地址");
        let descriptor = TrafficDescriptor {
            ipv6: vec![Ipv6Match {
                addr: rule_addr,
                prefix_len: 64,
            }],
            ..TrafficDescriptor::default()
        };
        let same_prefix = AppDescriptor {
            ipv6: Some("2001:db8::2".parse().expect("合法地址")),
            ..AppDescriptor::default()
        };
        assert!(match_traffic(&descriptor, &same_prefix).is_none(), "IPv6 只比较完整地址");
        let exact = AppDescriptor {
            ipv6: Some(rule_addr),
            ..AppDescriptor::default()
        };
        assert!(match_traffic(&descriptor, &exact).is_some());
    }

    #[test]
    fn criteria_flags_and_unsupported_descriptors() {
        let descriptor = TrafficDescriptor {
            os_app_ids: vec![OsAppId {
                os_id: "any".into(),
                app_id: "com.example".into(),
            }],
            dnns: vec!["IMS".into()],
            connection_capabilities: [1].into_iter().collect(),
            ..TrafficDescriptor::default()
        };
        let app = AppDescriptor {
            dnn: "ims".into(),
            connection_capability: Some(1),
            ..AppDescriptor::default()
        }
        .with_raw_app_id("other-os#com.example");
        let flags = match_traffic(&descriptor, &app).expect("应命中");
        assert!(flags.contains(RouteFlag::DnnMatched));
        assert!(flags.contains(RouteFlag::CctMatched));
        assert!(!flags.contains(RouteFlag::FqdnMatched));

        let unsupported = TrafficDescriptor {
            unsupported: true,
            ..TrafficDescriptor::match_all()
        };
        assert!(match_traffic(&unsupported, &app).is_none());
    }

    #[test]
    fn ip_three_tuple_membership() {
        let (_, registry) = registry(&[]);
        let matcher = PolicyMatcher::new(&registry, &NoForbiddenRoutes);
        let rules = RuleSet::from_rules(vec![
            rule(
                1,
                TrafficDescriptor {
                    ipv4: vec![Ipv4Match {
                        addr: Ipv4Addr::new(192, 168, 0, 0),
                        mask: Ipv4Addr::new(255, 255, 255, 0),
                    }],
                    protocol_ids: [6].into_iter().collect(),
                    single_ports: [443].into_iter().collect(),
                    dnns: vec!["video".into()],
                    ..TrafficDescriptor::default()
                },
                vec![route(1, vec![], &[])],
            ),
            rule(
                2,
                TrafficDescriptor {
                    dnns: vec!["ims".into()],
                    ..TrafficDescriptor::default()
                },
                vec![route(1, vec![], &[])],
            ),
            rule(255, TrafficDescriptor::match_all(), vec![route(1, vec![], &[])]),
        ]);
        let flow = |addr: Ipv4Addr, protocol: u8, port: u16| AppDescriptor {
            ipv4: Some(addr),
            protocol_id: Some(protocol),
            remote_port: Some(port),
            ..AppDescriptor::default()
        };

        assert!(
            matcher.ip_three_tuple_listed(&rules, &flow(Ipv4Addr::new(192, 168, 0, 7), 6, 443)),
            "三元组全部命中时应列出，DNN 条件不参与"
        );
        assert!(!matcher.ip_three_tuple_listed(&rules, &flow(Ipv4Addr::new(192, 168, 1, 7), 6, 443)));
        assert!(!matcher.ip_three_tuple_listed(&rules, &flow(Ipv4Addr::new(192, 168, 0, 7), 17, 443)));
        assert!(!matcher.ip_three_tuple_listed(&rules, &flow(Ipv4Addr::new(192, 168, 0, 7), 6, 80)));
        assert!(
            !matcher.ip_three_tuple_listed(&rules, &AppDescriptor::default()),
            "match-all 与只有 DNN 条件的规则不算列出"
        );
    }

    #[test]
    fn forbidden_dnn_falls_through_to_next_dnn() {
        let (_, registry) = registry(&[]);
        let forbidden = ForbidDnn("ims");
        let matcher = PolicyMatcher::new(&registry, &forbidden);
        let routes = [route(1, vec![], &["ims", "xcap"])];
        let choice = matcher.select_within_rule(&routes).expect("第二个 DNN 可用");
        assert_eq!(choice.dnn, "xcap");
    }

    #[test]
    fn rule_without_usable_route_continues_to_next_rule() {
        let slice = SliceIdentifier::from_parts(1, None, None, None);
        let (_, registry) = registry(&[]);
        let rules = RuleSet::from_rules(vec![
            rule(1, TrafficDescriptor::match_all(), vec![route(1, vec![slice], &[])]),
            rule(2, TrafficDescriptor::match_all(), vec![route(1, vec![], &["internet"])]),
        ]);
        let matcher = PolicyMatcher::new(&registry, &NoForbiddenRoutes);
        let selected = matcher
            .select_route(&rules, &AppDescriptor::default())
            .expect("第二条规则可用");
        assert_eq!(selected.ursp_precedence, 2);
        assert_eq!(selected.dnn, "internet");
    }

    #[test]
    fn match_all_route_flags() {
        let slice = SliceIdentifier::from_parts(1, None, None, None);
        let (radio, registry) = registry(&[slice.clone()]);
        let matcher = PolicyMatcher::new(&registry, &NoForbiddenRoutes);
        assert_eq!(matcher.match_all_route(None), SelectedRoute::default());

        let not_match_all = RuleSet::from_rules(vec![rule(
            1,
            TrafficDescriptor {
                dnns: vec!["ims".into()],
                ..TrafficDescriptor::default()
            },
            vec![route(1, vec![], &[])],
        )]);
        let result = matcher.match_all_route(Some(&not_match_all));
        assert_eq!(result.route_bitmap.bits(), 0x08);

        let rules = RuleSet::from_rules(vec![rule(
            255,
            TrafficDescriptor::match_all(),
            vec![route(1, vec![slice], &["internet"])],
        )]);
        let result = matcher.match_all_route(Some(&rules));
        assert_eq!(result.route_bitmap.bits(), 0x09);
        assert_eq!(result.slice, "01");
        assert_eq!(result.dnn, "internet");
        assert_eq!(result.ursp_precedence, 255);

        radio.set_roaming(true);
        let roaming = matcher.match_all_route(Some(&rules));
        assert_eq!(roaming.route_bitmap.bits(), 0x08, "漫游时切片不可用");
    }

    proptest! {
        #[test]
        fn selection_is_idempotent(port in any::<u16>(), protocol in any::<u8>(), cct in 0u8..16) {
            let (_, registry) = registry(&[]);
            let rules = RuleSet::from_rules(vec![
                rule(1, TrafficDescriptor {
                    single_ports: [443].into_iter().collect(),
                    port_ranges: vec![PortRange { low: 1000, high: 2000 }],
                    ..TrafficDescriptor::default()
                }, vec![route(1, vec![], &["web"])]),
                rule(2, TrafficDescriptor {
                    protocol_ids: [17].into_iter().collect(),
                    ..TrafficDescriptor::default()
                }, vec![route(1, vec![], &[])]),
                rule(3, TrafficDescriptor {
                    connection_capabilities: [1, 8].into_iter().collect(),
                    ..TrafficDescriptor::default()
                }, vec![route(1, vec![], &["ims"])]),
            ]);
            let app = AppDescriptor {
                remote_port: Some(port),
                protocol_id: Some(protocol),
                connection_capability: Some(cct),
                ..AppDescriptor::default()
            };
            let matcher = PolicyMatcher::new(&registry, &NoForbiddenRoutes);
            let first = matcher.select_route(&rules, &app);
            let second = matcher.select_route(&rules, &app);
            prop_assert_eq!(first, second);
        }
    }
}
