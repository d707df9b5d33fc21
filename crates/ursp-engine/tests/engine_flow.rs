//! 事件流端到端测试：从调制解调器分段推送到回送消息与选路结果。

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use tracing_test::traced_test;
use ursp_codec::route::component as rsd;
use ursp_codec::traffic::component as td;
use ursp_core::{
    AppDescriptor, PduSessionType, PolicyRule, RouteFlag, RouteSelectionDescriptor, RuleSet,
    TrafficDescriptor,
};
use ursp_engine::{
    EngineConfig, ForbiddenRoute, Outbound, SliceEngine, SliceEvent, UrspUpdate,
};
use ursp_profile::LoadedProfile;

const HOME: [u8; 3] = [0x00, 0xF1, 0x10];
const FOREIGN: [u8; 3] = [0x64, 0xF0, 0x10];
const V1520: [u8; 2] = [0x05, 0xF0];

fn prefixed(body: &[u8]) -> Vec<u8> {
    let mut out = (body.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

fn route(precedence: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = ((3 + contents.len()) as u16).to_be_bytes().to_vec();
    out.push(precedence);
    out.extend(prefixed(contents));
    out
}

fn rule(precedence: u8, traffic: &[u8], routes: &[u8]) -> Vec<u8> {
    let mut body = vec![precedence];
    body.extend(prefixed(traffic));
    body.extend(prefixed(routes));
    prefixed(&body)
}

/// IMS 规则（优先级 1）加 match-all 规则（优先级 9）。
fn home_rules() -> Vec<u8> {
    let ims_route = route(
        1,
        &[rsd::SNSSAI, 1, 0x01, rsd::DNN, 4, 3, b'i', b'm', b's', rsd::SSC_MODE, 1],
    );
    let mut internet = vec![rsd::SNSSAI, 1, 0x01, rsd::DNN, 9, 8];
    internet.extend_from_slice(b"internet");
    internet.extend_from_slice(&[rsd::PDU_SESSION_TYPE, 0x01]);

    let mut rules = rule(1, &[td::DNN, 4, 3, b'i', b'm', b's'], &ims_route);
    rules.extend(rule(9, &[td::MATCH_ALL], &route(1, &internet)));
    rules
}

type Instructions = Vec<(u16, Option<Vec<u8>>)>;

fn command(pti: u8, sections: &[([u8; 3], Instructions)]) -> Vec<u8> {
    let mut list = Vec::new();
    for (plmn, instructions) in sections {
        let mut section = plmn.to_vec();
        for (upsc, ursp) in instructions {
            let mut instruction = upsc.to_be_bytes().to_vec();
            let part = match ursp {
                Some(rules) => {
                    let mut part = vec![0x01];
                    part.extend_from_slice(rules);
                    part
                }
                None => vec![0x02, 0xAA],
            };
            instruction.extend(prefixed(&part));
            section.extend(prefixed(&instruction));
        }
        list.extend(prefixed(&section));
    }
    let mut out = V1520.to_vec();
    out.extend_from_slice(&[pti, 0x01]);
    out.extend(prefixed(&list));
    out
}

fn single_segment(pti: u8, payload: &[u8]) -> SliceEvent {
    let mut buffer = vec![pti, 1, 1];
    buffer.extend_from_slice(payload);
    SliceEvent::UrspPush(buffer)
}

fn engine_with_allowed(config: EngineConfig) -> SliceEngine {
    let engine = SliceEngine::new(config);
    assert!(engine.handle(SliceEvent::AllowedNssaiPush(b"01".to_vec())).is_empty());
    engine
}

fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ursp-engine-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("创建临时目录");
    dir.join("ue_policy.json")
}

#[test]
#[traced_test]
fn accepted_command_answers_in_order_and_publishes() {
    let engine = engine_with_allowed(EngineConfig::default());
    let payload = command(7, &[(HOME, vec![(1, Some(home_rules()))])]);
    let outbound = engine.handle(single_segment(7, &payload));

    assert_eq!(outbound.len(), 4, "COMPLETE、STATE INDICATION、IMS 列表、变更通知");
    assert_eq!(outbound[0], Outbound::DecodeResult(vec![7, 0]));
    assert_eq!(
        outbound[1],
        Outbound::UePolicySectionIdentifier(vec![
            0, 2, 0, 7, 0, 5, 0x00, 0xF1, 0x10, 0, 1, 1, 0, 0x05, 0xF0
        ])
    );
    match &outbound[2] {
        Outbound::ImsRsdList(bytes) => assert_eq!(bytes[..2], V1520, "IMS 列表以线路版本开头"),
        other => panic!("第三条应为 IMS 列表，实际为 {other:?}"),
    }
    let Outbound::UrspUpdated(UrspUpdate { route }) = &outbound[3] else {
        panic!("第四条应为变更通知");
    };
    assert_eq!(route.route_bitmap.bits(), 0x09);
    assert_eq!(route.slice, "01");
    assert_eq!(route.dnn, "internet");
    assert_eq!(route.ursp_precedence, 9);
    assert_eq!(route.pdu_session_type, Some(PduSessionType::Ipv4));

    let app = AppDescriptor {
        dnn: "IMS".to_owned(),
        ..AppDescriptor::default()
    };
    let selected = engine.select_route(&app).expect("IMS 业务应命中");
    assert_eq!(selected.dnn, "ims");
    assert_eq!(selected.slice, "01");
    assert_eq!(selected.ssc_mode, Some(1));
    assert!(selected.route_bitmap.contains(RouteFlag::DnnMatched));
    assert!(selected.route_bitmap.contains(RouteFlag::HasUrsp));
    assert!(logs_contain("ue policy command accepted"));
}

#[test]
fn segmented_push_is_handled_once_complete() {
    let engine = engine_with_allowed(EngineConfig::default());
    let payload = command(3, &[(HOME, vec![(1, Some(home_rules()))])]);
    let (head, tail) = payload.split_at(payload.len() / 2);

    let mut second = vec![3, 2, 2];
    second.extend_from_slice(tail);
    assert!(engine.handle(SliceEvent::UrspPush(second)).is_empty(), "未收齐时不回送");

    let mut first = vec![3, 2, 1];
    first.extend_from_slice(head);
    let outbound = engine.handle(SliceEvent::UrspPush(first));
    assert_eq!(outbound.first(), Some(&Outbound::DecodeResult(vec![3, 0])));
    assert!(engine.rules().get("00101").is_some());
}

#[test]
#[traced_test]
fn foreign_plmn_rejects_whole_command() {
    let engine = engine_with_allowed(EngineConfig::default());
    let payload = command(
        5,
        &[
            (HOME, vec![(1, Some(home_rules()))]),
            (FOREIGN, vec![(4, Some(home_rules())), (6, None)]),
        ],
    );
    let outbound = engine.handle(single_segment(5, &payload));

    assert_eq!(
        outbound,
        vec![Outbound::DecodeResult(vec![
            5, 1, 0, 9, 1, 0x64, 0xF0, 0x10, 0, 4, 0, 1, 0x6F
        ])],
        "只列出外网段中携带 URSP 的指令"
    );
    assert!(engine.policies().is_empty(), "拒绝时不合并任何段");
    assert!(engine.rules().get("00101").is_none());
    assert!(logs_contain("ue policy command rejected"));
}

#[test]
#[traced_test]
fn undecodable_command_sends_nothing() {
    let engine = engine_with_allowed(EngineConfig::default());
    let outbound = engine.handle(single_segment(2, &[0x05, 0xF0, 2, 0x01, 0x00, 0x09]));
    assert!(outbound.is_empty());
    assert!(engine.rules().snapshot().is_empty());
    assert!(logs_contain("ue policy command dropped"));
}

#[test]
fn instruction_without_ursp_deletes_and_empties_plmn() {
    let engine = engine_with_allowed(EngineConfig::default());
    engine.handle(single_segment(1, &command(1, &[(HOME, vec![(1, Some(home_rules()))])])));

    let outbound = engine.handle(single_segment(2, &command(2, &[(HOME, vec![(1, None)])])));
    assert_eq!(
        outbound,
        vec![
            Outbound::DecodeResult(vec![2, 0]),
            Outbound::UePolicySectionIdentifier(vec![0, 2, 0, 0, 1, 0, 0x05, 0xF0]),
            Outbound::UrspUpdated(UrspUpdate::default()),
        ],
        "空索引不回送 IMS 列表"
    );
    assert!(engine.policies().is_empty());
    assert!(engine.rules().get("00101").is_none());
}

#[test]
fn ehplmn_push_moves_home_network() {
    let engine = engine_with_allowed(EngineConfig::default());
    assert_eq!(engine.home_plmn(), "00101");
    engine.handle(SliceEvent::EhplmnPush(b"46001, 46002".to_vec()));
    assert_eq!(engine.home_plmn(), "46001");

    let outbound = engine.handle(single_segment(4, &command(4, &[(HOME, vec![(2, Some(home_rules()))])])));
    assert_eq!(outbound.len(), 1, "原归属网络此时是外网");
    assert!(matches!(&outbound[0], Outbound::DecodeResult(bytes) if bytes[1] == 1));
}

#[test]
fn normal_activation_failure_forbids_route() {
    let engine = engine_with_allowed(EngineConfig::default());
    engine.handle(single_segment(1, &command(1, &[(HOME, vec![(1, Some(home_rules()))])])));
    let app = AppDescriptor::default();
    assert_eq!(engine.select_route(&app).map(|route| route.dnn), Some("internet".to_owned()));

    let route = ForbiddenRoute {
        ssc_mode: None,
        pdu_session_type: Some(PduSessionType::Ipv4),
        slice: "01".to_owned(),
        dnn: "internet".to_owned(),
    };
    engine.handle(SliceEvent::ActivationResult {
        route: route.clone(),
        result: 0,
    });
    assert!(engine.forbidden().is_empty(), "非普通失败不记录");

    engine.handle(SliceEvent::ActivationResult { route, result: 1 });
    assert_eq!(engine.forbidden().len(), 1);
    assert_eq!(engine.select_route(&app), None, "唯一路由被禁用后不再命中");
}

#[test]
fn sim_absent_falls_back_to_profile_rules() {
    let engine = engine_with_allowed(EngineConfig::default());
    let profile_rule = PolicyRule {
        precedence: 50,
        traffic_descriptor: TrafficDescriptor::match_all(),
        routes: vec![RouteSelectionDescriptor {
            precedence: 1,
            dnns: vec!["profile".to_owned()],
            ..RouteSelectionDescriptor::default()
        }],
    };
    let profile = LoadedProfile {
        policies: BTreeMap::from([("00101".to_owned(), RuleSet::from_rules(vec![profile_rule]))]),
        ..LoadedProfile::default()
    };
    let outbound = engine.handle(SliceEvent::ProfileLoaded(profile));
    let [Outbound::UrspUpdated(update)] = outbound.as_slice() else {
        panic!("无 IMS 规则时只回送变更通知，实际为 {outbound:?}");
    };
    assert_eq!(update.route.dnn, "profile");
    assert_eq!(update.route.ursp_precedence, 50);

    engine.handle(single_segment(1, &command(1, &[(HOME, vec![(1, Some(home_rules()))])])));
    let last = |engine: &SliceEngine| {
        engine
            .rules()
            .get("00101")
            .and_then(|rules| rules.last().map(|rule| rule.precedence))
    };
    assert_eq!(last(&engine), Some(9), "网络下发覆盖静态配置");

    assert!(engine.handle(SliceEvent::SimAbsent).is_empty());
    assert!(engine.policies().is_empty());
    assert_eq!(last(&engine), Some(50), "移卡后回落到静态配置");
}

#[test]
fn policies_survive_restart_through_persistence_file() {
    let path = temp_path("restart");
    let config = EngineConfig {
        persistence_path: Some(path.clone()),
        ..EngineConfig::default()
    };

    let first = engine_with_allowed(config.clone());
    first.handle(single_segment(1, &command(1, &[(HOME, vec![(1, Some(home_rules()))])])));
    assert!(path.exists(), "接受命令后写入持久化文件");

    let restarted = engine_with_allowed(config);
    assert_eq!(restarted.policies().len(), 1);
    assert_eq!(
        restarted.match_all_route("00101").dnn,
        "internet",
        "重启后直接发布恢复的规则"
    );
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}

#[test]
fn configured_profile_is_loaded_from_disk() {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../ursp-profile/tests/fixtures/ursp_profile.xml");
    let config = EngineConfig::from_toml_str(&format!(
        "default_hplmn = \"46001\"\nprofile_path = {:?}\n",
        fixture.display().to_string()
    ))
    .expect("配置合法");
    let engine = SliceEngine::new(config);

    let outbound = engine.load_configured_profile().expect("夹具可加载");
    assert!(matches!(outbound.first(), Some(Outbound::ImsRsdList(_))));
    assert!(engine.rules().get("46001").is_some());
    assert!(engine.rules().get("310410").is_some());
    assert!(SliceEngine::new(EngineConfig::default())
        .load_configured_profile()
        .expect("未配置路径")
        .is_empty());
}

#[test]
fn route_for_dnn_reports_slice_and_ssc_mode() {
    let engine = engine_with_allowed(EngineConfig::default());
    assert_eq!(engine.route_for_dnn("ims"), None, "尚无规则时不应有结果");

    let payload = command(2, &[(HOME, vec![(1, Some(home_rules()))])]);
    assert!(!engine.handle(single_segment(2, &payload)).is_empty());

    assert_eq!(engine.route_for_dnn("IMS"), Some(("01".to_owned(), 1)));
    assert_eq!(
        engine.route_for_dnn("internet"),
        Some(("01".to_owned(), 0)),
        "未命中 DNN 规则时落到 match-all，未声明 SSC 模式取 0"
    );
}

#[test]
fn whitelist_and_three_tuple_follow_home_rules() {
    let engine = engine_with_allowed(EngineConfig::default());
    let flow = |third: u8, port: u16| AppDescriptor {
        ipv4: Some(Ipv4Addr::new(10, 0, third, 9)),
        protocol_id: Some(6),
        remote_port: Some(port),
        ..AppDescriptor::default()
    };
    assert!(engine.traffic_whitelist().is_empty());
    assert!(!engine.ip_three_tuple_listed(&flow(0, 443)));

    #[rustfmt::skip]
    let tuple_td = [
        td::IPV4, 10, 0, 0, 0, 255, 255, 255, 0,
        td::PROTOCOL_ID, 6,
        td::SINGLE_PORT, 0x01, 0xBB,
        td::OS_APP_ID, 3, b'a', b'p', b'p',
        td::CONNECTION_CAPABILITIES, 1, 0x08,
    ];
    let mut rules = home_rules();
    rules.extend(rule(5, &tuple_td, &route(1, &[rsd::SNSSAI, 1, 0x01, rsd::SSC_MODE, 2])));
    let payload = command(3, &[(HOME, vec![(1, Some(rules))])]);
    assert!(!engine.handle(single_segment(3, &payload)).is_empty());

    let whitelist = engine.traffic_whitelist();
    assert!(whitelist.contains_dnn("ims"));
    assert!(whitelist.contains_app("app"));
    let map = whitelist.to_string_map();
    assert_eq!(map["cct"], "internet");
    assert_eq!(map["dnns"], "ims", "match-all 规则不贡献条目");

    assert!(engine.ip_three_tuple_listed(&flow(0, 443)));
    assert!(!engine.ip_three_tuple_listed(&flow(1, 443)), "地址不在掩码内");
    assert!(!engine.ip_three_tuple_listed(&flow(0, 80)), "端口不符");

    assert!(engine.handle(SliceEvent::EhplmnPush(b"46001".to_vec())).is_empty());
    assert!(engine.traffic_whitelist().is_empty(), "归属网络变更后白名单随之重算");
    assert!(!engine.ip_three_tuple_listed(&flow(0, 443)));
}
