//! IMS 路由描述符定长编码（RouteDescriptorEncoder）。
//!
//! # 设计动机（Why）
//! - IMS 业务需要在常规匹配之前把候选路由预先交给调制解调器；下游按定长结构解析，
//!   因此每个槽位即使未使用也必须零填充，容量上限必须严格截断。
//!
//! # 契约说明（What）
//! - 消息头：`version u16 | totalLength u16 | ruleCount u32`，`totalLength` 计算 `ruleCount` 字段与
//!   三个记录槽位的字节数；
//! - 记录（269 字节）：`precedence u8 | 3 保留 | sscModePresent u8 | sscMode u8 | pduSessionType u8 |
//!   2 保留 | dnnCount u32 | 2×(len u8 + 99 字节) | sliceCount u32 | 3×(bitmap u32, sst u8,
//!   mappedSst u8, 2 保留, sd u32, mappedSd u32) | 4 保留`；
//! - 没有候选存活时只输出 `version u16 | 0u16` 的“删除”消息。
//!
//! # 执行逻辑（How）
//! 1. 每条 IMS 规则的每个路由成为一个候选，候选优先级取规则优先级；
//! 2. 按优先级降序稳定排序；
//! 3. 过滤：禁用的会话组合、未授权切片、被禁用的 DNN；
//! 4. 截断到 3 个后写出。

use tracing::debug;
use ursp_core::{
    AllowedSliceRegistry, ForbiddenQuery, ForbiddenRoutes, PolicyRule, RouteSelectionDescriptor,
    SliceIdentifier,
};

use crate::version::WireVersion;

/// 最多编码的路由数。
pub const MAX_ROUTES: usize = 3;
/// 每个路由最多的 DNN 数。
pub const MAX_DNNS: usize = 2;
/// 每个路由最多的切片数。
pub const MAX_SLICES: usize = 3;
/// DNN 标签槽宽。
pub const DNN_LABEL_WIDTH: usize = 99;
/// 单个切片槽字节数。
pub const SLICE_SLOT_LEN: usize = 16;
/// 单个记录字节数。
pub const RECORD_LEN: usize =
    4 + 3 + 2 + 4 + MAX_DNNS * (1 + DNN_LABEL_WIDTH) + 4 + MAX_SLICES * SLICE_SLOT_LEN + 4;

const SLICE_HAS_SD: u32 = 0x01;
const SLICE_HAS_MAPPED_SST: u32 = 0x02;
const SLICE_HAS_MAPPED_SD: u32 = 0x04;

/// 过滤后待编码的单个路由。
#[derive(Clone, Debug, Eq, PartialEq)]
struct Candidate {
    precedence: u8,
    ssc_mode: Option<u8>,
    pdu_code: Option<u8>,
    dnns: Vec<String>,
    slices: Vec<SliceIdentifier>,
}

/// 编码 IMS 路由列表。
pub fn encode<'r>(
    version: WireVersion,
    ims_rules: impl IntoIterator<Item = &'r PolicyRule>,
    registry: &AllowedSliceRegistry,
    forbidden: &dyn ForbiddenRoutes,
) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(version, ims_rules, registry, forbidden, &mut out);
    out
}

/// 把 IMS 路由列表追加写入 `out`。
pub fn encode_into<'r>(
    version: WireVersion,
    ims_rules: impl IntoIterator<Item = &'r PolicyRule>,
    registry: &AllowedSliceRegistry,
    forbidden: &dyn ForbiddenRoutes,
    out: &mut Vec<u8>,
) {
    let mut flattened: Vec<(u8, &RouteSelectionDescriptor)> = ims_rules
        .into_iter()
        .flat_map(|rule| rule.routes.iter().map(move |route| (rule.precedence, route)))
        .collect();
    flattened.sort_by(|a, b| b.0.cmp(&a.0));

    let survivors: Vec<Candidate> = flattened
        .into_iter()
        .filter_map(|(precedence, route)| filter_route(precedence, route, registry, forbidden))
        .take(MAX_ROUTES)
        .collect();

    out.extend_from_slice(&version.code().to_be_bytes());
    if survivors.is_empty() {
        debug!("no ims route survives filtering, emitting delete message");
        out.extend_from_slice(&0u16.to_be_bytes());
        return;
    }

    let total_len = (4 + MAX_ROUTES * RECORD_LEN) as u16;
    out.extend_from_slice(&total_len.to_be_bytes());
    out.extend_from_slice(&(survivors.len() as u32).to_be_bytes());
    for slot in 0..MAX_ROUTES {
        match survivors.get(slot) {
            Some(candidate) => write_record(candidate, out),
            None => out.resize(out.len() + RECORD_LEN, 0),
        }
    }
    debug!(routes = survivors.len(), "ims route list encoded");
}

fn filter_route(
    precedence: u8,
    route: &RouteSelectionDescriptor,
    registry: &AllowedSliceRegistry,
    forbidden: &dyn ForbiddenRoutes,
) -> Option<Candidate> {
    let session = ForbiddenQuery::session(route.pdu_session_type, route.ssc_mode);
    if forbidden.is_forbidden(&session) {
        return None;
    }

    let slices: Vec<SliceIdentifier> = route
        .slices
        .iter()
        .filter(|slice| registry.contains(slice))
        .cloned()
        .collect();
    if !route.slices.is_empty() && slices.is_empty() {
        return None;
    }

    let slice_text = slices.first().map(SliceIdentifier::text).unwrap_or_default();
    let dnns: Vec<String> = route
        .dnns
        .iter()
        .filter(|dnn| !forbidden.is_forbidden(&session.with_target(slice_text, dnn)))
        .cloned()
        .collect();
    if !route.dnns.is_empty() && dnns.is_empty() {
        return None;
    }

    Some(Candidate {
        precedence,
        ssc_mode: route.ssc_mode,
        pdu_code: route.pdu_session_type.map(|kind| kind.wire_code()),
        dnns,
        slices,
    })
}

fn write_record(candidate: &Candidate, out: &mut Vec<u8>) {
    let start = out.len();
    out.push(candidate.precedence);
    out.extend_from_slice(&[0; 3]);
    out.push(u8::from(candidate.ssc_mode.is_some()));
    out.push(candidate.ssc_mode.unwrap_or(0));
    out.push(candidate.pdu_code.unwrap_or(0));
    out.extend_from_slice(&[0; 2]);

    let dnns = &candidate.dnns[..candidate.dnns.len().min(MAX_DNNS)];
    out.extend_from_slice(&(dnns.len() as u32).to_be_bytes());
    for slot in 0..MAX_DNNS {
        let label = dnns.get(slot).map(String::as_bytes).unwrap_or_default();
        let label = &label[..label.len().min(DNN_LABEL_WIDTH)];
        out.push(label.len() as u8);
        out.extend_from_slice(label);
        out.resize(out.len() + DNN_LABEL_WIDTH - label.len(), 0);
    }

    let slices = &candidate.slices[..candidate.slices.len().min(MAX_SLICES)];
    out.extend_from_slice(&(slices.len() as u32).to_be_bytes());
    for slot in 0..MAX_SLICES {
        match slices.get(slot) {
            Some(slice) => write_slice(slice, out),
            None => out.resize(out.len() + SLICE_SLOT_LEN, 0),
        }
    }
    out.extend_from_slice(&[0; 4]);
    debug_assert_eq!(out.len() - start, RECORD_LEN);
}

fn write_slice(slice: &SliceIdentifier, out: &mut Vec<u8>) {
    let mut bitmap = 0u32;
    if slice.sd().is_some() {
        bitmap |= SLICE_HAS_SD;
    }
    if slice.mapped_sst().is_some() {
        bitmap |= SLICE_HAS_MAPPED_SST;
    }
    if slice.mapped_sd().is_some() {
        bitmap |= SLICE_HAS_MAPPED_SD;
    }
    out.extend_from_slice(&bitmap.to_be_bytes());
    out.push(slice.sst());
    out.push(slice.mapped_sst().unwrap_or(0));
    out.extend_from_slice(&[0; 2]);
    out.extend_from_slice(&slice.sd().unwrap_or(0).to_be_bytes());
    out.extend_from_slice(&slice.mapped_sd().unwrap_or(0).to_be_bytes());
}
