//! URSP 规则列表解码与版本回退。
//!
//! # 设计动机（Why）
//! - 调制解调器推送不声明规则区使用哪一线路版本，两个版本只在路由描述符长度宽度与 FQDN 上不同，
//!   只能“先按新版本试解，失败再按旧版本从同一起点重解”；
//! - 解码是纯函数：不做 I/O、不重试，失败时调用方保留此前的规则集。
//!
//! # 契约说明（What）
//! - 规则帧：`规则长度 u16 | 优先级 u8 | 流量描述符长度 u16 | 描述符 | 路由列表长度 u16 | 路由列表`；
//! - 流量描述符含未知组件：规则保留，描述符标记为不可命中；
//! - 路由列表解不出任何描述符：整条规则丢弃；
//! - 返回的 [`RuleSet`] 已按优先级排序。

use tracing::{debug, warn};
use ursp_core::{DecodeError, PolicyRule, RuleSet};

use crate::cursor::{Cursor, LengthWidth};
use crate::route::decode_route_list;
use crate::traffic::decode_traffic_descriptor;
use crate::version::WireVersion;

/// 回退解码成功的结果。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedRules {
    /// 解出的规则集。
    pub rules: RuleSet,
    /// 成功的线路版本。
    pub version: WireVersion,
}

/// 两个版本均失败。
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("ursp rules rejected by both wire versions (1520: {newer}; 1510: {older})")]
pub struct FallbackError {
    /// 新版本的失败原因。
    pub newer: DecodeError,
    /// 旧版本的失败原因。
    pub older: DecodeError,
}

/// 以指定版本解码整个规则区。
pub fn decode(buffer: &[u8], version: WireVersion) -> Result<RuleSet, DecodeError> {
    let mut cursor = Cursor::new(buffer, "ursp-rule-list");
    let mut rules = Vec::new();
    while !cursor.is_empty() {
        let mut record = cursor.split_prefixed(LengthWidth::Two, "ursp-rule")?;
        if let Some(rule) = decode_rule(&mut record, version)? {
            rules.push(rule);
        }
    }
    Ok(RuleSet::from_rules(rules))
}

/// 按 [`WireVersion::TRIAL_ORDER`] 逐个版本解码，返回首个成功的结果。
pub fn decode_with_fallback(buffer: &[u8]) -> Result<DecodedRules, FallbackError> {
    let [newer_version, older_version] = WireVersion::TRIAL_ORDER;
    let attempt = |version: WireVersion| {
        decode(buffer, version).map(|rules| DecodedRules { rules, version })
    };

    let newer = match attempt(newer_version) {
        Ok(decoded) => return Ok(decoded),
        Err(err) => err,
    };
    debug!(
        failed = newer_version.code(),
        retry = older_version.code(),
        error = %newer,
        "ursp decode failed, retrying with older wire version"
    );

    attempt(older_version).map_err(|older| {
        warn!(
            len = buffer.len(),
            head = %hex::encode(&buffer[..buffer.len().min(16)]),
            "ursp rules rejected by both wire versions"
        );
        FallbackError { newer, older }
    })
}

fn decode_rule(
    record: &mut Cursor<'_>,
    version: WireVersion,
) -> Result<Option<PolicyRule>, DecodeError> {
    let precedence = record.read_u8()?;
    let mut td_cursor = record.split_prefixed(LengthWidth::Two, "traffic-descriptor")?;
    let traffic_descriptor = decode_traffic_descriptor(&mut td_cursor, version)?;
    let mut routes_cursor = record.split_prefixed(LengthWidth::Two, "route-selection-descriptor-list")?;
    let routes = decode_route_list(&mut routes_cursor, version)?;
    if !record.is_empty() {
        debug!(
            precedence,
            offset = record.position(),
            trailing = record.remaining(),
            "ignoring trailing bytes after ursp rule"
        );
    }

    if routes.is_empty() {
        debug!(precedence, "dropping ursp rule without usable route descriptors");
        return Ok(None);
    }
    Ok(Some(PolicyRule {
        precedence,
        traffic_descriptor,
        routes,
    }))
}
