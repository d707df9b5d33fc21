//! 组件属性文本到模型字段的转换。
//!
//! # 契约说明（What）
//! - `typeIdentifier` 接受十进制或 `0x` 前缀十六进制，码表与二进制线路一致；
//! - 每种组件的取值文法见各分支；解析失败返回 [`ProfileError::InvalidValue`]，由调用方跳过整条规则；
//! - 首选接入类型为 non-3GPP 时返回 `Ok(false)`，调用方只丢弃当前路由描述符。

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ursp_codec::route::{ACCESS_TYPE_NON_3GPP, component as rsd};
use ursp_codec::traffic::component as td;
use ursp_core::{
    ConnectionCapability, Flag, Ipv4Match, Ipv6Match, OsAppId, PduSessionType, PortRange,
    RouteSelectionDescriptor, SliceIdentifier, TrafficDescriptor,
};

use crate::error::ProfileError;

/// 解析 `typeIdentifier`。
pub fn parse_type_identifier(raw: &str) -> Result<u8, ProfileError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse::<u8>(),
    };
    parsed.map_err(|_| ProfileError::invalid("typeIdentifier", raw))
}

/// 把一个流量描述符组件合并进描述符。
pub fn apply_traffic_component(
    descriptor: &mut TrafficDescriptor,
    code: u8,
    value: &str,
) -> Result<(), ProfileError> {
    let value = value.trim();
    match code {
        td::MATCH_ALL => descriptor.match_all = true,
        td::OS_ID_OS_APP_ID | td::OS_APP_ID => {
            let id = match value.split_once('#') {
                Some((os_id, app_id)) => OsAppId {
                    os_id: os_id.to_owned(),
                    app_id: app_id.to_owned(),
                },
                None => OsAppId {
                    os_id: String::new(),
                    app_id: value.to_owned(),
                },
            };
            descriptor.os_app_ids.push(id);
        }
        td::IPV4 => {
            let (addr, mask) = value
                .split_once('/')
                .ok_or_else(|| ProfileError::invalid("ipv4", value))?;
            descriptor.ipv4.push(Ipv4Match {
                addr: parse_number::<Ipv4Addr>("ipv4 address", addr)?,
                mask: parse_number::<Ipv4Addr>("ipv4 mask", mask)?,
            });
        }
        td::IPV6 => {
            let (addr, prefix_len) = value
                .split_once('/')
                .ok_or_else(|| ProfileError::invalid("ipv6", value))?;
            let prefix_len = parse_number::<u8>("ipv6 prefix", prefix_len)?;
            if prefix_len > 128 {
                return Err(ProfileError::invalid("ipv6 prefix", value));
            }
            descriptor.ipv6.push(Ipv6Match {
                addr: parse_number::<Ipv6Addr>("ipv6 address", addr)?,
                prefix_len,
            });
        }
        td::PROTOCOL_ID => {
            descriptor.protocol_ids.insert(parse_number("protocol id", value)?);
        }
        td::SINGLE_PORT => {
            descriptor.single_ports.insert(parse_number("remote port", value)?);
        }
        td::PORT_RANGE => {
            let (low, high) = value
                .split_once('-')
                .ok_or_else(|| ProfileError::invalid("port range", value))?;
            let range = PortRange {
                low: parse_number("port range", low)?,
                high: parse_number("port range", high)?,
            };
            if range.low > range.high {
                return Err(ProfileError::invalid("port range", value));
            }
            descriptor.port_ranges.push(range);
        }
        td::DNN => descriptor.dnns.push(non_empty("dnn", value)?),
        td::FQDN => descriptor.fqdns.push(non_empty("fqdn", value)?),
        td::CONNECTION_CAPABILITIES => {
            for entry in value.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
                let code = match ConnectionCapability::from_name(entry) {
                    Some(capability) => capability.bit(),
                    None => parse_number("connection capability", entry)?,
                };
                descriptor.connection_capabilities.insert(code);
            }
        }
        code => {
            return Err(ProfileError::UnknownComponent {
                context: "traffic-descriptor",
                code,
            });
        }
    }
    Ok(())
}

/// 把一个路由组件合并进描述符；返回 `false` 表示该描述符应被丢弃。
pub fn apply_route_component(
    route: &mut RouteSelectionDescriptor,
    code: u8,
    value: &str,
) -> Result<bool, ProfileError> {
    let value = value.trim();
    match code {
        rsd::SSC_MODE => {
            let mode: u8 = parse_number("ssc mode", value)?;
            if mode > 0x07 {
                return Err(ProfileError::invalid("ssc mode", value));
            }
            route.ssc_mode = Some(mode);
        }
        rsd::SNSSAI => route.slices.push(parse_slice(value)?),
        rsd::DNN => route.dnns.push(non_empty("dnn", value)?),
        rsd::PDU_SESSION_TYPE => route.pdu_session_type = Some(parse_pdu_session_type(value)?),
        rsd::PREFERRED_ACCESS_TYPE => {
            let access: u8 = parse_number("preferred access type", value)?;
            if access == ACCESS_TYPE_NON_3GPP {
                return Ok(false);
            }
        }
        rsd::NON_3GPP_OFFLOAD => {}
        code => {
            return Err(ProfileError::UnknownComponent {
                context: "route-selection-descriptor",
                code,
            });
        }
    }
    Ok(true)
}

/// 首个 `;` 之前的条目按 Allowed NSSAI 文法解析，文本形式取规范形式。
fn parse_slice(value: &str) -> Result<SliceIdentifier, ProfileError> {
    let entry = value.split(';').next().unwrap_or_default();
    let parsed =
        SliceIdentifier::parse_text(entry).map_err(|_| ProfileError::invalid("s-nssai", value))?;
    Ok(SliceIdentifier::from_parts(
        parsed.sst(),
        parsed.sd(),
        parsed.mapped_sst(),
        parsed.mapped_sd(),
    ))
}

fn parse_pdu_session_type(value: &str) -> Result<PduSessionType, ProfileError> {
    const NAMES: [(&str, PduSessionType); 5] = [
        ("ipv4", PduSessionType::Ipv4),
        ("ipv6", PduSessionType::Ipv6),
        ("ipv4v6", PduSessionType::Ipv4v6),
        ("unstructured", PduSessionType::Unstructured),
        ("ethernet", PduSessionType::Ethernet),
    ];
    if let Some((_, kind)) = NAMES.iter().find(|(name, _)| name.eq_ignore_ascii_case(value)) {
        return Ok(*kind);
    }
    parse_number::<u8>("pdu session type", value).map(PduSessionType::from_wire)
}

fn parse_number<T: FromStr>(what: &'static str, value: &str) -> Result<T, ProfileError> {
    value
        .trim()
        .parse()
        .map_err(|_| ProfileError::invalid(what, value))
}

fn non_empty(what: &'static str, value: &str) -> Result<String, ProfileError> {
    if value.is_empty() {
        Err(ProfileError::invalid(what, value))
    } else {
        Ok(value.to_owned())
    }
}
