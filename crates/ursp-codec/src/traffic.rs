//! 流量描述符解码。
//!
//! # 契约说明（What）
//! - 输入为流量描述符长度字段圈定的子游标，组件逐个读取直至耗尽；
//! - 组件越界为致命的 [`DecodeError::Truncated`]；
//! - 未知类型码不致命：描述符被标记为 `unsupported`，剩余字节丢弃；
//! - 旧线路版本遇到 FQDN 组件报 [`DecodeError::StructuralMismatch`]。

use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::debug;
use ursp_core::{DecodeError, Ipv4Match, Ipv6Match, OsAppId, PortRange, TrafficDescriptor};

use crate::cursor::Cursor;
use crate::labels::read_labelled;
use crate::version::WireVersion;

/// 流量描述符组件类型码。
pub mod component {
    /// match-all。
    pub const MATCH_ALL: u8 = 0x01;
    /// OS Id + OS App Id。
    pub const OS_ID_OS_APP_ID: u8 = 0x08;
    /// IPv4 地址 + 掩码。
    pub const IPV4: u8 = 0x10;
    /// IPv6 地址 + 前缀长度。
    pub const IPV6: u8 = 0x21;
    /// 协议号。
    pub const PROTOCOL_ID: u8 = 0x30;
    /// 单个远端端口。
    pub const SINGLE_PORT: u8 = 0x50;
    /// 远端端口区间。
    pub const PORT_RANGE: u8 = 0x51;
    /// DNN。
    pub const DNN: u8 = 0x88;
    /// 连接能力列表。
    pub const CONNECTION_CAPABILITIES: u8 = 0x90;
    /// FQDN，仅新线路版本。
    pub const FQDN: u8 = 0x91;
    /// 仅 OS App Id。
    pub const OS_APP_ID: u8 = 0xA0;
}

const CONTEXT: &str = "traffic-descriptor";

/// 解码一个流量描述符。
pub fn decode_traffic_descriptor(
    cursor: &mut Cursor<'_>,
    version: WireVersion,
) -> Result<TrafficDescriptor, DecodeError> {
    let mut td = TrafficDescriptor::default();
    while !cursor.is_empty() {
        let code = cursor.read_u8()?;
        match decode_component(code, cursor, version, &mut td) {
            Ok(()) => {}
            Err(DecodeError::UnknownIdentifier { code, .. }) => {
                debug!(code, skipped = cursor.remaining(), "unknown traffic descriptor component");
                td.unsupported = true;
                cursor.skip_rest();
            }
            Err(err) => return Err(err),
        }
    }
    Ok(td)
}

fn decode_component(
    code: u8,
    cursor: &mut Cursor<'_>,
    version: WireVersion,
    td: &mut TrafficDescriptor,
) -> Result<(), DecodeError> {
    match code {
        component::MATCH_ALL => td.match_all = true,
        component::OS_ID_OS_APP_ID => {
            let os_id = hex::encode(cursor.read_bytes(16)?);
            let app_id = read_short_string(cursor)?;
            td.os_app_ids.push(OsAppId { os_id, app_id });
        }
        component::OS_APP_ID => {
            let app_id = read_short_string(cursor)?;
            td.os_app_ids.push(OsAppId {
                os_id: String::new(),
                app_id,
            });
        }
        component::IPV4 => {
            let addr = Ipv4Addr::from(cursor.read_array::<4>()?);
            let mask = Ipv4Addr::from(cursor.read_array::<4>()?);
            td.ipv4.push(Ipv4Match { addr, mask });
        }
        component::IPV6 => {
            let addr = Ipv6Addr::from(cursor.read_array::<16>()?);
            let prefix_len = cursor.read_u8()?;
            td.ipv6.push(Ipv6Match { addr, prefix_len });
        }
        component::PROTOCOL_ID => {
            td.protocol_ids.insert(cursor.read_u8()?);
        }
        component::SINGLE_PORT => {
            td.single_ports.insert(cursor.read_u16()?);
        }
        component::PORT_RANGE => {
            let low = cursor.read_u16()?;
            let high = cursor.read_u16()?;
            td.port_ranges.push(PortRange { low, high });
        }
        component::DNN => td.dnns.push(read_labelled(cursor, "traffic-descriptor.dnn")?),
        component::CONNECTION_CAPABILITIES => {
            let len = usize::from(cursor.read_u8()?);
            td.connection_capabilities
                .extend(cursor.read_bytes(len)?.iter().copied());
        }
        component::FQDN => {
            if !version.allows_fqdn() {
                return Err(DecodeError::StructuralMismatch {
                    context: CONTEXT,
                    reason: "fqdn is not defined for the old wire version",
                });
            }
            td.fqdns.push(read_labelled(cursor, "traffic-descriptor.fqdn")?);
        }
        code => {
            return Err(DecodeError::UnknownIdentifier {
                context: CONTEXT,
                code,
            });
        }
    }
    Ok(())
}

fn read_short_string(cursor: &mut Cursor<'_>) -> Result<String, DecodeError> {
    let len = usize::from(cursor.read_u8()?);
    Ok(String::from_utf8_lossy(cursor.read_bytes(len)?).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8], version: WireVersion) -> Result<TrafficDescriptor, DecodeError> {
        let mut cursor = Cursor::new(bytes, CONTEXT);
        decode_traffic_descriptor(&mut cursor, version)
    }

    #[test]
    fn mixed_components() {
        let mut bytes = vec![component::IPV4, 10, 0, 0, 1, 255, 255, 255, 0];
        bytes.extend_from_slice(&[component::PROTOCOL_ID, 6]);
        bytes.extend_from_slice(&[component::SINGLE_PORT, 0x00, 0x50]);
        bytes.extend_from_slice(&[component::PORT_RANGE, 0x00, 0x5A, 0x00, 0x64]);
        bytes.extend_from_slice(&[component::OS_APP_ID, 3, b'a', b'p', b'p']);
        bytes.extend_from_slice(&[component::CONNECTION_CAPABILITIES, 2, 0x01, 0x08]);
        let td = decode(&bytes, WireVersion::V1520).expect("合法描述符");
        assert_eq!(td.ipv4[0].addr, Ipv4Addr::new(10, 0, 0, 1));
        assert!(td.protocol_ids.contains(&6));
        assert!(td.single_ports.contains(&80));
        assert_eq!(td.port_ranges, vec![PortRange { low: 90, high: 100 }]);
        assert_eq!(td.os_app_ids[0].app_id, "app");
        assert!(td.targets_ims());
        assert!(!td.unsupported);
    }

    #[test]
    fn os_id_is_hex_encoded() {
        let mut bytes = vec![component::OS_ID_OS_APP_ID];
        bytes.extend_from_slice(&[0xAB; 16]);
        bytes.extend_from_slice(&[1, b'x']);
        let td = decode(&bytes, WireVersion::V1510).expect("合法描述符");
        assert_eq!(td.os_app_ids[0].os_id, "ab".repeat(16));
        assert_eq!(td.os_app_ids[0].app_id, "x");
    }

    #[test]
    fn unknown_component_marks_descriptor_unsupported() {
        let bytes = [component::MATCH_ALL, 0x77, 0xFF, 0xFF, 0xFF];
        let td = decode(&bytes, WireVersion::V1520).expect("未知组件不致命");
        assert!(td.match_all);
        assert!(td.unsupported);
    }

    #[test]
    fn fqdn_is_structural_error_in_old_version() {
        let bytes = [component::FQDN, 0x02, 0x01, b'a'];
        assert!(matches!(
            decode(&bytes, WireVersion::V1510),
            Err(DecodeError::StructuralMismatch { .. })
        ));
        let td = decode(&bytes, WireVersion::V1520).expect("新版本支持 FQDN");
        assert_eq!(td.fqdns, vec!["a".to_owned()]);
    }

    #[test]
    fn short_component_is_truncated() {
        let bytes = [component::IPV6, 0x20, 0x01];
        assert!(matches!(
            decode(&bytes, WireVersion::V1520),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
