//! 路由选择描述符列表解码。
//!
//! # 契约说明（What）
//! - 每个描述符的帧为 `长度 | 优先级 u8 | 内容长度 | 内容`，长度字段宽度随线路版本变化；
//! - 未知组件类型，或首选接入类型为 non-3GPP（`0x10`），只丢弃当前描述符，其余描述符照常解码；
//! - 越界与切片长度非法对整个版本尝试是致命的。

use tracing::debug;
use ursp_core::{DecodeError, PduSessionType, RouteSelectionDescriptor, SliceIdentifier};

use crate::cursor::Cursor;
use crate::labels::read_labelled;
use crate::version::WireVersion;

/// 路由选择描述符组件类型码。
pub mod component {
    /// SSC 模式。
    pub const SSC_MODE: u8 = 1;
    /// S-NSSAI。
    pub const SNSSAI: u8 = 2;
    /// DNN。
    pub const DNN: u8 = 4;
    /// PDU 会话类型。
    pub const PDU_SESSION_TYPE: u8 = 8;
    /// 首选接入类型。
    pub const PREFERRED_ACCESS_TYPE: u8 = 16;
    /// non-3GPP 卸载指示，无载荷。
    pub const NON_3GPP_OFFLOAD: u8 = 32;
}

/// 首选接入类型中表示 non-3GPP 的取值。
pub const ACCESS_TYPE_NON_3GPP: u8 = 0x10;

const CONTEXT: &str = "route-selection-descriptor";

/// 解码路由列表；被丢弃的描述符不出现在结果中。
pub fn decode_route_list(
    cursor: &mut Cursor<'_>,
    version: WireVersion,
) -> Result<Vec<RouteSelectionDescriptor>, DecodeError> {
    let width = version.route_length_width();
    let mut routes = Vec::new();
    while !cursor.is_empty() {
        let mut record = cursor.split_prefixed(width, CONTEXT)?;
        let precedence = record.read_u8()?;
        let mut contents = record.split_prefixed(width, "route-selection-descriptor.contents")?;
        if !record.is_empty() {
            debug!(
                precedence,
                offset = record.position(),
                trailing = record.remaining(),
                "ignoring trailing bytes after route selection descriptor"
            );
        }
        match decode_route_contents(&mut contents) {
            Ok(mut route) => {
                route.precedence = precedence;
                routes.push(route);
            }
            Err(DecodeError::UnknownIdentifier { code, .. }) => {
                debug!(precedence, code, "dropping route selection descriptor");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(routes)
}

/// 解码单个描述符的内容区。
pub fn decode_route_contents(
    cursor: &mut Cursor<'_>,
) -> Result<RouteSelectionDescriptor, DecodeError> {
    let mut route = RouteSelectionDescriptor::default();
    while !cursor.is_empty() {
        match cursor.read_u8()? {
            component::SSC_MODE => route.ssc_mode = Some(cursor.read_u8()? & 0x07),
            component::SNSSAI => {
                let len = usize::from(cursor.read_u8()?);
                let contents = cursor.read_bytes(len)?;
                route.slices.push(SliceIdentifier::from_contents(contents)?);
            }
            component::DNN => route.dnns.push(read_labelled(cursor, "route-selection-descriptor.dnn")?),
            component::PDU_SESSION_TYPE => {
                route.pdu_session_type = Some(PduSessionType::from_wire(cursor.read_u8()?));
            }
            component::PREFERRED_ACCESS_TYPE => {
                let access = cursor.read_u8()?;
                if access == ACCESS_TYPE_NON_3GPP {
                    return Err(DecodeError::UnknownIdentifier {
                        context: CONTEXT,
                        code: access,
                    });
                }
            }
            component::NON_3GPP_OFFLOAD => {}
            code => {
                return Err(DecodeError::UnknownIdentifier {
                    context: CONTEXT,
                    code,
                });
            }
        }
    }
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn frame_new(precedence: u8, contents: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let inner_len = 1 + 2 + contents.len();
        out.extend_from_slice(&(inner_len as u16).to_be_bytes());
        out.push(precedence);
        out.extend_from_slice(&(contents.len() as u16).to_be_bytes());
        out.extend_from_slice(contents);
        out
    }

    fn frame_old(precedence: u8, contents: &[u8]) -> Vec<u8> {
        let mut out = vec![(1 + 1 + contents.len()) as u8, precedence, contents.len() as u8];
        out.extend_from_slice(contents);
        out
    }

    #[test]
    fn decodes_all_route_components() {
        #[rustfmt::skip]
        let contents = [
            component::SSC_MODE, 0xF9,
            component::SNSSAI, 4, 0x01, 0x00, 0x00, 0x02,
            component::DNN, 4, 3, b'i', b'm', b's',
            component::PDU_SESSION_TYPE, 0x01,
            component::PREFERRED_ACCESS_TYPE, 0x01,
            component::NON_3GPP_OFFLOAD,
        ];
        let bytes = frame_new(3, &contents);
        let mut cursor = Cursor::new(&bytes, "route-list");
        let routes = decode_route_list(&mut cursor, WireVersion::V1520).expect("合法列表");
        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(route.precedence, 3);
        assert_eq!(route.ssc_mode, Some(1));
        assert_eq!(route.slices[0].sd(), Some(2));
        assert_eq!(route.dnns, vec!["ims".to_owned()]);
        assert_eq!(route.pdu_session_type, Some(PduSessionType::Ipv4));
    }

    #[test]
    fn non_3gpp_access_drops_only_that_route() {
        let mut bytes = frame_old(1, &[component::PREFERRED_ACCESS_TYPE, ACCESS_TYPE_NON_3GPP]);
        bytes.extend(frame_old(2, &[component::SSC_MODE, 2]));
        let mut cursor = Cursor::new(&bytes, "route-list");
        let routes = decode_route_list(&mut cursor, WireVersion::V1510).expect("合法列表");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].precedence, 2);
    }

    #[test]
    fn unknown_component_drops_route() {
        let bytes = frame_new(1, &[0x40, 0x00]);
        let mut cursor = Cursor::new(&bytes, "route-list");
        let routes = decode_route_list(&mut cursor, WireVersion::V1520).expect("未知组件不致命");
        assert!(routes.is_empty());
    }

    #[test]
    fn invalid_slice_length_is_fatal() {
        let bytes = frame_new(1, &[component::SNSSAI, 3, 1, 2, 3]);
        let mut cursor = Cursor::new(&bytes, "route-list");
        assert_eq!(
            decode_route_list(&mut cursor, WireVersion::V1520),
            Err(DecodeError::InvalidSliceLength { length: 3 })
        );
    }

    #[test]
    #[traced_test]
    fn trailing_bytes_inside_route_record_are_logged() {
        let mut bytes = frame_new(1, &[component::SSC_MODE, 1]);
        bytes.push(0xEE);
        bytes[1] += 1;
        bytes.extend(frame_new(2, &[component::SSC_MODE, 2]));
        let mut cursor = Cursor::new(&bytes, "route-list");
        let routes = decode_route_list(&mut cursor, WireVersion::V1520).expect("多余字节不致命");
        assert_eq!(routes.len(), 2, "后续描述符应照常解码");
        assert_eq!(routes[1].ssc_mode, Some(2));
        assert!(logs_contain("ignoring trailing bytes after route selection descriptor"));
        assert!(logs_contain("offset=5"));
    }

    #[test]
    fn old_framing_misread_as_new_fails() {
        let bytes = frame_old(1, &[component::SSC_MODE, 1]);
        let mut cursor = Cursor::new(&bytes, "route-list");
        assert!(decode_route_list(&mut cursor, WireVersion::V1520).is_err());
    }
}
