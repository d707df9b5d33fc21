//! 选路结果。

use serde::{Deserialize, Serialize};

use crate::flags::{FlagSet, RouteFlag};
use crate::model::{Ipv4Match, Ipv6Match, PduSessionType, PortRange};

/// 匹配输出：命中的切片、DNN、会话参数以及参与命中的条件。
///
/// # 契约说明（What）
/// - `slice` 为 Allowed NSSAI 中对应条目的文本形式，未选切片时为空串；
/// - `route_bitmap` 记录哪些流量描述符条件参与了命中，调用方据此决定回显哪些字段；
/// - `app_ids` 等回显字段取自命中规则的流量描述符，仅在对应条件非空时填充。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SelectedRoute {
    /// 选中的切片文本。
    pub slice: String,
    /// 选中的 DNN。
    pub dnn: String,
    /// PDU 会话类型。
    pub pdu_session_type: Option<PduSessionType>,
    /// SSC 模式。
    pub ssc_mode: Option<u8>,
    /// 命中规则的优先级。
    pub ursp_precedence: u8,
    /// 参与命中的条件。
    pub route_bitmap: FlagSet<RouteFlag>,
    /// 命中规则中的应用标识。
    pub app_ids: Vec<String>,
    /// 命中规则中的 IPv4 条件。
    pub ipv4: Vec<Ipv4Match>,
    /// 命中规则中的 IPv6 条件。
    pub ipv6: Vec<Ipv6Match>,
    /// 命中规则中的协议号。
    pub protocol_ids: Vec<u8>,
    /// 命中规则中的单端口。
    pub single_ports: Vec<u16>,
    /// 命中规则中的端口区间。
    pub port_ranges: Vec<PortRange>,
}

impl SelectedRoute {
    /// 只带标志位的空结果。
    pub fn flags_only(route_bitmap: FlagSet<RouteFlag>) -> Self {
        Self {
            route_bitmap,
            ..Self::default()
        }
    }
}
