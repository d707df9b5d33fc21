//! URSP 规则模型。
//!
//! # 设计动机（Why）
//! - 二进制推送与静态配置文件最终都落到同一组结构：[`PolicyRule`] 由一个 [`TrafficDescriptor`]
//!   与若干 [`RouteSelectionDescriptor`] 组成，多个规则组成按优先级排序的 [`RuleSet`]；
//! - 匹配引擎只认这一组类型，两个来源因此可以互相替换。
//!
//! # 契约说明（What）
//! - [`RuleSet`] 只能经由 [`RuleSet::from_rules`] 构造，构造时按规则优先级升序、规则内路由优先级升序
//!   做稳定排序，之后不可变；
//! - 流量描述符中为空的字段表示“不关心”。
//!
//! # 风险提示（Trade-offs）
//! - 排序为稳定排序：同优先级的规则保持解码顺序，与调制解调器侧的遍历顺序一致。

use std::collections::BTreeSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::flags::{ConnectionCapability, Flag, FlagSet};
use crate::slice::SliceIdentifier;

/// 操作系统标识与应用标识。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OsAppId {
    /// 操作系统标识（16 字节 UUID 的十六进制文本，可为空）。
    pub os_id: String,
    /// 应用标识。
    pub app_id: String,
}

/// IPv4 地址与掩码。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ipv4Match {
    /// 规则地址。
    pub addr: Ipv4Addr,
    /// 掩码。
    pub mask: Ipv4Addr,
}

/// IPv6 地址与前缀长度。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ipv6Match {
    /// 规则地址。
    pub addr: Ipv6Addr,
    /// 声明的前缀长度；匹配时不参与比较。
    pub prefix_len: u8,
}

/// 远端端口闭区间。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PortRange {
    /// 下界（含）。
    pub low: u16,
    /// 上界（含）。
    pub high: u16,
}

impl PortRange {
    /// 端口是否落在区间内。
    pub fn contains(&self, port: u16) -> bool {
        (self.low..=self.high).contains(&port)
    }
}

/// 流量描述符。
///
/// `unsupported` 表示解码时遇到未知组件：该描述符保留在规则中，但永不命中。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TrafficDescriptor {
    /// 为真时忽略其余所有字段，直接命中。
    pub match_all: bool,
    /// 应用标识列表。
    pub os_app_ids: Vec<OsAppId>,
    /// IPv4 地址/掩码列表。
    pub ipv4: Vec<Ipv4Match>,
    /// IPv6 地址/前缀列表。
    pub ipv6: Vec<Ipv6Match>,
    /// 协议号集合。
    pub protocol_ids: BTreeSet<u8>,
    /// 单个远端端口集合。
    pub single_ports: BTreeSet<u16>,
    /// 远端端口区间。
    pub port_ranges: Vec<PortRange>,
    /// DNN 列表。
    pub dnns: Vec<String>,
    /// FQDN 列表。
    pub fqdns: Vec<String>,
    /// 连接能力原始取值集合。
    pub connection_capabilities: BTreeSet<u8>,
    /// 解码时遇到未知组件。
    #[serde(default)]
    pub unsupported: bool,
}

impl TrafficDescriptor {
    /// match-all 描述符。
    pub fn match_all() -> Self {
        Self {
            match_all: true,
            ..Self::default()
        }
    }

    /// 所有连接能力取值按位汇总后的类型化集合。
    pub fn capability_flags(&self) -> FlagSet<ConnectionCapability> {
        let raw = self
            .connection_capabilities
            .iter()
            .fold(0u8, |acc, value| acc | value);
        FlagSet::from_bits(raw)
    }

    /// 描述符是否指向 IMS 业务：任一连接能力的 bit0 置位，或任一 DNN 为 `ims`。
    pub fn targets_ims(&self) -> bool {
        self.connection_capabilities
            .iter()
            .any(|value| value & ConnectionCapability::Ims.bit() != 0)
            || self.dnns.iter().any(|dnn| dnn.eq_ignore_ascii_case("ims"))
    }
}

/// PDU 会话类型。
///
/// 线路上使用 3GPP 编码，对下游交付时使用另一套编号，两者映射见 [`Self::from_wire`]。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum PduSessionType {
    /// IPv4。
    Ipv4,
    /// IPv6。
    Ipv6,
    /// 双栈。
    Ipv4v6,
    /// 非 IP。
    NonIp,
    /// 以太网。
    Ethernet,
    /// 非结构化。
    Unstructured,
}

impl PduSessionType {
    /// 由 3GPP 编码（低 3 位）映射；未定义取值回落到双栈。
    pub fn from_wire(code: u8) -> Self {
        match code & 0x07 {
            1 => Self::Ipv4,
            2 => Self::Ipv6,
            3 => Self::Ipv4v6,
            4 => Self::Unstructured,
            5 => Self::Ethernet,
            7 => Self::NonIp,
            _ => Self::Ipv4v6,
        }
    }

    /// 3GPP 编码。
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Ipv4 => 1,
            Self::Ipv6 => 2,
            Self::Ipv4v6 => 3,
            Self::Unstructured => 4,
            Self::Ethernet => 5,
            Self::NonIp => 7,
        }
    }

    /// 下游编号。
    pub fn downstream_code(self) -> u8 {
        match self {
            Self::Ipv4 => 0,
            Self::Ipv6 => 1,
            Self::Ipv4v6 => 2,
            Self::NonIp => 3,
            Self::Ethernet => 4,
            Self::Unstructured => 5,
        }
    }
}

/// 路由选择描述符（RSD）。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RouteSelectionDescriptor {
    /// 规则内优先级，数值越小越优先。
    pub precedence: u8,
    /// PDU 会话类型。
    pub pdu_session_type: Option<PduSessionType>,
    /// SSC 模式（低 3 位）。
    pub ssc_mode: Option<u8>,
    /// 候选切片，按声明顺序。
    pub slices: Vec<SliceIdentifier>,
    /// 候选 DNN，按声明顺序。
    pub dnns: Vec<String>,
}

/// 单条 URSP 规则。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// 规则优先级，数值越小越优先。
    pub precedence: u8,
    /// 流量描述符。
    pub traffic_descriptor: TrafficDescriptor,
    /// 路由选择描述符。
    pub routes: Vec<RouteSelectionDescriptor>,
}

/// 单个网络下的有序规则集。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PolicyRule>", into = "Vec<PolicyRule>")]
pub struct RuleSet {
    rules: Vec<PolicyRule>,
}

impl RuleSet {
    /// 排序并冻结规则。
    pub fn from_rules(mut rules: Vec<PolicyRule>) -> Self {
        for rule in &mut rules {
            rule.routes.sort_by_key(|route| route.precedence);
        }
        rules.sort_by_key(|rule| rule.precedence);
        Self { rules }
    }

    /// 按优先级升序的规则切片。
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// 优先级最低（排序最后）的规则。
    pub fn last(&self) -> Option<&PolicyRule> {
        self.rules.last()
    }

    /// 规则数。
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<PolicyRule>> for RuleSet {
    fn from(rules: Vec<PolicyRule>) -> Self {
        Self::from_rules(rules)
    }
}

impl From<RuleSet> for Vec<PolicyRule> {
    fn from(set: RuleSet) -> Self {
        set.rules
    }
}

/// 单条业务流的运行时属性快照。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// 应用 UID。
    pub uid: Option<u32>,
    /// 操作系统标识。
    pub os_id: String,
    /// 应用标识。
    pub app_id: String,
    /// 远端 IPv4 地址。
    pub ipv4: Option<Ipv4Addr>,
    /// 远端 IPv6 地址。
    pub ipv6: Option<Ipv6Addr>,
    /// 协议号。
    pub protocol_id: Option<u8>,
    /// 远端端口。
    pub remote_port: Option<u16>,
    /// 数据网络名。
    pub dnn: String,
    /// 目标域名。
    pub fqdn: String,
    /// 连接能力取值。
    pub connection_capability: Option<u8>,
}

impl AppDescriptor {
    /// 以 `osId#appId` 或 `appId` 文本设置应用标识。
    #[must_use]
    pub fn with_raw_app_id(mut self, raw: &str) -> Self {
        match raw.split_once('#') {
            Some((os_id, app_id)) => {
                self.os_id = os_id.to_owned();
                self.app_id = app_id.to_owned();
            }
            None => {
                self.os_id.clear();
                self.app_id = raw.to_owned();
            }
        }
        self
    }
}
