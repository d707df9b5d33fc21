//! # ursp-core
//!
//! ## 定位与职责（Why）
//! - 承载 URSP（UE Route Selection Policy）策略引擎的共享数据模型：切片标识、流量描述符、
//!   路由选择描述符、规则集以及匹配结果；
//! - 提供 Allowed NSSAI 注册表与“禁用路由”谓词等外部协作者契约，使编解码、配置加载与匹配
//!   三条链路共享同一套类型，不必互相依赖。
//!
//! ## 架构嵌入（Where）
//! - `ursp-codec` 把二进制推送解码为 [`RuleSet`]，并把 IMS 路由描述符重新编码；
//! - `ursp-profile` 把静态配置文件加载为同形的 [`RuleSet`]；
//! - `ursp-engine` 读取 [`RuleSet`] 与 [`AllowedSliceRegistry`] 快照完成选路。
//!
//! ## 设计取舍（Trade-offs）
//! - 规则集在构造时一次性排序并冻结，读者只持有 `Arc` 快照，避免“边发布边修改”；
//! - 所有位标志使用 [`FlagSet`] 包装命名枚举，拒绝裸整数按位或。

pub mod error;
pub mod flags;
pub mod forbidden;
pub mod model;
pub mod plmn;
pub mod registry;
pub mod selection;
pub mod slice;

pub use error::DecodeError;
pub use flags::{ConnectionCapability, Flag, FlagSet, RouteFlag};
pub use forbidden::{ForbiddenQuery, ForbiddenRoutes, NoForbiddenRoutes};
pub use model::{
    AppDescriptor, Ipv4Match, Ipv6Match, OsAppId, PduSessionType, PolicyRule, PortRange,
    RouteSelectionDescriptor, RuleSet, TrafficDescriptor,
};
pub use plmn::{Plmn, PlmnParseError};
pub use registry::{AllowedSliceRegistry, RadioState, StaticRadioState};
pub use selection::SelectedRoute;
pub use slice::{SliceIdentifier, SliceTextError};
