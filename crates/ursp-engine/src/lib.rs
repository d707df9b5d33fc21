//! # ursp-engine
//!
//! ## 定位与职责（Why）
//! - 为终端业务流挑选网络切片与 DNN：按归属网络的 URSP 规则集匹配，叠加授权切片与禁用路由的过滤；
//! - 维护网络增量下发的 UE 策略，处理后生成回送网络侧的 COMPLETE / REJECT / STATE INDICATION、
//!   IMS 路由描述符列表与 URSP 变更通知；
//! - 承载运行所需的环境能力：TOML 配置、`tracing` 日志安装、策略持久化。
//!
//! ## 架构嵌入（Where）
//! - 解码与编码委托 `ursp-codec`，静态配置文件委托 `ursp-profile`，数据模型来自 `ursp-core`；
//! - 宿主把无线层事件包装为 [`SliceEvent`] 交给 [`SliceEngine::handle`]，把返回的 [`Outbound`]
//!   交还传输层；选路查询直接调用 [`SliceEngine::select_route`]。
//!
//! ## 并发模型（How）
//! - 已发布规则集经 [`RuleStore`] 的 `ArcSwap` 整体替换，读者拿到的始终是一致快照；
//! - 可变的簿记状态（UE 策略、禁用路由表）由 `parking_lot::Mutex` 保护，持锁区间不跨越 I/O 之外的回调；
//! - 分段重组按 PTI 分桶，见 [`ursp_codec::SegmentAssembler`]。
//!
//! ## 设计取舍（Trade-offs）
//! - 引擎不自行启动线程或运行时，事件处理同步返回，便于在任意宿主中嵌入与测试。

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod forbidden;
pub mod matcher;
pub mod policy_store;
pub mod rule_store;
pub mod telemetry;
pub mod update;
pub mod whitelist;

pub use config::{ConfigError, DEFAULT_HPLMN, EngineConfig};
pub use engine::SliceEngine;
pub use error::EngineError;
pub use events::{ACTIVATION_NORMAL_FAIL, Outbound, SliceEvent};
pub use forbidden::{DEFAULT_FORBIDDEN_TTL, ForbiddenRoute, ForbiddenRouteList};
pub use matcher::{PolicyMatcher, RouteChoice, match_traffic};
pub use policy_store::UePolicyStore;
pub use rule_store::RuleStore;
pub use update::UrspUpdate;
pub use whitelist::TrafficWhitelist;
