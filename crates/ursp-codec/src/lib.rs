//! # ursp-codec
//!
//! ## 定位与职责（Why）
//! - 把调制解调器推送的 URSP 二进制规则区解码为 [`ursp_core::RuleSet`]，并在两个线路版本之间
//!   自动回退；
//! - 解析包裹规则区的 UE 策略信封（分段、策略段、指令、部件），生成回送给网络侧的
//!   COMPLETE / REJECT / STATE INDICATION；
//! - 把 IMS 规则的路由描述符编码为定长二进制块，供无线层下发。
//!
//! ## 架构嵌入（Where）
//! - 上游只有 `ursp-core` 的数据模型；本 crate 不持有状态，除 [`envelope::SegmentAssembler`]
//!   外全部是纯函数；
//! - `ursp-engine` 负责决定何时解码、何时回送以及如何合并结果。
//!
//! ## 设计取舍（Trade-offs）
//! - 解码基于借用切片的 [`cursor::Cursor`]，不引入 `bytes`：输入总是完整缓冲，零拷贝收益有限；
//! - 所有整数按网络字节序读写。

pub mod cursor;
pub mod envelope;
pub mod ims;
pub mod labels;
pub mod outbound;
pub mod route;
pub mod rules;
pub mod traffic;
pub mod version;

pub use envelope::{
    EnvelopeError, ManageUePolicyCommand, PolicyInstruction, SegmentAssembler, UePolicySection,
    decode_manage_command,
};
pub use outbound::{
    InstructionResult, PlmnReject, build_command_reject, build_manage_complete,
    build_state_indication,
};
pub use rules::{DecodedRules, FallbackError, decode, decode_with_fallback};
pub use version::WireVersion;
