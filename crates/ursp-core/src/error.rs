//! URSP 解码错误类型定义。
//!
//! # 教案定位（Why）
//! - 二进制规则来自调制解调器推送，属于不可信输入；解码失败必须给出可定位的原因，
//!   同时区分“可跳过”与“须放弃当前版本尝试”两类后果。
//! - 与解码逻辑解耦，`ursp-codec`、注册表与配置加载共用同一错误枚举。
//!
//! # 使用契约（What）
//! - [`DecodeError::Truncated`]、[`DecodeError::StructuralMismatch`]、[`DecodeError::InvalidSliceLength`]
//!   对当前版本尝试是致命的，调用方应切换到另一线路版本；
//! - [`DecodeError::UnknownIdentifier`] 只影响当前组件或当前路由描述符，解码继续。
//!
//! # 设计考量（How）
//! - 变体只保存整型与静态字符串，错误值可廉价克隆并直接用于断言。

use thiserror::Error;

/// 解码过程中可能出现的错误。
///
/// ## 契约定义（What）
/// - `context` 为发生问题的结构名（如 `"traffic-descriptor"`），便于日志聚合；
/// - 触发致命错误后不应假定输入已被完整消费。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DecodeError {
    /// 剩余字节不足以读取声明的字段。
    #[error("{context}: need {needed} bytes but only {available} remain")]
    Truncated {
        /// 正在解析的结构。
        context: &'static str,
        /// 需要的字节数。
        needed: usize,
        /// 实际剩余字节数。
        available: usize,
    },
    /// 帧结构合法，但组件类型或取值无法识别。
    #[error("{context}: unknown identifier 0x{code:02x}")]
    UnknownIdentifier {
        /// 正在解析的结构。
        context: &'static str,
        /// 未识别的类型码或取值。
        code: u8,
    },
    /// 结构与当前线路版本不符，例如旧版本出现 FQDN，或标签长度之和与外层长度不一致。
    #[error("{context}: structural mismatch ({reason})")]
    StructuralMismatch {
        /// 正在解析的结构。
        context: &'static str,
        /// 静态原因说明。
        reason: &'static str,
    },
    /// 切片标识内容长度不在 {1, 2, 4, 5, 8} 之内。
    #[error("slice identifier length {length} is not one of 1, 2, 4, 5, 8")]
    InvalidSliceLength {
        /// 声明的内容长度。
        length: usize,
    },
}

impl DecodeError {
    /// 该错误是否要求放弃当前线路版本并改用另一版本重试。
    pub fn triggers_fallback(&self) -> bool {
        !matches!(self, Self::UnknownIdentifier { .. })
    }

    /// 构造截断错误的便捷入口。
    pub fn truncated(context: &'static str, needed: usize, available: usize) -> Self {
        Self::Truncated {
            context,
            needed,
            available,
        }
    }
}
