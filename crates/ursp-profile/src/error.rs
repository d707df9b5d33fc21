//! 配置文件加载错误。
//!
//! # 教案式说明
//! - **意图（Why）**：区分“整份文档不可用”（I/O、语法）与“单条规则不可用”（属性缺失或取值非法）；
//!   前者由 [`crate::load`] 返回，后者只在加载器内部用于跳过规则并记录日志。
//! - **契约（What）**：所有变体携带足以定位问题的上下文（路径、元素名、类型码、原始取值）。

use std::path::PathBuf;

use thiserror::Error;

/// 配置文件加载错误域。
#[derive(Debug, Error)]
pub enum ProfileError {
    /// 读取文件失败。
    #[error("failed to read profile `{path}`: {source}")]
    Io {
        /// 文件路径。
        path: PathBuf,
        /// 底层错误。
        #[source]
        source: std::io::Error,
    },
    /// 标记语法错误。
    #[error("malformed profile document: {0}")]
    Syntax(String),
    /// 必需属性缺失。
    #[error("element `{element}` is missing attribute `{attr}`")]
    MissingAttribute {
        /// 元素名。
        element: &'static str,
        /// 属性名。
        attr: &'static str,
    },
    /// 元素缺失。
    #[error("element `{parent}` has no `{child}` child")]
    MissingElement {
        /// 父元素名。
        parent: &'static str,
        /// 子元素名。
        child: &'static str,
    },
    /// 组件类型码未知。
    #[error("unknown {context} component type {code:#04x}")]
    UnknownComponent {
        /// 组件所属描述符。
        context: &'static str,
        /// 类型码。
        code: u8,
    },
    /// 属性值无法按期望文法解析。
    #[error("invalid {what} value `{value}`")]
    InvalidValue {
        /// 期望的取值种类。
        what: &'static str,
        /// 原始文本。
        value: String,
    },
}

impl ProfileError {
    pub(crate) fn invalid(what: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            what,
            value: value.to_owned(),
        }
    }
}
