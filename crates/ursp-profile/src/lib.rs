//! # ursp-profile
//!
//! ## 定位与职责（Why）
//! - 把按 PLMN 分组的静态 URSP 配置文件加载为 [`ursp_core::RuleSet`]，与二进制推送共用一套匹配引擎；
//! - 顺带建立 IMS 规则索引，供引擎在匹配之前向无线层预下发 IMS 路由描述符。
//!
//! ## 架构嵌入（Where）
//! - [`element`] 是与标记库无关的最小 AST，[`loader`] 只面向它编写；
//! - `xml` 特性下的 [`xml`] 模块是唯一的 roxmltree 适配层，[`load`] / [`load_str`] 是便捷入口。
//!
//! ## 设计取舍（Trade-offs）
//! - 单条规则失败只跳过该规则，整份文档只有在 I/O 或语法错误时才失败。

pub mod components;
pub mod element;
pub mod error;
pub mod loader;
#[cfg(feature = "xml")]
pub mod xml;

pub use element::Element;
pub use error::ProfileError;
pub use loader::{LoadedProfile, load_element};

/// 从文本加载配置文件。
#[cfg(feature = "xml")]
pub fn load_str(text: &str) -> Result<LoadedProfile, ProfileError> {
    xml::parse_document(text).map(|root| load_element(&root))
}

/// 从路径加载配置文件。
#[cfg(feature = "xml")]
pub fn load(path: impl AsRef<std::path::Path>) -> Result<LoadedProfile, ProfileError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text)
}
