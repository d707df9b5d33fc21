//! 引擎错误域。
//!
//! # 教案式说明
//! - **意图（Why）**：事件处理内部以 `Result` 串联解码、合法性校验与持久化，最终在
//!   [`crate::SliceEngine::handle`] 统一记录日志；
//! - **契约（What）**：所有变体实现 `Send + Sync + 'static`，底层错误通过 `#[source]` 保留。

use std::path::PathBuf;

use thiserror::Error;
use ursp_codec::EnvelopeError;
use ursp_profile::ProfileError;

/// 引擎错误。
#[derive(Debug, Error)]
pub enum EngineError {
    /// UE 策略信封无法解码。
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// 命令携带归属网络以外的 PLMN。
    #[error("ue policy command names foreign plmn(s) {foreign:?}, home is {home}")]
    ForeignPlmn {
        /// 归属 PLMN。
        home: String,
        /// 非归属 PLMN。
        foreign: Vec<String>,
    },
    /// 持久化文件读写失败。
    #[error("ue policy store file `{path}`: {source}")]
    Persistence {
        /// 文件路径。
        path: PathBuf,
        /// 底层错误。
        #[source]
        source: std::io::Error,
    },
    /// 持久化内容编解码失败。
    #[error("ue policy store encoding: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 配置文件加载失败。
    #[error(transparent)]
    Profile(#[from] ProfileError),
}
