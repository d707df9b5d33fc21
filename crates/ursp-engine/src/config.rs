//! 引擎配置。
//!
//! # 教案式说明
//! - **意图（Why）**：把归属网络缺省值、禁用表过期时间、持久化与配置文件路径、日志过滤器集中在
//!   一个 TOML 文档里，宿主启动时一次性读取；
//! - **契约（What）**：所有键都有缺省值，未知键报错；`default_hplmn` 必须是 5 或 6 位 PLMN。
//!
//! ```toml
//! default_hplmn = "46001"
//! forbidden_ttl_secs = 720
//! persistence_path = "/data/ursp/ue_policy.json"
//! profile_path = "/etc/ursp/profile.xml"
//! log_filter = "ursp_engine=debug,info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ursp_core::Plmn;

/// 缺省归属 PLMN。
pub const DEFAULT_HPLMN: &str = "00101";

/// 配置错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取失败。
    #[error("failed to read config `{path}`: {source}")]
    Io {
        /// 文件路径。
        path: PathBuf,
        /// 底层错误。
        #[source]
        source: std::io::Error,
    },
    /// TOML 语法或字段类型错误。
    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),
    /// 缺省归属 PLMN 非法。
    #[error("invalid default_hplmn `{0}`")]
    InvalidHplmn(String),
}

/// 引擎配置。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// EHPLMN 列表为空时使用的归属 PLMN。
    pub default_hplmn: String,
    /// 禁用路由过期秒数。
    pub forbidden_ttl_secs: u64,
    /// UE 策略持久化文件；缺省不持久化。
    pub persistence_path: Option<PathBuf>,
    /// 静态配置文件；缺省不加载。
    pub profile_path: Option<PathBuf>,
    /// `RUST_LOG` 未设置时的日志过滤指令。
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_hplmn: DEFAULT_HPLMN.to_owned(),
            forbidden_ttl_secs: 12 * 60,
            persistence_path: None,
            profile_path: None,
            log_filter: "info".to_owned(),
        }
    }
}

impl EngineConfig {
    /// 从 TOML 文本解析并校验。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件解析并校验。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// 禁用路由过期时间。
    pub fn forbidden_ttl(&self) -> Duration {
        Duration::from_secs(self.forbidden_ttl_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.default_hplmn
            .parse::<Plmn>()
            .map(|_| ())
            .map_err(|_| ConfigError::InvalidHplmn(self.default_hplmn.clone()))
    }
}
