//! URSP 线路版本。

use serde::{Deserialize, Serialize};

use crate::cursor::LengthWidth;

/// 两个互不兼容的 URSP 线路版本。
///
/// # 契约说明（What）
/// - 差异只有两点：路由描述符的长度字段宽度，以及 FQDN 组件是否合法；
/// - 解码时先尝试 [`WireVersion::V1520`]，失败再以同一起点尝试 [`WireVersion::V1510`]。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum WireVersion {
    /// 旧版本：路由描述符长度 1 字节，不支持 FQDN。
    V1510,
    /// 新版本：路由描述符长度 2 字节，支持 FQDN。
    V1520,
}

impl WireVersion {
    /// 解码尝试顺序。
    pub const TRIAL_ORDER: [Self; 2] = [Self::V1520, Self::V1510];

    /// 由信封中的版本号识别。
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1510 => Some(Self::V1510),
            1520 => Some(Self::V1520),
            _ => None,
        }
    }

    /// 版本号。
    pub fn code(self) -> u16 {
        match self {
            Self::V1510 => 1510,
            Self::V1520 => 1520,
        }
    }

    /// 路由描述符及其内容长度字段的宽度。
    pub fn route_length_width(self) -> LengthWidth {
        match self {
            Self::V1510 => LengthWidth::One,
            Self::V1520 => LengthWidth::Two,
        }
    }

    /// FQDN 组件是否合法。
    pub fn allows_fqdn(self) -> bool {
        matches!(self, Self::V1520)
    }
}
