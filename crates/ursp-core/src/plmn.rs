//! PLMN 标识：BCD 三字节与十进制文本之间的转换。
//!
//! 字节布局遵循 3GPP TS 24.008：
//! - byte0：MCC2 (高半字节) | MCC1 (低半字节)
//! - byte1：MNC3 或 0xF (高半字节) | MCC3 (低半字节)
//! - byte2：MNC2 (高半字节) | MNC1 (低半字节)

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// 公共陆地移动网络标识。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Plmn {
    /// 移动国家码，三位。
    pub mcc: u16,
    /// 移动网络码，两位或三位。
    pub mnc: u16,
    /// MNC 是否为三位。
    pub long_mnc: bool,
}

impl Plmn {
    /// 构造 PLMN。
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// 解码 BCD 三字节；任一数字半字节大于 9 时报结构错误。
    pub fn decode(bytes: [u8; 3]) -> Result<Self, DecodeError> {
        let digit = |nibble: u8| {
            if nibble > 9 {
                Err(DecodeError::StructuralMismatch {
                    context: "plmn",
                    reason: "bcd digit out of range",
                })
            } else {
                Ok(u16::from(nibble))
            }
        };
        let mcc1 = digit(bytes[0] & 0x0F)?;
        let mcc2 = digit(bytes[0] >> 4)?;
        let mcc3 = digit(bytes[1] & 0x0F)?;
        let mnc1 = digit(bytes[2] & 0x0F)?;
        let mnc2 = digit(bytes[2] >> 4)?;
        let mcc = mcc1 * 100 + mcc2 * 10 + mcc3;
        if bytes[1] >> 4 == 0x0F {
            Ok(Self::new(mcc, mnc1 * 10 + mnc2, false))
        } else {
            let mnc3 = digit(bytes[1] >> 4)?;
            Ok(Self::new(mcc, mnc1 * 100 + mnc2 * 10 + mnc3, true))
        }
    }

    /// 编码为 BCD 三字节。
    pub fn encode(&self) -> [u8; 3] {
        let mcc1 = ((self.mcc / 100) % 10) as u8;
        let mcc2 = ((self.mcc / 10) % 10) as u8;
        let mcc3 = (self.mcc % 10) as u8;
        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            (
                ((self.mnc / 100) % 10) as u8,
                ((self.mnc / 10) % 10) as u8,
                (self.mnc % 10) as u8,
            )
        } else {
            (((self.mnc / 10) % 10) as u8, (self.mnc % 10) as u8, 0x0F)
        };
        [mcc2 << 4 | mcc1, mnc3 << 4 | mcc3, mnc2 << 4 | mnc1]
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}{:02}", self.mcc, self.mnc)
        }
    }
}

/// PLMN 文本解析失败。
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("`{0}` is not a 5 or 6 digit PLMN")]
pub struct PlmnParseError(pub String);

impl FromStr for Plmn {
    type Err = PlmnParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if !(5..=6).contains(&text.len()) || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PlmnParseError(text.to_owned()));
        }
        let (mcc, mnc) = text.split_at(3);
        let parse = |digits: &str| {
            digits
                .parse::<u16>()
                .map_err(|_| PlmnParseError(text.to_owned()))
        };
        Ok(Self::new(parse(mcc)?, parse(mnc)?, mnc.len() == 3))
    }
}
