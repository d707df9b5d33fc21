//! S-NSSAI（切片标识）值类型。
//!
//! # 教案定位（Why）
//! - 切片标识同时出现在二进制 URSP 推送、Allowed NSSAI 文本与静态配置文件中，三处必须产生
//!   结构一致、可直接比较的值；
//! - “长度决定哪些可选字段存在”是线路格式的核心约束，集中在此处校验，避免各解析器各写一份。
//!
//! # 契约说明（What）
//! - 合法内容长度只有 1、2、4、5、8；
//! - 相等性只比较 `length/sst/sd/mapped_sst/mapped_sd`，文本形式不参与比较；
//! - 文本形式用于向上层回显，Allowed NSSAI 条目保留原始文本中“本网切片”部分。

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DecodeError;

const SD_MASK: u32 = 0x00FF_FFFF;

/// 单个切片标识。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SliceIdentifier {
    length: u8,
    sst: u8,
    sd: Option<u32>,
    mapped_sst: Option<u8>,
    mapped_sd: Option<u32>,
    text: String,
}

/// 切片文本解析失败的原因。
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SliceTextError {
    /// 条目为空。
    #[error("slice entry is empty")]
    Empty,
    /// `:` 分隔的部分超过两段。
    #[error("slice entry `{0}` has more than one mapped part")]
    TooManyParts(String),
    /// `.` 分隔的子字段数不是 1 或 2。
    #[error("slice part `{0}` must be `sst` or `sst.sd`")]
    BadSubfieldCount(String),
    /// 子字段不是十六进制数。
    #[error("slice subfield `{0}` is not hexadecimal")]
    NotHex(String),
}

impl SliceIdentifier {
    /// 由二进制内容解码，内容长度即切片长度。
    ///
    /// # 契约说明（What）
    /// - `contents` 为去掉 1 字节长度前缀后的字段区；
    /// - SD 为 3 字节大端整数；
    /// - 其他长度返回 [`DecodeError::InvalidSliceLength`]。
    pub fn from_contents(contents: &[u8]) -> Result<Self, DecodeError> {
        let sd_at = |offset: usize| {
            u32::from(contents[offset]) << 16
                | u32::from(contents[offset + 1]) << 8
                | u32::from(contents[offset + 2])
        };
        let (sd, mapped_sst, mapped_sd) = match contents.len() {
            1 => (None, None, None),
            2 => (None, Some(contents[1]), None),
            4 => (Some(sd_at(1)), None, None),
            5 => (Some(sd_at(1)), Some(contents[4]), None),
            8 => (Some(sd_at(1)), Some(contents[4]), Some(sd_at(5))),
            length => return Err(DecodeError::InvalidSliceLength { length }),
        };
        Ok(Self::from_parts(contents[0], sd, mapped_sst, mapped_sd))
    }

    /// 由字段直接构造，长度按“本网 1 或 4，映射部分再加 1 或 4”推导，文本取规范形式。
    pub fn from_parts(
        sst: u8,
        sd: Option<u32>,
        mapped_sst: Option<u8>,
        mapped_sd: Option<u32>,
    ) -> Self {
        let sd = sd.map(|value| value & SD_MASK);
        let mapped_sd = mapped_sd.map(|value| value & SD_MASK);
        let length = 1
            + 3 * u8::from(sd.is_some())
            + u8::from(mapped_sst.is_some())
            + 3 * u8::from(mapped_sd.is_some());
        let text = canonical_text(sst, sd);
        Self {
            length,
            sst,
            sd,
            mapped_sst,
            mapped_sd,
            text,
        }
    }

    /// 解析单个文本条目：`sst[.sd][:mappedSst[.mappedSd]]`，数值均为十六进制。
    ///
    /// 文本形式保留 `:` 之前的原始片段。
    pub fn parse_text(entry: &str) -> Result<Self, SliceTextError> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(SliceTextError::Empty);
        }
        let mut parts = entry.split(':');
        let own = parts.next().unwrap_or_default();
        let mapped = parts.next();
        if parts.next().is_some() {
            return Err(SliceTextError::TooManyParts(entry.to_owned()));
        }

        let (sst, sd) = parse_part(own)?;
        let (mapped_sst, mapped_sd) = match mapped {
            Some(part) => {
                let (mapped_sst, mapped_sd) = parse_part(part)?;
                (Some(mapped_sst), mapped_sd)
            }
            None => (None, None),
        };
        Ok(Self::from_parts(sst, sd, mapped_sst, mapped_sd).with_text(own.trim()))
    }

    /// 替换文本形式。
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// 按线路格式写出内容区（不含长度前缀）。
    ///
    /// 仅对可由 [`Self::from_contents`] 产生的字段组合保证往返一致。
    pub fn encode_contents(&self, out: &mut Vec<u8>) {
        out.push(self.sst);
        if let Some(sd) = self.sd {
            out.extend_from_slice(&sd.to_be_bytes()[1..]);
        }
        if let Some(mapped_sst) = self.mapped_sst {
            out.push(mapped_sst);
        }
        if let Some(mapped_sd) = self.mapped_sd {
            out.extend_from_slice(&mapped_sd.to_be_bytes()[1..]);
        }
    }

    /// 内容长度。
    pub fn length(&self) -> u8 {
        self.length
    }

    /// Slice/Service Type。
    pub fn sst(&self) -> u8 {
        self.sst
    }

    /// Slice Differentiator（24 位）。
    pub fn sd(&self) -> Option<u32> {
        self.sd
    }

    /// 映射到归属网络的 SST。
    pub fn mapped_sst(&self) -> Option<u8> {
        self.mapped_sst
    }

    /// 映射到归属网络的 SD。
    pub fn mapped_sd(&self) -> Option<u32> {
        self.mapped_sd
    }

    /// 回显给上层的文本形式。
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl PartialEq for SliceIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self.sst == other.sst
            && self.sd == other.sd
            && self.mapped_sst == other.mapped_sst
            && self.mapped_sd == other.mapped_sd
    }
}

impl Eq for SliceIdentifier {}

impl Hash for SliceIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.length, self.sst, self.sd, self.mapped_sst, self.mapped_sd).hash(state);
    }
}

impl fmt::Display for SliceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn canonical_text(sst: u8, sd: Option<u32>) -> String {
    match sd {
        Some(sd) => format!("{sst:02x}.{sd:06x}"),
        None => format!("{sst:02x}"),
    }
}

fn parse_part(part: &str) -> Result<(u8, Option<u32>), SliceTextError> {
    let fields: Vec<&str> = part.split('.').map(str::trim).collect();
    match fields.as_slice() {
        [sst] => Ok((parse_sst(sst)?, None)),
        [sst, sd] => Ok((parse_sst(sst)?, Some(parse_hex(sd)? & SD_MASK))),
        _ => Err(SliceTextError::BadSubfieldCount(part.to_owned())),
    }
}

fn parse_sst(field: &str) -> Result<u8, SliceTextError> {
    // 超过 8 位时截断，与调制解调器侧的字节转换保持一致。
    parse_hex(field).map(|value| (value & 0xFF) as u8)
}

fn parse_hex(field: &str) -> Result<u32, SliceTextError> {
    if field.is_empty() {
        return Err(SliceTextError::NotHex(field.to_owned()));
    }
    u32::from_str_radix(field, 16).map_err(|_| SliceTextError::NotHex(field.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn eight_byte_contents_fill_every_field() {
        let slice = SliceIdentifier::from_contents(&[0x01, 0x00, 0x00, 0x02, 0x03, 0xAB, 0xCD, 0xEF])
            .expect("长度 8 应合法");
        assert_eq!(slice.length(), 8);
        assert_eq!(slice.sst(), 1);
        assert_eq!(slice.sd(), Some(2));
        assert_eq!(slice.mapped_sst(), Some(3));
        assert_eq!(slice.mapped_sd(), Some(0x00AB_CDEF));
        assert_eq!(slice.text(), "01.000002");
    }

    #[test]
    fn text_entry_keeps_own_part_as_text() {
        let slice = SliceIdentifier::parse_text("A.B:C.D").expect("合法条目");
        assert_eq!(slice.text(), "A.B");
        assert_eq!(slice.length(), 8);
        assert_eq!(slice.sst(), 0x0A);
        assert_eq!(slice.sd(), Some(0x0B));
        assert_eq!(slice.mapped_sst(), Some(0x0C));
        assert_eq!(slice.mapped_sd(), Some(0x0D));
    }

    #[test]
    fn text_and_wire_forms_compare_structurally() {
        let from_text = SliceIdentifier::parse_text("1.2").expect("合法条目");
        let from_wire = SliceIdentifier::from_contents(&[1, 0, 0, 2]).expect("长度 4 应合法");
        assert_eq!(from_text, from_wire);
        assert_ne!(from_text.text(), from_wire.text());
    }

    #[test]
    fn malformed_text_entries_are_rejected() {
        assert_eq!(SliceIdentifier::parse_text(" "), Err(SliceTextError::Empty));
        assert!(matches!(
            SliceIdentifier::parse_text("1:2:3"),
            Err(SliceTextError::TooManyParts(_))
        ));
        assert!(matches!(
            SliceIdentifier::parse_text("1.2.3"),
            Err(SliceTextError::BadSubfieldCount(_))
        ));
        assert!(matches!(
            SliceIdentifier::parse_text("zz"),
            Err(SliceTextError::NotHex(_))
        ));
    }

    proptest! {
        #[test]
        fn valid_lengths_preserve_implied_fields(
            bytes in proptest::collection::vec(any::<u8>(), 8),
            length in prop::sample::select(vec![1usize, 2, 4, 5, 8]),
        ) {
            let contents = &bytes[..length];
            let slice = SliceIdentifier::from_contents(contents).expect("合法长度");
            prop_assert_eq!(usize::from(slice.length()), length);
            prop_assert_eq!(slice.sst(), contents[0]);
            prop_assert_eq!(slice.sd().is_some(), length >= 4);
            prop_assert_eq!(slice.mapped_sst().is_some(), matches!(length, 2 | 5 | 8));
            prop_assert_eq!(slice.mapped_sd().is_some(), length == 8);

            let mut encoded = Vec::new();
            slice.encode_contents(&mut encoded);
            prop_assert_eq!(encoded.as_slice(), contents);
        }

        #[test]
        fn other_lengths_are_rejected(
            bytes in proptest::collection::vec(any::<u8>(), 0..16),
        ) {
            prop_assume!(![1usize, 2, 4, 5, 8].contains(&bytes.len()));
            prop_assert_eq!(
                SliceIdentifier::from_contents(&bytes),
                Err(DecodeError::InvalidSliceLength { length: bytes.len() })
            );
        }
    }
}
