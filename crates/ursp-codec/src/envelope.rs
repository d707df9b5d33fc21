//! UE 策略下发信封：分段重组与 MANAGE UE POLICY COMMAND 解码。
//!
//! # 教案定位（Why）
//! - 调制解调器把 UE 策略下发消息按 PTI 分段推送，URSP 规则区嵌在“策略段 → 指令 → 策略部件”
//!   三层长度前缀结构中；
//! - 信封层只负责框架校验与定位 URSP 部件，规则本身交给 [`decode_with_fallback`]。
//!
//! # 契约说明（What）
//! - 分段帧：`pti u8 | segmentCount u8 | segmentIndex u8 | payload`；
//! - 命令帧：`version u16 | pti u8 | messageType u8 | sectionListLength u16 | sections`，
//!   `sectionListLength` 必须等于剩余字节数；
//! - 段：`length u16 | plmn[3] | instructions`；指令：`length u16 | upsc u16 | parts`；
//!   部件：`length u16 | type u8 (低 4 位) | contents`，类型 1 为 URSP；
//! - 任一层长度越界或 URSP 部件两种线路版本都解不开，整条命令失败。

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use ursp_core::{DecodeError, Plmn, PolicyRule};

use crate::cursor::{Cursor, LengthWidth};
use crate::rules::{FallbackError, decode_with_fallback};
use crate::version::WireVersion;

/// MANAGE UE POLICY COMMAND 消息类型。
pub const MSG_MANAGE_UE_POLICY_COMMAND: u8 = 1;
/// 策略部件类型：URSP。
pub const POLICY_PART_URSP: u8 = 1;

/// 信封解码失败。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum EnvelopeError {
    /// 版本号不是 1510 或 1520。
    #[error("unsupported ursp version {0}")]
    UnsupportedVersion(u16),
    /// 消息类型不是 MANAGE UE POLICY COMMAND。
    #[error("unexpected ue policy message type {0}")]
    UnexpectedMessageType(u8),
    /// 段列表长度与剩余字节不一致。
    #[error("section list declares {declared} bytes but {actual} remain")]
    LengthMismatch {
        /// 声明长度。
        declared: usize,
        /// 实际剩余。
        actual: usize,
    },
    /// 框架字段解码失败。
    #[error(transparent)]
    Frame(#[from] DecodeError),
    /// URSP 部件两种版本都无法解码。
    #[error(transparent)]
    Rules(#[from] FallbackError),
}

/// 单条策略指令（以 UPSC 标识）。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PolicyInstruction {
    /// 是否携带 URSP 部件；不携带时表示删除同 UPSC 的已存指令。
    pub has_ursp: bool,
    /// 指令内所有 URSP 部件解出的规则。
    pub rules: Vec<PolicyRule>,
}

/// 单个 PLMN 的策略段。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UePolicySection {
    /// PLMN。
    pub plmn: Plmn,
    /// UPSC → 指令。
    pub instructions: BTreeMap<u16, PolicyInstruction>,
    /// 指令序号（1 起）→ UPSC，仅记录携带 URSP 的指令。
    #[serde(default)]
    pub instruction_order: BTreeMap<u16, u16>,
}

impl UePolicySection {
    /// 空策略段。
    pub fn new(plmn: Plmn) -> Self {
        Self {
            plmn,
            instructions: BTreeMap::new(),
            instruction_order: BTreeMap::new(),
        }
    }

    /// 所有指令的规则，按 UPSC 顺序拼接。
    pub fn rules(&self) -> impl Iterator<Item = &PolicyRule> {
        self.instructions
            .values()
            .flat_map(|instruction| instruction.rules.iter())
    }
}

/// 解码后的 MANAGE UE POLICY COMMAND。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManageUePolicyCommand {
    /// 信封声明的版本。
    pub declared_version: WireVersion,
    /// 过程事务标识。
    pub pti: u8,
    /// PLMN 文本 → 策略段。
    pub sections: BTreeMap<String, UePolicySection>,
    /// 最近一次成功解码 URSP 部件的线路版本。
    pub decoded_version: Option<WireVersion>,
}

/// 解码一条完整（已重组）的命令。
pub fn decode_manage_command(payload: &[u8]) -> Result<ManageUePolicyCommand, EnvelopeError> {
    let mut cursor = Cursor::new(payload, "ue-policy-command");
    let code = cursor.read_u16()?;
    let declared_version = WireVersion::from_code(code).ok_or(EnvelopeError::UnsupportedVersion(code))?;
    let pti = cursor.read_u8()?;
    let message_type = cursor.read_u8()?;
    if message_type != MSG_MANAGE_UE_POLICY_COMMAND {
        return Err(EnvelopeError::UnexpectedMessageType(message_type));
    }

    let declared = usize::from(cursor.read_u16()?);
    let actual = cursor.remaining();
    if declared != actual {
        return Err(EnvelopeError::LengthMismatch { declared, actual });
    }

    let mut command = ManageUePolicyCommand {
        declared_version,
        pti,
        sections: BTreeMap::new(),
        decoded_version: None,
    };
    while !cursor.is_empty() {
        let mut section = cursor.split_prefixed(LengthWidth::Two, "ue-policy-section")?;
        decode_section(&mut section, &mut command)?;
    }
    command
        .sections
        .retain(|_, section| !section.instructions.is_empty());
    debug!(pti, sections = command.sections.len(), "manage ue policy command decoded");
    Ok(command)
}

fn decode_section(
    cursor: &mut Cursor<'_>,
    command: &mut ManageUePolicyCommand,
) -> Result<(), EnvelopeError> {
    let plmn = Plmn::decode(cursor.read_array::<3>()?)?;
    let section = command
        .sections
        .entry(plmn.to_string())
        .or_insert_with(|| UePolicySection::new(plmn));

    let mut order = 0u16;
    while !cursor.is_empty() {
        let mut instruction_cursor = cursor.split_prefixed(LengthWidth::Two, "ue-policy-instruction")?;
        order += 1;
        let upsc = instruction_cursor.read_u16()?;
        let mut instruction = PolicyInstruction::default();
        while !instruction_cursor.is_empty() {
            let mut part = instruction_cursor.split_prefixed(LengthWidth::Two, "ue-policy-part")?;
            let part_type = part.read_u8()? & 0x0F;
            if part_type != POLICY_PART_URSP {
                debug!(upsc, part_type, "skipping non-ursp policy part");
                part.skip_rest();
                continue;
            }
            let contents = part.read_bytes(part.remaining())?;
            let decoded = decode_with_fallback(contents)?;
            instruction.has_ursp = true;
            instruction.rules.extend(Vec::from(decoded.rules));
            command.decoded_version = Some(decoded.version);
        }
        if instruction.has_ursp {
            section.instruction_order.insert(order, upsc);
        }
        section.instructions.insert(upsc, instruction);
    }
    Ok(())
}

#[derive(Debug)]
struct PendingSegments {
    count: u8,
    parts: BTreeMap<u8, Vec<u8>>,
}

/// 按 PTI 重组分段推送。
#[derive(Debug, Default)]
pub struct SegmentAssembler {
    pending: DashMap<u8, PendingSegments>,
}

impl SegmentAssembler {
    /// 空重组器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 接收一个分段；收齐时返回按序拼接的载荷。
    ///
    /// # 契约说明（What）
    /// - 少于 3 字节或分段数为 0 的推送被丢弃；
    /// - 单段推送直接返回载荷；
    /// - 分段数与首段不一致、序号越界或重复的分段被忽略。
    pub fn push(&self, buffer: &[u8]) -> Option<Vec<u8>> {
        let [pti, count, index] = match buffer.get(..3) {
            Some(&[pti, count, index]) => [pti, count, index],
            _ => {
                warn!(len = buffer.len(), "ue policy segment shorter than its header");
                return None;
            }
        };
        let payload = &buffer[3..];
        if count == 0 {
            warn!(pti, "ue policy segment declares zero segments");
            return None;
        }
        if count == 1 {
            return Some(payload.to_vec());
        }
        if index == 0 || index > count {
            warn!(pti, index, count, "ue policy segment index out of range");
            return None;
        }

        let complete = {
            let mut pending = self.pending.entry(pti).or_insert_with(|| PendingSegments {
                count,
                parts: BTreeMap::new(),
            });
            if pending.count != count || pending.parts.contains_key(&index) {
                warn!(pti, index, count, "ignoring inconsistent ue policy segment");
                return None;
            }
            pending.parts.insert(index, payload.to_vec());
            pending.parts.len() == usize::from(count)
        };
        if !complete {
            return None;
        }
        self.pending
            .remove(&pti)
            .map(|(_, pending)| pending.parts.into_values().flatten().collect())
    }

    /// 尚未收齐的 PTI 数。
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 丢弃所有未完成的分段。
    pub fn clear(&self) {
        self.pending.clear();
    }
}
