//! 回送给网络侧的 UE 策略消息。
//!
//! # 契约说明（What）
//! - COMPLETE：`pti | 0`；
//! - COMMAND REJECT：`pti | 1 | totalLength u16 | 每个 PLMN { resultCount u8 | plmn[3] |
//!   每条结果 { upsc u16 | failedInstructionOrder u16 | cause u8 } }`；
//! - STATE INDICATION：`0 | 2 | upsiListLength u16 | 每个 PLMN { sublistLength u16 | plmn[3] |
//!   upsc u16 × n } | 1 | 0 | version u16`。
//!
//! 编码器只拼字节，不决定何时发送。

use tracing::warn;
use ursp_core::Plmn;

use crate::version::WireVersion;

/// MANAGE UE POLICY COMPLETE。
pub const MSG_MANAGE_UE_POLICY_COMPLETE: u8 = 0;
/// MANAGE UE POLICY COMMAND REJECT。
pub const MSG_MANAGE_UE_POLICY_COMMAND_REJECT: u8 = 1;
/// UE STATE INDICATION。
pub const MSG_UE_STATE_INDICATION: u8 = 2;
/// 拒绝原因：协议错误，未指明。
pub const CAUSE_PROTOCOL_ERROR_UNSPECIFIED: u8 = 0x6F;

/// 单条指令的拒绝结果。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstructionResult {
    /// 被拒绝指令的 UPSC。
    pub upsc: u16,
    /// 指令在段内的序号（1 起）。
    pub failed_order: u16,
    /// 原因值。
    pub cause: u8,
}

/// 单个 PLMN 的拒绝结果集合。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlmnReject {
    /// PLMN。
    pub plmn: Plmn,
    /// 指令结果。
    pub results: Vec<InstructionResult>,
}

/// 构造 COMPLETE。
pub fn build_manage_complete(pti: u8) -> Vec<u8> {
    vec![pti, MSG_MANAGE_UE_POLICY_COMPLETE]
}

/// 构造 COMMAND REJECT；每个 PLMN 的结果数写入其 `resultCount`。
///
/// `resultCount` 只有一个字节，单个 PLMN 超过 255 条结果时只写出前 255 条，
/// `totalLength` 与实际写出的内容保持一致。
pub fn build_command_reject(pti: u8, rejects: &[PlmnReject]) -> Vec<u8> {
    let encoded: Vec<(&PlmnReject, &[InstructionResult])> = rejects
        .iter()
        .map(|reject| {
            let count = reject.results.len().min(usize::from(u8::MAX));
            if count < reject.results.len() {
                warn!(
                    plmn = %reject.plmn,
                    results = reject.results.len(),
                    kept = count,
                    "reject result count exceeds one byte, truncating"
                );
            }
            (reject, &reject.results[..count])
        })
        .collect();
    let total: usize = encoded.iter().map(|(_, results)| 1 + 3 + 5 * results.len()).sum();
    let mut out = Vec::with_capacity(4 + total);
    out.push(pti);
    out.push(MSG_MANAGE_UE_POLICY_COMMAND_REJECT);
    out.extend_from_slice(&(total as u16).to_be_bytes());
    for (reject, results) in encoded {
        out.push(results.len() as u8);
        out.extend_from_slice(&reject.plmn.encode());
        for result in results {
            out.extend_from_slice(&result.upsc.to_be_bytes());
            out.extend_from_slice(&result.failed_order.to_be_bytes());
            out.push(result.cause);
        }
    }
    out
}

/// 构造 STATE INDICATION，列出当前持有的全部 UPSC 与成功解码的线路版本。
pub fn build_state_indication<'a, I, U>(sections: I, version: WireVersion) -> Vec<u8>
where
    I: IntoIterator<Item = (Plmn, U)>,
    U: IntoIterator<Item = &'a u16>,
{
    let mut upsi_list = Vec::new();
    for (plmn, upscs) in sections {
        let upscs: Vec<u16> = upscs.into_iter().copied().collect();
        let sublist_len = 3 + 2 * upscs.len();
        upsi_list.extend_from_slice(&(sublist_len as u16).to_be_bytes());
        upsi_list.extend_from_slice(&plmn.encode());
        for upsc in upscs {
            upsi_list.extend_from_slice(&upsc.to_be_bytes());
        }
    }

    let mut out = Vec::with_capacity(4 + upsi_list.len() + 4);
    out.push(0);
    out.push(MSG_UE_STATE_INDICATION);
    out.extend_from_slice(&(upsi_list.len() as u16).to_be_bytes());
    out.extend(upsi_list);
    out.push(1);
    out.push(0);
    out.extend_from_slice(&version.code().to_be_bytes());
    out
}
