//! Allowed NSSAI 注册表。
//!
//! # 设计动机（Why）
//! - 网络授权的切片列表会被整体推送替换，匹配器与 IMS 编码器在任意时刻读取；
//!   采用 [`ArcSwap`] 持有整张列表，读路径零锁、写路径整表替换，与规则集的发布方式一致；
//! - 漫游时不考虑切片授权：注册表对外表现为空，漫游状态由外部无线状态协作者提供。
//!
//! # 契约说明（What）
//! - [`AllowedSliceRegistry::decode`]：文本条目以 `;` 分隔，条目内 `:` 分隔本网与映射切片、
//!   `.` 分隔 SST 与 SD，数值十六进制；单条非法只跳过并记录日志；空缓冲清空注册表；
//! - [`AllowedSliceRegistry::contains`] 做结构比较；
//! - [`AllowedSliceRegistry::find_first_allowed`] 按调用方顺序返回首个已授权候选在注册表中的文本形式。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::slice::SliceIdentifier;

/// 外部无线状态协作者。
pub trait RadioState: Send + Sync {
    /// 主卡槽位。
    fn primary_slot(&self) -> u32;

    /// 指定槽位是否处于漫游。
    fn is_roaming(&self, slot: u32) -> bool;
}

/// 由调用方显式设置的无线状态，适合测试与单卡宿主；主卡槽固定为 0。
#[derive(Debug, Default)]
pub struct StaticRadioState {
    roaming: AtomicBool,
}

impl StaticRadioState {
    /// 非漫游、主卡槽为 0。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置漫游状态。
    pub fn set_roaming(&self, roaming: bool) {
        self.roaming.store(roaming, Ordering::Release);
    }
}

impl RadioState for StaticRadioState {
    fn primary_slot(&self) -> u32 {
        0
    }

    fn is_roaming(&self, _slot: u32) -> bool {
        self.roaming.load(Ordering::Acquire)
    }
}

/// 网络授权的切片集合。
pub struct AllowedSliceRegistry {
    entries: ArcSwap<Vec<SliceIdentifier>>,
    radio: Arc<dyn RadioState>,
}

impl AllowedSliceRegistry {
    /// 构造空注册表。
    pub fn new(radio: Arc<dyn RadioState>) -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            radio,
        }
    }

    /// 解码网络推送的 Allowed NSSAI 文本并整体替换。
    ///
    /// # 文法
    /// ```text
    /// buffer  = entry *( ";" entry )
    /// entry   = slice [ ":" slice ]      ; 本网切片 [":" 映射切片]
    /// slice   = sst [ "." sd ]           ; 十六进制，SST 取低 8 位，SD 取低 24 位
    /// ```
    /// `;` 是唯一的条目分隔符，因此 `"1.1:2.2"` 是**一个**带映射切片的条目，
    /// 而 `"1.1;2.2"` 才是两个条目。
    ///
    /// # 契约说明（What）
    /// - 空缓冲：清空注册表并返回成功；
    /// - 非 ASCII 字节：整体拒绝，注册表保持不变；
    /// - 单个条目非法：跳过并记录 `warn`，其余条目照常生效。
    pub fn decode(&self, buffer: &[u8]) -> Result<(), DecodeError> {
        if buffer.is_empty() {
            debug!("empty allowed-nssai push clears the registry");
            self.replace(Vec::new());
            return Ok(());
        }
        if !buffer.is_ascii() {
            return Err(DecodeError::StructuralMismatch {
                context: "allowed-nssai",
                reason: "entries must be ascii text",
            });
        }

        let text = String::from_utf8_lossy(buffer);
        let mut entries = Vec::new();
        for raw in text.split(';').filter(|raw| !raw.trim().is_empty()) {
            match SliceIdentifier::parse_text(raw) {
                Ok(slice) => entries.push(slice),
                Err(err) => warn!(entry = raw, error = %err, "skipping malformed allowed-nssai entry"),
            }
        }
        debug!(count = entries.len(), "allowed-nssai registry replaced");
        self.replace(entries);
        Ok(())
    }

    /// 整体替换授权列表。
    pub fn replace(&self, entries: Vec<SliceIdentifier>) {
        self.entries.store(Arc::new(entries));
    }

    /// 当前授权列表快照，不受漫游状态影响。
    pub fn snapshot(&self) -> Arc<Vec<SliceIdentifier>> {
        self.entries.load_full()
    }

    /// 候选是否被授权；漫游时恒为假。
    pub fn contains(&self, candidate: &SliceIdentifier) -> bool {
        self.lookup(candidate).is_some()
    }

    /// 返回首个被授权候选在注册表中的文本形式；漫游时恒为 `None`。
    pub fn find_first_allowed(&self, candidates: &[SliceIdentifier]) -> Option<String> {
        candidates.iter().find_map(|candidate| self.lookup(candidate))
    }

    fn lookup(&self, candidate: &SliceIdentifier) -> Option<String> {
        if self.is_roaming() {
            return None;
        }
        self.entries
            .load()
            .iter()
            .find(|entry| *entry == candidate)
            .map(|entry| entry.text().to_owned())
    }

    fn is_roaming(&self) -> bool {
        let slot = self.radio.primary_slot();
        self.radio.is_roaming(slot)
    }
}

impl core::fmt::Debug for AllowedSliceRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AllowedSliceRegistry")
            .field("entries", &self.entries.load())
            .finish()
    }
}
