//! 网络下发的 UE 策略存储、合并与持久化。
//!
//! # 教案式说明
//! - **意图（Why）**：网络按 PLMN 与 UPSC 增量下发策略，引擎需要维护累计视图，并在重启后恢复；
//! - **逻辑（How）**：
//!   - 新 PLMN 整段写入；
//!   - 已有 PLMN 按 UPSC 合并：新 UPSC 写入，携带 URSP 的替换旧值，不携带 URSP 的删除旧值；
//!   - 指令清空后的 PLMN 被移除；
//! - **契约（What）**：合并后由 [`UePolicyStore::rule_sets`] 重建每个 PLMN 的规则集；持久化文件缺失
//!   视为空存储，内容损坏只记录告警。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};
use ursp_codec::UePolicySection;
use ursp_core::{Plmn, RuleSet};

use crate::error::EngineError;

type SectionMap = BTreeMap<String, UePolicySection>;

/// UE 策略存储。
#[derive(Debug, Default)]
pub struct UePolicyStore {
    sections: Mutex<SectionMap>,
}

impl UePolicyStore {
    /// 空存储。
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一次解码结果。
    pub fn merge(&self, decoded: SectionMap) {
        let mut sections = self.sections.lock();
        for (plmn, incoming) in decoded {
            let Some(existing) = sections.get_mut(&plmn) else {
                debug!(plmn = %plmn, instructions = incoming.instructions.len(), "new ue policy section");
                sections.insert(plmn, incoming);
                continue;
            };
            for (upsc, instruction) in incoming.instructions {
                if !existing.instructions.contains_key(&upsc) || instruction.has_ursp {
                    existing.instructions.insert(upsc, instruction);
                } else {
                    debug!(plmn = %plmn, upsc, "ue policy instruction deleted");
                    existing.instructions.remove(&upsc);
                }
            }
            existing.instruction_order = incoming.instruction_order;
        }
        sections.retain(|_, section| !section.instructions.is_empty());
    }

    /// 每个 PLMN 的规则集，由全部指令的规则拼接后排序。
    pub fn rule_sets(&self) -> BTreeMap<String, RuleSet> {
        self.sections
            .lock()
            .iter()
            .map(|(plmn, section)| {
                (
                    plmn.clone(),
                    RuleSet::from_rules(section.rules().cloned().collect()),
                )
            })
            .collect()
    }

    /// 每个 PLMN 当前持有的 UPSC 列表，供 STATE INDICATION 使用。
    pub fn upsc_lists(&self) -> Vec<(Plmn, Vec<u16>)> {
        self.sections
            .lock()
            .values()
            .map(|section| (section.plmn, section.instructions.keys().copied().collect()))
            .collect()
    }

    /// 当前持有的 PLMN 数。
    pub fn len(&self) -> usize {
        self.sections.lock().len()
    }

    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空内存中的策略。
    pub fn clear(&self) {
        self.sections.lock().clear();
    }

    /// 写入 JSON 文件。
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let encoded = serde_json::to_vec_pretty(&*self.sections.lock())?;
        std::fs::write(path, encoded).map_err(|source| EngineError::Persistence {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 从 JSON 文件恢复；文件缺失得到空存储，内容损坏记录告警后得到空存储。
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(EngineError::Persistence {
                    path: PathBuf::from(path),
                    source,
                });
            }
        };
        match serde_json::from_slice::<SectionMap>(&raw) {
            Ok(sections) => Ok(Self {
                sections: Mutex::new(sections),
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring corrupt ue policy store");
                Ok(Self::new())
            }
        }
    }
}
