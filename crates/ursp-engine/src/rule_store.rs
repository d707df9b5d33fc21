//! 按 PLMN 保存已发布的规则集。
//!
//! # 教案式说明
//! - **意图（Why）**：匹配路径只读快照，发布路径整表替换，读写互不阻塞；
//! - **逻辑（How）**：[`ArcSwap`] 持有 `PLMN → Arc<RuleSet>` 映射，发布时整表替换，不做单键修改；
//! - **契约（What）**：读者拿到的 [`Arc<RuleSet>`] 在其生命周期内不会被修改。

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;
use ursp_core::RuleSet;

type RuleMap = BTreeMap<String, Arc<RuleSet>>;

/// 规则集仓库。
#[derive(Debug)]
pub struct RuleStore {
    rules: ArcSwap<RuleMap>,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self {
            rules: ArcSwap::from_pointee(RuleMap::new()),
        }
    }
}

impl RuleStore {
    /// 空仓库。
    pub fn new() -> Self {
        Self::default()
    }

    /// 以新映射整体替换。
    pub fn replace_all(&self, rules: BTreeMap<String, RuleSet>) {
        let next: RuleMap = rules
            .into_iter()
            .map(|(plmn, set)| (plmn, Arc::new(set)))
            .collect();
        info!(networks = next.len(), "ursp rule sets replaced");
        self.rules.store(Arc::new(next));
    }

    /// 读取单个网络的规则集快照。
    pub fn get(&self, plmn: &str) -> Option<Arc<RuleSet>> {
        self.rules.load().get(plmn).cloned()
    }

    /// 当前所有网络的快照。
    pub fn snapshot(&self) -> Arc<RuleMap> {
        self.rules.load_full()
    }

    /// 清空。
    pub fn clear(&self) {
        self.rules.store(Arc::new(RuleMap::new()));
    }
}
