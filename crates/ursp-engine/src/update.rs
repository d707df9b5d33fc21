//! URSP 变更通知。
//!
//! # 契约说明（What）
//! - `routeBitmap` 总是出现；
//! - bit0（match-all）置位时追加 `sscMode`、`sNssai`、`dnn`、`urspPrecedence`，
//!   `pduSessionType` 仅在已设置时以下游编号出现；
//! - 对外以“字符串 → 字符串”的 JSON 对象交付。

use std::collections::BTreeMap;

use ursp_core::{RouteFlag, SelectedRoute};

/// 通知载荷。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UrspUpdate {
    /// 兜底路由的选路结果。
    pub route: SelectedRoute,
}

impl UrspUpdate {
    /// 由兜底选路结果构造。
    pub fn from_selected(route: SelectedRoute) -> Self {
        Self { route }
    }

    /// 字符串映射形式。
    pub fn to_string_map(&self) -> BTreeMap<&'static str, String> {
        let route = &self.route;
        let mut data = BTreeMap::new();
        data.insert("routeBitmap", route.route_bitmap.bits().to_string());
        if route.route_bitmap.contains(RouteFlag::MatchAll) {
            data.insert("sscMode", route.ssc_mode.unwrap_or_default().to_string());
            if let Some(kind) = route.pdu_session_type {
                data.insert("pduSessionType", kind.downstream_code().to_string());
            }
            data.insert("sNssai", route.slice.clone());
            data.insert("dnn", route.dnn.clone());
            data.insert("urspPrecedence", route.ursp_precedence.to_string());
        }
        data
    }

    /// JSON 文本形式。
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_string_map())
    }
}
