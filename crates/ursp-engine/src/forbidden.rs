//! 带过期时间的禁用路由表。
//!
//! # 契约说明（What）
//! - 切片激活结果为 `NORMAL_FAIL` 时，引擎把 `(ssc_mode, pdu_session_type, slice, dnn)` 写入本表；
//! - 条目在插入后经过 `ttl` 失效，每次查询前先清理过期条目；
//! - 判定为四个键全部相等。

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;
use ursp_core::{ForbiddenQuery, ForbiddenRoutes, PduSessionType};

/// 默认过期时间：12 分钟。
pub const DEFAULT_FORBIDDEN_TTL: Duration = Duration::from_secs(12 * 60);

/// 单个禁用条目。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ForbiddenRoute {
    /// SSC 模式。
    pub ssc_mode: Option<u8>,
    /// PDU 会话类型。
    pub pdu_session_type: Option<PduSessionType>,
    /// 切片文本。
    pub slice: String,
    /// DNN。
    pub dnn: String,
}

impl ForbiddenRoute {
    fn matches(&self, query: &ForbiddenQuery<'_>) -> bool {
        self.ssc_mode == query.ssc_mode
            && self.pdu_session_type == query.pdu_session_type
            && self.slice == query.slice
            && self.dnn == query.dnn
    }
}

/// 禁用路由表。
#[derive(Debug)]
pub struct ForbiddenRouteList {
    ttl: Duration,
    entries: Mutex<Vec<(ForbiddenRoute, Instant)>>,
}

impl Default for ForbiddenRouteList {
    fn default() -> Self {
        Self::new(DEFAULT_FORBIDDEN_TTL)
    }
}

impl ForbiddenRouteList {
    /// 指定过期时间的空表。
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// 以当前时间插入。
    pub fn insert(&self, route: ForbiddenRoute) {
        self.insert_at(route, Instant::now());
    }

    /// 以指定时间插入；同键条目刷新时间戳。
    pub fn insert_at(&self, route: ForbiddenRoute, now: Instant) {
        let mut entries = self.entries.lock();
        entries.retain(|(existing, _)| *existing != route);
        debug!(slice = %route.slice, dnn = %route.dnn, "route forbidden");
        entries.push((route, now));
    }

    /// 以指定时间判定。
    pub fn is_forbidden_at(&self, query: &ForbiddenQuery<'_>, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        let ttl = self.ttl;
        entries.retain(|(_, inserted)| now.saturating_duration_since(*inserted) < ttl);
        entries.iter().any(|(route, _)| route.matches(query))
    }

    /// 未过期条目数（不触发清理）。
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空。
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl ForbiddenRoutes for ForbiddenRouteList {
    fn is_forbidden(&self, query: &ForbiddenQuery<'_>) -> bool {
        self.is_forbidden_at(query, Instant::now())
    }
}
