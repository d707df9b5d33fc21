//! “禁用路由”谓词契约。
//!
//! # 契约说明（What）
//! - 匹配器与 IMS 编码器在挑选路由前询问 [`ForbiddenRoutes::is_forbidden`]；
//! - 查询总是携带 `(pdu_session_type, ssc_mode)`，切片与 DNN 未确定时传空串。
//!
//! # 风险提示（Trade-offs）
//! - 谓词会在一次选路中被多次调用，实现应只做内存查找，不得阻塞。

use crate::model::PduSessionType;

/// 单次禁用查询。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ForbiddenQuery<'a> {
    /// PDU 会话类型。
    pub pdu_session_type: Option<PduSessionType>,
    /// SSC 模式。
    pub ssc_mode: Option<u8>,
    /// 切片文本形式，未确定时为空。
    pub slice: &'a str,
    /// DNN，未确定时为空。
    pub dnn: &'a str,
}

impl<'a> ForbiddenQuery<'a> {
    /// 只带会话类型与 SSC 模式的查询。
    pub fn session(pdu_session_type: Option<PduSessionType>, ssc_mode: Option<u8>) -> Self {
        Self {
            pdu_session_type,
            ssc_mode,
            slice: "",
            dnn: "",
        }
    }

    /// 补充切片与 DNN。
    #[must_use]
    pub fn with_target(self, slice: &'a str, dnn: &'a str) -> Self {
        Self { slice, dnn, ..self }
    }
}

/// 外部提供的禁用路由判定。
pub trait ForbiddenRoutes: Send + Sync {
    /// 该组合当前是否被禁用。
    fn is_forbidden(&self, query: &ForbiddenQuery<'_>) -> bool;
}

/// 从不禁用任何路由。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoForbiddenRoutes;

impl ForbiddenRoutes for NoForbiddenRoutes {
    fn is_forbidden(&self, _query: &ForbiddenQuery<'_>) -> bool {
        false
    }
}

impl<T: ForbiddenRoutes + ?Sized> ForbiddenRoutes for &T {
    fn is_forbidden(&self, query: &ForbiddenQuery<'_>) -> bool {
        (**self).is_forbidden(query)
    }
}

impl<T: ForbiddenRoutes + ?Sized> ForbiddenRoutes for std::sync::Arc<T> {
    fn is_forbidden(&self, query: &ForbiddenQuery<'_>) -> bool {
        (**self).is_forbidden(query)
    }
}
