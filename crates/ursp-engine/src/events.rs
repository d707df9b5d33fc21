//! 引擎输入事件与输出消息。
//!
//! 事件集合封闭，[`crate::SliceEngine::handle`] 穷尽匹配。

use ursp_profile::LoadedProfile;

use crate::forbidden::ForbiddenRoute;
use crate::update::UrspUpdate;

/// 切片激活结果：普通失败。
pub const ACTIVATION_NORMAL_FAIL: i32 = 1;

/// 输入事件。
#[derive(Clone, Debug)]
pub enum SliceEvent {
    /// 调制解调器推送的 UE 策略分段。
    UrspPush(Vec<u8>),
    /// Allowed NSSAI 文本。
    AllowedNssaiPush(Vec<u8>),
    /// 逗号分隔的 EHPLMN 文本。
    EhplmnPush(Vec<u8>),
    /// 静态配置文件加载完成。
    ProfileLoaded(LoadedProfile),
    /// 切片激活结果。
    ActivationResult {
        /// 尝试激活的路由。
        route: ForbiddenRoute,
        /// 结果码。
        result: i32,
    },
    /// SIM 卡移除。
    SimAbsent,
}

/// 需要交由传输层发送的消息。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outbound {
    /// COMPLETE 或 COMMAND REJECT。
    DecodeResult(Vec<u8>),
    /// UE STATE INDICATION。
    UePolicySectionIdentifier(Vec<u8>),
    /// IMS 路由描述符列表。
    ImsRsdList(Vec<u8>),
    /// URSP 变更通知。
    UrspUpdated(UrspUpdate),
}
