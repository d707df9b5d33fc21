//! 事件协调器。
//!
//! # 教案式说明
//! - **意图（Why）**：把“推送解码 → 合法性校验 → 合并 → 回送 → 发布 → 通知”这条链路集中在一个
//!   显式持有全部状态的结构体里，不依赖进程级单例；
//! - **逻辑（How）**：
//!   1. [`SliceEngine::handle`] 穷尽匹配 [`SliceEvent`]，返回传输层需要发送的 [`Outbound`] 列表；
//!   2. 规则集按“静态配置打底、网络下发覆盖”的方式按 PLMN 整体发布到 [`RuleStore`]；
//!   3. [`SliceEngine::select_route`] 只读归属网络的规则集快照；
//!   4. 每次发布同时重算归属网络的流量描述符白名单，见 [`SliceEngine::traffic_whitelist`]；
//! - **契约（What）**：
//!   - 信封解码失败时不回送任何消息，已发布的规则保持不变；
//!   - 命令含非归属 PLMN 时整体拒绝，回送 COMMAND REJECT；
//!   - 接受命令后依次回送 COMPLETE、STATE INDICATION、IMS 路由描述符列表（索引非空时）与 URSP 变更通知。
//!
//! # 风险提示（Trade-offs）
//! - 事件处理在调用线程同步完成，宿主负责串行化事件；读路径（选路）可以与事件处理并发。

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use ursp_codec::outbound::CAUSE_PROTOCOL_ERROR_UNSPECIFIED;
use ursp_codec::{
    InstructionResult, ManageUePolicyCommand, PlmnReject, SegmentAssembler, WireVersion,
    build_command_reject, build_manage_complete, build_state_indication, decode_manage_command, ims,
};
use ursp_core::{
    AllowedSliceRegistry, AppDescriptor, PolicyRule, RadioState, RuleSet, SelectedRoute,
    StaticRadioState,
};
use ursp_profile::LoadedProfile;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{ACTIVATION_NORMAL_FAIL, Outbound, SliceEvent};
use crate::forbidden::ForbiddenRouteList;
use crate::matcher::PolicyMatcher;
use crate::policy_store::UePolicyStore;
use crate::rule_store::RuleStore;
use crate::update::UrspUpdate;
use crate::whitelist::TrafficWhitelist;

/// 切片策略引擎。
pub struct SliceEngine {
    config: EngineConfig,
    rules: RuleStore,
    registry: AllowedSliceRegistry,
    policies: UePolicyStore,
    profile: Mutex<LoadedProfile>,
    ims_rules: ArcSwap<BTreeMap<u8, PolicyRule>>,
    ehplmns: ArcSwap<Vec<String>>,
    whitelist: ArcSwap<TrafficWhitelist>,
    segments: SegmentAssembler,
    forbidden: ForbiddenRouteList,
    wire_version: Mutex<WireVersion>,
}

impl SliceEngine {
    /// 以缺省无线状态构造。
    pub fn new(config: EngineConfig) -> Self {
        Self::with_radio(config, Arc::new(StaticRadioState::new()))
    }

    /// 以外部无线状态构造；配置了持久化文件时恢复此前的 UE 策略。
    pub fn with_radio(config: EngineConfig, radio: Arc<dyn RadioState>) -> Self {
        let policies = match config.persistence_path.as_deref() {
            Some(path) => UePolicyStore::load(path).unwrap_or_else(|err| {
                warn!(error = %err, "failed to restore ue policy store");
                UePolicyStore::new()
            }),
            None => UePolicyStore::new(),
        };
        let engine = Self {
            forbidden: ForbiddenRouteList::new(config.forbidden_ttl()),
            config,
            rules: RuleStore::new(),
            registry: AllowedSliceRegistry::new(radio),
            policies,
            profile: Mutex::new(LoadedProfile::default()),
            ims_rules: ArcSwap::from_pointee(BTreeMap::new()),
            ehplmns: ArcSwap::from_pointee(Vec::new()),
            whitelist: ArcSwap::from_pointee(TrafficWhitelist::default()),
            segments: SegmentAssembler::new(),
            wire_version: Mutex::new(WireVersion::V1520),
        };
        engine.publish_rules();
        engine
    }

    /// 处理一个事件，返回需要发送的消息。
    pub fn handle(&self, event: SliceEvent) -> Vec<Outbound> {
        match event {
            SliceEvent::UrspPush(buffer) => match self.segments.push(&buffer) {
                Some(payload) => self.handle_command(&payload).unwrap_or_else(|err| {
                    warn!(error = %err, "ue policy command dropped");
                    Vec::new()
                }),
                None => Vec::new(),
            },
            SliceEvent::AllowedNssaiPush(buffer) => {
                if let Err(err) = self.registry.decode(&buffer) {
                    warn!(error = %err, "allowed-nssai push rejected");
                }
                Vec::new()
            }
            SliceEvent::EhplmnPush(buffer) => {
                self.set_ehplmns(&String::from_utf8_lossy(&buffer));
                Vec::new()
            }
            SliceEvent::ProfileLoaded(profile) => self.apply_profile(profile),
            SliceEvent::ActivationResult { route, result } => {
                if result == ACTIVATION_NORMAL_FAIL {
                    self.forbidden.insert(route);
                }
                Vec::new()
            }
            SliceEvent::SimAbsent => {
                info!("sim absent, dropping network delivered ue policies");
                self.policies.clear();
                self.segments.clear();
                self.ehplmns.store(Arc::new(Vec::new()));
                self.publish_rules();
                Vec::new()
            }
        }
    }

    /// 以归属网络的规则集为业务流选路。
    pub fn select_route(&self, app: &AppDescriptor) -> Option<SelectedRoute> {
        let rules = self.rules.get(&self.home_plmn())?;
        PolicyMatcher::new(&self.registry, &self.forbidden).select_route(&rules, app)
    }

    /// 按 DNN 查找归属网络规则选出的切片与 SSC 模式；路由未声明 SSC 模式时取 0。
    pub fn route_for_dnn(&self, dnn: &str) -> Option<(String, u8)> {
        let app = AppDescriptor {
            dnn: dnn.to_owned(),
            ..AppDescriptor::default()
        };
        self.select_route(&app)
            .map(|selected| (selected.slice, selected.ssc_mode.unwrap_or_default()))
    }

    /// 业务流的 IP 三元组是否被归属网络的某条规则列出。
    pub fn ip_three_tuple_listed(&self, app: &AppDescriptor) -> bool {
        self.rules.get(&self.home_plmn()).is_some_and(|rules| {
            PolicyMatcher::new(&self.registry, &self.forbidden).ip_three_tuple_listed(&rules, app)
        })
    }

    /// 归属网络规则集汇总出的流量描述符白名单。
    pub fn traffic_whitelist(&self) -> Arc<TrafficWhitelist> {
        self.whitelist.load_full()
    }

    /// 指定网络的兜底路由。
    pub fn match_all_route(&self, plmn: &str) -> SelectedRoute {
        let rules = self.rules.get(plmn);
        PolicyMatcher::new(&self.registry, &self.forbidden).match_all_route(rules.as_deref())
    }

    /// 归属 PLMN：EHPLMN 列表首项，缺省取配置值。
    pub fn home_plmn(&self) -> String {
        self.ehplmns
            .load()
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.default_hplmn.clone())
    }

    /// 授权切片注册表。
    pub fn registry(&self) -> &AllowedSliceRegistry {
        &self.registry
    }

    /// 已发布的规则集。
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// 禁用路由表。
    pub fn forbidden(&self) -> &ForbiddenRouteList {
        &self.forbidden
    }

    /// 网络下发的 UE 策略。
    pub fn policies(&self) -> &UePolicyStore {
        &self.policies
    }

    /// 当前 IMS 路由描述符列表编码。
    pub fn ims_rsd_list(&self) -> Vec<u8> {
        let version = *self.wire_version.lock();
        let ims_rules = self.ims_rules.load();
        ims::encode(version, ims_rules.values(), &self.registry, &self.forbidden)
    }

    /// 从配置的静态配置文件路径加载并应用；未配置路径时返回空列表。
    pub fn load_configured_profile(&self) -> Result<Vec<Outbound>, EngineError> {
        let Some(path) = self.config.profile_path.as_deref() else {
            return Ok(Vec::new());
        };
        let profile = ursp_profile::load(path)?;
        Ok(self.apply_profile(profile))
    }

    fn handle_command(&self, payload: &[u8]) -> Result<Vec<Outbound>, EngineError> {
        let command = decode_manage_command(payload)?;
        let rejects = self.foreign_rejects(&command);
        if !rejects.is_empty() {
            let err = EngineError::ForeignPlmn {
                home: self.home_plmn(),
                foreign: rejects.iter().map(|reject| reject.plmn.to_string()).collect(),
            };
            warn!(pti = command.pti, error = %err, "ue policy command rejected");
            return Ok(vec![Outbound::DecodeResult(build_command_reject(
                command.pti,
                &rejects,
            ))]);
        }
        if let Some(version) = command.decoded_version {
            *self.wire_version.lock() = version;
        }

        let mut outbound = vec![Outbound::DecodeResult(build_manage_complete(command.pti))];
        self.policies.merge(command.sections);
        outbound.push(Outbound::UePolicySectionIdentifier(self.state_indication()));
        self.publish_rules();
        if !self.ims_rules.load().is_empty() {
            outbound.push(Outbound::ImsRsdList(self.ims_rsd_list()));
        }
        if let Some(path) = self.config.persistence_path.as_deref() {
            if let Err(err) = self.policies.save(path) {
                warn!(error = %err, "failed to persist ue policy store");
            }
        }
        outbound.push(Outbound::UrspUpdated(self.ursp_update()));
        debug!(pti = command.pti, messages = outbound.len(), "ue policy command accepted");
        Ok(outbound)
    }

    /// 非归属 PLMN 的拒绝项，每个携带 URSP 的指令一条结果。
    fn foreign_rejects(&self, command: &ManageUePolicyCommand) -> Vec<PlmnReject> {
        let home = self.home_plmn();
        command
            .sections
            .iter()
            .filter(|(plmn, _)| **plmn != home)
            .map(|(_, section)| PlmnReject {
                plmn: section.plmn,
                results: section
                    .instruction_order
                    .iter()
                    .map(|(order, upsc)| InstructionResult {
                        upsc: *upsc,
                        failed_order: *order,
                        cause: CAUSE_PROTOCOL_ERROR_UNSPECIFIED,
                    })
                    .collect(),
            })
            .collect()
    }

    fn state_indication(&self) -> Vec<u8> {
        let version = *self.wire_version.lock();
        let lists = self.policies.upsc_lists();
        build_state_indication(
            lists.iter().map(|(plmn, upscs)| (*plmn, upscs.iter())),
            version,
        )
    }

    fn ursp_update(&self) -> UrspUpdate {
        UrspUpdate::from_selected(self.match_all_route(&self.home_plmn()))
    }

    fn apply_profile(&self, profile: LoadedProfile) -> Vec<Outbound> {
        info!(
            networks = profile.policies.len(),
            ims_rules = profile.ims_rules.len(),
            skipped = profile.skipped,
            "static ursp profile applied"
        );
        *self.profile.lock() = profile;
        self.publish_rules();
        let mut outbound = Vec::new();
        if !self.ims_rules.load().is_empty() {
            outbound.push(Outbound::ImsRsdList(self.ims_rsd_list()));
        }
        outbound.push(Outbound::UrspUpdated(self.ursp_update()));
        outbound
    }

    /// 静态配置打底、网络下发覆盖，整体发布；IMS 索引同样以静态配置打底，
    /// 归属网络下发的 IMS 规则按优先级覆盖。
    fn publish_rules(&self) {
        let (mut merged, mut index): (BTreeMap<String, RuleSet>, BTreeMap<u8, PolicyRule>) = {
            let profile = self.profile.lock();
            (profile.policies.clone(), profile.ims_rules.clone())
        };
        let delivered = self.policies.rule_sets();
        if let Some(home_rules) = delivered.get(&self.home_plmn()) {
            index.extend(
                home_rules
                    .rules()
                    .iter()
                    .filter(|rule| rule.traffic_descriptor.targets_ims())
                    .map(|rule| (rule.precedence, rule.clone())),
            );
        }
        self.ims_rules.store(Arc::new(index));
        merged.extend(delivered);

        let whitelist = merged
            .get(&self.home_plmn())
            .map(TrafficWhitelist::from_rules)
            .unwrap_or_default();
        debug!(
            apps = whitelist.os_app_ids.len(),
            dnns = whitelist.dnns.len(),
            fqdns = whitelist.fqdns.len(),
            "traffic descriptor whitelist rebuilt"
        );
        self.whitelist.store(Arc::new(whitelist));
        self.rules.replace_all(merged);
    }

    fn set_ehplmns(&self, text: &str) {
        let list: Vec<String> = text
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_owned)
            .collect();
        if list.is_empty() {
            warn!("ignoring empty ehplmn push");
            return;
        }
        debug!(?list, "ehplmn list updated");
        self.ehplmns.store(Arc::new(list));
        self.publish_rules();
    }
}

impl core::fmt::Debug for SliceEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SliceEngine")
            .field("home_plmn", &self.home_plmn())
            .field("networks", &self.rules.snapshot().len())
            .field("ue_policies", &self.policies.len())
            .field("ims_rules", &self.ims_rules.load().len())
            .finish()
    }
}
