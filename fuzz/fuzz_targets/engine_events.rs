#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ursp_core::AppDescriptor;
use ursp_engine::{EngineConfig, ForbiddenRoute, SliceEngine, SliceEvent};

/// Fuzz 指令：一次事件序列。
///
/// - **Why**：分段重组、合并与发布跨越多个事件，单次解码的 fuzz 覆盖不到乱序与交错；
/// - **What**：任意事件序列下引擎不得 panic，每次选路都只读取一致快照。
#[derive(Debug, Arbitrary)]
struct EngineCase {
    ops: Vec<EngineOp>,
}

#[derive(Debug, Arbitrary)]
enum EngineOp {
    Segment(Vec<u8>),
    Allowed(Vec<u8>),
    Ehplmn(Vec<u8>),
    Forbid { dnn: String, slice: String },
    SimAbsent,
    Select { dnn: String, port: Option<u16> },
}

fuzz_target!(|case: EngineCase| {
    let engine = SliceEngine::new(EngineConfig::default());
    for op in case.ops {
        match op {
            EngineOp::Segment(buffer) => {
                engine.handle(SliceEvent::UrspPush(buffer));
            }
            EngineOp::Allowed(buffer) => {
                engine.handle(SliceEvent::AllowedNssaiPush(buffer));
            }
            EngineOp::Ehplmn(buffer) => {
                engine.handle(SliceEvent::EhplmnPush(buffer));
            }
            EngineOp::Forbid { dnn, slice } => {
                let route = ForbiddenRoute {
                    ssc_mode: None,
                    pdu_session_type: None,
                    slice,
                    dnn,
                };
                engine.handle(SliceEvent::ActivationResult { route, result: 1 });
            }
            EngineOp::SimAbsent => {
                engine.handle(SliceEvent::SimAbsent);
            }
            EngineOp::Select { dnn, port } => {
                let app = AppDescriptor {
                    dnn,
                    remote_port: port,
                    ..AppDescriptor::default()
                };
                let first = engine.select_route(&app);
                assert_eq!(first, engine.select_route(&app), "相同快照下选路结果应稳定");
            }
        }
    }
});
