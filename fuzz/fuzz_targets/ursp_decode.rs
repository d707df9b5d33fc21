#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use ursp_codec::{decode_manage_command, decode_with_fallback};
use ursp_core::{AllowedSliceRegistry, StaticRadioState};

// 任意字节都不得触发 panic；解码成功的规则集必须按优先级升序。
fuzz_target!(|data: &[u8]| {
    if let Ok(decoded) = decode_with_fallback(data) {
        let precedences: Vec<u8> = decoded.rules.rules().iter().map(|rule| rule.precedence).collect();
        assert!(precedences.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    let _ = decode_manage_command(data);

    let registry = AllowedSliceRegistry::new(Arc::new(StaticRadioState::new()));
    if registry.decode(data).is_ok() {
        for entry in registry.snapshot().iter() {
            assert!(registry.contains(entry));
        }
    }
});
