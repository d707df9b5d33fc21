//! 日志订阅器安装。
//!
//! # 教案式说明
//! - **意图（Why）**：宿主只需调用一次 [`install`] 即可得到 `fmt + EnvFilter` 输出；
//! - **逻辑（How）**：优先读取 `RUST_LOG`，未设置或非法时回落到调用方给出的缺省指令；
//! - **契约（What）**：进程内只安装一次，重复调用或外部已设置全局订阅器时返回 `false` 且不做任何事。

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// 安装全局订阅器；返回本次调用是否完成了安装。
pub fn install(default_directive: &str) -> bool {
    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        let filter = build_env_filter(default_directive);
        installed_now = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok();
        installed_now
    });
    installed_now
}

fn build_env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_noop() {
        let _ = install("info");
        assert!(!install("debug"), "重复安装应返回 false");
    }
}
