use env_logger::{Builder, Env};

/// Install the process logger. `RUST_LOG` overrides the default `info` level.
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .try_init();
}
