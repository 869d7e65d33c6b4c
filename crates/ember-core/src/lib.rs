// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use serde::Deserialize;

/// Drawable size in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports 0 on one axis; nothing can be presented then.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for RenderSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Installs the global `fmt` subscriber, filtered by `RUST_LOG`. Returns
/// false when a subscriber was already installed.
pub fn init_tracing() -> bool {
    use tracing_subscriber::{fmt, EnvFilter};
    let installed = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("tracing initialized");
    }
    installed
}
