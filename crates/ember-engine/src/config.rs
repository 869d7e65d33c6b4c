// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use ember_core::RenderSize;
use ember_render::{ChainConfig, ContextRequest, PresentMode, SurfaceFormat, FRAME_OVERLAP};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub app_name: String,
    pub window_title: String,
    pub window_size: RenderSize,
    pub validation: bool,
    pub frame_overlap: usize,
    /// Sleep between polls while minimized.
    pub suspended_poll_interval_ms: u64,
    pub present_mode: PresentMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            app_name: "Ember Engine".to_owned(),
            window_title: "Ember Engine".to_owned(),
            window_size: RenderSize::new(1700, 900),
            validation: false,
            frame_overlap: FRAME_OVERLAP,
            suspended_poll_interval_ms: 100,
            present_mode: PresentMode::Fifo,
        }
    }
}

impl EngineConfig {
    pub fn context_request(&self) -> ContextRequest {
        ContextRequest {
            app_name: self.app_name.clone(),
            validation: self.validation,
            ..ContextRequest::default()
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            format: SurfaceFormat::BGRA8_UNORM_SRGB_NONLINEAR,
            present_mode: self.present_mode,
        }
    }

    pub fn suspended_poll_interval(&self) -> Duration {
        Duration::from_millis(self.suspended_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_render::ApiVersion;

    #[test]
    fn defaults_match_the_documented_window() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.window_size, RenderSize::new(1700, 900));
        assert_eq!(cfg.frame_overlap, 2);
        assert_eq!(cfg.suspended_poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.chain_config(), ChainConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            validation = true
            present_mode = "mailbox"
            window_size = { width = 800, height = 600 }
            "#,
        )
        .unwrap();
        assert!(cfg.validation);
        assert_eq!(cfg.present_mode, PresentMode::Mailbox);
        assert_eq!(cfg.window_size, RenderSize::new(800, 600));
        assert_eq!(cfg.window_title, "Ember Engine");
    }

    #[test]
    fn context_request_carries_mandatory_requirements() {
        let cfg = EngineConfig {
            validation: true,
            ..EngineConfig::default()
        };
        let req = cfg.context_request();
        assert!(req.validation);
        assert_eq!(req.requirements.min_api_version, ApiVersion::V1_3);
        assert!(req.requirements.features.dynamic_rendering);
        assert!(req.requirements.features.buffer_device_address);
    }
}
