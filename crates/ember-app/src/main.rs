// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use ember_core::{init_tracing, RenderSize};
use ember_engine::{Engine, EngineConfig, EngineSlot};
use ember_platform::WinitPlatform;
use ember_render_vk::VkBackend;
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine config file
    #[arg(long, default_value = "ember.toml")]
    config: PathBuf,
    /// Enable the Vulkan validation layer
    #[arg(long)]
    validation: bool,
    /// Window width in pixels
    #[arg(long)]
    width: Option<u32>,
    /// Window height in pixels
    #[arg(long)]
    height: Option<u32>,
}

impl Args {
    fn apply(&self, cfg: &mut EngineConfig) {
        if self.validation {
            cfg.validation = true;
        }
        cfg.window_size = RenderSize::new(
            self.width.unwrap_or(cfg.window_size.width),
            self.height.unwrap_or(cfg.window_size.height),
        );
    }
}

#[derive(Debug, Deserialize, Default)]
struct AppCfg {
    #[serde(default)]
    engine: EngineConfig,
}

fn parse_cfg(src: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(src)
}

fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s).unwrap_or_else(|e| {
            warn!("{}: {e}; using defaults", path.display());
            AppCfg::default()
        }),
        Err(_) => AppCfg::default(),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut cfg = load_cfg(&args.config).engine;
    args.apply(&mut cfg);
    info!(
        "{} {} validation={} overlap={} present={:?}",
        cfg.app_name, cfg.window_size, cfg.validation, cfg.frame_overlap, cfg.present_mode
    );

    let platform = WinitPlatform::new()?;
    let mut engine = Engine::new(EngineSlot::global(), cfg, platform, VkBackend);
    if let Err(e) = engine.init() {
        error!("init failed: {e:#}");
        engine.cleanup();
        return Err(e);
    }
    let res = engine.run();
    engine.cleanup();
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("ember-app").chain(extra.iter().copied()))
    }

    #[test]
    fn engine_table_overrides_defaults() {
        let cfg = parse_cfg(
            r#"
            [engine]
            window_title = "demo"
            frame_overlap = 3
            suspended_poll_interval_ms = 50
            "#,
        )
        .unwrap()
        .engine;
        assert_eq!(cfg.window_title, "demo");
        assert_eq!(cfg.frame_overlap, 3);
        assert_eq!(cfg.suspended_poll_interval_ms, 50);
        assert_eq!(cfg.window_size, RenderSize::new(1700, 900));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(parse_cfg("").unwrap().engine, EngineConfig::default());
    }

    #[test]
    fn bad_present_mode_is_a_parse_error() {
        assert!(parse_cfg("[engine]\npresent_mode = \"immediate\"").is_err());
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let cfg = parse_cfg("[render]\nclear_color = [0.0, 0.0, 0.0, 1.0]\n\n[engine]\nvalidation = true")
            .unwrap()
            .engine;
        assert!(cfg.validation);
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = load_cfg(Path::new("definitely/not/here/ember.toml"));
        assert_eq!(cfg.engine, EngineConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let mut cfg = EngineConfig::default();
        args(&["--validation", "--width", "800"]).apply(&mut cfg);
        assert!(cfg.validation);
        assert_eq!(cfg.window_size, RenderSize::new(800, 900));
    }

    #[test]
    fn no_flags_leave_config_alone() {
        let mut cfg = EngineConfig {
            validation: true,
            ..EngineConfig::default()
        };
        let a = args(&[]);
        assert_eq!(a.config, PathBuf::from("ember.toml"));
        a.apply(&mut cfg);
        assert!(cfg.validation);
        assert_eq!(cfg.window_size, EngineConfig::default().window_size);
    }
}
