// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::select::ApiVersion;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("frame ring needs at least one slot")]
    EmptyRing,
    #[error("cannot build a presentation chain for an empty extent ({width}x{height})")]
    EmptyExtent { width: u32, height: u32 },
}

/// Why a physical device was passed over.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("API {have} is older than the required {need}")]
    ApiTooOld { have: ApiVersion, need: ApiVersion },
    #[error("missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<&'static str>),
    #[error("no graphics queue family can present to the surface")]
    NoPresentQueue,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("no Vulkan-capable physical devices found")]
    NoPhysicalDevices,
    #[error("no suitable GPU: {}", describe(.rejected))]
    NoSuitableDevice { rejected: Vec<(String, Rejection)> },
}

fn describe(rejected: &[(String, Rejection)]) -> String {
    rejected
        .iter()
        .map(|(name, why)| format!("{name} ({why})"))
        .collect::<Vec<_>>()
        .join("; ")
}
