// SPDX-License-Identifier: CEPL-1.0
//! Physical device requirements and the selection policy applied to them.
//!
//! Backends describe every physical device as a plain [`DeviceCandidate`];
//! the policy here never touches driver handles, so it is unit-testable.
use tracing::{debug, info};

use crate::{NegotiationError, Rejection};

/// Vulkan-style packed version (`major.minor.patch`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub const V1_2: Self = Self::new(1, 2, 0);
    pub const V1_3: Self = Self::new(1, 3, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Same bit layout as `VK_MAKE_API_VERSION` with variant 0.
    pub const fn to_raw(self) -> u32 {
        (self.major << 22) | (self.minor << 12) | self.patch
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self {
            major: (raw >> 22) & 0x7f,
            minor: (raw >> 12) & 0x3ff,
            patch: raw & 0xfff,
        }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Feature switches the engine cares about. Used both for what is required
/// and for what a device reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    // Vulkan 1.3
    pub dynamic_rendering: bool,
    pub synchronization2: bool,
    // Vulkan 1.2
    pub buffer_device_address: bool,
    pub descriptor_indexing: bool,
}

impl DeviceFeatures {
    pub const ALL: Self = Self {
        dynamic_rendering: true,
        synchronization2: true,
        buffer_device_address: true,
        descriptor_indexing: true,
    };

    /// Names of features required by `self` that `supported` lacks.
    pub fn missing_from(&self, supported: &DeviceFeatures) -> Vec<&'static str> {
        let checks = [
            ("dynamicRendering", self.dynamic_rendering, supported.dynamic_rendering),
            ("synchronization2", self.synchronization2, supported.synchronization2),
            ("bufferDeviceAddress", self.buffer_device_address, supported.buffer_device_address),
            ("descriptorIndexing", self.descriptor_indexing, supported.descriptor_indexing),
        ];
        checks
            .into_iter()
            .filter(|&(_, want, have)| want && !have)
            .map(|(name, _, _)| name)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl DeviceType {
    // lower is better
    fn rank(self) -> u8 {
        match self {
            DeviceType::Discrete => 0,
            DeviceType::Integrated => 1,
            DeviceType::Virtual => 2,
            DeviceType::Cpu => 3,
            DeviceType::Other => 4,
        }
    }
}

/// Everything the policy needs to know about one physical device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub name: String,
    pub device_type: DeviceType,
    pub api_version: ApiVersion,
    pub features: DeviceFeatures,
    /// First queue family with graphics support that can present to the
    /// target surface.
    pub graphics_present_family: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selected {
    pub index: usize,
    pub queue_family: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceRequirements {
    pub min_api_version: ApiVersion,
    pub features: DeviceFeatures,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            min_api_version: ApiVersion::V1_3,
            features: DeviceFeatures::ALL,
        }
    }
}

impl DeviceRequirements {
    /// Queue family to use on `candidate`, or why it is unusable.
    pub fn evaluate(&self, candidate: &DeviceCandidate) -> Result<u32, Rejection> {
        if candidate.api_version < self.min_api_version {
            return Err(Rejection::ApiTooOld {
                have: candidate.api_version,
                need: self.min_api_version,
            });
        }
        let missing = self.features.missing_from(&candidate.features);
        if !missing.is_empty() {
            return Err(Rejection::MissingFeatures(missing));
        }
        candidate.graphics_present_family.ok_or(Rejection::NoPresentQueue)
    }

    /// Best suitable candidate: device type first, enumeration order second.
    pub fn select(&self, candidates: &[DeviceCandidate]) -> Result<Selected, NegotiationError> {
        if candidates.is_empty() {
            return Err(NegotiationError::NoPhysicalDevices);
        }

        let mut best: Option<(Selected, u8)> = None;
        let mut rejected = Vec::new();
        for (index, c) in candidates.iter().enumerate() {
            match self.evaluate(c) {
                Ok(queue_family) => {
                    let rank = c.device_type.rank();
                    debug!(device = %c.name, device_type = ?c.device_type, queue_family, "suitable");
                    if best.map_or(true, |(_, r)| rank < r) {
                        best = Some((Selected { index, queue_family }, rank));
                    }
                }
                Err(why) => {
                    debug!(device = %c.name, "rejected: {why}");
                    rejected.push((c.name.clone(), why));
                }
            }
        }

        match best {
            Some((selected, _)) => {
                let c = &candidates[selected.index];
                info!(
                    "selected GPU {} ({:?}, API {}, queue family {})",
                    c.name, c.device_type, c.api_version, selected.queue_family
                );
                Ok(selected)
            }
            None => Err(NegotiationError::NoSuitableDevice { rejected }),
        }
    }
}

/// Configuration for context negotiation; consumed by a single fallible
/// backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextRequest {
    pub app_name: String,
    pub engine_name: String,
    /// Enable the validation layer and route its messages into the log.
    pub validation: bool,
    pub requirements: DeviceRequirements,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            app_name: "Ember Engine".to_owned(),
            engine_name: "ember".to_owned(),
            validation: false,
            requirements: DeviceRequirements::default(),
        }
    }
}
