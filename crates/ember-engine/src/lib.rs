// SPDX-License-Identifier: CEPL-1.0
//! Engine lifecycle: `init` builds window → context → presentation chain →
//! frame ring, `run` drives the event/draw loop, `cleanup` releases it all
//! in reverse.
#![deny(unsafe_op_in_unsafe_fn)]

mod config;
mod draw;
mod engine;
mod slot;

pub use config::EngineConfig;
pub use draw::{DrawHook, FrameContext, NoopDraw};
pub use engine::{Engine, EngineError, EngineState};
pub use slot::{EngineId, EngineSlot};
