// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use tracing::debug;

use crate::{CommandPoolFlags, GpuDevice, RenderError};

/// Frames the CPU may record ahead of the GPU.
pub const FRAME_OVERLAP: usize = 2;

/// Ring slot used for `frame_number`. `ring_size` must be non-zero; a
/// [`FrameRing`] never has zero slots.
#[inline]
pub fn slot_index(frame_number: u64, ring_size: usize) -> usize {
    debug_assert!(ring_size > 0, "slot_index on an empty ring");
    (frame_number % ring_size as u64) as usize
}

/// One command pool and the primary command buffer allocated from it.
pub struct FrameSlot<D: GpuDevice> {
    pub command_pool: D::CommandPool,
    pub command_buffer: D::CommandBuffer,
}

/// Fixed ring of per-frame command resources, selected round-robin by frame
/// number.
// TODO: give each slot a fence and wait on it before re-recording, plus
// acquire/present semaphores, once queue submission exists.
pub struct FrameRing<D: GpuDevice> {
    slots: Vec<FrameSlot<D>>,
}

impl<D: GpuDevice> FrameRing<D> {
    pub fn create(device: &D, graphics_queue_family: u32, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(RenderError::EmptyRing.into());
        }

        let mut ring = Self {
            slots: Vec::with_capacity(size),
        };
        for i in 0..size {
            match create_slot(device, graphics_queue_family) {
                Ok(slot) => ring.slots.push(slot),
                Err(e) => {
                    ring.destroy(device);
                    return Err(e.context(format!("frame slot {i}")));
                }
            }
        }

        debug!(size, queue_family = graphics_queue_family, "frame ring ready");
        Ok(ring)
    }

    /// Destroying a pool frees its command buffer with it.
    pub fn destroy(self, device: &D) {
        for slot in self.slots {
            device.destroy_command_pool(slot.command_pool);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current_index(&self, frame_number: u64) -> usize {
        slot_index(frame_number, self.slots.len())
    }

    pub fn current_slot(&self, frame_number: u64) -> &FrameSlot<D> {
        &self.slots[self.current_index(frame_number)]
    }

    pub fn slots(&self) -> &[FrameSlot<D>] {
        &self.slots
    }
}

fn create_slot<D: GpuDevice>(device: &D, queue_family: u32) -> Result<FrameSlot<D>> {
    let command_pool = device
        .create_command_pool(queue_family, CommandPoolFlags::RESET_COMMAND_BUFFER)
        .context("create_command_pool")?;
    let command_buffer = match device.allocate_primary_command_buffer(command_pool) {
        Ok(cmd) => cmd,
        Err(e) => {
            device.destroy_command_pool(command_pool);
            return Err(e.context("allocate_command_buffers"));
        }
    };
    Ok(FrameSlot {
        command_pool,
        command_buffer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, MockEvent, MockLedger};
    use std::collections::HashSet;
    use std::rc::Rc;

    fn device() -> (Rc<MockLedger>, MockDevice) {
        let ledger = Rc::new(MockLedger::default());
        (ledger.clone(), MockDevice::new(ledger))
    }

    #[test]
    fn slot_index_wraps_every_ring_size() {
        for size in 1..=4usize {
            for f in 0..64u64 {
                assert_eq!(slot_index(f, size), slot_index(f + size as u64, size));
            }
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "empty ring")]
    fn slot_index_rejects_zero_size() {
        slot_index(7, 0);
    }

    #[test]
    fn consecutive_frames_hit_distinct_slots() {
        let size = 3;
        for start in [0u64, 1, 7, u64::MAX - 10] {
            let seen: HashSet<_> = (0..size as u64).map(|k| slot_index(start + k, size)).collect();
            assert_eq!(seen.len(), size, "window starting at {start}");
        }
    }

    #[test]
    fn each_slot_gets_a_resettable_pool_and_one_buffer() {
        let (ledger, dev) = device();
        let ring = FrameRing::create(&dev, 7, FRAME_OVERLAP).unwrap();

        assert_eq!(ring.len(), FRAME_OVERLAP);
        let pools: Vec<_> = ledger
            .events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::CreatePool { queue_family, flags, .. } => Some((queue_family, flags)),
                _ => None,
            })
            .collect();
        assert_eq!(pools.len(), FRAME_OVERLAP);
        for (family, flags) in pools {
            assert_eq!(family, 7);
            assert!(flags.contains(CommandPoolFlags::RESET_COMMAND_BUFFER));
        }
        for slot in ring.slots() {
            assert_eq!(ledger.buffers_in_pool(slot.command_pool), 1);
        }
        ring.destroy(&dev);
        assert_eq!(ledger.live_pools(), 0);
    }

    #[test]
    fn current_slot_follows_frame_number() {
        let (_ledger, dev) = device();
        let ring = FrameRing::create(&dev, 0, 2).unwrap();
        let a = ring.current_slot(0).command_pool;
        let b = ring.current_slot(1).command_pool;
        assert_ne!(a, b);
        assert_eq!(ring.current_slot(2).command_pool, a);
        assert_eq!(ring.current_slot(3).command_pool, b);
        ring.destroy(&dev);
    }

    #[test]
    fn zero_slots_is_an_error() {
        let (ledger, dev) = device();
        let err = FrameRing::create(&dev, 0, 0).err().unwrap();
        assert_eq!(err.downcast_ref::<RenderError>(), Some(&RenderError::EmptyRing));
        assert_eq!(ledger.events(), [MockEvent::CreateContext]);
    }

    #[test]
    fn partial_failure_releases_created_pools() {
        let (ledger, dev) = device();
        ledger.fail_pools_after(1);
        let err = FrameRing::create(&dev, 0, 3).err().unwrap();
        assert!(format!("{err:#}").contains("frame slot 1"));
        assert_eq!(ledger.live_pools(), 0);
    }
}
