// SPDX-License-Identifier: CEPL-1.0
//! In-memory device and backend that record every call into a shared
//! [`MockLedger`]. Handles are plain integers.
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{anyhow, Result};

use crate::{
    CommandPoolFlags, ContextRequest, GpuBackend, GpuDevice, PresentMode, SurfaceFormat,
    SwapchainParts, SwapchainRequest,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockEvent {
    CreateContext,
    CreateSwapchain(u64),
    DestroySwapchain(u64),
    CreateView(u64),
    DestroyView(u64),
    CreatePool {
        pool: u64,
        queue_family: u32,
        flags: CommandPoolFlags,
    },
    AllocateBuffer { pool: u64, buffer: u64 },
    DestroyPool(u64),
    WaitIdle,
    DestroyContext,
}

/// Shared record of what a [`MockDevice`] did, plus failure knobs.
pub struct MockLedger {
    events: RefCell<Vec<MockEvent>>,
    requests: RefCell<Vec<SwapchainRequest>>,
    next_handle: Cell<u64>,
    image_count: Cell<usize>,
    mailbox_supported: Cell<bool>,
    views_before_failure: Cell<Option<usize>>,
    pools_before_failure: Cell<Option<usize>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self {
            events: RefCell::default(),
            requests: RefCell::default(),
            next_handle: Cell::new(1),
            image_count: Cell::new(3),
            mailbox_supported: Cell::new(true),
            views_before_failure: Cell::new(None),
            pools_before_failure: Cell::new(None),
        }
    }
}

impl MockLedger {
    fn handle(&self) -> u64 {
        let h = self.next_handle.get();
        self.next_handle.set(h + 1);
        h
    }

    fn record(&self, event: MockEvent) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.borrow().clone()
    }

    pub fn last_swapchain_request(&self) -> Option<SwapchainRequest> {
        self.requests.borrow().last().copied()
    }

    pub fn set_image_count(&self, n: usize) {
        self.image_count.set(n);
    }

    pub fn set_mailbox_supported(&self, on: bool) {
        self.mailbox_supported.set(on);
    }

    /// Let `n` more image views succeed, then fail every further one.
    pub fn fail_views_after(&self, n: usize) {
        self.views_before_failure.set(Some(n));
    }

    /// Let `n` more command pools succeed, then fail every further one.
    pub fn fail_pools_after(&self, n: usize) {
        self.pools_before_failure.set(Some(n));
    }

    fn count(&self, created: impl Fn(&MockEvent) -> bool, destroyed: impl Fn(&MockEvent) -> bool) -> usize {
        let events = self.events.borrow();
        let made = events.iter().filter(|e| created(e)).count();
        let gone = events.iter().filter(|e| destroyed(e)).count();
        made - gone
    }

    pub fn live_swapchains(&self) -> usize {
        self.count(
            |e| matches!(e, MockEvent::CreateSwapchain(_)),
            |e| matches!(e, MockEvent::DestroySwapchain(_)),
        )
    }

    pub fn live_views(&self) -> usize {
        self.count(
            |e| matches!(e, MockEvent::CreateView(_)),
            |e| matches!(e, MockEvent::DestroyView(_)),
        )
    }

    pub fn live_pools(&self) -> usize {
        self.count(
            |e| matches!(e, MockEvent::CreatePool { .. }),
            |e| matches!(e, MockEvent::DestroyPool(_)),
        )
    }

    pub fn live_contexts(&self) -> usize {
        self.count(
            |e| matches!(e, MockEvent::CreateContext),
            |e| matches!(e, MockEvent::DestroyContext),
        )
    }

    pub fn buffers_in_pool(&self, pool: u64) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, MockEvent::AllocateBuffer { pool: p, .. } if *p == pool))
            .count()
    }

    fn take_budget(budget: &Cell<Option<usize>>) -> bool {
        match budget.get() {
            None => true,
            Some(0) => false,
            Some(n) => {
                budget.set(Some(n - 1));
                true
            }
        }
    }
}

pub struct MockDevice {
    ledger: Rc<MockLedger>,
    queue_family: u32,
}

impl MockDevice {
    pub fn new(ledger: Rc<MockLedger>) -> Self {
        ledger.record(MockEvent::CreateContext);
        Self {
            ledger,
            queue_family: 0,
        }
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.ledger.record(MockEvent::DestroyContext);
    }
}

impl GpuDevice for MockDevice {
    type Swapchain = u64;
    type Image = u64;
    type ImageView = u64;
    type CommandPool = u64;
    type CommandBuffer = u64;

    fn graphics_queue_family(&self) -> u32 {
        self.queue_family
    }

    fn create_swapchain(&self, request: &SwapchainRequest) -> Result<SwapchainParts<Self>> {
        let l = &self.ledger;
        l.requests.borrow_mut().push(*request);
        let swapchain = l.handle();
        l.record(MockEvent::CreateSwapchain(swapchain));
        let images = (0..l.image_count.get()).map(|_| l.handle()).collect();
        let present_mode = match request.present_mode {
            PresentMode::Mailbox if l.mailbox_supported.get() => PresentMode::Mailbox,
            _ => PresentMode::Fifo,
        };
        Ok(SwapchainParts {
            swapchain,
            format: request.format,
            present_mode,
            extent: request.extent,
            images,
        })
    }

    fn destroy_swapchain(&self, swapchain: u64) {
        self.ledger.record(MockEvent::DestroySwapchain(swapchain));
    }

    fn create_image_view(&self, _image: u64, _format: SurfaceFormat) -> Result<u64> {
        if !MockLedger::take_budget(&self.ledger.views_before_failure) {
            return Err(anyhow!("mock: image view allocation failed"));
        }
        let view = self.ledger.handle();
        self.ledger.record(MockEvent::CreateView(view));
        Ok(view)
    }

    fn destroy_image_view(&self, view: u64) {
        self.ledger.record(MockEvent::DestroyView(view));
    }

    fn create_command_pool(&self, queue_family: u32, flags: CommandPoolFlags) -> Result<u64> {
        if !MockLedger::take_budget(&self.ledger.pools_before_failure) {
            return Err(anyhow!("mock: command pool allocation failed"));
        }
        let pool = self.ledger.handle();
        self.ledger.record(MockEvent::CreatePool {
            pool,
            queue_family,
            flags,
        });
        Ok(pool)
    }

    fn allocate_primary_command_buffer(&self, pool: u64) -> Result<u64> {
        let buffer = self.ledger.handle();
        self.ledger.record(MockEvent::AllocateBuffer { pool, buffer });
        Ok(buffer)
    }

    fn destroy_command_pool(&self, pool: u64) {
        self.ledger.record(MockEvent::DestroyPool(pool));
    }

    fn wait_idle(&self) -> Result<()> {
        self.ledger.record(MockEvent::WaitIdle);
        Ok(())
    }
}

/// Hands out [`MockDevice`]s bound to one ledger, for any window type.
pub struct MockBackend {
    pub ledger: Rc<MockLedger>,
    pub fail_context: bool,
    pub last_request: Option<ContextRequest>,
}

impl MockBackend {
    pub fn new(ledger: Rc<MockLedger>) -> Self {
        Self {
            ledger,
            fail_context: false,
            last_request: None,
        }
    }
}

impl<W: ?Sized> GpuBackend<W> for MockBackend {
    type Device = MockDevice;

    fn create_context(&mut self, request: &ContextRequest, _window: &W) -> Result<MockDevice> {
        self.last_request = Some(request.clone());
        if self.fail_context {
            return Err(anyhow!("mock: no suitable GPU"));
        }
        Ok(MockDevice::new(self.ledger.clone()))
    }
}
