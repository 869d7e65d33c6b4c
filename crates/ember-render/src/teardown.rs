// SPDX-License-Identifier: CEPL-1.0
use tracing::debug;

type Release = Box<dyn FnOnce()>;

/// Release actions recorded in creation order and run in reverse.
///
/// Push the matching release right after each object is created; a failure
/// half way through construction then unwinds exactly what exists. Unwinds
/// on drop.
#[derive(Default)]
pub struct TeardownStack {
    entries: Vec<(&'static str, Release)>,
}

impl TeardownStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: &'static str, release: impl FnOnce() + 'static) {
        self.entries.push((label, Box::new(release)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }

    pub fn unwind(&mut self) {
        while let Some((label, release)) = self.entries.pop() {
            debug!("release {label}");
            release();
        }
    }
}

impl Drop for TeardownStack {
    fn drop(&mut self) {
        self.unwind();
    }
}
