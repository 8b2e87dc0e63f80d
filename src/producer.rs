//! The producer-facing frame slot: a single-slot "latest wins" buffer
//! shared between an external capture/encode pipeline (not part of this
//! crate) and the refresh ticker.
//!
//! # Example
//! ```
//! use mjpg_httpd::producer::FrameSlot;
//!
//! let slot = FrameSlot::new();
//! slot.publish(&[0xFF, 0xD8, 0xFF, 0xD9], 640, 480);
//! ```

use parking_lot::{Mutex, MutexGuard};

/// Guarded state shared between the producer thread and the refresh ticker.
///
/// Invariant: every write of `picture` together with `width`/`height` is
/// performed under the slot's mutex and sets `updated = true`. Readers
/// (the refresh ticker) must clear `updated` before releasing the lock.
pub struct FrameSlotInner {
    pub picture: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub updated: bool,
}

/// Thread-safe latest-frame container shared with the producer.
pub struct FrameSlot {
    inner: Mutex<FrameSlotInner>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrameSlotInner {
                picture: Vec::new(),
                width: 0,
                height: 0,
                updated: false,
            }),
        }
    }

    /// Publish a freshly encoded JPEG frame. Called from the producer's
    /// own thread; never blocks on anything other than the mutex.
    pub fn publish(&self, data: &[u8], width: u32, height: u32) {
        let mut guard = self.inner.lock();
        if guard.picture.capacity() < data.len() {
            let additional = data.len() - guard.picture.len();
            guard.picture.reserve(additional);
        }
        guard.picture.clear();
        guard.picture.extend_from_slice(data);
        guard.width = width;
        guard.height = height;
        guard.updated = true;
    }

    /// Signal that the producer has nothing to show (e.g. the capture
    /// device went away). A subsequent refresh tick will adopt this as
    /// the "offline" state and expose the blank picture.
    pub fn publish_offline(&self) {
        let mut guard = self.inner.lock();
        guard.picture.clear();
        guard.updated = true;
    }

    /// Crate-private accessor used only by the refresh ticker, mirroring
    /// the source's `lock()`/`unlock()` pair via RAII.
    pub(crate) fn lock(&self) -> MutexGuard<'_, FrameSlotInner> {
        self.inner.lock()
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}
