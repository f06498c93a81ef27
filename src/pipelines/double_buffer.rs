// SPDX-License-Identifier: GPL-3.0-only

//! Double-buffered hand-off between the acquisition thread and consumers
//!
//! The producer owns the back buffer by value ([`BackBuffer`]); the store owns
//! the front buffer behind an `Arc`. Publishing moves the back buffer into the
//! store and hands the previous front back to the producer, so nothing can
//! write to a buffer once consumers can see it.
//!
//! The single mutex guards only the front handle and the new-frame flag. Pixel
//! data is never touched while it is held.

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Read-only handle to a published buffer
///
/// Stays valid (and unchanged) after later swaps; holding it only costs the
/// producer an extra copy when it reclaims that buffer.
#[derive(Debug)]
pub struct FrontView<T>(Arc<T>);

impl<T> Clone for FrontView<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for FrontView<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> FrontView<T> {
    /// Whether two views refer to the same published buffer
    pub fn same_buffer(&self, other: &FrontView<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

struct Shared<T> {
    front: Arc<T>,
    new_frame: bool,
    swaps: u64,
}

/// Consumer side of the double buffer
pub struct FrameStore<T> {
    shared: Mutex<Shared<T>>,
}

impl<T: Default + Clone> FrameStore<T> {
    /// Create a store with an empty front buffer and the matching producer handle
    pub fn new() -> (Arc<Self>, BackBuffer<T>) {
        let store = Arc::new(Self {
            shared: Mutex::new(Shared {
                front: Arc::new(T::default()),
                new_frame: false,
                swaps: 0,
            }),
        });
        let back = BackBuffer {
            buffer: T::default(),
            store: Arc::clone(&store),
        };
        (store, back)
    }
}

impl<T> FrameStore<T> {
    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        // The guarded state is a handle and two counters, always consistent
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a frame was published since the last [`FrameStore::consume`]
    pub fn is_new_frame_available(&self) -> bool {
        self.lock().new_frame
    }

    /// Take the front buffer if it is new, clearing the new-frame flag
    ///
    /// Returns `None` when nothing was published since the last call, so a
    /// consumer polling faster than the producer never sees a frame twice.
    pub fn consume(&self) -> Option<FrontView<T>> {
        let mut shared = self.lock();
        if !shared.new_frame {
            return None;
        }
        let view = FrontView(Arc::clone(&shared.front));
        shared.new_frame = false;
        Some(view)
    }

    /// Current front buffer, regardless of the new-frame flag
    pub fn front(&self) -> FrontView<T> {
        FrontView(Arc::clone(&self.lock().front))
    }

    /// Number of swaps since creation
    pub fn swap_count(&self) -> u64 {
        self.lock().swaps
    }
}

/// Producer side of the double buffer: exclusive, mutable back buffer
pub struct BackBuffer<T> {
    buffer: T,
    store: Arc<FrameStore<T>>,
}

impl<T: Default + Clone> BackBuffer<T> {
    /// Back buffer contents (the previous-but-one published frame after a swap)
    pub fn get(&self) -> &T {
        &self.buffer
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.buffer
    }

    /// Publish the back buffer as the new front and reclaim the old front
    ///
    /// The old front is reused in place when no consumer still holds a view of
    /// it, and copied otherwise, so the producer always ends up with a full
    /// buffer to overwrite.
    pub fn swap(&mut self) -> FrontView<T> {
        let published = Arc::new(std::mem::take(&mut self.buffer));

        let previous = {
            let mut shared = self.store.lock();
            let previous = std::mem::replace(&mut shared.front, Arc::clone(&published));
            shared.new_frame = true;
            shared.swaps += 1;
            previous
        };

        self.buffer = Arc::try_unwrap(previous).unwrap_or_else(|held| (*held).clone());
        FrontView(published)
    }
}
