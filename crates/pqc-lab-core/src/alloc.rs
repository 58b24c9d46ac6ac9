//! Heap accounting for memory measurements
//!
//! Install `TrackingAllocator` as the `#[global_allocator]` of a binary to
//! get live and peak heap figures. Without it every window reads zero and
//! reports memory as unavailable; timing still works.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static LIVE: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Counting wrapper around the system allocator
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        LIVE.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            LIVE.fetch_sub(layout.size(), Ordering::Relaxed);
            record_alloc(new_size);
        }
        new_ptr
    }
}

fn record_alloc(size: usize) {
    ACTIVE.store(true, Ordering::Relaxed);
    let live = LIVE.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(live, Ordering::Relaxed);
}

/// Whether the tracking allocator is serving this process
pub fn is_tracking() -> bool {
    ACTIVE.load(Ordering::Relaxed)
}

/// Samples heap growth between two operation boundaries.
///
/// Starting a window resets the process-wide peak to the current live figure.
/// Concurrent windows (parallel trials) share that peak, so their figures are
/// approximate: another trial's allocations can raise one, and another
/// window starting after a free can lower it.
pub struct MemoryWindow {
    baseline: usize,
}

impl MemoryWindow {
    pub fn start() -> Self {
        let baseline = LIVE.load(Ordering::Relaxed);
        PEAK.store(baseline, Ordering::Relaxed);
        Self { baseline }
    }

    /// Peak bytes above the baseline, `None` when tracking is unavailable
    pub fn finish(self) -> Option<u64> {
        if !is_tracking() {
            return None;
        }
        let peak = PEAK.load(Ordering::Relaxed);
        Some(peak.saturating_sub(self.baseline) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_sees_allocation() {
        // The core test binary installs TrackingAllocator (see lib.rs)
        assert!(is_tracking());
        let window = MemoryWindow::start();
        let buf = std::hint::black_box(vec![0u8; 64 * 1024]);
        let peak = window.finish().unwrap();
        // Concurrent tests move the shared counters, so leave some slack
        assert!(peak >= 32 * 1024, "peak was {peak}");
        drop(buf);
    }

    #[test]
    fn test_window_after_free_does_not_underflow() {
        let before = std::hint::black_box(vec![1u8; 4096]);
        let window = MemoryWindow::start();
        drop(before);
        assert!(window.finish().is_some());
    }
}
