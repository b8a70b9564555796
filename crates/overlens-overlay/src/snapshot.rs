//! Single-slot mailbox for the latest analysis result.
//!
//! The analysis thread publishes a fresh immutable value; the draw path
//! loads an `Arc` to it and renders without holding any lock. The mutex
//! only guards the pointer swap.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

#[derive(Debug)]
pub struct DetectionSlot<T> {
    current: Mutex<Option<Arc<T>>>,
    generation: AtomicU64,
}

impl<T> Default for DetectionSlot<T> {
    fn default() -> Self {
        Self { current: Mutex::new(None), generation: AtomicU64::new(0) }
    }
}

impl<T> DetectionSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current value; returns the new generation.
    pub fn publish(&self, value: T) -> u64 {
        self.store(Some(Arc::new(value)))
    }

    /// Drop the current value (e.g. nothing detected on the latest frame).
    pub fn clear(&self) -> u64 {
        self.store(None)
    }

    pub fn load(&self) -> Option<Arc<T>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Bumped on every publish or clear; lets readers skip unchanged frames.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn store(&self, value: Option<Arc<T>>) -> u64 {
        let old = {
            let mut slot = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, value)
        };
        drop(old);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn publish_load_clear() {
        let slot = DetectionSlot::new();
        assert!(slot.load().is_none());
        assert_eq!(slot.publish(7), 1);
        assert_eq!(slot.load().as_deref(), Some(&7));
        assert_eq!(slot.clear(), 2);
        assert!(slot.load().is_none());
        assert_eq!(slot.generation(), 2);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let slot = DetectionSlot::new();
        slot.publish(String::from("first"));
        let held = slot.load().unwrap();
        slot.publish(String::from("second"));
        assert_eq!(held.as_str(), "first");
        assert_eq!(slot.load().unwrap().as_str(), "second");
    }

    #[test]
    fn concurrent_writer_and_reader() {
        let slot = Arc::new(DetectionSlot::new());
        let writer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    slot.publish(i);
                }
            })
        };

        let mut last = 0;
        while !writer.is_finished() {
            if let Some(v) = slot.load() {
                assert!(*v >= last, "values never go backwards");
                last = *v;
            }
        }
        writer.join().unwrap();
        assert_eq!(slot.load().as_deref(), Some(&999));
        assert_eq!(slot.generation(), 1000);
    }
}
