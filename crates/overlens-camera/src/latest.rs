// overlens-camera/src/latest.rs
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

struct SlotState<T> {
    value: Option<T>,
    closed: bool,
    dropped: u64,
}

/// Single-slot mailbox: a newer value always replaces a pending one.
///
/// Producers never block. The consumer sees at most one value per wake-up,
/// and it is always the freshest one offered.
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState { value: None, closed: false, dropped: 0 }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value`, returning the pending value it superseded (if any).
    ///
    /// Offers after [`close`](Self::close) are discarded and handed back.
    pub fn offer(&self, value: T) -> Option<T> {
        let mut state = self.lock();
        if state.closed {
            return Some(value);
        }
        let replaced = state.value.replace(value);
        if replaced.is_some() {
            state.dropped += 1;
            log::debug!("latest slot: superseded a pending value ({} dropped)", state.dropped);
        }
        drop(state);
        self.ready.notify_one();
        replaced
    }

    /// Take the pending value without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.lock().value.take()
    }

    /// Wait for a value. Returns `None` once the slot is closed and drained.
    pub fn take_blocking(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(value) = state.value.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state = self.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`take_blocking`](Self::take_blocking) but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let state = self.lock();
        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| s.value.is_none() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        state.value.take()
    }

    /// Stop accepting values and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of values that were replaced before anyone took them.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

/// Run `f` on a dedicated thread for every value taken from `slot`.
///
/// One value is in flight at a time; the thread exits when the slot is
/// closed and empty.
pub fn spawn_analyzer<T, F>(slot: Arc<LatestSlot<T>>, mut f: F) -> std::io::Result<JoinHandle<()>>
where
    T: Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    std::thread::Builder::new()
        .name("overlens-analyzer".into())
        .spawn(move || {
            while let Some(value) = slot.take_blocking() {
                f(value);
            }
            log::debug!("analyzer thread shutting down");
        })
}
