//! State shared between the game's concurrent parts.
//!
//! Each game counter sits behind its own async mutex and every accessor takes
//! the lock for exactly one read or mutation, so no lock is ever held across a
//! queue operation or a sleep.

use core::{
    cell::{
        Cell,
        RefCell,
    },
    future::poll_fn,
    sync::atomic::{
        AtomicBool,
        AtomicU8,
        Ordering,
    },
    task::Poll,
};

use embassy_sync::{
    blocking_mutex::{
        self,
        raw::RawMutex,
    },
    mutex::Mutex,
    waitqueue::MultiWakerRegistration,
};

use crate::config::{
    LEADERBOARD_SIZE,
    MAX_FUEL,
};

/// Points, fuel and the end-of-run marker of the current run. A session
/// that was never started counts as ended with no points.
pub struct Session<M: RawMutex> {
    points: Mutex<M, u32>,
    fuel: Mutex<M, u8>,
    /// Final points once the run is over.
    ended: Mutex<M, Option<u32>>,
}

impl<M: RawMutex> Session<M> {
    pub const fn new() -> Self {
        Self {
            points: Mutex::new(0),
            fuel: Mutex::new(MAX_FUEL),
            ended: Mutex::new(Some(0)),
        }
    }

    /// Reset for a new run: one point, a full tank, not ended.
    pub async fn start(&self) {
        *self.points.lock().await = 1;
        *self.fuel.lock().await = MAX_FUEL;
        // Last, so the tickers never see a running session with stale counters.
        *self.ended.lock().await = None;
    }

    pub async fn add_point(&self) {
        let mut points = self.points.lock().await;
        *points = points.saturating_add(1);
    }

    pub async fn points(&self) -> u32 {
        *self.points.lock().await
    }

    /// Burn one unit of fuel; the tank never goes below empty.
    pub async fn burn_fuel(&self) {
        let mut fuel = self.fuel.lock().await;
        *fuel = fuel.saturating_sub(1);
    }

    pub async fn refuel(&self, amount: u8) {
        let mut fuel = self.fuel.lock().await;
        *fuel = fuel.saturating_add(amount).min(MAX_FUEL);
    }

    pub async fn fuel(&self) -> u8 {
        *self.fuel.lock().await
    }

    /// Mark the run as over and return its final points.
    pub async fn finish(&self) -> u32 {
        let points = self.points().await;
        *self.ended.lock().await = Some(points);
        points
    }

    /// Final points if the run is over.
    pub async fn ended(&self) -> Option<u32> {
        *self.ended.lock().await
    }

    pub async fn is_running(&self) -> bool {
        self.ended().await.is_none()
    }
}

impl<M: RawMutex> Default for Session<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative shutdown request observed by every long-running loop.
pub struct StopFlag<M: RawMutex> {
    stopped: AtomicBool,
    wakers: blocking_mutex::Mutex<M, RefCell<MultiWakerRegistration<16>>>,
}

impl<M: RawMutex> StopFlag<M> {
    pub const fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            wakers: blocking_mutex::Mutex::new(RefCell::new(MultiWakerRegistration::new())),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.wakers.lock(|w| w.borrow_mut().wake());
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn wait(&self) {
        poll_fn(|cx| {
            if self.is_stopped() {
                return Poll::Ready(());
            }
            self.wakers.lock(|w| w.borrow_mut().register(cx.waker()));
            if self.is_stopped() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await;
    }
}

impl<M: RawMutex> Default for StopFlag<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// UI state toggled by the blink and rotation tickers.
pub struct Indicators {
    blink: AtomicBool,
    rotation: AtomicU8,
}

impl Indicators {
    pub const fn new() -> Self {
        Self {
            blink: AtomicBool::new(false),
            rotation: AtomicU8::new(0),
        }
    }

    pub fn toggle_blink(&self) {
        self.blink.fetch_xor(true, Ordering::Relaxed);
    }

    /// Whether highlighted fields are currently blanked.
    pub fn blinked(&self) -> bool {
        self.blink.load(Ordering::Relaxed)
    }

    /// Advance to the next leaderboard rank, wrapping.
    pub fn rotate(&self) {
        let next = (self.rotation.load(Ordering::Relaxed) + 1) % LEADERBOARD_SIZE as u8;
        self.rotation.store(next, Ordering::Relaxed);
    }

    /// Leaderboard rank shown on the idle screen.
    pub fn rank(&self) -> usize {
        usize::from(self.rotation.load(Ordering::Relaxed))
    }
}

impl Default for Indicators {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-slot overwrite queue: writers replace the value and never block,
/// readers always see the most recent one.
pub struct Latest<M: RawMutex, T> {
    slot: blocking_mutex::Mutex<M, Cell<Option<T>>>,
}

impl<M: RawMutex, T: Clone> Latest<M, T> {
    pub const fn new() -> Self {
        Self {
            slot: blocking_mutex::Mutex::new(Cell::new(None)),
        }
    }

    pub fn publish(&self, value: T) {
        self.slot.lock(|s| s.set(Some(value)));
    }

    pub fn get(&self) -> Option<T> {
        self.slot.lock(|s| {
            let value = s.take();
            s.set(value.clone());
            value
        })
    }
}

impl<M: RawMutex, T: Clone> Default for Latest<M, T> {
    fn default() -> Self {
        Self::new()
    }
}
