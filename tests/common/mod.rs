//! Host fakes shared by the integration tests.

#![allow(dead_code)]

use std::{
    cell::{
        Cell,
        RefCell,
    },
    collections::VecDeque,
    rc::Rc,
};

use car_runner::{
    input::{
        Buttons,
        Keypad,
        TiltSensor,
    },
    machine::Timebase,
    net::{
        NetError,
        Transport,
        transport::Endpoint,
    },
};
use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;

/// Virtual time in nanoseconds, advanced only by [`FakeDelay`].
#[derive(Clone, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn now_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }

    fn advance_ns(&self, ns: u64) {
        self.0.set(self.0.get() + ns);
    }
}

/// Sleeps in virtual time, yielding once so joined futures get a turn.
#[derive(Clone)]
pub struct FakeDelay {
    clock: Clock,
}

impl FakeDelay {
    pub fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
        }
    }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ns(u64::from(ns));
        embassy_futures::yield_now().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ns(u64::from(ms) * 1_000_000);
        embassy_futures::yield_now().await;
    }
}

impl Timebase for FakeDelay {
    fn now(&self) -> Instant {
        Instant::from_micros(self.clock.0.get() / 1_000)
    }
}

/// Buttons held over windows of virtual time.
pub struct ScriptedKeypad {
    clock: Clock,
    presses: Vec<(u64, u64, Buttons)>,
}

impl ScriptedKeypad {
    pub fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            presses: Vec::new(),
        }
    }

    /// Hold `buttons` from `after_ms` from now, for `hold_ms`.
    pub fn press(&mut self, after_ms: u64, hold_ms: u64, buttons: Buttons) {
        let start = self.clock.now_ms() + after_ms;
        self.presses.push((start, start + hold_ms, buttons));
    }
}

impl Keypad for ScriptedKeypad {
    fn levels(&mut self) -> Buttons {
        let now = self.clock.now_ms();
        self.presses
            .iter()
            .filter(|(from, to, _)| (*from..*to).contains(&now))
            .fold(Buttons::NONE, |acc, (_, _, b)| acc | *b)
    }
}

/// A sensor stuck at one reading.
pub struct FixedTilt(pub i16);

impl TiltSensor for FixedTilt {
    type Error = ();

    async fn sample(&mut self) -> Result<i16, ()> {
        Ok(self.0)
    }
}

/// What a [`ScriptedBroker`] saw.
#[derive(Debug, Default)]
pub struct BrokerLog {
    pub connects: usize,
    pub closes: usize,
    /// Every frame sent, in order.
    pub frames: Vec<Vec<u8>>,
}

impl BrokerLog {
    /// Packet types of the frames sent, by their first byte.
    pub fn kinds(&self) -> Vec<u8> {
        self.frames.iter().map(|f| f[0] & 0xF0).collect()
    }
}

/// Broker answering each CONNECT with the next scripted reply. An empty
/// reply means nothing arrives and reads time out.
pub struct ScriptedBroker {
    replies: VecDeque<Vec<u8>>,
    inbox: VecDeque<u8>,
    pub log: Rc<RefCell<BrokerLog>>,
}

impl ScriptedBroker {
    pub fn new(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            inbox: VecDeque::new(),
            log: Rc::default(),
        }
    }
}

impl Transport for ScriptedBroker {
    async fn connect(&mut self, _endpoint: Endpoint<'_>) -> Result<(), NetError> {
        self.log.borrow_mut().connects += 1;
        self.inbox.clear();
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        self.log.borrow_mut().frames.push(data.to_vec());
        if data[0] & 0xF0 == 0x10 {
            let reply = self.replies.pop_front().unwrap_or_else(|| vec![0x20, 2, 0, 0]);
            self.inbox.extend(reply);
        }
        Ok(data.len())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let Some(b) = self.inbox.pop_front() else {
            return Err(NetError::Timeout);
        };
        buf[0] = b;
        Ok(1)
    }

    async fn close(&mut self) -> Result<(), NetError> {
        self.log.borrow_mut().closes += 1;
        Ok(())
    }
}
