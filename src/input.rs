//! Button and tilt input.
//!
//! Three logical buttons drive every screen: B1 increments, B2 decrements and
//! B3 confirms. Holding B1 and B2 together is the configuration gesture (see
//! [`crate::hold`]). The tilt sensor only contributes one signed axis.

use core::ops::{
    BitAnd,
    BitOr,
    Not,
};

use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;

use crate::{
    config::TILT_THRESHOLD,
    track::Lane,
};

/// A set of buttons, as levels or as edge events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buttons(u8);

impl Buttons {
    pub const NONE: Self = Self(0);
    pub const B1: Self = Self(1 << 0);
    pub const B2: Self = Self(1 << 1);
    pub const B3: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Resolve the set to a single action. Increment beats decrement beats
    /// confirm, so conflicting presses never drop an event.
    pub const fn key(self) -> Option<Key> {
        if self.intersects(Self::B1) {
            Some(Key::Increment)
        } else if self.intersects(Self::B2) {
            Some(Key::Decrement)
        } else if self.intersects(Self::B3) {
            Some(Key::Confirm)
        } else {
            None
        }
    }
}

impl BitOr for Buttons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for Buttons {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for Buttons {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Key {
    Increment,
    Decrement,
    Confirm,
}

/// Anything that can report which buttons are down right now.
pub trait Keypad {
    fn levels(&mut self) -> Buttons;
}

/// Three active-low GPIO inputs.
///
/// A pin that fails to read counts as released.
pub struct PinKeypad<P1, P2, P3> {
    b1: P1,
    b2: P2,
    b3: P3,
}

impl<P1: InputPin, P2: InputPin, P3: InputPin> PinKeypad<P1, P2, P3> {
    pub const fn new(b1: P1, b2: P2, b3: P3) -> Self {
        Self { b1, b2, b3 }
    }
}

impl<P1: InputPin, P2: InputPin, P3: InputPin> Keypad for PinKeypad<P1, P2, P3> {
    fn levels(&mut self) -> Buttons {
        let mut down = Buttons::NONE;
        if self.b1.is_low().unwrap_or(false) {
            down = down | Buttons::B1;
        }
        if self.b2.is_low().unwrap_or(false) {
            down = down | Buttons::B2;
        }
        if self.b3.is_low().unwrap_or(false) {
            down = down | Buttons::B3;
        }
        down
    }
}

/// Debounced edges since the previous poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Edges {
    pub pressed: Buttons,
    pub released: Buttons,
}

/// Turns raw keypad levels into debounced levels and press/release events.
///
/// A change only counts once it is still present after the debounce window.
pub struct Debouncer<K> {
    keypad: K,
    stable: Buttons,
    window_ms: u32,
}

impl<K: Keypad> Debouncer<K> {
    pub fn new(keypad: K, window_ms: u32) -> Self {
        Self {
            keypad,
            stable: Buttons::NONE,
            window_ms,
        }
    }

    /// Last debounced levels.
    pub const fn levels(&self) -> Buttons {
        self.stable
    }

    /// Sample the keypad and report debounced edges.
    pub async fn poll(&mut self, delay: &mut impl DelayNs) -> Edges {
        let first = self.keypad.levels();
        if first == self.stable {
            return Edges::default();
        }
        delay.delay_ms(self.window_ms).await;
        let second = self.keypad.levels();

        // Bits that moved away from the stable state in both samples.
        let changed = Buttons::from_bits((first.0 ^ self.stable.0) & (second.0 ^ self.stable.0));
        self.stable = Buttons::from_bits(self.stable.0 ^ changed.0);
        Edges {
            pressed: changed & self.stable,
            released: changed & !self.stable,
        }
    }

    pub fn keypad_mut(&mut self) -> &mut K {
        &mut self.keypad
    }
}

/// Buttons pressed together, reported once all of them are let go.
///
/// Acting on the release lets a press grow into a combination first, so the
/// first button of a combination does nothing on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Chord(Buttons);

impl Chord {
    pub const fn new() -> Self {
        Self(Buttons::NONE)
    }

    /// Feed the debounced levels. Returns every button that was down since
    /// the keypad was last empty, on the poll where it empties.
    pub fn update(&mut self, levels: Buttons) -> Option<Buttons> {
        if !levels.is_empty() {
            self.0 = self.0 | levels;
            return None;
        }
        let chord = core::mem::take(&mut self.0);
        (!chord.is_empty()).then_some(chord)
    }
}

/// One-axis inclination source.
#[allow(async_fn_in_trait)]
pub trait TiltSensor {
    type Error;

    /// Signed inclination along the steering axis.
    async fn sample(&mut self) -> Result<i16, Self::Error>;
}

/// Lane selected by a tilt sample. Inside the dead zone the car keeps its lane.
pub const fn lane_for_tilt(y: i16, current: Lane) -> Lane {
    if y < -TILT_THRESHOLD {
        Lane::Top
    } else if y > TILT_THRESHOLD {
        Lane::Bottom
    } else {
        current
    }
}
