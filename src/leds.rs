//! WS2812 LED bars using the RMT peripheral, used as a fuel gauge.
//!
//! The badge has two bars of five LEDs. Indexing is counter clockwise from
//! the bottom right: 0 is bottom right, 4 top right, 5 top left, 9 bottom left.

extern crate alloc;

use embassy_time::{
    Duration,
    Timer,
};
use esp_hal::{
    Blocking,
    gpio::Level,
    rmt::{
        PulseCode,
        Tx,
    },
};
use palette::Srgb;

use crate::config::MAX_FUEL;

pub const LED_COUNT: usize = 10;
/// LEDs per bar.
pub const BAR_COUNT: usize = 5;

const OFF: Srgb<u8> = Srgb::new(0, 0, 0);
const FULL: Srgb<u8> = Srgb::new(0, 24, 0);
const LOW: Srgb<u8> = Srgb::new(32, 8, 0);
const EMPTY: Srgb<u8> = Srgb::new(32, 0, 0);

pub struct Leds<'a> {
    channel: Option<esp_hal::rmt::Channel<'a, Blocking, Tx>>,
    framebuffer: [Srgb<u8>; LED_COUNT],
}

impl<'a> Leds<'a> {
    pub const fn new(channel: esp_hal::rmt::Channel<'a, Blocking, Tx>) -> Self {
        Self {
            channel: Some(channel),
            framebuffer: [OFF; LED_COUNT],
        }
    }

    /// Flush the framebuffer to the physical LEDs.
    pub async fn update(&mut self) {
        let Some(channel) = self.channel.take() else {
            error!("RMT channel lost during previous transmission");
            return;
        };

        let pulses = self
            .framebuffer
            .iter()
            .flat_map(|c| {
                // WS2812 expects GRB byte order
                [
                    Self::byte_to_pulses(c.green),
                    Self::byte_to_pulses(c.red),
                    Self::byte_to_pulses(c.blue),
                ]
                .into_iter()
                .flatten()
            })
            .chain(core::iter::once(PulseCode::end_marker()))
            .collect::<alloc::vec::Vec<_>>();

        let transaction = match channel.transmit(&pulses) {
            Ok(t) => t,
            Err(e) => {
                error!("RMT transmit failed: {}", e);
                return;
            }
        };

        self.channel = Some(match transaction.wait() {
            Ok(ch) => ch,
            Err((err, ch)) => {
                error!("RMT transaction failed: {}", err);
                ch
            }
        });

        // WS2812 reset time
        Timer::after(Duration::from_micros(50)).await;
    }

    /// Show `fuel` on both bars, bottom to top. An empty tank lights the
    /// bottom LEDs red.
    pub fn show_fuel(&mut self, fuel: u8) {
        let colors = fuel_bar(fuel);
        // Right bar is already bottom-to-top, the left one runs top-to-bottom.
        self.framebuffer[..BAR_COUNT].copy_from_slice(&colors);
        for i in 0..BAR_COUNT {
            self.framebuffer[BAR_COUNT + i] = colors[BAR_COUNT - 1 - i];
        }
    }

    pub fn clear(&mut self) {
        self.framebuffer.fill(OFF);
    }

    /// WS2812 bit timing at 40 MHz RMT clock.
    const fn bit_to_pulse(bit: bool) -> PulseCode {
        if bit {
            // '1': 0.8 µs high (32 ticks), 0.45 µs low (18 ticks)
            PulseCode::new(Level::High, 32, Level::Low, 18)
        } else {
            // '0': 0.4 µs high (16 ticks), 0.85 µs low (34 ticks)
            PulseCode::new(Level::High, 16, Level::Low, 34)
        }
    }

    fn byte_to_pulses(byte: u8) -> [PulseCode; 8] {
        let mut pulses = [PulseCode::default(); 8];
        for (i, pulse) in pulses.iter_mut().enumerate() {
            *pulse = Self::bit_to_pulse((byte >> (7 - i)) & 1 != 0);
        }
        pulses
    }
}

/// Bar colours for a fuel level, bottom LED first.
fn fuel_bar(fuel: u8) -> [Srgb<u8>; BAR_COUNT] {
    if fuel == 0 {
        return [EMPTY, EMPTY, OFF, OFF, OFF];
    }
    let fuel = usize::from(fuel.min(MAX_FUEL));
    let max = usize::from(MAX_FUEL);
    // Round up so any fuel left shows at least one LED.
    let lit = (fuel * BAR_COUNT).div_ceil(max);
    let on = if lit <= 1 { LOW } else { FULL };
    core::array::from_fn(|i| if i < lit { on } else { OFF })
}
