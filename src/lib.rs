//! # car-runner
//!
//! A side-scrolling car game for a 2×16 character LCD with three buttons and
//! a tilt sensor, a persistent top-3 leaderboard and MQTT score publishing.
//!
//! The game core is hardware independent and builds on the host:
//! - **Game**: track generation, the world step, run session counters
//! - **Machine**: the Idle / Config / Pregame / Game / Postgame flow, either
//!   as one cooperative loop or driving the task set in [`tasks`]
//! - **Scores**: CRC-checked leaderboard records on a block device
//! - **Net**: ESP-AT modem transport, MQTT 3.1 framing, SNTP clock sync
//!
//! With the `badge` feature the crate also brings up the Disobey 2026 badge:
//! the TFT renders the character LCD, A/B/Start are the buttons, the D-pad
//! steers and the LED bars show the fuel.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! let peripherals = car_runner::board::init();
//! let resources = car_runner::split_resources!(peripherals);
//!
//! let screen = car_runner::board::Screen::new(resources.display.into());
//! let keys: car_runner::board::Keys = resources.buttons.into();
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod glyphs;
pub mod hold;
pub mod input;
pub mod lcd;
pub mod machine;
pub mod manager;
pub mod net;
pub mod rng;
pub mod rtc;
pub mod score;
pub mod session;
pub mod store;
pub mod tasks;
pub mod track;
pub mod world;

#[cfg(feature = "badge")]
pub mod board;
#[cfg(feature = "badge")]
mod buttons;
#[cfg(feature = "badge")]
mod display;
#[cfg(feature = "badge")]
mod leds;
#[cfg(feature = "badge")]
mod modem;
