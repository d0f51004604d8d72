//! Badge buttons as the game's keypad and steering input.
//!
//! A, B and Start are the three game buttons. The D-pad stands in for the
//! accelerometer: up tilts towards the top lane, down towards the bottom.

use esp_hal::gpio::{
    Input,
    InputConfig,
    Pull,
};

use crate::{
    board::{
        ButtonResources,
        DpadResources,
    },
    config::TILT_THRESHOLD,
    input::{
        Buttons,
        Keypad,
        PinKeypad,
        TiltSensor,
    },
};

/// The three game buttons, active low.
pub struct Keys(PinKeypad<Input<'static>, Input<'static>, Input<'static>>);

impl From<ButtonResources<'static>> for Keys {
    fn from(res: ButtonResources<'static>) -> Self {
        let pull_up = InputConfig::default().with_pull(Pull::Up);
        Self(PinKeypad::new(
            Input::new(res.a, pull_up),
            Input::new(res.b, pull_up),
            Input::new(res.start, pull_up),
        ))
    }
}

impl Keypad for Keys {
    fn levels(&mut self) -> Buttons {
        self.0.levels()
    }
}

/// Up/down on the D-pad read as a full tilt either way.
pub struct Dpad {
    up: Input<'static>,
    down: Input<'static>,
}

impl From<DpadResources<'static>> for Dpad {
    fn from(res: DpadResources<'static>) -> Self {
        let pull_up = InputConfig::default().with_pull(Pull::Up);
        Self {
            up: Input::new(res.up, pull_up),
            down: Input::new(res.down, pull_up),
        }
    }
}

impl TiltSensor for Dpad {
    type Error = core::convert::Infallible;

    async fn sample(&mut self) -> Result<i16, Self::Error> {
        let full = TILT_THRESHOLD.saturating_mul(2);
        Ok(match (self.up.is_low(), self.down.is_low()) {
            (true, false) => -full,
            (false, true) => full,
            _ => 0,
        })
    }
}
