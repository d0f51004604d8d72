//! Long-press gesture: a button combination held continuously for a fixed time.

use embassy_time::Duration;

use crate::input::Buttons;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HoldState {
    Idle,
    Holding { held: Duration },
    /// Fires once; stays here until the combination is released.
    Confirmed,
}

pub struct HoldGesture {
    combo: Buttons,
    required: Duration,
    state: HoldState,
}

impl HoldGesture {
    pub const fn new(combo: Buttons, required: Duration) -> Self {
        Self {
            combo,
            required,
            state: HoldState::Idle,
        }
    }

    pub const fn state(&self) -> HoldState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = HoldState::Idle;
    }

    /// Feed the current levels after `elapsed` time. Releasing any button of
    /// the combination cancels the gesture.
    ///
    /// Returns `true` exactly once per completed hold.
    pub fn update(&mut self, levels: Buttons, elapsed: Duration) -> bool {
        if !levels.contains(self.combo) {
            self.state = HoldState::Idle;
            return false;
        }
        self.state = match self.state {
            HoldState::Idle => HoldState::Holding {
                held: Duration::from_ticks(0),
            },
            HoldState::Holding { held } => {
                let held = held + elapsed;
                if held >= self.required {
                    return self.confirm();
                }
                HoldState::Holding { held }
            }
            HoldState::Confirmed => HoldState::Confirmed,
        };
        false
    }

    fn confirm(&mut self) -> bool {
        self.state = HoldState::Confirmed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(100);
    const BOTH: Buttons = Buttons::from_bits(0b011);

    #[test]
    fn confirms_after_full_duration() {
        let mut g = HoldGesture::new(BOTH, Duration::from_millis(2000));
        let mut fired = 0;
        for _ in 0..=25 {
            if g.update(BOTH, STEP) {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(g.state(), HoldState::Confirmed);
    }

    #[test]
    fn early_release_cancels() {
        let mut g = HoldGesture::new(BOTH, Duration::from_millis(2000));
        for _ in 0..15 {
            assert!(!g.update(BOTH, STEP));
        }
        assert!(!g.update(Buttons::B1, STEP));
        assert_eq!(g.state(), HoldState::Idle);
        // Starting over needs the full duration again.
        for _ in 0..15 {
            assert!(!g.update(BOTH, STEP));
        }
    }

    #[test]
    fn extra_buttons_do_not_cancel() {
        let mut g = HoldGesture::new(BOTH, Duration::from_millis(200));
        g.update(Buttons::ALL, STEP);
        g.update(Buttons::ALL, STEP);
        assert!(g.update(Buttons::ALL, STEP));
    }
}
