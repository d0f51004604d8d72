//! Game-loop physics and rendering.
//!
//! The car never moves on screen: each tick it advances one DDRAM column and
//! the viewport shifts left by one, so the track appears to scroll past.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::{
    config::{
        CAR_START_COLUMN,
        DDRAM_WIDTH,
        FUEL_REFILL,
        INITIAL_CLEAR_COLUMNS,
        MAX_FUEL,
    },
    glyphs,
    lcd::{
        DisplaySink,
        LcdCommand,
    },
    rng::Rng,
    session::Session,
    track::{
        Band,
        Cell,
        Lane,
        TrackMap,
    },
};

/// Back column at which the first half of the ring is regenerated; the
/// viewport is then showing the second half.
const REFRESH_FIRST_HALF_AT: u8 = CAR_START_COLUMN + DDRAM_WIDTH / 2;
/// Back column at which the second half is regenerated.
const REFRESH_SECOND_HALF_AT: u8 = CAR_START_COLUMN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Car {
    lane: Lane,
    /// Lane the car was last drawn in.
    drawn: Lane,
    back: u8,
    front: u8,
}

impl Car {
    pub const fn new() -> Self {
        Self {
            lane: Lane::Top,
            drawn: Lane::Top,
            back: CAR_START_COLUMN,
            front: CAR_START_COLUMN + 1,
        }
    }

    pub const fn lane(&self) -> Lane {
        self.lane
    }

    pub const fn back(&self) -> u8 {
        self.back
    }

    pub const fn front(&self) -> u8 {
        self.front
    }

    pub fn steer(&mut self, lane: Lane) {
        self.lane = lane;
    }

    /// Move to a 1-based row. Any row other than 1 or 2 is ignored.
    pub fn change_row(&mut self, row: u8) -> bool {
        match Lane::from_row(row) {
            Some(lane) => {
                self.lane = lane;
                true
            }
            None => false,
        }
    }

    fn advance(&mut self) {
        self.back = (self.back + 1) % DDRAM_WIDTH;
        self.front = (self.front + 1) % DDRAM_WIDTH;
    }
}

impl Default for Car {
    fn default() -> Self {
        Self::new()
    }
}

/// What one physics step ran into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Contact {
    pub grabbed_fuel: bool,
    pub crashed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
    Running,
    Crashed,
    OutOfFuel,
}

impl Verdict {
    pub const fn is_over(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Top and bottom gauge cells, in quarters, for a fuel level.
pub fn gauge_quarters(fuel: u8) -> (u8, u8) {
    let eighths = (u16::from(fuel.min(MAX_FUEL)) * 8 / u16::from(MAX_FUEL)) as u8;
    let bottom = eighths.min(4);
    (eighths - bottom, bottom)
}

const fn cell_char(cell: Cell) -> u8 {
    match cell {
        Cell::Empty => b' ',
        Cell::Obstacle => glyphs::BARRIER,
        Cell::Fuel => glyphs::FUEL,
    }
}

pub struct World {
    track: TrackMap,
    car: Car,
    gauge_col: u8,
    rng: Rng,
}

impl World {
    pub const fn new(seed: u32) -> Self {
        Self {
            track: TrackMap::new(),
            car: Car::new(),
            gauge_col: 0,
            rng: Rng::new(seed),
        }
    }

    pub const fn car(&self) -> &Car {
        &self.car
    }

    pub const fn track(&self) -> &TrackMap {
        &self.track
    }

    pub fn track_mut(&mut self) -> &mut TrackMap {
        &mut self.track
    }

    /// Start a new run: fresh track, car at the start column, display
    /// cleared and redrawn.
    pub async fn reset(&mut self, seed: u32, display: &mut impl DisplaySink) {
        self.rng = Rng::new(seed);
        self.car = Car::new();
        self.gauge_col = 0;
        self.track.clear();
        self.track.regenerate(
            Band {
                from: INITIAL_CLEAR_COLUMNS,
                to: DDRAM_WIDTH,
            },
            &mut self.rng,
        );

        display.clear().await;
        for cmd in glyphs::upload() {
            display.submit(cmd).await;
        }
        self.render_band(Band::FIRST_HALF, display).await;
        self.render_band(Band::SECOND_HALF, display).await;
        debug!("track reset with seed {}", seed);
    }

    /// One physics and render step with `fuel` in the tank.
    pub async fn step(&mut self, lane: Lane, fuel: u8, display: &mut impl DisplaySink) -> Contact {
        self.car.steer(lane);

        if self.car.back == REFRESH_FIRST_HALF_AT {
            self.refresh(Band::FIRST_HALF, display).await;
        } else if self.car.back == REFRESH_SECOND_HALF_AT {
            self.refresh(Band::SECOND_HALF, display).await;
        }

        self.move_car(display).await;
        self.move_gauge(fuel, display).await;
        display.submit(LcdCommand::ShiftLeft).await;

        let lane = self.car.lane;
        let grabbed_fuel = [self.car.back, self.car.front]
            .into_iter()
            .find(|&col| self.track.cell(lane, col) == Cell::Fuel)
            .map(|col| self.track.set(lane, col, Cell::Empty))
            .is_some();
        let crashed = [self.car.back, self.car.front]
            .iter()
            .any(|&col| self.track.cell(lane, col) == Cell::Obstacle);

        Contact {
            grabbed_fuel,
            crashed,
        }
    }

    /// Step with the fuel held in `session`, applying any refill, and decide
    /// whether the run is over. A lost run draws the wreck.
    pub async fn tick<M: RawMutex>(
        &mut self,
        lane: Lane,
        session: &Session<M>,
        display: &mut impl DisplaySink,
    ) -> Verdict {
        let fuel = session.fuel().await;
        let contact = self.step(lane, fuel, display).await;
        if contact.grabbed_fuel {
            session.refuel(FUEL_REFILL).await;
        }

        let verdict = if contact.crashed {
            Verdict::Crashed
        } else if session.fuel().await == 0 {
            Verdict::OutOfFuel
        } else {
            Verdict::Running
        };
        if verdict.is_over() {
            self.render_wreck(display).await;
        }
        verdict
    }

    async fn refresh(&mut self, band: Band, display: &mut impl DisplaySink) {
        self.track.regenerate(band, &mut self.rng);
        self.render_band(band, display).await;
    }

    async fn render_band(&self, band: Band, display: &mut impl DisplaySink) {
        for lane in Lane::BOTH {
            for col in band.columns() {
                display
                    .put(lane.index(), col, cell_char(self.track.cell(lane, col)))
                    .await;
            }
        }
    }

    async fn move_car(&mut self, display: &mut impl DisplaySink) {
        let drawn = self.car.drawn.index();
        display.put(drawn, self.car.back, b' ').await;
        display.put(drawn, self.car.front, b' ').await;

        self.car.advance();

        let row = self.car.lane.index();
        display.put(row, self.car.back, glyphs::CAR_BACK).await;
        display.put(row, self.car.front, glyphs::CAR_FRONT).await;
        self.car.drawn = self.car.lane;
    }

    async fn move_gauge(&mut self, fuel: u8, display: &mut impl DisplaySink) {
        for lane in Lane::BOTH {
            display.put(lane.index(), self.gauge_col, b' ').await;
        }
        self.gauge_col = (self.gauge_col + 1) % DDRAM_WIDTH;

        let (top, bottom) = gauge_quarters(fuel);
        display
            .put(Lane::Top.index(), self.gauge_col, glyphs::gauge_cell(top))
            .await;
        display
            .put(Lane::Bottom.index(), self.gauge_col, glyphs::gauge_cell(bottom))
            .await;
    }

    async fn render_wreck(&self, display: &mut impl DisplaySink) {
        let row = self.car.lane.index();
        display.put(row, self.car.back, glyphs::WRECK).await;
        display.put(row, self.car.front, glyphs::WRECK).await;
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;
    use crate::lcd::{
        Direct,
        TextBuffer,
    };

    fn world() -> (World, Direct<TextBuffer>) {
        let mut display = Direct::new(TextBuffer::new());
        let mut world = World::new(1);
        block_on(world.reset(1, &mut display));
        world.track_mut().clear();
        (world, display)
    }

    #[test]
    fn gauge_quantization() {
        assert_eq!(gauge_quarters(8), (4, 4));
        assert_eq!(gauge_quarters(7), (3, 4));
        assert_eq!(gauge_quarters(5), (1, 4));
        assert_eq!(gauge_quarters(4), (0, 4));
        assert_eq!(gauge_quarters(1), (0, 1));
        assert_eq!(gauge_quarters(0), (0, 0));
    }

    #[test]
    fn car_only_changes_to_rows_one_and_two() {
        let mut car = Car::new();
        assert!(car.change_row(2));
        assert_eq!(car.lane(), Lane::Bottom);
        assert!(!car.change_row(0));
        assert!(!car.change_row(3));
        assert_eq!(car.lane(), Lane::Bottom);
        assert!(car.change_row(1));
        assert_eq!(car.lane(), Lane::Top);
    }

    #[test]
    fn car_stays_in_place_on_screen() {
        let (mut w, mut d) = world();
        for _ in 0..45 {
            block_on(w.step(Lane::Top, MAX_FUEL, &mut d));
            // Track cells were cleared, so only the car and gauge are drawn.
            w.track_mut().clear();
            assert_eq!(d.lcd().visible(0, 2), glyphs::CAR_BACK);
            assert_eq!(d.lcd().visible(0, 3), glyphs::CAR_FRONT);
            assert_eq!(d.lcd().visible(1, 0), glyphs::gauge_cell(4));
        }
    }

    #[test]
    fn lane_change_erases_the_old_row() {
        let (mut w, mut d) = world();
        block_on(w.step(Lane::Top, MAX_FUEL, &mut d));
        w.track_mut().clear();
        block_on(w.step(Lane::Bottom, MAX_FUEL, &mut d));
        assert_eq!(d.lcd().visible(0, 2), b' ');
        assert_eq!(d.lcd().visible(0, 3), b' ');
        assert_eq!(d.lcd().visible(1, 2), glyphs::CAR_BACK);
    }

    #[test]
    fn obstacle_ahead_in_lane_crashes() {
        let (mut w, mut d) = world();
        let front = w.car().front();
        w.track_mut().set(Lane::Top, front + 1, Cell::Obstacle);
        let c = block_on(w.step(Lane::Top, MAX_FUEL, &mut d));
        assert!(c.crashed);
    }

    #[test]
    fn obstacle_in_other_lane_is_harmless() {
        let (mut w, mut d) = world();
        let front = w.car().front();
        w.track_mut().set(Lane::Bottom, front + 1, Cell::Obstacle);
        let c = block_on(w.step(Lane::Top, MAX_FUEL, &mut d));
        assert!(!c.crashed);
    }

    #[test]
    fn fuel_grab_is_row_exact_and_capped() {
        let session = Session::<NoopRawMutex>::new();
        let (mut w, mut d) = world();
        block_on(session.start());
        block_on(session.burn_fuel());
        block_on(session.burn_fuel());

        let front = w.car().front();
        w.track_mut().set(Lane::Bottom, front + 1, Cell::Fuel);
        assert_eq!(block_on(w.tick(Lane::Top, &session, &mut d)), Verdict::Running);
        assert_eq!(block_on(session.fuel()), MAX_FUEL - 2);

        let front = w.car().front();
        w.track_mut().set(Lane::Top, front + 1, Cell::Fuel);
        assert_eq!(block_on(w.tick(Lane::Top, &session, &mut d)), Verdict::Running);
        assert_eq!(block_on(session.fuel()), MAX_FUEL);
        assert_eq!(w.track().cell(Lane::Top, front + 1), Cell::Empty);
    }

    #[test]
    fn empty_tank_ends_the_run() {
        let session = Session::<NoopRawMutex>::new();
        let (mut w, mut d) = world();
        block_on(session.start());
        for _ in 0..MAX_FUEL {
            block_on(session.burn_fuel());
        }
        assert_eq!(block_on(w.tick(Lane::Top, &session, &mut d)), Verdict::OutOfFuel);
        assert_eq!(d.lcd().cell(0, w.car().back()), glyphs::WRECK);
    }
}
