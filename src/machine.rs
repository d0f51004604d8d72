//! Game state machine.
//!
//! [`Machine::step`] runs the interactive loop of the current [`Mode`] until
//! it produces the next one. How a run is hosted is left to a [`Scheduling`]:
//! [`Cooperative`] steps the world inline and keeps every periodic counter on
//! polled [`SoftTimer`]s, [`Tasked`] hands game ticks to the update task and
//! leaves the counters to their own tasks.

use core::{
    fmt::Write as _,
    task::Poll,
};

use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    channel::Sender,
    mutex::Mutex,
    signal::Signal,
};
use embassy_time::{
    Duration,
    Instant,
};
use embedded_hal_async::delay::DelayNs;

use crate::{
    config::{
        NAME_LEN,
        Timing,
    },
    hold::HoldGesture,
    input::{
        Buttons,
        Chord,
        Debouncer,
        Edges,
        Key,
        Keypad,
        TiltSensor,
        lane_for_tilt,
    },
    lcd::DisplaySink,
    manager::ScoreManager,
    rtc::{
        DateSnapshot,
        Field,
        Line,
        Rtc,
    },
    score::Name,
    session::{
        Indicators,
        Latest,
        Session,
        StopFlag,
    },
    store::BlockDevice,
    tasks::{
        GameTick,
        NewGame,
    },
    track::Lane,
    world::World,
};

/// Buttons held together to enter or leave configuration.
pub const HOLD_COMBO: Buttons = Buttons::from_bits(Buttons::B1.bits() | Buttons::B2.bits());

/// Player name used until the boot prompt is answered.
pub const DEFAULT_PLAYER: &str = "aaaaaaaaaaa";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Idle,
    Config,
    ConfigDate,
    ConfigName,
    ConfigEraseScores,
    ScoresErased,
    Pregame,
    Game,
    Postgame,
}

impl Mode {
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Idle, Self::Config | Self::Pregame)
                | (
                    Self::Config,
                    Self::ConfigDate | Self::ConfigEraseScores | Self::ConfigName | Self::Idle
                )
                | (Self::ConfigDate | Self::ConfigName | Self::ScoresErased, Self::Config)
                | (Self::ConfigEraseScores, Self::ScoresErased | Self::Config)
                | (Self::Pregame, Self::Game)
                | (Self::Game, Self::Postgame)
                | (Self::Postgame, Self::Idle)
        )
    }
}

/// Countdown advanced by hand with the time that passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoftTimer {
    period: Duration,
    elapsed: Duration,
}

impl SoftTimer {
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            elapsed: Duration::from_ticks(0),
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::from_ticks(0);
    }

    /// Account for `dt`. Ready once per expired period; time beyond the
    /// period carries over to the next poll.
    pub fn poll(&mut self, dt: Duration) -> Poll<()> {
        self.elapsed += dt;
        if self.elapsed >= self.period {
            self.elapsed -= self.period;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Everything the machine and the tasks share.
pub struct Shared<M: RawMutex, B, R> {
    pub session: Session<M>,
    pub scores: Mutex<M, ScoreManager<B>>,
    pub rtc: Mutex<M, R>,
    pub indicators: Indicators,
    pub date: Latest<M, DateSnapshot>,
    /// Latest tilt sample.
    pub tilt: Signal<M, i16>,
    pub stop: StopFlag<M>,
}

impl<M: RawMutex, B: BlockDevice, R: Rtc> Shared<M, B, R> {
    pub const fn new(scores: ScoreManager<B>, rtc: R) -> Self {
        Self {
            session: Session::new(),
            scores: Mutex::new(scores),
            rtc: Mutex::new(rtc),
            indicators: Indicators::new(),
            date: Latest::new(),
            tilt: Signal::new(),
            stop: StopFlag::new(),
        }
    }

    /// Latest published date lines, or fresh ones if nothing was published.
    pub async fn snapshot(&self) -> DateSnapshot {
        match self.date.get() {
            Some(snapshot) => snapshot,
            None => self.rtc.lock().await.now().snapshot(),
        }
    }

    pub async fn publish_date(&self) {
        let snapshot = self.rtc.lock().await.now().snapshot();
        self.date.publish(snapshot);
    }

    /// One second passed.
    pub async fn tick_clock(&self) {
        self.rtc.lock().await.tick_second();
        self.publish_date().await;
    }
}

/// A delay that also tells the time, so loops can measure how long a pass
/// really took.
pub trait Timebase: DelayNs {
    fn now(&self) -> Instant;
}

#[cfg(feature = "badge")]
impl Timebase for embassy_time::Delay {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// How a run is hosted.
#[allow(async_fn_in_trait)]
pub trait Scheduling<M: RawMutex> {
    /// `dt` of UI or game time passed.
    async fn elapse<B: BlockDevice, R: Rtc>(&mut self, shared: &Shared<M, B, R>, dt: Duration);

    /// Start a run for `player`.
    async fn begin<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        player: &Name,
        seed: u32,
        display: &mut impl DisplaySink,
    );

    /// One game tick. Returns the final points once the run is over.
    async fn tick<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        display: &mut impl DisplaySink,
    ) -> Option<u32>;

    /// The run ended with `points`.
    async fn finish<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        player: &Name,
        points: u32,
    );
}

/// Single control flow: the world is stepped in place and the periodic
/// counters run off [`SoftTimer`]s fed by the machine's own sleeps.
pub struct Cooperative<T> {
    world: World,
    tilt: T,
    lane: Lane,
    running: bool,
    points: SoftTimer,
    fuel: SoftTimer,
    blink: SoftTimer,
    rotation: SoftTimer,
    clock: SoftTimer,
}

impl<T: TiltSensor> Cooperative<T> {
    pub const fn new(tilt: T, timing: Timing) -> Self {
        Self {
            world: World::new(0),
            tilt,
            lane: Lane::Top,
            running: false,
            points: SoftTimer::new(timing.points),
            fuel: SoftTimer::new(timing.fuel),
            blink: SoftTimer::new(timing.blink),
            rotation: SoftTimer::new(timing.rotation),
            clock: SoftTimer::new(Duration::from_secs(1)),
        }
    }
}

impl<M: RawMutex, T: TiltSensor> Scheduling<M> for Cooperative<T> {
    async fn elapse<B: BlockDevice, R: Rtc>(&mut self, shared: &Shared<M, B, R>, dt: Duration) {
        if self.blink.poll(dt).is_ready() {
            shared.indicators.toggle_blink();
        }
        if self.rotation.poll(dt).is_ready() {
            shared.indicators.rotate();
        }
        if self.clock.poll(dt).is_ready() {
            shared.tick_clock().await;
        }
        if self.running {
            if self.points.poll(dt).is_ready() {
                shared.session.add_point().await;
            }
            if self.fuel.poll(dt).is_ready() {
                shared.session.burn_fuel().await;
            }
        }
    }

    async fn begin<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        player: &Name,
        seed: u32,
        display: &mut impl DisplaySink,
    ) {
        shared.session.start().await;
        self.world.reset(seed, display).await;
        self.lane = Lane::Top;
        self.points.reset();
        self.fuel.reset();
        self.running = true;
        info!("{} starts a run", player);
    }

    async fn tick<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        display: &mut impl DisplaySink,
    ) -> Option<u32> {
        if let Ok(y) = self.tilt.sample().await {
            self.lane = lane_for_tilt(y, self.lane);
        }
        let verdict = self.world.tick(self.lane, &shared.session, display).await;
        if !verdict.is_over() {
            return None;
        }
        self.running = false;
        let points = shared.session.finish().await;
        info!("run over ({}), {} points", verdict, points);
        Some(points)
    }

    async fn finish<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        player: &Name,
        points: u32,
    ) {
        let outcome = shared.scores.lock().await.record_attempt(player, points);
        match outcome {
            Ok(outcome) => debug!("score {} for {}: {}", points, player, outcome),
            Err(_) => error!("saving score {} failed", points),
        }
    }
}

/// Multi-task hosting: ticks go to the game update task, the session's end
/// marker tells when the run is over.
pub struct Tasked<'a, M: RawMutex, const N: usize> {
    ticks: Sender<'a, M, GameTick, N>,
    lane: Lane,
    pending: Option<NewGame>,
}

impl<'a, M: RawMutex, const N: usize> Tasked<'a, M, N> {
    pub const fn new(ticks: Sender<'a, M, GameTick, N>) -> Self {
        Self {
            ticks,
            lane: Lane::Top,
            pending: None,
        }
    }
}

impl<M: RawMutex, const N: usize> Scheduling<M> for Tasked<'_, M, N> {
    async fn elapse<B: BlockDevice, R: Rtc>(&mut self, _shared: &Shared<M, B, R>, _dt: Duration) {}

    async fn begin<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        player: &Name,
        seed: u32,
        _display: &mut impl DisplaySink,
    ) {
        shared.session.start().await;
        shared.tilt.reset();
        self.lane = Lane::Top;
        self.pending = Some(NewGame {
            player: player.clone(),
            seed,
        });
    }

    async fn tick<B: BlockDevice, R: Rtc>(
        &mut self,
        shared: &Shared<M, B, R>,
        _display: &mut impl DisplaySink,
    ) -> Option<u32> {
        if let Some(y) = shared.tilt.try_take() {
            self.lane = lane_for_tilt(y, self.lane);
        }
        self.ticks
            .send(GameTick {
                lane: self.lane,
                start: self.pending.take(),
            })
            .await;
        shared.session.ended().await
    }

    async fn finish<B: BlockDevice, R: Rtc>(
        &mut self,
        _shared: &Shared<M, B, R>,
        _player: &Name,
        points: u32,
    ) {
        debug!("score {} left to the score keeper", points);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IdleView {
    Clock,
    Scores,
}

const CONFIG_OPTIONS: [(&str, Mode); 3] = [
    ("Time Config", Mode::ConfigDate),
    ("Score Config", Mode::ConfigEraseScores),
    ("Name Config", Mode::ConfigName),
];

/// The key a released chord stands for. A chord that grew into the hold
/// combination is the configuration gesture, not a key.
fn single_key(chord: Buttons) -> Option<Key> {
    if chord.contains(HOLD_COMBO) {
        None
    } else {
        chord.key()
    }
}

fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

fn line_of(s: &str) -> Line {
    let mut line = Line::new();
    for c in s.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}

const fn ordinal(n: usize) -> &'static str {
    match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// `' '` then `'a'..='z'`, wrapping.
const fn next_letter(c: u8) -> u8 {
    match c {
        b' ' => b'a',
        b'a'..=b'y' => c + 1,
        _ => b' ',
    }
}

const fn prev_letter(c: u8) -> u8 {
    match c {
        b' ' => b'z',
        b'b'..=b'z' => c - 1,
        _ => b' ',
    }
}

pub struct Machine<'a, M: RawMutex, B, R, K, D, P, S> {
    shared: &'a Shared<M, B, R>,
    keys: Debouncer<K>,
    display: D,
    delay: P,
    sched: S,
    timing: Timing,
    mode: Mode,
    player: Name,
    last_points: u32,
    /// What each row currently shows, to skip redundant redraws.
    shown: [Option<Line>; 2],
    /// End of the previous pass and how long that pass took.
    mark: Instant,
    lap: Duration,
}

impl<'a, M, B, R, K, D, P, S> Machine<'a, M, B, R, K, D, P, S>
where
    M: RawMutex,
    B: BlockDevice,
    R: Rtc,
    K: Keypad,
    D: DisplaySink,
    P: Timebase,
    S: Scheduling<M>,
{
    pub fn new(
        shared: &'a Shared<M, B, R>,
        keypad: K,
        display: D,
        delay: P,
        sched: S,
        timing: Timing,
    ) -> Self {
        let mark = delay.now();
        Self {
            shared,
            keys: Debouncer::new(keypad, millis(timing.debounce)),
            display,
            delay,
            sched,
            timing,
            mode: Mode::Idle,
            player: Name::new(DEFAULT_PLAYER).unwrap_or_default(),
            last_points: 0,
            shown: [None, None],
            mark,
            lap: Duration::from_ticks(0),
        }
    }

    pub const fn mode(&self) -> Mode {
        self.mode
    }

    pub fn player(&self) -> &Name {
        &self.player
    }

    pub fn set_player(&mut self, player: Name) {
        self.player = player;
    }

    /// Points of the last finished run.
    pub const fn last_points(&self) -> u32 {
        self.last_points
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn keypad_mut(&mut self) -> &mut K {
        self.keys.keypad_mut()
    }

    /// Ask for the player's name, then run modes until stopped.
    pub async fn run(&mut self) {
        self.clear().await;
        self.player = self.edit_name().await;
        info!("player is {}", self.player);
        self.mode = Mode::Idle;
        while !self.shared.stop.is_stopped() {
            self.step().await;
        }
        debug!("state machine stopped");
    }

    /// Run the current mode to completion and move to the mode it picked.
    pub async fn step(&mut self) -> Mode {
        let next = match self.mode {
            Mode::Idle => self.idle().await,
            Mode::Config => self.config().await,
            Mode::ConfigDate => self.config_date().await,
            Mode::ConfigName => self.config_name().await,
            Mode::ConfigEraseScores => self.config_erase_scores().await,
            Mode::ScoresErased => self.scores_erased().await,
            Mode::Pregame => self.pregame().await,
            Mode::Game => self.game().await,
            Mode::Postgame => self.postgame().await,
        };
        if self.mode.can_transition(next) {
            debug!("mode {} -> {}", self.mode, next);
            self.mode = next;
        } else {
            error!("refusing transition {} -> {}", self.mode, next);
        }
        self.mode
    }

    /// Time since the previous call. Debouncing and redraws stretch a pass
    /// beyond the sleep.
    fn lap(&mut self) -> Duration {
        let now = self.delay.now();
        self.lap = now.saturating_duration_since(self.mark);
        self.mark = now;
        self.lap
    }

    /// Sleep one UI period, read the keys and let the scheduling catch up
    /// with the time that passed.
    async fn pause(&mut self) -> Edges {
        self.delay.delay_ms(millis(self.timing.poll)).await;
        let edges = self.keys.poll(&mut self.delay).await;
        let lap = self.lap();
        self.sched.elapse(self.shared, lap).await;
        edges
    }

    async fn next_key(&mut self) -> Option<Key> {
        self.pause().await.pressed.key()
    }

    async fn wait_release(&mut self) {
        loop {
            self.pause().await;
            if self.keys.levels().is_empty() {
                return;
            }
        }
    }

    async fn wait_press(&mut self) {
        while self.pause().await.pressed.is_empty() {}
    }

    async fn clear(&mut self) {
        self.display.clear().await;
        self.shown = [None, None];
    }

    async fn show(&mut self, row: u8, text: &str) {
        let line = line_of(text);
        let slot = &mut self.shown[usize::from(row)];
        if slot.as_ref() == Some(&line) {
            return;
        }
        *slot = Some(line);
        self.display.line(row, text).await;
    }

    async fn idle(&mut self) -> Mode {
        self.clear().await;
        let mut hold = HoldGesture::new(HOLD_COMBO, self.timing.hold);
        let mut chord = Chord::new();
        // Buttons still down from the previous mode must be let go first.
        let mut armed = self.keys.levels().is_empty();
        let mut view = IdleView::Clock;
        loop {
            self.render_idle(view).await;
            self.pause().await;
            let levels = self.keys.levels();
            if !armed {
                armed = levels.is_empty();
                continue;
            }
            if hold.update(levels, self.lap) {
                return Mode::Config;
            }
            match chord.update(levels).and_then(single_key) {
                Some(Key::Increment) => view = IdleView::Clock,
                Some(Key::Decrement) => view = IdleView::Scores,
                Some(Key::Confirm) => return Mode::Pregame,
                None => {}
            }
        }
    }

    async fn render_idle(&mut self, view: IdleView) {
        match view {
            IdleView::Clock => {
                let snapshot = self.shared.snapshot().await;
                self.show(0, &snapshot.date).await;
                self.show(1, &snapshot.time).await;
            }
            IdleView::Scores => {
                let rank = self.shared.indicators.rank();
                let entry = self.shared.scores.lock().await.get(rank);
                let mut top = Line::new();
                let _ = write!(top, "{}{} place:", rank + 1, ordinal(rank + 1));
                let mut bottom = Line::new();
                match entry {
                    Ok(entry) if !entry.is_empty() => {
                        let _ = write!(bottom, "{}P {}", entry.value, entry.name);
                    }
                    _ => {
                        let _ = bottom.push_str("Not defined.");
                    }
                }
                self.show(0, &top).await;
                self.show(1, &bottom).await;
            }
        }
    }

    async fn config(&mut self) -> Mode {
        self.clear().await;
        let mut hold = HoldGesture::new(HOLD_COMBO, self.timing.hold);
        let mut chord = Chord::new();
        let mut armed = self.keys.levels().is_empty();
        let mut cursor: usize = 0;
        loop {
            // Two-row window over the options, following the cursor.
            let top = cursor.saturating_sub(1).min(CONFIG_OPTIONS.len() - 2);
            for row in 0..2 {
                let index = top + row;
                let mut line = Line::new();
                let marker = if index == cursor { '>' } else { ' ' };
                let _ = write!(line, "{marker} {}", CONFIG_OPTIONS[index].0);
                self.show(row as u8, &line).await;
            }

            self.pause().await;
            let levels = self.keys.levels();
            if !armed {
                armed = levels.is_empty();
                continue;
            }
            if hold.update(levels, self.lap) {
                return Mode::Idle;
            }
            match chord.update(levels).and_then(single_key) {
                Some(Key::Increment) => cursor = (cursor + 1).min(CONFIG_OPTIONS.len() - 1),
                Some(Key::Decrement) => cursor = cursor.saturating_sub(1),
                Some(Key::Confirm) => return CONFIG_OPTIONS[cursor].1,
                None => {}
            }
        }
    }

    async fn config_date(&mut self) -> Mode {
        self.clear().await;
        let mut now = {
            let mut rtc = self.shared.rtc.lock().await;
            rtc.set_running(false);
            rtc.now()
        };
        now.clear_seconds();

        for field in Field::ALL {
            loop {
                let blank = self.shared.indicators.blinked().then_some(field);
                self.show(0, &now.date_line(blank)).await;
                self.show(1, &now.time_line(blank)).await;
                match self.next_key().await {
                    Some(Key::Increment) => now.adjust(field, true),
                    Some(Key::Decrement) => now.adjust(field, false),
                    Some(Key::Confirm) => break,
                    None => {}
                }
            }
        }

        {
            let mut rtc = self.shared.rtc.lock().await;
            rtc.set(now);
            rtc.set_running(true);
        }
        self.shared.publish_date().await;
        info!("clock set to {}", now);
        Mode::Config
    }

    async fn config_name(&mut self) -> Mode {
        self.clear().await;
        self.player = self.edit_name().await;
        info!("player is now {}", self.player);
        Mode::Config
    }

    /// Character-by-character name editor. Keeps the current name if the
    /// result is blank.
    async fn edit_name(&mut self) -> Name {
        let mut buf = [b' '; NAME_LEN];
        for (slot, b) in buf.iter_mut().zip(self.player.as_str().bytes()) {
            *slot = b.to_ascii_lowercase();
        }

        self.show(0, "User name:").await;
        for pos in 0..NAME_LEN {
            loop {
                let mut shown = buf;
                if self.shared.indicators.blinked() {
                    shown[pos] = b'_';
                }
                let text = core::str::from_utf8(&shown).unwrap_or_default();
                self.show(1, text).await;
                match self.next_key().await {
                    Some(Key::Increment) => buf[pos] = next_letter(buf[pos]),
                    Some(Key::Decrement) => buf[pos] = prev_letter(buf[pos]),
                    Some(Key::Confirm) => break,
                    None => {}
                }
            }
        }

        let raw = core::str::from_utf8(&buf).unwrap_or_default();
        match Name::new(raw) {
            Ok(name) if !name.is_empty() => name,
            _ => self.player.clone(),
        }
    }

    async fn config_erase_scores(&mut self) -> Mode {
        self.clear().await;
        self.show(0, "Erase scores?").await;
        let mut yes = false;
        loop {
            self.show(1, if yes { "> Yes   No" } else { "  Yes > No" })
                .await;
            match self.next_key().await {
                Some(Key::Increment) => yes = false,
                Some(Key::Decrement) => yes = true,
                Some(Key::Confirm) => break,
                None => {}
            }
        }
        if !yes {
            return Mode::Config;
        }

        let erased = self.shared.scores.lock().await.erase();
        match erased {
            Ok(()) => {
                info!("leaderboard erased");
                Mode::ScoresErased
            }
            Err(_) => {
                error!("erasing the leaderboard failed");
                self.clear().await;
                self.show(0, "Erase failed.").await;
                self.wait_release().await;
                self.wait_press().await;
                Mode::Config
            }
        }
    }

    async fn scores_erased(&mut self) -> Mode {
        self.clear().await;
        self.show(0, "Erased. Press").await;
        self.show(1, "any button.").await;
        self.wait_release().await;
        self.wait_press().await;
        Mode::Config
    }

    async fn pregame(&mut self) -> Mode {
        self.clear().await;
        self.show(0, "Press any button").await;
        self.show(1, "to start.").await;
        self.wait_release().await;
        self.wait_press().await;
        Mode::Game
    }

    async fn game(&mut self) -> Mode {
        let seed = self.shared.rtc.lock().await.seconds();
        self.sched
            .begin(self.shared, &self.player, seed, &mut self.display)
            .await;
        // The world drew over the whole display.
        self.shown = [None, None];

        loop {
            if self.shared.stop.is_stopped() {
                self.last_points = self.shared.session.finish().await;
                return Mode::Postgame;
            }
            self.delay.delay_ms(millis(self.timing.game_tick)).await;
            let lap = self.lap();
            self.sched.elapse(self.shared, lap).await;
            if let Some(points) = self.sched.tick(self.shared, &mut self.display).await {
                self.last_points = points;
                return Mode::Postgame;
            }
        }
    }

    async fn postgame(&mut self) -> Mode {
        self.sched
            .finish(self.shared, &self.player, self.last_points)
            .await;
        self.clear().await;
        let mut score = Line::new();
        let _ = write!(score, "scored {}!", self.last_points);
        self.show(0, "Game over. You").await;
        self.show(1, &score).await;
        self.wait_release().await;
        self.wait_press().await;
        Mode::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use Mode::*;
        assert!(Idle.can_transition(Config));
        assert!(Idle.can_transition(Pregame));
        assert!(!Idle.can_transition(Game));
        assert!(Config.can_transition(Idle));
        assert!(ConfigEraseScores.can_transition(ScoresErased));
        assert!(!ScoresErased.can_transition(Idle));
        assert!(Game.can_transition(Postgame));
        assert!(!Postgame.can_transition(Game));
        assert!(!Pregame.can_transition(Idle));
    }

    #[test]
    fn soft_timer_carries_over() {
        let mut t = SoftTimer::new(Duration::from_millis(1000));
        let step = Duration::from_millis(300);
        let fired: usize = (0..10).filter(|_| t.poll(step).is_ready()).count();
        assert_eq!(fired, 3);
        t.reset();
        assert!(t.poll(Duration::from_millis(999)).is_pending());
        assert!(t.poll(Duration::from_millis(1)).is_ready());
    }

    #[test]
    fn letters_cycle_through_space() {
        assert_eq!(next_letter(b' '), b'a');
        assert_eq!(next_letter(b'z'), b' ');
        assert_eq!(prev_letter(b' '), b'z');
        assert_eq!(prev_letter(b'a'), b' ');
        assert_eq!(prev_letter(next_letter(b'q')), b'q');
    }

    #[test]
    fn default_player_is_normalized() {
        assert_eq!(Name::new(DEFAULT_PLAYER).unwrap().as_str(), "Aaaaaaaaaaa");
    }
}
