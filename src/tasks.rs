//! Long-running loops of the multi-task build.
//!
//! Each one is a plain async fn over injected primitives: the badge binary
//! wraps them in executor tasks, tests join them on the host. Periodic loops
//! sleep, do one protected mutation and check the stop flag in between.

use embassy_futures::select::{
    Either,
    select,
};
use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    channel::{
        Channel,
        Receiver,
        Sender,
    },
    mutex::Mutex,
    signal::Signal,
};
use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;

use crate::{
    config::{
        DISPLAY_QUEUE_DEPTH,
        MAX_SCORE,
        QUEUE_DEPTH,
    },
    input::TiltSensor,
    lcd::{
        DisplaySink,
        LcdCommand,
    },
    machine::Shared,
    manager::ScoreManager,
    rtc::Rtc,
    score::Name,
    session::{
        Indicators,
        Session,
        StopFlag,
    },
    store::BlockDevice,
    track::Lane,
    world::World,
};

/// Start-of-run parameters carried by the first tick of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NewGame {
    pub player: Name,
    pub seed: u32,
}

/// Input for one step of the game update task.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GameTick {
    pub lane: Lane,
    /// Reset the world before stepping.
    pub start: Option<NewGame>,
}

/// A finished run on its way to the score keeper.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScoreResult {
    pub player: Name,
    pub points: u32,
}

/// Bounded queues between the tasks.
pub struct Queues<M: RawMutex> {
    pub ticks: Channel<M, GameTick, QUEUE_DEPTH>,
    pub results: Channel<M, ScoreResult, QUEUE_DEPTH>,
    /// Record-worthy scores for the publisher.
    pub publish: Channel<M, u32, QUEUE_DEPTH>,
    pub display: Channel<M, LcdCommand, DISPLAY_QUEUE_DEPTH>,
}

impl<M: RawMutex> Queues<M> {
    pub const fn new() -> Self {
        Self {
            ticks: Channel::new(),
            results: Channel::new(),
            publish: Channel::new(),
            display: Channel::new(),
        }
    }
}

impl<M: RawMutex> Default for Queues<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep for `period` unless stopped first. Returns whether to keep going.
async fn sleep_or_stop<M: RawMutex>(
    delay: &mut impl DelayNs,
    period: Duration,
    stop: &StopFlag<M>,
) -> bool {
    let ms = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
    match select(delay.delay_ms(ms), stop.wait()).await {
        Either::First(()) => !stop.is_stopped(),
        Either::Second(()) => false,
    }
}

/// One point per period while a run is on.
pub async fn points_ticker<M: RawMutex>(
    session: &Session<M>,
    mut delay: impl DelayNs,
    period: Duration,
    stop: &StopFlag<M>,
) {
    while sleep_or_stop(&mut delay, period, stop).await {
        if session.is_running().await {
            session.add_point().await;
        }
    }
}

/// One unit of fuel burnt per period while a run is on.
pub async fn fuel_ticker<M: RawMutex>(
    session: &Session<M>,
    mut delay: impl DelayNs,
    period: Duration,
    stop: &StopFlag<M>,
) {
    while sleep_or_stop(&mut delay, period, stop).await {
        if session.is_running().await {
            session.burn_fuel().await;
        }
    }
}

pub async fn rotation_ticker<M: RawMutex>(
    indicators: &Indicators,
    mut delay: impl DelayNs,
    period: Duration,
    stop: &StopFlag<M>,
) {
    while sleep_or_stop(&mut delay, period, stop).await {
        indicators.rotate();
    }
}

pub async fn blink_ticker<M: RawMutex>(
    indicators: &Indicators,
    mut delay: impl DelayNs,
    period: Duration,
    stop: &StopFlag<M>,
) {
    while sleep_or_stop(&mut delay, period, stop).await {
        indicators.toggle_blink();
    }
}

/// Advances a software clock once a second.
pub async fn clock_ticker<M: RawMutex, B: BlockDevice, R: Rtc>(
    shared: &Shared<M, B, R>,
    mut delay: impl DelayNs,
) {
    while sleep_or_stop(&mut delay, Duration::from_secs(1), &shared.stop).await {
        shared.rtc.lock().await.tick_second();
    }
}

/// Keeps the formatted date lines fresh for the idle screen.
pub async fn date_publisher<M: RawMutex, B: BlockDevice, R: Rtc>(
    shared: &Shared<M, B, R>,
    mut delay: impl DelayNs,
    period: Duration,
) {
    shared.publish_date().await;
    while sleep_or_stop(&mut delay, period, &shared.stop).await {
        shared.publish_date().await;
    }
}

/// Samples the tilt sensor into an overwrite slot. Failed reads are skipped.
pub async fn tilt_sampler<M: RawMutex, T: TiltSensor>(
    mut sensor: T,
    latest: &Signal<M, i16>,
    mut delay: impl DelayNs,
    period: Duration,
    stop: &StopFlag<M>,
) {
    while sleep_or_stop(&mut delay, period, stop).await {
        if let Ok(y) = sensor.sample().await {
            latest.signal(y);
        }
    }
}

/// Owns the world: steps it once per tick, resets it when a tick starts a
/// run, and reports each finished run to the score keeper.
pub async fn game_update<M: RawMutex, const T: usize, const S: usize>(
    ticks: Receiver<'_, M, GameTick, T>,
    session: &Session<M>,
    mut display: impl DisplaySink,
    results: Sender<'_, M, ScoreResult, S>,
    stop: &StopFlag<M>,
) {
    let mut world = World::new(0);
    let mut player = Name::empty();
    let mut live = false;
    loop {
        let tick = match select(ticks.receive(), stop.wait()).await {
            Either::First(tick) => tick,
            Either::Second(()) => break,
        };
        if let Some(new) = tick.start {
            world.reset(new.seed, &mut display).await;
            player = new.player;
            live = true;
        }
        // Ticks between the end of a run and the next start are stale.
        if !live {
            continue;
        }

        let verdict = world.tick(tick.lane, session, &mut display).await;
        if verdict.is_over() {
            live = false;
            let points = session.finish().await;
            info!("run over ({}), {} points", verdict, points);
            results
                .send(ScoreResult {
                    player: player.clone(),
                    points,
                })
                .await;
        }
    }
    debug!("game update stopped");
}

/// Persists finished runs and forwards the record-worthy ones to the
/// publisher.
pub async fn score_keeper<M: RawMutex, B: BlockDevice, const R: usize, const P: usize>(
    results: Receiver<'_, M, ScoreResult, R>,
    scores: &Mutex<M, ScoreManager<B>>,
    publish: Sender<'_, M, u32, P>,
    stop: &StopFlag<M>,
) {
    loop {
        let result = match select(results.receive(), stop.wait()).await {
            Either::First(result) => result,
            Either::Second(()) => break,
        };
        let outcome = scores
            .lock()
            .await
            .record_attempt(&result.player, result.points);
        match outcome {
            Ok(outcome) if outcome.is_record() => {
                info!("new record for {}: {}", result.player, result.points);
                publish.send(result.points.min(MAX_SCORE)).await;
            }
            Ok(_) => debug!("{} points for {} is not a record", result.points, result.player),
            Err(_) => error!("saving score {} failed", result.points),
        }
    }
    debug!("score keeper stopped");
}

#[cfg(test)]
mod tests {
    use embassy_futures::{
        block_on,
        join::join,
    };
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;
    use crate::store::RamBlock;

    /// Finishes instantly but hands control back to the executor.
    struct Yield;

    impl DelayNs for Yield {
        async fn delay_ns(&mut self, _ns: u32) {
            embassy_futures::yield_now().await;
        }
    }

    #[test]
    fn periodic_loops_end_when_stopped() {
        let session = Session::<NoopRawMutex>::new();
        let stop = StopFlag::<NoopRawMutex>::new();
        block_on(async {
            session.start().await;
            let stopper = async {
                for _ in 0..5 {
                    embassy_futures::yield_now().await;
                }
                stop.stop();
            };
            join(
                points_ticker(&session, Yield, Duration::from_millis(1000), &stop),
                stopper,
            )
            .await;
        });
        let points = block_on(session.points());
        assert!(points > 1, "ticker never ran");
    }

    #[test]
    fn tickers_leave_an_idle_session_alone() {
        let session = Session::<NoopRawMutex>::new();
        let stop = StopFlag::<NoopRawMutex>::new();
        block_on(async {
            let stopper = async {
                for _ in 0..5 {
                    embassy_futures::yield_now().await;
                }
                stop.stop();
            };
            join(
                fuel_ticker(&session, Yield, Duration::from_millis(2000), &stop),
                stopper,
            )
            .await;
        });
        assert_eq!(block_on(session.fuel()), crate::config::MAX_FUEL);
    }

    #[test]
    fn keeper_forwards_only_records() {
        let scores = Mutex::<NoopRawMutex, _>::new(ScoreManager::new(RamBlock::new()));
        let results = Channel::<NoopRawMutex, ScoreResult, 4>::new();
        let publish = Channel::<NoopRawMutex, u32, 4>::new();
        let stop = StopFlag::<NoopRawMutex>::new();
        let bob = Name::new("bob").unwrap();

        for points in [50, 40, 2000] {
            results
                .try_send(ScoreResult {
                    player: bob.clone(),
                    points,
                })
                .unwrap();
        }
        block_on(async {
            let stopper = async {
                while !results.is_empty() {
                    embassy_futures::yield_now().await;
                }
                stop.stop();
            };
            join(
                score_keeper(results.receiver(), &scores, publish.sender(), &stop),
                stopper,
            )
            .await;
        });

        assert_eq!(publish.try_receive(), Ok(50));
        assert_eq!(publish.try_receive(), Ok(MAX_SCORE));
        assert!(publish.try_receive().is_err());
        let board = scores.try_lock().unwrap().leaderboard().unwrap();
        assert_eq!(board.entries()[0].value, MAX_SCORE);
    }
}
