//! The multi-task build, joined on one host executor.

mod common;

use car_runner::{
    config::{
        MAX_SCORE,
        Timing,
    },
    input::Buttons,
    lcd::{
        QueueSink,
        TextBuffer,
        display_writer,
    },
    machine::{
        Machine,
        Mode,
        Shared,
        Tasked,
    },
    manager::ScoreManager,
    rtc::{
        DateTime,
        SoftRtc,
    },
    store::RamBlock,
    tasks::{
        GameTick,
        NewGame,
        Queues,
        fuel_ticker,
        game_update,
        points_ticker,
        score_keeper,
    },
    track::Lane,
};
use common::{
    Clock,
    FakeDelay,
    ScriptedKeypad,
};
use embassy_futures::{
    block_on,
    join::{
        join,
        join3,
    },
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

type M = NoopRawMutex;

fn shared() -> Shared<M, RamBlock, SoftRtc> {
    Shared::new(ScoreManager::new(RamBlock::new()), SoftRtc::new(DateTime::EPOCH))
}

#[test]
fn a_run_flows_through_every_task() {
    let clock = Clock::default();
    // Tickers get their own timeline so they do not push the keypad script.
    let ticker_clock = Clock::default();
    let shared = shared();
    let queues = Queues::<M>::new();
    let mut screen = TextBuffer::new();
    let timing = Timing::DEFAULT;

    let mut m = Machine::new(
        &shared,
        ScriptedKeypad::new(&clock),
        QueueSink::new(queues.display.sender()),
        FakeDelay::new(&clock),
        Tasked::new(queues.ticks.sender()),
        timing,
    );

    block_on(async {
        let driver = async {
            m.keypad_mut().press(100, 100, Buttons::B3);
            assert_eq!(m.step().await, Mode::Pregame);
            m.keypad_mut().press(300, 100, Buttons::B1);
            assert_eq!(m.step().await, Mode::Game);
            assert_eq!(m.step().await, Mode::Postgame);
            m.keypad_mut().press(300, 100, Buttons::B3);
            assert_eq!(m.step().await, Mode::Idle);
            shared.stop.stop();
        };
        join(
            join3(
                driver,
                display_writer(queues.display.receiver(), &mut screen, &shared.stop),
                game_update(
                    queues.ticks.receiver(),
                    &shared.session,
                    QueueSink::new(queues.display.sender()),
                    queues.results.sender(),
                    &shared.stop,
                ),
            ),
            join3(
                score_keeper(
                    queues.results.receiver(),
                    &shared.scores,
                    queues.publish.sender(),
                    &shared.stop,
                ),
                points_ticker(
                    &shared.session,
                    FakeDelay::new(&ticker_clock),
                    timing.points,
                    &shared.stop,
                ),
                fuel_ticker(
                    &shared.session,
                    FakeDelay::new(&ticker_clock),
                    timing.fuel,
                    &shared.stop,
                ),
            ),
        )
        .await;
    });

    let points = m.last_points();
    assert!(points > 0);
    assert_eq!(block_on(shared.session.ended()), Some(points));

    let top = block_on(shared.scores.lock()).get(0).unwrap();
    assert_eq!(top.name.as_str(), "Aaaaaaaaaaa");
    assert_eq!(top.value, points.min(MAX_SCORE));
    assert_eq!(queues.publish.try_receive(), Ok(points.min(MAX_SCORE)));

    assert_eq!(screen.visible_line(0).trim_end(), "Game over. You");
    assert_eq!(
        screen.visible_line(1).trim_end(),
        format!("scored {points}!")
    );
}

#[test]
fn ticks_outside_a_run_are_ignored() {
    let shared = shared();
    let queues = Queues::<M>::new();
    let mut screen = TextBuffer::new();

    // Left over from a previous run: no start marker.
    for _ in 0..3 {
        queues
            .ticks
            .try_send(GameTick {
                lane: Lane::Bottom,
                start: None,
            })
            .unwrap();
    }

    block_on(async {
        let stopper = async {
            while !queues.ticks.is_empty() {
                embassy_futures::yield_now().await;
            }
            shared.stop.stop();
        };
        // The stopper looks between the producer and the writer, so it never
        // sees an empty queue while the producer still has commands.
        join3(
            game_update(
                queues.ticks.receiver(),
                &shared.session,
                QueueSink::new(queues.display.sender()),
                queues.results.sender(),
                &shared.stop,
            ),
            stopper,
            display_writer(queues.display.receiver(), &mut screen, &shared.stop),
        )
        .await;
    });

    assert!(queues.results.is_empty());
    assert_eq!(screen.visible_line(0).trim_end(), "");
}

#[test]
fn a_start_tick_resets_and_steps_the_world() {
    let shared = shared();
    let queues = Queues::<M>::new();
    let mut screen = TextBuffer::new();

    block_on(shared.session.start());
    queues
        .ticks
        .try_send(GameTick {
            lane: Lane::Top,
            start: Some(NewGame {
                player: car_runner::score::Name::new("zed").unwrap(),
                seed: 7,
            }),
        })
        .unwrap();

    block_on(async {
        let stopper = async {
            while !queues.ticks.is_empty() || !queues.display.is_empty() {
                embassy_futures::yield_now().await;
            }
            shared.stop.stop();
        };
        // The stopper looks between the producer and the writer, so it never
        // sees an empty queue while the producer still has commands.
        join3(
            game_update(
                queues.ticks.receiver(),
                &shared.session,
                QueueSink::new(queues.display.sender()),
                queues.results.sender(),
                &shared.stop,
            ),
            stopper,
            display_writer(queues.display.receiver(), &mut screen, &shared.stop),
        )
        .await;
    });

    // The viewport moved one column after the first step.
    assert_eq!(screen.offset(), 1);
    assert!(block_on(shared.session.is_running()));
    assert!(queues.results.is_empty());
}
