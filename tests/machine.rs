mod common;

use car_runner::{
    config::Timing,
    input::Buttons,
    lcd::{
        Direct,
        TextBuffer,
    },
    machine::{
        Cooperative,
        Machine,
        Mode,
        Shared,
    },
    manager::ScoreManager,
    rtc::{
        DateTime,
        Rtc,
        SoftRtc,
    },
    score::Name,
    store::RamBlock,
};
use common::{
    Clock,
    FakeDelay,
    FixedTilt,
    ScriptedKeypad,
};
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

type M = NoopRawMutex;
type TestShared = Shared<M, RamBlock, SoftRtc>;
type TestMachine<'a> = Machine<
    'a,
    M,
    RamBlock,
    SoftRtc,
    ScriptedKeypad,
    Direct<TextBuffer>,
    FakeDelay,
    Cooperative<FixedTilt>,
>;

fn shared() -> TestShared {
    Shared::new(ScoreManager::new(RamBlock::new()), SoftRtc::new(DateTime::EPOCH))
}

fn machine<'a>(shared: &'a TestShared, clock: &Clock) -> TestMachine<'a> {
    machine_with(shared, clock, Timing::DEFAULT)
}

fn machine_with<'a>(shared: &'a TestShared, clock: &Clock, timing: Timing) -> TestMachine<'a> {
    Machine::new(
        shared,
        ScriptedKeypad::new(clock),
        Direct::new(TextBuffer::new()),
        FakeDelay::new(clock),
        Cooperative::new(FixedTilt(0), timing),
        timing,
    )
}

fn row(m: &TestMachine<'_>, r: u8) -> String {
    m.display().lcd().visible_line(r).trim_end().to_owned()
}

/// Hold B1+B2 in Idle until configuration opens, then let go.
async fn enter_config(m: &mut TestMachine<'_>) {
    m.keypad_mut().press(100, 2500, Buttons::B1 | Buttons::B2);
    assert_eq!(m.step().await, Mode::Config);
}

#[test]
fn a_full_run_lands_on_the_leaderboard() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);
    m.set_player(Name::new("zed").unwrap());

    block_on(async {
        m.keypad_mut().press(100, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::Pregame);

        m.keypad_mut().press(300, 100, Buttons::B1);
        assert_eq!(m.step().await, Mode::Game);
        assert_eq!(row(&m, 0), "Press any button");
        assert_eq!(row(&m, 1), "to start.");

        assert_eq!(m.step().await, Mode::Postgame);
        let points = m.last_points();
        assert_eq!(shared.session.ended().await, Some(points));
        assert!(points > 0, "run ended before the first point");

        m.keypad_mut().press(300, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::Idle);
        assert_eq!(row(&m, 0), "Game over. You");
        assert_eq!(row(&m, 1), format!("scored {points}!"));

        let top = shared.scores.lock().await.get(0).unwrap();
        assert_eq!(top.name.as_str(), "Zed");
        assert_eq!(top.value, points);
    });
}

#[test]
fn running_out_of_fuel_ends_the_run() {
    let clock = Clock::default();
    let shared = shared();
    // A unit of fuel per tick empties the tank in eight ticks.
    let timing = Timing {
        fuel: Timing::DEFAULT.game_tick,
        ..Timing::DEFAULT
    };
    let mut m = machine_with(&shared, &clock, timing);

    block_on(async {
        // A stopped clock seeds the track with 0, whose top lane is clear
        // past the column the car reaches on its eighth tick.
        shared.rtc.lock().await.set_running(false);

        m.keypad_mut().press(100, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::Pregame);
        m.keypad_mut().press(300, 100, Buttons::B1);
        assert_eq!(m.step().await, Mode::Game);

        let started = clock.now_ms();
        assert_eq!(m.step().await, Mode::Postgame);
        assert_eq!(shared.session.fuel().await, 0);
        assert_eq!(clock.now_ms() - started, 8 * 300);
        assert_eq!(shared.session.ended().await, Some(m.last_points()));
    });
}

#[test]
fn idle_scores_view_shows_first_place() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);

    block_on(async {
        shared
            .scores
            .lock()
            .await
            .record_attempt(&Name::new("amy").unwrap(), 77)
            .unwrap();

        // B2 switches to the scores view, B3 leaves for the game.
        m.keypad_mut().press(100, 100, Buttons::B2);
        m.keypad_mut().press(400, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::Pregame);
    });
    // Idle rendered the scores view last; the rotation is still on rank 0.
    assert_eq!(row(&m, 0), "1st place:");
    assert_eq!(row(&m, 1), "77P Amy");
}

#[test]
fn short_hold_does_not_open_config() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);

    block_on(async {
        m.keypad_mut().press(100, 1000, Buttons::B1 | Buttons::B2);
        m.keypad_mut().press(1500, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::Pregame);
    });
}

#[test]
fn erase_scores_from_config() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);

    block_on(async {
        shared
            .scores
            .lock()
            .await
            .record_attempt(&Name::new("amy").unwrap(), 100)
            .unwrap();

        enter_config(&mut m).await;
        m.keypad_mut().press(700, 100, Buttons::B1);
        m.keypad_mut().press(1000, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::ConfigEraseScores);
        assert_eq!(row(&m, 1), "> Score Config");

        m.keypad_mut().press(300, 100, Buttons::B2);
        m.keypad_mut().press(600, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::ScoresErased);
        assert_eq!(row(&m, 0), "Erase scores?");
        assert_eq!(row(&m, 1), "> Yes   No");
        assert!(shared.scores.lock().await.get(0).unwrap().is_empty());

        m.keypad_mut().press(300, 100, Buttons::B1);
        assert_eq!(m.step().await, Mode::Config);
        assert_eq!(row(&m, 0), "Erased. Press");
        assert_eq!(row(&m, 1), "any button.");
    });
}

#[test]
fn declining_the_erase_keeps_scores() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);

    block_on(async {
        shared
            .scores
            .lock()
            .await
            .record_attempt(&Name::new("amy").unwrap(), 100)
            .unwrap();

        enter_config(&mut m).await;
        m.keypad_mut().press(700, 100, Buttons::B1);
        m.keypad_mut().press(1000, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::ConfigEraseScores);

        m.keypad_mut().press(300, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::Config);
        assert_eq!(shared.scores.lock().await.get(0).unwrap().value, 100);
    });
}

#[test]
fn rename_the_player() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);

    block_on(async {
        enter_config(&mut m).await;
        m.keypad_mut().press(700, 100, Buttons::B1);
        m.keypad_mut().press(1000, 100, Buttons::B1);
        m.keypad_mut().press(1300, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::ConfigName);
        assert_eq!(row(&m, 1), "> Name Config");

        // 'a' -> 'b' on the first letter, then confirm all eleven.
        m.keypad_mut().press(300, 100, Buttons::B1);
        for i in 0..11 {
            m.keypad_mut().press(600 + i * 300, 100, Buttons::B3);
        }
        assert_eq!(m.step().await, Mode::Config);
    });
    assert_eq!(m.player().as_str(), "Baaaaaaaaaa");
}

#[test]
fn combo_forming_in_config_does_not_move_the_cursor() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);

    block_on(async {
        enter_config(&mut m).await;
        // B1 first, B2 joins, both let go well before the hold completes.
        m.keypad_mut().press(700, 400, Buttons::B1);
        m.keypad_mut().press(800, 300, Buttons::B2);
        m.keypad_mut().press(1500, 100, Buttons::B3);
        assert_eq!(m.step().await, Mode::ConfigDate);
        assert_eq!(row(&m, 0), "> Time Config");
    });
}

#[test]
fn hold_again_leaves_config() {
    let clock = Clock::default();
    let shared = shared();
    let mut m = machine(&shared, &clock);

    block_on(async {
        enter_config(&mut m).await;
        m.keypad_mut().press(700, 2500, Buttons::B1 | Buttons::B2);
        assert_eq!(m.step().await, Mode::Idle);
    });
}
