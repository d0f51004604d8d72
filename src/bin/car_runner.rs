//! Car Runner firmware for the Disobey 2026 badge.
//!
//! - A / B / Start are the game's three buttons, hold A+B for the settings
//! - Up/Down on the D-pad steer between the lanes
//! - The LED bars show the fuel left
//! - New records are published over the ESP-AT modem

#![no_std]
#![no_main]

use car_runner::{
    board::{
        self,
        Dpad,
        Keys,
        Leds,
        ScoreFlash,
        Screen,
        UartSerial,
    },
    config::{
        DISPLAY_QUEUE_DEPTH,
        NetConfig,
        QUEUE_DEPTH,
        Timing,
    },
    lcd::{
        QueueSink,
        display_writer,
    },
    machine::{
        Machine,
        Shared,
        Tasked,
    },
    manager::ScoreManager,
    mk_static,
    net::{
        self,
        Publisher,
        esp_at::AtModem,
    },
    rtc::{
        DateTime,
        SoftRtc,
    },
    split_resources,
    tasks::{
        self,
        Queues,
    },
};
use defmt::{
    info,
    warn,
};
use embassy_executor::Spawner;
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    mutex::Mutex,
};
use embassy_time::{
    Delay,
    Duration,
    Timer,
};
use esp_backtrace as _;
use esp_hal::timer::timg::TimerGroup;
use esp_println as _;

extern crate alloc;

esp_bootloader_esp_idf::esp_app_desc!();

type M = CriticalSectionRawMutex;
type Modem = Mutex<M, AtModem<UartSerial>>;
type Game = Shared<M, ScoreFlash, SoftRtc>;

const TIMING: Timing = Timing::DEFAULT;
const NET: NetConfig = NetConfig::from_env();
/// How often the LED bars follow the fuel level.
const LED_REFRESH: Duration = Duration::from_millis(200);

static QUEUES: Queues<M> = Queues::new();

#[embassy_executor::task]
async fn machine_task(shared: &'static Game, keys: Keys) {
    let display = QueueSink::<M, DISPLAY_QUEUE_DEPTH>::new(QUEUES.display.sender());
    let sched = Tasked::<M, QUEUE_DEPTH>::new(QUEUES.ticks.sender());
    let mut machine = Machine::new(shared, keys, display, Delay, sched, TIMING);
    machine.run().await;
}

#[embassy_executor::task]
async fn display_task(shared: &'static Game, screen: &'static mut Screen<'static>) {
    display_writer(QUEUES.display.receiver(), screen, &shared.stop).await;
}

#[embassy_executor::task]
async fn game_task(shared: &'static Game) {
    let display = QueueSink::<M, DISPLAY_QUEUE_DEPTH>::new(QUEUES.display.sender());
    tasks::game_update(
        QUEUES.ticks.receiver(),
        &shared.session,
        display,
        QUEUES.results.sender(),
        &shared.stop,
    )
    .await;
}

#[embassy_executor::task]
async fn score_task(shared: &'static Game) {
    tasks::score_keeper(
        QUEUES.results.receiver(),
        &shared.scores,
        QUEUES.publish.sender(),
        &shared.stop,
    )
    .await;
}

#[embassy_executor::task]
async fn points_task(shared: &'static Game) {
    tasks::points_ticker(&shared.session, Delay, TIMING.points, &shared.stop).await;
}

#[embassy_executor::task]
async fn fuel_task(shared: &'static Game) {
    tasks::fuel_ticker(&shared.session, Delay, TIMING.fuel, &shared.stop).await;
}

#[embassy_executor::task]
async fn rotation_task(shared: &'static Game) {
    tasks::rotation_ticker(&shared.indicators, Delay, TIMING.rotation, &shared.stop).await;
}

#[embassy_executor::task]
async fn blink_task(shared: &'static Game) {
    tasks::blink_ticker(&shared.indicators, Delay, TIMING.blink, &shared.stop).await;
}

#[embassy_executor::task]
async fn clock_task(shared: &'static Game) {
    tasks::clock_ticker(shared, Delay).await;
}

#[embassy_executor::task]
async fn date_task(shared: &'static Game) {
    tasks::date_publisher(shared, Delay, TIMING.date_refresh).await;
}

#[embassy_executor::task]
async fn tilt_task(shared: &'static Game, dpad: Dpad) {
    tasks::tilt_sampler(dpad, &shared.tilt, Delay, TIMING.tilt_sample, &shared.stop).await;
}

#[embassy_executor::task]
async fn fuel_bar_task(shared: &'static Game, leds: &'static mut Leds<'static>) {
    loop {
        if shared.session.is_running().await {
            leds.show_fuel(shared.session.fuel().await);
        } else {
            leds.clear();
        }
        leds.update().await;
        Timer::after(LED_REFRESH).await;
    }
}

#[embassy_executor::task]
async fn network_task(shared: &'static Game, modem: &'static Modem) {
    match net::bring_up(modem, &NET, &shared.rtc).await {
        Ok(_) => shared.publish_date().await,
        Err(e) => warn!("network bring-up failed, clock not set: {}", e),
    }
    Publisher::new(NET.broker)
        .run(QUEUES.publish.receiver(), modem, &shared.stop)
        .await;
}

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    let peripherals = board::init();
    let resources = split_resources!(peripherals);

    esp_alloc::heap_allocator!(size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let shared = mk_static!(
        Game,
        Shared::new(
            ScoreManager::new(resources.storage.into()),
            SoftRtc::new(DateTime::EPOCH),
        )
    );
    let screen = mk_static!(
        Screen<'static>,
        Screen::new(resources.display.into(), resources.backlight.into())
    );
    let leds = mk_static!(Leds<'static>, resources.leds.into());
    let modem = mk_static!(Modem, Mutex::new(AtModem::new(resources.modem.into())));

    let shared: &'static Game = shared;
    spawner.must_spawn(display_task(shared, screen));
    spawner.must_spawn(game_task(shared));
    spawner.must_spawn(score_task(shared));
    spawner.must_spawn(points_task(shared));
    spawner.must_spawn(fuel_task(shared));
    spawner.must_spawn(rotation_task(shared));
    spawner.must_spawn(blink_task(shared));
    spawner.must_spawn(clock_task(shared));
    spawner.must_spawn(date_task(shared));
    spawner.must_spawn(tilt_task(shared, resources.dpad.into()));
    spawner.must_spawn(fuel_bar_task(shared, leds));
    spawner.must_spawn(network_task(shared, modem));
    spawner.must_spawn(machine_task(shared, resources.buttons.into()));
    info!("car runner started");

    loop {
        Timer::after(Duration::from_secs(600)).await;
    }
}
