//! Build-time configuration: display geometry, game rules, periods and the
//! network endpoints.
//!
//! Network credentials are taken from the environment at compile time
//! (`CAR_RUNNER_SSID`, `CAR_RUNNER_PASSWORD`, `CAR_RUNNER_BROKER`,
//! `CAR_RUNNER_TOKEN`) and fall back to the defaults below.

use embassy_time::Duration;

// ── Character display geometry ──────────────────────────────────────────────

/// Text rows on the character display.
pub const ROWS: u8 = 2;
/// Addressable columns per row (the display RAM the viewport scrolls over).
pub const DDRAM_WIDTH: u8 = 40;
/// Columns visible through the viewport at once.
pub const VISIBLE_WIDTH: u8 = 16;

// ── Leaderboard ─────────────────────────────────────────────────────────────

/// Number of leaderboard slots.
pub const LEADERBOARD_SIZE: usize = 3;
/// Longest player name, in ASCII characters.
pub const NAME_LEN: usize = 11;
/// Scores are clamped to this value when recorded.
pub const MAX_SCORE: u32 = 999;

// ── Game rules ──────────────────────────────────────────────────────────────

pub const MAX_FUEL: u8 = 8;
/// Fuel added by one pickup (capped at [`MAX_FUEL`]).
pub const FUEL_REFILL: u8 = 3;
/// Tilt magnitude needed to switch lanes.
pub const TILT_THRESHOLD: i16 = 60;
/// Car back column at the start of a run (0-based DDRAM column).
pub const CAR_START_COLUMN: u8 = 2;
/// Columns left clear of obstacles ahead of the car on a fresh track.
pub const INITIAL_CLEAR_COLUMNS: u8 = CAR_START_COLUMN + 5;
/// Obstacles are placed every 3..=5 columns.
pub const MIN_OBSTACLE_GAP: u8 = 3;
pub const MAX_OBSTACLE_GAP: u8 = 5;

// ── Queues ──────────────────────────────────────────────────────────────────

/// Depth of the tick, score and publish queues.
pub const QUEUE_DEPTH: usize = 8;
/// Depth of the display command queue.
pub const DISPLAY_QUEUE_DEPTH: usize = 32;

// ── Periods ─────────────────────────────────────────────────────────────────

/// Every period the game uses. None of these are protocol invariants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Physics and render period.
    pub game_tick: Duration,
    /// One point per period while the session runs.
    pub points: Duration,
    /// One unit of fuel burnt per period.
    pub fuel: Duration,
    /// Highlight blink half-period.
    pub blink: Duration,
    /// How long each leaderboard entry stays on the idle screen.
    pub rotation: Duration,
    /// How long B1+B2 must be held to enter or leave configuration.
    pub hold: Duration,
    /// Button debounce window.
    pub debounce: Duration,
    /// UI input polling period.
    pub poll: Duration,
    /// Date snapshot refresh period.
    pub date_refresh: Duration,
    /// Tilt sensor sampling period.
    pub tilt_sample: Duration,
}

impl Timing {
    pub const DEFAULT: Self = Self {
        game_tick: Duration::from_millis(300),
        points: Duration::from_millis(1000),
        fuel: Duration::from_millis(2000),
        blink: Duration::from_millis(300),
        rotation: Duration::from_millis(3000),
        hold: Duration::from_millis(2000),
        debounce: Duration::from_millis(20),
        poll: Duration::from_millis(10),
        date_refresh: Duration::from_millis(200),
        tilt_sample: Duration::from_millis(50),
    };
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Network ─────────────────────────────────────────────────────────────────

/// How long a single modem command may take before it counts as timed out.
pub const MODEM_TIMEOUT: Duration = Duration::from_millis(2000);
/// Timeout for slow modem operations (joining an AP, opening a socket).
pub const MODEM_LONG_TIMEOUT: Duration = Duration::from_millis(10_000);

macro_rules! env_or {
    ($name:literal, $default:expr) => {
        match option_env!($name) {
            Some(value) => value,
            None => $default,
        }
    };
}

/// Access point the modem joins at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: &'static str,
    pub password: &'static str,
}

/// MQTT broker receiving finished scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Broker {
    pub host: &'static str,
    pub port: u16,
    /// Transport keep-alive in seconds. The MQTT session asks for twice this.
    pub keep_alive_secs: u16,
    /// Device token, used as both client id and username.
    pub token: &'static str,
    pub topic: &'static str,
    /// Group number embedded in every published payload.
    pub group: u16,
}

/// Time server queried once at boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeServer {
    pub host: &'static str,
    pub port: u16,
    /// Added to UTC to get local time.
    pub utc_offset_secs: i32,
}

impl TimeServer {
    pub const DEFAULT: Self = Self {
        host: "pool.ntp.org",
        port: 123,
        utc_offset_secs: 3600,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetConfig {
    pub wifi: WifiCredentials,
    pub broker: Broker,
    pub time: TimeServer,
}

impl NetConfig {
    pub const fn from_env() -> Self {
        Self {
            wifi: WifiCredentials {
                ssid: env_or!("CAR_RUNNER_SSID", "car-runner"),
                password: env_or!("CAR_RUNNER_PASSWORD", ""),
            },
            broker: Broker {
                host: env_or!("CAR_RUNNER_BROKER", "iot-se2021.ddns.net"),
                port: 1883,
                keep_alive_secs: 60,
                token: env_or!("CAR_RUNNER_TOKEN", "SE2-BEST-RECORDS"),
                topic: "v1/devices/me/telemetry",
                group: 9,
            },
            time: TimeServer::DEFAULT,
        }
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
