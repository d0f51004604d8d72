//! Disobey 2026 badge (ESP32-S3) bring-up for the game.
//!
//! ```rust,ignore
//! let peripherals = car_runner::board::init();
//! let resources = car_runner::split_resources!(peripherals);
//!
//! let screen: car_runner::board::Screen = resources.display.into();
//! let keys: car_runner::board::Keys = resources.buttons.into();
//! ```

use esp_hal::{
    Blocking,
    assign_resources,
    clock::{
        Clock,
        CpuClock,
    },
    gpio::{
        Level,
        Output,
        OutputConfig,
    },
    rmt::{
        Rmt,
        Tx,
        TxChannelConfig,
        TxChannelCreator as _,
    },
    rom,
    time::Rate,
};
use esp_storage::FlashStorage;

use crate::store::NorBlock;
pub use crate::{
    buttons::{
        Dpad,
        Keys,
    },
    display::{
        Display,
        Screen,
    },
    leds::{
        BAR_COUNT,
        Leds,
    },
    modem::UartSerial,
};

/// StaticCell helper: allocates a value into a `static` exactly once.
#[macro_export]
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write($val);
        x
    }};
}

// ── Pin / peripheral assignments ────────────────────────────────────────────

assign_resources! {
    pub Resources<'d> {
        display: DisplayResources<'d> {
            dc: GPIO15,
            rst: GPIO7,
            sck: GPIO4,
            cs: GPIO6,
            miso: GPIO16,
            mosi: GPIO5,
            spi: SPI2,
            dma: DMA_CH0,
        },
        backlight: BacklightResources<'d> {
            led: GPIO19,
        },
        buttons: ButtonResources<'d> {
            a: GPIO13,
            b: GPIO38,
            start: GPIO12,
        },
        dpad: DpadResources<'d> {
            up: GPIO11,
            down: GPIO1,
        },
        leds: LedResources<'d> {
            power: GPIO17,
            io: GPIO18,
            rmt: RMT,
        },
        // ESP-AT Wi-Fi modem on the expansion header.
        modem: ModemResources<'d> {
            uart: UART1,
            tx: GPIO39,
            rx: GPIO40,
        },
        storage: StorageResources<'d> {
            flash: FLASH,
        }
    }
}

// ── Board initialisation ────────────────────────────────────────────────────

/// Minimal CPU clock switcher for ESP32-S3.
///
/// Steps through an intermediate frequency before reaching the target,
/// which is required by the hardware.
fn set_cpu_clock(cpu_clock_speed: CpuClock) {
    let _ = esp_hal::peripherals::SYSTEM::regs()
        .sysclk_conf()
        .modify(|_, w| unsafe { w.soc_clk_sel().bits(1) });
    let _ = esp_hal::peripherals::SYSTEM::regs()
        .cpu_per_conf()
        .modify(|_, w| unsafe {
            let _ = w.pll_freq_sel().set_bit();
            w.cpuperiod_sel().bits(match cpu_clock_speed {
                CpuClock::_80MHz => 0,
                CpuClock::_160MHz => 1,
                CpuClock::_240MHz => 2,
                _ => panic!("Unsupported CPU clock speed"),
            })
        });

    rom::ets_update_cpu_frequency_rom(cpu_clock_speed.frequency().as_mhz());
}

/// Initialise the badge and return the raw peripheral set.
#[must_use]
pub fn init() -> esp_hal::peripherals::Peripherals {
    set_cpu_clock(CpuClock::_160MHz);
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    esp_hal::init(config)
}

// ── Resource → peripheral conversions ───────────────────────────────────────

impl From<esp_hal::peripherals::Peripherals> for Resources<'_> {
    fn from(peripherals: esp_hal::peripherals::Peripherals) -> Self {
        split_resources!(peripherals)
    }
}

impl<'a> From<LedResources<'a>> for esp_hal::rmt::Channel<'a, Blocking, Tx> {
    fn from(res: LedResources<'a>) -> Self {
        let _ws_power = Output::new(res.power, Level::High, OutputConfig::default());
        let rmt = Rmt::new(res.rmt, Rate::from_mhz(40)).unwrap();
        let tx_config = TxChannelConfig::default().with_clk_divider(1);
        rmt.channel0.configure_tx(res.io, tx_config).unwrap()
    }
}

/// The backlight pin, dark until [`Screen::new`] has cleared the panel.
impl<'a> From<BacklightResources<'a>> for Output<'a> {
    fn from(res: BacklightResources<'a>) -> Self {
        Output::new(res.led, Level::Low, OutputConfig::default())
    }
}

/// The leaderboard lives in the last sector of the SPI flash.
pub type ScoreFlash = NorBlock<FlashStorage<'static>>;

impl From<StorageResources<'static>> for ScoreFlash {
    fn from(res: StorageResources<'static>) -> Self {
        NorBlock::last_sector(FlashStorage::new(res.flash)).unwrap()
    }
}

impl<'a> From<LedResources<'a>> for Leds<'a> {
    fn from(res: LedResources<'a>) -> Self {
        Leds::new(res.into())
    }
}
