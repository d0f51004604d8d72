//! ST7789 display driver, 320×170 LCD over SPI with DMA, and the character
//! screen the game draws on it.
//!
//! [`Screen`] keeps a [`TextBuffer`] as its display RAM and repaints only the
//! viewport cells that changed since the last command.

use embedded_graphics::{
    mono_font::{
        MonoTextStyle,
        ascii::FONT_10X20,
    },
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{
        PrimitiveStyle,
        Rectangle,
    },
    text::{
        Baseline,
        Text,
    },
};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::{
    Async,
    dma::{
        DmaRxBuf,
        DmaTxBuf,
    },
    dma_buffers,
    gpio::{
        Level,
        Output,
        OutputConfig,
    },
    spi::master::Spi,
    time::Rate,
};

use crate::{
    board::DisplayResources,
    config::{
        ROWS,
        VISIBLE_WIDTH,
    },
    lcd::{
        CharLcd,
        GLYPH_SLOTS,
        Glyph,
        TextBuffer,
    },
};

type SpiInterface<'a> = mipidsi::interface::SpiInterface<
    'a,
    ExclusiveDevice<esp_hal::spi::master::SpiDmaBus<'a, Async>, Output<'a>, esp_hal::delay::Delay>,
    Output<'a>,
>;

/// The badge's ST7789 display, ready to draw on with `embedded-graphics`.
pub type Display<'a> = mipidsi::Display<SpiInterface<'a>, mipidsi::models::ST7789, Output<'a>>;

impl<'a> From<DisplayResources<'a>> for Display<'a> {
    fn from(res: DisplayResources<'a>) -> Self {
        let (rx_buffer, rx_descriptors, tx_buffer, tx_descriptors) = dma_buffers!(32000);
        let dma_rx_buf = DmaRxBuf::new(rx_descriptors, rx_buffer).unwrap();
        let dma_tx_buf = DmaTxBuf::new(tx_descriptors, tx_buffer).unwrap();

        let mut delay = esp_hal::delay::Delay::new();

        let dc = Output::new(res.dc, Level::Low, OutputConfig::default());
        let mut rst = Output::new(res.rst, Level::Low, OutputConfig::default());
        rst.set_high();

        let spi = Spi::new(
            res.spi,
            esp_hal::spi::master::Config::default().with_frequency(Rate::from_mhz(80)),
        )
        .unwrap()
        .with_sck(res.sck)
        .with_mosi(res.mosi)
        .with_miso(res.miso)
        .with_dma(res.dma)
        .with_buffers(dma_rx_buf, dma_tx_buf)
        .into_async();

        let cs = Output::new(res.cs, Level::High, OutputConfig::default());
        let spi_device = ExclusiveDevice::new(spi, cs, delay).unwrap();

        let buffer = crate::mk_static!([u8; 32000], [0_u8; 32000]);
        let di = mipidsi::interface::SpiInterface::new(spi_device, dc, buffer);

        mipidsi::Builder::new(mipidsi::models::ST7789, di)
            .reset_pin(rst)
            .display_size(170, 320)
            .invert_colors(mipidsi::options::ColorInversion::Inverted)
            .orientation(
                mipidsi::options::Orientation::new().rotate(mipidsi::options::Rotation::Deg90),
            )
            .display_offset(35, 0)
            .init(&mut delay)
            .unwrap()
    }
}

// ── Character cell geometry ─────────────────────────────────────────────────

const CELL_W: i32 = 20;
const CELL_H: i32 = 40;
/// Rows are centred vertically on the 170 px panel.
const TOP: i32 = (170 - CELL_H * ROWS as i32) / 2;
/// One glyph pixel is drawn as a square this big.
const DOT: i32 = 4;
const GLYPH_TOP: i32 = (CELL_H - 8 * DOT) / 2;
const TEXT_LEFT: i32 = (CELL_W - 10) / 2;
const TEXT_TOP: i32 = (CELL_H - 20) / 2;

const FOREGROUND: Rgb565 = Rgb565::GREEN;
const BACKGROUND: Rgb565 = Rgb565::BLACK;

const R: usize = ROWS as usize;
const W: usize = VISIBLE_WIDTH as usize;

/// A 2×16 character LCD rendered on the TFT.
pub struct Screen<'a> {
    panel: Display<'a>,
    /// Lit while the screen lives.
    _backlight: Output<'a>,
    text: TextBuffer,
    /// What each viewport cell currently shows on the panel.
    shown: [[Option<u8>; W]; R],
}

impl<'a> Screen<'a> {
    pub fn new(mut panel: Display<'a>, mut backlight: Output<'a>) -> Self {
        if panel.clear(BACKGROUND).is_err() {
            error!("clearing the panel failed");
        }
        backlight.set_high();
        Self {
            panel,
            _backlight: backlight,
            text: TextBuffer::new(),
            shown: [[None; W]; R],
        }
    }

    pub const fn text(&self) -> &TextBuffer {
        &self.text
    }

    fn origin(row: u8, col: u8) -> Point {
        Point::new(i32::from(col) * CELL_W, TOP + i32::from(row) * CELL_H)
    }

    fn draw_cell(&mut self, row: u8, col: u8, ch: u8) -> Result<(), ()> {
        let origin = Self::origin(row, col);
        Rectangle::new(origin, Size::new(CELL_W as u32, CELL_H as u32))
            .into_styled(PrimitiveStyle::with_fill(BACKGROUND))
            .draw(&mut self.panel)
            .map_err(|_| ())?;

        if ch < GLYPH_SLOTS {
            let glyph = *self.text.glyph(ch);
            let ink = PrimitiveStyle::with_fill(FOREGROUND);
            for (y, bits) in (0i32..).zip(glyph) {
                for x in 0..5 {
                    if bits & (0x10 >> x) == 0 {
                        continue;
                    }
                    let at = origin + Point::new(x * DOT, GLYPH_TOP + y * DOT);
                    Rectangle::new(at, Size::new_equal(DOT as u32))
                        .into_styled(ink)
                        .draw(&mut self.panel)
                        .map_err(|_| ())?;
                }
            }
        } else if ch != b' ' {
            let mut utf8 = [0u8; 4];
            let s = char::from(ch).encode_utf8(&mut utf8);
            Text::with_baseline(
                s,
                origin + Point::new(TEXT_LEFT, TEXT_TOP),
                MonoTextStyle::new(&FONT_10X20, FOREGROUND),
                Baseline::Top,
            )
            .draw(&mut self.panel)
            .map_err(|_| ())?;
        }
        Ok(())
    }

    /// Repaint the viewport cells that differ from the panel.
    fn sync(&mut self) -> Result<(), ()> {
        if !self.text.take_dirty() {
            return Ok(());
        }
        for row in 0..ROWS {
            for col in 0..VISIBLE_WIDTH {
                let ch = self.text.visible(row, col);
                let cell = &mut self.shown[usize::from(row)][usize::from(col)];
                if *cell != Some(ch) {
                    *cell = Some(ch);
                    self.draw_cell(row, col, ch)?;
                }
            }
        }
        Ok(())
    }
}

impl CharLcd for Screen<'_> {
    type Error = ();

    fn clear(&mut self) -> Result<(), ()> {
        self.text.clear().unwrap_or_else(|e| match e {});
        self.sync()
    }

    fn home(&mut self) -> Result<(), ()> {
        self.text.home().unwrap_or_else(|e| match e {});
        self.sync()
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), ()> {
        self.text.set_cursor(row, col).unwrap_or_else(|e| match e {});
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), ()> {
        self.text.write_byte(byte).unwrap_or_else(|e| match e {});
        self.sync()
    }

    fn create_glyph(&mut self, slot: u8, bitmap: &Glyph) -> Result<(), ()> {
        self.text.create_glyph(slot, bitmap).unwrap_or_else(|e| match e {});
        // Cells showing the slot are stale now.
        for cell in self.shown.iter_mut().flatten() {
            if *cell == Some(slot) {
                *cell = None;
            }
        }
        self.sync()
    }

    fn shift(&mut self, left: bool) -> Result<(), ()> {
        self.text.shift(left).unwrap_or_else(|e| match e {});
        self.sync()
    }
}
