//! Character display output.
//!
//! The game draws on a 2×16 viewport over a 2×40 display RAM, HD44780 style:
//! scrolling shifts the viewport, not the content. Every producer submits
//! [`LcdCommand`]s to a [`DisplaySink`]; in the multi-task build they all feed
//! one queue drained by a single [`display_writer`], so commands run in
//! submission order.

use embassy_futures::select::{
    Either,
    select,
};
use embassy_sync::{
    blocking_mutex::raw::RawMutex,
    channel::{
        Receiver,
        Sender,
    },
};
use heapless::String;

use crate::{
    config::{
        DDRAM_WIDTH,
        ROWS,
        VISIBLE_WIDTH,
    },
    session::StopFlag,
};

/// Custom character bitmap: eight rows of five pixels (low bits).
pub type Glyph = [u8; 8];

pub const GLYPH_SLOTS: u8 = 8;
/// Longest string a single command carries.
pub const TEXT_MAX: usize = DDRAM_WIDTH as usize;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdCommand {
    Clear,
    Home,
    /// Move the cursor. Rows and columns are 0-based DDRAM coordinates.
    Locate { row: u8, col: u8 },
    WriteChar(u8),
    WriteStr(String<TEXT_MAX>),
    CreateGlyph { slot: u8, bitmap: Glyph },
    ShiftLeft,
    ShiftRight,
    /// Locate and write one character as a single command, so producers
    /// sharing a queue never interleave between the two.
    Put { row: u8, col: u8, ch: u8 },
    /// Locate and write a string as a single command.
    Text { row: u8, col: u8, text: String<TEXT_MAX> },
}

/// Copy as much of `s` as fits in a command.
pub fn text(s: &str) -> String<TEXT_MAX> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Destination for display commands.
#[allow(async_fn_in_trait)]
pub trait DisplaySink {
    async fn submit(&mut self, cmd: LcdCommand);

    async fn clear(&mut self) {
        self.submit(LcdCommand::Clear).await;
    }

    async fn put(&mut self, row: u8, col: u8, ch: u8) {
        self.submit(LcdCommand::Put { row, col, ch }).await;
    }

    async fn text_at(&mut self, row: u8, col: u8, s: &str) {
        self.submit(LcdCommand::Text {
            row,
            col,
            text: text(s),
        })
        .await;
    }

    /// Write a whole visible line, padding with spaces.
    async fn line(&mut self, row: u8, s: &str) {
        let mut padded: String<TEXT_MAX> = text(s);
        while padded.len() < usize::from(VISIBLE_WIDTH) {
            if padded.push(' ').is_err() {
                break;
            }
        }
        self.submit(LcdCommand::Text {
            row,
            col: 0,
            text: padded,
        })
        .await;
    }
}

impl<T: DisplaySink> DisplaySink for &mut T {
    async fn submit(&mut self, cmd: LcdCommand) {
        (**self).submit(cmd).await;
    }
}

/// Producer end of the display queue. Blocks when the queue is full.
pub struct QueueSink<'a, M: RawMutex, const N: usize> {
    tx: Sender<'a, M, LcdCommand, N>,
}

impl<'a, M: RawMutex, const N: usize> QueueSink<'a, M, N> {
    pub const fn new(tx: Sender<'a, M, LcdCommand, N>) -> Self {
        Self { tx }
    }
}

impl<M: RawMutex, const N: usize> Clone for QueueSink<'_, M, N> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<M: RawMutex, const N: usize> DisplaySink for QueueSink<'_, M, N> {
    async fn submit(&mut self, cmd: LcdCommand) {
        self.tx.send(cmd).await;
    }
}

/// Line driver for a character display.
pub trait CharLcd {
    type Error;

    fn clear(&mut self) -> Result<(), Self::Error>;
    /// Cursor to the origin and undo any shift.
    fn home(&mut self) -> Result<(), Self::Error>;
    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), Self::Error>;
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
    fn create_glyph(&mut self, slot: u8, bitmap: &Glyph) -> Result<(), Self::Error>;
    fn shift(&mut self, left: bool) -> Result<(), Self::Error>;
}

/// Run one command against a driver.
pub fn execute<L: CharLcd>(lcd: &mut L, cmd: &LcdCommand) -> Result<(), L::Error> {
    match cmd {
        LcdCommand::Clear => lcd.clear(),
        LcdCommand::Home => lcd.home(),
        LcdCommand::Locate { row, col } => lcd.set_cursor(*row, *col),
        LcdCommand::WriteChar(c) => lcd.write_byte(*c),
        LcdCommand::WriteStr(s) => s.bytes().try_for_each(|b| lcd.write_byte(b)),
        LcdCommand::CreateGlyph { slot, bitmap } => lcd.create_glyph(*slot, bitmap),
        LcdCommand::ShiftLeft => lcd.shift(true),
        LcdCommand::ShiftRight => lcd.shift(false),
        LcdCommand::Put { row, col, ch } => {
            lcd.set_cursor(*row, *col)?;
            lcd.write_byte(*ch)
        }
        LcdCommand::Text { row, col, text } => {
            lcd.set_cursor(*row, *col)?;
            text.bytes().try_for_each(|b| lcd.write_byte(b))
        }
    }
}

/// A sink that runs commands on the driver immediately. Used by the
/// single-flow build, where there is nothing to serialize.
pub struct Direct<L> {
    lcd: L,
}

impl<L: CharLcd> Direct<L> {
    pub const fn new(lcd: L) -> Self {
        Self { lcd }
    }

    pub fn lcd(&self) -> &L {
        &self.lcd
    }
}

impl<L: CharLcd> DisplaySink for Direct<L> {
    async fn submit(&mut self, cmd: LcdCommand) {
        if execute(&mut self.lcd, &cmd).is_err() {
            warn!("display command failed");
        }
    }
}

/// The only consumer of the display queue.
pub async fn display_writer<M: RawMutex, L: CharLcd, const N: usize>(
    rx: Receiver<'_, M, LcdCommand, N>,
    lcd: &mut L,
    stop: &StopFlag<M>,
) {
    info!("display writer started");
    loop {
        let cmd = match select(rx.receive(), stop.wait()).await {
            Either::First(cmd) => cmd,
            Either::Second(()) => break,
        };
        if execute(lcd, &cmd).is_err() {
            warn!("display command failed");
        }
    }
    info!("display writer stopped");
}

// ── Display RAM model ───────────────────────────────────────────────────────

const W: usize = DDRAM_WIDTH as usize;
const R: usize = ROWS as usize;

/// In-memory 2×40 character display with a scrolling 16-column viewport.
///
/// Serves as the display on hosts without a character LCD (the badge renders
/// it on its TFT) and as the observable display in tests.
#[derive(Clone, Debug)]
pub struct TextBuffer {
    cells: [[u8; W]; R],
    glyphs: [Glyph; GLYPH_SLOTS as usize],
    row: usize,
    col: usize,
    offset: usize,
    dirty: bool,
}

impl TextBuffer {
    pub const fn new() -> Self {
        Self {
            cells: [[b' '; W]; R],
            glyphs: [[0; 8]; GLYPH_SLOTS as usize],
            row: 0,
            col: 0,
            offset: 0,
            dirty: true,
        }
    }

    /// Character at a DDRAM position.
    pub fn cell(&self, row: u8, col: u8) -> u8 {
        self.cells[usize::from(row) % R][usize::from(col) % W]
    }

    /// Character shown at a viewport position.
    pub fn visible(&self, row: u8, col: u8) -> u8 {
        self.cells[usize::from(row) % R][(self.offset + usize::from(col)) % W]
    }

    /// Visible text of a row, with custom glyphs shown as `#`.
    pub fn visible_line(&self, row: u8) -> String<{ VISIBLE_WIDTH as usize }> {
        let mut out = String::new();
        for col in 0..VISIBLE_WIDTH {
            let b = self.visible(row, col);
            let c = if b < GLYPH_SLOTS { '#' } else { char::from(b) };
            let _ = out.push(c);
        }
        out
    }

    pub fn glyph(&self, slot: u8) -> &Glyph {
        &self.glyphs[usize::from(slot) % GLYPH_SLOTS as usize]
    }

    /// DDRAM column shown at the left edge of the viewport.
    pub const fn offset(&self) -> u8 {
        self.offset as u8
    }

    /// Whether anything changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.dirty, false)
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CharLcd for TextBuffer {
    type Error = core::convert::Infallible;

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.cells = [[b' '; W]; R];
        self.home()
    }

    fn home(&mut self) -> Result<(), Self::Error> {
        self.row = 0;
        self.col = 0;
        self.offset = 0;
        self.dirty = true;
        Ok(())
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), Self::Error> {
        self.row = usize::from(row) % R;
        self.col = usize::from(col) % W;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.cells[self.row][self.col] = byte;
        self.col = (self.col + 1) % W;
        self.dirty = true;
        Ok(())
    }

    fn create_glyph(&mut self, slot: u8, bitmap: &Glyph) -> Result<(), Self::Error> {
        self.glyphs[usize::from(slot) % GLYPH_SLOTS as usize] = *bitmap;
        self.dirty = true;
        Ok(())
    }

    fn shift(&mut self, left: bool) -> Result<(), Self::Error> {
        self.offset = if left {
            (self.offset + 1) % W
        } else {
            (self.offset + W - 1) % W
        };
        self.dirty = true;
        Ok(())
    }
}
