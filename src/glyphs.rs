//! Custom character slots and their bitmaps.

use crate::lcd::{
    Glyph,
    LcdCommand,
};

pub const CAR_BACK: u8 = 0;
pub const CAR_FRONT: u8 = 1;
pub const BARRIER: u8 = 2;
pub const FUEL: u8 = 3;
/// Fuel gauge cells, a quarter to full. `FUEL_GAUGE[n - 1]` is n quarters.
pub const FUEL_GAUGE: [u8; 4] = [4, 5, 6, 7];
/// Drawn over the car when it crashes.
pub const WRECK: u8 = b'*';

const CAR_BACK_MAP: Glyph = [0x00, 0x00, 0x0F, 0x1F, 0x1F, 0x0A, 0x00, 0x00];
const CAR_FRONT_MAP: Glyph = [0x00, 0x00, 0x18, 0x1C, 0x1F, 0x0A, 0x00, 0x00];
const BARRIER_MAP: Glyph = [0x1F, 0x15, 0x1F, 0x15, 0x1F, 0x11, 0x11, 0x00];
const FUEL_MAP: Glyph = [0x0C, 0x1E, 0x13, 0x13, 0x1F, 0x1F, 0x1F, 0x00];
const QUARTER_MAP: Glyph = [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F, 0x1F];
const HALF_MAP: Glyph = [0x1F, 0x11, 0x11, 0x11, 0x1F, 0x1F, 0x1F, 0x1F];
const THREE_QUARTER_MAP: Glyph = [0x1F, 0x11, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F];
const FULL_MAP: Glyph = [0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F];

/// Every custom glyph the game uses, by slot.
pub const ALL: [(u8, Glyph); 8] = [
    (CAR_BACK, CAR_BACK_MAP),
    (CAR_FRONT, CAR_FRONT_MAP),
    (BARRIER, BARRIER_MAP),
    (FUEL, FUEL_MAP),
    (FUEL_GAUGE[0], QUARTER_MAP),
    (FUEL_GAUGE[1], HALF_MAP),
    (FUEL_GAUGE[2], THREE_QUARTER_MAP),
    (FUEL_GAUGE[3], FULL_MAP),
];

/// Commands that upload every glyph.
pub fn upload() -> impl Iterator<Item = LcdCommand> {
    ALL.into_iter()
        .map(|(slot, bitmap)| LcdCommand::CreateGlyph { slot, bitmap })
}

/// Character for a gauge cell holding `quarters` (0..=4) of fuel.
pub const fn gauge_cell(quarters: u8) -> u8 {
    match quarters {
        0 => b' ',
        1..=4 => FUEL_GAUGE[quarters as usize - 1],
        _ => FUEL_GAUGE[3],
    }
}
