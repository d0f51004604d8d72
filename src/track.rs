//! The scrolling track: a 2×40 ring of cells mirroring the display RAM.
//!
//! Only the half of the ring that is about to scroll into view is ever
//! regenerated, so the visible part never changes under the player.

use heapless::Vec;

use crate::{
    config::{
        DDRAM_WIDTH,
        MAX_OBSTACLE_GAP,
        MIN_OBSTACLE_GAP,
    },
    rng::Rng,
};

const W: usize = DDRAM_WIDTH as usize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cell {
    #[default]
    Empty,
    Obstacle,
    Fuel,
}

/// One of the two display rows the car can drive on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Lane {
    #[default]
    Top,
    Bottom,
}

impl Lane {
    pub const BOTH: [Self; 2] = [Self::Top, Self::Bottom];

    /// Lane for a 1-based row number; anything but 1 or 2 is `None`.
    pub const fn from_row(row: u8) -> Option<Self> {
        match row {
            1 => Some(Self::Top),
            2 => Some(Self::Bottom),
            _ => None,
        }
    }

    /// 1-based row number.
    pub const fn row(self) -> u8 {
        match self {
            Self::Top => 1,
            Self::Bottom => 2,
        }
    }

    /// 0-based display row.
    pub const fn index(self) -> u8 {
        self.row() - 1
    }
}

/// A half-open column range `from..to` of the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Band {
    pub from: u8,
    pub to: u8,
}

impl Band {
    pub const FIRST_HALF: Self = Self {
        from: 0,
        to: DDRAM_WIDTH / 2,
    };
    pub const SECOND_HALF: Self = Self {
        from: DDRAM_WIDTH / 2,
        to: DDRAM_WIDTH,
    };

    pub fn columns(self) -> core::ops::Range<u8> {
        self.from..self.to
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackMap {
    cells: [[Cell; W]; 2],
}

impl TrackMap {
    pub const fn new() -> Self {
        Self {
            cells: [[Cell::Empty; W]; 2],
        }
    }

    pub fn cell(&self, lane: Lane, col: u8) -> Cell {
        self.cells[usize::from(lane.index())][usize::from(col) % W]
    }

    pub fn set(&mut self, lane: Lane, col: u8, cell: Cell) {
        self.cells[usize::from(lane.index())][usize::from(col) % W] = cell;
    }

    pub fn column_is_free(&self, col: u8) -> bool {
        Lane::BOTH.iter().all(|&l| self.cell(l, col) == Cell::Empty)
    }

    pub fn clear(&mut self) {
        self.cells = [[Cell::Empty; W]; 2];
    }

    /// Wipe `band` and lay down fresh obstacles and one fuel pickup.
    pub fn regenerate(&mut self, band: Band, rng: &mut Rng) {
        self.place_obstacles(band, rng);
        if self.place_fuel(band, rng).is_none() {
            debug!("no free column for fuel in {}..{}", band.from, band.to);
        }
    }

    /// Erase the band, then place one obstacle every 3..=5 columns in a
    /// random lane, starting 3..=5 columns into the band.
    fn place_obstacles(&mut self, band: Band, rng: &mut Rng) {
        for col in band.columns() {
            for lane in Lane::BOTH {
                self.set(lane, col, Cell::Empty);
            }
        }
        let mut col = band.from + rng.between(MIN_OBSTACLE_GAP, MAX_OBSTACLE_GAP);
        while col < band.to {
            let lane = if rng.coin() { Lane::Bottom } else { Lane::Top };
            self.set(lane, col, Cell::Obstacle);
            col += rng.between(MIN_OBSTACLE_GAP, MAX_OBSTACLE_GAP);
        }
    }

    /// Put one pickup in a random column of `band` that is free in both
    /// lanes. Returns where it went, or `None` if no column was free.
    fn place_fuel(&mut self, band: Band, rng: &mut Rng) -> Option<(Lane, u8)> {
        let free: Vec<u8, W> = band.columns().filter(|&c| self.column_is_free(c)).collect();
        if free.is_empty() {
            return None;
        }
        let col = free[rng.below(free.len() as u32) as usize];
        let lane = if rng.coin() { Lane::Bottom } else { Lane::Top };
        self.set(lane, col, Cell::Fuel);
        Some((lane, col))
    }
}

impl Default for TrackMap {
    fn default() -> Self {
        Self::new()
    }
}
