//! Player names, score entries and the top-N leaderboard.
//!
//! The leaderboard is a plain value: [`Leaderboard::admit`] decides whether a
//! score is record-worthy and applies it in memory. Loading and persisting it
//! is the job of [`crate::manager::ScoreManager`].

use core::fmt;

use heapless::String;
use serde::{
    Deserialize,
    Serialize,
};

pub use crate::config::{
    LEADERBOARD_SIZE,
    MAX_SCORE,
    NAME_LEN,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NameError {
    TooLong,
    /// Names are printed on a character LCD, so only printable ASCII is allowed.
    NotPrintable,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong => write!(f, "name longer than {NAME_LEN} characters"),
            Self::NotPrintable => f.write_str("name contains non-printable characters"),
        }
    }
}

/// A player name: at most [`NAME_LEN`] printable ASCII characters, trailing
/// spaces trimmed, first letter upper case and the rest lower case.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String<NAME_LEN>")]
pub struct Name(String<NAME_LEN>);

impl Name {
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Normalize `raw` into a name.
    pub fn new(raw: &str) -> Result<Self, NameError> {
        let trimmed = raw.trim_end_matches(' ');
        if trimmed.len() > NAME_LEN {
            return Err(NameError::TooLong);
        }
        let mut name = String::new();
        for (i, c) in trimmed.chars().enumerate() {
            if !(c.is_ascii_graphic() || c == ' ') {
                return Err(NameError::NotPrintable);
            }
            let c = if i == 0 {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            name.push(c).map_err(|_| NameError::TooLong)?;
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<&str> for Name {
    type Error = NameError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl TryFrom<String<NAME_LEN>> for Name {
    type Error = NameError;

    fn try_from(raw: String<NAME_LEN>) -> Result<Self, Self::Error> {
        Self::new(&raw)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Name {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

/// One leaderboard slot. A zero value marks the slot as empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScoreEntry {
    pub name: Name,
    pub value: u32,
}

impl ScoreEntry {
    pub const fn empty() -> Self {
        Self {
            name: Name::empty(),
            value: 0,
        }
    }

    pub fn new(name: Name, value: u32) -> Self {
        Self {
            name,
            value: value.min(MAX_SCORE),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.value == 0
    }
}

/// What [`Leaderboard::admit`] did with a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Not record-worthy. The board is untouched.
    Rejected,
    /// The player's existing entry was raised.
    UpdatedExisting,
    /// The score went into an empty slot.
    InsertedNew,
    /// The score displaced the lowest entry.
    ReplacedLowest,
}

impl Outcome {
    /// Whether the board changed, which is also what makes a score worth
    /// publishing.
    pub const fn is_record(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// The top [`LEADERBOARD_SIZE`] scores, sorted descending, empty slots last,
/// at most one entry per name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    entries: [ScoreEntry; LEADERBOARD_SIZE],
}

impl Leaderboard {
    pub const fn new() -> Self {
        Self {
            entries: [ScoreEntry::empty(), ScoreEntry::empty(), ScoreEntry::empty()],
        }
    }

    /// Build a board from raw entries, such as a record read back from
    /// storage. Each entry goes through [`Leaderboard::admit`], so values are
    /// capped, zero entries are dropped, a repeated name keeps its best score
    /// and the order is restored.
    pub fn from_entries(entries: [ScoreEntry; LEADERBOARD_SIZE]) -> Self {
        let mut board = Self::new();
        for entry in entries {
            board.admit(&entry.name, entry.value);
        }
        board
    }

    pub fn entries(&self) -> &[ScoreEntry; LEADERBOARD_SIZE] {
        &self.entries
    }

    pub fn get(&self, rank: usize) -> Option<&ScoreEntry> {
        self.entries.get(rank)
    }

    pub fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].value >= w[1].value)
    }

    /// Decide whether `value` earns `name` a place on the board and apply it.
    ///
    /// A player already on the board only moves up on a strictly better
    /// score. Otherwise the first empty slot is used, and on a full board the
    /// lowest entry is replaced if `value` strictly beats it.
    pub fn admit(&mut self, name: &Name, value: u32) -> Outcome {
        let value = value.min(MAX_SCORE);
        if value == 0 {
            return Outcome::Rejected;
        }

        let outcome = if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| !e.is_empty() && e.name == *name)
        {
            if value <= existing.value {
                return Outcome::Rejected;
            }
            existing.value = value;
            Outcome::UpdatedExisting
        } else if let Some(slot) = self.entries.iter_mut().find(|e| e.is_empty()) {
            *slot = ScoreEntry::new(name.clone(), value);
            Outcome::InsertedNew
        } else {
            let lowest = self.lowest_index();
            if value <= self.entries[lowest].value {
                return Outcome::Rejected;
            }
            self.entries[lowest] = ScoreEntry::new(name.clone(), value);
            Outcome::ReplacedLowest
        };

        self.sort();
        outcome
    }

    /// Index of the lowest entry, the first one on ties.
    fn lowest_index(&self) -> usize {
        let mut lowest = 0;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.value < self.entries[lowest].value {
                lowest = i;
            }
        }
        lowest
    }

    /// Stable descending bubble sort; entries only swap on a strict
    /// inequality so equal scores keep their order.
    fn sort(&mut self) {
        let n = self.entries.len();
        for pass in 0..n {
            for j in 0..n - 1 - pass {
                if self.entries[j].value < self.entries[j + 1].value {
                    self.entries.swap(j, j + 1);
                }
            }
        }
    }
}
