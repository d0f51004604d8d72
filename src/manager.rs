//! Score manager: admits finished games into the persistent leaderboard.

use core::fmt;

use crate::{
    score::{
        LEADERBOARD_SIZE,
        Leaderboard,
        Name,
        Outcome,
        ScoreEntry,
    },
    store::{
        BlockDevice,
        ScoreStore,
        StoreError,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScoreError<E> {
    /// Requested rank is not below [`LEADERBOARD_SIZE`].
    RankOutOfRange(usize),
    Store(StoreError<E>),
}

impl<E> From<StoreError<E>> for ScoreError<E> {
    fn from(e: StoreError<E>) -> Self {
        Self::Store(e)
    }
}

impl<E: fmt::Debug> fmt::Display for ScoreError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RankOutOfRange(rank) => write!(f, "rank {rank} out of range"),
            Self::Store(e) => e.fmt(f),
        }
    }
}

/// Sole owner of the leaderboard. Every read goes to the device and every
/// accepted change rewrites the whole record.
pub struct ScoreManager<B> {
    store: ScoreStore<B>,
}

impl<B: BlockDevice> ScoreManager<B> {
    pub const fn new(device: B) -> Self {
        Self {
            store: ScoreStore::new(device),
        }
    }

    pub fn leaderboard(&mut self) -> Result<Leaderboard, ScoreError<B::Error>> {
        Ok(self.store.load()?)
    }

    /// Offer a finished game to the leaderboard.
    ///
    /// Rejected attempts never touch the device.
    pub fn record_attempt(
        &mut self,
        name: &Name,
        value: u32,
    ) -> Result<Outcome, ScoreError<B::Error>> {
        let mut board = self.store.load()?;
        let outcome = board.admit(name, value);
        if outcome.is_record() {
            self.store.save(&board)?;
            info!("score {} for {} recorded: {}", value, name, outcome);
        } else {
            debug!("score {} for {} not record-worthy", value, name);
        }
        Ok(outcome)
    }

    /// Replace the leaderboard with empty slots.
    pub fn erase(&mut self) -> Result<(), ScoreError<B::Error>> {
        self.store.save(&Leaderboard::new())?;
        info!("leaderboard erased");
        Ok(())
    }

    /// Entry at `rank`; an empty placeholder if that slot was never filled.
    pub fn get(&mut self, rank: usize) -> Result<ScoreEntry, ScoreError<B::Error>> {
        if rank >= LEADERBOARD_SIZE {
            return Err(ScoreError::RankOutOfRange(rank));
        }
        let board = self.store.load()?;
        Ok(board.get(rank).cloned().unwrap_or_default())
    }

    pub fn device(&self) -> &B {
        self.store.device()
    }

    pub fn device_mut(&mut self) -> &mut B {
        self.store.device_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RamBlock;

    #[test]
    fn rejected_attempt_does_no_io() {
        let mut scores = ScoreManager::new(RamBlock::new());
        let bob = Name::new("bob").unwrap();
        assert_eq!(scores.record_attempt(&bob, 30).unwrap(), Outcome::InsertedNew);
        let writes = scores.device().write_count();
        assert_eq!(scores.record_attempt(&bob, 30).unwrap(), Outcome::Rejected);
        assert_eq!(scores.record_attempt(&bob, 10).unwrap(), Outcome::Rejected);
        assert_eq!(scores.device().write_count(), writes);
    }

    #[test]
    fn out_of_range_rank_is_an_error() {
        let mut scores = ScoreManager::new(RamBlock::new());
        assert_eq!(
            scores.get(LEADERBOARD_SIZE),
            Err(ScoreError::RankOutOfRange(LEADERBOARD_SIZE))
        );
    }
}
