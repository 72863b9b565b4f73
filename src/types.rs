use std::ops::Neg;

use shakmaty::{Chess, Move};

/// Distance-to-zero values at or above this bound are treated as draws under
/// the fifty-move rule.
pub const MAX_DTZ: u8 = 100;

/// Game-theoretic value of a position from the side to move's point of view.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Outcome {
    Draw = 0,
    Win = 1,
    Loss = 2,
    /// Not yet resolved by the solver.
    Unknown = 3,
}

impl Outcome {
    fn from_u8(value: u8) -> Outcome {
        match value & 3 {
            0 => Outcome::Draw,
            1 => Outcome::Win,
            2 => Outcome::Loss,
            _ => Outcome::Unknown,
        }
    }
}

impl Neg for Outcome {
    type Output = Outcome;

    fn neg(self) -> Outcome {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
            Outcome::Unknown => Outcome::Unknown,
        }
    }
}

/// Immutable projection of a solved entry, as seen by a dependent table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SubEntry {
    pub outcome: Outcome,
    pub dtz: u8,
}

impl SubEntry {
    pub fn new(outcome: Outcome, dtz: u8) -> SubEntry {
        SubEntry { outcome, dtz }
    }

    /// Value of this position to the opponent who is about to move into it.
    ///
    /// A zeroing move resets the distance, any other move extends it by one
    /// ply. Crossing the fifty-move bound collapses the result to a draw.
    pub fn before_move(self, m: &Move) -> SubEntry {
        if self.outcome == Outcome::Unknown {
            return self;
        }
        let dtz = if m.is_zeroing() { 0 } else { self.dtz + 1 };
        if dtz >= MAX_DTZ {
            SubEntry::new(Outcome::Draw, 0)
        } else {
            let outcome = -self.outcome;
            SubEntry::new(outcome, if outcome == Outcome::Draw { 0 } else { dtz })
        }
    }

    /// Packs outcome and distance into 9 bits.
    pub fn pack(self) -> u16 {
        (u16::from(self.outcome as u8) << 7) | u16::from(self.dtz)
    }

    pub fn unpack(bits: u16) -> SubEntry {
        SubEntry {
            outcome: Outcome::from_u8((bits >> 7) as u8),
            dtz: (bits & 0x7f) as u8,
        }
    }
}

/// Mutable record used while a table is being solved.
///
/// Starts `Unknown` and resolves at most once, except that `Unknown` entries
/// surviving the fixed point are closed off as draws.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub index: u32,
    pub position: Chess,
    pub outcome: Outcome,
    pub dtz: u8,
    pub best: Option<Move>,
}

impl TableEntry {
    pub fn new(index: u32, position: Chess) -> TableEntry {
        TableEntry {
            index,
            position,
            outcome: Outcome::Unknown,
            dtz: 0,
            best: None,
        }
    }

    pub fn resolve(&mut self, outcome: Outcome, dtz: u8, best: Option<Move>) {
        self.outcome = outcome;
        self.dtz = dtz;
        self.best = best;
    }

    pub fn as_sub_entry(&self) -> SubEntry {
        SubEntry::new(self.outcome, self.dtz)
    }
}
