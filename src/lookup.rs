use shakmaty::{Chess, Color, EnPassantMode, Move, Position};

use crate::{
    errors::SolveResult,
    index::{self, BoardIndexer},
    material::Material,
    normalize::{flip_colors, flip_move_colors, Normalizer},
    solve::SolvedTable,
    types::{Outcome, TableEntry},
};

/// A probe result: the stored outcome and distance together with the best
/// move, translated back into the orientation of the queried position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    pub outcome: Outcome,
    pub dtz: u8,
    pub best: Option<Move>,
}

struct StoredEntry {
    outcome: Outcome,
    dtz: u8,
    best: Option<Move>,
}

/// A solved table that retains best moves, answering probes for positions
/// in any orientation. The heavy solving positions are dropped.
pub struct LookupTable {
    material: Material,
    indexer: Box<dyn BoardIndexer>,
    normalizer: Normalizer,
    white: Vec<Option<StoredEntry>>,
    black: Option<Vec<Option<StoredEntry>>>,
}

impl LookupTable {
    pub fn from_solved(solved: &SolvedTable) -> SolveResult<LookupTable> {
        fn strip(entries: &[Option<TableEntry>]) -> Vec<Option<StoredEntry>> {
            entries
                .iter()
                .map(|slot| {
                    slot.as_ref().map(|entry| StoredEntry {
                        outcome: entry.outcome,
                        dtz: entry.dtz,
                        best: entry.best.clone(),
                    })
                })
                .collect()
        }
        Ok(LookupTable {
            material: solved.material.clone(),
            indexer: index::for_material(&solved.material)?,
            normalizer: Normalizer::for_material(&solved.material),
            white: strip(&solved.white),
            black: solved.black.as_deref().map(strip),
        })
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Looks up `pos`, which may be in either orientation of the table's
    /// signature. The returned move is valid in `pos` itself: the
    /// canonical move is mapped back through the inverse of the
    /// normalization, then colour-flipped if the query crossed sides.
    pub fn probe(&self, pos: &Chess) -> Option<ProbeEntry> {
        let material = Material::from_board(pos.board());
        let mut setup = pos.clone().into_setup(EnPassantMode::Legal);
        let mut flipped = false;

        if material == self.material {
            // stored orientation
        } else if material == self.material.clone().into_swapped() {
            setup = flip_colors(&setup);
            flipped = true;
        } else {
            return None;
        }

        if setup.turn == Color::Black && self.black.is_none() {
            setup = flip_colors(&setup);
            flipped = !flipped;
        }

        let side = setup.turn;
        let inverse = self.normalizer.normalize(&mut setup);
        let index = self.indexer.index(&setup).ok()? as usize;
        let table = if side == Color::White {
            &self.white
        } else {
            self.black.as_ref()?
        };
        let entry = table.get(index)?.as_ref()?;

        let best = entry.best.as_ref().map(|m| {
            let m = inverse.map_move(m);
            if flipped {
                flip_move_colors(&m)
            } else {
                m
            }
        });
        Some(ProbeEntry {
            outcome: entry.outcome,
            dtz: entry.dtz,
            best,
        })
    }
}
