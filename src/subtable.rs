use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use shakmaty::{Chess, Color, EnPassantMode, Position, Setup};

use crate::{
    errors::{SolveError, SolveResult},
    index::{self, BoardIndexer},
    material::Material,
    normalize::{flip_colors, Normalizer},
    solve::SolvedTable,
    types::{SubEntry, TableEntry},
};

/// Entry value persisted for indices no reachable position maps to.
const MISSING: u16 = u16::MAX;

/// File name of the persisted table for a signature.
pub fn file_name(material: &Material) -> String {
    format!("{material}.sub")
}

/// A frozen, immutable table of solved outcomes, queried by dependent
/// tables and probes. Positions and best moves are not retained.
pub struct SubTable {
    material: Material,
    indexer: Box<dyn BoardIndexer>,
    normalizer: Normalizer,
    white: Vec<Option<SubEntry>>,
    black: Option<Vec<Option<SubEntry>>>,
}

impl SubTable {
    pub(crate) fn from_solved(solved: &SolvedTable) -> SolveResult<SubTable> {
        fn freeze(entries: &[Option<TableEntry>]) -> Vec<Option<SubEntry>> {
            entries
                .iter()
                .map(|slot| slot.as_ref().map(TableEntry::as_sub_entry))
                .collect()
        }
        Ok(SubTable {
            material: solved.material.clone(),
            indexer: index::for_material(&solved.material)?,
            normalizer: Normalizer::for_material(&solved.material),
            white: freeze(&solved.white),
            black: solved.black.as_deref().map(freeze),
        })
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn is_symmetric(&self) -> bool {
        self.black.is_none()
    }

    pub fn max_index(&self) -> u32 {
        self.indexer.max_index()
    }

    pub(crate) fn entry_setup(&self, setup: Setup) -> SolveResult<SubEntry> {
        let mut setup = if setup.turn == Color::Black && self.black.is_none() {
            flip_colors(&setup)
        } else {
            setup
        };
        let side = setup.turn;
        self.normalizer.normalize(&mut setup);
        let index = self.indexer.index(&setup)? as usize;
        let table = if side == Color::White {
            &self.white
        } else {
            self.black.as_ref().unwrap_or(&self.white)
        };
        table
            .get(index)
            .copied()
            .flatten()
            .ok_or(SolveError::MissingEntry {
                material: self.material.clone(),
                index: index as u32,
            })
    }

    pub(crate) fn entry(&self, pos: &Chess) -> SolveResult<SubEntry> {
        self.entry_setup(pos.clone().into_setup(EnPassantMode::Legal))
    }

    /// Outcome and distance for a position of this signature, from the
    /// side to move's point of view. `None` outside the table's domain.
    pub fn probe(&self, pos: &Chess) -> Option<SubEntry> {
        if Material::from_board(pos.board()) != self.material {
            return None;
        }
        self.entry(pos).ok()
    }

    /// Persists the table as fixed-width big-endian entries, the white
    /// block followed by the black block (one block when symmetric).
    pub fn write_to(&self, dir: &Path) -> SolveResult<PathBuf> {
        let path = dir.join(file_name(&self.material));
        let mut writer = BufWriter::new(File::create(&path)?);
        for entry in self.white.iter().chain(self.black.iter().flatten()) {
            writer.write_u16::<BigEndian>(match entry {
                Some(entry) => entry.pack(),
                None => MISSING,
            })?;
        }
        writer.flush()?;
        Ok(path)
    }

    /// Loads a table persisted by [`SubTable::write_to`].
    pub fn read_from(path: &Path, material: Material) -> SolveResult<SubTable> {
        let indexer = index::for_material(&material)?;
        let normalizer = Normalizer::for_material(&material);
        let len = indexer.max_index() as usize;

        let file = File::open(path).map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                SolveError::MissingArtifact {
                    material: material.clone(),
                    path: path.to_owned(),
                }
            } else {
                SolveError::Read { error }
            }
        })?;
        let mut reader = BufReader::new(file);
        let white = read_block(&mut reader, len)?;
        let black = if material.is_symmetric() {
            None
        } else {
            Some(read_block(&mut reader, len)?)
        };
        Ok(SubTable {
            material,
            indexer,
            normalizer,
            white,
            black,
        })
    }
}

fn read_block<R: Read>(reader: &mut R, len: usize) -> SolveResult<Vec<Option<SubEntry>>> {
    (0..len)
        .map(|_| {
            let bits = reader.read_u16::<BigEndian>()?;
            Ok(if bits == MISSING {
                None
            } else {
                Some(SubEntry::unpack(bits))
            })
        })
        .collect()
}

/// A registry value: either a table in its stored orientation or the same
/// table viewed with colours exchanged. The view flips the position before
/// the lookup; the stored outcome already belongs to the side to move, so
/// it is returned as is.
#[derive(Clone)]
pub enum SubTableHandle {
    Canonical(Arc<SubTable>),
    Swapped(Arc<SubTable>),
}

impl SubTableHandle {
    pub fn material(&self) -> Material {
        match self {
            SubTableHandle::Canonical(table) => table.material().clone(),
            SubTableHandle::Swapped(table) => table.material().clone().into_swapped(),
        }
    }

    pub(crate) fn entry(&self, pos: &Chess) -> SolveResult<SubEntry> {
        let setup = pos.clone().into_setup(EnPassantMode::Legal);
        match self {
            SubTableHandle::Canonical(table) => table.entry_setup(setup),
            SubTableHandle::Swapped(table) => table.entry_setup(flip_colors(&setup)),
        }
    }

    /// Outcome and distance for a position matching this handle's
    /// orientation, `None` outside the domain.
    pub fn probe(&self, pos: &Chess) -> Option<SubEntry> {
        if Material::from_board(pos.board()) != self.material() {
            return None;
        }
        self.entry(pos).ok()
    }
}
