use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rustc_hash::FxHashMap;
use shakmaty::{Chess, Color, Position};
use tracing::info;

use crate::{
    dependencies,
    errors::{SolveError, SolveResult},
    material::Material,
    solve::{self, SolvedTable},
    subtable::{self, SubTable, SubTableHandle},
    types::{Outcome, SubEntry},
};

/// A registry of solved tables. Tables are always completed in dependency
/// order: everything reachable by capture or promotion is solved or loaded
/// before the table that needs it.
pub struct Tablebase {
    tables: FxHashMap<Material, SubTableHandle>,
    directory: Option<PathBuf>,
}

impl Default for Tablebase {
    fn default() -> Tablebase {
        Tablebase::new()
    }
}

impl Tablebase {
    pub fn new() -> Tablebase {
        Tablebase {
            tables: FxHashMap::default(),
            directory: None,
        }
    }

    /// A tablebase that persists solved tables into `path` and prefers
    /// loading artifacts from there over solving again.
    pub fn with_directory(path: impl Into<PathBuf>) -> Tablebase {
        Tablebase {
            tables: FxHashMap::default(),
            directory: Some(path.into()),
        }
    }

    /// Loads every `.sub` artifact found in `path`. Files whose names are
    /// not material signatures are skipped. Returns the number of tables
    /// added.
    pub fn add_directory(&mut self, path: &Path) -> SolveResult<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(path)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("sub") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let Ok(material) = Material::from_str(stem) else {
                continue;
            };
            let table = SubTable::read_from(&path, material)?;
            self.register(Arc::new(table));
            count += 1;
        }
        Ok(count)
    }

    pub fn handle(&self, material: &Material) -> Option<&SubTableHandle> {
        self.tables.get(material)
    }

    fn register(&mut self, table: Arc<SubTable>) {
        let material = table.material().clone();
        let symmetric = material.is_symmetric();
        self.tables
            .insert(material.clone(), SubTableHandle::Canonical(Arc::clone(&table)));
        if !symmetric {
            self.tables
                .insert(material.into_swapped(), SubTableHandle::Swapped(table));
        }
    }

    /// The orientation actually stored for a colourless key: white gets
    /// the pawns when only one side has them, so pawn indexing and en
    /// passant synthesis see white pawns moving up the board.
    fn orientation(key: &Material) -> Material {
        if key.side_has_pawns(Color::Black) && !key.side_has_pawns(Color::White) {
            key.clone().into_swapped()
        } else {
            key.clone()
        }
    }

    /// Makes the table for `material` available, in either orientation:
    /// loaded from the artifact directory when present, solved otherwise,
    /// with all prerequisites handled first.
    pub fn ensure(&mut self, material: &Material) -> SolveResult<SubTableHandle> {
        if material.non_king_count() > 3 {
            return Err(SolveError::UnsupportedMaterial {
                material: material.clone(),
            });
        }
        if let Some(handle) = self.tables.get(material) {
            return Ok(handle.clone());
        }

        let stored = Tablebase::orientation(&material.normalized());
        for dep in dependencies::dependencies(&stored) {
            self.ensure(&dep)?;
        }

        let loaded = self.try_load(&stored)?;
        if !loaded {
            let solved = solve::solve(&stored, &self.tables)?;
            let table = SubTable::from_solved(&solved)?;
            if let Some(dir) = &self.directory {
                table.write_to(dir)?;
            }
            self.register(Arc::new(table));
        }
        self.tables
            .get(material)
            .cloned()
            .ok_or_else(|| SolveError::MissingSubTable {
                material: material.clone(),
            })
    }

    fn try_load(&mut self, stored: &Material) -> SolveResult<bool> {
        let Some(dir) = &self.directory else {
            return Ok(false);
        };
        let path = dir.join(subtable::file_name(stored));
        if !path.exists() {
            return Ok(false);
        }
        info!(material = %stored, path = %path.display(), "loading table");
        let table = SubTable::read_from(&path, stored.clone())?;
        self.register(Arc::new(table));
        Ok(true)
    }

    /// Solves `material` from scratch and returns the full table with
    /// positions and best moves, registering the frozen form as a side
    /// effect. Prefer [`Tablebase::ensure`] when only outcomes are needed.
    pub fn solve(&mut self, material: &Material) -> SolveResult<SolvedTable> {
        if material.non_king_count() > 3 {
            return Err(SolveError::UnsupportedMaterial {
                material: material.clone(),
            });
        }
        let stored = Tablebase::orientation(&material.normalized());
        for dep in dependencies::dependencies(&stored) {
            self.ensure(&dep)?;
        }
        let solved = solve::solve(&stored, &self.tables)?;
        let table = SubTable::from_solved(&solved)?;
        if let Some(dir) = &self.directory {
            table.write_to(dir)?;
        }
        self.register(Arc::new(table));
        Ok(solved)
    }

    /// Builds every three and four piece table, in a precomputed order
    /// that fails loudly if a prerequisite is unavailable.
    pub fn solve_all(&mut self) -> SolveResult<()> {
        for material in dependencies::solve_order(&dependencies::all_signatures())? {
            self.ensure(&material)?;
        }
        Ok(())
    }

    /// Outcome and distance of `pos` from the side to move's point of
    /// view. Material that can never force mate is an immediate draw
    /// without a table.
    pub fn probe(&self, pos: &Chess) -> SolveResult<SubEntry> {
        let material = Material::from_board(pos.board());
        if material.is_trivially_drawn() {
            return Ok(SubEntry::new(Outcome::Draw, 0));
        }
        let handle = self
            .tables
            .get(&material)
            .ok_or_else(|| SolveError::MissingSubTable {
                material: material.clone(),
            })?;
        handle.entry(pos)
    }
}
