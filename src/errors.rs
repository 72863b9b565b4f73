use std::{error::Error, fmt, io, path::PathBuf};

use shakmaty::Piece;

use crate::material::Material;

pub type IndexResult<T> = Result<T, IndexError>;

pub type SolveResult<T> = Result<T, SolveError>;

/// Error when mapping a position to a table index.
#[derive(Debug)]
pub enum IndexError {
    /// Position has more non-king pieces than the indexing scheme supports.
    TooManyPieces {
        #[allow(missing_docs)]
        count: usize,
    },
    /// A piece required by the material signature is not on the board.
    MissingPiece {
        #[allow(missing_docs)]
        piece: Piece,
    },
    /// Position is not in canonical orientation for this table.
    NotNormalized,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::TooManyPieces { count } => {
                write!(f, "{count} non-king pieces exceed the index width")
            }
            IndexError::MissingPiece { piece } => {
                write!(f, "piece missing from position: {:?}", piece)
            }
            IndexError::NotNormalized => write!(f, "position is not normalized"),
        }
    }
}

impl Error for IndexError {}

/// Error when generating or loading a table.
#[derive(Debug)]
pub enum SolveError {
    /// Material signature outside the supported piece-count range.
    UnsupportedMaterial {
        #[allow(missing_docs)]
        material: Material,
    },
    /// Indexing failed for a position that should be in the table domain.
    Index(IndexError),
    /// A prerequisite sub-table was not solved or loaded first.
    MissingSubTable {
        #[allow(missing_docs)]
        material: Material,
    },
    /// A reachable position has no entry after population.
    MissingEntry {
        #[allow(missing_docs)]
        material: Material,
        #[allow(missing_docs)]
        index: u32,
    },
    /// An entry was still unresolved after the solver reached its fixed point.
    Unresolved {
        #[allow(missing_docs)]
        material: Material,
        #[allow(missing_docs)]
        index: u32,
    },
    /// No topological solve order exists for the requested signatures.
    NoSolveOrder {
        #[allow(missing_docs)]
        remaining: Vec<Material>,
    },
    /// A persisted sub-table artifact is missing.
    MissingArtifact {
        #[allow(missing_docs)]
        material: Material,
        #[allow(missing_docs)]
        path: PathBuf,
    },
    /// I/O error reading or writing a table artifact.
    Read {
        #[allow(missing_docs)]
        error: io::Error,
    },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::UnsupportedMaterial { material } => {
                write!(f, "unsupported material signature: {material}")
            }
            SolveError::Index(error) => write!(f, "indexing failed: {error}"),
            SolveError::MissingSubTable { material } => {
                write!(f, "required sub-table not available: {material}")
            }
            SolveError::MissingEntry { material, index } => {
                write!(f, "no entry at index {index} in table {material}")
            }
            SolveError::Unresolved { material, index } => {
                write!(
                    f,
                    "entry at index {index} in table {material} never resolved"
                )
            }
            SolveError::NoSolveOrder { remaining } => {
                write!(f, "no solve order for: ")?;
                for (i, material) in remaining.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{material}")?;
                }
                Ok(())
            }
            SolveError::MissingArtifact { material, path } => {
                write!(
                    f,
                    "missing artifact for table {material}: {}",
                    path.display()
                )
            }
            SolveError::Read { error } => write!(f, "i/o error on table artifact: {error}"),
        }
    }
}

impl Error for SolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SolveError::Index(error) => Some(error),
            SolveError::Read { error } => Some(error),
            _ => None,
        }
    }
}

impl From<IndexError> for SolveError {
    fn from(error: IndexError) -> SolveError {
        SolveError::Index(error)
    }
}

impl From<io::Error> for SolveError {
    fn from(error: io::Error) -> SolveError {
        SolveError::Read { error }
    }
}
