//! Generates endgame tables for chess positions with up to five pieces
//! by retrograde analysis.
//!
//! Each table covers one material signature, e.g. `KQ-KR`, and stores the
//! game-theoretic outcome and distance to zeroing move (DTZ) for every
//! reachable position of that signature. Tables are solved in dependency
//! order: captures and promotions lead into smaller signatures, which must
//! be available first. [`Tablebase`] manages that order, persists solved
//! tables and answers probes.
//!
//! # Example
//!
//! ```no_run
//! use shakmaty::{fen::Fen, CastlingMode, Chess, Role};
//! use shakmaty_tablegen::{Material, Tablebase};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tables = Tablebase::new();
//! tables.ensure(&Material::from_roles(&[Role::Queen], &[]))?;
//!
//! let pos: Chess = "4k3/8/4K3/8/8/8/8/3Q4 w - - 0 1"
//!     .parse::<Fen>()?
//!     .into_position(CastlingMode::Standard)?;
//!
//! let entry = tables.probe(&pos)?;
//! println!("{:?} in {}", entry.outcome, entry.dtz);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod errors;
mod material;
mod normalize;
mod types;

pub mod dependencies;
pub mod encode;
pub mod index;
pub mod lookup;
pub mod solve;
pub mod subtable;
pub mod tablebase;

pub use crate::{
    errors::{IndexError, IndexResult, SolveError, SolveResult},
    lookup::{LookupTable, ProbeEntry},
    material::{Material, MaterialSide},
    normalize::{flip_colors, flip_move_colors, InverseMap, Normalizer, Transform},
    solve::SolvedTable,
    subtable::{SubTable, SubTableHandle},
    tablebase::Tablebase,
    types::{Outcome, SubEntry, TableEntry, MAX_DTZ},
};
