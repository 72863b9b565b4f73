use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use shakmaty::{
    Board, CastlingMode, Chess, Color, EnPassantMode, FromSetup, Move, Piece, Position, Role,
    Setup, Square,
};
use tracing::{debug, info};

use crate::{
    errors::{SolveError, SolveResult},
    index::{self, BoardIndexer},
    material::{Material, PieceList},
    normalize::{flip_colors, Normalizer},
    subtable::SubTableHandle,
    types::{Outcome, SubEntry, TableEntry},
};

/// A fully solved table: a resolved entry for every reachable canonical
/// position, per side to move.
pub struct SolvedTable {
    pub material: Material,
    pub max_index: u32,
    pub white: Vec<Option<TableEntry>>,
    /// `None` for symmetric signatures, where the white array serves both
    /// sides through the colour flip.
    pub black: Option<Vec<Option<TableEntry>>>,
}

impl SolvedTable {
    pub fn is_symmetric(&self) -> bool {
        self.black.is_none()
    }
}

/// Solves one signature by backward induction. Every signature reachable
/// by capture or promotion must already be present in `subs`, keyed by its
/// concrete orientation.
pub fn solve(
    material: &Material,
    subs: &FxHashMap<Material, SubTableHandle>,
) -> SolveResult<SolvedTable> {
    let ctx = SolveCtx {
        material: material.clone(),
        indexer: index::for_material(material)?,
        normalizer: Normalizer::for_material(material),
        subs,
    };
    if material.is_symmetric() {
        solve_symmetric(&ctx)
    } else {
        solve_asymmetric(&ctx)
    }
}

struct SolveCtx<'a> {
    material: Material,
    indexer: Box<dyn BoardIndexer>,
    normalizer: Normalizer,
    subs: &'a FxHashMap<Material, SubTableHandle>,
}

/// Where a non-capture, non-promotion successor is looked up: the array of
/// the other side to move, or the same array again behind the colour flip
/// for symmetric tables.
enum SameTable<'t> {
    Opposite(&'t [Option<TableEntry>]),
    Flipped(&'t [Option<TableEntry>]),
}

fn solve_asymmetric(ctx: &SolveCtx<'_>) -> SolveResult<SolvedTable> {
    let max = ctx.indexer.max_index() as usize;
    let mut white: Vec<Option<TableEntry>> = vec![None; max];
    let mut black: Vec<Option<TableEntry>> = vec![None; max];
    populate(ctx, &mut white, Some(&mut black))?;
    info!(material = %ctx.material, max_index = max, "populated");

    let mut iterations = 0u32;
    loop {
        let changed = AtomicBool::new(false);
        let changes = AtomicUsize::new(0);
        run_pass(ctx, &mut black, SameTable::Opposite(&white), &changed, &changes)?;
        run_pass(ctx, &mut white, SameTable::Opposite(&black), &changed, &changes)?;
        debug!(
            material = %ctx.material,
            iterations,
            changes = changes.load(Ordering::Relaxed),
            "iteration complete"
        );
        iterations += 1;
        if !changed.load(Ordering::Relaxed) {
            break;
        }
    }
    close_draws(ctx, &mut white, SameTable::Opposite(&black))?;
    close_draws(ctx, &mut black, SameTable::Opposite(&white))?;

    let longest = white.iter().flatten().map(|e| e.dtz).max().unwrap_or(0);
    let black_can_draw = black.iter().flatten().any(|e| e.outcome == Outcome::Draw);
    info!(material = %ctx.material, longest_dtz = longest, black_can_draw, "solved");

    Ok(SolvedTable {
        material: ctx.material.clone(),
        max_index: max as u32,
        white,
        black: Some(black),
    })
}

fn solve_symmetric(ctx: &SolveCtx<'_>) -> SolveResult<SolvedTable> {
    let max = ctx.indexer.max_index() as usize;
    let mut table: Vec<Option<TableEntry>> = vec![None; max];
    populate(ctx, &mut table, None)?;
    info!(material = %ctx.material, max_index = max, "populated");

    let mut iterations = 0u32;
    loop {
        let changes = symmetric_pass(ctx, &mut table)?;
        debug!(material = %ctx.material, iterations, changes, "iteration complete");
        iterations += 1;
        if changes == 0 {
            break;
        }
    }
    symmetric_close_draws(ctx, &mut table)?;

    let longest = table.iter().flatten().map(|e| e.dtz).max().unwrap_or(0);
    let can_draw = table.iter().flatten().any(|e| e.outcome == Outcome::Draw);
    info!(material = %ctx.material, longest_dtz = longest, can_draw, "solved");

    Ok(SolvedTable {
        material: ctx.material.clone(),
        max_index: max as u32,
        white: table,
        black: None,
    })
}

fn kings_too_close(a: Square, b: Square) -> bool {
    let file = (u32::from(a.file()) as i32 - u32::from(b.file()) as i32).abs();
    let rank = (u32::from(a.rank()) as i32 - u32::from(b.rank()) as i32).abs();
    file <= 1 && rank <= 1
}

/// Phase 1: enumerate every placement of the pieces, keep the first legal
/// example that maps to each index. The white king only ranges over the
/// left half of the board; every normalizer keeps it there.
fn populate(
    ctx: &SolveCtx<'_>,
    white: &mut [Option<TableEntry>],
    mut black: Option<&mut [Option<TableEntry>]>,
) -> SolveResult<()> {
    let pieces = ctx.material.piece_list();
    let ep_cases = ctx.material.side_has_pawns(Color::White)
        && ctx.material.side_has_pawns(Color::Black);

    for wk in 0..32u32 {
        let wk_sq = Square::new((wk % 4) + 8 * (wk / 4));
        for bk in 0..64u32 {
            let bk_sq = Square::new(bk);
            if kings_too_close(wk_sq, bk_sq) {
                continue;
            }
            let mut base = Board::empty();
            base.set_piece_at(wk_sq, Color::White.king());
            base.set_piece_at(bk_sq, Color::Black.king());

            for board in Placements::new(base, pieces.clone()) {
                let mut setup = Setup {
                    board,
                    turn: Color::White,
                    ..Setup::empty()
                };
                ctx.normalizer.normalize(&mut setup);
                let index = ctx.indexer.index(&setup)? as usize;
                insert_entry(ctx, white, index, &setup, Color::White, ep_cases)?;
                if let Some(black) = black.as_deref_mut() {
                    insert_entry(ctx, black, index, &setup, Color::Black, ep_cases)?;
                }
            }
        }
    }
    Ok(())
}

/// First writer wins; placements that map to an already filled index are
/// the same canonical position reached again.
fn insert_entry(
    ctx: &SolveCtx<'_>,
    table: &mut [Option<TableEntry>],
    index: usize,
    setup: &Setup,
    turn: Color,
    ep_cases: bool,
) -> SolveResult<()> {
    if table[index].is_some() {
        return Ok(());
    }
    let mut setup = setup.clone();
    setup.turn = turn;
    // Rejects placements where the side not to move stands in check.
    let Ok(pos) = Chess::from_setup(setup.clone(), CastlingMode::Standard) else {
        return Ok(());
    };
    table[index] = Some(TableEntry::new(index as u32, pos));
    if ep_cases {
        add_ep_cases(ctx, table, &setup.board, turn)?;
    }
    Ok(())
}

/// Synthesizes the en passant variants of a freshly inserted position: one
/// per file where the opponent's pawn could just have double-stepped and a
/// pawn of the side to move stands ready to capture it.
fn add_ep_cases(
    ctx: &SolveCtx<'_>,
    table: &mut [Option<TableEntry>],
    board: &Board,
    turn: Color,
) -> SolveResult<()> {
    for col in 0..8u32 {
        let ep = Square::new(if turn == Color::White { 40 + col } else { 16 + col });
        let toward = match turn {
            Color::White => -8,
            Color::Black => 8,
        };
        let (Some(captured), Some(behind)) = (ep.offset(toward), ep.offset(-toward)) else {
            continue;
        };
        if board.piece_at(captured) != Some((!turn).pawn()) {
            continue;
        }
        if board.piece_at(ep).is_some() || board.piece_at(behind).is_some() {
            continue;
        }
        let left = col > 0
            && ep
                .offset(toward - 1)
                .is_some_and(|sq| board.piece_at(sq) == Some(turn.pawn()));
        let right = col < 7
            && ep
                .offset(toward + 1)
                .is_some_and(|sq| board.piece_at(sq) == Some(turn.pawn()));
        if !left && !right {
            continue;
        }
        let setup = Setup {
            board: board.clone(),
            turn,
            ep_square: Some(ep),
            ..Setup::empty()
        };
        let Ok(pos) = Chess::from_setup(setup.clone(), CastlingMode::Standard) else {
            continue;
        };
        let index = ctx.indexer.index(&setup)? as usize;
        if table[index].is_none() {
            table[index] = Some(TableEntry::new(index as u32, pos));
        }
    }
    Ok(())
}

/// Enumerates every placement of `pieces` onto the free squares of `base`,
/// pawns restricted to the interior ranks. Iterative so each yielded board
/// is an independent snapshot.
struct Placements {
    base: Board,
    pieces: PieceList,
    squares: arrayvec::ArrayVec<Square, 3>,
    cursor: [u32; 4],
    done: bool,
}

impl Placements {
    fn new(base: Board, pieces: PieceList) -> Placements {
        Placements {
            base,
            pieces,
            squares: arrayvec::ArrayVec::new(),
            cursor: [0; 4],
            done: false,
        }
    }

    fn bounds(piece: Piece) -> (u32, u32) {
        if piece.role == Role::Pawn {
            (8, 56)
        } else {
            (0, 64)
        }
    }

    fn occupied(&self) -> shakmaty::Bitboard {
        let mut occ = self.base.occupied();
        for &sq in &self.squares {
            occ.add(sq);
        }
        occ
    }

    fn materialize(&self) -> Board {
        let mut board = self.base.clone();
        for (&piece, &sq) in self.pieces.iter().zip(&self.squares) {
            board.set_piece_at(sq, piece);
        }
        board
    }
}

impl Iterator for Placements {
    type Item = Board;

    fn next(&mut self) -> Option<Board> {
        if self.done {
            return None;
        }
        if self.pieces.is_empty() {
            self.done = true;
            return Some(self.base.clone());
        }
        loop {
            let depth = self.squares.len();
            if depth == self.pieces.len() {
                let board = self.materialize();
                self.squares.pop();
                return Some(board);
            }
            let (lo, hi) = Placements::bounds(self.pieces[depth]);
            let mut sq = self.cursor[depth].max(lo);
            let occupied = self.occupied();
            while sq < hi && occupied.contains(Square::new(sq)) {
                sq += 1;
            }
            if sq >= hi {
                if depth == 0 {
                    self.done = true;
                    return None;
                }
                self.squares.pop();
            } else {
                self.squares.push(Square::new(sq));
                self.cursor[depth] = sq + 1;
                self.cursor[depth + 1] = 0;
            }
        }
    }
}

/// Phase 2 pass over one side's array. Entries resolve at most once, so a
/// pass with no changes on either side is the fixed point.
fn run_pass(
    ctx: &SolveCtx<'_>,
    mine: &mut [Option<TableEntry>],
    same: SameTable<'_>,
    changed: &AtomicBool,
    changes: &AtomicUsize,
) -> SolveResult<()> {
    mine.par_iter_mut().try_for_each(|slot| {
        let Some(entry) = slot.as_mut() else {
            return Ok(());
        };
        if entry.outcome != Outcome::Unknown {
            return Ok(());
        }
        if let Some((outcome, dtz, best)) = evaluate(ctx, entry, &same)? {
            entry.resolve(outcome, dtz, best);
            changed.store(true, Ordering::Relaxed);
            changes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })
}

/// One symmetric pass: decisions are collected against the pre-pass state
/// of the array and applied at the barrier, so a pass sees a consistent
/// snapshot of itself.
fn symmetric_pass(ctx: &SolveCtx<'_>, table: &mut Vec<Option<TableEntry>>) -> SolveResult<usize> {
    let updates = table
        .par_iter()
        .enumerate()
        .map(|(i, slot)| {
            let Some(entry) = slot.as_ref() else {
                return Ok(None);
            };
            if entry.outcome != Outcome::Unknown {
                return Ok(None);
            }
            Ok(evaluate(ctx, entry, &SameTable::Flipped(table))?
                .map(|(outcome, dtz, best)| (i, outcome, dtz, best)))
        })
        .collect::<SolveResult<Vec<_>>>()?;

    let mut count = 0;
    for (i, outcome, dtz, best) in updates.into_iter().flatten() {
        if let Some(entry) = table[i].as_mut() {
            entry.resolve(outcome, dtz, best);
            count += 1;
        }
    }
    Ok(count)
}

/// Evaluates one unresolved entry. `None` means some successor is still
/// unknown and no winning move exists, so the entry must wait.
fn evaluate(
    ctx: &SolveCtx<'_>,
    entry: &TableEntry,
    same: &SameTable<'_>,
) -> SolveResult<Option<(Outcome, u8, Option<Move>)>> {
    let moves = entry.position.legal_moves();
    if moves.is_empty() {
        let outcome = if entry.position.is_check() {
            Outcome::Loss
        } else {
            Outcome::Draw
        };
        return Ok(Some((outcome, 0, None)));
    }
    let mut options = Vec::with_capacity(moves.len());
    for m in &moves {
        options.push((m.clone(), resolve_move(ctx, &entry.position, m, same)?));
    }
    Ok(choose(&options).map(|(m, sub)| (sub.outcome, sub.dtz, Some(m.clone()))))
}

/// The value to the mover of playing `m`: the opponent's entry in the
/// position reached, seen through [`SubEntry::before_move`]. Captures and
/// promotions leave the table and consult the frozen sub-tables instead.
fn resolve_move(
    ctx: &SolveCtx<'_>,
    pos: &Chess,
    m: &Move,
    same: &SameTable<'_>,
) -> SolveResult<SubEntry> {
    let mut after = pos.clone();
    after.play_unchecked(m);

    if m.capture().is_some() || m.promotion().is_some() {
        let material = Material::from_board(after.board());
        if material.is_trivially_drawn() {
            return Ok(SubEntry::new(Outcome::Draw, 0));
        }
        let handle = ctx
            .subs
            .get(&material)
            .ok_or_else(|| SolveError::MissingSubTable {
                material: material.clone(),
            })?;
        Ok(handle.entry(&after)?.before_move(m))
    } else {
        let mut setup = after.into_setup(EnPassantMode::Legal);
        let table = match same {
            SameTable::Opposite(table) => *table,
            SameTable::Flipped(table) => {
                setup = flip_colors(&setup);
                *table
            }
        };
        ctx.normalizer.normalize(&mut setup);
        let index = ctx.indexer.index(&setup)? as usize;
        match table.get(index).and_then(Option::as_ref) {
            Some(opponent) => Ok(opponent.as_sub_entry().before_move(m)),
            None => Err(SolveError::MissingEntry {
                material: ctx.material.clone(),
                index: index as u32,
            }),
        }
    }
}

/// The final tie-break: a win with minimal distance beats everything; an
/// unknown successor blocks resolution unless a win exists; any draw
/// beats losing; a forced loss stalls with maximal distance.
fn choose<'a>(options: &'a [(Move, SubEntry)]) -> Option<&'a (Move, SubEntry)> {
    let mut best_win: Option<&(Move, SubEntry)> = None;
    for option in options {
        if option.1.outcome == Outcome::Win
            && best_win.map_or(true, |best| option.1.dtz < best.1.dtz)
        {
            best_win = Some(option);
        }
    }
    if best_win.is_some() {
        return best_win;
    }
    if options
        .iter()
        .any(|option| option.1.outcome == Outcome::Unknown)
    {
        return None;
    }
    if let Some(draw) = options
        .iter()
        .find(|option| option.1.outcome == Outcome::Draw)
    {
        return Some(draw);
    }
    options.iter().max_by_key(|option| option.1.dtz)
}

/// Phase 3: entries still unknown at the fixed point sit in cycles of
/// mutual postponement; they are draws, closed off with any move that
/// stays in the cycle or reaches a known draw.
fn close_draws(
    ctx: &SolveCtx<'_>,
    mine: &mut [Option<TableEntry>],
    same: SameTable<'_>,
) -> SolveResult<()> {
    mine.par_iter_mut().try_for_each(|slot| {
        let Some(entry) = slot.as_mut() else {
            return Ok(());
        };
        if entry.outcome != Outcome::Unknown {
            return Ok(());
        }
        let moves = entry.position.legal_moves();
        for m in &moves {
            let sub = resolve_move(ctx, &entry.position, m, &same)?;
            if matches!(sub.outcome, Outcome::Draw | Outcome::Unknown) {
                entry.resolve(Outcome::Draw, 0, Some(m.clone()));
                return Ok(());
            }
        }
        Err(SolveError::Unresolved {
            material: ctx.material.clone(),
            index: entry.index,
        })
    })
}

fn symmetric_close_draws(
    ctx: &SolveCtx<'_>,
    table: &mut Vec<Option<TableEntry>>,
) -> SolveResult<()> {
    let updates = table
        .par_iter()
        .enumerate()
        .map(|(i, slot)| {
            let Some(entry) = slot.as_ref() else {
                return Ok(None);
            };
            if entry.outcome != Outcome::Unknown {
                return Ok(None);
            }
            let moves = entry.position.legal_moves();
            for m in &moves {
                let sub = resolve_move(ctx, &entry.position, m, &SameTable::Flipped(table))?;
                if matches!(sub.outcome, Outcome::Draw | Outcome::Unknown) {
                    return Ok(Some((i, m.clone())));
                }
            }
            Err(SolveError::Unresolved {
                material: ctx.material.clone(),
                index: entry.index,
            })
        })
        .collect::<SolveResult<Vec<_>>>()?;

    for (i, m) in updates.into_iter().flatten() {
        if let Some(entry) = table[i].as_mut() {
            entry.resolve(Outcome::Draw, 0, Some(m));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placements_for(material: &str) -> (Board, PieceList) {
        let material = Material::from_str(material).expect("valid signature");
        let mut base = Board::empty();
        base.set_piece_at(Square::B1, Color::White.king());
        base.set_piece_at(Square::G8, Color::Black.king());
        (base, material.piece_list())
    }

    #[test]
    fn test_placements_counts_free_squares() {
        let (base, pieces) = placements_for("KR-K");
        assert_eq!(Placements::new(base, pieces).count(), 62);
    }

    #[test]
    fn test_placements_pawns_stay_interior() {
        let (base, pieces) = placements_for("KP-K");
        let mut count = 0;
        for board in Placements::new(base.clone(), pieces) {
            let pawn = (board.by_piece(Color::White.pawn()))
                .first()
                .expect("pawn placed");
            let rank = u32::from(pawn.rank());
            assert!((1..7).contains(&rank));
            count += 1;
        }
        // 48 interior squares, none occupied by the kings here.
        assert_eq!(count, 48);
    }

    #[test]
    fn test_placements_two_pieces_avoid_collisions() {
        let (base, pieces) = placements_for("KQ-KR");
        for board in Placements::new(base, pieces) {
            assert_eq!(board.occupied().count(), 4);
        }
    }

    #[test]
    fn test_choose_prefers_fast_win() {
        let m = Move::Normal {
            role: Role::Rook,
            from: Square::A1,
            capture: None,
            to: Square::A8,
            promotion: None,
        };
        let options = vec![
            (m.clone(), SubEntry::new(Outcome::Win, 9)),
            (m.clone(), SubEntry::new(Outcome::Win, 3)),
            (m.clone(), SubEntry::new(Outcome::Draw, 0)),
        ];
        let chosen = choose(&options).expect("resolvable");
        assert_eq!(chosen.1, SubEntry::new(Outcome::Win, 3));
    }

    #[test]
    fn test_choose_blocks_on_unknown() {
        let m = Move::Normal {
            role: Role::King,
            from: Square::A1,
            capture: None,
            to: Square::A2,
            promotion: None,
        };
        let options = vec![
            (m.clone(), SubEntry::new(Outcome::Unknown, 0)),
            (m.clone(), SubEntry::new(Outcome::Loss, 5)),
        ];
        assert!(choose(&options).is_none());
    }

    #[test]
    fn test_choose_draw_over_loss_and_slow_loss() {
        let m = Move::Normal {
            role: Role::King,
            from: Square::A1,
            capture: None,
            to: Square::A2,
            promotion: None,
        };
        let options = vec![
            (m.clone(), SubEntry::new(Outcome::Loss, 5)),
            (m.clone(), SubEntry::new(Outcome::Draw, 0)),
        ];
        assert_eq!(
            choose(&options).expect("resolvable").1.outcome,
            Outcome::Draw
        );

        let losses = vec![
            (m.clone(), SubEntry::new(Outcome::Loss, 5)),
            (m.clone(), SubEntry::new(Outcome::Loss, 17)),
        ];
        assert_eq!(choose(&losses).expect("resolvable").1.dtz, 17);
    }
}
