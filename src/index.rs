use arrayvec::ArrayVec;
use shakmaty::{Bitboard, Board, Color, Piece, Role, Setup, Square};

use crate::{
    errors::{IndexError, IndexResult},
    material::{Material, PieceList},
};

/// Sentinel for squares outside a triangle table.
const Z: u32 = u32::MAX;

/// White king square to 0-5 off the long diagonal, 0-3 on it. Only the
/// a1-d1-d4 triangle is populated; normalization guarantees the king is
/// inside it.
#[rustfmt::skip]
const SMALL_TRIANGLE: [u32; 64] = [
    0, 0, 1, 2, Z, Z, Z, Z,
    Z, 1, 3, 4, Z, Z, Z, Z,
    Z, Z, 2, 5, Z, Z, Z, Z,
    Z, Z, Z, 3, Z, Z, Z, Z,
    Z, Z, Z, Z, Z, Z, Z, Z,
    Z, Z, Z, Z, Z, Z, Z, Z,
    Z, Z, Z, Z, Z, Z, Z, Z,
    Z, Z, Z, Z, Z, Z, Z, Z,
];

/// Black king square to 0-35 in the triangle on or below the long diagonal,
/// used when the white king sits on the diagonal.
#[rustfmt::skip]
const LARGE_TRIANGLE: [u32; 64] = [
    0,  1,  2,  3,  4,  5,  6,  7,
    Z,  8,  9,  10, 11, 12, 13, 14,
    Z,  Z,  15, 16, 17, 18, 19, 20,
    Z,  Z,  Z,  21, 22, 23, 24, 25,
    Z,  Z,  Z,  Z,  26, 27, 28, 29,
    Z,  Z,  Z,  Z,  Z,  30, 31, 32,
    Z,  Z,  Z,  Z,  Z,  Z,  33, 34,
    Z,  Z,  Z,  Z,  Z,  Z,  Z,  35,
];

/// Maps normalized positions of one material signature to dense indices.
pub trait BoardIndexer: Send + Sync {
    /// Exclusive upper bound on [`BoardIndexer::index`]. Fixed at
    /// construction.
    fn max_index(&self) -> u32;

    /// The index of a normalized position.
    fn index(&self, setup: &Setup) -> IndexResult<u32>;
}

/// Picks the indexing scheme for a signature. Signatures where only black
/// has pawns are served through the swapped view of the reversed table, but
/// the pawn arithmetic itself is colour-agnostic, so they index fine too.
pub fn for_material(material: &Material) -> IndexResult<Box<dyn BoardIndexer>> {
    let count = material.non_king_count();
    if count > 3 {
        return Err(IndexError::TooManyPieces { count });
    }
    Ok(
        if material.side_has_pawns(Color::White) && material.side_has_pawns(Color::Black) {
            Box::new(BothPawnIndexer::new(material))
        } else if material.has_pawns() {
            Box::new(WhitePawnIndexer::new(material))
        } else {
            Box::new(NoPawnIndexer::new(material))
        },
    )
}

fn below(sq: Square) -> Bitboard {
    Bitboard((1u64 << u32::from(sq)) - 1)
}

/// Takes successive lowest squares per piece type, mirroring the placement
/// order used when the table was populated.
fn next_square(board: &Board, piece: Piece, used: Bitboard) -> IndexResult<Square> {
    (board.by_piece(piece) & !used)
        .first()
        .ok_or(IndexError::MissingPiece { piece })
}

/// Adds the contribution of the non-king pieces: each square is ranked
/// among the squares still free at its turn, so consecutive placements
/// multiply out without gaps. Pawns rank only against previously counted
/// pawn squares, within the 48-square interior.
fn index_pieces(
    board: &Board,
    pieces: &[Piece],
    values: &[u32],
    mut occupancy: Bitboard,
    mut pawn_occupancy: Bitboard,
    mut used: Bitboard,
) -> IndexResult<u32> {
    let mut index = 0;
    for (&piece, &value) in pieces.iter().zip(values) {
        let sq = next_square(board, piece, used)?;
        used.add(sq);
        let rank = if piece.role == Role::Pawn {
            let prev = (below(sq) & pawn_occupancy).count() as u32;
            pawn_occupancy.add(sq);
            u32::from(sq) - 8 - prev
        } else {
            let prev = (below(sq) & occupancy).count() as u32;
            u32::from(sq) - prev
        };
        index += value * rank;
        occupancy.add(sq);
    }
    Ok(index)
}

fn piece_values(pieces: &PieceList) -> (ArrayVec<u32, 3>, u32) {
    let mut values = ArrayVec::from([0u32; 3]);
    values.truncate(pieces.len());
    let mut current = 1;
    for i in (0..pieces.len()).rev() {
        values[i] = current;
        current *= if pieces[i].role == Role::Pawn {
            48 - i as u32
        } else {
            62 - i as u32
        };
    }
    (values, current)
}

fn kings(board: &Board) -> IndexResult<(Square, Square)> {
    let wk = board.king_of(Color::White).ok_or(IndexError::MissingPiece {
        piece: Color::White.king(),
    })?;
    let bk = board.king_of(Color::Black).ok_or(IndexError::MissingPiece {
        piece: Color::Black.king(),
    })?;
    Ok((wk, bk))
}

/// Indexing for pawnless signatures. The white king is confined to the
/// a1-d1-d4 triangle; when it sits on the long diagonal the black king is
/// further confined to the triangle on or below it.
pub struct NoPawnIndexer {
    pieces: PieceList,
    values: ArrayVec<u32, 3>,
    bk_value: u32,
    wk_off_diagonal: u32,
    wk_on_diagonal: u32,
    max_index: u32,
}

impl NoPawnIndexer {
    pub fn new(material: &Material) -> NoPawnIndexer {
        let pieces = material.piece_list();
        let (values, bk_value) = piece_values(&pieces);
        // Off the diagonal the white king is never in a corner, so the
        // black king loses 3 squares; on it the black king has the 36
        // square triangle minus 2.
        let wk_off_diagonal = bk_value * 61;
        let wk_on_diagonal = bk_value * 34;
        NoPawnIndexer {
            pieces,
            values,
            bk_value,
            wk_off_diagonal,
            wk_on_diagonal,
            max_index: 6 * wk_off_diagonal + 4 * wk_on_diagonal,
        }
    }
}

impl BoardIndexer for NoPawnIndexer {
    fn max_index(&self) -> u32 {
        self.max_index
    }

    fn index(&self, setup: &Setup) -> IndexResult<u32> {
        let board = &setup.board;
        let (wk, bk) = kings(board)?;
        let wk_i = u32::from(wk);
        let bk_i = u32::from(bk);

        let small = SMALL_TRIANGLE[wk_i as usize];
        if small == Z {
            return Err(IndexError::NotNormalized);
        }

        let mut index = if wk.file() as u32 == wk.rank() as u32 {
            let large = LARGE_TRIANGLE[bk_i as usize];
            if large == Z {
                return Err(IndexError::NotNormalized);
            }
            6 * self.wk_off_diagonal
                + small * self.wk_on_diagonal
                + self.bk_value * (large - if bk_i > wk_i { 2 } else { 0 })
        } else {
            small * self.wk_off_diagonal + self.bk_value * (bk_i - if bk_i > wk_i { 3 } else { 0 })
        };

        index += index_pieces(
            board,
            &self.pieces,
            &self.values,
            board.kings(),
            Bitboard::EMPTY,
            Bitboard::EMPTY,
        )?;
        Ok(index)
    }
}

fn half_board(wk: Square) -> IndexResult<u32> {
    if wk.file() as u32 >= 4 {
        return Err(IndexError::NotNormalized);
    }
    let wk_i = u32::from(wk);
    Ok(((wk_i & 56) >> 1) + (wk_i & 3))
}

/// Indexing when exactly one side has pawns. The fixed pawn direction
/// leaves only the horizontal mirror, so the white king takes one of 32
/// half-board squares.
pub struct WhitePawnIndexer {
    pieces: PieceList,
    values: ArrayVec<u32, 3>,
    bk_value: u32,
    wk_value: u32,
}

impl WhitePawnIndexer {
    pub fn new(material: &Material) -> WhitePawnIndexer {
        let pieces = material.piece_list();
        let (values, bk_value) = piece_values(&pieces);
        // The black king cannot share the white king's square or be the
        // next/previous square, leaving 62 values.
        WhitePawnIndexer {
            pieces,
            values,
            bk_value,
            wk_value: bk_value * 62,
        }
    }
}

impl BoardIndexer for WhitePawnIndexer {
    fn max_index(&self) -> u32 {
        self.wk_value * 32
    }

    fn index(&self, setup: &Setup) -> IndexResult<u32> {
        let board = &setup.board;
        let (wk, bk) = kings(board)?;
        let bk_i = u32::from(bk);

        let mut index = half_board(wk)? * self.wk_value;
        index += (bk_i - if bk > wk { 2 } else { 0 }) * self.bk_value;
        index += index_pieces(
            board,
            &self.pieces,
            &self.values,
            board.kings(),
            Bitboard::EMPTY,
            Bitboard::EMPTY,
        )?;
        Ok(index)
    }
}

/// An available en passant capture, identified during indexing.
struct EpCapture {
    /// Dense bucket 0-13: capturer on the right file gets 0-6, capturer on
    /// the left file gets 7-13. A capturer on the a or h file cannot sit
    /// on the respective outer side, so both ranges cover seven files.
    bucket: u32,
    capturer: Square,
    captured: Square,
    behind: Square,
}

fn ep_capture(setup: &Setup) -> Option<EpCapture> {
    let ep = setup.ep_square?;
    let col = ep.file() as u32;
    let (capturer_piece, captured_offset, behind_offset) = match setup.turn {
        Color::White => (Color::White.pawn(), -8, 8),
        Color::Black => (Color::Black.pawn(), 8, -8),
    };
    let captured = ep.offset(captured_offset)?;
    let behind = ep.offset(behind_offset)?;
    let row_offset = match setup.turn {
        Color::White => -8,
        Color::Black => 8,
    };
    // Leftmost capturer is canonical when pawns flank the captured pawn.
    if col > 0 {
        if let Some(capturer) = ep.offset(row_offset - 1) {
            if setup.board.piece_at(capturer) == Some(capturer_piece) {
                return Some(EpCapture {
                    bucket: 6 + col,
                    capturer,
                    captured,
                    behind,
                });
            }
        }
    }
    if col < 7 {
        if let Some(capturer) = ep.offset(row_offset + 1) {
            if setup.board.piece_at(capturer) == Some(capturer_piece) {
                return Some(EpCapture {
                    bucket: col,
                    capturer,
                    captured,
                    behind,
                });
            }
        }
    }
    None
}

/// Indexing when both sides have pawns. Positions with a usable en passant
/// capture get their own index range past all regular positions, one
/// bucket per (file, capture direction) pair, with the two pawns involved
/// taken out of the generic piece encoding.
pub struct BothPawnIndexer {
    pieces: PieceList,
    values: ArrayVec<u32, 3>,
    bk_value: u32,
    wk_value: u32,
    ep_pieces: PieceList,
    ep_values: ArrayVec<u32, 3>,
    ep_bk_value: u32,
    ep_wk_value: u32,
    ep_pawns_value: u32,
}

impl BothPawnIndexer {
    pub fn new(material: &Material) -> BothPawnIndexer {
        let pieces = material.piece_list();
        let (values, bk_value) = piece_values(&pieces);
        let wk_value = bk_value * 62;

        // One pawn of each colour is implied by the en passant bucket.
        let mut ep_pieces = pieces.clone();
        for color in [Color::White, Color::Black] {
            if let Some(pos) = ep_pieces.iter().position(|p| *p == color.pawn()) {
                ep_pieces.remove(pos);
            }
        }
        let mut ep_values = ArrayVec::from([0u32; 3]);
        ep_values.truncate(ep_pieces.len());
        let mut current = 1;
        for i in (0..ep_pieces.len()).rev() {
            ep_values[i] = current;
            // The en passant square and its vertical neighbours are known
            // occupied or empty, excluding 4 more squares.
            current *= if ep_pieces[i].role == Role::Pawn {
                48 - 4 - i as u32
            } else {
                64 - 6 - i as u32
            };
        }
        let ep_bk_value = current;
        let ep_wk_value = ep_bk_value * 62;
        let ep_pawns_value = ep_wk_value * 32;

        BothPawnIndexer {
            pieces,
            values,
            bk_value,
            wk_value,
            ep_pieces,
            ep_values,
            ep_bk_value,
            ep_wk_value,
            ep_pawns_value,
        }
    }

    fn index_ep(&self, setup: &Setup, ep: EpCapture) -> IndexResult<u32> {
        let board = &setup.board;
        let (wk, bk) = kings(board)?;
        let bk_i = u32::from(bk);

        let mut index = 32 * self.wk_value + ep.bucket * self.ep_pawns_value;
        index += half_board(wk)? * self.ep_wk_value;
        index += (bk_i - if bk > wk { 2 } else { 0 }) * self.ep_bk_value;

        let ep_square = match setup.ep_square {
            Some(sq) => sq,
            None => return Err(IndexError::NotNormalized),
        };
        let mut fixed = Bitboard::EMPTY;
        for sq in [ep_square, ep.capturer, ep.captured, ep.behind] {
            fixed.add(sq);
        }
        let mut used = Bitboard::EMPTY;
        used.add(ep.capturer);
        used.add(ep.captured);

        index += index_pieces(
            board,
            &self.ep_pieces,
            &self.ep_values,
            board.kings() | fixed,
            fixed,
            used,
        )?;
        Ok(index)
    }
}

impl BoardIndexer for BothPawnIndexer {
    fn max_index(&self) -> u32 {
        self.wk_value * 32 + self.ep_pawns_value * 14
    }

    fn index(&self, setup: &Setup) -> IndexResult<u32> {
        if let Some(ep) = ep_capture(setup) {
            return self.index_ep(setup, ep);
        }
        let board = &setup.board;
        let (wk, bk) = kings(board)?;
        let bk_i = u32::from(bk);

        let mut index = half_board(wk)? * self.wk_value;
        index += (bk_i - if bk > wk { 2 } else { 0 }) * self.bk_value;
        index += index_pieces(
            board,
            &self.pieces,
            &self.values,
            board.kings(),
            Bitboard::EMPTY,
            Bitboard::EMPTY,
        )?;
        Ok(index)
    }
}
