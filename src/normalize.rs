use arrayvec::ArrayVec;
use shakmaty::{Board, Color, Move, Piece, Setup, Square};

use crate::material::Material;

/// A self-inverse board symmetry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transform {
    FlipVertical,
    FlipHorizontal,
    FlipDiagonal,
}

impl Transform {
    fn apply(self, square: Square) -> Square {
        match self {
            Transform::FlipVertical => square.flip_vertical(),
            Transform::FlipHorizontal => square.flip_horizontal(),
            Transform::FlipDiagonal => square.flip_diagonal(),
        }
    }
}

/// Maps squares of a canonical position back to the orientation the caller
/// presented.
///
/// Normalization applies transforms `T1, T2, T3` in order. Each is its own
/// inverse, so the way back is the same transforms in reverse order.
#[derive(Debug, Clone, Default)]
pub struct InverseMap {
    transforms: ArrayVec<Transform, 3>,
}

impl InverseMap {
    pub fn identity() -> InverseMap {
        InverseMap::default()
    }

    pub fn is_identity(&self) -> bool {
        self.transforms.is_empty()
    }

    fn push(&mut self, transform: Transform) {
        self.transforms.push(transform);
    }

    pub fn map(&self, square: Square) -> Square {
        self.transforms
            .iter()
            .rev()
            .fold(square, |sq, t| t.apply(sq))
    }

    pub fn map_move(&self, m: &Move) -> Move {
        match *m {
            Move::Normal {
                role,
                from,
                capture,
                to,
                promotion,
            } => Move::Normal {
                role,
                from: self.map(from),
                capture,
                to: self.map(to),
                promotion,
            },
            Move::EnPassant { from, to } => Move::EnPassant {
                from: self.map(from),
                to: self.map(to),
            },
            ref m => m.clone(),
        }
    }
}

fn transform_board(board: &Board, transform: Transform) -> Board {
    let mut out = Board::empty();
    for sq in board.occupied() {
        if let Some(piece) = board.piece_at(sq) {
            out.set_piece_at(transform.apply(sq), piece);
        }
    }
    out
}

fn apply(setup: &mut Setup, inverse: &mut InverseMap, transform: Transform) {
    setup.board = transform_board(&setup.board, transform);
    setup.ep_square = setup.ep_square.map(|sq| transform.apply(sq));
    inverse.push(transform);
}

/// Canonicalization strategy, chosen once per material signature.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Normalizer {
    /// Full symmetry group: white king confined to the a1-d1-d4 triangle.
    NoPawns,
    /// Pawns fix the vertical axis: only the horizontal mirror applies,
    /// keeping the white king on files a-d.
    Pawns,
}

impl Normalizer {
    pub fn for_material(material: &Material) -> Normalizer {
        if material.has_pawns() {
            Normalizer::Pawns
        } else {
            Normalizer::NoPawns
        }
    }

    /// Puts `setup` into canonical orientation and returns the map back.
    pub fn normalize(self, setup: &mut Setup) -> InverseMap {
        let mut inverse = InverseMap::identity();
        let Some(wk) = setup.board.king_of(Color::White) else {
            return inverse;
        };
        match self {
            Normalizer::NoPawns => {
                let mut wk = wk;
                if u32::from(wk.rank()) >= 4 {
                    apply(setup, &mut inverse, Transform::FlipVertical);
                    wk = wk.flip_vertical();
                }
                if u32::from(wk.file()) >= 4 {
                    apply(setup, &mut inverse, Transform::FlipHorizontal);
                    wk = wk.flip_horizontal();
                }
                let rank = u32::from(wk.rank());
                let file = u32::from(wk.file());
                if rank > file {
                    apply(setup, &mut inverse, Transform::FlipDiagonal);
                } else if rank == file {
                    // King on the long diagonal: the black king breaks the tie.
                    if let Some(bk) = setup.board.king_of(Color::Black) {
                        if u32::from(bk.rank()) > u32::from(bk.file()) {
                            apply(setup, &mut inverse, Transform::FlipDiagonal);
                        }
                    }
                }
            }
            Normalizer::Pawns => {
                if u32::from(wk.file()) >= 4 {
                    apply(setup, &mut inverse, Transform::FlipHorizontal);
                }
            }
        }
        inverse
    }
}

/// Exchanges the colours: pieces swap sides, ranks flip, and the move
/// changes hands. Used to query a table for the other orientation.
pub fn flip_colors(setup: &Setup) -> Setup {
    let mut board = Board::empty();
    for sq in setup.board.occupied() {
        if let Some(piece) = setup.board.piece_at(sq) {
            board.set_piece_at(
                sq.flip_vertical(),
                Piece {
                    color: !piece.color,
                    role: piece.role,
                },
            );
        }
    }
    Setup {
        board,
        turn: !setup.turn,
        ep_square: setup.ep_square.map(Square::flip_vertical),
        ..Setup::empty()
    }
}

/// The move counterpart of [`flip_colors`].
pub fn flip_move_colors(m: &Move) -> Move {
    match *m {
        Move::Normal {
            role,
            from,
            capture,
            to,
            promotion,
        } => Move::Normal {
            role,
            from: from.flip_vertical(),
            capture,
            to: to.flip_vertical(),
            promotion,
        },
        Move::EnPassant { from, to } => Move::EnPassant {
            from: from.flip_vertical(),
            to: to.flip_vertical(),
        },
        ref m => m.clone(),
    }
}

#[cfg(test)]
mod tests {
    use shakmaty::{Color, Role};

    use super::*;

    fn setup_with(pieces: &[(Square, Color, Role)]) -> Setup {
        let mut board = Board::empty();
        for &(sq, color, role) in pieces {
            board.set_piece_at(sq, Piece { color, role });
        }
        Setup {
            board,
            turn: Color::White,
            ..Setup::empty()
        }
    }

    #[test]
    fn test_no_pawns_canonical_is_fixed_point() {
        let mut setup = setup_with(&[
            (Square::B1, Color::White, Role::King),
            (Square::G7, Color::Black, Role::King),
            (Square::D5, Color::White, Role::Rook),
        ]);
        let inverse = Normalizer::NoPawns.normalize(&mut setup);
        assert!(inverse.is_identity());
        assert_eq!(setup.board.king_of(Color::White), Some(Square::B1));
    }

    #[test]
    fn test_no_pawns_king_lands_in_triangle() {
        let mut setup = setup_with(&[
            (Square::G7, Color::White, Role::King),
            (Square::B2, Color::Black, Role::King),
            (Square::E4, Color::White, Role::Queen),
        ]);
        Normalizer::NoPawns.normalize(&mut setup);
        let wk = setup.board.king_of(Color::White).expect("white king");
        assert!(u32::from(wk.rank()) < 4);
        assert!(u32::from(wk.file()) < 4);
        assert!(u32::from(wk.rank()) <= u32::from(wk.file()));
    }

    #[test]
    fn test_no_pawns_diagonal_tie_break() {
        let mut setup = setup_with(&[
            (Square::C3, Color::White, Role::King),
            (Square::B6, Color::Black, Role::King),
            (Square::H1, Color::White, Role::Rook),
        ]);
        Normalizer::NoPawns.normalize(&mut setup);
        let bk = setup.board.king_of(Color::Black).expect("black king");
        // Black king below or on the diagonal afterwards.
        assert!(u32::from(bk.rank()) <= u32::from(bk.file()));
    }

    #[test]
    fn test_inverse_map_reconstructs_original() {
        let original = setup_with(&[
            (Square::F6, Color::White, Role::King),
            (Square::A8, Color::Black, Role::King),
            (Square::C2, Color::White, Role::Rook),
        ]);
        let mut canonical = original.clone();
        let inverse = Normalizer::NoPawns.normalize(&mut canonical);
        let mut rebuilt = Board::empty();
        for sq in canonical.board.occupied() {
            if let Some(piece) = canonical.board.piece_at(sq) {
                rebuilt.set_piece_at(inverse.map(sq), piece);
            }
        }
        assert_eq!(rebuilt, original.board);
    }

    #[test]
    fn test_pawns_mirrors_ep_square() {
        let mut setup = setup_with(&[
            (Square::F1, Color::White, Role::King),
            (Square::A8, Color::Black, Role::King),
            (Square::G5, Color::White, Role::Pawn),
            (Square::H5, Color::Black, Role::Pawn),
        ]);
        setup.ep_square = Some(Square::H6);
        let inverse = Normalizer::Pawns.normalize(&mut setup);
        assert!(!inverse.is_identity());
        assert_eq!(setup.ep_square, Some(Square::A6));
        assert_eq!(
            setup.board.piece_at(Square::B5),
            Some(Color::White.pawn())
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut setup = setup_with(&[
            (Square::H8, Color::White, Role::King),
            (Square::C4, Color::Black, Role::King),
            (Square::A1, Color::White, Role::Knight),
        ]);
        Normalizer::NoPawns.normalize(&mut setup);
        let again = setup.clone();
        let inverse = Normalizer::NoPawns.normalize(&mut setup);
        assert!(inverse.is_identity());
        assert_eq!(setup.board, again.board);
    }

    #[test]
    fn test_flip_colors_round_trip() {
        let mut setup = setup_with(&[
            (Square::C2, Color::White, Role::King),
            (Square::E7, Color::Black, Role::King),
            (Square::D4, Color::Black, Role::Queen),
        ]);
        setup.turn = Color::Black;
        let flipped = flip_colors(&setup);
        assert_eq!(flipped.turn, Color::White);
        assert_eq!(
            flipped.board.piece_at(Square::D5),
            Some(Color::White.queen())
        );
        let back = flip_colors(&flipped);
        assert_eq!(back.board, setup.board);
        assert_eq!(back.turn, setup.turn);
    }
}
