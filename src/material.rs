use std::{cmp::Ordering, fmt};

use arrayvec::ArrayVec;
use shakmaty::{Board, ByColor, ByRole, Color, Piece, Role};

/// Non-king pieces of one side, at most three for the supported table sizes.
pub type PieceList = ArrayVec<Piece, 3>;

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct MaterialSide {
    by_role: ByRole<u8>,
}

impl MaterialSide {
    fn empty() -> MaterialSide {
        MaterialSide {
            by_role: ByRole::default(),
        }
    }

    fn from_str_part(s: &str) -> Result<MaterialSide, ()> {
        let mut side = MaterialSide::empty();
        for ch in s.as_bytes() {
            let role = Role::from_char(char::from(*ch)).ok_or(())?;
            *side.by_role.get_mut(role) += 1;
        }
        if side.by_role.king != 1 {
            return Err(());
        }
        Ok(side)
    }

    pub fn count(&self) -> usize {
        self.by_role.into_iter().map(usize::from).sum()
    }

    pub fn has_pawns(&self) -> bool {
        self.by_role.pawn > 0
    }

    fn count_role(&self, role: Role) -> u8 {
        *self.by_role.get(role)
    }

    fn is_trivial(&self) -> bool {
        self.by_role.queen == 0
            && self.by_role.rook == 0
            && self.by_role.pawn == 0
            && self.by_role.knight + self.by_role.bishop <= 1
    }
}

impl Ord for MaterialSide {
    fn cmp(&self, other: &MaterialSide) -> Ordering {
        self.count()
            .cmp(&other.count())
            .then_with(|| self.by_role.queen.cmp(&other.by_role.queen))
            .then_with(|| self.by_role.rook.cmp(&other.by_role.rook))
            .then_with(|| self.by_role.bishop.cmp(&other.by_role.bishop))
            .then_with(|| self.by_role.knight.cmp(&other.by_role.knight))
            .then_with(|| self.by_role.pawn.cmp(&other.by_role.pawn))
    }
}

impl PartialOrd for MaterialSide {
    fn partial_cmp(&self, other: &MaterialSide) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MaterialSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Piece letters in alphabetical order, kings included.
        for role in [Role::Bishop, Role::King, Role::Knight, Role::Pawn, Role::Queen, Role::Rook] {
            for _ in 0..self.count_role(role) {
                write!(f, "{}", role.upper_char())?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MaterialSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// A material signature like `KQ-KR`, the identity of one table.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Material {
    pub(crate) by_color: ByColor<MaterialSide>,
}

impl Material {
    fn empty() -> Material {
        Material {
            by_color: ByColor::new_with(|_| MaterialSide::empty()),
        }
    }

    /// Builds a signature from the non-king roles of each side. Kings are
    /// implied.
    pub fn from_roles(white: &[Role], black: &[Role]) -> Material {
        let mut material = Material::empty();
        material.add(Color::White.king());
        material.add(Color::Black.king());
        for &role in white {
            material.add(role.of(Color::White));
        }
        for &role in black {
            material.add(role.of(Color::Black));
        }
        material
    }

    pub(crate) fn add(&mut self, piece: Piece) {
        *self
            .by_color
            .get_mut(piece.color)
            .by_role
            .get_mut(piece.role) += 1;
    }

    pub(crate) fn remove(&mut self, piece: Piece) {
        *self
            .by_color
            .get_mut(piece.color)
            .by_role
            .get_mut(piece.role) -= 1;
    }

    /// Get the material signature of a [`Board`].
    pub fn from_board(board: &Board) -> Material {
        Material {
            by_color: ByColor::new_with(|color| MaterialSide {
                by_role: board.material_side(color),
            }),
        }
    }

    /// Parses a signature of the form `KQ-KR`. Each side must have exactly
    /// one king.
    pub fn from_str(s: &str) -> Result<Material, ()> {
        if s.len() > 9 {
            return Err(());
        }
        let (white, black) = s.split_once('-').ok_or(())?;
        Ok(Material {
            by_color: ByColor {
                white: MaterialSide::from_str_part(white)?,
                black: MaterialSide::from_str_part(black)?,
            },
        })
    }

    pub fn count(&self) -> usize {
        self.by_color.iter().map(|side| side.count()).sum()
    }

    pub fn is_symmetric(&self) -> bool {
        self.by_color.white == self.by_color.black
    }

    pub fn has_pawns(&self) -> bool {
        self.by_color.iter().any(|side| side.has_pawns())
    }

    pub fn side_has_pawns(&self, color: Color) -> bool {
        self.by_color.get(color).has_pawns()
    }

    pub fn count_piece(&self, piece: Piece) -> u8 {
        self.by_color.get(piece.color).count_role(piece.role)
    }

    /// The same signature with the sides exchanged.
    pub fn into_swapped(self) -> Material {
        Material {
            by_color: self.by_color.into_swapped(),
        }
    }

    /// The colourless key shared by a signature and its reverse: the
    /// stronger side plays white.
    pub fn normalized(&self) -> Material {
        if self.by_color.white >= self.by_color.black {
            self.clone()
        } else {
            self.clone().into_swapped()
        }
    }

    /// Neither side can ever force mate: at most one non-king piece per
    /// side, and only minor pieces.
    pub fn is_trivially_drawn(&self) -> bool {
        self.by_color.iter().all(|side| side.is_trivial())
    }

    /// Non-king pieces in table order: pawns first (white before black),
    /// then the rest from strongest to weakest.
    pub fn piece_list(&self) -> PieceList {
        let mut pieces = PieceList::new();
        for color in [Color::White, Color::Black] {
            for _ in 0..self.by_color.get(color).by_role.pawn {
                if pieces.try_push(color.pawn()).is_err() {
                    return pieces;
                }
            }
        }
        for color in [Color::White, Color::Black] {
            for role in [Role::Queen, Role::Rook, Role::Bishop, Role::Knight] {
                for _ in 0..self.by_color.get(color).count_role(role) {
                    if pieces.try_push(Piece { color, role }).is_err() {
                        return pieces;
                    }
                }
            }
        }
        pieces
    }

    pub fn non_king_count(&self) -> usize {
        self.count() - 2
    }
}

impl Ord for Material {
    fn cmp(&self, other: &Material) -> Ordering {
        self.by_color
            .white
            .cmp(&other.by_color.white)
            .then_with(|| self.by_color.black.cmp(&other.by_color.black))
    }
}

impl PartialOrd for Material {
    fn partial_cmp(&self, other: &Material) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.by_color.white, self.by_color.black)
    }
}

impl fmt::Debug for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}
