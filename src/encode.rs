use shakmaty::{Move, Role};

use crate::{solve::SolvedTable, types::TableEntry};

/// The logical byte streams of one solved table, in index order, as handed
/// to the external compression codec. No compression happens here.
pub struct Artifacts {
    /// Two bits per entry, least significant bits first: 0 draw, 1 win,
    /// 2 loss. The white block is followed by the black block; symmetric
    /// tables have a single block. Unreachable indices read as draws.
    pub wdl: Vec<u8>,
    /// One distance-to-zero byte per white entry.
    pub dtz: Vec<u8>,
    /// Bits needed for the largest distance in [`Artifacts::dtz`].
    pub dtz_bits: u8,
    /// One 16-bit big-endian move code per entry, white block then black.
    pub moves: Vec<u8>,
}

/// Flattens a solved table into its codec-boundary streams.
pub fn artifacts(solved: &SolvedTable) -> Artifacts {
    let entries = || solved.white.iter().chain(solved.black.iter().flatten());

    let mut wdl = BitWriter::default();
    for entry in entries() {
        wdl.push2(entry.as_ref().map_or(0, |e| e.outcome as u8));
    }

    let mut max_dtz = 0u8;
    let mut dtz = Vec::with_capacity(solved.white.len());
    for entry in &solved.white {
        let value = entry.as_ref().map_or(0, |e| e.dtz);
        max_dtz = max_dtz.max(value);
        dtz.push(value);
    }

    let mut moves = Vec::with_capacity(2 * solved.white.len());
    for entry in entries() {
        let code = entry.as_ref().map_or(0, move_code);
        moves.extend_from_slice(&code.to_be_bytes());
    }

    Artifacts {
        wdl: wdl.finish(),
        dtz,
        dtz_bits: bit_width(max_dtz),
        moves,
    }
}

fn bit_width(max: u8) -> u8 {
    (8 - max.leading_zeros()).max(1) as u8
}

/// Move code layout, high to low: has-move flag, promotion flag, promotion
/// role, origin square, target square. Zero means no move is stored.
fn move_code(entry: &TableEntry) -> u16 {
    let (from, to, promotion) = match entry.best {
        Some(Move::Normal {
            from, to, promotion, ..
        }) => (from, to, promotion),
        Some(Move::EnPassant { from, to }) => (from, to, None),
        _ => return 0,
    };
    let mut code = (1 << 15) | ((u32::from(from) as u16) << 6) | u32::from(to) as u16;
    if let Some(role) = promotion {
        code |= (1 << 14) | (promotion_code(role) << 12);
    }
    code
}

fn promotion_code(role: Role) -> u16 {
    match role {
        Role::Knight => 0,
        Role::Bishop => 1,
        Role::Rook => 2,
        _ => 3,
    }
}

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    buffer: u8,
    filled: u8,
}

impl BitWriter {
    fn push2(&mut self, value: u8) {
        self.buffer |= (value & 3) << self.filled;
        self.filled += 2;
        if self.filled == 8 {
            self.out.push(self.buffer);
            self.buffer = 0;
            self.filled = 0;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.out.push(self.buffer);
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use shakmaty::{Chess, Square};

    use crate::{material::Material, types::Outcome};

    use super::*;

    fn entry(outcome: Outcome, dtz: u8, best: Option<Move>) -> Option<TableEntry> {
        let mut entry = TableEntry::new(0, Chess::default());
        entry.resolve(outcome, dtz, best);
        Some(entry)
    }

    fn rook_move() -> Move {
        Move::Normal {
            role: Role::Rook,
            from: Square::A1,
            capture: None,
            to: Square::A8,
            promotion: None,
        }
    }

    fn table(white: Vec<Option<TableEntry>>, black: Option<Vec<Option<TableEntry>>>) -> SolvedTable {
        SolvedTable {
            material: Material::from_str("KR-K").expect("valid signature"),
            max_index: white.len() as u32,
            white,
            black,
        }
    }

    #[test]
    fn test_wdl_packs_two_bits_lsb_first() {
        let white = vec![
            entry(Outcome::Win, 1, None),
            entry(Outcome::Loss, 2, None),
            None,
            entry(Outcome::Draw, 0, None),
        ];
        let artifacts = artifacts(&table(white, None));
        // win=01, loss=10, missing=00, draw=00 from the low bits up.
        assert_eq!(artifacts.wdl, vec![0b0000_1001]);
    }

    #[test]
    fn test_wdl_black_block_continues_bit_stream() {
        let white = vec![entry(Outcome::Win, 1, None)];
        let black = vec![entry(Outcome::Loss, 2, None)];
        let artifacts = artifacts(&table(white, Some(black)));
        assert_eq!(artifacts.wdl, vec![0b0000_1001]);
    }

    #[test]
    fn test_dtz_bits_cover_maximum() {
        let white = vec![entry(Outcome::Win, 33, None), entry(Outcome::Win, 2, None)];
        let artifacts = artifacts(&table(white, None));
        assert_eq!(artifacts.dtz, vec![33, 2]);
        assert_eq!(artifacts.dtz_bits, 6);
    }

    #[test]
    fn test_dtz_bits_at_least_one() {
        let artifacts = artifacts(&table(vec![None], None));
        assert_eq!(artifacts.dtz_bits, 1);
    }

    #[test]
    fn test_move_code_round_trippable_fields() {
        let white = vec![entry(Outcome::Win, 1, Some(rook_move()))];
        let artifacts = artifacts(&table(white, None));
        let code = u16::from_be_bytes([artifacts.moves[0], artifacts.moves[1]]);
        assert_ne!(code & (1 << 15), 0);
        assert_eq!(code & (1 << 14), 0);
        assert_eq!((code >> 6) & 0x3f, u32::from(Square::A1) as u16);
        assert_eq!(code & 0x3f, u32::from(Square::A8) as u16);
    }

    #[test]
    fn test_move_code_zero_without_move() {
        let white = vec![entry(Outcome::Draw, 0, None)];
        let artifacts = artifacts(&table(white, None));
        assert_eq!(&artifacts.moves, &[0, 0]);
    }
}
