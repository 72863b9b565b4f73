use rustc_hash::FxHashSet;
use shakmaty::Role;

use crate::{
    errors::{SolveError, SolveResult},
    material::Material,
};

/// Pieces a pawn may promote to.
pub const PROMOTION_ROLES: [Role; 4] = [Role::Knight, Role::Bishop, Role::Rook, Role::Queen];

/// The colourless keys of every table that must be solved before
/// `material`: each signature reachable by one capture, one promotion, or
/// a promotion that captures. Signatures that are trivially drawn never
/// need a table and are left out.
pub fn dependencies(material: &Material) -> FxHashSet<Material> {
    let mut result = FxHashSet::default();
    let mut add = |m: Material| {
        if !m.is_trivially_drawn() {
            result.insert(m.normalized());
        }
    };

    for piece in material.piece_list() {
        let mut removed = material.clone();
        removed.remove(piece);
        add(removed.clone());

        if piece.role == Role::Pawn {
            for role in PROMOTION_ROLES {
                let mut promoted = removed.clone();
                promoted.add(role.of(piece.color));
                add(promoted.clone());
                // The promoting pawn may capture on the last rank.
                for target in material.piece_list() {
                    if target.color != piece.color {
                        let mut captured = promoted.clone();
                        captured.remove(target);
                        add(captured);
                    }
                }
            }
        }
    }
    result
}

/// The three piece signatures worth a table. A lone minor piece cannot
/// mate.
pub fn all_three_piece() -> Vec<Material> {
    [Role::Rook, Role::Queen, Role::Pawn]
        .into_iter()
        .map(|role| Material::from_roles(&[role], &[]))
        .collect()
}

/// The four piece signatures: one piece each side with the weaker piece
/// black (pawn imbalances listed from white's side), and every pair of
/// white pieces against a bare king.
pub fn all_four_piece() -> Vec<Material> {
    let mut result = Vec::new();
    let pairs: [(Role, &[Role]); 3] = [
        (Role::Rook, &[Role::Knight, Role::Bishop, Role::Rook]),
        (
            Role::Queen,
            &[Role::Knight, Role::Bishop, Role::Rook, Role::Queen],
        ),
        (
            Role::Pawn,
            &[Role::Pawn, Role::Knight, Role::Bishop, Role::Rook, Role::Queen],
        ),
    ];
    for (white, blacks) in pairs {
        for &black in blacks {
            result.push(Material::from_roles(&[white], &[black]));
        }
    }

    let order = [Role::Pawn, Role::Knight, Role::Bishop, Role::Rook, Role::Queen];
    for (i, &first) in order.iter().enumerate() {
        for &second in &order[..=i] {
            result.push(Material::from_roles(&[first, second], &[]));
        }
    }
    result
}

pub fn all_signatures() -> Vec<Material> {
    let mut all = all_three_piece();
    all.extend(all_four_piece());
    all
}

/// Orders signatures so that every table comes after all of its
/// dependencies, by repeatedly taking the ready ones. Fails if the given
/// set does not contain some prerequisite.
pub fn solve_order(universe: &[Material]) -> SolveResult<Vec<Material>> {
    let mut remaining = universe.to_vec();
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut covered: FxHashSet<Material> = FxHashSet::default();
    loop {
        let (ready, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|m| dependencies(m).iter().all(|dep| covered.contains(dep)));
        if ready.is_empty() {
            if rest.is_empty() {
                return Ok(ordered);
            }
            return Err(SolveError::NoSolveOrder { remaining: rest });
        }
        for m in &ready {
            covered.insert(m.normalized());
        }
        ordered.extend(ready);
        remaining = rest;
    }
}
