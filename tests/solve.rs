use shakmaty::{fen::Fen, CastlingMode, Chess, Position};
use shakmaty_tablegen::{LookupTable, Material, Outcome, Tablebase, MAX_DTZ};

fn material(s: &str) -> Material {
    Material::from_str(s).expect("valid signature")
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pos(fen: &str) -> Chess {
    fen.parse::<Fen>()
        .expect("valid fen")
        .into_position(CastlingMode::Standard)
        .expect("legal position")
}

#[test]
fn test_solve_kr_k() {
    init_logging();
    let mut tables = Tablebase::new();
    let solved = tables.solve(&material("KR-K")).expect("solvable");

    for entry in solved
        .white
        .iter()
        .chain(solved.black.iter().flatten())
        .flatten()
    {
        assert_ne!(entry.outcome, Outcome::Unknown);
        assert!(entry.dtz < MAX_DTZ);
    }

    // Ra8 is mate.
    let entry = tables
        .probe(&pos("7k/8/6K1/8/8/8/8/R7 w - - 0 1"))
        .expect("in table");
    assert_eq!(entry.outcome, Outcome::Win);
    assert_eq!(entry.dtz, 1);

    // Stalemate.
    let entry = tables
        .probe(&pos("k7/1R6/1K6/8/8/8/8/8 b - - 0 1"))
        .expect("in table");
    assert_eq!(entry.outcome, Outcome::Draw);
    assert_eq!(entry.dtz, 0);

    // The longest rook mate takes around sixteen moves.
    let longest = solved
        .white
        .iter()
        .flatten()
        .filter(|entry| entry.outcome == Outcome::Win)
        .map(|entry| entry.dtz)
        .max()
        .expect("wins exist");
    assert!(longest > 20 && longest < MAX_DTZ);
}

#[test]
fn test_kq_k_mates_faster_than_kr_k() {
    init_logging();
    let mut tables = Tablebase::new();
    let queen = tables.solve(&material("KQ-K")).expect("solvable");
    let rook = tables.solve(&material("KR-K")).expect("solvable");

    let longest = |solved: &shakmaty_tablegen::SolvedTable| {
        solved
            .white
            .iter()
            .flatten()
            .filter(|entry| entry.outcome == Outcome::Win)
            .map(|entry| entry.dtz)
            .max()
            .expect("wins exist")
    };
    assert!(longest(&queen) < longest(&rook));

    // Qa8 is mate.
    let entry = tables
        .probe(&pos("7k/8/6K1/8/8/8/8/Q7 w - - 0 1"))
        .expect("in table");
    assert_eq!(entry.outcome, Outcome::Win);
    assert_eq!(entry.dtz, 1);
}

#[test]
fn test_solve_kr_kr_symmetric() {
    init_logging();
    let mut tables = Tablebase::new();
    let solved = tables.solve(&material("KR-KR")).expect("solvable");
    assert!(solved.is_symmetric());
    for entry in solved.white.iter().flatten() {
        assert_ne!(entry.outcome, Outcome::Unknown);
    }

    // The rook on a8 hangs to Rxa8, a zeroing move into a won table.
    let hanging = pos("r3k3/8/8/8/R7/8/8/4K3 w - - 0 1");
    let entry = tables.probe(&hanging).expect("in table");
    assert_eq!(entry.outcome, Outcome::Win);
    assert_eq!(entry.dtz, 0);

    // The colour-exchanged position reads the same array through the flip.
    let flipped = pos("4k3/8/8/r7/8/8/8/R3K3 b - - 0 1");
    assert_eq!(tables.probe(&flipped).expect("in table"), entry);

    // Mutually defended rooks trade off into a bare-kings draw.
    let balanced = pos("8/8/4k3/4r3/4R3/4K3/8/8 w - - 0 1");
    let entry = tables.probe(&balanced).expect("in table");
    assert_eq!(entry.outcome, Outcome::Draw);
}

#[test]
fn test_solve_kp_kp_en_passant() {
    init_logging();
    let mut tables = Tablebase::new();
    tables.ensure(&material("KP-KP")).expect("solvable");

    // dxc6 en passant removes the black pawn before it can run.
    let entry = tables
        .probe(&pos("8/8/8/2pP4/8/8/k6K/8 w - c6 0 1"))
        .expect("in table");
    assert_eq!(entry.outcome, Outcome::Win);
    assert_eq!(entry.dtz, 0);

    // Without the en passant right both pawns promote.
    let entry = tables
        .probe(&pos("8/8/8/2pP4/8/8/k6K/8 w - - 0 1"))
        .expect("in table");
    assert_eq!(entry.outcome, Outcome::Draw);
}

#[test]
fn test_kp_k_pulls_in_promotion_tables() {
    init_logging();
    let mut tables = Tablebase::new();
    tables.ensure(&material("KP-K")).expect("solvable");

    // Promotions lead into the queen and rook tables; underpromotions to
    // minor pieces cannot force mate and need no table.
    assert!(tables.handle(&material("KQ-K")).is_some());
    assert!(tables.handle(&material("KR-K")).is_some());
    assert!(tables.handle(&material("KN-K")).is_none());

    // The king escorts the pawn through.
    let entry = tables
        .probe(&pos("4k3/4P3/4K3/8/8/8/8/8 w - - 0 1"))
        .expect("in table");
    assert_eq!(entry.outcome, Outcome::Win);

    // Stalemate in the corner.
    let entry = tables
        .probe(&pos("k7/P7/1K6/8/8/8/8/8 b - - 0 1"))
        .expect("in table");
    assert_eq!(entry.outcome, Outcome::Draw);
    assert_eq!(entry.dtz, 0);
}

#[test]
fn test_lookup_best_move_mates() {
    let mut tables = Tablebase::new();
    let solved = tables.solve(&material("KR-K")).expect("solvable");
    let lookup = LookupTable::from_solved(&solved).expect("supported");

    let position = pos("7k/8/6K1/8/8/8/8/R7 w - - 0 1");
    let entry = lookup.probe(&position).expect("in table");
    assert_eq!(entry.outcome, Outcome::Win);
    assert_eq!(entry.dtz, 1);

    let best = entry.best.expect("winning move stored");
    let mut after = position;
    after.play_unchecked(&best);
    assert!(after.is_checkmate());
}

#[test]
fn test_lookup_translates_swapped_orientation() {
    let mut tables = Tablebase::new();
    let solved = tables.solve(&material("KR-K")).expect("solvable");
    let lookup = LookupTable::from_solved(&solved).expect("supported");

    // Colour-flipped mate in one: the rook belongs to black.
    let position = pos("r7/8/8/8/8/6k1/8/7K b - - 0 1");
    let entry = lookup.probe(&position).expect("in table");
    assert_eq!(entry.outcome, Outcome::Win);
    assert_eq!(entry.dtz, 1);

    let best = entry.best.expect("winning move stored");
    assert!(position.is_legal(&best));
    let mut after = position;
    after.play_unchecked(&best);
    assert!(after.is_checkmate());
}

#[test]
fn test_lookup_rejects_foreign_material() {
    let mut tables = Tablebase::new();
    let solved = tables.solve(&material("KR-K")).expect("solvable");
    let lookup = LookupTable::from_solved(&solved).expect("supported");

    assert!(lookup
        .probe(&pos("7k/8/6K1/8/8/8/8/Q7 w - - 0 1"))
        .is_none());
}

#[test]
fn test_persisted_tables_are_reused() {
    let dir = std::env::temp_dir().join(format!("tablegen-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");

    let entry = {
        let mut tables = Tablebase::with_directory(&dir);
        tables.ensure(&material("KR-K")).expect("solvable");
        tables
            .probe(&pos("7k/8/6K1/8/8/8/8/R7 w - - 0 1"))
            .expect("in table")
    };

    let mut tables = Tablebase::new();
    let count = tables.add_directory(&dir).expect("readable");
    assert_eq!(count, 1);
    let reloaded = tables
        .probe(&pos("7k/8/6K1/8/8/8/8/R7 w - - 0 1"))
        .expect("in table");
    assert_eq!(reloaded, entry);

    std::fs::remove_dir_all(&dir).expect("cleanup");
}
