//! Orchestrator configuration.
//!
//! Everything tunable in one place: engine paths, pool bounds, search
//! budgets, the stall probability table, and the request-bias mode. The
//! backend binary fills this from environment variables; tests build it
//! directly with the knobs they need.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bughouse_core::PieceKind;
use shared::StallScenario;

/// Which forcing-line implementation the request-biasing step uses when the
/// searchmoves restriction finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasMode {
    /// Load a variant where the requested piece type is pseudo-royal.
    RoyalPiece,
    /// Load a variant where the requested piece's value is near-infinite.
    HighValue,
    /// Multi-PV search preferring lines that close the Manhattan distance
    /// to a target square.
    Proximity,
}

/// Bounds for the shared engine pool.
#[derive(Debug, Clone)]
pub struct PoolLimits {
    /// Hard cap on live engine processes.
    pub max_engines: usize,
    /// Engines kept warm through reaping.
    pub warm_floor: usize,
    /// How often the reaper wakes up.
    pub reap_interval: Duration,
    /// Idle age beyond which an engine is shut down.
    pub idle_cutoff: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        PoolLimits {
            max_engines: 8,
            warm_floor: 3,
            reap_interval: Duration::from_secs(300),
            idle_cutoff: Duration::from_secs(600),
        }
    }
}

/// Stall probabilities by piece and scenario. Missing cells are zero;
/// saving a literal mate-in-1 is always certain, as are the non-evaluated
/// scenarios (mated, player command), which gate on time alone.
#[derive(Debug, Clone)]
pub struct StallTable {
    /// Indexed by `PieceKind::held_index()`: p, n, b, r, q.
    pub forces_mate: [f64; 5],
    pub saves_from_mate: [f64; 5],
    pub lost_to_winning: [f64; 5],
}

impl Default for StallTable {
    fn default() -> Self {
        StallTable {
            forces_mate: [0.98, 0.95, 0.95, 0.95, 0.95],
            saves_from_mate: [0.90, 0.70, 0.70, 0.33, 0.25],
            lost_to_winning: [0.60, 0.50, 0.50, 0.0, 0.0],
        }
    }
}

impl StallTable {
    pub fn probability(&self, piece: PieceKind, scenario: StallScenario) -> f64 {
        let Some(i) = piece.held_index() else {
            return 0.0;
        };
        match scenario {
            StallScenario::ForcesMate => self.forces_mate[i],
            StallScenario::SavesFromMate => self.saves_from_mate[i],
            StallScenario::LostToWinning => self.lost_to_winning[i],
            StallScenario::SavesMateIn1 => 1.0,
            StallScenario::Mated => 1.0,
            StallScenario::PlayerCommand => 1.0,
        }
    }

    /// A table that always stalls, handy in tests.
    pub fn always() -> Self {
        StallTable {
            forces_mate: [1.0; 5],
            saves_from_mate: [1.0; 5],
            lost_to_winning: [1.0; 5],
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Path to the variant-aware UCI engine binary.
    pub engine_path: String,
    /// Variant declarations file passed to every engine.
    pub variant_file: PathBuf,
    pub pool: PoolLimits,

    /// `go movetime` budget for regular bot moves, in milliseconds.
    pub move_time_ms: u64,
    /// `go movetime` budget for the queen-drop checkmate probe.
    pub verify_move_time_ms: u64,
    /// `go depth` used for evaluations and hypothetical probes.
    pub eval_depth: u32,

    /// Mate distances above this are treated as positional wins.
    pub long_mate_cutoff: i32,
    /// Centipawn stand-in for a long mate.
    pub long_mate_sentinel_cp: i32,
    /// "Clearly losing" bound for the lost_to_winning scenario.
    pub losing_threshold_cp: i32,
    /// "Clearly winning" bound for the lost_to_winning scenario.
    pub winning_threshold_cp: i32,

    pub stall_table: StallTable,
    pub bias_mode: BiasMode,
    /// Multi-PV width for the proximity bias mode.
    pub proximity_multipv: u32,

    /// Starting time per player, seconds.
    pub initial_clock_s: f32,
    /// Delay between partner-board loop iterations.
    pub loop_delay: Duration,
    /// Delay before the teammate's "I will try." reply, seconds.
    pub ack_delay_s: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            engine_path: "fairy-stockfish".to_string(),
            variant_file: PathBuf::from("variants.ini"),
            pool: PoolLimits::default(),
            move_time_ms: 1000,
            verify_move_time_ms: 500,
            eval_depth: 12,
            long_mate_cutoff: 5,
            long_mate_sentinel_cp: 5000,
            losing_threshold_cp: 300,
            winning_threshold_cp: 200,
            stall_table: StallTable::default(),
            bias_mode: BiasMode::HighValue,
            proximity_multipv: 4,
            initial_clock_s: 300.0,
            loop_delay: Duration::from_millis(250),
            ack_delay_s: 1.5,
        }
    }
}

impl OrchestratorConfig {
    /// Read overrides from the environment, keeping defaults elsewhere.
    pub fn from_env() -> Self {
        let mut cfg = OrchestratorConfig::default();
        if let Ok(path) = std::env::var("ENGINE_PATH") {
            cfg.engine_path = path;
        }
        if let Ok(path) = std::env::var("VARIANT_FILE") {
            cfg.variant_file = PathBuf::from(path);
        }
        if let Ok(n) = std::env::var("ENGINE_POOL_SIZE") {
            if let Ok(n) = n.parse() {
                cfg.pool.max_engines = n;
            }
        }
        if let Ok(ms) = std::env::var("MOVE_TIME_MS") {
            if let Ok(ms) = ms.parse() {
                cfg.move_time_ms = ms;
            }
        }
        cfg
    }
}

/// The five droppable piece letters, for variant declaration names.
const VARIANT_PIECES: [char; 5] = ['p', 'n', 'b', 'r', 'q'];

/// Write the variant declarations file if it does not exist yet: the
/// baseline bughouse plus one ghost variant per piece and bias flavor, so
/// the biasing step only ever flips `UCI_Variant`.
pub fn ensure_variant_file(path: &Path) -> io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    let mut out = String::from(
        "# Variant declarations consumed via `setoption name VariantPath`.\n\
         # The ghost_* variants derive from bughouse and exist only to bias\n\
         # the search toward capturing one piece type.\n\n",
    );
    for p in VARIANT_PIECES {
        out.push_str(&format!(
            "[ghost_royal_{p}:bughouse]\nextinctionPieceTypes = {p}\n\n"
        ));
    }
    for p in VARIANT_PIECES {
        out.push_str(&format!(
            "[ghost_highvalue_{p}:bughouse]\ncapturePieceValue:{p} = 99999\n\n"
        ));
    }
    std::fs::write(path, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_the_pinned_values() {
        let t = StallTable::default();
        assert_eq!(t.probability(PieceKind::Pawn, StallScenario::ForcesMate), 0.98);
        assert_eq!(t.probability(PieceKind::Knight, StallScenario::ForcesMate), 0.95);
        assert_eq!(t.probability(PieceKind::Pawn, StallScenario::SavesFromMate), 0.90);
        assert_eq!(t.probability(PieceKind::Rook, StallScenario::SavesFromMate), 0.33);
        assert_eq!(t.probability(PieceKind::Queen, StallScenario::SavesFromMate), 0.25);
        assert_eq!(t.probability(PieceKind::Pawn, StallScenario::LostToWinning), 0.60);
        assert_eq!(t.probability(PieceKind::Rook, StallScenario::LostToWinning), 0.0);
        assert_eq!(t.probability(PieceKind::Queen, StallScenario::LostToWinning), 0.0);
    }

    #[test]
    fn certain_scenarios_ignore_the_table() {
        let t = StallTable::default();
        assert_eq!(t.probability(PieceKind::Rook, StallScenario::SavesMateIn1), 1.0);
        assert_eq!(t.probability(PieceKind::Queen, StallScenario::Mated), 1.0);
        assert_eq!(t.probability(PieceKind::Pawn, StallScenario::PlayerCommand), 1.0);
    }

    #[test]
    fn kings_never_stall() {
        let t = StallTable::default();
        assert_eq!(t.probability(PieceKind::King, StallScenario::ForcesMate), 0.0);
    }
}
