//! UCI engine connections.
//!
//! `UciTransport` drives a real engine subprocess over line-buffered pipes;
//! `ScriptedEngine` is a deterministic in-process stand-in with the same
//! surface. The orchestrator is generic over [`EngineLink`] so both plug in.
//!
//! Score conventions are exposed verbatim: `score cp N` is from White's
//! perspective, `score mate N` is from the side to move (positive: the side
//! to move mates in N). Normalizing to "our side" happens a layer up.

pub mod scripted;
pub mod transport;

use std::future::Future;

use thiserror::Error;

pub use scripted::ScriptedEngine;
pub use transport::UciTransport;

/// Errors on an engine connection. All of these are fatal for the handle
/// except where noted; malformed single lines are skipped, not surfaced.
#[derive(Debug, Error)]
pub enum UciError {
    #[error("failed to spawn engine {path}: {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },

    #[error("engine closed its pipe")]
    PipeClosed,

    #[error("i/o error talking to engine: {0}")]
    Io(#[from] std::io::Error),

    /// The expected trigger line never arrived within the wait budget.
    #[error("engine produced no '{trigger}' within {waited_ms} ms")]
    MissingTrigger { trigger: &'static str, waited_ms: u64 },

    /// A search finished without a single scored info line.
    #[error("engine returned no evaluation before bestmove")]
    NoEvaluation,

    /// The scripted engine ran out of programmed responses.
    #[error("scripted engine has no response for: {0}")]
    ScriptExhausted(String),
}

pub type UciResult<T> = Result<T, UciError>;

/// An engine score as reported on an `info` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns, White's perspective.
    Cp(i32),
    /// Mate distance, side-to-move perspective.
    Mate(i32),
}

/// The last search report before `bestmove`.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub depth: u32,
    pub score: Score,
    pub nodes: Option<u64>,
    pub time_ms: Option<u64>,
    pub pv: Vec<String>,
}

/// One principal variation from a Multi-PV search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchLine {
    pub multipv: u32,
    pub score: Score,
    pub pv: Vec<String>,
}

/// The command subset the orchestrator consumes. Exactly one outstanding
/// request at a time per connection; all methods complete the exchange
/// before returning.
pub trait EngineLink: Send + 'static {
    /// `setoption name N value V`, then sync on `readyok`.
    fn set_option(
        &mut self,
        name: &str,
        value: &str,
    ) -> impl Future<Output = UciResult<()>> + Send;

    /// `position fen F [moves ...]`, then sync on `readyok`.
    fn set_position(
        &mut self,
        fen: &str,
        moves: &[String],
    ) -> impl Future<Output = UciResult<()>> + Send;

    /// `go movetime T`; resolves to the bestmove, `None` for `0000`/`(none)`.
    fn best_move(
        &mut self,
        movetime_ms: u64,
    ) -> impl Future<Output = UciResult<Option<String>>> + Send;

    /// Like [`EngineLink::best_move`] with the search root restricted via
    /// `searchmoves`.
    fn best_move_restricted(
        &mut self,
        movetime_ms: u64,
        searchmoves: &[String],
    ) -> impl Future<Output = UciResult<Option<String>>> + Send;

    /// `go depth D`; resolves to the last scored info line.
    fn evaluate(&mut self, depth: u32) -> impl Future<Output = UciResult<Evaluation>> + Send;

    /// `go movetime T` under Multi-PV, resolving to the final line per
    /// PV index, ascending.
    fn best_lines(
        &mut self,
        movetime_ms: u64,
        multipv: u32,
    ) -> impl Future<Output = UciResult<Vec<SearchLine>>> + Send;

    /// `stop`, consuming the trailing bestmove.
    fn stop(&mut self) -> impl Future<Output = UciResult<()>> + Send;

    /// `quit` with a short grace window, then force-kill.
    fn shutdown(&mut self) -> impl Future<Output = UciResult<()>> + Send;
}

/// Parsed fields of interest from one `info` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoLine {
    pub depth: Option<u32>,
    pub multipv: u32,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub time_ms: Option<u64>,
    pub pv: Vec<String>,
}

/// Parse an `info` line. Returns `None` for lines that are not info
/// reports; individual malformed fields are skipped rather than failing
/// the whole line.
pub fn parse_info(line: &str) -> Option<InfoLine> {
    let mut tokens = line.split_whitespace().peekable();
    if tokens.next()? != "info" {
        return None;
    }
    let mut info = InfoLine {
        multipv: 1,
        ..InfoLine::default()
    };
    while let Some(tok) = tokens.next() {
        match tok {
            "depth" => info.depth = tokens.next().and_then(|s| s.parse().ok()),
            "multipv" => {
                info.multipv = tokens.next().and_then(|s| s.parse().ok()).unwrap_or(1)
            }
            "nodes" => info.nodes = tokens.next().and_then(|s| s.parse().ok()),
            "time" => info.time_ms = tokens.next().and_then(|s| s.parse().ok()),
            "score" => match tokens.next() {
                Some("cp") => {
                    info.score = tokens.next().and_then(|s| s.parse().ok()).map(Score::Cp)
                }
                Some("mate") => {
                    info.score = tokens.next().and_then(|s| s.parse().ok()).map(Score::Mate)
                }
                _ => {}
            },
            "pv" => {
                info.pv = tokens.map(str::to_string).collect();
                break;
            }
            _ => {}
        }
    }
    Some(info)
}

/// Parse a `bestmove` line. Outer `None`: not a bestmove line. Inner
/// `None`: the engine reported no move (`0000` or `(none)`).
pub fn parse_bestmove(line: &str) -> Option<Option<String>> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "bestmove" {
        return None;
    }
    match tokens.next() {
        None | Some("0000") | Some("(none)") => Some(None),
        Some(mv) => Some(Some(mv.to_string())),
    }
}
