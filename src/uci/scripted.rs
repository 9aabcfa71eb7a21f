//! Deterministic in-process engine.
//!
//! Answers the same surface as the child-process transport but from
//! programmed responses keyed by the exact position FEN (with a FIFO queue
//! and defaults as fallbacks). Used by the scenario tests, where real
//! engine output would make stall decisions unreproducible.

use std::collections::{HashMap, VecDeque};

use super::{Evaluation, Score, SearchLine, UciError, UciResult};

/// A scriptable [`super::EngineLink`] implementation.
#[derive(Debug)]
pub struct ScriptedEngine {
    /// Evaluation scores consulted by exact FEN; `default_score` otherwise.
    scores: HashMap<String, Score>,
    default_score: Score,
    /// Best moves by exact FEN (value `None` models `bestmove 0000`).
    moves_by_fen: HashMap<String, Option<String>>,
    /// Fallback best moves, consumed in order.
    move_queue: VecDeque<Option<String>>,
    /// Last-resort best move; absent means a lookup miss is an error.
    default_move: Option<Option<String>>,
    /// Multi-PV lines by exact FEN.
    lines_by_fen: HashMap<String, Vec<SearchLine>>,

    position: String,
    /// Every command received, newest last, for assertions.
    pub sent: Vec<String>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        ScriptedEngine {
            scores: HashMap::new(),
            default_score: Score::Cp(0),
            moves_by_fen: HashMap::new(),
            move_queue: VecDeque::new(),
            default_move: None,
            lines_by_fen: HashMap::new(),
            position: String::new(),
            sent: Vec::new(),
        }
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_move(mut self, mv: &str) -> Self {
        self.default_move = Some(Some(mv.to_string()));
        self
    }

    pub fn with_default_score(mut self, score: Score) -> Self {
        self.default_score = score;
        self
    }

    /// Program the evaluation for one exact position.
    pub fn score_for(&mut self, fen: &str, score: Score) {
        self.scores.insert(fen.to_string(), score);
    }

    /// Program the best move for one exact position; `None` models a
    /// position with no move (`bestmove 0000`).
    pub fn move_for(&mut self, fen: &str, mv: Option<&str>) {
        self.moves_by_fen
            .insert(fen.to_string(), mv.map(str::to_string));
    }

    /// Queue a best move consumed when no FEN-keyed move matches.
    pub fn queue_move(&mut self, mv: Option<&str>) {
        self.move_queue.push_back(mv.map(str::to_string));
    }

    pub fn lines_for(&mut self, fen: &str, lines: Vec<SearchLine>) {
        self.lines_by_fen.insert(fen.to_string(), lines);
    }

    /// The FEN most recently sent with `set_position`.
    pub fn position(&self) -> &str {
        &self.position
    }

    fn next_move(&mut self) -> UciResult<Option<String>> {
        if let Some(mv) = self.moves_by_fen.get(&self.position) {
            return Ok(mv.clone());
        }
        if let Some(mv) = self.move_queue.pop_front() {
            return Ok(mv);
        }
        self.default_move
            .clone()
            .ok_or_else(|| UciError::ScriptExhausted(self.position.clone()))
    }
}

impl super::EngineLink for ScriptedEngine {
    async fn set_option(&mut self, name: &str, value: &str) -> UciResult<()> {
        self.sent.push(format!("setoption name {} value {}", name, value));
        Ok(())
    }

    async fn set_position(&mut self, fen: &str, moves: &[String]) -> UciResult<()> {
        let mut command = format!("position fen {}", fen);
        if !moves.is_empty() {
            command.push_str(" moves ");
            command.push_str(&moves.join(" "));
        }
        self.sent.push(command);
        self.position = fen.to_string();
        Ok(())
    }

    async fn best_move(&mut self, movetime_ms: u64) -> UciResult<Option<String>> {
        self.sent.push(format!("go movetime {}", movetime_ms));
        self.next_move()
    }

    async fn best_move_restricted(
        &mut self,
        movetime_ms: u64,
        searchmoves: &[String],
    ) -> UciResult<Option<String>> {
        self.sent.push(format!(
            "go movetime {} searchmoves {}",
            movetime_ms,
            searchmoves.join(" ")
        ));
        self.next_move()
    }

    async fn evaluate(&mut self, depth: u32) -> UciResult<Evaluation> {
        self.sent.push(format!("go depth {}", depth));
        let score = self
            .scores
            .get(&self.position)
            .copied()
            .unwrap_or(self.default_score);
        Ok(Evaluation {
            depth,
            score,
            nodes: None,
            time_ms: None,
            pv: Vec::new(),
        })
    }

    async fn best_lines(&mut self, movetime_ms: u64, _multipv: u32) -> UciResult<Vec<SearchLine>> {
        self.sent.push(format!("go movetime {} (multipv)", movetime_ms));
        Ok(self
            .lines_by_fen
            .get(&self.position)
            .cloned()
            .unwrap_or_default())
    }

    async fn stop(&mut self) -> UciResult<()> {
        self.sent.push("stop".to_string());
        Ok(())
    }

    async fn shutdown(&mut self) -> UciResult<()> {
        self.sent.push("quit".to_string());
        Ok(())
    }
}
