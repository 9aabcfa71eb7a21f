//! Chat side-channel.
//!
//! The bots narrate the stall state machine here. Messages are observable
//! but never authoritative; the stall records are the source of truth.

use std::time::{SystemTime, UNIX_EPOCH};

use bughouse_core::PieceKind;
use shared::{ChatLine, Seat, StallScenario};

/// Milliseconds since the epoch, for chat timestamps.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Uppercase piece letter as it appears in chat ("N mates in 3").
fn label(piece: PieceKind) -> char {
    piece.letter().to_ascii_uppercase()
}

/// The line a bot posts when it starts sitting.
pub fn scenario_text(
    piece: Option<PieceKind>,
    scenario: StallScenario,
    mate_distance: Option<i32>,
) -> String {
    match scenario {
        StallScenario::ForcesMate => match (piece, mate_distance) {
            (Some(p), Some(n)) => format!("{} mates in {}", label(p), n),
            (Some(p), None) => format!("{} forces mate", label(p)),
            _ => "mate is in hand".to_string(),
        },
        StallScenario::SavesFromMate | StallScenario::SavesMateIn1 => match piece {
            Some(p) => format!("{} helps me survive", label(p)),
            None => "help me survive".to_string(),
        },
        StallScenario::LostToWinning => match piece {
            Some(p) => format!("{} saves my position", label(p)),
            None => "a piece saves my position".to_string(),
        },
        StallScenario::Mated => "I am mated".to_string(),
        StallScenario::PlayerCommand => "Okay, I sit".to_string(),
    }
}

pub const THANKS: &str = "Thanks :)";
pub const I_GO: &str = "I go";
pub const WILL_TRY: &str = "I will try.";

/// In-memory chat log; persistence happens off the event stream.
#[derive(Debug, Default)]
pub struct ChatLog {
    lines: Vec<ChatLine>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, sender: Seat, text: impl Into<String>) -> ChatLine {
        let line = ChatLine {
            sender,
            text: text.into(),
            timestamp_ms: now_ms(),
        };
        self.lines.push(line.clone());
        line
    }

    pub fn lines(&self) -> &[ChatLine] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_lines_name_the_piece() {
        assert_eq!(
            scenario_text(Some(PieceKind::Pawn), StallScenario::ForcesMate, Some(2)),
            "P mates in 2"
        );
        assert_eq!(
            scenario_text(Some(PieceKind::Knight), StallScenario::SavesFromMate, None),
            "N helps me survive"
        );
        assert_eq!(
            scenario_text(Some(PieceKind::Bishop), StallScenario::LostToWinning, None),
            "B saves my position"
        );
        assert_eq!(
            scenario_text(Some(PieceKind::Queen), StallScenario::Mated, Some(1)),
            "I am mated"
        );
    }

    #[test]
    fn log_keeps_insertion_order() {
        let mut log = ChatLog::new();
        log.post(Seat::Bot1, "first");
        log.post(Seat::Partner, "second");
        assert_eq!(log.lines().len(), 2);
        assert_eq!(log.lines()[0].text, "first");
        assert_eq!(log.lines()[1].sender, Seat::Partner);
    }
}
