//! Seats, bot identities, stall records, game events, and the control-plane
//! request/response bodies.
//!
//! Everything here crosses a boundary: orchestrator -> relay, relay -> HTTP
//! client, or orchestrator -> persistence. Keep it serde-plain.

use bughouse_core::{Color, PieceKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four players around the table. The human and Bot1 share board A;
/// Partner and Bot2 share board B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    Human,
    Bot1,
    Partner,
    Bot2,
}

impl Seat {
    pub fn board(self) -> BoardId {
        match self {
            Seat::Human | Seat::Bot1 => BoardId::A,
            Seat::Partner | Seat::Bot2 => BoardId::B,
        }
    }

    /// The opponent across the team diamond whose clock governs the
    /// "up on time" predicate.
    pub fn diagonal(self) -> Seat {
        match self {
            Seat::Bot1 => Seat::Partner,
            Seat::Partner => Seat::Bot1,
            Seat::Bot2 => Seat::Human,
            Seat::Human => Seat::Bot2,
        }
    }
}

/// The three computer players. The human is never a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BotId {
    /// Opposes the human on board A.
    Bot1,
    /// The human's teammate on board B.
    Partner,
    /// Opposes Partner on board B.
    Bot2,
}

impl BotId {
    pub fn seat(self) -> Seat {
        match self {
            BotId::Bot1 => Seat::Bot1,
            BotId::Partner => Seat::Partner,
            BotId::Bot2 => Seat::Bot2,
        }
    }

    /// Whose captures fulfill this bot's partner-requests: Bot1 and Bot2
    /// serve each other, Partner is served by the human.
    pub fn request_partner(self) -> Seat {
        match self {
            BotId::Bot1 => Seat::Bot2,
            BotId::Bot2 => Seat::Bot1,
            BotId::Partner => Seat::Human,
        }
    }

    pub const ALL: [BotId; 3] = [BotId::Bot1, BotId::Partner, BotId::Bot2];
}

/// Which of the two boards, with its persisted numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardId {
    A,
    B,
}

impl BoardId {
    pub fn index(self) -> usize {
        match self {
            BoardId::A => 0,
            BoardId::B => 1,
        }
    }

    /// 1-based id used by the move log.
    pub fn db_id(self) -> i64 {
        match self {
            BoardId::A => 1,
            BoardId::B => 2,
        }
    }

    pub fn other(self) -> BoardId {
        match self {
            BoardId::A => BoardId::B,
            BoardId::B => BoardId::A,
        }
    }
}

/// Why a bot is sitting (or asked to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallScenario {
    /// A held piece would turn the position into a forced mate for us.
    ForcesMate,
    /// A held piece would lift a mate currently hanging over us.
    SavesFromMate,
    /// A held piece parries a literal mate-in-1.
    SavesMateIn1,
    /// A cheap piece flips a clearly lost position to a winning one.
    LostToWinning,
    /// We are mated and nothing in hand would save us.
    Mated,
    /// The human told the partner to sit.
    PlayerCommand,
}

/// A bot's active decision to sit. Player-commanded stalls carry no
/// requested piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallRecord {
    pub piece: Option<PieceKind>,
    pub reason: StallScenario,
    pub player_induced: bool,
}

/// A teammate-directed hint that capturing a particular piece would be
/// especially valuable, stored on the bot expected to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRequest {
    pub piece: PieceKind,
    pub reason: StallScenario,
    pub requested_by: BotId,
}

/// Whether a captured piece satisfies a requested one. Substitutes with
/// equivalent strategic effect are accepted: a queen covers everything a
/// bishop or rook would do, and a bishop stands in for a pawn-shaped ask.
pub fn fulfills(requested: PieceKind, captured: PieceKind) -> bool {
    use PieceKind::*;
    match requested {
        Pawn => matches!(captured, Pawn | Bishop | Queen),
        Knight => captured == Knight,
        Bishop => matches!(captured, Bishop | Queen),
        Rook => matches!(captured, Rook | Queen),
        Queen => captured == Queen,
        King => false,
    }
}

/// Game lifecycle from the human's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    NotStarted,
    InProgress,
    PlayerWon,
    PlayerLost,
    PartnerWon,
    PartnerLost,
    Draw,
    /// Aborted by an invariant violation or shutdown.
    Finished,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        !matches!(self, GameStatus::NotStarted | GameStatus::InProgress)
    }
}

/// One chat line. Observable but not authoritative; stall state is the
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    pub sender: Seat,
    pub text: String,
    pub timestamp_ms: u64,
}

/// Events the controller publishes after each committed step, consumed in
/// order by the session layer for persistence and relaying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    MoveApplied {
        board: BoardId,
        ply: u32,
        notation: String,
        by: Seat,
        annotation: Option<String>,
    },
    CaptureDelivered {
        from_board: BoardId,
        piece: PieceKind,
        color: Color,
    },
    RequestFulfilled {
        bot: BotId,
        piece: PieceKind,
    },
    ChatPosted(ChatLine),
    StatusChanged(GameStatus),
}

// --- control-plane bodies ---------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub human_color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub game_id: Uuid,
    pub state: GameStateBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateBody {
    pub board_a_fen: String,
    pub board_b_fen: String,
    pub status: GameStatus,
    pub clocks_s: [f32; 4],
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: Uuid,
    pub status: GameStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: String,
    pub to: String,
    pub promotion: Option<PieceKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropRequest {
    pub square: String,
    pub piece: PieceKind,
}

/// Replace one board with an arbitrary (bughouse) FEN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadPositionRequest {
    pub board: BoardId,
    pub fen: String,
}

/// One-off engine consultation for an arbitrary position, outside any game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub fen: String,
    pub movetime_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// `None` when the engine reports no move for the position.
    pub best_move: Option<String>,
}

/// Explicit player instructions to the partner bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerCommand {
    Go,
    Sit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: PlayerCommand,
}

/// Machine-readable error categories surfaced by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MalformedInput,
    EngineUnavailable,
    IllegalAction,
    GameOver,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}
