//! Error types for game orchestration.
//!
//! Rule violations are typed rejections handed back to the caller; engine
//! and pool failures carry their source; invariant violations are the
//! fail-loud class that aborts the game.

use thiserror::Error;

/// Errors that can occur while driving a game.
#[derive(Debug, Error)]
pub enum GameError {
    /// Move or drop rejected by the position model.
    #[error("illegal action: {0}")]
    Illegal(#[from] bughouse_core::CoreError),

    /// Action arrived while it is not the human's turn.
    #[error("not the player's turn")]
    NotPlayersTurn,

    /// Action arrived before initialize() or after game end.
    #[error("game is not in progress")]
    NotInProgress,

    /// The engine connection failed mid-request.
    #[error("engine unavailable: {0}")]
    Engine(#[from] crate::uci::UciError),

    /// The pool could not provide an engine.
    #[error("engine pool: {0}")]
    Pool(#[from] crate::pool::PoolError),

    /// A bookkeeping invariant broke. The game is stopped rather than
    /// allowed to desynchronize.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Result type alias for game operations.
pub type GameResult<T> = Result<T, GameError>;
