//! Error types for the position model.
//!
//! Rule violations are ordinary rejections returned to the caller; holdings
//! underflow is an invariant violation and is separated out so the layer
//! above can fail loudly instead of desynchronizing.

use thiserror::Error;

use crate::types::{Color, PieceKind};

/// Errors that can occur while mutating or parsing a position.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A normal move violates the rules.
    #[error("illegal move {notation}: {reason}")]
    IllegalMove { notation: String, reason: String },

    /// A drop violates the rules.
    #[error("illegal drop on {square}: {reason}")]
    IllegalDrop { square: String, reason: String },

    /// Square index outside 0..64.
    #[error("square index {0} out of range")]
    BadSquare(i8),

    /// Removing a piece that is not held. Indicates a bookkeeping bug.
    #[error("holdings underflow: no {piece:?} held for {color:?}")]
    HoldingsUnderflow { color: Color, piece: PieceKind },

    /// A king is never part of holdings.
    #[error("kings cannot be held or dropped")]
    KingInHoldings,

    /// Malformed FEN input.
    #[error("malformed FEN: {0}")]
    FenParse(String),
}

/// Result type alias for position-model operations.
pub type CoreResult<T> = Result<T, CoreError>;
