//! Move representation and UCI coordinate notation.
//!
//! Two variants: a normal from/to move (optionally promoting) and a drop of
//! a held piece onto an empty square. Drops use the `P@e4` notation shared
//! with variant-aware engines; normal moves use plain coordinates with a
//! trailing promotion letter (`e7e8q`).

use serde::{Deserialize, Serialize};

use crate::types::{parse_square, square_name, Color, PieceKind};

/// A move as entered or as produced by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    Normal {
        from: i8,
        to: i8,
        promotion: Option<PieceKind>,
    },
    Drop {
        to: i8,
        piece: PieceKind,
        color: Color,
    },
}

impl Move {
    /// Destination square of either variant.
    pub fn to(&self) -> i8 {
        match *self {
            Move::Normal { to, .. } => to,
            Move::Drop { to, .. } => to,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Move::Drop { .. })
    }

    /// UCI coordinate notation: `e2e4`, `e7e8q`, or `N@f3`.
    pub fn uci(&self) -> String {
        match *self {
            Move::Normal { from, to, promotion } => {
                let mut s = format!("{}{}", square_name(from), square_name(to));
                if let Some(p) = promotion {
                    s.push(p.letter());
                }
                s
            }
            Move::Drop { to, piece, .. } => {
                format!("{}@{}", piece.letter().to_ascii_uppercase(), square_name(to))
            }
        }
    }

    /// Parse UCI coordinate notation. Drop parses need the mover's color
    /// since the notation does not carry it.
    pub fn parse_uci(s: &str, mover: Color) -> Option<Move> {
        if let Some(at) = s.find('@') {
            let piece = PieceKind::from_letter(s[..at].chars().next()?)?;
            if piece == PieceKind::King {
                return None;
            }
            let to = parse_square(&s[at + 1..])?;
            return Some(Move::Drop { to, piece, color: mover });
        }
        if s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = parse_square(&s[0..2])?;
        let to = parse_square(&s[2..4])?;
        let promotion = match s.len() {
            5 => Some(PieceKind::from_letter(s.chars().nth(4)?)?),
            _ => None,
        };
        Some(Move::Normal { from, to, promotion })
    }
}

/// A committed move plus what it captured, as appended to a board's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub mv: Move,
    /// Color and kind of the piece removed from the grid, if any. Derived at
    /// apply time; drops never capture.
    pub captured: Option<(Color, PieceKind)>,
    /// Side that played the move.
    pub by: Color,
}
