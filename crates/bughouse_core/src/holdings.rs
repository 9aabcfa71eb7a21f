//! Per-color piece pools.
//!
//! A mapping {pawn, knight, bishop, rook, queen} -> count, kept separately
//! for white and black. Kings are never held. The FEN fragment lists white's
//! pieces first in uppercase, then black's in lowercase, each in the fixed
//! order Q, R, B, N, P.

use serde::{Deserialize, Serialize};

use crate::types::{Color, PieceKind};

/// Emission order for the bracketed FEN segment.
const FEN_ORDER: [PieceKind; 5] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Pawn,
];

/// Droppable pieces held by each color on one board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    /// `counts[color][held_index]`.
    counts: [[u8; 5]; 2],
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of held pieces of one kind. Kings always report zero.
    #[inline]
    pub fn count(&self, color: Color, kind: PieceKind) -> u8 {
        match kind.held_index() {
            Some(i) => self.counts[color.index()][i],
            None => 0,
        }
    }

    /// Add one piece to a pool. Kings are silently ignored; they cannot be
    /// captured in normal play, so this only triggers on corrupt input.
    pub fn add(&mut self, color: Color, kind: PieceKind) {
        if let Some(i) = kind.held_index() {
            self.counts[color.index()][i] = self.counts[color.index()][i].saturating_add(1);
        }
    }

    /// Remove one piece from a pool. Returns false (and changes nothing)
    /// when the count is already zero.
    pub fn remove(&mut self, color: Color, kind: PieceKind) -> bool {
        match kind.held_index() {
            Some(i) if self.counts[color.index()][i] > 0 => {
                self.counts[color.index()][i] -= 1;
                true
            }
            _ => false,
        }
    }

    /// True when the given color holds nothing.
    pub fn is_empty(&self, color: Color) -> bool {
        self.counts[color.index()].iter().all(|&c| c == 0)
    }

    /// Total pieces held by one color.
    pub fn total(&self, color: Color) -> u32 {
        self.counts[color.index()].iter().map(|&c| c as u32).sum()
    }

    /// Iterate held (kind, count) pairs with nonzero count for one color.
    pub fn held(&self, color: Color) -> impl Iterator<Item = (PieceKind, u8)> + '_ {
        FEN_ORDER
            .iter()
            .filter_map(move |&kind| match self.count(color, kind) {
                0 => None,
                n => Some((kind, n)),
            })
    }

    /// The bracket interior of a bughouse FEN: white uppercase then black
    /// lowercase, each in Q,R,B,N,P order.
    pub fn fen_fragment(&self) -> String {
        let mut out = String::new();
        for &kind in &FEN_ORDER {
            for _ in 0..self.count(Color::White, kind) {
                out.push(kind.letter().to_ascii_uppercase());
            }
        }
        for &kind in &FEN_ORDER {
            for _ in 0..self.count(Color::Black, kind) {
                out.push(kind.letter());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_round_trips() {
        let mut h = Holdings::new();
        h.add(Color::White, PieceKind::Knight);
        assert_eq!(h.count(Color::White, PieceKind::Knight), 1);
        assert!(h.remove(Color::White, PieceKind::Knight));
        assert_eq!(h.count(Color::White, PieceKind::Knight), 0);
    }

    #[test]
    fn remove_from_empty_pool_fails_silently() {
        let mut h = Holdings::new();
        assert!(!h.remove(Color::Black, PieceKind::Queen), "nothing to remove");
        assert_eq!(h.count(Color::Black, PieceKind::Queen), 0);
    }

    #[test]
    fn kings_are_never_held() {
        let mut h = Holdings::new();
        h.add(Color::White, PieceKind::King);
        assert_eq!(h.count(Color::White, PieceKind::King), 0);
        assert!(h.is_empty(Color::White));
    }

    #[test]
    fn fen_fragment_orders_queen_first_white_before_black() {
        let mut h = Holdings::new();
        h.add(Color::Black, PieceKind::Pawn);
        h.add(Color::White, PieceKind::Pawn);
        h.add(Color::White, PieceKind::Queen);
        h.add(Color::Black, PieceKind::Rook);
        h.add(Color::White, PieceKind::Pawn);
        assert_eq!(h.fen_fragment(), "QPPrp");
    }

    #[test]
    fn fen_fragment_empty_when_nothing_held() {
        assert_eq!(Holdings::new().fen_fragment(), "");
    }
}
