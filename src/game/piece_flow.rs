//! Cross-board capture routing.
//!
//! Captured pieces do not change color: they arrive as reinforcements for
//! the same color on the partner's board. The coordinator keys on the last
//! processed history index per board, so re-running it after a commit can
//! never deliver a capture twice.

use bughouse_core::{Board, Color, PieceKind};
use shared::BoardId;

/// Total non-king men across a bughouse pair: two boards of 32 minus the
/// four kings. Captures move pieces between pools but never change this.
pub const EXPECTED_CENSUS: u32 = 60;

#[derive(Debug, Default)]
pub struct PieceFlow {
    last_routed: [usize; 2],
}

impl PieceFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route every not-yet-processed capture on `from` into the other
    /// board's same-color pool. Returns what was delivered, in order.
    pub fn route(&mut self, boards: &mut [Board; 2], from: BoardId) -> Vec<(Color, PieceKind)> {
        let idx = from.index();
        let other = from.other().index();
        let start = self.last_routed[idx];
        let end = boards[idx].history.len();
        debug_assert!(start <= end, "history never shrinks");

        let mut delivered = Vec::new();
        for i in start..end {
            let record = boards[idx].history[i];
            if record.mv.is_drop() {
                continue;
            }
            if let Some((color, kind)) = record.captured {
                boards[other].holdings.add(color, kind);
                delivered.push((color, kind));
            }
        }
        self.last_routed[idx] = end;
        delivered
    }

    /// Forget routing progress for one board after its position was
    /// replaced wholesale.
    pub fn reset_board(&mut self, board: BoardId) {
        self.last_routed[board.index()] = 0;
    }

    /// Sum of both boards' censuses; equals [`EXPECTED_CENSUS`] whenever
    /// routing is caught up.
    pub fn census_total(boards: &[Board; 2]) -> u32 {
        boards[0].census() + boards[1].census()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bughouse_core::types::parse_square;

    fn sq(name: &str) -> i8 {
        parse_square(name).expect("valid square")
    }

    fn fresh_pair() -> [Board; 2] {
        [Board::new(), Board::new()]
    }

    #[test]
    fn capture_lands_in_the_partner_pool_same_color() {
        let mut boards = fresh_pair();
        let mut flow = PieceFlow::new();
        boards[0].apply_normal(sq("e2"), sq("e4"), None).unwrap();
        boards[0].apply_normal(sq("d7"), sq("d5"), None).unwrap();
        boards[0].apply_normal(sq("e4"), sq("d5"), None).unwrap();

        let delivered = flow.route(&mut boards, BoardId::A);
        assert_eq!(delivered, vec![(Color::Black, PieceKind::Pawn)]);
        assert_eq!(boards[1].holdings.count(Color::Black, PieceKind::Pawn), 1);
        assert_eq!(boards[1].holdings.count(Color::White, PieceKind::Pawn), 0);
        assert_eq!(boards[0].holdings.count(Color::Black, PieceKind::Pawn), 0);
    }

    #[test]
    fn routing_twice_delivers_nothing_new() {
        let mut boards = fresh_pair();
        let mut flow = PieceFlow::new();
        boards[0].apply_normal(sq("e2"), sq("e4"), None).unwrap();
        boards[0].apply_normal(sq("d7"), sq("d5"), None).unwrap();
        boards[0].apply_normal(sq("e4"), sq("d5"), None).unwrap();

        assert_eq!(flow.route(&mut boards, BoardId::A).len(), 1);
        assert!(flow.route(&mut boards, BoardId::A).is_empty(), "idempotent");
        assert_eq!(boards[1].holdings.count(Color::Black, PieceKind::Pawn), 1);
    }

    #[test]
    fn quiet_moves_and_drops_deliver_nothing() {
        let mut boards = fresh_pair();
        let mut flow = PieceFlow::new();
        boards[1].apply_normal(sq("g1"), sq("f3"), None).unwrap();
        boards[1].holdings.add(Color::Black, PieceKind::Knight);
        boards[1]
            .apply_drop(sq("f6"), PieceKind::Knight, Color::Black)
            .unwrap();
        assert!(flow.route(&mut boards, BoardId::B).is_empty());
    }

    #[test]
    fn census_is_preserved_across_routing() {
        let mut boards = fresh_pair();
        let mut flow = PieceFlow::new();
        assert_eq!(PieceFlow::census_total(&boards), EXPECTED_CENSUS);
        boards[0].apply_normal(sq("e2"), sq("e4"), None).unwrap();
        boards[0].apply_normal(sq("d7"), sq("d5"), None).unwrap();
        boards[0].apply_normal(sq("e4"), sq("d5"), None).unwrap();
        flow.route(&mut boards, BoardId::A);
        assert_eq!(PieceFlow::census_total(&boards), EXPECTED_CENSUS);
    }
}
