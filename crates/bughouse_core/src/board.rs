//! Board state and move application.
//!
//! One bughouse board: the grid, castling/en-passant/clock bookkeeping, the
//! committed move history, and the two holdings pools. Checkmate and
//! stalemate here are the standard-chess notions computed on the grid alone;
//! whether a mate survives a future drop is decided a layer up.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{CoreError, CoreResult};
use crate::holdings::Holdings;
use crate::moves::{Move, MoveRecord};
use crate::types::{
    file_of, on_board, piece_char, rank_of, square, square_name, Color, PieceKind,
};

/// Castling availability per side and wing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Castling {
    pub white_king: bool,
    pub white_queen: bool,
    pub black_king: bool,
    pub black_queen: bool,
}

impl Default for Castling {
    fn default() -> Self {
        Castling { white_king: true, white_queen: true, black_king: true, black_queen: true }
    }
}

impl Castling {
    pub fn none() -> Self {
        Castling { white_king: false, white_queen: false, black_king: false, black_queen: false }
    }
}

/// One side's board in a bughouse pair. State crosses process boundaries
/// as bughouse FEN, so the grid itself stays serde-free.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub squares: [i8; 64],
    pub side_to_move: Color,
    pub castling: Castling,
    pub en_passant: Option<i8>,
    pub halfmove: u32,
    pub fullmove: u32,
    pub holdings: Holdings,
    pub history: Vec<MoveRecord>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Standard starting position with empty holdings.
    pub fn new() -> Self {
        Board {
            squares: SETUP,
            side_to_move: Color::White,
            castling: Castling::default(),
            en_passant: None,
            halfmove: 0,
            fullmove: 1,
            holdings: Holdings::new(),
            history: Vec::new(),
        }
    }

    /// Blank grid, used by tests and FEN decoding.
    pub fn empty() -> Self {
        Board {
            squares: [0; 64],
            side_to_move: Color::White,
            castling: Castling::none(),
            en_passant: None,
            halfmove: 0,
            fullmove: 1,
            holdings: Holdings::new(),
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn cell(&self, sq: i8) -> i8 {
        self.squares[sq as usize]
    }

    /// FEN character of the piece on a square, if any.
    pub fn piece_at(&self, sq: i8) -> Option<char> {
        piece_char(self.cell(sq))
    }

    /// Color and kind of the piece on a square, if any.
    pub fn piece_kind_at(&self, sq: i8) -> Option<(Color, PieceKind)> {
        let piece = self.cell(sq);
        Some((Color::of(piece)?, PieceKind::from_id(piece)?))
    }

    pub fn find_king(&self, color: Color) -> Option<i8> {
        let target = KING_ID * color.sign();
        (0..64).find(|&sq| self.squares[sq as usize] == target)
    }

    pub fn ply(&self) -> usize {
        self.history.len()
    }

    // --- attack geometry ----------------------------------------------------

    /// Squares strictly between `from` and `to` are all empty. Callers
    /// guarantee the two squares share a rank, file, or diagonal.
    fn ray_clear(&self, from: i8, to: i8) -> bool {
        let df = (file_of(to) - file_of(from)).signum();
        let dr = (rank_of(to) - rank_of(from)).signum();
        let mut file = file_of(from) + df;
        let mut rank = rank_of(from) + dr;
        while (file, rank) != (file_of(to), rank_of(to)) {
            if self.squares[square(file, rank) as usize] != 0 {
                return false;
            }
            file += df;
            rank += dr;
        }
        true
    }

    /// Whether the piece on `from` attacks `to` (capture geometry, path
    /// clear for sliders). Pawns attack one square diagonally forward.
    pub fn attacks(&self, from: i8, to: i8) -> bool {
        let piece = self.cell(from);
        let Some(kind) = PieceKind::from_id(piece) else {
            return false;
        };
        let df = file_of(to) - file_of(from);
        let dr = rank_of(to) - rank_of(from);
        match kind {
            PieceKind::Pawn => dr == piece.signum() && df.abs() == 1,
            PieceKind::Knight => KNIGHT_JUMPS.contains(&(df, dr)),
            PieceKind::King => (df, dr) != (0, 0) && df.abs() <= 1 && dr.abs() <= 1,
            PieceKind::Bishop => df != 0 && df.abs() == dr.abs() && self.ray_clear(from, to),
            PieceKind::Rook => (df == 0) != (dr == 0) && self.ray_clear(from, to),
            PieceKind::Queen => {
                ((df == 0) != (dr == 0) || (df != 0 && df.abs() == dr.abs()))
                    && self.ray_clear(from, to)
            }
        }
    }

    pub fn is_square_attacked(&self, sq: i8, by: Color) -> bool {
        (0..64).any(|from| Color::of(self.squares[from as usize]) == Some(by) && self.attacks(from, sq))
    }

    pub fn in_check(&self, color: Color) -> bool {
        match self.find_king(color) {
            Some(king) => self.is_square_attacked(king, color.opposite()),
            // Positions without a king only occur mid-surgery in tests;
            // treat them as not in check rather than panicking.
            None => false,
        }
    }

    // --- normal moves -------------------------------------------------------

    /// Quiet-or-capture geometry for a normal move, ignoring king safety and
    /// castling. Pawn pushes require empty squares; pawn captures require an
    /// enemy piece or the en-passant target.
    fn move_reachable(&self, from: i8, to: i8) -> bool {
        let piece = self.cell(from);
        let Some(kind) = PieceKind::from_id(piece) else {
            return false;
        };
        if kind != PieceKind::Pawn {
            return self.attacks(from, to);
        }
        let fwd = piece.signum();
        let df = file_of(to) - file_of(from);
        let dr = rank_of(to) - rank_of(from);
        let home_rank = if piece > 0 { 1 } else { 6 };
        if df == 0 {
            if dr == fwd && self.cell(to) == 0 {
                return true;
            }
            let mid = square(file_of(from), rank_of(from) + fwd);
            dr == 2 * fwd
                && rank_of(from) == home_rank
                && self.cell(mid) == 0
                && self.cell(to) == 0
        } else {
            df.abs() == 1
                && dr == fwd
                && (Color::of(self.cell(to)) == Some(Color::of(piece).unwrap().opposite())
                    || self.en_passant == Some(to))
        }
    }

    /// The en-passant victim square for a pawn move, if that move is an
    /// en-passant capture.
    fn en_passant_victim(&self, from: i8, to: i8) -> Option<i8> {
        let piece = self.cell(from);
        if PieceKind::from_id(piece) != Some(PieceKind::Pawn) {
            return None;
        }
        if self.en_passant == Some(to) && file_of(from) != file_of(to) && self.cell(to) == 0 {
            Some(square(file_of(to), rank_of(from)))
        } else {
            None
        }
    }

    /// Apply the move on a scratch grid and report whether the mover's king
    /// would be left in check.
    fn would_leave_in_check(&self, from: i8, to: i8) -> bool {
        let mover = Color::of(self.cell(from)).expect("mover piece present");
        let mut probe = self.clone();
        if let Some(victim) = probe.en_passant_victim(from, to) {
            probe.squares[victim as usize] = 0;
        }
        probe.squares[to as usize] = probe.squares[from as usize];
        probe.squares[from as usize] = 0;
        probe.in_check(mover)
    }

    fn castle_rights(&self, color: Color, kingside: bool) -> bool {
        match (color, kingside) {
            (Color::White, true) => self.castling.white_king,
            (Color::White, false) => self.castling.white_queen,
            (Color::Black, true) => self.castling.black_king,
            (Color::Black, false) => self.castling.black_queen,
        }
    }

    fn validate_castle(&self, from: i8, to: i8, color: Color) -> Result<(), String> {
        let home = if color == Color::White { 4 } else { 60 };
        if from != home {
            return Err("king not on its home square".into());
        }
        let kingside = to > from;
        if !self.castle_rights(color, kingside) {
            return Err("castling rights lost".into());
        }
        let rook_sq = match (color, kingside) {
            (Color::White, true) => 7,
            (Color::White, false) => 0,
            (Color::Black, true) => 63,
            (Color::Black, false) => 56,
        };
        if self.cell(rook_sq) != ROOK_ID * color.sign() {
            return Err("rook missing from its corner".into());
        }
        let between: &[i8] = match (color, kingside) {
            (Color::White, true) => &[5, 6],
            (Color::White, false) => &[1, 2, 3],
            (Color::Black, true) => &[61, 62],
            (Color::Black, false) => &[57, 58, 59],
        };
        if between.iter().any(|&sq| self.cell(sq) != 0) {
            return Err("squares between king and rook are occupied".into());
        }
        if self.in_check(color) {
            return Err("cannot castle out of check".into());
        }
        let transit = if kingside { from + 1 } else { from - 1 };
        if self.is_square_attacked(transit, color.opposite())
            || self.is_square_attacked(to, color.opposite())
        {
            return Err("king would cross an attacked square".into());
        }
        Ok(())
    }

    /// Apply a normal move for the side to move. Returns the committed
    /// record; the position is untouched on any rejection.
    pub fn apply_normal(
        &mut self,
        from: i8,
        to: i8,
        promotion: Option<PieceKind>,
    ) -> CoreResult<MoveRecord> {
        let notation = || format!("{}{}", square_name(from), square_name(to));
        let illegal = |reason: &str| CoreError::IllegalMove {
            notation: notation(),
            reason: reason.to_string(),
        };

        if !(0..64).contains(&from) {
            return Err(CoreError::BadSquare(from));
        }
        if !(0..64).contains(&to) {
            return Err(CoreError::BadSquare(to));
        }
        let piece = self.cell(from);
        let mover = Color::of(piece).ok_or_else(|| illegal("no piece on the source square"))?;
        if mover != self.side_to_move {
            return Err(illegal("not this side's turn"));
        }
        if Color::of(self.cell(to)) == Some(mover) {
            return Err(illegal("destination holds a friendly piece"));
        }
        let kind = PieceKind::from_id(piece).expect("nonzero cell has a kind");

        let castle = kind == PieceKind::King
            && rank_of(from) == rank_of(to)
            && (file_of(to) - file_of(from)).abs() == 2;
        if castle {
            self.validate_castle(from, to, mover)
                .map_err(|reason| illegal(&reason))?;
        } else if !self.move_reachable(from, to) {
            return Err(illegal("piece cannot reach that square"));
        }

        let last_rank = if mover == Color::White { 7 } else { 0 };
        let promoting = kind == PieceKind::Pawn && rank_of(to) == last_rank;
        if promoting {
            match promotion {
                None => return Err(illegal("promotion piece required")),
                Some(PieceKind::King) | Some(PieceKind::Pawn) => {
                    return Err(illegal("cannot promote to that piece"))
                }
                Some(_) => {}
            }
        } else if promotion.is_some() {
            return Err(illegal("promotion on a non-promoting move"));
        }

        if !castle && self.would_leave_in_check(from, to) {
            return Err(illegal("move leaves the king in check"));
        }

        // Committed from here on.
        let ep_victim = self.en_passant_victim(from, to);
        let captured = if let Some(victim) = ep_victim {
            let victim_piece = self.cell(victim);
            self.squares[victim as usize] = 0;
            Some((Color::of(victim_piece).unwrap(), PieceKind::Pawn))
        } else {
            self.piece_kind_at(to)
        };

        self.squares[to as usize] = match promotion {
            Some(p) => p.id() * mover.sign(),
            None => piece,
        };
        self.squares[from as usize] = 0;

        if castle {
            let (rook_from, rook_to) = match (mover, to > from) {
                (Color::White, true) => (7, 5),
                (Color::White, false) => (0, 3),
                (Color::Black, true) => (63, 61),
                (Color::Black, false) => (56, 59),
            };
            self.squares[rook_to as usize] = self.squares[rook_from as usize];
            self.squares[rook_from as usize] = 0;
        }

        if kind == PieceKind::King {
            match mover {
                Color::White => {
                    self.castling.white_king = false;
                    self.castling.white_queen = false;
                }
                Color::Black => {
                    self.castling.black_king = false;
                    self.castling.black_queen = false;
                }
            }
        }
        for sq in [from, to] {
            match sq {
                0 => self.castling.white_queen = false,
                7 => self.castling.white_king = false,
                56 => self.castling.black_queen = false,
                63 => self.castling.black_king = false,
                _ => {}
            }
        }

        self.en_passant = if kind == PieceKind::Pawn && (rank_of(to) - rank_of(from)).abs() == 2 {
            Some(square(file_of(from), (rank_of(from) + rank_of(to)) / 2))
        } else {
            None
        };

        if kind == PieceKind::Pawn || captured.is_some() {
            self.halfmove = 0;
        } else {
            self.halfmove += 1;
        }
        if mover == Color::Black {
            self.fullmove += 1;
        }
        self.side_to_move = mover.opposite();

        let record = MoveRecord {
            mv: Move::Normal { from, to, promotion },
            captured,
            by: mover,
        };
        self.history.push(record);
        Ok(record)
    }

    // --- drops --------------------------------------------------------------

    /// Whether dropping `piece` of `color` on `sq` is legal: the square is
    /// empty, pawns stay off ranks 1 and 8, the piece is actually held, and
    /// the mover's king is not left in check.
    pub fn is_drop_legal(&self, sq: i8, piece: PieceKind, color: Color) -> bool {
        if !(0..64).contains(&sq) || piece == PieceKind::King {
            return false;
        }
        if self.cell(sq) != 0 {
            return false;
        }
        if piece == PieceKind::Pawn && (rank_of(sq) == 0 || rank_of(sq) == 7) {
            return false;
        }
        if self.holdings.count(color, piece) == 0 {
            return false;
        }
        let mut probe = self.clone();
        probe.squares[sq as usize] = piece.id() * color.sign();
        !probe.in_check(color)
    }

    /// Apply a drop for the side to move. A drop clears the en-passant
    /// target and never promotes.
    pub fn apply_drop(&mut self, sq: i8, piece: PieceKind, color: Color) -> CoreResult<MoveRecord> {
        let illegal = |reason: &str| CoreError::IllegalDrop {
            square: square_name(sq),
            reason: reason.to_string(),
        };
        if piece == PieceKind::King {
            return Err(CoreError::KingInHoldings);
        }
        if color != self.side_to_move {
            return Err(illegal("not this side's turn"));
        }
        if !(0..64).contains(&sq) {
            return Err(CoreError::BadSquare(sq));
        }
        if self.cell(sq) != 0 {
            return Err(illegal("square is occupied"));
        }
        if piece == PieceKind::Pawn && (rank_of(sq) == 0 || rank_of(sq) == 7) {
            return Err(illegal("pawns cannot be dropped on the first or last rank"));
        }
        if self.holdings.count(color, piece) == 0 {
            return Err(illegal("piece is not held"));
        }
        {
            let mut probe = self.clone();
            probe.squares[sq as usize] = piece.id() * color.sign();
            if probe.in_check(color) {
                return Err(illegal("drop leaves the king in check"));
            }
        }

        if !self.holdings.remove(color, piece) {
            return Err(CoreError::HoldingsUnderflow { color, piece });
        }
        self.squares[sq as usize] = piece.id() * color.sign();
        self.en_passant = None;
        if piece == PieceKind::Pawn {
            self.halfmove = 0;
        } else {
            self.halfmove += 1;
        }
        if color == Color::Black {
            self.fullmove += 1;
        }
        self.side_to_move = color.opposite();

        let record = MoveRecord {
            mv: Move::Drop { to: sq, piece, color },
            captured: None,
            by: color,
        };
        self.history.push(record);
        Ok(record)
    }

    /// Apply either move variant for the side to move.
    pub fn apply(&mut self, mv: Move) -> CoreResult<MoveRecord> {
        match mv {
            Move::Normal { from, to, promotion } => self.apply_normal(from, to, promotion),
            Move::Drop { to, piece, color } => self.apply_drop(to, piece, color),
        }
    }

    // --- terminal detection (standard chess, holdings ignored) --------------

    /// Candidate destination squares for the piece on `from`, by geometry.
    fn candidate_targets(&self, from: i8) -> Vec<i8> {
        let piece = self.cell(from);
        let Some(kind) = PieceKind::from_id(piece) else {
            return Vec::new();
        };
        let file = file_of(from);
        let rank = rank_of(from);
        let mut targets = Vec::new();
        let mut push = |f: i8, r: i8| {
            if on_board(f, r) {
                targets.push(square(f, r));
            }
        };
        match kind {
            PieceKind::Pawn => {
                let fwd = piece.signum();
                push(file, rank + fwd);
                push(file, rank + 2 * fwd);
                push(file - 1, rank + fwd);
                push(file + 1, rank + fwd);
            }
            PieceKind::Knight => {
                for (df, dr) in KNIGHT_JUMPS {
                    push(file + df, rank + dr);
                }
            }
            PieceKind::King => {
                for (df, dr) in KING_STEPS {
                    push(file + df, rank + dr);
                }
            }
            PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen => {
                let steps: &[(i8, i8)] = match kind {
                    PieceKind::Bishop => &BISHOP_STEPS,
                    PieceKind::Rook => &ROOK_STEPS,
                    _ => &KING_STEPS,
                };
                for &(df, dr) in steps {
                    let mut f = file + df;
                    let mut r = rank + dr;
                    while on_board(f, r) {
                        targets.push(square(f, r));
                        if self.cell(square(f, r)) != 0 {
                            break;
                        }
                        f += df;
                        r += dr;
                    }
                }
            }
        }
        targets
    }

    /// Whether `color` has any legal normal move. Castling is not probed:
    /// it is never an escape from check, and a position where castling is
    /// the only legal move also has the corresponding rook moves available
    /// here as non-castling candidates.
    fn has_legal_normal_move(&self, color: Color) -> bool {
        for from in 0..64 {
            if Color::of(self.cell(from)) != Some(color) {
                continue;
            }
            for to in self.candidate_targets(from) {
                if Color::of(self.cell(to)) == Some(color) {
                    continue;
                }
                if !self.move_reachable(from, to) {
                    continue;
                }
                if !self.would_leave_in_check(from, to) {
                    return true;
                }
            }
        }
        false
    }

    /// Standard-chess checkmate on the grid, ignoring holdings.
    pub fn is_checkmate(&self) -> bool {
        self.in_check(self.side_to_move) && !self.has_legal_normal_move(self.side_to_move)
    }

    /// Standard-chess stalemate on the grid, ignoring holdings.
    pub fn is_stalemate(&self) -> bool {
        !self.in_check(self.side_to_move) && !self.has_legal_normal_move(self.side_to_move)
    }

    /// Non-king pieces on the grid plus everything held, for the cross-board
    /// census invariant.
    pub fn census(&self) -> u32 {
        let on_grid = self
            .squares
            .iter()
            .filter(|&&p| p != 0 && p.abs() != KING_ID)
            .count() as u32;
        on_grid + self.holdings.total(Color::White) + self.holdings.total(Color::Black)
    }
}

/// Rebuild a position by replaying a move prefix from a base position. The
/// base carries whatever holdings the replay needs; the history of the
/// result contains exactly the replayed moves.
pub fn replayed(base: &Board, moves: &[Move]) -> CoreResult<Board> {
    let mut board = base.clone();
    board.history.clear();
    for &mv in moves {
        board.apply(mv)?;
    }
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_square;

    fn sq(name: &str) -> i8 {
        parse_square(name).expect("valid square")
    }

    #[test]
    fn opening_push_and_reply() {
        let mut board = Board::new();
        board.apply_normal(sq("e2"), sq("e4"), None).expect("e4 is legal");
        assert_eq!(board.side_to_move, Color::Black);
        assert_eq!(board.en_passant, Some(sq("e3")));
        board.apply_normal(sq("d7"), sq("d5"), None).expect("d5 is legal");
        assert_eq!(board.fullmove, 2);
    }

    #[test]
    fn capture_is_recorded_with_victim_color() {
        let mut board = Board::new();
        board.apply_normal(sq("e2"), sq("e4"), None).unwrap();
        board.apply_normal(sq("d7"), sq("d5"), None).unwrap();
        let record = board.apply_normal(sq("e4"), sq("d5"), None).expect("exd5");
        assert_eq!(record.captured, Some((Color::Black, PieceKind::Pawn)));
        assert_eq!(board.piece_at(sq("d5")), Some('P'));
    }

    #[test]
    fn cannot_move_out_of_turn() {
        let mut board = Board::new();
        let err = board.apply_normal(sq("e7"), sq("e5"), None);
        assert!(err.is_err(), "black cannot move first");
    }

    #[test]
    fn en_passant_removes_the_bypassing_pawn() {
        let mut board = Board::new();
        board.apply_normal(sq("e2"), sq("e4"), None).unwrap();
        board.apply_normal(sq("a7"), sq("a6"), None).unwrap();
        board.apply_normal(sq("e4"), sq("e5"), None).unwrap();
        board.apply_normal(sq("d7"), sq("d5"), None).unwrap();
        let record = board.apply_normal(sq("e5"), sq("d6"), None).expect("exd6 e.p.");
        assert_eq!(record.captured, Some((Color::Black, PieceKind::Pawn)));
        assert_eq!(board.cell(sq("d5")), 0, "bypassing pawn is gone");
    }

    #[test]
    fn kingside_castle_moves_the_rook() {
        let mut board = Board::new();
        for (from, to) in [("g1", "f3"), ("g8", "f6"), ("e2", "e3"), ("e7", "e6"), ("f1", "e2"), ("f8", "e7")] {
            board.apply_normal(sq(from), sq(to), None).unwrap();
        }
        board.apply_normal(sq("e1"), sq("g1"), None).expect("O-O");
        assert_eq!(board.piece_at(sq("g1")), Some('K'));
        assert_eq!(board.piece_at(sq("f1")), Some('R'));
        assert!(!board.castling.white_king && !board.castling.white_queen);
    }

    #[test]
    fn promotion_is_required_on_the_last_rank() {
        let mut board = Board::empty();
        board.squares[sq("a7") as usize] = W_PAWN;
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("e8") as usize] = B_KING;
        assert!(board.apply_normal(sq("a7"), sq("a8"), None).is_err());
        let record = board
            .apply_normal(sq("a7"), sq("a8"), Some(PieceKind::Queen))
            .expect("promotion to queen");
        assert!(!record.mv.is_drop());
        assert_eq!(board.piece_at(sq("a8")), Some('Q'));
    }

    #[test]
    fn moving_into_check_is_rejected() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("e8") as usize] = B_ROOK;
        board.squares[sq("a8") as usize] = B_KING;
        board.squares[sq("e2") as usize] = W_BISHOP;
        // The bishop is pinned to the king by the rook.
        let err = board.apply_normal(sq("e2"), sq("d3"), None);
        assert!(err.is_err(), "pinned bishop cannot abandon the file");
    }

    #[test]
    fn drop_requires_empty_square_and_held_piece() {
        let mut board = Board::new();
        assert!(!board.is_drop_legal(sq("e2"), PieceKind::Knight, Color::White), "occupied");
        assert!(!board.is_drop_legal(sq("e4"), PieceKind::Knight, Color::White), "not held");
        board.holdings.add(Color::White, PieceKind::Knight);
        assert!(board.is_drop_legal(sq("e4"), PieceKind::Knight, Color::White));
    }

    #[test]
    fn pawn_drops_stay_off_back_ranks() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("e8") as usize] = B_KING;
        board.holdings.add(Color::White, PieceKind::Pawn);
        assert!(!board.is_drop_legal(sq("a1"), PieceKind::Pawn, Color::White));
        assert!(!board.is_drop_legal(sq("a8"), PieceKind::Pawn, Color::White));
        assert!(board.is_drop_legal(sq("a4"), PieceKind::Pawn, Color::White));
    }

    #[test]
    fn drop_consumes_holdings_and_clears_en_passant() {
        let mut board = Board::new();
        board.apply_normal(sq("e2"), sq("e4"), None).unwrap();
        assert_eq!(board.en_passant, Some(sq("e3")));
        board.holdings.add(Color::Black, PieceKind::Knight);
        board
            .apply_drop(sq("f6"), PieceKind::Knight, Color::Black)
            .expect("N@f6");
        assert_eq!(board.en_passant, None);
        assert_eq!(board.holdings.count(Color::Black, PieceKind::Knight), 0);
        assert_eq!(board.piece_at(sq("f6")), Some('n'));
    }

    #[test]
    fn drop_cannot_leave_own_king_in_check() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("e8") as usize] = B_ROOK;
        board.squares[sq("a8") as usize] = B_KING;
        board.side_to_move = Color::White;
        board.holdings.add(Color::White, PieceKind::Knight);
        // The king is in check from e8; a knight on a3 does not address it.
        assert!(!board.is_drop_legal(sq("a3"), PieceKind::Knight, Color::White));
        // Blocking on the e-file does.
        assert!(board.is_drop_legal(sq("e4"), PieceKind::Knight, Color::White));
    }

    #[test]
    fn back_rank_mate_is_checkmate() {
        let mut board = Board::empty();
        board.squares[sq("g8") as usize] = B_KING;
        board.squares[sq("f7") as usize] = B_PAWN;
        board.squares[sq("g7") as usize] = B_PAWN;
        board.squares[sq("h7") as usize] = B_PAWN;
        board.squares[sq("a8") as usize] = W_ROOK;
        board.squares[sq("e1") as usize] = W_KING;
        board.side_to_move = Color::Black;
        assert!(board.is_checkmate(), "boxed-in back rank is mate");
        assert!(!board.is_stalemate());
    }

    #[test]
    fn lone_king_in_the_corner_is_stalemate() {
        let mut board = Board::empty();
        board.squares[sq("a8") as usize] = B_KING;
        board.squares[sq("b6") as usize] = W_KING;
        board.squares[sq("c7") as usize] = W_QUEEN;
        board.side_to_move = Color::Black;
        assert!(board.is_stalemate(), "king has no square and is not checked");
        assert!(!board.is_checkmate());
    }

    #[test]
    fn census_counts_grid_and_holdings() {
        let mut board = Board::new();
        assert_eq!(board.census(), 30, "32 men minus two kings");
        board.holdings.add(Color::Black, PieceKind::Pawn);
        assert_eq!(board.census(), 31);
    }

    #[test]
    fn truncate_and_replay_matches_direct_application() {
        let base = Board::new();
        let mut board = base.clone();
        board.apply_normal(sq("e2"), sq("e4"), None).unwrap();
        board.apply_normal(sq("d7"), sq("d5"), None).unwrap();
        board.apply_normal(sq("e4"), sq("d5"), None).unwrap();

        let moves: Vec<Move> = board.history.iter().map(|r| r.mv).collect();
        let replay_full = replayed(&base, &moves).expect("replay applies");
        assert_eq!(replay_full.squares, board.squares);
        assert_eq!(replay_full.side_to_move, board.side_to_move);

        // Truncating the last move is equivalent to never having played it.
        let mut two = base.clone();
        two.apply_normal(sq("e2"), sq("e4"), None).unwrap();
        two.apply_normal(sq("d7"), sq("d5"), None).unwrap();
        let replay_two = replayed(&base, &moves[..2]).expect("replay applies");
        assert_eq!(replay_two.squares, two.squares);
        assert_eq!(replay_two.en_passant, two.en_passant);
    }
}
