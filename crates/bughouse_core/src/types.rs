//! Colors, piece kinds, and square helpers.

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Side color. Converts to the sign used by the board encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    #[inline]
    pub fn sign(self) -> i8 {
        match self {
            Color::White => COLOR_WHITE,
            Color::Black => COLOR_BLACK,
        }
    }

    #[inline]
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Color of a board cell, `None` for an empty one.
    #[inline]
    pub fn of(piece: i8) -> Option<Color> {
        if piece > 0 {
            Some(Color::White)
        } else if piece < 0 {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Index into `[white, black]` pairs.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }
}

/// Piece kind. Kings exist on the grid but are never held or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// The five droppable kinds, in the probe order used by the stall cycle
/// (cheapest first).
pub const HELD_KINDS: [PieceKind; 5] = [
    PieceKind::Pawn,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Rook,
    PieceKind::Queen,
];

impl PieceKind {
    #[inline]
    pub fn id(self) -> i8 {
        match self {
            PieceKind::Pawn => PAWN_ID,
            PieceKind::Knight => KNIGHT_ID,
            PieceKind::Bishop => BISHOP_ID,
            PieceKind::Rook => ROOK_ID,
            PieceKind::Queen => QUEEN_ID,
            PieceKind::King => KING_ID,
        }
    }

    #[inline]
    pub fn from_id(id: i8) -> Option<PieceKind> {
        match id.abs() {
            PAWN_ID => Some(PieceKind::Pawn),
            KNIGHT_ID => Some(PieceKind::Knight),
            BISHOP_ID => Some(PieceKind::Bishop),
            ROOK_ID => Some(PieceKind::Rook),
            QUEEN_ID => Some(PieceKind::Queen),
            KING_ID => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Lowercase FEN letter for this kind.
    #[inline]
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    #[inline]
    pub fn from_letter(c: char) -> Option<PieceKind> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }

    /// Index into holdings arrays; kings have no slot.
    #[inline]
    pub fn held_index(self) -> Option<usize> {
        match self {
            PieceKind::Pawn => Some(0),
            PieceKind::Knight => Some(1),
            PieceKind::Bishop => Some(2),
            PieceKind::Rook => Some(3),
            PieceKind::Queen => Some(4),
            PieceKind::King => None,
        }
    }
}

/// FEN character for a signed board cell (uppercase white), `None` if empty.
#[inline]
pub fn piece_char(piece: i8) -> Option<char> {
    let kind = PieceKind::from_id(piece)?;
    if piece > 0 {
        Some(kind.letter().to_ascii_uppercase())
    } else {
        Some(kind.letter())
    }
}

/// Signed board cell for a FEN character.
#[inline]
pub fn piece_from_char(c: char) -> Option<i8> {
    let kind = PieceKind::from_letter(c)?;
    Some(if c.is_ascii_uppercase() { kind.id() } else { -kind.id() })
}

// --- square helpers ---------------------------------------------------------

#[inline]
pub fn square(file: i8, rank: i8) -> i8 {
    rank * 8 + file
}

#[inline]
pub fn file_of(sq: i8) -> i8 {
    sq % 8
}

#[inline]
pub fn rank_of(sq: i8) -> i8 {
    sq / 8
}

#[inline]
pub fn on_board(file: i8, rank: i8) -> bool {
    (0..8).contains(&file) && (0..8).contains(&rank)
}

/// Algebraic name ("e4") for a square index.
pub fn square_name(sq: i8) -> String {
    let mut s = String::with_capacity(2);
    s.push((b'a' + file_of(sq) as u8) as char);
    s.push((b'1' + rank_of(sq) as u8) as char);
    s
}

/// Parse an algebraic square name.
pub fn parse_square(s: &str) -> Option<i8> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].checked_sub(b'a')? as i8;
    let rank = bytes[1].checked_sub(b'1')? as i8;
    if on_board(file, rank) {
        Some(square(file, rank))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_names_round_trip() {
        for sq in 0..64 {
            let name = square_name(sq);
            assert_eq!(parse_square(&name), Some(sq), "round trip for {}", name);
        }
    }

    #[test]
    fn piece_chars_match_colors() {
        assert_eq!(piece_char(W_QUEEN), Some('Q'));
        assert_eq!(piece_char(B_KNIGHT), Some('n'));
        assert_eq!(piece_char(VOID_ID), None);
        assert_eq!(piece_from_char('R'), Some(W_ROOK));
        assert_eq!(piece_from_char('p'), Some(B_PAWN));
    }

    #[test]
    fn corners_have_expected_indices() {
        assert_eq!(parse_square("a1"), Some(0));
        assert_eq!(parse_square("h1"), Some(7));
        assert_eq!(parse_square("a8"), Some(56));
        assert_eq!(parse_square("h8"), Some(63));
    }
}
