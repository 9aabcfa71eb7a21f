//! Bughouse FEN encoding and decoding.
//!
//! The standard six-field FEN with a bracketed holdings segment appended to
//! the placement field: `rnbq.../RNBQKBNR[QRBNPqrbnp] w KQkq - 0 1`.
//! Uppercase letters inside the brackets are white's held pieces, lowercase
//! black's, each side in the fixed order Q, R, B, N, P. The bracket pair is
//! always emitted (empty when nothing is held); decoding also accepts plain
//! FEN without it.

use crate::board::{Board, Castling};
use crate::error::{CoreError, CoreResult};
use crate::holdings::Holdings;
use crate::types::{
    parse_square, piece_char, piece_from_char, square, square_name, Color, PieceKind,
};

/// Canonical encoding sent to the engine, holdings included.
pub fn encode(board: &Board) -> String {
    let mut out = String::new();
    for rank in (0..8).rev() {
        let mut empties = 0;
        for file in 0..8 {
            match piece_char(board.cell(square(file, rank))) {
                Some(c) => {
                    if empties > 0 {
                        out.push_str(&empties.to_string());
                        empties = 0;
                    }
                    out.push(c);
                }
                None => empties += 1,
            }
        }
        if empties > 0 {
            out.push_str(&empties.to_string());
        }
        if rank > 0 {
            out.push('/');
        }
    }

    out.push('[');
    out.push_str(&board.holdings.fen_fragment());
    out.push(']');

    out.push(' ');
    out.push(match board.side_to_move {
        Color::White => 'w',
        Color::Black => 'b',
    });

    out.push(' ');
    let c = &board.castling;
    if !(c.white_king || c.white_queen || c.black_king || c.black_queen) {
        out.push('-');
    } else {
        if c.white_king {
            out.push('K');
        }
        if c.white_queen {
            out.push('Q');
        }
        if c.black_king {
            out.push('k');
        }
        if c.black_queen {
            out.push('q');
        }
    }

    out.push(' ');
    match board.en_passant {
        Some(sq) => out.push_str(&square_name(sq)),
        None => out.push('-'),
    }

    out.push_str(&format!(" {} {}", board.halfmove, board.fullmove));
    out
}

/// Decode a (possibly bracketed) FEN into a board with empty history.
pub fn decode(fen: &str) -> CoreResult<Board> {
    let bad = |msg: &str| CoreError::FenParse(format!("{}: {}", msg, fen));
    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(bad("expected at least four fields"));
    }

    let (placement, holdings_part) = match fields[0].find('[') {
        Some(open) => {
            let close = fields[0]
                .rfind(']')
                .ok_or_else(|| bad("unclosed holdings bracket"))?;
            (&fields[0][..open], &fields[0][open + 1..close])
        }
        None => (fields[0], ""),
    };

    let mut board = Board::empty();

    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(bad("expected eight ranks"));
    }
    for (i, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - i as i8;
        let mut file: i8 = 0;
        for c in rank_str.chars() {
            if let Some(skip) = c.to_digit(10) {
                file += skip as i8;
            } else {
                let piece = piece_from_char(c).ok_or_else(|| bad("unknown piece letter"))?;
                if file >= 8 {
                    return Err(bad("rank overflows eight files"));
                }
                board.squares[square(file, rank) as usize] = piece;
                file += 1;
            }
        }
        if file != 8 {
            return Err(bad("rank does not fill eight files"));
        }
    }

    let mut holdings = Holdings::new();
    for c in holdings_part.chars() {
        let kind = PieceKind::from_letter(c).ok_or_else(|| bad("unknown held piece letter"))?;
        if kind == PieceKind::King {
            return Err(CoreError::KingInHoldings);
        }
        let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
        holdings.add(color, kind);
    }
    board.holdings = holdings;

    board.side_to_move = match fields[1] {
        "w" => Color::White,
        "b" => Color::Black,
        _ => return Err(bad("side to move must be w or b")),
    };

    let mut castling = Castling::none();
    if fields[2] != "-" {
        for c in fields[2].chars() {
            match c {
                'K' => castling.white_king = true,
                'Q' => castling.white_queen = true,
                'k' => castling.black_king = true,
                'q' => castling.black_queen = true,
                _ => return Err(bad("unknown castling flag")),
            }
        }
    }
    board.castling = castling;

    board.en_passant = match fields[3] {
        "-" => None,
        name => Some(parse_square(name).ok_or_else(|| bad("bad en-passant square"))?),
    };

    board.halfmove = match fields.get(4) {
        Some(s) => s.parse().map_err(|_| bad("bad halfmove clock"))?,
        None => 0,
    };
    board.fullmove = match fields.get(5) {
        Some(s) => s.parse().map_err(|_| bad("bad fullmove number"))?,
        None => 1,
    };

    Ok(board)
}

impl Board {
    /// Canonical bughouse FEN of this position.
    pub fn fen_with_holdings(&self) -> String {
        encode(self)
    }

    pub fn from_fen(fen: &str) -> CoreResult<Board> {
        decode(fen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR[] w KQkq - 0 1";

    #[test]
    fn start_position_encodes_with_empty_brackets() {
        assert_eq!(Board::new().fen_with_holdings(), START);
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let mut board = Board::new();
        board.holdings.add(Color::White, PieceKind::Queen);
        board.holdings.add(Color::Black, PieceKind::Pawn);
        board.holdings.add(Color::Black, PieceKind::Rook);
        let fen = board.fen_with_holdings();
        assert!(fen.contains("[Qrp]"), "holdings segment present: {}", fen);

        let decoded = Board::from_fen(&fen).expect("decodes");
        assert_eq!(decoded.squares, board.squares);
        assert_eq!(decoded.holdings, board.holdings);
        assert_eq!(decoded.side_to_move, board.side_to_move);
        assert_eq!(decoded.castling, board.castling);
        assert_eq!(decoded.fen_with_holdings(), fen);
    }

    #[test]
    fn plain_fen_without_brackets_is_accepted() {
        let board =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
                .expect("plain FEN decodes");
        assert!(board.holdings.is_empty(Color::White));
        assert!(board.holdings.is_empty(Color::Black));
    }

    #[test]
    fn en_passant_and_clocks_survive_the_round_trip() {
        let mut board = Board::new();
        board.apply_normal(12, 28, None).unwrap(); // e2e4
        let fen = board.fen_with_holdings();
        assert!(fen.contains(" b KQkq e3 0 1"), "fields: {}", fen);
        let decoded = Board::from_fen(&fen).expect("decodes");
        assert_eq!(decoded.en_passant, board.en_passant);
        assert_eq!(decoded.halfmove, 0);
        assert_eq!(decoded.fullmove, 1);
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert!(Board::from_fen("").is_err());
        assert!(Board::from_fen("8/8/8 w - -").is_err());
        assert!(Board::from_fen("9/8/8/8/8/8/8/8 w - -").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR[K] w - -").is_err());
    }
}
