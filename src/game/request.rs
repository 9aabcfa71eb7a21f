//! Move selection, biased toward a teammate's partner-request.
//!
//! A bot with a pending inbound request tries, in order: the mating move if
//! one is already in hand, a search restricted to capture candidates that
//! satisfy the request, a forcing-line bias (ghost variant or Multi-PV
//! proximity, per configuration), and finally the ordinary best move. Any
//! transient engine option is reverted before the choice is surfaced.

use bughouse_core::types::{file_of, rank_of, Color, PieceKind};
use bughouse_core::{Board, Move};
use shared::{fulfills, PartnerRequest};
use tracing::{debug, warn};

use crate::config::{BiasMode, OrchestratorConfig};
use crate::game::stalling::{normalize, Normalized};
use crate::uci::{EngineLink, UciError, UciResult};

/// All `from->to` captures whose target holds a piece satisfying the
/// request, by pure geometry (pawn diagonal-one, knight jumps, sliders
/// along clear rays, king one step). Pawn captures onto the last rank are
/// emitted as queen promotions.
pub fn capture_candidates(board: &Board, requested: PieceKind) -> Vec<String> {
    let us = board.side_to_move;
    let them = us.opposite();
    let last_rank = if us == Color::White { 7 } else { 0 };
    let mut candidates = Vec::new();
    for to in 0..64 {
        match board.piece_kind_at(to) {
            Some((color, kind)) if color == them && fulfills(requested, kind) => {}
            _ => continue,
        }
        for from in 0..64 {
            if board.piece_kind_at(from).map(|(c, _)| c) != Some(us) {
                continue;
            }
            if !board.attacks(from, to) {
                continue;
            }
            let promoting = board.piece_kind_at(from).map(|(_, k)| k) == Some(PieceKind::Pawn)
                && rank_of(to) == last_rank;
            let mv = Move::Normal {
                from,
                to,
                promotion: promoting.then_some(PieceKind::Queen),
            };
            candidates.push(mv.uci());
        }
    }
    candidates
}

/// Manhattan distance between two squares.
fn manhattan(a: i8, b: i8) -> i8 {
    (file_of(a) - file_of(b)).abs() + (rank_of(a) - rank_of(b)).abs()
}

/// Whether a move's first step closes the distance to any target square.
fn closes_distance(mv: &Move, targets: &[i8]) -> bool {
    match *mv {
        Move::Normal { from, to, .. } => targets
            .iter()
            .any(|&t| manhattan(to, t) < manhattan(from, t)),
        Move::Drop { .. } => false,
    }
}

async fn plain_best<E: EngineLink>(
    board: &Board,
    engine: &mut E,
    cfg: &OrchestratorConfig,
) -> UciResult<Option<Move>> {
    let best = engine.best_move(cfg.move_time_ms).await?;
    Ok(best.and_then(|s| Move::parse_uci(&s, board.side_to_move)))
}

/// The forcing-line bias. Transient variant/option overrides are reverted
/// to the baseline bughouse configuration on every exit path.
async fn forcing_line<E: EngineLink>(
    board: &Board,
    requested: PieceKind,
    engine: &mut E,
    cfg: &OrchestratorConfig,
) -> UciResult<Option<Move>> {
    let fen = board.fen_with_holdings();
    match cfg.bias_mode {
        BiasMode::RoyalPiece | BiasMode::HighValue => {
            let prefix = match cfg.bias_mode {
                BiasMode::RoyalPiece => "ghost_royal_",
                _ => "ghost_highvalue_",
            };
            let variant = format!("{}{}", prefix, requested.letter());
            engine.set_option("UCI_Variant", &variant).await?;
            engine.set_position(&fen, &[]).await?;
            let searched = engine.best_move(cfg.move_time_ms).await;
            engine.set_option("UCI_Variant", "bughouse").await?;
            engine.set_position(&fen, &[]).await?;
            Ok(searched?.and_then(|s| Move::parse_uci(&s, board.side_to_move)))
        }
        BiasMode::Proximity => {
            let them = board.side_to_move.opposite();
            let targets: Vec<i8> = (0..64)
                .filter(|&sq| match board.piece_kind_at(sq) {
                    Some((color, kind)) => color == them && fulfills(requested, kind),
                    None => false,
                })
                .collect();
            if targets.is_empty() {
                return Ok(None);
            }
            engine
                .set_option("MultiPV", &cfg.proximity_multipv.to_string())
                .await?;
            engine.set_position(&fen, &[]).await?;
            let searched = engine.best_lines(cfg.move_time_ms, cfg.proximity_multipv).await;
            engine.set_option("MultiPV", "1").await?;
            engine.set_position(&fen, &[]).await?;
            for line in searched? {
                let Some(first) = line.pv.first() else { continue };
                let Some(mv) = Move::parse_uci(first, board.side_to_move) else {
                    continue;
                };
                if closes_distance(&mv, &targets) {
                    debug!("[BIAS] proximity picked {} toward {:?}", mv.uci(), requested);
                    return Ok(Some(mv));
                }
            }
            Ok(None)
        }
    }
}

/// Pick the bot's move, honoring a pending inbound request when present.
pub async fn choose_move<E: EngineLink>(
    board: &Board,
    inbound: Option<&PartnerRequest>,
    engine: &mut E,
    cfg: &OrchestratorConfig,
) -> UciResult<Option<Move>> {
    let fen = board.fen_with_holdings();
    engine.set_position(&fen, &[]).await?;

    let Some(request) = inbound else {
        return plain_best(board, engine, cfg).await;
    };

    // A mating line in hand outranks any request.
    match engine.evaluate(cfg.eval_depth).await {
        Ok(eval) => {
            if matches!(
                normalize(eval.score, board.side_to_move, cfg),
                Normalized::Mating(_)
            ) {
                return plain_best(board, engine, cfg).await;
            }
        }
        Err(UciError::NoEvaluation) => {}
        Err(e) => return Err(e),
    }

    // Restrict the search root to satisfying captures.
    let candidates = capture_candidates(board, request.piece);
    if !candidates.is_empty() {
        if let Some(found) = engine
            .best_move_restricted(cfg.move_time_ms, &candidates)
            .await?
        {
            if candidates.contains(&found) {
                if let Some(mv) = Move::parse_uci(&found, board.side_to_move) {
                    let satisfying = board
                        .piece_kind_at(mv.to())
                        .map(|(color, kind)| {
                            color == board.side_to_move.opposite()
                                && fulfills(request.piece, kind)
                        })
                        .unwrap_or(false);
                    if satisfying {
                        debug!("[BIAS] searchmoves capture {}", mv.uci());
                        return Ok(Some(mv));
                    }
                }
            } else {
                warn!("[BIAS] engine ignored the searchmoves restriction: {}", found);
            }
        }
    }

    if let Some(mv) = forcing_line(board, request.piece, engine, cfg).await? {
        return Ok(Some(mv));
    }

    plain_best(board, engine, cfg).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::{ScriptedEngine, SearchLine, Score};
    use bughouse_core::constants::*;
    use bughouse_core::types::parse_square;
    use shared::BotId;
    use shared::StallScenario;

    fn sq(name: &str) -> i8 {
        parse_square(name).expect("valid square")
    }

    #[test]
    fn candidates_cover_equivalent_pieces_only() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("a8") as usize] = B_KING;
        board.squares[sq("d4") as usize] = W_KNIGHT;
        board.squares[sq("e6") as usize] = B_BISHOP; // satisfies a pawn ask
        board.squares[sq("c6") as usize] = B_ROOK; // does not
        let candidates = capture_candidates(&board, PieceKind::Pawn);
        assert_eq!(candidates, vec!["d4e6".to_string()]);
    }

    #[test]
    fn candidates_respect_slider_blockades() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("a8") as usize] = B_KING;
        board.squares[sq("a1") as usize] = W_ROOK;
        board.squares[sq("a4") as usize] = W_PAWN; // blocks the file
        board.squares[sq("a6") as usize] = B_QUEEN;
        let candidates = capture_candidates(&board, PieceKind::Queen);
        assert!(
            !candidates.contains(&"a1a6".to_string()),
            "rook is blocked by its own pawn"
        );
    }

    #[test]
    fn pawn_capture_onto_last_rank_promotes() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("a8") as usize] = B_KING;
        board.squares[sq("g7") as usize] = W_PAWN;
        board.squares[sq("h8") as usize] = B_QUEEN;
        let candidates = capture_candidates(&board, PieceKind::Queen);
        assert_eq!(candidates, vec!["g7h8q".to_string()]);
    }

    fn request(piece: PieceKind) -> PartnerRequest {
        PartnerRequest {
            piece,
            reason: StallScenario::ForcesMate,
            requested_by: BotId::Bot1,
        }
    }

    #[tokio::test]
    async fn satisfying_capture_from_restricted_search_is_played() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("a8") as usize] = B_KING;
        board.squares[sq("d4") as usize] = W_KNIGHT;
        board.squares[sq("e6") as usize] = B_KNIGHT;

        let mut engine = ScriptedEngine::new();
        engine.score_for(&board.fen_with_holdings(), Score::Cp(10));
        engine.move_for(&board.fen_with_holdings(), Some("d4e6"));

        let req = request(PieceKind::Knight);
        let cfg = OrchestratorConfig::default();
        let mv = choose_move(&board, Some(&req), &mut engine, &cfg)
            .await
            .unwrap()
            .expect("a move");
        assert_eq!(mv.uci(), "d4e6");
        assert!(
            engine.sent.iter().any(|c| c.contains("searchmoves d4e6")),
            "the restriction was actually sent: {:?}",
            engine.sent
        );
    }

    #[tokio::test]
    async fn mating_position_ignores_the_request() {
        let board = Board::new();
        let mut engine = ScriptedEngine::new();
        engine.score_for(&board.fen_with_holdings(), Score::Mate(2));
        engine.move_for(&board.fen_with_holdings(), Some("e2e4"));

        let req = request(PieceKind::Queen);
        let cfg = OrchestratorConfig::default();
        let mv = choose_move(&board, Some(&req), &mut engine, &cfg)
            .await
            .unwrap()
            .expect("a move");
        assert_eq!(mv.uci(), "e2e4");
        assert!(
            !engine.sent.iter().any(|c| c.contains("searchmoves")),
            "no restriction when already mating"
        );
    }

    #[tokio::test]
    async fn ghost_variant_is_always_reverted() {
        // No satisfying capture exists, so the bias path engages.
        let board = Board::new();
        let mut engine = ScriptedEngine::new().with_default_move("g1f3");
        engine.score_for(&board.fen_with_holdings(), Score::Cp(0));

        let req = request(PieceKind::Queen);
        let cfg = OrchestratorConfig {
            bias_mode: BiasMode::HighValue,
            ..OrchestratorConfig::default()
        };
        let mv = choose_move(&board, Some(&req), &mut engine, &cfg)
            .await
            .unwrap()
            .expect("a move");
        assert_eq!(mv.uci(), "g1f3");

        let set_ghost = engine
            .sent
            .iter()
            .position(|c| c == "setoption name UCI_Variant value ghost_highvalue_q")
            .expect("ghost variant was set");
        let set_back = engine
            .sent
            .iter()
            .rposition(|c| c == "setoption name UCI_Variant value bughouse")
            .expect("baseline variant restored");
        assert!(set_back > set_ghost, "revert happens after the override");
    }

    #[tokio::test]
    async fn proximity_prefers_lines_that_close_in() {
        let mut board = Board::empty();
        board.squares[sq("e1") as usize] = W_KING;
        board.squares[sq("a8") as usize] = B_KING;
        board.squares[sq("b2") as usize] = W_KNIGHT;
        board.squares[sq("g7") as usize] = B_QUEEN; // unreachable this turn

        let mut engine = ScriptedEngine::new().with_default_move("e1d1");
        let fen = board.fen_with_holdings();
        engine.score_for(&fen, Score::Cp(0));
        engine.lines_for(
            &fen,
            vec![
                SearchLine { multipv: 1, score: Score::Cp(5), pv: vec!["e1d1".into()] },
                SearchLine { multipv: 2, score: Score::Cp(3), pv: vec!["b2d3".into()] },
            ],
        );

        let req = request(PieceKind::Queen);
        let cfg = OrchestratorConfig {
            bias_mode: BiasMode::Proximity,
            ..OrchestratorConfig::default()
        };
        let mv = choose_move(&board, Some(&req), &mut engine, &cfg)
            .await
            .unwrap()
            .expect("a move");
        // e1d1 does not approach g7; b2d3 does.
        assert_eq!(mv.uci(), "b2d3");
        assert!(engine.sent.iter().any(|c| c == "setoption name MultiPV value 4"));
        assert!(engine.sent.iter().any(|c| c == "setoption name MultiPV value 1"));
    }
}
