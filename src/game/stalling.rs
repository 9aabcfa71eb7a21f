//! The should-stall evaluation.
//!
//! Before a bot moves, the controller asks: would one more held piece turn
//! this position around? The answer comes from depth-limited engine probes
//! against hypothetical holdings, normalized to the bot's perspective and
//! gated by the diagonal-time rule plus a per-piece, per-scenario
//! probability table.

use bughouse_core::types::HELD_KINDS;
use bughouse_core::{Board, Color, PieceKind};
use shared::{BotId, StallScenario};
use tracing::{debug, warn};

use crate::config::OrchestratorConfig;
use crate::game::clock::ClockBank;
use crate::uci::{EngineLink, Score, UciError, UciResult};

/// A score re-expressed from the side-to-move bot's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    /// We deliver mate in n.
    Mating(i32),
    /// We are mated in n.
    MatedIn(i32),
    /// Positional value in centipawns, positive is good for us.
    Cp(i32),
}

/// Outcome of one decision cycle's stall evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallEvaluation {
    pub piece: PieceKind,
    pub scenario: StallScenario,
    pub should_stall: bool,
    pub mate_distance: Option<i32>,
}

/// Normalize an engine score to "our side's perspective". Mate scores pass
/// through (they are already side-to-move relative); centipawn scores flip
/// sign when White is to move. Mates longer than the cutoff collapse to the
/// centipawn sentinel: winning, but not a forced line worth sitting on.
pub fn normalize(score: Score, side_to_move: Color, cfg: &OrchestratorConfig) -> Normalized {
    match score {
        Score::Mate(n) if n > 0 => {
            if n > cfg.long_mate_cutoff {
                Normalized::Cp(cfg.long_mate_sentinel_cp)
            } else {
                Normalized::Mating(n)
            }
        }
        Score::Mate(n) => {
            let distance = -n;
            if distance > cfg.long_mate_cutoff {
                Normalized::Cp(-cfg.long_mate_sentinel_cp)
            } else {
                Normalized::MatedIn(distance)
            }
        }
        Score::Cp(cp) => Normalized::Cp(if side_to_move == Color::White { -cp } else { cp }),
    }
}

/// Classify what one extra held piece would buy us. `current` is never
/// `Mating` here; the cycle bails out earlier on winning lines.
pub fn classify(
    current: Normalized,
    hypothetical: Normalized,
    piece: PieceKind,
    cfg: &OrchestratorConfig,
) -> Option<StallScenario> {
    if matches!(hypothetical, Normalized::Mating(_)) {
        return Some(StallScenario::ForcesMate);
    }
    if matches!(current, Normalized::MatedIn(_)) && !matches!(hypothetical, Normalized::MatedIn(_))
    {
        return Some(StallScenario::SavesFromMate);
    }
    if matches!(piece, PieceKind::Pawn | PieceKind::Knight | PieceKind::Bishop) {
        if let (Normalized::Cp(now), Normalized::Cp(then)) = (current, hypothetical) {
            if now < -cfg.losing_threshold_cp && then > cfg.winning_threshold_cp {
                return Some(StallScenario::LostToWinning);
            }
        }
    }
    None
}

/// Evaluate the position with one extra held piece of our color. `None`
/// when the engine produced no usable evaluation.
async fn hypothetical<E: EngineLink>(
    board: &Board,
    piece: PieceKind,
    us: Color,
    engine: &mut E,
    cfg: &OrchestratorConfig,
) -> UciResult<Option<Normalized>> {
    let mut probe = board.clone();
    probe.holdings.add(us, piece);
    engine.set_position(&probe.fen_with_holdings(), &[]).await?;
    match engine.evaluate(cfg.eval_depth).await {
        Ok(eval) => Ok(Some(normalize(eval.score, us, cfg))),
        Err(UciError::NoEvaluation) => {
            warn!("[STALL] no evaluation for hypothetical {:?}", piece);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Run the should-stall procedure for the bot on move. Returns `None` when
/// no held piece changes the assessment (or we are simply winning). The
/// engine is always left re-synced on the real position.
pub async fn evaluate_should_stall<E: EngineLink>(
    board: &Board,
    bot: BotId,
    engine: &mut E,
    clocks: &ClockBank,
    cfg: &OrchestratorConfig,
    roll: f64,
) -> UciResult<Option<StallEvaluation>> {
    let us = board.side_to_move;
    let real_fen = board.fen_with_holdings();
    engine.set_position(&real_fen, &[]).await?;
    let current = match engine.evaluate(cfg.eval_depth).await {
        Ok(eval) => normalize(eval.score, us, cfg),
        Err(UciError::NoEvaluation) => {
            warn!("[STALL] {:?}: no current evaluation, skipping stall check", bot);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let up_on_time = clocks.up_on_time(bot.seat());
    let outcome = match current {
        // Never sit on a winning line.
        Normalized::Mating(_) => None,
        Normalized::MatedIn(1) => {
            let mut saved_by = None;
            for piece in HELD_KINDS {
                if let Some(hyp) = hypothetical(board, piece, us, engine, cfg).await? {
                    if !matches!(hyp, Normalized::MatedIn(_)) {
                        saved_by = Some(piece);
                        break;
                    }
                }
            }
            Some(match saved_by {
                // A literal mate-in-1 save is certain, time permitting.
                Some(piece) => StallEvaluation {
                    piece,
                    scenario: StallScenario::SavesMateIn1,
                    should_stall: up_on_time,
                    mate_distance: Some(1),
                },
                None => StallEvaluation {
                    piece: PieceKind::Queen,
                    scenario: StallScenario::Mated,
                    should_stall: up_on_time,
                    mate_distance: Some(1),
                },
            })
        }
        _ => {
            let mut found = None;
            for piece in HELD_KINDS {
                let Some(hyp) = hypothetical(board, piece, us, engine, cfg).await? else {
                    continue;
                };
                if let Some(scenario) = classify(current, hyp, piece, cfg) {
                    let p = cfg.stall_table.probability(piece, scenario);
                    let mate_distance = match (scenario, hyp, current) {
                        (StallScenario::ForcesMate, Normalized::Mating(n), _) => Some(n),
                        (StallScenario::SavesFromMate, _, Normalized::MatedIn(n)) => Some(n),
                        _ => None,
                    };
                    debug!(
                        "[STALL] {:?}: {:?} -> {:?} with {:?} (p={})",
                        bot, current, hyp, piece, p
                    );
                    found = Some(StallEvaluation {
                        piece,
                        scenario,
                        should_stall: up_on_time && roll < p,
                        mate_distance,
                    });
                    break;
                }
            }
            found
        }
    };

    // Hypothetical probes leave the engine on a fabricated position;
    // re-issue the real one before any move selection.
    engine.set_position(&real_fen, &[]).await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::ScriptedEngine;
    use shared::Seat;

    fn cfg() -> OrchestratorConfig {
        OrchestratorConfig::default()
    }

    #[test]
    fn mate_scores_pass_through_within_the_cutoff() {
        let cfg = cfg();
        assert_eq!(normalize(Score::Mate(3), Color::White, &cfg), Normalized::Mating(3));
        assert_eq!(normalize(Score::Mate(-2), Color::Black, &cfg), Normalized::MatedIn(2));
    }

    #[test]
    fn long_mates_collapse_to_the_sentinel() {
        let cfg = cfg();
        assert_eq!(normalize(Score::Mate(6), Color::White, &cfg), Normalized::Cp(5000));
        assert_eq!(normalize(Score::Mate(-6), Color::White, &cfg), Normalized::Cp(-5000));
        assert_eq!(normalize(Score::Mate(5), Color::White, &cfg), Normalized::Mating(5));
    }

    #[test]
    fn centipawns_flip_sign_when_white_is_to_move() {
        let cfg = cfg();
        assert_eq!(normalize(Score::Cp(150), Color::White, &cfg), Normalized::Cp(-150));
        assert_eq!(normalize(Score::Cp(150), Color::Black, &cfg), Normalized::Cp(150));
        assert_eq!(normalize(Score::Cp(-40), Color::White, &cfg), Normalized::Cp(40));
    }

    #[test]
    fn classify_forces_mate_beats_other_scenarios() {
        let cfg = cfg();
        assert_eq!(
            classify(Normalized::Cp(-500), Normalized::Mating(3), PieceKind::Knight, &cfg),
            Some(StallScenario::ForcesMate)
        );
        // Even from a mated position, a flip to mating reads as forces_mate.
        assert_eq!(
            classify(Normalized::MatedIn(3), Normalized::Mating(2), PieceKind::Pawn, &cfg),
            Some(StallScenario::ForcesMate)
        );
    }

    #[test]
    fn classify_saves_from_mate() {
        let cfg = cfg();
        assert_eq!(
            classify(Normalized::MatedIn(3), Normalized::Cp(-80), PieceKind::Rook, &cfg),
            Some(StallScenario::SavesFromMate)
        );
        assert_eq!(
            classify(Normalized::MatedIn(3), Normalized::MatedIn(4), PieceKind::Rook, &cfg),
            None,
            "still mated is not saved"
        );
    }

    #[test]
    fn classify_lost_to_winning_is_minor_pieces_only() {
        let cfg = cfg();
        assert_eq!(
            classify(Normalized::Cp(-400), Normalized::Cp(250), PieceKind::Pawn, &cfg),
            Some(StallScenario::LostToWinning)
        );
        assert_eq!(
            classify(Normalized::Cp(-400), Normalized::Cp(250), PieceKind::Rook, &cfg),
            None
        );
        assert_eq!(
            classify(Normalized::Cp(-301), Normalized::Cp(201), PieceKind::Bishop, &cfg),
            Some(StallScenario::LostToWinning),
            "thresholds are strict"
        );
        assert_eq!(
            classify(Normalized::Cp(-300), Normalized::Cp(250), PieceKind::Bishop, &cfg),
            None,
            "-300 is not losing by more than 300"
        );
        assert_eq!(
            classify(Normalized::Cp(-400), Normalized::Cp(200), PieceKind::Bishop, &cfg),
            None,
            "+200 is not winning by more than 200"
        );
    }

    #[test]
    fn long_mate_sentinel_interacts_with_lost_to_winning() {
        // A long mate against us counts as losing; a hypothetical long mate
        // for us counts as winning. |5000| clears both thresholds.
        let cfg = cfg();
        let against = normalize(Score::Mate(-7), Color::Black, &cfg);
        let for_us = normalize(Score::Mate(7), Color::Black, &cfg);
        assert_eq!(against, Normalized::Cp(-5000));
        assert_eq!(for_us, Normalized::Cp(5000));
        assert_eq!(
            classify(against, for_us, PieceKind::Pawn, &cfg),
            Some(StallScenario::LostToWinning)
        );
    }

    // --- full cycle against the scripted engine -----------------------------

    fn board_with_scores(
        engine: &mut ScriptedEngine,
        current: Score,
        per_piece: &[(PieceKind, Score)],
    ) -> Board {
        let board = {
            let mut b = Board::new();
            // Black to move so centipawn scores read unflipped.
            b.apply_normal(12, 28, None).unwrap(); // e2e4
            b
        };
        engine.score_for(&board.fen_with_holdings(), current);
        for &(piece, score) in per_piece {
            let mut probe = board.clone();
            probe.holdings.add(Color::Black, piece);
            engine.score_for(&probe.fen_with_holdings(), score);
        }
        board
    }

    fn clocks_up_for(seat: Seat) -> ClockBank {
        let mut clocks = ClockBank::new(300.0);
        clocks.set(seat, 400.0);
        clocks
    }

    #[tokio::test]
    async fn knight_forcing_mate_triggers_a_stall() {
        let mut engine = ScriptedEngine::new();
        let board = board_with_scores(
            &mut engine,
            Score::Cp(-150),
            &[(PieceKind::Knight, Score::Mate(3))],
        );
        let clocks = clocks_up_for(Seat::Bot1);

        let eval = evaluate_should_stall(&board, BotId::Bot1, &mut engine, &clocks, &cfg(), 0.5)
            .await
            .expect("cycle runs")
            .expect("scenario found");
        assert_eq!(eval.piece, PieceKind::Knight);
        assert_eq!(eval.scenario, StallScenario::ForcesMate);
        assert_eq!(eval.mate_distance, Some(3));
        assert!(eval.should_stall, "0.5 < 0.95 and up on time");

        // The engine is re-synced on the real position afterwards.
        assert_eq!(engine.position(), board.fen_with_holdings());
    }

    #[tokio::test]
    async fn stall_requires_being_up_on_time() {
        let mut engine = ScriptedEngine::new();
        let board = board_with_scores(
            &mut engine,
            Score::Cp(-150),
            &[(PieceKind::Knight, Score::Mate(3))],
        );
        let clocks = ClockBank::new(300.0); // equal clocks: not up

        let eval = evaluate_should_stall(&board, BotId::Bot1, &mut engine, &clocks, &cfg(), 0.01)
            .await
            .unwrap()
            .expect("scenario still reported");
        assert!(!eval.should_stall, "equal clocks never stall");
    }

    #[tokio::test]
    async fn winning_lines_never_sit() {
        let mut engine = ScriptedEngine::new();
        let board = board_with_scores(&mut engine, Score::Mate(2), &[]);
        let clocks = clocks_up_for(Seat::Bot1);
        let eval = evaluate_should_stall(&board, BotId::Bot1, &mut engine, &clocks, &cfg(), 0.0)
            .await
            .unwrap();
        assert_eq!(eval, None);
    }

    #[tokio::test]
    async fn unsaveable_mate_in_1_reports_mated_with_queen() {
        let mut engine = ScriptedEngine::new();
        let all_lost: Vec<(PieceKind, Score)> = HELD_KINDS
            .iter()
            .map(|&p| (p, Score::Mate(-1)))
            .collect();
        let board = board_with_scores(&mut engine, Score::Mate(-1), &all_lost);
        let clocks = clocks_up_for(Seat::Bot1);

        let eval = evaluate_should_stall(&board, BotId::Bot1, &mut engine, &clocks, &cfg(), 0.99)
            .await
            .unwrap()
            .expect("mated scenario");
        assert_eq!(eval.scenario, StallScenario::Mated);
        assert_eq!(eval.piece, PieceKind::Queen);
        assert!(eval.should_stall, "gates on time alone");
    }

    #[tokio::test]
    async fn saveable_mate_in_1_is_certain() {
        let mut engine = ScriptedEngine::new();
        let board = board_with_scores(
            &mut engine,
            Score::Mate(-1),
            &[
                (PieceKind::Pawn, Score::Mate(-1)),
                (PieceKind::Knight, Score::Cp(-20)),
                (PieceKind::Bishop, Score::Mate(-1)),
                (PieceKind::Rook, Score::Mate(-1)),
                (PieceKind::Queen, Score::Mate(-1)),
            ],
        );
        let clocks = clocks_up_for(Seat::Bot1);

        let eval = evaluate_should_stall(&board, BotId::Bot1, &mut engine, &clocks, &cfg(), 0.999)
            .await
            .unwrap()
            .expect("saveable");
        assert_eq!(eval.scenario, StallScenario::SavesMateIn1);
        assert_eq!(eval.piece, PieceKind::Knight, "first saving piece in probe order");
        assert!(eval.should_stall);
    }
}
