//! The game controller.
//!
//! Owns both boards, the piece-flow coordinator, the clock bank, the per-bot
//! stall/request state, and three engine connections: one opposing the
//! human on board A, two alternating on board B. The session layer drives
//! it with player actions, periodic clock ticks, and partner-board loop
//! iterations; committed steps come back out as a broadcast event stream.

use bughouse_core::{Board, Color, Move, MoveRecord, PieceKind};
use rand::Rng;
use shared::{
    fulfills, BoardId, BotId, ChatLine, GameEvent, GameStateBody, GameStatus, PartnerRequest,
    Seat, StallRecord, StallScenario,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::OrchestratorConfig;
use crate::game::chat::{self, ChatLog};
use crate::game::clock::ClockBank;
use crate::game::error::{GameError, GameResult};
use crate::game::piece_flow::{PieceFlow, EXPECTED_CENSUS};
use crate::game::request::choose_move;
use crate::game::stalling::{evaluate_should_stall, StallEvaluation};
use crate::uci::{EngineLink, Score};

/// Annotation used when the engine fails to evaluate a position.
const EVAL_SENTINEL: &str = "(no eval)";

/// The three engine connections a game owns.
pub struct EngineSet<E> {
    pub bot1: E,
    pub partner: E,
    pub bot2: E,
}

impl<E> EngineSet<E> {
    fn for_bot(&mut self, bot: BotId) -> &mut E {
        match bot {
            BotId::Bot1 => &mut self.bot1,
            BotId::Partner => &mut self.partner,
            BotId::Bot2 => &mut self.bot2,
        }
    }

    /// The connection used for board-level queries (annotations, mate
    /// verification): board A's opponent engine, board B's partner engine.
    fn for_board(&mut self, board: BoardId) -> &mut E {
        match board {
            BoardId::A => &mut self.bot1,
            BoardId::B => &mut self.partner,
        }
    }
}

/// Per-bot decision state.
#[derive(Debug, Default, Clone, Copy)]
struct BotState {
    stall: Option<StallRecord>,
    inbound: Option<PartnerRequest>,
    /// One-shot latch: the next decision skips the stall evaluation.
    skip_stall_once: bool,
    /// Guards duplicate "I go" emissions on time abandonment.
    down_msg_sent: bool,
}

#[derive(Debug, Default)]
struct BotTable {
    bot1: BotState,
    partner: BotState,
    bot2: BotState,
}

impl BotTable {
    fn get(&self, bot: BotId) -> &BotState {
        match bot {
            BotId::Bot1 => &self.bot1,
            BotId::Partner => &self.partner,
            BotId::Bot2 => &self.bot2,
        }
    }

    fn get_mut(&mut self, bot: BotId) -> &mut BotState {
        match bot {
            BotId::Bot1 => &mut self.bot1,
            BotId::Partner => &mut self.partner,
            BotId::Bot2 => &mut self.bot2,
        }
    }
}

/// A chat line scheduled for later emission (the teammate's delayed ack).
struct PendingChat {
    remaining_s: f32,
    sender: Seat,
    text: String,
}

fn bot_for_seat(seat: Seat) -> Option<BotId> {
    match seat {
        Seat::Bot1 => Some(BotId::Bot1),
        Seat::Partner => Some(BotId::Partner),
        Seat::Bot2 => Some(BotId::Bot2),
        Seat::Human => None,
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

/// Render an evaluation for the move log: side-relative mate statements,
/// centipawns as signed decipawns.
fn format_annotation(score: Score, side_to_move: Color) -> String {
    match score {
        Score::Mate(n) => {
            let mater = if n >= 0 { side_to_move } else { side_to_move.opposite() };
            format!("{} mates in {}", color_name(mater), n.abs())
        }
        Score::Cp(cp) => format!("{:+}", cp / 10),
    }
}

pub struct GameController<E: EngineLink> {
    cfg: OrchestratorConfig,
    human_color: Color,
    boards: [Board; 2],
    flow: PieceFlow,
    /// Non-king men across both boards; recomputed when a position is
    /// loaded, conserved by every move and routing step afterwards.
    expected_census: u32,
    clocks: ClockBank,
    status: GameStatus,
    paused: bool,
    engines: Option<EngineSet<E>>,
    bots: BotTable,
    chat: ChatLog,
    pending_chats: Vec<PendingChat>,
    events: broadcast::Sender<GameEvent>,
}

impl<E: EngineLink> GameController<E> {
    pub fn new(cfg: OrchestratorConfig, human_color: Color, engines: EngineSet<E>) -> Self {
        let (events, _) = broadcast::channel(256);
        let clocks = ClockBank::new(cfg.initial_clock_s);
        GameController {
            cfg,
            human_color,
            boards: [Board::new(), Board::new()],
            flow: PieceFlow::new(),
            expected_census: EXPECTED_CENSUS,
            clocks,
            status: GameStatus::NotStarted,
            paused: false,
            engines: Some(engines),
            bots: BotTable::default(),
            chat: ChatLog::new(),
            pending_chats: Vec::new(),
            events,
        }
    }

    // --- accessors ----------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn board(&self, board: BoardId) -> &Board {
        &self.boards[board.index()]
    }

    pub fn human_color(&self) -> Color {
        self.human_color
    }

    fn partner_color(&self) -> Color {
        self.human_color.opposite()
    }

    pub fn clocks(&self) -> &ClockBank {
        &self.clocks
    }

    /// Direct clock access for the session's tick task and for tests.
    pub fn clocks_mut(&mut self) -> &mut ClockBank {
        &mut self.clocks
    }

    pub fn chat_lines(&self) -> &[ChatLine] {
        self.chat.lines()
    }

    pub fn stall_of(&self, bot: BotId) -> Option<StallRecord> {
        self.bots.get(bot).stall
    }

    pub fn inbound_request_of(&self, bot: BotId) -> Option<PartnerRequest> {
        self.bots.get(bot).inbound
    }

    pub fn state_body(&self) -> GameStateBody {
        GameStateBody {
            board_a_fen: self.boards[0].fen_with_holdings(),
            board_b_fen: self.boards[1].fen_with_holdings(),
            status: self.status,
            clocks_s: self.clocks.snapshot(),
            paused: self.paused,
        }
    }

    /// Hand the engine connections back (for release to the pool). Engine
    /// work after this fails with an invariant error.
    pub fn take_engines(&mut self) -> Option<EngineSet<E>> {
        self.engines.take()
    }

    /// Direct access to the engine connections, for diagnostics and tests.
    pub fn engines_mut(&mut self) -> Option<&mut EngineSet<E>> {
        self.engines.as_mut()
    }

    /// Replace one board with an arbitrary position ("join position"). The
    /// census baseline is re-derived from the loaded material.
    pub fn load_position(&mut self, board: BoardId, fen: &str) -> GameResult<()> {
        if self.status.is_over() {
            return Err(GameError::NotInProgress);
        }
        let idx = board.index();
        self.boards[idx] = Board::from_fen(fen)?;
        self.flow.reset_board(board);
        self.expected_census = PieceFlow::census_total(&self.boards);
        info!("[GAME] loaded position on {:?}", board);
        Ok(())
    }

    /// Which seat is to move on a board.
    pub fn seat_to_move(&self, board: BoardId) -> Seat {
        match board {
            BoardId::A => {
                if self.boards[0].side_to_move == self.human_color {
                    Seat::Human
                } else {
                    Seat::Bot1
                }
            }
            BoardId::B => {
                if self.boards[1].side_to_move == self.partner_color() {
                    Seat::Partner
                } else {
                    Seat::Bot2
                }
            }
        }
    }

    // --- lifecycle ----------------------------------------------------------

    /// Configure all three engines for bughouse and open the game.
    pub async fn initialize(&mut self) -> GameResult<()> {
        let variant_path = self.cfg.variant_file.display().to_string();
        let Some(engines) = self.engines.as_mut() else {
            return Err(GameError::Invariant("engines already released".into()));
        };
        for bot in BotId::ALL {
            let engine = engines.for_bot(bot);
            engine.set_option("VariantPath", &variant_path).await?;
            engine.set_option("UCI_Variant", "bughouse").await?;
        }
        self.set_status(GameStatus::InProgress);
        info!("[GAME] initialized, human plays {}", color_name(self.human_color));
        Ok(())
    }

    /// Kick off board A when the engine side moves first. Board B starts
    /// from the partner loop.
    pub async fn start(&mut self) -> GameResult<()> {
        if self.status != GameStatus::InProgress {
            return Err(GameError::NotInProgress);
        }
        if self.human_color == Color::Black {
            self.run_bot_turn(BotId::Bot1).await?;
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn resign(&mut self) {
        if !self.status.is_over() {
            info!("[GAME] player resigned");
            self.set_status(GameStatus::PlayerLost);
        }
    }

    // --- player actions -----------------------------------------------------

    pub async fn make_player_move(
        &mut self,
        from: i8,
        to: i8,
        promotion: Option<PieceKind>,
    ) -> GameResult<()> {
        self.ensure_in_progress()?;
        if self.seat_to_move(BoardId::A) != Seat::Human {
            return Err(GameError::NotPlayersTurn);
        }
        let record = self.boards[0].apply_normal(from, to, promotion)?;
        self.commit(BoardId::A, Seat::Human, record).await?;
        if !self.status.is_over() {
            self.run_bot_turn(BotId::Bot1).await?;
        }
        Ok(())
    }

    pub async fn drop_piece(&mut self, square: i8, piece: PieceKind) -> GameResult<()> {
        self.ensure_in_progress()?;
        if self.seat_to_move(BoardId::A) != Seat::Human {
            return Err(GameError::NotPlayersTurn);
        }
        let color = self.human_color;
        let record = self.boards[0].apply_drop(square, piece, color)?;
        self.commit(BoardId::A, Seat::Human, record).await?;
        if !self.status.is_over() {
            self.run_bot_turn(BotId::Bot1).await?;
        }
        Ok(())
    }

    /// Player tells the partner to sit. Only a `Go` releases it.
    pub fn send_sit_command(&mut self) {
        let state = self.bots.get_mut(BotId::Partner);
        if state.stall.is_none() {
            state.stall = Some(StallRecord {
                piece: None,
                reason: StallScenario::PlayerCommand,
                player_induced: true,
            });
            state.down_msg_sent = false;
            self.post_chat(
                Seat::Partner,
                chat::scenario_text(None, StallScenario::PlayerCommand, None),
            );
        }
    }

    /// Player releases the partner. A one-turn latch prevents an immediate
    /// re-stall.
    pub fn send_go_command(&mut self) {
        let state = self.bots.get_mut(BotId::Partner);
        if state.stall.take().is_some() {
            state.skip_stall_once = true;
            self.clear_outbound_request(BotId::Partner);
            self.post_chat(Seat::Partner, chat::I_GO);
        }
    }

    // --- clocks and timers --------------------------------------------------

    /// Advance the clocks and the delayed chat queue. Driven by a periodic
    /// session tick, independent of move commits, so sitting bots drain.
    pub fn tick(&mut self, dt: f32) {
        if self.status != GameStatus::InProgress || self.paused {
            return;
        }
        for board in [BoardId::A, BoardId::B] {
            let seat = self.seat_to_move(board);
            self.clocks.tick_seat(seat, dt);
        }

        let mut due = Vec::new();
        self.pending_chats.retain_mut(|pending| {
            pending.remaining_s -= dt;
            if pending.remaining_s <= 0.0 {
                due.push((pending.sender, std::mem::take(&mut pending.text)));
                false
            } else {
                true
            }
        });
        for (sender, text) in due {
            self.post_chat(sender, text);
        }

        if let Some(seat) = self.clocks.flagged() {
            info!("[GAME] {:?} flagged", seat);
            self.set_status(match seat {
                Seat::Human => GameStatus::PlayerLost,
                Seat::Bot1 => GameStatus::PlayerWon,
                Seat::Partner => GameStatus::PartnerLost,
                Seat::Bot2 => GameStatus::PartnerWon,
            });
        }
    }

    // --- partner-board loop -------------------------------------------------

    /// One iteration of the partner-board loop: abandon overtime stalls,
    /// honor pause, then let the bot on move decide. The session layer
    /// sleeps between iterations.
    pub async fn partner_tick(&mut self) -> GameResult<()> {
        if self.status.is_over() {
            return Ok(());
        }
        let released = self.abandon_overtime_stalls();
        // A released board-A bot moves right away; board B is picked up by
        // the normal flow below.
        if released.contains(&BotId::Bot1)
            && !self.paused
            && self.seat_to_move(BoardId::A) == Seat::Bot1
        {
            self.run_bot_turn(BotId::Bot1).await?;
        }
        if self.paused || self.status.is_over() {
            return Ok(());
        }
        let bot = match self.seat_to_move(BoardId::B) {
            Seat::Partner => BotId::Partner,
            _ => BotId::Bot2,
        };
        self.run_bot_turn(bot).await
    }

    /// Exit every stall whose owner is no longer up on time. Player-induced
    /// stalls only exit via `Go`.
    fn abandon_overtime_stalls(&mut self) -> Vec<BotId> {
        let mut released = Vec::new();
        for bot in BotId::ALL {
            let Some(stall) = self.bots.get(bot).stall else {
                continue;
            };
            if stall.player_induced {
                continue;
            }
            if self.clocks.up_on_time(bot.seat()) {
                continue;
            }
            let state = self.bots.get_mut(bot);
            state.stall = None;
            state.skip_stall_once = true;
            let announce = !state.down_msg_sent;
            state.down_msg_sent = true;
            self.clear_outbound_request(bot);
            if announce {
                self.post_chat(bot.seat(), chat::I_GO);
            }
            info!("[STALL] {:?} abandoned its stall on time", bot);
            released.push(bot);
        }
        released
    }

    // --- bot turns ----------------------------------------------------------

    /// Run one bot's decision cycle: sit, or pick and commit a move.
    pub async fn run_bot_turn(&mut self, bot: BotId) -> GameResult<()> {
        if self.status.is_over() {
            return Ok(());
        }
        let board_id = bot.seat().board();
        let idx = board_id.index();
        if self.seat_to_move(board_id) != bot.seat() {
            return Ok(());
        }
        // Sitting means the bot does not move; its clock keeps draining.
        if self.bots.get(bot).stall.is_some() {
            return Ok(());
        }

        let skip = std::mem::take(&mut self.bots.get_mut(bot).skip_stall_once);
        if !skip {
            let roll = rand::thread_rng().gen::<f64>();
            let engine = match self.engines.as_mut() {
                Some(set) => set.for_bot(bot),
                None => return Err(GameError::Invariant("engines already released".into())),
            };
            let decision =
                evaluate_should_stall(&self.boards[idx], bot, engine, &self.clocks, &self.cfg, roll)
                    .await?;
            if let Some(eval) = decision {
                if eval.should_stall {
                    self.enter_stall(bot, eval);
                    return Ok(());
                }
            }
        }

        let inbound = self.bots.get(bot).inbound;
        let engine = match self.engines.as_mut() {
            Some(set) => set.for_bot(bot),
            None => return Err(GameError::Invariant("engines already released".into())),
        };
        let chosen = choose_move(&self.boards[idx], inbound.as_ref(), engine, &self.cfg).await?;
        let Some(mv) = chosen else {
            // No move from the engine: the position is terminal.
            return self.check_terminal(board_id).await;
        };

        let record = match self.boards[idx].apply(mv) {
            Ok(record) => record,
            Err(err) => {
                warn!("[GAME] {:?} proposed illegal {}: {}", bot, mv.uci(), err);
                self.recover_with_plain_move(bot, board_id, mv).await?
            }
        };
        self.commit(board_id, bot.seat(), record).await
    }

    /// A biased or stale engine move was rejected by the board; re-sync and
    /// take the plain best move instead.
    async fn recover_with_plain_move(
        &mut self,
        bot: BotId,
        board_id: BoardId,
        rejected: Move,
    ) -> GameResult<MoveRecord> {
        let idx = board_id.index();
        let fen = self.boards[idx].fen_with_holdings();
        let side = self.boards[idx].side_to_move;
        let move_time = self.cfg.move_time_ms;
        let engine = match self.engines.as_mut() {
            Some(set) => set.for_bot(bot),
            None => return Err(GameError::Invariant("engines already released".into())),
        };
        engine.set_position(&fen, &[]).await?;
        let fallback = engine
            .best_move(move_time)
            .await?
            .and_then(|s| Move::parse_uci(&s, side));
        match fallback {
            Some(mv) if mv != rejected => match self.boards[idx].apply(mv) {
                Ok(record) => Ok(record),
                Err(e) => {
                    self.abort(format!("fallback move {} also illegal: {}", mv.uci(), e));
                    Err(GameError::Invariant("engine and board disagree".into()))
                }
            },
            _ => {
                self.abort(format!("no legal engine move on {:?}", board_id));
                Err(GameError::Invariant("engine and board disagree".into()))
            }
        }
    }

    // --- stall state machine ------------------------------------------------

    fn enter_stall(&mut self, bot: BotId, eval: StallEvaluation) {
        info!(
            "[STALL] {:?} sits: {:?} via {:?}",
            bot, eval.scenario, eval.piece
        );
        let state = self.bots.get_mut(bot);
        state.stall = Some(StallRecord {
            piece: Some(eval.piece),
            reason: eval.scenario,
            player_induced: false,
        });
        state.down_msg_sent = false;
        self.post_chat(
            bot.seat(),
            chat::scenario_text(Some(eval.piece), eval.scenario, eval.mate_distance),
        );

        // Mated (and player-commanded) sits ask nothing of the teammate.
        if matches!(eval.scenario, StallScenario::Mated | StallScenario::PlayerCommand) {
            return;
        }
        let teammate_seat = bot.request_partner();
        if let Some(teammate) = bot_for_seat(teammate_seat) {
            self.bots.get_mut(teammate).inbound = Some(PartnerRequest {
                piece: eval.piece,
                reason: eval.scenario,
                requested_by: bot,
            });
            self.pending_chats.push(PendingChat {
                remaining_s: self.cfg.ack_delay_s,
                sender: teammate_seat,
                text: chat::WILL_TRY.to_string(),
            });
        }
        // The human teammate sees the scenario chat; nothing is stored.
    }

    /// Drop the inbound copy of `bot`'s outstanding request from its
    /// teammate, if that teammate is a bot.
    fn clear_outbound_request(&mut self, bot: BotId) {
        if let Some(teammate) = bot_for_seat(bot.request_partner()) {
            let state = self.bots.get_mut(teammate);
            if state.inbound.map(|r| r.requested_by) == Some(bot) {
                state.inbound = None;
            }
        }
    }

    /// React to a committed capture: a sitting bot whose correct partner
    /// just captured a satisfying piece gets back up.
    fn check_fulfillment(&mut self, by: Seat, captured: PieceKind) {
        for bot in BotId::ALL {
            let Some(stall) = self.bots.get(bot).stall else {
                continue;
            };
            let Some(asked) = stall.piece else {
                continue;
            };
            if stall.player_induced {
                continue;
            }
            if bot.request_partner() != by {
                continue;
            }
            if !fulfills(asked, captured) {
                continue;
            }
            self.bots.get_mut(bot).stall = None;
            self.clear_outbound_request(bot);
            self.post_chat(bot.seat(), chat::THANKS);
            let _ = self.events.send(GameEvent::RequestFulfilled { bot, piece: captured });
            info!("[STALL] {:?} fulfilled by {:?} capturing {:?}", bot, by, captured);
        }
    }

    // --- commit pipeline ----------------------------------------------------

    /// Everything that happens after a move is applied to a board, in fixed
    /// order: pool routing, census check, annotation, events, fulfillment,
    /// terminal detection.
    async fn commit(&mut self, board_id: BoardId, by: Seat, record: MoveRecord) -> GameResult<()> {
        let idx = board_id.index();
        let delivered = self.flow.route(&mut self.boards, board_id);

        let total = PieceFlow::census_total(&self.boards);
        if total != self.expected_census {
            self.abort(format!("piece census {} != {}", total, self.expected_census));
            return Err(GameError::Invariant("piece census broken".into()));
        }

        let annotation = self.annotate(board_id).await;
        let _ = self.events.send(GameEvent::MoveApplied {
            board: board_id,
            ply: self.boards[idx].ply() as u32,
            notation: record.mv.uci(),
            by,
            annotation,
        });
        for &(color, piece) in &delivered {
            let _ = self.events.send(GameEvent::CaptureDelivered {
                from_board: board_id,
                piece,
                color,
            });
        }
        if let Some((_, captured)) = record.captured {
            self.check_fulfillment(by, captured);
        }
        self.check_terminal(board_id).await
    }

    /// Depth-limited evaluation of the position after a move. Failures are
    /// swallowed into the sentinel; play continues.
    async fn annotate(&mut self, board_id: BoardId) -> Option<String> {
        let idx = board_id.index();
        let fen = self.boards[idx].fen_with_holdings();
        let side = self.boards[idx].side_to_move;
        let depth = self.cfg.eval_depth;
        let engine = self.engines.as_mut()?.for_board(board_id);
        let evaluated = async {
            engine.set_position(&fen, &[]).await?;
            engine.evaluate(depth).await
        }
        .await;
        match evaluated {
            Ok(eval) => Some(format_annotation(eval.score, side)),
            Err(e) => {
                warn!("[GAME] annotation failed on {:?}: {}", board_id, e);
                Some(EVAL_SENTINEL.to_string())
            }
        }
    }

    /// Standard mate is not enough in bughouse: a future drop could still
    /// parry. Give the mated side a phantom queen and let the engine look
    /// for any escape; only a still-hopeless position ends the game.
    async fn verify_true_checkmate(&mut self, board_id: BoardId) -> GameResult<bool> {
        let idx = board_id.index();
        let mated = self.boards[idx].side_to_move;
        let real_fen = self.boards[idx].fen_with_holdings();
        let mut probe = self.boards[idx].clone();
        probe.holdings.add(mated, PieceKind::Queen);
        let probe_fen = probe.fen_with_holdings();
        let verify_ms = self.cfg.verify_move_time_ms;

        let engine = match self.engines.as_mut() {
            Some(set) => set.for_board(board_id),
            None => return Err(GameError::Invariant("engines already released".into())),
        };
        engine.set_position(&probe_fen, &[]).await?;
        let escape = engine.best_move(verify_ms).await?;
        // Holdings were only touched on the clone; re-sync the real position.
        engine.set_position(&real_fen, &[]).await?;
        Ok(escape.is_none())
    }

    async fn check_terminal(&mut self, board_id: BoardId) -> GameResult<()> {
        let idx = board_id.index();
        if self.boards[idx].is_checkmate() {
            if self.verify_true_checkmate(board_id).await? {
                let mated = self.boards[idx].side_to_move;
                let status = match board_id {
                    BoardId::A => {
                        if mated == self.human_color {
                            GameStatus::PlayerLost
                        } else {
                            GameStatus::PlayerWon
                        }
                    }
                    BoardId::B => {
                        if mated == self.partner_color() {
                            GameStatus::PartnerLost
                        } else {
                            GameStatus::PartnerWon
                        }
                    }
                };
                info!("[GAME] true checkmate on {:?}, {:?}", board_id, status);
                self.set_status(status);
            } else {
                info!("[GAME] standard mate on {:?} refuted by drop probe", board_id);
            }
            return Ok(());
        }
        // Stalemate only binds when the stalled side has nothing to drop.
        let stm = self.boards[idx].side_to_move;
        if self.boards[idx].is_stalemate() && self.boards[idx].holdings.is_empty(stm) {
            info!("[GAME] stalemate on {:?}", board_id);
            self.set_status(GameStatus::Draw);
        }
        Ok(())
    }

    // --- internals ----------------------------------------------------------

    fn ensure_in_progress(&self) -> GameResult<()> {
        if self.status != GameStatus::InProgress {
            return Err(GameError::NotInProgress);
        }
        Ok(())
    }

    fn set_status(&mut self, status: GameStatus) {
        if self.status != status {
            self.status = status;
            let _ = self.events.send(GameEvent::StatusChanged(status));
        }
    }

    fn post_chat(&mut self, sender: Seat, text: impl Into<String>) {
        let line = self.chat.post(sender, text);
        let _ = self.events.send(GameEvent::ChatPosted(line));
    }

    fn abort(&mut self, reason: String) {
        error!("[GAME] aborting: {}", reason);
        self.set_status(GameStatus::Finished);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::ScriptedEngine;

    fn controller() -> GameController<ScriptedEngine> {
        GameController::new(
            OrchestratorConfig::default(),
            Color::White,
            EngineSet {
                bot1: ScriptedEngine::new(),
                partner: ScriptedEngine::new(),
                bot2: ScriptedEngine::new(),
            },
        )
    }

    #[tokio::test]
    async fn initialize_configures_all_engines_and_opens_the_game() {
        let mut ctl = controller();
        ctl.initialize().await.expect("initializes");
        assert_eq!(ctl.status(), GameStatus::InProgress);
        let engines = ctl.take_engines().expect("engines present");
        for engine in [&engines.bot1, &engines.partner, &engines.bot2] {
            assert!(engine
                .sent
                .iter()
                .any(|c| c == "setoption name UCI_Variant value bughouse"));
            assert!(engine.sent.iter().any(|c| c.contains("VariantPath")));
        }
    }

    #[tokio::test]
    async fn player_cannot_move_before_initialize() {
        let mut ctl = controller();
        let err = ctl.make_player_move(12, 28, None).await;
        assert!(matches!(err, Err(GameError::NotInProgress)));
    }

    #[tokio::test]
    async fn sit_then_go_sets_the_one_turn_latch() {
        let mut ctl = controller();
        ctl.send_sit_command();
        let stall = ctl.stall_of(BotId::Partner).expect("partner sits");
        assert!(stall.player_induced);
        assert_eq!(stall.reason, StallScenario::PlayerCommand);
        assert_eq!(stall.piece, None);

        // Time-based abandonment must not release a player-induced sit.
        ctl.clocks_mut().set(Seat::Partner, 1.0);
        let released = ctl.abandon_overtime_stalls();
        assert!(released.is_empty());
        assert!(ctl.stall_of(BotId::Partner).is_some());

        ctl.send_go_command();
        assert!(ctl.stall_of(BotId::Partner).is_none());
        assert!(ctl.bots.get(BotId::Partner).skip_stall_once, "latch armed");
        let texts: Vec<&str> = ctl.chat_lines().iter().map(|l| l.text.as_str()).collect();
        assert!(texts.contains(&"I go"));
    }

    #[tokio::test]
    async fn resign_freezes_the_game() {
        let mut ctl = controller();
        ctl.initialize().await.unwrap();
        ctl.resign();
        assert_eq!(ctl.status(), GameStatus::PlayerLost);
        let err = ctl.make_player_move(12, 28, None).await;
        assert!(matches!(err, Err(GameError::NotInProgress)));
    }

    #[tokio::test]
    async fn clock_flag_ends_the_game() {
        let mut ctl = controller();
        ctl.initialize().await.unwrap();
        ctl.clocks_mut().set(Seat::Partner, 0.0);
        ctl.tick(0.1);
        assert_eq!(ctl.status(), GameStatus::PartnerLost);
    }

    #[tokio::test]
    async fn delayed_chat_fires_after_its_deadline() {
        let mut ctl = controller();
        ctl.initialize().await.unwrap();
        ctl.pending_chats.push(PendingChat {
            remaining_s: 1.0,
            sender: Seat::Bot2,
            text: chat::WILL_TRY.to_string(),
        });
        ctl.tick(0.5);
        assert!(!ctl.chat_lines().iter().any(|l| l.text == chat::WILL_TRY));
        ctl.tick(0.6);
        assert!(ctl.chat_lines().iter().any(|l| l.text == chat::WILL_TRY));
    }
}
