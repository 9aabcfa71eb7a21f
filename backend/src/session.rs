//! A running game: controller plus its background tasks.
//!
//! Each session owns an orchestrator controller behind an async mutex and
//! three tasks around it: the clock tick, the partner-board loop, and the
//! event persister. Engines come from the process-wide pool and go back to
//! it when the game ends.

use std::sync::Arc;
use std::time::Duration;

use bughouse_core::Color;
use shared::{GameEvent, GameStatus};
use sqlx::{Pool, Sqlite};
use tandem::game::{EngineSet, GameController, GameError};
use tandem::pool::{EngineFactory, EnginePool, PoolResult};
use tandem::uci::{EngineLink, UciError};
use tandem::OrchestratorConfig;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

const CLOCK_TICK_S: f32 = 0.25;

pub struct GameSession<E: EngineLink> {
    pub id: Uuid,
    pub controller: Arc<Mutex<GameController<E>>>,
}

/// Acquire engines, initialize the controller, and start the background
/// tasks. On any setup failure the engines go straight back to the pool.
pub async fn launch<F: EngineFactory>(
    id: Uuid,
    cfg: OrchestratorConfig,
    human_color: Color,
    pool: Arc<EnginePool<F>>,
    db: Pool<Sqlite>,
) -> Result<GameSession<F::Engine>, GameError> {
    let set = acquire_three(&pool).await?;
    let mut controller = GameController::new(cfg.clone(), human_color, set);

    if let Err(e) = async {
        controller.initialize().await?;
        controller.start().await
    }
    .await
    {
        if let Some(set) = controller.take_engines() {
            release_set(&pool, set).await;
        }
        return Err(e);
    }

    let events = controller.subscribe();
    let controller = Arc::new(Mutex::new(controller));

    spawn_clock_task(Arc::clone(&controller));
    spawn_partner_loop(Arc::clone(&controller), Arc::clone(&pool), cfg.loop_delay);
    spawn_persister(id, Arc::clone(&controller), events, db);

    info!("[SESSION] game {} launched", id);
    Ok(GameSession { id, controller })
}

async fn acquire_three<F: EngineFactory>(
    pool: &Arc<EnginePool<F>>,
) -> PoolResult<EngineSet<F::Engine>> {
    let bot1 = pool.try_acquire().await?;
    let partner = match pool.try_acquire().await {
        Ok(engine) => engine,
        Err(e) => {
            pool.release(bot1).await;
            return Err(e);
        }
    };
    let bot2 = match pool.try_acquire().await {
        Ok(engine) => engine,
        Err(e) => {
            pool.release(bot1).await;
            pool.release(partner).await;
            return Err(e);
        }
    };
    Ok(EngineSet { bot1, partner, bot2 })
}

async fn release_set<F: EngineFactory>(pool: &EnginePool<F>, set: EngineSet<F::Engine>) {
    pool.release(set.bot1).await;
    pool.release(set.partner).await;
    pool.release(set.bot2).await;
}

async fn retire_set<F: EngineFactory>(
    pool: &EnginePool<F>,
    set: EngineSet<F::Engine>,
    reason: &UciError,
) {
    pool.retire(set.bot1, reason).await;
    pool.retire(set.partner, reason).await;
    pool.retire(set.bot2, reason).await;
}

/// Clocks are driven here, not by move commits, so sitting bots drain.
fn spawn_clock_task<E: EngineLink>(controller: Arc<Mutex<GameController<E>>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis((CLOCK_TICK_S * 1000.0) as u64));
        loop {
            ticker.tick().await;
            let mut ctl = controller.lock().await;
            if ctl.status().is_over() {
                break;
            }
            ctl.tick(CLOCK_TICK_S);
        }
    });
}

/// The continuous turn-taker for board B. One locked iteration per wakeup;
/// the sleep between iterations keeps the engines from thrashing and gives
/// player actions a chance at the lock.
fn spawn_partner_loop<F: EngineFactory>(
    controller: Arc<Mutex<GameController<F::Engine>>>,
    pool: Arc<EnginePool<F>>,
    delay: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(delay).await;
            let mut ctl = controller.lock().await;
            if ctl.status().is_over() {
                let set = ctl.take_engines();
                drop(ctl);
                if let Some(set) = set {
                    release_set(&pool, set).await;
                }
                break;
            }
            match ctl.partner_tick().await {
                Ok(()) => {}
                Err(GameError::Engine(e)) => {
                    warn!("[SESSION] engine failure in partner loop: {}", e);
                    let set = ctl.take_engines();
                    drop(ctl);
                    if let Some(set) = set {
                        retire_set(&pool, set, &e).await;
                    }
                    break;
                }
                Err(e) => {
                    warn!("[SESSION] partner loop stopped: {}", e);
                    let set = ctl.take_engines();
                    drop(ctl);
                    if let Some(set) = set {
                        release_set(&pool, set).await;
                    }
                    break;
                }
            }
        }
    });
}

fn result_text(status: GameStatus) -> Option<&'static str> {
    match status {
        GameStatus::PlayerWon | GameStatus::PartnerWon => Some("humans"),
        GameStatus::PlayerLost | GameStatus::PartnerLost => Some("bots"),
        GameStatus::Draw => Some("draw"),
        GameStatus::Finished => Some("aborted"),
        GameStatus::NotStarted | GameStatus::InProgress => None,
    }
}

/// Consume the controller's event stream in order and mirror it into the
/// database.
fn spawn_persister<E: EngineLink>(
    id: Uuid,
    controller: Arc<Mutex<GameController<E>>>,
    mut events: broadcast::Receiver<GameEvent>,
    db: Pool<Sqlite>,
) {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[SESSION] persister lagged {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event {
                GameEvent::MoveApplied { board, ply, notation, annotation, .. } => {
                    let state = controller.lock().await.state_body();
                    if let Err(e) =
                        crate::store::append_move(&db, id, board, ply, &notation, annotation.as_deref())
                            .await
                    {
                        warn!("[SESSION] move persist failed: {}", e);
                    }
                    if let Err(e) = crate::store::update_game(&db, id, &state, None).await {
                        warn!("[SESSION] game persist failed: {}", e);
                    }
                }
                GameEvent::ChatPosted(line) => {
                    if let Err(e) = crate::store::append_chat(&db, id, &line).await {
                        warn!("[SESSION] chat persist failed: {}", e);
                    }
                }
                GameEvent::StatusChanged(status) => {
                    let state = controller.lock().await.state_body();
                    if let Err(e) =
                        crate::store::update_game(&db, id, &state, result_text(status)).await
                    {
                        warn!("[SESSION] status persist failed: {}", e);
                    }
                }
                GameEvent::CaptureDelivered { .. } | GameEvent::RequestFulfilled { .. } => {}
            }
        }
    });
}
