//! HTTP control-plane surface.
//!
//! Thin JSON relay over the orchestrator: create/list/inspect games, apply
//! player moves and drops, pause/resume/resign, the partner `go`/`sit`
//! commands, and the chat log. Error codes distinguish malformed input,
//! engine unavailability, illegal actions, and finished games.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bughouse_core::types::parse_square;
use shared::{
    AnalysisRequest, AnalysisResponse, ChatLine, CommandRequest, CreateGameRequest,
    CreateGameResponse, DropRequest, ErrorBody, ErrorCode, GameStateBody, GameSummary,
    LoadPositionRequest, MoveRequest, PlayerCommand,
};
use sqlx::{Pool, Sqlite};
use tandem::game::GameError;
use tandem::pool::{EngineFactory, EnginePool, PoolError};
use tandem::OrchestratorConfig;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::session::{self, GameSession};
use crate::store;

pub struct AppState<F: EngineFactory> {
    pub db: Pool<Sqlite>,
    pub engines: Arc<EnginePool<F>>,
    pub cfg: OrchestratorConfig,
    pub sessions: Arc<Mutex<HashMap<Uuid, GameSession<F::Engine>>>>,
}

impl<F: EngineFactory> Clone for AppState<F> {
    fn clone(&self) -> Self {
        AppState {
            db: self.db.clone(),
            engines: Arc::clone(&self.engines),
            cfg: self.cfg.clone(),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

pub fn router<F: EngineFactory>(state: AppState<F>) -> Router {
    Router::new()
        .route("/analysis", post(analyze_position::<F>))
        .route("/games", post(create_game::<F>).get(list_games::<F>))
        .route("/games/:id", get(get_game::<F>))
        .route("/games/:id/position", post(load_position::<F>))
        .route("/games/:id/move", post(apply_move::<F>))
        .route("/games/:id/drop", post(apply_drop::<F>))
        .route("/games/:id/pause", post(pause_game::<F>))
        .route("/games/:id/resume", post(resume_game::<F>))
        .route("/games/:id/resign", post(resign_game::<F>))
        .route("/games/:id/command", post(player_command::<F>))
        .route("/games/:id/chat", get(get_chat::<F>))
        .with_state(state)
}

/// Error payload with the HTTP status it maps to.
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            body: ErrorBody { code, message: message.into() },
        }
    }

    fn not_found(id: Uuid) -> Self {
        ApiError::new(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            format!("no such game: {}", id),
        )
    }

    fn bad_square(name: &str) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::MalformedInput,
            format!("not a square: {}", name),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        let (status, code) = match &err {
            GameError::Illegal(_) | GameError::NotPlayersTurn => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::IllegalAction)
            }
            GameError::NotInProgress => (StatusCode::CONFLICT, ErrorCode::GameOver),
            GameError::Engine(_) | GameError::Pool(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::EngineUnavailable)
            }
            GameError::Invariant(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::GameOver),
        };
        ApiError::new(status, code, err.to_string())
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::EngineUnavailable,
            err.to_string(),
        )
    }
}

/// One-off engine consultation: borrow a pooled engine, point it at the
/// given position, and return its best move. The engine's variant state is
/// re-established on every acquisition, so nothing needs reverting.
async fn analyze_position<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Json(body): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    use tandem::uci::EngineLink;

    if bughouse_core::Board::from_fen(&body.fen).is_err() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::MalformedInput,
            format!("not a position: {}", body.fen),
        ));
    }
    let movetime = body.movetime_ms.unwrap_or(state.cfg.move_time_ms);
    let variant_path = state.cfg.variant_file.display().to_string();

    let mut engine = state.engines.try_acquire().await?;
    let searched = async {
        engine.set_option("VariantPath", &variant_path).await?;
        engine.set_option("UCI_Variant", "bughouse").await?;
        engine.set_position(&body.fen, &[]).await?;
        engine.best_move(movetime).await
    }
    .await;
    match searched {
        Ok(best_move) => {
            state.engines.release(engine).await;
            Ok(Json(AnalysisResponse { best_move }))
        }
        Err(e) => {
            state.engines.retire(engine, &e).await;
            Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::EngineUnavailable,
                e.to_string(),
            ))
        }
    }
}

async fn create_game<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Json(body): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, ApiError> {
    let id = Uuid::new_v4();
    let session = session::launch(
        id,
        state.cfg.clone(),
        body.human_color,
        Arc::clone(&state.engines),
        state.db.clone(),
    )
    .await?;

    let game_state = session.controller.lock().await.state_body();
    if let Err(e) = store::insert_game(&state.db, id, &game_state).await {
        tracing::warn!("[BACKEND] failed to persist new game: {}", e);
    }
    state.sessions.lock().await.insert(id, session);
    info!("[BACKEND] created game {}", id);
    Ok(Json(CreateGameResponse { game_id: id, state: game_state }))
}

async fn list_games<F: EngineFactory>(
    State(state): State<AppState<F>>,
) -> Json<Vec<GameSummary>> {
    let sessions = state.sessions.lock().await;
    let mut out = Vec::with_capacity(sessions.len());
    for (id, session) in sessions.iter() {
        let status = session.controller.lock().await.status();
        out.push(GameSummary { game_id: *id, status });
    }
    Json(out)
}

async fn get_game<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStateBody>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
    let body = session.controller.lock().await.state_body();
    Ok(Json(body))
}

async fn load_position<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
    Json(body): Json<LoadPositionRequest>,
) -> Result<Json<GameStateBody>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
    let mut ctl = session.controller.lock().await;
    ctl.load_position(body.board, &body.fen).map_err(|e| match &e {
        GameError::Illegal(bughouse_core::CoreError::FenParse(_)) => ApiError::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::MalformedInput,
            e.to_string(),
        ),
        _ => ApiError::from(e),
    })?;
    Ok(Json(ctl.state_body()))
}

async fn apply_move<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
    Json(body): Json<MoveRequest>,
) -> Result<Json<GameStateBody>, ApiError> {
    let from = parse_square(&body.from).ok_or_else(|| ApiError::bad_square(&body.from))?;
    let to = parse_square(&body.to).ok_or_else(|| ApiError::bad_square(&body.to))?;
    let controller = {
        let sessions = state.sessions.lock().await;
        let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
        Arc::clone(&session.controller)
    };
    let mut ctl = controller.lock().await;
    ctl.make_player_move(from, to, body.promotion).await?;
    Ok(Json(ctl.state_body()))
}

async fn apply_drop<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
    Json(body): Json<DropRequest>,
) -> Result<Json<GameStateBody>, ApiError> {
    let square = parse_square(&body.square).ok_or_else(|| ApiError::bad_square(&body.square))?;
    let controller = {
        let sessions = state.sessions.lock().await;
        let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
        Arc::clone(&session.controller)
    };
    let mut ctl = controller.lock().await;
    ctl.drop_piece(square, body.piece).await?;
    Ok(Json(ctl.state_body()))
}

async fn pause_game<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStateBody>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
    let mut ctl = session.controller.lock().await;
    ctl.pause();
    Ok(Json(ctl.state_body()))
}

async fn resume_game<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStateBody>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
    let mut ctl = session.controller.lock().await;
    ctl.resume();
    Ok(Json(ctl.state_body()))
}

async fn resign_game<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStateBody>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
    let mut ctl = session.controller.lock().await;
    ctl.resign();
    Ok(Json(ctl.state_body()))
}

async fn player_command<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
    Json(body): Json<CommandRequest>,
) -> Result<Json<GameStateBody>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
    let mut ctl = session.controller.lock().await;
    match body.command {
        PlayerCommand::Sit => ctl.send_sit_command(),
        PlayerCommand::Go => ctl.send_go_command(),
    }
    Ok(Json(ctl.state_body()))
}

async fn get_chat<F: EngineFactory>(
    State(state): State<AppState<F>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatLine>>, ApiError> {
    let sessions = state.sessions.lock().await;
    let session = sessions.get(&id).ok_or_else(|| ApiError::not_found(id))?;
    let ctl = session.controller.lock().await;
    Ok(Json(ctl.chat_lines().to_vec()))
}
