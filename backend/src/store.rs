//! SQLite persistence.
//!
//! Three append-mostly tables: a game record holding both FENs, the current
//! turn, status and result; a move log keyed by game and board (1, 2) with
//! a monotonic ply; and a chat log. Rows are written by the session's event
//! persister as the controller emits them.

use shared::{BoardId, ChatLine, GameStateBody, GameStatus};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Create the schema when missing.
pub async fn init_schema(pool: &Pool<Sqlite>) -> sqlx::Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS games (
            id TEXT PRIMARY KEY,
            board_a_fen TEXT NOT NULL,
            board_b_fen TEXT NOT NULL,
            turn TEXT NOT NULL,
            status TEXT NOT NULL,
            result TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS moves (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id TEXT NOT NULL,
            board_id INTEGER NOT NULL,
            ply INTEGER NOT NULL,
            notation TEXT NOT NULL,
            annotation TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id TEXT NOT NULL,
            sender TEXT NOT NULL,
            message TEXT NOT NULL,
            timestamp_ms INTEGER NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;
    Ok(())
}

fn status_text(status: GameStatus) -> String {
    serde_json::to_string(&status)
        .unwrap_or_else(|_| "\"Finished\"".to_string())
        .trim_matches('"')
        .to_string()
}

/// Turn marker stored on the game record: which board(s) wait on whom is
/// derivable from the FENs; this keeps the quick-glance side-to-move of
/// board A.
fn turn_text(state: &GameStateBody) -> &'static str {
    if state.board_a_fen.contains(" w ") {
        "w"
    } else {
        "b"
    }
}

pub async fn insert_game(
    pool: &Pool<Sqlite>,
    id: Uuid,
    state: &GameStateBody,
) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO games (id, board_a_fen, board_b_fen, turn, status) VALUES (?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(&state.board_a_fen)
        .bind(&state.board_b_fen)
        .bind(turn_text(state))
        .bind(status_text(state.status))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_game(
    pool: &Pool<Sqlite>,
    id: Uuid,
    state: &GameStateBody,
    result: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE games SET board_a_fen = ?, board_b_fen = ?, turn = ?, status = ?, result = COALESCE(?, result), updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(&state.board_a_fen)
    .bind(&state.board_b_fen)
    .bind(turn_text(state))
    .bind(status_text(state.status))
    .bind(result)
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn append_move(
    pool: &Pool<Sqlite>,
    game_id: Uuid,
    board: BoardId,
    ply: u32,
    notation: &str,
    annotation: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO moves (game_id, board_id, ply, notation, annotation) VALUES (?, ?, ?, ?, ?)")
        .bind(game_id.to_string())
        .bind(board.db_id())
        .bind(ply as i64)
        .bind(notation)
        .bind(annotation)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn append_chat(pool: &Pool<Sqlite>, game_id: Uuid, line: &ChatLine) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO chats (game_id, sender, message, timestamp_ms) VALUES (?, ?, ?, ?)")
        .bind(game_id.to_string())
        .bind(format!("{:?}", line.sender))
        .bind(&line.text)
        .bind(line.timestamp_ms as i64)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Seat;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    async fn test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("in-memory sqlite");
        init_schema(&pool).await.expect("schema initializes");
        pool
    }

    fn state() -> GameStateBody {
        GameStateBody {
            board_a_fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR[] w KQkq - 0 1".into(),
            board_b_fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR[] w KQkq - 0 1".into(),
            status: GameStatus::InProgress,
            clocks_s: [300.0; 4],
            paused: false,
        }
    }

    #[tokio::test]
    async fn game_row_round_trips() {
        let pool = test_db().await;
        let id = Uuid::new_v4();
        insert_game(&pool, id, &state()).await.expect("inserts");

        let row = sqlx::query("SELECT status, turn FROM games WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&pool)
            .await
            .expect("row exists");
        assert_eq!(row.get::<String, _>("status"), "InProgress");
        assert_eq!(row.get::<String, _>("turn"), "w");
    }

    #[tokio::test]
    async fn update_preserves_result_when_none() {
        let pool = test_db().await;
        let id = Uuid::new_v4();
        insert_game(&pool, id, &state()).await.unwrap();
        let mut over = state();
        over.status = GameStatus::PlayerWon;
        update_game(&pool, id, &over, Some("1-0")).await.unwrap();
        update_game(&pool, id, &over, None).await.unwrap();

        let row = sqlx::query("SELECT result FROM games WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<Option<String>, _>("result").as_deref(), Some("1-0"));
    }

    #[tokio::test]
    async fn move_log_keeps_monotonic_ply_per_board() {
        let pool = test_db().await;
        let id = Uuid::new_v4();
        insert_game(&pool, id, &state()).await.unwrap();
        append_move(&pool, id, BoardId::A, 1, "e2e4", Some("+2")).await.unwrap();
        append_move(&pool, id, BoardId::B, 1, "d2d4", None).await.unwrap();
        append_move(&pool, id, BoardId::A, 2, "d7d5", Some("-1")).await.unwrap();

        let rows = sqlx::query("SELECT board_id, ply, notation FROM moves WHERE game_id = ? ORDER BY id")
            .bind(id.to_string())
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get::<i64, _>("board_id"), 1);
        assert_eq!(rows[1].get::<i64, _>("board_id"), 2);
        assert_eq!(rows[2].get::<i64, _>("ply"), 2);
    }

    #[tokio::test]
    async fn chat_rows_carry_sender_and_timestamp() {
        let pool = test_db().await;
        let id = Uuid::new_v4();
        let line = ChatLine {
            sender: Seat::Partner,
            text: "Thanks :)".into(),
            timestamp_ms: 123456,
        };
        append_chat(&pool, id, &line).await.unwrap();
        let row = sqlx::query("SELECT sender, message, timestamp_ms FROM chats WHERE game_id = ?")
            .bind(id.to_string())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("sender"), "Partner");
        assert_eq!(row.get::<String, _>("message"), "Thanks :)");
        assert_eq!(row.get::<i64, _>("timestamp_ms"), 123456);
    }
}
