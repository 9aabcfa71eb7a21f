//! Child-process UCI transport.
//!
//! One transport per engine subprocess: line-oriented writes to stdin,
//! buffered line reads from stdout, correlation by waiting for the next
//! line matching a trigger substring. Exactly one outstanding request at a
//! time; `&mut self` on every operation enforces that at compile time.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use super::{parse_bestmove, parse_info, Evaluation, InfoLine, SearchLine, UciError, UciResult};

/// Grace added on top of a search's own budget before a missing trigger is
/// fatal, and the whole budget for handshake-style exchanges.
const TRIGGER_GRACE_MS: u64 = 10_000;
/// Budget for depth-limited searches, which carry no movetime of their own.
const DEPTH_SEARCH_BUDGET_MS: u64 = 60_000;
/// How long `quit` gets before the process is killed.
const QUIT_GRACE_MS: u64 = 2_000;

/// A live engine subprocess speaking UCI.
pub struct UciTransport {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    path: String,
}

impl UciTransport {
    /// Spawn the engine and complete the `uci`/`uciok` and
    /// `isready`/`readyok` handshake.
    pub async fn spawn(path: &str) -> UciResult<Self> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| UciError::Spawn {
                path: path.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(UciError::PipeClosed)?;
        let stdout = child.stdout.take().ok_or(UciError::PipeClosed)?;
        let mut transport = UciTransport {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            path: path.to_string(),
        };

        transport.send("uci").await?;
        transport.wait_for("uciok", TRIGGER_GRACE_MS).await?;
        transport.sync().await?;
        debug!("[UCI] {} ready", transport.path);
        Ok(transport)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    async fn send(&mut self, command: &str) -> UciResult<()> {
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self, budget: Duration) -> UciResult<String> {
        match tokio::time::timeout(budget, self.lines.next_line()).await {
            Err(_) => Err(UciError::MissingTrigger {
                trigger: "(line)",
                waited_ms: budget.as_millis() as u64,
            }),
            Ok(Ok(Some(line))) => Ok(line),
            Ok(Ok(None)) => Err(UciError::PipeClosed),
            Ok(Err(e)) => Err(UciError::Io(e)),
        }
    }

    /// Read lines until one contains the trigger substring.
    async fn wait_for(&mut self, trigger: &'static str, budget_ms: u64) -> UciResult<()> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(budget_ms);
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or(UciError::MissingTrigger {
                    trigger,
                    waited_ms: budget_ms,
                })?;
            let line = self.next_line(remaining).await.map_err(|e| match e {
                UciError::MissingTrigger { .. } => UciError::MissingTrigger {
                    trigger,
                    waited_ms: budget_ms,
                },
                other => other,
            })?;
            if line.contains(trigger) {
                return Ok(());
            }
        }
    }

    async fn sync(&mut self) -> UciResult<()> {
        self.send("isready").await?;
        self.wait_for("readyok", TRIGGER_GRACE_MS).await
    }

    /// Read search output until `bestmove`, collecting parseable info
    /// lines. Unparseable lines are logged and skipped.
    async fn collect_search(
        &mut self,
        budget_ms: u64,
    ) -> UciResult<(Vec<InfoLine>, Option<String>)> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(budget_ms);
        let mut infos = Vec::new();
        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or(UciError::MissingTrigger {
                    trigger: "bestmove",
                    waited_ms: budget_ms,
                })?;
            let line = self.next_line(remaining).await.map_err(|e| match e {
                UciError::MissingTrigger { .. } => UciError::MissingTrigger {
                    trigger: "bestmove",
                    waited_ms: budget_ms,
                },
                other => other,
            })?;
            if let Some(best) = parse_bestmove(&line) {
                return Ok((infos, best));
            }
            match parse_info(&line) {
                Some(info) => infos.push(info),
                None if line.trim().is_empty() => {}
                None => warn!("[UCI] ignoring unexpected line: {}", line),
            }
        }
    }
}

impl super::EngineLink for UciTransport {
    async fn set_option(&mut self, name: &str, value: &str) -> UciResult<()> {
        self.send(&format!("setoption name {} value {}", name, value))
            .await?;
        self.sync().await
    }

    async fn set_position(&mut self, fen: &str, moves: &[String]) -> UciResult<()> {
        let mut command = format!("position fen {}", fen);
        if !moves.is_empty() {
            command.push_str(" moves ");
            command.push_str(&moves.join(" "));
        }
        self.send(&command).await?;
        self.sync().await
    }

    async fn best_move(&mut self, movetime_ms: u64) -> UciResult<Option<String>> {
        self.send(&format!("go movetime {}", movetime_ms)).await?;
        let (_, best) = self.collect_search(movetime_ms + TRIGGER_GRACE_MS).await?;
        Ok(best)
    }

    async fn best_move_restricted(
        &mut self,
        movetime_ms: u64,
        searchmoves: &[String],
    ) -> UciResult<Option<String>> {
        if searchmoves.is_empty() {
            return self.best_move(movetime_ms).await;
        }
        self.send(&format!(
            "go movetime {} searchmoves {}",
            movetime_ms,
            searchmoves.join(" ")
        ))
        .await?;
        let (_, best) = self.collect_search(movetime_ms + TRIGGER_GRACE_MS).await?;
        Ok(best)
    }

    async fn evaluate(&mut self, depth: u32) -> UciResult<Evaluation> {
        self.send(&format!("go depth {}", depth)).await?;
        let (infos, _) = self.collect_search(DEPTH_SEARCH_BUDGET_MS).await?;
        // The last scored report is the engine's final word at this depth.
        infos
            .into_iter()
            .rev()
            .find_map(|info| {
                Some(Evaluation {
                    depth: info.depth.unwrap_or(depth),
                    score: info.score?,
                    nodes: info.nodes,
                    time_ms: info.time_ms,
                    pv: info.pv,
                })
            })
            .ok_or(UciError::NoEvaluation)
    }

    async fn best_lines(&mut self, movetime_ms: u64, multipv: u32) -> UciResult<Vec<SearchLine>> {
        self.send(&format!("go movetime {}", movetime_ms)).await?;
        let (infos, _) = self.collect_search(movetime_ms + TRIGGER_GRACE_MS).await?;
        let mut last: Vec<Option<SearchLine>> = vec![None; multipv as usize];
        for info in infos {
            let index = info.multipv.saturating_sub(1) as usize;
            if index >= last.len() {
                continue;
            }
            if let Some(score) = info.score {
                last[index] = Some(SearchLine {
                    multipv: info.multipv,
                    score,
                    pv: info.pv,
                });
            }
        }
        Ok(last.into_iter().flatten().collect())
    }

    async fn stop(&mut self) -> UciResult<()> {
        self.send("stop").await?;
        let _ = self.collect_search(TRIGGER_GRACE_MS).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> UciResult<()> {
        // Best effort: the pipe may already be gone.
        let _ = self.send("quit").await;
        match tokio::time::timeout(Duration::from_millis(QUIT_GRACE_MS), self.child.wait()).await
        {
            Ok(_) => {}
            Err(_) => {
                warn!("[UCI] {} ignored quit, killing", self.path);
                let _ = self.child.start_kill();
            }
        }
        Ok(())
    }
}
