//! Bounded pool of engine connections.
//!
//! Engines outlive games and are reused across acquire/release cycles. The
//! pool caps the number of live processes, queues callers FIFO when at
//! capacity, reaps long-idle engines down to a warm floor, and retires
//! (never returns) engines that produced a transport error.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::PoolLimits;
use crate::uci::{EngineLink, UciError, UciResult, UciTransport};

/// Creates fresh engine connections for the pool.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: EngineLink;

    fn create(&self) -> impl Future<Output = UciResult<Self::Engine>> + Send;
}

/// Spawns the configured engine binary.
pub struct ProcessEngineFactory {
    pub engine_path: String,
}

impl EngineFactory for ProcessEngineFactory {
    type Engine = UciTransport;

    async fn create(&self) -> UciResult<UciTransport> {
        UciTransport::spawn(&self.engine_path).await
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    /// Only surfaced by the non-blocking acquire variant.
    #[error("engine pool exhausted")]
    Exhausted,

    #[error("engine pool is shut down")]
    ShutDown,

    #[error(transparent)]
    Engine(#[from] UciError),
}

pub type PoolResult<T> = Result<T, PoolError>;

struct Idle<E> {
    engine: E,
    last_used: Instant,
}

struct State<E> {
    available: Vec<Idle<E>>,
    /// Live engines: available plus borrowed.
    total: usize,
    waiters: VecDeque<oneshot::Sender<E>>,
    shut: bool,
}

struct Inner<F: EngineFactory> {
    factory: F,
    limits: PoolLimits,
    state: Mutex<State<F::Engine>>,
}

/// Shared, process-scoped engine pool.
pub struct EnginePool<F: EngineFactory> {
    inner: Arc<Inner<F>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

/// What `acquire` decided while the lock was held.
enum Claim<E> {
    Ready(E),
    Spawn,
    Wait(oneshot::Receiver<E>),
}

impl<F: EngineFactory> EnginePool<F> {
    /// Build the pool and start its background reaper.
    pub fn new(factory: F, limits: PoolLimits) -> Arc<Self> {
        let inner = Arc::new(Inner {
            factory,
            limits,
            state: Mutex::new(State {
                available: Vec::new(),
                total: 0,
                waiters: VecDeque::new(),
                shut: false,
            }),
        });

        let reaper_inner = Arc::clone(&inner);
        let interval = reaper_inner.limits.reap_interval;
        let reaper = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                reap(&reaper_inner).await;
            }
        });

        Arc::new(EnginePool {
            inner,
            reaper: Mutex::new(Some(reaper)),
        })
    }

    fn claim(&self, blocking: bool) -> PoolResult<Claim<F::Engine>> {
        let mut state = self.inner.state.lock().expect("pool lock");
        if state.shut {
            return Err(PoolError::ShutDown);
        }
        if let Some(idle) = state.available.pop() {
            return Ok(Claim::Ready(idle.engine));
        }
        if state.total < self.inner.limits.max_engines {
            state.total += 1;
            return Ok(Claim::Spawn);
        }
        if !blocking {
            return Err(PoolError::Exhausted);
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        Ok(Claim::Wait(rx))
    }

    async fn resolve(&self, claim: Claim<F::Engine>) -> PoolResult<F::Engine> {
        match claim {
            Claim::Ready(engine) => Ok(engine),
            Claim::Spawn => match self.inner.factory.create().await {
                Ok(engine) => Ok(engine),
                Err(e) => {
                    self.inner.state.lock().expect("pool lock").total -= 1;
                    Err(PoolError::Engine(e))
                }
            },
            Claim::Wait(rx) => rx.await.map_err(|_| PoolError::ShutDown),
        }
    }

    /// Borrow an engine, blocking (FIFO) when the pool is at capacity.
    pub async fn acquire(&self) -> PoolResult<F::Engine> {
        let claim = self.claim(true)?;
        self.resolve(claim).await
    }

    /// Borrow an engine or fail immediately with [`PoolError::Exhausted`].
    pub async fn try_acquire(&self) -> PoolResult<F::Engine> {
        let claim = self.claim(false)?;
        self.resolve(claim).await
    }

    /// Return a healthy engine: hand it to the head waiter if one exists,
    /// otherwise stamp it and put it back on the shelf.
    pub async fn release(&self, engine: F::Engine) {
        let mut leftover = {
            let mut state = self.inner.state.lock().expect("pool lock");
            if !state.shut {
                let mut e = engine;
                while let Some(waiter) = state.waiters.pop_front() {
                    match waiter.send(e) {
                        Ok(()) => return,
                        // Waiter gave up; try the next one.
                        Err(back) => e = back,
                    }
                }
                state.available.push(Idle {
                    engine: e,
                    last_used: Instant::now(),
                });
                return;
            }
            state.total -= 1;
            engine
        };
        // Pool already shut down: the engine goes with it.
        let _ = leftover.shutdown().await;
    }

    /// Permanently remove an engine after an error. The handle is shut down
    /// and never returned to the available set.
    pub async fn retire(&self, mut engine: F::Engine, reason: &UciError) {
        warn!("[POOL] retiring engine: {}", reason);
        self.inner.state.lock().expect("pool lock").total -= 1;
        let _ = engine.shutdown().await;
    }

    /// Cancel the reaper, fail all waiters, and shut down every idle
    /// engine. Borrowed engines are shut down as they come back.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.reaper.lock().expect("reaper lock").take() {
            handle.abort();
        }
        let idle: Vec<Idle<F::Engine>> = {
            let mut state = self.inner.state.lock().expect("pool lock");
            state.shut = true;
            // Dropping the senders resolves every waiter with an error.
            state.waiters.clear();
            state.total -= state.available.len();
            state.available.drain(..).collect()
        };
        info!("[POOL] shutting down {} idle engines", idle.len());
        for mut entry in idle {
            let _ = entry.engine.shutdown().await;
        }
    }

    /// Live engine count (available plus borrowed).
    pub fn engine_count(&self) -> usize {
        self.inner.state.lock().expect("pool lock").total
    }
}

/// Shut down engines idle beyond the cutoff, keeping the warm floor.
async fn reap<F: EngineFactory>(inner: &Inner<F>) {
    let cutoff = inner.limits.idle_cutoff;
    let floor = inner.limits.warm_floor;
    let stale: Vec<Idle<F::Engine>> = {
        let mut state = inner.state.lock().expect("pool lock");
        let mut stale = Vec::new();
        // Oldest entries sit at the front of the shelf.
        while state.total > floor {
            match state.available.first() {
                Some(idle) if idle.last_used.elapsed() >= cutoff => {
                    let idle = state.available.remove(0);
                    state.total -= 1;
                    stale.push(idle);
                }
                _ => break,
            }
        }
        stale
    };
    if !stale.is_empty() {
        info!("[POOL] reaping {} idle engines", stale.len());
    }
    for mut entry in stale {
        let _ = entry.engine.shutdown().await;
    }
}
