use crate::{
    config::Config,
    error::RunError,
    models::{BalanceSnapshot, ReceiptStatus, RunRequest, RunResult, RunState},
    network::NetworkIdentity,
    session::SessionStore,
    simulator::{self, LogHandle, LogScript},
    trade::TradeService,
    utils::{rpc::ChainRpc, units::format_native},
};
use rust_decimal::Decimal;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle, time::Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything owned by the run that is currently live: its timer handles and
/// balance snapshots. There is exactly one of these; starting a new run
/// cancels whatever the previous one left behind before anything else happens.
#[derive(Default)]
struct RunContext {
    /// Bumped on every accepted run and on disposal. A task whose generation
    /// no longer matches must discard its result instead of applying it.
    generation: u64,
    log_handle: Option<LogHandle>,
    poll_handle: Option<JoinHandle<()>>,
    run_task: Option<JoinHandle<()>>,
    pre_balance: Option<BalanceSnapshot>,
    post_balance: Option<BalanceSnapshot>,
}

/// Drives a bot run end to end: input validation, the single trade-service
/// call, best-effort confirmation polling, the minimum visible duration gate
/// and balance/profit reconciliation. All timer state lives in the private
/// [`RunContext`]; mutation is serialized by its mutex, which is never held
/// across an await point.
pub struct RunOrchestrator {
    config: Config,
    chain: Arc<dyn ChainRpc>,
    trade: Arc<dyn TradeService>,
    session: Arc<SessionStore>,
    state_tx: watch::Sender<RunState>,
    log_lines: Arc<Mutex<Vec<String>>>,
    script_override: Mutex<Option<LogScript>>,
    ctx: Mutex<RunContext>,
}

impl RunOrchestrator {
    pub fn new(
        config: Config,
        chain: Arc<dyn ChainRpc>,
        trade: Arc<dyn TradeService>,
        session: Arc<SessionStore>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(RunState::Idle);
        Arc::new(Self {
            config,
            chain,
            trade,
            session,
            state_tx,
            log_lines: Arc::new(Mutex::new(Vec::new())),
            script_override: Mutex::new(None),
            ctx: Mutex::new(RunContext::default()),
        })
    }

    /// Replaces the random progress-log content with a fixed script. Every
    /// subsequent run replays it; used to make runs deterministic.
    pub fn set_log_script(&self, script: LogScript) {
        *self.script_override.lock().unwrap() = Some(script);
    }

    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> RunState {
        self.state_tx.borrow().clone()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log_lines.lock().unwrap().clone()
    }

    /// Most recent balance observed for the live run context, post-run when
    /// available.
    pub fn latest_balance(&self) -> Option<BalanceSnapshot> {
        let ctx = self.ctx.lock().unwrap();
        ctx.post_balance.clone().or_else(|| ctx.pre_balance.clone())
    }

    /// Timers attributable to the live run context. Superseded runs always
    /// count zero here because acceptance of a new run aborts them first.
    pub fn live_timer_count(&self) -> usize {
        let ctx = self.ctx.lock().unwrap();
        let mut count = 0;
        if ctx.log_handle.as_ref().map_or(false, |h| h.is_active()) {
            count += 1;
        }
        if ctx.poll_handle.as_ref().map_or(false, |t| !t.is_finished()) {
            count += 1;
        }
        if ctx.run_task.as_ref().map_or(false, |t| !t.is_finished()) {
            count += 1;
        }
        count
    }

    /// Resolves once the current run reaches `Succeeded` or `Failed`.
    pub async fn settled(&self) {
        let mut rx = self.state_tx.subscribe();
        loop {
            if rx.borrow_and_update().is_terminal() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// The single inbound command. Validation happens before any timer is
    /// created; a rejected request never disturbs a run already in flight.
    /// On acceptance the previous run's timers are cancelled, its pending
    /// continuations are invalidated, and a fresh run task is spawned.
    pub fn request_run(self: &Arc<Self>, request: RunRequest) -> Result<(), RunError> {
        if !request.network.is_selected() {
            return Err(RunError::NoNetworkSelected);
        }
        if request.address.trim().is_empty() || request.private_key.trim().is_empty() {
            return Err(RunError::MissingCredentials);
        }

        let run_id = Uuid::new_v4();
        let generation = {
            let mut ctx = self.ctx.lock().unwrap();
            Self::cancel_timers(&mut ctx);
            if let Some(task) = ctx.run_task.take() {
                task.abort();
            }
            ctx.pre_balance = None;
            ctx.post_balance = None;
            ctx.generation += 1;
            ctx.generation
        };

        self.log_lines.lock().unwrap().clear();
        self.state_tx.send_replace(RunState::Validating);
        info!("Run {} accepted on {}", run_id, request.network);

        let orchestrator = self.clone();
        let task = tokio::spawn(async move {
            orchestrator.drive_run(generation, run_id, request).await;
        });
        self.ctx.lock().unwrap().run_task = Some(task);

        Ok(())
    }

    /// Lifecycle hook for teardown: cancels every timer class at whatever
    /// state the machine is in. Idempotent.
    pub fn dispose(&self) {
        {
            let mut ctx = self.ctx.lock().unwrap();
            ctx.generation += 1;
            Self::cancel_timers(&mut ctx);
            if let Some(task) = ctx.run_task.take() {
                task.abort();
            }
        }
        self.state_tx.send_replace(RunState::Idle);
        info!("Orchestrator disposed, all timers cancelled");
    }

    async fn drive_run(self: Arc<Self>, generation: u64, run_id: Uuid, request: RunRequest) {
        // Pre-run snapshot is best effort: without it profit is simply
        // absent later, the run itself continues.
        match self.chain.get_balance(request.network, &request.address).await {
            Ok(snapshot) => {
                self.session.set_last_balance(&format_native(snapshot.value));
                let mut ctx = self.ctx.lock().unwrap();
                if ctx.generation == generation {
                    ctx.pre_balance = Some(snapshot);
                }
            }
            Err(e) => warn!("Run {}: pre-run balance fetch failed: {}", run_id, e),
        }

        if !self.still_current(generation) {
            return;
        }

        let started_at = Instant::now();
        let script = self
            .script_override
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(LogScript::generate);
        let sink = self.log_lines.clone();
        let handle = simulator::start(
            Duration::from_millis(self.config.run.log_interval_ms),
            script,
            move |line| sink.lock().unwrap().push(line),
        );
        if !self.store_log_handle(generation, handle) {
            return;
        }

        self.set_state(generation, RunState::Running { started_at: chrono::Utc::now() });

        let outcome = self
            .trade
            .run_bot(request.network, &request)
            .await
            .and_then(RunResult::from_response);

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.fail(generation, run_id, e);
                return;
            }
        };
        info!(
            "Run {}: trade service accepted, frontrun tx {}",
            run_id, result.frontrun_tx_hash
        );

        // Confirmation is observability, not a gate: the poll runs detached
        // from the transitions below and only supersession or disposal
        // cancels it.
        self.start_confirmation_poll(generation, request.network, result.frontrun_tx_hash.clone());

        let min_duration = Duration::from_millis(self.config.run.min_run_duration_ms);
        let remaining = min_duration.saturating_sub(started_at.elapsed());
        self.set_state(
            generation,
            RunState::AwaitingMinimumDuration {
                remaining_ms: remaining.as_millis() as u64,
            },
        );
        tokio::time::sleep(remaining).await;

        {
            let mut ctx = self.ctx.lock().unwrap();
            if ctx.generation != generation {
                return;
            }
            if let Some(mut handle) = ctx.log_handle.take() {
                handle.stop();
            }
        }
        self.log_lines.lock().unwrap().clear();

        let post_balance = match self.chain.get_balance(request.network, &request.address).await {
            Ok(snapshot) => {
                self.session.set_last_balance(&format_native(snapshot.value));
                Some(snapshot)
            }
            Err(e) => {
                warn!("Run {}: post-run balance fetch failed: {}", run_id, e);
                None
            }
        };

        let profit = {
            let mut ctx = self.ctx.lock().unwrap();
            if ctx.generation != generation {
                return;
            }
            ctx.post_balance = post_balance;
            Self::reconcile_profit(&ctx.pre_balance, &ctx.post_balance)
        };

        if self.set_state(generation, RunState::Succeeded { result, profit }) {
            info!("Run {} succeeded, profit: {:?}", run_id, profit);
        }
    }

    /// Profit exists only when both snapshots do; a missing side yields
    /// absence, never zero and never an error.
    fn reconcile_profit(
        pre: &Option<BalanceSnapshot>,
        post: &Option<BalanceSnapshot>,
    ) -> Option<Decimal> {
        match (pre, post) {
            (Some(pre), Some(post)) => Some(post.value - pre.value),
            _ => None,
        }
    }

    fn fail(&self, generation: u64, run_id: Uuid, error: RunError) {
        if error.is_silent() {
            debug!("Run {} cancelled", run_id);
            return;
        }
        {
            let mut ctx = self.ctx.lock().unwrap();
            if ctx.generation != generation {
                return;
            }
            Self::cancel_timers(&mut ctx);
        }
        error!("Run {} failed: {}", run_id, error);
        self.set_state(generation, RunState::Failed { error });
    }

    fn start_confirmation_poll(
        self: &Arc<Self>,
        generation: u64,
        network: NetworkIdentity,
        tx_hash: String,
    ) {
        let chain = self.chain.clone();
        let interval = Duration::from_millis(self.config.run.poll_interval_ms);
        let max_attempts = self.config.run.max_poll_attempts;

        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            for attempt in 1..=max_attempts {
                ticker.tick().await;
                match chain.get_receipt(network, &tx_hash).await {
                    Ok(ReceiptStatus::Confirmed { success: true }) => {
                        info!("Transaction confirmed: {}", tx_hash);
                        return;
                    }
                    Ok(ReceiptStatus::Confirmed { success: false }) => {
                        warn!("Transaction {} reverted on chain", tx_hash);
                        return;
                    }
                    Ok(ReceiptStatus::Pending) => {
                        debug!(
                            "Transaction {} not yet confirmed, attempt {}/{}",
                            tx_hash, attempt, max_attempts
                        );
                    }
                    // Poll errors stay internal, confirmation never gates the run.
                    Err(e) => warn!("Error checking transaction receipt: {}", e),
                }
            }
            warn!(
                "Gave up waiting for confirmation of {} after {} attempts",
                tx_hash, max_attempts
            );
        });

        let mut ctx = self.ctx.lock().unwrap();
        if ctx.generation == generation {
            if let Some(old) = ctx.poll_handle.replace(task) {
                old.abort();
            }
        } else {
            task.abort();
        }
    }

    fn store_log_handle(&self, generation: u64, mut handle: LogHandle) -> bool {
        let mut ctx = self.ctx.lock().unwrap();
        if ctx.generation != generation {
            handle.stop();
            return false;
        }
        if let Some(mut old) = ctx.log_handle.replace(handle) {
            old.stop();
        }
        true
    }

    fn still_current(&self, generation: u64) -> bool {
        self.ctx.lock().unwrap().generation == generation
    }

    /// Guarded state write: a superseded run's transition is discarded.
    fn set_state(&self, generation: u64, state: RunState) -> bool {
        let ctx = self.ctx.lock().unwrap();
        if ctx.generation != generation {
            return false;
        }
        self.state_tx.send_replace(state);
        true
    }

    fn cancel_timers(ctx: &mut RunContext) {
        if let Some(mut handle) = ctx.log_handle.take() {
            handle.stop();
        }
        if let Some(poll) = ctx.poll_handle.take() {
            poll.abort();
        }
    }
}
