use anyhow::{Context, Result};
use evm_frontrun_bot::{
    config::Config,
    engine::orchestrator::RunOrchestrator,
    models::{RunRequest, RunState},
    network::{NetworkIdentity, NetworkSelector},
    session::SessionStore,
    trade::HttpTradeService,
    utils::rpc::HttpChainClient,
    view,
};
use std::{env, sync::Arc, time::Duration};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting frontrun bot console");

    let config = Config::load()?;
    info!("Configuration loaded successfully");

    let session = Arc::new(SessionStore::open(&config.session.path));
    if let Ok(token) = env::var("AUTH_TOKEN") {
        session.set_auth_token(&token);
        info!("Authorization token stored in session");
    }

    let network: NetworkIdentity = env::var("NETWORK")
        .context("NETWORK must be set (polygon or bsc)")?
        .parse()?;
    let mut selector = NetworkSelector::new();
    selector.select(network)?;
    info!("Network selected: {}", selector.current());

    let address = env::var("WALLET_ADDRESS").context("WALLET_ADDRESS must be set")?;
    let private_key = env::var("PRIVATE_KEY").context("PRIVATE_KEY must be set")?;

    let chain = Arc::new(HttpChainClient::new(config.clone())?);
    let trade = Arc::new(HttpTradeService::new(config.clone(), session.clone())?);
    let orchestrator = RunOrchestrator::new(config.clone(), chain, trade, session);

    let request = RunRequest {
        network: selector.current(),
        address,
        private_key,
    };
    if let Err(e) = orchestrator.request_run(request) {
        error!("Run rejected: {}", e);
        return Err(e.into());
    }

    // Stream state transitions and progress lines until the run settles.
    let mut state_rx = orchestrator.subscribe();
    let mut printed = 0usize;
    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                info!("Run state: {}", state_label(&state));
                if state.is_terminal() {
                    break;
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(300)) => {
                let lines = orchestrator.log_lines();
                if lines.len() < printed {
                    printed = 0;
                }
                for line in &lines[printed..] {
                    println!("{}", line);
                }
                printed = lines.len();
            }
        }
    }

    let balance = orchestrator.latest_balance().map(|s| s.value);
    let run_view = view::present(
        &config,
        network,
        &orchestrator.state(),
        orchestrator.log_lines(),
        balance,
    );

    if let Some(message) = &run_view.message {
        println!("{}", message);
    }
    for link in &run_view.explorer_links {
        println!("{}: {}", link.label, link.url);
    }
    if let Some(balance) = &run_view.balance {
        println!("Balance: {}", balance);
    }
    if let Some(profit) = &run_view.profit {
        println!("Profit: {}", profit);
    }

    orchestrator.dispose();
    info!("Frontrun bot console shutting down");
    Ok(())
}

fn state_label(state: &RunState) -> &'static str {
    match state {
        RunState::Idle => "Idle",
        RunState::Validating => "Validating",
        RunState::Running { .. } => "Running",
        RunState::AwaitingMinimumDuration { .. } => "AwaitingMinimumDuration",
        RunState::Succeeded { .. } => "Succeeded",
        RunState::Failed { .. } => "Failed",
    }
}
