use crate::{
    config::Config,
    error::RunError,
    models::{RunResult, RunState},
    network::NetworkIdentity,
    utils::units::format_native,
};
use rust_decimal::Decimal;

/// Renderable projection of the orchestrator state. The rendering layer
/// consumes this; it never touches the state machine directly.
#[derive(Debug, Clone, PartialEq)]
pub struct RunView {
    pub network_label: String,
    pub status: String,
    pub processing: bool,
    pub message: Option<String>,
    pub notification: Option<Notification>,
    pub explorer_links: Vec<ExplorerLink>,
    pub balance: Option<String>,
    pub profit: Option<String>,
    pub log_lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

pub fn present(
    config: &Config,
    network: NetworkIdentity,
    state: &RunState,
    log_lines: Vec<String>,
    balance: Option<Decimal>,
) -> RunView {
    let mut view = RunView {
        network_label: network.to_string(),
        status: status_label(state).to_string(),
        processing: state.is_active(),
        message: None,
        notification: None,
        explorer_links: Vec::new(),
        balance: balance.map(format_native),
        profit: None,
        log_lines,
    };

    match state {
        RunState::Succeeded { result, profit } => {
            view.message = Some(result.service_message.clone());
            view.notification = Some(Notification {
                kind: NotificationKind::Success,
                text: result.service_message.clone(),
            });
            view.explorer_links = explorer_links(config, network, result);
            view.profit = profit.map(format_native);
        }
        RunState::Failed { error } if !error.is_silent() => {
            view.message = Some(failure_message(error));
            view.notification = Some(Notification {
                kind: NotificationKind::Error,
                text: "Bot run failed.".to_string(),
            });
        }
        _ => {}
    }

    view
}

fn status_label(state: &RunState) -> &'static str {
    match state {
        RunState::Idle => "Idle",
        RunState::Validating => "Validating",
        RunState::Running { .. } => "Processing",
        RunState::AwaitingMinimumDuration { .. } => "Processing",
        RunState::Succeeded { .. } => "Done",
        RunState::Failed { .. } => "Failed",
    }
}

fn failure_message(error: &RunError) -> String {
    match error {
        RunError::TradeService { message } => format!("API Error: {}", message),
        other => format!("Failed to run bot: {}", other),
    }
}

/// One link per returned hash, built against the run network's explorer.
/// The take-profit line only exists when the service returned that hash.
fn explorer_links(config: &Config, network: NetworkIdentity, result: &RunResult) -> Vec<ExplorerLink> {
    let host = match network.explorer_host(config) {
        Ok(host) => host,
        Err(_) => return Vec::new(),
    };

    let mut links = vec![
        ExplorerLink {
            label: "Frontrun TxHash".to_string(),
            url: format!("https://{}/tx/{}", host, result.frontrun_tx_hash),
        },
        ExplorerLink {
            label: "Target TxHash".to_string(),
            url: format!("https://{}/tx/{}", host, result.target_tx_hash),
        },
    ];
    if let Some(hash) = &result.take_profit_tx_hash {
        links.push(ExplorerLink {
            label: "Take Profit TxHash".to_string(),
            url: format!("https://{}/tx/{}", host, hash),
        });
    }
    links
}
