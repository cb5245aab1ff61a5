use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::Mutex};
use tracing::warn;

/// Persisted session state, the dashboard's survives-reload store: the auth
/// token for the trade service and the last known balance used as the profit
/// fallback. Two string fields, nothing more.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct SessionState {
    token: Option<String>,
    balance: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// Opens the store at `path`, starting empty when the file is missing or
    /// unreadable. A corrupt session file is not fatal.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn auth_token(&self) -> Option<String> {
        self.state.lock().unwrap().token.clone()
    }

    pub fn set_auth_token(&self, token: &str) {
        {
            let mut state = self.state.lock().unwrap();
            state.token = Some(token.to_string());
        }
        self.persist();
    }

    pub fn last_balance(&self) -> Option<String> {
        self.state.lock().unwrap().balance.clone()
    }

    pub fn set_last_balance(&self, balance: &str) {
        {
            let mut state = self.state.lock().unwrap();
            state.balance = Some(balance.to_string());
        }
        self.persist();
    }

    fn persist(&self) {
        let snapshot = self.state.lock().unwrap().clone();
        let serialized = match serde_json::to_string_pretty(&snapshot) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize session state: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, serialized) {
            warn!("Failed to persist session state to {:?}: {}", self.path, e);
        }
    }
}
