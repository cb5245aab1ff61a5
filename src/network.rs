use crate::{
    config::{ChainEndpoints, Config},
    error::RunError,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The chain a run targets. `Unselected` is a real state, not an error: the
/// dashboard starts there and every endpoint resolution against it fails
/// with [`RunError::NoNetworkSelected`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkIdentity {
    #[default]
    Unselected,
    Polygon,
    Bsc,
}

impl NetworkIdentity {
    pub fn is_selected(&self) -> bool {
        !matches!(self, NetworkIdentity::Unselected)
    }

    fn endpoints<'a>(&self, config: &'a Config) -> Result<&'a ChainEndpoints, RunError> {
        match self {
            NetworkIdentity::Polygon => Ok(&config.chains.polygon),
            NetworkIdentity::Bsc => Ok(&config.chains.bsc),
            NetworkIdentity::Unselected => Err(RunError::NoNetworkSelected),
        }
    }

    pub fn rpc_endpoint<'a>(&self, config: &'a Config) -> Result<&'a str, RunError> {
        Ok(&self.endpoints(config)?.rpc_url)
    }

    pub fn explorer_host<'a>(&self, config: &'a Config) -> Result<&'a str, RunError> {
        Ok(&self.endpoints(config)?.explorer_host)
    }

    pub fn trade_api_url<'a>(&self, config: &'a Config) -> Result<&'a str, RunError> {
        Ok(&self.endpoints(config)?.trade_api_url)
    }
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkIdentity::Unselected => write!(f, "Select Chain"),
            NetworkIdentity::Polygon => write!(f, "POLYGON"),
            NetworkIdentity::Bsc => write!(f, "BSC"),
        }
    }
}

impl FromStr for NetworkIdentity {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "polygon" => Ok(NetworkIdentity::Polygon),
            "bsc" => Ok(NetworkIdentity::Bsc),
            other => Err(RunError::InvalidNetwork(other.to_string())),
        }
    }
}

/// Holds the operator's current chain choice. Switching it has no effect on
/// a run already in flight; runs copy the identity at submission.
#[derive(Debug, Default)]
pub struct NetworkSelector {
    current: NetworkIdentity,
}

impl NetworkSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only a concrete chain can be selected; there is no way back to
    /// `Unselected` short of building a fresh selector.
    pub fn select(&mut self, network: NetworkIdentity) -> Result<(), RunError> {
        if !network.is_selected() {
            return Err(RunError::InvalidNetwork(network.to_string()));
        }
        self.current = network;
        Ok(())
    }

    pub fn current(&self) -> NetworkIdentity {
        self.current
    }
}
