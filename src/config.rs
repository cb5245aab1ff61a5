use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::{env, fs};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub run: RunConfig,
    pub chains: ChainsConfig,
    pub rpc: RpcConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Trade size forwarded to the trade service, in native units.
    pub amount: u64,
    /// Floor on how long a run stays visibly "running" even when the remote
    /// call returns faster.
    pub min_run_duration_ms: u64,
    /// Cadence of the synthetic progress log.
    pub log_interval_ms: u64,
    /// Cadence of the transaction-receipt confirmation poll.
    pub poll_interval_ms: u64,
    /// Confirmation polling gives up after this many attempts.
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainsConfig {
    pub polygon: ChainEndpoints,
    pub bsc: ChainEndpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEndpoints {
    pub rpc_url: String,
    pub explorer_host: String,
    pub trade_api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub max_requests_per_second: u32,
    pub burst_size: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            run: RunConfig {
                amount: 1,
                min_run_duration_ms: 60_000,
                log_interval_ms: 300,
                poll_interval_ms: 5_000,
                max_poll_attempts: 60,
            },
            chains: ChainsConfig {
                polygon: ChainEndpoints {
                    rpc_url: "https://polygon-rpc.com".to_string(),
                    explorer_host: "polygonscan.com".to_string(),
                    trade_api_url: "https://marlinnapp-5e0bd806334c.herokuapp.com/api/runBot"
                        .to_string(),
                },
                bsc: ChainEndpoints {
                    rpc_url: "https://bsc-dataseed.binance.org".to_string(),
                    explorer_host: "bscscan.com".to_string(),
                    trade_api_url: "https://bnbsniperbot-aa86ddbecda5.herokuapp.com/api/runBot"
                        .to_string(),
                },
            },
            rpc: RpcConfig {
                max_requests_per_second: 10,
                burst_size: 20,
                timeout_secs: 30,
            },
            session: SessionConfig {
                path: "session.json".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        if dotenv().is_err() {
            tracing::warn!("No .env file found, using environment variables and config file");
        }

        let config_path = "config.toml";
        let mut config = if let Ok(content) = fs::read_to_string(config_path) {
            toml::from_str::<Config>(&content).context("Failed to parse config.toml")?
        } else {
            Config::default()
        };

        config.override_with_env()?;
        config.validate()?;

        Ok(config)
    }

    fn override_with_env(&mut self) -> Result<()> {
        if let Ok(val) = env::var("TRADE_AMOUNT") {
            self.run.amount = val.parse()?;
        }
        if let Ok(val) = env::var("MIN_RUN_DURATION_MS") {
            self.run.min_run_duration_ms = val.parse()?;
        }
        if let Ok(val) = env::var("POLL_INTERVAL_MS") {
            self.run.poll_interval_ms = val.parse()?;
        }
        if let Ok(val) = env::var("MAX_POLL_ATTEMPTS") {
            self.run.max_poll_attempts = val.parse()?;
        }

        if let Ok(val) = env::var("POLYGON_RPC_URL") {
            self.chains.polygon.rpc_url = val;
        }
        if let Ok(val) = env::var("POLYGON_TRADE_API_URL") {
            self.chains.polygon.trade_api_url = val;
        }
        if let Ok(val) = env::var("BSC_RPC_URL") {
            self.chains.bsc.rpc_url = val;
        }
        if let Ok(val) = env::var("BSC_TRADE_API_URL") {
            self.chains.bsc.trade_api_url = val;
        }

        if let Ok(val) = env::var("SESSION_PATH") {
            self.session.path = val;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, endpoints) in [
            ("polygon", &self.chains.polygon),
            ("bsc", &self.chains.bsc),
        ] {
            Url::parse(&endpoints.rpc_url)
                .with_context(|| format!("Invalid {} rpc_url: {}", name, endpoints.rpc_url))?;
            Url::parse(&endpoints.trade_api_url).with_context(|| {
                format!("Invalid {} trade_api_url: {}", name, endpoints.trade_api_url)
            })?;
        }

        if self.run.log_interval_ms == 0 || self.run.poll_interval_ms == 0 {
            anyhow::bail!("Timer intervals must be non-zero");
        }

        Ok(())
    }
}
