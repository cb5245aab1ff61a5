use rand::Rng;
use std::time::Duration;
use tokio::{task::JoinHandle, time};
use tracing::debug;

/// Symbols the synthetic log draws from, mirroring what the dashboard shows.
const TOKEN_POOL: &[&str] = &[
    "USDT", "MATIC", "DAI", "SHIB", "PEPE", "BTC", "ETH", "BNB", "XRP", "DOGE",
    "ADA", "SOL", "DOT", "AVAX", "TRX", "UNI", "LINK", "LTC", "XLM", "ATOM",
    "NEAR", "AAVE", "FTM", "ARB", "OP", "SAND", "MANA", "GALA", "INJ", "RNDR",
    "FLOKI", "CRO", "VET", "HBAR", "LDO", "ENS", "DYDX", "ZIL", "RUNE", "1INCH",
    "BTT", "GMT", "MINA", "ANKR", "CHR", "ALGO", "KAVA", "MASK", "TWT", "YFI",
];

const SCRIPT_LEN: usize = 10;
const ADDRESS_POOL_LEN: usize = 3;

/// A fixed pool of pre-generated status lines. The random draw happens once
/// per script, never per tick.
#[derive(Debug, Clone)]
pub struct LogScript {
    lines: Vec<String>,
}

impl LogScript {
    /// Fresh random draw: three synthetic addresses, ten swap-detection lines
    /// combining token, address and a fake transaction hash.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let addresses: Vec<String> = (0..ADDRESS_POOL_LEN)
            .map(|_| format!("0x{:08x}", rng.gen::<u32>()))
            .collect();

        let lines = (0..SCRIPT_LEN)
            .map(|_| {
                let token = TOKEN_POOL[rng.gen_range(0..TOKEN_POOL.len())];
                let addr = &addresses[rng.gen_range(0..addresses.len())];
                let hash = format!("0x{:032x}{:032x}", rng.gen::<u128>(), rng.gen::<u128>());
                format!("Detected swap on {} by {} | Tx: {}", token, addr, hash)
            })
            .collect();

        Self { lines }
    }

    /// Deterministic seam for tests: emit exactly these lines, in order.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Cancellation handle for a running log stream. Stopping is idempotent and
/// dropping the handle cancels too, so an abandoned stream can never outlive
/// its owner.
#[derive(Debug, Default)]
pub struct LogHandle {
    task: Option<JoinHandle<()>>,
}

impl LogHandle {
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Progress log stream stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().map_or(false, |t| !t.is_finished())
    }
}

impl Drop for LogHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts emitting one script line per `interval`, cycling forever. Each call
/// produces an independent sequence; purely cosmetic, detached from real
/// execution state.
pub fn start<F>(interval: Duration, script: LogScript, on_line: F) -> LogHandle
where
    F: Fn(String) + Send + 'static,
{
    if script.lines.is_empty() {
        return LogHandle::default();
    }

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        let mut index = 0usize;
        loop {
            ticker.tick().await;
            on_line(script.lines[index].clone());
            index = (index + 1) % script.lines.len();
        }
    });

    LogHandle { task: Some(task) }
}
