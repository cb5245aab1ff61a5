#[cfg(test)]
mod tests {
    use crate::{
        config::Config,
        engine::orchestrator::RunOrchestrator,
        error::RunError,
        models::{BalanceSnapshot, ReceiptStatus, RunRequest, RunResponse, RunState, TxBundle},
        network::NetworkIdentity,
        session::SessionStore,
        simulator::LogScript,
        trade::TradeService,
        utils::rpc::ChainRpc,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::{
        collections::VecDeque,
        str::FromStr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };
    use tokio::time::{self, Duration, Instant};

    struct MockChain {
        balances: Mutex<VecDeque<Result<Decimal, RunError>>>,
        receipts: Mutex<VecDeque<ReceiptStatus>>,
        receipt_calls: AtomicUsize,
    }

    impl MockChain {
        fn new(balances: Vec<Result<Decimal, RunError>>) -> Arc<Self> {
            Self::with_receipts(balances, vec![])
        }

        fn with_receipts(
            balances: Vec<Result<Decimal, RunError>>,
            receipts: Vec<ReceiptStatus>,
        ) -> Arc<Self> {
            Arc::new(Self {
                balances: Mutex::new(balances.into()),
                receipts: Mutex::new(receipts.into()),
                receipt_calls: AtomicUsize::new(0),
            })
        }

        fn receipt_calls(&self) -> usize {
            self.receipt_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChainRpc for MockChain {
        async fn get_balance(
            &self,
            network: NetworkIdentity,
            address: &str,
        ) -> Result<BalanceSnapshot, RunError> {
            let next = self.balances.lock().unwrap().pop_front();
            match next {
                Some(Ok(value)) => Ok(BalanceSnapshot {
                    network,
                    address: address.to_string(),
                    value,
                    observed_at: chrono::Utc::now(),
                }),
                Some(Err(e)) => Err(e),
                None => Err(RunError::RpcUnavailable("no balance scripted".to_string())),
            }
        }

        async fn get_receipt(
            &self,
            _network: NetworkIdentity,
            _tx_hash: &str,
        ) -> Result<ReceiptStatus, RunError> {
            self.receipt_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .receipts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ReceiptStatus::Confirmed { success: true }))
        }
    }

    struct MockTrade {
        responses: Mutex<VecDeque<(Duration, Result<RunResponse, RunError>)>>,
        calls: AtomicUsize,
    }

    impl MockTrade {
        fn new(responses: Vec<(Duration, Result<RunResponse, RunError>)>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TradeService for MockTrade {
        async fn run_bot(
            &self,
            _network: NetworkIdentity,
            _request: &RunRequest,
        ) -> Result<RunResponse, RunError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some((delay, result)) => {
                    time::sleep(delay).await;
                    result
                }
                None => Err(RunError::TradeService {
                    message: "unexpected trade call".to_string(),
                }),
            }
        }
    }

    fn ok_response(frontrun: Option<&str>, target: Option<&str>, take_profit: Option<&str>) -> RunResponse {
        RunResponse {
            data: Some(TxBundle {
                frontrun_tx_hash: frontrun.map(String::from),
                target_tx_hash: target.map(String::from),
                take_profit_tx_hash: take_profit.map(String::from),
            }),
            message: "ok".to_string(),
        }
    }

    fn orchestrator(chain: Arc<MockChain>, trade: Arc<MockTrade>) -> Arc<RunOrchestrator> {
        orchestrator_with_config(Config::default(), chain, trade)
    }

    fn orchestrator_with_config(
        config: Config,
        chain: Arc<MockChain>,
        trade: Arc<MockTrade>,
    ) -> Arc<RunOrchestrator> {
        let session_path =
            std::env::temp_dir().join(format!("run-test-{}.json", uuid::Uuid::new_v4()));
        let session = Arc::new(SessionStore::open(session_path));
        let orch = RunOrchestrator::new(config, chain, trade, session);
        orch.set_log_script(LogScript::from_lines(vec!["scan 1".into(), "scan 2".into()]));
        orch
    }

    fn request(network: NetworkIdentity) -> RunRequest {
        RunRequest {
            network,
            address: "0xA1".to_string(),
            private_key: "k1".to_string(),
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn unselected_network_fails_before_any_timer() {
        let chain = MockChain::new(vec![]);
        let trade = MockTrade::new(vec![]);
        let orch = orchestrator(chain, trade.clone());

        let err = orch
            .request_run(request(NetworkIdentity::Unselected))
            .unwrap_err();
        assert_eq!(err, RunError::NoNetworkSelected);
        assert_eq!(orch.live_timer_count(), 0);
        assert_eq!(orch.state(), RunState::Idle);
        assert_eq!(trade.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_credentials_fail_inline() {
        let chain = MockChain::new(vec![]);
        let trade = MockTrade::new(vec![]);
        let orch = orchestrator(chain, trade);

        let mut req = request(NetworkIdentity::Polygon);
        req.private_key = "  ".to_string();
        assert_eq!(orch.request_run(req).unwrap_err(), RunError::MissingCredentials);

        let mut req = request(NetworkIdentity::Bsc);
        req.address = String::new();
        assert_eq!(orch.request_run(req).unwrap_err(), RunError::MissingCredentials);

        assert_eq!(orch.state(), RunState::Idle);
        assert_eq!(orch.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_success_still_waits_for_minimum_duration() {
        let chain = MockChain::new(vec![Ok(dec("10.0")), Ok(dec("10.5"))]);
        let trade = MockTrade::new(vec![(
            Duration::from_millis(2_000),
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);
        let orch = orchestrator(chain, trade);

        let started = Instant::now();
        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        assert!(started.elapsed() >= Duration::from_millis(60_000));

        match orch.state() {
            RunState::Succeeded { result, profit } => {
                assert_eq!(result.frontrun_tx_hash, "0xF");
                assert_eq!(result.target_tx_hash, "0xT");
                assert_eq!(result.take_profit_tx_hash, None);
                assert_eq!(result.service_message, "ok");
                assert_eq!(profit, Some(dec("0.5")));
            }
            other => panic!("expected Succeeded, got {:?}", other),
        }

        // Success clears the synthetic log stream.
        assert!(orch.log_lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn log_stream_runs_only_while_running() {
        let chain = MockChain::new(vec![Ok(dec("1")), Ok(dec("1"))]);
        let trade = MockTrade::new(vec![(
            Duration::from_millis(10_000),
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);
        let orch = orchestrator(chain, trade);

        orch.request_run(request(NetworkIdentity::Bsc)).unwrap();
        time::sleep(Duration::from_millis(1_000)).await;

        let lines = orch.log_lines();
        assert!(!lines.is_empty());
        assert_eq!(lines[0], "scan 1");

        orch.settled().await;
        assert!(orch.log_lines().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_primary_hash_fails_and_never_polls() {
        let chain = MockChain::new(vec![Ok(dec("1"))]);
        let trade = MockTrade::new(vec![(
            Duration::ZERO,
            Ok(RunResponse { data: None, message: "looks fine".to_string() }),
        )]);
        let orch = orchestrator(chain.clone(), trade);

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        assert_eq!(
            orch.state(),
            RunState::Failed { error: RunError::MissingTransactionHash }
        );
        assert_eq!(chain.receipt_calls(), 0);

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trade_error_surfaces_remote_message() {
        let chain = MockChain::new(vec![Ok(dec("1"))]);
        let trade = MockTrade::new(vec![(
            Duration::from_millis(500),
            Err(RunError::TradeService { message: "insufficient gas".to_string() }),
        )]);
        let orch = orchestrator(chain.clone(), trade);

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        assert_eq!(
            orch.state(),
            RunState::Failed {
                error: RunError::TradeService { message: "insufficient gas".to_string() }
            }
        );
        assert_eq!(chain.receipt_calls(), 0);

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn profit_absent_when_pre_balance_missing() {
        let chain = MockChain::new(vec![
            Err(RunError::RpcUnavailable("node down".to_string())),
            Ok(dec("10.5")),
        ]);
        let trade = MockTrade::new(vec![(
            Duration::ZERO,
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);
        let orch = orchestrator(chain, trade);

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        match orch.state() {
            RunState::Succeeded { profit, .. } => assert_eq!(profit, None),
            other => panic!("expected Succeeded, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn profit_absent_when_post_balance_missing() {
        let chain = MockChain::new(vec![
            Ok(dec("10.0")),
            Err(RunError::RpcUnavailable("node down".to_string())),
        ]);
        let trade = MockTrade::new(vec![(
            Duration::ZERO,
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);
        let orch = orchestrator(chain, trade);

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        match orch.state() {
            RunState::Succeeded { profit, .. } => assert_eq!(profit, None),
            other => panic!("expected Succeeded, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn negative_profit_is_a_signed_value() {
        let chain = MockChain::new(vec![Ok(dec("10.0")), Ok(dec("9.25"))]);
        let trade = MockTrade::new(vec![(
            Duration::ZERO,
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);
        let orch = orchestrator(chain, trade);

        orch.request_run(request(NetworkIdentity::Bsc)).unwrap();
        orch.settled().await;

        match orch.state() {
            RunState::Succeeded { profit, .. } => assert_eq!(profit, Some(dec("-0.75"))),
            other => panic!("expected Succeeded, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn supersession_discards_the_first_run() {
        let chain = MockChain::new(vec![Ok(dec("1")), Ok(dec("1"))]);
        let trade = MockTrade::new(vec![
            // First run's call resolves long after the second run failed.
            (
                Duration::from_millis(60_000),
                Ok(ok_response(Some("0xOLD"), Some("0xOLD2"), None)),
            ),
            (
                Duration::ZERO,
                Err(RunError::TradeService { message: "insufficient gas".to_string() }),
            ),
        ]);
        let orch = orchestrator(chain, trade.clone());

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        time::sleep(Duration::from_millis(1_000)).await;
        assert!(orch.state().is_active());

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        let failed = RunState::Failed {
            error: RunError::TradeService { message: "insufficient gas".to_string() },
        };
        assert_eq!(orch.state(), failed);
        assert_eq!(trade.calls(), 2);

        // The first run's late result must not overwrite the Failed state.
        time::sleep(Duration::from_millis(120_000)).await;
        assert_eq!(orch.state(), failed);
        assert_eq!(orch.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_poll_outlives_success_until_disposed() {
        let pending = vec![ReceiptStatus::Pending; 500];
        let chain = MockChain::with_receipts(vec![Ok(dec("1")), Ok(dec("1"))], pending);
        let trade = MockTrade::new(vec![(
            Duration::from_millis(2_000),
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);
        let orch = orchestrator(chain.clone(), trade);

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        // The receipt never confirmed, so the poll is still working after
        // the run reached Succeeded.
        time::sleep(Duration::from_millis(10)).await;
        assert!(chain.receipt_calls() >= 1);
        assert_eq!(orch.live_timer_count(), 1);

        orch.dispose();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.live_timer_count(), 0);
        assert_eq!(orch.state(), RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_poll_gives_up_after_max_attempts() {
        let pending = vec![ReceiptStatus::Pending; 500];
        let chain = MockChain::with_receipts(vec![Ok(dec("1")), Ok(dec("1"))], pending);
        let trade = MockTrade::new(vec![(
            Duration::ZERO,
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);

        let mut config = Config::default();
        config.run.max_poll_attempts = 5;
        let orch = orchestrator_with_config(config, chain.clone(), trade);

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        // Long past the last scheduled attempt. The poll must have stopped on
        // its own, without dispose().
        time::sleep(Duration::from_millis(120_000)).await;
        assert_eq!(chain.receipt_calls(), 5);
        assert_eq!(orch.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_everything_mid_run() {
        let chain = MockChain::new(vec![Ok(dec("1"))]);
        let trade = MockTrade::new(vec![(
            Duration::from_millis(3_600_000),
            Ok(ok_response(Some("0xF"), Some("0xT"), None)),
        )]);
        let orch = orchestrator(chain, trade);

        orch.request_run(request(NetworkIdentity::Bsc)).unwrap();
        time::sleep(Duration::from_millis(1_000)).await;
        assert!(orch.live_timer_count() >= 2);

        orch.dispose();
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orch.live_timer_count(), 0);
        assert_eq!(orch.state(), RunState::Idle);

        // Idempotent at any state.
        orch.dispose();
        assert_eq!(orch.live_timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn take_profit_hash_is_carried_when_present() {
        let chain = MockChain::new(vec![Ok(dec("1")), Ok(dec("1"))]);
        let trade = MockTrade::new(vec![(
            Duration::ZERO,
            Ok(ok_response(Some("0xF"), Some("0xT"), Some("0xP"))),
        )]);
        let orch = orchestrator(chain, trade);

        orch.request_run(request(NetworkIdentity::Polygon)).unwrap();
        orch.settled().await;

        match orch.state() {
            RunState::Succeeded { result, .. } => {
                assert_eq!(result.take_profit_tx_hash.as_deref(), Some("0xP"));
            }
            other => panic!("expected Succeeded, got {:?}", other),
        }
    }
}
