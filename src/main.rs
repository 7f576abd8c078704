//! REELBANK — slot outcome display and bankroll-pool accounting client.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the history cache, and runs a read-only watch loop that polls the
//! configured account's pool position and serves it on the dashboard,
//! with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use reelbank::config;
use reelbank::dashboard::{self, routes::DashboardState};
use reelbank::engine::orchestrator::{Orchestrator, OrchestratorSettings, Refreshed};
use reelbank::engine::poller::{poll_once, PollSlot, RefreshBoard};
use reelbank::engine::pool::max_wager;
use reelbank::ledger::rpc::RpcLedger;
use reelbank::storage::HistoryCache;
use reelbank::types::{to_currency, AccountRef};

const BANNER: &str = r#"
 ___  ___  ___  _     ___   _   _  _ _  __
| _ \| __|| __|| |   | _ ) /_\ | \| | |/ /
|   /| _| | _| | |__ | _ \/ _ \| .` | ' <
|_|_\|___||___||____||___/_/ \_\_|\_|_|\_\

  Outcome display & bankroll-pool accounting
  v0.1.0 — read-only watcher
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        program_id = %cfg.ledger.program_id,
        bankroll = %cfg.ledger.bankroll_address,
        wallet = %cfg.account.wallet,
        poll_interval_secs = cfg.poll.interval_secs,
        "REELBANK starting up"
    );

    // -- Initialise components -------------------------------------------

    let table = cfg.outcome_table()?;
    info!(
        buckets = table.buckets().len(),
        code_space = table.code_space(),
        rtp = %table.return_to_player(),
        "Outcome table loaded"
    );

    let ledger = RpcLedger::new(cfg.rpc_url()?, &cfg.ledger, &cfg.history)?;
    if ledger.is_read_only() {
        info!("No wallet signer attached; actions are disabled");
    }

    let cache = HistoryCache::open(&cfg.history.cache_path, cfg.history.cache_ttl_secs)?;
    let settings = OrchestratorSettings::from_config(&cfg)?;
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(ledger), table.clone(), settings, cache));
    let account = cfg.account_ref();

    let board: Arc<RefreshBoard<Refreshed>> = Arc::new(RefreshBoard::new());
    let dash = Arc::new(DashboardState::new(account.key(), table));
    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(dash.clone(), cfg.dashboard.port).await?;
    }
    tokio::spawn(dashboard::follow_spins(dash.clone(), orchestrator.subscribe_spins()));

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.poll.interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.poll.interval_secs,
        "Entering watch loop. Press Ctrl+C to stop."
    );

    let mut polls = PollSlot::new();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let started = polls.start(run_poll(
                    orchestrator.clone(),
                    board.clone(),
                    dash.clone(),
                    account.clone(),
                    cfg.reserve.rent_reserve,
                    cfg.reserve.max_wager_divisor,
                ));
                if !started {
                    warn!("Previous poll still running; skipping this tick");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    polls.abort();
    info!("REELBANK shut down cleanly.");
    Ok(())
}

/// One background poll: refresh, publish if still current, log the summary.
async fn run_poll(
    orchestrator: Arc<Orchestrator>,
    board: Arc<RefreshBoard<Refreshed>>,
    dash: Arc<DashboardState>,
    account: AccountRef,
    rent_reserve: u64,
    max_wager_divisor: u64,
) {
    match poll_once(&orchestrator, &board, &account).await {
        Ok(Some(refreshed)) => {
            let max_bet = max_wager(refreshed.view.snapshot.pool_balance, rent_reserve, max_wager_divisor);
            info!(
                account = %account,
                pool = %to_currency(refreshed.view.snapshot.pool_balance),
                max_bet = %to_currency(max_bet),
                view = %refreshed.view,
                "Pool position"
            );
            let total_shares = refreshed.view.snapshot.total_shares;
            dash.publish_view(refreshed.view, refreshed.history).await;

            match orchestrator.leaderboard(total_shares).await {
                Ok(ranked) => dash.publish_investors(ranked).await,
                Err(e) => warn!(error = %e, "Investor leaderboard unavailable"),
            }
        }
        Ok(None) => {}
        Err(e) => error!(account = %account, error = %e, "Poll failed, continuing to next"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reelbank=info"));

    let json_logging = std::env::var("REELBANK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
