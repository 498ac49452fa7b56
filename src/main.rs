//! PlinkOink headless runner
//!
//! Builds a board, runs an auto-play session against an in-memory
//! account and logs the result. Pass a JSON config path to override the
//! defaults. Set `RUST_LOG=debug` to see every settlement.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use plinkoink::{EngineConfig, MemoryBalanceService, PlinkoEngine};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("PlinkOink (native) starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Could not load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    if let Err(e) = run_session(config, MemoryBalanceService::new(1000.0)) {
        log::error!("Session failed: {}", e);
        std::process::exit(1);
    }

    fn run_session(
        config: EngineConfig,
        account: MemoryBalanceService,
    ) -> Result<(), plinkoink::engine::EngineError> {
        // Ten minutes of simulated play at most
        const MAX_TICKS: u64 = 10 * 60 * plinkoink::consts::TICKS_PER_SECOND as u64;
        const SESSION_CYCLES: u64 = 25;

        let mut engine = PlinkoEngine::new(config, Box::new(account.clone()))?;
        let slot_count = engine.initialize_board(1000.0, 800.0)?.slot_count();
        log::info!("{} slots: {:?}", slot_count, engine.multipliers().values());
        log::info!("Max win per drop: {:.2}", engine.max_win());

        engine.on_score(|event| {
            log::debug!(
                "Token {:?} landed in slot {} (x{}) paying {:.2}",
                event.token,
                event.slot_index,
                event.multiplier,
                event.payout
            );
        });

        let handle = engine.start_auto()?;
        let interval = engine.config().auto_interval_ticks();
        let mut ticks = 0;
        while ticks < MAX_TICKS && !engine.is_settled() {
            engine.tick();
            ticks += 1;
            if ticks == interval * SESSION_CYCLES {
                handle.cancel();
            }
        }

        let report = engine.report();
        log::info!(
            "Session over after {} ticks: {} rounds, wagered {:.2}, paid {:.2}, net {:.2}",
            ticks,
            report.rounds,
            report.wagered,
            report.paid_out,
            report.net()
        );
        if let Some(win) = report.biggest_win() {
            log::info!("Biggest win: {:.2} at x{}", win.payout, win.multiplier);
        }
        log::info!("Final balance {:.2} (persisted {:.2})", engine.balance(), account.balance());
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page on wasm32
}
