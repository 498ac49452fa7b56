//! Engine facade
//!
//! Owns the board, physics world, wager economy and balance sync, and
//! drives them from one fixed-timestep tick. Everything the presentation
//! layer sees comes out through the score and frame callbacks.

use glam::Vec2;
use rand_pcg::Pcg32;
use thiserror::Error;

use crate::balance::{BalanceError, BalanceService, BalanceSync};
use crate::consts::*;
use crate::report::{RoundRecord, SessionReport};
use crate::settings::{EngineConfig, SettingsError};
use crate::round_cents;
use crate::sim::{
    BoardError, BoardLayout, Body, BodyTag, Landing, MultiplierTable, PhysicsWorld, RiskMode,
    RngState, ScoreEvent, Scorer, Spawner, TaskHandle, Token, TokenFrame, TokenId,
};
use crate::wager::{AutoCycle, Batch, Wager, WagerError, WagerPhase};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Wager(#[from] WagerError),
    #[error(transparent)]
    Balance(#[from] BalanceError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("board has not been initialized")]
    NoBoard,
}

pub type ScoreCallback = Box<dyn FnMut(&ScoreEvent)>;
pub type FrameCallback = Box<dyn FnMut(&[TokenFrame])>;

pub struct PlinkoEngine {
    config: EngineConfig,
    board: Option<BoardLayout>,
    multipliers: MultiplierTable,
    world: PhysicsWorld,
    scorer: Scorer,
    spawner: Spawner,
    rng: Pcg32,
    wager: Wager,
    balance: BalanceSync,
    report: SessionReport,
    /// Settled tokens not yet collected by the reporting side
    records: Vec<RoundRecord>,
    score_listeners: Vec<ScoreCallback>,
    frame_listeners: Vec<FrameCallback>,
    next_event_id: u64,
    time_ticks: u64,
    accumulator: f32,
}

impl std::fmt::Debug for PlinkoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlinkoEngine")
            .field("time_ticks", &self.time_ticks)
            .field("wager", &self.wager)
            .field("live_tokens", &self.scorer.live_count())
            .finish_non_exhaustive()
    }
}

impl PlinkoEngine {
    /// Create an engine, reading the starting balance from `service`
    pub fn new(config: EngineConfig, service: Box<dyn BalanceService>) -> Result<Self, EngineError> {
        config.validate()?;
        let mut balance = BalanceSync::new(service);
        let starting = balance.fetch()?;

        let mut wager = Wager::new(
            starting,
            config.total_bet,
            config.token_count,
            config.auto_interval_ticks(),
        );
        wager.set_risk_mode(config.risk_mode);

        log::info!(
            "Engine ready: balance {:.2}, seed {}, mode {}",
            starting,
            config.seed,
            config.risk_mode
        );

        Ok(Self {
            multipliers: MultiplierTable::generate(config.risk_mode, 0),
            world: PhysicsWorld::new(config.gravity, TOKEN_MAX_SPEED),
            scorer: Scorer::new(config.settle_delay_ticks(), TOKEN_LANDING_REBOUND),
            spawner: Spawner::new(config.spawn_params()),
            rng: RngState::new(config.seed).to_rng(),
            board: None,
            wager,
            balance,
            report: SessionReport::new(),
            records: Vec::new(),
            score_listeners: Vec::new(),
            frame_listeners: Vec::new(),
            next_event_id: 1,
            time_ticks: 0,
            accumulator: 0.0,
            config,
        })
    }

    // === Board ===

    /// Build (or rebuild) the board for a `width` x `height` view
    ///
    /// Tokens still falling on the old board are destroyed and their
    /// stakes forfeited.
    pub fn initialize_board(&mut self, width: f32, height: f32) -> Result<&BoardLayout, EngineError> {
        let layout = BoardLayout::generate(width, height)?;

        self.forfeit_live_tokens();

        let mut world = PhysicsWorld::new(self.config.gravity, TOKEN_MAX_SPEED);
        let scorer = Scorer::new(self.config.settle_delay_ticks(), TOKEN_LANDING_REBOUND);

        for boundary in layout.boundaries() {
            world.add_static_body(Body::static_rect(BodyTag::Boundary, boundary.center, boundary.size));
        }
        for peg in &layout.pegs {
            world.add_static_body(Body::static_circle(
                BodyTag::Peg(peg.id),
                peg.pos,
                peg.radius,
                PEG_RESTITUTION,
            ));
        }
        for slot in &layout.slots {
            world.add_static_body(Body::sensor_rect(
                BodyTag::Slot(slot.index),
                slot.pos,
                Vec2::new(slot.width, slot.height),
            ));
        }

        self.world = world;
        self.scorer = scorer;
        self.multipliers = MultiplierTable::generate(self.wager.risk_mode(), layout.slot_count());
        let board = self.board.insert(layout);
        Ok(&*board)
    }

    fn forfeit_live_tokens(&mut self) {
        let unscored = self.scorer.clear(&mut self.world);
        if unscored.is_empty() {
            return;
        }
        log::warn!("Board rebuilt with {} tokens in flight", unscored.len());
        self.forfeit_tokens(unscored);
    }

    /// Give up on tokens that will never score
    fn forfeit_tokens(&mut self, tokens: Vec<Token>) {
        for token in tokens {
            if let Some(batch) = self.wager.batch(token.batch) {
                self.report.record_forfeit(batch.per_token);
            }
            if let Err(e) = self.wager.forfeit(token.batch) {
                log::warn!("Could not forfeit token {:?}: {}", token.id, e);
            }
        }
    }

    pub fn board(&self) -> Option<&BoardLayout> {
        self.board.as_ref()
    }

    // === Wager settings ===

    /// Change the risk profile; tokens already falling score against the new table
    pub fn set_risk_mode(&mut self, mode: RiskMode) -> &[f64] {
        self.wager.set_risk_mode(mode);
        let slot_count = self.board.as_ref().map_or(0, BoardLayout::slot_count);
        self.multipliers = MultiplierTable::generate(mode, slot_count);
        log::info!("Risk mode set to {}", mode);
        self.multipliers.values()
    }

    pub fn multipliers(&self) -> &MultiplierTable {
        &self.multipliers
    }

    pub fn set_total_bet(&mut self, amount: f64) -> Result<(), EngineError> {
        Ok(self.wager.set_total_bet(amount)?)
    }

    pub fn set_token_count(&mut self, count: u32) {
        self.wager.set_token_count(count);
    }

    pub fn set_auto_mode(&mut self, enabled: bool) {
        self.wager.set_auto_mode(enabled);
    }

    pub fn add_funds(&mut self, amount: f64) -> Result<f64, EngineError> {
        let balance = self.wager.add_funds(amount)?;
        self.balance_changed();
        Ok(balance)
    }

    /// Best possible return of the next drop
    pub fn max_win(&self) -> f64 {
        self.wager.max_win(&self.multipliers)
    }

    // === Drops ===

    /// Charge and spawn one manual drop with the configured token count
    pub fn place_bet(&mut self) -> Result<Vec<TokenId>, EngineError> {
        self.require_board()?;
        let batch = self.wager.place_bet()?;
        Ok(self.launch(batch))
    }

    /// Charge and spawn `count` tokens; zero does nothing
    pub fn drop_batch(&mut self, count: u32) -> Result<Vec<TokenId>, EngineError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.require_board()?;
        match self.wager.drop_batch(count)? {
            Some(batch) => Ok(self.launch(batch)),
            None => Ok(Vec::new()),
        }
    }

    /// Start auto-play; the first cycle runs on the next tick
    pub fn start_auto(&mut self) -> Result<TaskHandle, EngineError> {
        self.require_board()?;
        Ok(self.wager.start_auto(self.time_ticks + 1)?)
    }

    pub fn stop_auto(&mut self) {
        self.wager.stop_auto();
    }

    fn require_board(&self) -> Result<&BoardLayout, EngineError> {
        self.board.as_ref().ok_or(EngineError::NoBoard)
    }

    /// Spawn the tokens of a charged batch
    fn launch(&mut self, batch: Batch) -> Vec<TokenId> {
        self.balance_changed();

        let Some(board) = self.board.as_ref() else {
            return Vec::new();
        };
        let tokens = self.spawner.spawn(
            &mut self.world,
            &mut self.rng,
            board.width,
            board.height,
            batch.token_count,
            batch.id,
        );
        tokens
            .into_iter()
            .map(|token| {
                let id = token.id;
                self.scorer.track(token);
                id
            })
            .collect()
    }

    // === Callbacks ===

    /// Called once per settled token
    pub fn on_score(&mut self, callback: impl FnMut(&ScoreEvent) + 'static) {
        self.score_listeners.push(Box::new(callback));
    }

    /// Called after every tick with the live tokens
    pub fn on_frame(&mut self, callback: impl FnMut(&[TokenFrame]) + 'static) {
        self.frame_listeners.push(Box::new(callback));
    }

    // === Simulation ===

    /// Advance by wall-clock time, running at most `MAX_SUBSTEPS` ticks
    ///
    /// Returns the number of ticks run.
    pub fn update(&mut self, elapsed: f32) -> u32 {
        self.accumulator += elapsed.clamp(0.0, 0.1);

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.tick();
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS && self.accumulator >= SIM_DT {
            // Too far behind to catch up; drop the backlog
            self.accumulator = 0.0;
        }
        substeps
    }

    /// Advance the engine by one fixed timestep
    pub fn tick(&mut self) {
        self.time_ticks += 1;
        let now = self.time_ticks;

        if let AutoCycle::Charged(batch) = self.wager.poll_auto(now) {
            self.launch(batch);
        }

        self.world.step(SIM_DT);

        for contact in self.world.drain_contacts() {
            if let Some(landing) =
                self.scorer
                    .on_contact(&mut self.world, contact, &self.multipliers, now)
            {
                self.settle(landing);
            }
        }

        self.scorer.process_removals(&mut self.world, now);

        let stalled = self
            .scorer
            .expire_stalled(&mut self.world, self.config.max_flight_ticks());
        if !stalled.is_empty() {
            log::warn!("{} tokens never reached a slot", stalled.len());
            self.forfeit_tokens(stalled);
            self.balance_changed();
        }

        if !self.frame_listeners.is_empty() {
            let frames = self.scorer.frames(&self.world);
            for listener in &mut self.frame_listeners {
                listener(frames.as_slice());
            }
        }
    }

    fn settle(&mut self, landing: Landing) {
        let settlement = match self.wager.settle(landing.batch, landing.multiplier) {
            Ok(settlement) => settlement,
            Err(e) => {
                log::warn!("Landing of token {:?} not settled: {}", landing.token, e);
                return;
            }
        };

        let event = ScoreEvent {
            event_id: self.next_event_id,
            token: landing.token,
            batch: landing.batch,
            slot_index: landing.slot_index,
            multiplier: landing.multiplier,
            payout: settlement.payout,
        };
        self.next_event_id += 1;

        let record = RoundRecord::from_event(&event, settlement.per_token, self.time_ticks);
        if let Some(rank) = self.report.record(record) {
            log::debug!("Win {:.2} ranks #{} this session", record.payout, rank);
        }
        self.records.push(record);

        for listener in &mut self.score_listeners {
            listener(&event);
        }

        self.balance_changed();
    }

    fn balance_changed(&mut self) {
        self.balance.mark(round_cents(self.wager.balance()));
        self.balance.flush();
    }

    /// Tick until every token has settled and auto-play is off
    ///
    /// Returns `false` if `max_ticks` ran out first.
    pub fn run_until_settled(&mut self, max_ticks: u64) -> bool {
        for _ in 0..max_ticks {
            if self.is_settled() {
                return true;
            }
            self.tick();
        }
        self.is_settled()
    }

    // === Queries ===

    pub fn is_settled(&self) -> bool {
        self.scorer.live_count() == 0 && self.wager.phase() == WagerPhase::Idle
    }

    pub fn balance(&self) -> f64 {
        self.wager.balance()
    }

    pub fn phase(&self) -> WagerPhase {
        self.wager.phase()
    }

    pub fn wager(&self) -> &Wager {
        &self.wager
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Hand over the round records gathered since the last call
    pub fn take_records(&mut self) -> Vec<RoundRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn frames(&self) -> Vec<TokenFrame> {
        self.scorer.frames(&self.world)
    }

    pub fn live_tokens(&self) -> usize {
        self.scorer.live_count()
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the latest balance is still waiting to be persisted
    pub fn balance_dirty(&self) -> bool {
        self.balance.is_dirty()
    }
}
