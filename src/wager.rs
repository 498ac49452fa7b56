//! Wager economy
//!
//! Turns drop requests into charged batches and landings into credits.
//! The stake is always debited before any token is spawned, and the
//! per-token value is frozen in the batch at charge time so later changes
//! to the bet never reach tokens already in flight. Payouts are gross:
//! a landing credits `per_token * multiplier`.
//!
//! The ledger keeps full precision; amounts are only rounded to cents
//! for display and for the account service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::sim::BatchId;
use crate::consts::{MAX_TOKENS_PER_DROP, MONEY_EPSILON};
use crate::round_cents;
use crate::sim::{MultiplierTable, RepeatingTask, RiskMode, TaskHandle, TaskPoll};

/// Why a drop was refused
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidWager {
    #[error("total bet must be positive (got {0})")]
    NonPositiveBet(f64),
    #[error("token count must be positive")]
    NoTokens,
    #[error("bet {bet:.2} exceeds balance {balance:.2}")]
    InsufficientBalance { bet: f64, balance: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum WagerError {
    #[error("invalid wager: {0}")]
    InvalidWager(#[from] InvalidWager),
    #[error("manual drops are disabled while auto-play runs")]
    AutoPlayActive,
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("unknown batch {0:?}")]
    UnknownBatch(BatchId),
}

/// Economy state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerPhase {
    /// Nothing charged is waiting on the player
    Idle,
    /// Manually charged tokens still in flight
    ManualPending,
    /// Auto-play cycles are being scheduled
    AutoRunning,
    /// Auto-play stopped, its tokens still in flight
    AutoStopping,
}

/// A group of tokens spawned under one charged wager
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    /// Total amount debited for the batch
    pub stake: f64,
    /// Frozen stake per token
    pub per_token: f64,
    pub token_count: u32,
    /// Tokens not yet settled or forfeited
    pub remaining: u32,
    pub auto: bool,
}

/// Result of crediting one landing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub batch: BatchId,
    pub per_token: f64,
    pub multiplier: f64,
    pub payout: f64,
    pub balance: f64,
}

/// Why auto-play ended on its own
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoStop {
    /// Cancelled through the task handle
    Cancelled,
    /// The next cycle could not be afforded or was invalid
    Refused(InvalidWager),
}

/// Outcome of polling the auto-play cadence
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoCycle {
    /// Auto-play is not running
    Inactive,
    /// Running, next cycle not due yet
    NotDue,
    /// A cycle was charged; spawn its tokens
    Charged(Batch),
    /// Auto-play ended without charging
    Stopped(AutoStop),
}

#[derive(Debug)]
pub struct Wager {
    balance: f64,
    risk_mode: RiskMode,
    total_bet: f64,
    token_count: u32,
    /// Player's Manual/Auto selection
    auto_mode: bool,
    phase: WagerPhase,
    batches: BTreeMap<BatchId, Batch>,
    next_batch_id: u64,
    auto_interval_ticks: u64,
    auto_task: Option<RepeatingTask>,
}

impl Wager {
    pub fn new(balance: f64, total_bet: f64, token_count: u32, auto_interval_ticks: u64) -> Self {
        Self {
            balance: balance.max(0.0),
            risk_mode: RiskMode::default(),
            total_bet: round_cents(total_bet.max(0.0)),
            token_count: token_count.min(MAX_TOKENS_PER_DROP),
            auto_mode: false,
            phase: WagerPhase::Idle,
            batches: BTreeMap::new(),
            next_batch_id: 1,
            auto_interval_ticks,
            auto_task: None,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn phase(&self) -> WagerPhase {
        self.phase
    }

    pub fn total_bet(&self) -> f64 {
        self.total_bet
    }

    pub fn token_count(&self) -> u32 {
        self.token_count
    }

    pub fn risk_mode(&self) -> RiskMode {
        self.risk_mode
    }

    pub fn auto_mode(&self) -> bool {
        self.auto_mode
    }

    pub fn is_auto_running(&self) -> bool {
        self.phase == WagerPhase::AutoRunning
    }

    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(&id)
    }

    /// Batches with tokens still in flight
    pub fn in_flight(&self) -> impl Iterator<Item = &Batch> {
        self.batches.values()
    }

    /// Per-token value shown to the player
    pub fn per_token_value(&self) -> f64 {
        if self.token_count == 0 {
            return 0.0;
        }
        round_cents(self.total_bet / self.token_count as f64)
    }

    /// Best possible return of the next drop
    pub fn max_win(&self, table: &MultiplierTable) -> f64 {
        round_cents(self.total_bet * table.max())
    }

    /// Overwrite the balance (from the account service)
    pub fn load_balance(&mut self, balance: f64) {
        self.balance = balance.max(0.0);
    }

    pub fn set_total_bet(&mut self, amount: f64) -> Result<(), WagerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(WagerError::InvalidAmount(amount));
        }
        self.total_bet = round_cents(amount);
        Ok(())
    }

    /// Tokens per drop, kept within 1..=5 for stable visuals
    pub fn set_token_count(&mut self, count: u32) {
        self.token_count = count.clamp(1, MAX_TOKENS_PER_DROP);
    }

    pub fn set_risk_mode(&mut self, mode: RiskMode) {
        self.risk_mode = mode;
    }

    /// Switch between Manual and Auto; leaving Auto stops a running session
    pub fn set_auto_mode(&mut self, enabled: bool) {
        if !enabled && self.is_auto_running() {
            self.stop_auto();
        }
        self.auto_mode = enabled;
    }

    pub fn add_funds(&mut self, amount: f64) -> Result<f64, WagerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(WagerError::InvalidAmount(amount));
        }
        self.balance += amount;
        log::info!("Added funds {:.2}, balance {:.2}", amount, self.balance);
        Ok(self.balance)
    }

    /// Check a drop of `count` tokens against the current bet and balance
    pub fn validate(&self, count: u32) -> Result<(), InvalidWager> {
        if self.total_bet <= 0.0 {
            return Err(InvalidWager::NonPositiveBet(self.total_bet));
        }
        if count == 0 {
            return Err(InvalidWager::NoTokens);
        }
        if self.balance + MONEY_EPSILON < self.total_bet {
            return Err(InvalidWager::InsufficientBalance {
                bet: self.total_bet,
                balance: self.balance,
            });
        }
        Ok(())
    }

    fn charge(&mut self, count: u32, auto: bool) -> Result<Batch, InvalidWager> {
        self.validate(count)?;

        // Float residue must never push the balance below zero
        self.balance = (self.balance - self.total_bet).max(0.0);
        let batch = Batch {
            id: BatchId(self.next_batch_id),
            stake: self.total_bet,
            per_token: self.total_bet / count as f64,
            token_count: count,
            remaining: count,
            auto,
        };
        self.next_batch_id += 1;
        self.batches.insert(batch.id, batch);

        log::debug!(
            "Charged {:.2} for {} tokens (batch {:?}), balance {:.2}",
            batch.stake,
            count,
            batch.id,
            self.balance
        );
        Ok(batch)
    }

    /// Manual drop with the configured token count
    pub fn place_bet(&mut self) -> Result<Batch, WagerError> {
        self.charge_manual(self.token_count)
    }

    /// Manual drop of `count` tokens; a zero count charges nothing
    pub fn drop_batch(&mut self, count: u32) -> Result<Option<Batch>, WagerError> {
        if count == 0 {
            return Ok(None);
        }
        self.charge_manual(count).map(Some)
    }

    fn charge_manual(&mut self, count: u32) -> Result<Batch, WagerError> {
        if self.is_auto_running() {
            return Err(WagerError::AutoPlayActive);
        }
        let batch = self.charge(count, false)?;
        if self.phase == WagerPhase::Idle {
            self.phase = WagerPhase::ManualPending;
        }
        Ok(batch)
    }

    /// Start auto-play; the first cycle is due at `now`
    pub fn start_auto(&mut self, now: u64) -> Result<TaskHandle, WagerError> {
        if self.is_auto_running() {
            return Err(WagerError::AutoPlayActive);
        }
        self.validate(self.token_count)?;

        let task = RepeatingTask::new(now, self.auto_interval_ticks);
        let handle = task.handle();
        self.auto_task = Some(task);
        self.auto_mode = true;
        self.phase = WagerPhase::AutoRunning;
        log::info!(
            "Auto-play started: bet {:.2} x {} tokens",
            self.total_bet,
            self.token_count
        );
        Ok(handle)
    }

    /// Stop auto-play; no further cycle will charge or spawn
    pub fn stop_auto(&mut self) {
        let Some(task) = self.auto_task.take() else {
            return;
        };
        task.handle().cancel();
        self.phase = if self.batches.is_empty() {
            WagerPhase::Idle
        } else {
            WagerPhase::AutoStopping
        };
        log::info!("Auto-play stopped, balance {:.2}", self.balance);
    }

    /// Run the auto-play cadence for tick `now`
    ///
    /// Solvency and the cancellation flag are read at the moment a cycle is
    /// about to start, never from an earlier snapshot.
    pub fn poll_auto(&mut self, now: u64) -> AutoCycle {
        let Some(task) = self.auto_task.as_mut() else {
            return AutoCycle::Inactive;
        };

        match task.poll(now) {
            TaskPoll::Pending => AutoCycle::NotDue,
            TaskPoll::Cancelled => {
                self.stop_auto();
                AutoCycle::Stopped(AutoStop::Cancelled)
            }
            TaskPoll::Due => match self.charge(self.token_count, true) {
                Ok(batch) => AutoCycle::Charged(batch),
                Err(reason) => {
                    if let Some(task) = self.auto_task.take() {
                        task.handle().cancel();
                    }
                    self.phase = WagerPhase::Idle;
                    log::info!("Auto-play ended: {}", reason);
                    AutoCycle::Stopped(AutoStop::Refused(reason))
                }
            },
        }
    }

    /// Credit one landing from `batch`
    pub fn settle(&mut self, batch: BatchId, multiplier: f64) -> Result<Settlement, WagerError> {
        let entry = self
            .batches
            .get_mut(&batch)
            .ok_or(WagerError::UnknownBatch(batch))?;

        let per_token = entry.per_token;
        let payout = per_token * multiplier;
        self.balance += payout;

        entry.remaining = entry.remaining.saturating_sub(1);
        if entry.remaining == 0 {
            self.batches.remove(&batch);
            self.refresh_phase();
        }

        log::debug!(
            "Settled batch {:?}: {:.2} x {} = {:.2}, balance {:.2}",
            batch,
            per_token,
            multiplier,
            payout,
            self.balance
        );
        Ok(Settlement {
            batch,
            per_token,
            multiplier,
            payout,
            balance: self.balance,
        })
    }

    /// Close out a token that will never land (its stake is lost)
    pub fn forfeit(&mut self, batch: BatchId) -> Result<(), WagerError> {
        let entry = self
            .batches
            .get_mut(&batch)
            .ok_or(WagerError::UnknownBatch(batch))?;
        entry.remaining = entry.remaining.saturating_sub(1);
        log::warn!("Forfeited a token from batch {:?}", batch);
        if entry.remaining == 0 {
            self.batches.remove(&batch);
            self.refresh_phase();
        }
        Ok(())
    }

    fn refresh_phase(&mut self) {
        if !self.batches.is_empty() {
            return;
        }
        if matches!(self.phase, WagerPhase::ManualPending | WagerPhase::AutoStopping) {
            self.phase = WagerPhase::Idle;
        }
    }
}
