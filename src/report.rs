//! Round records and session ledger
//!
//! Every settled token produces a `RoundRecord` for the reporting
//! collaborator. The session report keeps running totals and a top-10
//! board of the biggest wins.

use serde::{Deserialize, Serialize};

use crate::sim::{BatchId, ScoreEvent, TokenId};

/// Maximum number of wins to keep
pub const MAX_BIG_WINS: usize = 10;

/// A single settled token
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub event_id: u64,
    pub token: TokenId,
    pub batch: BatchId,
    pub slot_index: usize,
    pub multiplier: f64,
    /// Stake carried by this token
    pub stake: f64,
    pub payout: f64,
    /// Simulation tick of the landing
    pub tick: u64,
}

impl RoundRecord {
    pub fn from_event(event: &ScoreEvent, stake: f64, tick: u64) -> Self {
        Self {
            event_id: event.event_id,
            token: event.token,
            batch: event.batch,
            slot_index: event.slot_index,
            multiplier: event.multiplier,
            stake,
            payout: event.payout,
            tick,
        }
    }

    /// Payout minus stake
    pub fn net(&self) -> f64 {
        self.payout - self.stake
    }
}

/// Running totals for one session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionReport {
    pub rounds: u64,
    /// Sum of per-token stakes that have settled
    pub wagered: f64,
    pub paid_out: f64,
    /// Stakes lost to board rebuilds
    pub forfeited: f64,
    /// Biggest payouts, sorted descending
    pub big_wins: Vec<RoundRecord>,
}

impl SessionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paid out minus everything staked
    pub fn net(&self) -> f64 {
        self.paid_out - self.wagered - self.forfeited
    }

    /// Check if a payout would make the big-win board
    pub fn qualifies(&self, payout: f64) -> bool {
        if payout <= 0.0 {
            return false;
        }
        if self.big_wins.len() < MAX_BIG_WINS {
            return true;
        }
        self.big_wins.last().map(|e| payout > e.payout).unwrap_or(true)
    }

    /// Fold a settled token into the totals
    ///
    /// Returns its rank on the big-win board (1-indexed), if it made it.
    pub fn record(&mut self, record: RoundRecord) -> Option<usize> {
        self.rounds += 1;
        self.wagered += record.stake;
        self.paid_out += record.payout;

        if !self.qualifies(record.payout) {
            return None;
        }

        // Ties keep the earlier win ahead
        let pos = self.big_wins.iter().position(|e| record.payout > e.payout);
        let rank = match pos {
            Some(i) => {
                self.big_wins.insert(i, record);
                i + 1
            }
            None => {
                self.big_wins.push(record);
                self.big_wins.len()
            }
        };
        self.big_wins.truncate(MAX_BIG_WINS);

        Some(rank)
    }

    pub fn record_forfeit(&mut self, stake: f64) {
        self.forfeited += stake;
    }

    pub fn biggest_win(&self) -> Option<&RoundRecord> {
        self.big_wins.first()
    }

    /// Payout-weighted return (paid out per unit wagered)
    pub fn return_ratio(&self) -> Option<f64> {
        (self.wagered > 0.0).then(|| self.paid_out / self.wagered)
    }
}
