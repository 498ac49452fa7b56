//! Balance collaborator
//!
//! The account store behind the wager economy. Persistence is
//! fire-and-forget: the engine never waits on it, a failure is logged and
//! the latest balance is written again after the next mutation.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("balance service unavailable: {0}")]
    Unavailable(String),
    #[error("balance storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed balance record: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where the player's balance lives
pub trait BalanceService {
    fn fetch_balance(&mut self) -> Result<f64, BalanceError>;
    fn persist_balance(&mut self, balance: f64) -> Result<(), BalanceError>;
}

/// Balance held in memory
///
/// Clones share the same cell, so a test or host can observe what the
/// engine persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBalanceService {
    balance: Rc<RefCell<f64>>,
}

impl MemoryBalanceService {
    pub fn new(balance: f64) -> Self {
        Self {
            balance: Rc::new(RefCell::new(balance)),
        }
    }

    pub fn balance(&self) -> f64 {
        *self.balance.borrow()
    }
}

impl BalanceService for MemoryBalanceService {
    fn fetch_balance(&mut self) -> Result<f64, BalanceError> {
        Ok(self.balance())
    }

    fn persist_balance(&mut self, balance: f64) -> Result<(), BalanceError> {
        *self.balance.borrow_mut() = balance;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BalanceRecord {
    balance: f64,
}

/// Balance stored as `{"balance": <amount>}` in a JSON file
#[derive(Debug, Clone)]
pub struct FileBalanceService {
    path: PathBuf,
    /// Balance reported when the file does not exist yet
    initial: f64,
}

impl FileBalanceService {
    pub fn new(path: impl Into<PathBuf>, initial: f64) -> Self {
        Self {
            path: path.into(),
            initial,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BalanceService for FileBalanceService {
    fn fetch_balance(&mut self) -> Result<f64, BalanceError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No balance file at {}, starting fresh", self.path.display());
                return Ok(self.initial);
            }
            Err(e) => return Err(e.into()),
        };
        let record: BalanceRecord = serde_json::from_str(&json)?;
        Ok(record.balance)
    }

    fn persist_balance(&mut self, balance: f64) -> Result<(), BalanceError> {
        let json = serde_json::to_string(&BalanceRecord { balance })?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Tracks whether the latest balance still has to reach the service
pub struct BalanceSync {
    service: Box<dyn BalanceService>,
    pending: Option<f64>,
    failures: u32,
}

impl std::fmt::Debug for BalanceSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceSync")
            .field("pending", &self.pending)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl BalanceSync {
    pub fn new(service: Box<dyn BalanceService>) -> Self {
        Self {
            service,
            pending: None,
            failures: 0,
        }
    }

    /// Read the starting balance; a non-finite or negative value is refused
    pub fn fetch(&mut self) -> Result<f64, BalanceError> {
        let balance = self.service.fetch_balance()?;
        if !balance.is_finite() || balance < 0.0 {
            return Err(BalanceError::Unavailable(format!(
                "service reported balance {}",
                balance
            )));
        }
        Ok(balance)
    }

    /// Queue `balance` for persistence
    pub fn mark(&mut self, balance: f64) {
        self.pending = Some(balance);
    }

    /// Try to persist the latest queued balance
    ///
    /// Returns `true` when nothing is left pending.
    pub fn flush(&mut self) -> bool {
        let Some(balance) = self.pending else {
            return true;
        };
        match self.service.persist_balance(balance) {
            Ok(()) => {
                if self.failures > 0 {
                    log::info!("Balance persisted after {} failed attempts", self.failures);
                }
                self.pending = None;
                self.failures = 0;
                true
            }
            Err(e) => {
                self.failures += 1;
                log::warn!("Failed to persist balance {:.2}: {}", balance, e);
                false
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails the first `fail_times` writes
    struct FlakyService {
        fail_times: Rc<Cell<u32>>,
        written: Rc<RefCell<Vec<f64>>>,
    }

    impl BalanceService for FlakyService {
        fn fetch_balance(&mut self) -> Result<f64, BalanceError> {
            Ok(0.0)
        }

        fn persist_balance(&mut self, balance: f64) -> Result<(), BalanceError> {
            if self.fail_times.get() > 0 {
                self.fail_times.set(self.fail_times.get() - 1);
                return Err(BalanceError::Unavailable("offline".into()));
            }
            self.written.borrow_mut().push(balance);
            Ok(())
        }
    }

    #[test]
    fn test_memory_service_shared() {
        let service = MemoryBalanceService::new(500.0);
        let mut sync = BalanceSync::new(Box::new(service.clone()));
        assert_eq!(sync.fetch().unwrap(), 500.0);
        sync.mark(420.0);
        assert!(sync.flush());
        assert_eq!(service.balance(), 420.0);
        assert!(!sync.is_dirty());
    }

    #[test]
    fn test_failure_retried_with_latest_value() {
        let written = Rc::new(RefCell::new(Vec::new()));
        let mut sync = BalanceSync::new(Box::new(FlakyService {
            fail_times: Rc::new(Cell::new(2)),
            written: written.clone(),
        }));

        sync.mark(900.0);
        assert!(!sync.flush());
        sync.mark(1100.0);
        assert!(!sync.flush());
        assert_eq!(sync.failures(), 2);
        assert!(sync.is_dirty());

        sync.mark(1050.0);
        assert!(sync.flush());
        // Stale intermediate values are never written
        assert_eq!(*written.borrow(), vec![1050.0]);
        assert_eq!(sync.failures(), 0);
    }

    #[test]
    fn test_flush_without_pending_is_noop() {
        let mut sync = BalanceSync::new(Box::new(MemoryBalanceService::new(1.0)));
        assert!(sync.flush());
    }

    #[test]
    fn test_fetch_rejects_negative() {
        let mut sync = BalanceSync::new(Box::new(MemoryBalanceService::new(-3.0)));
        assert!(matches!(sync.fetch(), Err(BalanceError::Unavailable(_))));
    }

    #[test]
    fn test_file_service() {
        let path = std::env::temp_dir().join(format!("plinkoink-balance-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);

        let mut service = FileBalanceService::new(&path, 1000.0);
        assert_eq!(service.fetch_balance().unwrap(), 1000.0);
        service.persist_balance(1234.56).unwrap();
        assert_eq!(service.fetch_balance().unwrap(), 1234.56);

        fs::write(&path, "garbage").unwrap();
        assert!(matches!(service.fetch_balance(), Err(BalanceError::Parse(_))));
        let _ = fs::remove_file(&path);
    }
}
