// storefront/src/services/ledger.rs

//! Record of gateway transactions this service has reconciled.
//!
//! Entries are created only from authenticated webhook deliveries. The buyer
//! redirect reads them and may record that it cleared the cart, but never
//! creates one. Each side effect is guarded by a flag that only one caller
//! can flip.

use crate::errors::Result as AppResult;
use crate::models::{TransactionId, TransactionStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::PgPool;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
  pub transaction_id: TransactionId,
  pub status: TransactionStatus,
  pub cart_cleared: bool,
  pub notified: bool,
}

impl LedgerEntry {
  fn new(transaction_id: &TransactionId, status: TransactionStatus) -> Self {
    Self {
      transaction_id: transaction_id.clone(),
      status,
      cart_cleared: false,
      notified: false,
    }
  }
}

#[async_trait]
pub trait TransactionLedger: Send + Sync {
  async fn get(&self, transaction_id: &TransactionId) -> AppResult<Option<LedgerEntry>>;

  /// Records a reported status. A `PENDING` entry may move to a terminal
  /// status; once terminal, later reports are ignored. Returns the entry as stored.
  async fn record_status(&self, transaction_id: &TransactionId, status: TransactionStatus) -> AppResult<LedgerEntry>;

  /// Flags an existing entry. `true` for exactly one caller per transaction;
  /// `false` when there is no entry yet.
  async fn mark_cart_cleared(&self, transaction_id: &TransactionId) -> AppResult<bool>;

  /// Flags an existing entry. `true` for exactly one caller per transaction;
  /// `false` when there is no entry yet.
  async fn mark_notified(&self, transaction_id: &TransactionId) -> AppResult<bool>;
}

// --- In-memory ---

pub const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Default)]
struct MemoryEntries {
  by_id: HashMap<TransactionId, LedgerEntry>,
  /// Insertion order, oldest first.
  order: VecDeque<TransactionId>,
}

/// Process-local ledger holding at most `capacity` transactions. The oldest
/// entry is forgotten when a new one would exceed it.
pub struct MemoryLedger {
  capacity: usize,
  entries: Mutex<MemoryEntries>,
}

impl Default for MemoryLedger {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
  }
}

impl MemoryLedger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      entries: Mutex::new(MemoryEntries::default()),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.lock().by_id.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn flip(&self, transaction_id: &TransactionId, flag: impl FnOnce(&mut LedgerEntry) -> &mut bool) -> bool {
    let mut entries = self.entries.lock();
    match entries.by_id.get_mut(transaction_id) {
      Some(entry) => !std::mem::replace(flag(entry), true),
      None => false,
    }
  }
}

#[async_trait]
impl TransactionLedger for MemoryLedger {
  async fn get(&self, transaction_id: &TransactionId) -> AppResult<Option<LedgerEntry>> {
    Ok(self.entries.lock().by_id.get(transaction_id).cloned())
  }

  async fn record_status(&self, transaction_id: &TransactionId, status: TransactionStatus) -> AppResult<LedgerEntry> {
    let mut guard = self.entries.lock();
    let entries = &mut *guard;
    if let Some(entry) = entries.by_id.get_mut(transaction_id) {
      if !entry.status.is_terminal() {
        entry.status = status;
      }
      return Ok(entry.clone());
    }

    while entries.by_id.len() >= self.capacity {
      let Some(oldest) = entries.order.pop_front() else { break };
      entries.by_id.remove(&oldest);
      debug!(transaction_id = %oldest, "Ledger at capacity; forgot oldest entry.");
    }
    let entry = LedgerEntry::new(transaction_id, status);
    entries.by_id.insert(transaction_id.clone(), entry.clone());
    entries.order.push_back(transaction_id.clone());
    Ok(entry)
  }

  async fn mark_cart_cleared(&self, transaction_id: &TransactionId) -> AppResult<bool> {
    Ok(self.flip(transaction_id, |e| &mut e.cart_cleared))
  }

  async fn mark_notified(&self, transaction_id: &TransactionId) -> AppResult<bool> {
    Ok(self.flip(transaction_id, |e| &mut e.notified))
  }
}

// --- Postgres ---

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS processed_transactions (
  transaction_id TEXT PRIMARY KEY,
  status TEXT NOT NULL,
  cart_cleared BOOLEAN NOT NULL DEFAULT FALSE,
  notified BOOLEAN NOT NULL DEFAULT FALSE,
  created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
  updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"#;

#[derive(sqlx::FromRow)]
struct LedgerRow {
  transaction_id: String,
  status: String,
  cart_cleared: bool,
  notified: bool,
}

impl LedgerRow {
  fn into_entry(self) -> Option<LedgerEntry> {
    Some(LedgerEntry {
      transaction_id: TransactionId::parse(self.transaction_id)?,
      status: TransactionStatus::parse(&self.status),
      cart_cleared: self.cart_cleared,
      notified: self.notified,
    })
  }
}

pub struct PgLedger {
  pool: PgPool,
}

impl PgLedger {
  pub async fn connect(database_url: &str) -> AppResult<Self> {
    let pool = PgPool::connect(database_url).await?;
    let ledger = Self { pool };
    ledger.ensure_schema().await?;
    info!("Transaction ledger connected to Postgres.");
    Ok(ledger)
  }

  pub fn from_pool(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn ensure_schema(&self) -> AppResult<()> {
    sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
    Ok(())
  }

  async fn flip(&self, transaction_id: &TransactionId, column: &'static str) -> AppResult<bool> {
    // `column` is one of two fixed names, never caller input.
    let sql = format!(
      "UPDATE processed_transactions SET {col} = TRUE, updated_at = now() \
       WHERE transaction_id = $1 AND {col} = FALSE",
      col = column
    );
    let result = sqlx::query(&sql)
      .bind(transaction_id.as_str())
      .execute(&self.pool)
      .await?;
    let flipped = result.rows_affected() == 1;
    debug!(transaction_id = %transaction_id, column, flipped, "Ledger flag compare-and-set.");
    Ok(flipped)
  }
}

#[async_trait]
impl TransactionLedger for PgLedger {
  async fn get(&self, transaction_id: &TransactionId) -> AppResult<Option<LedgerEntry>> {
    let row = sqlx::query_as::<_, LedgerRow>(
      "SELECT transaction_id, status, cart_cleared, notified FROM processed_transactions WHERE transaction_id = $1",
    )
    .bind(transaction_id.as_str())
    .fetch_optional(&self.pool)
    .await?;
    Ok(row.and_then(LedgerRow::into_entry))
  }

  #[instrument(skip(self), fields(transaction_id = %transaction_id, status = %status))]
  async fn record_status(&self, transaction_id: &TransactionId, status: TransactionStatus) -> AppResult<LedgerEntry> {
    let row = sqlx::query_as::<_, LedgerRow>(
      "INSERT INTO processed_transactions (transaction_id, status) VALUES ($1, $2) \
       ON CONFLICT (transaction_id) DO UPDATE SET status = EXCLUDED.status, updated_at = now() \
       WHERE processed_transactions.status = 'PENDING' \
       RETURNING transaction_id, status, cart_cleared, notified",
    )
    .bind(transaction_id.as_str())
    .bind(status.as_str())
    .fetch_optional(&self.pool)
    .await?;

    // No row back means the stored status was already terminal.
    let entry = match row.and_then(LedgerRow::into_entry) {
      Some(entry) => entry,
      None => self
        .get(transaction_id)
        .await?
        .unwrap_or_else(|| LedgerEntry::new(transaction_id, status)),
    };
    Ok(entry)
  }

  async fn mark_cart_cleared(&self, transaction_id: &TransactionId) -> AppResult<bool> {
    self.flip(transaction_id, "cart_cleared").await
  }

  async fn mark_notified(&self, transaction_id: &TransactionId) -> AppResult<bool> {
    self.flip(transaction_id, "notified").await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tid(s: &str) -> TransactionId {
    TransactionId::parse(s).unwrap()
  }

  #[actix_rt::test]
  async fn first_terminal_status_wins() {
    let ledger = MemoryLedger::new();
    let id = tid("t-1");
    assert_eq!(
      ledger.record_status(&id, TransactionStatus::Pending).await.unwrap().status,
      TransactionStatus::Pending
    );
    assert_eq!(
      ledger.record_status(&id, TransactionStatus::Successful).await.unwrap().status,
      TransactionStatus::Successful
    );
    assert_eq!(
      ledger.record_status(&id, TransactionStatus::Failed).await.unwrap().status,
      TransactionStatus::Successful
    );
  }

  #[actix_rt::test]
  async fn flags_flip_once() {
    let ledger = MemoryLedger::new();
    let id = tid("t-2");
    ledger.record_status(&id, TransactionStatus::Pending).await.unwrap();
    assert!(ledger.mark_cart_cleared(&id).await.unwrap());
    assert!(!ledger.mark_cart_cleared(&id).await.unwrap());
    assert!(ledger.mark_notified(&id).await.unwrap());
    assert!(!ledger.mark_notified(&id).await.unwrap());

    let entry = ledger.get(&id).await.unwrap().unwrap();
    assert!(entry.cart_cleared && entry.notified);
    assert_eq!(entry.status, TransactionStatus::Pending);
  }

  #[actix_rt::test]
  async fn flags_never_create_entries() {
    let ledger = MemoryLedger::new();
    let id = tid("junk-1");
    assert!(!ledger.mark_cart_cleared(&id).await.unwrap());
    assert!(!ledger.mark_notified(&id).await.unwrap());
    assert!(ledger.get(&id).await.unwrap().is_none());
    assert!(ledger.is_empty());
  }

  #[actix_rt::test]
  async fn oldest_entries_are_forgotten_at_capacity() {
    let ledger = MemoryLedger::with_capacity(2);
    for id in ["a", "b", "c"] {
      ledger.record_status(&tid(id), TransactionStatus::Successful).await.unwrap();
    }
    assert_eq!(ledger.len(), 2);
    assert!(ledger.get(&tid("a")).await.unwrap().is_none());
    assert!(ledger.get(&tid("c")).await.unwrap().is_some());

    // Updating a known entry does not evict anything.
    ledger.record_status(&tid("b"), TransactionStatus::Failed).await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.get(&tid("b")).await.unwrap().is_some());
  }
}
