//! forecast-core: ledger types, month-by-month balance projection, and sync scheduling

pub mod candidates;
pub mod error;
pub mod ledger;
pub mod money;
pub mod month;
pub mod projector;
pub mod store;
pub mod sync;
pub mod time;
pub mod transaction;

pub use candidates::{history_candidates, suggest_from_history, DEFAULT_CANDIDATES};
pub use error::{LedgerError, MonthParseError, StoreError};
pub use ledger::{default_entry_date, ExpenseSlice, Ledger};
pub use money::format_amount;
pub use month::YearMonth;
pub use projector::{project, FinancialSummary, MonthFlow, MonthProjection, Projector};
pub use store::{DocumentStore, IdentityProvider, MemoryStore, SnapshotSender, Subscription, UserId};
pub use sync::{SyncAction, SyncEvent, SyncMachine, SyncPolicy, SyncState, SyncStatus};
pub use time::{local_date, local_month};
pub use transaction::{LedgerData, MonthOverrides, NewTransaction, Transaction, TransactionType};
