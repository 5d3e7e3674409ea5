//! Core of the operations dashboard: typed rows for budgets, transactions and
//! logistics processes, repositories mirroring them from a [`RecordStore`],
//! and the figures derived from those mirrors.

pub use budgets::{Budget, BudgetPatch, BudgetState, NewBudget};
pub use currency::{Currency, fetch_currencies, symbol_for};
pub use dashboard::{Dashboard, StatsRepository, StatsSnapshot};
pub use error::{EngineError, StoreError};
pub use filters::{
    BudgetFilter, TransactionFilter, distinct_currencies, filter_processes, processes_in,
};
pub use logistics::{
    Details, LogisticsProcess, LogisticsProcessPatch, NewLogisticsProcess, ProcessStatus,
};
pub use money::Money;
pub use record::Record;
pub use refresh::{AUTO_REFRESH_INTERVAL, RefreshHandle, schedule_refresh};
pub use repository::{
    Affected, BudgetRepository, LogisticsRepository, Repository, Snapshot, TransactionRepository,
};
pub use settings::{
    DEFAULT_SETTINGS_PATH, DateFormat, DefaultCurrency, Language, SettingsPatch, Threshold,
    UserSettings,
};
pub use statistics::{
    BudgetSlice, DashboardStats, DayBucket, ProcessCounts, ProgressLevel, budget_alerts,
    budget_distribution, budget_executed, daily_series, progress_width, total_liquidity,
};
pub use store::{
    AuthProvider, Identity, Order, Query, RecordStore, Session, Table, memory::MemoryStore,
};
pub use transactions::{
    ANALYTICS_LIMIT, DEFAULT_TRANSACTION_LIMIT, EXPORT_LIMIT, NewTransaction, Transaction,
    TransactionKind, TransactionPatch,
};

mod budgets;
mod currency;
mod dashboard;
mod error;
mod filters;
mod logistics;
mod money;
mod record;
mod refresh;
mod repository;
pub mod settings;
pub mod statistics;
pub mod store;
mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
