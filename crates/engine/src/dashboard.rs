//! Dashboard-level state: headline statistics and the bundle of repositories
//! a screen refreshes together.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    Budget, BudgetRepository, DashboardStats, LogisticsProcess, LogisticsRepository, Query,
    Record, RecordStore, ResultEngine, Transaction, TransactionRepository, record::decode,
};

#[derive(Clone, Debug, PartialEq)]
pub struct StatsSnapshot {
    pub stats: DashboardStats,
    pub loading: bool,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            stats: DashboardStats::default(),
            loading: true,
        }
    }
}

/// Headline figures computed from every transaction, budget and process the
/// caller can see. Failures keep the previous figures.
pub struct StatsRepository<S> {
    store: Arc<S>,
    state: Arc<RwLock<StatsSnapshot>>,
    seen_caller: Arc<RwLock<Option<Option<Uuid>>>>,
}

impl<S> Clone for StatsRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            seen_caller: Arc::clone(&self.seen_caller),
        }
    }
}

impl<S: RecordStore> StatsRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state: Arc::new(RwLock::new(StatsSnapshot::default())),
            seen_caller: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.state.read().await.clone()
    }

    pub async fn stats(&self) -> DashboardStats {
        self.state.read().await.stats
    }

    /// Recomputes the figures. Errors are logged, never returned.
    pub async fn refresh(&self) {
        if self.store.current_caller().await.is_none() {
            debug!("no authenticated caller, skipping stats");
            self.state.write().await.loading = false;
            return;
        }

        self.state.write().await.loading = true;
        let result = self.compute().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(stats) => state.stats = stats,
            Err(err) => error!("error fetching stats: {err}"),
        }
    }

    pub async fn sync_caller(&self) -> bool {
        let caller = self.store.current_caller().await.map(|identity| identity.id);
        {
            let mut seen = self.seen_caller.write().await;
            if *seen == Some(caller) {
                return false;
            }
            *seen = Some(caller);
        }
        self.refresh().await;
        true
    }

    async fn compute(&self) -> ResultEngine<DashboardStats> {
        let (transactions, budgets, processes) = tokio::try_join!(
            fetch_all::<S, Transaction>(&self.store),
            fetch_all::<S, Budget>(&self.store),
            fetch_all::<S, LogisticsProcess>(&self.store),
        )?;
        Ok(DashboardStats::compute(&transactions, &budgets, &processes))
    }
}

async fn fetch_all<S: RecordStore, T: Record>(store: &S) -> ResultEngine<Vec<T>> {
    let rows = store.select(T::TABLE, &Query::new()).await?;
    rows.into_iter().map(decode::<T>).collect()
}

/// The four repositories a dashboard screen owns, sharing one store.
pub struct Dashboard<S> {
    pub stats: StatsRepository<S>,
    pub budgets: BudgetRepository<S>,
    pub transactions: TransactionRepository<S>,
    pub processes: LogisticsRepository<S>,
}

impl<S> Clone for Dashboard<S> {
    fn clone(&self) -> Self {
        Self {
            stats: self.stats.clone(),
            budgets: self.budgets.clone(),
            transactions: self.transactions.clone(),
            processes: self.processes.clone(),
        }
    }
}

impl<S: RecordStore> Dashboard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            stats: StatsRepository::new(Arc::clone(&store)),
            budgets: BudgetRepository::new(Arc::clone(&store)),
            transactions: TransactionRepository::new(Arc::clone(&store)),
            processes: LogisticsRepository::new(store),
        }
    }

    /// Refreshes everything concurrently. Each repository records its own
    /// failure in its mirror; nothing is returned.
    pub async fn refresh_all(&self) {
        let (_, budgets, transactions, processes) = tokio::join!(
            self.stats.refresh(),
            self.budgets.list(),
            self.transactions.list(),
            self.processes.list(),
        );
        for err in [budgets.err(), transactions.err(), processes.err()]
            .into_iter()
            .flatten()
        {
            debug!("dashboard refresh incomplete: {err}");
        }
    }

    /// Re-lists every repository whose view of the caller is stale.
    pub async fn sync_caller(&self) {
        let (_, budgets, transactions, processes) = tokio::join!(
            self.stats.sync_caller(),
            self.budgets.sync_caller(),
            self.transactions.sync_caller(),
            self.processes.sync_caller(),
        );
        for err in [budgets.err(), transactions.err(), processes.err()]
            .into_iter()
            .flatten()
        {
            debug!("dashboard caller sync incomplete: {err}");
        }
    }
}
