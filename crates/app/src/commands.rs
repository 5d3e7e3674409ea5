//! Subcommands and their execution against any store backend.

use std::{fs::File, io, sync::Arc, time::Duration};

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use engine::{
    ANALYTICS_LIMIT, Affected, AuthProvider, BudgetFilter, BudgetPatch, BudgetRepository,
    BudgetState, Currency, DEFAULT_TRANSACTION_LIMIT, Dashboard, DateFormat, DefaultCurrency,
    Details, EXPORT_LIMIT, EngineError, Language, LogisticsProcessPatch, LogisticsRepository,
    Money, NewBudget, NewLogisticsProcess, NewTransaction, ProcessCounts, ProcessStatus,
    RecordStore, Repository, SettingsPatch, Threshold, TransactionFilter, TransactionKind,
    TransactionPatch, TransactionRepository, UserSettings, budget_alerts, budget_distribution, daily_series,
    distinct_currencies, fetch_currencies, filter_processes, schedule_refresh,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::{self, AppConfig},
    error::{AppError, Result},
    export::Report,
    render,
};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Headline figures: liquidity, budget execution, process counts.
    Stats,
    /// List budgets with their execution.
    Budgets(BudgetsArgs),
    /// List the most recent transactions.
    Transactions(TransactionsArgs),
    /// Show logistics processes as a board.
    Processes(ProcessesArgs),
    /// Daily income/expense and budget distribution.
    Chart,
    /// Write a CSV report of transactions, budgets and processes.
    Export(ExportArgs),
    /// Print the dashboard and refresh it periodically until interrupted.
    Watch(WatchArgs),
    AddBudget(AddBudgetArgs),
    AddTransaction(AddTransactionArgs),
    AddProcess(AddProcessArgs),
    /// Change fields of a transaction.
    EditTransaction(EditTransactionArgs),
    /// Change fields of a budget.
    EditBudget(EditBudgetArgs),
    /// Change fields, assignee or details of a process.
    EditProcess(EditProcessArgs),
    /// Move a process to another board column.
    MoveProcess(MoveProcessArgs),
    /// Record the spent amount of a budget.
    SetSpent(SetSpentArgs),
    Delete(DeleteArgs),
    /// Show or change display settings.
    Settings(SettingsArgs),
    /// Create an account (password from GESTIO_PASSWORD).
    SignUp(SignUpArgs),
}

fn parse_kind(raw: &str) -> std::result::Result<TransactionKind, EngineError> {
    TransactionKind::try_from(raw)
}

fn parse_status(raw: &str) -> std::result::Result<ProcessStatus, EngineError> {
    ProcessStatus::try_from(raw)
}

fn parse_budget_state(raw: &str) -> std::result::Result<BudgetState, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(BudgetState::Active),
        "completed" => Ok(BudgetState::Completed),
        "exceeded" => Ok(BudgetState::Exceeded),
        other => Err(format!("invalid budget state: {other}")),
    }
}

fn parse_detail(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw}"))
}

#[derive(Debug, Args)]
pub struct BudgetsArgs {
    /// active, completed or exceeded.
    #[arg(long, value_parser = parse_budget_state)]
    state: Option<BudgetState>,
    #[arg(long)]
    currency: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransactionsArgs {
    /// Case-insensitive text searched in descriptions.
    #[arg(long)]
    search: Option<String>,
    #[arg(long, value_parser = parse_kind)]
    kind: Option<TransactionKind>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long, default_value_t = DEFAULT_TRANSACTION_LIMIT)]
    limit: usize,
}

#[derive(Debug, Args)]
pub struct ProcessesArgs {
    #[arg(long, default_value = "")]
    search: String,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output file; stdout when omitted.
    #[arg(long, short)]
    output: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between refreshes.
    #[arg(long, default_value_t = engine::AUTO_REFRESH_INTERVAL.as_secs())]
    interval: u64,
}

#[derive(Debug, Args)]
pub struct AddBudgetArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    total: Money,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct AddTransactionArgs {
    #[arg(long)]
    amount: Money,
    #[arg(long, value_parser = parse_kind)]
    kind: TransactionKind,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    budget: Option<Uuid>,
}

#[derive(Debug, Args)]
pub struct AddProcessArgs {
    #[arg(long)]
    name: String,
    #[arg(long, value_parser = parse_status, default_value = "pending")]
    status: ProcessStatus,
    #[arg(long)]
    assign: Option<Uuid>,
    /// Repeatable `key=value` attribute.
    #[arg(long = "detail", value_parser = parse_detail)]
    details: Vec<(String, String)>,
}

/// `Some(None)` clears a nullable column, `Some(Some(_))` sets it.
fn nullable<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear { Some(None) } else { value.map(Some) }
}

#[derive(Debug, Args)]
pub struct EditTransactionArgs {
    id: Uuid,
    #[arg(long)]
    amount: Option<Money>,
    #[arg(long, value_parser = parse_kind)]
    kind: Option<TransactionKind>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long, conflicts_with = "clear_description")]
    description: Option<String>,
    #[arg(long)]
    clear_description: bool,
    #[arg(long, conflicts_with = "clear_budget")]
    budget: Option<Uuid>,
    #[arg(long)]
    clear_budget: bool,
}

impl EditTransactionArgs {
    fn patch(self) -> TransactionPatch {
        TransactionPatch {
            amount: self.amount,
            currency_code: self.currency,
            kind: self.kind,
            description: nullable(self.description, self.clear_description),
            budget_id: nullable(self.budget, self.clear_budget),
        }
    }
}

#[derive(Debug, Args)]
pub struct EditBudgetArgs {
    id: Uuid,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    total: Option<Money>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long, conflicts_with = "clear_start")]
    start: Option<NaiveDate>,
    #[arg(long)]
    clear_start: bool,
    #[arg(long, conflicts_with = "clear_end")]
    end: Option<NaiveDate>,
    #[arg(long)]
    clear_end: bool,
}

impl EditBudgetArgs {
    fn patch(self) -> BudgetPatch {
        BudgetPatch {
            name: self.name,
            total_amount: self.total,
            spent_amount: None,
            currency_code: self.currency,
            start_date: nullable(self.start, self.clear_start),
            end_date: nullable(self.end, self.clear_end),
        }
    }
}

#[derive(Debug, Args)]
pub struct EditProcessArgs {
    id: Uuid,
    #[arg(long)]
    name: Option<String>,
    #[arg(long, value_parser = parse_status)]
    status: Option<ProcessStatus>,
    #[arg(long, conflicts_with = "unassign")]
    assign: Option<Uuid>,
    #[arg(long)]
    unassign: bool,
    /// Repeatable `key=value` attribute to add or replace.
    #[arg(long = "detail", value_parser = parse_detail)]
    details: Vec<(String, String)>,
    /// Repeatable attribute key to remove.
    #[arg(long = "drop-detail")]
    drop_details: Vec<String>,
}

impl EditProcessArgs {
    fn touches_details(&self) -> bool {
        !self.details.is_empty() || !self.drop_details.is_empty()
    }

    /// Details are stored as one column, so edits merge into `current`.
    fn patch(self, current: Option<&Details>) -> Result<LogisticsProcessPatch> {
        let details = match current {
            Some(current) if self.touches_details() => {
                let mut merged = current.clone();
                for key in &self.drop_details {
                    merged.remove(key);
                }
                for (key, value) in self.details {
                    merged.insert(&key, value)?;
                }
                Some(merged)
            }
            _ => None,
        };
        Ok(LogisticsProcessPatch {
            name: self.name,
            status: self.status,
            assigned_to: nullable(self.assign, self.unassign),
            details,
        })
    }
}

#[derive(Debug, Args)]
pub struct MoveProcessArgs {
    id: Uuid,
    #[arg(value_parser = parse_status)]
    status: ProcessStatus,
}

#[derive(Debug, Args)]
pub struct SetSpentArgs {
    id: Uuid,
    amount: Money,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Entity {
    Budget,
    Transaction,
    Process,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(value_enum)]
    entity: Entity,
    id: Uuid,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[arg(long)]
    language: Option<Language>,
    #[arg(long)]
    currency: Option<DefaultCurrency>,
    #[arg(long)]
    date_format: Option<DateFormat>,
    #[arg(long)]
    alerts: Option<bool>,
    #[arg(long)]
    threshold: Option<Threshold>,
    /// Restore defaults and remove the settings file.
    #[arg(long, conflicts_with_all = ["language", "currency", "date_format", "alerts", "threshold"])]
    reset: bool,
}

#[derive(Debug, Args)]
pub struct SignUpArgs {
    /// Defaults to the configured email.
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    full_name: String,
}

struct Context {
    settings: UserSettings,
    currencies: Vec<Currency>,
    tz: chrono_tz::Tz,
    settings_path: String,
}

impl Context {
    async fn load<S: RecordStore>(store: &S, config: &AppConfig) -> Result<Self> {
        let settings = UserSettings::load(&config.settings_path)?;
        let currencies = fetch_currencies(store).await.unwrap_or_else(|err| {
            warn!("currencies unavailable, showing codes: {err}");
            Vec::new()
        });
        Ok(Self {
            settings,
            currencies,
            tz: config.tz()?,
            settings_path: config.settings_path.clone(),
        })
    }

    fn currency_or_default(&self, code: Option<String>) -> String {
        code.unwrap_or_else(|| self.settings.default_currency.code().to_string())
    }
}

/// Re-lists a repository; a failure is reported and leaves the mirror empty
/// or stale, as the dashboard would show it.
async fn load_list<S: RecordStore, T: engine::Record>(repo: &Repository<S, T>) {
    if let Err(err) = repo.list().await {
        eprintln!("could not load {}s: {err}", T::LABEL);
    }
}

async fn warn_if_anonymous<S: RecordStore>(store: &S) {
    if store.current_caller().await.is_none() {
        eprintln!(
            "not signed in: set email and {} to see your data",
            config::PASSWORD_ENV
        );
    }
}

async fn print_dashboard<S: RecordStore>(dashboard: &Dashboard<S>, ctx: &Context) {
    let stats = dashboard.stats.stats().await;
    let processes = dashboard.processes.items().await;
    let budgets = dashboard.budgets.items().await;
    let counts = ProcessCounts::from_processes(&processes);
    let alerts = budget_alerts(&budgets, &ctx.settings);
    print!(
        "{}",
        render::stats(&stats, &counts, &alerts, &ctx.settings, &ctx.currencies)
    );
}

fn applied<T>(outcome: Affected<T>, what: String) -> Result<T> {
    outcome.into_option().ok_or(AppError::NotApplied(what))
}

pub async fn run<S>(store: Arc<S>, config: &AppConfig, command: Command) -> Result<()>
where
    S: RecordStore + AuthProvider,
{
    let ctx = Context::load(store.as_ref(), config).await?;

    match command {
        Command::Stats => {
            warn_if_anonymous(store.as_ref()).await;
            let dashboard = Dashboard::new(store);
            dashboard.refresh_all().await;
            print_dashboard(&dashboard, &ctx).await;
        }
        Command::Budgets(args) => {
            let repo = BudgetRepository::new(store);
            load_list(&repo).await;
            let items = repo.items().await;
            let filter = BudgetFilter {
                state: args.state,
                currency: args.currency,
            };
            print!(
                "{}",
                render::budgets(&filter.apply(&items), &ctx.settings, &ctx.currencies)
            );
        }
        Command::Transactions(args) => {
            let repo = TransactionRepository::new(store).with_limit(args.limit);
            load_list(&repo).await;
            let items = repo.items().await;
            let filter = TransactionFilter {
                search: args.search,
                kind: args.kind,
                currency: args.currency,
            };
            print!(
                "{}",
                render::transactions(
                    &filter.apply(&items),
                    &ctx.settings,
                    &ctx.currencies,
                    ctx.tz,
                )
            );
            let codes = distinct_currencies(items.iter().map(|tx| tx.currency_code.as_str()));
            if codes.len() > 1 {
                println!("currencies: {}", codes.join(", "));
            }
        }
        Command::Processes(args) => {
            let repo = LogisticsRepository::new(store);
            load_list(&repo).await;
            let items = repo.items().await;
            let matching: Vec<_> = filter_processes(&items, &args.search)
                .into_iter()
                .cloned()
                .collect();
            print!("{}", render::board(&matching));
        }
        Command::Chart => {
            let transactions =
                TransactionRepository::new(Arc::clone(&store)).with_limit(ANALYTICS_LIMIT);
            let budgets = BudgetRepository::new(store);
            tokio::join!(load_list(&transactions), load_list(&budgets));
            let series = daily_series(&transactions.items().await, ctx.tz);
            let slices = budget_distribution(&budgets.items().await);
            print!("{}", render::chart(&series, &slices, &ctx.settings));
        }
        Command::Export(args) => {
            let transactions =
                TransactionRepository::new(Arc::clone(&store)).with_limit(EXPORT_LIMIT);
            let budgets = BudgetRepository::new(Arc::clone(&store));
            let processes = LogisticsRepository::new(store);
            tokio::join!(
                load_list(&transactions),
                load_list(&budgets),
                load_list(&processes)
            );
            let (transactions, budgets, processes) = (
                transactions.items().await,
                budgets.items().await,
                processes.items().await,
            );
            let report = Report {
                transactions: &transactions,
                budgets: &budgets,
                processes: &processes,
                tz: ctx.tz,
            };
            match args.output {
                Some(path) => {
                    report.write_csv(File::create(&path)?, &ctx.settings)?;
                    info!(%path, "report written");
                }
                None => report.write_csv(io::stdout().lock(), &ctx.settings)?,
            }
        }
        Command::Watch(args) => {
            warn_if_anonymous(store.as_ref()).await;
            let ctx = Arc::new(ctx);
            let dashboard = Dashboard::new(store);
            dashboard.sync_caller().await;
            print_dashboard(&dashboard, &ctx).await;

            let job_dashboard = dashboard.clone();
            let job_ctx = Arc::clone(&ctx);
            let handle = schedule_refresh(Duration::from_secs(args.interval), move || {
                let dashboard = job_dashboard.clone();
                let ctx = Arc::clone(&job_ctx);
                async move {
                    dashboard.refresh_all().await;
                    println!();
                    print_dashboard(&dashboard, &ctx).await;
                }
            });

            tokio::signal::ctrl_c().await?;
            handle.cancel().await;
        }
        Command::AddBudget(args) => {
            let repo = BudgetRepository::new(store);
            let budget = repo
                .create(NewBudget {
                    name: args.name,
                    total_amount: args.total,
                    currency_code: ctx.currency_or_default(args.currency),
                    start_date: args.start,
                    end_date: args.end,
                })
                .await?;
            println!("{}", budget.id);
        }
        Command::AddTransaction(args) => {
            let repo = TransactionRepository::new(store);
            let tx = repo
                .create(NewTransaction {
                    amount: args.amount,
                    currency_code: ctx.currency_or_default(args.currency),
                    kind: args.kind,
                    description: args.description,
                    budget_id: args.budget,
                })
                .await?;
            println!("{}", tx.id);
        }
        Command::AddProcess(args) => {
            let repo = LogisticsRepository::new(store);
            let process = repo
                .create(NewLogisticsProcess {
                    name: args.name,
                    status: args.status,
                    assigned_to: args.assign,
                    details: Details::from_pairs(args.details)?,
                })
                .await?;
            println!("{}", process.id);
        }
        Command::EditTransaction(args) => {
            let repo = TransactionRepository::new(store);
            let id = args.id;
            let outcome = repo.update(id, args.patch()).await?;
            let tx = applied(outcome, format!("transaction {id}"))?;
            println!("{} {} {}", tx.kind.as_str(), tx.amount, tx.currency_code);
        }
        Command::EditBudget(args) => {
            let repo = BudgetRepository::new(store);
            let id = args.id;
            let outcome = repo.update(id, args.patch()).await?;
            let budget = applied(outcome, format!("budget {id}"))?;
            println!(
                "{}: {} / {} {}",
                budget.name, budget.spent_amount, budget.total_amount, budget.currency_code
            );
        }
        Command::EditProcess(args) => {
            let repo = LogisticsRepository::new(store);
            let id = args.id;
            let current = if args.touches_details() {
                repo.list().await?;
                let found = repo.items().await.into_iter().find(|process| process.id == id);
                let Some(process) = found else {
                    return Err(AppError::NotApplied(format!("process {id}")));
                };
                Some(process.details)
            } else {
                None
            };
            let outcome = repo.update(id, args.patch(current.as_ref())?).await?;
            let process = applied(outcome, format!("process {id}"))?;
            println!("{} [{}]", process.name, process.status.as_str());
        }
        Command::MoveProcess(args) => {
            let repo = LogisticsRepository::new(store);
            let outcome = repo
                .update(args.id, LogisticsProcessPatch::move_to(args.status))
                .await?;
            let process = applied(outcome, format!("process {}", args.id))?;
            println!("{} -> {}", process.name, process.status.as_str());
        }
        Command::SetSpent(args) => {
            let repo = BudgetRepository::new(store);
            let patch = BudgetPatch {
                spent_amount: Some(args.amount),
                ..BudgetPatch::default()
            };
            let outcome = repo.update(args.id, patch).await?;
            let budget = applied(outcome, format!("budget {}", args.id))?;
            println!(
                "{}: {:.1}% executed ({})",
                budget.name,
                budget.executed_percentage(),
                budget.state().as_str()
            );
        }
        Command::Delete(args) => {
            let outcome = match args.entity {
                Entity::Budget => BudgetRepository::new(store).delete(args.id).await?,
                Entity::Transaction => TransactionRepository::new(store).delete(args.id).await?,
                Entity::Process => LogisticsRepository::new(store).delete(args.id).await?,
            };
            applied(outcome, format!("{:?} {}", args.entity, args.id).to_lowercase())?;
            println!("deleted {}", args.id);
        }
        Command::Settings(args) => {
            let settings = if args.reset {
                UserSettings::reset(&ctx.settings_path)?
            } else {
                let patch = SettingsPatch {
                    language: args.language,
                    default_currency: args.currency,
                    date_format: args.date_format,
                    budget_alerts: args.alerts,
                    budget_threshold: args.threshold,
                };
                let mut settings = ctx.settings;
                if patch != SettingsPatch::default() {
                    settings.apply(patch);
                    settings.save(&ctx.settings_path)?;
                }
                settings
            };
            println!("{settings}");
        }
        Command::SignUp(args) => {
            let email = args.email.unwrap_or_else(|| config.email.clone());
            if email.is_empty() {
                return Err(AppError::Usage("an email is required".to_string()));
            }
            let password = config::password().ok_or_else(|| {
                AppError::Usage(format!("set {} to choose a password", config::PASSWORD_ENV))
            })?;
            match store.sign_up(&email, &password, &args.full_name).await? {
                Some(session) => println!("signed up as {}", session.user.id),
                None => println!("check {email} to confirm the account"),
            }
        }
    }

    Ok(())
}
