use crate::application::block_store::{BlockDraft, BlockPatch, BlockStore, ConflictHandler};
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::reminder::{
    load_reminder_policy, spawn_reminder_scheduler, ReminderEngine, ReminderSchedulerHandle,
    UpcomingReminder,
};
use crate::domain::color::{resolve_block_color, ResolvedColor};
use crate::domain::models::{RecurringBlock, TimeBlock};
use crate::domain::schedule::OccupancyMap;
use crate::domain::slots::TimeFormat;
use crate::infrastructure::block_repository::{BlockRepository, SqliteBlockRepository};
use crate::infrastructure::config::{
    load_palette, read_time_format, read_timezone, save_time_format,
};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::notification::{NotificationClient, NotificationPermission};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct PlannerContext<R, N>
where
    R: BlockRepository + 'static,
    N: NotificationClient + 'static,
{
    config_dir: PathBuf,
    logs_dir: PathBuf,
    database_path: PathBuf,
    timezone: Tz,
    notifier: Arc<N>,
    store: BlockStore<R>,
    engine: Arc<ReminderEngine<R, N>>,
    scheduler: Mutex<Option<ReminderSchedulerHandle>>,
    log_guard: Mutex<()>,
}

impl<N> PlannerContext<SqliteBlockRepository, N>
where
    N: NotificationClient + 'static,
{
    pub fn new(workspace_root: PathBuf, notifier: Arc<N>) -> Result<Self, PlannerError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let repository = Arc::new(SqliteBlockRepository::new(&bootstrap.database_path));
        Self::assemble(workspace_root, bootstrap.database_path, repository, notifier)
    }
}

impl<R, N> PlannerContext<R, N>
where
    R: BlockRepository + 'static,
    N: NotificationClient + 'static,
{
    pub fn with_repository(
        workspace_root: PathBuf,
        repository: Arc<R>,
        notifier: Arc<N>,
    ) -> Result<Self, PlannerError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Self::assemble(workspace_root, bootstrap.database_path, repository, notifier)
    }

    fn assemble(
        workspace_root: PathBuf,
        database_path: PathBuf,
        repository: Arc<R>,
        notifier: Arc<N>,
    ) -> Result<Self, PlannerError> {
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        let timezone = resolve_timezone(&config_dir)?;
        let time_format = read_time_format(&config_dir)?;
        let policy = load_reminder_policy(&config_dir);

        let store = BlockStore::new(Arc::clone(&repository));
        let engine = Arc::new(
            ReminderEngine::new(repository, Arc::clone(&notifier))
                .with_policy(policy)
                .with_timezone(timezone)
                .with_time_format(time_format),
        );

        Ok(Self {
            config_dir,
            logs_dir,
            database_path,
            timezone,
            notifier,
            store,
            engine,
            scheduler: Mutex::new(None),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn add_block(
        &self,
        date: NaiveDate,
        draft: BlockDraft,
        on_conflict: Option<&ConflictHandler<'_>>,
    ) -> Result<TimeBlock, PlannerError> {
        let block = self
            .store
            .add_block(date, draft, on_conflict)
            .map_err(|error| self.operation_error("add_block", error))?;
        self.log_info(
            "add_block",
            &format!("added block_id={} date={date}", block.id),
        );
        Ok(block)
    }

    pub fn update_block(
        &self,
        date: NaiveDate,
        block_id: &str,
        patch: BlockPatch,
        on_conflict: Option<&ConflictHandler<'_>>,
    ) -> Result<TimeBlock, PlannerError> {
        let block = self
            .store
            .update_block(date, block_id, patch, on_conflict)
            .map_err(|error| self.operation_error("update_block", error))?;
        self.log_info(
            "update_block",
            &format!("updated block_id={} date={date}", block.id),
        );
        Ok(block)
    }

    pub fn delete_block(&self, date: NaiveDate, block_id: &str) -> Result<bool, PlannerError> {
        let removed = self
            .store
            .delete_block(date, block_id)
            .map_err(|error| self.operation_error("delete_block", error))?;
        if removed {
            self.log_info(
                "delete_block",
                &format!("deleted block_id={block_id} date={date}"),
            );
        }
        Ok(removed)
    }

    pub fn list_blocks(&self, date: NaiveDate) -> Result<Vec<TimeBlock>, PlannerError> {
        self.store.list_blocks(date)
    }

    pub fn list_recurring_templates(&self) -> Result<Vec<RecurringBlock>, PlannerError> {
        self.store.list_recurring_templates()
    }

    pub fn schedule_for_date(&self, date: NaiveDate) -> Result<OccupancyMap, PlannerError> {
        self.store.schedule_for_date(date)
    }

    pub fn find_next_available_slot(
        &self,
        date: NaiveDate,
        duration_slots: u32,
        start_slot: u32,
    ) -> Result<Option<u32>, PlannerError> {
        self.store
            .find_next_available_slot(date, duration_slots, start_slot)
    }

    pub fn resolve_color(&self, value: &str) -> Result<ResolvedColor, PlannerError> {
        let palette = load_palette(&self.config_dir)?;
        Ok(resolve_block_color(value, &palette))
    }

    pub fn set_time_format(&self, format: TimeFormat) -> Result<(), PlannerError> {
        save_time_format(&self.config_dir, format)
            .map_err(|error| self.operation_error("set_time_format", error))?;
        self.log_info("set_time_format", &format!("format={format:?}"));
        Ok(())
    }

    pub fn start_reminders(&self) -> Result<(), PlannerError> {
        let mut scheduler = self.lock_scheduler()?;
        if scheduler.is_some() {
            return Ok(());
        }
        *scheduler = Some(spawn_reminder_scheduler(Arc::clone(&self.engine)));
        drop(scheduler);
        self.log_info("start_reminders", "reminder scheduler started");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), PlannerError> {
        let handle = self.lock_scheduler()?.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
            self.log_info("shutdown", "reminder scheduler stopped");
        }
        Ok(())
    }

    pub fn upcoming_reminders(&self) -> Vec<UpcomingReminder> {
        self.engine.upcoming_snapshot()
    }

    pub fn subscribe_reminders(&self) -> watch::Receiver<Vec<UpcomingReminder>> {
        self.engine.subscribe()
    }

    pub async fn evaluate_reminders_now(&self) -> Result<Vec<UpcomingReminder>, PlannerError> {
        self.engine
            .evaluate_tick()
            .await
            .map_err(|error| self.operation_error("evaluate_reminders", error))
    }

    pub async fn request_notification_permission(
        &self,
    ) -> Result<NotificationPermission, PlannerError> {
        let permission = self
            .notifier
            .request_permission()
            .await
            .map_err(|error| self.operation_error("request_notification_permission", error))?;
        self.log_info(
            "request_notification_permission",
            &format!("permission={permission:?}"),
        );
        Ok(permission)
    }

    fn lock_scheduler(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<ReminderSchedulerHandle>>, PlannerError> {
        self.scheduler.lock().map_err(|error| {
            PlannerError::InvalidConfig(format!("scheduler lock poisoned: {error}"))
        })
    }

    fn operation_error(&self, operation: &str, error: PlannerError) -> PlannerError {
        self.log_error(operation, &error.to_string());
        error
    }

    pub fn log_info(&self, operation: &str, message: &str) {
        self.append_log("info", operation, message);
    }

    pub fn log_error(&self, operation: &str, message: &str) {
        self.append_log("error", operation, message);
    }

    fn append_log(&self, level: &str, operation: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("planner.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "operation": operation,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

fn resolve_timezone(config_dir: &Path) -> Result<Tz, PlannerError> {
    let Some(name) = read_timezone(config_dir)? else {
        return Ok(Tz::UTC);
    };
    name.parse().map_err(|_| {
        PlannerError::InvalidConfig(format!("unrecognized timezone '{name}' in app.json"))
    })
}
