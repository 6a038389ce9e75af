use crate::domain::models::ScheduleBlock;
use crate::domain::recurrence::occurrences_for_date;
use crate::domain::slots::{slot_minutes_from_midnight, slot_to_time, TimeFormat};
use crate::infrastructure::block_repository::BlockRepository;
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::notification::{NotificationClient, NotificationPermission};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_REMINDER_LEAD_MINUTES: u32 = 10;
pub const DEFAULT_EVALUATION_INTERVAL_SECONDS: u64 = 30;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ReminderPolicy {
    pub default_lead_minutes: u32,
    pub evaluation_interval: StdDuration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            default_lead_minutes: DEFAULT_REMINDER_LEAD_MINUTES,
            evaluation_interval: StdDuration::from_secs(DEFAULT_EVALUATION_INTERVAL_SECONDS),
        }
    }
}

pub fn load_reminder_policy(config_dir: &Path) -> ReminderPolicy {
    let mut policy = ReminderPolicy::default();
    let path = config_dir.join("planner.json");
    let Ok(raw) = fs::read_to_string(path) else {
        return policy;
    };
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return policy;
    };
    let Some(reminders) = parsed.get("reminders") else {
        return policy;
    };

    if let Some(value) = reminders
        .get("defaultLeadMinutes")
        .and_then(serde_json::Value::as_u64)
    {
        policy.default_lead_minutes = value as u32;
    }
    if let Some(value) = reminders
        .get("evaluationIntervalSeconds")
        .and_then(serde_json::Value::as_u64)
    {
        policy.evaluation_interval = StdDuration::from_secs(value.max(1));
    }

    policy
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpcomingReminder {
    pub block: ScheduleBlock,
    pub minutes_until_start: i64,
}

pub struct ReminderEngine<R, N>
where
    R: BlockRepository,
    N: NotificationClient,
{
    repository: Arc<R>,
    notifier: Arc<N>,
    policy: ReminderPolicy,
    timezone: Tz,
    time_format: TimeFormat,
    now_provider: NowProvider,
    notified: Mutex<HashSet<String>>,
    upcoming_tx: watch::Sender<Vec<UpcomingReminder>>,
}

impl<R, N> ReminderEngine<R, N>
where
    R: BlockRepository,
    N: NotificationClient,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        let (upcoming_tx, _) = watch::channel(Vec::new());
        Self {
            repository,
            notifier,
            policy: ReminderPolicy::default(),
            timezone: Tz::UTC,
            time_format: TimeFormat::default(),
            now_provider: Arc::new(Utc::now),
            notified: Mutex::new(HashSet::new()),
            upcoming_tx,
        }
    }

    pub fn with_policy(mut self, policy: ReminderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_time_format(mut self, time_format: TimeFormat) -> Self {
        self.time_format = time_format;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<UpcomingReminder>> {
        self.upcoming_tx.subscribe()
    }

    pub fn upcoming_snapshot(&self) -> Vec<UpcomingReminder> {
        self.upcoming_tx.borrow().clone()
    }

    // One evaluation pass: derive today's schedule from scratch, publish the
    // in-app list, then deliver anything not yet notified today.
    pub async fn evaluate_tick(&self) -> Result<Vec<UpcomingReminder>, PlannerError> {
        let now_utc = (self.now_provider)();
        let now_local = now_utc.with_timezone(&self.timezone);
        let today = now_local.date_naive();

        let one_offs = self.repository.load_blocks_for_date(today)?;
        let templates = self.repository.load_recurring_templates()?;
        let mut blocks: Vec<ScheduleBlock> =
            one_offs.iter().map(ScheduleBlock::from_one_off).collect();
        blocks.extend(occurrences_for_date(&templates, today));

        let mut upcoming = Vec::new();
        for block in blocks {
            let lead = block.effective_lead_minutes(self.policy.default_lead_minutes);
            if lead == 0 {
                continue;
            }
            let Some(start_local) = block_start_in_zone(&self.timezone, today, block.start_slot)
            else {
                continue;
            };
            let minutes_until_start = (start_local.with_timezone(&Utc) - now_utc).num_minutes();
            if minutes_until_start > 0 && minutes_until_start <= i64::from(lead) {
                upcoming.push(UpcomingReminder {
                    block,
                    minutes_until_start,
                });
            }
        }
        upcoming.sort_by(|left, right| {
            left.minutes_until_start
                .cmp(&right.minutes_until_start)
                .then_with(|| left.block.start_slot.cmp(&right.block.start_slot))
                .then_with(|| left.block.id.cmp(&right.block.id))
        });

        self.upcoming_tx.send_replace(upcoming.clone());
        self.deliver(&upcoming).await?;
        Ok(upcoming)
    }

    pub fn reset_notified(&self) -> Result<(), PlannerError> {
        let mut notified = self.lock_notified()?;
        notified.clear();
        Ok(())
    }

    pub fn duration_until_midnight_reset(&self) -> StdDuration {
        let now_utc = (self.now_provider)();
        let now_local = now_utc.with_timezone(&self.timezone);
        let next_midnight = (now_local.date_naive() + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .expect("valid midnight");
        let target_utc = match self.timezone.from_local_datetime(&next_midnight) {
            LocalResult::Single(resolved) => resolved.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // Zones that skip midnight on a transition day fall back to a
            // full day.
            LocalResult::None => now_utc + Duration::days(1),
        };
        (target_utc - now_utc)
            .to_std()
            .unwrap_or(StdDuration::from_secs(1))
    }

    async fn deliver(&self, upcoming: &[UpcomingReminder]) -> Result<(), PlannerError> {
        if self.notifier.permission_state() != NotificationPermission::Granted {
            return Ok(());
        }
        for entry in upcoming {
            if self.lock_notified()?.contains(&entry.block.id) {
                continue;
            }
            let body = format!(
                "Starts at {}",
                slot_to_time(entry.block.start_slot, self.time_format)
            );
            // A failed delivery is retried on the next tick.
            if self
                .notifier
                .notify(&entry.block.title, &body)
                .await
                .is_ok()
            {
                self.lock_notified()?.insert(entry.block.id.clone());
            }
        }
        Ok(())
    }

    fn lock_notified(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashSet<String>>, PlannerError> {
        self.notified.lock().map_err(|error| {
            PlannerError::InvalidConfig(format!("notified set lock poisoned: {error}"))
        })
    }
}

fn block_start_in_zone(timezone: &Tz, date: NaiveDate, start_slot: u32) -> Option<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0).expect("valid midnight");
    let start = midnight + Duration::minutes(i64::from(slot_minutes_from_midnight(start_slot)));
    match timezone.from_local_datetime(&start) {
        LocalResult::Single(resolved) => Some(resolved),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // The start falls into a DST gap; skip it for this day.
        LocalResult::None => None,
    }
}

pub struct ReminderSchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReminderSchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

pub fn spawn_reminder_scheduler<R, N>(engine: Arc<ReminderEngine<R, N>>) -> ReminderSchedulerHandle
where
    R: BlockRepository + 'static,
    N: NotificationClient + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(engine.policy().evaluation_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut midnight_reset =
            Box::pin(tokio::time::sleep(engine.duration_until_midnight_reset()));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Repository failures surface again on the next tick.
                    let _ = engine.evaluate_tick().await;
                }
                () = midnight_reset.as_mut() => {
                    let _ = engine.reset_notified();
                    midnight_reset.set(tokio::time::sleep(engine.duration_until_midnight_reset()));
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
    ReminderSchedulerHandle { shutdown_tx, task }
}
