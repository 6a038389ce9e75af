use crate::domain::models::{RecurringBlock, TimeBlock};
use crate::infrastructure::error::PlannerError;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait BlockRepository: Send + Sync {
    fn load_blocks_for_date(&self, date: NaiveDate) -> Result<Vec<TimeBlock>, PlannerError>;
    fn save_blocks_for_date(
        &self,
        date: NaiveDate,
        blocks: &[TimeBlock],
    ) -> Result<(), PlannerError>;
    fn load_recurring_templates(&self) -> Result<Vec<RecurringBlock>, PlannerError>;
}

#[derive(Debug, Clone)]
pub struct SqliteBlockRepository {
    db_path: PathBuf,
}

impl SqliteBlockRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, PlannerError> {
        Connection::open(&self.db_path).map_err(PlannerError::from)
    }

    pub fn save_recurring_templates(
        &self,
        templates: &[RecurringBlock],
    ) -> Result<(), PlannerError> {
        // Templates never pass through the block store's validation.
        for template in templates {
            template.validate().map_err(PlannerError::InvalidBlock)?;
        }
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute("DELETE FROM recurring_templates", [])?;
        {
            let mut statement = transaction.prepare(
                "INSERT INTO recurring_templates
                   (id, title, start_slot, duration_slots, color, reminder, reminder_lead_minutes, days_of_week)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for template in templates {
                let days = serde_json::to_string(&template.days_of_week)?;
                statement.execute(params![
                    template.id,
                    template.title,
                    template.start_slot,
                    template.duration_slots,
                    template.color,
                    template.reminder,
                    template.reminder_lead_minutes,
                    days,
                ])?;
            }
        }
        transaction.commit()?;
        Ok(())
    }
}

impl BlockRepository for SqliteBlockRepository {
    fn load_blocks_for_date(&self, date: NaiveDate) -> Result<Vec<TimeBlock>, PlannerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, title, start_slot, duration_slots, color, reminder, reminder_lead_minutes
             FROM blocks WHERE date = ?1 ORDER BY rowid",
        )?;
        let rows = statement.query_map(params![date.to_string()], |row| {
            Ok(TimeBlock {
                id: row.get(0)?,
                date,
                title: row.get(1)?,
                start_slot: row.get(2)?,
                duration_slots: row.get(3)?,
                color: row.get(4)?,
                reminder: row.get(5)?,
                reminder_lead_minutes: row.get(6)?,
            })
        })?;

        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row?);
        }
        Ok(blocks)
    }

    fn save_blocks_for_date(
        &self,
        date: NaiveDate,
        blocks: &[TimeBlock],
    ) -> Result<(), PlannerError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute("DELETE FROM blocks WHERE date = ?1", params![date.to_string()])?;
        {
            let mut statement = transaction.prepare(
                "INSERT INTO blocks
                   (date, id, title, start_slot, duration_slots, color, reminder, reminder_lead_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for block in blocks {
                statement.execute(params![
                    date.to_string(),
                    block.id,
                    block.title,
                    block.start_slot,
                    block.duration_slots,
                    block.color,
                    block.reminder,
                    block.reminder_lead_minutes,
                ])?;
            }
        }
        transaction.commit()?;
        Ok(())
    }

    fn load_recurring_templates(&self) -> Result<Vec<RecurringBlock>, PlannerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, title, start_slot, duration_slots, color, reminder, reminder_lead_minutes, days_of_week
             FROM recurring_templates ORDER BY rowid",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, Option<u32>>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut templates = Vec::new();
        for row in rows {
            let (id, title, start_slot, duration_slots, color, reminder, lead, days_raw) = row?;
            let days_of_week: BTreeSet<u8> = serde_json::from_str(&days_raw)?;
            templates.push(RecurringBlock {
                id,
                title,
                start_slot,
                duration_slots,
                color,
                reminder,
                reminder_lead_minutes: lead,
                days_of_week,
            });
        }
        Ok(templates)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBlockRepository {
    blocks: Mutex<HashMap<NaiveDate, Vec<TimeBlock>>>,
    templates: Mutex<Vec<RecurringBlock>>,
}

impl InMemoryBlockRepository {
    pub fn set_recurring_templates(
        &self,
        templates: Vec<RecurringBlock>,
    ) -> Result<(), PlannerError> {
        for template in &templates {
            template.validate().map_err(PlannerError::InvalidBlock)?;
        }
        let mut stored = self.templates.lock().map_err(|error| {
            PlannerError::InvalidConfig(format!("recurring template lock poisoned: {error}"))
        })?;
        *stored = templates;
        Ok(())
    }
}

impl BlockRepository for InMemoryBlockRepository {
    fn load_blocks_for_date(&self, date: NaiveDate) -> Result<Vec<TimeBlock>, PlannerError> {
        let blocks = self.blocks.lock().map_err(|error| {
            PlannerError::InvalidConfig(format!("block store lock poisoned: {error}"))
        })?;
        Ok(blocks.get(&date).cloned().unwrap_or_default())
    }

    fn save_blocks_for_date(
        &self,
        date: NaiveDate,
        blocks: &[TimeBlock],
    ) -> Result<(), PlannerError> {
        let mut stored = self.blocks.lock().map_err(|error| {
            PlannerError::InvalidConfig(format!("block store lock poisoned: {error}"))
        })?;
        stored.insert(date, blocks.to_vec());
        Ok(())
    }

    fn load_recurring_templates(&self) -> Result<Vec<RecurringBlock>, PlannerError> {
        let templates = self.templates.lock().map_err(|error| {
            PlannerError::InvalidConfig(format!("recurring template lock poisoned: {error}"))
        })?;
        Ok(templates.clone())
    }
}
