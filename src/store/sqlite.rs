//! SQLite-based chore store.

use super::{ChoreStore, UnitOfWork, Work};
use crate::error::ChoreError;
use crate::ledger::Balance;
use crate::model::{
    BlockEdge, BoardSettings, CompletionLog, JobRequest, JobRequestId, LogId, LogStatus,
    Participant, ParticipantId, PointTransaction, RequestStatus, Reward, RewardId, RewardRequest,
    RewardRequestId, Task, TaskId, TaskOrigin, TaskStatus, Template, TemplateId, TransactionId,
    TransactionType,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    age INTEGER,
    color TEXT,
    balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    lifetime INTEGER NOT NULL DEFAULT 0 CHECK (lifetime >= 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS templates (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    base_points INTEGER NOT NULL CHECK (base_points > 0),
    requires_approval INTEGER NOT NULL DEFAULT 0,
    min_age INTEGER,
    frequency_days INTEGER NOT NULL CHECK (frequency_days > 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    last_generated_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    base_points INTEGER NOT NULL CHECK (base_points > 0),
    requires_approval INTEGER NOT NULL DEFAULT 0,
    min_age INTEGER,
    status TEXT NOT NULL DEFAULT 'open',
    claimed_by TEXT REFERENCES participants(id),
    template_id TEXT REFERENCES templates(id),
    created_at TEXT NOT NULL,
    CHECK ((status = 'claimed') = (claimed_by IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);

-- At most one outstanding generated task per template.
CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_outstanding_template
    ON tasks(template_id)
    WHERE template_id IS NOT NULL AND status IN ('open', 'claimed', 'pending_approval');

CREATE TABLE IF NOT EXISTS completion_logs (
    id TEXT PRIMARY KEY NOT NULL,
    task_id TEXT NOT NULL REFERENCES tasks(id),
    participant_id TEXT NOT NULL REFERENCES participants(id),
    status TEXT NOT NULL,
    points_at_completion INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    completed_at TEXT,
    approved_at TEXT,
    points_awarded INTEGER
);

CREATE INDEX IF NOT EXISTS idx_logs_status ON completion_logs(status, created_at);

CREATE TABLE IF NOT EXISTS point_transactions (
    id TEXT PRIMARY KEY NOT NULL,
    participant_id TEXT NOT NULL REFERENCES participants(id),
    type TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    description TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON point_transactions(created_at DESC);

CREATE TABLE IF NOT EXISTS rewards (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    cost_points INTEGER NOT NULL CHECK (cost_points > 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reward_requests (
    id TEXT PRIMARY KEY NOT NULL,
    participant_id TEXT NOT NULL REFERENCES participants(id),
    reward_id TEXT NOT NULL REFERENCES rewards(id),
    status TEXT NOT NULL DEFAULT 'PENDING',
    note TEXT,
    created_at TEXT NOT NULL,
    handled_at TEXT
);

CREATE TABLE IF NOT EXISTS task_blocks (
    task_id TEXT NOT NULL REFERENCES tasks(id),
    participant_id TEXT NOT NULL REFERENCES participants(id),
    PRIMARY KEY (task_id, participant_id)
);

CREATE TABLE IF NOT EXISTS job_requests (
    id TEXT PRIMARY KEY NOT NULL,
    participant_id TEXT NOT NULL REFERENCES participants(id),
    message TEXT,
    handled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS board_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    show_rewards_on_board INTEGER NOT NULL DEFAULT 0
);
"#;

const PARTICIPANT_COLUMNS: &str =
    "id, name, age, color, balance, lifetime, is_active, created_at";
const TASK_COLUMNS: &str = "id, name, description, base_points, requires_approval, min_age, \
     status, claimed_by, template_id, created_at";
const TEMPLATE_COLUMNS: &str = "id, name, description, base_points, requires_approval, min_age, \
     frequency_days, is_active, last_generated_at, created_at";
const LOG_COLUMNS: &str = "id, task_id, participant_id, status, points_at_completion, \
     created_at, completed_at, approved_at, points_awarded";
const REWARD_REQUEST_COLUMNS: &str =
    "id, participant_id, reward_id, status, note, created_at, handled_at";

pub struct SqliteChoreStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChoreStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, ChoreError> {
        let db_path = data_dir.join("choreboard.db");

        tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
            ChoreError::Persistence(format!("Failed to create data dir: {}", e))
        })?;

        // Open database in blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.execute_batch(SCHEMA)?;
            Self::seed_defaults(&conn)?;
            tracing::info!(path = %db_path.display(), "Opened chore database");
            Ok::<_, ChoreError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Seed rows every database needs. Safe to run on every open.
    fn seed_defaults(conn: &Connection) -> Result<(), ChoreError> {
        conn.execute(
            "INSERT OR IGNORE INTO board_settings (id, show_rewards_on_board) VALUES (1, 0)",
            [],
        )?;

        Ok(())
    }
}

#[async_trait]
impl ChoreStore for SqliteChoreStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn run(&self, work: Work) -> Result<Box<dyn Any + Send>, ChoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            // IMMEDIATE takes the write lock up front so reads inside the
            // unit of work cannot go stale before its writes land.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = {
                let mut uow = SqliteUnitOfWork { conn: &tx };
                work(&mut uow)?
            };
            tx.commit()?;
            Ok::<_, ChoreError>(out)
        })
        .await?
    }
}

/// Row access bound to an open transaction. Dropping the transaction
/// without commit rolls every write back.
struct SqliteUnitOfWork<'a> {
    conn: &'a Connection,
}

// === Column helpers ===

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| conversion_error(idx, e)),
    }
}

fn get_id<I>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Result<I, uuid::Error>) -> rusqlite::Result<I> {
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn get_opt_id<I>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Result<I, uuid::Error>,
) -> rusqlite::Result<Option<I>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => parse(&raw).map(Some).map_err(|e| conversion_error(idx, e)),
    }
}

fn get_points(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn points(value: u64) -> Result<i64, ChoreError> {
    i64::try_from(value).map_err(|_| ChoreError::Validation(format!("{} points is too large", value)))
}

#[derive(Debug)]
struct UnknownValue(String);

impl std::fmt::Display for UnknownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownValue {}

fn parse_task_status(
    raw: &str,
    claimed_by: Option<ParticipantId>,
    idx: usize,
) -> rusqlite::Result<TaskStatus> {
    match (raw, claimed_by) {
        ("open", _) => Ok(TaskStatus::Open),
        ("claimed", Some(claimed_by)) => Ok(TaskStatus::Claimed { claimed_by }),
        ("pending_approval", _) => Ok(TaskStatus::PendingApproval),
        ("approved", _) => Ok(TaskStatus::Approved),
        ("rejected", _) => Ok(TaskStatus::Rejected),
        ("removed", _) => Ok(TaskStatus::Removed),
        _ => Err(conversion_error(idx, UnknownValue(raw.to_string()))),
    }
}

fn get_enum<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, UnknownValue(raw)))
}

// === Row mappers ===

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: get_id(row, 0, ParticipantId::parse)?,
        name: row.get(1)?,
        age: row.get(2)?,
        color: row.get(3)?,
        balance: get_points(row, 4)?,
        lifetime: get_points(row, 5)?,
        is_active: row.get(6)?,
        created_at: get_ts(row, 7)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status_raw: String = row.get(6)?;
    let claimed_by = get_opt_id(row, 7, ParticipantId::parse)?;
    let origin = match get_opt_id(row, 8, TemplateId::parse)? {
        Some(template_id) => TaskOrigin::Generated { template_id },
        None => TaskOrigin::Manual,
    };
    Ok(Task {
        id: get_id(row, 0, TaskId::parse)?,
        name: row.get(1)?,
        description: row.get(2)?,
        base_points: get_points(row, 3)?,
        requires_approval: row.get(4)?,
        min_age: row.get(5)?,
        status: parse_task_status(&status_raw, claimed_by, 6)?,
        origin,
        created_at: get_ts(row, 9)?,
    })
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: get_id(row, 0, TemplateId::parse)?,
        name: row.get(1)?,
        description: row.get(2)?,
        base_points: get_points(row, 3)?,
        requires_approval: row.get(4)?,
        min_age: row.get(5)?,
        frequency_days: row.get(6)?,
        is_active: row.get(7)?,
        last_generated_at: get_opt_ts(row, 8)?,
        created_at: get_ts(row, 9)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<CompletionLog> {
    let points_awarded: Option<i64> = row.get(8)?;
    Ok(CompletionLog {
        id: get_id(row, 0, LogId::parse)?,
        task_id: get_id(row, 1, TaskId::parse)?,
        participant_id: get_id(row, 2, ParticipantId::parse)?,
        status: get_enum(row, 3, LogStatus::parse)?,
        points_at_completion: get_points(row, 4)?,
        created_at: get_ts(row, 5)?,
        completed_at: get_opt_ts(row, 6)?,
        approved_at: get_opt_ts(row, 7)?,
        points_awarded: points_awarded.map(|p| p.max(0) as u64),
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<PointTransaction> {
    Ok(PointTransaction {
        id: get_id(row, 0, TransactionId::parse)?,
        participant_id: get_id(row, 1, ParticipantId::parse)?,
        kind: get_enum(row, 2, TransactionType::parse)?,
        amount: get_points(row, 3)?,
        description: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}

fn reward_from_row(row: &Row<'_>) -> rusqlite::Result<Reward> {
    Ok(Reward {
        id: get_id(row, 0, RewardId::parse)?,
        name: row.get(1)?,
        description: row.get(2)?,
        cost_points: get_points(row, 3)?,
        is_active: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}

fn reward_request_from_row(row: &Row<'_>) -> rusqlite::Result<RewardRequest> {
    Ok(RewardRequest {
        id: get_id(row, 0, RewardRequestId::parse)?,
        participant_id: get_id(row, 1, ParticipantId::parse)?,
        reward_id: get_id(row, 2, RewardId::parse)?,
        status: get_enum(row, 3, RequestStatus::parse)?,
        note: row.get(4)?,
        created_at: get_ts(row, 5)?,
        handled_at: get_opt_ts(row, 6)?,
    })
}

fn job_request_from_row(row: &Row<'_>) -> rusqlite::Result<JobRequest> {
    Ok(JobRequest {
        id: get_id(row, 0, JobRequestId::parse)?,
        participant_id: get_id(row, 1, ParticipantId::parse)?,
        message: row.get(2)?,
        handled: row.get(3)?,
        created_at: get_ts(row, 4)?,
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<BlockEdge> {
    Ok(BlockEdge {
        task_id: get_id(row, 0, TaskId::parse)?,
        participant_id: get_id(row, 1, ParticipantId::parse)?,
    })
}

impl SqliteUnitOfWork<'_> {
    fn query_one<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, ChoreError> {
        Ok(self.conn.query_row(sql, params, map).optional()?)
    }

    fn query_all<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, ChoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Execute an UPDATE that must hit exactly one row.
    fn update_one(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        entity: &'static str,
        id: impl ToString,
    ) -> Result<(), ChoreError> {
        let rows = self.conn.execute(sql, params)?;
        if rows == 0 {
            return Err(ChoreError::not_found(entity, id));
        }
        Ok(())
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, ChoreError> {
        self.query_one(
            &format!("SELECT {} FROM participants WHERE id = ?1", PARTICIPANT_COLUMNS),
            params![id.to_string()],
            participant_from_row,
        )
    }

    fn insert_participant(&mut self, p: &Participant) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO participants (id, name, age, color, balance, lifetime, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                p.id.to_string(),
                p.name,
                p.age,
                p.color,
                points(p.balance)?,
                points(p.lifetime)?,
                p.is_active,
                ts(&p.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_participant(&mut self, p: &Participant) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE participants SET name = ?1, age = ?2, color = ?3, balance = ?4, lifetime = ?5,
                    is_active = ?6
             WHERE id = ?7",
            params![
                p.name,
                p.age,
                p.color,
                points(p.balance)?,
                points(p.lifetime)?,
                p.is_active,
                p.id.to_string(),
            ],
            "Participant",
            p.id,
        )
    }

    fn update_balance(&mut self, id: ParticipantId, balance: Balance) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE participants SET balance = ?1, lifetime = ?2 WHERE id = ?3",
            params![
                points(balance.balance())?,
                points(balance.lifetime())?,
                id.to_string()
            ],
            "Participant",
            id,
        )
    }

    fn list_participants(&self, active_only: bool) -> Result<Vec<Participant>, ChoreError> {
        self.query_all(
            &format!(
                "SELECT {} FROM participants WHERE (?1 = 0 OR is_active = 1) ORDER BY created_at ASC",
                PARTICIPANT_COLUMNS
            ),
            params![active_only],
            participant_from_row,
        )
    }

    fn get_task(&self, id: TaskId) -> Result<Option<Task>, ChoreError> {
        self.query_one(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            params![id.to_string()],
            task_from_row,
        )
    }

    fn insert_task(&mut self, t: &Task) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO tasks (id, name, description, base_points, requires_approval, min_age,
                                status, claimed_by, template_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                t.id.to_string(),
                t.name,
                t.description,
                points(t.base_points)?,
                t.requires_approval,
                t.min_age,
                t.status.as_str(),
                t.claimed_by().map(|p| p.to_string()),
                t.origin.template_id().map(|id| id.to_string()),
                ts(&t.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_task_status(&mut self, id: TaskId, status: TaskStatus) -> Result<(), ChoreError> {
        let claimed_by = match status {
            TaskStatus::Claimed { claimed_by } => Some(claimed_by.to_string()),
            _ => None,
        };
        self.update_one(
            "UPDATE tasks SET status = ?1, claimed_by = ?2 WHERE id = ?3",
            params![status.as_str(), claimed_by, id.to_string()],
            "Task",
            id,
        )
    }

    fn update_task_details(&mut self, t: &Task) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE tasks SET name = ?1, description = ?2, base_points = ?3,
                    requires_approval = ?4, min_age = ?5
             WHERE id = ?6",
            params![
                t.name,
                t.description,
                points(t.base_points)?,
                t.requires_approval,
                t.min_age,
                t.id.to_string(),
            ],
            "Task",
            t.id,
        )
    }

    fn claim_if_open(&mut self, id: TaskId, participant: ParticipantId) -> Result<bool, ChoreError> {
        let rows = self.conn.execute(
            "UPDATE tasks SET status = 'claimed', claimed_by = ?1
             WHERE id = ?2 AND status = 'open'",
            params![participant.to_string(), id.to_string()],
        )?;
        Ok(rows == 1)
    }

    fn list_tasks(&self, active_only: bool) -> Result<Vec<Task>, ChoreError> {
        self.query_all(
            &format!(
                "SELECT {} FROM tasks
                 WHERE (?1 = 0 OR status IN ('open', 'claimed'))
                 ORDER BY created_at ASC",
                TASK_COLUMNS
            ),
            params![active_only],
            task_from_row,
        )
    }

    fn has_outstanding_task(&self, template_id: TemplateId) -> Result<bool, ChoreError> {
        let found = self
            .conn
            .prepare(
                "SELECT 1 FROM tasks
                 WHERE template_id = ?1 AND status IN ('open', 'claimed', 'pending_approval')",
            )?
            .exists(params![template_id.to_string()])?;
        Ok(found)
    }

    fn get_template(&self, id: TemplateId) -> Result<Option<Template>, ChoreError> {
        self.query_one(
            &format!("SELECT {} FROM templates WHERE id = ?1", TEMPLATE_COLUMNS),
            params![id.to_string()],
            template_from_row,
        )
    }

    fn insert_template(&mut self, t: &Template) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO templates (id, name, description, base_points, requires_approval, min_age,
                                    frequency_days, is_active, last_generated_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                t.id.to_string(),
                t.name,
                t.description,
                points(t.base_points)?,
                t.requires_approval,
                t.min_age,
                t.frequency_days,
                t.is_active,
                t.last_generated_at.as_ref().map(ts),
                ts(&t.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_template(&mut self, t: &Template) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE templates SET name = ?1, description = ?2, base_points = ?3,
                    requires_approval = ?4, min_age = ?5, frequency_days = ?6, is_active = ?7,
                    last_generated_at = ?8
             WHERE id = ?9",
            params![
                t.name,
                t.description,
                points(t.base_points)?,
                t.requires_approval,
                t.min_age,
                t.frequency_days,
                t.is_active,
                t.last_generated_at.as_ref().map(ts),
                t.id.to_string(),
            ],
            "Template",
            t.id,
        )
    }

    fn set_last_generated(&mut self, ids: &[TemplateId], at: DateTime<Utc>) -> Result<(), ChoreError> {
        let at = ts(&at);
        let mut stmt = self
            .conn
            .prepare("UPDATE templates SET last_generated_at = ?1 WHERE id = ?2")?;
        for id in ids {
            if stmt.execute(params![at, id.to_string()])? == 0 {
                return Err(ChoreError::not_found("Template", id));
            }
        }
        Ok(())
    }

    fn list_templates(&self) -> Result<Vec<Template>, ChoreError> {
        self.query_all(
            &format!(
                "SELECT {} FROM templates ORDER BY created_at ASC",
                TEMPLATE_COLUMNS
            ),
            [],
            template_from_row,
        )
    }

    fn get_log(&self, id: LogId) -> Result<Option<CompletionLog>, ChoreError> {
        self.query_one(
            &format!("SELECT {} FROM completion_logs WHERE id = ?1", LOG_COLUMNS),
            params![id.to_string()],
            log_from_row,
        )
    }

    fn insert_log(&mut self, log: &CompletionLog) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO completion_logs (id, task_id, participant_id, status, points_at_completion,
                                          created_at, completed_at, approved_at, points_awarded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                log.id.to_string(),
                log.task_id.to_string(),
                log.participant_id.to_string(),
                log.status.as_str(),
                points(log.points_at_completion)?,
                ts(&log.created_at),
                log.completed_at.as_ref().map(ts),
                log.approved_at.as_ref().map(ts),
                log.points_awarded.map(points).transpose()?,
            ],
        )?;
        Ok(())
    }

    fn update_log(&mut self, log: &CompletionLog) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE completion_logs SET status = ?1, completed_at = ?2, approved_at = ?3,
                    points_awarded = ?4
             WHERE id = ?5",
            params![
                log.status.as_str(),
                log.completed_at.as_ref().map(ts),
                log.approved_at.as_ref().map(ts),
                log.points_awarded.map(points).transpose()?,
                log.id.to_string(),
            ],
            "Completion log",
            log.id,
        )
    }

    fn list_logs(&self, status: LogStatus, limit: Option<usize>) -> Result<Vec<CompletionLog>, ChoreError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        self.query_all(
            &format!(
                "SELECT {} FROM completion_logs WHERE status = ?1
                 ORDER BY COALESCE(approved_at, created_at) DESC
                 LIMIT ?2",
                LOG_COLUMNS
            ),
            params![status.as_str(), limit],
            log_from_row,
        )
    }

    fn insert_transaction(&mut self, tx: &PointTransaction) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO point_transactions (id, participant_id, type, amount, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tx.id.to_string(),
                tx.participant_id.to_string(),
                tx.kind.as_str(),
                points(tx.amount)?,
                tx.description,
                ts(&tx.created_at),
            ],
        )?;
        Ok(())
    }

    fn list_transactions(&self, limit: usize) -> Result<Vec<PointTransaction>, ChoreError> {
        self.query_all(
            "SELECT id, participant_id, type, amount, description, created_at
             FROM point_transactions ORDER BY created_at DESC LIMIT ?1",
            params![limit as i64],
            transaction_from_row,
        )
    }

    fn get_reward(&self, id: RewardId) -> Result<Option<Reward>, ChoreError> {
        self.query_one(
            "SELECT id, name, description, cost_points, is_active, created_at
             FROM rewards WHERE id = ?1",
            params![id.to_string()],
            reward_from_row,
        )
    }

    fn insert_reward(&mut self, r: &Reward) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO rewards (id, name, description, cost_points, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                r.id.to_string(),
                r.name,
                r.description,
                points(r.cost_points)?,
                r.is_active,
                ts(&r.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_reward(&mut self, r: &Reward) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE rewards SET name = ?1, description = ?2, cost_points = ?3, is_active = ?4
             WHERE id = ?5",
            params![
                r.name,
                r.description,
                points(r.cost_points)?,
                r.is_active,
                r.id.to_string(),
            ],
            "Reward",
            r.id,
        )
    }

    fn list_rewards(&self, active_only: bool) -> Result<Vec<Reward>, ChoreError> {
        self.query_all(
            "SELECT id, name, description, cost_points, is_active, created_at
             FROM rewards WHERE (?1 = 0 OR is_active = 1) ORDER BY created_at ASC",
            params![active_only],
            reward_from_row,
        )
    }

    fn get_reward_request(&self, id: RewardRequestId) -> Result<Option<RewardRequest>, ChoreError> {
        self.query_one(
            &format!(
                "SELECT {} FROM reward_requests WHERE id = ?1",
                REWARD_REQUEST_COLUMNS
            ),
            params![id.to_string()],
            reward_request_from_row,
        )
    }

    fn insert_reward_request(&mut self, r: &RewardRequest) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO reward_requests (id, participant_id, reward_id, status, note, created_at, handled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                r.id.to_string(),
                r.participant_id.to_string(),
                r.reward_id.to_string(),
                r.status.as_str(),
                r.note,
                ts(&r.created_at),
                r.handled_at.as_ref().map(ts),
            ],
        )?;
        Ok(())
    }

    fn update_reward_request(&mut self, r: &RewardRequest) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE reward_requests SET status = ?1, note = ?2, handled_at = ?3 WHERE id = ?4",
            params![
                r.status.as_str(),
                r.note,
                r.handled_at.as_ref().map(ts),
                r.id.to_string(),
            ],
            "Reward request",
            r.id,
        )
    }

    fn list_reward_requests(&self, limit: usize) -> Result<Vec<RewardRequest>, ChoreError> {
        self.query_all(
            &format!(
                "SELECT {} FROM reward_requests ORDER BY created_at DESC LIMIT ?1",
                REWARD_REQUEST_COLUMNS
            ),
            params![limit as i64],
            reward_request_from_row,
        )
    }

    fn insert_block(&mut self, edge: BlockEdge) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO task_blocks (task_id, participant_id) VALUES (?1, ?2)",
            params![edge.task_id.to_string(), edge.participant_id.to_string()],
        )?;
        Ok(())
    }

    fn delete_block(&mut self, edge: BlockEdge) -> Result<bool, ChoreError> {
        let rows = self.conn.execute(
            "DELETE FROM task_blocks WHERE task_id = ?1 AND participant_id = ?2",
            params![edge.task_id.to_string(), edge.participant_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn is_blocked(&self, edge: BlockEdge) -> Result<bool, ChoreError> {
        let found = self
            .conn
            .prepare("SELECT 1 FROM task_blocks WHERE task_id = ?1 AND participant_id = ?2")?
            .exists(params![
                edge.task_id.to_string(),
                edge.participant_id.to_string()
            ])?;
        Ok(found)
    }

    fn list_blocks(&self) -> Result<Vec<BlockEdge>, ChoreError> {
        self.query_all(
            "SELECT task_id, participant_id FROM task_blocks ORDER BY task_id, participant_id",
            [],
            block_from_row,
        )
    }

    fn get_job_request(&self, id: JobRequestId) -> Result<Option<JobRequest>, ChoreError> {
        self.query_one(
            "SELECT id, participant_id, message, handled, created_at FROM job_requests WHERE id = ?1",
            params![id.to_string()],
            job_request_from_row,
        )
    }

    fn insert_job_request(&mut self, r: &JobRequest) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO job_requests (id, participant_id, message, handled, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                r.id.to_string(),
                r.participant_id.to_string(),
                r.message,
                r.handled,
                ts(&r.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_job_request(&mut self, r: &JobRequest) -> Result<(), ChoreError> {
        self.update_one(
            "UPDATE job_requests SET message = ?1, handled = ?2 WHERE id = ?3",
            params![r.message, r.handled, r.id.to_string()],
            "Job request",
            r.id,
        )
    }

    fn list_job_requests(&self, unhandled_only: bool) -> Result<Vec<JobRequest>, ChoreError> {
        self.query_all(
            "SELECT id, participant_id, message, handled, created_at FROM job_requests
             WHERE (?1 = 0 OR handled = 0) ORDER BY created_at DESC",
            params![unhandled_only],
            job_request_from_row,
        )
    }

    fn get_settings(&self) -> Result<BoardSettings, ChoreError> {
        let settings = self
            .conn
            .query_row(
                "SELECT show_rewards_on_board FROM board_settings WHERE id = 1",
                [],
                |row| {
                    Ok(BoardSettings {
                        show_rewards_on_board: row.get(0)?,
                    })
                },
            )
            .optional()?;
        Ok(settings.unwrap_or_default())
    }

    fn put_settings(&mut self, settings: BoardSettings) -> Result<(), ChoreError> {
        self.conn.execute(
            "INSERT INTO board_settings (id, show_rewards_on_board) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET show_rewards_on_board = excluded.show_rewards_on_board",
            params![settings.show_rewards_on_board],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::transact;

    fn kid() -> Participant {
        Participant {
            id: ParticipantId::new(),
            name: "Ada".to_string(),
            age: Some(11),
            color: Some("#ff8800".to_string()),
            balance: 4,
            lifetime: 9,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let p = kid();
        let id = p.id;
        {
            let store = SqliteChoreStore::new(dir.path().to_path_buf()).await.unwrap();
            transact(&store, move |uow| uow.insert_participant(&p))
                .await
                .unwrap();
        }

        let store = SqliteChoreStore::new(dir.path().to_path_buf()).await.unwrap();
        let loaded = transact(&store, move |uow| uow.get_participant(id))
            .await
            .unwrap()
            .expect("participant persisted");
        assert_eq!(loaded.name, "Ada");
        assert_eq!(loaded.age, Some(11));
        assert_eq!(loaded.color.as_deref(), Some("#ff8800"));
        assert_eq!((loaded.balance, loaded.lifetime), (4, 9));
    }

    #[tokio::test]
    async fn test_log_roundtrip_keeps_award() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteChoreStore::new(dir.path().to_path_buf()).await.unwrap();
        let p = kid();
        let pid = p.id;
        let task = Task {
            id: TaskId::new(),
            name: "Fold laundry".to_string(),
            description: None,
            base_points: 7,
            requires_approval: true,
            min_age: None,
            status: TaskStatus::PendingApproval,
            origin: TaskOrigin::Manual,
            created_at: Utc::now(),
        };
        let log = CompletionLog {
            id: LogId::new(),
            task_id: task.id,
            participant_id: pid,
            status: LogStatus::Approved,
            points_at_completion: 7,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
            approved_at: Some(Utc::now()),
            points_awarded: Some(7),
        };
        let log_id = log.id;
        transact(&store, move |uow| {
            uow.insert_participant(&p)?;
            uow.insert_task(&task)?;
            uow.insert_log(&log)
        })
        .await
        .unwrap();

        let loaded = transact(&store, move |uow| uow.get_log(log_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, LogStatus::Approved);
        assert_eq!(loaded.points_awarded, Some(7));
        assert_eq!(loaded.participant_id, pid);

        let approved = transact(&store, |uow| uow.list_logs(LogStatus::Approved, Some(50)))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        let pending = transact(&store, |uow| uow.list_logs(LogStatus::Completed, None))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_claim_check_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteChoreStore::new(dir.path().to_path_buf()).await.unwrap();
        let task = Task {
            id: TaskId::new(),
            name: "Sweep".to_string(),
            description: None,
            base_points: 1,
            requires_approval: false,
            min_age: None,
            status: TaskStatus::Open,
            origin: TaskOrigin::Manual,
            created_at: Utc::now(),
        };
        let task_id = task.id;
        transact(&store, move |uow| uow.insert_task(&task))
            .await
            .unwrap();

        // A raw write that breaks the claimed_by pairing is refused by the schema.
        let conn = store.conn.lock().await;
        let res = conn.execute(
            "UPDATE tasks SET status = 'claimed', claimed_by = NULL WHERE id = ?1",
            params![task_id.to_string()],
        );
        assert!(res.is_err());
    }
}
