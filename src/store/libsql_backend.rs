//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. A single connection is shared
//! by every caller; writes are serialised through `write_lock` so a turn's
//! transaction never interleaves with another write on the same connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::mentor::transition::TurnCommit;
use crate::model::{
    Conversation, ExtractedData, LedgerEntry, LedgerStatus, LifecycleEvent, Message, MessageRole,
    Project, Student, merge_into,
};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    opt_text_owned(s.map(String::from))
}

fn opt_int(n: Option<u8>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(i64::from(n)),
        None => libsql::Value::Null,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn parse_map(s: &str) -> ExtractedData {
    serde_json::from_str(s).unwrap_or_default()
}

fn parse_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

// ── Row mapping ─────────────────────────────────────────────────────

const STUDENT_COLUMNS: &str = "id, name, grade, current_checkpoint, current_week, target_person, problem_statement, problem_description, solution_type, primary_tool, tools_used, build_progress, created_at, updated_at";

const PROJECT_COLUMNS: &str = "id, student_id, title, problem_statement, target_person, problem_description, solution_type, tools_used, status, created_at, updated_at";

const LEDGER_COLUMNS: &str =
    "student_id, checkpoint, week, status, started_at, completed_at, data";

const EVENT_COLUMNS: &str = "id, student_id, event_type, payload, created_at";

fn row_to_student(row: &libsql::Row) -> Result<Student, libsql::Error> {
    let grade: Option<i64> = row.get::<i64>(2).ok();
    let week: i64 = row.get(4)?;
    let tools: String = row.get::<String>(10).unwrap_or_else(|_| "[]".into());
    let created: String = row.get(12)?;
    let updated: String = row.get(13)?;

    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        grade: grade.and_then(|g| u8::try_from(g).ok()),
        current_checkpoint: row.get(3)?,
        current_week: u8::try_from(week).unwrap_or(1),
        target_person: row.get(5).ok(),
        problem_statement: row.get(6).ok(),
        problem_description: row.get(7).ok(),
        solution_type: row.get(8).ok(),
        primary_tool: row.get(9).ok(),
        tools_used: parse_list(&tools),
        build_progress: row.get(11).ok(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

fn row_to_project(row: &libsql::Row) -> Result<Project, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("project id: {e}")))?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("project id {id_str}: {e}")))?;
    let get = |i: i32| -> Result<String, DatabaseError> {
        row.get::<String>(i)
            .map_err(|e| DatabaseError::Query(format!("project column {i}: {e}")))
    };

    Ok(Project {
        id,
        student_id: get(1)?,
        title: get(2)?,
        problem_statement: get(3)?,
        target_person: row.get(4).ok(),
        problem_description: row.get(5).ok(),
        solution_type: row.get(6).ok(),
        tools_used: parse_list(&get(7)?),
        status: get(8)?,
        created_at: parse_datetime(&get(9)?),
        updated_at: parse_datetime(&get(10)?),
    })
}

fn row_to_ledger(row: &libsql::Row) -> Result<LedgerEntry, libsql::Error> {
    let week: i64 = row.get(2)?;
    let status: String = row.get(3)?;
    let started: Option<String> = row.get(4).ok();
    let completed: Option<String> = row.get(5).ok();
    let data: String = row.get::<String>(6).unwrap_or_else(|_| "{}".into());

    Ok(LedgerEntry {
        student_id: row.get(0)?,
        checkpoint: row.get(1)?,
        week: u8::try_from(week).unwrap_or(1),
        status: LedgerStatus::parse(&status),
        started_at: parse_optional_datetime(&started),
        completed_at: parse_optional_datetime(&completed),
        data: parse_map(&data),
    })
}

fn row_to_event(row: &libsql::Row) -> Result<LifecycleEvent, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("event id: {e}")))?;
    let payload: String = row.get::<String>(3).unwrap_or_else(|_| "{}".into());
    let created: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("event created_at: {e}")))?;

    Ok(LifecycleEvent {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("event id {id_str}: {e}")))?,
        student_id: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("event student_id: {e}")))?,
        event_type: row
            .get(2)
            .map_err(|e| DatabaseError::Query(format!("event type: {e}")))?,
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        created_at: parse_datetime(&created),
    })
}

// ── Row writers shared by single writes and turn commits ────────────

async fn write_student(conn: &Connection, student: &Student) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE students SET name = ?2, grade = ?3, current_checkpoint = ?4, current_week = ?5,
                target_person = ?6, problem_statement = ?7, problem_description = ?8,
                solution_type = ?9, primary_tool = ?10, tools_used = ?11, build_progress = ?12,
                updated_at = ?13
             WHERE id = ?1",
            params![
                student.id.as_str(),
                student.name.as_str(),
                opt_int(student.grade),
                student.current_checkpoint.as_str(),
                i64::from(student.current_week),
                opt_text(student.target_person.as_deref()),
                opt_text(student.problem_statement.as_deref()),
                opt_text(student.problem_description.as_deref()),
                opt_text(student.solution_type.as_deref()),
                opt_text(student.primary_tool.as_deref()),
                to_json(&student.tools_used)?,
                opt_text(student.build_progress.as_deref()),
                fmt_ts(&student.updated_at),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("update_student: {e}")))?;

    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "student".to_string(),
            id: student.id.clone(),
        });
    }
    Ok(())
}

async fn insert_conversation(
    conn: &Connection,
    conversation: &Conversation,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversations (id, student_id, checkpoint, context, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            conversation.id.to_string(),
            conversation.student_id.as_str(),
            conversation.checkpoint.as_str(),
            to_json(&conversation.context)?,
            fmt_ts(&conversation.created_at),
            fmt_ts(&conversation.updated_at),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert_conversation: {e}")))?;
    Ok(())
}

async fn insert_message(
    conn: &Connection,
    conversation_id: Uuid,
    message: &Message,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO conversation_messages (conversation_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            conversation_id.to_string(),
            message.role.as_str(),
            message.content.as_str(),
            fmt_ts(&message.timestamp),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("append_message: {e}")))?;

    conn.execute(
        "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
        params![conversation_id.to_string(), fmt_ts(&message.timestamp)],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("append_message touch: {e}")))?;
    Ok(())
}

async fn write_context(
    conn: &Connection,
    conversation_id: Uuid,
    context: &ExtractedData,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE conversations SET context = ?2, updated_at = ?3 WHERE id = ?1",
        params![
            conversation_id.to_string(),
            to_json(context)?,
            fmt_ts(&Utc::now()),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("write_context: {e}")))?;
    Ok(())
}

async fn upsert_ledger(conn: &Connection, entry: &LedgerEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO checkpoint_ledger (student_id, checkpoint, week, status, started_at, completed_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(student_id, checkpoint) DO UPDATE SET
            week = excluded.week,
            status = excluded.status,
            started_at = COALESCE(checkpoint_ledger.started_at, excluded.started_at),
            completed_at = excluded.completed_at,
            data = excluded.data",
        params![
            entry.student_id.as_str(),
            entry.checkpoint.as_str(),
            i64::from(entry.week),
            entry.status.as_str(),
            opt_text_owned(entry.started_at.as_ref().map(fmt_ts)),
            opt_text_owned(entry.completed_at.as_ref().map(fmt_ts)),
            to_json(&entry.data)?,
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("upsert_ledger_entry: {e}")))?;
    Ok(())
}

async fn upsert_project(conn: &Connection, project: &Project) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO projects (id, student_id, title, problem_statement, target_person,
            problem_description, solution_type, tools_used, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            problem_statement = excluded.problem_statement,
            target_person = excluded.target_person,
            problem_description = excluded.problem_description,
            solution_type = excluded.solution_type,
            tools_used = excluded.tools_used,
            status = excluded.status,
            updated_at = excluded.updated_at",
        params![
            project.id.to_string(),
            project.student_id.as_str(),
            project.title.as_str(),
            project.problem_statement.as_str(),
            opt_text(project.target_person.as_deref()),
            opt_text(project.problem_description.as_deref()),
            opt_text(project.solution_type.as_deref()),
            to_json(&project.tools_used)?,
            project.status.as_str(),
            fmt_ts(&project.created_at),
            fmt_ts(&project.updated_at),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("save_project: {e}")))?;
    Ok(())
}

async fn insert_event(conn: &Connection, event: &LifecycleEvent) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO events (id, student_id, event_type, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.id.to_string(),
            event.student_id.as_str(),
            event.event_type.as_str(),
            to_json(&event.payload)?,
            fmt_ts(&event.created_at),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("append_event: {e}")))?;
    Ok(())
}

async fn write_turn(conn: &Connection, commit: &TurnCommit) -> Result<(), DatabaseError> {
    let conversation = &commit.conversation;
    if commit.new_conversation {
        insert_conversation(conn, conversation).await?;
    }
    for message in &commit.appended {
        insert_message(conn, conversation.id, message).await?;
    }
    write_context(conn, conversation.id, &conversation.context).await?;
    insert_event(conn, &commit.chat_event).await?;

    if let Some(ref advance) = commit.advance {
        write_student(conn, &advance.student).await?;
        upsert_ledger(conn, &advance.completed).await?;
        upsert_ledger(conn, &advance.started).await?;
        if let Some(ref project) = advance.project {
            upsert_project(conn, project).await?;
        }
        insert_event(conn, &advance.event).await?;
    }
    Ok(())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        migrations::run_migrations(self.conn()).await
    }

    // ── Students ────────────────────────────────────────────────────

    async fn get_student(&self, id: &str) -> Result<Option<Student>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_student: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_student: {e}")))?
        {
            Some(row) => Ok(Some(
                row_to_student(&row).map_err(|e| DatabaseError::Query(format!("get_student row: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    async fn create_student(&self, student: &Student) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO students ({STUDENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    student.id.as_str(),
                    student.name.as_str(),
                    opt_int(student.grade),
                    student.current_checkpoint.as_str(),
                    i64::from(student.current_week),
                    opt_text(student.target_person.as_deref()),
                    opt_text(student.problem_statement.as_deref()),
                    opt_text(student.problem_description.as_deref()),
                    opt_text(student.solution_type.as_deref()),
                    opt_text(student.primary_tool.as_deref()),
                    to_json(&student.tools_used)?,
                    opt_text(student.build_progress.as_deref()),
                    fmt_ts(&student.created_at),
                    fmt_ts(&student.updated_at),
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DatabaseError::Constraint(format!("student {} already exists", student.id))
                } else {
                    DatabaseError::Query(format!("create_student: {e}"))
                }
            })?;

        debug!(student_id = %student.id, "Student created");
        Ok(())
    }

    async fn update_student(&self, student: &Student) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        write_student(self.conn(), student).await
    }

    // ── Conversations ───────────────────────────────────────────────

    async fn latest_conversation(
        &self,
        student_id: &str,
        checkpoint: &str,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT id, context, created_at, updated_at FROM conversations
                 WHERE student_id = ?1 AND checkpoint = ?2
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![student_id, checkpoint],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_conversation: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_conversation: {e}")))?
        else {
            return Ok(None);
        };

        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("conversation id: {e}")))?;
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("conversation id {id_str}: {e}")))?;
        let context: String = row.get::<String>(1).unwrap_or_else(|_| "{}".into());
        let created: String = row.get::<String>(2).unwrap_or_default();
        let updated: String = row.get::<String>(3).unwrap_or_default();

        let mut messages = Vec::new();
        let mut rows = conn
            .query(
                "SELECT role, content, created_at FROM conversation_messages
                 WHERE conversation_id = ?1 ORDER BY seq ASC",
                params![id_str],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("conversation messages: {e}")))?;

        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("conversation messages: {e}")))?
        {
            let role: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("message role: {e}")))?;
            let Some(role) = MessageRole::parse(&role) else {
                warn!(conversation_id = %id, %role, "Skipping message with unknown role");
                continue;
            };
            let content: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("message content: {e}")))?;
            let ts: String = row.get::<String>(2).unwrap_or_default();
            messages.push(Message {
                role,
                content,
                timestamp: parse_datetime(&ts),
            });
        }

        Ok(Some(Conversation {
            id,
            student_id: student_id.to_string(),
            checkpoint: checkpoint.to_string(),
            messages,
            context: parse_map(&context),
            created_at: parse_datetime(&created),
            updated_at: parse_datetime(&updated),
        }))
    }

    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        insert_conversation(self.conn(), conversation).await
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: &Message,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        insert_message(self.conn(), conversation_id, message).await
    }

    async fn merge_conversation_context(
        &self,
        conversation_id: Uuid,
        data: &ExtractedData,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT context FROM conversations WHERE id = ?1",
                params![conversation_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("merge_conversation_context: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("merge_conversation_context: {e}")))?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "conversation".to_string(),
                id: conversation_id.to_string(),
            })?;

        let raw: String = row.get::<String>(0).unwrap_or_else(|_| "{}".into());
        let mut context = parse_map(&raw);
        merge_into(&mut context, data);
        write_context(conn, conversation_id, &context).await
    }

    // ── Checkpoint ledger ───────────────────────────────────────────

    async fn upsert_ledger_entry(&self, entry: &LedgerEntry) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        upsert_ledger(self.conn(), entry).await
    }

    async fn list_ledger_entries(&self, student_id: &str) -> Result<Vec<LedgerEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {LEDGER_COLUMNS} FROM checkpoint_ledger WHERE student_id = ?1
                     ORDER BY COALESCE(started_at, completed_at) ASC"
                ),
                params![student_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_ledger_entries: {e}")))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_ledger_entries: {e}")))?
        {
            entries.push(
                row_to_ledger(&row)
                    .map_err(|e| DatabaseError::Query(format!("ledger row: {e}")))?,
            );
        }
        Ok(entries)
    }

    // ── Projects ────────────────────────────────────────────────────

    async fn latest_project(&self, student_id: &str) -> Result<Option<Project>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects WHERE student_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![student_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_project: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_project: {e}")))?
        {
            Some(row) => Ok(Some(row_to_project(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_project(&self, project: &Project) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        upsert_project(self.conn(), project).await
    }

    // ── Events ──────────────────────────────────────────────────────

    async fn append_event(&self, event: &LifecycleEvent) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        insert_event(self.conn(), event).await
    }

    async fn list_events(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LifecycleEvent>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE student_id = ?1 AND created_at >= ?2
                     ORDER BY created_at ASC, rowid ASC"
                ),
                params![student_id, fmt_ts(&since)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_events: {e}")))?;

        let mut events = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_events: {e}")))?
        {
            events.push(row_to_event(&row)?);
        }
        Ok(events)
    }

    // ── Turns ───────────────────────────────────────────────────────

    async fn commit_turn(&self, commit: &TurnCommit) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("commit_turn begin: {e}")))?;

        match write_turn(&tx, commit).await {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Query(format!("commit_turn commit: {e}")))?;
                debug!(
                    student_id = %commit.student_id,
                    conversation_id = %commit.conversation.id,
                    advanced = commit.advance.is_some(),
                    "Turn committed"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Turn rollback failed");
                }
                Err(e)
            }
        }
    }
}
