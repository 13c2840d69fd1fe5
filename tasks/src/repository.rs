//! Repository over users and tasks.
//!
//! [`TaskRepository`] is the seam callers program against;
//! [`SqliteTaskRepository`] stores everything in two tables on a borrowed
//! [`Session`].

use bench_core::Session;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use thiserror::Error;

use crate::model::{Task, User};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

pub trait TaskRepository {
    /// Drop and recreate the schema, leaving both tables empty.
    fn reset_schema(&mut self) -> Result<()>;

    fn create_user(&mut self, first_name: &str, last_name: &str) -> Result<User>;

    fn find_user(&self, id: i64) -> Result<Option<User>>;

    fn create_task(&mut self, title: &str, due_date: NaiveDate, is_complete: bool)
        -> Result<Task>;

    fn find_task(&self, id: i64) -> Result<Option<Task>>;

    /// Assign a task to a user. Both must exist.
    fn assign_task(&mut self, task_id: i64, user_id: i64) -> Result<Task>;

    /// Incomplete tasks assigned to any user with this first name.
    fn incomplete_tasks_for(&self, first_name: &str) -> Result<Vec<Task>>;

    /// Lowest-id task, if any.
    fn first_task(&self) -> Result<Option<Task>>;

    fn update_due_date(&mut self, task_id: i64, due_date: NaiveDate) -> Result<Task>;

    /// Delete every task due strictly before `date` and return them.
    fn delete_tasks_due_before(&mut self, date: NaiveDate) -> Result<Vec<Task>>;

    fn all_tasks(&self) -> Result<Vec<Task>>;
}

const TASK_COLUMNS: &str = "task_id, title, due_date, is_complete, assigned_to";

pub struct SqliteTaskRepository<'a> {
    session: &'a mut Session,
}

impl<'a> SqliteTaskRepository<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self { session }
    }

    fn query_tasks(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Task>> {
        let mut stmt = self.session.connection().prepare(sql)?;
        let tasks = stmt
            .query_map(params, task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn require_task(&self, id: i64) -> Result<Task> {
        self.find_task(id)?
            .ok_or(RepositoryError::NotFound { entity: "task", id })
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        due_date: row.get(2)?,
        is_complete: row.get(3)?,
        assigned_to: row.get(4)?,
    })
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn reset_schema(&mut self) -> Result<()> {
        log::debug!("Recreating task schema in '{}'", self.session.database());
        self.session.connection().execute_batch(
            "DROP TABLE IF EXISTS tasks;
             DROP TABLE IF EXISTS users;
             CREATE TABLE users (
                 user_id    INTEGER PRIMARY KEY AUTOINCREMENT,
                 first_name TEXT NOT NULL,
                 last_name  TEXT NOT NULL
             );
             CREATE TABLE tasks (
                 task_id     INTEGER PRIMARY KEY AUTOINCREMENT,
                 title       TEXT    NOT NULL,
                 due_date    TEXT    NOT NULL,
                 is_complete INTEGER NOT NULL DEFAULT 0,
                 assigned_to INTEGER REFERENCES users (user_id) ON DELETE SET NULL
             );",
        )?;
        Ok(())
    }

    fn create_user(&mut self, first_name: &str, last_name: &str) -> Result<User> {
        let conn = self.session.connection();
        conn.execute(
            "INSERT INTO users (first_name, last_name) VALUES (?1, ?2)",
            params![first_name, last_name],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }

    fn find_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .session
            .connection()
            .query_row(
                "SELECT user_id, first_name, last_name FROM users WHERE user_id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        first_name: row.get(1)?,
                        last_name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn create_task(
        &mut self,
        title: &str,
        due_date: NaiveDate,
        is_complete: bool,
    ) -> Result<Task> {
        let conn = self.session.connection();
        conn.execute(
            "INSERT INTO tasks (title, due_date, is_complete) VALUES (?1, ?2, ?3)",
            params![title, due_date, is_complete],
        )?;
        Ok(Task {
            id: conn.last_insert_rowid(),
            title: title.to_string(),
            due_date,
            is_complete,
            assigned_to: None,
        })
    }

    fn find_task(&self, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1");
        let task = self
            .session
            .connection()
            .query_row(&sql, [id], task_from_row)
            .optional()?;
        Ok(task)
    }

    fn assign_task(&mut self, task_id: i64, user_id: i64) -> Result<Task> {
        if self.find_user(user_id)?.is_none() {
            return Err(RepositoryError::NotFound {
                entity: "user",
                id: user_id,
            });
        }

        let changed = self.session.connection().execute(
            "UPDATE tasks SET assigned_to = ?1 WHERE task_id = ?2",
            [user_id, task_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "task",
                id: task_id,
            });
        }
        self.require_task(task_id)
    }

    fn incomplete_tasks_for(&self, first_name: &str) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks t JOIN users u ON u.user_id = t.assigned_to \
             WHERE t.is_complete = 0 AND u.first_name = ?1 ORDER BY t.task_id",
            TASK_COLUMNS
                .split(", ")
                .map(|c| format!("t.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.query_tasks(&sql, [first_name])
    }

    fn first_task(&self) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY task_id LIMIT 1");
        Ok(self.query_tasks(&sql, [])?.into_iter().next())
    }

    fn update_due_date(&mut self, task_id: i64, due_date: NaiveDate) -> Result<Task> {
        let changed = self.session.connection().execute(
            "UPDATE tasks SET due_date = ?1 WHERE task_id = ?2",
            params![due_date, task_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "task",
                id: task_id,
            });
        }
        self.require_task(task_id)
    }

    fn delete_tasks_due_before(&mut self, date: NaiveDate) -> Result<Vec<Task>> {
        let tx = self.session.connection_mut().transaction()?;

        let doomed = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE due_date < ?1 ORDER BY task_id"
            ))?;
            let rows = stmt
                .query_map([date], task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        tx.execute("DELETE FROM tasks WHERE due_date < ?1", [date])?;
        tx.commit()?;

        log::debug!("Deleted {} tasks due before {date}", doomed.len());
        Ok(doomed)
    }

    fn all_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY task_id");
        self.query_tasks(&sql, [])
    }
}
