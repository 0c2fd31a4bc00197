//! Task entity
//!
//! A task has an allotted duration and a running elapsed duration, both in
//! whole days. Status, due date, end date and lateness are derived from those
//! two numbers and the start date; none of them is stored.

use chrono::{DateTime, Duration, Utc};
use infra_db::{Entity, Include, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::task_list::TaskList;

/// Derived state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Closed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work tracked against a time allowance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    /// Caller-assigned identifier
    pub id: String,
    /// Owning task list, if any
    pub task_list_id: Option<i64>,
    pub task_name: String,
    pub task_description: String,
    pub start_date: DateTime<Utc>,
    pub date_created: DateTime<Utc>,
    /// Days allowed for the task
    pub allotted_time: i32,
    /// Days spent so far
    pub elapsed_time: i32,
    /// `false` while pending, `true` once closed
    pub task_status: bool,
    /// Populated by [`Task::task_list_include`]
    #[sqlx(skip)]
    #[serde(skip)]
    pub task_list: Option<TaskList>,
}

impl Task {
    pub const TASK_LIST_ID: &'static str = "task_list_id";
    pub const TASK_NAME: &'static str = "task_name";
    pub const TASK_DESCRIPTION: &'static str = "task_description";
    pub const START_DATE: &'static str = "start_date";
    pub const DATE_CREATED: &'static str = "date_created";
    pub const ALLOTTED_TIME: &'static str = "allotted_time";
    pub const ELAPSED_TIME: &'static str = "elapsed_time";
    pub const TASK_STATUS: &'static str = "task_status";

    /// Creates a pending task with nothing elapsed
    pub fn new(
        id: impl Into<String>,
        task_name: impl Into<String>,
        task_description: impl Into<String>,
        start_date: DateTime<Utc>,
        allotted_time: i32,
    ) -> Self {
        Self {
            id: id.into(),
            task_list_id: None,
            task_name: task_name.into(),
            task_description: task_description.into(),
            start_date,
            date_created: Utc::now(),
            allotted_time,
            elapsed_time: 0,
            task_status: false,
            task_list: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        if self.task_status {
            TaskStatus::Closed
        } else {
            TaskStatus::Pending
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task_status
    }

    /// Start date plus the allotted days
    pub fn due_date(&self) -> DateTime<Utc> {
        self.start_date + Duration::days(i64::from(self.allotted_time))
    }

    /// Start date plus the elapsed days
    pub fn end_date(&self) -> DateTime<Utc> {
        self.start_date + Duration::days(i64::from(self.elapsed_time))
    }

    /// Days spent beyond the allowance; always 0 once closed
    pub fn days_overdue(&self) -> i32 {
        if self.task_status {
            0
        } else {
            (self.elapsed_time - self.allotted_time).max(0)
        }
    }

    /// Unused allowance of a closed task; always 0 while pending
    pub fn days_late(&self) -> i32 {
        if self.task_status {
            (self.allotted_time - self.elapsed_time).max(0)
        } else {
            0
        }
    }

    /// Marks the task closed after `elapsed_time` days
    pub fn close(&mut self, elapsed_time: i32) {
        self.elapsed_time = elapsed_time;
        self.task_status = true;
    }

    /// Eager load of the owning [`TaskList`] into [`Task::task_list`]
    pub fn task_list_include() -> Include<Task> {
        Include::belongs_to::<TaskList>("task_list", owning_list_id, owning_list)
    }
}

fn owning_list_id(task: &Task) -> Option<i64> {
    task.task_list_id
}

fn owning_list(task: &mut Task) -> &mut Option<TaskList> {
    &mut task.task_list
}

impl Entity for Task {
    type Key = String;

    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        Self::TASK_LIST_ID,
        Self::TASK_NAME,
        Self::TASK_DESCRIPTION,
        Self::START_DATE,
        Self::DATE_CREATED,
        Self::ALLOTTED_TIME,
        Self::ELAPSED_TIME,
        Self::TASK_STATUS,
    ];

    fn key(&self) -> Option<String> {
        Some(self.id.clone())
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }

    fn value(&self, column: &str) -> Value {
        match column {
            Self::TASK_LIST_ID => self.task_list_id.into(),
            Self::TASK_NAME => self.task_name.as_str().into(),
            Self::TASK_DESCRIPTION => self.task_description.as_str().into(),
            Self::START_DATE => self.start_date.to_rfc3339().into(),
            Self::DATE_CREATED => self.date_created.to_rfc3339().into(),
            Self::ALLOTTED_TIME => self.allotted_time.into(),
            Self::ELAPSED_TIME => self.elapsed_time.into(),
            Self::TASK_STATUS => self.task_status.into(),
            _ => Value::Null,
        }
    }
}
