//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! random but valid values for everything else.

use chrono::{DateTime, Utc};
use domain_task::{Task, TaskList};
use fake::faker::lorem::en::{Sentence, Words};
use fake::Fake;
use uuid::Uuid;

use crate::fixtures::TemporalFixtures;

/// Builder for constructing test tasks
pub struct TaskBuilder {
    id: String,
    task_list_id: Option<i64>,
    task_name: String,
    task_description: String,
    start_date: DateTime<Utc>,
    date_created: DateTime<Utc>,
    allotted_time: i32,
    elapsed_time: i32,
    task_status: bool,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBuilder {
    /// Creates a new builder with a random id, name and description
    pub fn new() -> Self {
        let name: Vec<String> = Words(2..4).fake();
        Self {
            id: Uuid::new_v4().to_string(),
            task_list_id: None,
            task_name: name.join(" "),
            task_description: Sentence(4..10).fake(),
            start_date: TemporalFixtures::task_start(),
            date_created: TemporalFixtures::created_at(),
            allotted_time: (1..30).fake(),
            elapsed_time: 0,
            task_status: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn in_list(mut self, task_list_id: i64) -> Self {
        self.task_list_id = Some(task_list_id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.task_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.task_description = description.into();
        self
    }

    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn with_allotted_time(mut self, days: i32) -> Self {
        self.allotted_time = days;
        self
    }

    pub fn with_elapsed_time(mut self, days: i32) -> Self {
        self.elapsed_time = days;
        self
    }

    /// Marks the task closed
    pub fn closed(mut self) -> Self {
        self.task_status = true;
        self
    }

    pub fn build(self) -> Task {
        Task {
            id: self.id,
            task_list_id: self.task_list_id,
            task_name: self.task_name,
            task_description: self.task_description,
            start_date: self.start_date,
            date_created: self.date_created,
            allotted_time: self.allotted_time,
            elapsed_time: self.elapsed_time,
            task_status: self.task_status,
            task_list: None,
        }
    }
}

/// Builder for constructing test task lists
pub struct TaskListBuilder {
    id: Option<i64>,
    name: String,
}

impl Default for TaskListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskListBuilder {
    /// Creates a new builder with a random name and no key
    pub fn new() -> Self {
        let words: Vec<String> = Words(1..3).fake();
        Self {
            id: None,
            name: words.join(" "),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn build(self) -> TaskList {
        TaskList {
            id: self.id,
            name: self.name,
            tasks: Vec::new(),
        }
    }
}
