//! Task list entity

use infra_db::{Entity, Include, Value};
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// A named group of tasks; the store assigns the key on insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskList {
    pub id: Option<i64>,
    pub name: String,
    /// Populated by [`TaskList::tasks_include`]
    #[sqlx(skip)]
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskList {
    pub const NAME: &'static str = "name";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Eager load of every task whose `task_list_id` points at this list
    pub fn tasks_include() -> Include<TaskList> {
        Include::has_many::<Task>("tasks", Task::TASK_LIST_ID, list_tasks)
    }
}

fn list_tasks(list: &mut TaskList) -> &mut Vec<Task> {
    &mut list.tasks
}

impl Entity for TaskList {
    type Key = i64;

    const TABLE: &'static str = "task_lists";
    const COLUMNS: &'static [&'static str] = &[Self::NAME];
    const GENERATED_KEY: bool = true;

    fn key(&self) -> Option<i64> {
        self.id
    }

    fn set_key(&mut self, key: i64) {
        self.id = Some(key);
    }

    fn value(&self, column: &str) -> Value {
        match column {
            Self::NAME => self.name.as_str().into(),
            _ => Value::Null,
        }
    }
}
