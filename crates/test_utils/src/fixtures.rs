//! Pre-built Test Fixtures
//!
//! Ready-to-use tasks and task lists with fixed values, so assertions can
//! compare against known data.

use chrono::{DateTime, Duration, TimeZone, Utc};
use domain_task::{Task, TaskList};

/// Fixture for dates used across tests
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Start date of the fixture tasks
    pub fn task_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    /// Creation timestamp of the fixture tasks
    pub fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 30, 0).unwrap()
    }
}

/// Fixture for task data
pub struct TaskFixtures;

impl TaskFixtures {
    /// `Task { id: "1", allotted_time: 5, elapsed_time: 2 }`
    pub fn task_one() -> Task {
        Task {
            id: "1".to_string(),
            task_list_id: None,
            task_name: "Prepare release notes".to_string(),
            task_description: "Collect merged changes for the release".to_string(),
            start_date: TemporalFixtures::task_start(),
            date_created: TemporalFixtures::created_at(),
            allotted_time: 5,
            elapsed_time: 2,
            task_status: false,
            task_list: None,
        }
    }

    /// A pending task that has run past its allowance
    pub fn overdue_task() -> Task {
        Task {
            id: "overdue".to_string(),
            elapsed_time: 9,
            allotted_time: 4,
            ..Self::task_one()
        }
    }

    /// A task closed before its allowance ran out
    pub fn closed_task() -> Task {
        Task {
            id: "closed".to_string(),
            elapsed_time: 3,
            allotted_time: 5,
            task_status: true,
            ..Self::task_one()
        }
    }

    /// `count` tasks with ids `"1"..="count"`, started one day apart
    pub fn numbered(count: u32) -> Vec<Task> {
        (1..=count)
            .map(|n| Task {
                id: n.to_string(),
                task_name: format!("Task {n}"),
                start_date: TemporalFixtures::task_start() + Duration::days(i64::from(n)),
                allotted_time: (n % 7) as i32 + 1,
                elapsed_time: (n % 3) as i32,
                task_status: n % 4 == 0,
                ..Self::task_one()
            })
            .collect()
    }
}

/// Fixture for task list data
pub struct TaskListFixtures;

impl TaskListFixtures {
    /// A list without a key, ready to be inserted
    pub fn backlog() -> TaskList {
        TaskList::new("Backlog")
    }

    pub fn sprint(number: u32) -> TaskList {
        TaskList::new(format!("Sprint {number}"))
    }
}
