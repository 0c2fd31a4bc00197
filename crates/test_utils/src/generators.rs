//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{DateTime, Duration, TimeZone, Utc};
use domain_task::Task;
use proptest::prelude::*;

/// Strategy for generating start dates within 2024
pub fn start_date_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..366, 0i64..24).prop_map(|(days, hours)| {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + Duration::days(days)
            + Duration::hours(hours)
    })
}

/// Strategy for generating non-negative day counts
pub fn days_strategy() -> impl Strategy<Value = i32> {
    0i32..120
}

/// Strategy for generating a task with the given id
pub fn task_strategy(id: String) -> impl Strategy<Value = Task> {
    (
        "[A-Za-z ]{1,24}",
        start_date_strategy(),
        days_strategy(),
        days_strategy(),
        any::<bool>(),
    )
        .prop_map(move |(name, start_date, allotted, elapsed, closed)| Task {
            id: id.clone(),
            task_list_id: None,
            task_name: name,
            task_description: String::new(),
            start_date,
            date_created: start_date,
            allotted_time: allotted,
            elapsed_time: elapsed,
            task_status: closed,
            task_list: None,
        })
}

/// Strategy for generating up to `max` tasks with unique ids `"1"..="n"`
pub fn tasks_strategy(max: usize) -> impl Strategy<Value = Vec<Task>> {
    (0..=max).prop_flat_map(|count| {
        (1..=count)
            .map(|n| task_strategy(n.to_string()))
            .collect::<Vec<_>>()
    })
}

/// Strategy for generating valid `(page_index, page_size)` descriptors
pub fn page_strategy() -> impl Strategy<Value = (u32, u32)> {
    (1u32..8, 1u32..12)
}
