//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for entities and pages that give
//! more meaningful error messages than standard assertions.

use domain_task::Task;
use infra_db::{DataError, PagedList};

/// Asserts that two tasks hold the same persisted values
///
/// Navigation fields are ignored.
///
/// # Panics
///
/// Panics naming the first column that differs
pub fn assert_same_task(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "id mismatch");
    assert_eq!(actual.task_list_id, expected.task_list_id, "task_list_id mismatch for {}", expected.id);
    assert_eq!(actual.task_name, expected.task_name, "task_name mismatch for {}", expected.id);
    assert_eq!(
        actual.task_description, expected.task_description,
        "task_description mismatch for {}",
        expected.id
    );
    assert_eq!(actual.start_date, expected.start_date, "start_date mismatch for {}", expected.id);
    assert_eq!(actual.date_created, expected.date_created, "date_created mismatch for {}", expected.id);
    assert_eq!(actual.allotted_time, expected.allotted_time, "allotted_time mismatch for {}", expected.id);
    assert_eq!(actual.elapsed_time, expected.elapsed_time, "elapsed_time mismatch for {}", expected.id);
    assert_eq!(actual.task_status, expected.task_status, "task_status mismatch for {}", expected.id);
}

/// Asserts that a list of tasks carries exactly `expected` ids, in order
pub fn assert_task_ids(tasks: &[Task], expected: &[&str]) {
    let actual: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(actual, expected, "Unexpected task ids");
}

/// Asserts the shape of a page
pub fn assert_page<T>(page: &PagedList<T>, index: u32, len: usize, total: u64) {
    assert_eq!(page.page_index, index, "Unexpected page index");
    assert_eq!(page.items.len(), len, "Unexpected number of items on page {index}");
    assert_eq!(page.total_count, total, "Unexpected total count");
}

/// Asserts that a result failed with an invalid argument
pub fn assert_invalid_argument<T: std::fmt::Debug>(result: Result<T, DataError>) {
    match result {
        Err(err) if err.is_invalid_argument() => {}
        other => panic!("Expected an invalid argument error, got {other:?}"),
    }
}
