//! Repository integration tests against a temporary SQLite database

use chrono::{TimeZone, Utc};
use domain_task::{Task, TaskList};
use infra_db::{
    DataError, EntityState, Filter, OrderBy, QueryOptions, RawSql, SnapshotReader, TrackedReader,
};
use proptest::prelude::*;
use test_utils::{
    assert_invalid_argument, assert_same_task, assert_task_ids, init_test_tracing, tasks_strategy,
    TaskBuilder, TaskFixtures, TaskListBuilder, TaskListFixtures, TestDatabase,
};

async fn seeded(tasks: Vec<Task>) -> TestDatabase {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    uow.repository::<Task>().unwrap().add_range(tasks).unwrap();
    uow.complete().await.unwrap();
    db
}

#[tokio::test]
async fn test_added_task_round_trips() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let task = TaskFixtures::task_one();

    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();
    tasks.add(task.clone()).unwrap();
    assert_eq!(db.count_rows("tasks").await.unwrap(), 0, "add only stages");
    assert!(uow.complete().await.unwrap());
    drop(uow);

    let uow = db.unit_of_work().await.unwrap();
    let loaded = uow
        .repository::<Task>()
        .unwrap()
        .get(&"1".to_string())
        .await
        .unwrap()
        .expect("task 1 should exist");
    assert_same_task(&loaded, &task);
    assert_eq!(loaded.allotted_time, 5);
    assert_eq!(loaded.elapsed_time, 2);
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let db = seeded(TaskFixtures::numbered(3)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    assert!(tasks.get(&"404".to_string()).await.unwrap().is_none());
    assert!(tasks.get_no_tracking(&"404".to_string()).await.unwrap().is_none());
    assert!(tasks.get_where(|t: &Task| t.allotted_time > 100).await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_and_last_or_default() {
    let db = seeded(TaskFixtures::numbered(6)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let closed = Some(Filter::new(|t: &Task| t.task_status));
    let first = tasks.get_first_or_default(closed.clone(), vec![]).await.unwrap();
    assert_eq!(first.map(|t| t.id), Some("4".to_string()));

    let last = tasks
        .get_last_or_default(Some(Filter::new(|t: &Task| t.elapsed_time == 1)), vec![])
        .await
        .unwrap();
    assert_eq!(last.map(|t| t.id), Some("4".to_string()));

    let none = tasks
        .get_first_or_default(Some(Filter::new(|t: &Task| t.id == "missing")), vec![])
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_count_any_and_exist() {
    let db = seeded(TaskFixtures::numbered(10)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    assert_eq!(tasks.count(None).await.unwrap(), 10);
    assert_eq!(
        tasks.count(Some(Filter::new(|t: &Task| t.task_status))).await.unwrap(),
        2
    );
    assert!(tasks.any(None, vec![]).await.unwrap());
    assert!(!tasks
        .any(Some(Filter::new(|t: &Task| t.allotted_time > 7)), vec![])
        .await
        .unwrap());
    assert!(tasks.exist(|t: &Task| t.id == "7").await.unwrap());
    assert!(!tasks.exist(|t: &Task| t.id == "70").await.unwrap());
}

#[tokio::test]
async fn test_filter_applies_options_in_order() {
    let db = seeded(TaskFixtures::numbered(12)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let options = QueryOptions::new()
        .matching(|t: &Task| !t.task_status)
        .order_by(OrderBy::desc(|t: &Task| t.id.parse::<u32>().unwrap_or(0)))
        .page(1, 3);
    let page = tasks.filter(options).await.unwrap();
    assert_task_ids(&page, &["11", "10", "9"]);

    let unpaged = tasks
        .filter(QueryOptions::new().matching(|t: &Task| t.task_status))
        .await
        .unwrap();
    assert_eq!(unpaged.len(), 3);
}

#[tokio::test]
async fn test_update_persists_every_column() {
    let db = seeded(vec![TaskFixtures::task_one()]).await;

    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();
    let mut task = tasks.get(&"1".to_string()).await.unwrap().unwrap();
    task.task_name = "Renamed".to_string();
    task.close(4);
    tasks.update(task.clone()).unwrap();
    assert_eq!(tasks.state_of(&task).unwrap(), Some(EntityState::Modified));
    assert!(uow.complete().await.unwrap());
    assert_eq!(tasks.state_of(&task).unwrap(), Some(EntityState::Unchanged));
    drop(uow);

    let uow = db.unit_of_work().await.unwrap();
    let stored = uow
        .repository::<Task>()
        .unwrap()
        .get_no_tracking(&"1".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_same_task(&stored, &task);
}

#[tokio::test]
async fn test_partial_save_touches_only_named_columns() {
    let original = TaskFixtures::task_one();
    let db = seeded(vec![original.clone()]).await;

    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();
    let mut task = tasks.get(&"1".to_string()).await.unwrap().unwrap();
    task.elapsed_time = 4;
    task.task_name = "Not saved".to_string();

    let rows = tasks.save_changes(task.clone(), &[Task::ELAPSED_TIME]).await.unwrap();
    assert_eq!(rows, 1);
    assert_eq!(tasks.state_of(&task).unwrap(), None, "saved entity is detached");
    drop(uow);

    let uow = db.unit_of_work().await.unwrap();
    let stored = uow
        .repository::<Task>()
        .unwrap()
        .get_no_tracking(&"1".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.elapsed_time, 4);
    assert_eq!(stored.task_name, original.task_name);
    assert_eq!(stored.allotted_time, original.allotted_time);
}

#[tokio::test]
async fn test_partial_save_rejects_unknown_column() {
    let db = seeded(vec![TaskFixtures::task_one()]).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    assert_invalid_argument(tasks.save_changes(TaskFixtures::task_one(), &["id"]).await);
    assert_invalid_argument(tasks.save_changes(TaskFixtures::task_one(), &[]).await);
}

#[tokio::test]
async fn test_partial_save_leaves_other_staged_changes_alone() {
    let db = seeded(vec![TaskFixtures::task_one()]).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    tasks.add(TaskBuilder::new().with_id("staged").build()).unwrap();
    let mut task = TaskFixtures::task_one();
    task.elapsed_time = 3;
    tasks.save_changes(task, &[Task::ELAPSED_TIME]).await.unwrap();

    assert!(uow.has_changes());
    assert_eq!(db.count_rows("tasks").await.unwrap(), 1);
}

#[tokio::test]
async fn test_add_range_is_all_or_nothing_on_store_failure() {
    let db = seeded(vec![TaskBuilder::new().with_id("3").build()]).await;

    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();
    let batch: Vec<Task> = ["1", "2", "3", "4"]
        .into_iter()
        .map(|id| TaskBuilder::new().with_id(id).build())
        .collect();
    tasks.add_range(batch).unwrap();

    let err = uow.complete().await.unwrap_err();
    assert!(err.is_store_failure());
    assert!(err.is_unique_violation(), "unexpected error: {err}");
    assert!(uow.has_changes(), "failed commit keeps changes staged");
    drop(uow);

    assert_eq!(db.count_rows("tasks").await.unwrap(), 1);
    let uow = db.unit_of_work().await.unwrap();
    let ids: Vec<String> = uow
        .repository::<Task>()
        .unwrap()
        .get_all_no_tracking()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec!["3".to_string()]);
}

#[tokio::test]
async fn test_add_range_rejected_at_staging_stages_nothing() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let duplicate = TaskBuilder::new().with_id("2").build();
    let result = tasks.add_range(vec![
        TaskBuilder::new().with_id("1").build(),
        duplicate.clone(),
        duplicate,
    ]);
    assert_invalid_argument(result);
    assert!(!uow.has_changes());
    assert!(!uow.complete().await.unwrap());
}

#[tokio::test]
async fn test_remove_and_remove_range() {
    let db = seeded(TaskFixtures::numbered(5)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let all = tasks.get_all().await.unwrap();
    tasks.remove(&all[0]).unwrap();
    tasks.remove_range(&all[3..]).unwrap();
    assert_eq!(tasks.state_of(&all[0]).unwrap(), Some(EntityState::Deleted));
    assert!(uow.complete().await.unwrap());

    assert_eq!(db.count_rows("tasks").await.unwrap(), 2);
    assert_eq!(tasks.state_of(&all[0]).unwrap(), None);
}

#[tokio::test]
async fn test_update_of_missing_row_is_concurrency_conflict() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    tasks.update(TaskBuilder::new().with_id("ghost").build()).unwrap();
    let err = uow.complete().await.unwrap_err();
    assert!(matches!(
        err,
        DataError::ConcurrencyConflict { entity: "Task", ref key } if key == "ghost"
    ));
}

#[tokio::test]
async fn test_update_range() {
    let db = seeded(TaskFixtures::numbered(3)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let closed: Vec<Task> = tasks
        .get_all()
        .await
        .unwrap()
        .into_iter()
        .map(|mut t| {
            t.close(1);
            t
        })
        .collect();
    tasks.update_range(closed).unwrap();
    uow.complete().await.unwrap();

    assert_eq!(tasks.count(Some(Filter::new(|t: &Task| t.task_status))).await.unwrap(), 3);
}

#[tokio::test]
async fn test_no_tracking_results_are_isolated() {
    let db = seeded(TaskFixtures::numbered(4)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let mut snapshots = tasks.get_all_no_tracking().await.unwrap();
    for snapshot in &mut snapshots {
        snapshot.task_name = "mutated".to_string();
        snapshot.elapsed_time = 99;
    }
    assert_eq!(tasks.state_of(&snapshots[0]).unwrap(), None);

    let tracked = tasks.get_all().await.unwrap();
    assert!(tracked.iter().all(|t| t.task_name != "mutated" && t.elapsed_time != 99));
    assert!(!uow.has_changes());
    assert!(!uow.complete().await.unwrap());
}

#[tokio::test]
async fn test_tracked_read_returns_staged_instance() {
    let db = seeded(vec![TaskFixtures::task_one()]).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let mut task = tasks.get(&"1".to_string()).await.unwrap().unwrap();
    task.elapsed_time = 8;
    tasks.update(task).unwrap();

    let tracked = tasks.find(|t: &Task| t.id == "1").await.unwrap();
    assert_eq!(tracked[0].elapsed_time, 8);

    let snapshot = tasks.find_no_tracking(|t: &Task| t.id == "1").await.unwrap();
    assert_eq!(snapshot[0].elapsed_time, 2);
}

#[tokio::test]
async fn test_detach_stops_tracking() {
    let db = seeded(vec![TaskFixtures::task_one()]).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let task = tasks.get(&"1".to_string()).await.unwrap().unwrap();
    assert_eq!(tasks.state_of(&task).unwrap(), Some(EntityState::Unchanged));
    assert!(tasks.detach(&task).unwrap());
    assert!(!tasks.detach(&task).unwrap());
    assert_eq!(tasks.state_of(&task).unwrap(), None);
}

#[tokio::test]
async fn test_add_and_return_id_commits_only_that_entity() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();
    let lists = uow.repository::<TaskList>().unwrap();

    tasks.add(TaskFixtures::task_one()).unwrap();
    let first = lists.add_and_return_id(TaskListFixtures::backlog()).await.unwrap();
    let second = lists.add_and_return_id(TaskListFixtures::sprint(1)).await.unwrap();
    assert_ne!(first, second);

    assert_eq!(db.count_rows("task_lists").await.unwrap(), 2);
    assert_eq!(db.count_rows("tasks").await.unwrap(), 0);
    assert!(uow.has_changes());

    let stored = lists.get(&first).await.unwrap().unwrap();
    assert_eq!(stored.name, "Backlog");
}

#[tokio::test]
async fn test_includes_load_related_entities() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    let lists = uow.repository::<TaskList>().unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let backlog = lists.add_and_return_id(TaskListFixtures::backlog()).await.unwrap();
    let empty = lists
        .add_and_return_id(TaskListBuilder::new().with_name("Someday").build())
        .await
        .unwrap();
    tasks
        .add_range(vec![
            TaskBuilder::new().with_id("a").in_list(backlog).build(),
            TaskBuilder::new().with_id("b").in_list(backlog).build(),
            TaskBuilder::new().with_id("c").build(),
        ])
        .unwrap();
    uow.complete().await.unwrap();

    let loaded = lists
        .query_no_tracking()
        .include(TaskList::tasks_include())
        .order_by(OrderBy::asc(|l: &TaskList| l.id))
        .to_list()
        .await
        .unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, Some(backlog));
    assert_task_ids(&loaded[0].tasks, &["a", "b"]);
    assert_eq!(loaded[1].id, Some(empty));
    assert!(loaded[1].tasks.is_empty());

    let with_list = tasks
        .get_all_no_tracking()
        .await
        .unwrap();
    assert!(with_list.iter().all(|t| t.task_list.is_none()), "no include, no navigation");

    let with_list = tasks
        .query()
        .include(Task::task_list_include())
        .filter(|t: &Task| t.task_list.as_ref().is_some_and(|l| l.name == "Backlog"))
        .to_list()
        .await
        .unwrap();
    assert_eq!(with_list.len(), 2);
    assert!(with_list.iter().all(|t| t.task_list.is_some()));
}

#[tokio::test]
async fn test_raw_sql_maps_rows() {
    let db = seeded(TaskFixtures::numbered(6)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let long: Vec<Task> = tasks
        .execute_sql_query(RawSql::new("SELECT * FROM tasks WHERE allotted_time >= ? ORDER BY id").bind(5))
        .await
        .unwrap();
    assert_task_ids(&long, &["4", "5", "6"]);

    let one: Option<Task> = tasks
        .execute_sql_query_single(RawSql::new("SELECT * FROM tasks WHERE id = ?").bind("2"))
        .await
        .unwrap();
    assert_eq!(one.map(|t| t.id), Some("2".to_string()));

    let count: Option<(i64,)> = tasks
        .execute_sql_query_single(RawSql::new("SELECT COUNT(*) FROM tasks WHERE task_status = ?").bind(true))
        .await
        .unwrap();
    assert_eq!(count, Some((1,)));
    assert!(!uow.has_changes(), "raw results are not tracked");
}

#[tokio::test]
async fn test_raw_sql_rejects_unparameterised_input() {
    let db = seeded(TaskFixtures::numbered(2)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let err = tasks
        .execute_sql_query::<Task>(RawSql::new("SELECT * FROM tasks WHERE id = '1' OR 1=1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidSql(_)));

    let err = tasks
        .execute_sql_query::<Task>(RawSql::new("DELETE FROM tasks; SELECT * FROM tasks"))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidSql(_)));
    assert_eq!(db.count_rows("tasks").await.unwrap(), 2);
}

#[tokio::test]
async fn test_builder_columns_are_stored() {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
    let built = TaskBuilder::new()
        .with_id("docs")
        .with_description("Rewrite the onboarding guide")
        .with_start_date(start)
        .build();
    let db = seeded(vec![built.clone()]).await;
    let uow = db.unit_of_work().await.unwrap();

    let stored = uow
        .repository::<Task>()
        .unwrap()
        .get_no_tracking(&"docs".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.task_description, "Rewrite the onboarding guide");
    assert_eq!(stored.start_date, start);
    assert_same_task(&stored, &built);
}

#[tokio::test]
async fn test_failed_add_and_return_id_leaves_nothing_staged() {
    let db = seeded(vec![TaskBuilder::new().with_id("dup").build()]).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let err = tasks
        .add_and_return_id(TaskBuilder::new().with_id("dup").build())
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
    assert!(!uow.has_changes());

    tasks.add(TaskBuilder::new().with_id("fresh").build()).unwrap();
    assert!(uow.complete().await.unwrap());
    assert_eq!(db.count_rows("tasks").await.unwrap(), 2);
}

#[tokio::test]
async fn test_failed_add_and_return_id_of_generated_key_leaves_nothing_staged() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let seed = db.unit_of_work().await.unwrap();
    let id = seed
        .repository::<TaskList>()
        .unwrap()
        .add_and_return_id(TaskListFixtures::backlog())
        .await
        .unwrap();
    drop(seed);

    let uow = db.unit_of_work().await.unwrap();
    let lists = uow.repository::<TaskList>().unwrap();
    let clash = TaskListBuilder::new().with_id(id).build();
    let err = lists.add_and_return_id(clash.clone()).await.unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
    assert_eq!(lists.state_of(&clash).unwrap(), None);
    assert!(!uow.has_changes());

    uow.repository::<Task>()
        .unwrap()
        .add(TaskFixtures::closed_task())
        .unwrap();
    assert!(uow.complete().await.unwrap());
    assert_eq!(db.count_rows("task_lists").await.unwrap(), 1);
    assert_eq!(db.count_rows("tasks").await.unwrap(), 1);
    assert_eq!(lists.get(&id).await.unwrap().unwrap().name, "Backlog");
}

#[tokio::test]
async fn test_failed_partial_save_of_untracked_entity_leaves_nothing_staged() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let task = TaskFixtures::task_one();
    let err = tasks
        .save_changes(task.clone(), &[Task::ELAPSED_TIME])
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::ConcurrencyConflict { entity: "Task", .. }));
    assert_eq!(tasks.state_of(&task).unwrap(), None);
    assert!(!uow.has_changes());

    tasks.add(TaskFixtures::overdue_task()).unwrap();
    assert!(uow.complete().await.unwrap());
    assert_eq!(db.count_rows("tasks").await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_partial_save_keeps_previous_tracking() {
    let db = seeded(vec![TaskFixtures::task_one()]).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let mut task = tasks.get(&"1".to_string()).await.unwrap().unwrap();
    db.clear_data().await.unwrap();

    task.elapsed_time = 6;
    let err = tasks.save_changes(task.clone(), &[Task::ELAPSED_TIME]).await.unwrap_err();
    assert!(matches!(err, DataError::ConcurrencyConflict { .. }));
    assert_eq!(tasks.state_of(&task).unwrap(), Some(EntityState::Unchanged));
    assert!(!uow.has_changes());
}

#[tokio::test]
async fn test_update_range_rejected_at_staging_stages_nothing() {
    let db = seeded(TaskFixtures::numbered(2)).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let first = tasks.get(&"1".to_string()).await.unwrap().unwrap();
    let second = tasks.get(&"2".to_string()).await.unwrap().unwrap();
    tasks.remove(&second).unwrap();

    let mut edited = first.clone();
    edited.elapsed_time = 40;
    assert_invalid_argument(tasks.update_range(vec![edited, second.clone()]));
    assert_eq!(tasks.state_of(&first).unwrap(), Some(EntityState::Unchanged));
    assert_eq!(tasks.state_of(&second).unwrap(), Some(EntityState::Deleted));

    assert!(uow.complete().await.unwrap());
    let stored = tasks.get_all_no_tracking().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_same_task(&stored[0], &first);
}

#[tokio::test]
async fn test_remove_range_rejected_at_staging_stages_nothing() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    let lists = uow.repository::<TaskList>().unwrap();

    let id = lists.add_and_return_id(TaskListFixtures::backlog()).await.unwrap();
    let tracked = lists.get(&id).await.unwrap().unwrap();
    let keyless = TaskListFixtures::sprint(2);

    assert_invalid_argument(lists.remove_range(vec![&tracked, &keyless]));
    assert_eq!(lists.state_of(&tracked).unwrap(), Some(EntityState::Unchanged));
    assert!(!uow.has_changes());
    assert!(!uow.complete().await.unwrap());
    assert_eq!(db.count_rows("task_lists").await.unwrap(), 1);
}

#[tokio::test]
async fn test_tracked_include_tracks_only_returned_parents() {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let seed = db.unit_of_work().await.unwrap();
    let backlog = seed
        .repository::<TaskList>()
        .unwrap()
        .add_and_return_id(TaskListFixtures::backlog())
        .await
        .unwrap();
    let sprint = seed
        .repository::<TaskList>()
        .unwrap()
        .add_and_return_id(TaskListFixtures::sprint(1))
        .await
        .unwrap();
    seed.repository::<Task>()
        .unwrap()
        .add_range(vec![
            TaskBuilder::new().with_id("a").in_list(backlog).build(),
            TaskBuilder::new().with_id("b").in_list(backlog).build(),
            TaskBuilder::new().with_id("c").in_list(sprint).build(),
        ])
        .unwrap();
    seed.complete().await.unwrap();
    drop(seed);

    let uow = db.unit_of_work().await.unwrap();
    let lists = uow.repository::<TaskList>().unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let found = lists
        .query()
        .include(TaskList::tasks_include())
        .filter(|l: &TaskList| l.name == "Backlog")
        .to_list()
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_task_ids(&found[0].tasks, &["a", "b"]);
    assert_eq!(lists.state_of(&found[0]).unwrap(), Some(EntityState::Unchanged));
    for child in &found[0].tasks {
        assert_eq!(tasks.state_of(child).unwrap(), Some(EntityState::Unchanged));
    }

    let other_list = TaskListBuilder::new().with_id(sprint).build();
    let other_child = TaskBuilder::new().with_id("c").build();
    assert_eq!(lists.state_of(&other_list).unwrap(), None);
    assert_eq!(tasks.state_of(&other_child).unwrap(), None);
    assert!(!uow.has_changes());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_exist_matches_find(threshold in 0i32..10, count in 0u32..15) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = seeded(TaskFixtures::numbered(count)).await;
            let uow = db.unit_of_work().await.unwrap();
            let tasks = uow.repository::<Task>().unwrap();

            let exists = tasks.exist(move |t: &Task| t.allotted_time > threshold).await.unwrap();
            let found = tasks.find(move |t: &Task| t.allotted_time > threshold).await.unwrap();
            prop_assert_eq!(exists, !found.is_empty());
            Ok(())
        })?;
    }

    #[test]
    fn prop_generated_tasks_are_stored_unchanged(generated in tasks_strategy(12)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = seeded(generated.clone()).await;
            let uow = db.unit_of_work().await.unwrap();
            let stored = uow
                .repository::<Task>()
                .unwrap()
                .query_no_tracking()
                .order_by(OrderBy::asc(|t: &Task| t.id.parse::<u32>().unwrap_or(u32::MAX)))
                .to_list()
                .await
                .unwrap();

            prop_assert_eq!(stored.len(), generated.len());
            for (actual, expected) in stored.iter().zip(&generated) {
                assert_same_task(actual, expected);
            }
            Ok(())
        })?;
    }
}
