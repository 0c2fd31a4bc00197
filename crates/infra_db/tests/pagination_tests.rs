//! Paging integration tests

use domain_task::Task;
use infra_db::{Filter, OrderBy, QueryOptions, SnapshotReader, TrackedReader};
use proptest::prelude::*;
use test_utils::{
    assert_invalid_argument, assert_page, assert_task_ids, init_test_tracing, page_strategy,
    TaskFixtures, TestDatabase,
};

fn by_number() -> OrderBy<Task> {
    OrderBy::asc(|t: &Task| t.id.parse::<u32>().unwrap_or(u32::MAX))
}

async fn seeded(count: u32) -> TestDatabase {
    init_test_tracing();
    let db = TestDatabase::new().await.unwrap();
    let uow = db.unit_of_work().await.unwrap();
    uow.repository::<Task>()
        .unwrap()
        .add_range(TaskFixtures::numbered(count))
        .unwrap();
    uow.complete().await.unwrap();
    db
}

#[tokio::test]
async fn test_second_page_of_twenty_five() {
    let db = seeded(25).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let page = tasks
        .get_page(2, 10, by_number(), None, vec![])
        .unwrap()
        .to_list()
        .await
        .unwrap();
    assert_task_ids(
        &page,
        &["11", "12", "13", "14", "15", "16", "17", "18", "19", "20"],
    );

    let last = tasks
        .get_page(3, 10, by_number(), None, vec![])
        .unwrap()
        .to_list()
        .await
        .unwrap();
    assert_task_ids(&last, &["21", "22", "23", "24", "25"]);

    let beyond = tasks
        .get_page(4, 10, by_number(), None, vec![])
        .unwrap()
        .to_list()
        .await
        .unwrap();
    assert!(beyond.is_empty());
}

#[tokio::test]
async fn test_paged_list_reports_totals() {
    let db = seeded(25).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let list = tasks.get_paged_list(2, 10, by_number(), None, vec![]).await.unwrap();
    assert_page(&list, 2, 10, 25);
    assert_eq!(list.total_pages(), 3);
    assert!(list.has_next());
    assert!(list.has_previous());

    let open = tasks
        .get_paged_list(1, 4, by_number(), Some(Filter::new(|t: &Task| !t.task_status)), vec![])
        .await
        .unwrap();
    assert_page(&open, 1, 4, 19);
    assert_task_ids(&open.items, &["1", "2", "3", "5"]);
    assert!(!open.has_previous());
}

#[tokio::test]
async fn test_paging_rejects_bad_descriptors() {
    let db = seeded(3).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    assert_invalid_argument(tasks.get_page(0, 10, by_number(), None, vec![]));
    assert_invalid_argument(tasks.get_page(1, 0, by_number(), None, vec![]));
    assert_invalid_argument(tasks.filter(QueryOptions::new().page(1, 2)).await);
    assert_invalid_argument(tasks.query().to_paged_list().await);
}

#[tokio::test]
async fn test_count_of_paged_query_counts_the_page() {
    let db = seeded(7).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let query = tasks.get_page(2, 5, by_number(), None, vec![]).unwrap();
    assert_eq!(query.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_paging_untracked_query() {
    let db = seeded(12).await;
    let uow = db.unit_of_work().await.unwrap();
    let tasks = uow.repository::<Task>().unwrap();

    let page = tasks
        .query_no_tracking()
        .order_by(OrderBy::desc(|t: &Task| t.id.parse::<u32>().unwrap_or(0)))
        .page(1, 3)
        .unwrap()
        .to_list()
        .await
        .unwrap();
    assert_task_ids(&page, &["12", "11", "10"]);
    assert!(!uow.has_changes());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_pages_concatenate_to_ordered_results(count in 0u32..30, size in 1u32..9) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = seeded(count).await;
            let uow = db.unit_of_work().await.unwrap();
            let tasks = uow.repository::<Task>().unwrap();

            let ordered: Vec<String> = tasks
                .query_no_tracking()
                .order_by(by_number())
                .to_list()
                .await
                .unwrap()
                .into_iter()
                .map(|t| t.id)
                .collect();

            let pages = count.div_ceil(size) + 1;
            let mut concatenated = Vec::new();
            for index in 1..=pages {
                let page = tasks
                    .get_page(index, size, by_number(), None, vec![])
                    .unwrap()
                    .to_list()
                    .await
                    .unwrap();
                prop_assert!(page.len() <= size as usize);
                concatenated.extend(page.into_iter().map(|t| t.id));
            }
            prop_assert_eq!(concatenated, ordered);
            Ok(())
        })?;
    }

    #[test]
    fn prop_paged_list_metadata_matches_seeded_rows((index, size) in page_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = seeded(20).await;
            let uow = db.unit_of_work().await.unwrap();
            let list = uow
                .repository::<Task>()
                .unwrap()
                .get_paged_list(index, size, by_number(), None, vec![])
                .await
                .unwrap();

            let skip = ((index - 1) * size) as usize;
            let expected = 20usize.saturating_sub(skip).min(size as usize);
            prop_assert_eq!(list.total_count, 20);
            prop_assert_eq!(list.items.len(), expected);
            prop_assert_eq!(list.has_previous(), index > 1);
            prop_assert_eq!(list.has_next(), u64::from(index) < list.total_pages());
            Ok(())
        })?;
    }
}
