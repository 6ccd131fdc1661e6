mod common;

use rdesk::record::{RecordKind, Value};
use rdesk::view::{ColumnSource, RecordTable};

use common::{FakeBackend, named};

fn names(table: &RecordTable) -> Vec<String> {
    table
        .view()
        .rows
        .iter()
        .map(|r| r.get("name").map(Value::as_text).unwrap_or_default().into_owned())
        .collect()
}

#[test]
fn sort_then_search_without_matches() {
    let backend = FakeBackend::with_records(vec![named(2, "B"), named(1, "A")]);
    let mut table = RecordTable::new(RecordKind::Distributor, ColumnSource::Inferred);
    assert_eq!(table.fetch(&backend).unwrap(), 2);

    table.sort_by("name");
    assert_eq!(names(&table), vec!["A", "B"]);

    table.search("z");
    let view = table.view();
    assert!(view.rows.is_empty());
    assert_eq!(view.total_matches, 0);
    assert_eq!(view.total_pages, 0);
    assert_eq!(view.current_page, 1);
}

#[test]
fn failed_fetch_keeps_the_collection() {
    let mut table = RecordTable::new(RecordKind::Retailer, ColumnSource::Declared);
    table
        .fetch(&FakeBackend::with_records(vec![named(1, "A")]))
        .unwrap();

    assert!(table.fetch(&FakeBackend::failing()).is_err());
    assert_eq!(table.records().len(), 1);
    assert!(!table.is_loading());
}

#[test]
fn failed_delete_leaves_records_untouched() {
    let mut table = RecordTable::new(RecordKind::Retailer, ColumnSource::Inferred);
    let generation = table.begin_fetch();
    table.replace(generation, vec![named(1, "A"), named(2, "B")]);

    assert!(table.delete_record(&FakeBackend::failing(), 1).is_err());
    assert_eq!(table.records().len(), 2);

    let backend = FakeBackend::with_records(vec![named(1, "A"), named(2, "B")]);
    assert!(table.delete_record(&backend, 1).unwrap());
    assert_eq!(names(&table), vec!["B"]);
}

#[test]
fn delete_after_newer_fetch_is_a_noop() {
    let mut table = RecordTable::new(RecordKind::Retailer, ColumnSource::Inferred);
    let first = table.begin_fetch();
    table.replace(first, vec![named(1, "A"), named(2, "B")]);

    // Record 1 was deleted elsewhere and a newer fetch no longer has it.
    let second = table.begin_fetch();
    table.replace(second, vec![named(2, "B")]);
    assert!(!table.remove(1));
    assert_eq!(names(&table), vec!["B"]);
}

#[test]
fn stale_fetch_results_are_dropped() {
    let mut table = RecordTable::new(RecordKind::Retailer, ColumnSource::Inferred);
    let old = table.begin_fetch();
    let new = table.begin_fetch();

    assert!(table.replace(new, vec![named(1, "fresh")]));
    assert!(!table.replace(old, vec![named(1, "stale"), named(2, "stale")]));
    assert_eq!(names(&table), vec!["fresh"]);
}

#[test]
fn paging_past_the_end_is_empty() {
    let records = (1..=12).map(|i| named(i, &format!("n{i}"))).collect();
    let backend = FakeBackend::with_records(records);
    let mut table = RecordTable::new(RecordKind::Retailer, ColumnSource::Inferred);
    table.fetch(&backend).unwrap();

    let view = table.view();
    assert_eq!(view.total_pages, 3);
    assert_eq!(view.rows.len(), 5);

    table.last_page();
    assert_eq!(table.view().rows.len(), 2);
    table.next_page();
    assert_eq!(table.state().current_page(), 3);
}
