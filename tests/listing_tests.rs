mod common;

use common::day;
use daylog::{list_dates, list_day, list_files};
use std::fs;
use tempfile::tempdir;

fn populate(dir: &std::path::Path) {
    for name in [
        "2024-01-01.0.log",
        "2024-01-01.1.log",
        "2024-01-01.10.log",
        "2024-01-01.2.log",
        "2024-01-02.0.log",
        "2023-12-31.4.log",
        "2024-01-01.0.txt",
        "notes.md",
    ] {
        fs::write(dir.join(name), name).unwrap();
    }
    fs::create_dir(dir.join("2024-01-01.3.log")).unwrap();
}

#[test]
fn test_list_day_orders_by_numeric_index() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let files = list_day(dir.path(), "log", day(2024, 1, 1)).unwrap();
    let indices: Vec<u32> = files.iter().map(|f| f.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 10]);
    assert!(files.iter().all(|f| f.date == day(2024, 1, 1)));
    assert_eq!(files[0].len, "2024-01-01.0.log".len() as u64);
}

#[test]
fn test_list_files_ignores_foreign_names_and_directories() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let files = list_files(dir.path(), "log").unwrap();
    assert_eq!(files.len(), 6);
    assert_eq!(files[0].date, day(2023, 12, 31));

    let txt = list_files(dir.path(), "txt").unwrap();
    assert_eq!(txt.len(), 1);
}

#[test]
fn test_list_dates_is_distinct_and_sorted() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    assert_eq!(
        list_dates(dir.path(), "log").unwrap(),
        vec![day(2023, 12, 31), day(2024, 1, 1), day(2024, 1, 2)]
    );
}

#[test]
fn test_missing_directory_lists_nothing() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("never-created");
    assert!(list_day(&missing, "log", day(2024, 1, 1)).unwrap().is_empty());
    assert!(list_dates(&missing, "log").unwrap().is_empty());
}
