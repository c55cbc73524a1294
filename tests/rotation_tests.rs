mod common;

use common::{day, fixed_clock, log_path, read, start_day};
use daylog::RotatingWriter;
use tempfile::tempdir;

#[tokio::test]
async fn test_new_day_starts_at_index_zero() {
    let dir = tempdir().unwrap();
    let clock = fixed_clock();
    let writer = RotatingWriter::builder(dir.path())
        .clock(clock.clone())
        .max_file_size(4)
        .open()
        .unwrap();

    for text in ["aaaa", "bbbb", "cccc"] {
        writer.write(text);
        writer.wait_next_released().await.unwrap();
    }
    assert_eq!(writer.rotation_state().index, 2);

    clock.advance_days(1);
    writer.write("dddd");
    writer.wait_next_released().await.unwrap();

    let next_day = day(2024, 6, 2);
    assert_eq!(read(&log_path(dir.path(), next_day, 0)), "dddd\n");
    assert_eq!(writer.rotation_state().date, next_day);
    assert_eq!(writer.rotation_state().index, 0);
    assert_eq!(read(&log_path(dir.path(), start_day(), 2)), "cccc\n");
}

#[tokio::test]
async fn test_day_change_rotates_a_file_with_room_left() {
    let dir = tempdir().unwrap();
    let clock = fixed_clock();
    let writer = RotatingWriter::builder(dir.path())
        .clock(clock.clone())
        .open()
        .unwrap();

    writer.write("before midnight");
    writer.wait_next_released().await.unwrap();
    clock.advance_days(1);
    writer.write("after midnight");
    writer.wait_next_released().await.unwrap();

    assert_eq!(read(&log_path(dir.path(), start_day(), 0)), "before midnight\n");
    assert_eq!(read(&log_path(dir.path(), day(2024, 6, 2), 0)), "after midnight\n");
}

#[tokio::test]
async fn test_skipped_days_still_reset_the_index() {
    let dir = tempdir().unwrap();
    let clock = fixed_clock();
    let writer = RotatingWriter::builder(dir.path())
        .clock(clock.clone())
        .max_file_size(1)
        .open()
        .unwrap();

    writer.write("x");
    writer.wait_next_released().await.unwrap();
    writer.write("y");
    writer.wait_next_released().await.unwrap();

    clock.set(day(2024, 7, 15));
    writer.write("z");
    writer.wait_next_released().await.unwrap();

    assert_eq!(read(&log_path(dir.path(), day(2024, 7, 15), 0)), "z\n");
    assert_eq!(
        writer.files_for(start_day()).unwrap().len(),
        2,
        "the old day keeps its files"
    );
}

#[tokio::test]
async fn test_size_counts_existing_bytes_and_new_writes() {
    let dir = tempdir().unwrap();
    let writer = RotatingWriter::builder(dir.path())
        .clock(fixed_clock())
        .max_file_size(10)
        .open()
        .unwrap();

    writer.write("1234");
    writer.wait_next_released().await.unwrap();
    writer.write("5678");
    writer.wait_next_released().await.unwrap();
    // 10 bytes written, the file is now full.
    writer.write("9");
    writer.wait_next_released().await.unwrap();

    assert_eq!(read(&log_path(dir.path(), start_day(), 0)), "1234\n5678\n");
    assert_eq!(read(&log_path(dir.path(), start_day(), 1)), "9\n");
}

#[tokio::test]
async fn test_oversized_record_is_written_whole() {
    let dir = tempdir().unwrap();
    let writer = RotatingWriter::builder(dir.path())
        .clock(fixed_clock())
        .max_file_size(4)
        .open()
        .unwrap();

    writer.write("a record much longer than the file limit");
    writer.wait_next_released().await.unwrap();
    writer.write("next");
    writer.wait_next_released().await.unwrap();

    assert_eq!(
        read(&log_path(dir.path(), start_day(), 0)),
        "a record much longer than the file limit\n"
    );
    assert_eq!(read(&log_path(dir.path(), start_day(), 1)), "next\n");
}
