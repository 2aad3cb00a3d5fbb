mod common;

use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray, UInt32Array};
use columnload::{
    csv::CsvOptions,
    run_with,
    sink::{MemoryConnector, MemoryStore},
    Backend, LoaderOptions,
};
use common::{gen_csv, write, Rejecting, SCHEMA};

/// 4 + 12 + 12 + 8 bytes per row.
const ROW_WIDTH: usize = 36;

fn csv_options(rows_per_chunk: usize) -> CsvOptions {
    CsvOptions::new(SCHEMA.parse().unwrap()).max_chunk_size(ROW_WIDTH * rows_per_chunk)
}

#[test]
fn directory_load_conserves_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = fastrand::Rng::with_seed(7);
    write(dir.path(), "part-0.csv", &gen_csv(&mut rng, 0, 25, true));
    write(dir.path(), "part-1.csv", &gen_csv(&mut rng, 25, 40, true));
    write(dir.path(), "part-2.csv", &gen_csv(&mut rng, 65, 7, true));

    let store = MemoryStore::new();
    let options = LoaderOptions::new(Backend::Memory)
        .table("orders")
        .threads(4)
        .memory_budget(ROW_WIDTH * 32)
        .load_csv(dir.path(), csv_options(10));
    let summary = run_with(&options, Arc::new(MemoryConnector::new(store.clone()))).unwrap();

    let load = summary.load.unwrap();
    assert_eq!(load.files, 3);
    assert_eq!(load.failed_files, 0);
    assert_eq!(load.chunks, 3 + 4 + 1);
    assert_eq!(load.rows_submitted, 72);
    assert_eq!(load.rows_loaded, 72);

    let stats = summary.load_stats.unwrap();
    assert_eq!(stats.submitted, 8);
    assert_eq!(stats.succeeded, 8);
    assert_eq!(stats.failed, 0);
    assert!(stats.connections >= 1 && stats.connections <= 4);
    assert!(summary.queries.is_none());

    assert_eq!(store.row_count("orders"), 72);
    let mut ids: Vec<u32> = store
        .batches("orders")
        .iter()
        .flat_map(|batch| {
            let ids = batch
                .column(0)
                .as_any()
                .downcast_ref::<UInt32Array>()
                .unwrap();
            ids.values().to_vec()
        })
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..72).collect::<Vec<_>>());
}

#[test]
fn chunk_columns_keep_schema_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lineitem.tbl");
    std::fs::write(
        &path,
        "1|short|1996-03-13|17.5|\n2|exactly12chr|1996-04-12 00:00:00|-3|\n",
    )
    .unwrap();

    let store = MemoryStore::new();
    let options = LoaderOptions::new(Backend::Memory).table("lineitem").load_csv(
        &path,
        csv_options(100).delimiter(b'|').header(false),
    );
    run_with(&options, Arc::new(MemoryConnector::new(store.clone()))).unwrap();

    let batches = store.batches("lineitem");
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 2);
    let names = batch
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(names.value(0), "short");
    assert_eq!(names.value(1), "exactly12chr");
    let prices = batch
        .column(3)
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(prices.value(0), 17.5);
    assert_eq!(prices.value(1), -3.0);
    assert_eq!(batch.column(2).null_count(), 0);
}

#[test]
fn parse_failure_stops_only_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = fastrand::Rng::with_seed(11);
    let mut broken = gen_csv(&mut rng, 0, 14, true);
    broken.push_str("14,bad,1996-02-30,1.0\n");
    broken.push_str(&gen_csv(&mut rng, 15, 5, false));
    write(dir.path(), "a.csv", &broken);
    write(dir.path(), "b.csv", &gen_csv(&mut rng, 100, 6, true));

    let store = MemoryStore::new();
    let options = LoaderOptions::new(Backend::Memory)
        .table("t")
        .threads(2)
        .load_csv(dir.path(), csv_options(10));
    let load = run_with(&options, Arc::new(MemoryConnector::new(store.clone())))
        .unwrap()
        .load
        .unwrap();

    // The first full chunk of a.csv was already submitted before row 15 failed.
    assert_eq!(load.files, 2);
    assert_eq!(load.failed_files, 1);
    assert_eq!(load.chunks, 2);
    assert_eq!(load.rows_loaded, 10 + 6);
    assert_eq!(store.row_count("t"), 16);
}

#[test]
fn rejected_chunks_are_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = fastrand::Rng::with_seed(3);
    write(dir.path(), "data.csv", &gen_csv(&mut rng, 0, 30, true));

    let options = LoaderOptions::new(Backend::Memory)
        .table("t")
        .threads(3)
        .load_csv(dir.path(), csv_options(10));
    let summary = run_with(&options, Arc::new(Rejecting)).unwrap();

    let load = summary.load.unwrap();
    assert_eq!(load.rows_submitted, 30);
    assert_eq!(load.rows_loaded, 0);
    let stats = summary.load_stats.unwrap();
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.succeeded, 0);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_load_with_concurrent_workers() {
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let mut rng = fastrand::Rng::with_seed(5);
    for part in 0..4 {
        write(&data, &format!("{part}.csv"), &gen_csv(&mut rng, part * 50, 50, true));
    }

    let db = dir.path().join("load.db");
    let conn = rusqlite::Connection::open(&db).unwrap();
    conn.execute_batch("CREATE TABLE orders (id INTEGER, name TEXT, day TEXT, price REAL)")
        .unwrap();

    let options = LoaderOptions::new(Backend::Sqlite {
        path: db.clone(),
        busy_timeout: Duration::from_secs(30),
    })
    .table("orders")
    .threads(4)
    .load_csv(&data, csv_options(16));
    let summary = columnload::run(&options).unwrap();
    assert_eq!(summary.load.unwrap().rows_loaded, 200);

    let (count, sum): (i64, i64) = conn
        .query_row("SELECT COUNT(*), SUM(id) FROM orders", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(count, 200);
    assert_eq!(sum, (0..200).sum::<i64>());
}

#[test]
fn missing_input_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let options = LoaderOptions::new(Backend::Memory)
        .table("t")
        .load_csv(dir.path().join("missing"), csv_options(10));
    let err = run_with(&options, Arc::new(MemoryConnector::default())).unwrap_err();
    assert!(err.to_string().contains("missing"), "{err}");
}
