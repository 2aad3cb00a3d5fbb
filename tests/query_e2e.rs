mod common;

use std::{fs, sync::Arc};

use columnload::{
    run_with,
    sink::{MemoryConnector, MemoryStore},
    Backend, LoaderOptions,
};
use common::{write, Rejecting, Unreachable};

fn succeeded_in(result: &str) -> u64 {
    let (succeeded, secs) = result.split_once(',').unwrap();
    assert!(secs.parse::<f64>().unwrap() >= 0.0);
    succeeded.parse().unwrap()
}

#[test]
fn replays_every_stream_and_writes_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let queries = dir.path().join("queries");
    fs::create_dir(&queries).unwrap();
    write(
        &queries,
        "q1.sql",
        "-- pricing summary\nSELECT 1;\n\nSELECT 'a;b'\n  FROM t;\n",
    );
    write(&queries, "q2.sql", "SELECT 2;\nSELECT 3");
    write(&queries, "q3.sql", "-- nothing to run\n\n");
    let result = dir.path().join("result");

    let store = MemoryStore::new();
    let options = LoaderOptions::new(Backend::Memory)
        .threads(2)
        .run_queries(&queries, &result);
    let summary = run_with(&options, Arc::new(MemoryConnector::new(store.clone()))).unwrap();

    let report = summary.queries.unwrap();
    assert_eq!(report.streams, 3);
    assert_eq!(report.statements, 4);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed(), 0);
    assert!(summary.load.is_none());

    let line = fs::read_to_string(&result).unwrap();
    assert_eq!(line, report.result_line());
    assert_eq!(succeeded_in(&line), 4);

    let mut statements = store.statements();
    statements.sort();
    assert_eq!(
        statements,
        vec!["SELECT 'a;b'\n  FROM t", "SELECT 1", "SELECT 2", "SELECT 3"]
    );
}

#[test]
fn failed_statements_are_excluded_from_the_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workload.sql");
    fs::write(&path, "SELECT 1;\nSELECT 2;\n").unwrap();
    let result = dir.path().join("result");

    let options = LoaderOptions::new(Backend::Memory).run_queries(&path, &result);
    let report = run_with(&options, Arc::new(Rejecting))
        .unwrap()
        .queries
        .unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed(), 2);
    assert_eq!(succeeded_in(&fs::read_to_string(&result).unwrap()), 0);
}

#[test]
fn unreachable_database_fails_every_stream() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.sql", "SELECT 1;");
    write(dir.path(), "b.sql", "SELECT 2;SELECT 3;");
    let result = dir.path().join("out").join("result");
    fs::create_dir(dir.path().join("out")).unwrap();

    let options = LoaderOptions::new(Backend::Memory)
        .threads(2)
        .run_queries(dir.path().join("a.sql"), &result);
    let summary = run_with(&options, Arc::new(Unreachable)).unwrap();
    assert_eq!(summary.queries.unwrap().failed(), 1);
    assert_eq!(summary.query_stats.unwrap().connections, 0);
    assert_eq!(succeeded_in(&fs::read_to_string(&result).unwrap()), 0);
}

#[cfg(feature = "sqlite")]
#[test]
fn load_then_query_against_sqlite() {
    use columnload::csv::CsvOptions;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tpch.db");
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch("CREATE TABLE nation (key INTEGER, name TEXT, region INTEGER);")
        .unwrap();

    let csv = dir.path().join("nation.tbl");
    fs::write(&csv, "0|ALGERIA|0|\n1|ARGENTINA|1|\n2|BRAZIL|1|\n").unwrap();
    let sql = dir.path().join("q.sql");
    fs::write(
        &sql,
        "SELECT COUNT(*) FROM nation;\nSELECT * FROM missing_table;\nSELECT name FROM nation WHERE region = 1; -- done\n",
    )
    .unwrap();
    let result = dir.path().join("result");

    let options = LoaderOptions::new(Backend::Sqlite {
        path: db,
        busy_timeout: std::time::Duration::from_secs(5),
    })
    .table("nation")
    .threads(2)
    .load_csv(
        &csv,
        CsvOptions::new("int32,string(25),int32".parse().unwrap())
            .delimiter(b'|')
            .header(false),
    )
    .run_queries(&sql, &result);
    let summary = columnload::run(&options).unwrap();

    assert_eq!(summary.load.unwrap().rows_loaded, 3);
    let queries = summary.queries.unwrap();
    assert_eq!(queries.statements, 3);
    assert_eq!(queries.succeeded, 2);
    assert_eq!(succeeded_in(&fs::read_to_string(&result).unwrap()), 2);
}
