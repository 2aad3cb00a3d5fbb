#![allow(dead_code)]

use std::{fmt::Write as _, fs, path::Path};

use columnload::{
    chunk::ColumnarChunk,
    sink::{Connector, Sink, SinkError},
};

pub const SCHEMA: &str = "uint32,string(12),date,float64";

/// `rows` lines for [`SCHEMA`], ids starting at `first_id`.
pub fn gen_csv(rng: &mut fastrand::Rng, first_id: u32, rows: u32, header: bool) -> String {
    let mut out = String::new();
    if header {
        out.push_str("id,name,day,price\n");
    }
    for id in first_id..first_id + rows {
        let len = rng.usize(1..=12);
        let name: String = std::iter::repeat_with(|| rng.alphanumeric())
            .take(len)
            .collect();
        let _ = writeln!(
            out,
            "{id},{name},{}-{:02}-{:02},{}.{:02}",
            rng.i32(1992..=1998),
            rng.u32(1..=12),
            rng.u32(1..=28),
            rng.u32(0..10_000),
            rng.u32(0..100),
        );
    }
    out
}

pub fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

/// Connector whose sinks reject every chunk and statement.
#[derive(Debug, Default)]
pub struct Rejecting;

pub struct RejectingSink;

impl Sink for RejectingSink {
    fn execute(&mut self, statement: &str) -> Result<(), SinkError> {
        Err(SinkError::Database(format!("rejected: {statement}")))
    }

    fn load_chunk(&mut self, table: &str, _chunk: &ColumnarChunk) -> Result<(), SinkError> {
        Err(SinkError::Database(format!("table {table} is read-only")))
    }
}

impl Connector for Rejecting {
    type Sink = RejectingSink;

    fn connect(&self, _worker: usize) -> Result<RejectingSink, SinkError> {
        Ok(RejectingSink)
    }
}

/// Connector that cannot open any connection.
#[derive(Debug, Default)]
pub struct Unreachable;

impl Connector for Unreachable {
    type Sink = RejectingSink;

    fn connect(&self, worker: usize) -> Result<RejectingSink, SinkError> {
        Err(SinkError::Connect {
            worker,
            message: "connection refused".into(),
        })
    }
}
