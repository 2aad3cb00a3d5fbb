use std::{collections::HashMap, sync::Arc};

use arrow::record_batch::RecordBatch;
use parking_lot::Mutex;

use super::{Connector, Sink, SinkError};
use crate::chunk::ColumnarChunk;

#[derive(Debug, Default)]
struct StoreInner {
    tables: HashMap<String, Vec<RecordBatch>>,
    statements: Vec<String>,
}

/// In-process target that keeps loaded chunks as Arrow record batches.
///
/// Cloning the store shares the underlying tables, so tests and dry runs can
/// inspect what the workers loaded after the pipeline shuts down.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches loaded into `table`, in completion order.
    pub fn batches(&self, table: &str) -> Vec<RecordBatch> {
        self.inner
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Total rows loaded into `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.inner
            .lock()
            .tables
            .get(table)
            .map(|batches| batches.iter().map(RecordBatch::num_rows).sum())
            .unwrap_or(0)
    }

    /// Every statement executed so far, in completion order.
    pub fn statements(&self) -> Vec<String> {
        self.inner.lock().statements.clone()
    }
}

/// Hands every worker a [`MemorySink`] over the same [`MemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    /// Connector writing into `store`.
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// The shared store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Connector for MemoryConnector {
    type Sink = MemorySink;

    fn connect(&self, _worker: usize) -> Result<MemorySink, SinkError> {
        Ok(MemorySink {
            store: self.store.clone(),
        })
    }
}

/// Worker handle onto a [`MemoryStore`].
#[derive(Debug)]
pub struct MemorySink {
    store: MemoryStore,
}

impl Sink for MemorySink {
    fn execute(&mut self, statement: &str) -> Result<(), SinkError> {
        if statement.trim().is_empty() {
            return Err(SinkError::Database("empty statement".into()));
        }
        self.store
            .inner
            .lock()
            .statements
            .push(statement.to_string());
        Ok(())
    }

    fn load_chunk(&mut self, table: &str, chunk: &ColumnarChunk) -> Result<(), SinkError> {
        // Convert outside the lock; only the append is serialized.
        let batch = chunk.to_record_batch()?;
        self.store
            .inner
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(batch);
        Ok(())
    }
}
