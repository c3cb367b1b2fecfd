//! Shared test support: a scripted executor that records every statement.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use postgraph::{Executor, Row, StoreError};
use serde_json::Value;

/// Records `(sql, params)` calls and replays canned responses in order.
/// Once the script runs out, every further call returns zero rows.
pub struct MockExecutor {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
}

impl MockExecutor {
    pub fn new(responses: Vec<Vec<Row>>) -> Self {
        // Route the library's log output through the test harness.
        let _ = env_logger::builder().is_test(true).try_init();
        MockExecutor {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(responses.into()),
        }
    }

    #[allow(dead_code)]
    pub fn empty() -> Self {
        MockExecutor::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

/// Build a result row from column/value pairs.
pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect()
}
