// In-memory History endpoints for session and batch tests

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::client::transport::HistoryTransport;
use crate::core::constants::MAX_ROWS_PER_CALL;
use crate::core::error::TransportError;
use crate::core::format::{Credentials, PimsTimestamp};
use crate::core::query::HistoryQuery;

pub fn samples_body(points: &[(PimsTimestamp, Value)]) -> String {
    let samples: Vec<Value> = points.iter().map(|(t, v)| json!({"t": t, "v": v})).collect();
    json!({"data": [{"samples": samples}]}).to_string()
}

pub fn no_data_body() -> String {
    json!({"data": [{"samples": [{"er": -1, "ec": 0, "es": "No data"}]}]}).to_string()
}

pub fn xml_field(xml: &str, name: &str) -> Option<i64> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let start = xml.find(&open)? + open.len();
    let end = start + xml[start..].find(&close)?;
    xml[start..end].parse().ok()
}

/// Replies from a fixed script, then reports no data.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<String, TransportError>>>,
    repeat: Option<String>,
    queries: Mutex<Vec<HistoryQuery>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<String, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call with the same body.
    pub fn repeating(body: String) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(body),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<HistoryQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryTransport for ScriptedTransport {
    async fn fetch(
        &self,
        query: &HistoryQuery,
        _credentials: &Credentials,
    ) -> Result<String, TransportError> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(body) = &self.repeat {
            return Ok(body.clone());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(no_data_body()))
    }
}

/// Serves `total` evenly spaced samples, honouring `<St>`, `<Et>` and the row cap.
pub struct PagingServer {
    first: PimsTimestamp,
    spacing: i64,
    total: usize,
    calls: AtomicUsize,
}

impl PagingServer {
    pub fn new(first: PimsTimestamp, spacing: i64, total: usize) -> Self {
        Self {
            first,
            spacing,
            total,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn page(&self, start: PimsTimestamp, stop: PimsTimestamp) -> String {
        let skip = if start <= self.first {
            0
        } else {
            ((start - self.first + self.spacing - 1) / self.spacing) as usize
        };

        let points: Vec<(PimsTimestamp, Value)> = (skip..self.total)
            .map(|i| (self.first + i as i64 * self.spacing, json!(i)))
            .take_while(|(t, _)| *t <= stop)
            .take(MAX_ROWS_PER_CALL as usize)
            .collect();

        if points.is_empty() {
            no_data_body()
        } else {
            samples_body(&points)
        }
    }
}

#[async_trait]
impl HistoryTransport for PagingServer {
    async fn fetch(
        &self,
        query: &HistoryQuery,
        _credentials: &Credentials,
    ) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = xml_field(&query.xml, "St").ok_or(TransportError::Status {
            status: 400,
            body: "missing St".to_string(),
        })?;
        let stop = xml_field(&query.xml, "Et").ok_or(TransportError::Status {
            status: 400,
            body: "missing Et".to_string(),
        })?;
        Ok(self.page(start, stop))
    }
}

/// Never answers.
pub struct HangingTransport;

#[async_trait]
impl HistoryTransport for HangingTransport {
    async fn fetch(
        &self,
        _query: &HistoryQuery,
        _credentials: &Credentials,
    ) -> Result<String, TransportError> {
        std::future::pending().await
    }
}
