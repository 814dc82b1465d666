// Decoding of History response bodies

use crate::core::constants::ERROR_KEYS;
use crate::core::error::{PimsError, Result};
use crate::core::format::Sample;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

type Object = Map<String, Value>;

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Vec<Record>>,
    #[serde(flatten)]
    rest: Object,
}

#[derive(Deserialize)]
struct Record {
    #[serde(default)]
    samples: Vec<Object>,
    #[serde(flatten)]
    rest: Object,
}

/// Status fields the server sends in place of samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerNotice {
    pub error: Option<String>,
    pub class: Option<String>,
    pub message: Option<String>,
}

impl ServerNotice {
    fn from_object(obj: &Object) -> Option<Self> {
        if !ERROR_KEYS.iter().any(|k| obj.contains_key(*k)) {
            return None;
        }
        Some(Self {
            error: obj.get("er").map(scalar_text),
            class: obj.get("ec").map(scalar_text),
            message: obj.get("es").map(scalar_text),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPage {
    Samples(Vec<Sample>),
    /// The window holds nothing; `notice` is set when the server said so explicitly.
    NoData { notice: Option<ServerNotice> },
}

pub fn parse_history(body: &str) -> Result<ParsedPage> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| PimsError::Parse(format!("invalid JSON envelope: {}", e)))?;

    if let Some(notice) = ServerNotice::from_object(&envelope.rest) {
        return Ok(ParsedPage::NoData {
            notice: Some(notice),
        });
    }

    let records = envelope
        .data
        .ok_or_else(|| PimsError::Parse("missing \"data\" array".to_string()))?;

    // A notice ends the page; samples that came before it are still returned.
    let mut samples = Vec::new();
    let mut notice = None;
    'records: for record in &records {
        notice = ServerNotice::from_object(&record.rest);
        if notice.is_some() {
            break;
        }

        samples.reserve(record.samples.len());
        for (i, raw) in record.samples.iter().enumerate() {
            notice = ServerNotice::from_object(raw);
            if notice.is_some() {
                break 'records;
            }
            samples.push(parse_sample(i, raw)?);
        }
    }

    if samples.is_empty() {
        return Ok(ParsedPage::NoData { notice });
    }
    if let Some(notice) = notice {
        debug!("notice after {} samples: {:?}", samples.len(), notice);
    }

    Ok(ParsedPage::Samples(samples))
}

fn parse_sample(index: usize, raw: &Object) -> Result<Sample> {
    let t = raw
        .get("t")
        .ok_or_else(|| PimsError::Parse(format!("sample {} has no \"t\"", index)))?;

    let pims_time = t
        .as_i64()
        .or_else(|| t.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .ok_or_else(|| PimsError::Parse(format!("sample {} has non-integer \"t\": {}", index, t)))?;

    let value = raw.get("v").cloned().unwrap_or(Value::Null);

    Ok(Sample::new(pims_time, value))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
