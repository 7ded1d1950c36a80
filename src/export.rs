//! History export.
//!
//! CSV is a flat, one-row-per-sample view meant for spreadsheets; JSON is the
//! full `node name -> history` mapping. Both are produced from a reader
//! snapshot, outside the store's lock.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::storage::{NodeSpec, Sample};

/// Column names of the CSV export, in order.
pub const CSV_HEADER: [&str; 9] = [
    "time",
    "node",
    "group",
    "latency_ms",
    "cpu_pct",
    "mem_pct",
    "tx_bps",
    "rx_bps",
    "uptime_sec",
];

/// Errors produced while encoding or decoding exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The CSV did not start with [`CSV_HEADER`].
    #[error("unexpected csv header: {0}")]
    Header(String),
}

fn rfc3339<S: Serializer>(time: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn two_decimals<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.serialize_str(&format!("{v:.2}")),
        None => s.serialize_none(),
    }
}

/// One CSV row. Metric cells are empty for failed samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRecord {
    #[serde(serialize_with = "rfc3339")]
    pub time: DateTime<Utc>,
    pub node: String,
    pub group: String,
    pub latency_ms: u64,
    #[serde(serialize_with = "two_decimals")]
    pub cpu_pct: Option<f64>,
    #[serde(serialize_with = "two_decimals")]
    pub mem_pct: Option<f64>,
    pub tx_bps: Option<f64>,
    pub rx_bps: Option<f64>,
    pub uptime_sec: Option<u64>,
}

impl From<&Sample> for CsvRecord {
    fn from(sample: &Sample) -> Self {
        let metrics = sample.metrics();
        Self {
            time: sample.time(),
            node: sample.node().name.clone(),
            group: sample.node().group.clone(),
            latency_ms: sample.latency_ms(),
            cpu_pct: metrics.map(|m| m.cpu_percent),
            mem_pct: metrics.map(|m| m.mem_percent),
            tx_bps: metrics.map(|m| m.net.tx_bytes_per_sec),
            rx_bps: metrics.map(|m| m.net.rx_bytes_per_sec),
            uptime_sec: metrics.map(|m| m.uptime_sec),
        }
    }
}

/// Flatten a history snapshot into rows.
///
/// Nodes come out in `nodes` order, each oldest first. Histories for names
/// not in `nodes` follow, in name order.
pub fn csv_records(
    nodes: &[Arc<NodeSpec>],
    history: &BTreeMap<String, Vec<Arc<Sample>>>,
) -> Vec<CsvRecord> {
    let configured = nodes.iter().map(|n| n.name.as_str());
    let extra = history
        .keys()
        .map(String::as_str)
        .filter(|name| !nodes.iter().any(|n| n.name == *name));

    configured
        .chain(extra)
        .filter_map(|name| history.get(name))
        .flatten()
        .map(|sample| CsvRecord::from(sample.as_ref()))
        .collect()
}

/// Write a header line followed by `records`.
pub fn write_csv<W, I>(writer: W, records: I) -> Result<W, ExportError>
where
    W: io::Write,
    I: IntoIterator<Item = CsvRecord>,
{
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(CSV_HEADER)?;
    for record in records {
        wtr.serialize(record)?;
    }

    wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Encode a history snapshot as CSV bytes.
pub fn to_csv(
    nodes: &[Arc<NodeSpec>],
    history: &BTreeMap<String, Vec<Arc<Sample>>>,
) -> Result<Vec<u8>, ExportError> {
    write_csv(Vec::new(), csv_records(nodes, history))
}

/// Parse a CSV export back into rows.
pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<CsvRecord>, ExportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers()?;
    if !headers.iter().eq(CSV_HEADER) {
        return Err(ExportError::Header(headers.iter().collect::<Vec<_>>().join(",")));
    }

    rdr.deserialize()
        .collect::<Result<Vec<CsvRecord>, _>>()
        .map_err(ExportError::from)
}

/// Encode a history snapshot as the JSON `node -> [sample]` mapping.
pub fn to_json(history: &BTreeMap<String, Vec<Arc<Sample>>>) -> Result<Vec<u8>, ExportError> {
    Ok(serde_json::to_vec(history)?)
}

/// Decode a JSON history export.
pub fn from_json(bytes: &[u8]) -> Result<BTreeMap<String, Vec<Sample>>, ExportError> {
    Ok(serde_json::from_slice(bytes)?)
}
