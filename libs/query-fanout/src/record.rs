use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use commander_api::{LogRow, Sample, format_ts};

fn serialize_ts<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_ts(ts))
}

/// Точка серии в ответе. `None`: значения нет (NaN upstream'а или
/// пустой bucket).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(serialize_with = "serialize_ts")]
    pub ts: DateTime<Utc>,
    pub value: Option<f64>,
}

impl ResultRecord {
    pub fn new(ts: DateTime<Utc>, value: Option<f64>) -> Self {
        Self { ts, value }
    }
}

impl From<Sample> for ResultRecord {
    fn from(sample: Sample) -> Self {
        let value = (!sample.value.is_nan()).then_some(sample.value);
        Self { ts: sample.ts, value }
    }
}

/// Запись лога в ответе: `ts` плюс поля строки на верхнем уровне.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(serialize_with = "serialize_ts")]
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl From<LogRow> for LogRecord {
    fn from(row: LogRow) -> Self {
        let mut fields = row.fields;
        fields.remove("ts");
        Self { ts: row.ts, fields }
    }
}
