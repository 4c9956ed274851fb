use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

// ════════════════════════════════════════════════════════════════
//  Component addressing
// ════════════════════════════════════════════════════════════════

/// Адрес удалённого компонента: имя типа + индекс экземпляра.
///
/// Используется как ключ кэша командных каналов. Текстовая форма:
/// `name.index` (например, `ATDome.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey {
    pub name: String,
    pub index: u32,
}

impl ComponentKey {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self { name: name.into(), index }
    }
}

impl std::fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.index)
    }
}

/// Ссылка на topic конкретного компонента в time-series store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRef {
    pub component: String,
    pub index: u32,
    pub topic: String,
}

impl TopicRef {
    /// Идентификатор источника в ответе: `{type}-{index}-{topic}`.
    pub fn source_id(&self) -> String {
        format!("{}-{}-{}", self.component, self.index, self.topic)
    }
}

// ════════════════════════════════════════════════════════════════
//  Samples & rows
// ════════════════════════════════════════════════════════════════

/// Одно значение поля во времени. `NaN`: upstream не дал значения.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(ts: DateTime<Utc>, value: f64) -> Self {
        Self { ts, value }
    }
}

/// Серии по полям одного topic'а: field → samples.
pub type FieldFrame = BTreeMap<String, Vec<Sample>>;

/// Сырая запись лога (одна строка topic'а с выбранными полями).
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub ts: DateTime<Utc>,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

// ════════════════════════════════════════════════════════════════
//  Time
// ════════════════════════════════════════════════════════════════

/// Текущее смещение TAI − UTC (с 2017-01-01).
pub const TAI_UTC_OFFSET_SECS: i64 = 37;

/// Полуоткрытый интервал `[start, end)` в UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// `None` если `end` раньше `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    /// Окно шириной `window` с центром в `center`.
    ///
    /// `None`, если край окна выходит за представимый диапазон дат.
    pub fn centered(center: DateTime<Utc>, window: TimeDelta) -> Option<Self> {
        let half = window.abs() / 2;
        Some(Self {
            start: center.checked_sub_signed(half)?,
            end: center.checked_add_signed(half)?,
        })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Шкала времени, в которой клиент передал даты.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeScale {
    #[default]
    Utc,
    Tai,
}

impl TimeScale {
    /// Перевести дату из шкалы в UTC. Ошибка, если сдвиг TAI выводит
    /// дату за нижнюю границу диапазона.
    pub fn to_utc(self, naive: NaiveDateTime) -> Result<DateTime<Utc>, ClientError> {
        let shifted = match self {
            TimeScale::Utc => Some(naive),
            TimeScale::Tai => naive.checked_sub_signed(TimeDelta::seconds(TAI_UTC_OFFSET_SECS)),
        };
        shifted
            .map(|dt| dt.and_utc())
            .ok_or_else(|| ClientError::format_err(format!("date {naive} is out of range in {self} scale")))
    }
}

impl std::fmt::Display for TimeScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TimeScale::Utc => "utc",
            TimeScale::Tai => "tai",
        })
    }
}

impl std::str::FromStr for TimeScale {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utc" => Ok(TimeScale::Utc),
            "tai" => Ok(TimeScale::Tai),
            other => Err(ClientError::format_err(format!("unsupported time scale '{other}'"))),
        }
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Распарсить дату клиента (ISO-8601, с зоной или без) в UTC.
///
/// Даты без зоны интерпретируются в указанной шкале; даты с явным
/// смещением сначала приводятся к UTC-стене, затем к шкале.
pub fn parse_datetime(input: &str, scale: TimeScale) -> Result<DateTime<Utc>, ClientError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return scale.to_utc(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return scale.to_utc(naive);
        }
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| ClientError::format_err(format!("invalid date '{input}': {e}")))?;
    scale.to_utc(date.and_time(chrono::NaiveTime::MIN))
}

/// Формат timestamp'ов в ответах: `2020-03-06 21:49:00[.250]`.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Порядок сортировки при слиянии логов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "DESC")]
    Desc,
    #[serde(alias = "ASC")]
    Asc,
}
