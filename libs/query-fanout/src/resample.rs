use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};

use commander_api::Sample;

use crate::record::ResultRecord;

/// Верхняя граница числа bucket'ов одной серии.
pub const MAX_BUCKETS: i64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResampleError {
    #[error("invalid resample rule '{0}'")]
    InvalidRule(String),

    #[error("resample rule {rule} produces {buckets} buckets (max {max})", max = MAX_BUCKETS)]
    TooManyBuckets { rule: Resample, buckets: i64 },
}

/// Ширина bucket'а ресемплинга (`"1min"`, `"30s"`, `"1H"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resample {
    width: TimeDelta,
}

impl Resample {
    /// `None` для нулевой/отрицательной ширины.
    pub fn new(width: TimeDelta) -> Option<Self> {
        (width.num_milliseconds() > 0).then_some(Self { width })
    }

    pub fn width(&self) -> TimeDelta {
        self.width
    }

    fn width_ms(&self) -> i64 {
        self.width.num_milliseconds()
    }
}

impl Default for Resample {
    fn default() -> Self {
        Self { width: TimeDelta::minutes(1) }
    }
}

impl std::fmt::Display for Resample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.width_ms())
    }
}

impl FromStr for Resample {
    type Err = ResampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResampleError::InvalidRule(s.to_string());
        let rule = s.trim();
        let split = rule.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        let (count, unit) = rule.split_at(split);
        let count: i64 = if count.is_empty() { 1 } else { count.parse().map_err(|_| invalid())? };

        let unit_width = match unit {
            "ms" | "L" => TimeDelta::milliseconds(1),
            "s" | "S" => TimeDelta::seconds(1),
            "min" | "T" => TimeDelta::minutes(1),
            "h" | "H" => TimeDelta::hours(1),
            "d" | "D" => TimeDelta::days(1),
            _ => return Err(invalid()),
        };
        let width = unit_width.checked_mul(i32::try_from(count).map_err(|_| invalid())?).ok_or_else(invalid)?;
        Resample::new(width).ok_or_else(invalid)
    }
}

/// Ресемплинг серии в bucket'ы фиксированной ширины.
///
/// Bucket'ы отсчитываются от полуночи (UTC) дня первого значения и идут
/// подряд от первого до последнего занятого. Значение bucket'а: среднее
/// его не-NaN значений; bucket без значений даёт `None`. Пустая серия
/// остаётся пустой.
pub fn resample_mean(samples: &[Sample], rule: Resample) -> Result<Vec<ResultRecord>, ResampleError> {
    let Some(first_ts) = samples.iter().map(|s| s.ts).min() else {
        return Ok(Vec::new());
    };
    let origin = first_ts.date_naive().and_time(NaiveTime::MIN).and_utc().timestamp_millis();
    let width = rule.width_ms();

    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for sample in samples {
        let bucket = (sample.ts.timestamp_millis() - origin).div_euclid(width);
        let slot = buckets.entry(bucket).or_insert((0.0, 0));
        if !sample.value.is_nan() {
            slot.0 += sample.value;
            slot.1 += 1;
        }
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Ok(Vec::new());
    };
    let count = last - first + 1;
    if count > MAX_BUCKETS {
        return Err(ResampleError::TooManyBuckets { rule, buckets: count });
    }

    let records = (first..=last)
        .filter_map(|bucket| {
            let ts = DateTime::<Utc>::from_timestamp_millis(origin + bucket * width)?;
            let value = buckets
                .get(&bucket)
                .filter(|(_, n)| *n > 0)
                .map(|(sum, n)| sum / *n as f64);
            Some(ResultRecord::new(ts, value))
        })
        .collect();
    Ok(records)
}
