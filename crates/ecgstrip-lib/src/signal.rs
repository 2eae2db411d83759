use crate::{
    config::AnalysisConfig,
    error::{AnalysisError, MalformedRow, Result, RowError},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// One unparsed row of a strip: time and voltage fields as read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    pub time: String,
    pub voltage: String,
}

impl RawRow {
    pub fn new(time: impl Into<String>, voltage: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            voltage: voltage.into(),
        }
    }
}

/// A single (time, voltage) point of a cleaned strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds
    pub time: f64,
    /// Millivolts
    pub voltage: f64,
}

/// Minimum and maximum voltage seen while cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageExtremes {
    pub min: f64,
    pub max: f64,
}

impl VoltageExtremes {
    fn starting_at(v: f64) -> Self {
        Self { min: v, max: v }
    }

    fn include(&mut self, v: f64) {
        if v > self.max {
            self.max = v;
        }
        if v < self.min {
            self.min = v;
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

/// Output of the cleaning stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedStrip {
    pub samples: Vec<Sample>,
    pub extremes: VoltageExtremes,
    pub dropped: Vec<MalformedRow>,
    /// Row that triggered the out-of-range voltage warning, if any.
    pub range_warning_row: Option<usize>,
}

#[derive(Default)]
struct CleaningState {
    samples: Vec<Sample>,
    extremes: Option<VoltageExtremes>,
    dropped: Vec<MalformedRow>,
    range_warning_row: Option<usize>,
}

/// Parse raw rows into samples, dropping malformed rows and tracking voltage extremes.
///
/// Extremes include every row whose voltage parsed, even when its time field is bad.
pub fn clean_rows<I>(rows: I, cfg: &AnalysisConfig) -> Result<CleanedStrip>
where
    I: IntoIterator<Item = RawRow>,
{
    let state = rows
        .into_iter()
        .enumerate()
        .fold(CleaningState::default(), |mut state, (index, row)| {
            let voltage = match parse_field(&row.voltage, "voltage") {
                Ok(v) => v,
                Err(reason) => {
                    state.drop_row(index, reason);
                    return state;
                }
            };
            if voltage.abs() > cfg.voltage_warning_mv && state.range_warning_row.is_none() {
                warn!(
                    "voltage exceeds normal range (-{0} ~ {0} mV) at row {1}",
                    cfg.voltage_warning_mv, index
                );
                state.range_warning_row = Some(index);
            }
            match state.extremes.as_mut() {
                Some(ext) => ext.include(voltage),
                None => state.extremes = Some(VoltageExtremes::starting_at(voltage)),
            }
            match parse_field(&row.time, "time") {
                Ok(time) => state.samples.push(Sample { time, voltage }),
                Err(reason) => state.drop_row(index, reason),
            }
            state
        });

    let extremes = state.extremes.ok_or(AnalysisError::EmptySeries)?;
    if state.samples.is_empty() {
        return Err(AnalysisError::EmptySeries);
    }
    info!(
        "cleaned {} samples ({} rows dropped), voltage extremes ({}, {})",
        state.samples.len(),
        state.dropped.len(),
        extremes.min,
        extremes.max
    );
    Ok(CleanedStrip {
        samples: state.samples,
        extremes,
        dropped: state.dropped,
        range_warning_row: state.range_warning_row,
    })
}

impl CleaningState {
    fn drop_row(&mut self, index: usize, reason: RowError) {
        let row = MalformedRow { index, reason };
        error!("data missing: {}", row);
        self.dropped.push(row);
    }
}

fn parse_field(raw: &str, field: &'static str) -> std::result::Result<f64, RowError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RowError::MissingField(field));
    }
    let value: f64 = trimmed.parse().map_err(|_| RowError::NotNumeric {
        field,
        value: trimmed.to_string(),
    })?;
    if value.is_nan() {
        return Err(RowError::Missing(field));
    }
    Ok(value)
}

/// Index-aligned time and voltage arrays of a strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripSeries {
    pub time: Vec<f64>,
    pub voltage: Vec<f64>,
    /// Last time minus first time (seconds)
    pub duration: f64,
}

impl StripSeries {
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let (time, voltage): (Vec<f64>, Vec<f64>) =
            samples.iter().map(|s| (s.time, s.voltage)).unzip();
        let duration = match (time.first(), time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => return Err(AnalysisError::EmptySeries),
        };
        if !(duration.is_finite() && duration > 0.0) {
            return Err(AnalysisError::DegenerateInput { duration });
        }
        info!("strip duration {} s over {} samples", duration, time.len());
        Ok(Self {
            time,
            voltage,
            duration,
        })
    }

    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

}

/// Plausible peak-to-peak interval range, in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBounds {
    pub lower: f64,
    pub upper: f64,
}

impl IntervalBounds {
    pub fn new(len: usize, duration: f64, cfg: &AnalysisConfig) -> Self {
        Self {
            lower: len as f64 * cfg.min_beat_interval_s / duration,
            upper: len as f64 * cfg.max_beat_interval_s / duration,
        }
    }

    pub fn contains(&self, interval: f64) -> bool {
        self.lower <= interval && interval <= self.upper
    }
}

/// Successive index differences of an increasing peak list.
pub fn peak_intervals(peaks: &[usize]) -> Vec<f64> {
    peaks.windows(2).map(|w| (w[1] - w[0]) as f64).collect()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
