use crate::{
    config::AnalysisConfig,
    detectors::ecg::{fit_peak, FittedPeaks},
    error::Result,
    io,
    metrics::beats::{analyse, BeatSummary},
    signal::{clean_rows, RawRow, StripSeries, VoltageExtremes},
};
use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Summary metrics of one ECG strip.
///
/// JSON has no NaN, so the "no beats" placeholder in `beats` is written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub duration: f64,
    pub voltage_extremes: (f64, f64),
    pub num_beats: usize,
    pub mean_hr_bpm: f64,
    #[serde(with = "nan_as_null")]
    pub beats: Vec<f64>,
}

impl MetricsRecord {
    pub fn new(duration: f64, extremes: VoltageExtremes, summary: BeatSummary) -> Self {
        Self {
            duration,
            voltage_extremes: extremes.as_tuple(),
            num_beats: summary.num_beats,
            mean_hr_bpm: summary.mean_hr_bpm,
            beats: summary.beats,
        }
    }

    pub fn has_beats(&self) -> bool {
        self.num_beats > 0
    }
}

/// Everything produced by one run, including the intermediate arrays callers plot.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub series: StripSeries,
    pub fitted: FittedPeaks,
    pub dropped_rows: usize,
    pub record: MetricsRecord,
}

/// Run cleaning, peak search and beat analysis over raw rows.
pub fn analyze_rows<I>(rows: I, cfg: &AnalysisConfig) -> Result<Analysis>
where
    I: IntoIterator<Item = RawRow>,
{
    cfg.validate()?;
    info!("start analysing strip");
    let cleaned = clean_rows(rows, cfg)?;
    let series = StripSeries::from_samples(&cleaned.samples)?;
    let fitted = fit_peak(&series.voltage, series.duration, cfg)?;
    let summary = analyse(
        &series.voltage,
        &series.time,
        series.duration,
        &fitted.peaks,
        cfg,
    )?;
    let record = MetricsRecord::new(series.duration, cleaned.extremes, summary);
    Ok(Analysis {
        series,
        fitted,
        dropped_rows: cleaned.dropped.len(),
        record,
    })
}

/// Read a strip from a CSV file and analyse it.
pub fn analyze_file(path: &Path, cfg: &AnalysisConfig) -> anyhow::Result<Analysis> {
    let rows = io::csv::read_rows(path)?;
    analyze_rows(rows, cfg).with_context(|| format!("analysing {}", path.display()))
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(beats: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(beats.iter().map(|b| (!b.is_nan()).then_some(*b)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|b| b.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    fn sine_rows(fs: f64, seconds: f64, freq: f64, noise: Option<(u64, f64)>) -> Vec<RawRow> {
        let mut rng = noise.map(|(seed, _)| StdRng::seed_from_u64(seed));
        let amp = noise.map_or(0.0, |(_, a)| a);
        (0..(seconds * fs) as usize)
            .map(|i| {
                let t = i as f64 / fs;
                let jitter = rng.as_mut().map_or(0.0, |r| r.gen_range(-amp..amp));
                let v = (2.0 * PI * freq * t).sin() + jitter;
                RawRow::new(format!("{}", t), format!("{}", v))
            })
            .collect()
    }

    #[test]
    fn clean_sine_reports_72_bpm() {
        let analysis =
            analyze_rows(sine_rows(100.0, 10.0, 1.2, None), &AnalysisConfig::default()).unwrap();
        let record = &analysis.record;
        assert!((11..=13).contains(&record.num_beats), "{:?}", record);
        assert!((record.mean_hr_bpm - 72.0).abs() <= 5.0, "{:?}", record);
        assert_eq!(record.beats.len(), record.num_beats);
        assert!((record.duration - 9.99).abs() < 1e-9);
        assert!(record.voltage_extremes.0 >= -1.0 && record.voltage_extremes.1 <= 1.0);
    }

    #[test]
    fn analysis_is_deterministic() {
        let cfg = AnalysisConfig::default();
        let rows = sine_rows(100.0, 10.0, 1.2, Some((7, 0.05)));
        let first = analyze_rows(rows.clone(), &cfg).unwrap();
        let second = analyze_rows(rows, &cfg).unwrap();
        assert_eq!(first.record, second.record);
        assert_eq!(first.fitted, second.fitted);
    }

    #[test]
    fn mild_noise_keeps_rate() {
        let rows = sine_rows(100.0, 10.0, 1.2, Some((42, 0.02)));
        let analysis = analyze_rows(rows, &AnalysisConfig::default()).unwrap();
        assert!((analysis.record.mean_hr_bpm - 72.0).abs() <= 5.0);
    }

    #[test]
    fn malformed_rows_are_counted() {
        let mut rows = sine_rows(100.0, 10.0, 1.2, None);
        rows.insert(10, RawRow::new("0.095", ""));
        rows.insert(20, RawRow::new("abc", "0.3"));
        let analysis = analyze_rows(rows, &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.dropped_rows, 2);
        assert_eq!(analysis.series.len(), 1000);
    }

    #[test]
    fn flat_strip_yields_no_beats() {
        let rows: Vec<RawRow> = (0..500)
            .map(|i| RawRow::new(format!("{}", i as f64 / 100.0), "0.2"))
            .collect();
        let analysis = analyze_rows(rows, &AnalysisConfig::default()).unwrap();
        assert!(!analysis.record.has_beats());
        assert_eq!(analysis.record.mean_hr_bpm, 0.0);
        assert!(analysis.record.beats[0].is_nan());
    }

    #[test]
    fn degenerate_strip_is_an_error() {
        let rows = vec![RawRow::new("1.0", "0.1"), RawRow::new("1.0", "0.2")];
        let err = analyze_rows(rows, &AnalysisConfig::default()).unwrap_err();
        assert_eq!(err, AnalysisError::DegenerateInput { duration: 0.0 });
    }

    #[test]
    fn analyzes_sample_file() {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../test_data/sine_72bpm.csv");
        let analysis = analyze_file(&path, &AnalysisConfig::default()).unwrap();
        assert_eq!(analysis.dropped_rows, 4);
        assert!((11..=13).contains(&analysis.record.num_beats));
        assert_eq!(analysis.record.beats.len(), analysis.record.num_beats);
    }

    #[test]
    fn record_serializes_with_expected_keys() {
        let record = MetricsRecord {
            duration: 9.99,
            voltage_extremes: (-1.0, 1.0),
            num_beats: 0,
            mean_hr_bpm: 0.0,
            beats: vec![f64::NAN],
        };
        let js = serde_json::to_value(&record).unwrap();
        assert_eq!(
            js,
            serde_json::json!({
                "duration": 9.99,
                "voltage_extremes": [-1.0, 1.0],
                "num_beats": 0,
                "mean_hr_bpm": 0.0,
                "beats": [null],
            })
        );
        let back: MetricsRecord = serde_json::from_value(js).unwrap();
        assert!(back.beats[0].is_nan());
    }
}
