use crate::{
    config::AnalysisConfig,
    error::{AnalysisError, Result},
    filter::running_mean,
    signal::{mean, peak_intervals, IntervalBounds},
};
use log::{info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Regularity score of one offset candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OffsetScore {
    /// Standard deviation of the peak-to-peak intervals (samples).
    Regular(f64),
    /// Mean interval fell outside the plausible beat range.
    OutOfRange,
    /// Fewer than two peaks were found.
    TooFewPeaks,
}

/// Peaks chosen by the offset search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPeaks {
    pub peaks: Vec<usize>,
    pub offset_multiplier: f64,
}

#[derive(Debug, Clone)]
struct OffsetCandidate {
    multiplier: f64,
    peaks: Vec<usize>,
}

impl OffsetCandidate {
    fn score(&self, bounds: Option<&IntervalBounds>) -> OffsetScore {
        if self.peaks.len() < 2 {
            return OffsetScore::TooFewPeaks;
        }
        let intervals = peak_intervals(&self.peaks);
        let mean_interval = mean(&intervals);
        if let Some(bounds) = bounds {
            if !bounds.contains(mean_interval) {
                return OffsetScore::OutOfRange;
            }
        }
        let var = intervals
            .iter()
            .map(|d| (d - mean_interval).powi(2))
            .sum::<f64>()
            / intervals.len() as f64;
        OffsetScore::Regular(var.sqrt())
    }
}

/// Index of the best score.
///
/// The lowest regular score wins. With no regular score the last out-of-range candidate is
/// preferred over candidates without peaks (index 0 when there is none). All out-of-range
/// is an error.
pub fn argmin(scores: &[OffsetScore]) -> Result<usize> {
    let mut out_of_range = 0usize;
    let mut last_out_of_range = 0usize;
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.iter().enumerate() {
        match *score {
            OffsetScore::OutOfRange => {
                out_of_range += 1;
                last_out_of_range = i;
            }
            OffsetScore::TooFewPeaks => {}
            OffsetScore::Regular(v) => {
                if best.map_or(true, |(_, b)| v < b) {
                    best = Some((i, v));
                }
            }
        }
    }
    if out_of_range == scores.len() {
        return Err(AnalysisError::AllNan);
    }
    Ok(best.map_or(last_out_of_range, |(i, _)| i))
}

/// Find peak groups rising above the running mean shifted by `offset_multiplier`.
pub fn detect_peaks(
    voltage: &[f64],
    duration: f64,
    window_size_s: f64,
    offset_multiplier: f64,
) -> Result<Vec<usize>> {
    let baseline = running_mean(voltage, duration, window_size_s)?;
    let baseline_mean = mean(&baseline);
    Ok(group_peaks(voltage, &baseline, baseline_mean, offset_multiplier))
}

fn group_peaks(
    voltage: &[f64],
    baseline: &[f64],
    baseline_mean: f64,
    offset_multiplier: f64,
) -> Vec<usize> {
    let offset = if baseline_mean == 0.0 {
        0.1 * offset_multiplier
    } else {
        baseline_mean * offset_multiplier
    };
    let offset = offset.abs();

    let above: Vec<usize> = voltage
        .iter()
        .zip(baseline)
        .enumerate()
        .filter(|(_, (&v, &b))| v > b + offset)
        .map(|(i, _)| i)
        .collect();
    if above.len() <= 2 {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    let mut tip = above[0];
    for w in above.windows(2) {
        if w[1] - w[0] > 1 {
            peaks.push(tip);
            tip = w[1];
        } else if voltage[w[1]] > voltage[tip] {
            tip = w[1];
        }
    }
    peaks.push(tip);
    peaks
}

/// Search the offset menu for the multiplier giving the most regular plausible peak spacing.
///
/// When no candidate has a plausible mean interval, the menu is re-scored without the
/// plausibility gate and the least irregular candidate is accepted.
pub fn fit_peak(voltage: &[f64], duration: f64, cfg: &AnalysisConfig) -> Result<FittedPeaks> {
    let baseline = running_mean(voltage, duration, cfg.window_size_s)?;
    let baseline_mean = mean(&baseline);
    let bounds = IntervalBounds::new(voltage.len(), duration, cfg);

    let candidate = |&multiplier: &f64| OffsetCandidate {
        multiplier,
        peaks: group_peaks(voltage, &baseline, baseline_mean, multiplier),
    };
    #[cfg(feature = "parallel")]
    let candidates: Vec<OffsetCandidate> =
        cfg.offset_multipliers.par_iter().map(candidate).collect();
    #[cfg(not(feature = "parallel"))]
    let candidates: Vec<OffsetCandidate> = cfg.offset_multipliers.iter().map(candidate).collect();

    let scores: Vec<OffsetScore> = candidates.iter().map(|c| c.score(Some(&bounds))).collect();
    let best = match argmin(&scores) {
        Ok(idx) => idx,
        Err(AnalysisError::AllNan) => {
            warn!("signal is too noisy, readjusting offset factor");
            let relaxed: Vec<OffsetScore> = candidates.iter().map(|c| c.score(None)).collect();
            argmin(&relaxed)?
        }
        Err(e) => return Err(e),
    };

    let OffsetCandidate { multiplier, peaks } = candidates
        .into_iter()
        .nth(best)
        .ok_or_else(|| AnalysisError::InvalidConfig("offset_multipliers is empty".into()))?;
    info!(
        "raw R peak indexes obtained by offset factor {} ({} peaks)",
        multiplier,
        peaks.len()
    );
    Ok(FittedPeaks {
        peaks,
        offset_multiplier: multiplier,
    })
}
