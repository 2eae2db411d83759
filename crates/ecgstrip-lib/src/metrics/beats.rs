use crate::{
    config::AnalysisConfig,
    error::Result,
    filter::running_mean,
    signal::{mean, peak_intervals, IntervalBounds},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// Beat count, heart rate and beat times derived from a peak list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatSummary {
    pub num_beats: usize,
    pub mean_hr_bpm: f64,
    pub beats: Vec<f64>,
}

impl BeatSummary {
    /// "No discernible heartbeat": zero beats, zero BPM and a single NaN timestamp.
    pub fn no_beats() -> Self {
        Self {
            num_beats: 0,
            mean_hr_bpm: 0.0,
            beats: vec![f64::NAN],
        }
    }

    pub fn is_no_beats(&self) -> bool {
        self.num_beats == 0
            && self.mean_hr_bpm == 0.0
            && self.beats.len() == 1
            && self.beats[0].is_nan()
    }
}

/// Turn detected peaks into beats.
///
/// `peaks` must be increasing indices into `voltage` and `time`. When peaks come faster than
/// the shortest plausible interval, low peaks are pruned against a progressively shifted
/// running mean of the peak heights until the spacing is plausible. Intervals outside the
/// plausible range are then discarded.
pub fn analyse(
    voltage: &[f64],
    time: &[f64],
    duration: f64,
    peaks: &[usize],
    cfg: &AnalysisConfig,
) -> Result<BeatSummary> {
    if peaks.len() < 2 {
        error!("too few peaks to analyse");
        return Ok(BeatSummary::no_beats());
    }
    let bounds = IntervalBounds::new(voltage.len(), duration, cfg);

    let mut accepted = peaks.to_vec();
    let mut intervals = peak_intervals(peaks);
    if mean(&intervals) < bounds.lower {
        warn!("peaks closer than {:.1} samples, filtering low peaks", bounds.lower);
        let heights: Vec<f64> = peaks.iter().map(|&p| voltage[p]).collect();
        let mut curve = running_mean(&heights, heights.len() as f64, cfg.refilter_window)?;
        let mut factor = cfg.refilter_start_factor;
        let mut rounds = 0;
        while mean(&intervals) < bounds.lower {
            if rounds == cfg.max_refilter_rounds {
                error!("gave up filtering after {} rounds", rounds);
                return Ok(BeatSummary::no_beats());
            }
            rounds += 1;
            let curve_mean = mean(&curve);
            let offset = if curve_mean == 0.0 {
                0.1 * factor
            } else {
                curve_mean.abs() * factor
            };
            curve.iter_mut().for_each(|c| *c -= offset);
            accepted = peaks
                .iter()
                .zip(heights.iter().zip(&curve))
                .filter(|(_, (h, c))| h > c)
                .map(|(&p, _)| p)
                .collect();
            if accepted.len() < 2 {
                error!("failed to analyse the signal due to strong noise");
                return Ok(BeatSummary::no_beats());
            }
            intervals = peak_intervals(&accepted);
            factor -= cfg.refilter_step;
        }
    }

    let kept: Vec<usize> = intervals
        .iter()
        .enumerate()
        .filter(|(_, &d)| bounds.contains(d))
        .map(|(i, _)| i)
        .collect();
    let Some(&last) = kept.last() else {
        error!("no beat interval within the plausible range");
        return Ok(BeatSummary::no_beats());
    };

    let kept_mean = kept.iter().map(|&i| intervals[i]).sum::<f64>() / kept.len() as f64;
    let bpm = 60.0 * voltage.len() as f64 / (kept_mean * duration);
    let beats: Vec<f64> = kept
        .iter()
        .copied()
        .chain(std::iter::once(last + 1))
        .map(|i| time[accepted[i]])
        .collect();
    info!("analysis completed: {} beats at {:.1} bpm", beats.len(), bpm);
    Ok(BeatSummary {
        num_beats: beats.len(),
        mean_hr_bpm: round_bpm(bpm),
        beats,
    })
}

/// Round to one decimal, ties to even.
///
/// A double can only sit exactly on a `.x5` tie when its fraction is a quarter, so only
/// those values take the even neighbour.
fn round_bpm(bpm: f64) -> f64 {
    let scaled = bpm * 10.0;
    let floor = scaled.floor();
    let exact_tie = (bpm * 4.0).fract() == 0.0 && scaled - floor == 0.5;
    let rounded = if !exact_tie {
        scaled.round()
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    };
    rounded / 10.0
}
