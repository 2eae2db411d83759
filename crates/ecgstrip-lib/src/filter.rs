use crate::error::{AnalysisError, Result};
use log::{error, warn};

/// Box-filter running mean of `values` over `window_size_s` seconds.
///
/// The window length in samples is `floor(len / duration * window_size_s)`. Odd windows are
/// centred and padded by mirroring without repeating the edge sample; even windows reach
/// `size/2` samples back and `size/2 - 1` forward, padded by reflecting with the edge sample
/// repeated. A window of two averages each sample with its predecessor.
///
/// ```
/// use ecgstrip_lib::filter::running_mean;
/// let smoothed = running_mean(&[12.0, -9.0, -6.0, 0.0, 1.0, 5.0], 6.0, 4.0).unwrap();
/// assert!((smoothed[1] - 2.25).abs() < 1e-12);
/// ```
pub fn running_mean(values: &[f64], duration: f64, window_size_s: f64) -> Result<Vec<f64>> {
    let len = values.len();
    let frequency = len as f64 / duration;
    let raw_size = (frequency * window_size_s).trunc();
    let size = if raw_size.is_finite() && raw_size > 0.0 {
        raw_size as usize
    } else {
        0
    };
    if size == 0 || size > 2 * len {
        error!("failed to calculate the running mean: window of {} samples", size);
        return Err(AnalysisError::InvalidWindow { size, len });
    }
    if size == 1 {
        warn!("running mean with a one-sample window returns the input unchanged");
        return Ok(values.to_vec());
    }

    let (before, after, reflect): (usize, usize, fn(isize, usize) -> usize) = if size % 2 == 0 {
        (size / 2, size / 2 - 1, reflect_with_edge)
    } else {
        (size / 2, size / 2, mirror_without_edge)
    };
    let padded: Vec<f64> = (-(before as isize)..(len + after) as isize)
        .map(|i| values[reflect(i, len)])
        .collect();
    Ok(padded
        .windows(size)
        .map(|w| w.iter().sum::<f64>() / size as f64)
        .collect())
}

/// d c b a | a b c d | d c b a
fn reflect_with_edge(i: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let r = i.rem_euclid(period);
    if r < len as isize {
        r as usize
    } else {
        (period - 1 - r) as usize
    }
}

/// d c b | a b c d | c b a
fn mirror_without_edge(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * len as isize - 2;
    let r = i.rem_euclid(period);
    if r < len as isize {
        r as usize
    } else {
        (period - r) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: [f64; 6] = [12.0, -9.0, -6.0, 0.0, 1.0, 5.0];

    fn assert_all_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn even_window_reflects_with_edge() {
        // padded: -9 12 | 12 -9 -6 0 1 5 | 5
        let out = running_mean(&SAMPLE, 6.0, 4.0).unwrap();
        assert_all_close(&out, &[1.5, 2.25, -0.75, -3.5, 0.0, 2.75]);
    }

    #[test]
    fn odd_window_mirrors_without_edge() {
        // padded: -9 | 12 -9 -6 0 1 5 | 1
        let out = running_mean(&SAMPLE, 6.0, 3.0).unwrap();
        assert_all_close(&out, &[-2.0, -1.0, -5.0, -5.0 / 3.0, 2.0, 7.0 / 3.0]);
    }

    #[test]
    fn two_sample_window_averages_with_previous() {
        let out = running_mean(&SAMPLE, 6.0, 2.0).unwrap();
        assert_all_close(&out, &[12.0, 1.5, -7.5, -3.0, 0.5, 3.0]);
    }

    #[test]
    fn one_sample_window_is_identity() {
        let out = running_mean(&SAMPLE, 6.0, 1.0).unwrap();
        assert_eq!(out, SAMPLE.to_vec());
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = running_mean(&SAMPLE, 6.0, 0.5).unwrap_err();
        assert_eq!(err, AnalysisError::InvalidWindow { size: 0, len: 6 });
    }

    #[test]
    fn window_beyond_twice_the_series_is_rejected() {
        let err = running_mean(&SAMPLE, 6.0, 13.0).unwrap_err();
        assert_eq!(err, AnalysisError::InvalidWindow { size: 13, len: 6 });
    }

    #[test]
    fn window_longer_than_series_keeps_length() {
        let out = running_mean(&SAMPLE, 6.0, 12.0).unwrap();
        assert_eq!(out.len(), SAMPLE.len());
        let out = running_mean(&SAMPLE, 6.0, 11.0).unwrap();
        assert_eq!(out.len(), SAMPLE.len());
    }

    #[test]
    fn constant_signal_is_unchanged() {
        let data = vec![0.4; 50];
        let out = running_mean(&data, 0.5, 0.07).unwrap();
        assert_all_close(&out, &data);
    }

    proptest! {
        #[test]
        fn prop_output_length_matches_input(
            data in proptest::collection::vec(-5.0f64..5.0, 1..120),
            window in 1usize..240,
        ) {
            prop_assume!(window <= 2 * data.len());
            let duration = data.len() as f64;
            let out = running_mean(&data, duration, window as f64).unwrap();
            prop_assert_eq!(out.len(), data.len());
        }
    }
}
