/// Frames quieter than this are treated as silence.
pub const RMS_GATE: f32 = 0.01;
pub const MIN_FREQUENCY_HZ: f32 = 40.0;
pub const MAX_FREQUENCY_HZ: f32 = 20000.0;

/// Autocorrelation pitch detector with a reusable correlation buffer.
///
/// The buffer grows to the largest frame seen and is reused afterwards, so a
/// steady stream of fixed-size frames never allocates after the first call.
pub struct AutocorrelationDetector {
    corr: Vec<f32>,
}

impl AutocorrelationDetector {
    pub fn new(frame_size: usize) -> Self {
        AutocorrelationDetector {
            corr: Vec::with_capacity(frame_size),
        }
    }

    /// Estimate the fundamental frequency of `frame`. `None` means no pitch:
    /// silence, an unusable frame, or a result outside 40 Hz..20 kHz.
    pub fn detect(&mut self, frame: &[f32], sample_rate: f32) -> Option<f32> {
        let n = frame.len();
        if n < 2 || !(sample_rate.is_finite() && sample_rate > 0.0) {
            return None;
        }

        // Step 1: RMS gate
        let energy: f32 = frame.iter().map(|s| s * s).sum();
        let rms = (energy / n as f32).sqrt();
        if !(rms >= RMS_GATE) {
            return None;
        }

        // Step 2: unnormalized autocorrelation over every lag
        self.corr.clear();
        self.corr.resize(n, 0.0);
        for lag in 0..n {
            let mut sum = 0.0f32;
            for j in 0..n - lag {
                sum += frame[j] * frame[j + lag];
            }
            self.corr[lag] = sum;
        }
        let c = &self.corr;

        // Step 3: walk down the zero-lag peak to the first local minimum
        let mut d = 0usize;
        while d < n - 2 && c[d] > c[d + 1] {
            d += 1;
        }

        // Step 4: strongest lag from there on is the period
        let mut max_val = -1.0f32;
        let mut period: Option<usize> = None;
        for (lag, &v) in c.iter().enumerate().skip(d) {
            if v > max_val {
                max_val = v;
                period = Some(lag);
            }
        }

        let period = match period {
            Some(p) if p > 0 => p,
            _ => return None,
        };

        // Step 5: sanity filter
        let hz = sample_rate / period as f32;
        if hz > MAX_FREQUENCY_HZ || hz < MIN_FREQUENCY_HZ {
            return None;
        }
        Some(hz)
    }
}

/// One-shot estimate; allocates its own buffer.
pub fn estimate_pitch(frame: &[f32], sample_rate: f32) -> Option<f32> {
    AutocorrelationDetector::new(frame.len()).detect(frame, sample_rate)
}
