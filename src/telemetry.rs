use std::collections::VecDeque;

/// Number of per-segment render durations kept for the rolling average.
const HISTORY_SIZE: usize = 60;

/// Bounded history of per-segment rasterization durations (milliseconds).
/// The oldest entry is evicted when the 61st is recorded.
#[derive(Debug, Default)]
pub struct RenderTelemetry {
    durations: VecDeque<f64>,
}

impl RenderTelemetry {
    pub fn new() -> Self {
        Self { durations: VecDeque::with_capacity(HISTORY_SIZE) }
    }

    /// Record one segment's render duration in milliseconds.
    pub fn record(&mut self, millis: f64) {
        if self.durations.len() == HISTORY_SIZE {
            self.durations.pop_front();
        }
        self.durations.push_back(millis);
    }

    /// Arithmetic mean of the retained history; 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.durations.is_empty() {
            return 0.0;
        }
        self.durations.iter().sum::<f64>() / self.durations.len() as f64
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_averages_zero() {
        assert_eq!(RenderTelemetry::new().average(), 0.0);
    }

    #[test]
    fn average_is_arithmetic_mean() {
        let mut t = RenderTelemetry::new();
        t.record(1.0);
        t.record(2.0);
        t.record(6.0);
        assert!((t.average() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn sixty_first_entry_evicts_the_oldest() {
        let mut t = RenderTelemetry::new();
        for _ in 0..HISTORY_SIZE {
            t.record(10.0);
        }
        assert_eq!(t.len(), HISTORY_SIZE);

        t.record(70.0);
        assert_eq!(t.len(), HISTORY_SIZE);
        // One 10.0 evicted: (59*10 + 70) / 60
        assert!((t.average() - 11.0).abs() < 1e-12);
    }
}
