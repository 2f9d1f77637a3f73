//! Progress window for looping and stall detection.

/// Outcome of a progress update.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Progress {
    Improving,
    Stalled,
    Looping,
}

/// Remembers the last few status checks and reports when neither the
/// objective nor the infeasibility has improved across the whole window.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    objective: Vec<f64>,
    infeasibility: Vec<f64>,
    iteration: Vec<usize>,
    head: usize,
    filled: usize,
    bad_times: usize,

    pub window: usize,
    pub rel_improvement: f64,
    pub looping_after: usize,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::with_window(5)
    }
}

impl ProgressTracker {
    pub fn with_window(window: usize) -> Self {
        let window = window.max(2);
        Self {
            objective: vec![f64::INFINITY; window],
            infeasibility: vec![f64::INFINITY; window],
            iteration: vec![usize::MAX; window],
            head: 0,
            filled: 0,
            bad_times: 0,
            window,
            rel_improvement: 1e-9,
            looping_after: 3,
        }
    }

    pub fn reset(&mut self) {
        self.objective.fill(f64::INFINITY);
        self.infeasibility.fill(f64::INFINITY);
        self.iteration.fill(usize::MAX);
        self.head = 0;
        self.filled = 0;
        self.bad_times = 0;
    }

    fn last_index(&self) -> Option<usize> {
        if self.filled == 0 {
            None
        } else {
            Some((self.head + self.window - 1) % self.window)
        }
    }

    /// Infeasibility recorded at the previous check.
    pub fn last_infeasibility(&self) -> Option<f64> {
        self.last_index().map(|i| self.infeasibility[i])
    }

    pub fn bad_times(&self) -> usize {
        self.bad_times
    }

    pub fn update(&mut self, objective: f64, infeasibility: f64, iteration: usize) -> Progress {
        if let Some(last) = self.last_index() {
            if self.iteration[last] == iteration {
                // Nothing happened since the previous check.
                return Progress::Improving;
            }
        }

        let oldest = self.head;
        let full = self.filled == self.window;
        let progress = if full {
            let old_obj = self.objective[oldest];
            let old_inf = self.infeasibility[oldest];
            let obj_better = objective < old_obj - self.rel_improvement * old_obj.abs().max(1.0);
            let inf_better =
                infeasibility < old_inf - self.rel_improvement * old_inf.abs().max(1.0);
            if obj_better || inf_better {
                self.bad_times = 0;
                Progress::Improving
            } else {
                self.bad_times += 1;
                if self.bad_times >= self.looping_after {
                    Progress::Looping
                } else {
                    Progress::Stalled
                }
            }
        } else {
            Progress::Improving
        };

        self.objective[self.head] = objective;
        self.infeasibility[self.head] = infeasibility;
        self.iteration[self.head] = iteration;
        self.head = (self.head + 1) % self.window;
        self.filled = (self.filled + 1).min(self.window);
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improving_sequence() {
        let mut p = ProgressTracker::with_window(3);
        for k in 0..10 {
            assert_eq!(p.update(100.0 - k as f64, 0.0, k), Progress::Improving);
        }
    }

    #[test]
    fn test_flat_sequence_loops() {
        let mut p = ProgressTracker::with_window(3);
        let mut outcomes = Vec::new();
        for k in 0..8 {
            outcomes.push(p.update(5.0, 1.0, k));
        }
        assert_eq!(&outcomes[..3], &[Progress::Improving; 3]);
        assert_eq!(outcomes[3], Progress::Stalled);
        assert_eq!(outcomes[4], Progress::Stalled);
        assert_eq!(outcomes[5], Progress::Looping);
    }

    #[test]
    fn test_same_iteration_is_ignored() {
        let mut p = ProgressTracker::with_window(2);
        p.update(1.0, 0.0, 7);
        for _ in 0..10 {
            assert_eq!(p.update(1.0, 0.0, 7), Progress::Improving);
        }
        assert_eq!(p.bad_times(), 0);
        assert_eq!(p.last_infeasibility(), Some(0.0));
    }
}
