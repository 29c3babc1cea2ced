/// Continuous simulation clock with a fixed nominal step.
///
/// Each tick advances by one step but never past the requested limit, so
/// event times and the final horizon are hit exactly.
///
/// # Examples
///
/// ```
/// use dynsim::sim::clock::Clock;
///
/// let mut clock = Clock::new(0.0, 0.4);
/// assert_eq!(clock.tick(1.0), Some(0.4));
/// assert_eq!(clock.tick(1.0), Some(0.8));
/// assert_eq!(clock.tick(1.0), Some(1.0));
/// assert_eq!(clock.tick(1.0), None);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Current simulated time (s)
    current: f64,
    /// Nominal step (s)
    step: f64,
}

/// Remainders shorter than this fraction of a step are merged into the step.
const SNAP_FRACTION: f64 = 1e-6;

impl Clock {
    /// Creates a clock at `start` with nominal step `step`.
    ///
    /// # Panics
    ///
    /// Panics if `start` is not finite or `step` is not strictly positive
    /// and finite.
    pub fn new(start: f64, step: f64) -> Self {
        assert!(start.is_finite(), "start must be finite");
        assert!(step.is_finite() && step > 0.0, "step must be > 0");
        Self {
            current: start,
            step,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> f64 {
        self.current
    }

    /// Nominal step.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Advances by at most one step without passing `limit`.
    ///
    /// # Returns
    ///
    /// * `Some(t)` - The new time
    /// * `None` - If the clock has already reached `limit`, or `limit` is
    ///   not finite
    pub fn tick(&mut self, limit: f64) -> Option<f64> {
        debug_assert!(limit.is_finite(), "tick limit must be finite, got {limit}");
        if !limit.is_finite() {
            return None;
        }
        let snap = self.step * SNAP_FRACTION;
        if self.current >= limit - snap {
            return None;
        }
        let mut next = self.current + self.step;
        if next > limit - snap {
            next = limit;
        }
        self.current = next;
        Some(next)
    }
}
