use crate::error::{FlowError, Result};

/**
Piecewise-linear time series of a boundary flux.

Used for the water inlet (discharge, m³/s) and for the solute inlet (solute
mass flux). Values outside the tabulated range are held at the nearest
endpoint, both for point lookups and for integrals.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct Hydrogram {
    times: Vec<f64>,      // Knot times [s], strictly increasing
    values: Vec<f64>,     // Flux at each knot
    cumulative: Vec<f64>, // Integral from the first knot up to each knot
}

impl Hydrogram {
    pub fn new(points: &[(f64, f64)]) -> Result<Self> {
        if points.is_empty() {
            return Err(FlowError::invalid("hydrogram", "at least one point is required"));
        }
        if points.iter().any(|(t, q)| !t.is_finite() || !q.is_finite()) {
            return Err(FlowError::invalid("hydrogram", "non-finite value"));
        }
        if points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(FlowError::invalid(
                "hydrogram",
                "times must be strictly increasing",
            ));
        }

        let times: Vec<f64> = points.iter().map(|p| p.0).collect();
        let values: Vec<f64> = points.iter().map(|p| p.1).collect();
        let mut cumulative = Vec::with_capacity(points.len());
        cumulative.push(0.0);
        for i in 1..points.len() {
            let segment = 0.5 * (values[i - 1] + values[i]) * (times[i] - times[i - 1]);
            cumulative.push(cumulative[i - 1] + segment);
        }

        Ok(Hydrogram {
            times,
            values,
            cumulative,
        })
    }

    // Hydrogram holding the same value forever
    pub fn constant(value: f64) -> Self {
        Hydrogram {
            times: vec![0.0],
            values: vec![value],
            cumulative: vec![0.0],
        }
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    pub fn discharge_at(&self, t: f64) -> f64 {
        let last = self.times.len() - 1;
        if t <= self.times[0] {
            return self.values[0];
        }
        if t >= self.times[last] {
            return self.values[last];
        }
        // First knot strictly after t; 1 <= i <= last here
        let i = self.times.partition_point(|&ti| ti <= t);
        self.interpolate(i, t)
    }

    // Integral of the flux over [t1, t2]
    pub fn integrate(&self, t1: f64, t2: f64) -> f64 {
        self.primitive(t2) - self.primitive(t1)
    }

    // First knot time strictly after t, if any
    pub fn next_time_after(&self, t: f64) -> Option<f64> {
        let i = self.times.partition_point(|&ti| ti <= t);
        self.times.get(i).copied()
    }

    fn interpolate(&self, i: usize, t: f64) -> f64 {
        let (t1, t2) = (self.times[i - 1], self.times[i]);
        let (q1, q2) = (self.values[i - 1], self.values[i]);
        q1 + (t - t1) * (q2 - q1) / (t2 - t1)
    }

    // Integral from the first knot to t, with constant extension at both ends
    fn primitive(&self, t: f64) -> f64 {
        let last = self.times.len() - 1;
        if t <= self.times[0] {
            return self.values[0] * (t - self.times[0]);
        }
        if t >= self.times[last] {
            return self.cumulative[last] + self.values[last] * (t - self.times[last]);
        }
        let i = self.times.partition_point(|&ti| ti <= t);
        let q = self.interpolate(i, t);
        self.cumulative[i - 1] + 0.5 * (self.values[i - 1] + q) * (t - self.times[i - 1])
    }
}
