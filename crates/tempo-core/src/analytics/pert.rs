//! Beta-PERT duration sampling.
//!
//! The PERT triple (O, M, P) parameterizes a Beta distribution with
//! α = 1 + 4(M − O)/(P − O) and β = 1 + 4(P − M)/(P − O), scaled onto
//! [O, P]. Beta variates are generated from two gamma variates
//! (Marsaglia–Tsang squeeze, Box–Muller normals) so sampling stays inside
//! the `rand` core API and remains bit-reproducible under a fixed seed.

use rand::rngs::StdRng;
use rand::Rng;

/// A Beta-PERT sampling distribution over task durations in days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaPert {
    optimistic: f64,
    most_likely: f64,
    pessimistic: f64,
    alpha: f64,
    beta: f64,
}

impl BetaPert {
    /// Builds the distribution. Inputs are reordered if necessary so that
    /// O ≤ M ≤ P always holds; O = P degenerates to a point mass at M.
    pub fn new(optimistic: f64, most_likely: f64, pessimistic: f64) -> Self {
        let mut values = [optimistic, most_likely, pessimistic];
        values.sort_by(|a, b| a.total_cmp(b));
        let [o, m, p] = values;
        let range = p - o;
        let (alpha, beta) = if range > f64::EPSILON {
            (1.0 + 4.0 * (m - o) / range, 1.0 + 4.0 * (p - m) / range)
        } else {
            (1.0, 1.0)
        };
        Self {
            optimistic: o,
            most_likely: m,
            pessimistic: p,
            alpha,
            beta,
        }
    }

    /// PERT mean: (O + 4M + P) / 6.
    pub fn mean(&self) -> f64 {
        (self.optimistic + 4.0 * self.most_likely + self.pessimistic) / 6.0
    }

    pub fn most_likely(&self) -> f64 {
        self.most_likely
    }

    /// Whether the distribution collapses to a point mass.
    pub fn is_degenerate(&self) -> bool {
        self.pessimistic - self.optimistic <= f64::EPSILON
    }

    /// Draws one duration in days, always within [O, P].
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        if self.is_degenerate() {
            return self.most_likely;
        }
        let x = sample_gamma(rng, self.alpha);
        let y = sample_gamma(rng, self.beta);
        let fraction = if x + y > 0.0 { x / (x + y) } else { 0.5 };
        self.optimistic + fraction * (self.pessimistic - self.optimistic)
    }
}

// Marsaglia-Tsang for shape >= 1; the PERT construction guarantees
// alpha, beta >= 1 so the shape-boost branch for a < 1 is unnecessary.
fn sample_gamma(rng: &mut StdRng, shape: f64) -> f64 {
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = sample_standard_normal(rng);
        let v = (1.0 + c * x).powi(3);
        if v <= 0.0 {
            continue;
        }
        let u: f64 = rng.gen();
        if u < 1.0 - 0.0331 * x.powi(4) {
            return d * v;
        }
        if u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

// Box-Muller transform.
fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    loop {
        let u1: f64 = rng.gen();
        if u1 > f64::MIN_POSITIVE {
            let u2: f64 = rng.gen();
            return (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        }
    }
}
