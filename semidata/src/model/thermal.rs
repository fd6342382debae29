use std::fmt;

use crate::error::ValidationErrorKind;

/// Topology of the thermal RC ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalTopology {
    Cauer,
    Foster,
}

impl ThermalTopology {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "cauer" => Some(Self::Cauer),
            "foster" => Some(Self::Foster),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cauer => "Cauer",
            Self::Foster => "Foster",
        }
    }
}

impl fmt::Display for ThermalTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rung of the ladder: resistance in K/W, capacitance in J/K.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RcLayer {
    pub resistance: f64,
    pub capacitance: f64,
}

impl RcLayer {
    pub fn time_constant(&self) -> f64 {
        self.resistance * self.capacitance
    }
}

/// Thermal RC network ordered junction to case. Layer order is
/// significant and never changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalNetwork {
    topology: ThermalTopology,
    layers: Vec<RcLayer>,
}

/// Integration substeps between two consecutive output times.
const SUBSTEPS: usize = 4;

impl ThermalNetwork {
    pub fn new(topology: ThermalTopology, layers: Vec<RcLayer>) -> Result<Self, ValidationErrorKind> {
        if layers.is_empty() {
            return Err(ValidationErrorKind::LengthMismatch {
                expected: 1,
                found: 0,
            });
        }
        for layer in &layers {
            if !layer.resistance.is_finite() || !layer.capacitance.is_finite() {
                return Err(ValidationErrorKind::NotFinite);
            }
            if layer.resistance <= 0.0 || layer.capacitance < 0.0 {
                return Err(ValidationErrorKind::OutOfRange(format!(
                    "layer needs R > 0 and C >= 0, found R={} C={}",
                    layer.resistance, layer.capacitance
                )));
            }
        }
        Ok(Self { topology, layers })
    }

    pub fn topology(&self) -> ThermalTopology {
        self.topology
    }

    pub fn layers(&self) -> &[RcLayer] {
        &self.layers
    }

    /// Junction-to-case resistance, recomputed on every call.
    pub fn total_resistance(&self) -> f64 {
        self.layers.iter().map(|l| l.resistance).sum()
    }

    /// Log-spaced time grid (seconds) covering the network's dynamics.
    ///
    /// Foster terms are independent, so ten times the summed time constants
    /// covers them. A Cauer ladder's slowest mode is bounded by
    /// `(ΣR)·(ΣC)` instead, which can be far larger when capacitance sits
    /// near the junction.
    pub fn time_grid(&self, points: usize) -> Vec<f64> {
        let taus: Vec<f64> = self
            .layers
            .iter()
            .map(RcLayer::time_constant)
            .filter(|tau| *tau > 0.0)
            .collect();
        let shortest = taus.iter().copied().fold(f64::INFINITY, f64::min);
        let t_min = if shortest.is_finite() {
            shortest / 100.0
        } else {
            1e-6
        };
        let slowest = match self.topology {
            ThermalTopology::Foster => taus.iter().sum::<f64>(),
            ThermalTopology::Cauer => {
                self.total_resistance() * self.layers.iter().map(|l| l.capacitance).sum::<f64>()
            }
        };
        let mut t_max = slowest * 10.0;
        if t_max <= t_min {
            t_max = t_min * 1e4;
        }
        log_space(t_min, t_max, points.max(2))
    }

    /// Junction temperature rise for a 1 W power step, sampled at `times`
    /// (seconds, ascending).
    pub fn step_response(&self, times: &[f64]) -> Vec<f64> {
        match self.topology {
            ThermalTopology::Foster => self.foster_response(times),
            ThermalTopology::Cauer => self.cauer_response(times),
        }
    }

    fn foster_response(&self, times: &[f64]) -> Vec<f64> {
        times
            .iter()
            .map(|&t| {
                self.layers
                    .iter()
                    .map(|l| {
                        let tau = l.time_constant();
                        if tau > 0.0 {
                            l.resistance * (1.0 - (-t / tau).exp())
                        } else {
                            l.resistance
                        }
                    })
                    .sum()
            })
            .collect()
    }

    /// Implicit Euler on `C dT/dt = -G T + P`, node 0 being the junction and
    /// the last resistance tied to ambient.
    fn cauer_response(&self, times: &[f64]) -> Vec<f64> {
        let n = self.layers.len();
        let g: Vec<f64> = self.layers.iter().map(|l| 1.0 / l.resistance).collect();
        let mut temps = vec![0.0; n];
        let mut previous = 0.0;
        let mut out = Vec::with_capacity(times.len());

        for &t in times {
            let span = (t - previous).max(0.0);
            let dt = span / SUBSTEPS as f64;
            if dt > 0.0 {
                for _ in 0..SUBSTEPS {
                    let mut sub = vec![0.0; n];
                    let mut diag = vec![0.0; n];
                    let mut sup = vec![0.0; n];
                    let mut rhs = vec![0.0; n];
                    for k in 0..n {
                        let c_dt = self.layers[k].capacitance / dt;
                        diag[k] = c_dt + g[k] + if k > 0 { g[k - 1] } else { 0.0 };
                        if k > 0 {
                            sub[k] = -g[k - 1];
                        }
                        if k + 1 < n {
                            sup[k] = -g[k];
                        }
                        rhs[k] = c_dt * temps[k];
                    }
                    rhs[0] += 1.0;
                    temps = solve_tridiagonal(&sub, &diag, &sup, &rhs);
                }
            }
            previous = t;
            out.push(temps[0]);
        }
        out
    }
}

fn log_space(start: f64, end: f64, points: usize) -> Vec<f64> {
    let (a, b) = (start.log10(), end.log10());
    let step = (b - a) / (points - 1) as f64;
    (0..points)
        .map(|k| 10f64.powf(a + step * k as f64))
        .collect()
}

/// Thomas algorithm. The ladder matrix is diagonally dominant, so no
/// pivoting is needed.
fn solve_tridiagonal(sub: &[f64], diag: &[f64], sup: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c = vec![0.0; n];
    let mut d = vec![0.0; n];
    c[0] = sup[0] / diag[0];
    d[0] = rhs[0] / diag[0];
    for k in 1..n {
        let m = diag[k] - sub[k] * c[k - 1];
        c[k] = sup[k] / m;
        d[k] = (rhs[k] - sub[k] * d[k - 1]) / m;
    }
    let mut x = vec![0.0; n];
    x[n - 1] = d[n - 1];
    for k in (0..n - 1).rev() {
        x[k] = d[k] - c[k] * x[k + 1];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn network(topology: ThermalTopology, layers: &[(f64, f64)]) -> ThermalNetwork {
        ThermalNetwork::new(
            topology,
            layers
                .iter()
                .map(|&(resistance, capacitance)| RcLayer {
                    resistance,
                    capacitance,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn total_resistance_sums_layers() {
        let net = network(ThermalTopology::Cauer, &[(0.1, 0.01), (0.2, 0.02)]);
        assert_relative_eq!(net.total_resistance(), 0.3, max_relative = 1e-12);
    }

    #[test]
    fn rejects_empty_and_negative_layers() {
        assert!(ThermalNetwork::new(ThermalTopology::Cauer, vec![]).is_err());
        assert!(ThermalNetwork::new(
            ThermalTopology::Cauer,
            vec![RcLayer {
                resistance: -1.0,
                capacitance: 0.1
            }]
        )
        .is_err());
    }

    #[test]
    fn cauer_settles_at_total_resistance() {
        let net = network(ThermalTopology::Cauer, &[(0.1, 0.01), (0.2, 0.02), (0.3, 0.5)]);
        let grid = net.time_grid(400);
        let z = net.step_response(&grid);
        assert_relative_eq!(*z.last().unwrap(), 0.6, max_relative = 1e-3);
        assert!(z.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }

    #[test]
    fn cauer_grid_reaches_slow_junction_mode() {
        // Large capacitance at the junction behind a small resistance: the
        // slow mode is about (R1 + R2) * C1 = 10.1 s, not R1*C1 + R2*C2.
        let net = network(ThermalTopology::Cauer, &[(0.01, 10.0), (1.0, 0.0)]);
        let grid = net.time_grid(200);
        assert!(*grid.last().unwrap() >= 100.0);
        let z = net.step_response(&grid);
        assert_relative_eq!(*z.last().unwrap(), 1.01, max_relative = 1e-3);
    }

    #[test]
    fn single_layer_cauer_matches_closed_form() {
        let cauer = network(ThermalTopology::Cauer, &[(0.5, 0.02)]);
        let foster = network(ThermalTopology::Foster, &[(0.5, 0.02)]);
        let grid = cauer.time_grid(400);
        let numeric = cauer.step_response(&grid);
        let exact = foster.step_response(&grid);
        for (a, b) in numeric.iter().zip(&exact) {
            assert_relative_eq!(*a, *b, max_relative = 2e-2);
        }
    }

    #[test]
    fn time_grid_is_log_spaced_and_increasing() {
        let net = network(ThermalTopology::Foster, &[(0.1, 0.01), (0.2, 0.02)]);
        let grid = net.time_grid(50);
        assert_eq!(grid.len(), 50);
        assert!(grid.windows(2).all(|w| w[1] > w[0]));
        assert_relative_eq!(grid[0], 0.001 / 100.0, max_relative = 1e-9);
    }
}
