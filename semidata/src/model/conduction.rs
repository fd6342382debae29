use std::fmt;

use crate::error::ValidationErrorKind;
use crate::model::axis::Axis;
use crate::model::loss::ComputationMethod;

/// Conduction-loss curve selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gate {
    On,
    Off,
}

impl Gate {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "on" => Some(Gate::On),
            "off" => Some(Gate::Off),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gate::On => "on",
            Gate::Off => "off",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conduction direction of a branch of a V-I curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

/// Voltage drop per temperature, aligned index-for-index with the current
/// axis. Flat arena, temperature-major. True voltage is `value * scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveTable {
    pub(crate) scale: f64,
    pub(crate) shape: [usize; 2],
    pub(crate) values: Vec<f64>,
}

impl CurveTable {
    pub fn new(scale: f64, shape: [usize; 2], values: Vec<f64>) -> Result<Self, ValidationErrorKind> {
        if !scale.is_finite() || scale == 0.0 {
            return Err(ValidationErrorKind::OutOfRange(format!(
                "scale must be finite and non-zero, found {scale}"
            )));
        }
        let expected = shape[0] * shape[1];
        if values.len() != expected {
            return Err(ValidationErrorKind::LengthMismatch {
                expected,
                found: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ValidationErrorKind::NotFinite);
        }
        Ok(Self {
            scale,
            shape,
            values,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// `[temperatures, currents]`
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn get(&self, t: usize, i: usize) -> Option<f64> {
        let [nt, ni] = self.shape;
        if t >= nt || i >= ni {
            return None;
        }
        self.values.get(t * ni + i).copied()
    }

    pub fn row(&self, t: usize) -> &[f64] {
        let ni = self.shape[1];
        let start = t * ni;
        self.values.get(start..start + ni).unwrap_or(&[])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// V-I curve family for one gate state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConductionCurveSet {
    pub(crate) gate: Gate,
    pub(crate) computation_method: ComputationMethod,
    pub(crate) formula: Option<String>,
    pub(crate) temperature_axis: Axis,
    pub(crate) current_axis: Axis,
    pub(crate) voltage_drop: CurveTable,
}

/// One conduction direction of a curve set, with its own current axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ConductionBranch {
    pub gate: Gate,
    pub direction: Direction,
    pub currents: Vec<f64>,
    /// Scaled voltage drop per temperature, aligned with `currents`.
    pub voltages: Vec<Vec<f64>>,
}

impl ConductionCurveSet {
    pub fn new(
        gate: Gate,
        computation_method: ComputationMethod,
        formula: Option<String>,
        temperature_axis: Axis,
        current_axis: Axis,
        voltage_drop: CurveTable,
    ) -> Result<Self, ValidationErrorKind> {
        let axes = [temperature_axis.len(), current_axis.len()];
        if voltage_drop.shape != axes {
            return Err(ValidationErrorKind::LengthMismatch {
                expected: axes[0] * axes[1],
                found: voltage_drop.values.len(),
            });
        }
        Ok(Self {
            gate,
            computation_method,
            formula,
            temperature_axis,
            current_axis,
            voltage_drop,
        })
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    pub fn computation_method(&self) -> ComputationMethod {
        self.computation_method
    }

    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn temperature_axis(&self) -> &Axis {
        &self.temperature_axis
    }

    pub fn current_axis(&self) -> &Axis {
        &self.current_axis
    }

    pub fn voltage_drop(&self) -> &CurveTable {
        &self.voltage_drop
    }

    /// Split the family into forward (`I >= 0`) and reverse (`I <= 0`)
    /// branches. The origin may belong to both; a side holding nothing but the
    /// origin is dropped when the other side has points of its own, and an
    /// axis that is only the origin yields one forward branch. Branches may
    /// have a single point.
    pub fn branches(&self) -> Vec<ConductionBranch> {
        let currents = self.current_axis.values();
        let has_positive = currents.iter().any(|i| *i > 0.0);
        let has_negative = currents.iter().any(|i| *i < 0.0);
        let mut branches = Vec::new();
        for direction in [Direction::Forward, Direction::Reverse] {
            let keep = match direction {
                Direction::Forward => has_positive || !has_negative,
                Direction::Reverse => has_negative,
            };
            if !keep {
                continue;
            }
            let indices: Vec<usize> = currents
                .iter()
                .enumerate()
                .filter(|(_, i)| match direction {
                    Direction::Forward => **i >= 0.0,
                    Direction::Reverse => **i <= 0.0,
                })
                .map(|(idx, _)| idx)
                .collect();
            if indices.is_empty() {
                continue;
            }
            let currents = indices
                .iter()
                .map(|idx| self.current_axis.values()[*idx])
                .collect();
            let voltages = (0..self.temperature_axis.len())
                .map(|t| {
                    let row = self.voltage_drop.row(t);
                    indices
                        .iter()
                        .map(|idx| row[*idx] * self.voltage_drop.scale)
                        .collect()
                })
                .collect();
            branches.push(ConductionBranch {
                gate: self.gate,
                direction,
                currents,
                voltages,
            });
        }
        branches
    }
}

/// Conduction curve families keyed by gate state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConductionLoss {
    pub(crate) on: Option<ConductionCurveSet>,
    pub(crate) off: Option<ConductionCurveSet>,
}

impl ConductionLoss {
    /// Insert a curve set under its gate. A second set for the same gate is
    /// rejected.
    pub fn insert(&mut self, set: ConductionCurveSet) -> Result<(), ValidationErrorKind> {
        let slot = match set.gate {
            Gate::On => &mut self.on,
            Gate::Off => &mut self.off,
        };
        if slot.is_some() {
            return Err(ValidationErrorKind::Duplicate(format!(
                "conduction curve set for gate \"{}\"",
                set.gate
            )));
        }
        *slot = Some(set);
        Ok(())
    }

    pub fn get(&self, gate: Gate) -> Option<&ConductionCurveSet> {
        match gate {
            Gate::On => self.on.as_ref(),
            Gate::Off => self.off.as_ref(),
        }
    }

    /// Curve sets in `on`, `off` order.
    pub fn iter(&self) -> impl Iterator<Item = &ConductionCurveSet> {
        self.on.iter().chain(self.off.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.on.is_none() && self.off.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve_set(gate: Gate, currents: &[f64], rows: &[&[f64]]) -> ConductionCurveSet {
        let temps: Vec<f64> = (0..rows.len()).map(|t| 25.0 + 100.0 * t as f64).collect();
        let values = rows.iter().flat_map(|r| r.iter().copied()).collect();
        ConductionCurveSet::new(
            gate,
            ComputationMethod::TableOnly,
            None,
            Axis::new(temps).unwrap(),
            Axis::new(currents.to_vec()).unwrap(),
            CurveTable::new(1.0, [rows.len(), currents.len()], values).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn splits_bidirectional_curves() {
        let set = curve_set(
            Gate::On,
            &[-20.0, -10.0, 0.0, 10.0, 20.0],
            &[&[-2.0, -1.0, 0.0, 1.0, 2.0]],
        );
        let branches = set.branches();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].direction, Direction::Forward);
        assert_eq!(branches[0].currents, vec![0.0, 10.0, 20.0]);
        assert_eq!(branches[0].voltages[0], vec![0.0, 1.0, 2.0]);
        assert_eq!(branches[1].direction, Direction::Reverse);
        assert_eq!(branches[1].currents, vec![-20.0, -10.0, 0.0]);
    }

    #[test]
    fn forward_only_curves_have_one_branch() {
        let set = curve_set(Gate::Off, &[0.0, 5.0, 10.0], &[&[0.7, 0.9, 1.1]]);
        let branches = set.branches();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].direction, Direction::Forward);
    }

    #[test]
    fn single_point_axes_keep_their_branch() {
        let forward = curve_set(Gate::On, &[20.0], &[&[1.4], &[1.7]]).branches();
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].direction, Direction::Forward);
        assert_eq!(forward[0].currents, vec![20.0]);
        assert_eq!(forward[0].voltages, vec![vec![1.4], vec![1.7]]);

        let reverse = curve_set(Gate::Off, &[-40.0], &[&[-3.0]]).branches();
        assert_eq!(reverse.len(), 1);
        assert_eq!(reverse[0].direction, Direction::Reverse);

        let origin = curve_set(Gate::Off, &[0.0], &[&[0.0]]).branches();
        assert_eq!(origin.len(), 1);
        assert_eq!(origin[0].direction, Direction::Forward);
    }

    #[test]
    fn reverse_only_curves_drop_the_origin_side() {
        let branches = curve_set(Gate::Off, &[-40.0, -20.0, 0.0], &[&[-3.0, -1.5, 0.0]]).branches();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].direction, Direction::Reverse);
        assert_eq!(branches[0].currents, vec![-40.0, -20.0, 0.0]);
    }

    #[test]
    fn rejects_duplicate_gate() {
        let mut loss = ConductionLoss::default();
        loss.insert(curve_set(Gate::On, &[0.0, 1.0], &[&[0.0, 1.0]]))
            .unwrap();
        let err = loss
            .insert(curve_set(Gate::On, &[0.0, 2.0], &[&[0.0, 1.0]]))
            .unwrap_err();
        assert!(matches!(err, ValidationErrorKind::Duplicate(_)));
    }

    #[test]
    fn iterates_on_before_off() {
        let mut loss = ConductionLoss::default();
        loss.insert(curve_set(Gate::Off, &[0.0, 1.0], &[&[0.0, 1.0]]))
            .unwrap();
        loss.insert(curve_set(Gate::On, &[0.0, 1.0], &[&[0.0, 1.0]]))
            .unwrap();
        let gates: Vec<Gate> = loss.iter().map(|s| s.gate()).collect();
        assert_eq!(gates, vec![Gate::On, Gate::Off]);
    }
}
