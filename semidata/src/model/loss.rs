use std::fmt;

use crate::error::ValidationErrorKind;
use crate::model::axis::Axis;

/// How PLECS evaluates a loss table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationMethod {
    TableOnly,
    Formula,
}

impl ComputationMethod {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "table only" | "table" | "table-based" | "table based" => Some(Self::TableOnly),
            "formula" | "formula-based" | "formula based" => Some(Self::Formula),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TableOnly => "Table only",
            Self::Formula => "Formula",
        }
    }
}

impl Default for ComputationMethod {
    fn default() -> Self {
        Self::TableOnly
    }
}

impl fmt::Display for ComputationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Switching energies indexed by (temperature, voltage, current).
///
/// Stored as one flat arena in temperature-major order, so
/// `values[(t * nv + v) * ni + i]` holds the entry for
/// `temperature_axis[t]`, `voltage_axis[v]`, `current_axis[i]`.
/// True energy is `value * scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyTable {
    pub(crate) scale: f64,
    pub(crate) shape: [usize; 3],
    pub(crate) values: Vec<f64>,
}

impl EnergyTable {
    pub fn new(scale: f64, shape: [usize; 3], values: Vec<f64>) -> Result<Self, ValidationErrorKind> {
        if !scale.is_finite() || scale == 0.0 {
            return Err(ValidationErrorKind::OutOfRange(format!(
                "scale must be finite and non-zero, found {scale}"
            )));
        }
        let expected = shape.iter().product::<usize>();
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

    /// `[temperatures, voltages, currents]`
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Stored (unscaled) value.
    pub fn get(&self, t: usize, v: usize, i: usize) -> Option<f64> {
        let [nt, nv, ni] = self.shape;
        if t >= nt || v >= nv || i >= ni {
            return None;
        }
        self.values.get((t * nv + v) * ni + i).copied()
    }

    /// Value multiplied by the table scale (joules).
    pub fn scaled(&self, t: usize, v: usize, i: usize) -> Option<f64> {
        self.get(t, v, i).map(|e| e * self.scale)
    }

    /// Energies along the current axis for one (temperature, voltage) pair.
    pub fn row(&self, t: usize, v: usize) -> &[f64] {
        let [_, nv, ni] = self.shape;
        let start = (t * nv + v) * ni;
        self.values.get(start..start + ni).unwrap_or(&[])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Switching-energy dependence on temperature, voltage and current.
#[derive(Debug, Clone, PartialEq)]
pub struct LossTable {
    pub(crate) computation_method: ComputationMethod,
    pub(crate) formula: Option<String>,
    pub(crate) temperature_axis: Axis,
    pub(crate) voltage_axis: Axis,
    pub(crate) current_axis: Axis,
    pub(crate) energy: EnergyTable,
}

impl LossTable {
    pub fn new(
        computation_method: ComputationMethod,
        formula: Option<String>,
        temperature_axis: Axis,
        voltage_axis: Axis,
        current_axis: Axis,
        energy: EnergyTable,
    ) -> Result<Self, ValidationErrorKind> {
        let axes = [
            temperature_axis.len(),
            voltage_axis.len(),
            current_axis.len(),
        ];
        if energy.shape != axes {
            return Err(ValidationErrorKind::LengthMismatch {
                expected: axes.iter().product(),
                found: energy.values.len(),
            });
        }
        Ok(Self {
            computation_method,
            formula,
            temperature_axis,
            voltage_axis,
            current_axis,
            energy,
        })
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

    pub fn voltage_axis(&self) -> &Axis {
        &self.voltage_axis
    }

    pub fn current_axis(&self) -> &Axis {
        &self.current_axis
    }

    pub fn energy(&self) -> &EnergyTable {
        &self.energy
    }

    /// Stored energy at the given breakpoint values, if all three are
    /// declared on the axes.
    pub fn energy_at(&self, temperature: f64, voltage: f64, current: f64) -> Option<f64> {
        let t = self.temperature_axis.position(temperature)?;
        let v = self.voltage_axis.position(voltage)?;
        let i = self.current_axis.position(current)?;
        self.energy.get(t, v, i)
    }
}
