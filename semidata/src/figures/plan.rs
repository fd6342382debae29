//! Figure derivation: everything about a figure except the pixels.

use super::FigureKind;
use crate::model::{Direction, DeviceModel, Gate, LossTable, RcLayer, ThermalNetwork, ThermalTopology};

/// Points sampled along the thermal step response.
const THERMAL_SAMPLES: usize = 200;

/// matplotlib's tab10 cycle.
const PALETTE: [Rgb; 10] = [
    Rgb(31, 119, 180),
    Rgb(255, 127, 14),
    Rgb(44, 160, 44),
    Rgb(214, 39, 40),
    Rgb(148, 103, 189),
    Rgb(140, 86, 75),
    Rgb(227, 119, 194),
    Rgb(127, 127, 127),
    Rgb(188, 189, 34),
    Rgb(23, 190, 207),
];

const IMPEDANCE_BLUE: Rgb = Rgb(37, 99, 235);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn palette(index: usize) -> Rgb {
        PALETTE[index % PALETTE.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisScale {
    Linear,
    Log,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub label: String,
    pub scale: AxisScale,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Triangle,
    Square,
    Cross,
}

impl Marker {
    const CYCLE: [Marker; 4] = [Marker::Circle, Marker::Square, Marker::Triangle, Marker::Cross];

    pub fn cycle(index: usize) -> Marker {
        Self::CYCLE[index % Self::CYCLE.len()]
    }
}

/// Line and marker style. Widths and sizes are in points (1/72 in).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStyle {
    pub color: Rgb,
    pub line_width: f64,
    pub marker: Option<Marker>,
    pub marker_size: f64,
    pub filled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub style: SeriesStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub series: Vec<Series>,
    /// Draw `x = 0` and `y = 0` reference lines when they fall in range.
    pub origin_lines: bool,
}

/// RC ladder drawn beside the impedance curve.
#[derive(Debug, Clone, PartialEq)]
pub struct LadderDiagram {
    pub topology: ThermalTopology,
    pub layers: Vec<RcLayer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FigurePlan {
    pub kind: FigureKind,
    pub title: String,
    pub panel: Panel,
    pub ladder: Option<LadderDiagram>,
    pub annotations: Vec<String>,
}

impl FigurePlan {
    pub fn legend(&self) -> Vec<&str> {
        self.panel.series.iter().map(|s| s.label.as_str()).collect()
    }
}

/// Derive the plan for one figure kind, or `None` when the model has
/// nothing to show for it.
pub fn plan(kind: FigureKind, model: &DeviceModel) -> Option<FigurePlan> {
    let data = &model.semiconductor_data;
    match kind {
        FigureKind::TurnOnLoss => data
            .turn_on_loss
            .as_ref()
            .and_then(|t| loss_plan(kind, "Turn-On", model, t)),
        FigureKind::TurnOffLoss => data
            .turn_off_loss
            .as_ref()
            .and_then(|t| loss_plan(kind, "Turn-Off", model, t)),
        FigureKind::Conduction => conduction_plan(model),
        FigureKind::Thermal => data
            .thermal_model
            .as_ref()
            .and_then(|n| thermal_plan(model, n)),
    }
}

fn loss_plan(kind: FigureKind, which: &str, model: &DeviceModel, table: &LossTable) -> Option<FigurePlan> {
    let energy = table.energy();
    let voltages = table.voltage_axis().values();
    let mut selected: Vec<usize> = (0..voltages.len()).filter(|v| voltages[*v] > 0.0).collect();
    if selected.is_empty() {
        selected = (0..voltages.len()).collect();
    }
    let currents = table.current_axis().values();

    let mut series = Vec::new();
    for (t, temperature) in table.temperature_axis().iter().enumerate() {
        for (marker_index, &v) in selected.iter().enumerate() {
            let points: Vec<(f64, f64)> = currents
                .iter()
                .zip(energy.row(t, v))
                .map(|(i, e)| (*i, e * energy.scale() * 1e3))
                .collect();
            let label = if selected.len() > 1 {
                format!("T_j = {temperature:.0} °C, V = {:.0} V", voltages[v])
            } else {
                format!("T_j = {temperature:.0} °C")
            };
            series.push(Series {
                label,
                points,
                style: SeriesStyle {
                    color: Rgb::palette(t),
                    line_width: 2.5,
                    marker: Some(Marker::cycle(marker_index)),
                    marker_size: 5.0,
                    filled: true,
                },
            });
        }
    }

    let (x, y) = linear_axes(&series, "Current (A)", &format!("{which} Energy (mJ)"))?;
    let mut annotations = Vec::new();
    if let Some(formula) = table.formula() {
        annotations.push(format!("Formula: {formula}"));
    }
    annotations.push(format!("Computation method: {}", table.computation_method()));
    Some(FigurePlan {
        kind,
        title: format!("{which} Loss Characteristics - {}", model.name),
        panel: Panel {
            title: format!("{which} switching energy"),
            x,
            y,
            series,
            origin_lines: false,
        },
        ladder: None,
        annotations,
    })
}

fn conduction_plan(model: &DeviceModel) -> Option<FigurePlan> {
    let conduction = model.semiconductor_data.conduction_loss.as_ref()?;
    let mut series = Vec::new();
    for set in conduction.iter() {
        let temperatures = set.temperature_axis().values();
        for branch in set.branches() {
            for (t, voltages) in branch.voltages.iter().enumerate() {
                let points = branch.currents.iter().copied().zip(voltages.iter().copied()).collect();
                let (line_width, filled) = match branch.gate {
                    Gate::On => (2.5, true),
                    Gate::Off => (1.0, false),
                };
                let marker = match branch.direction {
                    Direction::Forward => Marker::Circle,
                    Direction::Reverse => Marker::Triangle,
                };
                series.push(Series {
                    label: format!(
                        "gate {}, {}, T_j = {:.0} °C",
                        branch.gate,
                        branch.direction.as_str(),
                        temperatures[t]
                    ),
                    points,
                    style: SeriesStyle {
                        color: Rgb::palette(t),
                        line_width,
                        marker: Some(marker),
                        marker_size: 4.0,
                        filled,
                    },
                });
            }
        }
    }
    let (x, y) = linear_axes(&series, "Current (A)", "Voltage Drop (V)")?;
    Some(FigurePlan {
        kind: FigureKind::Conduction,
        title: format!("Conduction Characteristics (I-V Curve) - {}", model.name),
        panel: Panel {
            title: "Conduction characteristics".into(),
            x,
            y,
            series,
            origin_lines: true,
        },
        ladder: None,
        annotations: Vec::new(),
    })
}

fn thermal_plan(model: &DeviceModel, network: &ThermalNetwork) -> Option<FigurePlan> {
    let times = network.time_grid(THERMAL_SAMPLES);
    let z = network.step_response(&times);
    let points: Vec<(f64, f64)> = times
        .iter()
        .zip(&z)
        .filter(|(_, z)| **z > 0.0)
        .map(|(t, z)| (t * 1e3, *z))
        .collect();
    let series = vec![Series {
        label: "Thermal Impedance".into(),
        points,
        style: SeriesStyle {
            color: IMPEDANCE_BLUE,
            line_width: 3.0,
            marker: None,
            marker_size: 0.0,
            filled: false,
        },
    }];
    let x = log_axis(series[0].points.iter().map(|p| p.0), "Time (ms)")?;
    let y = log_axis(series[0].points.iter().map(|p| p.1), "Thermal Impedance Z_th (K/W)")?;

    let mut annotations = vec![format!(
        "Total R_th = {:.4} K/W",
        network.total_resistance()
    )];
    for (k, layer) in network.layers().iter().enumerate() {
        annotations.push(format!(
            "R{n} = {:.4} K/W, C{n} = {:.4e} J/K",
            layer.resistance,
            layer.capacitance,
            n = k + 1
        ));
    }
    Some(FigurePlan {
        kind: FigureKind::Thermal,
        title: format!("Thermal Model - {}", model.name),
        panel: Panel {
            title: "Thermal Impedance vs Time".into(),
            x,
            y,
            series,
            origin_lines: false,
        },
        ladder: Some(LadderDiagram {
            topology: network.topology(),
            layers: network.layers().to_vec(),
        }),
        annotations,
    })
}

/// Linear axes covering every point with 5% headroom. `None` when there is
/// nothing to plot.
fn linear_axes(series: &[Series], x_label: &str, y_label: &str) -> Option<(AxisSpec, AxisSpec)> {
    let points = || series.iter().flat_map(|s| s.points.iter());
    let x = linear_axis(points().map(|p| p.0), x_label)?;
    let y = linear_axis(points().map(|p| p.1), y_label)?;
    Some((x, y))
}

fn linear_axis(values: impl Iterator<Item = f64>, label: &str) -> Option<AxisSpec> {
    let (min, max) = bounds(values)?;
    let pad = if max > min {
        (max - min) * 0.05
    } else {
        min.abs().max(1.0) * 0.05
    };
    Some(AxisSpec {
        label: label.to_string(),
        scale: AxisScale::Linear,
        min: min - pad,
        max: max + pad,
    })
}

/// Log axis snapped outward to whole decades.
fn log_axis(values: impl Iterator<Item = f64>, label: &str) -> Option<AxisSpec> {
    let (min, max) = bounds(values.filter(|v| *v > 0.0))?;
    let lo = min.log10().floor();
    let mut hi = max.log10().ceil();
    if hi <= lo {
        hi = lo + 1.0;
    }
    Some(AxisSpec {
        label: label.to_string(),
        scale: AxisScale::Log,
        min: 10f64.powf(lo),
        max: 10f64.powf(hi),
    })
}

fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
}
