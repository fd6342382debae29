//! Figure generation for datasheets.
//!
//! Each figure kind is derived in two steps: [`plan`] turns a
//! [`DeviceModel`] into a [`FigurePlan`] (curves, axes, styles and text),
//! and the renderer rasterises that plan into a PNG. Both steps are pure, so
//! the same model and [`RenderContext`] always give the same bytes.

mod plan;
mod render;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Facet, FigureError};
use crate::model::DeviceModel;

pub use plan::{
    plan, AxisScale, AxisSpec, FigurePlan, LadderDiagram, Marker, Panel, Rgb, Series, SeriesStyle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FigureKind {
    #[serde(rename = "turnon_loss")]
    TurnOnLoss,
    #[serde(rename = "turnoff_loss")]
    TurnOffLoss,
    #[serde(rename = "conduction")]
    Conduction,
    #[serde(rename = "thermal")]
    Thermal,
}

impl FigureKind {
    pub const ALL: [FigureKind; 4] = [
        FigureKind::TurnOnLoss,
        FigureKind::TurnOffLoss,
        FigureKind::Conduction,
        FigureKind::Thermal,
    ];

    /// File stem of the figure, e.g. `turnon_loss` for `turnon_loss.png`.
    pub fn file_stem(self) -> &'static str {
        match self {
            FigureKind::TurnOnLoss => "turnon_loss",
            FigureKind::TurnOffLoss => "turnoff_loss",
            FigureKind::Conduction => "conduction",
            FigureKind::Thermal => "thermal",
        }
    }

    /// The model facet this figure is drawn from.
    pub fn facet(self) -> Facet {
        match self {
            FigureKind::TurnOnLoss => Facet::TurnOnLoss,
            FigureKind::TurnOffLoss => Facet::TurnOffLoss,
            FigureKind::Conduction => Facet::ConductionLoss,
            FigureKind::Thermal => Facet::ThermalModel,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.file_stem() == text)
    }
}

impl fmt::Display for FigureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// Output size and resolution for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderContext {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            width_in: 10.0,
            height_in: 6.0,
            dpi: 300,
        }
    }
}

impl RenderContext {
    pub fn new(width_in: f64, height_in: f64, dpi: u32) -> Self {
        Self {
            width_in,
            height_in,
            dpi,
        }
    }

    /// Pixel dimensions, never smaller than 64 x 64.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = self.dpi.max(1) as f64;
        let px = |inches: f64| {
            let v = inches * dpi;
            if v.is_finite() {
                v.round().clamp(64.0, 20_000.0) as u32
            } else {
                64
            }
        };
        (px(self.width_in), px(self.height_in))
    }

    pub fn points_to_pixels(&self, points: f64) -> f64 {
        points * self.dpi.max(1) as f64 / 72.0
    }

    pub fn pixels_per_meter(&self) -> u32 {
        (self.dpi.max(1) as f64 / 0.0254).round() as u32
    }
}

/// One rendered figure.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub kind: FigureKind,
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
    pub png: Vec<u8>,
    pub plan: FigurePlan,
}

impl Figure {
    pub fn file_name(&self) -> String {
        format!("{}.png", self.kind.file_stem())
    }

    pub fn annotations(&self) -> &[String] {
        &self.plan.annotations
    }
}

pub struct FigureGenerator {
    context: RenderContext,
}

impl Default for FigureGenerator {
    fn default() -> Self {
        Self::new(RenderContext::default())
    }
}

impl FigureGenerator {
    pub fn new(context: RenderContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    pub fn plan(&self, kind: FigureKind, model: &DeviceModel) -> Option<FigurePlan> {
        plan::plan(kind, model)
    }

    /// Render every figure the model supports. Kinds whose facet is absent
    /// are left out of the map; a present facet always yields a figure or an
    /// error.
    pub fn generate(
        &self,
        model: &DeviceModel,
    ) -> Result<BTreeMap<FigureKind, Figure>, ExportError> {
        let mut figures = BTreeMap::new();
        for kind in FigureKind::ALL {
            if !model.has(kind.facet()) {
                tracing::debug!(figure = %kind, device = %model.name, "no data, skipping");
                continue;
            }
            figures.insert(kind, self.render_plan(plan_present(kind, model)?)?);
        }
        Ok(figures)
    }

    /// Render one figure, failing with
    /// [`UnsupportedFacetError`](crate::UnsupportedFacetError) when its
    /// facet is absent.
    pub fn generate_kind(&self, model: &DeviceModel, kind: FigureKind) -> Result<Figure, FigureError> {
        model.require(kind.facet())?;
        Ok(self.render_plan(plan_present(kind, model)?)?)
    }

    /// Rasterise a plan built by [`FigureGenerator::plan`], possibly edited.
    pub fn render_plan(&self, plan: FigurePlan) -> Result<Figure, ExportError> {
        let kind = plan.kind;
        let png = render::render(&plan, &self.context).map_err(|detail| ExportError::Render {
            facet: kind.facet(),
            detail,
        })?;
        let (width_px, height_px) = self.context.pixel_size();
        tracing::debug!(figure = %kind, bytes = png.len(), "rendered figure");
        Ok(Figure {
            kind,
            width_px,
            height_px,
            dpi: self.context.dpi,
            png,
            plan,
        })
    }
}

/// Plan for a facet the caller has checked is present.
fn plan_present(kind: FigureKind, model: &DeviceModel) -> Result<FigurePlan, ExportError> {
    plan::plan(kind, model).ok_or(ExportError::NothingToPlot { facet: kind.facet() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_stems() {
        for kind in FigureKind::ALL {
            assert_eq!(FigureKind::parse(kind.file_stem()), Some(kind));
        }
        assert_eq!(FigureKind::parse("Thermal"), Some(FigureKind::Thermal));
        assert_eq!(FigureKind::parse("bode"), None);
    }

    #[test]
    fn default_context_is_300_dpi() {
        let ctx = RenderContext::default();
        assert_eq!(ctx.pixel_size(), (3000, 1800));
        assert_eq!(ctx.pixels_per_meter(), 11811);
        assert_eq!(ctx.points_to_pixels(72.0), 300.0);
    }

    #[test]
    fn tiny_context_is_clamped() {
        let ctx = RenderContext::new(0.1, 0.1, 10);
        assert_eq!(ctx.pixel_size(), (64, 64));
    }
}
