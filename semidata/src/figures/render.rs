//! Rasterisation of a [`FigurePlan`] into PNG bytes.
//!
//! Text is drawn with a bundled DejaVu Sans face, registered with plotters on
//! first use, so the pixels never depend on the fonts of the host. Title,
//! labels, legend and annotations are also copied into iTXt chunks.

use std::sync::OnceLock;

use plotters::coord::ranged1d::ValueFormatter;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::plan::{AxisScale, AxisSpec, FigurePlan, LadderDiagram, Marker, Panel, Rgb, Series};
use super::RenderContext;

const GRID: RGBColor = RGBColor(225, 225, 225);
const ORIGIN: RGBColor = RGBColor(150, 150, 150);
const WIRE: RGBColor = RGBColor(40, 40, 40);
const RESISTOR_EDGE: RGBColor = RGBColor(30, 58, 138);
const SOURCE: RGBColor = RGBColor(245, 158, 11);
const NOTE_FILL: RGBColor = RGBColor(255, 248, 225);
const NOTE_EDGE: RGBColor = RGBColor(190, 160, 110);

const FONT_FAMILY: &str = "sans-serif";
static FONT_BYTES: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");
static FONT: OnceLock<Result<(), String>> = OnceLock::new();

// Text sizes in points.
const TITLE_PT: f64 = 13.0;
const CAPTION_PT: f64 = 11.0;
const DESC_PT: f64 = 10.0;
const TICK_PT: f64 = 8.0;
const LEGEND_PT: f64 = 7.5;
const NOTE_PT: f64 = 8.5;

fn ensure_font() -> Result<(), String> {
    FONT.get_or_init(|| {
        register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
            .map_err(|_| "bundled font could not be parsed".to_string())
    })
    .clone()
}

fn err<E: std::fmt::Display>(e: E) -> String {
    e.to_string()
}

fn rgb(color: Rgb) -> RGBColor {
    RGBColor(color.0, color.1, color.2)
}

/// Render `plan` at the context's size and DPI.
pub(crate) fn render(plan: &FigurePlan, ctx: &RenderContext) -> Result<Vec<u8>, String> {
    ensure_font()?;
    let (width, height) = ctx.pixel_size();
    let mut pixels = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut pixels, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(err)?;
        let scale = Scale::new(ctx, width, height);
        let body = root
            .titled(&plan.title, scale.font(TITLE_PT))
            .map_err(err)?;
        match &plan.ladder {
            Some(ladder) => {
                let (left, right) = body.split_horizontally(width * 11 / 20);
                draw_panel(&left, &plan.panel, &[], &scale)?;
                draw_ladder(&right, ladder, &plan.annotations, &scale)?;
            }
            None => draw_panel(&body, &plan.panel, &plan.annotations, &scale)?,
        }
        root.present().map_err(err)?;
    }
    encode_png(&pixels, width, height, ctx, &text_chunks(plan))
}

/// Point-to-pixel conversion for one render.
struct Scale {
    pt: f64,
    margin: u32,
}

impl Scale {
    fn new(ctx: &RenderContext, width: u32, height: u32) -> Self {
        let pt = ctx.points_to_pixels(1.0);
        let margin = ((pt * 24.0) as u32).min(width.min(height) / 8);
        Self { pt, margin }
    }

    fn px(&self, points: f64) -> u32 {
        (points * self.pt).round().max(1.0) as u32
    }

    fn font(&self, points: f64) -> TextStyle<'static> {
        (FONT_FAMILY, points * self.pt).into_font().color(&BLACK)
    }
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    panel: &Panel,
    notes: &[String],
    scale: &Scale,
) -> Result<(), String> {
    let (x, y) = (&panel.x, &panel.y);
    let mut builder = ChartBuilder::on(area);
    builder
        .margin(scale.margin)
        .caption(&panel.title, scale.font(CAPTION_PT))
        .x_label_area_size(scale.px(TICK_PT + DESC_PT * 2.2))
        .y_label_area_size(scale.px(TICK_PT * 4.0 + DESC_PT * 2.0));
    match (x.scale, y.scale) {
        (AxisScale::Linear, AxisScale::Linear) => {
            let mut chart = builder
                .build_cartesian_2d(x.min..x.max, y.min..y.max)
                .map_err(err)?;
            draw_chart(&mut chart, panel, notes, scale)
        }
        (AxisScale::Log, AxisScale::Log) => {
            let mut chart = builder
                .build_cartesian_2d((x.min..x.max).log_scale(), (y.min..y.max).log_scale())
                .map_err(err)?;
            draw_chart(&mut chart, panel, notes, scale)
        }
        (AxisScale::Linear, AxisScale::Log) => {
            let mut chart = builder
                .build_cartesian_2d(x.min..x.max, (y.min..y.max).log_scale())
                .map_err(err)?;
            draw_chart(&mut chart, panel, notes, scale)
        }
        (AxisScale::Log, AxisScale::Linear) => {
            let mut chart = builder
                .build_cartesian_2d((x.min..x.max).log_scale(), y.min..y.max)
                .map_err(err)?;
            draw_chart(&mut chart, panel, notes, scale)
        }
    }
}

fn draw_chart<'a, DB, X, Y>(
    chart: &mut ChartContext<'a, DB, Cartesian2d<X, Y>>,
    panel: &Panel,
    notes: &[String],
    scale: &Scale,
) -> Result<(), String>
where
    DB: DrawingBackend + 'a,
    X: Ranged<ValueType = f64> + ValueFormatter<f64>,
    Y: Ranged<ValueType = f64> + ValueFormatter<f64>,
{
    let (x, y) = (&panel.x, &panel.y);
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(7)
        .y_labels(7)
        .x_label_formatter(&tick_label)
        .y_label_formatter(&tick_label)
        .x_desc(x.label.as_str())
        .y_desc(y.label.as_str())
        .label_style(scale.font(TICK_PT))
        .axis_desc_style(scale.font(DESC_PT))
        .draw()
        .map_err(err)?;

    let grid = GRID.stroke_width(scale.px(0.8));
    chart
        .draw_series(
            grid_values(x)
                .into_iter()
                .map(|gx| PathElement::new(vec![(gx, y.min), (gx, y.max)], grid)),
        )
        .map_err(err)?;
    chart
        .draw_series(
            grid_values(y)
                .into_iter()
                .map(|gy| PathElement::new(vec![(x.min, gy), (x.max, gy)], grid)),
        )
        .map_err(err)?;

    if panel.origin_lines {
        let style = ORIGIN.stroke_width(scale.px(1.0));
        if spans_zero(x) {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(0.0, y.min), (0.0, y.max)],
                    style,
                )))
                .map_err(err)?;
        }
        if spans_zero(y) {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(x.min, 0.0), (x.max, 0.0)],
                    style,
                )))
                .map_err(err)?;
        }
    }

    for series in &panel.series {
        draw_series(chart, series, scale)?;
    }

    chart
        .draw_series(std::iter::once(Rectangle::new(
            [(x.min, y.min), (x.max, y.max)],
            BLACK.stroke_width(scale.px(1.0)),
        )))
        .map_err(err)?;

    if panel.series.iter().any(|s| !s.label.is_empty()) {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .margin(scale.px(6.0))
            .legend_area_size(scale.px(20.0))
            .label_font(scale.font(LEGEND_PT))
            .background_style(WHITE.mix(0.9))
            .border_style(BLACK.stroke_width(1))
            .draw()
            .map_err(err)?;
    }
    draw_note(&chart.plotting_area().strip_coord_spec(), notes, Corner::LowerRight, scale)
}

fn draw_series<DB, X, Y>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<X, Y>>,
    series: &Series,
    scale: &Scale,
) -> Result<(), String>
where
    DB: DrawingBackend,
    X: Ranged<ValueType = f64>,
    Y: Ranged<ValueType = f64>,
{
    let style = series.style;
    let color = rgb(style.color);
    let line = color.stroke_width(scale.px(style.line_width));
    let legend_len = scale.px(14.0) as i32;
    let labelled = !series.label.is_empty();
    let with_line = series.points.len() > 1;
    if with_line {
        let anno = chart
            .draw_series(LineSeries::new(series.points.iter().copied(), line))
            .map_err(err)?;
        if labelled {
            anno.label(series.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + legend_len, y)], line));
        }
    }

    // single-point curves are drawn as markers only
    let Some(marker) = style.marker else {
        return Ok(());
    };
    let size = scale.px(style.marker_size) as i32;
    let mark = if style.filled {
        color.filled()
    } else {
        color.stroke_width(scale.px(1.0))
    };
    let points = series.points.iter().copied();
    let anno = match marker {
        Marker::Circle => chart.draw_series(points.map(|p| Circle::new(p, size, mark))),
        Marker::Triangle => chart.draw_series(points.map(|p| TriangleMarker::new(p, size, mark))),
        Marker::Cross => chart.draw_series(points.map(|p| Cross::new(p, size, mark))),
        Marker::Square => chart.draw_series(points.map(|p| {
            EmptyElement::at(p) + Rectangle::new([(-size, -size), (size, size)], mark)
        })),
    }
    .map_err(err)?;
    if labelled && !with_line {
        anno.label(series.label.as_str())
            .legend(move |(x, y)| Circle::new((x + legend_len / 2, y), size, mark));
    }
    Ok(())
}

/// Tick text: plain decimals in `[1e-3, 1e5)`, exponent form outside.
fn tick_label(value: &f64) -> String {
    let v = *value;
    if v == 0.0 {
        return "0".to_string();
    }
    if !(1e-3..1e5).contains(&v.abs()) {
        return format!("{v:.0e}");
    }
    let text = format!("{v:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, Copy)]
enum Corner {
    LowerLeft,
    LowerRight,
}

/// Boxed block of text lines in one corner of `area`.
fn draw_note<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    lines: &[String],
    corner: Corner,
    scale: &Scale,
) -> Result<(), String> {
    if lines.is_empty() {
        return Ok(());
    }
    let style = scale.font(NOTE_PT);
    let mut text_w = 0;
    for line in lines {
        let (w, _) = area.estimate_text_size(line, &style).map_err(err)?;
        text_w = text_w.max(w as i32);
    }
    let pad = scale.px(4.0) as i32;
    let line_h = scale.px(NOTE_PT * 1.4) as i32;
    let (area_w, area_h) = area.dim_in_pixel();
    let box_w = text_w + 2 * pad;
    let box_h = line_h * lines.len() as i32 + 2 * pad;
    let x0 = match corner {
        Corner::LowerLeft => pad,
        Corner::LowerRight => (area_w as i32 - box_w - pad).max(0),
    };
    let y0 = (area_h as i32 - box_h - pad).max(0);

    area.draw(&Rectangle::new([(x0, y0), (x0 + box_w, y0 + box_h)], NOTE_FILL.filled()))
        .map_err(err)?;
    area.draw(&Rectangle::new(
        [(x0, y0), (x0 + box_w, y0 + box_h)],
        NOTE_EDGE.stroke_width(1),
    ))
    .map_err(err)?;
    for (k, line) in lines.iter().enumerate() {
        area.draw(&Text::new(
            line.as_str(),
            (x0 + pad, y0 + pad + line_h * k as i32),
            style.clone(),
        ))
        .map_err(err)?;
    }
    Ok(())
}

fn spans_zero(axis: &AxisSpec) -> bool {
    axis.scale == AxisScale::Linear && axis.min < 0.0 && axis.max > 0.0
}

/// Grid positions: "nice" steps on linear axes, whole decades on log axes.
fn grid_values(axis: &AxisSpec) -> Vec<f64> {
    match axis.scale {
        AxisScale::Linear => {
            let step = nice_step((axis.max - axis.min) / 6.0);
            if !(step.is_finite() && step > 0.0) {
                return Vec::new();
            }
            let first = (axis.min / step).ceil() as i64;
            let last = (axis.max / step).floor() as i64;
            (first..=last).map(|k| k as f64 * step).collect()
        }
        AxisScale::Log => {
            let first = axis.min.log10().ceil() as i32;
            let last = axis.max.log10().floor() as i32;
            (first..=last).map(|k| 10f64.powi(k)).collect()
        }
    }
}

fn nice_step(raw: f64) -> f64 {
    if !(raw.is_finite() && raw > 0.0) {
        return 0.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Series resistors along the top rail, one shunt capacitor per node down to
/// the ground rail, heat source at the junction node, last node tied to
/// ambient. `notes` are boxed below the ladder.
fn draw_ladder<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    ladder: &LadderDiagram,
    notes: &[String],
    scale: &Scale,
) -> Result<(), String> {
    let mut chart = ChartBuilder::on(area)
        .margin(scale.margin)
        .caption(
            format!("{} RC network", ladder.topology),
            scale.font(CAPTION_PT),
        )
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)
        .map_err(err)?;

    let n = ladder.layers.len().max(1);
    let (left, right, top, bottom) = (0.12, 0.92, 0.86, 0.48);
    let (plate_hi, plate_lo) = (0.70, 0.64);
    let node = |k: usize| left + (right - left) * k as f64 / n as f64;
    let wire = WIRE.stroke_width(scale.px(1.5));
    let plate = WIRE.stroke_width(scale.px(3.0));
    let r_max = ladder
        .layers
        .iter()
        .map(|l| l.resistance)
        .fold(0.0, f64::max);

    let mut paths: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut boxes = Vec::new();
    for (k, layer) in ladder.layers.iter().enumerate() {
        let (xa, xb) = (node(k), node(k + 1));
        let inset = (xb - xa) * 0.25;
        paths.push(vec![(xa, top), (xa + inset, top)]);
        paths.push(vec![(xb - inset, top), (xb, top)]);
        boxes.push(((xa + inset, top - 0.04), (xb - inset, top + 0.04), layer.resistance / r_max));

        // capacitor from node k to ground
        paths.push(vec![(xa, top), (xa, plate_hi)]);
        paths.push(vec![(xa, plate_lo), (xa, bottom)]);
    }
    paths.push(vec![(node(n), top), (node(n), bottom)]);
    paths.push(vec![(left - 0.07, top), (left, top)]);
    paths.push(vec![(left - 0.07, top), (left - 0.07, bottom)]);

    chart
        .draw_series(paths.into_iter().map(|p| PathElement::new(p, wire)))
        .map_err(err)?;
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(left - 0.07, bottom), (node(n), bottom)],
            plate,
        )))
        .map_err(err)?;

    let half = (right - left) / n as f64 * 0.15;
    chart
        .draw_series((0..ladder.layers.len()).flat_map(|k| {
            let x = node(k);
            [
                PathElement::new(vec![(x - half, plate_hi), (x + half, plate_hi)], plate),
                PathElement::new(vec![(x - half, plate_lo), (x + half, plate_lo)], plate),
            ]
        }))
        .map_err(err)?;

    for (a, b, share) in boxes {
        chart
            .draw_series(std::iter::once(Rectangle::new([a, b], shade(share).filled())))
            .map_err(err)?;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [a, b],
                RESISTOR_EDGE.stroke_width(scale.px(1.5)),
            )))
            .map_err(err)?;
    }

    let label = scale.font(LEGEND_PT);
    let above = label.pos(Pos::new(HPos::Center, VPos::Bottom));
    let beside = label.pos(Pos::new(HPos::Left, VPos::Center));
    chart
        .draw_series(ladder.layers.iter().enumerate().map(|(k, _)| {
            let mid = (node(k) + node(k + 1)) / 2.0;
            Text::new(format!("R{}", k + 1), (mid, top + 0.06), above.clone())
        }))
        .map_err(err)?;
    chart
        .draw_series(ladder.layers.iter().enumerate().map(|(k, _)| {
            let at = (node(k) + half + 0.01, (plate_hi + plate_lo) / 2.0);
            Text::new(format!("C{}", k + 1), at, beside.clone())
        }))
        .map_err(err)?;

    let radius = scale.px(6.0) as i32;
    chart
        .draw_series(std::iter::once(Circle::new(
            (left - 0.07, (top + bottom) / 2.0),
            radius,
            SOURCE.filled(),
        )))
        .map_err(err)?;

    draw_note(&chart.plotting_area().strip_coord_spec(), notes, Corner::LowerLeft, scale)
}

/// Light to dark blue by the layer's share of the largest resistance.
fn shade(share: f64) -> RGBColor {
    let s = if share.is_finite() { share.clamp(0.0, 1.0) } else { 1.0 };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * s).round() as u8;
    RGBColor(mix(191, 30), mix(219, 64), mix(254, 175))
}

fn text_chunks(plan: &FigurePlan) -> Vec<(&'static str, String)> {
    let mut chunks = vec![
        ("Title", plan.title.clone()),
        ("Subtitle", plan.panel.title.clone()),
        ("XLabel", plan.panel.x.label.clone()),
        ("YLabel", plan.panel.y.label.clone()),
    ];
    let legend = plan.legend();
    if !legend.is_empty() {
        chunks.push(("Legend", legend.join("\n")));
    }
    if !plan.annotations.is_empty() {
        chunks.push(("Annotation", plan.annotations.join("\n")));
    }
    chunks.push(("Software", "semidata".to_string()));
    chunks
}

fn encode_png(
    rgb: &[u8],
    width: u32,
    height: u32,
    ctx: &RenderContext,
    text: &[(&'static str, String)],
) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let ppm = ctx.pixels_per_meter();
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        for (keyword, value) in text {
            encoder
                .add_itxt_chunk(keyword.to_string(), value.clone())
                .map_err(err)?;
        }
        let mut writer = encoder.write_header().map_err(err)?;
        writer.write_image_data(rgb).map_err(err)?;
        writer.finish().map_err(err)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nice_steps() {
        assert_eq!(nice_step(0.7), 1.0);
        assert_eq!(nice_step(13.0), 20.0);
        assert_eq!(nice_step(42.0), 50.0);
        assert_eq!(nice_step(0.0), 0.0);
    }

    #[test]
    fn log_grid_is_decades() {
        let axis = AxisSpec {
            label: String::new(),
            scale: AxisScale::Log,
            min: 1e-3,
            max: 1e1,
        };
        assert_eq!(grid_values(&axis).len(), 5);
    }

    #[test]
    fn tick_labels_are_compact() {
        assert_eq!(tick_label(&0.0), "0");
        assert_eq!(tick_label(&20.0), "20");
        assert_eq!(tick_label(&0.5), "0.5");
        assert_eq!(tick_label(&-2.5), "-2.5");
        assert_eq!(tick_label(&1e-5), "1e-5");
        assert_eq!(tick_label(&100000.0), "1e5");
    }

    #[test]
    fn bundled_font_registers() {
        assert_eq!(ensure_font(), Ok(()));
        assert_eq!(ensure_font(), Ok(()));
    }

    #[test]
    fn shade_is_clamped() {
        assert_eq!(shade(0.0), RGBColor(191, 219, 254));
        assert_eq!(shade(2.0), RGBColor(30, 64, 175));
    }
}
