use crate::ir::{Bin, Figure, Geometry, Mark};
use crate::palette::parse_color;
use crate::OutputFormat;
use anyhow::{bail, Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;

const CAPTION_FONT: (&str, u32) = ("sans-serif", 20);
const LABEL_FONT_SIZE: u32 = 12;

/// Draw a figure and encode it in the requested format
pub fn render_figure(figure: &Figure, format: &OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Png => render_png(figure),
        OutputFormat::Svg => render_svg(figure),
    }
}

/// Draw into an RGB buffer and encode it as PNG
pub fn render_png(figure: &Figure) -> Result<Vec<u8>> {
    let (width, height) = (figure.width, figure.height);
    if width == 0 || height == 0 {
        bail!("Cannot draw a {}x{} image", width, height);
    }
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .with_context(|| format!("Image size {}x{} is too large", width, height))?;
    let mut buffer = vec![0u8; len];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_figure(&root, figure)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

/// Draw into an SVG document
pub fn render_svg(figure: &Figure) -> Result<Vec<u8>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (figure.width, figure.height)).into_drawing_area();
        draw_figure(&root, figure)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg.into_bytes())
}

/// Draw a figure onto any plotters backend
pub fn draw_figure<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match &figure.geometry {
        Geometry::Bars { marks } => draw_bars(root, figure, marks),
        Geometry::Pie { marks } => draw_pie(root, figure, marks),
        Geometry::Scatter { points, color } => draw_scatter(root, figure, points, color),
        Geometry::Histogram { bins, color } => draw_histogram(root, figure, bins, color),
        Geometry::Empty => draw_placeholder(root, figure, "No data"),
    }
}

fn draw_bars<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure, marks: &[Mark]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (y_min, y_max) = value_range(marks.iter().map(|m| m.value));
    let num_categories = marks.len() as i32;
    let labels: Vec<String> = marks.iter().map(|m| m.label.clone()).collect();

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&figure.title, CAPTION_FONT)
        .x_label_area_size(if figure.rotate_ticks { 110 } else { 40 })
        .y_label_area_size(60)
        .build_cartesian_2d((0..num_categories).into_segmented(), y_min..y_max)
        .context("Failed to build chart")?;

    let formatter = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(idx) => labels.get(*idx as usize).cloned().unwrap_or_default(),
        _ => String::new(),
    };
    let rotated = TextStyle::from(
        ("sans-serif", LABEL_FONT_SIZE)
            .into_font()
            .transform(FontTransform::Rotate90),
    );

    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh()
        .x_labels(marks.len())
        .x_label_formatter(&formatter)
        .x_desc(figure.x_title.as_str())
        .y_desc(figure.y_title.as_str());
    if figure.rotate_ticks {
        mesh.x_label_style(rotated);
    }
    mesh.draw().context("Failed to draw mesh")?;

    chart
        .draw_series(marks.iter().enumerate().map(|(idx, mark)| {
            let idx = idx as i32;
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(idx), 0.0),
                    (SegmentValue::Exact(idx + 1), mark.value),
                ],
                parse_color(&mark.color).filled(),
            );
            bar.set_margin(0, 0, 6, 6);
            bar
        }))
        .context("Failed to draw bars")?;

    Ok(())
}

fn draw_pie<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure, marks: &[Mark]) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let total: f64 = marks.iter().map(|m| m.value.max(0.0)).sum();
    if total <= 0.0 {
        return draw_placeholder(root, figure, "No positive values");
    }

    let area = root
        .titled(&figure.title, CAPTION_FONT)
        .context("Failed to draw title")?;
    let (width, height) = area.dim_in_pixel();
    let center = (width as f64 / 2.0, height as f64 / 2.0);
    let radius = (width.min(height) as f64 / 2.0) * 0.7;

    // Slices start at twelve o'clock and run clockwise
    let mut start = -PI / 2.0;
    for mark in marks {
        let share = mark.value.max(0.0) / total;
        if share <= 0.0 {
            continue;
        }
        let end = start + share * 2.0 * PI;

        let steps = ((end - start) / (PI / 90.0)).ceil().max(1.0) as usize;
        let mut points = Vec::with_capacity(steps + 2);
        points.push(to_pixel(center));
        for step in 0..=steps {
            let angle = start + (end - start) * step as f64 / steps as f64;
            points.push(to_pixel(polar(center, radius, angle)));
        }
        area.draw(&Polygon::new(points, parse_color(&mark.color).filled()))
            .context("Failed to draw pie slice")?;

        let mid = (start + end) / 2.0;
        let label_pos = to_pixel(polar(center, radius * 1.12, mid));
        let text = format!("{} ({:.0}%)", mark.label, share * 100.0);
        area.draw(&Text::new(text, label_pos, ("sans-serif", LABEL_FONT_SIZE).into_font()))
            .context("Failed to draw pie label")?;

        start = end;
    }

    Ok(())
}

fn draw_scatter<DB>(
    root: &DrawingArea<DB, Shift>,
    figure: &Figure,
    points: &[(f64, f64)],
    color: &str,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_range = padded_range(points.iter().map(|p| p.0));
    let y_range = padded_range(points.iter().map(|p| p.1));

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&figure.title, CAPTION_FONT)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .x_desc(figure.x_title.as_str())
        .y_desc(figure.y_title.as_str())
        .draw()
        .context("Failed to draw mesh")?;

    let style = parse_color(color).mix(0.7).filled();
    chart
        .draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 3, style)))
        .context("Failed to draw point series")?;

    Ok(())
}

fn draw_histogram<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure, bins: &[Bin], color: &str) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_min = bins.first().map(|b| b.start).unwrap_or(0.0);
    let x_max = bins.last().map(|b| b.end).unwrap_or(1.0);
    let (_, y_max) = value_range(bins.iter().map(|b| b.count as f64));

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&figure.title, CAPTION_FONT)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(figure.x_title.as_str())
        .y_desc(figure.y_title.as_str())
        .draw()
        .context("Failed to draw mesh")?;

    let fill = parse_color(color).filled();
    chart
        .draw_series(bins.iter().map(|bin| {
            Rectangle::new([(bin.start, 0.0), (bin.end, bin.count as f64)], fill)
        }))
        .context("Failed to draw histogram bins")?;
    chart
        .draw_series(bins.iter().map(|bin| {
            Rectangle::new([(bin.start, 0.0), (bin.end, bin.count as f64)], WHITE.stroke_width(1))
        }))
        .context("Failed to draw histogram outlines")?;

    Ok(())
}

fn draw_placeholder<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure, message: &str) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root
        .titled(&figure.title, CAPTION_FONT)
        .context("Failed to draw title")?;
    let (width, height) = area.dim_in_pixel();
    let style = ("sans-serif", 16)
        .into_font()
        .color(&RGBColor(120, 120, 120))
        .pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new(
        message.to_string(),
        ((width / 2) as i32, (height / 2) as i32),
        style,
    ))
    .context("Failed to draw placeholder")?;
    Ok(())
}

/// Value axis range that always includes zero, with headroom above the bars
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo == hi {
        return (lo, lo + 1.0);
    }
    let headroom = (hi - lo) * 0.1;
    (if lo < 0.0 { lo - headroom } else { lo }, hi + headroom)
}

fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

fn polar(center: (f64, f64), radius: f64, angle: f64) -> (f64, f64) {
    (center.0 + radius * angle.cos(), center.1 + radius * angle.sin())
}

fn to_pixel(p: (f64, f64)) -> (i32, i32) {
    (p.0.round() as i32, p.1.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Highlight;

    const PNG_MAGIC: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    fn figure(geometry: Geometry) -> Figure {
        Figure {
            card: 0,
            title: "Test".to_string(),
            width: 400,
            height: 300,
            x_title: "x".to_string(),
            y_title: "y".to_string(),
            rotate_ticks: false,
            show_legend: false,
            geometry,
        }
    }

    fn mark(label: &str, value: f64, color: &str) -> Mark {
        Mark {
            label: label.to_string(),
            value,
            color: color.to_string(),
            highlight: Highlight::Normal,
            clickable: true,
            is_other: false,
        }
    }

    #[test]
    fn test_value_range() {
        assert_eq!(value_range([0.0, 0.0].into_iter()), (0.0, 1.0));
        let (lo, hi) = value_range([2.0, 10.0].into_iter());
        assert_eq!(lo, 0.0);
        assert!((hi - 11.0).abs() < 1e-9);
        let (lo, _) = value_range([-5.0, 5.0].into_iter());
        assert!(lo < -5.0);
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range(std::iter::empty()), 0.0..1.0);
        assert_eq!(padded_range([2.0].into_iter()), 1.0..3.0);
    }

    #[test]
    fn test_render_bars_png() {
        let fig = figure(Geometry::Bars {
            marks: vec![mark("Tech", 2.0, "#1f77b4"), mark("Other", 2.0, "#b0b0b0")],
        });
        let bytes = render_png(&fig).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_render_rotated_bars_png() {
        let mut fig = figure(Geometry::Bars {
            marks: vec![mark("A very long category label", 3.0, "#1f77b4")],
        });
        fig.rotate_ticks = true;
        assert!(render_png(&fig).is_ok());
    }

    #[test]
    fn test_render_pie_svg() {
        let fig = figure(Geometry::Pie {
            marks: vec![mark("Tech", 2.0, "#1f77b4"), mark("Finance", 1.0, "#ff7f0e")],
        });
        let svg = String::from_utf8(render_svg(&fig).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Tech"));
    }

    #[test]
    fn test_render_scatter_and_histogram() {
        let scatter = figure(Geometry::Scatter {
            points: vec![(1.0, 2.0), (3.0, 4.0)],
            color: "#1f77b4".to_string(),
        });
        assert!(render_png(&scatter).is_ok());

        let histogram = figure(Geometry::Histogram {
            bins: vec![
                Bin { start: 0.0, end: 1.0, count: 3 },
                Bin { start: 1.0, end: 2.0, count: 1 },
            ],
            color: "#1f77b4".to_string(),
        });
        assert!(render_png(&histogram).is_ok());
    }

    #[test]
    fn test_render_empty_placeholder() {
        let fig = figure(Geometry::Empty);
        let bytes = render_figure(&fig, &OutputFormat::Png).unwrap();
        assert_eq!(&bytes[0..8], &PNG_MAGIC);
    }

    #[test]
    fn test_render_png_rejects_degenerate_size() {
        let mut fig = figure(Geometry::Empty);
        fig.width = 0;
        assert!(render_png(&fig).is_err());

        let mut huge = figure(Geometry::Empty);
        huge.width = u32::MAX;
        huge.height = u32::MAX;
        assert!(render_png(&huge).is_err());
    }
}
