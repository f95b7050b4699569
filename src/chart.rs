//! Bar chart rendering
//!
//! The pipeline hands a ranked, non-empty aggregate to a [`ChartRenderer`].
//! Styling travels with every request in a [`ChartStyle`] value; there is no
//! process-wide theme.

use maud::{html, Markup};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::aggregator::AggregateResult;
use crate::error_handling::{ErrorContext, ReportError, ReportResult};

/// Bar direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// Bar colouring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Palette {
    /// Gradient, first bar darkest
    Gradient { from: Rgb, to: Rgb },
    /// Every bar the same colour
    Solid(Rgb),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(&self, other: &Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

const DARK_BLUE: Rgb = Rgb(8, 48, 107);
const LIGHT_BLUE: Rgb = Rgb(198, 219, 239);
const DARK_GREEN: Rgb = Rgb(0, 68, 27);
const LIGHT_GREEN: Rgb = Rgb(199, 233, 192);
const DARK_RED: Rgb = Rgb(103, 0, 13);
const LIGHT_RED: Rgb = Rgb(252, 187, 161);
const ROYAL_BLUE: Rgb = Rgb(65, 105, 225);

impl FromStr for Palette {
    type Err = ReportError;

    /// Accepts `Blues_r`, `Blues`, `Greens_r`, `Greens`, `Reds_r`, `Reds`,
    /// `royalblue` or a `#rrggbb` colour.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let gradient = |from, to| Palette::Gradient { from, to };
        match token {
            "Blues_r" => Ok(gradient(DARK_BLUE, LIGHT_BLUE)),
            "Blues" => Ok(gradient(LIGHT_BLUE, DARK_BLUE)),
            "Greens_r" => Ok(gradient(DARK_GREEN, LIGHT_GREEN)),
            "Greens" => Ok(gradient(LIGHT_GREEN, DARK_GREEN)),
            "Reds_r" => Ok(gradient(DARK_RED, LIGHT_RED)),
            "Reds" => Ok(gradient(LIGHT_RED, DARK_RED)),
            "royalblue" => Ok(Palette::Solid(ROYAL_BLUE)),
            hex if hex.len() == 7 && hex.is_ascii() && hex.starts_with('#') => {
                let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16);
                match (channel(1..3), channel(3..5), channel(5..7)) {
                    (Ok(r), Ok(g), Ok(b)) => Ok(Palette::Solid(Rgb(r, g, b))),
                    _ => Err(ReportError::configuration(format!("Invalid colour: {}", hex))),
                }
            }
            other => Err(ReportError::configuration(format!("Unknown palette: {}", other))),
        }
    }
}

impl Palette {
    /// Colour of bar `index` out of `count`
    pub fn color(&self, index: usize, count: usize) -> String {
        match self {
            Palette::Solid(rgb) => rgb.hex(),
            Palette::Gradient { from, to } => {
                let t = if count > 1 {
                    index as f64 / (count - 1) as f64
                } else {
                    0.0
                };
                from.lerp(to, t).hex()
            }
        }
    }
}

/// Explicit per-chart styling
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub orientation: Orientation,
    pub palette: Palette,
    pub width: u32,
    pub height: u32,
    pub font_family: String,
}

impl ChartStyle {
    pub fn vertical(palette: Palette) -> Self {
        Self {
            orientation: Orientation::Vertical,
            palette,
            width: 1200,
            height: 800,
            font_family: "DejaVu Sans, Arial, sans-serif".to_string(),
        }
    }

    pub fn horizontal(palette: Palette) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            palette,
            width: 1400,
            height: 1000,
            font_family: "DejaVu Sans, Arial, sans-serif".to_string(),
        }
    }
}

/// Everything a renderer needs for one chart
#[derive(Debug, Clone)]
pub struct ChartRequest<'a> {
    pub aggregate: &'a AggregateResult,
    pub category_label: String,
    pub title: String,
    pub file_name: String,
    pub style: ChartStyle,
}

/// Chart output backend
pub trait ChartRenderer: Send + Sync {
    /// Render the request into `output_dir`, returning the written path
    fn render(&self, request: &ChartRequest<'_>, output_dir: &Path) -> ReportResult<PathBuf>;

    fn name(&self) -> &str;
}

/// Writes standalone SVG files
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgChartRenderer;

impl ChartRenderer for SvgChartRenderer {
    fn render(&self, request: &ChartRequest<'_>, output_dir: &Path) -> ReportResult<PathBuf> {
        if request.aggregate.is_empty() {
            return Err(ReportError::empty_aggregate(request.aggregate.column.clone()));
        }
        fs::create_dir_all(output_dir)
            .with_io_context(|| format!("Failed to create {}", output_dir.display()))?;

        let markup = match request.style.orientation {
            Orientation::Vertical => vertical_chart(request),
            Orientation::Horizontal => horizontal_chart(request),
        };
        let path = output_dir.join(&request.file_name);
        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}\n",
            markup.into_string()
        );
        fs::write(&path, document)
            .with_io_context(|| format!("Failed to write {}", path.display()))?;

        info!("Chart written to {}", path.display());
        Ok(path)
    }

    fn name(&self) -> &str {
        "svg"
    }
}

/// `1234567` → `1,234,567`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

const TITLE_BAND: f64 = 70.0;
const AXIS_HEADROOM: f64 = 1.15;
const GRID_LINES: u32 = 5;

fn axis_max(aggregate: &AggregateResult) -> f64 {
    (aggregate.max_count() as f64 * AXIS_HEADROOM).max(1.0)
}

/// Drop characters XML 1.0 does not allow in text (C0 controls other than tab, LF, CR)
fn xml_text(text: &str) -> String {
    text.chars()
        .filter(|&c| c >= '\u{20}' || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn frame(request: &ChartRequest<'_>, body: Markup) -> Markup {
    let style = &request.style;
    let title_x = style.width as f64 / 2.0;
    let view_box = format!("0 0 {} {}", style.width, style.height);
    html! {
        svg xmlns="http://www.w3.org/2000/svg"
            width=(style.width) height=(style.height)
            viewBox=(view_box)
            font-family=(style.font_family) {
            rect x="0" y="0" width=(style.width) height=(style.height) fill="#ffffff" {}
            text x=(title_x) y="40" text-anchor="middle"
                font-size="22" font-weight="bold" { (xml_text(&request.title)) }
            (body)
        }
    }
}

fn vertical_chart(request: &ChartRequest<'_>) -> Markup {
    let style = &request.style;
    let aggregate = request.aggregate;
    let rotate = aggregate.categories().any(|c| c.chars().count() > 15);

    let left = 90.0;
    let right = 30.0;
    let bottom = if rotate { 220.0 } else { 90.0 };
    let plot_w = style.width as f64 - left - right;
    let plot_h = style.height as f64 - TITLE_BAND - bottom;
    let base_y = TITLE_BAND + plot_h;
    let max = axis_max(aggregate);
    let slot = plot_w / aggregate.len() as f64;
    let bar_w = slot * 0.8;
    let count = aggregate.len();

    let axis_end = left + plot_w;
    let tick_x = left - 8.0;
    let label_x = left + plot_w / 2.0;
    let label_y = style.height as f64 - 20.0;
    let count_y = TITLE_BAND + plot_h / 2.0;
    let count_transform = format!("rotate(-90 24 {})", count_y);

    let body = html! {
        @for step in 0..=GRID_LINES {
            @let fraction = step as f64 / GRID_LINES as f64;
            @let tick = format_thousands((max * fraction).round() as u64);
            @let y = base_y - plot_h * fraction;
            @let tick_y = y + 4.0;
            line x1=(left) x2=(axis_end) y1=(y) y2=(y) stroke="#dddddd" {}
            text x=(tick_x) y=(tick_y) text-anchor="end" font-size="12" { (tick) }
        }
        @for (i, entry) in aggregate.entries.iter().enumerate() {
            @let x = left + slot * i as f64 + (slot - bar_w) / 2.0;
            @let h = plot_h * entry.count as f64 / max;
            @let top = base_y - h;
            @let value_y = top - 6.0;
            @let center = x + bar_w / 2.0;
            @let category = xml_text(&entry.category);
            rect x=(x) y=(top) width=(bar_w) height=(h)
                fill=(style.palette.color(i, count)) {}
            text x=(center) y=(value_y) text-anchor="middle"
                font-size="12" font-weight="bold" { (format_thousands(entry.count)) }
            @if rotate {
                @let category_y = base_y + 16.0;
                @let transform = format!("rotate(-45 {} {})", center, category_y);
                text x=(center) y=(category_y) text-anchor="end" font-size="12"
                    transform=(transform) { (category) }
            } @else {
                @let category_y = base_y + 20.0;
                text x=(center) y=(category_y) text-anchor="middle" font-size="12" { (category) }
            }
        }
        line x1=(left) x2=(axis_end) y1=(base_y) y2=(base_y) stroke="#333333" {}
        text x=(label_x) y=(label_y) text-anchor="middle"
            font-size="14" { (xml_text(&request.category_label)) }
        text x="24" y=(count_y) text-anchor="middle" font-size="14"
            transform=(count_transform) { "Count" }
    };
    frame(request, body)
}

fn horizontal_chart(request: &ChartRequest<'_>) -> Markup {
    let style = &request.style;
    let aggregate = request.aggregate;
    let longest = aggregate
        .categories()
        .map(|c| c.chars().count())
        .max()
        .unwrap_or(0);

    // label column is never narrower than 120
    let left = (longest as f64 * 7.0 + 40.0)
        .min(style.width as f64 * 0.55)
        .max(120.0);
    let right = 60.0;
    let bottom = 70.0;
    let plot_w = style.width as f64 - left - right;
    let plot_h = style.height as f64 - TITLE_BAND - bottom;
    let max = axis_max(aggregate);
    let slot = plot_h / aggregate.len() as f64;
    let bar_h = slot * 0.8;
    let count = aggregate.len();

    let plot_bottom = TITLE_BAND + plot_h;
    let tick_y = plot_bottom + 18.0;
    let label_x = left - 8.0;
    let count_x = left + plot_w / 2.0;
    let count_y = style.height as f64 - 20.0;
    let heading_y = TITLE_BAND - 12.0;

    let body = html! {
        @for step in 0..=GRID_LINES {
            @let fraction = step as f64 / GRID_LINES as f64;
            @let tick = format_thousands((max * fraction).round() as u64);
            @let x = left + plot_w * fraction;
            line x1=(x) x2=(x) y1=(TITLE_BAND) y2=(plot_bottom) stroke="#dddddd" {}
            text x=(x) y=(tick_y) text-anchor="middle" font-size="12" { (tick) }
        }
        @for (i, entry) in aggregate.entries.iter().enumerate() {
            @let y = TITLE_BAND + slot * i as f64 + (slot - bar_h) / 2.0;
            @let w = plot_w * entry.count as f64 / max;
            @let middle = y + bar_h / 2.0 + 4.0;
            @let value_x = left + w + 6.0;
            rect x=(left) y=(y) width=(w) height=(bar_h) fill=(style.palette.color(i, count)) {}
            text x=(label_x) y=(middle) text-anchor="end" font-size="12" {
                (xml_text(&entry.category))
            }
            text x=(value_x) y=(middle) font-size="12" font-weight="bold" {
                (format_thousands(entry.count))
            }
        }
        line x1=(left) x2=(left) y1=(TITLE_BAND) y2=(plot_bottom) stroke="#333333" {}
        text x=(count_x) y=(count_y) text-anchor="middle" font-size="14" { "Count" }
        text x="20" y=(heading_y) font-size="14" { (xml_text(&request.category_label)) }
    };
    frame(request, body)
}

/// Plain-text frequency listing written next to the charts
pub fn write_listing(
    output_dir: &Path,
    file_name: &str,
    aggregate: &AggregateResult,
) -> ReportResult<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_io_context(|| format!("Failed to create {}", output_dir.display()))?;
    let path = output_dir.join(file_name);
    fs::write(&path, aggregate.to_string())
        .with_io_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
