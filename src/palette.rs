// Color assignment for chart marks

use plotters::style::RGBColor;

/// Fixed color for the synthetic "Other" bucket
pub const OTHER_COLOR: &str = "#b0b0b0";

/// Color for values of a filtered column other than the active one
pub const DIMMED_COLOR: &str = "#d9d9d9";

/// Default color for scatter points and histogram bins
pub const SAMPLE_COLOR: &str = "#1f77b4";

/// Ordered palette cycled by mark position
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<&'static str>,
}

impl ColorPalette {
    /// The ten-color "category10" palette
    pub fn category10() -> Self {
        Self {
            colors: vec![
                "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
                "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
            ],
        }
    }

    /// Color for the mark at `position`
    pub fn color_at(&self, position: usize) -> &'static str {
        self.colors[position % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::category10()
    }
}

/// Parse a `#rrggbb` string, falling back to the first palette color
pub fn parse_color(color: &str) -> RGBColor {
    parse_hex(color).unwrap_or(RGBColor(0x1f, 0x77, 0xb4))
}

fn parse_hex(color: &str) -> Option<RGBColor> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}
