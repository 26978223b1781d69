// Library exports for surveydash

pub mod bucketing;
pub mod compiler;
pub mod config;
pub mod csv_reader;
pub mod dashboard;
pub mod data;
pub mod filter;
pub mod graph;
pub mod ir;
pub mod palette;
pub mod parser;
pub mod recipe;
pub mod repl;
pub mod source;
pub mod transform;

use anyhow::{bail, Result};
use serde::Deserialize;

/// Largest accepted card width or height, in pixels
pub const MAX_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 600 }
fn default_height() -> u32 { 350 }

impl RenderOptions {
    /// Reject sizes that cannot be drawn
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value == 0 || value > MAX_DIMENSION {
                bail!("Image {} must be between 1 and {} pixels, got {}", name, MAX_DIMENSION, value);
            }
        }
        Ok(())
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: OutputFormat::Png,
        }
    }
}
