//! Line-oriented interactive session.
//!
//! Each input line is parsed into a [`SessionCommand`]. Dashboard commands
//! become [`DashboardEvent`]s; `ask` goes to the chat service and is
//! recorded in an in-memory transcript. Nothing is persisted.

use crate::dashboard::{preview_figure, CardView, Dashboard, DashboardEvent, EventOutcome};
use crate::filter::FilterChip;
use crate::graph::render_figure;
use crate::ir::{Geometry, Highlight};
use crate::parser::{parse_command_line, SessionCommand};
use crate::recipe::Recipe;
use crate::source::ChatService;
use crate::OutputFormat;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, error, info};

const HELP: &str = "\
Commands:
  click <card> <label>   toggle a cross-filter on a bar or pie slice
  pill <card> <label>    show or hide a category on a card
  all <card>             toggle between every category and the top four
  remove <column>        remove one filter
  clear                  remove every filter
  filters                list active filters
  cards                  list dashboard cards
  ask <question>         ask the chat service about the data
  viz on|off             ask the chat service to attach charts
  help                   show this help
  quit                   leave the session
Labels containing spaces must be double-quoted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Error,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub chart: Option<Recipe>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    /// Start with chart attachments requested
    pub viz_mode: bool,
    /// Where charts attached to chat replies are written
    pub chart_dir: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Run the session until `quit` or end of input. Returns the transcript.
pub fn run_session<R: BufRead, W: Write>(
    dashboard: &mut Dashboard,
    chat: &dyn ChatService,
    settings: &SessionSettings,
    input: R,
    out: &mut W,
) -> Result<Vec<Message>> {
    let mut transcript = Vec::new();
    let mut viz_mode = settings.viz_mode;

    writeln!(
        out,
        "surveydash: {} rows, {} cards. Type 'help' for commands.",
        dashboard.store().len(),
        dashboard.cards().len()
    )?;
    write_cards(out, dashboard.views())?;

    for line in input.lines() {
        let line = line.context("Failed to read session input")?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command_line(&line) {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "error: {}", e)?;
                continue;
            }
        };
        debug!(?command, "Session command");

        let event = match command {
            SessionCommand::Quit => break,
            SessionCommand::Help => {
                writeln!(out, "{}", HELP)?;
                continue;
            }
            SessionCommand::Filters => {
                write_chips(out, &dashboard.chips())?;
                continue;
            }
            SessionCommand::Cards => {
                write_cards(out, dashboard.views())?;
                continue;
            }
            SessionCommand::Viz(on) => {
                viz_mode = on;
                writeln!(out, "viz mode {}", if on { "on" } else { "off" })?;
                continue;
            }
            SessionCommand::Ask { question } => {
                ask(dashboard, chat, settings, viz_mode, question, &mut transcript, out)?;
                continue;
            }
            SessionCommand::Click { card, label } => DashboardEvent::ChartClick { card, label },
            SessionCommand::Pill { card, label } => DashboardEvent::TogglePill { card, label },
            SessionCommand::All { card } => DashboardEvent::ToggleAll { card },
            SessionCommand::Remove { column } => DashboardEvent::RemoveFilter { column },
            SessionCommand::Clear => DashboardEvent::ClearFilters,
        };

        match dashboard.dispatch(event) {
            EventOutcome::Changed => {
                write_chips(out, &dashboard.chips())?;
                write_cards(out, dashboard.views())?;
            }
            EventOutcome::Ignored(reason) => writeln!(out, "ignored: {}", reason)?,
            EventOutcome::Rejected(reason) => writeln!(out, "rejected: {}", reason)?,
        }
    }

    info!(messages = transcript.len(), "Session ended");
    Ok(transcript)
}

fn ask<W: Write>(
    dashboard: &Dashboard,
    chat: &dyn ChatService,
    settings: &SessionSettings,
    viz_mode: bool,
    question: String,
    transcript: &mut Vec<Message>,
    out: &mut W,
) -> Result<()> {
    transcript.push(Message {
        role: Role::User,
        text: question.clone(),
        chart: None,
    });

    let reply = match chat.ask(&question, viz_mode) {
        Ok(reply) => reply,
        Err(e) => {
            let text = format!("{:#}", e);
            writeln!(out, "error: {}", text)?;
            transcript.push(Message {
                role: Role::Error,
                text,
                chart: None,
            });
            return Ok(());
        }
    };

    writeln!(out, "assistant: {}", reply.reply)?;
    if let Some(recipe) = &reply.chart {
        let number = transcript.iter().filter(|m| m.chart.is_some()).count();
        match write_chat_chart(dashboard, settings, recipe, number) {
            Ok(Some(path)) => writeln!(out, "chart: {} ({})", recipe.display_title(), path.display())?,
            Ok(None) => writeln!(out, "chart: {}", recipe.display_title())?,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Failed to render chat chart");
                writeln!(out, "chart: {} (could not be drawn)", recipe.display_title())?;
            }
        }
    }

    transcript.push(Message {
        role: Role::Assistant,
        text: reply.reply,
        chart: reply.chart,
    });
    Ok(())
}

fn write_chat_chart(
    dashboard: &Dashboard,
    settings: &SessionSettings,
    recipe: &Recipe,
    number: usize,
) -> Result<Option<PathBuf>> {
    let Some(dir) = &settings.chart_dir else {
        return Ok(None);
    };
    let figure = preview_figure(recipe, dashboard.store(), dashboard.options())?;
    let bytes = render_figure(&figure, &settings.format)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create '{}'", dir.display()))?;
    let path = dir.join(format!("chat-{}.{}", number, settings.format.extension()));
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(Some(path))
}

// =============================================================================
// Text output
// =============================================================================

fn write_chips<W: Write>(out: &mut W, chips: &[FilterChip]) -> Result<()> {
    if chips.is_empty() {
        writeln!(out, "filters: none")?;
    } else {
        let labels: Vec<String> = chips.iter().map(FilterChip::label).collect();
        writeln!(out, "filters: {}", labels.join(", "))?;
    }
    Ok(())
}

fn write_cards<W: Write>(out: &mut W, views: &[CardView]) -> Result<()> {
    for view in views {
        writeln!(out, "{}", describe_card(view))?;
    }
    Ok(())
}

/// Plain-text rendering of a card: title, plotted values and pills.
/// The active filter value is marked with `*`.
pub fn describe_card(view: &CardView) -> String {
    let figure = &view.figure;
    let body = match &figure.geometry {
        Geometry::Bars { marks } | Geometry::Pie { marks } => marks
            .iter()
            .map(|m| {
                let marker = if m.highlight == Highlight::Active { "*" } else { "" };
                format!("{}{}={}", marker, m.label, format_value(m.value))
            })
            .collect::<Vec<_>>()
            .join(", "),
        Geometry::Scatter { points, .. } => format!("{} points", points.len()),
        Geometry::Histogram { bins, .. } => {
            let total: usize = bins.iter().map(|b| b.count).sum();
            format!("{} values in {} bins", total, bins.len())
        }
        Geometry::Empty => "no data".to_string(),
    };

    let kind = match &figure.geometry {
        Geometry::Bars { .. } => "bar",
        Geometry::Pie { .. } => "pie",
        Geometry::Scatter { .. } => "scatter",
        Geometry::Histogram { .. } => "histogram",
        Geometry::Empty => "empty",
    };

    let mut text = format!("[{}] {} ({}): {}", view.card, view.title, kind, body);
    if let Some(description) = view.description.as_deref().filter(|d| !d.trim().is_empty()) {
        text.push_str(&format!("\n    {}", description.trim()));
    }
    if let Some(bar) = &view.pills {
        let pills: Vec<String> = bar
            .pills
            .iter()
            .map(|p| format!("[{}] {} ({})", if p.shown { "x" } else { " " }, p.label, p.count))
            .collect();
        text.push_str(&format!(
            "\n    pills: {} | all: {}",
            pills.join("  "),
            if bar.all_active { "on" } else { "off" }
        ));
    }
    text
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.2}", v)
    }
}
