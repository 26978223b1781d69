use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use surveydash::config::AppConfig;
use surveydash::csv_reader::{read_csv_from_path, read_csv_from_stdin};
use surveydash::dashboard::{Dashboard, ImageWriter};
use surveydash::data::{summarize_columns, ColumnKind, RowStore};
use surveydash::parser::parse_filter_arg;
use surveydash::recipe::parse_recipe_document;
use surveydash::repl::{describe_card, run_session, SessionSettings};
use surveydash::source::{
    load_rows_or_empty, wait_for_recipes, ChatService, DashboardSource, FileSource, HttpSource, OfflineChat,
};
use surveydash::{OutputFormat, RenderOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "surveydash")]
#[command(about = "Cross-filtering chart dashboard for survey data", long_about = None)]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every recipe to an image file
    Render(RenderArgs),
    /// Print the inferred type and statistics of every column
    Summarize(SummarizeArgs),
    /// Interactive dashboard and chat session
    Session(SessionArgs),
}

/// Image size and format flags shared by `render` and `session`
#[derive(Args, Debug, Clone)]
struct ImageArgs {
    /// Output image format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
    /// Card width in pixels
    #[arg(long)]
    width: Option<u32>,
    /// Card height in pixels
    #[arg(long)]
    height: Option<u32>,
}

impl ImageArgs {
    fn apply(&self, mut options: RenderOptions) -> Result<RenderOptions> {
        if let Some(format) = self.format {
            options.format = format;
        }
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        options.validate()?;
        Ok(options)
    }
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// CSV dataset ("-" reads stdin)
    #[arg(long)]
    data: PathBuf,
    /// JSON recipe document
    #[arg(long)]
    recipes: PathBuf,
    /// Directory for card images
    #[arg(long)]
    out: PathBuf,
    /// Cross-filter to apply before rendering, as column=value
    #[arg(long = "filter")]
    filters: Vec<String>,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// CSV dataset ("-" reads stdin)
    #[arg(long)]
    data: PathBuf,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Local CSV dataset instead of the row service
    #[arg(long, requires = "recipes")]
    data: Option<PathBuf>,
    /// Local recipe document instead of the recipe service
    #[arg(long, requires = "data")]
    recipes: Option<PathBuf>,
    /// Directory for card images, rewritten after every change
    #[arg(long)]
    out: Option<PathBuf>,
    /// Start with chart attachments requested from the chat service
    #[arg(long)]
    viz: bool,
    #[command(flatten)]
    image: ImageArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug,reqwest=info" } else { "info,reqwest=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Render(args) => render(args),
        Command::Summarize(args) => summarize(args),
        Command::Session(args) => session(args),
    }
}

fn read_rows(path: &Path) -> Result<RowStore> {
    if path == Path::new("-") {
        read_csv_from_stdin().context("Failed to read CSV from stdin")
    } else {
        read_csv_from_path(path)
    }
}

fn render(args: RenderArgs) -> Result<()> {
    // 1. Load inputs
    let store = read_rows(&args.data)?;
    let text = std::fs::read_to_string(&args.recipes)
        .with_context(|| format!("Failed to read recipe file '{}'", args.recipes.display()))?;
    let recipes = parse_recipe_document(&text)?;
    let options = args.image.apply(RenderOptions::default())?;

    // 2. Build the dashboard and apply command-line filters
    let mut dashboard = Dashboard::new(store, recipes, options.clone());
    for arg in &args.filters {
        let (column, value) = parse_filter_arg(arg)?;
        dashboard.set_filter(&column, &value);
    }

    // 3. Write one image per card
    let writer = ImageWriter::new(&args.out, options.format)?;
    dashboard.subscribe(Box::new(writer));
    info!(cards = dashboard.cards().len(), out = %args.out.display(), "Cards rendered");

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for view in dashboard.views() {
        writeln!(handle, "{}", describe_card(view)).context("Failed to write to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn summarize(args: SummarizeArgs) -> Result<()> {
    let store = read_rows(&args.data)?;
    let summaries = summarize_columns(&store);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        let json = serde_json::to_string_pretty(&summaries).context("Failed to serialize summary")?;
        writeln!(handle, "{}", json)?;
    } else {
        writeln!(handle, "{} rows, {} columns", store.len(), store.headers.len())?;
        for s in &summaries {
            let detail = match (s.kind, s.min, s.max, s.mean) {
                (ColumnKind::Numeric, Some(min), Some(max), Some(mean)) => {
                    format!("min {} max {} mean {:.2}", min, max, mean)
                }
                _ => format!("e.g. {}", s.samples.join(", ")),
            };
            writeln!(
                handle,
                "{:<24} {:<12} {:>6} non-empty {:>6} distinct  {}",
                s.name,
                format!("{:?}", s.kind).to_lowercase(),
                s.non_empty,
                s.distinct,
                detail
            )?;
        }
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn session(args: SessionArgs) -> Result<()> {
    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let options = args.image.apply(config.render.clone())?;

    // Local files replace all three services; otherwise talk HTTP
    let (source, chat): (Box<dyn DashboardSource>, Box<dyn ChatService>) = match (&args.data, &args.recipes) {
        (Some(data), Some(recipes)) => (
            Box::new(FileSource::new(Some(data.clone()), Some(recipes.clone()))),
            Box::new(OfflineChat),
        ),
        _ => {
            info!(base_url = config.server.base_url.as_str(), "Using HTTP services");
            let http = HttpSource::new(&config.server)?;
            (Box::new(http.clone()), Box::new(http))
        }
    };

    let store = load_rows_or_empty(source.as_ref());
    let recipes = wait_for_recipes(source.as_ref(), &config.poll, std::thread::sleep)?;

    let mut dashboard = Dashboard::new(store, recipes, options.clone());
    if let Some(out) = &args.out {
        dashboard.subscribe(Box::new(ImageWriter::new(out, options.format)?));
    }

    let settings = SessionSettings {
        viz_mode: args.viz,
        chart_dir: args.out.clone(),
        format: options.format,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_session(&mut dashboard, chat.as_ref(), &settings, stdin.lock(), &mut out)?;
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}
