use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use salesbridge_tools::config::PipelineConfig;
use salesbridge_tools::events::RunEvent;
use salesbridge_tools::model::RowOrder;
use salesbridge_tools::pipeline::{self, RunRequest};
use salesbridge_tools::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert(args) => execute_convert(args),
        Command::PrintConfig(args) => {
            let config = load_config(args.config.as_ref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn execute_convert(args: ConvertArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    args.apply_overrides(&mut config);

    let request = RunRequest {
        lookup: config.lookup_path(args.lookup.as_deref())?,
        sales: args.sales,
        template: args.template,
        output: args.output,
    };

    let mut print_event = |event: &RunEvent| println!("{event}");
    let report = pipeline::run(&request, &config, &mut print_event)?;

    if let Some(path) = &args.report {
        pipeline::write_report(path, &report)?;
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_toml_file(path),
        None => Ok(PipelineConfig::default()),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Convert marketplace sales exports into accounting templates."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate a sales export, resolve UIDs, and fill the template.
    Convert(ConvertArgs),
    /// Print the effective configuration as TOML.
    PrintConfig(ConfigArgs),
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Sales export (delimiter-separated text).
    #[arg(long)]
    sales: PathBuf,

    /// Workbook mapping articles to UIDs. Defaults to `lookup.path` from the config.
    #[arg(long)]
    lookup: Option<PathBuf>,

    /// Accounting template workbook.
    #[arg(long, default_value = "template.xlsx")]
    template: PathBuf,

    /// Output workbook path.
    #[arg(long)]
    output: PathBuf,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Field delimiter of the sales export.
    #[arg(long)]
    delimiter: Option<char>,

    /// Order of the rows written to the template.
    #[arg(long, value_enum)]
    order: Option<OrderKind>,

    /// First template row (1-based) receiving data.
    #[arg(long)]
    start_row: Option<u32>,

    /// Write a JSON report of the run to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OrderKind {
    FirstAppearance,
    Article,
}

impl From<OrderKind> for RowOrder {
    fn from(kind: OrderKind) -> Self {
        match kind {
            OrderKind::FirstAppearance => RowOrder::FirstAppearance,
            OrderKind::Article => RowOrder::Article,
        }
    }
}

impl ConvertArgs {
    fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(delimiter) = self.delimiter {
            config.sales.delimiter = delimiter;
        }
        if let Some(order) = self.order {
            config.order = order.into();
        }
        if let Some(start_row) = self.start_row {
            config.template.start_row = start_row;
        }
    }
}
