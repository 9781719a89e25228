use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use spicebase::app::{App, ProgressSink};
use spicebase::browse::{Pagination, PhytoQuery, SpiceQuery};
use spicebase::config::ConfigLoader;
use spicebase::domain::{BatchMode, PhytoSort, SpiceSort};
use spicebase::enrich::Enricher;
use spicebase::error::SpiceError;
use spicebase::model::{PhytoSummary, Spice};
use spicebase::output::{JsonOutput, OutputMode, TextOutput};
use spicebase::pubchem::PubchemHttpClient;
use spicebase::store::Store;

#[derive(Parser)]
#[command(name = "spicebase")]
#[command(about = "Spice and phytochemical reference database with on-demand PubChem enrichment")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<Utf8PathBuf>,

    /// Directory holding downloaded structure files
    #[arg(long, global = true)]
    static_root: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show row counts")]
    Stats,
    #[command(about = "Browse spices")]
    Spices {
        #[command(subcommand)]
        command: SpiceCommand,
    },
    #[command(about = "Browse phytochemicals")]
    Phytos {
        #[command(subcommand)]
        command: PhytoCommand,
    },
    #[command(about = "Download structure files from PubChem")]
    Structures {
        #[command(subcommand)]
        command: StructureCommand,
    },
    #[command(about = "Load and maintain the database")]
    Data {
        #[command(subcommand)]
        command: DataCommand,
    },
}

#[derive(Subcommand)]
enum SpiceCommand {
    #[command(about = "List spices page by page")]
    List(SpiceListArgs),
    #[command(about = "Prefix search by name")]
    Search(SearchArgs),
    #[command(about = "Show a spice and its phytochemicals")]
    Show { id: i64 },
}

#[derive(Subcommand)]
enum PhytoCommand {
    #[command(about = "List phytochemicals page by page")]
    List(PhytoListArgs),
    #[command(about = "Search by name prefix or exact CID")]
    Search(SearchArgs),
    #[command(about = "Show a phytochemical, enriching it from PubChem when needed")]
    Show {
        id: i64,
        /// Skip PubChem enrichment
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Subcommand)]
enum StructureCommand {
    #[command(about = "Batch download of SDF/PNG files")]
    Download {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value = "missing")]
        mode: BatchMode,
    },
}

#[derive(Subcommand)]
enum DataCommand {
    #[command(about = "Bulk load an Excel workbook")]
    Load { workbook: PathBuf },
    #[command(about = "Merge phytochemicals sharing a name")]
    Dedupe,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 25)]
    per_page: u32,
}

#[derive(Args)]
struct SpiceListArgs {
    #[arg(long)]
    q: Option<String>,
    /// Initial letter
    #[arg(long)]
    starts: Option<String>,
    #[arg(long, value_enum, default_value = "name-asc")]
    sort: SpiceSort,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct PhytoListArgs {
    #[arg(long)]
    q: Option<String>,
    #[arg(long)]
    only_cid: bool,
    #[arg(long)]
    only_2d: bool,
    #[arg(long)]
    only_3d: bool,
    #[arg(long, value_enum, default_value = "name-asc")]
    sort: PhytoSort,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SpiceError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SpiceError) -> u8 {
    match error {
        SpiceError::NotFound { .. } | SpiceError::StoreNotFound(_) => 2,
        error if error.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let mut resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        resolved.database = db;
    }
    if let Some(static_root) = cli.static_root {
        resolved.static_root = static_root;
    }
    tracing::debug!(database = %resolved.database, static_root = %resolved.static_root, "resolved config");

    let store = Store::new(resolved.database.clone(), resolved.static_root.clone());
    let client = PubchemHttpClient::new(&resolved.pubchem)?;
    let app = App::new(Enricher::new(store, client, resolved.enrich));

    match cli.command {
        Commands::Stats => {
            let counts = app.stats()?;
            emit(output_mode, &counts, TextOutput::counts)
        }
        Commands::Spices { command } => run_spices(&app, command, output_mode),
        Commands::Phytos { command } => run_phytos(&app, command, output_mode),
        Commands::Structures {
            command: StructureCommand::Download { limit, mode },
        } => {
            let report = app.download_structures(mode, limit, sink(output_mode))?;
            emit(output_mode, &report, TextOutput::batch)
        }
        Commands::Data { command } => match command {
            DataCommand::Load { workbook } => {
                let report = app.load_workbook(&workbook, sink(output_mode))?;
                emit(output_mode, &report, TextOutput::load)
            }
            DataCommand::Dedupe => {
                let report = app.dedupe(sink(output_mode))?;
                emit(output_mode, &report, TextOutput::dedupe)
            }
        },
    }
}

fn run_spices(
    app: &App<PubchemHttpClient>,
    command: SpiceCommand,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        SpiceCommand::List(args) => {
            let query = SpiceQuery {
                q: args.q,
                starts: args.starts,
                sort: args.sort,
                pagination: pagination(&args.page),
            };
            let page = app.list_spices(&query)?;
            emit(output_mode, &page, TextOutput::spice_page)
        }
        SpiceCommand::Search(args) => {
            let spices = app.search_spices(&args.query, args.limit)?;
            emit(output_mode, &spices, |items: &Vec<Spice>| TextOutput::spices(items))
        }
        SpiceCommand::Show { id } => {
            let detail = app.spice_detail(id)?;
            emit(output_mode, &detail, TextOutput::spice_detail)
        }
    }
}

fn run_phytos(
    app: &App<PubchemHttpClient>,
    command: PhytoCommand,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        PhytoCommand::List(args) => {
            let query = PhytoQuery {
                q: args.q,
                only_cid: args.only_cid,
                only_2d: args.only_2d,
                only_3d: args.only_3d,
                sort: args.sort,
                pagination: pagination(&args.page),
            };
            let page = app.list_phytochemicals(&query)?;
            emit(output_mode, &page, TextOutput::phyto_page)
        }
        PhytoCommand::Search(args) => {
            let items = app.search_phytochemicals(&args.query, args.limit)?;
            emit(output_mode, &items, |items: &Vec<PhytoSummary>| TextOutput::phytos(items))
        }
        PhytoCommand::Show { id, offline } => {
            let detail = app.phyto_detail(id, !offline)?;
            emit(output_mode, &detail, TextOutput::phyto_detail)
        }
    }
}

fn pagination(args: &PageArgs) -> Pagination {
    Pagination {
        page: args.page,
        per_page: args.per_page,
    }
}

fn sink(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TextOutput,
    }
}

fn emit<T: Serialize>(
    output_mode: OutputMode,
    value: &T,
    render: impl Fn(&T) -> String,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print(value).into_diagnostic(),
        OutputMode::Text => TextOutput::print(&render(value)).into_diagnostic(),
    }
}
