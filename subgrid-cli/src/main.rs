//! Subgrid CLI - render one page of a FetchXML grid
//!
//! Usage:
//!   subgrid <input> --fixture <records.json> [--page <n>] [--page-size <n>]
//!   subgrid <input> --url <environment url> [--format json]
//!
//! `<input>` holds either a FetchXML query or a JSON configuration object.
//! With `--url`, the bearer token is read from `SUBGRID_TOKEN`.
//!
//! Exits with 2 when the query itself is rejected, 1 on any other failure.

use std::fs;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use clap::ValueEnum;
use serde_json::json;
use simplelog::ColorChoice;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::TermLogger;
use simplelog::TerminalMode;
use simplelog::WriteLogger;
use subgrid_lib::GridLoader;
use subgrid_lib::GridPage;
use subgrid_lib::config::GridConfig;
use subgrid_lib::config::GridDefaults;
use subgrid_lib::error::Error;
use subgrid_lib::grid::GridHeader;
use subgrid_lib::service::DataService;
use subgrid_lib::service::MemoryService;
use subgrid_lib::webapi::StaticTokenProvider;
use subgrid_lib::webapi::WebApiService;

const TOKEN_VAR: &str = "SUBGRID_TOKEN";
const MAX_CELL_CHARS: usize = 40;

#[derive(Parser)]
#[command(name = "subgrid")]
#[command(about = "Render a page of a FetchXML subgrid")]
#[command(version)]
struct Cli {
    /// File holding a FetchXML query or a JSON configuration
    input: PathBuf,

    /// Fixture file with records, metadata and time zones
    #[arg(long, conflicts_with = "url")]
    fixture: Option<PathBuf>,

    /// Dataverse environment URL
    #[arg(long, required_unless_present = "fixture")]
    url: Option<String>,

    /// Page to load (1-based)
    #[arg(short, long, default_value_t = 1)]
    page: u32,

    /// Records per page, overriding the configuration
    #[arg(long)]
    page_size: Option<u32>,

    /// Width available to the grid, in pixels
    #[arg(short, long, default_value_t = 1000)]
    width: u32,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Aligned text table
    Table,
    /// Header and items as JSON
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    let raw = match fs::read_to_string(&cli.input) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading {}: {}", cli.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut config = GridConfig::from_raw_input(Some(raw.trim()), &GridDefaults::default());
    if let Some(err) = config.error.take() {
        if matches!(err, Error::Parse(_)) {
            eprintln!("Error in query: {}", err);
            return ExitCode::from(2);
        }
        eprintln!("Warning: {}", err);
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size.clamp(1, 250);
    }

    let service = match build_service(&cli) {
        Ok(service) => service,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &config, service.as_ref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_configuration_error() => {
            log::warn!("Query rejected: {}", e);
            eprintln!("Error in query: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            log::warn!("Loading failed: {}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    match &cli.log_file {
        Some(path) => WriteLogger::init(level, Config::default(), File::create(path)?)?,
        None => TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)?,
    }
    Ok(())
}

fn build_service(cli: &Cli) -> Result<Box<dyn DataService>, String> {
    if let Some(path) = &cli.fixture {
        let json = fs::read_to_string(path).map_err(|e| format!("reading {}: {}", path.display(), e))?;
        let service = MemoryService::from_fixture_json(&json).map_err(|e| format!("invalid fixture: {}", e))?;
        return Ok(Box::new(service));
    }

    let url = cli.url.clone().ok_or("either --fixture or --url is required")?;
    let token = std::env::var(TOKEN_VAR).map_err(|_| format!("{} is not set", TOKEN_VAR))?;

    let service = WebApiService::builder()
        .url(url)
        .token_provider(StaticTokenProvider::new(token))
        .timeout(Duration::from_secs(cli.timeout))
        .build()
        .map_err(|e| e.to_string())?;
    Ok(Box::new(service))
}

async fn run(cli: &Cli, config: &GridConfig, service: &dyn DataService) -> Result<(), Error> {
    let loader = GridLoader::new(service);

    let header = loader.load_header(&config.fetch_xml, cli.width).await?;
    let page = loader.load_page(&config.fetch_xml, config.page_size, cli.page).await?;

    match cli.format {
        OutputFormat::Table => print_table(config, &header, &page),
        OutputFormat::Json => {
            let output = json!({
                "header": header,
                "items": page.items(),
                "window": {
                    "totalCount": page.window().total_count,
                    "page": page.window().page,
                    "firstItemIndex": page.window().first_item_index,
                    "lastItemIndex": page.window().last_item_index,
                    "hasNext": page.window().has_next,
                    "hasPrevious": page.window().has_previous,
                },
            });
            println!("{:#}", output);
        }
    }
    Ok(())
}

// =============================================================================
// Table output
// =============================================================================

fn print_table(config: &GridConfig, header: &GridHeader, page: &GridPage) {
    let mut commands = Vec::new();
    if config.new_button_visibility {
        commands.push(format!("[New {}]", header.display_name));
    }
    if config.delete_button_visibility {
        commands.push("[Delete]".to_string());
    }
    if !commands.is_empty() {
        println!("{}", commands.join(" "));
        println!();
    }

    let rows: Vec<Vec<String>> = page
        .items()
        .iter()
        .map(|item| {
            header
                .columns
                .iter()
                .map(|column| {
                    let text = item.get(&column.key).map(|cell| cell.display.to_string()).unwrap_or_default();
                    match item.get(&column.key) {
                        Some(cell) if cell.linkable && !text.is_empty() => truncate(&format!("<{}>", text)),
                        _ => truncate(&text),
                    }
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = header
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let heading = sort_marker(column.is_sorted, column.is_sorted_descending).len() + column.name.chars().count();
            rows.iter()
                .map(|row| row[i].chars().count())
                .fold(heading, usize::max)
        })
        .collect();

    let heading: Vec<String> = header
        .columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| {
            let title = format!("{}{}", column.name, sort_marker(column.is_sorted, column.is_sorted_descending));
            pad(&title, *width)
        })
        .collect();
    println!("{}", heading.join(" | "));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    );

    for row in &rows {
        let cells: Vec<String> = row.iter().zip(&widths).map(|(text, width)| pad(text, *width)).collect();
        println!("{}", cells.join(" | "));
    }

    let window = page.window();
    println!();
    println!(
        "{} - {} of {}    page {}{}{}",
        window.first_item_index,
        window.last_item_index,
        window.total_count,
        window.page,
        if window.has_previous { "  [< previous]" } else { "" },
        if window.has_next { "  [next >]" } else { "" },
    );
}

fn sort_marker(is_sorted: bool, descending: bool) -> &'static str {
    match (is_sorted, descending) {
        (false, _) => "",
        (true, false) => " ^",
        (true, true) => " v",
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_CELL_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
    short.push_str("...");
    short
}

fn pad(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(text.chars().count());
    format!("{}{}", text, " ".repeat(padding))
}
