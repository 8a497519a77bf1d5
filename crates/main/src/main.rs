use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use lookup_report::service::{ReportRequest, ReportService};
use lookup_report::source::{HttpRecordSource, LookupEnvelope, DEFAULT_SOURCE_URL, SOURCE_URL_ENV};
use lookup_report::store::{DirectoryStore, GitHubStore};
use lookup_report::{OutputFormat, RenderReport, ReportBuilder, ReportConfig, ReportContent, ReportType};

/// Renders lookup reports as PDF or PNG and publishes them.
///
/// Fonts must be present under `assets/fonts` next to the binary or the crate sources, or be
/// provided via the `LOOKUP_REPORT_FONTS_DIR` environment variable. Set `RUST_LOG=debug` for
/// layout and publication details.
#[derive(Parser)]
#[command(author, version, about = "Lookup report renderer and publisher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch records for a subject, publish the report and print the JSON response.
    #[command(name = "report")]
    Report(ReportArgs),

    /// Render a report from a local JSON payload without publishing it.
    #[command(name = "render")]
    Render(RenderArgs),
}

#[derive(Args)]
struct LayoutArgs {
    /// Report type: salary, consumption, employment or company.
    #[arg(short = 't', long = "type", default_value = "salary")]
    report_type: ReportType,

    /// Output format: pdf or png.
    #[arg(short, long, default_value = "pdf")]
    format: OutputFormat,

    /// TOML file overriding the default layout configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Image placed in the footer next to the disclaimer.
    #[arg(long, conflicts_with = "code_link")]
    code_image: Option<PathBuf>,

    /// Link encoded into the footer QR code; an empty value removes the code.
    #[arg(long)]
    code_link: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    /// Commit artifacts to the repository named by `GITHUB_REPO`.
    Github,
    /// Write artifacts into `--out-dir`.
    Dir,
}

#[derive(Args)]
struct ReportArgs {
    /// Subject id (DNI) to look up.
    subject: String,

    #[command(flatten)]
    layout: LayoutArgs,

    #[arg(long, value_enum, default_value = "dir")]
    store: StoreKind,

    /// Target directory of the `dir` store.
    #[arg(long, default_value = "target/reports")]
    out_dir: PathBuf,

    /// Base URL of the lookup service.
    #[arg(long, env = SOURCE_URL_ENV, default_value = DEFAULT_SOURCE_URL)]
    source_url: String,

    /// Timeout applied to every HTTP request, in seconds.
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Args)]
struct RenderArgs {
    /// JSON file holding a lookup response (`{"result": {"quantity", "coincidences"}}`).
    input: PathBuf,

    /// Subject id printed in the header.
    #[arg(short, long)]
    subject: String,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Output file; defaults to the artifact name in the current directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Report(args) => run_report(args),
        Commands::Render(args) => run_render(args),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn load_config(layout: &LayoutArgs) -> Result<ReportConfig, Box<dyn Error>> {
    Ok(match &layout.config {
        Some(path) => ReportConfig::from_path(path)?,
        None => ReportConfig::default(),
    })
}

fn build_renderer(
    layout: &LayoutArgs,
    config: ReportConfig,
) -> Result<lookup_report::ReportRenderer, Box<dyn Error>> {
    let mut builder = ReportBuilder::new().with_config(config);
    if let Some(path) = &layout.code_image {
        builder = builder.with_code_image_path(path);
    }
    if let Some(link) = &layout.code_link {
        builder = builder.with_code_link(link);
    }
    Ok(builder.build()?)
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn run_report(args: ReportArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.layout)?;
    let max_records = config.max_records;
    let renderer = build_renderer(&args.layout, config)?;
    let timeout = Duration::from_secs(args.timeout_secs);
    let source = HttpRecordSource::new(&args.source_url, timeout)?;
    let request = ReportRequest::new(
        args.subject,
        args.layout.report_type,
        args.layout.format,
        today(),
    );

    let (status, body) = match args.store {
        StoreKind::Github => {
            let store = GitHubStore::from_env()?.with_timeout(timeout)?;
            ReportService::new(source, store, renderer)
                .with_max_records(max_records)
                .respond(&request)
        }
        StoreKind::Dir => {
            let store = DirectoryStore::new(&args.out_dir);
            ReportService::new(source, store, renderer)
                .with_max_records(max_records)
                .respond(&request)
        }
    };

    println!("{}", serde_json::to_string_pretty(&body)?);
    if status != 200 {
        std::process::exit(if status == 404 { 2 } else { 1 });
    }
    Ok(())
}

fn run_render(args: RenderArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.layout)?;
    let max_records = config.max_records;
    let renderer = build_renderer(&args.layout, config)?;

    let payload = std::fs::read_to_string(&args.input)?;
    let result = LookupEnvelope::from_json_str(&payload)?.into_result();
    let records = match max_records {
        Some(cap) if cap < result.coincidences.len() => &result.coincidences[..cap],
        _ => &result.coincidences[..],
    };

    let content = ReportContent {
        subject: args.subject.trim(),
        report_type: args.layout.report_type,
        generated_on: today(),
        quantity: result.quantity,
        records,
    };
    let bytes = renderer.render(&content, args.layout.format)?;

    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(lookup_report::publish::artifact_name(
            content.subject,
            content.report_type,
            args.layout.format,
        ))
    });
    std::fs::write(&output, &bytes)?;
    info!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
