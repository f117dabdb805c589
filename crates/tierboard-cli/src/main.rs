use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tierboard::{
    DirectoryAssets, ExportOptions, Exporter, FixReport, ImageDiagnostic, diagnose_images,
    fix_images,
};
use tierboard_core::{BoardLayout, CONTAINER_ID, Document, Ranking, render_board};
use tierboard_render::ImageFormat;
use url::Url;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    Url(url::ParseError),
    Export(tierboard::ExportError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Url(err) => write!(f, "invalid origin: {err}"),
            CliError::Export(err) => write!(f, "{err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<url::ParseError> for CliError {
    fn from(value: url::ParseError) -> Self {
        Self::Url(value)
    }
}

impl From<tierboard::ExportError> for CliError {
    fn from(value: tierboard::ExportError) -> Self {
        Self::Export(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Export,
    Diagnose,
}

#[derive(Debug)]
struct Args {
    command: Command,
    input: Option<String>,
    covers: PathBuf,
    origin: String,
    options: ExportOptions,
    out_dir: PathBuf,
    fix: bool,
    pretty: bool,
}

#[derive(Serialize)]
struct DiagnoseOut {
    images: Vec<ImageDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fix: Option<FixReport>,
}

fn usage() -> &'static str {
    "tierboard-cli\n\
\n\
USAGE:\n\
  tierboard-cli export [--covers <dir>] [--origin <url>] [--format png|jpg|svg] [--quality <0-1>] [--scale <n>] [--background <css-color>|none] [--out-dir <dir>] [--filename <name>] [--prefer-serialization] [<board.json>|-]\n\
  tierboard-cli diagnose [--covers <dir>] [--origin <url>] [--fix] [--pretty] [<board.json>|-]\n\
\n\
NOTES:\n\
  - If <board.json> is omitted or '-', the ranking is read from stdin.\n\
  - Covers are served from <dir> (default ./covers) as <origin>/covers/<name>.\n\
  - export writes <filename>-<timestamp>.<ext> into --out-dir (default .) and prints its path.\n\
  - diagnose prints one JSON record per cover image; --fix also repairs them and reports counts.\n\
  - Set RUST_LOG to see pipeline logs on stderr.\n\
"
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a String, CliError> {
    it.next().ok_or(CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut command = None;
    let mut args = Args {
        command: Command::Export,
        input: None,
        covers: PathBuf::from("covers"),
        origin: "http://localhost:3000/".to_string(),
        options: ExportOptions::default(),
        out_dir: PathBuf::from("."),
        fix: false,
        pretty: false,
    };

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "export" if command.is_none() => command = Some(Command::Export),
            "diagnose" if command.is_none() => command = Some(Command::Diagnose),
            "--covers" => args.covers = PathBuf::from(next_value(&mut it)?),
            "--origin" => args.origin = next_value(&mut it)?.clone(),
            "--format" => {
                args.options.format = next_value(&mut it)?
                    .parse::<ImageFormat>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--quality" => {
                args.options.quality = next_value(&mut it)?
                    .parse::<f32>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--scale" => {
                let scale = next_value(&mut it)?
                    .parse::<f32>()
                    .map_err(|_| CliError::Usage(usage()))?;
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(CliError::Usage(usage()));
                }
                args.options.pixel_ratio = scale;
            }
            "--background" => {
                let bg = next_value(&mut it)?.trim();
                args.options.background_color =
                    (!bg.is_empty() && !bg.eq_ignore_ascii_case("none")).then(|| bg.to_string());
            }
            "--out-dir" => args.out_dir = PathBuf::from(next_value(&mut it)?),
            "--filename" => args.options.filename = Some(next_value(&mut it)?.clone()),
            "--prefer-serialization" => args.options.prefer_serialization = true,
            "--fix" => args.fix = true,
            "--pretty" => args.pretty = true,
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    args.command = command.ok_or(CliError::Usage(usage()))?;
    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

async fn run(args: Args) -> Result<(), CliError> {
    let ranking: Ranking = serde_json::from_str(&read_input(args.input.as_deref())?)?;
    let origin = Url::parse(&args.origin)?;

    let mut doc = Document::new(origin.clone());
    render_board(&ranking, &mut doc, &BoardLayout::default());

    let assets = DirectoryAssets::new(origin, "/covers/", &args.covers);
    let mut builder = Exporter::builder(Arc::new(assets));
    if args.command == Command::Export {
        std::fs::create_dir_all(&args.out_dir)?;
        builder = builder.download_dir(&args.out_dir);
    }
    let exporter = builder.build();

    match args.command {
        Command::Export => {
            let artifact = exporter
                .try_export_element(&mut doc, CONTAINER_ID, None, &args.options)
                .await?;
            tracing::info!(
                backend = artifact.backend,
                embedded = artifact.report.embedded,
                placeholders = artifact.report.placeholders,
                "exported"
            );
            match &artifact.path {
                Some(path) => println!("{}", path.display()),
                None => println!("{}", artifact.file_name),
            }
            Ok(())
        }
        Command::Diagnose => {
            let images = diagnose_images(&exporter, &doc, CONTAINER_ID).await?;
            let fix = if args.fix {
                Some(fix_images(&exporter, &mut doc, CONTAINER_ID).await?)
            } else {
                None
            };
            write_json(&DiagnoseOut { images, fix }, args.pretty)
        }
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("{}", CliError::Io(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(args)) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
