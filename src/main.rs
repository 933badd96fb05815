use clap::{Parser, Subcommand};
use pagepress::builder::{BuildSettings, Builder, ExportOptions};
use pagepress::context::BuildContext;
use pagepress::pod::FsPod;
use pagepress::progress::TerminalProgress;
use pagepress::translations::TranslationCache;
use pagepress::{config, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Shared flags for commands that export.
#[derive(clap::Args, Clone)]
struct ExportArgs {
    /// Only export routes whose pod path matches (repeatable). Makes the
    /// build incremental: nothing is deleted from the output directory.
    #[arg(short, long = "pattern")]
    patterns: Vec<String>,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pagepress")]
#[command(about = "Incremental static site exporter")]
#[command(long_about = "\
Incremental static site exporter

Renders every route of a site into a staging directory, then moves the
results into the output directory and removes files that no longer belong
to the site. Unchanged files are detected by content hash.

Project structure:

  pagepress.toml                 # Optional config (see gen-config)
  content/
  ├── index.md                   # → /index.html
  └── blog/post.md               # → /blog/post/index.html
  static/
  └── css/site.css               # → /static/css/site.css

Records written to <output>/.pagepress/:
  manifest.json    output path → SHA-256 of every exported file
  metrics.json     route counts, bytes, memory, missing translations
  benchmark.txt    timings (benchmark command only)

Run 'pagepress gen-config' to generate a documented pagepress.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the site into the output directory
    Build(ExportArgs),
    /// Export and write a timing report to benchmark.txt
    Benchmark(ExportArgs),
    /// List every route and its output path without exporting
    Routes,
    /// Print a stock pagepress.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::Build(args) => {
            let config = config::load_config(&cli.root)?;
            let mut builder = export_builder(&config, &cli.root, args);
            let result = builder.export(&export_options(args))?;
            output::print_summary(&result, &config.output_path(&cli.root));
        }
        Command::Benchmark(args) => {
            let config = config::load_config(&cli.root)?;
            let mut builder = export_builder(&config, &cli.root, args);
            let (result, report) = builder.export_benchmark(&export_options(args))?;
            output::print_summary(&result, &config.output_path(&cli.root));
            println!();
            print!("{}", report);
        }
        Command::Routes => {
            let config = config::load_config(&cli.root)?;
            let routes = FsPod::from_config(&config, &cli.root).discover()?;
            output::print_routes(&routes);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn export_builder(config: &config::ExportConfig, root: &Path, args: &ExportArgs) -> Builder {
    let pod = FsPod::from_config(config, root);
    let settings = BuildSettings::from_config(config, root);
    let translations = TranslationCache::new(config.default_locale.clone(), &config.locales);
    let builder = Builder::new(pod, settings).with_context(BuildContext::new(translations));
    if config.progress.enabled && !args.no_progress {
        builder.with_progress(TerminalProgress::new())
    } else {
        builder
    }
}

fn export_options(args: &ExportArgs) -> ExportOptions {
    if args.patterns.is_empty() {
        ExportOptions::default()
    } else {
        ExportOptions::with_patterns(args.patterns.iter().cloned())
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match verbose {
        0 => "pagepress=warn",
        1 => "pagepress=info",
        2 => "pagepress=debug",
        _ => "pagepress=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
