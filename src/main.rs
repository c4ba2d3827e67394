use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use proxygrab::{
    logging,
    proxy::{checker::DEFAULT_TEST_URL, source::DEFAULT_BASE_URL, CheckerConfig, SourceConfig},
    tui::ValidationApp,
    Config, Endpoint, Pipeline, ProtocolClass, RunReport,
};
use std::path::PathBuf;
use std::time::Duration;

/// Harvest public proxies and sort the working ones by protocol
#[derive(Parser)]
#[command(name = "proxygrab")]
#[command(about = "Harvest public proxies and sort the working ones by protocol")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for output files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest proxies from the listing and save them to proxygrab.txt
    Grab {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Harvest proxies, then check them and save working ones by protocol
    Check {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        checker: CheckerArgs,
    },
    /// Check proxies listed in an existing file
    CheckFile {
        /// Input file with one host:port per line
        input: PathBuf,
        #[command(flatten)]
        checker: CheckerArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Listing URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Entries requested per page
    #[arg(long, default_value = "500")]
    limit: u32,
    /// Stop after this many pages
    #[arg(long)]
    max_pages: Option<u32>,
    /// Timeout in seconds for listing requests
    #[arg(long, default_value = "30")]
    source_timeout: u64,
}

impl SourceArgs {
    fn config(&self) -> SourceConfig {
        SourceConfig::new()
            .with_base_url(self.base_url.clone())
            .with_page_size(self.limit)
            .with_timeout(Duration::from_secs(self.source_timeout))
            .with_max_pages(self.max_pages)
    }
}

#[derive(Args)]
struct CheckerArgs {
    /// Number of proxies checked at once
    #[arg(short = 'n', long, default_value = "200")]
    threads: usize,
    /// Timeout in seconds per proxy
    #[arg(long, default_value = "5")]
    timeout: u64,
    /// URL requested through each proxy; must answer 200
    #[arg(long, default_value = DEFAULT_TEST_URL)]
    test_url: String,
    /// Skip proxies that refuse a plain TCP connect
    #[arg(long)]
    liveness: bool,
    /// Timeout in seconds for the TCP connect
    #[arg(long, default_value = "5")]
    liveness_timeout: u64,
    /// Show live progress in a terminal UI
    #[arg(long)]
    tui: bool,
}

impl CheckerArgs {
    fn config(&self) -> CheckerConfig {
        CheckerConfig::new()
            .with_concurrency(self.threads)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_test_url(self.test_url.clone())
            .with_liveness_gate(self.liveness)
            .with_liveness_timeout(Duration::from_secs(self.liveness_timeout))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let tui = matches!(
        &cli.command,
        Commands::Check { checker, .. } | Commands::CheckFile { checker, .. } if checker.tui
    );
    if tui {
        logging::init_to_file(cli.verbose, &cli.output_dir.join("proxygrab.log"))?;
    } else {
        logging::init(cli.verbose);
    }

    let mut config = Config::new().with_output_dir(&cli.output_dir);

    match &cli.command {
        Commands::Grab { source } => {
            config = config.with_source(source.config());
            let pipeline = Pipeline::from_config(&config)?;

            let report = pipeline.harvest().await;
            print_report(&report);
        }
        Commands::Check { source, checker } => {
            config = config.with_source(source.config()).with_checker(checker.config());
            let pipeline = Pipeline::from_config(&config)?;
            println!(
                "Checking with {} threads, timeout: {}s",
                checker.threads, checker.timeout
            );

            let report = if checker.tui {
                let mut report = RunReport::default();
                let endpoints = pipeline.collect(&mut report).await;
                if !endpoints.is_empty() {
                    validate_with_tui(&pipeline, endpoints, &mut report).await?;
                }
                report
            } else {
                pipeline.harvest_and_validate().await
            };
            print_report(&report);
        }
        Commands::CheckFile { input, checker } => {
            config = config.with_checker(checker.config());
            let pipeline = Pipeline::from_config(&config)?;

            let report = if checker.tui {
                let mut report = RunReport::default();
                let endpoints = pipeline.load(input, &mut report)?;
                if !endpoints.is_empty() {
                    validate_with_tui(&pipeline, endpoints, &mut report).await?;
                }
                report
            } else {
                println!("Checking with {} threads, timeout: {}s", checker.threads, checker.timeout);
                pipeline.validate_file(input).await?
            };

            if report.loaded == 0 {
                println!("No proxies found in {:?}", input);
            }
            print_report(&report);
        }
    }

    Ok(())
}

async fn validate_with_tui(
    pipeline: &Pipeline,
    endpoints: Vec<Endpoint>,
    report: &mut RunReport,
) -> Result<()> {
    let run = ValidationApp::new(endpoints, pipeline.validator().clone())
        .run()
        .await?;
    if !run.completed {
        println!(
            "Validation stopped early; saving {} results checked so far",
            run.set.total()
        );
    }
    pipeline.persist(run.set, report);
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.harvested > 0 {
        println!("Harvested {} proxies", report.harvested);
    }
    if let Some(error) = &report.source_error {
        eprintln!("Harvest stopped early: {}", error);
    }
    if report.rejected > 0 {
        println!("Skipped {} malformed lines", report.rejected);
    }

    if let Some(set) = &report.classified {
        println!(
            "Results: {} working, {} unknown",
            report.working(),
            set.count(ProtocolClass::Unknown)
        );
    }

    for (path, count) in &report.written {
        println!("Saved {} proxies to {:?}", count, path);
    }
    for error in &report.write_errors {
        eprintln!("Error: {}", error);
    }
}
