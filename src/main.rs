use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use contractpit::config::{load_config, EnvironmentBuilder, Overrides};
use contractpit::generator::{SequentialGenerator, ValueGenerator};
use contractpit::report::{print_report, render_report, write_report, ReportFormat};
use contractpit::runner::{RunOptions, Runner};
use contractpit::scenario::load_suites;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "contractpit",
    version,
    about = "Declarative HTTP contract tests",
    disable_help_subcommand = true,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    /// Suite files or directories of suites (*.json)
    #[arg(value_name = "PATHS", required = true)]
    paths: Vec<PathBuf>,

    /// Select a profile from contractpit.json
    #[arg(short = 'P', long)]
    profile: Option<String>,

    /// Directory or file containing contractpit.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override env file relative to config directory
    #[arg(short, long)]
    env: Option<PathBuf>,

    /// Override base directory used for resolving paths
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Base URL that relative scenario URLs are joined to
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Directory to store request/response exchanges
    #[arg(long = "output", short = 'O')]
    output: Option<PathBuf>,

    /// Number of groups to run concurrently
    #[arg(short, long, default_value_t = 4)]
    jobs: usize,

    /// Only run groups with this name (repeatable)
    #[arg(short, long = "group", value_name = "NAME")]
    groups: Vec<String>,

    /// Machine-readable report format (json or junit)
    #[arg(long, value_name = "FORMAT")]
    report: Option<ReportFormat>,

    /// Write the machine-readable report to a file instead of stdout
    #[arg(long, value_name = "FILE", requires = "report")]
    report_out: Option<PathBuf>,

    /// Generate predictable fixture values instead of random ones
    #[arg(long)]
    sequential_values: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print groups, scenarios and their dependency edges without running
    Plan {
        /// Suite files or directories of suites
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<bool> {
    let base_dir = cli
        .cwd
        .as_ref()
        .map(|p| resolve_path(Path::new(p)))
        .transpose()?
        .unwrap_or(std::env::current_dir()?);

    if let Some(Commands::Plan { paths }) = &cli.command {
        let paths: Vec<PathBuf> = paths.iter().map(|p| resolve_relative(&base_dir, p)).collect();
        let suites = load_suites(&paths).await?;
        plan_cmd::print_plan(&suites);
        return Ok(true);
    }

    let config_target = cli
        .config
        .as_ref()
        .map(|p| resolve_relative(&base_dir, p))
        .unwrap_or_else(|| base_dir.clone());

    let cfg = load_config(&config_target).context("loading configuration")?;
    let config_dir = cfg.as_ref().map(|c| c.dir.clone()).unwrap_or_else(|| {
        if config_target.is_dir() {
            config_target.clone()
        } else {
            config_target
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| config_target.clone())
        }
    });

    let environment = EnvironmentBuilder::new(
        base_dir.clone(),
        config_dir.clone(),
        cfg,
        Overrides {
            profile: cli.profile.clone(),
            env_file: cli.env.as_ref().map(|p| resolve_relative(&config_dir, p)),
            base_url: cli.base_url.clone(),
            timeout_ms: cli.timeout_ms,
            response_output_dir: cli.output.as_ref().map(|p| resolve_relative(&base_dir, p)),
        },
    )
    .build()
    .context("building environment")?;

    let paths: Vec<PathBuf> = cli
        .paths
        .iter()
        .map(|p| resolve_relative(&base_dir, p))
        .collect();
    let suites = load_suites(&paths).await?;

    let mut runner = Runner::from_environment(&environment)?.with_options(RunOptions {
        jobs: cli.jobs,
        response_dir: environment.response_output_dir.clone(),
        group_filter: cli.groups.clone(),
    });
    if cli.sequential_values {
        let generator: Arc<dyn ValueGenerator> = Arc::new(SequentialGenerator::new());
        runner = runner.with_generator(generator);
    }

    let total = runner
        .selected_groups(&suites)
        .iter()
        .map(|(_, group)| group.scenarios.len())
        .sum::<usize>();
    let observer = Arc::new(progress::ProgressObserver::new(total as u64));
    let report = runner.with_observer(observer.clone()).run(&suites).await;
    observer.finish();

    match (cli.report, &cli.report_out) {
        (Some(format), Some(out)) => {
            let out = resolve_relative(&base_dir, out);
            write_report(&report, format, &out)?;
            print_report(&report);
            println!("Report written to {}", out.display());
        }
        (Some(format), None) => println!("{}", render_report(&report, format)?),
        (None, _) => print_report(&report),
    }

    Ok(report.success())
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}


mod progress {
    use indicatif::{ProgressBar, ProgressStyle};

    use contractpit::report::{Outcome, ScenarioResult};
    use contractpit::runner::RunObserver;
    use contractpit::scenario::Group;

    pub struct ProgressObserver {
        bar: ProgressBar,
    }

    impl ProgressObserver {
        pub fn new(total: u64) -> Self {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("  [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            Self { bar }
        }

        pub fn finish(&self) {
            self.bar.finish_and_clear();
        }
    }

    impl RunObserver for ProgressObserver {
        fn group_started(&self, _suite: &str, group: &Group) {
            self.bar.set_message(group.name.clone());
        }

        fn scenario_finished(&self, result: &ScenarioResult) {
            if result.outcome != Outcome::Pass {
                self.bar
                    .set_message(format!("{} {}", result.scenario_id, result.outcome.as_str()));
            }
            self.bar.inc(1);
        }
    }
}

mod plan_cmd {
    use colored::Colorize;

    use contractpit::runner::plan_group;
    use contractpit::scenario::Suite;

    pub fn print_plan(suites: &[Suite]) {
        for suite in suites {
            println!("{}", suite.name.bold());
            for group in &suite.groups {
                println!("  {}", group.name.cyan());
                for (scenario, plan) in group.scenarios.iter().zip(plan_group(group)) {
                    let edges = plan
                        .depends_on
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>();
                    let after = if edges.is_empty() {
                        String::new()
                    } else {
                        format!(" after {}", edges.join(", ")).dimmed().to_string()
                    };
                    println!(
                        "    {} {} {}{}",
                        scenario.id,
                        scenario.method.to_string().bold(),
                        scenario.url,
                        after
                    );
                }
            }
        }
    }
}
