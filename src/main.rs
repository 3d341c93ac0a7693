use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};
use refbook::build::{build_book, check_book, Report};
use refbook::config::Config;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Render the book into the output directory
    Build {
        /// The project directory, or any directory beneath it
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Where to write the book (default: `<project>/_site`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with an error status if any error-level diagnostic is reported
        #[arg(long)]
        strict: bool,
    },

    /// Report content problems without rendering anything
    Check {
        /// The project directory, or any directory beneath it
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Exit with an error status if any error-level diagnostic is reported
        #[arg(long)]
        strict: bool,
    },
}

impl Cli {
    fn run(self) -> anyhow::Result<ExitCode> {
        Self::setup_logging(self.verbose);

        let (report, strict) = match self.command {
            Command::Build {
                project,
                output,
                strict,
            } => {
                let config = Config::from_directory(&project)?;
                let output = output
                    .unwrap_or_else(|| config.project_root.join("_site"));
                let report =
                    build_book(&config, &output).with_context(|| {
                        format!("building `{}`", output.display())
                    })?;
                (report, strict)
            }
            Command::Check { project, strict } => {
                let config = Config::from_directory(&project)?;
                (check_book(&config)?, strict)
            }
        };

        print_report(&report)?;
        Ok(if strict && report.diagnostics.has_errors() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn print_report(report: &Report) -> anyhow::Result<()> {
    let stderr = std::io::stderr();
    report
        .diagnostics
        .write_report(stderr.lock())
        .context("writing diagnostics report")?;
    tracing::info!(
        documents = report.documents,
        pages = report.pages,
        "done"
    );
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    Cli::parse().run()
}
