//! otlua CLI
//!
//! Runs a Lua script over OTLP metrics or log files.
//!
//! # Usage
//!
//! ```bash
//! otlua --help
//! otlua metrics --input batch.pb --output out.pb --script filter.lua
//! otlua logs --input logs.json --script redact.lua --function scrub
//! otlua encode metrics --input batch.json
//! ```

#![deny(unsafe_code)]

mod files;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use files::Format;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::logs::v1::LogsData;
use opentelemetry_proto::tonic::metrics::v1::MetricsData;
use processor::config::DEFAULT_FUNCTION;
use processor::{Config, LuaProcessor};
use shared::{LogsConverter, MetricsConverter, ProcessingFailure};
use std::path::{Path, PathBuf};

/// otlua - Lua scripting for OpenTelemetry metrics and logs
#[derive(Parser)]
#[command(name = "otlua")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the script over a metrics export request
    Metrics(RunArgs),
    /// Run the script over a logs export request
    Logs(RunArgs),
    /// Print the table a script would receive, as JSON
    Encode {
        /// Signal stored in the input file
        #[arg(value_enum)]
        signal: Signal,

        /// Input file (`.json` for OTLP/JSON, protobuf otherwise)
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input file (`.json` for OTLP/JSON, protobuf otherwise)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file, stdout if omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Lua script to run
    #[arg(short, long, env = "OTLUA_SCRIPT")]
    script: String,

    /// Lua function to call
    #[arg(short, long, env = "OTLUA_FUNCTION", default_value = DEFAULT_FUNCTION)]
    function: String,

    /// Write OTLP/JSON regardless of the input format
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn processor(&self) -> Result<LuaProcessor> {
        let base = if std::env::var_os("OTLUA_SCRIPT").is_some() {
            Config::from_env().context("invalid OTLUA_* configuration")?
        } else {
            Config::new(self.script.clone())
        };
        LuaProcessor::from_config(self.overlay(base))
            .context("failed to set up the Lua processor")
    }

    /// Flags win over the environment; per-signal entrypoints only come from it.
    fn overlay(&self, base: Config) -> Config {
        Config {
            script: self.script.clone(),
            function: self.function.clone(),
            ..base
        }
    }

    fn output_format(&self, input: Format) -> Format {
        if self.json {
            Format::Json
        } else {
            input
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Signal {
    Metrics,
    Logs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Metrics(args) => run_metrics(&args),
        Commands::Logs(args) => run_logs(&args),
        Commands::Encode { signal, input } => encode(signal, &input),
    }
}

fn run_metrics(args: &RunArgs) -> Result<()> {
    let processor = args.processor()?;
    let (request, format): (ExportMetricsServiceRequest, _) = files::read(&args.input)?;
    let batch = MetricsData {
        resource_metrics: request.resource_metrics,
    };

    let (batch, outcome) = settle(processor.process_metrics(batch));
    let request = ExportMetricsServiceRequest {
        resource_metrics: batch.resource_metrics,
    };
    files::write(args.output.as_deref(), &request, args.output_format(format))?;
    outcome
}

fn run_logs(args: &RunArgs) -> Result<()> {
    let processor = args.processor()?;
    let (request, format): (ExportLogsServiceRequest, _) = files::read(&args.input)?;
    let batch = LogsData {
        resource_logs: request.resource_logs,
    };

    let (batch, outcome) = settle(processor.process_logs(batch));
    let request = ExportLogsServiceRequest {
        resource_logs: batch.resource_logs,
    };
    files::write(args.output.as_deref(), &request, args.output_format(format))?;
    outcome
}

/// Splits a processing result into the batch to write and the exit outcome.
///
/// On failure the untouched batch is still written and the command exits
/// with an error afterwards.
fn settle<B: std::fmt::Debug>(result: Result<B, ProcessingFailure<B>>) -> (B, Result<()>) {
    match result {
        Ok(batch) => (batch, Ok(())),
        Err(failure) => {
            let (batch, error) = failure.into_parts();
            let outcome =
                Err(anyhow::Error::new(error).context("script failed, wrote the input unchanged"));
            (batch, outcome)
        }
    }
}

fn encode(signal: Signal, input: &Path) -> Result<()> {
    let tree = match signal {
        Signal::Metrics => {
            let (request, _): (ExportMetricsServiceRequest, _) = files::read(input)?;
            MetricsConverter::default().encode(&MetricsData {
                resource_metrics: request.resource_metrics,
            })
        }
        Signal::Logs => {
            let (request, _): (ExportLogsServiceRequest, _) = files::read(input)?;
            LogsConverter::default().encode(&LogsData {
                resource_logs: request.resource_logs,
            })
        }
    };

    let json = serde_json::to_string_pretty(&tree).context("failed to render the table")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use processor::SignalKind;
    use shared::ScriptError;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["otlua"]).is_err());
    }

    #[test]
    fn test_cli_metrics_command() {
        let cli = Cli::try_parse_from([
            "otlua",
            "metrics",
            "--input",
            "batch.pb",
            "--script",
            "filter.lua",
        ])
        .unwrap();
        let Commands::Metrics(args) = cli.command else {
            panic!("expected the metrics command");
        };
        assert_eq!(args.input, PathBuf::from("batch.pb"));
        assert_eq!(args.output, None);
        assert_eq!(args.script, "filter.lua");
        assert!(!args.json);
    }

    #[test]
    fn test_cli_logs_command_with_options() {
        let cli = Cli::try_parse_from([
            "otlua",
            "logs",
            "-i",
            "logs.json",
            "-o",
            "out.pb",
            "-s",
            "redact.lua",
            "-f",
            "scrub",
            "--json",
        ])
        .unwrap();
        let Commands::Logs(args) = cli.command else {
            panic!("expected the logs command");
        };
        assert_eq!(args.output, Some(PathBuf::from("out.pb")));
        assert_eq!(args.function, "scrub");
        assert!(args.json);
        assert_eq!(args.output_format(Format::Protobuf), Format::Json);
    }

    #[test]
    fn test_output_format_follows_input() {
        let cli = Cli::try_parse_from([
            "otlua", "metrics", "-i", "in.json", "-s", "x.lua",
        ])
        .unwrap();
        let Commands::Metrics(args) = cli.command else {
            panic!("expected the metrics command");
        };
        assert_eq!(args.output_format(Format::Json), Format::Json);
        assert_eq!(args.output_format(Format::Protobuf), Format::Protobuf);
    }

    #[test]
    fn test_cli_encode_command() {
        let cli = Cli::try_parse_from(["otlua", "encode", "logs", "--input", "logs.pb"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Encode {
                signal: Signal::Logs,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["otlua", "encode", "traces", "--input", "t.pb"]).is_err());
    }

    #[test]
    fn test_flags_overlay_environment_config() {
        let env = Config::from_lookup(|name| match name {
            "OTLUA_SCRIPT" => Some("env.lua".to_string()),
            "OTLUA_METRICS_FUNCTION" => Some("on_metrics".to_string()),
            _ => None,
        })
        .unwrap();
        let cli = Cli::try_parse_from([
            "otlua", "metrics", "-i", "in.pb", "-s", "cli.lua", "-f", "run",
        ])
        .unwrap();
        let Commands::Metrics(args) = cli.command else {
            panic!("expected the metrics command");
        };

        let config = args.overlay(env);
        assert_eq!(config.script, "cli.lua");
        assert_eq!(config.entrypoint(SignalKind::Metrics), "on_metrics");
        assert_eq!(config.entrypoint(SignalKind::Logs), "run");
    }

    #[test]
    fn test_settle_keeps_batch_on_failure() {
        let failure = ProcessingFailure {
            batch: MetricsData::default(),
            source: ScriptError::EntrypointNotFound("process".to_string()),
        };
        let (batch, outcome) = settle(Err(failure));
        assert_eq!(batch, MetricsData::default());
        assert!(outcome.is_err());

        let (_, outcome) = settle::<MetricsData>(Ok(MetricsData::default()));
        assert!(outcome.is_ok());
    }
}
