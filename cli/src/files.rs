//! Reading and writing OTLP export requests.
//!
//! Files ending in `.json` hold OTLP/JSON; everything else is protobuf.

use anyhow::{Context, Result};
use prost::Message;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// On-disk encoding of an export request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Protobuf,
}

impl Format {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Protobuf,
        }
    }
}

/// Reads a request from `path`, returning it with the format it was read in.
pub fn read<M>(path: &Path) -> Result<(M, Format)>
where
    M: Message + Default + DeserializeOwned,
{
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let format = Format::from_path(path);
    tracing::debug!(path = %path.display(), bytes = bytes.len(), ?format, "Read input");
    let message = match format {
        Format::Json => serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not valid OTLP/JSON", path.display()))?,
        Format::Protobuf => M::decode(bytes.as_slice())
            .with_context(|| format!("{} is not a valid OTLP protobuf message", path.display()))?,
    };
    Ok((message, format))
}

/// Writes `message` to `output`, or to stdout when no path is given.
pub fn write<M>(output: Option<&Path>, message: &M, format: Format) -> Result<()>
where
    M: Message + Serialize,
{
    let bytes = match format {
        Format::Json => serde_json::to_vec_pretty(message).context("failed to encode OTLP/JSON")?,
        Format::Protobuf => message.encode_to_vec(),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = bytes.len(), ?format, "Wrote output");
            Ok(())
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).context("failed to write to stdout")?;
            stdout.flush().context("failed to write to stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
    use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
    use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
    use opentelemetry_proto::tonic::metrics::v1::{Metric, ResourceMetrics, ScopeMetrics};

    fn metrics_request() -> ExportMetricsServiceRequest {
        ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                scope_metrics: vec![ScopeMetrics {
                    metrics: vec![Metric {
                        name: "http.requests".to_string(),
                        unit: "1".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("batch.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("BATCH.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("batch.pb")), Format::Protobuf);
        assert_eq!(Format::from_path(Path::new("batch")), Format::Protobuf);
    }

    #[test]
    fn test_protobuf_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.pb");
        let request = metrics_request();

        write(Some(&path), &request, Format::Protobuf).unwrap();
        let (read_back, format): (ExportMetricsServiceRequest, _) = read(&path).unwrap();

        assert_eq!(format, Format::Protobuf);
        assert_eq!(read_back, request);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.json");
        let request = ExportLogsServiceRequest {
            resource_logs: vec![ResourceLogs {
                scope_logs: vec![ScopeLogs {
                    log_records: vec![LogRecord {
                        severity_text: "WARN".to_string(),
                        severity_number: 13,
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };

        write(Some(&path), &request, Format::Json).unwrap();
        let (read_back, format): (ExportLogsServiceRequest, _) = read(&path).unwrap();

        assert_eq!(format, Format::Json);
        assert_eq!(read_back, request);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: Result<(ExportMetricsServiceRequest, Format)> = read(&path);
        let error = result.unwrap_err();
        assert!(error.to_string().contains("not valid OTLP/JSON"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result: Result<(ExportMetricsServiceRequest, Format)> =
            read(Path::new("/nonexistent/otlua/metrics.pb"));
        assert!(result.is_err());
    }
}
