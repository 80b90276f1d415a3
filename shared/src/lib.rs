//! otlua Shared Library
//!
//! This crate converts OTLP metrics and log batches into a dynamic tree that
//! an embedded script can edit, and converts the edited tree back.
//!
//! # Modules
//!
//! - [`dynamic`] - The dynamic tree and typed field extraction
//! - [`codec`] - Per-record codecs between the OTLP model and the tree
//! - [`converter`] - Batch-level converters for metrics and logs
//! - [`diagnostics`] - Sinks for non-fatal conversion errors
//! - [`script`] - The script execution seam
//!
//! # Example
//!
//! ```
//! use shared::converter::MetricsConverter;
//! use shared::dynamic::DynamicValue;
//! use opentelemetry_proto::tonic::metrics::v1::{
//!     metric::Data, number_data_point, Gauge, Metric, MetricsData, NumberDataPoint,
//!     ResourceMetrics, ScopeMetrics,
//! };
//!
//! let batch = MetricsData {
//!     resource_metrics: vec![ResourceMetrics {
//!         scope_metrics: vec![ScopeMetrics {
//!             metrics: vec![Metric {
//!                 name: "cpu".to_string(),
//!                 data: Some(Data::Gauge(Gauge {
//!                     data_points: vec![NumberDataPoint {
//!                         value: Some(number_data_point::Value::AsDouble(0.5)),
//!                         ..Default::default()
//!                     }],
//!                 })),
//!                 ..Default::default()
//!             }],
//!             ..Default::default()
//!         }],
//!         ..Default::default()
//!     }],
//! };
//!
//! let converter = MetricsConverter::default();
//! let DynamicValue::Map(tree) = converter.encode(&batch) else {
//!     unreachable!()
//! };
//! assert_eq!(tree.get("dataPointCount"), Some(&DynamicValue::Int(1)));
//! assert_eq!(converter.decode(&tree), batch);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod converter;
pub mod diagnostics;
pub mod dynamic;
pub mod script;

pub use codec::ConversionError;
pub use converter::{LogsConverter, MetricsConverter};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink, NullSink, TracingSink};
pub use dynamic::{DynamicMap, DynamicValue};
pub use script::{ProcessingFailure, ScriptError, ScriptExecutor};

/// Re-export of the OTLP model the converters work on.
pub use opentelemetry_proto;
