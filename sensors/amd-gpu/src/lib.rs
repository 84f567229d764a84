//! AMD `gpu_metrics` v1.3 decoder.
//!
//! The record is parsed by [`MetricsReader`] into a [`GpuMetricsV1_3`],
//! interpreted by [`DecodedReport::build`] and presented by the renderers in
//! [`render`] or by [`AmdgpuSensor`] for Waybar.
//!
//! ```rust
//! use gpumetrics_rs_amd_gpu::{AsicFamily, DecodedReport, MetricsReader, METRICS_V1_3_SIZE};
//!
//! let data = [0u8; METRICS_V1_3_SIZE];
//! let metrics = MetricsReader::new().parse(&data).unwrap();
//! let report = DecodedReport::build(&metrics, AsicFamily::Aldebaran);
//! assert_eq!(report.socket_power.to_string(), "0 W");
//! assert!(!report.is_throttled());
//! ```

pub mod amdgpu;
pub mod error;
pub mod legend;
pub mod render;
pub mod report;
pub mod sensor;
pub mod sysfs;

pub use amdgpu::*;
pub use error::{CardError, MetricsError};
pub use report::DecodedReport;
pub use sensor::AmdgpuSensor;
pub use sysfs::{discover_cards, find_card, parse_card_id, read_card, CardEntry};
