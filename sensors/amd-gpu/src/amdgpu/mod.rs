//! Decoding of the amdgpu `gpu_metrics` v1.3 binary record.

pub mod field;
pub mod layout;
pub mod reader;
pub mod throttle;
pub mod types;

pub use field::{Counter, CounterUnit, LinkSpeed, Reading, Unit};
pub use layout::{FieldId, FieldKind, FieldSpec, Width, LAYOUT_V1_3, METRICS_V1_3_SIZE};
pub use reader::MetricsReader;
pub use throttle::{
    decode, AsicFamily, AsicIndependent, AsicSpecific, BitDesc, BitTable, ThrottleMask,
    ThrottleReasons, Vocabulary, INDEPENDENT_THROTTLER_BITS,
};
pub use types::{GpuMetricsV1_3, Header};
