use super::layout::{CONTENT_REVISION, FORMAT_REVISION, METRICS_V1_3_SIZE};
use serde::Serialize;

/// Header for GPU metrics structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    /// Size the driver claims for the record. Advisory only.
    pub structure_size: u16,
    pub format_revision: u8,
    pub content_revision: u8,
}

impl Header {
    pub fn version(&self) -> String {
        format!("v{}.{}", self.format_revision, self.content_revision)
    }

    /// True when the header announces the v1.3 layout this crate decodes.
    pub fn is_v1_3(&self) -> bool {
        self.format_revision == FORMAT_REVISION
            && self.content_revision == CONTENT_REVISION
            && usize::from(self.structure_size) == METRICS_V1_3_SIZE
    }
}

/// gpu_metrics v1.3 as published by SMU13 dGPUs.
///
/// Fields keep their wire width; interpretation (units, sentinels, bit
/// meanings) happens in the report builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuMetricsV1_3 {
    pub header: Header,

    pub temperature_edge: u16,
    pub temperature_hotspot: u16,
    pub temperature_mem: u16,
    pub temperature_vrgfx: u16,
    pub temperature_vrsoc: u16,
    pub temperature_vrmem: u16,

    pub average_gfx_activity: u16,
    pub average_umc_activity: u16,
    pub average_mm_activity: u16,

    pub average_socket_power: u16,
    pub energy_accumulator: u64,

    pub system_clock_counter: u64,

    pub average_gfxclk_frequency: u16,
    pub average_socclk_frequency: u16,
    pub average_uclk_frequency: u16,
    pub average_vclk0_frequency: u16,
    pub average_dclk0_frequency: u16,
    pub average_vclk1_frequency: u16,
    pub average_dclk1_frequency: u16,

    pub current_gfxclk: u16,
    pub current_socclk: u16,
    pub current_uclk: u16,
    pub current_vclk0: u16,
    pub current_dclk0: u16,
    pub current_vclk1: u16,
    pub current_dclk1: u16,

    pub throttle_status: u32,

    pub current_fan_speed: u16,

    pub pcie_link_width: u16,
    pub pcie_link_speed: u16,

    pub padding: u16,

    pub gfx_activity_acc: u32,
    pub mem_activity_acc: u32,

    pub temperature_hbm: [u16; 4],

    pub firmware_timestamp: u64,

    pub voltage_soc: u16,
    pub voltage_gfx: u16,
    pub voltage_mem: u16,

    pub padding1: u16,

    pub indep_throttle_status: u64,
}
