//! Byte layout of the gpu_metrics v1.3 record.
//!
//! Every field is listed once, in wire order, with its offset, width and
//! how its value is interpreted. The parser reads through this table and the
//! tests check that the offsets tile the record without gaps.

use super::field::{CounterUnit, Unit};

/// Size in bytes of a v1.3 record.
pub const METRICS_V1_3_SIZE: usize = 120;

/// Format revision this layout describes.
pub const FORMAT_REVISION: u8 = 1;

/// Content revision this layout describes.
pub const CONTENT_REVISION: u8 = 3;

/// Width of a field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U8,
    U16,
    U32,
    U64,
}

impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

/// How the raw value of a field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Structure size and revision bytes
    Header,
    /// Scalar where all-ones means "not reported"
    Sensor(Unit),
    /// Monotonic counter, only meaningful as a difference
    Counter(CounterUnit),
    /// Link speed in tenths of GT/s, never sentinel-checked
    LinkSpeed,
    /// Throttle bitmask
    Bitmask,
    /// Alignment padding
    Reserved,
}

/// One entry of the record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: FieldId,
    pub name: &'static str,
    pub offset: usize,
    pub width: Width,
    pub kind: FieldKind,
}

impl FieldSpec {
    /// Byte range of this field within the record.
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.width.bytes()
    }
}

/// Identifier of every field in the v1.3 record, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    StructureSize,
    FormatRevision,
    ContentRevision,
    TemperatureEdge,
    TemperatureHotspot,
    TemperatureMem,
    TemperatureVrGfx,
    TemperatureVrSoc,
    TemperatureVrMem,
    AverageGfxActivity,
    AverageUmcActivity,
    AverageMmActivity,
    AverageSocketPower,
    EnergyAccumulator,
    SystemClockCounter,
    AverageGfxclkFrequency,
    AverageSocclkFrequency,
    AverageUclkFrequency,
    AverageVclk0Frequency,
    AverageDclk0Frequency,
    AverageVclk1Frequency,
    AverageDclk1Frequency,
    CurrentGfxclk,
    CurrentSocclk,
    CurrentUclk,
    CurrentVclk0,
    CurrentDclk0,
    CurrentVclk1,
    CurrentDclk1,
    ThrottleStatus,
    CurrentFanSpeed,
    PcieLinkWidth,
    PcieLinkSpeed,
    Padding,
    GfxActivityAcc,
    MemActivityAcc,
    TemperatureHbm0,
    TemperatureHbm1,
    TemperatureHbm2,
    TemperatureHbm3,
    FirmwareTimestamp,
    VoltageSoc,
    VoltageGfx,
    VoltageMem,
    Padding1,
    IndepThrottleStatus,
}

impl FieldId {
    /// Layout entry for this field.
    pub fn spec(self) -> &'static FieldSpec {
        &LAYOUT_V1_3[self as usize]
    }
}

const fn field(
    id: FieldId,
    name: &'static str,
    offset: usize,
    width: Width,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        id,
        name,
        offset,
        width,
        kind,
    }
}

use FieldId as F;
use FieldKind::{Bitmask, Counter, Header, LinkSpeed, Reserved, Sensor};
use Width::{U16, U32, U64, U8};

/// The v1.3 layout, indexed by [`FieldId`].
pub static LAYOUT_V1_3: [FieldSpec; 46] = [
    field(F::StructureSize, "structure_size", 0, U16, Header),
    field(F::FormatRevision, "format_revision", 2, U8, Header),
    field(F::ContentRevision, "content_revision", 3, U8, Header),
    field(F::TemperatureEdge, "temperature_edge", 4, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureHotspot, "temperature_hotspot", 6, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureMem, "temperature_mem", 8, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureVrGfx, "temperature_vrgfx", 10, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureVrSoc, "temperature_vrsoc", 12, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureVrMem, "temperature_vrmem", 14, U16, Sensor(Unit::Celsius)),
    field(F::AverageGfxActivity, "average_gfx_activity", 16, U16, Sensor(Unit::Percent)),
    field(F::AverageUmcActivity, "average_umc_activity", 18, U16, Sensor(Unit::Percent)),
    field(F::AverageMmActivity, "average_mm_activity", 20, U16, Sensor(Unit::Percent)),
    field(F::AverageSocketPower, "average_socket_power", 22, U16, Sensor(Unit::Watts)),
    field(F::EnergyAccumulator, "energy_accumulator", 24, U64, Counter(CounterUnit::Raw)),
    field(F::SystemClockCounter, "system_clock_counter", 32, U64, Counter(CounterUnit::Nanoseconds)),
    field(F::AverageGfxclkFrequency, "average_gfxclk_frequency", 40, U16, Sensor(Unit::Megahertz)),
    field(F::AverageSocclkFrequency, "average_socclk_frequency", 42, U16, Sensor(Unit::Megahertz)),
    field(F::AverageUclkFrequency, "average_uclk_frequency", 44, U16, Sensor(Unit::Megahertz)),
    field(F::AverageVclk0Frequency, "average_vclk0_frequency", 46, U16, Sensor(Unit::Megahertz)),
    field(F::AverageDclk0Frequency, "average_dclk0_frequency", 48, U16, Sensor(Unit::Megahertz)),
    field(F::AverageVclk1Frequency, "average_vclk1_frequency", 50, U16, Sensor(Unit::Megahertz)),
    field(F::AverageDclk1Frequency, "average_dclk1_frequency", 52, U16, Sensor(Unit::Megahertz)),
    field(F::CurrentGfxclk, "current_gfxclk", 54, U16, Sensor(Unit::Megahertz)),
    field(F::CurrentSocclk, "current_socclk", 56, U16, Sensor(Unit::Megahertz)),
    field(F::CurrentUclk, "current_uclk", 58, U16, Sensor(Unit::Megahertz)),
    field(F::CurrentVclk0, "current_vclk0", 60, U16, Sensor(Unit::Megahertz)),
    field(F::CurrentDclk0, "current_dclk0", 62, U16, Sensor(Unit::Megahertz)),
    field(F::CurrentVclk1, "current_vclk1", 64, U16, Sensor(Unit::Megahertz)),
    field(F::CurrentDclk1, "current_dclk1", 66, U16, Sensor(Unit::Megahertz)),
    field(F::ThrottleStatus, "throttle_status", 68, U32, Bitmask),
    field(F::CurrentFanSpeed, "current_fan_speed", 72, U16, Sensor(Unit::Rpm)),
    field(F::PcieLinkWidth, "pcie_link_width", 74, U16, Sensor(Unit::Count)),
    field(F::PcieLinkSpeed, "pcie_link_speed", 76, U16, LinkSpeed),
    field(F::Padding, "padding", 78, U16, Reserved),
    field(F::GfxActivityAcc, "gfx_activity_acc", 80, U32, Counter(CounterUnit::Raw)),
    field(F::MemActivityAcc, "mem_activity_acc", 84, U32, Counter(CounterUnit::Raw)),
    field(F::TemperatureHbm0, "temperature_hbm[0]", 88, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureHbm1, "temperature_hbm[1]", 90, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureHbm2, "temperature_hbm[2]", 92, U16, Sensor(Unit::Celsius)),
    field(F::TemperatureHbm3, "temperature_hbm[3]", 94, U16, Sensor(Unit::Celsius)),
    field(F::FirmwareTimestamp, "firmware_timestamp", 96, U64, Counter(CounterUnit::TenNanoseconds)),
    field(F::VoltageSoc, "voltage_soc", 104, U16, Sensor(Unit::Millivolts)),
    field(F::VoltageGfx, "voltage_gfx", 106, U16, Sensor(Unit::Millivolts)),
    field(F::VoltageMem, "voltage_mem", 108, U16, Sensor(Unit::Millivolts)),
    field(F::Padding1, "padding1", 110, U16, Reserved),
    field(F::IndepThrottleStatus, "indep_throttle_status", 112, U64, Bitmask),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_indexed_by_id() {
        for (index, spec) in LAYOUT_V1_3.iter().enumerate() {
            assert_eq!(spec.id as usize, index, "{} out of place", spec.name);
            assert_eq!(spec.id.spec(), spec);
        }
    }

    #[test]
    fn test_layout_is_contiguous() {
        let mut expected_offset = 0;
        for spec in &LAYOUT_V1_3 {
            assert_eq!(spec.offset, expected_offset, "gap before {}", spec.name);
            assert_eq!(
                spec.offset % spec.width.bytes(),
                0,
                "{} is misaligned",
                spec.name
            );
            expected_offset = spec.range().end;
        }
        assert_eq!(expected_offset, METRICS_V1_3_SIZE);
    }

    #[test]
    fn test_link_speed_is_not_sentinel_checked() {
        assert_eq!(FieldId::PcieLinkSpeed.spec().kind, FieldKind::LinkSpeed);
        assert_eq!(
            FieldId::PcieLinkWidth.spec().kind,
            FieldKind::Sensor(Unit::Count)
        );
    }
}
