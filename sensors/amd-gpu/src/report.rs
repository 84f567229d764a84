//! Turns a raw v1.3 record into a presentation-ready report.
//!
//! Scalars and counters take their unit from the layout entry of the field
//! they came from, and both throttle masks go through [`decode`] with their
//! own vocabulary. Building never fails: an unreported field is
//! represented, not rejected.

use crate::amdgpu::field::{Counter, LinkSpeed, Reading};
use crate::amdgpu::layout::FieldId;
use crate::amdgpu::throttle::{
    decode, AsicFamily, AsicIndependent, AsicSpecific, BitTable, HexMask, ThrottleMask,
    ThrottleReasons, Vocabulary, INDEPENDENT_THROTTLER_BITS,
};
use crate::amdgpu::types::{GpuMetricsV1_3, Header};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Temperatures {
    pub edge: Reading,
    pub hotspot: Reading,
    pub mem: Reading,
    pub vr_gfx: Reading,
    pub vr_soc: Reading,
    pub vr_mem: Reading,
    pub hbm: [Reading; 4],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub gfx: Reading,
    pub umc: Reading,
    pub mm: Reading,
}

/// One set of clock domains, either averaged or instantaneous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockSet {
    pub gfx: Reading,
    pub soc: Reading,
    pub uclk: Reading,
    pub vclk0: Reading,
    pub dclk0: Reading,
    pub vclk1: Reading,
    pub dclk1: Reading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clocks {
    pub average: ClockSet,
    pub current: ClockSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voltages {
    pub soc: Reading,
    pub gfx: Reading,
    pub mem: Reading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PcieLink {
    pub width: Reading,
    pub speed: LinkSpeed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub energy_accumulator: Counter,
    pub system_clock_counter: Counter,
    pub gfx_activity_acc: Counter,
    pub mem_activity_acc: Counter,
    pub firmware_timestamp: Counter,
}

/// A throttle mask together with what it decoded to.
pub struct ThrottleField<V: Vocabulary> {
    pub raw: V::Raw,
    pub reasons: ThrottleReasons,
}

impl<V: Vocabulary> ThrottleField<V> {
    pub fn decode(raw: V::Raw, table: &BitTable<V>) -> Self {
        Self {
            raw,
            reasons: decode(ThrottleMask::<V>::new(raw), table),
        }
    }

    pub fn name(&self) -> &'static str {
        V::NAME
    }

    /// Raw value as fixed-width hex.
    pub fn hex(&self) -> HexMask<V> {
        HexMask(self.raw)
    }
}

impl<V: Vocabulary> Clone for ThrottleField<V> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw,
            reasons: self.reasons.clone(),
        }
    }
}

impl<V: Vocabulary> PartialEq for ThrottleField<V> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.reasons == other.reasons
    }
}

impl<V: Vocabulary> Eq for ThrottleField<V> {}

impl<V: Vocabulary> fmt::Debug for ThrottleField<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(V::NAME)
            .field("raw", &format_args!("{}", self.hex()))
            .field("reasons", &self.reasons)
            .finish()
    }
}

impl<V: Vocabulary> Serialize for ThrottleField<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ThrottleField", 3)?;
        state.serialize_field("raw", &self.raw)?;
        state.serialize_field("hex", &self.hex().to_string())?;
        state.serialize_field("decoded", &self.reasons)?;
        state.end()
    }
}

/// Fully interpreted snapshot of one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedReport {
    pub header: Header,
    /// Family whose table decoded `throttle_status`
    pub asic: AsicFamily,
    pub temperatures: Temperatures,
    pub activity: Activity,
    pub socket_power: Reading,
    pub clocks: Clocks,
    pub fan_speed: Reading,
    pub pcie: PcieLink,
    pub voltages: Voltages,
    pub counters: Counters,
    pub throttle_status: ThrottleField<AsicSpecific>,
    pub indep_throttle_status: ThrottleField<AsicIndependent>,
}

const HBM_FIELDS: [FieldId; 4] = [
    FieldId::TemperatureHbm0,
    FieldId::TemperatureHbm1,
    FieldId::TemperatureHbm2,
    FieldId::TemperatureHbm3,
];

impl DecodedReport {
    pub fn build(m: &GpuMetricsV1_3, asic: AsicFamily) -> Self {
        use FieldId as F;

        let r = Reading::for_field;
        let c = Counter::for_field;

        Self {
            header: m.header,
            asic,
            temperatures: Temperatures {
                edge: r(F::TemperatureEdge, m.temperature_edge),
                hotspot: r(F::TemperatureHotspot, m.temperature_hotspot),
                mem: r(F::TemperatureMem, m.temperature_mem),
                vr_gfx: r(F::TemperatureVrGfx, m.temperature_vrgfx),
                vr_soc: r(F::TemperatureVrSoc, m.temperature_vrsoc),
                vr_mem: r(F::TemperatureVrMem, m.temperature_vrmem),
                hbm: std::array::from_fn(|i| r(HBM_FIELDS[i], m.temperature_hbm[i])),
            },
            activity: Activity {
                gfx: r(F::AverageGfxActivity, m.average_gfx_activity),
                umc: r(F::AverageUmcActivity, m.average_umc_activity),
                mm: r(F::AverageMmActivity, m.average_mm_activity),
            },
            socket_power: r(F::AverageSocketPower, m.average_socket_power),
            clocks: Clocks {
                average: ClockSet {
                    gfx: r(F::AverageGfxclkFrequency, m.average_gfxclk_frequency),
                    soc: r(F::AverageSocclkFrequency, m.average_socclk_frequency),
                    uclk: r(F::AverageUclkFrequency, m.average_uclk_frequency),
                    vclk0: r(F::AverageVclk0Frequency, m.average_vclk0_frequency),
                    dclk0: r(F::AverageDclk0Frequency, m.average_dclk0_frequency),
                    vclk1: r(F::AverageVclk1Frequency, m.average_vclk1_frequency),
                    dclk1: r(F::AverageDclk1Frequency, m.average_dclk1_frequency),
                },
                current: ClockSet {
                    gfx: r(F::CurrentGfxclk, m.current_gfxclk),
                    soc: r(F::CurrentSocclk, m.current_socclk),
                    uclk: r(F::CurrentUclk, m.current_uclk),
                    vclk0: r(F::CurrentVclk0, m.current_vclk0),
                    dclk0: r(F::CurrentDclk0, m.current_dclk0),
                    vclk1: r(F::CurrentVclk1, m.current_vclk1),
                    dclk1: r(F::CurrentDclk1, m.current_dclk1),
                },
            },
            fan_speed: r(F::CurrentFanSpeed, m.current_fan_speed),
            pcie: PcieLink {
                width: r(F::PcieLinkWidth, m.pcie_link_width),
                speed: LinkSpeed::from_raw(m.pcie_link_speed),
            },
            voltages: Voltages {
                soc: r(F::VoltageSoc, m.voltage_soc),
                gfx: r(F::VoltageGfx, m.voltage_gfx),
                mem: r(F::VoltageMem, m.voltage_mem),
            },
            counters: Counters {
                energy_accumulator: c(F::EnergyAccumulator, m.energy_accumulator),
                system_clock_counter: c(F::SystemClockCounter, m.system_clock_counter),
                gfx_activity_acc: c(F::GfxActivityAcc, m.gfx_activity_acc.into()),
                mem_activity_acc: c(F::MemActivityAcc, m.mem_activity_acc.into()),
                firmware_timestamp: c(F::FirmwareTimestamp, m.firmware_timestamp),
            },
            throttle_status: ThrottleField::decode(m.throttle_status, asic.throttle_table()),
            indep_throttle_status: ThrottleField::decode(
                m.indep_throttle_status,
                &INDEPENDENT_THROTTLER_BITS,
            ),
        }
    }

    /// True when either mask names an active limiter.
    pub fn is_throttled(&self) -> bool {
        self.throttle_status.reasons.is_active() || self.indep_throttle_status.reasons.is_active()
    }
}
