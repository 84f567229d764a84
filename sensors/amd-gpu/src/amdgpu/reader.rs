use super::layout::{FieldId, Width, METRICS_V1_3_SIZE};
use super::types::*;
use crate::error::{CardError, MetricsError};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Reads fields out of a buffer already checked to hold a full record.
struct FieldReader<'a> {
    data: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Result<Self, MetricsError> {
        if data.len() < METRICS_V1_3_SIZE {
            return Err(MetricsError::ShortRead {
                expected: METRICS_V1_3_SIZE,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: &data[..METRICS_V1_3_SIZE],
        })
    }

    fn bytes<const N: usize>(&self, id: FieldId, width: Width) -> [u8; N] {
        let spec = id.spec();
        debug_assert_eq!(spec.width, width, "{} read at the wrong width", spec.name);
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[spec.range()]);
        out
    }

    fn u8(&self, id: FieldId) -> u8 {
        let [byte] = self.bytes::<1>(id, Width::U8);
        byte
    }

    fn u16(&self, id: FieldId) -> u16 {
        u16::from_le_bytes(self.bytes(id, Width::U16))
    }

    fn u32(&self, id: FieldId) -> u32 {
        u32::from_le_bytes(self.bytes(id, Width::U32))
    }

    fn u64(&self, id: FieldId) -> u64 {
        u64::from_le_bytes(self.bytes(id, Width::U64))
    }
}

#[derive(Debug, Default)]
pub struct MetricsReader;

impl MetricsReader {
    pub fn new() -> Self {
        Self
    }

    /// Decode a v1.3 record from the start of `data`.
    ///
    /// Fails only when `data` is shorter than [`METRICS_V1_3_SIZE`]; bytes
    /// past the record are ignored and no field value is rejected.
    pub fn parse(&self, data: &[u8]) -> Result<GpuMetricsV1_3, MetricsError> {
        use FieldId as F;

        let r = FieldReader::new(data)?;

        let header = Header {
            structure_size: r.u16(F::StructureSize),
            format_revision: r.u8(F::FormatRevision),
            content_revision: r.u8(F::ContentRevision),
        };
        if !header.is_v1_3() {
            log::debug!(
                "header announces {} ({} bytes), decoding as v1.3",
                header.version(),
                header.structure_size
            );
        }

        Ok(GpuMetricsV1_3 {
            header,
            temperature_edge: r.u16(F::TemperatureEdge),
            temperature_hotspot: r.u16(F::TemperatureHotspot),
            temperature_mem: r.u16(F::TemperatureMem),
            temperature_vrgfx: r.u16(F::TemperatureVrGfx),
            temperature_vrsoc: r.u16(F::TemperatureVrSoc),
            temperature_vrmem: r.u16(F::TemperatureVrMem),
            average_gfx_activity: r.u16(F::AverageGfxActivity),
            average_umc_activity: r.u16(F::AverageUmcActivity),
            average_mm_activity: r.u16(F::AverageMmActivity),
            average_socket_power: r.u16(F::AverageSocketPower),
            energy_accumulator: r.u64(F::EnergyAccumulator),
            system_clock_counter: r.u64(F::SystemClockCounter),
            average_gfxclk_frequency: r.u16(F::AverageGfxclkFrequency),
            average_socclk_frequency: r.u16(F::AverageSocclkFrequency),
            average_uclk_frequency: r.u16(F::AverageUclkFrequency),
            average_vclk0_frequency: r.u16(F::AverageVclk0Frequency),
            average_dclk0_frequency: r.u16(F::AverageDclk0Frequency),
            average_vclk1_frequency: r.u16(F::AverageVclk1Frequency),
            average_dclk1_frequency: r.u16(F::AverageDclk1Frequency),
            current_gfxclk: r.u16(F::CurrentGfxclk),
            current_socclk: r.u16(F::CurrentSocclk),
            current_uclk: r.u16(F::CurrentUclk),
            current_vclk0: r.u16(F::CurrentVclk0),
            current_dclk0: r.u16(F::CurrentDclk0),
            current_vclk1: r.u16(F::CurrentVclk1),
            current_dclk1: r.u16(F::CurrentDclk1),
            throttle_status: r.u32(F::ThrottleStatus),
            current_fan_speed: r.u16(F::CurrentFanSpeed),
            pcie_link_width: r.u16(F::PcieLinkWidth),
            pcie_link_speed: r.u16(F::PcieLinkSpeed),
            padding: r.u16(F::Padding),
            gfx_activity_acc: r.u32(F::GfxActivityAcc),
            mem_activity_acc: r.u32(F::MemActivityAcc),
            temperature_hbm: [
                r.u16(F::TemperatureHbm0),
                r.u16(F::TemperatureHbm1),
                r.u16(F::TemperatureHbm2),
                r.u16(F::TemperatureHbm3),
            ],
            firmware_timestamp: r.u64(F::FirmwareTimestamp),
            voltage_soc: r.u16(F::VoltageSoc),
            voltage_gfx: r.u16(F::VoltageGfx),
            voltage_mem: r.u16(F::VoltageMem),
            padding1: r.u16(F::Padding1),
            indep_throttle_status: r.u64(F::IndepThrottleStatus),
        })
    }

    /// Read at most one record's worth of bytes from `path` and decode it.
    pub fn read_file<P: AsRef<Path>>(
        &self,
        path: P,
        card: u32,
    ) -> Result<GpuMetricsV1_3, CardError> {
        let path = path.as_ref();
        let io_err = |source| CardError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = fs::File::open(path).map_err(io_err)?;
        let mut data = Vec::with_capacity(METRICS_V1_3_SIZE);
        file.take(METRICS_V1_3_SIZE as u64)
            .read_to_end(&mut data)
            .map_err(io_err)?;

        self.parse(&data)
            .map_err(|source| CardError::Metrics { card, source })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::amdgpu::layout::{FieldKind, LAYOUT_V1_3};

    /// Build a record by writing `value(id)` into every field, little-endian
    /// and truncated to the field's width.
    pub(crate) fn build_record(value: impl Fn(FieldId) -> u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(METRICS_V1_3_SIZE);
        for spec in LAYOUT_V1_3.iter() {
            let bytes = value(spec.id).to_le_bytes();
            data.extend_from_slice(&bytes[..spec.width.bytes()]);
        }
        data
    }

    /// A plausible MI250X snapshot.
    pub(crate) fn sample_record() -> Vec<u8> {
        use FieldId as F;
        build_record(|id| match id {
            F::StructureSize => 120,
            F::FormatRevision => 1,
            F::ContentRevision => 3,
            F::TemperatureEdge => 45,
            F::TemperatureHotspot => 62,
            F::TemperatureMem => 55,
            F::AverageGfxActivity => 87,
            F::AverageSocketPower => 310,
            F::AverageGfxclkFrequency => 1700,
            F::CurrentGfxclk => 1650,
            F::CurrentFanSpeed => 0xFFFF,
            F::PcieLinkWidth => 16,
            F::PcieLinkSpeed => 160,
            F::TemperatureHbm0 | F::TemperatureHbm1 => 50,
            F::TemperatureHbm2 | F::TemperatureHbm3 => 0xFFFF,
            F::VoltageGfx => 850,
            F::ThrottleStatus => 0b1,
            F::IndepThrottleStatus => 0b1,
            F::Padding | F::Padding1 => 0,
            _ => 7,
        })
    }

    fn parse(data: &[u8]) -> Result<GpuMetricsV1_3, MetricsError> {
        MetricsReader::new().parse(data)
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let data = sample_record();
        let err = parse(&data[..METRICS_V1_3_SIZE - 1]).unwrap_err();
        assert_eq!(
            err,
            MetricsError::ShortRead {
                expected: 120,
                actual: 119,
            }
        );

        assert_eq!(
            parse(&[]).unwrap_err(),
            MetricsError::ShortRead {
                expected: 120,
                actual: 0,
            }
        );
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut data = sample_record();
        let expected = parse(&data).unwrap();
        data.extend_from_slice(&[0xAB; 32]);
        assert_eq!(parse(&data).unwrap(), expected);
    }

    #[test]
    fn test_fields_land_at_layout_offsets() {
        let m = parse(&sample_record()).unwrap();
        assert_eq!(m.header.structure_size, 120);
        assert_eq!(m.header.version(), "v1.3");
        assert!(m.header.is_v1_3());
        assert_eq!(m.temperature_edge, 45);
        assert_eq!(m.temperature_hotspot, 62);
        assert_eq!(m.average_socket_power, 310);
        assert_eq!(m.energy_accumulator, 7);
        assert_eq!(m.average_gfxclk_frequency, 1700);
        assert_eq!(m.current_gfxclk, 1650);
        assert_eq!(m.throttle_status, 1);
        assert_eq!(m.current_fan_speed, 0xFFFF);
        assert_eq!(m.pcie_link_width, 16);
        assert_eq!(m.pcie_link_speed, 160);
        assert_eq!(m.temperature_hbm, [50, 50, 0xFFFF, 0xFFFF]);
        assert_eq!(m.voltage_gfx, 850);
        assert_eq!(m.indep_throttle_status, 1);
    }

    /// Value of field `id` in `m`, widened to u64.
    fn field_value(m: &GpuMetricsV1_3, id: FieldId) -> u64 {
        use FieldId as F;
        match id {
            F::StructureSize => m.header.structure_size.into(),
            F::FormatRevision => m.header.format_revision.into(),
            F::ContentRevision => m.header.content_revision.into(),
            F::TemperatureEdge => m.temperature_edge.into(),
            F::TemperatureHotspot => m.temperature_hotspot.into(),
            F::TemperatureMem => m.temperature_mem.into(),
            F::TemperatureVrGfx => m.temperature_vrgfx.into(),
            F::TemperatureVrSoc => m.temperature_vrsoc.into(),
            F::TemperatureVrMem => m.temperature_vrmem.into(),
            F::AverageGfxActivity => m.average_gfx_activity.into(),
            F::AverageUmcActivity => m.average_umc_activity.into(),
            F::AverageMmActivity => m.average_mm_activity.into(),
            F::AverageSocketPower => m.average_socket_power.into(),
            F::EnergyAccumulator => m.energy_accumulator,
            F::SystemClockCounter => m.system_clock_counter,
            F::AverageGfxclkFrequency => m.average_gfxclk_frequency.into(),
            F::AverageSocclkFrequency => m.average_socclk_frequency.into(),
            F::AverageUclkFrequency => m.average_uclk_frequency.into(),
            F::AverageVclk0Frequency => m.average_vclk0_frequency.into(),
            F::AverageDclk0Frequency => m.average_dclk0_frequency.into(),
            F::AverageVclk1Frequency => m.average_vclk1_frequency.into(),
            F::AverageDclk1Frequency => m.average_dclk1_frequency.into(),
            F::CurrentGfxclk => m.current_gfxclk.into(),
            F::CurrentSocclk => m.current_socclk.into(),
            F::CurrentUclk => m.current_uclk.into(),
            F::CurrentVclk0 => m.current_vclk0.into(),
            F::CurrentDclk0 => m.current_dclk0.into(),
            F::CurrentVclk1 => m.current_vclk1.into(),
            F::CurrentDclk1 => m.current_dclk1.into(),
            F::ThrottleStatus => m.throttle_status.into(),
            F::CurrentFanSpeed => m.current_fan_speed.into(),
            F::PcieLinkWidth => m.pcie_link_width.into(),
            F::PcieLinkSpeed => m.pcie_link_speed.into(),
            F::Padding => m.padding.into(),
            F::GfxActivityAcc => m.gfx_activity_acc.into(),
            F::MemActivityAcc => m.mem_activity_acc.into(),
            F::TemperatureHbm0 => m.temperature_hbm[0].into(),
            F::TemperatureHbm1 => m.temperature_hbm[1].into(),
            F::TemperatureHbm2 => m.temperature_hbm[2].into(),
            F::TemperatureHbm3 => m.temperature_hbm[3].into(),
            F::FirmwareTimestamp => m.firmware_timestamp,
            F::VoltageSoc => m.voltage_soc.into(),
            F::VoltageGfx => m.voltage_gfx.into(),
            F::VoltageMem => m.voltage_mem.into(),
            F::Padding1 => m.padding1.into(),
            F::IndepThrottleStatus => m.indep_throttle_status,
        }
    }

    /// Write every field of `m` back at its layout position.
    fn encode(m: &GpuMetricsV1_3) -> Vec<u8> {
        build_record(|id| field_value(m, id))
    }

    #[test]
    fn test_round_trip_zero_and_max() {
        for fill in [0u64, u64::MAX] {
            let data = build_record(|_| fill);
            assert_eq!(encode(&parse(&data).unwrap()), data);
        }
    }

    #[test]
    fn test_round_trip_distinct_values() {
        // Every byte of every field differs from its neighbours', so a
        // swapped or shifted field shows up as a mismatch.
        let value = |id: FieldId| (id as u64 + 1) * 0x0101_0101_0101_0101;
        for data in [build_record(value), sample_record()] {
            assert_eq!(encode(&parse(&data).unwrap()), data);
        }
    }

    #[test]
    fn test_header_mismatch_still_decodes() {
        let data = build_record(|id| match id {
            FieldId::StructureSize => 96,
            FieldId::FormatRevision => 2,
            FieldId::ContentRevision => 0,
            _ => 1,
        });
        let m = parse(&data).unwrap();
        assert!(!m.header.is_v1_3());
        assert_eq!(m.header.version(), "v2.0");
        assert_eq!(m.voltage_mem, 1);
    }

    #[test]
    fn test_reserved_fields_are_kept() {
        assert!(LAYOUT_V1_3
            .iter()
            .any(|spec| spec.kind == FieldKind::Reserved));
    }

    #[test]
    fn test_read_file_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpu_metrics");
        std::fs::write(&path, &sample_record()[..100]).unwrap();

        let err = MetricsReader::new().read_file(&path, 3).unwrap_err();
        assert!(matches!(
            err,
            CardError::Metrics {
                card: 3,
                source: MetricsError::ShortRead {
                    expected: 120,
                    actual: 100
                }
            }
        ));
    }

    #[test]
    fn test_read_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = MetricsReader::new()
            .read_file(dir.path().join("nope"), 0)
            .unwrap_err();
        assert!(matches!(err, CardError::Io { .. }));
    }
}
