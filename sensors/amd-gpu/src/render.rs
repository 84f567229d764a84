//! Text and JSON presentation of a [`DecodedReport`].

use crate::amdgpu::throttle::{ThrottleReasons, Vocabulary};
use crate::report::{ClockSet, DecodedReport, ThrottleField};
use gpumetrics_rs_core::format::key_value;
use serde::Serialize;
use std::fmt;

/// Line-per-field rendering of one card's report.
pub struct TextReport<'a> {
    pub card: u32,
    pub report: &'a DecodedReport,
}

impl<'a> TextReport<'a> {
    pub fn new(card: u32, report: &'a DecodedReport) -> Self {
        Self { card, report }
    }
}

fn line(f: &mut fmt::Formatter<'_>, label: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "  {}", key_value(label, &value.to_string()))
}

fn clock_lines(f: &mut fmt::Formatter<'_>, prefix: &str, clocks: &ClockSet) -> fmt::Result {
    line(f, &format!("{prefix} GFX Clock"), clocks.gfx)?;
    line(f, &format!("{prefix} SOC Clock"), clocks.soc)?;
    line(f, &format!("{prefix} UCLK"), clocks.uclk)?;
    line(f, &format!("{prefix} VCLK0"), clocks.vclk0)?;
    line(f, &format!("{prefix} DCLK0"), clocks.dclk0)?;
    line(f, &format!("{prefix} VCLK1"), clocks.vclk1)?;
    line(f, &format!("{prefix} DCLK1"), clocks.dclk1)
}

fn throttle_lines<V: Vocabulary>(
    f: &mut fmt::Formatter<'_>,
    field: &ThrottleField<V>,
) -> fmt::Result {
    let name = field.name();
    match &field.reasons {
        ThrottleReasons::Unavailable => line(f, name, format_args!("{} (unavailable)", field.hex())),
        reasons => {
            line(f, name, field.hex())?;
            line(f, &format!("{name} reasons"), reasons)
        }
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        let t = &r.temperatures;

        writeln!(f, "GPU Metrics for Card {}:", self.card)?;
        line(f, "Structure Size", format_args!("{} bytes", r.header.structure_size))?;
        line(f, "Format Version", r.header.format_revision)?;
        line(f, "Content Version", r.header.content_revision)?;

        line(f, "Temperature (Edge)", t.edge)?;
        line(f, "Temperature (Hotspot)", t.hotspot)?;
        line(f, "Temperature (Memory)", t.mem)?;
        line(f, "Temperature (VR GFX)", t.vr_gfx)?;
        line(f, "Temperature (VR SoC)", t.vr_soc)?;
        line(f, "Temperature (VR MEM)", t.vr_mem)?;

        line(f, "Average GFX Activity", r.activity.gfx)?;
        line(f, "Average UMC Activity", r.activity.umc)?;
        line(f, "Average MM Activity", r.activity.mm)?;
        line(f, "Average Socket Power", r.socket_power)?;

        line(f, "Energy Accumulator", r.counters.energy_accumulator)?;
        line(f, "System Clock Counter", r.counters.system_clock_counter)?;

        clock_lines(f, "Average", &r.clocks.average)?;
        clock_lines(f, "Current", &r.clocks.current)?;

        line(f, "Fan Speed", r.fan_speed)?;
        line(f, "PCIe Link Width", r.pcie.width)?;
        line(f, "PCIe Link Speed", r.pcie.speed)?;

        line(f, "GFX Activity Acc", r.counters.gfx_activity_acc)?;
        line(f, "MEM Activity Acc", r.counters.mem_activity_acc)?;

        for (i, hbm) in t.hbm.iter().enumerate() {
            line(f, &format!("Temperature (HBM{i})"), hbm)?;
        }

        line(f, "Firmware Timestamp", r.counters.firmware_timestamp)?;
        line(f, "Voltage (SoC)", r.voltages.soc)?;
        line(f, "Voltage (GFX)", r.voltages.gfx)?;
        line(f, "Voltage (Memory)", r.voltages.mem)?;

        line(
            f,
            "Note",
            "throttle_status is ASIC-dependent; indep_throttle_status is normalized.",
        )?;
        throttle_lines(f, &r.throttle_status)?;
        throttle_lines(f, &r.indep_throttle_status)
    }
}

/// Render one card as text, matching [`TextReport`]'s layout.
pub fn render_text(card: u32, report: &DecodedReport) -> String {
    TextReport::new(card, report).to_string()
}

#[derive(Serialize)]
struct CardJson<'a> {
    card: u32,
    #[serde(flatten)]
    report: &'a DecodedReport,
}

/// Render one card as a single JSON object with a `card` field.
pub fn render_json(card: u32, report: &DecodedReport) -> serde_json::Result<String> {
    serde_json::to_string(&CardJson { card, report })
}

/// Short one-line summary, used in tooltips and logs.
pub fn summary(report: &DecodedReport) -> String {
    let mut out = format!(
        "{} / {} edge / {} hotspot",
        report.socket_power, report.temperatures.edge, report.temperatures.hotspot
    );
    if report.activity.gfx.is_available() {
        out.push_str(&format!(" / {} gfx", report.activity.gfx));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amdgpu::layout::FieldId;
    use crate::amdgpu::reader::tests::build_record;
    use crate::amdgpu::reader::MetricsReader;
    use crate::amdgpu::throttle::AsicFamily;

    fn report(value: impl Fn(FieldId) -> u64) -> DecodedReport {
        let metrics = MetricsReader::new().parse(&build_record(value)).unwrap();
        DecodedReport::build(&metrics, AsicFamily::Aldebaran)
    }

    fn scenario() -> DecodedReport {
        report(|id| match id {
            FieldId::StructureSize => 120,
            FieldId::FormatRevision => 1,
            FieldId::ContentRevision => 3,
            FieldId::TemperatureEdge => 0xFFFF,
            FieldId::AverageSocketPower => 220,
            FieldId::PcieLinkSpeed => 30,
            FieldId::ThrottleStatus => 0b101,
            FieldId::IndepThrottleStatus => u64::MAX,
            _ => 0,
        })
    }

    #[test]
    fn test_text_header_and_scalars() {
        let text = render_text(2, &scenario());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "GPU Metrics for Card 2:");
        assert_eq!(lines[1], "  Structure Size: 120 bytes");
        assert_eq!(lines[2], "  Format Version: 1");
        assert_eq!(lines[3], "  Content Version: 3");
        assert_eq!(lines[4], "  Temperature (Edge): N/A");
        assert!(lines.contains(&"  Average Socket Power: 220 W"));
        assert!(lines.contains(&"  Average GFX Clock: 0 MHz"));
        assert!(lines.contains(&"  Current DCLK1: 0 MHz"));
        assert!(lines.contains(&"  PCIe Link Width: 0"));
        assert!(lines.contains(&"  PCIe Link Speed: 3.0 GT/s (raw 30)"));
        assert!(lines.contains(&"  System Clock Counter: 0 ns"));
        assert!(lines.contains(&"  Firmware Timestamp: 0 (10ns)"));
        assert!(lines.contains(&"  Temperature (HBM3): 0 C"));
    }

    #[test]
    fn test_text_throttle_lines() {
        let text = render_text(0, &scenario());
        let tail: Vec<&str> = text.lines().rev().take(4).collect();

        assert_eq!(
            tail,
            vec![
                "  indep_throttle_status: 0xffffffffffffffff (unavailable)",
                "  throttle_status reasons: PPT0 (pkg power (avg/filtered)), TDC_GFX (current limit (gfx))",
                "  throttle_status: 0x00000005",
                "  Note: throttle_status is ASIC-dependent; indep_throttle_status is normalized.",
            ]
        );
    }

    #[test]
    fn test_text_throttle_none() {
        let text = render_text(0, &report(|_| 0));
        assert!(text.contains("  throttle_status reasons: none\n"));
        assert!(text.contains("  indep_throttle_status: 0x0000000000000000\n"));
        assert!(text.ends_with("  indep_throttle_status reasons: none\n"));
    }

    #[test]
    fn test_text_line_count() {
        // Header, 3 header fields, 6 temps, 3 activities, power, 2 counters,
        // 14 clocks, fan, 2 link, 2 accumulators, 4 HBM, timestamp,
        // 3 voltages, note, 2 + 2 throttle lines.
        let text = render_text(0, &report(|_| 0));
        assert_eq!(text.lines().count(), 48);
    }

    #[test]
    fn test_json_has_card_and_nulls() {
        let json = render_json(4, &scenario()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["card"], 4);
        assert!(value["temperatures"]["edge"].is_null());
        assert_eq!(value["socket_power"], 220);
        assert_eq!(value["throttle_status"]["decoded"]["reasons"][1]["label"], "TDC_GFX");
    }

    #[test]
    fn test_summary() {
        assert_eq!(summary(&scenario()), "220 W / N/A edge / 0 C hotspot / 0 % gfx");
    }
}
