//! Waybar sensor for a single card.

use crate::amdgpu::field::Reading;
use crate::amdgpu::throttle::AsicFamily;
use crate::report::DecodedReport;
use crate::sysfs::{discover_cards, find_card, CardEntry};
use gpumetrics_rs_core::{format, Sensor, SensorConfig, SensorError, WaybarOutput};
use std::path::Path;

/// CSS class used when a limiter is active and temperatures are normal.
pub const THROTTLED_CLASS: &str = "throttled";

#[derive(Debug)]
pub struct AmdgpuSensor {
    name: String,
    card: CardEntry,
    asic: AsicFamily,
    temp_warning: u16,
    temp_critical: u16,
    config: SensorConfig,
}

impl AmdgpuSensor {
    /// Bind to card `card` under `drm_root`, or the lowest-numbered card
    /// with a metrics file when `card` is `None`.
    pub fn new(
        drm_root: &Path,
        card: Option<u32>,
        asic: AsicFamily,
        temp_warning: u16,
        temp_critical: u16,
    ) -> Result<Self, SensorError> {
        let card = match card {
            Some(id) => find_card(drm_root, id).ok_or_else(|| {
                SensorError::unavailable(format!("Card {id} not found or no gpu_metrics available"))
            })?,
            None => discover_cards(drm_root)?.into_iter().next().ok_or_else(|| {
                SensorError::unavailable(format!(
                    "No gpu_metrics files found under {}",
                    drm_root.display()
                ))
            })?,
        };

        Ok(Self::for_card(card, asic, temp_warning, temp_critical))
    }

    pub fn for_card(
        card: CardEntry,
        asic: AsicFamily,
        temp_warning: u16,
        temp_critical: u16,
    ) -> Self {
        Self {
            name: format!("amd-gpu-card{}", card.id),
            card,
            asic,
            temp_warning,
            temp_critical,
            config: SensorConfig::default(),
        }
    }

    pub fn card_id(&self) -> u32 {
        self.card.id
    }

    fn build_text(&self, report: &DecodedReport) -> String {
        let mut parts = Vec::new();
        if self.config.custom_flag("show_power", true) {
            parts.push(report.socket_power.to_string());
        }
        if self.config.custom_flag("show_temperature", true) {
            parts.push(report.temperatures.edge.to_string());
        }
        if parts.is_empty() {
            parts.push(report.activity.gfx.to_string());
        }
        parts.join(" ")
    }

    fn build_tooltip(&self, report: &DecodedReport) -> String {
        let t = &report.temperatures;
        let asic = &report.throttle_status;
        let indep = &report.indep_throttle_status;

        [
            format!("AMD GPU card{} ({})", self.card.id, self.asic),
            format::key_value("Edge", &t.edge.to_string()),
            format::key_value("Hotspot", &t.hotspot.to_string()),
            format::key_value("Memory", &t.mem.to_string()),
            format::key_value("Power", &report.socket_power.to_string()),
            format::key_value("GFX Activity", &report.activity.gfx.to_string()),
            format::key_value("GFX Clock", &report.clocks.current.gfx.to_string()),
            format::key_value(asic.name(), &asic.reasons.summary()),
            format::key_value(indep.name(), &indep.reasons.summary()),
        ]
        .join("\n")
    }

    fn build_output(&self, report: &DecodedReport) -> WaybarOutput {
        let text = self.build_text(report);
        let tooltip = Some(self.build_tooltip(report));
        let percentage = report
            .activity
            .gfx
            .value()
            .map(|activity| activity.min(100) as u8);

        let mut output = match report.temperatures.hotspot {
            Reading::Value { raw, .. } => format::themed_output(
                text,
                tooltip,
                percentage,
                raw as f64,
                f64::from(self.temp_warning),
                f64::from(self.temp_critical),
                &self.config.theme,
            ),
            Reading::Unavailable => WaybarOutput {
                text,
                tooltip,
                class: Some(self.config.theme.unknown.clone()),
                percentage,
            },
        };

        let normal = Some(self.config.theme.normal.as_str());
        if report.is_throttled() && output.class.as_deref() == normal {
            output.class = Some(THROTTLED_CLASS.to_owned());
        }
        output
    }
}

impl Sensor for AmdgpuSensor {
    type Error = SensorError;

    fn read(&mut self) -> Result<WaybarOutput, Self::Error> {
        let report = self.card.read(self.asic)?;
        Ok(self.build_output(&report))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, config: SensorConfig) -> Result<(), Self::Error> {
        self.config = config;
        Ok(())
    }

    fn check_availability(&self) -> Result<(), Self::Error> {
        if self.card.metrics_path.is_file() {
            Ok(())
        } else {
            Err(SensorError::unavailable(format!(
                "{} is not readable",
                self.card.metrics_path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amdgpu::layout::FieldId;
    use crate::amdgpu::reader::tests::build_record;
    use std::fs;
    use tempfile::TempDir;

    fn fake_card(value: impl Fn(FieldId) -> u64) -> (TempDir, AmdgpuSensor) {
        let dir = TempDir::new().unwrap();
        let device = dir.path().join("card1/device");
        fs::create_dir_all(&device).unwrap();
        fs::write(device.join("gpu_metrics"), build_record(value)).unwrap();

        let sensor = AmdgpuSensor::new(dir.path(), None, AsicFamily::Aldebaran, 90, 105).unwrap();
        (dir, sensor)
    }

    fn quiet(id: FieldId) -> u64 {
        match id {
            FieldId::TemperatureEdge => 40,
            FieldId::TemperatureHotspot => 55,
            FieldId::AverageSocketPower => 180,
            FieldId::AverageGfxActivity => 64,
            FieldId::ThrottleStatus => 0,
            FieldId::IndepThrottleStatus => 0,
            _ => 1,
        }
    }

    #[test]
    fn test_reads_first_card() {
        let (_dir, mut sensor) = fake_card(quiet);
        assert_eq!(sensor.card_id(), 1);
        assert_eq!(sensor.name(), "amd-gpu-card1");
        assert!(sensor.check_availability().is_ok());

        let output = sensor.read().unwrap();
        assert_eq!(output.text, "180 W 40 C");
        assert_eq!(output.class.as_deref(), Some("normal"));
        assert_eq!(output.percentage, Some(64));
        let tooltip = output.tooltip.unwrap();
        assert!(tooltip.starts_with("AMD GPU card1 (aldebaran)"));
        assert!(tooltip.ends_with("throttle_status: none\nindep_throttle_status: none"));
    }

    #[test]
    fn test_hotspot_thresholds_and_throttle_class() {
        let (_dir, mut sensor) = fake_card(|id| match id {
            FieldId::TemperatureHotspot => 95,
            FieldId::ThrottleStatus => 1 << 6,
            _ => quiet(id),
        });
        let output = sensor.read().unwrap();
        assert_eq!(output.class.as_deref(), Some("warning"));
        assert!(output
            .tooltip
            .unwrap()
            .ends_with("throttle_status: TEMP_GPU\nindep_throttle_status: none"));

        let (_dir, mut sensor) = fake_card(|id| match id {
            FieldId::ThrottleStatus => 1,
            _ => quiet(id),
        });
        assert_eq!(sensor.read().unwrap().class.as_deref(), Some(THROTTLED_CLASS));
    }

    #[test]
    fn test_tooltip_keeps_unavailable_apart_from_none() {
        let (_dir, mut sensor) = fake_card(|id| match id {
            FieldId::IndepThrottleStatus => u64::MAX,
            _ => quiet(id),
        });
        let output = sensor.read().unwrap();
        let tooltip = output.tooltip.unwrap();
        let tail: Vec<&str> = tooltip.lines().rev().take(2).collect();
        assert_eq!(
            tail,
            vec!["indep_throttle_status: unavailable", "throttle_status: none"]
        );
        assert_eq!(output.class.as_deref(), Some("normal"));
    }

    #[test]
    fn test_tooltip_lists_each_vocabulary_separately() {
        // TDC_GFX is bit 2 for the ASIC table and bit 16 in the common one.
        let (_dir, mut sensor) = fake_card(|id| match id {
            FieldId::ThrottleStatus => 1 << 2,
            FieldId::IndepThrottleStatus => (1 << 16) | (1 << 35),
            _ => quiet(id),
        });
        let tooltip = sensor.read().unwrap().tooltip.unwrap();
        let tail: Vec<&str> = tooltip.lines().rev().take(2).collect();
        assert_eq!(
            tail,
            vec![
                "indep_throttle_status: TDC_GFX, TEMP_EDGE",
                "throttle_status: TDC_GFX",
            ]
        );
    }

    #[test]
    fn test_unavailable_hotspot_uses_unknown_class() {
        let (_dir, mut sensor) = fake_card(|id| match id {
            FieldId::TemperatureHotspot => 0xFFFF,
            FieldId::AverageGfxActivity => 0xFFFF,
            _ => quiet(id),
        });
        let output = sensor.read().unwrap();
        assert_eq!(output.class.as_deref(), Some("unknown"));
        assert_eq!(output.percentage, None);
    }

    #[test]
    fn test_display_flags() {
        let (_dir, mut sensor) = fake_card(quiet);
        let config = SensorConfig::default()
            .with_custom("show_power", serde_json::Value::Bool(false))
            .with_custom("show_temperature", serde_json::Value::Bool(false));
        sensor.configure(config).unwrap();
        assert_eq!(sensor.read().unwrap().text, "64 %");
    }

    #[test]
    fn test_missing_card() {
        let dir = TempDir::new().unwrap();
        let err = AmdgpuSensor::new(dir.path(), Some(3), AsicFamily::Aldebaran, 90, 105)
            .unwrap_err();
        assert!(err.to_string().contains("Card 3 not found"));

        let err = AmdgpuSensor::new(dir.path(), None, AsicFamily::Aldebaran, 90, 105)
            .unwrap_err();
        assert!(matches!(err, SensorError::Unavailable { .. }));
    }
}
