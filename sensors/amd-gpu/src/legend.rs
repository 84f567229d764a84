//! Glossary and package map printed with `--legend`.

use crate::amdgpu::throttle::AsicFamily;

/// Inner width of the package map box.
const MAP_INNER_WIDTH: usize = 69;

const GLOSSARY: &[(&str, &str)] = &[
    ("GFX", "graphics/compute engine, where the shader cores live."),
    ("SoC", "system-on-chip logic outside GFX (display, IO, media, control)."),
    ("MM", "multimedia block (VCN video encode/decode)."),
    ("UMC", "memory controller for the on-package HBM."),
    ("HBM", "high bandwidth memory stacks on the package."),
    ("VR", "voltage regulator feeding a power rail."),
    ("UCLK", "memory clock."),
    ("VCLK/DCLK", "video encode/decode clocks, 0 and 1 per VCN instance."),
    ("Edge temp", "sensor near the die edge, slow and cool."),
    ("Hotspot temp", "hottest on-die sensor, the one to watch."),
    ("PPT0..PPT3", "package power limiters, numbering is ASIC-dependent."),
];

const GLOSSARY_TAIL: &[(&str, &str)] = &[
    ("APCC", "firmware reliability limiter (adaptive power/current control)."),
    ("TDC/EDC", "sustained and short-term current limits."),
    ("PROCHOT", "platform over-temperature or over-power alarm."),
    ("GFX Activity Acc", "accumulator in firmware units, compare deltas."),
    ("MEM Activity Acc", "accumulator in firmware units, compare deltas."),
    ("N/A", "the firmware did not report the field (all bits set)."),
];

const PACKAGE_MAP: &[&str] = &[
    "GPU package",
    "",
    "[GFX/Compute]    [SoC/IO]                 [HBM0][HBM1][HBM2][HBM3]",
    "    |                |                        |   |   |   |",
    "Edge/Hotspot       SoC temp                     HBM temps",
    "    |                |",
    " VR GFX            VR SoC                VR MEM (power delivery)",
    "",
    "PCIe link (width/speed)",
];

/// The "PPT domains present" line for `asic`.
pub fn ppt_domains_line(asic: AsicFamily) -> String {
    let domains = asic.ppt_domains();
    if domains.is_empty() {
        return "  PPT domains present (ASIC map): none detected".to_owned();
    }

    let listed: Vec<String> = domains.iter().map(|desc| desc.to_string()).collect();
    format!("  PPT domains present (ASIC map): {}", listed.join(", "))
}

fn map_border() -> String {
    format!("  +{}+\n", "-".repeat(MAP_INNER_WIDTH + 2))
}

fn push_terms(out: &mut String, terms: &[(&str, &str)]) {
    for (term, meaning) in terms {
        out.push_str(&format!("  {term}: {meaning}\n"));
    }
}

/// Full legend text for `asic`, ending with a newline.
pub fn legend(asic: AsicFamily) -> String {
    let mut out = String::from("GPU metrics quick glossary:\n");
    push_terms(&mut out, GLOSSARY);
    if asic == AsicFamily::Aldebaran {
        out.push_str("    MI200/Aldebaran: PPT0 is filtered/average package power,\n");
        out.push_str("    PPT1 is raw/spike package power.\n");
    }
    out.push_str(&ppt_domains_line(asic));
    out.push('\n');
    push_terms(&mut out, GLOSSARY_TAIL);

    out.push_str("\nApproximate physical map (not to scale):\n");
    out.push_str(&map_border());
    for text in PACKAGE_MAP {
        out.push_str(&format!("  | {:<width$.width$} |\n", text, width = MAP_INNER_WIDTH));
    }
    out.push_str(&map_border());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ppt_domains_line() {
        assert_eq!(
            ppt_domains_line(AsicFamily::Aldebaran),
            "  PPT domains present (ASIC map): PPT0 (pkg power (avg/filtered)), PPT1 (pkg power (raw/spike))"
        );
    }

    #[test]
    fn test_map_box_is_rectangular() {
        let text = legend(AsicFamily::Aldebaran);
        let boxed: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with("  +") || line.starts_with("  |"))
            .collect();

        assert_eq!(boxed.len(), PACKAGE_MAP.len() + 2);
        for line in boxed {
            assert_eq!(line.chars().count(), MAP_INNER_WIDTH + 6, "{line:?}");
        }
    }

    #[test]
    fn test_legend_sections() {
        let text = legend(AsicFamily::Aldebaran);
        assert!(text.starts_with("GPU metrics quick glossary:\n"));
        assert!(text.contains("  PPT domains present (ASIC map): PPT0"));
        assert!(text.contains("  TDC/EDC: "));
        assert!(text.contains("Approximate physical map (not to scale):"));
        assert!(text.contains("[HBM0][HBM1][HBM2][HBM3]"));
        assert!(text.ends_with("+\n"));
    }

    #[test]
    fn test_legend_line_order() {
        let text = legend(AsicFamily::Aldebaran);
        let lines: Vec<&str> = text.lines().collect();
        let ppt = lines
            .iter()
            .position(|line| line.starts_with("  PPT domains present"))
            .unwrap();

        assert_eq!(lines[ppt - 1], "    PPT1 is raw/spike package power.");
        assert!(lines[ppt + 1].starts_with("  APCC: "));

        let glossary = 1 + GLOSSARY.len() + 2 + 1 + GLOSSARY_TAIL.len();
        let map = 2 + PACKAGE_MAP.len() + 2;
        assert_eq!(lines.len(), glossary + map);
    }
}
