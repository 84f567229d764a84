//! Throttle bitmask vocabularies and the decoder that maps set bits to
//! named reasons.
//!
//! gpu_metrics carries two masks. `throttle_status` is the raw 32-bit word
//! straight from SMU firmware, so its bit meanings change from one ASIC to
//! the next. `indep_throttle_status` is the driver's 64-bit translation into
//! the common `SMU_THROTTLER_*` positions. The same bit number means
//! different things in each, so masks and tables are tagged with a
//! [`Vocabulary`] and the decoder only accepts a matching pair.

use super::field::U64_UNAVAILABLE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A family of bit meanings.
pub trait Vocabulary: 'static {
    /// Integer the mask is carried in.
    type Raw: Copy + Into<u64> + PartialEq + fmt::Debug + fmt::LowerHex + Serialize;

    /// Field name used when presenting the mask.
    const NAME: &'static str;

    /// Width of the mask in bits.
    const BITS: u32;

    /// Whole-value marker meaning the mask was not reported.
    const UNAVAILABLE: Option<Self::Raw>;
}

/// Raw firmware bits of one ASIC family (`throttle_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsicSpecific {}

impl Vocabulary for AsicSpecific {
    type Raw = u32;
    const NAME: &'static str = "throttle_status";
    const BITS: u32 = u32::BITS;
    const UNAVAILABLE: Option<u32> = None;
}

/// ASIC-independent `SMU_THROTTLER_*` bits (`indep_throttle_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsicIndependent {}

impl Vocabulary for AsicIndependent {
    type Raw = u64;
    const NAME: &'static str = "indep_throttle_status";
    const BITS: u32 = u64::BITS;
    const UNAVAILABLE: Option<u64> = Some(U64_UNAVAILABLE);
}

/// Meaning of one bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitDesc {
    pub bit: u8,
    pub label: &'static str,
    pub description: &'static str,
}

impl fmt::Display for BitDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.description)
    }
}

const fn bit(bit: u8, label: &'static str, description: &'static str) -> BitDesc {
    BitDesc {
        bit,
        label,
        description,
    }
}

/// Ordered bit descriptions for one vocabulary.
///
/// Declaration order is output order; it groups limiters by kind and is not
/// required to follow bit order.
#[derive(Debug)]
pub struct BitTable<V: Vocabulary> {
    entries: &'static [BitDesc],
    _vocabulary: PhantomData<V>,
}

impl<V: Vocabulary> BitTable<V> {
    pub const fn new(entries: &'static [BitDesc]) -> Self {
        Self {
            entries,
            _vocabulary: PhantomData,
        }
    }

    pub fn entries(&self) -> &'static [BitDesc] {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the description of a bit position.
    pub fn describe(&self, bit: u8) -> Option<&'static BitDesc> {
        self.entries.iter().find(|desc| desc.bit == bit)
    }
}

/// Common throttler bits, stable across ASICs.
pub static INDEPENDENT_THROTTLER_BITS: BitTable<AsicIndependent> = BitTable::new(&[
    bit(0, "PPT0", "pkg power (avg/filtered)"),
    bit(1, "PPT1", "pkg power (raw/spike)"),
    bit(2, "PPT2", "power limit"),
    bit(3, "PPT3", "power limit"),
    bit(4, "SPL", "socket power limit"),
    bit(5, "FPPT", "fast power limit"),
    bit(6, "SPPT", "sustained power limit"),
    bit(7, "SPPT_APU", "APU power limit"),
    bit(16, "TDC_GFX", "current limit (gfx)"),
    bit(17, "TDC_SOC", "current limit (soc)"),
    bit(18, "TDC_MEM", "current limit (mem)"),
    bit(19, "TDC_VDD", "current limit (vdd)"),
    bit(20, "TDC_CVIP", "current limit (cvip)"),
    bit(21, "EDC_CPU", "current limit (cpu)"),
    bit(22, "EDC_GFX", "current limit (gfx)"),
    bit(23, "APCC", "reliability limit"),
    bit(32, "TEMP_GPU", "temperature (gpu)"),
    bit(33, "TEMP_CORE", "temperature (core)"),
    bit(34, "TEMP_MEM", "temperature (mem)"),
    bit(35, "TEMP_EDGE", "temperature (edge)"),
    bit(36, "TEMP_HOTSPOT", "temperature (hotspot)"),
    bit(37, "TEMP_SOC", "temperature (soc)"),
    bit(38, "TEMP_VR_GFX", "temperature (vr gfx)"),
    bit(39, "TEMP_VR_SOC", "temperature (vr soc)"),
    bit(40, "TEMP_VR_MEM0", "temperature (vr mem0)"),
    bit(41, "TEMP_VR_MEM1", "temperature (vr mem1)"),
    bit(42, "TEMP_LIQUID0", "temperature (liquid0)"),
    bit(43, "TEMP_LIQUID1", "temperature (liquid1)"),
    bit(44, "VRHOT0", "vr hot"),
    bit(45, "VRHOT1", "vr hot"),
    bit(46, "PROCHOT_CPU", "cpu prochot"),
    bit(47, "PROCHOT_GFX", "gpu prochot"),
    bit(56, "PPM", "power management"),
    bit(57, "FIT", "reliability limit"),
]);

/// Raw throttler bits of Aldebaran (MI200, SMU13, SMC firmware 68.xx).
pub static ALDEBARAN_THROTTLER_BITS: BitTable<AsicSpecific> = BitTable::new(&[
    bit(0, "PPT0", "pkg power (avg/filtered)"),
    bit(1, "PPT1", "pkg power (raw/spike)"),
    bit(2, "TDC_GFX", "current limit (gfx)"),
    bit(3, "TDC_SOC", "current limit (soc)"),
    bit(4, "TDC_HBM", "current limit (hbm)"),
    bit(6, "TEMP_GPU", "temperature (gpu)"),
    bit(7, "TEMP_MEM", "temperature (mem)"),
    bit(11, "TEMP_VR_GFX", "temperature (vr gfx)"),
    bit(12, "TEMP_VR_SOC", "temperature (vr soc)"),
    bit(13, "TEMP_VR_MEM", "temperature (vr mem)"),
    bit(19, "APCC", "reliability limit"),
]);

/// A throttle mask tagged with its vocabulary.
pub struct ThrottleMask<V: Vocabulary> {
    raw: V::Raw,
    _vocabulary: PhantomData<V>,
}

impl<V: Vocabulary> ThrottleMask<V> {
    pub const fn new(raw: V::Raw) -> Self {
        Self {
            raw,
            _vocabulary: PhantomData,
        }
    }

    pub fn raw(&self) -> V::Raw {
        self.raw
    }

    /// True when the whole value is the vocabulary's "not reported" marker.
    pub fn is_unavailable(&self) -> bool {
        V::UNAVAILABLE == Some(self.raw)
    }
}

impl<V: Vocabulary> Clone for ThrottleMask<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Vocabulary> Copy for ThrottleMask<V> {}

impl<V: Vocabulary> PartialEq for ThrottleMask<V> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<V: Vocabulary> fmt::Debug for ThrottleMask<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", V::NAME, HexMask::<V>(self.raw))
    }
}

/// Zero-padded hex at the vocabulary's width, e.g. `0x00000005`.
pub struct HexMask<V: Vocabulary>(pub V::Raw);

impl<V: Vocabulary> fmt::Display for HexMask<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = (V::BITS / 4) as usize;
        write!(f, "0x{:0digits$x}", self.0)
    }
}

/// Outcome of decoding a throttle mask.
///
/// `Unavailable` and `None` are different answers: the first means the
/// firmware reported nothing, the second that it reported no known limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reasons", rename_all = "lowercase")]
pub enum ThrottleReasons {
    Unavailable,
    None,
    Active(Vec<&'static BitDesc>),
}

impl ThrottleReasons {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Matched reasons, empty unless `Active`.
    pub fn reasons(&self) -> &[&'static BitDesc] {
        match self {
            Self::Active(reasons) => reasons,
            Self::Unavailable | Self::None => &[],
        }
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.reasons().iter().map(|desc| desc.label).collect()
    }

    /// Labels joined by commas, or `none` / `unavailable`.
    pub fn summary(&self) -> String {
        match self {
            Self::Unavailable => "unavailable".to_owned(),
            Self::None => "none".to_owned(),
            Self::Active(_) => self.labels().join(", "),
        }
    }
}

impl fmt::Display for ThrottleReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::None => write!(f, "none"),
            Self::Active(reasons) => {
                for (i, desc) in reasons.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{desc}")?;
                }
                Ok(())
            }
        }
    }
}

/// Decode `mask` against `table`.
///
/// Walks the table in declaration order and keeps every entry whose bit is
/// set. Set bits without an entry are ignored, as are entries that lie
/// outside the vocabulary's width.
pub fn decode<V: Vocabulary>(mask: ThrottleMask<V>, table: &BitTable<V>) -> ThrottleReasons {
    if mask.is_unavailable() {
        return ThrottleReasons::Unavailable;
    }

    let value: u64 = mask.raw().into();
    let reasons: Vec<&'static BitDesc> = table
        .entries()
        .iter()
        .filter(|desc| u32::from(desc.bit) < V::BITS && value & (1u64 << desc.bit) != 0)
        .collect();

    if reasons.is_empty() {
        ThrottleReasons::None
    } else {
        ThrottleReasons::Active(reasons)
    }
}

/// ASIC family whose raw throttle bits are used for `throttle_status`.
///
/// The raw mask cannot be attributed to a family from the metrics file
/// itself, so the family is chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AsicFamily {
    /// MI200 series (MI210, MI250, MI250X)
    #[default]
    Aldebaran,
}

impl AsicFamily {
    const VALID_OPTIONS: &'static [&'static str] = &["aldebaran", "mi200", "mi250", "mi250x"];

    /// Raw throttle bit table for this family.
    pub fn throttle_table(self) -> &'static BitTable<AsicSpecific> {
        match self {
            Self::Aldebaran => &ALDEBARAN_THROTTLER_BITS,
        }
    }

    /// Package power limiter domains present in this family's table, at
    /// most four.
    pub fn ppt_domains(self) -> Vec<&'static BitDesc> {
        self.throttle_table()
            .entries()
            .iter()
            .filter(|desc| desc.label.starts_with("PPT"))
            .take(4)
            .collect()
    }
}

impl fmt::Display for AsicFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aldebaran => write!(f, "aldebaran"),
        }
    }
}

impl std::str::FromStr for AsicFamily {
    type Err = AsicParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aldebaran" | "mi200" | "mi250" | "mi250x" => Ok(Self::Aldebaran),
            _ => Err(AsicParseError {
                input: s.to_owned(),
                valid_options: Self::VALID_OPTIONS,
            }),
        }
    }
}

/// Error type for parsing [`AsicFamily`] from string.
#[derive(Debug, thiserror::Error)]
#[error("Unknown ASIC family '{input}'. Valid options: {}", valid_options.join(", "))]
pub struct AsicParseError {
    input: String,
    valid_options: &'static [&'static str],
}
