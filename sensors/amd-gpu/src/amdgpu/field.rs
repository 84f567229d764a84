//! Sentinel-aware formatting of scalar fields.
//!
//! Firmware marks a field it did not fill in by setting every bit at the
//! field's width. [`Reading::for_field`] is the one place that convention is
//! interpreted, using the unit and policy recorded in the field's layout
//! entry. Link speed and the accumulators are outside that rule and get
//! their own types.

use super::layout::{FieldId, FieldKind};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// "Not reported" marker for 16-bit fields.
pub const U16_UNAVAILABLE: u16 = u16::MAX;

/// "Not reported" marker for 64-bit fields.
pub const U64_UNAVAILABLE: u64 = u64::MAX;

/// Engineering unit of a sentinel-aware scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Celsius,
    Percent,
    Watts,
    Millivolts,
    Megahertz,
    Rpm,
    /// Plain count such as the PCIe lane width, printed without a suffix
    Count,
}

impl Unit {
    /// Suffix appended to the value, including its leading space.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Celsius => " C",
            Self::Percent => " %",
            Self::Watts => " W",
            Self::Millivolts => " mV",
            Self::Megahertz => " MHz",
            Self::Rpm => " RPM",
            Self::Count => "",
        }
    }
}

/// A decoded scalar: either unavailable or a value in a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Unavailable,
    Value { raw: u64, unit: Unit },
}

impl Reading {
    /// Interpret a 16-bit `raw` value, treating all-ones as unavailable.
    pub fn from_u16(raw: u16, unit: Unit) -> Self {
        if raw == U16_UNAVAILABLE {
            Self::Unavailable
        } else {
            Self::Value {
                raw: raw.into(),
                unit,
            }
        }
    }

    /// Interpret field `id` with the unit its layout entry records.
    ///
    /// Only `Sensor` entries carry the sentinel convention; any other kind
    /// is passed through as a plain count.
    pub fn for_field(id: FieldId, raw: u16) -> Self {
        match id.spec().kind {
            FieldKind::Sensor(unit) => Self::from_u16(raw, unit),
            _ => Self::Value {
                raw: raw.into(),
                unit: Unit::Count,
            },
        }
    }

    /// The reported value, if any.
    pub fn value(&self) -> Option<u64> {
        match self {
            Self::Unavailable => None,
            Self::Value { raw, .. } => Some(*raw),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value { .. })
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "N/A"),
            Self::Value { raw, unit } => write!(f, "{}{}", raw, unit.suffix()),
        }
    }
}

// Unavailable readings become `null` so JSON consumers never see 65535.
impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value() {
            Some(value) => serializer.serialize_u64(value),
            None => serializer.serialize_none(),
        }
    }
}

/// PCIe link speed, reported by firmware in tenths of GT/s.
///
/// All-ones is not treated as "unavailable" here; the value is always
/// scaled and shown next to the raw reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSpeed {
    raw: u16,
}

impl LinkSpeed {
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Transfer rate in GT/s.
    pub fn gts(self) -> f64 {
        f64::from(self.raw) / 10.0
    }
}

impl fmt::Display for LinkSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} GT/s (raw {})", self.gts(), self.raw)
    }
}

impl Serialize for LinkSpeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LinkSpeed", 2)?;
        state.serialize_field("raw", &self.raw)?;
        state.serialize_field("gts", &self.gts())?;
        state.end()
    }
}

/// Unit attached to a monotonic counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterUnit {
    /// Firmware-defined units
    Raw,
    Nanoseconds,
    /// Ticks of 10 ns
    TenNanoseconds,
}

impl CounterUnit {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Raw => "",
            Self::Nanoseconds => " ns",
            Self::TenNanoseconds => " (10ns)",
        }
    }
}

/// Accumulator or timestamp. Only the difference between two snapshots of
/// the same counter carries meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counter {
    raw: u64,
    #[serde(skip)]
    bits: u32,
    #[serde(skip)]
    unit: CounterUnit,
}

impl Counter {
    /// Counter for field `id`, sized and labelled from its layout entry.
    pub fn for_field(id: FieldId, raw: u64) -> Self {
        let spec = id.spec();
        let bits = (spec.width.bytes() * 8) as u32;
        let unit = match spec.kind {
            FieldKind::Counter(unit) => unit,
            _ => CounterUnit::Raw,
        };
        let raw = if bits >= u64::BITS {
            raw
        } else {
            raw & ((1u64 << bits) - 1)
        };
        Self { raw, bits, unit }
    }

    pub const fn raw(self) -> u64 {
        self.raw
    }

    pub const fn unit(self) -> CounterUnit {
        self.unit
    }

    /// Ticks elapsed since `earlier`, allowing for one wrap at the
    /// counter's native width.
    pub fn delta(self, earlier: Counter) -> u64 {
        let diff = self.raw.wrapping_sub(earlier.raw);
        if self.bits >= u64::BITS {
            diff
        } else {
            diff & ((1u64 << self.bits) - 1)
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.raw, self.unit.suffix())
    }
}
