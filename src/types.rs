use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of channels reported by the sensor per reading.
pub const CHANNELS: usize = 18;

/// Channel centre wavelengths in nm, index-aligned with [`SpectralFrame`] values.
pub const WAVELENGTHS_NM: [u32; CHANNELS] = [
    410, 435, 460, 485, 510, 535, 560, 585, 610, 645, 680, 705, 730, 760, 810, 860, 900, 940,
];

/// One parsed sensor reading. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpectralFrame([f64; CHANNELS]);

impl SpectralFrame {
    pub fn new(values: [f64; CHANNELS]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; CHANNELS] {
        &self.0
    }

    /// (wavelength, intensity) pairs in channel order.
    pub fn channels(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        WAVELENGTHS_NM.iter().copied().zip(self.0.iter().copied())
    }

    /// Euclidean distance to another vector of the same shape.
    pub fn distance(&self, other: &SpectralFrame) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Comma-joined form, as the sensor sends it.
    pub fn to_line(&self) -> String {
        self.0
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Outcome of a nearest-neighbour lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Known(String),
    /// Nothing in the library is within the threshold.
    Unknown,
}

impl Identity {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Identity::Unknown)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Known(label) => f.write_str(label),
            Identity::Unknown => f.write_str("Unknown (New Object)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub identity: Identity,
    /// Distance to the nearest reference; `f64::INFINITY` when the library is empty.
    pub distance: f64,
    /// Matched reference vector. Always `None` for [`Identity::Unknown`].
    pub reference: Option<SpectralFrame>,
}

impl ClassificationResult {
    pub fn unknown(distance: f64) -> Self {
        Self {
            identity: Identity::Unknown,
            distance,
            reference: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.identity.is_unknown()
    }
}
