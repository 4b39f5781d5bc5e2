use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ideal c/a ratio of close-packed hexagonal stacking, `sqrt(8/3)`.
pub const IDEAL_CA_RATIO: f64 = 1.632_993_161_855_452;

static FAMILY_ALIASES: Map<&'static str, LatticeFamily> = phf_map! {
    "sc" => LatticeFamily::Sc,
    "simple-cubic" => LatticeFamily::Sc,
    "fcc" => LatticeFamily::Fcc,
    "bcc" => LatticeFamily::Bcc,
    "hcp" => LatticeFamily::Hcp,
    "cubic-diamond" => LatticeFamily::CubicDiamond,
    "diamond" => LatticeFamily::CubicDiamond,
    "hex-diamond" => LatticeFamily::HexDiamond,
    "hexagonal-diamond" => LatticeFamily::HexDiamond,
    "lonsdaleite" => LatticeFamily::HexDiamond,
};

/// Errors raised while resolving or constructing a reference lattice.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LatticeError {
    #[error("Unknown lattice family '{0}'. Expected one of: SC, FCC, BCC, HCP, CUBIC_DIAMOND, HEX_DIAMOND")]
    UnknownFamily(String),
    #[error("Lattice constant must be positive and finite, got {0}")]
    InvalidLatticeConstant(f64),
    #[error("Axial (c/a) ratio must be positive and finite, got {0}")]
    InvalidAxialRatio(f64),
}

/// The crystal lattice families the reference model can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatticeFamily {
    Sc,
    Fcc,
    Bcc,
    Hcp,
    CubicDiamond,
    HexDiamond,
}

impl LatticeFamily {
    pub const ALL: [LatticeFamily; 6] = [
        LatticeFamily::Sc,
        LatticeFamily::Fcc,
        LatticeFamily::Bcc,
        LatticeFamily::Hcp,
        LatticeFamily::CubicDiamond,
        LatticeFamily::HexDiamond,
    ];

    /// Hexagonal families carry a meaningful c/a ratio.
    pub fn is_hexagonal(&self) -> bool {
        matches!(self, LatticeFamily::Hcp | LatticeFamily::HexDiamond)
    }

    /// The c/a ratio used when none is configured.
    pub fn default_ca_ratio(&self) -> f64 {
        if self.is_hexagonal() {
            IDEAL_CA_RATIO
        } else {
            1.0
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LatticeFamily::Sc => "SC",
            LatticeFamily::Fcc => "FCC",
            LatticeFamily::Bcc => "BCC",
            LatticeFamily::Hcp => "HCP",
            LatticeFamily::CubicDiamond => "CUBIC_DIAMOND",
            LatticeFamily::HexDiamond => "HEX_DIAMOND",
        }
    }
}

impl fmt::Display for LatticeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LatticeFamily {
    type Err = LatticeError;

    /// Parses a family name case-insensitively; `_` and `-` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        FAMILY_ALIASES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| LatticeError::UnknownFamily(s.to_string()))
    }
}

/// Per-atom structure type as reported by structure identification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum StructureType {
    /// No crystalline structure could be assigned.
    #[default]
    Other,
    Sc,
    Fcc,
    Bcc,
    Hcp,
    CubicDiamond,
    HexDiamond,
}

impl StructureType {
    pub fn is_crystalline(&self) -> bool {
        !matches!(self, StructureType::Other)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StructureType::Other => "OTHER",
            StructureType::Sc => "SC",
            StructureType::Fcc => "FCC",
            StructureType::Bcc => "BCC",
            StructureType::Hcp => "HCP",
            StructureType::CubicDiamond => "CUBIC_DIAMOND",
            StructureType::HexDiamond => "HEX_DIAMOND",
        }
    }
}

impl From<LatticeFamily> for StructureType {
    fn from(family: LatticeFamily) -> Self {
        match family {
            LatticeFamily::Sc => StructureType::Sc,
            LatticeFamily::Fcc => StructureType::Fcc,
            LatticeFamily::Bcc => StructureType::Bcc,
            LatticeFamily::Hcp => StructureType::Hcp,
            LatticeFamily::CubicDiamond => StructureType::CubicDiamond,
            LatticeFamily::HexDiamond => StructureType::HexDiamond,
        }
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
