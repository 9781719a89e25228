use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SpiceError;

/// PubChem compound identifier (CID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompoundId(i64);

impl CompoundId {
    pub fn new(value: i64) -> Result<Self, SpiceError> {
        if value <= 0 {
            return Err(SpiceError::InvalidCompoundId(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CompoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompoundId {
    type Err = SpiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let trimmed = trimmed
            .strip_prefix("CID_")
            .or_else(|| trimmed.strip_prefix("CID:"))
            .unwrap_or(trimmed);
        let parsed = trimmed
            .parse::<i64>()
            .map_err(|_| SpiceError::InvalidCompoundId(value.to_string()))?;
        Self::new(parsed).map_err(|_| SpiceError::InvalidCompoundId(value.to_string()))
    }
}

/// One of the three structure files kept per compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Sdf2d,
    Sdf3d,
    Png,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Sdf2d, ArtifactKind::Sdf3d, ArtifactKind::Png];

    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Sdf2d => "sdf2d",
            ArtifactKind::Sdf3d => "sdf3d",
            ArtifactKind::Png => "png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Sdf2d | ArtifactKind::Sdf3d => "sdf",
            ArtifactKind::Png => "png",
        }
    }

    /// Path segment appended to `compound/CID/{cid}/` on PUG REST.
    pub fn pubchem_operation(self) -> &'static str {
        match self {
            ArtifactKind::Sdf2d => "SDF?record_type=2d",
            ArtifactKind::Sdf3d => "SDF?record_type=3d",
            ArtifactKind::Png => "PNG",
        }
    }

    pub fn file_name(self, cid: CompoundId) -> String {
        format!("CID_{cid}.{}", self.extension())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SpiceSort {
    #[default]
    NameAsc,
    NameDesc,
}

impl SpiceSort {
    pub fn order_by(self) -> &'static str {
        match self {
            SpiceSort::NameAsc => "spice_name ASC",
            SpiceSort::NameDesc => "spice_name DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PhytoSort {
    #[default]
    NameAsc,
    NameDesc,
    CidAsc,
    CidDesc,
    SpiceCountDesc,
}

impl PhytoSort {
    pub fn order_by(self) -> &'static str {
        match self {
            PhytoSort::NameAsc => "p.phyto_name ASC",
            PhytoSort::NameDesc => "p.phyto_name DESC",
            PhytoSort::CidAsc => "p.cid ASC",
            PhytoSort::CidDesc => "p.cid DESC",
            PhytoSort::SpiceCountDesc => "spice_count DESC",
        }
    }
}

/// Selection rule for the batch structure downloader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Compounds with no structure file recorded at all.
    #[default]
    Missing,
    /// Every compound with a CID, re-downloading all three files.
    All,
    /// Compounds that have 3D geometry but lack the 2D SDF or the PNG.
    #[value(name = "backfill2d")]
    Backfill2d,
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchMode::Missing => write!(f, "missing"),
            BatchMode::All => write!(f, "all"),
            BatchMode::Backfill2d => write!(f, "backfill2d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_compound_id_valid() {
        let cid: CompoundId = " 2758 ".parse().unwrap();
        assert_eq!(cid.get(), 2758);
        let prefixed: CompoundId = "CID_702".parse().unwrap();
        assert_eq!(prefixed.get(), 702);
    }

    #[test]
    fn parse_compound_id_invalid() {
        let err = "abc".parse::<CompoundId>().unwrap_err();
        assert_matches!(err, SpiceError::InvalidCompoundId(_));
        assert_matches!("0".parse::<CompoundId>(), Err(SpiceError::InvalidCompoundId(_)));
    }

    #[test]
    fn artifact_file_names() {
        let cid = CompoundId::new(2758).unwrap();
        assert_eq!(ArtifactKind::Sdf2d.file_name(cid), "CID_2758.sdf");
        assert_eq!(ArtifactKind::Png.file_name(cid), "CID_2758.png");
        assert_eq!(ArtifactKind::Sdf3d.pubchem_operation(), "SDF?record_type=3d");
    }
}
