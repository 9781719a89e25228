use serde::Serialize;

use crate::domain::CompoundId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spice {
    pub spice_id: i64,
    pub spice_name: String,
    pub botanical_name: Option<String>,
}

/// Phytochemical row as listed in browse results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhytoSummary {
    pub phyto_id: i64,
    pub phyto_name: String,
    pub cid: Option<CompoundId>,
    pub has_2d: bool,
    pub has_3d: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spice_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureRecord {
    pub has_2d: bool,
    pub has_3d: bool,
    pub sdf_2d_path: Option<String>,
    pub sdf_3d_path: Option<String>,
    pub png_2d_path: Option<String>,
}

impl StructureRecord {
    pub fn has_any_path(&self) -> bool {
        self.sdf_2d_path.is_some() || self.sdf_3d_path.is_some() || self.png_2d_path.is_some()
    }
}

/// Chemical descriptors of one compound as reported by PubChem.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DescriptorSet {
    pub molecular_formula: Option<String>,
    pub molecular_weight: Option<f64>,
    pub xlogp: Option<f64>,
    pub tpsa: Option<f64>,
    pub hbd: Option<i64>,
    pub hba: Option<i64>,
    pub rotatable_bonds: Option<i64>,
    pub heavy_atom_count: Option<i64>,
    pub complexity: Option<f64>,
    pub charge: Option<i64>,
    pub smiles: Option<String>,
    pub isomeric_smiles: Option<String>,
    pub inchi: Option<String>,
    pub inchikey: Option<String>,
    pub iupac_name: Option<String>,
}

/// Phytochemical joined with its (optional) structure and descriptor rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhytoRecord {
    pub phyto_id: i64,
    pub phyto_name: String,
    pub cid: Option<CompoundId>,
    pub structures: Option<StructureRecord>,
    pub descriptors: Option<DescriptorSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpiceRef {
    pub spice_id: i64,
    pub spice_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub spices: i64,
    pub phytochemicals: i64,
    pub links: i64,
}
