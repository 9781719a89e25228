use spicebase::app::{EnrichmentOutcome, PhytoDetail};
use spicebase::domain::CompoundId;
use spicebase::druglikeness::{RuleInput, evaluate};
use spicebase::model::{DescriptorSet, PhytoRecord, SpiceRef, StructureRecord};
use spicebase::output::TextOutput;

fn detail(structures: Option<StructureRecord>, descriptors: Option<DescriptorSet>) -> PhytoDetail {
    let drug_likeness = descriptors
        .as_ref()
        .and_then(|set| evaluate(&RuleInput::from(set)));
    PhytoDetail {
        phyto: PhytoRecord {
            phyto_id: 7,
            phyto_name: "Eugenol".to_string(),
            cid: Some(CompoundId::new(3314).unwrap()),
            structures,
            descriptors,
        },
        spices: vec![SpiceRef {
            spice_id: 2,
            spice_name: "Clove".to_string(),
        }],
        drug_likeness,
        enrichment: EnrichmentOutcome::default(),
    }
}

#[test]
fn unenriched_sections_read_not_yet_available() {
    let text = TextOutput::phyto_detail(&detail(Some(StructureRecord::default()), None));
    assert!(text.contains("Eugenol (id 7)"));
    assert!(text.contains("CID: 3314"));
    assert_eq!(text.matches("not yet available").count(), 3);
    assert!(text.contains("  Clove (id 2)"));
}

#[test]
fn enriched_detail_shows_paths_and_rule_failures() {
    let structures = StructureRecord {
        has_2d: true,
        has_3d: false,
        sdf_2d_path: Some("structures/sdf2d/CID_3314.sdf".to_string()),
        sdf_3d_path: None,
        png_2d_path: Some("structures/png/CID_3314.png".to_string()),
    };
    let descriptors = DescriptorSet {
        molecular_weight: Some(600.0),
        xlogp: Some(6.0),
        hbd: Some(2),
        hba: Some(4),
        ..DescriptorSet::default()
    };
    let text = TextOutput::phyto_detail(&detail(Some(structures), Some(descriptors)));

    assert!(text.contains("2D SDF: structures/sdf2d/CID_3314.sdf"));
    assert!(text.contains("3D SDF: not yet available"));
    assert!(text.contains("Weight: 600.00"));
    assert!(text.contains("Lipinski  fail (MW > 500, XLogP > 5)"));
}

#[test]
fn detail_serializes_to_json() {
    let value = serde_json::to_value(detail(None, None)).unwrap();
    assert_eq!(value["phyto"]["cid"], 3314);
    assert!(value["phyto"]["structures"].is_null());
    assert!(value["drug_likeness"].is_null());
    assert_eq!(value["spices"][0]["spice_name"], "Clove");
}
