use std::fmt::Write as _;
use std::io::{self, Write};

use serde::Serialize;

use crate::app::{PhytoDetail, ProgressEvent, ProgressSink, SpiceDetail};
use crate::browse::Page;
use crate::dedupe::DedupeReport;
use crate::enrich::BatchReport;
use crate::loader::LoadReport;
use crate::model::{Counts, PhytoSummary, Spice};

const NOT_AVAILABLE: &str = "not yet available";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable rendering; progress goes to stderr.
pub struct TextOutput;

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("... {} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("... {}", event.message),
        }
    }
}

impl TextOutput {
    pub fn counts(counts: &Counts) -> String {
        format!(
            "spices: {}\nphytochemicals: {}\nlinks: {}\n",
            counts.spices, counts.phytochemicals, counts.links
        )
    }

    pub fn spices(spices: &[Spice]) -> String {
        let mut out = String::new();
        for spice in spices {
            let _ = writeln!(
                out,
                "{:>6}  {}  {}",
                spice.spice_id,
                spice.spice_name,
                spice.botanical_name.as_deref().unwrap_or("-")
            );
        }
        out
    }

    pub fn spice_page(page: &Page<Spice>) -> String {
        let mut out = Self::spices(&page.items);
        let _ = writeln!(out, "{}", page_footer(page));
        out
    }

    pub fn phytos(items: &[PhytoSummary]) -> String {
        let mut out = String::new();
        for item in items {
            let _ = write!(
                out,
                "{:>6}  {}  CID {}  2D:{} 3D:{}",
                item.phyto_id,
                item.phyto_name,
                item.cid
                    .map(|cid| cid.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                yes_no(item.has_2d),
                yes_no(item.has_3d)
            );
            if let Some(count) = item.spice_count {
                let _ = write!(out, "  spices:{count}");
            }
            out.push('\n');
        }
        out
    }

    pub fn phyto_page(page: &Page<PhytoSummary>) -> String {
        let mut out = Self::phytos(&page.items);
        let _ = writeln!(out, "{}", page_footer(page));
        out
    }

    pub fn spice_detail(detail: &SpiceDetail) -> String {
        let mut out = format!(
            "{} ({})\n",
            detail.spice.spice_name,
            detail.spice.botanical_name.as_deref().unwrap_or("-")
        );
        out.push_str(&Self::phytos(&detail.phytochemicals));
        out
    }

    pub fn phyto_detail(detail: &PhytoDetail) -> String {
        let phyto = &detail.phyto;
        let mut out = String::new();
        let _ = writeln!(out, "{} (id {})", phyto.phyto_name, phyto.phyto_id);
        let _ = writeln!(
            out,
            "CID: {}",
            phyto
                .cid
                .map(|cid| cid.to_string())
                .unwrap_or_else(|| "-".to_string())
        );

        out.push_str("\nStructures\n");
        match &phyto.structures {
            Some(structures) if structures.has_any_path() => {
                let _ = writeln!(out, "  2D SDF: {}", or_na(structures.sdf_2d_path.as_deref()));
                let _ = writeln!(out, "  3D SDF: {}", or_na(structures.sdf_3d_path.as_deref()));
                let _ = writeln!(out, "  PNG:    {}", or_na(structures.png_2d_path.as_deref()));
            }
            _ => {
                let _ = writeln!(out, "  {NOT_AVAILABLE}");
            }
        }

        out.push_str("\nDescriptors\n");
        match &phyto.descriptors {
            Some(d) => {
                let rows: [(&str, Option<String>); 15] = [
                    ("Formula", d.molecular_formula.clone()),
                    ("Weight", d.molecular_weight.map(|v| format!("{v:.2}"))),
                    ("XLogP", d.xlogp.map(|v| v.to_string())),
                    ("TPSA", d.tpsa.map(|v| v.to_string())),
                    ("HBD", d.hbd.map(|v| v.to_string())),
                    ("HBA", d.hba.map(|v| v.to_string())),
                    ("Rotatable bonds", d.rotatable_bonds.map(|v| v.to_string())),
                    ("Heavy atoms", d.heavy_atom_count.map(|v| v.to_string())),
                    ("Complexity", d.complexity.map(|v| v.to_string())),
                    ("Charge", d.charge.map(|v| v.to_string())),
                    ("SMILES", d.smiles.clone()),
                    ("Isomeric SMILES", d.isomeric_smiles.clone()),
                    ("InChI", d.inchi.clone()),
                    ("InChIKey", d.inchikey.clone()),
                    ("IUPAC name", d.iupac_name.clone()),
                ];
                for (label, value) in rows {
                    let _ = writeln!(out, "  {label}: {}", or_na(value.as_deref()));
                }
            }
            None => {
                let _ = writeln!(out, "  {NOT_AVAILABLE}");
            }
        }

        out.push_str("\nDrug-likeness\n");
        match &detail.drug_likeness {
            Some(report) => {
                for rule in &report.rules {
                    let verdict = if rule.pass { "pass" } else { "fail" };
                    let _ = write!(out, "  {:<9} {verdict}", rule.name);
                    if !rule.fails.is_empty() {
                        let _ = write!(out, " ({})", rule.fails.join(", "));
                    }
                    out.push('\n');
                }
            }
            None => {
                let _ = writeln!(out, "  {NOT_AVAILABLE}");
            }
        }

        out.push_str("\nFound in\n");
        for spice in &detail.spices {
            let _ = writeln!(out, "  {} (id {})", spice.spice_name, spice.spice_id);
        }
        out
    }

    pub fn batch(report: &BatchReport) -> String {
        format!(
            "mode: {}\nattempted: {}\nsucceeded: {}\ndownloaded: 2D SDF={}, 3D SDF={}, PNG={}\n",
            report.mode, report.attempted, report.succeeded, report.sdf_2d, report.sdf_3d, report.png
        )
    }

    pub fn load(report: &LoadReport) -> String {
        format!(
            "rows processed: {}\nspices: {}\nphytochemicals: {}\nlinks: {}\nwith CID: {}\n",
            report.rows_processed, report.spices, report.phytochemicals, report.links, report.with_cid
        )
    }

    pub fn dedupe(report: &DedupeReport) -> String {
        let mut out = String::new();
        for group in &report.groups {
            let _ = writeln!(
                out,
                "{}: kept {}, merged {:?}",
                group.name, group.keeper, group.merged
            );
        }
        let _ = writeln!(
            out,
            "{} duplicate names, {} rows removed",
            report.groups.len(),
            report.removed
        );
        out
    }

    pub fn print(text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes())?;
        Ok(())
    }
}

fn page_footer<T>(page: &Page<T>) -> String {
    format!(
        "page {}/{} ({} total, {} per page)",
        page.page,
        page.pages.max(1),
        page.total,
        page.per_page
    )
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or(NOT_AVAILABLE)
}
