//! Rule-of-thumb drug-likeness filters over a compound's descriptors.
//!
//! Each criterion is skipped when its descriptor is unknown, so missing data
//! can only make a compound look better, never fail it.

use serde::Serialize;

use crate::model::DescriptorSet;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuleInput {
    pub molecular_weight: Option<f64>,
    pub xlogp: Option<f64>,
    pub tpsa: Option<f64>,
    pub hbd: Option<i64>,
    pub hba: Option<i64>,
    pub rotatable_bonds: Option<i64>,
}

impl From<&DescriptorSet> for RuleInput {
    fn from(set: &DescriptorSet) -> Self {
        Self {
            molecular_weight: set.molecular_weight,
            xlogp: set.xlogp,
            tpsa: set.tpsa,
            hbd: set.hbd,
            hba: set.hba,
            rotatable_bonds: set.rotatable_bonds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub name: &'static str,
    pub note: &'static str,
    pub pass: bool,
    pub fail_count: usize,
    pub fails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrugLikeness {
    pub rules: Vec<RuleResult>,
}

impl DrugLikeness {
    pub fn rule(&self, name: &str) -> Option<&RuleResult> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

struct RuleBuilder {
    name: &'static str,
    note: &'static str,
    fails: Vec<String>,
}

impl RuleBuilder {
    fn new(name: &'static str, note: &'static str) -> Self {
        Self {
            name,
            note,
            fails: Vec::new(),
        }
    }

    fn above(mut self, value: Option<f64>, limit: f64, label: &str) -> Self {
        if value.is_some_and(|value| value > limit) {
            self.fails.push(label.to_string());
        }
        self
    }

    fn above_count(self, value: Option<i64>, limit: f64, label: &str) -> Self {
        self.above(value.map(|value| value as f64), limit, label)
    }

    fn outside(mut self, value: Option<f64>, low: f64, high: f64, label: &str) -> Self {
        if value.is_some_and(|value| value < low || value > high) {
            self.fails.push(label.to_string());
        }
        self
    }

    fn finish(self) -> RuleResult {
        RuleResult {
            name: self.name,
            note: self.note,
            pass: self.fails.is_empty(),
            fail_count: self.fails.len(),
            fails: self.fails,
        }
    }
}

/// Lipinski, Veber, Ghose, Egan and Muegge, in that order.
///
/// Returns `None` when the molecular weight is unknown.
pub fn evaluate(input: &RuleInput) -> Option<DrugLikeness> {
    let mw = input.molecular_weight?;
    let mw = Some(mw);

    let lipinski = RuleBuilder::new("Lipinski", "Rule of 5")
        .above(mw, 500.0, "MW > 500")
        .above(input.xlogp, 5.0, "XLogP > 5")
        .above_count(input.hbd, 5.0, "HBD > 5")
        .above_count(input.hba, 10.0, "HBA > 10")
        .finish();

    let veber = RuleBuilder::new("Veber", "Oral bioavailability")
        .above_count(input.rotatable_bonds, 10.0, "RotB > 10")
        .above(input.tpsa, 140.0, "TPSA > 140")
        .finish();

    let ghose = RuleBuilder::new("Ghose", "Drug-likeness (Ghose)")
        .outside(mw, 160.0, 480.0, "MW not in 160-480")
        .outside(input.xlogp, -0.4, 5.6, "XLogP not in -0.4-5.6")
        .finish();

    let egan = RuleBuilder::new("Egan", "Absorption/permeation")
        .above(input.tpsa, 131.6, "TPSA > 131.6")
        .above(input.xlogp, 5.88, "XLogP > 5.88")
        .finish();

    let muegge = RuleBuilder::new("Muegge", "Drug-likeness (Muegge)")
        .outside(mw, 200.0, 600.0, "MW not in 200-600")
        .above(input.xlogp, 5.0, "XLogP > 5")
        .above(input.tpsa, 150.0, "TPSA > 150")
        .above_count(input.hbd, 5.0, "HBD > 5")
        .above_count(input.hba, 10.0, "HBA > 10")
        .above_count(input.rotatable_bonds, 15.0, "RotB > 15")
        .finish();

    Some(DrugLikeness {
        rules: vec![lipinski, veber, ghose, egan, muegge],
    })
}
