use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::browse::{self, Page, PhytoQuery, SpiceQuery};
use crate::dedupe::{self, DedupeReport};
use crate::domain::BatchMode;
use crate::druglikeness::{self, DrugLikeness, RuleInput};
use crate::enrich::{BatchReport, Enricher, needs_descriptor_enrichment, needs_structure_enrichment};
use crate::error::SpiceError;
use crate::loader::{self, LoadReport, Sheet};
use crate::model::{Counts, PhytoRecord, PhytoSummary, Spice, SpiceRef};
use crate::pubchem::PubchemClient;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct SpiceDetail {
    pub spice: Spice,
    pub phytochemicals: Vec<PhytoSummary>,
}

/// What the detail flow did against PubChem for this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentOutcome {
    pub structures_attempted: bool,
    pub structures_fetched: bool,
    pub descriptors_attempted: bool,
    pub descriptors_fetched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhytoDetail {
    pub phyto: PhytoRecord,
    pub spices: Vec<SpiceRef>,
    pub drug_likeness: Option<DrugLikeness>,
    pub enrichment: EnrichmentOutcome,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<P: PubchemClient> {
    store: Store,
    enricher: Enricher<P>,
}

impl<P: PubchemClient> App<P> {
    pub fn new(enricher: Enricher<P>) -> Self {
        Self {
            store: enricher.store().clone(),
            enricher,
        }
    }

    pub fn stats(&self) -> Result<Counts, SpiceError> {
        let conn = self.store.connect()?;
        browse::counts(&conn)
    }

    pub fn list_spices(&self, query: &SpiceQuery) -> Result<Page<Spice>, SpiceError> {
        let conn = self.store.connect()?;
        browse::list_spices(&conn, query)
    }

    pub fn search_spices(&self, q: &str, limit: usize) -> Result<Vec<Spice>, SpiceError> {
        let conn = self.store.connect()?;
        browse::search_spices(&conn, q, limit)
    }

    pub fn spice_detail(&self, spice_id: i64) -> Result<SpiceDetail, SpiceError> {
        let conn = self.store.connect()?;
        let spice = browse::get_spice(&conn, spice_id)?.ok_or(SpiceError::NotFound {
            kind: "spice",
            id: spice_id,
        })?;
        let phytochemicals = browse::spice_phytochemicals(&conn, spice_id)?;
        Ok(SpiceDetail {
            spice,
            phytochemicals,
        })
    }

    pub fn list_phytochemicals(
        &self,
        query: &PhytoQuery,
    ) -> Result<Page<PhytoSummary>, SpiceError> {
        let conn = self.store.connect()?;
        browse::list_phytochemicals(&conn, query)
    }

    pub fn search_phytochemicals(
        &self,
        q: &str,
        limit: usize,
    ) -> Result<Vec<PhytoSummary>, SpiceError> {
        let conn = self.store.connect()?;
        browse::search_phytochemicals(&conn, q, limit)
    }

    /// Detail view of one phytochemical, enriching it from PubChem first when
    /// `enrich` is set and cached data is missing.
    pub fn phyto_detail(&self, phyto_id: i64, enrich: bool) -> Result<PhytoDetail, SpiceError> {
        let mut phyto = self.read_phyto(phyto_id)?;
        let mut outcome = EnrichmentOutcome::default();

        if enrich && phyto.cid.is_some() {
            if needs_structure_enrichment(phyto.structures.as_ref()) {
                outcome.structures_attempted = true;
                outcome.structures_fetched =
                    self.enricher.enrich_structures(phyto_id, phyto.cid);
                phyto = self.read_phyto(phyto_id)?;
            }
            if needs_descriptor_enrichment(phyto.descriptors.as_ref()) {
                outcome.descriptors_attempted = true;
                outcome.descriptors_fetched =
                    self.enricher.enrich_descriptors(phyto_id, phyto.cid);
                phyto = self.read_phyto(phyto_id)?;
            }
        }

        let drug_likeness = phyto
            .descriptors
            .as_ref()
            .and_then(|descriptors| druglikeness::evaluate(&RuleInput::from(descriptors)));
        let spices = {
            let conn = self.store.connect()?;
            browse::spices_for_phyto(&conn, phyto_id)?
        };

        Ok(PhytoDetail {
            phyto,
            spices,
            drug_likeness,
            enrichment: outcome,
        })
    }

    pub fn download_structures(
        &self,
        mode: BatchMode,
        limit: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, SpiceError> {
        self.enricher.run_batch(mode, limit, sink)
    }

    pub fn load_workbook(
        &self,
        path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<LoadReport, SpiceError> {
        let sheets = loader::read_workbook(path)?;
        self.load_sheets(&sheets, sink)
    }

    /// Creates the database when it does not exist yet.
    pub fn load_sheets(
        &self,
        sheets: &[Sheet],
        sink: &dyn ProgressSink,
    ) -> Result<LoadReport, SpiceError> {
        let mut conn = self.store.create()?;
        loader::load_sheets(&mut conn, sheets, sink)
    }

    pub fn dedupe(&self, sink: &dyn ProgressSink) -> Result<DedupeReport, SpiceError> {
        let mut conn = self.store.connect()?;
        dedupe::merge_duplicates(&mut conn, sink)
    }

    fn read_phyto(&self, phyto_id: i64) -> Result<PhytoRecord, SpiceError> {
        let conn = self.store.connect()?;
        browse::load_phyto(&conn, phyto_id)?.ok_or(SpiceError::NotFound {
            kind: "phytochemical",
            id: phyto_id,
        })
    }
}
