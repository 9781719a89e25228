use rusqlite::{Connection, params};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::EnrichSettings;
use crate::domain::{ArtifactKind, BatchMode, CompoundId};
use crate::error::SpiceError;
use crate::model::{DescriptorSet, StructureRecord};
use crate::pubchem::PubchemClient;
use crate::retry::{Sleeper, ThreadSleeper};
use crate::store::Store;

/// Structure enrichment runs only when no structure file is recorded at all.
pub fn needs_structure_enrichment(record: Option<&StructureRecord>) -> bool {
    record.map_or(true, |record| !record.has_any_path())
}

/// Any one of weight, SMILES or InChIKey missing triggers a full descriptor re-fetch.
pub fn needs_descriptor_enrichment(record: Option<&DescriptorSet>) -> bool {
    record.map_or(true, |record| {
        record.molecular_weight.is_none() || record.smiles.is_none() || record.inchikey.is_none()
    })
}

/// Which structure files were obtained for one compound in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureUpdate {
    pub phyto_id: i64,
    pub cid: CompoundId,
    pub sdf_2d: bool,
    pub sdf_3d: bool,
    pub png: bool,
}

impl StructureUpdate {
    pub fn any(&self) -> bool {
        self.sdf_2d || self.sdf_3d || self.png
    }

    fn mark(&mut self, kind: ArtifactKind) {
        match kind {
            ArtifactKind::Sdf2d => self.sdf_2d = true,
            ArtifactKind::Sdf3d => self.sdf_3d = true,
            ArtifactKind::Png => self.png = true,
        }
    }
}

/// Ensures the structure row exists, then records only the files fetched in
/// `update`. Paths and flags already present are never cleared.
pub fn upsert_structure_paths(conn: &Connection, update: &StructureUpdate) -> Result<(), SpiceError> {
    conn.execute(
        "INSERT OR IGNORE INTO structures (phyto_id, has_2d, has_3d, sdf_2d_path, sdf_3d_path, png_2d_path)
         VALUES (?1, 0, 0, NULL, NULL, NULL)",
        params![update.phyto_id],
    )?;
    if update.sdf_2d {
        conn.execute(
            "UPDATE structures SET has_2d = 1, sdf_2d_path = ?1 WHERE phyto_id = ?2",
            params![
                Store::artifact_relative(ArtifactKind::Sdf2d, update.cid),
                update.phyto_id
            ],
        )?;
    }
    if update.sdf_3d {
        conn.execute(
            "UPDATE structures SET has_3d = 1, sdf_3d_path = ?1 WHERE phyto_id = ?2",
            params![
                Store::artifact_relative(ArtifactKind::Sdf3d, update.cid),
                update.phyto_id
            ],
        )?;
    }
    if update.png {
        conn.execute(
            "UPDATE structures SET png_2d_path = ?1 WHERE phyto_id = ?2",
            params![
                Store::artifact_relative(ArtifactKind::Png, update.cid),
                update.phyto_id
            ],
        )?;
    }
    Ok(())
}

/// Inserts or refreshes the descriptor row. Fetched values win; a field the
/// fetch left empty keeps whatever the row already had.
pub fn upsert_descriptors(
    conn: &Connection,
    phyto_id: i64,
    descriptors: &DescriptorSet,
) -> Result<(), SpiceError> {
    conn.execute(
        "INSERT INTO descriptors (
            phyto_id,
            molecular_formula, molecular_weight, xlogp, tpsa,
            hbd, hba, rotatable_bonds, heavy_atom_count,
            complexity, charge,
            smiles, isomeric_smiles, inchi, inchikey, iupac_name
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(phyto_id) DO UPDATE SET
            molecular_formula = COALESCE(excluded.molecular_formula, descriptors.molecular_formula),
            molecular_weight = COALESCE(excluded.molecular_weight, descriptors.molecular_weight),
            xlogp = COALESCE(excluded.xlogp, descriptors.xlogp),
            tpsa = COALESCE(excluded.tpsa, descriptors.tpsa),
            hbd = COALESCE(excluded.hbd, descriptors.hbd),
            hba = COALESCE(excluded.hba, descriptors.hba),
            rotatable_bonds = COALESCE(excluded.rotatable_bonds, descriptors.rotatable_bonds),
            heavy_atom_count = COALESCE(excluded.heavy_atom_count, descriptors.heavy_atom_count),
            complexity = COALESCE(excluded.complexity, descriptors.complexity),
            charge = COALESCE(excluded.charge, descriptors.charge),
            smiles = COALESCE(excluded.smiles, descriptors.smiles),
            isomeric_smiles = COALESCE(excluded.isomeric_smiles, descriptors.isomeric_smiles),
            inchi = COALESCE(excluded.inchi, descriptors.inchi),
            inchikey = COALESCE(excluded.inchikey, descriptors.inchikey),
            iupac_name = COALESCE(excluded.iupac_name, descriptors.iupac_name)",
        params![
            phyto_id,
            descriptors.molecular_formula,
            descriptors.molecular_weight,
            descriptors.xlogp,
            descriptors.tpsa,
            descriptors.hbd,
            descriptors.hba,
            descriptors.rotatable_bonds,
            descriptors.heavy_atom_count,
            descriptors.complexity,
            descriptors.charge,
            descriptors.smiles,
            descriptors.isomeric_smiles,
            descriptors.inchi,
            descriptors.inchikey,
            descriptors.iupac_name,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCandidate {
    pub phyto_id: i64,
    pub cid: CompoundId,
    pub kinds: Vec<ArtifactKind>,
}

/// Phytochemicals eligible for a batch run, ordered by CID, at most `limit`.
pub fn select_batch_candidates(
    conn: &Connection,
    mode: BatchMode,
    limit: Option<usize>,
) -> Result<Vec<BatchCandidate>, SpiceError> {
    let filter = match mode {
        BatchMode::Missing => {
            "s.phyto_id IS NULL
             OR (s.sdf_2d_path IS NULL AND s.sdf_3d_path IS NULL AND s.png_2d_path IS NULL)"
        }
        BatchMode::All => "1 = 1",
        BatchMode::Backfill2d => {
            "COALESCE(s.has_3d, 0) = 1 AND (s.sdf_2d_path IS NULL OR s.png_2d_path IS NULL)"
        }
    };
    let sql = format!(
        "SELECT p.phyto_id, p.cid, s.sdf_2d_path IS NULL, s.png_2d_path IS NULL
         FROM phytochemicals p
         LEFT JOIN structures s ON s.phyto_id = p.phyto_id
         WHERE p.cid IS NOT NULL AND ({filter})
         ORDER BY p.cid
         LIMIT ?1"
    );
    let limit = limit
        .map(|value| i64::try_from(value).unwrap_or(i64::MAX))
        .unwrap_or(-1);

    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map(params![limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, bool>(2)?,
            row.get::<_, bool>(3)?,
        ))
    })?;

    let mut candidates = Vec::new();
    for row in rows {
        let (phyto_id, cid, missing_2d, missing_png) = row?;
        let Ok(cid) = CompoundId::new(cid) else {
            tracing::warn!(phyto_id, cid, "skipping invalid compound id");
            continue;
        };
        let kinds = match mode {
            BatchMode::Missing | BatchMode::All => ArtifactKind::ALL.to_vec(),
            BatchMode::Backfill2d => {
                let mut kinds = Vec::new();
                if missing_2d {
                    kinds.push(ArtifactKind::Sdf2d);
                }
                if missing_png {
                    kinds.push(ArtifactKind::Png);
                }
                kinds
            }
        };
        candidates.push(BatchCandidate {
            phyto_id,
            cid,
            kinds,
        });
    }
    Ok(candidates)
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub mode: BatchMode,
    pub requested: Option<usize>,
    pub attempted: usize,
    pub succeeded: usize,
    pub sdf_2d: usize,
    pub sdf_3d: usize,
    pub png: usize,
    pub started_at: String,
    pub finished_at: String,
}

/// Decides when PubChem must be consulted and records what comes back.
pub struct Enricher<P: PubchemClient> {
    store: Store,
    client: P,
    settings: EnrichSettings,
    sleeper: Box<dyn Sleeper>,
}

impl<P: PubchemClient> Enricher<P> {
    pub fn new(store: Store, client: P, settings: EnrichSettings) -> Self {
        Self::with_sleeper(store, client, settings, ThreadSleeper)
    }

    pub fn with_sleeper(
        store: Store,
        client: P,
        settings: EnrichSettings,
        sleeper: impl Sleeper + 'static,
    ) -> Self {
        let settings = EnrichSettings {
            commit_every: settings.commit_every.max(1),
            ..settings
        };
        Self {
            store,
            client,
            settings,
            sleeper: Box::new(sleeper),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Downloads the 2D SDF, 3D SDF and PNG for `cid` and records whichever
    /// succeeded. Returns whether at least one file is now recorded.
    ///
    /// Never fails: a local filesystem or database problem is logged and
    /// reported as `false`, like a failed download.
    pub fn enrich_structures(&self, phyto_id: i64, cid: Option<CompoundId>) -> bool {
        let Some(cid) = cid else {
            return false;
        };
        if let Err(err) = self.store.ensure_artifact_dirs() {
            tracing::warn!(phyto_id, %cid, "cannot prepare structure directories: {err}");
            return false;
        }
        tracing::info!(phyto_id, %cid, "fetching structure files");

        let update = self.download(phyto_id, cid, &ArtifactKind::ALL, false);
        if !update.any() {
            tracing::warn!(phyto_id, %cid, "no structure file could be downloaded");
            return false;
        }

        let recorded = self
            .store
            .connect()
            .and_then(|conn| upsert_structure_paths(&conn, &update));
        if let Err(err) = recorded {
            tracing::warn!(phyto_id, %cid, "recording structure paths failed: {err}");
            return false;
        }
        self.sleeper.sleep(self.settings.courtesy_delay);
        true
    }

    /// Fetches the full descriptor set for `cid` and upserts it. A failed
    /// fetch or write is logged and reported as `false`.
    pub fn enrich_descriptors(&self, phyto_id: i64, cid: Option<CompoundId>) -> bool {
        let Some(cid) = cid else {
            return false;
        };
        tracing::info!(phyto_id, %cid, "fetching descriptors");

        let descriptors = match self.client.fetch_descriptors(cid) {
            Ok(descriptors) => descriptors,
            Err(err) => {
                tracing::warn!(phyto_id, %cid, "descriptor fetch failed: {err}");
                return false;
            }
        };
        tracing::debug!(
            phyto_id,
            %cid,
            smiles = ?descriptors.smiles,
            inchikey = ?descriptors.inchikey,
            "descriptors fetched"
        );

        let recorded = self
            .store
            .connect()
            .and_then(|conn| upsert_descriptors(&conn, phyto_id, &descriptors));
        if let Err(err) = recorded {
            tracing::warn!(phyto_id, %cid, "recording descriptors failed: {err}");
            return false;
        }
        self.sleeper.sleep(self.settings.courtesy_delay);
        true
    }

    /// Sequential structure download over the candidates of `mode`.
    ///
    /// Path updates are buffered and written in one transaction every
    /// `commit_every` items, so no transaction is open during a download.
    pub fn run_batch(
        &self,
        mode: BatchMode,
        limit: Option<usize>,
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, SpiceError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let candidates = {
            let conn = self.store.connect()?;
            select_batch_candidates(&conn, mode, limit)?
        };
        self.store.ensure_artifact_dirs()?;
        sink.event(ProgressEvent {
            message: format!("mode={mode}; {} candidates", candidates.len()),
            elapsed: None,
        });

        let mut report = BatchReport {
            mode,
            requested: limit,
            attempted: 0,
            succeeded: 0,
            sdf_2d: 0,
            sdf_3d: 0,
            png: 0,
            started_at,
            finished_at: String::new(),
        };
        let mut pending = Vec::new();
        let timer = std::time::Instant::now();

        for (index, candidate) in candidates.iter().enumerate() {
            if index > 0 {
                self.sleeper.sleep(self.settings.item_delay);
            }
            let update = self.download(
                candidate.phyto_id,
                candidate.cid,
                &candidate.kinds,
                mode == BatchMode::All,
            );
            report.attempted += 1;
            report.sdf_2d += usize::from(update.sdf_2d);
            report.sdf_3d += usize::from(update.sdf_3d);
            report.png += usize::from(update.png);
            if update.any() {
                report.succeeded += 1;
                pending.push(update);
                self.sleeper.sleep(self.settings.courtesy_delay);
            }

            if report.attempted % self.settings.commit_every == 0 {
                self.flush(&mut pending)?;
                sink.event(ProgressEvent {
                    message: format!("progress: {}/{}", report.attempted, candidates.len()),
                    elapsed: Some(timer.elapsed()),
                });
            }
        }
        self.flush(&mut pending)?;

        report.finished_at = chrono::Utc::now().to_rfc3339();
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            "batch finished"
        );
        Ok(report)
    }

    fn download(
        &self,
        phyto_id: i64,
        cid: CompoundId,
        kinds: &[ArtifactKind],
        overwrite: bool,
    ) -> StructureUpdate {
        let mut update = StructureUpdate {
            phyto_id,
            cid,
            sdf_2d: false,
            sdf_3d: false,
            png: false,
        };
        for kind in kinds {
            let destination = self.store.artifact_path(*kind, cid);
            if self
                .client
                .fetch_artifact(cid, *kind, &destination, overwrite)
            {
                update.mark(*kind);
            } else {
                tracing::warn!(phyto_id, %cid, %kind, "download failed");
            }
        }
        update
    }

    fn flush(&self, pending: &mut Vec<StructureUpdate>) -> Result<(), SpiceError> {
        if pending.is_empty() {
            return Ok(());
        }
        let mut conn = self.store.connect()?;
        let tx = conn.transaction()?;
        for update in pending.iter() {
            upsert_structure_paths(&tx, update)?;
        }
        tx.commit()?;
        pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_check_requires_all_paths_absent() {
        assert!(needs_structure_enrichment(None));
        assert!(needs_structure_enrichment(Some(&StructureRecord::default())));
        let partial = StructureRecord {
            png_2d_path: Some("structures/png/CID_1.png".to_string()),
            ..StructureRecord::default()
        };
        assert!(!needs_structure_enrichment(Some(&partial)));
    }

    #[test]
    fn descriptor_check_on_key_fields() {
        assert!(needs_descriptor_enrichment(None));
        let complete = DescriptorSet {
            molecular_weight: Some(46.07),
            smiles: Some("CCO".to_string()),
            inchikey: Some("LFQSCWFLJHTTHZ-UHFFFAOYSA-N".to_string()),
            ..DescriptorSet::default()
        };
        assert!(!needs_descriptor_enrichment(Some(&complete)));
        let no_key = DescriptorSet {
            inchikey: None,
            ..complete
        };
        assert!(needs_descriptor_enrichment(Some(&no_key)));
    }

    #[test]
    fn upsert_never_clears_existing_paths() {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::apply(&conn).unwrap();
        conn.execute(
            "INSERT INTO phytochemicals (phyto_id, phyto_name, cid) VALUES (1, 'Ethanol', 702)",
            [],
        )
        .unwrap();
        let cid = CompoundId::new(702).unwrap();
        let first = StructureUpdate {
            phyto_id: 1,
            cid,
            sdf_2d: true,
            sdf_3d: true,
            png: false,
        };
        upsert_structure_paths(&conn, &first).unwrap();
        let second = StructureUpdate {
            sdf_2d: false,
            sdf_3d: false,
            png: true,
            ..first
        };
        upsert_structure_paths(&conn, &second).unwrap();

        let (has_2d, path_2d, png): (bool, Option<String>, Option<String>) = conn
            .query_row(
                "SELECT has_2d, sdf_2d_path, png_2d_path FROM structures WHERE phyto_id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert!(has_2d);
        assert_eq!(path_2d.as_deref(), Some("structures/sdf2d/CID_702.sdf"));
        assert_eq!(png.as_deref(), Some("structures/png/CID_702.png"));
    }
}
