//! Merges phytochemicals that share a name into a single row.
//!
//! Rows loaded without a CID are never matched against existing compounds,
//! so the same compound can end up several times under one name.

use rusqlite::{Connection, params};
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::SpiceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedGroup {
    pub name: String,
    pub keeper: i64,
    pub merged: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupeReport {
    pub groups: Vec<MergedGroup>,
    pub removed: usize,
}

/// For every duplicated name keeps the row with a CID, then the one linked
/// to the most spices, then the one with a structure row, then the oldest.
/// One transaction per name.
pub fn merge_duplicates(
    conn: &mut Connection,
    sink: &dyn ProgressSink,
) -> Result<DedupeReport, SpiceError> {
    let names = {
        let mut statement = conn.prepare(
            "SELECT phyto_name
             FROM phytochemicals
             GROUP BY phyto_name
             HAVING COUNT(*) > 1
             ORDER BY phyto_name",
        )?;
        statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?
    };
    sink.event(ProgressEvent {
        message: format!("{} duplicated names", names.len()),
        elapsed: None,
    });

    let mut groups = Vec::new();
    let mut removed = 0usize;
    for name in names {
        let tx = conn.transaction()?;
        let ids = ranked_ids(&tx, &name)?;
        let Some((&keeper, duplicates)) = ids.split_first() else {
            continue;
        };
        for &duplicate in duplicates {
            merge_into(&tx, keeper, duplicate)?;
        }
        tx.commit()?;

        tracing::info!(name = %name, keeper, merged = ?duplicates, "merged duplicates");
        removed += duplicates.len();
        groups.push(MergedGroup {
            name,
            keeper,
            merged: duplicates.to_vec(),
        });
    }

    Ok(DedupeReport { groups, removed })
}

fn ranked_ids(conn: &Connection, name: &str) -> Result<Vec<i64>, SpiceError> {
    let mut statement = conn.prepare(
        "SELECT p.phyto_id,
                (SELECT COUNT(*) FROM spice_phytochemicals sp WHERE sp.phyto_id = p.phyto_id) AS spice_count,
                (SELECT COUNT(*) FROM structures s WHERE s.phyto_id = p.phyto_id) AS struct_count
         FROM phytochemicals p
         WHERE p.phyto_name = ?1
         ORDER BY (p.cid IS NOT NULL) DESC, spice_count DESC, struct_count DESC, p.phyto_id ASC",
    )?;
    let ids = statement
        .query_map(params![name], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn merge_into(conn: &Connection, keeper: i64, duplicate: i64) -> Result<(), SpiceError> {
    // Links the keeper already has stay behind and are dropped.
    conn.execute(
        "UPDATE OR IGNORE spice_phytochemicals SET phyto_id = ?1 WHERE phyto_id = ?2",
        params![keeper, duplicate],
    )?;
    conn.execute(
        "DELETE FROM spice_phytochemicals WHERE phyto_id = ?1",
        params![duplicate],
    )?;

    for table in ["structures", "descriptors"] {
        let keeper_has: bool = conn.query_row(
            &format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE phyto_id = ?1)"),
            params![keeper],
            |row| row.get(0),
        )?;
        if !keeper_has {
            conn.execute(
                &format!("UPDATE {table} SET phyto_id = ?1 WHERE phyto_id = ?2"),
                params![keeper, duplicate],
            )?;
        }
        conn.execute(
            &format!("DELETE FROM {table} WHERE phyto_id = ?1"),
            params![duplicate],
        )?;
    }

    conn.execute(
        "DELETE FROM phytochemicals WHERE phyto_id = ?1",
        params![duplicate],
    )?;
    Ok(())
}
