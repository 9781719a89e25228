use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::Serialize;

use crate::domain::{CompoundId, PhytoSort, SpiceSort};
use crate::error::SpiceError;
use crate::model::{
    Counts, DescriptorSet, PhytoRecord, PhytoSummary, Spice, SpiceRef, StructureRecord,
};

pub const MIN_PER_PAGE: u32 = 5;
pub const MAX_PER_PAGE: u32 = 200;
pub const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 25,
        }
    }
}

impl Pagination {
    /// Page at least 1, page size within 5..=200.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE),
        }
    }

    pub fn offset(self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub pages: i64,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        let per_page = i64::from(pagination.per_page);
        Self {
            items,
            page: pagination.page,
            per_page: pagination.per_page,
            total,
            pages: (total + per_page - 1) / per_page,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpiceQuery {
    /// Substring of the spice name.
    pub q: Option<String>,
    /// Single initial letter; wins over `q` when valid.
    pub starts: Option<String>,
    pub sort: SpiceSort,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default)]
pub struct PhytoQuery {
    /// All digits: exact CID. Otherwise a name substring.
    pub q: Option<String>,
    pub only_cid: bool,
    pub only_2d: bool,
    pub only_3d: bool,
    pub sort: PhytoSort,
    pub pagination: Pagination,
}

pub fn counts(conn: &Connection) -> Result<Counts, SpiceError> {
    let count = |sql: &str| -> Result<i64, SpiceError> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };
    Ok(Counts {
        spices: count("SELECT COUNT(*) FROM spices")?,
        phytochemicals: count("SELECT COUNT(*) FROM phytochemicals")?,
        links: count("SELECT COUNT(*) FROM spice_phytochemicals")?,
    })
}

pub fn list_spices(conn: &Connection, query: &SpiceQuery) -> Result<Page<Spice>, SpiceError> {
    let pagination = query.pagination.normalized();
    let starts = query
        .starts
        .as_deref()
        .map(|value| value.trim().to_uppercase())
        .filter(|value| value.chars().count() == 1 && value.chars().all(char::is_alphabetic));
    let q = non_empty(query.q.as_deref());

    let pattern = match (starts, q) {
        (Some(letter), _) => Some(format!("{letter}%")),
        (None, Some(q)) => Some(format!("%{q}%")),
        (None, None) => None,
    };
    let where_sql = if pattern.is_some() {
        "WHERE spice_name LIKE ?1"
    } else {
        ""
    };

    let mut values: Vec<SqlValue> = pattern.into_iter().map(SqlValue::Text).collect();
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM spices {where_sql}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let next = values.len() + 1;
    let sql = format!(
        "SELECT spice_id, spice_name, botanical_name
         FROM spices
         {where_sql}
         ORDER BY {}
         LIMIT ?{next} OFFSET ?{}",
        query.sort.order_by(),
        next + 1
    );
    values.push(SqlValue::Integer(i64::from(pagination.per_page)));
    values.push(SqlValue::Integer(pagination.offset()));

    let mut statement = conn.prepare(&sql)?;
    let items = statement
        .query_map(params_from_iter(values.iter()), spice_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, pagination, total))
}

/// Name-prefix lookup for autocompletion.
pub fn search_spices(conn: &Connection, q: &str, limit: usize) -> Result<Vec<Spice>, SpiceError> {
    let Some(q) = non_empty(Some(q)) else {
        return Ok(Vec::new());
    };
    let mut statement = conn.prepare(
        "SELECT spice_id, spice_name, botanical_name
         FROM spices
         WHERE spice_name LIKE ?1
         ORDER BY spice_name ASC
         LIMIT ?2",
    )?;
    let items = statement
        .query_map(params![format!("{q}%"), search_limit(limit)], spice_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn get_spice(conn: &Connection, spice_id: i64) -> Result<Option<Spice>, SpiceError> {
    Ok(conn
        .query_row(
            "SELECT spice_id, spice_name, botanical_name FROM spices WHERE spice_id = ?1",
            params![spice_id],
            spice_from_row,
        )
        .optional()?)
}

pub fn spice_phytochemicals(
    conn: &Connection,
    spice_id: i64,
) -> Result<Vec<PhytoSummary>, SpiceError> {
    let mut statement = conn.prepare(
        "SELECT p.phyto_id, p.phyto_name, p.cid,
                COALESCE(s.has_2d, 0), COALESCE(s.has_3d, 0)
         FROM spice_phytochemicals sp
         JOIN phytochemicals p ON p.phyto_id = sp.phyto_id
         LEFT JOIN structures s ON s.phyto_id = p.phyto_id
         WHERE sp.spice_id = ?1
         ORDER BY p.phyto_name ASC",
    )?;
    let items = statement
        .query_map(params![spice_id], |row| phyto_summary_from_row(row, false))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn list_phytochemicals(
    conn: &Connection,
    query: &PhytoQuery,
) -> Result<Page<PhytoSummary>, SpiceError> {
    let pagination = query.pagination.normalized();
    // Asking for "2D only" and "3D" at once cancels both filters.
    let (only_2d, only_3d) = if query.only_2d && query.only_3d {
        (false, false)
    } else {
        (query.only_2d, query.only_3d)
    };

    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(q) = non_empty(query.q.as_deref()) {
        match exact_cid(q) {
            Some(cid) => {
                values.push(SqlValue::Integer(cid));
                clauses.push(format!("p.cid = ?{}", values.len()));
            }
            None => {
                values.push(SqlValue::Text(format!("%{q}%")));
                clauses.push(format!("p.phyto_name LIKE ?{}", values.len()));
            }
        }
    }
    if query.only_cid {
        clauses.push("p.cid IS NOT NULL".to_string());
    }
    if only_3d {
        clauses.push("COALESCE(s.has_3d, 0) = 1".to_string());
    }
    if only_2d {
        clauses.push("COALESCE(s.has_2d, 0) = 1 AND COALESCE(s.has_3d, 0) = 0".to_string());
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*)
             FROM phytochemicals p
             LEFT JOIN structures s ON s.phyto_id = p.phyto_id
             {where_sql}"
        ),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let next = values.len() + 1;
    let sql = format!(
        "SELECT p.phyto_id, p.phyto_name, p.cid,
                COALESCE(s.has_2d, 0), COALESCE(s.has_3d, 0),
                (SELECT COUNT(*) FROM spice_phytochemicals sp WHERE sp.phyto_id = p.phyto_id) AS spice_count
         FROM phytochemicals p
         LEFT JOIN structures s ON s.phyto_id = p.phyto_id
         {where_sql}
         ORDER BY {}, p.phyto_id ASC
         LIMIT ?{next} OFFSET ?{}",
        query.sort.order_by(),
        next + 1
    );
    values.push(SqlValue::Integer(i64::from(pagination.per_page)));
    values.push(SqlValue::Integer(pagination.offset()));

    let mut statement = conn.prepare(&sql)?;
    let items = statement
        .query_map(params_from_iter(values.iter()), |row| {
            phyto_summary_from_row(row, true)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, pagination, total))
}

/// Exact CID for an all-digit query, name prefix otherwise.
pub fn search_phytochemicals(
    conn: &Connection,
    q: &str,
    limit: usize,
) -> Result<Vec<PhytoSummary>, SpiceError> {
    let Some(q) = non_empty(Some(q)) else {
        return Ok(Vec::new());
    };
    let (filter, value) = match exact_cid(q) {
        Some(cid) => ("p.cid = ?1", SqlValue::Integer(cid)),
        None => ("p.phyto_name LIKE ?1", SqlValue::Text(format!("{q}%"))),
    };
    let sql = format!(
        "SELECT p.phyto_id, p.phyto_name, p.cid,
                COALESCE(s.has_2d, 0), COALESCE(s.has_3d, 0)
         FROM phytochemicals p
         LEFT JOIN structures s ON s.phyto_id = p.phyto_id
         WHERE {filter}
         ORDER BY p.phyto_name ASC
         LIMIT ?2"
    );
    let mut statement = conn.prepare(&sql)?;
    let items = statement
        .query_map(params![value, search_limit(limit)], |row| {
            phyto_summary_from_row(row, false)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Phytochemical with its structure and descriptor rows, if any.
pub fn load_phyto(conn: &Connection, phyto_id: i64) -> Result<Option<PhytoRecord>, SpiceError> {
    Ok(conn
        .query_row(
            "SELECT p.phyto_id, p.phyto_name, p.cid,
                    s.phyto_id IS NOT NULL,
                    COALESCE(s.has_2d, 0), COALESCE(s.has_3d, 0),
                    s.sdf_2d_path, s.sdf_3d_path, s.png_2d_path,
                    d.phyto_id IS NOT NULL,
                    d.molecular_formula, d.molecular_weight, d.xlogp, d.tpsa,
                    d.hbd, d.hba, d.rotatable_bonds, d.heavy_atom_count,
                    d.complexity, d.charge,
                    d.smiles, d.isomeric_smiles, d.inchi, d.inchikey, d.iupac_name
             FROM phytochemicals p
             LEFT JOIN structures s ON s.phyto_id = p.phyto_id
             LEFT JOIN descriptors d ON d.phyto_id = p.phyto_id
             WHERE p.phyto_id = ?1",
            params![phyto_id],
            phyto_record_from_row,
        )
        .optional()?)
}

pub fn spices_for_phyto(conn: &Connection, phyto_id: i64) -> Result<Vec<SpiceRef>, SpiceError> {
    let mut statement = conn.prepare(
        "SELECT sp.spice_id, sp.spice_name
         FROM spice_phytochemicals link
         JOIN spices sp ON sp.spice_id = link.spice_id
         WHERE link.phyto_id = ?1
         ORDER BY sp.spice_name ASC",
    )?;
    let items = statement
        .query_map(params![phyto_id], |row| {
            Ok(SpiceRef {
                spice_id: row.get(0)?,
                spice_name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn spice_from_row(row: &Row<'_>) -> rusqlite::Result<Spice> {
    Ok(Spice {
        spice_id: row.get(0)?,
        spice_name: row.get(1)?,
        botanical_name: row.get(2)?,
    })
}

fn phyto_summary_from_row(row: &Row<'_>, with_count: bool) -> rusqlite::Result<PhytoSummary> {
    Ok(PhytoSummary {
        phyto_id: row.get(0)?,
        phyto_name: row.get(1)?,
        cid: compound_id(row.get(2)?),
        has_2d: row.get(3)?,
        has_3d: row.get(4)?,
        spice_count: if with_count { Some(row.get(5)?) } else { None },
    })
}

fn phyto_record_from_row(row: &Row<'_>) -> rusqlite::Result<PhytoRecord> {
    let has_structure: bool = row.get(3)?;
    let structures = if has_structure {
        Some(StructureRecord {
            has_2d: row.get(4)?,
            has_3d: row.get(5)?,
            sdf_2d_path: row.get(6)?,
            sdf_3d_path: row.get(7)?,
            png_2d_path: row.get(8)?,
        })
    } else {
        None
    };
    let has_descriptors: bool = row.get(9)?;
    let descriptors = if has_descriptors {
        Some(DescriptorSet {
            molecular_formula: row.get(10)?,
            molecular_weight: row.get(11)?,
            xlogp: row.get(12)?,
            tpsa: row.get(13)?,
            hbd: row.get(14)?,
            hba: row.get(15)?,
            rotatable_bonds: row.get(16)?,
            heavy_atom_count: row.get(17)?,
            complexity: row.get(18)?,
            charge: row.get(19)?,
            smiles: row.get(20)?,
            isomeric_smiles: row.get(21)?,
            inchi: row.get(22)?,
            inchikey: row.get(23)?,
            iupac_name: row.get(24)?,
        })
    } else {
        None
    };
    Ok(PhytoRecord {
        phyto_id: row.get(0)?,
        phyto_name: row.get(1)?,
        cid: compound_id(row.get(2)?),
        structures,
        descriptors,
    })
}

fn compound_id(value: Option<i64>) -> Option<CompoundId> {
    value.and_then(|value| CompoundId::new(value).ok())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn exact_cid(q: &str) -> Option<i64> {
    if q.chars().all(|ch| ch.is_ascii_digit()) {
        q.parse().ok()
    } else {
        None
    }
}

fn search_limit(limit: usize) -> i64 {
    limit.min(MAX_SEARCH_LIMIT) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let normalized = Pagination {
            page: 0,
            per_page: 1000,
        }
        .normalized();
        assert_eq!(normalized.page, 1);
        assert_eq!(normalized.per_page, MAX_PER_PAGE);
        assert_eq!(normalized.offset(), 0);

        let small = Pagination {
            page: 3,
            per_page: 1,
        }
        .normalized();
        assert_eq!(small.per_page, MIN_PER_PAGE);
        assert_eq!(small.offset(), 10);
    }

    #[test]
    fn digit_queries_are_cids() {
        assert_eq!(exact_cid("2758"), Some(2758));
        assert_eq!(exact_cid("cineole"), None);
        assert_eq!(exact_cid("12a"), None);
    }
}
