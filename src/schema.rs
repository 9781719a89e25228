use rusqlite::Connection;

use crate::error::SpiceError;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS spices (
    spice_id INTEGER PRIMARY KEY AUTOINCREMENT,
    spice_name TEXT UNIQUE NOT NULL,
    botanical_name TEXT
);

CREATE TABLE IF NOT EXISTS phytochemicals (
    phyto_id INTEGER PRIMARY KEY AUTOINCREMENT,
    phyto_name TEXT NOT NULL,
    cid INTEGER UNIQUE
);

CREATE TABLE IF NOT EXISTS spice_phytochemicals (
    spice_id INTEGER NOT NULL,
    phyto_id INTEGER NOT NULL,
    PRIMARY KEY (spice_id, phyto_id),
    FOREIGN KEY (spice_id) REFERENCES spices(spice_id) ON DELETE CASCADE,
    FOREIGN KEY (phyto_id) REFERENCES phytochemicals(phyto_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS structures (
    phyto_id INTEGER PRIMARY KEY,
    has_2d INTEGER NOT NULL DEFAULT 0,
    has_3d INTEGER NOT NULL DEFAULT 0,
    sdf_2d_path TEXT,
    sdf_3d_path TEXT,
    png_2d_path TEXT,
    FOREIGN KEY (phyto_id) REFERENCES phytochemicals(phyto_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS descriptors (
    phyto_id INTEGER PRIMARY KEY,
    molecular_formula TEXT,
    molecular_weight REAL,
    xlogp REAL,
    tpsa REAL,
    hbd INTEGER,
    hba INTEGER,
    rotatable_bonds INTEGER,
    heavy_atom_count INTEGER,
    complexity REAL,
    charge INTEGER,
    smiles TEXT,
    isomeric_smiles TEXT,
    inchi TEXT,
    inchikey TEXT,
    iupac_name TEXT,
    FOREIGN KEY (phyto_id) REFERENCES phytochemicals(phyto_id) ON DELETE CASCADE
);
";

/// Creates any missing table. Existing tables and rows are left untouched.
pub fn apply(conn: &Connection) -> Result<(), SpiceError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn).unwrap();
        apply(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('spices', 'phytochemicals', 'spice_phytochemicals', 'structures', 'descriptors')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }
}
