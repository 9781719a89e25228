use camino::Utf8PathBuf;
use rusqlite::{Connection, params};

use spicebase::app::{ProgressEvent, ProgressSink};
use spicebase::dedupe::merge_duplicates;
use spicebase::domain::CompoundId;
use spicebase::enrich::{StructureUpdate, upsert_descriptors, upsert_structure_paths};
use spicebase::loader::{SourceRow, insert_row};
use spicebase::model::DescriptorSet;
use spicebase::store::Store;

struct NullSink;

impl ProgressSink for NullSink {
    fn event(&self, _event: ProgressEvent) {}
}

fn insert(conn: &Connection, spice: &str, phyto: &str, cid: Option<i64>) -> i64 {
    insert_row(
        conn,
        &SourceRow {
            spice_name: spice.to_string(),
            botanical_name: None,
            phyto_name: phyto.to_string(),
            cid: cid.map(|cid| CompoundId::new(cid).unwrap()),
            has_2d: false,
            has_3d: false,
        },
    )
    .unwrap()
}

fn open(temp: &tempfile::TempDir) -> Connection {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    Store::new(root.join("spices.db"), root.join("static"))
        .create()
        .unwrap()
}

fn spices_of(conn: &Connection, phyto_id: i64) -> Vec<String> {
    let mut statement = conn
        .prepare(
            "SELECT s.spice_name FROM spice_phytochemicals sp
             JOIN spices s ON s.spice_id = sp.spice_id
             WHERE sp.phyto_id = ?1 ORDER BY s.spice_name",
        )
        .unwrap();
    statement
        .query_map(params![phyto_id], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn keeper_with_cid_absorbs_links() {
    let temp = tempfile::tempdir().unwrap();
    let mut conn = open(&temp);
    let loose_a = insert(&conn, "Nutmeg", "Myristicin", None);
    let keeper = insert(&conn, "Mace", "Myristicin", Some(4276));
    let loose_b = insert(&conn, "Mace", "Myristicin", None);
    let loose_c = insert(&conn, "Parsley", "Myristicin", None);
    insert(&conn, "Clove", "Eugenol", Some(3314));

    let report = merge_duplicates(&mut conn, &NullSink).unwrap();
    assert_eq!(report.removed, 3);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].name, "Myristicin");
    assert_eq!(report.groups[0].keeper, keeper);
    assert_eq!(report.groups[0].merged, vec![loose_a, loose_b, loose_c]);

    assert_eq!(spices_of(&conn, keeper), vec!["Mace", "Nutmeg", "Parsley"]);
    let remaining: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM phytochemicals WHERE phyto_name = 'Myristicin'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 1);
    let orphan_links: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM spice_phytochemicals WHERE phyto_id IN (?1, ?2, ?3)",
            params![loose_a, loose_b, loose_c],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphan_links, 0);
}

#[test]
fn link_count_then_lowest_id_break_ties() {
    let temp = tempfile::tempdir().unwrap();
    let mut conn = open(&temp);
    let first = insert(&conn, "Thyme", "Thymol", None);
    let popular = insert(&conn, "Oregano", "Thymol", None);
    conn.execute(
        "INSERT INTO spices (spice_name) VALUES ('Ajwain')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO spice_phytochemicals (spice_id, phyto_id)
         SELECT spice_id, ?1 FROM spices WHERE spice_name = 'Ajwain'",
        params![popular],
    )
    .unwrap();
    let a = insert(&conn, "Savory", "Carvacrol", None);
    let b = insert(&conn, "Marjoram", "Carvacrol", None);

    let report = merge_duplicates(&mut conn, &NullSink).unwrap();
    let names: Vec<_> = report.groups.iter().map(|group| group.name.as_str()).collect();
    assert_eq!(names, vec!["Carvacrol", "Thymol"]);
    assert_eq!(report.groups[0].keeper, a);
    assert_eq!(report.groups[0].merged, vec![b]);
    assert_eq!(report.groups[1].keeper, popular);
    assert_eq!(report.groups[1].merged, vec![first]);
    assert_eq!(spices_of(&conn, popular), vec!["Ajwain", "Oregano", "Thyme"]);
}

#[test]
fn enrichment_rows_move_to_a_bare_keeper() {
    let temp = tempfile::tempdir().unwrap();
    let mut conn = open(&temp);
    let keeper = insert(&conn, "Clove", "Eugenol", Some(3314));
    let duplicate = insert(&conn, "Basil", "Eugenol", None);
    conn.execute("DELETE FROM structures WHERE phyto_id = ?1", params![keeper])
        .unwrap();
    upsert_structure_paths(
        &conn,
        &StructureUpdate {
            phyto_id: duplicate,
            cid: CompoundId::new(3314).unwrap(),
            sdf_2d: true,
            sdf_3d: false,
            png: true,
        },
    )
    .unwrap();
    upsert_descriptors(
        &conn,
        duplicate,
        &DescriptorSet {
            molecular_weight: Some(164.2),
            ..DescriptorSet::default()
        },
    )
    .unwrap();

    merge_duplicates(&mut conn, &NullSink).unwrap();

    let png: Option<String> = conn
        .query_row(
            "SELECT png_2d_path FROM structures WHERE phyto_id = ?1",
            params![keeper],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(png.as_deref(), Some("structures/png/CID_3314.png"));
    let weight: f64 = conn
        .query_row(
            "SELECT molecular_weight FROM descriptors WHERE phyto_id = ?1",
            params![keeper],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(weight, 164.2);
    let leftovers: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM structures WHERE phyto_id = ?1)
                  + (SELECT COUNT(*) FROM descriptors WHERE phyto_id = ?1)",
            params![duplicate],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(leftovers, 0);
}

#[test]
fn no_duplicates_is_a_no_op() {
    let temp = tempfile::tempdir().unwrap();
    let mut conn = open(&temp);
    insert(&conn, "Clove", "Eugenol", Some(3314));

    let report = merge_duplicates(&mut conn, &NullSink).unwrap();
    assert!(report.groups.is_empty());
    assert_eq!(report.removed, 0);
}
