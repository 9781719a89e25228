use camino::Utf8PathBuf;
use rusqlite::Connection;

use spicebase::browse::{
    self, Pagination, PhytoQuery, SpiceQuery, counts, list_phytochemicals, list_spices,
    search_phytochemicals, search_spices,
};
use spicebase::domain::{CompoundId, PhytoSort, SpiceSort};
use spicebase::loader::{SourceRow, insert_row};
use spicebase::store::Store;

fn row(spice: &str, phyto: &str, cid: Option<i64>, has_2d: bool, has_3d: bool) -> SourceRow {
    SourceRow {
        spice_name: spice.to_string(),
        botanical_name: Some(format!("{spice} botanica")),
        phyto_name: phyto.to_string(),
        cid: cid.map(|cid| CompoundId::new(cid).unwrap()),
        has_2d,
        has_3d,
    }
}

fn seeded(temp: &tempfile::TempDir) -> Connection {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = Store::new(root.join("spices.db"), root.join("static"));
    let conn = store.create().unwrap();
    for source in [
        row("Anise", "Anethole", Some(637563), true, true),
        row("Basil", "Eugenol", Some(3314), true, true),
        row("Clove", "Eugenol", Some(3314), true, true),
        row("Clove", "Beta-caryophyllene", Some(5281515), true, false),
        row("Cardamom", "Cineole", Some(2758), false, false),
        row("Cinnamon", "Cinnamaldehyde", Some(637511), true, true),
        row("Cinnamon", "Proanthocyanidin fraction", None, false, false),
    ] {
        insert_row(&conn, &source).unwrap();
    }
    for extra in 0..12 {
        insert_row(&conn, &row(&format!("Zest {extra:02}"), "Limonene", Some(22311), true, true))
            .unwrap();
    }
    conn
}

#[test]
fn counts_reflect_links() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);
    let counts = counts(&conn).unwrap();
    assert_eq!(counts.spices, 17);
    assert_eq!(counts.phytochemicals, 7);
    assert_eq!(counts.links, 19);
}

#[test]
fn spice_listing_prefers_initial_over_substring() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);

    let query = SpiceQuery {
        q: Some("zest".to_string()),
        starts: Some("c".to_string()),
        ..SpiceQuery::default()
    };
    let page = list_spices(&conn, &query).unwrap();
    let names: Vec<_> = page.items.iter().map(|spice| spice.spice_name.as_str()).collect();
    assert_eq!(names, vec!["Cardamom", "Cinnamon", "Clove"]);
    assert_eq!(page.total, 3);

    // Not a single letter, so the substring applies.
    let query = SpiceQuery {
        q: Some("nam".to_string()),
        starts: Some("ci".to_string()),
        sort: SpiceSort::NameDesc,
        ..SpiceQuery::default()
    };
    let page = list_spices(&conn, &query).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].spice_name, "Cinnamon");
    assert_eq!(page.items[0].botanical_name.as_deref(), Some("Cinnamon botanica"));
}

#[test]
fn spice_pages_are_clamped() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);

    let query = SpiceQuery {
        pagination: Pagination {
            page: 0,
            per_page: 1,
        },
        ..SpiceQuery::default()
    };
    let page = list_spices(&conn, &query).unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.per_page, 5);
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.total, 17);
    assert_eq!(page.pages, 4);

    let query = SpiceQuery {
        pagination: Pagination {
            page: 4,
            per_page: 5,
        },
        ..SpiceQuery::default()
    };
    let last = list_spices(&conn, &query).unwrap();
    assert_eq!(last.items.len(), 2);
}

#[test]
fn spice_search_is_prefix_and_capped() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);

    let found = search_spices(&conn, "cl", 10).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].spice_name, "Clove");
    assert!(search_spices(&conn, "love", 10).unwrap().is_empty());
    assert!(search_spices(&conn, "  ", 10).unwrap().is_empty());
    assert_eq!(search_spices(&conn, "Zest", 3).unwrap().len(), 3);
    assert_eq!(search_spices(&conn, "Zest", 500).unwrap().len(), 12);
}

#[test]
fn phyto_filters() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);

    let names = |query: PhytoQuery| -> Vec<String> {
        list_phytochemicals(&conn, &query)
            .unwrap()
            .items
            .into_iter()
            .map(|item| item.phyto_name)
            .collect()
    };

    assert_eq!(
        names(PhytoQuery {
            only_2d: true,
            ..PhytoQuery::default()
        }),
        vec!["Beta-caryophyllene"]
    );
    assert_eq!(
        names(PhytoQuery {
            only_3d: true,
            ..PhytoQuery::default()
        }),
        vec!["Anethole", "Cinnamaldehyde", "Eugenol", "Limonene"]
    );
    assert_eq!(
        names(PhytoQuery {
            only_2d: true,
            only_3d: true,
            ..PhytoQuery::default()
        })
        .len(),
        7
    );
    assert_eq!(
        names(PhytoQuery {
            only_cid: true,
            ..PhytoQuery::default()
        })
        .len(),
        6
    );
    assert_eq!(
        names(PhytoQuery {
            q: Some("3314".to_string()),
            ..PhytoQuery::default()
        }),
        vec!["Eugenol"]
    );
    assert_eq!(
        names(PhytoQuery {
            q: Some("cin".to_string()),
            ..PhytoQuery::default()
        }),
        vec!["Cineole", "Cinnamaldehyde"]
    );
}

#[test]
fn phyto_sorting_by_spice_count() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);

    let page = list_phytochemicals(
        &conn,
        &PhytoQuery {
            sort: PhytoSort::SpiceCountDesc,
            ..PhytoQuery::default()
        },
    )
    .unwrap();
    assert_eq!(page.items[0].phyto_name, "Limonene");
    assert_eq!(page.items[0].spice_count, Some(12));
    assert_eq!(page.items[1].phyto_name, "Eugenol");
    assert_eq!(page.items[1].spice_count, Some(2));

    let page = list_phytochemicals(
        &conn,
        &PhytoQuery {
            sort: PhytoSort::CidDesc,
            only_cid: true,
            ..PhytoQuery::default()
        },
    )
    .unwrap();
    let cids: Vec<i64> = page
        .items
        .iter()
        .filter_map(|item| item.cid.map(CompoundId::get))
        .collect();
    assert_eq!(cids, vec![5281515, 637563, 637511, 22311, 3314, 2758]);
}

#[test]
fn phyto_search_by_cid_or_prefix() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);

    let by_cid = search_phytochemicals(&conn, "2758", 10).unwrap();
    assert_eq!(by_cid.len(), 1);
    assert_eq!(by_cid[0].phyto_name, "Cineole");
    assert!(!by_cid[0].has_2d);

    let by_name = search_phytochemicals(&conn, "Cin", 10).unwrap();
    assert_eq!(by_name.len(), 2);
    assert!(search_phytochemicals(&conn, "275", 10).unwrap().is_empty());
}

#[test]
fn spice_detail_lists_compounds() {
    let temp = tempfile::tempdir().unwrap();
    let conn = seeded(&temp);

    let clove = search_spices(&conn, "Clove", 1).unwrap().remove(0);
    let spice = browse::get_spice(&conn, clove.spice_id).unwrap().unwrap();
    assert_eq!(spice, clove);

    let compounds = browse::spice_phytochemicals(&conn, clove.spice_id).unwrap();
    let names: Vec<_> = compounds.iter().map(|item| item.phyto_name.as_str()).collect();
    assert_eq!(names, vec!["Beta-caryophyllene", "Eugenol"]);
    assert!(compounds[0].has_2d && !compounds[0].has_3d);

    let eugenol = &compounds[1];
    let spices = browse::spices_for_phyto(&conn, eugenol.phyto_id).unwrap();
    let spice_names: Vec<_> = spices.iter().map(|spice| spice.spice_name.as_str()).collect();
    assert_eq!(spice_names, vec!["Basil", "Clove"]);

    let record = browse::load_phyto(&conn, eugenol.phyto_id).unwrap().unwrap();
    assert_eq!(record.cid, Some(CompoundId::new(3314).unwrap()));
    assert_eq!(record.descriptors, None);
    let structures = record.structures.unwrap();
    assert!(structures.has_3d);
    assert!(!structures.has_any_path());

    assert_eq!(browse::get_spice(&conn, 9999).unwrap(), None);
    assert_eq!(browse::load_phyto(&conn, 9999).unwrap(), None);
}
