use crextables::{
    Fxy,
    pattern::{TableScanner, master_file_stem},
    prelude::{CompiledTableB, CompiledTableD},
    wmo::{TableLoader, WMOBTableLoader, WMODTableLoader},
    TableType,
};
use std::path::Path;

const TABLE_B_CSV: &str = "\
ClassName_en,FXY,ElementName_en,Note_en,BUFR_Unit,BUFR_Scale,BUFR_ReferenceValue,BUFR_DataWidth_Bits,CREX_Unit,CREX_Scale,CREX_DataWidth_Char,Status
Identification,001001,WMO block number,,Numeric,0,0,7,Numeric,0,2,Operational
Identification,001002,WMO station number,,Numeric,0,0,10,Numeric,0,3,Operational
Identification,001015,Station or site name,,CCITT IA5,0,0,160,Character,0,20,Operational
Location,005001,Latitude (high accuracy),,deg,5,-9000000,25,deg,5,7,Operational
Temperature,012101,Temperature/air temperature,,K,2,0,16,C,2,4,Operational
Other,031001,Delayed descriptor replication factor,,Numeric,0,0,8,Numeric,0,3,Operational
Broken,0x1001,Not a code,,Numeric,0,0,8,Numeric,0,3,Operational
";

const TABLE_D_CSV: &str = "\
Category,CategoryOfSequences_en,FXY1,Title_en,SubTitle_en,FXY2,ElementName_en,ElementDescription_en,Note_en,Status
01,Location and identification sequences,301001,(WMO block and station numbers),,001001,WMO block number,,,Operational
01,Location and identification sequences,301001,(WMO block and station numbers),,001002,WMO station number,,,Operational
02,Meteorological sequences,302001,(Temperature),,012101,Temperature/air temperature,,,Operational
";

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn table_b_compiles_and_looks_up() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write(dir.path(), "BUFRCREX_TableB_en_13.csv", TABLE_B_CSV);

    let loader = TableLoader::<WMOBTableLoader>::default();
    let table = CompiledTableB::build_from_csv(loader, &csv, dir.path().join("out/b")).unwrap();

    // the malformed code row is skipped
    assert_eq!(table.len(), 6);

    let lat = table.lookup(Fxy::new(0, 5, 1)).unwrap();
    assert_eq!(lat.bufr_scale.to_native(), 5);
    assert_eq!(lat.bufr_reference_value.to_native(), -9000000);
    assert_eq!(
        lat.crex_datawidth_char.as_ref().map(|w| w.to_native()),
        Some(7)
    );

    assert!(table.lookup(Fxy::new(0, 1, 3)).is_none());
    assert!(table.lookup(Fxy::new(0, 12, 101)).is_some());
}

#[test]
fn compiled_table_reloads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write(dir.path(), "b.csv", TABLE_B_CSV);
    let out = dir.path().join("b");

    let loader = TableLoader::<WMOBTableLoader>::default();
    CompiledTableB::build_from_csv(loader, &csv, &out).unwrap();
    assert!(out.with_extension("bufrtbl").exists());

    let table = CompiledTableB::load_from_disk(&out).unwrap();
    let mut entries = table.to_entries().unwrap();
    entries.sort_by_key(|e| e.fxy);

    assert_eq!(entries[0].fxy, Fxy::new(0, 1, 1));
    let name = entries.iter().find(|e| e.fxy == Fxy::new(0, 1, 15)).unwrap();
    assert!(name.is_string());
    let counter = entries.iter().find(|e| e.fxy == Fxy::new(0, 31, 1)).unwrap();
    assert!(counter.is_counter());
}

#[test]
fn table_d_compiles_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write(dir.path(), "BUFR_TableD_en_13.csv", TABLE_D_CSV);

    let loader = TableLoader::<WMODTableLoader>::default();
    let table = CompiledTableD::build_from_csv(loader, &csv, dir.path().join("d")).unwrap();
    assert_eq!(table.len(), 2);

    let seq = table.lookup(Fxy::new(3, 1, 1)).unwrap();
    let chain: Vec<Fxy> = seq.fxy_chain.iter().map(|c| c.to_native()).collect();
    assert_eq!(chain, vec![Fxy::new(0, 1, 1), Fxy::new(0, 1, 2)]);
}

#[test]
fn scanned_tables_land_under_provider_names() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write(input.path(), "BUFRCREX_TableB_en_13.csv", TABLE_B_CSV);

    let files = TableScanner::new()
        .scan_directory(input.path(), Some(TableType::B))
        .unwrap();
    assert_eq!(files.len(), 1);

    let (path, meta) = &files[0];
    let loader = TableLoader::<WMOBTableLoader>::default();
    CompiledTableB::build_from_csv(loader, path, output.path().join(meta.output_name())).unwrap();

    let expected = output
        .path()
        .join(master_file_stem(TableType::B, 13))
        .with_extension("bufrtbl");
    assert!(expected.exists());
}
