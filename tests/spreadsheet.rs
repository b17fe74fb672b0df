mod common;

use assert_fs::prelude::*;
use assert_fs::TempDir;

use common::{build_xlsx, read_part, Cell, APP_PROPS};
use doctrans::document::{DocumentAdapter, SpreadsheetAdapter, StringSet, StringTable};
use doctrans::error::DoctransError;

fn two_sheet_workbook() -> Vec<u8> {
    build_xlsx(&[
        (
            "First",
            vec![vec![Cell::Text("Hello"), Cell::Text("World")]],
        ),
        (
            "Second",
            vec![vec![Cell::Text("42"), Cell::Text("Hello"), Cell::Number(7.0)]],
        ),
    ])
}

fn write_fixture(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let file = dir.child(name);
    file.write_binary(bytes).unwrap();
    file.path().to_path_buf()
}

#[test]
fn test_extract_filters_and_dedups() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "book.xlsx", &two_sheet_workbook());

    let strings = SpreadsheetAdapter::new().extract(&path).unwrap();
    assert_eq!(strings.as_slice(), &["Hello", "World"]);
}

#[test]
fn test_extract_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "book.xlsx", &two_sheet_workbook());
    let adapter = SpreadsheetAdapter::new();

    let first = adapter.extract(&path).unwrap();
    let second = adapter.extract(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_apply_rewrites_every_occurrence() {
    let dir = TempDir::new().unwrap();
    let source = write_fixture(&dir, "book.xlsx", &two_sheet_workbook());
    let dest = dir.child("out.xlsx");

    let mut table = StringTable::new();
    table.insert("Hello", "Bonjour");
    table.insert("World", "Monde");

    let adapter = SpreadsheetAdapter::new();
    let report = adapter.apply(&source, dest.path(), &table).unwrap();
    assert_eq!(report.nodes_updated, 3);
    assert_eq!(report.parts_rewritten, 1);

    let strings = adapter.extract(dest.path()).unwrap();
    assert_eq!(strings.as_slice(), &["Bonjour", "Monde"]);

    let sst = read_part(dest.path(), "xl/sharedStrings.xml");
    assert!(sst.contains("<si><t>42</t></si>"));

    let sheet2 = read_part(dest.path(), "xl/worksheets/sheet2.xml");
    assert!(sheet2.contains(r#"<c r="C1"><v>7</v></c>"#));
}

#[test]
fn test_source_is_left_untouched() {
    let dir = TempDir::new().unwrap();
    let bytes = two_sheet_workbook();
    let source = write_fixture(&dir, "book.xlsx", &bytes);
    let dest = dir.child("out.xlsx");

    let table: StringTable = vec![("Hello".to_string(), "Hallo".to_string())].into();
    SpreadsheetAdapter::new()
        .apply(&source, dest.path(), &table)
        .unwrap();

    assert_eq!(std::fs::read(&source).unwrap(), bytes);
}

#[test]
fn test_identity_table_round_trip() {
    let dir = TempDir::new().unwrap();
    let source = write_fixture(&dir, "book.xlsx", &two_sheet_workbook());
    let dest = dir.child("out.xlsx");
    let adapter = SpreadsheetAdapter::new();

    let original = adapter.extract(&source).unwrap();
    let table = StringTable::identity(original.iter());
    let report = adapter.apply(&source, dest.path(), &table).unwrap();
    assert_eq!(report.nodes_updated, 0);
    assert_eq!(report.parts_rewritten, 0);

    assert_eq!(adapter.extract(dest.path()).unwrap(), original);
    for part in [
        "docProps/app.xml",
        "xl/workbook.xml",
        "xl/sharedStrings.xml",
        "xl/worksheets/sheet1.xml",
        "xl/worksheets/sheet2.xml",
    ] {
        assert_eq!(read_part(&source, part), read_part(dest.path(), part), "{part}");
    }
    assert_eq!(read_part(dest.path(), "docProps/app.xml"), APP_PROPS);
}

#[test]
fn test_fifty_cells_one_entry() {
    let rows: Vec<Vec<Cell>> = (0..50).map(|_| vec![Cell::Text("Hello")]).collect();
    let dir = TempDir::new().unwrap();
    let source = write_fixture(&dir, "book.xlsx", &build_xlsx(&[("Sheet1", rows)]));
    let dest = dir.child("out.xlsx");
    let adapter = SpreadsheetAdapter::new();

    let strings = adapter.extract(&source).unwrap();
    assert_eq!(strings.len(), 1);

    let mut table = StringTable::new();
    table.insert("Hello", "Hola");
    let report = adapter.apply(&source, dest.path(), &table).unwrap();
    assert_eq!(report.nodes_updated, 50);
    assert_eq!(adapter.extract(dest.path()).unwrap().as_slice(), &["Hola"]);
}

#[test]
fn test_formulas_are_not_extracted_or_rewritten() {
    let dir = TempDir::new().unwrap();
    let bytes = build_xlsx(&[(
        "Sheet1",
        vec![vec![
            Cell::Formula("CONCAT(\"Hel\",\"lo\")", "Hello"),
            Cell::Inline("Inline text"),
        ]],
    )]);
    let source = write_fixture(&dir, "book.xlsx", &bytes);
    let dest = dir.child("out.xlsx");
    let adapter = SpreadsheetAdapter::new();

    let strings = adapter.extract(&source).unwrap();
    assert_eq!(strings.as_slice(), &["Inline text"]);

    let mut table = StringTable::new();
    table.insert("Hello", "Bonjour");
    table.insert("Inline text", "Texte en ligne");
    adapter.apply(&source, dest.path(), &table).unwrap();

    let sheet = read_part(dest.path(), "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("<v>Hello</v>"));
    assert!(sheet.contains("<f>CONCAT(\"Hel\",\"lo\")</f>"));
    assert!(sheet.contains("<is><t>Texte en ligne</t></is>"));
}

#[test]
fn test_markup_in_translation_is_escaped() {
    let dir = TempDir::new().unwrap();
    let source = write_fixture(&dir, "book.xlsx", &two_sheet_workbook());
    let dest = dir.child("out.xlsx");
    let adapter = SpreadsheetAdapter::new();

    let mut table = StringTable::new();
    table.insert("Hello", "<b>Salut & bienvenue</b>");
    adapter.apply(&source, dest.path(), &table).unwrap();

    let strings: StringSet = adapter.extract(dest.path()).unwrap();
    assert!(strings.contains("<b>Salut & bienvenue</b>"));
}

#[test]
fn test_ideographic_space_is_not_blank() {
    let dir = TempDir::new().unwrap();
    let bytes = build_xlsx(&[(
        "Sheet1",
        vec![vec![Cell::Text("\u{3000}"), Cell::Text("x\u{3000}"), Cell::Text(" \t")]],
    )]);
    let path = write_fixture(&dir, "book.xlsx", &bytes);

    let strings = SpreadsheetAdapter::new().extract(&path).unwrap();
    assert_eq!(strings.as_slice(), &["\u{3000}", "x\u{3000}"]);
}

#[test]
fn test_not_a_package() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "broken.xlsx", b"definitely not a zip file");

    let err = SpreadsheetAdapter::new().extract(&path).unwrap_err();
    assert!(matches!(err, DoctransError::Zip(_)));
    assert_eq!(err.category().status_code(), 500);
}

#[test]
fn test_workbook_without_sheets_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "empty.xlsx", &build_xlsx(&[]));
    assert!(SpreadsheetAdapter::new().extract(&path).unwrap().is_empty());
}
