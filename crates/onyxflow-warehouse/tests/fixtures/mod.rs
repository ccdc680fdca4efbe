//! Test fixtures for loader integration tests
//!
//! Source files shaped like the daily game performance extract, with the
//! mixed-case headers it is delivered with.

use std::io::Write;
use tempfile::NamedTempFile;

/// Header row as delivered: mixed case, stray spaces
pub const MIXED_CASE_HEADER: &str =
    "Bus_Date, Venue_Code,EGM_Description,Manufacturer,Fp,Turnover_Sum,Gmp_Sum,Games_Played_Sum ";

/// Normalized column names, in schema order
pub const NORMALIZED_COLUMNS: [&str; 8] = [
    "BUS_DATE",
    "VENUE_CODE",
    "EGM_DESCRIPTION",
    "MANUFACTURER",
    "FP",
    "TURNOVER_SUM",
    "GMP_SUM",
    "GAMES_PLAYED_SUM",
];

/// Data rows for `count` machines on one business day
pub fn game_rows(count: usize) -> Vec<Vec<String>> {
    (0..count)
        .map(|i| {
            vec![
                "2024-03-01".to_string(),
                format!("V{:03}", i % 3),
                format!("Dragon Link {}", i),
                if i % 2 == 0 { "Aristocrat" } else { "Light & Wonder" }.to_string(),
                format!("FP{}", 100 + i),
                format!("{}.50", 1000 + i * 10),
                format!("{}.25", 80 + i),
                format!("{}", 200 + i),
            ]
        })
        .collect()
}

/// Render header and rows as CSV text
pub fn render_csv(header: &str, rows: &[Vec<String>]) -> String {
    let mut text = String::from(header);
    text.push('\n');
    for row in rows {
        text.push_str(&row.join(","));
        text.push('\n');
    }
    text
}

/// Write CSV text to a temp file that lives as long as the handle
pub fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp csv");
    file.write_all(contents.as_bytes()).expect("write temp csv");
    file
}

/// A mixed-case source file with `count` rows
pub fn game_performance_file(count: usize) -> (NamedTempFile, Vec<Vec<String>>) {
    let rows = game_rows(count);
    (csv_file(&render_csv(MIXED_CASE_HEADER, &rows)), rows)
}
