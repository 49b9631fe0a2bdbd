use crate::clock::Clock;
use crate::error::ExportError;
use crate::types::{FolderSummary, Report};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const HEADERS: [&str; 5] = [
    "Folder Name",
    "Total Size (Bytes)",
    "File Name",
    "File Size (Bytes)",
    "Last Modified",
];

const MAX_SHEET_NAME: usize = 31;
const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Writes `report` to `out_dir/folder_details_<epoch-millis>.xlsx`, one sheet per folder.
pub fn build_document(
    report: &Report,
    out_dir: &Path,
    clock: &dyn Clock,
) -> Result<PathBuf, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    // Excel reserves "History" for itself
    let mut taken = HashSet::from(["history".to_string()]);

    if report.folders.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        sheet.write_string(0, 0, "No folders found")?;
    }

    for folder in &report.folders {
        let sheet = workbook.add_worksheet();
        let name = sheet_name(&folder.name, &mut taken);
        let rejected = sheet.set_name(name.as_str()).err();
        if let Some(e) = rejected {
            log::warn!("sheet name '{name}' rejected ({e}), using a generated one");
            sheet.set_name(sheet_name("Folder", &mut taken))?;
        }
        write_folder(sheet, folder, &bold)?;
    }

    let path = out_dir.join(format!(
        "folder_details_{}.xlsx",
        clock.now().timestamp_millis()
    ));
    workbook.save(&path)?;
    log::info!(
        "wrote {} ({} sheets)",
        path.display(),
        report.folders.len().max(1)
    );
    Ok(path)
}

// Sizes above 2^53 bytes lose precision as spreadsheet numbers
#[allow(clippy::cast_precision_loss)]
fn write_folder(
    sheet: &mut Worksheet,
    folder: &FolderSummary,
    bold: &Format,
) -> Result<(), ExportError> {
    for (col, label) in (0u16..).zip(HEADERS) {
        sheet.write_string_with_format(0, col, label, bold)?;
    }

    sheet.write_string(1, 0, &folder.name)?;
    sheet.write_number(1, 1, folder.size as f64)?;

    for (row, file) in (2u32..).zip(&folder.files) {
        sheet.write_string(row, 2, &file.name)?;
        sheet.write_number(row, 3, file.size as f64)?;
        sheet.write_string(row, 4, file.modified.format("%Y-%m-%d %H:%M:%S").to_string())?;
    }

    sheet.set_column_width(0, 24.0)?;
    sheet.set_column_width(2, 32.0)?;
    sheet.set_column_width(4, 20.0)?;
    Ok(())
}

/// Turns a folder name into a sheet name Excel accepts and that isn't already in `taken`.
///
/// `taken` holds lowercased names since Excel compares sheet names case-insensitively.
pub fn sheet_name(folder: &str, taken: &mut HashSet<String>) -> String {
    let cleaned: String = folder.chars().filter(|c| !FORBIDDEN.contains(c)).collect();
    let base = fit(&cleaned, MAX_SHEET_NAME);

    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({n})");
        let stem = fit(&base, MAX_SHEET_NAME - suffix.chars().count());
        candidate = format!("{stem}{suffix}");
        n += 1;
    }

    taken.insert(candidate.to_lowercase());
    candidate
}

/// Truncates to `max` characters, then drops apostrophes Excel won't allow at either end.
fn fit(name: &str, max: usize) -> String {
    let truncated: String = name.trim_matches('\'').chars().take(max).collect();
    let trimmed = truncated.trim_matches('\'');
    if trimmed.is_empty() {
        "Folder".to_string()
    } else {
        trimmed.to_string()
    }
}
