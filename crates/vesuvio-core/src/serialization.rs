use crate::domain::{ReductionError, ReductionResult};
use crate::workspace::Workspace;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const COLUMN_WIDTH: usize = 16;
const COLUMN_PRECISION: usize = 8;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!("{value:>width$.precision$}")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

/// Plain-text table: one block per spectrum, columns `x y e`, with `x` at
/// bin centres for histogram rows.
pub fn render_workspace_table(workspace: &Workspace) -> String {
    let mut table = String::new();
    let _ = writeln!(table, "# workspace {}", workspace.name());
    for spectrum in workspace.spectra() {
        let _ = writeln!(
            table,
            "# spectrum {} bins {}",
            spectrum.spectrum_id,
            spectrum.bin_count()
        );
        for ((x, y), e) in spectrum.positions().iter().zip(&spectrum.y).zip(&spectrum.e) {
            let _ = writeln!(
                table,
                "{}{}{}",
                format_fixed_f64(*x, COLUMN_WIDTH, COLUMN_PRECISION),
                format_fixed_f64(*y, COLUMN_WIDTH, COLUMN_PRECISION),
                format_fixed_f64(*e, COLUMN_WIDTH, COLUMN_PRECISION)
            );
        }
    }
    normalize_text_artifact(&table)
}

pub fn write_workspace_table(path: &Path, workspace: &Workspace) -> ReductionResult<()> {
    fs::write(path, render_workspace_table(workspace)).map_err(|source| output_error(path, source))
}

pub fn write_workspace_json(path: &Path, workspace: &Workspace) -> ReductionResult<()> {
    let mut content = serde_json::to_string_pretty(workspace).map_err(|source| {
        ReductionError::internal(
            "SYS.SERIALIZE",
            format!("failed to serialize workspace '{}': {}", workspace.name(), source),
        )
    })?;
    content.push('\n');
    fs::write(path, content).map_err(|source| output_error(path, source))
}

/// `.json` paths get the JSON form, anything else the text table.
pub fn write_workspace(path: &Path, workspace: &Workspace) -> ReductionResult<()> {
    let is_json = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if is_json {
        write_workspace_json(path, workspace)
    } else {
        write_workspace_table(path, workspace)
    }
}

fn output_error(path: &Path, source: std::io::Error) -> ReductionError {
    ReductionError::io_system(
        "IO.OUTPUT_WRITE",
        format!("failed to write output '{}': {}", path.display(), source),
    )
}
