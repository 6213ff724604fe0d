mod challenge;
mod delimited;

use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::error::{DataError, DataResult};
use crate::handle::DatasetParts;

/// Lists the files composing the dataset at the path.
/// The path must be canonical.
pub fn dataset_files(path: &Path) -> DataResult<Vec<PathBuf>> {
    if path.is_dir() {
        challenge::component_files(path)
    } else if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(DataError::format(format!(
            "dataset path is neither a file nor a directory: {}",
            path.display()
        )))
    }
}

/// Reads the dataset at the path.
/// A directory is read as a challenge dataset and a file as delimited text.
pub fn read_dataset(path: &Path) -> DataResult<DatasetParts> {
    if path.is_dir() {
        challenge::read(path)
    } else {
        delimited::read(path)
    }
}

/// Parses numeric rows split by the delimiter, or by whitespace if there is none.
/// Blank lines are skipped. `skip` is the number of leading non-blank lines to ignore.
pub(crate) fn parse_matrix(
    text: &str,
    delimiter: Option<char>,
    skip: usize,
    source: &Path,
) -> DataResult<Array2<f64>> {
    let mut values = Vec::new();
    let mut columns: Option<usize> = None;
    let mut rows = 0;
    let lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .skip(skip);
    for (number, line) in lines {
        let cells: Vec<&str> = match delimiter {
            Some(d) => line.split(d).map(str::trim).collect(),
            None => line.split_whitespace().collect(),
        };
        match columns {
            None => columns = Some(cells.len()),
            Some(n) if n != cells.len() => {
                return Err(DataError::format(format!(
                    "{}:{}: expected {n} values, found {}",
                    source.display(),
                    number + 1,
                    cells.len()
                )));
            }
            Some(_) => {}
        }
        for cell in cells {
            let value = parse_value(cell).ok_or_else(|| {
                DataError::format(format!(
                    "{}:{}: invalid number: {cell:?}",
                    source.display(),
                    number + 1
                ))
            })?;
            values.push(value);
        }
        rows += 1;
    }
    Array2::from_shape_vec((rows, columns.unwrap_or(0)), values)
        .map_err(|e| DataError::internal(e.to_string()))
}

pub(crate) fn parse_value(cell: &str) -> Option<f64> {
    let value = cell.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

pub(crate) fn read_text(path: &Path) -> DataResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| DataError::format(format!("cannot read {}: {e}", path.display())))
}
