use std::path::Path;

use log::debug;
use ndarray::{s, Array2};

use crate::error::{DataError, DataResult};
use crate::format::{parse_matrix, parse_value, read_text};
use crate::handle::DatasetParts;

const DELIMITER: char = ',';

/// Reads comma-separated rows with the label in the last column.
/// The first row is a header if any of its cells is not a number.
pub(super) fn read(path: &Path) -> DataResult<DatasetParts> {
    let text = read_text(path)?;
    let header = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.split(DELIMITER).any(|cell| parse_value(cell.trim()).is_none()));
    debug!("reading delimited dataset {} (header: {header})", path.display());

    let matrix = parse_matrix(&text, Some(DELIMITER), usize::from(header), path)?;
    if matrix.nrows() > 0 && matrix.ncols() < 2 {
        return Err(DataError::format(format!(
            "{}: expected at least one feature column and a label column",
            path.display()
        )));
    }
    let (x_train, y_train) = if matrix.nrows() == 0 {
        (Array2::zeros((0, 0)), Array2::zeros((0, 1)))
    } else {
        let label = matrix.ncols() - 1;
        (
            matrix.slice(s![.., ..label]).to_owned(),
            matrix.slice(s![.., label..]).to_owned(),
        )
    };
    let dataset_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("dataset")
        .to_string();

    Ok(DatasetParts {
        dataset_id,
        x_train,
        y_train,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ndarray::array;

    use super::*;

    #[test]
    fn test_read_delimited_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.csv");
        fs::write(&path, "a,b,label\n0.5,1,0\n1.5,2,1\n").unwrap();
        let parts = read(&path).unwrap();
        assert_eq!(parts.dataset_id, "blobs");
        assert_eq!(parts.x_train, array![[0.5, 1.0], [1.5, 2.0]]);
        assert_eq!(parts.y_train, array![[0.0], [1.0]]);
        assert_eq!(parts.task, None);
    }

    #[test]
    fn test_read_delimited_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.csv");
        fs::write(&path, "1,2,3.5\n4,5,6.5\n").unwrap();
        let parts = read(&path).unwrap();
        assert_eq!(parts.x_train.nrows(), 2);
        assert_eq!(parts.y_train, array![[3.5], [6.5]]);
    }

    #[test]
    fn test_read_delimited_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.csv");
        fs::write(&path, "1\n2\n").unwrap();
        assert!(matches!(read(&path), Err(DataError::DatasetFormat(_))));

        let path = dir.path().join("header_only.csv");
        fs::write(&path, "a,b\n").unwrap();
        let parts = read(&path).unwrap();
        assert_eq!(parts.x_train.nrows(), 0);
    }
}
