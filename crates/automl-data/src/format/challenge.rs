use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::Array2;

use crate::error::{DataError, DataResult};
use crate::format::{parse_matrix, read_text};
use crate::handle::{DatasetParts, FeatureType};
use crate::task::TaskKind;

const REQUIRED_SUFFIXES: [&str; 2] = ["train.data", "train.solution"];
const OPTIONAL_SUFFIXES: [&str; 5] = [
    "valid.data",
    "test.data",
    "test.solution",
    "feat.type",
    "public.info",
];

fn dataset_name(dir: &Path) -> DataResult<String> {
    dir.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .ok_or_else(|| DataError::format(format!("invalid dataset directory: {}", dir.display())))
}

fn component(dir: &Path, name: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{name}_{suffix}"))
}

pub(super) fn component_files(dir: &Path) -> DataResult<Vec<PathBuf>> {
    let name = dataset_name(dir)?;
    let mut files = Vec::new();
    for suffix in REQUIRED_SUFFIXES {
        let path = component(dir, &name, suffix);
        if !path.is_file() {
            return Err(DataError::format(format!(
                "missing dataset file: {}",
                path.display()
            )));
        }
        files.push(path);
    }
    files.extend(
        OPTIONAL_SUFFIXES
            .iter()
            .map(|suffix| component(dir, &name, suffix))
            .filter(|path| path.is_file()),
    );
    Ok(files)
}

fn read_optional_matrix(path: PathBuf) -> DataResult<Option<Array2<f64>>> {
    if path.is_file() {
        Ok(Some(parse_matrix(&read_text(&path)?, None, 0, &path)?))
    } else {
        Ok(None)
    }
}

/// Parses `key = value` lines. Values may be quoted.
fn parse_info(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            (key.trim().to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

fn parse_feature_types(text: &str, path: &Path) -> DataResult<Vec<FeatureType>> {
    text.split_whitespace()
        .map(|token| {
            token.parse::<FeatureType>().map_err(|e| {
                DataError::format(format!("{}: {e}", path.display()))
            })
        })
        .collect()
}

pub(super) fn read(dir: &Path) -> DataResult<DatasetParts> {
    let name = dataset_name(dir)?;
    debug!("reading challenge dataset {name} from {}", dir.display());

    let path = component(dir, &name, "train.data");
    let x_train = parse_matrix(&read_text(&path)?, None, 0, &path)?;
    let path = component(dir, &name, "train.solution");
    let y_train = parse_matrix(&read_text(&path)?, None, 0, &path)?;
    let x_valid = read_optional_matrix(component(dir, &name, "valid.data"))?;
    let x_test = read_optional_matrix(component(dir, &name, "test.data"))?;
    let y_test = read_optional_matrix(component(dir, &name, "test.solution"))?;

    let path = component(dir, &name, "feat.type");
    let feature_types = if path.is_file() {
        Some(parse_feature_types(&read_text(&path)?, &path)?)
    } else {
        None
    };

    let path = component(dir, &name, "public.info");
    let info = if path.is_file() {
        parse_info(&read_text(&path)?)
    } else {
        HashMap::new()
    };
    let task = info
        .get("task")
        .map(|task| task.parse::<TaskKind>())
        .transpose()
        .map_err(|e| DataError::format(format!("{}: {e}", path.display())))?;
    let metric = info.get("metric").filter(|m| !m.is_empty()).cloned();

    Ok(DatasetParts {
        dataset_id: name,
        x_train,
        y_train,
        x_valid,
        x_test,
        y_test,
        feature_types,
        task,
        metric,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ndarray::array;

    use super::*;

    fn write_dataset(root: &Path) -> PathBuf {
        let dir = root.join("31_bac");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("31_bac_train.data"), "1 12 2\n3 4 5\n6 7 8\n").unwrap();
        fs::write(
            dir.join("31_bac_train.solution"),
            "1 0 0\n0 1 0\n0 0 1\n",
        )
        .unwrap();
        fs::write(dir.join("31_bac_feat.type"), "Numerical\nCategorical\nBinary\n").unwrap();
        fs::write(
            dir.join("31_bac_public.info"),
            "name = '31_bac'\ntask = 'multiclass.classification'\nmetric = 'bac_metric'\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_read_challenge_dataset() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_dataset(root.path());
        let parts = read(&dir).unwrap();
        assert_eq!(parts.dataset_id, "31_bac");
        assert_eq!(parts.x_train.row(0).to_vec(), vec![1.0, 12.0, 2.0]);
        assert_eq!(parts.y_train.ncols(), 3);
        assert_eq!(parts.task, Some(TaskKind::MulticlassClassification));
        assert_eq!(parts.metric.as_deref(), Some("bac_metric"));
        assert_eq!(
            parts.feature_types,
            Some(vec![
                FeatureType::Numerical,
                FeatureType::Categorical,
                FeatureType::Binary
            ])
        );
        assert_eq!(parts.x_test, None);
        assert_eq!(parts.y_train, array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_component_files() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_dataset(root.path());
        let files = component_files(&dir).unwrap();
        assert_eq!(files.len(), 4);
        fs::remove_file(dir.join("31_bac_train.solution")).unwrap();
        assert!(matches!(
            component_files(&dir),
            Err(DataError::DatasetFormat(_))
        ));
    }

    #[test]
    fn test_parse_info() {
        let info = parse_info("task = \"regression\"\nusage = 'x = y'\nno value line\n");
        assert_eq!(info.get("task").map(String::as_str), Some("regression"));
        assert_eq!(info.get("usage").map(String::as_str), Some("x = y"));
        assert_eq!(info.len(), 2);
    }
}
