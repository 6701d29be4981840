use crate::error::{FsError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub X: Vec<Vec<f64>>,         // Feature matrix, one row per sample
    pub y: Vec<f64>,              // Target values (class index when classes is not empty)
    pub features: Vec<String>,    // Feature names, in column order
    pub target: String,
    pub classes: Vec<String>,     // Class labels by index, empty for numeric targets
    pub feature_len: usize,
    pub sample_len: usize,
}

impl Data {
    /// Create a new `Data` instance with default values
    pub fn new() -> Data {
        Data {
            X: Vec::new(),
            y: Vec::new(),
            features: Vec::new(),
            target: String::new(),
            classes: Vec::new(),
            feature_len: 0,
            sample_len: 0,
        }
    }

    /// Load a CSV file with a header line. The `target` column becomes `y`,
    /// every other column is a feature and must be numeric.
    pub fn load_data<P: AsRef<Path>>(&mut self, path: P, target: &str, delimiter: char) -> Result<()> {
        let path = path.as_ref();
        info!("Loading file {}...", path.display());

        if !delimiter.is_ascii() {
            return Err(FsError::Config(format!("Delimiter {:?} is not an ASCII character", delimiter)));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter as u8)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let target_idx = headers.iter().position(|h| h == target).ok_or_else(|| {
            FsError::Data(format!(
                "Target column '{}' not found in {} (columns: {})",
                target,
                path.display(),
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })?;

        let feature_columns: Vec<usize> = (0..headers.len()).filter(|&c| c != target_idx).collect();
        self.features = feature_columns.iter().map(|&c| headers[c].to_string()).collect();
        self.target = target.to_string();

        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut raw_targets: Vec<String> = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let mut row = Vec::with_capacity(feature_columns.len());
            for &c in &feature_columns {
                let field = record.get(c).unwrap_or("");
                let value: f64 = field.parse().map_err(|_| {
                    FsError::Data(format!(
                        "Non numeric value {:?} for feature '{}' at data line {}",
                        field,
                        &headers[c],
                        line + 1
                    ))
                })?;
                row.push(value);
            }
            rows.push(row);
            raw_targets.push(record.get(target_idx).unwrap_or("").to_string());
        }

        (self.y, self.classes) = encode_target(&raw_targets)?;
        self.X = rows;
        self.feature_len = self.features.len();
        self.sample_len = self.X.len();

        if self.feature_len == 0 {
            return Err(FsError::Data(format!("{} has no feature column besides the target", path.display())));
        }
        if self.sample_len == 0 {
            return Err(FsError::Data(format!("{} has no data line", path.display())));
        }

        info!("{} samples and {} features loaded", self.sample_len, self.feature_len);
        if self.classes.len() == 1 {
            warn!("Target '{}' has a single class: every classifier score will be trivial.", target);
        }

        Ok(())
    }

    /// Keep only the given feature columns, in the given order
    pub fn select_columns(&self, columns: &[usize]) -> Data {
        Data {
            X: self.X.iter().map(|row| columns.iter().map(|&j| row[j]).collect()).collect(),
            y: self.y.clone(),
            features: columns.iter().map(|&j| self.features[j].clone()).collect(),
            target: self.target.clone(),
            classes: self.classes.clone(),
            feature_len: columns.len(),
            sample_len: self.sample_len,
        }
    }

    /// filter Data for some samples (represented by a Vector of indices)
    pub fn subset(&self, samples: &[usize]) -> Data {
        Data {
            X: samples.iter().map(|&i| self.X[i].clone()).collect(),
            y: samples.iter().map(|&i| self.y[i]).collect(),
            features: self.features.clone(),
            target: self.target.clone(),
            classes: self.classes.clone(),
            feature_len: self.feature_len,
            sample_len: samples.len(),
        }
    }

    /// Target values seen as class indices, when they all are non negative integers
    pub fn class_labels(&self) -> Option<Vec<usize>> {
        if self.y.iter().all(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0) {
            Some(self.y.iter().map(|v| *v as usize).collect())
        } else {
            None
        }
    }

    /// sha256 of the matrix, target and names, used to tie results to their input
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.features {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.target.as_bytes());
        for row in &self.X {
            for v in row {
                hasher.update(v.to_le_bytes());
            }
        }
        for v in &self.y {
            hasher.update(v.to_le_bytes());
        }
        hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Numeric targets are kept as they are; otherwise labels are encoded 0..n in
/// order of first appearance and returned as class names.
fn encode_target(raw: &[String]) -> Result<(Vec<f64>, Vec<String>)> {
    if raw.iter().any(|v| v.is_empty()) {
        return Err(FsError::Data("Empty target value".to_string()));
    }

    let numeric: Option<Vec<f64>> = raw.iter().map(|v| v.parse::<f64>().ok()).collect();
    if let Some(y) = numeric {
        return Ok((y, Vec::new()));
    }

    let mut classes: Vec<String> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let y = raw
        .iter()
        .map(|label| {
            let next = classes.len();
            let idx = *index.entry(label.as_str()).or_insert_with(|| {
                classes.push(label.clone());
                next
            });
            idx as f64
        })
        .collect();

    Ok((y, classes))
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Features: {}   Samples: {}   Target: {}", self.feature_len, self.sample_len, self.target)?;

        let header = self.features.iter().take(8).map(|n| format!("{:>10.10}", n)).collect::<Vec<_>>().join(" ");
        writeln!(f, "X: {}{}", header, if self.feature_len > 8 { " ..." } else { "" })?;
        // Limit to the first 10 rows
        for (row, y) in self.X.iter().zip(self.y.iter()).take(10) {
            let values = row.iter().take(8).map(|v| format!("{:>10.3}", v)).collect::<Vec<_>>().join(" ");
            let label = if self.classes.is_empty() {
                format!("{}", y)
            } else {
                self.classes.get(*y as usize).cloned().unwrap_or_default()
            };
            writeln!(f, "   {} | {}", values, label)?;
        }
        if !self.classes.is_empty() {
            writeln!(f, "Classes: {}", self.classes.join(", "))?;
        }

        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}

// unit tests
#[cfg(test)]
pub mod tests {
    use super::*;
    use std::io::Write;

    impl Data {
        /// 8 samples, 3 features, binary target: feature 0 separates the classes
        pub fn test() -> Data {
            let X = vec![
                vec![0.1, 5.0, 1.0],
                vec![0.2, 3.0, 0.0],
                vec![0.3, 4.0, 1.0],
                vec![0.1, 6.0, 0.0],
                vec![0.9, 5.0, 1.0],
                vec![0.8, 3.0, 0.0],
                vec![0.7, 4.0, 1.0],
                vec![0.9, 6.0, 0.0],
            ];
            Data {
                X,
                y: vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
                features: crate::string_vec!["signal", "noise", "parity"],
                target: "label".to_string(),
                classes: Vec::new(),
                feature_len: 3,
                sample_len: 8,
            }
        }
    }

    pub fn write_temp_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("genfs_{}_{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_data_numeric_target() {
        let path = write_temp_file("numeric.csv", "a,b,y,c\n1,2,0,3\n4,5,1,6\n7,8,1,9\n");
        let mut data = Data::new();
        data.load_data(&path, "y", ',').unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(data.features, vec!["a", "b", "c"], "target column must be removed, order kept");
        assert_eq!(data.X, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]]);
        assert_eq!(data.y, vec![0.0, 1.0, 1.0]);
        assert!(data.classes.is_empty());
        assert_eq!(data.feature_len, 3);
        assert_eq!(data.sample_len, 3);
    }

    #[test]
    fn test_load_data_label_target_is_encoded() {
        let path = write_temp_file("labels.csv", "x;species\n1.5;setosa\n2.5;virginica\n0.5;setosa\n");
        let mut data = Data::new();
        data.load_data(&path, "species", ';').unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(data.classes, vec!["setosa", "virginica"]);
        assert_eq!(data.y, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_load_data_missing_target_column() {
        let path = write_temp_file("notarget.csv", "a,b\n1,2\n");
        let mut data = Data::new();
        let result = data.load_data(&path, "label", ',');
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(FsError::Data(_))));
    }

    #[test]
    fn test_load_data_non_numeric_feature() {
        let path = write_temp_file("text.csv", "a,label\nhello,1\n");
        let mut data = Data::new();
        let result = data.load_data(&path, "label", ',');
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(FsError::Data(_))));
    }

    #[test]
    fn test_select_columns_projects_in_order() {
        let data = Data::test();
        let projected = data.select_columns(&[2, 0]);
        assert_eq!(projected.feature_len, 2);
        assert_eq!(projected.features, vec!["parity", "signal"]);
        assert_eq!(projected.X[0], vec![1.0, 0.1]);
        assert_eq!(projected.y, data.y);
    }

    #[test]
    fn test_subset_keeps_rows_and_targets_aligned() {
        let data = Data::test();
        let sub = data.subset(&[4, 0]);
        assert_eq!(sub.sample_len, 2);
        assert_eq!(sub.X[0], data.X[4]);
        assert_eq!(sub.y, vec![1.0, 0.0]);
    }

    #[test]
    fn test_class_labels() {
        assert_eq!(Data::test().class_labels().unwrap(), vec![0, 0, 0, 0, 1, 1, 1, 1]);
        let mut data = Data::test();
        data.y[0] = 0.5;
        assert!(data.class_labels().is_none());
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let data = Data::test();
        let mut other = Data::test();
        assert_eq!(data.fingerprint(), other.fingerprint());
        other.X[3][1] = 42.0;
        assert_ne!(data.fingerprint(), other.fingerprint());
        assert_eq!(data.fingerprint().len(), 64);
    }
}
