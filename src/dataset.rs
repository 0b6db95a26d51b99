// Delimited text input, missing value handling and train/test splitting

use crate::error::{PcaError, Result};
use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Field values read as missing (`NaN`), compared case-insensitively.
const MISSING_TOKENS: [&str; 5] = ["", "na", "nan", "?", "null"];

/// A numeric table with named columns. Missing entries are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    data: Array2<f64>,
}

/// What to do with missing entries before standardization.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Fail with `MissingValue` on the first missing entry.
    #[default]
    Reject,
    /// Drop every row containing a missing entry.
    DropRows,
    /// Replace missing entries by the mean of the column's present values.
    MeanImpute,
}

/// Splits `line` on `delimiter`, ignoring delimiters inside double quotes.
fn split_fields<'a>(line: &'a str, delimiter: &str) -> Vec<&'a str> {
    let bytes = line.as_bytes();
    let pattern = delimiter.as_bytes();
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            in_quotes = !in_quotes;
            i += 1;
        } else if !in_quotes && bytes[i..].starts_with(pattern) {
            fields.push(&line[start..i]);
            i += pattern.len();
            start = i;
        } else {
            i += 1;
        }
    }
    fields.push(&line[start..]);
    fields
}

fn parse_field(field: &str, line: usize, column: &str) -> Result<f64> {
    let field = field.trim().trim_matches('"').trim();
    if MISSING_TOKENS.iter().any(|t| field.eq_ignore_ascii_case(t)) {
        return Ok(f64::NAN);
    }
    field.parse::<f64>().map_err(|_| PcaError::Parse {
        line,
        message: format!("value '{}' in column '{}' is not numeric", field, column),
    })
}

impl Table {
    /// Builds a table from in-memory columns.
    pub fn new(headers: Vec<String>, data: Array2<f64>) -> Result<Self> {
        if headers.len() != data.ncols() {
            return Err(PcaError::ShapeMismatch { expected: headers.len(), found: data.ncols() });
        }
        Ok(Self { headers, data })
    }

    /// Parses delimited text with a header row.
    ///
    /// Lines starting with `#` and blank lines are skipped. Every data row
    /// must have as many fields as the header. Empty fields and `NA`, `NaN`,
    /// `?`, `null` are read as missing. A delimiter inside double quotes does
    /// not split the field.
    pub fn from_reader<R: BufRead>(reader: R, delimiter: &str) -> Result<Self> {
        if delimiter.is_empty() {
            return Err(PcaError::Config("delimiter must not be empty".into()));
        }
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| match l {
                Ok(text) => {
                    let t = text.trim();
                    !t.is_empty() && !t.starts_with('#')
                }
                Err(_) => true,
            });

        let headers: Vec<String> = match lines.next() {
            Some((_, line)) => {
                let line = line?;
                split_fields(&line, delimiter)
                    .into_iter()
                    .map(|h| h.trim().trim_matches('"').to_string())
                    .collect()
            }
            None => return Err(PcaError::Parse { line: 0, message: "input is empty".into() }),
        };

        let mut values: Vec<f64> = Vec::new();
        let mut n_rows = 0;
        for (line_number, line) in lines {
            let line = line?;
            let fields = split_fields(&line, delimiter);
            if fields.len() != headers.len() {
                return Err(PcaError::Parse {
                    line: line_number,
                    message: format!("expected {} fields, found {}", headers.len(), fields.len()),
                });
            }
            for (field, name) in fields.iter().zip(headers.iter()) {
                values.push(parse_field(field, line_number, name)?);
            }
            trace!("Parsed line {}", line_number);
            n_rows += 1;
        }
        if n_rows == 0 {
            return Err(PcaError::Parse { line: 0, message: "no data rows after header".into() });
        }

        let data = Array2::from_shape_vec((n_rows, headers.len()), values)
            .map_err(|e| PcaError::Parse { line: 0, message: e.to_string() })?;
        debug!("Read table with {} rows and {} columns", n_rows, headers.len());
        Ok(Self { headers, data })
    }

    pub fn from_path<P: AsRef<Path>>(path: P, delimiter: &str) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let table = Self::from_reader(BufReader::new(file), delimiter)?;
        info!(
            "Loaded {:?}: {} rows x {} columns",
            path.as_ref(),
            table.n_rows(),
            table.n_columns()
        );
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn data(&self) -> ArrayView2<f64> {
        self.data.view()
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.data.ncols()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PcaError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<f64>> {
        let index = self.column_index(name)?;
        Ok(self.data.column(index))
    }

    /// Removes the target column, returning the remaining features and the target.
    pub fn split_target(&self, name: &str) -> Result<(Table, Array1<f64>)> {
        let index = self.column_index(name)?;
        let target = self.data.column(index).to_owned();
        let keep: Vec<usize> = (0..self.n_columns()).filter(|&i| i != index).collect();
        let features = Table {
            headers: keep.iter().map(|&i| self.headers[i].clone()).collect(),
            data: self.data.select(Axis(1), &keep),
        };
        Ok((features, target))
    }

    pub fn missing_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    /// Resolves missing entries according to `policy`.
    ///
    /// # Errors
    /// `MissingValue` under `Reject` for the first missing entry, or under
    /// `MeanImpute` for a column with no present values. `InsufficientSamples`
    /// if `DropRows` leaves no rows.
    pub fn handle_missing(self, policy: MissingValuePolicy) -> Result<Table> {
        let missing = self.missing_count();
        if missing == 0 {
            return Ok(self);
        }
        match policy {
            MissingValuePolicy::Reject => {
                let ((row, column), _) = self
                    .data
                    .indexed_iter()
                    .find(|(_, v)| v.is_nan())
                    .ok_or(PcaError::MissingValue { row: 0, column: 0 })?;
                Err(PcaError::MissingValue { row, column })
            }
            MissingValuePolicy::DropRows => {
                let keep: Vec<usize> = self
                    .data
                    .axis_iter(Axis(0))
                    .enumerate()
                    .filter(|(_, row)| row.iter().all(|v| !v.is_nan()))
                    .map(|(i, _)| i)
                    .collect();
                if keep.is_empty() {
                    return Err(PcaError::InsufficientSamples { required: 1, found: 0 });
                }
                warn!("Dropped {} of {} rows with missing values", self.n_rows() - keep.len(), self.n_rows());
                Ok(Table { data: self.data.select(Axis(0), &keep), headers: self.headers })
            }
            MissingValuePolicy::MeanImpute => {
                let mut data = self.data;
                for (column, mut values) in data.axis_iter_mut(Axis(1)).enumerate() {
                    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
                    if present.is_empty() {
                        return Err(PcaError::MissingValue { row: 0, column });
                    }
                    let mean = present.iter().sum::<f64>() / present.len() as f64;
                    values.mapv_inplace(|v| if v.is_nan() { mean } else { v });
                }
                warn!("Imputed {} missing values with column means", missing);
                Ok(Table { data, headers: self.headers })
            }
        }
    }
}

/// Rows partitioned into a training and a held-out test set.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Option<Array1<f64>>,
    pub y_test: Option<Array1<f64>>,
}

/// Shuffles rows with a seeded `ChaCha8Rng` and holds out `test_fraction` of them.
///
/// The test size is `round(n * test_fraction)`; both sides must end up non-empty.
pub fn train_test_split(
    features: ArrayView2<f64>,
    target: Option<ArrayView1<f64>>,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let n = features.nrows();
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PcaError::InvalidSplit(format!("test fraction {} is outside (0, 1)", test_fraction)));
    }
    if let Some(y) = target {
        if y.len() != n {
            return Err(PcaError::ShapeMismatch { expected: n, found: y.len() });
        }
    }
    let n_test = (n as f64 * test_fraction).round() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PcaError::InvalidSplit(format!(
            "{} rows with test fraction {} leaves an empty split",
            n, test_fraction
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);
    debug!("Split {} rows into {} train / {} test (seed {})", n, train_idx.len(), test_idx.len(), seed);

    Ok(TrainTestSplit {
        x_train: features.select(Axis(0), train_idx),
        x_test: features.select(Axis(0), test_idx),
        y_train: target.map(|y| y.select(Axis(0), train_idx)),
        y_test: target.map(|y| y.select(Axis(0), test_idx)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Cursor;

    const AUTO: &str = "\
# mpg-like sample
mpg,cylinders,displacement,horsepower,weight
18.0,8,307.0,130,3504
15.0,8,350.0,165,3693
18.0,8,318.0,?,3436
16.0,8,304.0,150,3433

17.0,8,302.0,140,3449
";

    #[test]
    fn parses_header_rows_and_missing_tokens() {
        let table = Table::from_reader(Cursor::new(AUTO), ",").unwrap();
        assert_eq!(table.headers(), &["mpg", "cylinders", "displacement", "horsepower", "weight"]);
        assert_eq!(table.n_rows(), 5);
        assert_eq!(table.missing_count(), 1);
        assert!(table.data()[[2, 3]].is_nan());
        assert_eq!(table.data()[[4, 4]], 3449.0);
    }

    #[test]
    fn ragged_row_is_parse_error() {
        let text = "a,b\n1,2\n3\n";
        match Table::from_reader(Cursor::new(text), ",") {
            Err(PcaError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn quoted_fields_may_contain_the_delimiter() {
        let text = "\"weight, lbs\",\"mpg, city\"\n\"3504\",18.0\n3693,\"15\"\n";
        let table = Table::from_reader(Cursor::new(text), ",").unwrap();
        assert_eq!(table.headers(), &["weight, lbs", "mpg, city"]);
        assert_eq!(table.n_columns(), 2);
        assert_eq!(table.data()[[0, 0]], 3504.0);
        assert_eq!(table.data()[[1, 1]], 15.0);
    }

    #[test]
    fn non_numeric_field_is_parse_error() {
        let text = "a;b\n1;chevrolet\n";
        assert!(matches!(Table::from_reader(Cursor::new(text), ";"), Err(PcaError::Parse { line: 2, .. })));
    }

    #[test]
    fn split_target_removes_column() {
        let table = Table::from_reader(Cursor::new(AUTO), ",").unwrap();
        let (features, target) = table.split_target("mpg").unwrap();
        assert_eq!(features.n_columns(), 4);
        assert_eq!(features.headers()[0], "cylinders");
        assert_eq!(target.to_vec(), vec![18.0, 15.0, 18.0, 16.0, 17.0]);
        assert!(matches!(table.split_target("origin"), Err(PcaError::UnknownColumn(_))));
    }

    #[test]
    fn missing_value_policies() {
        let table = Table::from_reader(Cursor::new(AUTO), ",").unwrap();

        assert!(matches!(
            table.clone().handle_missing(MissingValuePolicy::Reject),
            Err(PcaError::MissingValue { row: 2, column: 3 })
        ));

        let dropped = table.clone().handle_missing(MissingValuePolicy::DropRows).unwrap();
        assert_eq!(dropped.n_rows(), 4);
        assert_eq!(dropped.missing_count(), 0);

        let imputed = table.handle_missing(MissingValuePolicy::MeanImpute).unwrap();
        assert_eq!(imputed.n_rows(), 5);
        assert_eq!(imputed.data()[[2, 3]], (130.0 + 165.0 + 150.0 + 140.0) / 4.0);
    }

    #[test]
    fn split_is_seeded_and_disjoint() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * 2 + j) as f64);
        let y = Array1::from_iter((0..10).map(|i| i as f64));
        let a = train_test_split(x.view(), Some(y.view()), 0.3, 7).unwrap();
        let b = train_test_split(x.view(), Some(y.view()), 0.3, 7).unwrap();
        assert_eq!(a.x_test, b.x_test);
        assert_eq!(a.x_train.nrows(), 7);
        assert_eq!(a.x_test.nrows(), 3);

        let mut seen: Vec<f64> = a.y_train.unwrap().to_vec();
        seen.extend(a.y_test.unwrap().to_vec());
        seen.sort_by(|p, q| p.partial_cmp(q).unwrap());
        assert_eq!(seen, (0..10).map(|i| i as f64).collect::<Vec<_>>());
        // Features stay aligned with the target.
        for row in a.x_test.rows() {
            assert_eq!(row[1], row[0] + 1.0);
        }
    }

    #[test]
    fn invalid_split_fractions() {
        let x = array![[1.0], [2.0], [3.0]];
        assert!(matches!(train_test_split(x.view(), None, 0.0, 1), Err(PcaError::InvalidSplit(_))));
        assert!(matches!(train_test_split(x.view(), None, 1.0, 1), Err(PcaError::InvalidSplit(_))));
        assert!(matches!(train_test_split(x.view(), None, 0.1, 1), Err(PcaError::InvalidSplit(_))));
    }
}
