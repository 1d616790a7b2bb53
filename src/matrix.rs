use crate::error::{GlmError, Result};
use std::collections::HashMap;

/// Physical storage kind of a design-matrix column (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    Dense,
    Sparse,
    Indicator,
}

/// One column of the design matrix.
///
/// `Sparse` and `Indicator` rows are stored in strictly increasing row-index
/// order; `DesignMatrix::push_column` enforces this on construction so every
/// downstream consumer can rely on it without re-checking.
#[derive(Debug, Clone)]
pub enum Column {
    Dense(Vec<f64>),
    Sparse { index: Vec<usize>, value: Vec<f64> },
    Indicator(Vec<usize>),
}

impl Column {
    pub fn format(&self) -> ColumnFormat {
        match self {
            Column::Dense(_) => ColumnFormat::Dense,
            Column::Sparse { .. } => ColumnFormat::Sparse,
            Column::Indicator(_) => ColumnFormat::Indicator,
        }
    }

    fn validate(&self, n_rows: usize) -> Result<()> {
        match self {
            Column::Dense(v) => {
                if v.len() != n_rows {
                    return Err(GlmError::ShapeMismatch(format!(
                        "dense column has {} rows, expected {}",
                        v.len(),
                        n_rows
                    )));
                }
            }
            Column::Sparse { index, value } => {
                if index.len() != value.len() {
                    return Err(GlmError::ShapeMismatch(format!(
                        "sparse column index/value length mismatch: {} vs {}",
                        index.len(),
                        value.len()
                    )));
                }
                check_strictly_increasing(index, n_rows)?;
            }
            Column::Indicator(index) => check_strictly_increasing(index, n_rows)?,
        }
        Ok(())
    }

    /// Lazy, restartable iteration over `(row_index, value)` pairs with
    /// strictly increasing row indices (spec.md §4.1 guarantee).
    pub fn iterate(&self) -> ColumnIter<'_> {
        match self {
            Column::Dense(v) => ColumnIter::Dense(v.iter().enumerate()),
            Column::Sparse { index, value } => ColumnIter::Sparse(index.iter().zip(value.iter())),
            Column::Indicator(index) => ColumnIter::Indicator(index.iter()),
        }
    }
}

fn check_strictly_increasing(index: &[usize], n_rows: usize) -> Result<()> {
    for w in index.windows(2) {
        if w[1] <= w[0] {
            return Err(GlmError::Data(
                "column row indices must be strictly increasing".into(),
            ));
        }
    }
    if let Some(&last) = index.last() {
        if last >= n_rows {
            return Err(GlmError::ShapeMismatch(format!(
                "row index {} out of bounds for {} rows",
                last, n_rows
            )));
        }
    }
    Ok(())
}

/// Iterator over a column's nonzero `(row, value)` pairs.
pub enum ColumnIter<'a> {
    Dense(std::iter::Enumerate<std::slice::Iter<'a, f64>>),
    Sparse(std::iter::Zip<std::slice::Iter<'a, usize>, std::slice::Iter<'a, f64>>),
    Indicator(std::slice::Iter<'a, usize>),
}

impl<'a> Iterator for ColumnIter<'a> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ColumnIter::Dense(it) => it.next().map(|(i, &v)| (i, v)),
            ColumnIter::Sparse(it) => it.next().map(|(&i, &v)| (i, v)),
            ColumnIter::Indicator(it) => it.next().map(|&i| (i, 1.0)),
        }
    }
}

struct NamedColumn {
    name: String,
    data: Column,
}

/// N rows x J columns design matrix (spec.md §3). Read-mostly after
/// construction; column index and beta index coincide.
pub struct DesignMatrix {
    columns: Vec<NamedColumn>,
    by_name: HashMap<String, usize>,
    n_rows: usize,
}

impl DesignMatrix {
    pub fn new(n_rows: usize) -> Self {
        DesignMatrix {
            columns: Vec::new(),
            by_name: HashMap::new(),
            n_rows,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn push_column(&mut self, name: impl Into<String>, data: Column) -> Result<usize> {
        data.validate(self.n_rows)?;
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(GlmError::Configuration(format!(
                "duplicate column name '{}'",
                name
            )));
        }
        let j = self.columns.len();
        self.by_name.insert(name.clone(), j);
        self.columns.push(NamedColumn { name, data });
        Ok(j)
    }

    /// Prepends an implicit `(Intercept)` indicator column, as spec.md §3
    /// describes ("extended with an implicit intercept only if the caller
    /// supplied one"). Must be called before any other columns are pushed,
    /// mirroring how the intercept occupies beta index 0 in the reference.
    pub fn with_intercept(mut self) -> Result<Self> {
        if !self.columns.is_empty() {
            return Err(GlmError::Configuration(
                "with_intercept must be called before pushing other columns".into(),
            ));
        }
        let all_rows: Vec<usize> = (0..self.n_rows).collect();
        self.push_column("(Intercept)", Column::Indicator(all_rows))?;
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn format(&self, j: usize) -> ColumnFormat {
        self.columns[j].data.format()
    }

    pub fn name(&self, j: usize) -> &str {
        &self.columns[j].name
    }

    pub fn column(&self, j: usize) -> &Column {
        &self.columns[j].data
    }

    pub fn iterate(&self, j: usize) -> ColumnIter<'_> {
        self.columns[j].data.iterate()
    }

    /// Largest absolute value present in column `j`, used by the CCD
    /// optimizer's convergence bookkeeping (spec.md §4.3 step 5).
    pub fn max_abs(&self, j: usize) -> f64 {
        self.iterate(j).map(|(_, v)| v.abs()).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_iterate_yields_all_rows() {
        let col = Column::Dense(vec![1.0, 2.0, 3.0]);
        let pairs: Vec<_> = col.iterate().collect();
        assert_eq!(pairs, vec![(0, 1.0), (1, 2.0), (2, 3.0)]);
    }

    #[test]
    fn indicator_iterate_implies_value_one() {
        let col = Column::Indicator(vec![1, 3, 4]);
        let pairs: Vec<_> = col.iterate().collect();
        assert_eq!(pairs, vec![(1, 1.0), (3, 1.0), (4, 1.0)]);
    }

    #[test]
    fn sparse_requires_strictly_increasing_indices() {
        let mut m = DesignMatrix::new(5);
        let bad = Column::Sparse {
            index: vec![2, 2],
            value: vec![1.0, 2.0],
        };
        assert!(m.push_column("x", bad).is_err());
    }

    #[test]
    fn lookup_by_name() {
        let mut m = DesignMatrix::new(3);
        m.push_column("x1", Column::Dense(vec![1.0, 2.0, 3.0])).unwrap();
        m.push_column("x2", Column::Indicator(vec![0, 2])).unwrap();
        assert_eq!(m.lookup("x1"), Some(0));
        assert_eq!(m.lookup("x2"), Some(1));
        assert_eq!(m.lookup("nope"), None);
        assert_eq!(m.format(1), ColumnFormat::Indicator);
    }

    #[test]
    fn with_intercept_prepends_column_zero() {
        let m = DesignMatrix::new(4).with_intercept().unwrap();
        assert_eq!(m.n_cols(), 1);
        assert_eq!(m.lookup("(Intercept)"), Some(0));
        let pairs: Vec<_> = m.iterate(0).collect();
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn duplicate_column_name_rejected() {
        let mut m = DesignMatrix::new(2);
        m.push_column("x", Column::Dense(vec![1.0, 2.0])).unwrap();
        assert!(m.push_column("x", Column::Dense(vec![3.0, 4.0])).is_err());
    }
}
