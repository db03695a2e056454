//! Row size estimation

use super::acceptor::{Acceptor, ValueSize};

/// Splits a row into fixed-size columns, summed once, and variable-size
/// columns, measured per row. Learned from the first row seen.
#[derive(Debug, Default)]
pub struct RowSizeEstimator {
    pattern: Option<SizePattern>,
}

#[derive(Debug)]
struct SizePattern {
    fixed_bytes: u64,
    variable_columns: Vec<usize>,
}

impl RowSizeEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate<A: Acceptor>(&mut self, row: &[A]) -> u64 {
        if self.pattern.is_none() {
            let mut fixed_bytes = 0;
            let mut variable_columns = Vec::new();
            for (i, acceptor) in row.iter().enumerate() {
                match acceptor.size() {
                    ValueSize::Fixed(n) => fixed_bytes += n,
                    ValueSize::Variable(_) => variable_columns.push(i),
                }
            }
            self.pattern = Some(SizePattern {
                fixed_bytes,
                variable_columns,
            });
        }

        match &self.pattern {
            Some(pattern) => {
                pattern.fixed_bytes
                    + pattern
                        .variable_columns
                        .iter()
                        .filter_map(|&i| row.get(i))
                        .map(|a| a.size().bytes())
                        .sum::<u64>()
            }
            None => 0,
        }
    }
}
