//! Row Transformer
//!
//! Binds per-column appenders to the acceptors a backend driver fills for
//! every scanned row, and pushes the completed row into a columnar buffer.

use super::acceptor::Acceptor;
use super::columnar_buffer::ColumnarBuffer;
use super::wire_value::WireValue;
use crate::api::{ConnectorError, ConnectorResult};

/// Maps one column's acceptor to its wire value.
pub type Appender<A> =
    Box<dyn for<'r> Fn(&'r A) -> ConnectorResult<WireValue<'r>> + Send + Sync + 'static>;

/// Boxes a closure as an appender, fixing its higher-ranked signature.
pub fn appender<A, F>(f: F) -> Appender<A>
where
    F: for<'r> Fn(&'r A) -> ConnectorResult<WireValue<'r>> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Drives appenders over one reusable row of acceptors
pub struct RowTransformer<A: Acceptor> {
    acceptors: Vec<A>,
    appenders: Vec<Appender<A>>,
    /// For appender `i`, the index of its acceptor; empty means identity
    wanted_columns: Vec<usize>,
}

impl<A: Acceptor> RowTransformer<A> {
    pub fn new(
        acceptors: Vec<A>,
        appenders: Vec<Appender<A>>,
        wanted_columns: Vec<usize>,
    ) -> ConnectorResult<Self> {
        if wanted_columns.is_empty() {
            if appenders.len() > acceptors.len() {
                return Err(ConnectorError::invariant(format!(
                    "{} appenders for {} acceptors",
                    appenders.len(),
                    acceptors.len()
                )));
            }
        } else {
            if wanted_columns.len() != appenders.len() {
                return Err(ConnectorError::invariant(format!(
                    "{} wanted columns for {} appenders",
                    wanted_columns.len(),
                    appenders.len()
                )));
            }
            if let Some(&bad) = wanted_columns.iter().find(|&&i| i >= acceptors.len()) {
                return Err(ConnectorError::invariant(format!(
                    "wanted column {} outside of a {}-column row",
                    bad,
                    acceptors.len()
                )));
            }
        }

        Ok(Self {
            acceptors,
            appenders,
            wanted_columns,
        })
    }

    /// Current row
    pub fn acceptors(&self) -> &[A] {
        &self.acceptors
    }

    /// Current row, for the driver to overwrite in place
    pub fn acceptors_mut(&mut self) -> &mut [A] {
        &mut self.acceptors
    }

    /// Copies `row` into the acceptors, reusing their allocations
    pub fn set_acceptors(&mut self, row: &[A]) -> ConnectorResult<()> {
        if row.len() != self.acceptors.len() {
            return Err(ConnectorError::invariant(format!(
                "row has {} values, expected {}",
                row.len(),
                self.acceptors.len()
            )));
        }
        for (acceptor, value) in self.acceptors.iter_mut().zip(row) {
            acceptor.clone_from(value);
        }
        Ok(())
    }

    /// Appends the current row; out-of-bounds values become NULL
    pub fn append_to_buffer(&self, buffer: &mut dyn ColumnarBuffer) -> ConnectorResult<()> {
        for (column, appender) in self.appenders.iter().enumerate() {
            let index = self.wanted_columns.get(column).copied().unwrap_or(column);
            let acceptor = &self.acceptors[index];
            let value = match appender(acceptor) {
                Ok(value) => value,
                Err(err) if err.is_out_of_bounds() => WireValue::Null,
                Err(err) => return Err(err),
            };
            buffer.append(column, value)?;
        }
        buffer.end_row();
        Ok(())
    }
}
