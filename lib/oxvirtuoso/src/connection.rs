//! The capability the dataset consumes from a Virtuoso driver.
//!
//! A [`Connection`] executes textual statements, possibly with `??` parameters, and controls the
//! autocommit mode of the underlying session.
//! Connection pooling, network transport and credential handling are the driver's business.

use crate::error::StoreQueryError;
use crate::model::Term;
use std::error::Error;
use std::fmt;
use tracing::debug;

/// An error raised by a [`Connection`].
pub type ConnectionError = Box<dyn Error + Send + Sync + 'static>;

/// The rows returned by a statement, pulled one at a time from the server.
pub type Rows = Box<dyn Iterator<Item = Result<Vec<Value>, ConnectionError>> + Send>;

/// A cell of a result row or a statement parameter.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Value {
    Null,
    Integer(i64),
    String(String),
    /// An RDF term as returned by SPARQL `select` statements.
    Term(Term),
}

impl Value {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "'{value}'"),
            Self::Term(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A live connection to the store.
///
/// All methods take `&self`: implementations are expected to serialize access to the underlying
/// session themselves.
pub trait Connection: Send + Sync {
    /// Executes a statement and returns its result rows.
    ///
    /// `parameters` are bound in order to the `??` placeholders of `query`.
    fn execute_query(&self, query: &str, parameters: &[Value]) -> Result<Rows, ConnectionError>;

    /// Executes the same statement once per parameter row.
    fn execute_batch(&self, query: &str, rows: &[Vec<Value>]) -> Result<(), ConnectionError>;

    fn set_auto_commit(&self, auto_commit: bool) -> Result<(), ConnectionError>;

    fn commit(&self) -> Result<(), ConnectionError>;

    fn rollback(&self) -> Result<(), ConnectionError>;

    /// Closes the connection. Result sets still open are invalidated.
    fn close(&self) -> Result<(), ConnectionError>;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute_query(&self, query: &str, parameters: &[Value]) -> Result<Rows, ConnectionError> {
        (**self).execute_query(query, parameters)
    }

    fn execute_batch(&self, query: &str, rows: &[Vec<Value>]) -> Result<(), ConnectionError> {
        (**self).execute_batch(query, rows)
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<(), ConnectionError> {
        (**self).set_auto_commit(auto_commit)
    }

    fn commit(&self) -> Result<(), ConnectionError> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<(), ConnectionError> {
        (**self).rollback()
    }

    fn close(&self) -> Result<(), ConnectionError> {
        (**self).close()
    }
}

/// A handle executing literal statements.
pub struct Statement<'a> {
    connection: &'a dyn Connection,
}

impl<'a> Statement<'a> {
    pub(crate) fn new(connection: &'a dyn Connection) -> Self {
        Self { connection }
    }

    pub fn execute_query(&self, query: &str) -> Result<Rows, StoreQueryError> {
        debug!(query, "executing statement");
        self.connection
            .execute_query(query, &[])
            .map_err(StoreQueryError::new)
    }

    /// Executes a statement that returns no useful rows.
    pub fn execute_update(&self, query: &str) -> Result<(), StoreQueryError> {
        for row in self.execute_query(query)? {
            row.map_err(StoreQueryError::new)?;
        }
        Ok(())
    }
}

/// A handle on a parameterized statement that supports batched executions.
pub struct PreparedStatement<'a> {
    connection: &'a dyn Connection,
    query: &'a str,
    batch: Vec<Vec<Value>>,
    executed_batches: usize,
}

impl<'a> PreparedStatement<'a> {
    pub(crate) fn new(connection: &'a dyn Connection, query: &'a str) -> Self {
        Self {
            connection,
            query,
            batch: Vec::new(),
            executed_batches: 0,
        }
    }

    #[inline]
    pub fn query(&self) -> &str {
        self.query
    }

    pub fn execute_query(&self, parameters: &[Value]) -> Result<Rows, StoreQueryError> {
        debug!(query = self.query, parameters = parameters.len(), "executing prepared statement");
        self.connection
            .execute_query(self.query, parameters)
            .map_err(StoreQueryError::new)
    }

    /// Adds a parameter row to the pending batch.
    pub fn add_batch(&mut self, parameters: Vec<Value>) {
        self.batch.push(parameters);
    }

    /// Number of rows in the pending batch.
    #[inline]
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }

    /// Number of batches executed so far by this statement.
    #[inline]
    pub fn executed_batches(&self) -> usize {
        self.executed_batches
    }

    /// Executes the pending batch.
    ///
    /// The batch is kept: call [`clear_batch`](Self::clear_batch) to reset it.
    pub fn execute_batch(&mut self) -> Result<(), StoreQueryError> {
        debug!(query = self.query, rows = self.batch.len(), "executing batch");
        self.connection
            .execute_batch(self.query, &self.batch)
            .map_err(StoreQueryError::new)?;
        self.executed_batches += 1;
        Ok(())
    }

    pub fn clear_batch(&mut self) {
        self.batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use crate::query::{GRAPH_EXISTS, read_count};

    #[test]
    fn value_accessors() {
        assert_eq!(Value::from(3_i64).as_integer(), Some(3));
        assert_eq!(Value::from("3").as_integer(), None);
        assert_eq!(Value::from("g").as_str(), Some("g"));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from("it's").to_string(), "'it's'");
    }

    #[test]
    fn prepared_statement_keeps_its_query() -> Result<(), StoreQueryError> {
        let connection = MemoryConnection::new();
        let statement = PreparedStatement::new(&connection, GRAPH_EXISTS);
        assert_eq!(statement.query(), GRAPH_EXISTS);
        assert_eq!(statement.batch_len(), 0);
        let rows = statement.execute_query(&["http://example.com/g".into()])?;
        assert_eq!(read_count(rows)?, 0);
        Ok(())
    }
}
