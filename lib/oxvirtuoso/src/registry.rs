use crate::connection::Value;
use crate::error::{DatasetError, StoreQueryError};
use crate::model::{NamedNode, NamedNodeRef, Term, Triple};
use crate::query::{
    BATCH_SIZE, GRAPH_EXISTS, InsertBatch, LIST_KNOWN_GRAPHS, clear_graph, exists_graph,
    read_count,
};
use crate::transaction::Session;
use std::sync::Arc;
use std::vec;
use tracing::debug;

/// The named graphs of a store.
///
/// Nothing is cached: a graph exists as long as the store reports at least one triple in it.
#[derive(Clone)]
pub struct GraphRegistry {
    session: Arc<Session>,
    batch_size: usize,
}

impl GraphRegistry {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            batch_size: BATCH_SIZE,
        }
    }

    pub(crate) fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Lists the graphs known to the store, in the order the store returns them.
    ///
    /// The rows are read eagerly.
    pub fn list_names(&self) -> Result<GraphNameIter, DatasetError> {
        let rows = self
            .session
            .statement()?
            .execute_query(LIST_KNOWN_GRAPHS)?;
        let mut names = Vec::new();
        for row in rows {
            let row = row.map_err(StoreQueryError::new)?;
            names.push(decode_graph_name(row.into_iter().next())?);
        }
        Ok(GraphNameIter {
            iter: names.into_iter(),
        })
    }

    /// Checks if the store has at least one triple in the graph.
    pub fn contains(&self, name: NamedNodeRef<'_>) -> Result<bool, DatasetError> {
        let rows = self
            .session
            .prepare_statement(GRAPH_EXISTS)?
            .execute_query(&exists_graph(name))?;
        Ok(read_count(rows)? != 0)
    }

    /// Creates a graph from a triple source.
    ///
    /// Fails with [`DatasetError::DuplicateGraph`] if the graph already has triples.
    /// The triples are inserted by batches of [`batch_size`](Self::batch_size) rows.
    pub fn create<E: Into<DatasetError>>(
        &self,
        name: NamedNodeRef<'_>,
        triples: impl IntoIterator<Item = Result<Triple, E>>,
    ) -> Result<(), DatasetError> {
        if self.contains(name)? {
            return Err(DatasetError::DuplicateGraph(name.into_owned()));
        }
        self.session.check_open()?;
        let mut batch = InsertBatch::new(self.session.connection(), name, self.batch_size);
        for triple in triples {
            batch.push(&triple.map_err(Into::<DatasetError>::into)?)?;
        }
        batch.finish()?;
        Ok(())
    }

    /// Removes all the triples of a graph. Removing an absent graph is not an error.
    pub fn remove(&self, name: NamedNodeRef<'_>) -> Result<(), DatasetError> {
        self.session
            .statement()?
            .execute_update(&clear_graph(name))?;
        debug!(graph = name.as_str(), "cleared graph");
        Ok(())
    }

    /// Replaces the content of a graph with a single commit.
    pub fn replace<E: Into<DatasetError>>(
        &self,
        name: NamedNodeRef<'_>,
        triples: impl IntoIterator<Item = Result<Triple, E>>,
    ) -> Result<(), DatasetError> {
        self.session.transaction("replace the named model", || {
            self.remove(name)?;
            self.create(name, triples)
        })
    }
}

fn decode_graph_name(value: Option<Value>) -> Result<NamedNode, StoreQueryError> {
    match value {
        Some(Value::String(name)) => NamedNode::new(name).map_err(StoreQueryError::new),
        Some(Value::Term(Term::NamedNode(name))) => Ok(name),
        Some(value) => Err(StoreQueryError::msg(format!(
            "Invalid graph name returned by the store: {value}"
        ))),
        None => Err(StoreQueryError::msg(
            "The graph listing returned an empty row",
        )),
    }
}

/// An iterator returning the names of the graphs of a store.
#[must_use]
pub struct GraphNameIter {
    iter: vec::IntoIter<NamedNode>,
}

impl Iterator for GraphNameIter {
    type Item = NamedNode;

    fn next(&mut self) -> Option<NamedNode> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for GraphNameIter {}
