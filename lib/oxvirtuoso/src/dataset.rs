//! The [`VirtDataset`] facade and the [`DatasetStore`] multi-graph API it implements.
//!
//! Usage example:
//! ```
//! use oxvirtuoso::dataset::{DatasetStore, VirtDataset};
//! use oxvirtuoso::memory::MemoryConnection;
//! use oxvirtuoso::model::*;
//!
//! let dataset = VirtDataset::new(MemoryConnection::new(), NamedNode::new("http://example.com/base")?);
//! let g = NamedNode::new("http://example.com/g")?;
//! let ex = NamedNode::new("http://example.com/s")?;
//!
//! dataset.add_named_model(&g, [Triple::new(ex.clone(), ex.clone(), ex.clone())])?;
//! dataset.replace_named_model(&g, [Triple::new(ex.clone(), ex.clone(), Literal::from("foo"))])?;
//! assert_eq!(dataset.list_names()?.collect::<Vec<_>>(), [g.clone()]);
//!
//! dataset.remove_named_model(&g)?;
//! dataset.remove_named_model(&g)?; // no-op
//! assert!(!dataset.contains_named_model(&g)?);
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

use crate::connection::Connection;
use crate::context::Context;
use crate::cursor::QuadIter;
use crate::dataset_graph::DatasetGraphView;
use crate::error::DatasetError;
use crate::graph::{SingleGraphStore, VirtGraph};
use crate::model::{
    GraphNameRef, NamedNode, NamedNodeRef, NamedOrBlankNodeRef, TermRef, Triple,
};
use crate::registry::{GraphNameIter, GraphRegistry};
use crate::transaction::{Session, TransactionState};
use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock};

/// The multi-graph role of a dataset: named graphs addressed by IRI.
pub trait DatasetStore {
    /// Creates a named graph.
    ///
    /// Fails with [`DatasetError::DuplicateGraph`] if the graph already has triples.
    fn add_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
        triples: impl IntoIterator<Item = impl Into<Triple>>,
    ) -> Result<(), DatasetError>;

    /// Removes all the triples of a named graph. Removing an absent graph is not an error.
    fn remove_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
    ) -> Result<(), DatasetError>;

    /// Replaces the content of a named graph with a single commit.
    fn replace_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
        triples: impl IntoIterator<Item = impl Into<Triple>>,
    ) -> Result<(), DatasetError>;

    /// Checks if a named graph has at least one triple.
    fn contains_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
    ) -> Result<bool, DatasetError>;

    fn list_names(&self) -> Result<GraphNameIter, DatasetError>;

    /// Returns the quads matching a pattern. `None` matches any term or graph.
    fn find(
        &self,
        graph_name: Option<GraphNameRef<'_>>,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<QuadIter, DatasetError>;
}

/// An RDF dataset stored in a Virtuoso server.
///
/// The dataset owns one connection, shared with its graphs and cursors.
/// It is bound to a base graph, used as default graph until [`set_default_graph`](Self::set_default_graph) is called.
///
/// Composite writes disable autocommit on the connection, commit if all their steps succeed and
/// roll back otherwise. Only one of them may run at a time on a connection:
/// concurrent users should coordinate through [`lock`](Self::lock).
pub struct VirtDataset {
    session: Arc<Session>,
    graph: VirtGraph,
    registry: GraphRegistry,
    default_graph: RwLock<Option<VirtGraph>>,
    lock: RwLock<()>,
    context: Context,
}

impl VirtDataset {
    /// Opens a dataset on a connection, bound to the base graph `graph_name`.
    pub fn new(connection: impl Connection + 'static, graph_name: impl Into<NamedNode>) -> Self {
        Self::from_graph(VirtGraph::open(connection, graph_name))
    }

    /// Builds a dataset sharing the connection of `graph`.
    pub fn from_graph(graph: VirtGraph) -> Self {
        let session = Arc::clone(graph.session());
        Self {
            registry: GraphRegistry::new(Arc::clone(&session)),
            session,
            graph,
            default_graph: RwLock::new(None),
            lock: RwLock::new(()),
            context: Context::new(),
        }
    }

    /// Sets the number of rows sent per batch when creating graphs.
    ///
    /// Defaults to [`BATCH_SIZE`](crate::BATCH_SIZE).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.registry.set_batch_size(batch_size);
        self
    }

    /// The base graph of the dataset.
    #[inline]
    pub fn graph(&self) -> &VirtGraph {
        &self.graph
    }

    #[inline]
    pub fn registry(&self) -> &GraphRegistry {
        &self.registry
    }

    /// The graph set with [`set_default_graph`](Self::set_default_graph), if any.
    pub fn default_graph(&self) -> Option<VirtGraph> {
        self.default_graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sets or unsets the default graph. The store is not queried.
    ///
    /// Fails with [`DatasetError::UnsupportedGraphType`] if the graph is not a [`VirtGraph`]
    /// sharing the connection of the dataset.
    pub fn set_default_graph(
        &self,
        graph: Option<&dyn SingleGraphStore>,
    ) -> Result<(), DatasetError> {
        let graph = graph
            .map(|graph| {
                graph
                    .as_virt_graph()
                    .filter(|graph| Arc::ptr_eq(graph.session(), &self.session))
                    .cloned()
                    .ok_or(DatasetError::UnsupportedGraphType)
            })
            .transpose()?;
        *self
            .default_graph
            .write()
            .unwrap_or_else(PoisonError::into_inner) = graph;
        Ok(())
    }

    /// Returns a named graph sharing the connection of the dataset.
    ///
    /// The graph is not required to exist.
    pub fn get_named_model<'a>(&self, name: impl Into<NamedNodeRef<'a>>) -> VirtGraph {
        VirtGraph::new(Arc::clone(&self.session), name.into().into_owned())
    }

    /// Number of triples in the base graph.
    pub fn size(&self) -> Result<usize, DatasetError> {
        self.graph.len()
    }

    pub fn is_empty(&self) -> Result<bool, DatasetError> {
        self.graph.is_empty()
    }

    /// The advisory lock of the dataset.
    ///
    /// It is never taken by the dataset itself.
    #[inline]
    pub fn lock(&self) -> &RwLock<()> {
        &self.lock
    }

    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// A quad-centric view of the same dataset.
    #[inline]
    pub fn as_dataset_graph(&self) -> DatasetGraphView<'_> {
        DatasetGraphView::new(self)
    }

    /// Returns all the quads of all the named graphs.
    pub fn iter(&self) -> Result<QuadIter, DatasetError> {
        self.find(None, None, None, None)
    }

    /// Disables autocommit until [`commit`](Self::commit) or [`abort`](Self::abort).
    ///
    /// Composite writes made in between join this transaction.
    pub fn begin(&self) -> Result<(), DatasetError> {
        self.session.begin()
    }

    pub fn commit(&self) -> Result<(), DatasetError> {
        self.session.commit()
    }

    pub fn abort(&self) -> Result<(), DatasetError> {
        self.session.abort()
    }

    /// Aborts the transaction if it has been neither committed nor aborted.
    pub fn end(&self) -> Result<(), DatasetError> {
        self.session.abort()
    }

    pub fn is_in_transaction(&self) -> bool {
        self.session.state() == TransactionState::InProgress
    }

    #[inline]
    pub fn transaction_state(&self) -> TransactionState {
        self.session.state()
    }

    /// Always `false`: transactions provide no isolation.
    #[inline]
    pub fn supports_transactions(&self) -> bool {
        false
    }

    /// Closes the connection. Later calls and open cursors fail.
    pub fn close(&self) -> Result<(), DatasetError> {
        self.session.close()
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The graph a quad graph name designates.
    ///
    /// The default graph designates the graph set with [`set_default_graph`](Self::set_default_graph),
    /// or the base graph.
    pub(crate) fn resolve_graph(
        &self,
        graph_name: GraphNameRef<'_>,
    ) -> Result<VirtGraph, DatasetError> {
        match graph_name {
            GraphNameRef::NamedNode(name) => Ok(self.get_named_model(name)),
            GraphNameRef::DefaultGraph => Ok(self
                .default_graph()
                .unwrap_or_else(|| self.graph.clone())),
            GraphNameRef::BlankNode(_) => Err(DatasetError::UnsupportedOperation(
                "Blank node graph names",
            )),
        }
    }
}

impl DatasetStore for VirtDataset {
    fn add_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
        triples: impl IntoIterator<Item = impl Into<Triple>>,
    ) -> Result<(), DatasetError> {
        self.registry.create(
            name.into(),
            triples.into_iter().map(|t| Ok::<_, Infallible>(t.into())),
        )
    }

    fn remove_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
    ) -> Result<(), DatasetError> {
        self.registry.remove(name.into())
    }

    fn replace_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
        triples: impl IntoIterator<Item = impl Into<Triple>>,
    ) -> Result<(), DatasetError> {
        self.registry.replace(
            name.into(),
            triples.into_iter().map(|t| Ok::<_, Infallible>(t.into())),
        )
    }

    fn contains_named_model<'a>(
        &self,
        name: impl Into<NamedNodeRef<'a>>,
    ) -> Result<bool, DatasetError> {
        self.registry.contains(name.into())
    }

    fn list_names(&self) -> Result<GraphNameIter, DatasetError> {
        self.registry.list_names()
    }

    fn find(
        &self,
        graph_name: Option<GraphNameRef<'_>>,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<QuadIter, DatasetError> {
        self.session.check_open()?;
        let Some(graph_name) = graph_name else {
            let graphs = self.registry.list_names()?.collect();
            return Ok(QuadIter::across(
                Arc::clone(&self.session),
                graphs,
                subject,
                predicate,
                object,
            ));
        };
        let triples = self
            .resolve_graph(graph_name)?
            .triples_for_pattern(subject, predicate, object)?;
        Ok(QuadIter::scoped(
            Arc::clone(&self.session),
            graph_name.into_owned(),
            triples,
        ))
    }
}
