use crate::connection::Connection;
use crate::cursor::TripleIter;
use crate::error::DatasetError;
use crate::model::{
    Graph, GraphNameRef, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Term,
    TermRef, Triple, TripleRef,
};
use crate::query::{count_triples, delete_single, insert_single, read_count, select_triples};
use crate::transaction::Session;
use std::sync::Arc;

/// A cursor over the triples of a [`SingleGraphStore`].
pub type TripleCursor<'a> = Box<dyn Iterator<Item = Result<Triple, DatasetError>> + 'a>;

/// A graph that can be queried triple pattern by triple pattern.
///
/// Implemented by [`VirtGraph`] and by the in-memory [`Graph`].
pub trait SingleGraphStore {
    /// The name of the graph, [`GraphNameRef::DefaultGraph`] if it has none.
    fn graph_name(&self) -> GraphNameRef<'_>;

    /// Returns the triples matching a pattern. `None` matches any term.
    fn find(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<TripleCursor<'_>, DatasetError>;

    /// Number of triples in the graph.
    fn size(&self) -> Result<usize, DatasetError>;

    fn is_empty(&self) -> Result<bool, DatasetError> {
        Ok(self.size()? == 0)
    }

    /// Fails if the graph can't be read anymore.
    fn check_open(&self) -> Result<(), DatasetError> {
        Ok(())
    }

    /// Returns the graph if it is a [`VirtGraph`].
    fn as_virt_graph(&self) -> Option<&VirtGraph> {
        None
    }
}

/// A named graph of a Virtuoso store.
///
/// The triples are never kept locally: every call queries the store.
/// Clones share the same connection.
///
/// ```
/// use oxvirtuoso::VirtGraph;
/// use oxvirtuoso::memory::MemoryConnection;
/// use oxvirtuoso::model::*;
///
/// let graph = VirtGraph::open(MemoryConnection::new(), NamedNode::new("http://example.com/g")?);
/// let ex = NamedNodeRef::new("http://example.com")?;
/// graph.insert(TripleRef::new(ex, ex, LiteralRef::new_simple_literal("foo")))?;
/// assert_eq!(graph.len()?, 1);
/// assert_eq!(graph.iter()?.collect::<Result<Vec<_>, _>>()?.len(), 1);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct VirtGraph {
    session: Arc<Session>,
    graph_name: NamedNode,
    read_from_all_graphs: bool,
}

impl VirtGraph {
    /// Opens a graph on its own connection.
    pub fn open(connection: impl Connection + 'static, graph_name: impl Into<NamedNode>) -> Self {
        Self::new(Arc::new(Session::new(Box::new(connection))), graph_name.into())
    }

    pub(crate) fn new(session: Arc<Session>, graph_name: NamedNode) -> Self {
        Self {
            session,
            graph_name,
            read_from_all_graphs: false,
        }
    }

    /// Reads the triples of all the graphs of the store instead of only this one.
    ///
    /// Writes still target this graph.
    #[must_use]
    pub fn with_read_from_all_graphs(mut self, read_from_all_graphs: bool) -> Self {
        self.read_from_all_graphs = read_from_all_graphs;
        self
    }

    #[inline]
    pub fn name(&self) -> NamedNodeRef<'_> {
        self.graph_name.as_ref()
    }

    #[inline]
    pub fn reads_from_all_graphs(&self) -> bool {
        self.read_from_all_graphs
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn read_scope(&self) -> Option<NamedNodeRef<'_>> {
        (!self.read_from_all_graphs).then(|| self.graph_name.as_ref())
    }

    /// Returns the triples matching a pattern. `None` matches any term.
    pub fn triples_for_pattern(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<TripleIter, DatasetError> {
        let rows = self
            .session
            .statement()?
            .execute_query(&select_triples(self.read_scope(), subject, predicate, object))?;
        Ok(TripleIter::new(Arc::clone(&self.session), rows))
    }

    /// Returns all the triples of the graph.
    pub fn iter(&self) -> Result<TripleIter, DatasetError> {
        self.triples_for_pattern(None, None, None)
    }

    pub fn contains<'a>(&self, triple: impl Into<TripleRef<'a>>) -> Result<bool, DatasetError> {
        let triple = triple.into();
        self.triples_for_pattern(
            Some(triple.subject),
            Some(triple.predicate),
            Some(triple.object),
        )?
        .next()
        .transpose()
        .map(|triple| triple.is_some())
    }

    /// Number of triples in the graph.
    pub fn len(&self) -> Result<usize, DatasetError> {
        let rows = self
            .session
            .statement()?
            .execute_query(&count_triples(self.read_scope()))?;
        Ok(read_count(rows)?)
    }

    pub fn is_empty(&self) -> Result<bool, DatasetError> {
        Ok(self.len()? == 0)
    }

    /// Adds a triple with a single `sparql insert` statement.
    pub fn insert<'a>(&self, triple: impl Into<TripleRef<'a>>) -> Result<(), DatasetError> {
        self.session
            .statement()?
            .execute_update(&insert_single(self.name(), triple))?;
        Ok(())
    }

    /// Removes a triple with a single `sparql delete` statement.
    pub fn remove<'a>(&self, triple: impl Into<TripleRef<'a>>) -> Result<(), DatasetError> {
        self.session
            .statement()?
            .execute_update(&delete_single(self.name(), triple))?;
        Ok(())
    }

    /// Closes the connection shared by this graph and every dataset or graph built on it.
    pub fn close(&self) -> Result<(), DatasetError> {
        self.session.close()
    }
}

impl SingleGraphStore for VirtGraph {
    fn graph_name(&self) -> GraphNameRef<'_> {
        self.graph_name.as_ref().into()
    }

    fn find(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<TripleCursor<'_>, DatasetError> {
        Ok(Box::new(self.triples_for_pattern(subject, predicate, object)?))
    }

    fn size(&self) -> Result<usize, DatasetError> {
        self.len()
    }

    fn check_open(&self) -> Result<(), DatasetError> {
        self.session.check_open()
    }

    fn as_virt_graph(&self) -> Option<&VirtGraph> {
        Some(self)
    }
}

impl SingleGraphStore for Graph {
    fn graph_name(&self) -> GraphNameRef<'_> {
        GraphNameRef::DefaultGraph
    }

    fn find(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<TripleCursor<'_>, DatasetError> {
        let subject = subject.map(NamedOrBlankNodeRef::into_owned);
        let predicate = predicate.map(NamedNodeRef::into_owned);
        let object = object.map(TermRef::into_owned);
        Ok(Box::new(
            self.iter()
                .filter(move |triple| {
                    subject
                        .as_ref()
                        .is_none_or(|s| triple.subject == NamedOrBlankNode::as_ref(s))
                        && predicate
                            .as_ref()
                            .is_none_or(|p| triple.predicate == NamedNode::as_ref(p))
                        && object
                            .as_ref()
                            .is_none_or(|o| triple.object == Term::as_ref(o))
                })
                .map(|triple| Ok(triple.into_owned())),
        ))
    }

    fn size(&self) -> Result<usize, DatasetError> {
        Ok(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use crate::model::{BlankNodeRef, LiteralRef};

    const G: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/g");
    const OTHER: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/other");
    const S: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/s");
    const P: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/p");

    #[test]
    fn insert_contains_remove() -> Result<(), DatasetError> {
        let connection = MemoryConnection::new();
        let graph = VirtGraph::open(connection.clone(), G);
        let triple = TripleRef::new(BlankNodeRef::new_unchecked("b"), P, S);
        graph.insert(triple)?;
        assert!(graph.contains(triple)?);
        assert_eq!(graph.len()?, 1);
        assert_eq!(
            connection.executed_statements()[0],
            "sparql insert in graph <http://example.com/g> {<_:b> <http://example.com/p> <http://example.com/s>}"
        );
        graph.remove(triple)?;
        assert!(!graph.contains(triple)?);
        assert!(graph.is_empty()?);
        Ok(())
    }

    #[test]
    fn reads_are_scoped_to_the_graph() -> Result<(), DatasetError> {
        let connection = MemoryConnection::new();
        connection.insert(G, TripleRef::new(S, P, S));
        connection.insert(OTHER, TripleRef::new(S, P, LiteralRef::new_simple_literal("o")));
        let graph = VirtGraph::open(connection, G);
        assert!(!graph.reads_from_all_graphs());
        assert_eq!(
            graph.iter()?.collect::<Result<Vec<_>, _>>()?,
            vec![TripleRef::new(S, P, S).into_owned()]
        );
        let graph = graph.with_read_from_all_graphs(true);
        assert!(graph.reads_from_all_graphs());
        assert_eq!(graph.len()?, 2);
        assert_eq!(
            graph
                .triples_for_pattern(
                    None,
                    None,
                    Some(LiteralRef::new_simple_literal("o").into())
                )?
                .count(),
            1
        );
        Ok(())
    }

    #[test]
    fn in_memory_graph_is_a_single_graph_store() -> Result<(), DatasetError> {
        let mut graph = Graph::new();
        graph.insert(TripleRef::new(S, P, S));
        graph.insert(TripleRef::new(S, S, S));
        assert_eq!(SingleGraphStore::size(&graph)?, 2);
        assert_eq!(graph.find(None, Some(P), None)?.count(), 1);
        assert!(graph.as_virt_graph().is_none());
        assert_eq!(SingleGraphStore::graph_name(&graph), GraphNameRef::DefaultGraph);
        Ok(())
    }

    #[test]
    fn closed_graph() -> Result<(), DatasetError> {
        let graph = VirtGraph::open(MemoryConnection::new(), G);
        graph.close()?;
        assert!(matches!(graph.len(), Err(DatasetError::Closed)));
        assert!(matches!(
            SingleGraphStore::check_open(&graph),
            Err(DatasetError::Closed)
        ));
        Ok(())
    }
}
