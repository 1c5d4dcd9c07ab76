use crate::context::Context;
use crate::cursor::QuadIter;
use crate::dataset::{DatasetStore, VirtDataset};
use crate::error::DatasetError;
use crate::graph::{SingleGraphStore, VirtGraph};
use crate::model::{
    GraphNameRef, NamedNodeRef, NamedOrBlankNodeRef, Quad, QuadRef, TermRef, TripleRef,
};
use crate::registry::GraphNameIter;
use std::sync::RwLock;

/// A quad-centric view of a [`VirtDataset`].
///
/// Adding, removing a graph and setting the default graph are committed as a whole or rolled back.
/// Single quad writes run as single autocommitted statements.
///
/// ```
/// use oxvirtuoso::dataset::VirtDataset;
/// use oxvirtuoso::memory::MemoryConnection;
/// use oxvirtuoso::model::*;
///
/// let dataset = VirtDataset::new(MemoryConnection::new(), NamedNode::new("http://example.com/base")?);
/// let view = dataset.as_dataset_graph();
/// let ex = NamedNodeRef::new("http://example.com")?;
/// let quad = QuadRef::new(ex, ex, ex, ex);
/// view.add(quad)?;
/// assert_eq!(view.iter()?.collect::<Result<Vec<_>, _>>()?, vec![quad.into_owned()]);
/// assert_eq!(view.delete_any(None, Some(ex.into()), None, None)?, 1);
/// assert!(!view.contains_graph(ex)?);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone, Copy)]
pub struct DatasetGraphView<'a> {
    dataset: &'a VirtDataset,
}

impl<'a> DatasetGraphView<'a> {
    pub(crate) fn new(dataset: &'a VirtDataset) -> Self {
        Self { dataset }
    }

    #[inline]
    pub fn dataset(&self) -> &'a VirtDataset {
        self.dataset
    }

    /// The default graph if set, or else the base graph of the dataset.
    pub fn default_graph(&self) -> VirtGraph {
        self.dataset
            .default_graph()
            .unwrap_or_else(|| self.dataset.graph().clone())
    }

    pub fn set_default_graph(
        &self,
        graph: Option<&dyn SingleGraphStore>,
    ) -> Result<(), DatasetError> {
        self.dataset
            .session()
            .transaction("set the default model", || {
                self.dataset.set_default_graph(graph)
            })
    }

    pub fn get_graph<'b>(&self, name: impl Into<NamedNodeRef<'b>>) -> VirtGraph {
        self.dataset.get_named_model(name)
    }

    pub fn contains_graph<'b>(
        &self,
        name: impl Into<NamedNodeRef<'b>>,
    ) -> Result<bool, DatasetError> {
        self.dataset.contains_named_model(name)
    }

    pub fn list_graph_nodes(&self) -> Result<GraphNameIter, DatasetError> {
        self.dataset.list_names()
    }

    /// Creates a named graph with the triples of `graph`.
    pub fn add_graph<'b>(
        &self,
        name: impl Into<NamedNodeRef<'b>>,
        graph: &dyn SingleGraphStore,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        self.dataset
            .session()
            .transaction("add the named model", || {
                self.dataset
                    .registry()
                    .create(name, graph.find(None, None, None)?)
            })
    }

    pub fn remove_graph<'b>(&self, name: impl Into<NamedNodeRef<'b>>) -> Result<(), DatasetError> {
        let name = name.into();
        self.dataset
            .session()
            .transaction("remove the named model", || {
                self.dataset.registry().remove(name)
            })
    }

    /// Adds a quad with a single `sparql insert` statement.
    pub fn add<'b>(&self, quad: impl Into<QuadRef<'b>>) -> Result<(), DatasetError> {
        let quad = quad.into();
        self.dataset
            .resolve_graph(quad.graph_name)?
            .insert(TripleRef::new(quad.subject, quad.predicate, quad.object))
    }

    /// Removes a quad with a single `sparql delete` statement.
    pub fn delete<'b>(&self, quad: impl Into<QuadRef<'b>>) -> Result<(), DatasetError> {
        let quad = quad.into();
        self.dataset
            .resolve_graph(quad.graph_name)?
            .remove(TripleRef::new(quad.subject, quad.predicate, quad.object))
    }

    /// Removes all the quads matching a pattern and returns how many have been removed.
    ///
    /// The matches are read before the first removal.
    pub fn delete_any(
        &self,
        graph_name: Option<GraphNameRef<'_>>,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<usize, DatasetError> {
        let quads = self
            .find(graph_name, subject, predicate, object)?
            .collect::<Result<Vec<Quad>, _>>()?;
        for quad in &quads {
            self.delete(quad)?;
        }
        Ok(quads.len())
    }

    /// Returns the quads matching a pattern. `None` matches any term or graph.
    pub fn find(
        &self,
        graph_name: Option<GraphNameRef<'_>>,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<QuadIter, DatasetError> {
        self.dataset.find(graph_name, subject, predicate, object)
    }

    /// Returns all the quads of all the named graphs.
    pub fn iter(&self) -> Result<QuadIter, DatasetError> {
        self.dataset.iter()
    }

    /// Not supported.
    pub fn find_ng(
        &self,
        _graph_name: Option<GraphNameRef<'_>>,
        _subject: Option<NamedOrBlankNodeRef<'_>>,
        _predicate: Option<NamedNodeRef<'_>>,
        _object: Option<TermRef<'_>>,
    ) -> Result<QuadIter, DatasetError> {
        Err(DatasetError::UnsupportedOperation("Named graph only quad lookup"))
    }

    /// Not supported.
    pub fn contains(
        &self,
        _graph_name: Option<GraphNameRef<'_>>,
        _subject: Option<NamedOrBlankNodeRef<'_>>,
        _predicate: Option<NamedNodeRef<'_>>,
        _object: Option<TermRef<'_>>,
    ) -> Result<bool, DatasetError> {
        Err(DatasetError::UnsupportedOperation("Graph-scoped quad containment"))
    }

    /// Number of triples in the base graph.
    pub fn size(&self) -> Result<usize, DatasetError> {
        self.dataset.size()
    }

    pub fn is_empty(&self) -> Result<bool, DatasetError> {
        self.dataset.is_empty()
    }

    #[inline]
    pub fn lock(&self) -> &'a RwLock<()> {
        self.dataset.lock()
    }

    #[inline]
    pub fn context(&self) -> &'a Context {
        self.dataset.context()
    }

    pub fn close(&self) -> Result<(), DatasetError> {
        self.dataset.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use crate::model::{Graph, GraphName, LiteralRef};

    const BASE: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/base");
    const A: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/a");
    const EX: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/s");

    #[test]
    fn default_graph_writes_go_to_the_base_graph() -> Result<(), DatasetError> {
        let connection = MemoryConnection::new();
        let dataset = VirtDataset::new(connection.clone(), BASE);
        let view = dataset.as_dataset_graph();
        view.add(QuadRef::new(EX, EX, EX, GraphNameRef::DefaultGraph))?;
        assert_eq!(connection.graph(BASE).len(), 1);

        view.set_default_graph(Some(&view.get_graph(A)))?;
        assert_eq!(view.default_graph().name(), A);
        view.add(QuadRef::new(EX, EX, EX, GraphNameRef::DefaultGraph))?;
        assert_eq!(connection.graph(A).len(), 1);
        view.delete(QuadRef::new(EX, EX, EX, GraphNameRef::DefaultGraph))?;
        assert!(connection.graph(A).is_empty());
        Ok(())
    }

    #[test]
    fn set_default_graph_is_transactional() {
        let dataset = VirtDataset::new(MemoryConnection::new(), BASE);
        let result = dataset.as_dataset_graph().set_default_graph(Some(&Graph::new()));
        let Err(DatasetError::CompositeWrite { operation, source }) = result else {
            panic!("a composite write error was expected");
        };
        assert_eq!(operation, "set the default model");
        assert!(matches!(*source, DatasetError::UnsupportedGraphType));
    }

    #[test]
    fn add_graph_copies_any_graph() -> Result<(), DatasetError> {
        let connection = MemoryConnection::new();
        let dataset = VirtDataset::new(connection.clone(), BASE);
        let view = dataset.as_dataset_graph();
        let mut graph = Graph::new();
        graph.insert(TripleRef::new(EX, EX, LiteralRef::new_simple_literal("a")));
        graph.insert(TripleRef::new(EX, EX, LiteralRef::new_simple_literal("b")));
        view.add_graph(A, &graph)?;
        assert_eq!(connection.graph(A).len(), 2);
        assert!(view.contains_graph(A)?);
        assert_eq!(view.list_graph_nodes()?.collect::<Vec<_>>(), vec![A.into_owned()]);
        assert!(matches!(
            view.add_graph(A, &graph),
            Err(DatasetError::CompositeWrite { .. })
        ));
        view.remove_graph(A)?;
        assert!(!view.contains_graph(A)?);
        Ok(())
    }

    #[test]
    fn delete_any_removes_from_each_origin_graph() -> Result<(), DatasetError> {
        let connection = MemoryConnection::new();
        connection.insert(A, TripleRef::new(EX, EX, EX));
        connection.insert(BASE, TripleRef::new(EX, EX, EX));
        connection.insert(BASE, TripleRef::new(EX, EX, LiteralRef::new_simple_literal("o")));
        let dataset = VirtDataset::new(connection.clone(), BASE);
        let view = dataset.as_dataset_graph();
        assert_eq!(view.delete_any(None, None, None, Some(EX.into()))?, 2);
        assert!(connection.graph(A).is_empty());
        assert_eq!(connection.graph(BASE).len(), 1);
        assert_eq!(
            view.delete_any(Some(GraphName::DefaultGraph.as_ref()), None, None, None)?,
            1
        );
        assert!(connection.is_empty());
        Ok(())
    }

    #[test]
    fn unsupported_lookups() {
        let dataset = VirtDataset::new(MemoryConnection::new(), BASE);
        let view = dataset.as_dataset_graph();
        assert!(matches!(
            view.find_ng(None, None, None, None),
            Err(DatasetError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            view.contains(None, None, None, None),
            Err(DatasetError::UnsupportedOperation(_))
        ));
    }
}
