//! The statements sent to the store.
//!
//! The texts of the constants and of the literal insert, delete and clear statements must stay
//! bit-for-bit identical: other clients of the same store rely on them.

use crate::codec::{ObjectForm, Resource, StatementText};
use crate::connection::{Connection, PreparedStatement, Rows, Value};
use crate::error::StoreQueryError;
use crate::model::{NamedNodeRef, NamedOrBlankNodeRef, TermRef, TripleRef};
use tracing::debug;

/// Lists the graphs known to the store, one row per graph IRI.
pub const LIST_KNOWN_GRAPHS: &str = "DB.DBA.SPARQL_SELECT_KNOWN_GRAPHS()";

/// Counts the triples of the graph bound as sole parameter.
pub const GRAPH_EXISTS: &str =
    "select count(*) from (sparql select * where { graph `iri(??)` { ?s ?p ?o }})f";

/// Inserts one triple, parameters: graph, subject, predicate and the three object parameters
/// of [`ObjectForm::bind`].
pub const BATCH_INSERT: &str = "sparql insert into graph iri(??) { `iri(??)` `iri(??)` `bif:__rdf_long_from_batch_params(??,??,??)` }";

/// Number of rows after which a pending insertion batch is executed.
pub const BATCH_SIZE: usize = 5000;

/// Parameters of [`GRAPH_EXISTS`].
pub fn exists_graph(name: NamedNodeRef<'_>) -> [Value; 1] {
    [name.as_str().into()]
}

/// Removes all the triples of a graph. Clearing an absent graph is not an error.
pub fn clear_graph(name: NamedNodeRef<'_>) -> String {
    format!("sparql clear graph <{}>", name.as_str())
}

pub fn insert_single<'a>(graph: NamedNodeRef<'_>, triple: impl Into<TripleRef<'a>>) -> String {
    format!(
        "sparql insert in graph <{}> {}",
        graph.as_str(),
        StatementText::new(triple)
    )
}

pub fn delete_single<'a>(graph: NamedNodeRef<'_>, triple: impl Into<TripleRef<'a>>) -> String {
    format!(
        "sparql delete from graph <{}> {}",
        graph.as_str(),
        StatementText::new(triple)
    )
}

/// Selects `?s ?p ?o` rows of a graph, or of all graphs if `graph` is `None`.
///
/// Bound positions are matched with `sameTerm` filters.
pub fn select_triples(
    graph: Option<NamedNodeRef<'_>>,
    subject: Option<NamedOrBlankNodeRef<'_>>,
    predicate: Option<NamedNodeRef<'_>>,
    object: Option<TermRef<'_>>,
) -> String {
    let mut filters = Vec::new();
    if let Some(subject) = subject {
        filters.push(format!("sameTerm(?s, {})", Resource::new(subject)));
    }
    if let Some(predicate) = predicate {
        filters.push(format!("sameTerm(?p, {})", Resource::new(predicate)));
    }
    if let Some(object) = object {
        filters.push(format!("sameTerm(?o, {})", ObjectForm::of(object)));
    }
    let from = graph
        .map(|graph| format!(" from <{}>", graph.as_str()))
        .unwrap_or_default();
    let filter = if filters.is_empty() {
        String::new()
    } else {
        format!(" filter ({})", filters.join(" && "))
    };
    format!("sparql select ?s ?p ?o{from} where {{ ?s ?p ?o{filter} }}")
}

/// Counts the triples of a graph, or of all graphs if `graph` is `None`.
pub fn count_triples(graph: Option<NamedNodeRef<'_>>) -> String {
    match graph {
        Some(graph) => format!(
            "sparql select count(*) from <{}> where {{ ?s ?p ?o }}",
            graph.as_str()
        ),
        None => "sparql select count(*) where { ?s ?p ?o }".into(),
    }
}

/// Reads the single integer cell returned by [`GRAPH_EXISTS`] and [`count_triples`].
pub fn read_count(mut rows: Rows) -> Result<usize, StoreQueryError> {
    let row = rows
        .next()
        .ok_or_else(|| StoreQueryError::msg("The count statement returned no row"))?
        .map_err(StoreQueryError::new)?;
    match row.first() {
        Some(Value::Integer(count)) => usize::try_from(*count).map_err(StoreQueryError::new),
        Some(Value::String(count)) => count.parse().map_err(StoreQueryError::new),
        _ => Err(StoreQueryError::msg(
            "The count statement returned an unexpected value",
        )),
    }
}

/// Streams triples into a graph with [`BATCH_INSERT`].
///
/// The pending batch is executed as soon as it holds `batch_size` rows so memory stays bounded.
/// [`finish`](Self::finish) executes the remainder.
pub struct InsertBatch<'a> {
    statement: PreparedStatement<'a>,
    graph: NamedNodeRef<'a>,
    batch_size: usize,
    inserted: usize,
}

impl<'a> InsertBatch<'a> {
    pub fn new(connection: &'a dyn Connection, graph: NamedNodeRef<'a>, batch_size: usize) -> Self {
        Self {
            statement: PreparedStatement::new(connection, BATCH_INSERT),
            graph,
            batch_size: batch_size.max(1),
            inserted: 0,
        }
    }

    pub fn push<'b>(&mut self, triple: impl Into<TripleRef<'b>>) -> Result<(), StoreQueryError> {
        self.statement
            .add_batch(StatementText::new(triple).bind(self.graph));
        self.inserted += 1;
        if self.statement.batch_len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Executes the pending rows and returns the number of executed batches.
    pub fn finish(mut self) -> Result<usize, StoreQueryError> {
        if self.statement.batch_len() > 0 {
            self.flush()?;
        }
        debug!(
            graph = self.graph.as_str(),
            triples = self.inserted,
            batches = self.statement.executed_batches(),
            "inserted triples"
        );
        Ok(self.statement.executed_batches())
    }

    fn flush(&mut self) -> Result<(), StoreQueryError> {
        self.statement.execute_batch()?;
        self.statement.clear_batch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use crate::model::{LiteralRef, NamedNode};

    const G: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/g");
    const S: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/s");

    #[test]
    fn wire_texts() {
        assert_eq!(
            GRAPH_EXISTS,
            "select count(*) from (sparql select * where { graph `iri(??)` { ?s ?p ?o }})f"
        );
        assert_eq!(LIST_KNOWN_GRAPHS, "DB.DBA.SPARQL_SELECT_KNOWN_GRAPHS()");
        assert_eq!(clear_graph(G), "sparql clear graph <http://example.com/g>");
        assert_eq!(exists_graph(G), [Value::from("http://example.com/g")]);
    }

    #[test]
    fn single_statements() {
        assert_eq!(
            insert_single(G, TripleRef::new(S, S, S)),
            "sparql insert in graph <http://example.com/g> {<http://example.com/s> <http://example.com/s> <http://example.com/s>}"
        );
        assert_eq!(
            delete_single(G, TripleRef::new(S, S, LiteralRef::new_simple_literal("o"))),
            "sparql delete from graph <http://example.com/g> {<http://example.com/s> <http://example.com/s> \"o\"}"
        );
    }

    #[test]
    fn select_patterns() {
        assert_eq!(
            select_triples(Some(G), None, None, None),
            "sparql select ?s ?p ?o from <http://example.com/g> where { ?s ?p ?o }"
        );
        assert_eq!(
            select_triples(
                None,
                Some(S.into()),
                None,
                Some(LiteralRef::new_simple_literal("o").into())
            ),
            "sparql select ?s ?p ?o where { ?s ?p ?o filter (sameTerm(?s, <http://example.com/s>) && sameTerm(?o, \"o\")) }"
        );
        assert_eq!(
            count_triples(Some(G)),
            "sparql select count(*) from <http://example.com/g> where { ?s ?p ?o }"
        );
    }

    #[test]
    fn batch_is_flushed_at_batch_size() -> Result<(), StoreQueryError> {
        let connection = MemoryConnection::new();
        let mut batch = InsertBatch::new(&connection, G, 3);
        for i in 0..7 {
            let o = NamedNode::new_unchecked(format!("http://example.com/o{i}"));
            batch.push(TripleRef::new(S, S, o.as_ref()))?;
        }
        assert_eq!(connection.batch_executions(), 2);
        assert_eq!(batch.finish()?, 3);
        assert_eq!(connection.batch_executions(), 3);
        Ok(())
    }

    #[test]
    fn empty_batch_is_not_executed() -> Result<(), StoreQueryError> {
        let connection = MemoryConnection::new();
        assert_eq!(InsertBatch::new(&connection, G, 3).finish()?, 0);
        assert_eq!(connection.batch_executions(), 0);
        Ok(())
    }
}
