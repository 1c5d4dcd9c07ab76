//! An in-process [`Connection`] understanding the statements this crate sends.
//!
//! It keeps the named graphs in memory, emulates autocommit with snapshots and records every
//! executed statement. Failures can be injected to exercise the rollback paths.
//!
//! ```
//! use oxvirtuoso::connection::Connection;
//! use oxvirtuoso::memory::MemoryConnection;
//!
//! let connection = MemoryConnection::new();
//! let rows = connection.execute_query(
//!     "sparql insert in graph <http://example.com/g> {<http://example.com/s> <http://example.com/p> \"o\"}",
//!     &[],
//! )?;
//! assert_eq!(rows.count(), 0);
//! assert_eq!(connection.len(), 1);
//! # Result::<_, Box<dyn std::error::Error + Send + Sync>>::Ok(())
//! ```

use crate::codec::ObjectKind;
use crate::connection::{Connection, ConnectionError, Rows, Value};
use crate::model::{
    BlankNode, Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, Term, Triple, TripleRef,
};
use crate::query::{BATCH_INSERT, GRAPH_EXISTS, LIST_KNOWN_GRAPHS};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

static INSERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sparql insert in graph <([^>]*)> \{<([^>]*)> <([^>]*)> (.+)\}$")
        .unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});
static DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sparql delete from graph <([^>]*)> \{<([^>]*)> <([^>]*)> (.+)\}$")
        .unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});
static CLEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sparql clear graph <([^>]*)>$")
        .unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});
static SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sparql select \?s \?p \?o(?: from <([^>]*)>)? where \{ \?s \?p \?o(?: filter \((.+)\))? \}$")
        .unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});
static COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sparql select count\(\*\)(?: from <([^>]*)>)? where \{ \?s \?p \?o \}$")
        .unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});
static SAME_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sameTerm\(\?([spo]), (.+)\)$")
        .unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});

type Graphs = BTreeMap<String, HashSet<Triple>>;

/// An in-memory store reached through the [`Connection`] API.
///
/// Clones share the same content: keep one to inspect the store after handing another to a dataset.
#[derive(Clone, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

struct MemoryState {
    graphs: Graphs,
    /// Content at the start of the pending transaction if autocommit is disabled.
    snapshot: Option<Graphs>,
    auto_commit: bool,
    closed: bool,
    log: Vec<String>,
    batch_executions: usize,
    failing_statements: Vec<String>,
    fail_rollback: bool,
    fail_auto_commit: bool,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            graphs: Graphs::new(),
            snapshot: None,
            auto_commit: true,
            closed: false,
            log: Vec::new(),
            batch_executions: 0,
            failing_statements: Vec::new(),
            fail_rollback: false,
            fail_auto_commit: false,
        }
    }
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a triple without going through a statement.
    pub fn insert<'a>(&self, graph: NamedNodeRef<'_>, triple: impl Into<TripleRef<'a>>) {
        self.state()
            .graphs
            .entry(graph.as_str().into())
            .or_default()
            .insert(triple.into().into_owned());
    }

    /// The triples of a graph.
    pub fn graph(&self, graph: NamedNodeRef<'_>) -> HashSet<Triple> {
        self.state()
            .graphs
            .get(graph.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// The number of triples in all graphs.
    pub fn len(&self) -> usize {
        self.state().graphs.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The statements executed so far, batches included, in execution order.
    pub fn executed_statements(&self) -> Vec<String> {
        self.state().log.clone()
    }

    /// The number of batches executed so far.
    pub fn batch_executions(&self) -> usize {
        self.state().batch_executions
    }

    pub fn auto_commit(&self) -> bool {
        self.state().auto_commit
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Makes every statement whose text contains `pattern` fail.
    pub fn fail_statements_containing(&self, pattern: impl Into<String>) {
        self.state().failing_statements.push(pattern.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_statements.clear();
        state.fail_rollback = false;
        state.fail_auto_commit = false;
    }

    /// Makes [`rollback`](Connection::rollback) fail.
    pub fn fail_rollback(&self, fail: bool) {
        self.state().fail_rollback = fail;
    }

    /// Makes re-enabling autocommit fail.
    pub fn fail_auto_commit(&self, fail: bool) {
        self.state().fail_auto_commit = fail;
    }
}

impl MemoryState {
    fn check(&mut self, query: &str) -> Result<(), ConnectionError> {
        if self.closed {
            return Err("Virtuoso 08S01 Error CL033: Connection is closed".into());
        }
        self.log.push(query.into());
        if let Some(pattern) = self
            .failing_statements
            .iter()
            .find(|pattern| query.contains(pattern.as_str()))
        {
            return Err(
                format!("Virtuoso 42000 Error SR325: Injected failure on '{pattern}'").into(),
            );
        }
        Ok(())
    }

    fn insert(&mut self, graph: &str, triple: Triple) {
        self.graphs.entry(graph.into()).or_default().insert(triple);
    }

    fn remove(&mut self, graph: &str, triple: &Triple) {
        if let Some(triples) = self.graphs.get_mut(graph) {
            triples.remove(triple);
            if triples.is_empty() {
                self.graphs.remove(graph);
            }
        }
    }

    fn matching(
        &self,
        graph: Option<&str>,
        filters: &[(char, Term)],
    ) -> Vec<Triple> {
        let mut triples = self
            .graphs
            .iter()
            .filter(|(name, _)| graph.is_none_or(|graph| graph == name.as_str()))
            .flat_map(|(_, triples)| triples)
            .filter(|triple| {
                filters.iter().all(|(position, term)| match position {
                    's' => Term::from(triple.subject.clone()) == *term,
                    'p' => Term::from(triple.predicate.clone()) == *term,
                    _ => triple.object == *term,
                })
            })
            .cloned()
            .collect::<Vec<_>>();
        triples.sort_by_cached_key(ToString::to_string);
        triples
    }
}

impl Connection for MemoryConnection {
    fn execute_query(&self, query: &str, parameters: &[Value]) -> Result<Rows, ConnectionError> {
        let mut state = self.state();
        state.check(query)?;
        let rows = if query == LIST_KNOWN_GRAPHS {
            state
                .graphs
                .keys()
                .map(|name| vec![Value::String(name.clone())])
                .collect()
        } else if query == GRAPH_EXISTS {
            let [Value::String(graph)] = parameters else {
                return Err("Virtuoso 07001 Error SR121: Wrong number of parameters".into());
            };
            let count = state.graphs.get(graph).map_or(0, HashSet::len);
            vec![vec![Value::Integer(count.try_into()?)]]
        } else if let Some(captures) = CLEAR.captures(query) {
            state.graphs.remove(&captures[1]);
            Vec::new()
        } else if let Some(captures) = INSERT.captures(query) {
            let triple = parse_triple(&captures[2], &captures[3], &captures[4])?;
            state.insert(&captures[1], triple);
            Vec::new()
        } else if let Some(captures) = DELETE.captures(query) {
            let triple = parse_triple(&captures[2], &captures[3], &captures[4])?;
            state.remove(&captures[1], &triple);
            Vec::new()
        } else if let Some(captures) = SELECT.captures(query) {
            let filters = match captures.get(2) {
                Some(filters) => parse_filters(filters.as_str())?,
                None => Vec::new(),
            };
            state
                .matching(captures.get(1).map(|g| g.as_str()), &filters)
                .into_iter()
                .map(|triple| {
                    vec![
                        Value::Term(triple.subject.into()),
                        Value::Term(triple.predicate.into()),
                        Value::Term(triple.object),
                    ]
                })
                .collect()
        } else if let Some(captures) = COUNT.captures(query) {
            let count = state.matching(captures.get(1).map(|g| g.as_str()), &[]).len();
            vec![vec![Value::Integer(count.try_into()?)]]
        } else {
            return Err(
                format!("Virtuoso 37000 Error SQ074: Unsupported statement: {query}").into(),
            );
        };
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn execute_batch(&self, query: &str, rows: &[Vec<Value>]) -> Result<(), ConnectionError> {
        let mut state = self.state();
        state.check(query)?;
        if query != BATCH_INSERT {
            return Err(format!("Virtuoso 37000 Error SQ074: Unsupported batch: {query}").into());
        }
        let quads = rows
            .iter()
            .map(|row| parse_batch_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        for (graph, triple) in quads {
            state.insert(&graph, triple);
        }
        state.batch_executions += 1;
        Ok(())
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<(), ConnectionError> {
        let mut state = self.state();
        if state.closed {
            return Err("Virtuoso 08S01 Error CL033: Connection is closed".into());
        }
        if auto_commit && state.fail_auto_commit {
            return Err("Virtuoso 08S01 Error CL035: Could not switch to autocommit mode".into());
        }
        if auto_commit {
            state.snapshot = None;
        } else if state.auto_commit {
            state.snapshot = Some(state.graphs.clone());
        }
        state.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&self) -> Result<(), ConnectionError> {
        let mut state = self.state();
        if !state.auto_commit {
            state.snapshot = Some(state.graphs.clone());
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), ConnectionError> {
        let mut state = self.state();
        if state.fail_rollback {
            return Err("Virtuoso 08S01 Error CL034: Lost connection during rollback".into());
        }
        if let Some(snapshot) = state.snapshot.clone() {
            state.graphs = snapshot;
        }
        Ok(())
    }

    fn close(&self) -> Result<(), ConnectionError> {
        self.state().closed = true;
        Ok(())
    }
}

fn parse_resource(value: &str) -> Result<NamedOrBlankNode, ConnectionError> {
    Ok(if let Some(id) = value.strip_prefix("_:") {
        BlankNode::new(id)?.into()
    } else {
        NamedNode::new(value)?.into()
    })
}

fn parse_object(token: &str) -> Result<Term, ConnectionError> {
    if let Some(iri) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        Ok(parse_resource(iri)?.into())
    } else {
        Ok(Term::from_str(token)?)
    }
}

fn parse_triple(subject: &str, predicate: &str, object: &str) -> Result<Triple, ConnectionError> {
    Ok(Triple::new(
        parse_resource(subject)?,
        NamedNode::new(predicate)?,
        parse_object(object)?,
    ))
}

fn parse_filters(filters: &str) -> Result<Vec<(char, Term)>, ConnectionError> {
    filters
        .split(" && ")
        .map(|filter| {
            let captures = SAME_TERM
                .captures(filter)
                .ok_or_else(|| format!("Virtuoso 37000 Error SP030: Unsupported filter {filter}"))?;
            let position = captures[1].chars().next().unwrap_or('o');
            Ok((position, parse_object(&captures[2])?))
        })
        .collect()
}

fn parse_batch_row(row: &[Value]) -> Result<(String, Triple), ConnectionError> {
    let [
        Value::String(graph),
        Value::String(subject),
        Value::String(predicate),
        Value::Integer(kind),
        Value::String(value),
        extra,
    ] = row
    else {
        return Err("Virtuoso 07001 Error SR121: Wrong batch parameters".into());
    };
    let object: Term = match (ObjectKind::from_code(*kind), extra) {
        (Some(ObjectKind::Iri), Value::Null) => parse_resource(value)?.into(),
        (Some(ObjectKind::PlainLiteral), Value::Null) => Literal::new_simple_literal(value).into(),
        (Some(ObjectKind::TypedLiteral), Value::String(datatype)) => {
            Literal::new_typed_literal(value, NamedNode::new(datatype)?).into()
        }
        (Some(ObjectKind::LanguageTaggedLiteral), Value::String(language)) => {
            Literal::new_language_tagged_literal(value, language)?.into()
        }
        _ => return Err(format!("Virtuoso 22023 Error SR580: Invalid object kind {kind}").into()),
    };
    Ok((
        graph.clone(),
        Triple::new(parse_resource(subject)?, NamedNode::new(predicate)?, object),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LiteralRef;

    const G: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/g");
    const S: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/s");

    fn rows(
        connection: &MemoryConnection,
        query: &str,
    ) -> Result<Vec<Vec<Value>>, ConnectionError> {
        connection.execute_query(query, &[])?.collect()
    }

    #[test]
    fn rollback_restores_the_transaction_start() -> Result<(), ConnectionError> {
        let connection = MemoryConnection::new();
        connection.insert(G, TripleRef::new(S, S, S));
        connection.set_auto_commit(false)?;
        rows(&connection, "sparql clear graph <http://example.com/g>")?;
        assert!(connection.is_empty());
        connection.rollback()?;
        assert_eq!(connection.len(), 1);
        connection.set_auto_commit(true)?;
        Ok(())
    }

    #[test]
    fn commit_moves_the_rollback_point() -> Result<(), ConnectionError> {
        let connection = MemoryConnection::new();
        connection.set_auto_commit(false)?;
        rows(
            &connection,
            "sparql insert in graph <http://example.com/g> {<http://example.com/s> <http://example.com/s> \"o\"}",
        )?;
        connection.commit()?;
        connection.rollback()?;
        assert_eq!(
            connection.graph(G),
            HashSet::from([TripleRef::new(S, S, LiteralRef::new_simple_literal("o")).into_owned()])
        );
        Ok(())
    }

    #[test]
    fn select_with_filters() -> Result<(), ConnectionError> {
        let connection = MemoryConnection::new();
        connection.insert(G, TripleRef::new(S, S, S));
        connection.insert(G, TripleRef::new(S, S, LiteralRef::new_simple_literal("o")));
        let result = rows(
            &connection,
            "sparql select ?s ?p ?o from <http://example.com/g> where { ?s ?p ?o filter (sameTerm(?o, \"o\")) }",
        )?;
        assert_eq!(
            result,
            vec![vec![
                Value::Term(S.into_owned().into()),
                Value::Term(S.into_owned().into()),
                Value::Term(Literal::new_simple_literal("o").into()),
            ]]
        );
        Ok(())
    }

    #[test]
    fn injected_failures_and_closing() {
        let connection = MemoryConnection::new();
        connection.fail_statements_containing("clear graph");
        assert!(rows(&connection, "sparql clear graph <http://example.com/g>").is_err());
        connection.clear_failures();
        assert!(rows(&connection, "sparql clear graph <http://example.com/g>").is_ok());
        assert!(connection.close().is_ok());
        assert!(rows(&connection, LIST_KNOWN_GRAPHS).is_err());
        assert_eq!(connection.executed_statements().len(), 2);
    }

    #[test]
    fn unknown_statements_fail() {
        let connection = MemoryConnection::new();
        assert!(rows(&connection, "select 1").is_err());
    }
}
