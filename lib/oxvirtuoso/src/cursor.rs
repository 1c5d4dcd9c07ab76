use crate::connection::{Rows, Value};
use crate::error::{DatasetError, StoreQueryError};
use crate::graph::VirtGraph;
use crate::model::{
    GraphName, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Quad, Term,
    TermRef, Triple,
};
use crate::transaction::Session;
use std::sync::Arc;
use std::vec;

/// An iterator returning the triples matched by a [`VirtGraph`] pattern.
///
/// Rows are pulled from the store one at a time.
/// Once the dataset has been closed, the next call returns [`DatasetError::CursorClosed`]
/// and the iteration stops.
#[must_use]
pub struct TripleIter {
    session: Arc<Session>,
    rows: Rows,
    done: bool,
}

impl TripleIter {
    pub(crate) fn new(session: Arc<Session>, rows: Rows) -> Self {
        Self {
            session,
            rows,
            done: false,
        }
    }
}

impl Iterator for TripleIter {
    type Item = Result<Triple, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.session.is_closed() {
            self.done = true;
            return Some(Err(DatasetError::CursorClosed));
        }
        Some(match self.rows.next()? {
            Ok(row) => decode_triple(row).map_err(Into::into),
            Err(error) => Err(StoreQueryError::new(error).into()),
        })
    }
}

fn decode_triple(row: Vec<Value>) -> Result<Triple, StoreQueryError> {
    let mut row = row.into_iter();
    let (Some(Value::Term(subject)), Some(Value::Term(predicate)), Some(Value::Term(object))) =
        (row.next(), row.next(), row.next())
    else {
        return Err(StoreQueryError::msg(
            "Expected a row of three RDF terms from a triple pattern query",
        ));
    };
    let subject = match subject {
        Term::NamedNode(node) => NamedOrBlankNode::from(node),
        Term::BlankNode(node) => node.into(),
        subject => {
            return Err(StoreQueryError::msg(format!(
                "Invalid triple subject returned by the store: {subject}"
            )));
        }
    };
    let Term::NamedNode(predicate) = predicate else {
        return Err(StoreQueryError::msg(format!(
            "Invalid triple predicate returned by the store: {predicate}"
        )));
    };
    Ok(Triple::new(subject, predicate, object))
}

/// A triple pattern kept by [`QuadIter`] to open the cursors of the next graphs.
#[derive(Default, Clone)]
struct Pattern {
    subject: Option<NamedOrBlankNode>,
    predicate: Option<NamedNode>,
    object: Option<Term>,
}

/// An iterator returning the quads matched by a [`VirtDataset`](crate::dataset::VirtDataset) pattern.
///
/// Each triple is labeled with the graph its cursor is scoped to.
/// When all graphs are scanned, the cursor of a graph is opened only once the previous one is exhausted.
#[must_use]
pub struct QuadIter {
    session: Arc<Session>,
    pattern: Pattern,
    current: Option<(GraphName, TripleIter)>,
    pending: vec::IntoIter<NamedNode>,
}

impl QuadIter {
    /// Labels the triples of an already opened cursor with `graph_name`.
    pub(crate) fn scoped(
        session: Arc<Session>,
        graph_name: GraphName,
        triples: TripleIter,
    ) -> Self {
        Self {
            session,
            pattern: Pattern::default(),
            current: Some((graph_name, triples)),
            pending: Vec::new().into_iter(),
        }
    }

    /// Scans `graphs` one after the other.
    pub(crate) fn across(
        session: Arc<Session>,
        graphs: Vec<NamedNode>,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Self {
        Self {
            session,
            pattern: Pattern {
                subject: subject.map(NamedOrBlankNodeRef::into_owned),
                predicate: predicate.map(NamedNodeRef::into_owned),
                object: object.map(TermRef::into_owned),
            },
            current: None,
            pending: graphs.into_iter(),
        }
    }

    fn open(&self, graph_name: NamedNode) -> Result<(GraphName, TripleIter), DatasetError> {
        let triples = VirtGraph::new(Arc::clone(&self.session), graph_name.clone())
            .triples_for_pattern(
                self.pattern.subject.as_ref().map(NamedOrBlankNode::as_ref),
                self.pattern.predicate.as_ref().map(NamedNode::as_ref),
                self.pattern.object.as_ref().map(Term::as_ref),
            )?;
        Ok((graph_name.into(), triples))
    }
}

impl Iterator for QuadIter {
    type Item = Result<Quad, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((graph_name, triples)) = &mut self.current {
                match triples.next() {
                    Some(Ok(triple)) => return Some(Ok(triple.in_graph(graph_name.clone()))),
                    Some(Err(DatasetError::CursorClosed)) => {
                        self.current = None;
                        self.pending = Vec::new().into_iter();
                        return Some(Err(DatasetError::CursorClosed));
                    }
                    Some(Err(error)) => return Some(Err(error)),
                    None => self.current = None,
                }
            }
            let graph_name = self.pending.next()?;
            if self.session.is_closed() {
                self.pending = Vec::new().into_iter();
                return Some(Err(DatasetError::CursorClosed));
            }
            match self.open(graph_name) {
                Ok(current) => self.current = Some(current),
                Err(error) => return Some(Err(error)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlankNode, Literal};

    #[test]
    fn decodes_rows() -> Result<(), StoreQueryError> {
        let triple = decode_triple(vec![
            Value::Term(BlankNode::new_unchecked("b").into()),
            Value::Term(NamedNode::new_unchecked("http://example.com/p").into()),
            Value::Term(Literal::from("o").into()),
        ])?;
        assert_eq!(
            triple,
            Triple::new(
                BlankNode::new_unchecked("b"),
                NamedNode::new_unchecked("http://example.com/p"),
                Literal::from("o")
            )
        );
        Ok(())
    }

    #[test]
    fn rejects_malformed_rows() {
        assert!(decode_triple(vec![Value::Integer(1)]).is_err());
        assert!(
            decode_triple(vec![
                Value::Term(Literal::from("s").into()),
                Value::Term(NamedNode::new_unchecked("http://example.com/p").into()),
                Value::Term(Literal::from("o").into()),
            ])
            .is_err()
        );
    }
}
