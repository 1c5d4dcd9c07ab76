//! Renders RDF terms into the fragments Virtuoso statements expect.
//!
//! Whether an object is written as an IRI or as a literal token is decided once by [`ObjectForm::of`]
//! from the term kind, never from the shape of its string form.
//! Literal tokens are not escaped: their N-Triples form must not break the statement grammar.

use crate::connection::Value;
use crate::model::{NamedNodeRef, NamedOrBlankNodeRef, TermRef, TripleRef};
use std::fmt;

/// How an object is written in a statement.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ObjectForm<'a> {
    /// Wrapped in angle brackets.
    Uri(NamedNodeRef<'a>),
    /// Written bare, the store reads the token as a literal.
    Bare(TermRef<'a>),
}

impl<'a> ObjectForm<'a> {
    #[inline]
    pub fn of(object: impl Into<TermRef<'a>>) -> Self {
        match object.into() {
            TermRef::NamedNode(node) => Self::Uri(node),
            object => Self::Bare(object),
        }
    }

    #[inline]
    pub fn is_uri(self) -> bool {
        matches!(self, Self::Uri(_))
    }

    /// The `(kind, value, extra)` parameters of `bif:__rdf_long_from_batch_params`.
    pub fn bind(self) -> [Value; 3] {
        match self {
            Self::Uri(node) => [ObjectKind::Iri.into(), node.as_str().into(), Value::Null],
            Self::Bare(TermRef::BlankNode(node)) => [
                ObjectKind::Iri.into(),
                format!("_:{}", node.as_str()).into(),
                Value::Null,
            ],
            Self::Bare(TermRef::Literal(literal)) => {
                if let Some(language) = literal.language() {
                    [
                        ObjectKind::LanguageTaggedLiteral.into(),
                        literal.value().into(),
                        language.into(),
                    ]
                } else if literal.is_plain() {
                    [ObjectKind::PlainLiteral.into(), literal.value().into(), Value::Null]
                } else {
                    [
                        ObjectKind::TypedLiteral.into(),
                        literal.value().into(),
                        literal.datatype().as_str().into(),
                    ]
                }
            }
            Self::Bare(object) => [
                ObjectKind::PlainLiteral.into(),
                object.to_string().into(),
                Value::Null,
            ],
        }
    }
}

impl fmt::Display for ObjectForm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(node) => write!(f, "<{}>", node.as_str()),
            Self::Bare(object) => write!(f, "{object}"),
        }
    }
}

/// The object kind codes understood by `bif:__rdf_long_from_batch_params`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ObjectKind {
    /// An IRI, or a blank node written `_:id`.
    Iri = 1,
    PlainLiteral = 3,
    /// The extra parameter is the datatype IRI.
    TypedLiteral = 4,
    /// The extra parameter is the language tag.
    LanguageTaggedLiteral = 5,
}

impl ObjectKind {
    #[inline]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Iri),
            3 => Some(Self::PlainLiteral),
            4 => Some(Self::TypedLiteral),
            5 => Some(Self::LanguageTaggedLiteral),
            _ => None,
        }
    }
}

impl From<ObjectKind> for Value {
    #[inline]
    fn from(kind: ObjectKind) -> Self {
        Self::Integer(kind as i64)
    }
}

/// A subject, predicate or graph written `<iri>`.
///
/// Blank nodes use Virtuoso's `<_:id>` form.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Resource<'a>(NamedOrBlankNodeRef<'a>);

impl<'a> Resource<'a> {
    #[inline]
    pub fn new(node: impl Into<NamedOrBlankNodeRef<'a>>) -> Self {
        Self(node.into())
    }

    /// The parameter value used for `iri(??)` placeholders.
    pub fn bind(self) -> Value {
        match self.0 {
            NamedOrBlankNodeRef::NamedNode(node) => node.as_str().into(),
            NamedOrBlankNodeRef::BlankNode(node) => format!("_:{}", node.as_str()).into(),
        }
    }
}

impl fmt::Display for Resource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            NamedOrBlankNodeRef::NamedNode(node) => write!(f, "<{}>", node.as_str()),
            NamedOrBlankNodeRef::BlankNode(node) => write!(f, "<_:{}>", node.as_str()),
        }
    }
}

/// A triple rendered for the literal insert and delete statements: `{<S> <P> O}`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct StatementText<'a> {
    pub subject: Resource<'a>,
    pub predicate: Resource<'a>,
    pub object: ObjectForm<'a>,
}

impl<'a> StatementText<'a> {
    #[inline]
    pub fn new(triple: impl Into<TripleRef<'a>>) -> Self {
        let triple = triple.into();
        Self {
            subject: Resource::new(triple.subject),
            predicate: Resource::new(triple.predicate),
            object: ObjectForm::of(triple.object),
        }
    }

    /// The six parameters of a batch insertion row into `graph`.
    pub fn bind(self, graph: NamedNodeRef<'_>) -> Vec<Value> {
        let [kind, value, extra] = self.object.bind();
        vec![
            graph.as_str().into(),
            self.subject.bind(),
            self.predicate.bind(),
            kind,
            value,
            extra,
        ]
    }
}

impl fmt::Display for StatementText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {} {}}}", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::vocab::xsd;
    use crate::model::{BlankNodeRef, LiteralRef};

    const EX: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/s");

    #[test]
    fn uri_objects_are_bracketed() {
        assert_eq!(
            StatementText::new(TripleRef::new(EX, EX, EX)).to_string(),
            "{<http://example.com/s> <http://example.com/s> <http://example.com/s>}"
        );
    }

    #[test]
    fn literal_objects_are_bare() {
        assert_eq!(
            StatementText::new(TripleRef::new(EX, EX, LiteralRef::new_simple_literal("foo")))
                .to_string(),
            "{<http://example.com/s> <http://example.com/s> \"foo\"}"
        );
        assert_eq!(
            ObjectForm::of(LiteralRef::new_language_tagged_literal_unchecked("chat", "fr"))
                .to_string(),
            "\"chat\"@fr"
        );
    }

    #[test]
    fn iri_looking_literals_stay_literals() {
        let object = ObjectForm::of(LiteralRef::new_simple_literal("http://example.com/o"));
        assert!(!object.is_uri());
        assert_eq!(object.to_string(), "\"http://example.com/o\"");
    }

    #[test]
    fn blank_subjects() {
        let subject = Resource::new(BlankNodeRef::new_unchecked("b1"));
        assert_eq!(subject.to_string(), "<_:b1>");
        assert_eq!(subject.bind(), Value::from("_:b1"));
    }

    #[test]
    fn object_parameters() {
        assert_eq!(
            ObjectForm::of(EX).bind(),
            [
                Value::Integer(1),
                "http://example.com/s".into(),
                Value::Null
            ]
        );
        assert_eq!(
            ObjectForm::of(LiteralRef::new_simple_literal("foo")).bind(),
            [Value::Integer(3), "foo".into(), Value::Null]
        );
        assert_eq!(
            ObjectForm::of(LiteralRef::new_typed_literal("1", xsd::INTEGER)).bind(),
            [Value::Integer(4), "1".into(), xsd::INTEGER.as_str().into()]
        );
        assert_eq!(
            ObjectForm::of(LiteralRef::new_language_tagged_literal_unchecked("chat", "fr")).bind(),
            [Value::Integer(5), "chat".into(), "fr".into()]
        );
    }

    #[test]
    fn batch_row() {
        let graph = NamedNodeRef::new_unchecked("http://example.com/g");
        assert_eq!(
            StatementText::new(TripleRef::new(EX, EX, EX)).bind(graph),
            vec![
                Value::from("http://example.com/g"),
                "http://example.com/s".into(),
                "http://example.com/s".into(),
                Value::Integer(1),
                "http://example.com/s".into(),
                Value::Null,
            ]
        );
    }
}
