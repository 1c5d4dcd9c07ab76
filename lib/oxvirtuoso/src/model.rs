//! RDF terms, triples and quads as defined by [OxRDF](https://crates.io/crates/oxrdf).
//!
//! Usage example:
//!
//! ```
//! use oxvirtuoso::model::*;
//!
//! let ex = NamedNodeRef::new("http://example.com")?;
//! let quad = QuadRef::new(ex, ex, ex, ex);
//! assert_eq!(
//!     "<http://example.com> <http://example.com> <http://example.com> <http://example.com>",
//!     quad.to_string()
//! );
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

pub use oxrdf::*;
