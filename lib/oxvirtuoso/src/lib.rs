#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod codec;
pub mod connection;
mod context;
mod cursor;
pub mod dataset;
mod dataset_graph;
mod error;
mod graph;
pub mod memory;
pub mod model;
mod query;
mod registry;
mod transaction;

pub use crate::codec::{ObjectForm, ObjectKind, Resource, StatementText};
pub use crate::context::Context;
pub use crate::cursor::{QuadIter, TripleIter};
pub use crate::dataset_graph::DatasetGraphView;
pub use crate::error::{DatasetError, StoreQueryError};
pub use crate::graph::{SingleGraphStore, TripleCursor, VirtGraph};
pub use crate::query::{BATCH_INSERT, BATCH_SIZE, GRAPH_EXISTS, LIST_KNOWN_GRAPHS};
pub use crate::registry::{GraphNameIter, GraphRegistry};
pub use crate::transaction::TransactionState;
