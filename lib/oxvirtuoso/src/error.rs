use crate::model::NamedNode;
use std::convert::Infallible;
use std::error::Error;
use std::io;

/// An error returned by the remote store while executing a statement.
///
/// The driver error is kept as is and its message is displayed unmodified.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct StoreQueryError {
    source: Box<dyn Error + Send + Sync + 'static>,
}

impl StoreQueryError {
    /// Wraps an error raised by the connection.
    #[inline]
    pub fn new(error: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self {
            source: error.into(),
        }
    }

    /// Builds an error from a printable error message.
    #[inline]
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        Self::new(msg.into())
    }

    /// The error raised by the connection.
    #[inline]
    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }

    #[inline]
    pub fn into_inner(self) -> Box<dyn Error + Send + Sync + 'static> {
        self.source
    }
}

/// An error related to dataset operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DatasetError {
    /// A statement execution failed on the remote store.
    #[error(transparent)]
    StoreQuery(#[from] StoreQueryError),
    /// A named graph with at least one triple already exists under this name.
    #[error("A model with ID '{}' already exists", .0.as_str())]
    DuplicateGraph(NamedNode),
    /// The default graph must be a [`VirtGraph`](crate::VirtGraph) bound to the dataset connection.
    #[error("Only a VirtGraph bound to the dataset connection is supported as default graph")]
    UnsupportedGraphType,
    /// A step of a composite write failed and its effects have been rolled back.
    #[error("Could not {operation}: {source}")]
    CompositeWrite {
        /// The composite operation, e.g. `"replace the named model"`.
        operation: &'static str,
        /// The step failure.
        #[source]
        source: Box<DatasetError>,
    },
    /// A step of a composite write failed and the rollback failed too.
    ///
    /// The connection state is unknown: the dataset is unusable afterwards.
    #[error("Could not {operation}, and could not rollback: {rollback} (after: {source})")]
    RollbackFailed {
        /// The composite operation, e.g. `"replace the named model"`.
        operation: &'static str,
        /// The step failure.
        #[source]
        source: Box<DatasetError>,
        /// The rollback failure.
        rollback: StoreQueryError,
    },
    /// A cursor has been consumed after its dataset has been closed.
    #[error("The cursor has been used after its dataset has been closed")]
    CursorClosed,
    /// The operation is not implemented.
    #[error("{0} is not supported")]
    UnsupportedOperation(&'static str),
    /// The dataset connection has been closed.
    #[error("The dataset connection is closed")]
    Closed,
    /// A previous rollback failed and the connection is in an unknown state.
    #[error("The dataset connection is in an unknown state after a failed rollback")]
    Unusable,
}

impl DatasetError {
    /// Returns the error raised by the remote store if this error originates from it.
    pub fn store_query_error(&self) -> Option<&StoreQueryError> {
        match self {
            Self::StoreQuery(error) => Some(error),
            Self::CompositeWrite { source, .. } | Self::RollbackFailed { source, .. } => {
                source.store_query_error()
            }
            _ => None,
        }
    }
}

impl From<Infallible> for DatasetError {
    #[inline]
    fn from(error: Infallible) -> Self {
        match error {}
    }
}

impl From<StoreQueryError> for io::Error {
    #[inline]
    fn from(error: StoreQueryError) -> Self {
        match error.source.downcast() {
            Ok(error) => *error,
            Err(error) => Self::other(error),
        }
    }
}

impl From<DatasetError> for io::Error {
    #[inline]
    fn from(error: DatasetError) -> Self {
        match error {
            DatasetError::StoreQuery(error) => error.into(),
            DatasetError::DuplicateGraph(_) => Self::new(io::ErrorKind::AlreadyExists, error),
            DatasetError::UnsupportedGraphType => Self::new(io::ErrorKind::InvalidInput, error),
            DatasetError::UnsupportedOperation(_) => Self::new(io::ErrorKind::Unsupported, error),
            DatasetError::CursorClosed | DatasetError::Closed => {
                Self::new(io::ErrorKind::NotConnected, error)
            }
            DatasetError::CompositeWrite { .. }
            | DatasetError::RollbackFailed { .. }
            | DatasetError::Unusable => Self::other(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_message_is_kept_unmodified() {
        let error = DatasetError::from(StoreQueryError::msg(
            "SR133: Can not set NULL to not nullable column",
        ));
        assert_eq!(
            error.to_string(),
            "SR133: Can not set NULL to not nullable column"
        );
    }

    #[test]
    fn composite_errors_expose_the_store_error() {
        let error = DatasetError::CompositeWrite {
            operation: "replace the named model",
            source: Box::new(StoreQueryError::msg("boom").into()),
        };
        assert_eq!(error.to_string(), "Could not replace the named model: boom");
        assert_eq!(
            error.store_query_error().map(ToString::to_string).as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn driver_error_is_accessible() {
        let driver = io::Error::new(io::ErrorKind::TimedOut, "Virtuoso S1T00 Error SR171");
        let error = StoreQueryError::new(driver);
        assert!(error.inner().is::<io::Error>());
        assert_eq!(error.inner().to_string(), "Virtuoso S1T00 Error SR171");
        let Ok(driver) = error.into_inner().downcast::<io::Error>() else {
            panic!("the driver error should be kept");
        };
        assert_eq!(driver.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn io_error_kinds() {
        let error: io::Error = DatasetError::UnsupportedOperation("findNG").into();
        assert_eq!(error.kind(), io::ErrorKind::Unsupported);
        let error: io::Error = DatasetError::CursorClosed.into();
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
    }
}
