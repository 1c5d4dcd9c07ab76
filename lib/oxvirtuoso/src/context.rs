use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Configuration values attached to a dataset.
///
/// Values are opaque to the dataset: it never reads nor validates them.
///
/// ```
/// use oxvirtuoso::Context;
///
/// let context = Context::new();
/// context.set("timeout", 30_u64);
/// assert_eq!(context.get::<u64>("timeout").as_deref(), Some(&30));
/// assert!(context.get::<String>("timeout").is_none());
/// ```
#[derive(Default)]
pub struct Context {
    entries: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, replacing the previous one.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value));
    }

    /// Returns the value of a key if it is set with type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?
            .downcast()
            .ok()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Removes a key and returns if it was set.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(
                self.entries
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .keys(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replace_remove() {
        let context = Context::new();
        assert!(context.is_empty());
        context.set("name", "a".to_owned());
        context.set("name", "b".to_owned());
        assert_eq!(context.len(), 1);
        assert_eq!(context.get::<String>("name").as_deref().map(String::as_str), Some("b"));
        assert!(context.remove("name"));
        assert!(!context.remove("name"));
        assert!(!context.contains_key("name"));
    }
}
