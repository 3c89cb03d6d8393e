//! Typed, ordered endpoint metadata

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// An ordered bag of arbitrary typed items attached to an endpoint.
///
/// Items keep registration order. Later items of the same type take
/// precedence in [`get`](Self::get); [`get_ordered`](Self::get_ordered)
/// returns every item of a type, in order.
#[derive(Clone, Default)]
pub struct EndpointMetadata {
    items: Vec<Arc<dyn Any + Send + Sync>>,
}

impl EndpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Any + Send + Sync>(&mut self, item: T) {
        self.items.push(Arc::new(item));
    }

    pub fn with<T: Any + Send + Sync>(mut self, item: T) -> Self {
        self.push(item);
        self
    }

    /// Append every item of `other` after the existing ones
    pub fn extend(&mut self, other: &EndpointMetadata) {
        self.items.extend(other.items.iter().cloned());
    }

    /// The most recently added item of type `T`
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.items
            .iter()
            .rev()
            .find_map(|item| item.downcast_ref::<T>())
    }

    pub fn get_ordered<T: Any + Send + Sync>(&self) -> Vec<&T> {
        self.items
            .iter()
            .filter_map(|item| item.downcast_ref::<T>())
            .collect()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.get::<T>().is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for EndpointMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointMetadata")
            .field("items", &self.items.len())
            .finish()
    }
}
