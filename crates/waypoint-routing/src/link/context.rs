//! Pooled scratch buffers for URL generation

use crate::config::RouterOptions;
use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Scratch space for building one URL.
///
/// Segments are written encoded into a single buffer. Each finished segment
/// records its end offset and whether it may be dropped when nothing after it
/// is kept.
#[derive(Debug, Default)]
pub struct UriBuildingContext {
    path: String,
    boundaries: Vec<(usize, bool)>,
    query: String,
}

impl UriBuildingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new `/`-prefixed segment
    pub fn begin_segment(&mut self) {
        self.path.push('/');
    }

    /// Append a value, percent-encoded. `keep_slashes` leaves `/` as is.
    pub fn write_value(&mut self, value: &str, keep_slashes: bool) {
        if keep_slashes {
            super::encoding::push_path(&mut self.path, value);
        } else {
            super::encoding::push_segment(&mut self.path, value);
        }
    }

    pub fn end_segment(&mut self, droppable: bool) {
        self.boundaries.push((self.path.len(), droppable));
    }

    pub fn push_query(&mut self, key: &str, value: &str) {
        self.query.push(if self.query.is_empty() { '?' } else { '&' });
        super::encoding::push_query_component(&mut self.query, key);
        self.query.push('=');
        super::encoding::push_query_component(&mut self.query, value);
    }

    /// Produce the URL: trailing droppable segments are cut, then the
    /// trailing slash and lower-casing options are applied once.
    pub fn finish(&self, options: &RouterOptions) -> String {
        let cut = self
            .boundaries
            .iter()
            .rev()
            .find(|(_, droppable)| !droppable)
            .map_or(0, |(end, _)| *end);

        let mut url = String::with_capacity(cut + self.query.len() + 1);
        url.push_str(&self.path[..cut]);
        if url.is_empty() {
            url.push('/');
        } else if options.append_trailing_slash {
            url.push('/');
        }

        if options.lowercase_urls {
            url = url.to_lowercase();
            if options.lowercase_query_strings {
                url.push_str(&self.query.to_lowercase());
                return url;
            }
        }
        url.push_str(&self.query);
        url
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.boundaries.is_empty() && self.query.is_empty()
    }

    /// Heap bytes currently held by the buffers
    pub fn retained_bytes(&self) -> usize {
        self.path.capacity()
            + self.query.capacity()
            + self.boundaries.capacity() * std::mem::size_of::<(usize, bool)>()
    }

    /// Clear contents, keeping allocations
    pub fn reset(&mut self) {
        self.path.clear();
        self.boundaries.clear();
        self.query.clear();
    }
}

/// Creates and recycles pooled contexts
pub trait UriContextPolicy: Send + Sync {
    fn create(&self) -> UriBuildingContext;

    /// Prepare a returned context for reuse. `false` drops it instead.
    fn reset(&self, context: &mut UriBuildingContext) -> bool;
}

/// Resets contexts and drops those whose buffers grew past a limit
#[derive(Debug, Clone)]
pub struct DefaultUriContextPolicy {
    pub max_retained_buffer: usize,
}

impl UriContextPolicy for DefaultUriContextPolicy {
    fn create(&self) -> UriBuildingContext {
        UriBuildingContext::new()
    }

    fn reset(&self, context: &mut UriBuildingContext) -> bool {
        context.reset();
        context.retained_bytes() <= self.max_retained_buffer
    }
}

/// A bounded, thread-safe pool of [`UriBuildingContext`]s
pub struct ContextPool {
    idle: Mutex<Vec<UriBuildingContext>>,
    capacity: usize,
    policy: Box<dyn UriContextPolicy>,
}

impl ContextPool {
    pub fn new(capacity: usize, policy: impl UriContextPolicy + 'static) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            policy: Box::new(policy),
        }
    }

    pub fn from_options(options: &RouterOptions) -> Self {
        Self::new(
            options.pool_capacity,
            DefaultUriContextPolicy {
                max_retained_buffer: options.max_retained_buffer,
            },
        )
    }

    /// Check out a context. It returns to the pool when the guard drops.
    pub fn acquire(&self) -> PooledContext<'_> {
        let context = self.idle.lock().pop().unwrap_or_else(|| self.policy.create());
        PooledContext {
            pool: self,
            context,
        }
    }

    fn release(&self, mut context: UriBuildingContext) {
        if !self.policy.reset(&mut context) {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(context);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("capacity", &self.capacity)
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// A checked-out context
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    context: UriBuildingContext,
}

impl Deref for PooledContext<'_> {
    type Target = UriBuildingContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.context
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.context));
    }
}
