//! Memoized call sites
//!
//! A [`CachedFn`] pairs a function with a [`CacheManager`] so that calls
//! with equal arguments are served from the cache. The cache key is the
//! function name followed by the `Debug` rendering of the arguments.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use super::manager::CacheManager;
use crate::utils::SizeEstimate;

/// A function whose results are cached by argument
pub struct CachedFn<A: ?Sized, V, F> {
    cache: Arc<CacheManager<V>>,
    name: String,
    func: F,
    _args: PhantomData<fn(&A)>,
}

impl<A, V, F> CachedFn<A, V, F>
where
    A: Debug + ?Sized,
    V: Clone + SizeEstimate,
    F: Fn(&A) -> V,
{
    pub fn new(cache: Arc<CacheManager<V>>, name: impl Into<String>, func: F) -> Self {
        Self {
            cache,
            name: name.into(),
            func,
            _args: PhantomData,
        }
    }

    /// Cache key for `args`
    pub fn key_for(&self, args: &A) -> String {
        format!("{}_{:?}", self.name, args)
    }

    /// Return the cached result for `args`, computing it on a miss
    pub fn call(&self, args: &A) -> V {
        let key = self.key_for(args);
        self.cache.get_or_insert_with(&key, || (self.func)(args))
    }

    /// Drop the cached result for `args`
    pub fn invalidate(&self, args: &A) -> bool {
        self.cache.invalidate(&self.key_for(args))
    }

    pub fn cache(&self) -> &Arc<CacheManager<V>> {
        &self.cache
    }
}
