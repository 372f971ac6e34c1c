//! Flow-scoped blackboard
//!
//! String-keyed storage of arbitrary typed values, created with the flow and
//! dropped at teardown. A key holds at most one value; `put` replaces. One
//! recognized value shape is the [`PubSubHandler`], which fans a payload out
//! to its subscribers in registration order.
//!
//! Besides the plain entries the store keeps named LRU caches, and reports
//! every change to the registered change listeners.

use std::any::{type_name, Any};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::error::{StorageError, StorageResult};
use super::token::Payload;
use super::variables;

/// Start of a storage placeholder
pub const START: &str = "%{";

/// End of a storage placeholder
pub const END: &str = "}";

/// Who published, and under which key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishContext {
    /// Full name of the publishing actor
    pub publisher: String,
    /// Storage key of the handler
    pub key: String,
}

/// Subscriber callback
pub type Subscriber = Box<dyn FnMut(&PublishContext, &Arc<Payload>) + Send>;

/// Publish/subscribe handler stored on the blackboard
#[derive(Default)]
pub struct PubSubHandler {
    subscribers: Vec<(String, Subscriber)>,
}

impl PubSubHandler {
    /// Create a handler without subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; an existing id keeps its position
    pub fn subscribe<F>(&mut self, id: impl Into<String>, callback: F)
    where
        F: FnMut(&PublishContext, &Arc<Payload>) + Send + 'static,
    {
        let id = id.into();
        match self.subscribers.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = Box::new(callback),
            None => self.subscribers.push((id, Box::new(callback))),
        }
    }

    /// Remove a subscriber
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| existing != id);
        self.subscribers.len() != before
    }

    /// Hand the payload to every subscriber, in registration order
    ///
    /// Returns the number of subscribers notified.
    pub fn publish(&mut self, ctx: &PublishContext, payload: &Arc<Payload>) -> usize {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(ctx, payload);
        }
        self.subscribers.len()
    }

    /// Subscriber ids in registration order
    pub fn subscriber_ids(&self) -> impl Iterator<Item = &str> {
        self.subscribers.iter().map(|(id, _)| id.as_str())
    }

    /// Number of subscribers
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for PubSubHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSubHandler")
            .field("subscribers", &self.subscriber_ids().collect::<Vec<_>>())
            .finish()
    }
}

/// What happened to a storage item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Stored under a key that was free
    Added,
    /// Replaced an existing value
    Modified,
    /// Removed
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        };
        write!(f, "{}", s)
    }
}

/// Change notification handed to the change listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Kind of change
    pub kind: ChangeKind,
    /// Affected key
    pub key: String,
    /// LRU cache holding the key, `None` for plain entries
    pub cache: Option<String>,
}

/// Change listener callback
pub type ChangeListener = Box<dyn FnMut(&StorageChange) + Send>;

struct Entry {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Entry {
    fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: short_type_name(type_name::<T>()),
        }
    }

    fn downcast_ref<T: Any>(&self, key: &str) -> StorageResult<&T> {
        self.value
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch::<T>(key, self.type_name))
    }
}

// Most recently used key at the back of `order`
struct LruCache {
    capacity: usize,
    entries: BTreeMap<String, Entry>,
    order: VecDeque<String>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: BTreeMap::new(),
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    /// Returns whether the key was already present, and the evicted key
    fn insert(&mut self, key: String, entry: Entry) -> (bool, Option<String>) {
        if self.entries.insert(key.clone(), entry).is_some() {
            self.touch(&key);
            return (true, None);
        }

        self.order.push_back(key);
        let mut evicted = None;
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        (false, evicted)
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        self.order.retain(|k| k != key);
        true
    }
}

/// Flow-scoped key-value store
#[derive(Default)]
pub struct Storage {
    entries: BTreeMap<String, Entry>,
    caches: BTreeMap<String, LruCache>,
    listeners: Vec<(String, ChangeListener)>,
}

impl Storage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one
    pub fn put<T: Any + Send>(&mut self, key: impl Into<String>, value: T) -> StorageResult<()> {
        let key = key.into();
        if !variables::is_valid_name(&key) {
            return Err(StorageError::InvalidName(key));
        }

        let kind = match self.entries.insert(key.clone(), Entry::new(value)) {
            Some(_) => ChangeKind::Modified,
            None => ChangeKind::Added,
        };
        self.notify(kind, key, None);
        Ok(())
    }

    /// Whether a value is stored under the key
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Borrow a value of the expected type
    pub fn get<T: Any>(&self, key: &str) -> StorageResult<&T> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        entry.downcast_ref::<T>(key)
    }

    /// Mutably borrow a value of the expected type
    pub fn get_mut<T: Any>(&mut self, key: &str) -> StorageResult<&mut T> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let actual = entry.type_name;
        entry
            .value
            .downcast_mut::<T>()
            .ok_or_else(|| mismatch::<T>(key, actual))
    }

    /// Type name of the stored value
    pub fn type_name(&self, key: &str) -> Option<&'static str> {
        self.entries.get(key).map(|entry| entry.type_name)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        self.notify(ChangeKind::Removed, key.to_string(), None);
        true
    }

    /// Stored keys in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every value and every LRU cache; listeners stay registered
    pub fn clear(&mut self) {
        self.entries.clear();
        self.caches.clear();
    }

    /// Add an LRU cache holding at most `capacity` values
    ///
    /// An existing cache of the same name is replaced, dropping its content.
    pub fn add_cache(&mut self, name: impl Into<String>, capacity: usize) {
        let name = name.into();
        tracing::debug!(cache = %name, capacity, "added storage cache");
        self.caches.insert(name, LruCache::new(capacity));
    }

    /// Names of the LRU caches in order
    pub fn caches(&self) -> impl Iterator<Item = &str> {
        self.caches.keys().map(String::as_str)
    }

    /// Store a value in the named LRU cache
    ///
    /// Storing beyond the capacity evicts the least recently used value.
    pub fn put_cached<T: Any + Send>(
        &mut self,
        cache: &str,
        key: impl Into<String>,
        value: T,
    ) -> StorageResult<()> {
        let key = key.into();
        if !variables::is_valid_name(&key) {
            return Err(StorageError::InvalidName(key));
        }
        let lru = self
            .caches
            .get_mut(cache)
            .ok_or_else(|| StorageError::UnknownCache(cache.to_string()))?;

        let (replaced, evicted) = lru.insert(key.clone(), Entry::new(value));
        if let Some(evicted) = evicted {
            tracing::debug!(cache, key = %evicted, "evicted from storage cache");
        }
        let kind = if replaced {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        self.notify(kind, key, Some(cache.to_string()));
        Ok(())
    }

    /// Whether the named LRU cache holds the key
    pub fn has_cached(&self, cache: &str, key: &str) -> bool {
        self.caches
            .get(cache)
            .is_some_and(|lru| lru.entries.contains_key(key))
    }

    /// Borrow a cached value of the expected type, marking it as recently used
    pub fn get_cached<T: Any>(&mut self, cache: &str, key: &str) -> StorageResult<&T> {
        let lru = self
            .caches
            .get_mut(cache)
            .ok_or_else(|| StorageError::UnknownCache(cache.to_string()))?;

        lru.touch(key);
        lru.entries
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?
            .downcast_ref::<T>(key)
    }

    /// Remove a value from the named LRU cache
    pub fn remove_cached(&mut self, cache: &str, key: &str) -> bool {
        let removed = self
            .caches
            .get_mut(cache)
            .is_some_and(|lru| lru.remove(key));
        if removed {
            self.notify(ChangeKind::Removed, key.to_string(), Some(cache.to_string()));
        }
        removed
    }

    /// Number of values in the named LRU cache
    pub fn cache_len(&self, cache: &str) -> Option<usize> {
        self.caches.get(cache).map(|lru| lru.entries.len())
    }

    /// Register a change listener; an existing id is replaced in place
    pub fn add_listener<F>(&mut self, id: impl Into<String>, listener: F)
    where
        F: FnMut(&StorageChange) + Send + 'static,
    {
        let id = id.into();
        match self.listeners.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = Box::new(listener),
            None => self.listeners.push((id, Box::new(listener))),
        }
    }

    /// Remove a change listener
    pub fn remove_listener(&mut self, id: &str) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| existing != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, kind: ChangeKind, key: String, cache: Option<String>) {
        if self.listeners.is_empty() {
            return;
        }
        let change = StorageChange { kind, key, cache };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
    }

    /// Subscribe to the handler under `key`, creating the handler if absent
    pub fn subscribe<F>(&mut self, key: &str, id: impl Into<String>, callback: F) -> StorageResult<()>
    where
        F: FnMut(&PublishContext, &Arc<Payload>) + Send + 'static,
    {
        if !self.has(key) {
            self.put(key, PubSubHandler::new())?;
        }
        self.get_mut::<PubSubHandler>(key)?.subscribe(id, callback);
        Ok(())
    }

    /// Remove a subscriber from the handler under `key`
    pub fn unsubscribe(&mut self, key: &str, id: &str) -> StorageResult<bool> {
        Ok(self.get_mut::<PubSubHandler>(key)?.unsubscribe(id))
    }

    /// Publish through the handler under `key`
    pub fn publish(
        &mut self,
        key: &str,
        ctx: &PublishContext,
        payload: &Arc<Payload>,
    ) -> StorageResult<usize> {
        let notified = self.get_mut::<PubSubHandler>(key)?.publish(ctx, payload);
        tracing::debug!(key, publisher = %ctx.publisher, notified, "published");
        Ok(notified)
    }

    /// Replace every `%{key}` placeholder with the stored value
    ///
    /// Payloads, strings, numbers and booleans expand; anything else and
    /// unknown keys are left untouched.
    pub fn expand(&self, s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut rest = s;

        while let Some(start) = rest.find(START) {
            let after = &rest[start + START.len()..];
            let Some(end) = after.find(END) else {
                break;
            };

            let key = &after[..end];
            result.push_str(&rest[..start]);
            match self.display_value(key) {
                Some(value) => result.push_str(&value),
                None => {
                    result.push_str(START);
                    result.push_str(key);
                    result.push_str(END);
                }
            }
            rest = &after[end + END.len()..];
        }

        result.push_str(rest);
        result
    }

    fn display_value(&self, key: &str) -> Option<String> {
        let value = &self.entries.get(key)?.value;
        if let Some(payload) = value.downcast_ref::<Payload>() {
            return Some(payload.to_string());
        }
        if let Some(payload) = value.downcast_ref::<Arc<Payload>>() {
            return Some(payload.to_string());
        }
        if let Some(s) = value.downcast_ref::<String>() {
            return Some(s.clone());
        }
        if let Some(i) = value.downcast_ref::<i64>() {
            return Some(i.to_string());
        }
        if let Some(d) = value.downcast_ref::<f64>() {
            return Some(d.to_string());
        }
        value.downcast_ref::<bool>().map(|b| b.to_string())
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, e)| (k, e.type_name)))
            .finish()
    }
}

fn mismatch<T>(key: &str, actual: &'static str) -> StorageError {
    StorageError::TypeMismatch {
        key: key.to_string(),
        expected: short_type_name(type_name::<T>()),
        actual,
    }
}

// `alloc::string::String` -> `String`; generic types keep their full name
fn short_type_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        full
    } else {
        full.rsplit("::").next().unwrap_or(full)
    }
}
