//! Batch result containers and execution policies

use crate::errors::RestError;
use crate::types::outcome::Outcome;

/// How a batch reacts to a failing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchPolicy {
    /// Run everything; every request yields an [`Outcome`].
    CollectIgnoringErrors,
    /// Abort on the first transport failure. Server rejections are tolerated
    /// and left out of the result.
    FailFast,
    /// Abort on the first failure of any kind.
    FailFastAny,
}

impl BatchPolicy {
    /// Whether `err` should cancel the remaining requests.
    pub fn aborts_on(self, err: &RestError) -> bool {
        match self {
            Self::CollectIgnoringErrors => false,
            Self::FailFast => !err.is_domain(),
            Self::FailFastAny => true,
        }
    }
}

/// Map from request id to value, iterated in the order the requests were
/// submitted
///
/// Lookups are linear. Batches are sized for a page fan-out, not for
/// millions of entries.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchMap<V> {
    entries: Vec<(String, V)>,
}

/// Per-request outcomes of a collecting batch.
pub type BatchResult<T> = BatchMap<Outcome<T>>;

impl<V> BatchMap<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// Append an entry. Callers keep ids unique; the batch builder
    /// rejects duplicates before anything runs.
    pub fn push(&mut self, id: impl Into<String>, value: V) {
        self.entries.push((id.into(), value));
    }

    pub fn get(&self, id: &str) -> Option<&V> {
        self.entries.iter().find(|(key, _)| key == id).map(|(_, value)| value)
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.entries.into_iter().map(|(_, value)| value)
    }
}

impl<T> BatchMap<Outcome<T>> {
    pub fn success_count(&self) -> usize {
        self.values().filter(|outcome| outcome.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.values().filter(|outcome| outcome.is_error()).count()
    }

    /// Failed requests with their errors, in submission order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &RestError)> {
        self.iter().filter_map(|(id, outcome)| outcome.error().map(|err| (id, err)))
    }
}

impl<V> Default for BatchMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for BatchMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl<V> IntoIterator for BatchMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a BatchMap<V> {
    type Item = &'a (String, V);
    type IntoIter = std::slice::Iter<'a, (String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
