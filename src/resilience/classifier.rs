//! Failure classification: which errors trip a breaker.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// A set of predicates over an operation's error type.
///
/// An error qualifies when any predicate matches it. An empty set matches
/// every error, so `Classifier::any()` trips on all failures.
pub struct Classifier<E> {
    predicates: Vec<Predicate<E>>,
}

impl<E> Classifier<E> {
    /// Trip on any failure.
    pub fn any() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Add a predicate.
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Whether `error` should trip the breaker.
    pub fn matches(&self, error: &E) -> bool {
        self.predicates.is_empty() || self.predicates.iter().any(|p| p(error))
    }
}

impl<E: Error + 'static> Classifier<E> {
    /// Trip when an error of type `T` is the error itself or anywhere in its
    /// `source()` chain.
    pub fn on_error<T: Error + 'static>(self) -> Self {
        self.when(|error: &E| caused_by::<T>(error))
    }
}

fn caused_by<T: Error + 'static>(error: &(dyn Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<T>() {
            return true;
        }
        current = e.source();
    }
    false
}

impl<E> Default for Classifier<E> {
    fn default() -> Self {
        Self::any()
    }
}

impl<E> Clone for Classifier<E> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
        }
    }
}

impl<E> fmt::Debug for Classifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("network unreachable")]
    struct NetworkError;

    #[derive(Debug, Error)]
    enum CallError {
        #[error("transport failed")]
        Transport(#[source] NetworkError),
        #[error("bad input: {0}")]
        BadInput(String),
    }

    #[test]
    fn test_empty_matches_everything() {
        let classifier = Classifier::<CallError>::any();
        assert!(classifier.is_empty());
        assert!(classifier.matches(&CallError::BadInput("x".into())));
    }

    #[test]
    fn test_predicates() {
        let classifier = Classifier::any().when(|e: &CallError| matches!(e, CallError::Transport(_)));
        assert!(classifier.matches(&CallError::Transport(NetworkError)));
        assert!(!classifier.matches(&CallError::BadInput("x".into())));
    }

    #[test]
    fn test_on_error_walks_source_chain() {
        let classifier = Classifier::<CallError>::any().on_error::<NetworkError>();
        assert!(classifier.matches(&CallError::Transport(NetworkError)));
        assert!(!classifier.matches(&CallError::BadInput("x".into())));

        let direct = Classifier::<NetworkError>::any().on_error::<NetworkError>();
        assert!(direct.matches(&NetworkError));
    }
}
