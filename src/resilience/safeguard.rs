//! An operation bound to a breaker.

use std::fmt;
use std::future::Future;

use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::classifier::Classifier;
use crate::resilience::error::GuardError;

/// A guarded operation, created by [`CircuitBreaker::wrap`].
///
/// ```ignore
/// let fetch = breaker.wrap("pricing-api", Classifier::any(), |sku: String| client.price(sku));
/// match fetch.call("sku-1".into()).await {
///     Ok(price) => ..,
///     Err(GuardError::Open { .. }) => .., // skip, the API is known to be failing
///     Err(e) => ..,
/// }
/// ```
pub struct Safeguarded<E, F> {
    breaker: CircuitBreaker,
    id: String,
    classifier: Classifier<E>,
    operation: F,
}

impl<E, F> Safeguarded<E, F> {
    pub(crate) fn new(
        breaker: CircuitBreaker,
        id: String,
        classifier: Classifier<E>,
        operation: F,
    ) -> Self {
        Self {
            breaker,
            id,
            classifier,
            operation,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Invoke the operation with `input` through the breaker.
    pub async fn call<A, T, Fut>(&self, input: A) -> Result<T, GuardError<E>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.breaker
            .call(&self.id, &self.classifier, || (self.operation)(input))
            .await
    }
}

impl<E, F> fmt::Debug for Safeguarded<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Safeguarded")
            .field("id", &self.id)
            .field("classifier", &self.classifier)
            .finish()
    }
}
