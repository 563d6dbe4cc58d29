//! Retry policies for measurement requests.

use std::thread;
use std::time::Duration;

use crate::service::{Measurement, MeasurementRequest, MeasurementService, ServiceError};

/// How many times to attempt a request and how long to wait in between. The wait doubles after
/// every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, typed_builder::TypedBuilder)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    #[builder(default = 1)]
    pub max_attempts: u32,
    /// The wait before the second attempt.
    #[builder(default = Duration::ZERO)]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// The wait before attempt number `attempt` (1-based).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts run out. `op` receives the
    /// 1-based attempt number.
    pub fn run<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        F: FnMut(u32) -> Result<T, ServiceError>,
    {
        self.run_counted(op).0
    }

    /// Like [`RetryPolicy::run`], but also returns the number of attempts made.
    pub fn run_counted<T, F>(&self, mut op: F) -> (Result<T, ServiceError>, u32)
    where
        F: FnMut(u32) -> Result<T, ServiceError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Err(e) if attempt < max_attempts && e.is_transient() => {
                    let delay = self.delay_before(attempt + 1);
                    log::debug!("attempt {attempt}/{max_attempts} failed ({e}), retrying in {delay:?}");
                    thread::sleep(delay);
                    attempt += 1;
                }
                res => return (res, attempt),
            }
        }
    }
}

/// A service that retries transient failures of `inner` according to a [`RetryPolicy`].
#[derive(Debug, derive_new::new)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    /// Get a reference to the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<S: MeasurementService> MeasurementService for Retrying<S> {
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError> {
        self.policy.run(|_| self.inner.measure(request))
    }

    fn measure_counted(
        &self,
        request: &MeasurementRequest,
    ) -> (Result<Measurement, ServiceError>, u32) {
        self.policy.run_counted(|_| self.inner.measure(request))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{request, Flaky};

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::builder()
            .max_attempts(4)
            .backoff(Duration::from_millis(10))
            .build();
        let delays = (1..=4).map(|a| policy.delay_before(a)).collect::<Vec<_>>();
        assert_eq!(
            delays,
            [0, 10, 20, 40].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn default_policy_attempts_once() {
        let flaky = Flaky::new(1);
        let service = Retrying::new(&flaky, RetryPolicy::default());
        assert!(service.measure(&request(6)).is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retries_until_success() {
        let flaky = Flaky::new(2);
        let policy = RetryPolicy::builder().max_attempts(3).build();
        let service = Retrying::new(&flaky, policy);
        assert!(service.measure(&request(6)).is_ok());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let flaky = Flaky::new(10);
        let policy = RetryPolicy::builder().max_attempts(3).build();
        let service = Retrying::new(&flaky, policy);
        assert!(matches!(
            service.measure(&request(6)),
            Err(ServiceError::Timeout)
        ));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn attempts_are_counted() {
        let policy = RetryPolicy::builder().max_attempts(4).build();
        let service = Retrying::new(Flaky::new(2), policy);
        let (res, attempts) = service.measure_counted(&request(6));
        assert!(res.is_ok());
        assert_eq!(attempts, 3);
        let (res, attempts) = Flaky::new(1).measure_counted(&request(6));
        assert!(res.is_err());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::builder().max_attempts(5).build();
        let mut calls = 0;
        let res: Result<(), _> = policy.run(|_| {
            calls += 1;
            Err(ServiceError::Status {
                code: 400,
                body: "bad request".into(),
            })
        });
        assert!(res.is_err());
        assert_eq!(calls, 1);
    }
}
