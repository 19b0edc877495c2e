//! Bounded retry with a fixed delay

use std::time::Duration;

use super::CancelToken;

/// How many times to attempt an operation and how long to pause in between
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

/// Why a retried operation gave up
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The token was cancelled before an attempt or during a pause
    Cancelled { attempts: u32 },
    /// Every attempt failed; carries the last error
    Exhausted { attempts: u32, last: E },
}

impl RetryPolicy {
    /// Attempts made by a document load before giving up
    pub const DEFAULT_ATTEMPTS: u32 = 10;
    /// Pause between load attempts
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

    /// At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, the attempts run out, or `cancel` fires.
    /// Pauses use [`CancelToken::wait`].
    pub fn run<T, E>(
        &self,
        cancel: &CancelToken,
        op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<(T, u32), RetryError<E>> {
        self.run_with(cancel, |delay| {
            cancel.wait(delay);
        }, op)
    }

    /// Same as [`run`](Self::run) with a caller-supplied pause.
    ///
    /// `op` receives the 1-based attempt number. On success the value is
    /// returned with the number of attempts it took.
    pub fn run_with<T, E>(
        &self,
        cancel: &CancelToken,
        mut pause: impl FnMut(Duration),
        mut op: impl FnMut(u32) -> Result<T, E>,
    ) -> Result<(T, u32), RetryError<E>> {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }

            attempt += 1;
            match op(attempt) {
                Ok(value) => return Ok((value, attempt)),
                Err(last) if attempt >= self.max_attempts => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last,
                    });
                }
                Err(_) => pause(self.delay),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_pause(_: Duration) {}

    #[test]
    fn first_success_is_returned_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        let result: Result<(u8, u32), RetryError<&str>> =
            policy.run_with(&CancelToken::new(), no_pause, |_| Ok(7));
        assert_eq!(result, Ok((7, 1)));
    }

    #[test]
    fn succeeds_on_third_attempt_with_two_pauses() {
        let policy = RetryPolicy::new(10, Duration::from_millis(500));
        let mut pauses = Vec::new();

        let result = policy.run_with(
            &CancelToken::new(),
            |d| pauses.push(d),
            |attempt| if attempt < 3 { Err("not yet") } else { Ok("doc") },
        );

        assert_eq!(result, Ok(("doc", 3)));
        assert_eq!(pauses, vec![Duration::from_millis(500); 2]);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(4, Duration::ZERO);
        let mut calls = 0;

        let result: Result<((), u32), _> = policy.run_with(&CancelToken::new(), no_pause, |n| {
            calls += 1;
            Err(format!("failure {n}"))
        });

        assert_eq!(calls, 4);
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: "failure 4".to_string()
            })
        );
    }

    #[test]
    fn cancellation_during_pause_stops_retrying() {
        let policy = RetryPolicy::new(10, Duration::from_millis(1));
        let cancel = CancelToken::new();
        let mut calls = 0;

        let result: Result<((), u32), _> = policy.run_with(
            &cancel,
            |_| cancel.cancel(),
            |_| {
                calls += 1;
                Err("boom")
            },
        );

        assert_eq!(calls, 1);
        assert_eq!(result, Err(RetryError::Cancelled { attempts: 1 }));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn run_uses_cancel_aware_pause() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let result = policy.run(&CancelToken::new(), |n| if n == 1 { Err(()) } else { Ok(n) });
        assert_eq!(result, Ok((2, 2)));
    }
}
