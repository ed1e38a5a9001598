use std::thread;
use std::time::Duration;

use anyhow::Result;

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Transient,
    Fatal,
}

/// Classify an error chain the way the fetch paths need it: read timeouts and
/// connection failures are transient, everything else aborts immediately.
pub fn classify_http_error(err: &anyhow::Error) -> RetryClass {
    for cause in err.chain() {
        if let Some(req_err) = cause.downcast_ref::<reqwest::Error>() {
            if req_err.is_timeout() || req_err.is_connect() {
                return RetryClass::Transient;
            }
        }
    }
    RetryClass::Fatal
}

/// Run `op` up to `attempts` times, sleeping `delay` between transient
/// failures. The final transient error (or the first fatal one) is returned.
pub fn with_backoff<T>(
    attempts: usize,
    delay: Duration,
    classify: impl Fn(&anyhow::Error) -> RetryClass,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if classify(&err) == RetryClass::Fatal {
                    return Err(err);
                }
                last_err = Some(err);
                if attempt < attempts && !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt ran"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn transient_always(_: &anyhow::Error) -> RetryClass {
        RetryClass::Transient
    }

    #[test]
    fn succeeds_after_two_transient_failures() {
        let mut calls = 0;
        let result = with_backoff(3, Duration::ZERO, transient_always, || {
            calls += 1;
            if calls < 3 {
                Err(anyhow!("timeout"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn gives_up_after_exhausting_attempts() {
        let mut calls = 0;
        let result: Result<()> = with_backoff(3, Duration::ZERO, transient_always, || {
            calls += 1;
            Err(anyhow!("timeout"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn fatal_errors_do_not_retry() {
        let mut calls = 0;
        let result: Result<()> = with_backoff(3, Duration::ZERO, |_| RetryClass::Fatal, || {
            calls += 1;
            Err(anyhow!("bad request"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let result = with_backoff(0, Duration::ZERO, transient_always, || {
            calls += 1;
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }
}
