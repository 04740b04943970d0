// Copyright 2024 melonfire-sync contributors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

//! The single mandatory outer retry: on the first failure, call the inner
//! sync exactly once more with fresh state. A second failure propagates
//! verbatim; this wrapper never compounds retries inside push/pull
//! themselves.

use std::future::Future;

use log::warn;

use crate::error::Result;

/// Run `f`, and on failure run it exactly once more, returning whichever
/// attempt's result came back last. `f` is a closure so each attempt gets
/// its own freshly constructed future (re-reading `lastPulledAt`, rebuilding
/// the changeset, etc., is the caller's responsibility between attempts —
/// this wrapper only owns the "try once more" policy).
pub async fn with_retry<F, Fut, T>(mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(value) => Ok(value),
        Err(first_error) => {
            warn!("sync attempt failed, retrying once: {first_error}");
            f().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_exactly_once_on_failure() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32> = with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Error::OutOfSync {
                        expected: 1,
                        found: 2,
                    })
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn surfaces_the_second_failure_verbatim() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::OutOfSync {
                    expected: 5,
                    found: 6,
                })
            }
        })
        .await;
        assert!(matches!(result, Err(Error::OutOfSync { expected: 5, found: 6 })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
