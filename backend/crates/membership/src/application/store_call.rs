//! Time-bounded store calls

use std::future::Future;
use std::time::Duration;

use crate::error::{MembershipError, MembershipResult};

/// Run a store operation under `limit`; elapsed becomes `Unavailable`
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &'static str, call: F) -> MembershipResult<T>
where
    F: Future<Output = MembershipResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(MembershipError::Unavailable { operation })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_is_unavailable() {
        let result: MembershipResult<()> = bounded(Duration::from_millis(10), "find_session", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(MembershipError::Unavailable { operation: "find_session" })
        ));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok: MembershipResult<u8> = bounded(Duration::from_secs(1), "x", async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: MembershipResult<u8> =
            bounded(Duration::from_secs(1), "x", async { Err(MembershipError::InvalidId) }).await;
        assert!(matches!(err, Err(MembershipError::InvalidId)));
    }
}
