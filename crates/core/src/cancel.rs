//! Cancellation-aware execution of store and HTTP futures.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Race `fut` against `cancel`. A fired token wins even if `fut` is ready in
/// the same poll, so a cancelled pass never performs one more write.
pub async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_when_not_cancelled() {
        let token = CancellationToken::new();
        let v = with_cancel(&token, async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let res: Result<()> = with_cancel(&token, std::future::pending()).await;
        assert!(matches!(res, Err(Error::Cancelled)));
    }
}
