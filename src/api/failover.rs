//! Provider failover
//!
//! Calls go to the active provider. A transient failure moves the active
//! pointer to the next provider (round robin) and the call is retried once
//! there; the pointer stays where it moved. Other failures are returned as is.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::api::{AddressInfo, BroadcastAck, NetworkProvider};
use crate::error::{WalletError, WalletResult};
use crate::fees::FeeEstimate;
use crate::tx::SignedTransaction;

pub struct FailoverCoordinator {
    providers: Vec<Arc<dyn NetworkProvider>>,
    active: Mutex<usize>,
}

impl FailoverCoordinator {
    pub fn new(providers: Vec<Arc<dyn NetworkProvider>>) -> WalletResult<Self> {
        if providers.is_empty() {
            return Err(WalletError::configuration("At least one provider is required"));
        }
        Ok(Self {
            providers,
            active: Mutex::new(0),
        })
    }

    pub fn active_index(&self) -> usize {
        *self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn current(&self) -> (usize, Arc<dyn NetworkProvider>) {
        let index = self.active_index();
        (index, Arc::clone(&self.providers[index]))
    }

    /// Returns the provider to retry on, or `None` when failover does not apply.
    fn fail_over(
        &self,
        failed: usize,
        operation: &str,
        error: &WalletError,
    ) -> Option<Arc<dyn NetworkProvider>> {
        if !error.is_transient() || self.providers.len() < 2 {
            return None;
        }
        let mut active = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // A concurrent caller may already have moved past the failed provider.
        if *active == failed {
            *active = (failed + 1) % self.providers.len();
        }
        let next = *active;
        warn!(
            operation,
            from = self.providers[failed].name(),
            to = self.providers[next].name(),
            error = %error,
            "provider failed, switching"
        );
        Some(Arc::clone(&self.providers[next]))
    }
}

#[async_trait]
impl NetworkProvider for FailoverCoordinator {
    fn name(&self) -> &str {
        "failover"
    }

    async fn get_info(&self, address: &str) -> WalletResult<AddressInfo> {
        let (index, provider) = self.current();
        match provider.get_info(address).await {
            Err(error) => match self.fail_over(index, "get_info", &error) {
                Some(next) => next.get_info(address).await,
                None => Err(error),
            },
            ok => ok,
        }
    }

    async fn get_fee(&self) -> WalletResult<FeeEstimate> {
        let (index, provider) = self.current();
        match provider.get_fee().await {
            Err(error) => match self.fail_over(index, "get_fee", &error) {
                Some(next) => next.get_fee().await,
                None => Err(error),
            },
            ok => ok,
        }
    }

    async fn broadcast(&self, transaction: &SignedTransaction) -> WalletResult<BroadcastAck> {
        let (index, provider) = self.current();
        match provider.broadcast(transaction).await {
            Err(error) => match self.fail_over(index, "broadcast", &error) {
                Some(next) => next.broadcast(transaction).await,
                None => Err(error),
            },
            ok => ok,
        }
    }

    async fn account_exists(&self, address: &str) -> WalletResult<bool> {
        let (index, provider) = self.current();
        match provider.account_exists(address).await {
            Err(error) => match self.fail_over(index, "account_exists", &error) {
                Some(next) => next.account_exists(address).await,
                None => Err(error),
            },
            ok => ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::fees::FeeUnit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        name: String,
        failure: Option<ErrorCode>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(name: &str, failure: Option<ErrorCode>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                failure,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NetworkProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn get_info(&self, _address: &str) -> WalletResult<AddressInfo> {
            Err(WalletError::internal("unused"))
        }

        async fn get_fee(&self) -> WalletResult<FeeEstimate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failure {
                Some(code) => Err(WalletError::new(code, format!("{} failed", self.name))),
                None => Ok(FeeEstimate::flat(FeeUnit::PerByte, 1)),
            }
        }

        async fn broadcast(&self, _transaction: &SignedTransaction) -> WalletResult<BroadcastAck> {
            Err(WalletError::internal("unused"))
        }
    }

    fn coordinator(providers: &[Arc<ScriptedProvider>]) -> FailoverCoordinator {
        FailoverCoordinator::new(
            providers
                .iter()
                .map(|p| Arc::clone(p) as Arc<dyn NetworkProvider>)
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn transient_failure_moves_pointer_and_persists() {
        let a = ScriptedProvider::new("a", Some(ErrorCode::NetworkError));
        let b = ScriptedProvider::new("b", None);
        let failover = coordinator(&[a.clone(), b.clone()]);

        failover.get_fee().await.unwrap();
        assert_eq!(failover.active_index(), 1);

        failover.get_fee().await.unwrap();
        assert_eq!(a.calls(), 1, "second call must start at b");
        assert_eq!(b.calls(), 2);
    }

    #[tokio::test]
    async fn non_transient_failure_does_not_fail_over() {
        let a = ScriptedProvider::new("a", Some(ErrorCode::RejectedByChain));
        let b = ScriptedProvider::new("b", None);
        let failover = coordinator(&[a.clone(), b.clone()]);

        let err = failover.get_fee().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RejectedByChain);
        assert_eq!(failover.active_index(), 0);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn retries_only_once_and_wraps_around() {
        let providers = [
            ScriptedProvider::new("a", Some(ErrorCode::NetworkError)),
            ScriptedProvider::new("b", Some(ErrorCode::NetworkError)),
            ScriptedProvider::new("c", None),
        ];
        let failover = coordinator(&providers);

        let err = failover.get_fee().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert_eq!(failover.active_index(), 1);
        assert_eq!(providers[2].calls(), 0);

        failover.get_fee().await.unwrap();
        assert_eq!(failover.active_index(), 2);
    }

    #[tokio::test]
    async fn single_provider_returns_error() {
        let a = ScriptedProvider::new("a", Some(ErrorCode::NetworkError));
        let failover = coordinator(&[a.clone()]);
        assert!(failover.get_fee().await.is_err());
        assert_eq!(a.calls(), 1);
        assert!(FailoverCoordinator::new(Vec::new()).is_err());
    }
}
