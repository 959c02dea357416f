use crate::core::errors::CbproError;
use crate::core::kernel::paginate::{paginate, PageRequest, PageStream};
use crate::core::kernel::rate_limit::EndpointClass;
use crate::core::kernel::RestClient;
use crate::exchanges::coinbase_pro::types::{Account, AccountActivity, AccountHold, ListAccount};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use tracing::instrument;

/// Coinbase Pro account endpoints
#[derive(Debug, Clone)]
pub struct CoinbaseRest<R: RestClient> {
    rest_client: R,
}

impl<R: RestClient> CoinbaseRest<R> {
    pub fn new(rest_client: R) -> Self {
        Self { rest_client }
    }

    pub fn rest_client(&self) -> &R {
        &self.rest_client
    }

    /// All trading accounts of the API key's profile
    #[instrument(skip(self))]
    pub async fn list_accounts(&self) -> Result<Vec<ListAccount>, CbproError> {
        self.rest_client
            .get_json("/accounts", EndpointClass::Accounts)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_account(&self, account_id: &str) -> Result<Account, CbproError> {
        let path = account_path(account_id, "")?;
        self.rest_client
            .get_json(&path, EndpointClass::Accounts)
            .await
    }

    /// Ledger entries of an account, latest first, fetched page by page as
    /// the stream is polled
    ///
    /// # Arguments
    /// * `account_id` - Account to read
    /// * `limit` - Entries per page; `None` uses the server default
    pub fn account_history(
        &self,
        account_id: &str,
        limit: Option<u32>,
    ) -> PageStream<'_, AccountActivity> {
        self.listing(account_id, "/ledger", limit)
    }

    /// Whole ledger of an account
    #[instrument(skip(self))]
    pub async fn get_account_history(
        &self,
        account_id: &str,
    ) -> Result<Vec<AccountActivity>, CbproError> {
        self.account_history(account_id, None).try_collect().await
    }

    /// Active holds of an account, fetched page by page as the stream is polled
    pub fn account_holds(&self, account_id: &str, limit: Option<u32>) -> PageStream<'_, AccountHold> {
        self.listing(account_id, "/holds", limit)
    }

    #[instrument(skip(self))]
    pub async fn get_account_holds(
        &self,
        account_id: &str,
    ) -> Result<Vec<AccountHold>, CbproError> {
        self.account_holds(account_id, None).try_collect().await
    }

    fn listing<T>(&self, account_id: &str, suffix: &str, limit: Option<u32>) -> PageStream<'_, T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let path = match account_path(account_id, suffix) {
            Ok(path) => path,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let mut request = PageRequest::new(path);
        if let Some(limit) = limit {
            request = request.with_limit(limit);
        }
        paginate(&self.rest_client, request, EndpointClass::Accounts)
    }
}

/// `/accounts/{id}{suffix}`; the id must be usable as a single path segment.
fn account_path(account_id: &str, suffix: &str) -> Result<String, CbproError> {
    let account_id = account_id.trim();
    if account_id.is_empty() {
        return Err(CbproError::InvalidParameters(
            "account id must not be empty".to_string(),
        ));
    }
    if account_id.contains(['/', '?', '#']) {
        return Err(CbproError::InvalidParameters(format!(
            "account id contains a reserved character: {:?}",
            account_id
        )));
    }
    Ok(format!("/accounts/{}{}", account_id, suffix))
}
