//! Listing/item access for one resource path

use reqwest::Method;
use restbatch_domain::RestError;
use serde::de::DeserializeOwned;
use tracing::instrument;

use super::client::RestClient;
use super::pagination::JsonObject;

/// A resource path (e.g. `rest/ofscCore/v1/users`) bound to a client
#[derive(Debug, Clone)]
pub struct RestResource {
    client: RestClient,
    path: String,
}

impl RestResource {
    pub fn new(client: RestClient, path: impl Into<String>) -> Self {
        let path = path.into().trim_matches('/').to_string();
        Self { client, path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Every item of the listing at `{base}/{path}`.
    ///
    /// # Errors
    /// The first page failure; see [`RestClient::fetch_all`].
    #[instrument(skip(self), fields(path = %self.path))]
    pub async fn list(&self) -> Result<Vec<JsonObject>, RestError> {
        let template = self.client.request(Method::GET, &self.path)?;
        self.client.fetch_all(template).await
    }

    /// The item at `{base}/{path}/{id}`.
    ///
    /// `id` is sent as a single, percent-encoded path segment.
    pub async fn get(&self, id: &str) -> Result<JsonObject, RestError> {
        self.get_as(id).await
    }

    /// The item at `{base}/{path}/{id}`, decoded as `T`.
    #[instrument(skip(self), fields(path = %self.path))]
    pub async fn get_as<T>(&self, id: &str) -> Result<T, RestError>
    where
        T: DeserializeOwned,
    {
        let mut url = self.client.url(&self.path)?;
        url.path_segments_mut()
            .map_err(|()| RestError::InvalidRequest("base URL cannot carry path segments".into()))?
            .push(id);

        let request = self
            .client
            .http()
            .request(Method::GET, url)
            .build()
            .map_err(|err| RestError::InvalidRequest(err.to_string()))?;
        self.client.execute(request).await
    }
}
