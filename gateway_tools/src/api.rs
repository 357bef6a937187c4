use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{ApiResponse, InitializeTransaction, TransactionAuthorization, TransactionData},
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Sends a request and unwraps the gateway's response envelope.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            let envelope = response.json::<ApiResponse<T>>().await?;
            match (envelope.status, envelope.data) {
                (true, Some(data)) => Ok(data),
                (_, _) => Err(GatewayApiError::Declined(envelope.message)),
            }
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Opens a transaction and returns the hosted page the buyer must visit.
    pub async fn initialize_transaction(
        &self,
        request: &InitializeTransaction,
    ) -> Result<TransactionAuthorization, GatewayApiError> {
        debug!("Initializing transaction {} for {} {}", request.reference, request.amount, request.currency);
        let result = self
            .rest_query::<TransactionAuthorization, _>(Method::POST, "/transaction/initialize", Some(request))
            .await?;
        info!("Transaction {} initialized", result.reference);
        Ok(result)
    }

    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionData, GatewayApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction {reference}");
        let result = self.rest_query::<TransactionData, ()>(Method::GET, &path, None).await?;
        info!("Transaction {reference} is {}", result.status);
        Ok(result)
    }
}
