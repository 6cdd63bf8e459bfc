use crate::data_sync::config::TrackerConfig;
use crate::data_sync::source::{AssetSource, BalanceDetails, BalanceSource, TokenBalance};
use crate::error::{BalanceError, BalanceResult};
use crate::utils::asset::{Asset, AssetDecoration, AssetRecord, VerifiedStatus};
use crate::utils::numbers::deserialize_u64;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Deserialize)]
struct TokenBalancesResponse {
    #[serde(default)]
    balances: Vec<TokenBalance>,
}

#[derive(Deserialize)]
struct AssetsResponse {
    data: Vec<Option<ServiceAsset>>,
}

#[derive(Deserialize)]
struct ServiceAsset {
    data: Option<AssetRecord>,
    #[serde(default)]
    metadata: AssetMetadata,
}

#[derive(Default, Deserialize)]
struct AssetMetadata {
    #[serde(default)]
    has_image: bool,
    #[serde(default)]
    verified_status: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeResponse {
    #[serde(deserialize_with = "deserialize_u64")]
    fee_amount: u64,
}

/// REST backend: node API for balances and fees, data service for assets.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: Client,
    node_url: String,
    data_service_url: String,
    icon_url: String,
}

impl HttpSource {
    pub fn new(client: Client, node_url: &str, data_service_url: &str, icon_url: &str) -> Self {
        Self {
            client,
            node_url: node_url.trim_end_matches('/').to_string(),
            data_service_url: data_service_url.trim_end_matches('/').to_string(),
            icon_url: icon_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &TrackerConfig) -> eyre::Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| eyre::eyre!("Failed to build HTTP client: {}", e))?;
        Ok(Self::new(client, &config.node_url, &config.data_service_url, &config.icon_url))
    }

    // Status >= 400 is a fetch failure; a body that does not decode is malformed.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> BalanceResult<T> {
        let response = request.header("Accept", "application/json").send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_client_error() || status.is_server_error() {
            return Err(BalanceError::fetch(format!("{what}: bad response from server ({status})")));
        }

        serde_json::from_str(&body).map_err(|e| BalanceError::malformed(format!("{what}: {e}")))
    }

    fn to_asset(&self, entry: ServiceAsset) -> Option<Asset> {
        let record = entry.data?;
        let decoration = AssetDecoration::new(
            &record.id,
            VerifiedStatus::from_code(entry.metadata.verified_status),
            entry.metadata.has_image,
            &self.icon_url,
        );
        Some(Asset::compose(record, decoration))
    }
}

#[async_trait]
impl AssetSource for HttpSource {
    async fn fetch_assets(&self, ids: &[String]) -> BalanceResult<Vec<Option<Asset>>> {
        let url = format!("{}/assets", self.data_service_url);
        debug!(count = ids.len(), "fetching asset metadata");

        let response: AssetsResponse = self
            .send(self.client.post(&url).json(&json!({ "ids": ids })), "assets")
            .await?;

        if response.data.len() != ids.len() {
            return Err(BalanceError::malformed(format!(
                "assets: requested {} ids, got {} entries",
                ids.len(),
                response.data.len()
            )));
        }

        Ok(response
            .data
            .into_iter()
            .map(|entry| entry.and_then(|entry| self.to_asset(entry)))
            .collect())
    }
}

#[async_trait]
impl BalanceSource for HttpSource {
    async fn fetch_balance_details(&self, address: &str) -> BalanceResult<BalanceDetails> {
        let url = format!("{}/addresses/balance/details/{}", self.node_url, address);
        self.send(self.client.get(&url), "balance details").await
    }

    async fn fetch_token_balances(&self, address: &str) -> BalanceResult<Vec<TokenBalance>> {
        let url = format!("{}/assets/balance/{}", self.node_url, address);
        let response: TokenBalancesResponse = self.send(self.client.get(&url), "token balances").await?;
        Ok(response.balances)
    }

    async fn fetch_fee(&self, tx: &serde_json::Value) -> BalanceResult<u64> {
        let mut body = match tx {
            serde_json::Value::Object(fields) => fields.clone(),
            _ => return Err(BalanceError::malformed("fee request must be a JSON object")),
        };
        body.insert("feeAssetId".to_string(), serde_json::Value::Null);

        let url = format!("{}/transactions/calculateFee", self.node_url);
        let response: FeeResponse = self.send(self.client.post(&url).json(&body), "fee").await?;
        Ok(response.fee_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> HttpSource {
        HttpSource::new(Client::new(), &server.uri(), &format!("{}/api/v1/", server.uri()), "https://icons")
    }

    fn asset_json(id: &str, min_sponsored_fee: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "asset",
            "data": {
                "ticker": null,
                "timestamp": "2019-03-01T12:00:00.000Z",
                "id": id,
                "height": 1_450_000,
                "name": format!("{id} token"),
                "description": "",
                "precision": 2,
                "sender": "3PSender",
                "quantity": "100000000000000000",
                "reissuable": false,
                "has_script": false,
                "min_sponsored_fee": min_sponsored_fee,
                "smart": false
            },
            "metadata": { "oracle_data": [], "has_image": true, "verified_status": 2 }
        })
    }

    #[tokio::test]
    async fn test_fetch_balance_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/addresses/balance/details/3PAddress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": "3PAddress",
                "regular": 600_000_000,
                "generating": 0,
                "available": "500000000",
                "effective": 600_000_000
            })))
            .mount(&server)
            .await;

        let details = source_for(&server).fetch_balance_details("3PAddress").await.unwrap();
        assert_eq!(details.available, 500_000_000);
        assert_eq!(details.regular, 600_000_000);
    }

    #[tokio::test]
    async fn test_fetch_token_balances() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/balance/3PAddress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": "3PAddress",
                "balances": [
                    { "assetId": "T", "balance": 100, "reissuable": false },
                    { "assetId": "U", "balance": "18446744073709551615" }
                ]
            })))
            .mount(&server)
            .await;

        let balances = source_for(&server).fetch_token_balances("3PAddress").await.unwrap();
        assert_eq!(balances, vec![TokenBalance::new("T", 100), TokenBalance::new("U", u64::MAX)]);
    }

    #[tokio::test]
    async fn test_fetch_assets_keeps_request_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/assets"))
            .and(body_json(json!({ "ids": ["T", "missing", "U"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "list",
                "data": [asset_json("T", json!("50")), null, asset_json("U", json!(null))]
            })))
            .mount(&server)
            .await;

        let ids = vec!["T".to_string(), "missing".to_string(), "U".to_string()];
        let assets = source_for(&server).fetch_assets(&ids).await.unwrap();
        assert_eq!(assets.len(), 3);

        let t = assets[0].as_ref().unwrap();
        assert_eq!(t.get_id(), "T");
        assert_eq!(t.get_min_sponsored_fee(), Some(50));
        assert_eq!(t.get_quantity(), 100_000_000_000_000_000);
        assert_eq!(t.get_verified_status(), VerifiedStatus::Detailed);
        assert_eq!(t.get_icon(), Some("https://icons/T.svg"));
        assert!(assets[1].is_none());
        assert!(!assets[2].as_ref().unwrap().is_sponsored());
    }

    #[tokio::test]
    async fn test_fee_request_sets_null_fee_asset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transactions/calculateFee"))
            .and(body_json(json!({ "type": 4, "amount": 1, "feeAssetId": null })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "feeAssetId": null, "feeAmount": 300000 })))
            .mount(&server)
            .await;

        let tx = json!({ "type": 4, "amount": 1, "feeAssetId": "T" });
        assert_eq!(source_for(&server).fetch_fee(&tx).await.unwrap(), 300_000);

        let err = source_for(&server).fetch_fee(&json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, BalanceError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch_balance_details("3PAddress").await.unwrap_err();
        assert!(matches!(err, BalanceError::FetchFailure(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_bad_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = source_for(&server).fetch_token_balances("3PAddress").await.unwrap_err();
        assert!(matches!(err, BalanceError::MalformedResponse(_)));
    }
}
