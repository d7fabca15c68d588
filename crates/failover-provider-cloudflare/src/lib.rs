// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `DnsProvider` for the failover engine.
//
// ## Behavior
//
// - One record lookup per call (`GET /zones/:zone_id/dns_records?name=...`)
// - No write when the record already holds the requested address
// - `PUT /zones/:zone_id/dns_records/:record_id` otherwise, always unproxied
// - Dry-run mode performs the lookup and logs the write instead of sending it
// - HTTP status codes map onto `failover_core::Error` variants so the engine
//   can log them meaningfully; retrying is left to the next tick
//
// ## Security
//
// - The API token never appears in logs or `Debug` output
// - Construction fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use failover_core::config::ProviderConfig;
use failover_core::traits::{DnsProvider, DnsProviderFactory, RecordMetadata, UpdateResult};
use failover_core::{Error, Result};
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare's "automatic" TTL, used when neither the config nor the
/// existing record supplies one
const AUTOMATIC_TTL: u32 = 1;

const PROVIDER: &str = "cloudflare";

/// Cloudflare DNS provider
///
/// Stateless apart from its HTTP client: every call looks the record up
/// again, so an out-of-band edit is always seen.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the provider still performs the lookup, logs the
/// PUT payload it would send and reports the update as done.
pub struct CloudflareProvider {
    /// Cloudflare API token; never logged
    api_token: String,

    zone_id: String,

    /// Account ID (informational only)
    account_id: Option<String>,

    /// TTL written with updates; `None` keeps the record's current TTL
    ttl: Option<u32>,

    client: reqwest::Client,

    dry_run: bool,

    api_base: String,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("account_id", &self.account_id)
            .field("ttl", &self.ttl)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// The fields of a Cloudflare DNS record the provider works with
#[derive(Debug, Clone, PartialEq, Eq)]
struct CloudflareRecord {
    id: String,
    name: String,
    record_type: String,
    content: IpAddr,
    ttl: u32,
    proxied: bool,
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Zone containing the managed record
    /// - `account_id`: Optional account ID
    /// - `dry_run`: If true, look records up but skip PUT updates
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        account_id: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let zone_id = zone_id.into();
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            account_id,
            ttl: None,
            client,
            dry_run,
            api_base: CLOUDFLARE_API_BASE.to_string(),
        })
    }

    /// Set the TTL written with updates
    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Point the provider at a different API endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, self.zone_id)
    }

    /// Find the address record for `record_name`
    ///
    /// With `record_type` unset, the first A or AAAA record is used.
    async fn lookup(&self, record_name: &str, record_type: Option<&str>) -> Result<CloudflareRecord> {
        tracing::debug!(record = record_name, ?record_type, "Looking up Cloudflare record");

        let mut query = vec![("name", record_name)];
        if let Some(record_type) = record_type {
            query.push(("type", record_type));
        }

        let response = self
            .client
            .get(self.records_url())
            .bearer_auth(&self.api_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare request failed: {}", e)))?;

        let json = read_response(response, "Record lookup").await?;
        let records = parse_result(&json)?
            .as_array()
            .ok_or_else(|| invalid_response("result is not an array"))?;

        let record = records
            .iter()
            .find(|record| is_wanted_type(record["type"].as_str(), record_type))
            .ok_or_else(|| {
                Error::not_found(format!(
                    "{} (type: {})",
                    record_name,
                    record_type.unwrap_or("A/AAAA")
                ))
            })?;

        parse_record(record)
    }

    async fn put_record(&self, record: &CloudflareRecord, new_ip: IpAddr) -> Result<()> {
        let url = format!("{}/{}", self.records_url(), record.id);
        let payload = serde_json::json!({
            "type": record.record_type,
            "name": record.name,
            "content": new_ip.to_string(),
            "ttl": self.ttl.unwrap_or(record.ttl),
            "proxied": false,
        });

        if self.dry_run {
            tracing::info!(url = %url, payload = %payload, "[DRY-RUN] Would update Cloudflare record");
            return Ok(());
        }

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare request failed: {}", e)))?;

        let json = read_response(response, "Record update").await?;
        parse_result(&json)?;
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn update_record(&self, record_name: &str, new_ip: IpAddr) -> Result<UpdateResult> {
        let record_type = match new_ip {
            IpAddr::V4(_) => "A",
            IpAddr::V6(_) => "AAAA",
        };

        let record = self.lookup(record_name, Some(record_type)).await?;

        if record.content == new_ip {
            tracing::info!(record = record_name, ip = %new_ip, "Record already holds the requested address");
            return Ok(UpdateResult::Unchanged { current_ip: new_ip });
        }

        tracing::info!(
            record = record_name,
            from = %record.content,
            to = %new_ip,
            mode = if self.dry_run { "dry-run" } else { "live" },
            "Updating Cloudflare record"
        );

        self.put_record(&record, new_ip).await?;

        Ok(UpdateResult::Updated {
            previous_ip: Some(record.content),
            new_ip,
        })
    }

    async fn get_record(&self, record_name: &str) -> Result<RecordMetadata> {
        let record = self.lookup(record_name, None).await?;

        Ok(RecordMetadata {
            id: record.id,
            name: record.name,
            ip: record.content,
            ttl: Some(record.ttl),
            extra: serde_json::json!({
                "type": record.record_type,
                "proxied": record.proxied,
                "zone_id": self.zone_id,
            }),
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Read a response body as JSON, turning error statuses into errors
async fn read_response(response: reqwest::Response, context: &str) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(status_error(status.as_u16(), &body, context));
    }

    response
        .json()
        .await
        .map_err(|e| invalid_response(&format!("Failed to parse response: {}", e)))
}

fn status_error(status: u16, body: &str, context: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{} returned 404: {}", context, body)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: record is being updated by another process. Status: {}", status),
        ),
        429 => Error::rate_limited(format!("Cloudflare rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", context, status, body)),
    }
}

/// Unwrap the `{success, errors, result}` envelope
fn parse_result(json: &Value) -> Result<&Value> {
    if json["success"].as_bool() != Some(true) {
        let errors = json
            .get("errors")
            .map(|errors| errors.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(Error::provider(PROVIDER, format!("API call unsuccessful: {}", errors)));
    }
    Ok(&json["result"])
}

fn is_wanted_type(found: Option<&str>, wanted: Option<&str>) -> bool {
    match (found, wanted) {
        (Some(found), Some(wanted)) => found == wanted,
        (Some(found), None) => found == "A" || found == "AAAA",
        (None, _) => false,
    }
}

fn parse_record(record: &Value) -> Result<CloudflareRecord> {
    let field = |name: &str| {
        record[name]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| invalid_response(&format!("record.{} is not a string", name)))
    };

    let content = field("content")?;
    let content = content
        .parse()
        .map_err(|e| invalid_response(&format!("Invalid IP in record content '{}': {}", content, e)))?;

    Ok(CloudflareRecord {
        id: field("id")?,
        name: field("name")?,
        record_type: field("type")?,
        content,
        ttl: record["ttl"]
            .as_u64()
            .and_then(|ttl| u32::try_from(ttl).ok())
            .unwrap_or(AUTOMATIC_TTL),
        proxied: record["proxied"].as_bool().unwrap_or(false),
    })
}

fn invalid_response(detail: &str) -> Error {
    Error::provider(PROVIDER, format!("Invalid response format: {}", detail))
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                account_id,
                ttl,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "Cloudflare provider running in DRY-RUN mode - no changes will be made"
                    );
                }

                let provider =
                    CloudflareProvider::new(api_token.clone(), zone_id.clone(), account_id.clone(), *dry_run)?
                        .with_ttl(*ttl);
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// ```rust,ignore
/// use failover_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::with_builtin_state_stores();
/// failover_provider_cloudflare::register(&registry);
/// ```
pub fn register(registry: &failover_core::ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}
