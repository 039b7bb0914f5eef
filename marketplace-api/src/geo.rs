use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

const IPIFY_URL: &str = "https://api.ipify.org?format=json";
const IP_API_BASE: &str = "http://ip-api.com/json";
const IPWHO_BASE: &str = "http://ipwho.is";

/// Client for the third-party geolocation services. All calls inherit the
/// process-wide outbound timeout from the shared `reqwest::Client`.
#[derive(Clone)]
pub struct GeoClient {
    client: Client,
    fallback_ip: String,
}

#[derive(Deserialize)]
struct PublicIpResponse {
    ip: String,
}

/// The subset of the ip-api.com response the tracker records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpLocation {
    pub country: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "regionName")]
    pub region_name: Option<String>,
    pub timezone: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub isp: Option<String>,
}

impl GeoClient {
    pub fn new(client: Client, fallback_ip: impl Into<String>) -> Self {
        Self {
            client,
            fallback_ip: fallback_ip.into(),
        }
    }

    /// Loopback addresses carry no usable location; substitute the
    /// configured fallback before lookup.
    pub fn normalize_ip(&self, ip: &str) -> String {
        if ip == "::1" || ip == "127.0.0.1" {
            self.fallback_ip.clone()
        } else {
            ip.to_string()
        }
    }

    pub async fn public_ip(&self) -> reqwest::Result<String> {
        let response = self
            .client
            .get(IPIFY_URL)
            .send()
            .await?
            .error_for_status()?
            .json::<PublicIpResponse>()
            .await?;
        Ok(response.ip)
    }

    /// Raw ip-api.com payload, passed through to clients untouched.
    pub async fn lookup_raw(&self, ip: &str) -> reqwest::Result<Value> {
        self.client
            .get(format!("{IP_API_BASE}/{ip}"))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }

    pub async fn lookup(&self, ip: &str) -> reqwest::Result<IpLocation> {
        self.client
            .get(format!("{IP_API_BASE}/{ip}"))
            .send()
            .await?
            .error_for_status()?
            .json::<IpLocation>()
            .await
    }

    /// Raw ipwho.is payload for the detailed-location endpoint.
    pub async fn detailed_raw(&self, ip: &str) -> reqwest::Result<Value> {
        self.client
            .get(format!("{IPWHO_BASE}/{ip}"))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}
