use common::NetworkCameraConfig;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::soap;
use super::xml::{extract_capability_xaddr, extract_fault_reason, extract_profiles, extract_xml_value};
use super::OnvifError;

/// 媒体配置（profile）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaProfile {
    pub token: String,
    pub name: String,
}

/// GetCapabilities 得到的服务地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    pub media: String,
    pub ptz: String,
}

#[derive(Clone)]
pub struct OnvifClient {
    http: Client,
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl OnvifClient {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, OnvifError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn from_config(config: &NetworkCameraConfig, timeout: Duration) -> Result<Self, OnvifError> {
        Self::new(
            &config.host,
            config.port,
            config.username(),
            config.password(),
            timeout,
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn device_service_url(&self) -> String {
        format!("{}/onvif/device_service", self.base_url())
    }

    /// 主机名能否解析为地址
    pub async fn check_reachable(&self) -> Result<(), OnvifError> {
        let unreachable = |reason: String| OnvifError::Unreachable {
            host: self.host.clone(),
            reason,
        };
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        match addrs.next() {
            Some(addr) => {
                debug!("{} resolved to {}", self.host, addr.ip());
                Ok(())
            }
            None => Err(unreachable("no address".to_string())),
        }
    }

    /// 查询媒体与 PTZ 服务地址，设备未声明时使用常见的默认路径
    pub async fn services(&self) -> Result<ServiceUrls, OnvifError> {
        let body = self
            .call(&self.device_service_url(), "GetCapabilities", soap::get_capabilities())
            .await?;

        let media = extract_capability_xaddr(&body, "Media").unwrap_or_else(|| {
            warn!("Device did not report a media service, using default path");
            format!("{}/onvif/media_service", self.base_url())
        });
        let ptz = extract_capability_xaddr(&body, "PTZ")
            .unwrap_or_else(|| format!("{}/onvif/ptz_service", self.base_url()));

        Ok(ServiceUrls { media, ptz })
    }

    pub async fn get_profiles(&self, media_url: &str) -> Result<Vec<MediaProfile>, OnvifError> {
        let body = self.call(media_url, "GetProfiles", soap::get_profiles()).await?;
        Ok(extract_profiles(&body))
    }

    /// RTP-Unicast / RTSP 流地址，原样返回设备给出的值
    pub async fn get_stream_uri(&self, media_url: &str, token: &str) -> Result<String, OnvifError> {
        let body = self
            .call(media_url, "GetStreamUri", &soap::get_stream_uri(token))
            .await?;
        extract_xml_value(&body, "Uri").ok_or(OnvifError::MissingField("Uri"))
    }

    pub async fn get_snapshot_uri(&self, media_url: &str, token: &str) -> Result<String, OnvifError> {
        let body = self
            .call(media_url, "GetSnapshotUri", &soap::get_snapshot_uri(token))
            .await?;
        extract_xml_value(&body, "Uri").ok_or(OnvifError::MissingField("Uri"))
    }

    /// 设备上全部 profile
    pub async fn list_profiles(&self) -> Result<Vec<MediaProfile>, OnvifError> {
        let services = self.services().await?;
        self.get_profiles(&services.media).await
    }

    /// 下载一张 JPEG 快照（HTTP Basic 认证）
    pub async fn snapshot_jpeg(&self, token: Option<&str>) -> Result<Vec<u8>, OnvifError> {
        let services = self.services().await?;
        let profiles = self.get_profiles(&services.media).await?;
        let profile = super::choose_profile(&profiles, token).ok_or(OnvifError::NoProfiles)?;
        let uri = self.get_snapshot_uri(&services.media, &profile.token).await?;

        let mut request = self.http.get(&uri);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OnvifError::Status {
                action: "GetSnapshot".to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn continuous_move(
        &self,
        ptz_url: &str,
        token: &str,
        pan: f32,
        tilt: f32,
        zoom: f32,
    ) -> Result<(), OnvifError> {
        self.call(ptz_url, "ContinuousMove", &soap::continuous_move(token, pan, tilt, zoom))
            .await
            .map(|_| ())
    }

    pub async fn stop(&self, ptz_url: &str, token: &str) -> Result<(), OnvifError> {
        self.call(ptz_url, "Stop", &soap::stop(token)).await.map(|_| ())
    }

    async fn call(&self, url: &str, action: &str, body: &str) -> Result<String, OnvifError> {
        debug!(url = %url, action = %action, "Sending ONVIF request");

        let envelope = soap::envelope(&self.username, &self.password, body);
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/soap+xml; charset=utf-8")
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if text.contains("NotAuthorized") {
            return Err(OnvifError::NotAuthorized);
        }
        if let Some(reason) = extract_fault_reason(&text) {
            return Err(OnvifError::Fault {
                action: action.to_string(),
                reason,
            });
        }
        if !status.is_success() {
            return Err(OnvifError::Status {
                action: action.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(text)
    }
}
