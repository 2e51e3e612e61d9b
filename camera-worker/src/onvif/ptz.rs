use async_trait::async_trait;
use tracing::info;

use super::client::OnvifClient;
use super::resolver::choose_profile;
use super::OnvifError;
use crate::capture::PtzControl;

/// ONVIF 云台控制，第一次调用时再查询 PTZ 服务地址和 profile
pub struct OnvifPtz {
    client: OnvifClient,
    profile_token: Option<String>,
    ptz_url: Option<String>,
}

impl OnvifPtz {
    pub fn new(client: OnvifClient, profile_token: Option<String>) -> Self {
        Self {
            client,
            profile_token,
            ptz_url: None,
        }
    }

    async fn target(&mut self) -> Result<(String, String), OnvifError> {
        if self.ptz_url.is_none() || self.profile_token.is_none() {
            let services = self.client.services().await?;
            if self.profile_token.is_none() {
                let profiles = self.client.get_profiles(&services.media).await?;
                let profile = choose_profile(&profiles, None).ok_or(OnvifError::NoProfiles)?;
                self.profile_token = Some(profile.token.clone());
            }
            self.ptz_url = Some(services.ptz);
        }
        match (&self.ptz_url, &self.profile_token) {
            (Some(url), Some(token)) => Ok((url.clone(), token.clone())),
            _ => Err(OnvifError::NoProfiles),
        }
    }
}

#[async_trait]
impl PtzControl for OnvifPtz {
    async fn continuous_move(&mut self, pan: f32, tilt: f32, zoom: f32) -> anyhow::Result<()> {
        let (url, token) = self.target().await?;
        self.client.continuous_move(&url, &token, pan, tilt, zoom).await?;
        info!("PTZ move pan={:.2} tilt={:.2} zoom={:.2}", pan, tilt, zoom);
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        let (url, token) = self.target().await?;
        self.client.stop(&url, &token).await?;
        info!("PTZ stop");
        Ok(())
    }
}
