use common::NetworkCameraConfig;
use tracing::{info, warn};

use super::client::{MediaProfile, OnvifClient};
use super::uri::{inject_credentials, normalize_stream_uri};
use super::OnvifError;

/// 解析出的可播放地址（已带凭据）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStream {
    pub uri: String,
    pub profile_token: String,
}

/// 按配置的 token 选 profile，找不到时退回第一个
pub fn choose_profile<'a>(
    profiles: &'a [MediaProfile],
    wanted: Option<&str>,
) -> Option<&'a MediaProfile> {
    let wanted = match wanted {
        Some(token) => token,
        None => return profiles.first(),
    };
    match profiles.iter().find(|p| p.token == wanted) {
        Some(profile) => Some(profile),
        None => {
            warn!("Profile token {} not found, falling back to the first profile", wanted);
            profiles.first()
        }
    }
}

/// ONVIF 握手：可达性检查 → GetCapabilities → GetProfiles → GetStreamUri
pub async fn resolve_stream(
    client: &OnvifClient,
    config: &NetworkCameraConfig,
) -> Result<ResolvedStream, OnvifError> {
    client.check_reachable().await?;

    let services = client.services().await?;
    let profiles = client.get_profiles(&services.media).await?;
    let profile = choose_profile(&profiles, config.profile_token.as_deref())
        .ok_or(OnvifError::NoProfiles)?;

    let raw = client.get_stream_uri(&services.media, &profile.token).await?;
    info!("Profile {} ({}) streams at {}", profile.token, profile.name, raw);

    let absolute = normalize_stream_uri(&raw, &config.host);
    Ok(ResolvedStream {
        uri: inject_credentials(&absolute, config.username(), config.password()),
        profile_token: profile.token.clone(),
    })
}
