use std::time::Duration;

use common::NetworkCameraConfig;

use super::test_server::{soap, FakeDevice, Request};
use super::*;
use crate::capture::PtzControl;

fn device_handler(req: &Request) -> (u16, String) {
    let base = &req.base_url;
    if req.body.contains("GetCapabilities") {
        return (
            200,
            soap(&format!(
                "<tds:GetCapabilitiesResponse><tds:Capabilities>\
                   <tt:Media><tt:XAddr>{base}/onvif/Media</tt:XAddr></tt:Media>\
                   <tt:PTZ><tt:XAddr>{base}/onvif/PTZ</tt:XAddr></tt:PTZ>\
                 </tds:Capabilities></tds:GetCapabilitiesResponse>"
            )),
        );
    }
    if req.body.contains("GetProfiles") {
        return (
            200,
            soap(
                "<trt:GetProfilesResponse>\
                   <trt:Profiles token=\"main\"><tt:Name>Main</tt:Name></trt:Profiles>\
                   <trt:Profiles token=\"sub\"><tt:Name>Sub</tt:Name></trt:Profiles>\
                 </trt:GetProfilesResponse>",
            ),
        );
    }
    if req.body.contains("GetStreamUri") {
        return (
            200,
            soap("<trt:GetStreamUriResponse><trt:MediaUri><tt:Uri>/stream1</tt:Uri></trt:MediaUri></trt:GetStreamUriResponse>"),
        );
    }
    if req.body.contains("GetSnapshotUri") {
        return (
            200,
            soap(&format!(
                "<trt:GetSnapshotUriResponse><trt:MediaUri><tt:Uri>{base}/snap.jpg</tt:Uri></trt:MediaUri></trt:GetSnapshotUriResponse>"
            )),
        );
    }
    if req.method == "GET" && req.path == "/snap.jpg" {
        return (200, "JPEGDATA".to_string());
    }
    if req.body.contains("ContinuousMove") {
        return (200, soap("<tptz:ContinuousMoveResponse/>"));
    }
    (404, String::new())
}

fn camera(device: &FakeDevice) -> NetworkCameraConfig {
    let mut config = NetworkCameraConfig::new("127.0.0.1").with_credentials("a", "b");
    config.port = device.port;
    config
}

fn client(config: &NetworkCameraConfig) -> OnvifClient {
    OnvifClient::from_config(config, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_resolve_relative_stream_uri() {
    let device = FakeDevice::start(device_handler).await;
    let mut config = camera(&device);
    config.profile_token = Some("sub".to_string());

    let resolved = resolve_stream(&client(&config), &config).await.unwrap();

    assert_eq!(resolved.uri, "rtsp://a:b@127.0.0.1/stream1");
    assert_eq!(resolved.profile_token, "sub");

    let requests = device.requests();
    assert_eq!(requests[0].path, "/onvif/device_service");
    assert!(requests[0].body.contains("<wsse:Username>a</wsse:Username>"));
    let stream_req = requests
        .iter()
        .find(|r| r.body.contains("GetStreamUri"))
        .unwrap();
    assert_eq!(stream_req.path, "/onvif/Media");
    assert!(stream_req.body.contains("<trt:ProfileToken>sub</trt:ProfileToken>"));
    assert!(stream_req.body.contains("<tt:Stream>RTP-Unicast</tt:Stream>"));
}

#[tokio::test]
async fn test_unknown_profile_uses_first() {
    let device = FakeDevice::start(device_handler).await;
    let mut config = camera(&device);
    config.profile_token = Some("missing".to_string());

    let resolved = resolve_stream(&client(&config), &config).await.unwrap();
    assert_eq!(resolved.profile_token, "main");
}

#[tokio::test]
async fn test_not_authorized() {
    let device = FakeDevice::start(|_| {
        (
            400,
            soap("<env:Fault><env:Code><env:Subcode><env:Value>ter:NotAuthorized</env:Value></env:Subcode></env:Code></env:Fault>"),
        )
    })
    .await;
    let config = camera(&device);

    let err = resolve_stream(&client(&config), &config).await.unwrap_err();
    assert!(matches!(err, OnvifError::NotAuthorized));
}

#[tokio::test]
async fn test_media_service_fallback() {
    let device = FakeDevice::start(|req| {
        if req.body.contains("GetCapabilities") {
            (200, soap("<tds:GetCapabilitiesResponse><tds:Capabilities/></tds:GetCapabilitiesResponse>"))
        } else if req.body.contains("GetProfiles") {
            (200, soap("<trt:GetProfilesResponse/>"))
        } else {
            (404, String::new())
        }
    })
    .await;
    let config = camera(&device);

    let err = resolve_stream(&client(&config), &config).await.unwrap_err();
    assert!(matches!(err, OnvifError::NoProfiles));
    assert!(device
        .requests()
        .iter()
        .any(|r| r.path == "/onvif/media_service"));
}

#[tokio::test]
async fn test_snapshot_jpeg() {
    let device = FakeDevice::start(device_handler).await;
    let config = camera(&device);

    let jpeg = client(&config).snapshot_jpeg(None).await.unwrap();
    assert_eq!(jpeg, b"JPEGDATA");
    assert!(device.base_url().starts_with("http://127.0.0.1:"));
}

#[tokio::test]
async fn test_ptz_move_targets_ptz_service() {
    let device = FakeDevice::start(device_handler).await;
    let config = camera(&device);

    let mut ptz = OnvifPtz::new(client(&config), None);
    ptz.continuous_move(0.5, 0.0, 0.0).await.unwrap();

    let requests = device.requests();
    let request = requests
        .iter()
        .find(|r| r.body.contains("ContinuousMove"))
        .unwrap();
    assert_eq!(request.path, "/onvif/PTZ");
    assert!(request.body.contains("<tptz:ProfileToken>main</tptz:ProfileToken>"));
    assert!(request.body.contains(r#"x="0.50""#));
}
