use base64::Engine;
use sha1::{Digest, Sha1};

/// WS-Security UsernameToken 头（PasswordDigest）
///
/// Digest = Base64(SHA1(nonce + created + password))
pub fn security_header(username: &str, password: &str) -> String {
    let nonce: [u8; 16] = rand::random();
    let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    security_header_with(username, password, &nonce, &created)
}

pub(crate) fn security_header_with(
    username: &str,
    password: &str,
    nonce: &[u8],
    created: &str,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let engine = base64::engine::general_purpose::STANDARD;
    format!(
        r#"<s:Header>
    <wsse:Security s:mustUnderstand="true" xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
      <wsse:UsernameToken>
        <wsse:Username>{}</wsse:Username>
        <wsse:Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest">{}</wsse:Password>
        <wsse:Nonce EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary">{}</wsse:Nonce>
        <wsu:Created>{}</wsu:Created>
      </wsse:UsernameToken>
    </wsse:Security>
  </s:Header>"#,
        escape(username),
        engine.encode(digest),
        engine.encode(nonce),
        created
    )
}

/// 包装成 SOAP 1.2 信封；用户名为空时不带认证头
pub fn envelope(username: &str, password: &str, body: &str) -> String {
    let header = if username.is_empty() {
        String::new()
    } else {
        security_header(username, password)
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:tds="http://www.onvif.org/ver10/device/wsdl" xmlns:trt="http://www.onvif.org/ver10/media/wsdl" xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl" xmlns:tt="http://www.onvif.org/ver10/schema">
  {}
  <s:Body>
    {}
  </s:Body>
</s:Envelope>"#,
        header, body
    )
}

pub(crate) fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub(crate) fn get_capabilities() -> &'static str {
    "<tds:GetCapabilities><tds:Category>All</tds:Category></tds:GetCapabilities>"
}

pub(crate) fn get_profiles() -> &'static str {
    "<trt:GetProfiles/>"
}

pub(crate) fn get_stream_uri(token: &str) -> String {
    format!(
        "<trt:GetStreamUri>\
           <trt:StreamSetup>\
             <tt:Stream>RTP-Unicast</tt:Stream>\
             <tt:Transport><tt:Protocol>RTSP</tt:Protocol></tt:Transport>\
           </trt:StreamSetup>\
           <trt:ProfileToken>{}</trt:ProfileToken>\
         </trt:GetStreamUri>",
        escape(token)
    )
}

pub(crate) fn get_snapshot_uri(token: &str) -> String {
    format!(
        "<trt:GetSnapshotUri><trt:ProfileToken>{}</trt:ProfileToken></trt:GetSnapshotUri>",
        escape(token)
    )
}

pub(crate) fn continuous_move(token: &str, pan: f32, tilt: f32, zoom: f32) -> String {
    format!(
        r#"<tptz:ContinuousMove>
      <tptz:ProfileToken>{}</tptz:ProfileToken>
      <tptz:Velocity>
        <tt:PanTilt x="{:.2}" y="{:.2}"/>
        <tt:Zoom x="{:.2}"/>
      </tptz:Velocity>
    </tptz:ContinuousMove>"#,
        escape(token),
        pan,
        tilt,
        zoom
    )
}

pub(crate) fn stop(token: &str) -> String {
    format!(
        "<tptz:Stop>\
           <tptz:ProfileToken>{}</tptz:ProfileToken>\
           <tptz:PanTilt>true</tptz:PanTilt>\
           <tptz:Zoom>true</tptz:Zoom>\
         </tptz:Stop>",
        escape(token)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_digest() {
        // nonce 全 0，固定时间戳
        let header = security_header_with("admin", "secret", &[0u8; 16], "2024-01-01T00:00:00Z");

        let mut hasher = Sha1::new();
        hasher.update([0u8; 16]);
        hasher.update(b"2024-01-01T00:00:00Z");
        hasher.update(b"secret");
        let expected = base64::engine::general_purpose::STANDARD.encode(hasher.finalize());

        assert!(header.contains(&format!("#PasswordDigest\">{}</wsse:Password>", expected)));
        assert!(header.contains("<wsse:Nonce EncodingType"));
        assert!(header.contains("AAAAAAAAAAAAAAAAAAAAAA=="));
        assert!(header.contains("<wsu:Created>2024-01-01T00:00:00Z</wsu:Created>"));
    }

    #[test]
    fn test_envelope_without_credentials_has_no_header() {
        let xml = envelope("", "", get_profiles());
        assert!(!xml.contains("Security"));
        assert!(xml.contains("<trt:GetProfiles/>"));
    }

    #[test]
    fn test_move_body() {
        let body = continuous_move("profile_1", 0.5, -0.25, 0.0);
        assert!(body.contains("<tptz:ProfileToken>profile_1</tptz:ProfileToken>"));
        assert!(body.contains(r#"<tt:PanTilt x="0.50" y="-0.25"/>"#));
        assert!(body.contains(r#"<tt:Zoom x="0.00"/>"#));
    }

    #[test]
    fn test_token_is_escaped() {
        assert!(get_stream_uri("a<b").contains("a&lt;b"));
    }
}
