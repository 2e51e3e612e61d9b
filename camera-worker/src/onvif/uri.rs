use url::Url;

/// 设备返回的流地址可能只有路径，补全为 `rtsp://host/...`
pub fn normalize_stream_uri(raw: &str, host: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") {
        raw.to_string()
    } else if raw.starts_with('/') {
        format!("rtsp://{}{}", host, raw)
    } else {
        format!("rtsp://{}/{}", host, raw)
    }
}

/// 在流地址中写入用户名密码
///
/// 用户名为空、地址中已带凭据或无法解析出主机时原样返回。
pub fn inject_credentials(uri: &str, username: &str, password: &str) -> String {
    if username.is_empty() {
        return uri.to_string();
    }
    let mut parsed = match Url::parse(uri) {
        Ok(parsed) => parsed,
        Err(_) => return uri.to_string(),
    };
    if !parsed.has_host() || !parsed.username().is_empty() || parsed.password().is_some() {
        return uri.to_string();
    }
    if parsed.set_username(username).is_err() {
        return uri.to_string();
    }
    if !password.is_empty() && parsed.set_password(Some(password)).is_err() {
        return uri.to_string();
    }
    parsed.to_string()
}

/// 用于日志输出，隐藏密码
pub fn redact(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_err() {
                return "<redacted>".to_string();
            }
            parsed.to_string()
        }
        Ok(_) => uri.to_string(),
        Err(_) => "<unparseable uri>".to_string(),
    }
}
