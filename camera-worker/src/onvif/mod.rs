//! ONVIF 客户端
//!
//! 只实现扫码系统需要的几个调用：GetCapabilities、GetProfiles、GetStreamUri、
//! GetSnapshotUri 以及 PTZ 的 ContinuousMove / Stop。请求体手工拼接，响应用
//! 字符串扫描解析，不引入完整的 SOAP 栈。

mod client;
mod ptz;
mod resolver;
mod soap;
mod uri;
mod xml;

pub use client::{MediaProfile, OnvifClient, ServiceUrls};
pub use ptz::OnvifPtz;
pub use resolver::{choose_profile, resolve_stream, ResolvedStream};
pub use soap::{envelope, security_header};
pub use uri::{inject_credentials, normalize_stream_uri, redact};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OnvifError {
    #[error("Host {host} is not resolvable: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{action} returned status {status}")]
    Status { action: String, status: u16 },

    #[error("{action} fault: {reason}")]
    Fault { action: String, reason: String },

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Missing {0} in response")]
    MissingField(&'static str),

    #[error("Device has no media profiles")]
    NoProfiles,
}

#[cfg(test)]
mod test_server;

#[cfg(test)]
mod handshake_test;
