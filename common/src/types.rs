use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, ScanError};

/// 摄像头种类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CameraKind {
    Local,
    Network,
}

impl CameraKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraKind::Local => "local",
            CameraKind::Network => "network",
        }
    }
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RTSP 传输方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

/// 分辨率，配置文件中写作 `[width, height]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<Resolution> for (u32, u32) {
    fn from(r: Resolution) -> Self {
        (r.width, r.height)
    }
}

/// 摄像头配置，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraConfig {
    #[serde(deserialize_with = "deserialize_camera_id")]
    pub id: String,
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(flatten)]
    pub source: CameraSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CameraSource {
    Local,
    Network(NetworkCameraConfig),
}

/// 网络摄像头（ONVIF + RTSP）参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkCameraConfig {
    pub host: String,
    #[serde(default = "default_onvif_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 直接指定的 RTSP 地址，设置后跳过 ONVIF 解析
    #[serde(default)]
    pub stream_uri: Option<String>,
    /// 固定使用的 profile token
    #[serde(default)]
    pub profile_token: Option<String>,
    #[serde(default)]
    pub transport: Transport,
}

fn default_onvif_port() -> u16 {
    80
}

impl NetworkCameraConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_onvif_port(),
            username: None,
            password: None,
            stream_uri: None,
            profile_token: None,
            transport: Transport::Tcp,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }
}

impl CameraConfig {
    pub fn local(index: u32) -> Self {
        Self {
            id: index.to_string(),
            resolution: None,
            fps: None,
            source: CameraSource::Local,
        }
    }

    pub fn network(id: impl Into<String>, network: NetworkCameraConfig) -> Self {
        Self {
            id: id.into(),
            resolution: None,
            fps: None,
            source: CameraSource::Network(network),
        }
    }

    pub fn kind(&self) -> CameraKind {
        match self.source {
            CameraSource::Local => CameraKind::Local,
            CameraSource::Network(_) => CameraKind::Network,
        }
    }

    pub fn network_config(&self) -> Option<&NetworkCameraConfig> {
        match &self.source {
            CameraSource::Network(net) => Some(net),
            CameraSource::Local => None,
        }
    }

    /// 本地摄像头的设备序号（id 必须是整数）
    pub fn device_index(&self) -> Option<u32> {
        match self.source {
            CameraSource::Local => self.id.parse().ok(),
            CameraSource::Network(_) => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ScanError::InvalidConfig("camera id is empty".to_string()));
        }
        match &self.source {
            CameraSource::Local => {
                if self.device_index().is_none() {
                    return Err(ScanError::InvalidConfig(format!(
                        "local camera id must be an integer, got {:?}",
                        self.id
                    )));
                }
            }
            CameraSource::Network(net) => {
                if net.host.trim().is_empty() {
                    return Err(ScanError::InvalidConfig(format!(
                        "network camera {} has no host",
                        self.id
                    )));
                }
            }
        }
        Ok(())
    }
}

fn deserialize_camera_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Int(i64),
        Text(String),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(n) => n.to_string(),
        IdRepr::Text(s) => s,
    })
}

/// 读取模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    DataMatrix,
    QrCode,
    Barcode,
    #[default]
    All,
}

impl DecodeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeMode::DataMatrix => "datamatrix",
            DecodeMode::QrCode => "qrcode",
            DecodeMode::Barcode => "barcode",
            DecodeMode::All => "all",
        }
    }

    /// 该模式是否启用某一类检测器
    pub fn selects(&self, family: SymbolFamily) -> bool {
        matches!(
            (self, family),
            (DecodeMode::All, _)
                | (DecodeMode::DataMatrix, SymbolFamily::DataMatrix)
                | (DecodeMode::QrCode, SymbolFamily::Qr)
                | (DecodeMode::Barcode, SymbolFamily::Linear)
        )
    }
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecodeMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "datamatrix" => Ok(DecodeMode::DataMatrix),
            "qrcode" | "qr" => Ok(DecodeMode::QrCode),
            "barcode" => Ok(DecodeMode::Barcode),
            "all" => Ok(DecodeMode::All),
            other => Err(ScanError::UnknownDecodeMode(other.to_string())),
        }
    }
}

/// 检测器族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolFamily {
    DataMatrix,
    Qr,
    Linear,
}

/// 码制
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Symbology {
    DataMatrix,
    QrCode,
    Code128,
    Code39,
    Code93,
    Ean8,
    Ean13,
    UpcA,
    UpcE,
    Itf,
    Codabar,
}

impl Symbology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::DataMatrix => "DataMatrix",
            Symbology::QrCode => "QRCODE",
            Symbology::Code128 => "CODE128",
            Symbology::Code39 => "CODE39",
            Symbology::Code93 => "CODE93",
            Symbology::Ean8 => "EAN8",
            Symbology::Ean13 => "EAN13",
            Symbology::UpcA => "UPCA",
            Symbology::UpcE => "UPCE",
            Symbology::Itf => "I25",
            Symbology::Codabar => "CODABAR",
        }
    }

    pub fn family(&self) -> SymbolFamily {
        match self {
            Symbology::DataMatrix => SymbolFamily::DataMatrix,
            Symbology::QrCode => SymbolFamily::Qr,
            _ => SymbolFamily::Linear,
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 轴对齐矩形 (x, y, w, h)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// 多边形的外接矩形，少于两个点时没有意义
    pub fn bounding(points: &[Point]) -> Option<Rect> {
        if points.len() < 2 {
            return None;
        }
        let min_x = points.iter().map(|p| p.x).min()?;
        let max_x = points.iter().map(|p| p.x).max()?;
        let min_y = points.iter().map(|p| p.y).min()?;
        let max_y = points.iter().map(|p| p.y).max()?;
        Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// 单帧中识别到的一个码
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodeHit {
    pub data: String,
    pub symbology: Symbology,
    pub rect: Option<Rect>,
    pub polygon: Option<Vec<Point>>,
}

impl DecodeHit {
    pub fn new(data: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            data: data.into(),
            symbology,
            rect: None,
            polygon: None,
        }
    }

    /// 设置多边形并同时推导外接矩形
    pub fn with_polygon(mut self, polygon: Vec<Point>) -> Self {
        if polygon.is_empty() {
            return self;
        }
        self.rect = Rect::bounding(&polygon).or(self.rect);
        self.polygon = Some(polygon);
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }
}

/// 彩色帧（BGR24，行优先）
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, data: Bytes) -> Self {
        Self { width, height, data }
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::CHANNELS
    }

    /// 转成单通道灰度图，权重与 BT.601 一致
    pub fn to_luma(&self) -> LumaFrame {
        let pixels = self.width as usize * self.height as usize;
        let mut luma = Vec::with_capacity(pixels);
        for bgr in self.data.chunks_exact(Self::CHANNELS).take(pixels) {
            let (b, g, r) = (bgr[0] as u32, bgr[1] as u32, bgr[2] as u32);
            luma.push(((r * 4899 + g * 9617 + b * 1868 + 8192) >> 14) as u8);
        }
        LumaFrame {
            width: self.width,
            height: self.height,
            data: luma,
        }
    }
}

/// 单通道灰度帧
#[derive(Debug, Clone, PartialEq)]
pub struct LumaFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}
