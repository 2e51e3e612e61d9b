//! 标准输入控制台
//!
//! 运行期间从 stdin 逐行读取操作指令，代替图形界面上的按钮。

use common::{CameraKind, Command, DecodeMode};
use std::io::BufRead;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::HubConfig;
use crate::orchestrator::ProcessManager;

/// PTZ 默认速度（百分比）
pub const DEFAULT_PTZ_SPEED: u8 = 30;

pub const HELP: &str = "\
commands:
  mode <datamatrix|qrcode|barcode|all>
  start <camera-id>
  stop <camera-id>
  ptz <camera-id> <up|down|left|right|zoomin|zoomout> [speed 1-100]
  ptz <camera-id> stop
  list
  help
  quit";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PtzDirection {
    Up,
    Down,
    Left,
    Right,
    ZoomIn,
    ZoomOut,
}

impl PtzDirection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "zoomin" => Some(Self::ZoomIn),
            "zoomout" => Some(Self::ZoomOut),
            _ => None,
        }
    }

    /// (pan, tilt, zoom) 速度分量
    pub fn velocity(self, speed: u8) -> (f32, f32, f32) {
        let v = f32::from(speed) / 100.0;
        match self {
            Self::Up => (0.0, v, 0.0),
            Self::Down => (0.0, -v, 0.0),
            Self::Left => (-v, 0.0, 0.0),
            Self::Right => (v, 0.0, 0.0),
            Self::ZoomIn => (0.0, 0.0, v),
            Self::ZoomOut => (0.0, 0.0, -v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Mode(DecodeMode),
    Start(String),
    Stop(String),
    PtzMove {
        camera_id: String,
        direction: PtzDirection,
        speed: u8,
    },
    PtzStop(String),
    List,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("unknown decode mode: {0}")]
    BadMode(String),
    #[error("unknown PTZ direction: {0}")]
    BadDirection(String),
    #[error("speed must be 1-100, got {0}")]
    BadSpeed(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (head, args) = words.split_first().ok_or(ParseError::Empty)?;

        match (head.to_ascii_lowercase().as_str(), args) {
            ("mode", [mode]) => mode
                .parse()
                .map(ConsoleCommand::Mode)
                .map_err(|_| ParseError::BadMode(mode.to_string())),
            ("mode", _) => Err(ParseError::Usage("mode <datamatrix|qrcode|barcode|all>")),
            ("start", [id]) => Ok(ConsoleCommand::Start(id.to_string())),
            ("start", _) => Err(ParseError::Usage("start <camera-id>")),
            ("stop", [id]) => Ok(ConsoleCommand::Stop(id.to_string())),
            ("stop", _) => Err(ParseError::Usage("stop <camera-id>")),
            ("ptz", [id, action, rest @ ..]) if rest.len() <= 1 => {
                let action = action.to_ascii_lowercase();
                if action == "stop" {
                    return Ok(ConsoleCommand::PtzStop(id.to_string()));
                }
                let direction =
                    PtzDirection::parse(&action).ok_or(ParseError::BadDirection(action.clone()))?;
                let speed = match rest.first() {
                    Some(raw) => raw
                        .parse::<u8>()
                        .ok()
                        .filter(|s| (1..=100).contains(s))
                        .ok_or_else(|| ParseError::BadSpeed(raw.to_string()))?,
                    None => DEFAULT_PTZ_SPEED,
                };
                Ok(ConsoleCommand::PtzMove {
                    camera_id: id.to_string(),
                    direction,
                    speed,
                })
            }
            ("ptz", _) => Err(ParseError::Usage("ptz <camera-id> <direction|stop> [speed]")),
            ("list", []) => Ok(ConsoleCommand::List),
            ("help", _) => Ok(ConsoleCommand::Help),
            ("quit" | "exit", _) => Ok(ConsoleCommand::Quit),
            (other, _) => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

/// 执行一条指令；返回 false 表示退出
pub async fn execute(pm: &ProcessManager, config: &HubConfig, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::Mode(mode) => pm.set_decode_mode_all(mode),
        ConsoleCommand::Start(id) => match config.camera(&id) {
            Ok(camera) => {
                if !pm.start(camera.clone()) {
                    warn!("Camera {} not started", id);
                }
            }
            Err(e) => warn!("{}", e),
        },
        ConsoleCommand::Stop(id) => pm.stop(&id).await,
        ConsoleCommand::PtzMove {
            camera_id,
            direction,
            speed,
        } => {
            if ptz_target(pm, &camera_id) {
                let (pan, tilt, zoom) = direction.velocity(speed);
                pm.send_command(&camera_id, Command::ptz_move(pan, tilt, zoom));
            }
        }
        ConsoleCommand::PtzStop(camera_id) => {
            if ptz_target(pm, &camera_id) {
                pm.send_command(&camera_id, Command::PtzStop);
            }
        }
        ConsoleCommand::List => {
            let network = pm.list_cameras_of_kind(CameraKind::Network);
            let local = pm.list_cameras_of_kind(CameraKind::Local);
            info!(
                "Running: local [{}], network [{}], mode {}",
                local.join(", "),
                network.join(", "),
                pm.decode_mode()
            );
        }
        ConsoleCommand::Help => info!("\n{}", HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

/// PTZ 只发给正在运行的网络摄像头
fn ptz_target(pm: &ProcessManager, camera_id: &str) -> bool {
    let found = pm
        .list_cameras_of_kind(CameraKind::Network)
        .iter()
        .any(|id| id == camera_id);
    if !found {
        warn!("{} is not a running network camera", camera_id);
    }
    found
}

/// 在独立线程上读取 stdin，逐行发送；stdin 关闭时通道随之关闭
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
