// ffmpeg 命令行采集
//
// 以 rawvideo/bgr24 输出到 stdout，固定分辨率，每帧定长读取。

use bytes::Bytes;
use common::{Frame, Resolution, Transport};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command as AsyncCommand};
use tracing::debug;

use super::CaptureError;

/// 连接级别的 RTSP 选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamOptions {
    pub transport: Transport,
    pub timeout: Duration,
}

impl StreamOptions {
    fn input_args(&self) -> Vec<String> {
        vec![
            "-rtsp_transport".to_string(),
            self.transport.as_str().to_string(),
            // 单位: 微秒
            "-timeout".to_string(),
            self.timeout.as_micros().to_string(),
        ]
    }
}

/// 一次 ffmpeg 调用的参数
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    program: PathBuf,
    input_args: Vec<String>,
    input: String,
    resolution: Resolution,
    fps: Option<u32>,
}

impl FfmpegCommand {
    pub fn network(
        program: &Path,
        uri: &str,
        options: StreamOptions,
        resolution: Resolution,
        fps: Option<u32>,
    ) -> Self {
        Self {
            program: program.to_path_buf(),
            input_args: options.input_args(),
            input: uri.to_string(),
            resolution,
            fps,
        }
    }

    pub fn device(
        program: &Path,
        format: &str,
        device: String,
        resolution: Resolution,
        fps: Option<u32>,
    ) -> Self {
        let mut input_args = vec![
            "-f".to_string(),
            format.to_string(),
            "-video_size".to_string(),
            format!("{}x{}", resolution.width, resolution.height),
        ];
        if let Some(fps) = fps {
            input_args.push("-framerate".to_string());
            input_args.push(fps.to_string());
        }
        Self {
            program: program.to_path_buf(),
            input_args,
            input: device,
            resolution,
            fps,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.clone());
        args.extend(
            ["-an", "-f", "rawvideo", "-pix_fmt", "bgr24", "-vf"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(format!(
            "scale={}:{}",
            self.resolution.width, self.resolution.height
        ));
        if let Some(fps) = self.fps {
            args.push("-r".to_string());
            args.push(fps.to_string());
        }
        args.push("pipe:1".to_string());
        args
    }
}

/// 正在运行的 ffmpeg 进程及其输出
///
/// 进程以 kill_on_drop 启动，任务被强制中止时也会随之结束。
pub struct FfmpegReader {
    child: Child,
    stdout: ChildStdout,
    resolution: Resolution,
    read_timeout: Duration,
    buf: Vec<u8>,
    filled: usize,
}

impl FfmpegReader {
    pub fn spawn(command: &FfmpegCommand, read_timeout: Duration) -> Result<Self, CaptureError> {
        debug!("Spawning {:?} with {} args", command.program, command.args().len());

        let mut child = AsyncCommand::new(&command.program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Spawn(std::io::Error::other("stdout not captured")))?;

        let resolution = command.resolution();
        Ok(Self {
            child,
            stdout,
            resolution,
            read_timeout,
            buf: vec![0u8; Frame::byte_len(resolution.width, resolution.height)],
            filled: 0,
        })
    }

    /// 启动进程并等待第一帧，拿不到帧视为打开失败
    pub async fn open(
        command: &FfmpegCommand,
        read_timeout: Duration,
    ) -> Result<(Self, Frame), CaptureError> {
        let mut reader = Self::spawn(command, read_timeout)?;
        match reader.read_frame().await {
            Ok(frame) => Ok((reader, frame)),
            Err(e) => {
                reader.shutdown().await;
                Err(e)
            }
        }
    }

    /// 读取完整的一帧；超时不会丢弃已读到的部分，下次继续拼接
    pub async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let timeout = self.read_timeout;
        match tokio::time::timeout(timeout, self.fill()).await {
            Ok(Ok(())) => {
                self.filled = 0;
                Ok(Frame::new(
                    self.resolution.width,
                    self.resolution.height,
                    Bytes::copy_from_slice(&self.buf),
                ))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::Timeout(timeout)),
        }
    }

    async fn fill(&mut self) -> Result<(), CaptureError> {
        while self.filled < self.buf.len() {
            let n = self.stdout.read(&mut self.buf[self.filled..]).await?;
            if n == 0 {
                return Err(CaptureError::EndOfStream);
            }
            self.filled += n;
        }
        Ok(())
    }

    pub async fn shutdown(mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_args() {
        let cmd = FfmpegCommand::network(
            Path::new("ffmpeg"),
            "rtsp://10.0.0.5/stream1",
            StreamOptions {
                transport: Transport::Udp,
                timeout: Duration::from_secs(5),
            },
            Resolution::new(640, 480),
            Some(15),
        );
        let args = cmd.args().join(" ");
        assert!(args.contains("-rtsp_transport udp -timeout 5000000 -i rtsp://10.0.0.5/stream1"));
        assert!(args.contains("-pix_fmt bgr24"));
        assert!(args.contains("scale=640:480"));
        assert!(args.contains("-r 15"));
        assert!(args.ends_with("pipe:1"));
    }

    #[test]
    fn test_device_args() {
        let cmd = FfmpegCommand::device(
            Path::new("ffmpeg"),
            "v4l2",
            "/dev/video0".to_string(),
            Resolution::new(1280, 720),
            None,
        );
        let args = cmd.args().join(" ");
        assert!(args.contains("-f v4l2 -video_size 1280x720 -i /dev/video0"));
        assert!(!args.contains("-framerate"));
        assert!(!args.contains(" -r "));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let cmd = FfmpegCommand::device(
            Path::new("/nonexistent/ffmpeg-binary"),
            "v4l2",
            "/dev/video0".to_string(),
            Resolution::new(4, 4),
            None,
        );
        let result = FfmpegReader::open(&cmd, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(CaptureError::Spawn(_))));
    }
}
