//! 解码流水线
//!
//! 每帧按当前模式挑选检测器，每个检测器只跑一次。单个检测器出错或 panic
//! 都只当作这一帧没有结果。

mod detectors;

pub use detectors::{default_detectors, RxingDetector};

use common::{DecodeHit, DecodeMode, LumaFrame, SymbolFamily};
use std::panic::{self, AssertUnwindSafe};
use tracing::{trace, warn};

pub trait Detector: Send {
    fn family(&self) -> SymbolFamily;

    fn detect(&self, frame: &LumaFrame) -> anyhow::Result<Vec<DecodeHit>>;
}

pub struct DecodePipeline {
    mode: DecodeMode,
    detectors: Vec<Box<dyn Detector>>,
}

impl DecodePipeline {
    pub fn new(mode: DecodeMode, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { mode, detectors }
    }

    pub fn with_default_detectors(mode: DecodeMode) -> Self {
        Self::new(mode, default_detectors())
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DecodeMode) {
        self.mode = mode;
    }

    pub fn decode(&self, frame: &LumaFrame) -> Vec<DecodeHit> {
        let mut hits = Vec::new();
        for detector in &self.detectors {
            let family = detector.family();
            if !self.mode.selects(family) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(frame))) {
                Ok(Ok(found)) => hits.extend(found),
                Ok(Err(e)) => trace!("{:?} detector: {:#}", family, e),
                Err(_) => warn!("{:?} detector panicked, frame skipped", family),
            }
        }
        hits
    }
}
