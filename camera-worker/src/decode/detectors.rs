use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use common::{DecodeHit, LumaFrame, Point, SymbolFamily, Symbology};
use rxing::{BarcodeFormat, DecodeHintType, DecodeHintValue, DecodingHintDictionary};

use super::Detector;

const LINEAR_FORMATS: [BarcodeFormat; 9] = [
    BarcodeFormat::CODE_128,
    BarcodeFormat::CODE_39,
    BarcodeFormat::CODE_93,
    BarcodeFormat::EAN_8,
    BarcodeFormat::EAN_13,
    BarcodeFormat::UPC_A,
    BarcodeFormat::UPC_E,
    BarcodeFormat::ITF,
    BarcodeFormat::CODABAR,
];

/// 基于 rxing 的检测器，一个实例对应一类码
pub struct RxingDetector {
    family: SymbolFamily,
    formats: HashSet<BarcodeFormat>,
}

impl RxingDetector {
    pub fn data_matrix() -> Self {
        Self {
            family: SymbolFamily::DataMatrix,
            formats: HashSet::from([BarcodeFormat::DATA_MATRIX]),
        }
    }

    pub fn qr() -> Self {
        Self {
            family: SymbolFamily::Qr,
            formats: HashSet::from([BarcodeFormat::QR_CODE]),
        }
    }

    pub fn linear() -> Self {
        Self {
            family: SymbolFamily::Linear,
            formats: LINEAR_FORMATS.into_iter().collect(),
        }
    }
}

pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(RxingDetector::data_matrix()),
        Box::new(RxingDetector::qr()),
        Box::new(RxingDetector::linear()),
    ]
}

fn symbology(format: &BarcodeFormat) -> Option<Symbology> {
    Some(match format {
        BarcodeFormat::DATA_MATRIX => Symbology::DataMatrix,
        BarcodeFormat::QR_CODE => Symbology::QrCode,
        BarcodeFormat::CODE_128 => Symbology::Code128,
        BarcodeFormat::CODE_39 => Symbology::Code39,
        BarcodeFormat::CODE_93 => Symbology::Code93,
        BarcodeFormat::EAN_8 => Symbology::Ean8,
        BarcodeFormat::EAN_13 => Symbology::Ean13,
        BarcodeFormat::UPC_A => Symbology::UpcA,
        BarcodeFormat::UPC_E => Symbology::UpcE,
        BarcodeFormat::ITF => Symbology::Itf,
        BarcodeFormat::CODABAR => Symbology::Codabar,
        _ => return None,
    })
}

impl Detector for RxingDetector {
    fn family(&self) -> SymbolFamily {
        self.family
    }

    fn detect(&self, frame: &LumaFrame) -> anyhow::Result<Vec<DecodeHit>> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(Vec::new());
        }

        let mut hints: DecodingHintDictionary = HashMap::new();
        hints.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(self.formats.clone()),
        );
        hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));

        // 没找到码也走错误分支
        let results = rxing::helpers::detect_multiple_in_luma_with_hints(
            frame.data.clone(),
            frame.width,
            frame.height,
            &mut hints,
        )
        .map_err(|e| anyhow!("{:?}", e))?;

        let hits = results
            .iter()
            .filter_map(|result| {
                let symbology = symbology(result.getBarcodeFormat())?;
                if symbology.family() != self.family {
                    return None;
                }
                let text = result.getText().to_string();
                if text.is_empty() {
                    return None;
                }
                let polygon: Vec<Point> = result
                    .getPoints()
                    .iter()
                    .map(|p| Point::new(p.x.round() as i32, p.y.round() as i32))
                    .collect();
                Some(DecodeHit::new(text, symbology).with_polygon(polygon))
            })
            .collect();
        Ok(hits)
    }
}
