use std::collections::VecDeque;
use std::time::Duration;

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR call exceeded {0:?}")]
    Timeout(Duration),
    #[error("Tesseract not available — build with `tesseract` feature")]
    NotAvailable,
}

/// Page segmentation hint passed down to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segmentation {
    /// Let the engine do full layout analysis (whole receipt pages).
    Auto,
    /// Treat the region as one uniform block (narrowed re-OCR calls).
    SingleBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    PlainText,
    /// Tab-separated token stream, one row per hierarchy node (see
    /// [`crate::token::parse_tsv`]).
    Tsv,
}

/// Per-call engine configuration. The engine applies these by mutating its
/// own state before recognizing, which is why [`OcrEngine::recognize`]
/// takes `&mut self` — a shared engine instance must not serve two callers
/// at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeOptions {
    pub segmentation: Segmentation,
    pub format: OutputFormat,
    /// Restrict recognition to these characters, when set.
    pub whitelist: Option<String>,
}

impl RecognizeOptions {
    pub fn page_tsv() -> Self {
        RecognizeOptions {
            segmentation: Segmentation::Auto,
            format: OutputFormat::Tsv,
            whitelist: None,
        }
    }

    /// Digit-only recovery mode used for narrowed word regions: digits,
    /// decimal separators and sign, single-block segmentation.
    pub fn digits() -> Self {
        RecognizeOptions {
            segmentation: Segmentation::SingleBlock,
            format: OutputFormat::PlainText,
            whitelist: Some("0123456789,.-".to_string()),
        }
    }

    /// Tabular re-read of a single line region.
    pub fn line_tsv() -> Self {
        RecognizeOptions {
            segmentation: Segmentation::SingleBlock,
            format: OutputFormat::Tsv,
            whitelist: None,
        }
    }
}

/// Abstraction over an external OCR engine.
///
/// Implementations accept a decoded image region and return either plain
/// text or the tabular token stream, per `options.format`.
pub trait OcrEngine: Send {
    fn recognize(
        &mut self,
        region: &DynamicImage,
        options: &RecognizeOptions,
    ) -> Result<String, OcrError>;
}

// ── Mock engine (always available, used for tests) ────────────────────────────

/// Replays a scripted queue of responses and records every call — lets the
/// extraction chain be tested stage by stage without Tesseract installed.
#[derive(Default)]
pub struct MockEngine {
    responses: VecDeque<Result<String, OcrError>>,
    pub calls: Vec<RecognizeOptions>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: impl IntoIterator<Item = Result<String, OcrError>>) -> Self {
        MockEngine { responses: responses.into_iter().collect(), calls: Vec::new() }
    }

    pub fn push_ok(&mut self, text: impl Into<String>) {
        self.responses.push_back(Ok(text.into()));
    }

    pub fn push_err(&mut self, err: OcrError) {
        self.responses.push_back(Err(err));
    }
}

impl OcrEngine for MockEngine {
    fn recognize(
        &mut self,
        _region: &DynamicImage,
        options: &RecognizeOptions,
    ) -> Result<String, OcrError> {
        self.calls.push(options.clone());
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(OcrError::Engine("mock queue exhausted".into())))
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrEngine, OcrError, OutputFormat, RecognizeOptions, Segmentation};
    use image::DynamicImage;
    use leptess::{LepTess, Variable};
    use std::io::Cursor;

    pub struct TesseractEngine {
        inner: LepTess,
    }

    impl TesseractEngine {
        pub fn new(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
            let inner = LepTess::new(data_path, lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(TesseractEngine { inner })
        }
    }

    impl OcrEngine for TesseractEngine {
        fn recognize(
            &mut self,
            region: &DynamicImage,
            options: &RecognizeOptions,
        ) -> Result<String, OcrError> {
            let mut png = Vec::new();
            region
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            self.inner
                .set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;

            // Configuration is mutated in place per call (segmentation mode
            // and whitelist persist until overwritten).
            let psm = match options.segmentation {
                Segmentation::Auto => "3",
                Segmentation::SingleBlock => "6",
            };
            self.inner
                .set_variable(Variable::TesseditPagesegMode, psm)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let whitelist = options.whitelist.as_deref().unwrap_or("");
            self.inner
                .set_variable(Variable::TesseditCharWhitelist, whitelist)
                .map_err(|e| OcrError::Engine(e.to_string()))?;

            match options.format {
                OutputFormat::PlainText => self
                    .inner
                    .get_utf8_text()
                    .map_err(|e| OcrError::Engine(e.to_string())),
                OutputFormat::Tsv => self
                    .inner
                    .get_tsv_text(0)
                    .map_err(|e| OcrError::Engine(e.to_string())),
            }
        }
    }
}
