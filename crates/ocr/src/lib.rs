pub mod cache;
pub mod chain;
pub mod engine;
pub mod hierarchy;
pub mod matrix;
pub mod pool;
pub mod templates;
pub mod token;
pub mod vendor;

pub use cache::ImageCache;
pub use chain::{Exhausted, ExtractContext, NumericChain, NumericRead};
pub use engine::{MockEngine, OcrEngine, OcrError, OutputFormat, RecognizeOptions, Segmentation};
pub use hierarchy::{Block, Document, HierarchyError, Line, Page, Paragraph, Word};
pub use matrix::PixelMatrix;
pub use pool::{BoxedEngine, EngineLease, EnginePool};
pub use templates::{Glyph, SizeClass, TemplateLibrary};
pub use token::{parse_tsv, Token, TokenLevel};
pub use vendor::{scan_line_amounts, VendorKind, VendorProfile};
