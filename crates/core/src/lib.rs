pub mod amount;
pub mod rect;

pub use amount::{parse_comma_decimal, AmountError};
pub use rect::Rect;
