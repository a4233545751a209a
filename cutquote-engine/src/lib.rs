pub mod extract;
pub mod pricing;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum ExtractError {
        #[error("document has no ENTITIES section")]
        MissingEntityTable,
    }
}

pub use errors::ExtractError;
pub use extract::{Extraction, Metrics, Shape, ShapeKind, extract};
pub use pricing::{PriceBreakdown, calculate_price};
