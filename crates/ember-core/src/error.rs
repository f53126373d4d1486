use thiserror::Error;

/// Fatal errors raised by the emissions core.
///
/// Contract violations on individual pixels are normally flagged and carried
/// in the tile summary; they only surface here under
/// [`ValidationPolicy::Strict`](crate::config::ValidationPolicy::Strict).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmissionsError {
    /// A model constant is outside its meaningful range.
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// The configuration document could not be parsed.
    #[error("cannot parse model configuration: {0}")]
    ConfigParse(String),

    /// An input layer does not share the tile's dimensions.
    #[error("tile {tile}: layer `{layer}` has {actual} pixels, expected {expected}")]
    LayerSizeMismatch {
        tile: String,
        layer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The tile has zero width or height.
    #[error("tile {tile}: empty tile ({width}×{height})")]
    EmptyTile {
        tile: String,
        width: usize,
        height: usize,
    },

    /// A pixel violated the input contract while running in strict mode.
    #[error("tile {tile}: pixel (row {row}, col {col}) field `{field}`: {detail}")]
    InputContract {
        tile: String,
        row: usize,
        col: usize,
        field: &'static str,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, EmissionsError>;
