use thiserror::Error;

/// Failures raised by the geometry model and paginator.
///
/// Neither variant is retryable: the inputs are pure values, so calling again with the
/// same inputs fails the same way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaginationError {
    /// Degenerate page or bitmap geometry (non-positive printable area, zero capacity, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The iteration cap tripped before all rows were consumed. Always a geometry bug.
    #[error(
        "Internal invariant violated: {consumed_px} of {pixel_height} rows paginated \
         after {iterations} iterations"
    )]
    InternalInvariant {
        consumed_px: u32,
        pixel_height: u32,
        iterations: u32,
    },
}
