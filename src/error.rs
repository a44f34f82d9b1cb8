use thiserror::Error;

/// Library error type for quilt detection, calibration and compositing.
#[derive(Debug, Error)]
pub enum Error {
    /// The decoded image has a zero dimension; tile math would divide by zero.
    #[error("invalid image: {width}x{height}")]
    InvalidImage { width: u32, height: u32 },

    /// The RGBA buffer does not hold exactly `width * height * 4` bytes.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// A tile grid with a zero axis or an unparsable `XxY` string.
    #[error("invalid tile grid: {0}")]
    InvalidTileGrid(String),

    /// Calibration payload could not be used as a profile.
    #[error("calibration payload rejected: {0}")]
    Calibration(String),

    /// Quilt exceeds the largest texture the GPU device accepts.
    #[error("quilt {width}x{height} exceeds the device texture limit of {limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
