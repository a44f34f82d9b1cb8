//! Display calibration: the profile value type and the bridge handshake.

pub mod bridge;
pub mod channel;
pub mod profile;

pub use bridge::{BridgeInstallHint, LogPrompt, OperatorPrompt, OsFamily};
pub use channel::{
    CalibrationChannel, CalibrationSource, ChannelState, FallbackReason, Handshake,
    HandshakeEvent, ResolvedCalibration,
};
pub use profile::{CalibrationProfile, CalibrationValue};
