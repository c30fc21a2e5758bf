// nvprobe - NVENC codec capability probe

pub mod config;
pub mod probe;

pub use probe::{CodecSupport, DRIVER_TOO_OLD_PHRASE, NvencProbe, ProbeError, supports};
