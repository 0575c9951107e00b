//! vid-stealth - batch re-encoding into bit-distinct, metadata-scrubbed derivatives
//!
//! Per file:
//! - randomized parameters drawn from a static range table
//! - a structured filter chain (color, hue, zoom, pixel shift, noise, resize / pitch, volume)
//! - one bounded ffmpeg run with metadata-clearing directives
//! - optional vendor tag patch and ffprobe verification
//!
//! ## Usage
//! ```rust,ignore
//! use vid_stealth::{Pipeline, StealthConfig};
//!
//! let config = StealthConfig::load("stealth.toml".as_ref())?;
//! let batch = Pipeline::new(&config).run_batch()?;
//! println!("{} of {} succeeded", batch.succeeded, batch.total);
//! ```

pub mod config;
pub mod encode_job;
pub mod encoder;
pub mod error;
pub mod filter_graph;
pub mod pipeline;
pub mod sampler;
pub mod vendor_patch;
pub mod verify;

#[cfg(test)]
mod test_support;

pub use config::{RangeSpec, StealthConfig, SwitchSet};
pub use encode_job::{CodecMode, EncodeJob, MetadataMode, TrimWindow};
pub use encoder::{EncodeError, EncodeInvoker, EncodeSuccess, FailureKind};
pub use error::{Result, StealthError};
pub use filter_graph::{AudioOp, FilterChain, VideoOp};
pub use pipeline::{Pipeline, ProcessResult};
pub use sampler::{ParamKind, ParameterRange, ParameterSampler, SampledParameters};
pub use vendor_patch::{PatchOutcome, VendorPatchError, VendorPatcher};
pub use verify::{VerificationError, VerificationProbe, VerificationReport};
