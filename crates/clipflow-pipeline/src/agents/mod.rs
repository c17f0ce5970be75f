//! Collaborators the executors call into.
//!
//! Each capability is a trait so stages and graph nodes can be driven by the
//! real implementations or by test doubles.

pub mod analyzer;
pub mod formatter;
pub mod router;

pub use analyzer::{RemoteAnalyzer, SidecarAnalyzer, VideoAnalyzer};
pub use formatter::{PlatformFormatter, RenderingFormatter, SpecFormatter};
pub use router::{HeuristicRouter, PlatformRouter};
