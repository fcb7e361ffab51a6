//! WGSL statistics kernels
//!
//! - `wgsl`: source generation per group size
//! - `program`: front-end checks and pipeline compilation
//! - `pipeline`: compiled programs keyed by group size

pub mod pipeline;
pub mod program;
pub mod wgsl;

pub use pipeline::{Program, ProgramCache};
pub use program::{build, build_options, check_source, program_name};
pub use wgsl::{ENTRY_POINTS, generate_statistics_shader};
