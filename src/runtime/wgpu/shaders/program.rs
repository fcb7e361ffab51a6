//! Building the statistics program for one group size

use wgpu::naga::front::wgsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

use super::pipeline::ProgramCache;
use super::wgsl::{ENTRY_POINTS, generate_statistics_shader};
use crate::error::{BuildStatus, Error, Result};

/// Name of the module generated for `group_size`
pub fn program_name(group_size: usize) -> String {
    format!("statistics_g{group_size}")
}

/// Build options recorded alongside build failures
pub fn build_options(group_size: usize) -> String {
    format!("group_size={group_size}")
}

/// Parse and validate `source` before it reaches the device.
///
/// Front-end diagnostics become the build log of the returned error.
pub fn check_source(program: &str, source: &str, group_size: usize) -> Result<()> {
    let fail = |status, log: String| Error::DeviceBuild {
        program: program.to_string(),
        status,
        options: build_options(group_size),
        log,
    };

    let module = wgsl::Frontend::new()
        .parse(source)
        .map_err(|e| fail(BuildStatus::ParseError, e.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| {
            fail(
                BuildStatus::ValidationError,
                format!("{e}\n{:?}", e.as_inner()),
            )
        })?;
    Ok(())
}

/// Generate, check and compile every entry point for `group_size`.
pub fn build(cache: &ProgramCache, group_size: usize) -> Result<()> {
    if let Some(program) = cache.program(group_size) {
        log::debug!("Program {} already built", program.name());
        return Ok(());
    }

    let name = program_name(group_size);
    let source = generate_statistics_shader(group_size);
    check_source(&name, &source, group_size)?;

    cache.compile(&name, group_size, &source, ENTRY_POINTS)?;
    log::info!(
        "Built {name} ({} entry points, {})",
        ENTRY_POINTS.len(),
        build_options(group_size)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_source_passes() {
        let source = generate_statistics_shader(16);
        check_source(&program_name(16), &source, 16).unwrap();
    }

    #[test]
    fn test_parse_failure_carries_log() {
        let err = check_source("broken", "fn main( {", 4).unwrap_err();
        match err {
            Error::DeviceBuild {
                program,
                status,
                options,
                log,
            } => {
                assert_eq!(program, "broken");
                assert_eq!(status, BuildStatus::ParseError);
                assert_eq!(options, "group_size=4");
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_failure_is_reported() {
        // Parses, but assigns a u32 to an i32 variable.
        let src = "fn f() { var x: i32 = 0; let y: u32 = 1u; x = y; }";
        let err = check_source("typed", src, 4).unwrap_err();
        assert!(matches!(err, Error::DeviceBuild { .. }));
    }
}
