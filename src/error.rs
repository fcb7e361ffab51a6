//! Error types for ordstat

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ordstat's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Device error codes.
///
/// The numbering follows the OpenCL status codes so that reports stay
/// comparable with other accelerator tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// No adapter matched the requested platform/device pair
    DeviceNotFound = -1,
    /// Buffer allocation failed or exceeded a device limit
    AllocationFailure = -4,
    /// The device ran out of resources while executing
    OutOfResources = -5,
    /// Timestamp queries are not available for the event
    ProfilingUnavailable = -7,
    /// Kernel program failed to compile
    BuildFailure = -11,
    /// Mapping a buffer for host access failed
    MapFailure = -12,
    /// An argument value was rejected by the device layer
    InvalidValue = -30,
    /// The work-group size is not usable on the device
    InvalidWorkGroupSize = -54,
    /// The operation is not valid for the object (e.g. writing a read-only buffer)
    InvalidOperation = -59,
}

impl ErrorCode {
    /// Raw numeric code
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Symbolic name of the code
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DeviceNotFound => "DEVICE_NOT_FOUND",
            ErrorCode::AllocationFailure => "MEM_OBJECT_ALLOCATION_FAILURE",
            ErrorCode::OutOfResources => "OUT_OF_RESOURCES",
            ErrorCode::ProfilingUnavailable => "PROFILING_INFO_NOT_AVAILABLE",
            ErrorCode::BuildFailure => "BUILD_PROGRAM_FAILURE",
            ErrorCode::MapFailure => "MAP_FAILURE",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::InvalidWorkGroupSize => "INVALID_WORK_GROUP_SIZE",
            ErrorCode::InvalidOperation => "INVALID_OPERATION",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.raw())
    }
}

/// Outcome of a kernel program build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// Source failed to parse
    ParseError,
    /// Source parsed but failed validation
    ValidationError,
    /// Source passed the front end but the device could not compile it
    CompileError,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::ParseError => "parse error",
            BuildStatus::ValidationError => "validation error",
            BuildStatus::CompileError => "compile error",
        };
        f.write_str(s)
    }
}

/// Errors that can occur while preparing or running the statistics pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid pipeline configuration, detected before any device allocation
    #[error("Invalid configuration '{field}': {reason}")]
    Configuration {
        /// The offending field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Requested platform/device pair does not exist
    #[error("No device {device} on platform {platform}: {reason}")]
    DeviceSelection {
        /// Platform index
        platform: usize,
        /// Device index within the platform
        device: usize,
        /// What went wrong
        reason: String,
    },

    /// Kernel program compilation failed
    #[error("Build of '{program}' failed ({status}, options: {options})\n{log}")]
    DeviceBuild {
        /// Program (shader module) name
        program: String,
        /// Build status
        status: BuildStatus,
        /// Build options used
        options: String,
        /// Full compiler log
        log: String,
    },

    /// Buffer allocation or transfer failure
    #[error("Device memory error during {op}: {message}")]
    DeviceMemory {
        /// Operation being attempted
        op: &'static str,
        /// Underlying device error code
        code: ErrorCode,
        /// Device-layer message
        message: String,
    },

    /// Dispatch or profiling-query failure
    #[error("Device execution error during {op}: {message}")]
    DeviceExecution {
        /// Operation being attempted
        op: &'static str,
        /// Underlying device error code
        code: ErrorCode,
        /// Device-layer message
        message: String,
    },

    /// Dataset file could not be read
    #[error("Unable to read dataset {path:?}: {source}")]
    Dataset {
        /// File path
        path: PathBuf,
        /// I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    /// Create a device memory error
    pub fn memory(op: &'static str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::DeviceMemory {
            op,
            code,
            message: message.into(),
        }
    }

    /// Create a device execution error
    pub fn execution(op: &'static str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::DeviceExecution {
            op,
            code,
            message: message.into(),
        }
    }

    /// Device error code, if this error came from the device layer
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::DeviceSelection { .. } => Some(ErrorCode::DeviceNotFound),
            Error::DeviceBuild { .. } => Some(ErrorCode::BuildFailure),
            Error::DeviceMemory { code, .. } | Error::DeviceExecution { code, .. } => Some(*code),
            Error::Configuration { .. } | Error::Dataset { .. } => None,
        }
    }

    /// True for errors raised by the accelerator layer
    pub fn is_device_error(&self) -> bool {
        self.code().is_some()
    }
}
