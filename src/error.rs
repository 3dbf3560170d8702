use std::{io, time::Duration};

/// Errors reported by a [`CoprocessorRuntime`](crate::runtime::CoprocessorRuntime).
///
/// The driver cannot diagnose PRU firmware failures, these are passed through as-is.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
	#[error("io error: {0}")]
	Io(#[from] io::Error),

	#[error("coprocessor {unit}: {message}")]
	Unit { unit: usize, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The shared DDR segment can't hold two frames.
	#[error("pixel data needs at least 2 * {frame_size} bytes, only {available} in shared memory")]
	InsufficientMemory { frame_size: usize, available: usize },

	#[error("{what} {index} out of range (limit {limit})")]
	OutOfRange {
		what:  &'static str,
		index: usize,
		limit: usize,
	},

	#[error("unknown color channel order \"{0}\"")]
	UnknownChannelOrder(String),

	#[error("timed out after {0:?}")]
	TimedOut(Duration),

	#[error("wait cancelled")]
	Cancelled,

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	#[error(transparent)]
	Runtime(#[from] RuntimeError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn check_index(what: &'static str, index: usize, limit: usize) -> Result<()> {
	if index < limit {
		Ok(())
	} else {
		Err(Error::OutOfRange { what, index, limit })
	}
}
