use thiserror::Error;

/// Result alias for all fallible codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes of the codec. Field arithmetic itself is infallible; every
/// error here is a rejected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
	#[error("at least one data block is required")]
	BlockCountTooLow,

	#[error("at least one recovery block is required")]
	RecoveryCountTooLow,

	#[error("k + m = {0} exceeds the GF(2^8) limit of 256 blocks")]
	TooManyBlocks(usize),

	#[error("block size {0} is not a positive multiple of 8")]
	InvalidBlockSize(usize),

	#[error("buffer holds {got} bytes where {expected} were expected")]
	BufferSizeMismatch { expected: usize, got: usize },

	#[error("{got} block descriptors supplied where {expected} were expected")]
	WrongBlockCount { expected: usize, got: usize },

	#[error("row id {0} is outside the encoded stream")]
	RowIdOutOfRange(u8),

	#[error("row id {0} appears more than once")]
	DuplicateRowId(u8),

	#[error("initialized against API version {expected}, caller expected {got}")]
	VersionMismatch { expected: u32, got: u32 },

	#[error("recovery system is singular; input rows were not independent")]
	SingularMatrix,
}
