//! Systematic Cauchy Reed-Solomon (CRS) erasure codes over GF(2^8).
//!
//! Given `k` equal-sized data blocks the encoder produces `m` recovery
//! blocks (`k + m <= 256`); any `k` distinct blocks of the combined stream
//! reconstruct the originals. The code is MDS, so no erasure pattern of up
//! to `m` blocks is unrecoverable.
//!
//! Every GF(2^8) coefficient is expanded into the 8x8 binary matrix of its
//! iterated doublings, byte-transposed, which turns the whole codec into
//! XOR over eighth-block "sub-blocks". A 4-bit window table amortizes those
//! XORs whenever enough recovery rows are in play, and decoding solves a
//! bit-matrix by Gaussian elimination plus back-substitution.
//!
//! Block sizes must be a positive multiple of 8. Blocks travel with a one
//! byte row id: `0..k` are original positions, `k..k+m` recovery positions.
//!
//! ```
//! use cauchy_256::{decode, encode, Block};
//!
//! let data: [&[u8]; 2] = [&[1, 2, 3, 4, 5, 6, 7, 8], &[9, 10, 11, 12, 13, 14, 15, 16]];
//! let mut recovery = [0_u8; 16];
//! encode(2, 2, &data, &mut recovery, 8).unwrap();
//!
//! // Lose both originals, keep both recovery blocks.
//! let (r0, r1) = recovery.split_at_mut(8);
//! let mut blocks = [Block { data: r0, row: 2 }, Block { data: r1, row: 3 }];
//! decode(2, 2, &mut blocks, 8).unwrap();
//!
//! assert_eq!(blocks[0].data, data[blocks[0].row as usize]);
//! assert_eq!(blocks[1].data, data[blocks[1].row as usize]);
//! ```

pub mod errors;
pub mod field;
pub mod xor;

mod cauchy;

pub use crate::cauchy::{decode, encode, Block};
pub use crate::errors::{Error, Result};

/// API version guarded by [`init_version`].
pub const VERSION: u32 = 1;

/// Build the process-global field tables and verify the API version.
///
/// Optional: `encode` and `decode` initialize lazily on first use. Calling
/// this once at startup front-loads the one-time table build before any
/// concurrent use. Idempotent.
pub fn init() -> Result<()> {
	init_version(VERSION)
}

/// [`init`] against an explicit expected version, for callers that pin the
/// wire behavior they were built against.
pub fn init_version(expected_version: u32) -> Result<()> {
	if expected_version != VERSION {
		return Err(Error::VersionMismatch { expected: VERSION, got: expected_version });
	}

	field::tables();
	Ok(())
}
