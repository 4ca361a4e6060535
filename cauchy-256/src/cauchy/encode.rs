use log::trace;

use crate::errors::*;
use crate::field;
use crate::xor::{xor_into, xor_set};

use super::bitslice::apply_slice;
use super::matrix::{generator, Generator};
use super::window::{WindowScratch, WINDOW_THRESHOLD};
use super::check_parameters;

/// Produce `m` recovery blocks from `k` data blocks.
///
/// Writes `m * block_bytes` bytes into `recovery`: the first block is the
/// XOR of all data blocks, the rest come from the stored generator rows.
/// Nothing is written when validation fails.
pub fn encode(k: usize, m: usize, data: &[&[u8]], recovery: &mut [u8], block_bytes: usize) -> Result<()> {
	check_parameters(k, m, block_bytes)?;
	if data.len() != k {
		return Err(Error::WrongBlockCount { expected: k, got: data.len() });
	}
	for block in data {
		if block.len() != block_bytes {
			return Err(Error::BufferSizeMismatch { expected: block_bytes, got: block.len() });
		}
	}
	if recovery.len() != m * block_bytes {
		return Err(Error::BufferSizeMismatch { expected: m * block_bytes, got: recovery.len() });
	}

	// A single data block reproduces itself in every recovery slot.
	if k == 1 {
		for out in recovery.chunks_exact_mut(block_bytes) {
			out.copy_from_slice(data[0]);
		}
		return Ok(());
	}

	// The generator's first row is all-ones, so the first recovery block is
	// the plain XOR of the data.
	let (first, rest) = recovery.split_at_mut(block_bytes);
	xor_set(first, data[0], data[1]);
	for block in &data[2..] {
		xor_into(first, block);
	}
	if m == 1 {
		return Ok(());
	}

	rest.fill(0);

	let gen = generator(k, m);
	let sub = block_bytes / 8;

	if m > WINDOW_THRESHOLD + 1 {
		trace!("windowed encode: k={} m={} block_bytes={}", k, m, block_bytes);
		win_encode(k, m, &gen, data, rest, sub);
	} else {
		let gf = field::tables();
		for y in 1..m {
			let row = gen.row(y - 1);
			let out = &mut rest[(y - 1) * block_bytes..][..block_bytes];
			for x in 0..k {
				apply_slice(gf, row[x], data[x], out, sub);
			}
		}
	}

	Ok(())
}

/// Windowed encoder: per data block, build the two 4-bit tables once and
/// reuse them for every stored generator row.
fn win_encode(k: usize, m: usize, gen: &Generator, data: &[&[u8]], out: &mut [u8], sub: usize) {
	let gf = field::tables();
	let mut scratch = WindowScratch::new(sub);

	for x in 0..k {
		let src = data[x];
		scratch.fill(0, &src[..4 * sub]);
		scratch.fill(1, &src[4 * sub..]);

		for y in 1..m {
			let mut slice = gen.row(y - 1)[x];
			for bit_y in 0..8 {
				let off = ((y - 1) * 8 + bit_y) * sub;
				scratch.apply(&mut out[off..off + sub], slice & 15, slice >> 4, src);
				slice = gf.times2(slice);
			}
		}
	}
}
