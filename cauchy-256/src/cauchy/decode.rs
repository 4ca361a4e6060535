use log::trace;

use crate::errors::*;
use crate::field::{self, GfTables};
use crate::xor::{xor_add, xor_into};

use super::bitslice::apply_slice;
use super::matrix::{generator, Generator};
use super::util::pair_mut;
use super::window::{WindowScratch, WINDOW_THRESHOLD};
use super::{check_parameters, Block};

/// Recover the original data from any `k` distinct blocks of the encoded
/// stream, in place.
///
/// On success every block that carried recovery data holds the payload of
/// an erased original instead, and its `row` names that original position.
/// Blocks that already carried original data are untouched.
pub fn decode(k: usize, m: usize, blocks: &mut [Block<'_>], block_bytes: usize) -> Result<()> {
	check_parameters(k, m, block_bytes)?;
	if blocks.len() != k {
		return Err(Error::WrongBlockCount { expected: k, got: blocks.len() });
	}
	let mut seen = [false; 256];
	for block in blocks.iter() {
		if block.data.len() != block_bytes {
			return Err(Error::BufferSizeMismatch { expected: block_bytes, got: block.data.len() });
		}
		if block.row as usize >= k + m {
			return Err(Error::RowIdOutOfRange(block.row));
		}
		if seen[block.row as usize] {
			return Err(Error::DuplicateRowId(block.row));
		}
		seen[block.row as usize] = true;
	}

	// A lone block is its own original.
	if k == 1 {
		blocks[0].row = 0;
		return Ok(());
	}
	if m == 1 {
		decode_single_recovery(k, blocks);
		return Ok(());
	}

	// Split survivors into originals and recovery blocks, and list the
	// erased original positions each recovery block will fill, in order.
	let mut originals = Vec::with_capacity(k);
	let mut recoveries = Vec::with_capacity(k);
	for (i, block) in blocks.iter().enumerate() {
		if (block.row as usize) < k {
			originals.push(i);
		} else {
			recoveries.push(i);
		}
	}
	let erasures: Vec<u8> = (0..k).filter(|&p| !seen[p]).map(|p| p as u8).collect();
	debug_assert_eq!(erasures.len(), recoveries.len());

	let r = recoveries.len();
	if r == 0 {
		return Ok(());
	}
	trace!("decode: k={} m={} erasures={} windowed={}", k, m, r, r > WINDOW_THRESHOLD);

	let gf = field::tables();
	let gen = generator(k, m);
	let sub = block_bytes / 8;

	// Subtract every surviving original's contribution, leaving each
	// recovery block a combination of only the erased originals.
	if !originals.is_empty() {
		if r > WINDOW_THRESHOLD {
			eliminate_known_windowed(gf, &gen, blocks, &originals, &recoveries, k, sub);
		} else {
			eliminate_known(gf, &gen, blocks, &originals, &recoveries, k, sub);
		}
	}

	let (mut matrix, stride) = build_bitmatrix(gf, &gen, blocks, &recoveries, &erasures, k);

	super::gaussian::solve(blocks, &recoveries, &mut matrix, stride, sub)
}

/// Fast path for `m = 1`: the only possible recovery block is the XOR of
/// all originals, so the erased original is the XOR of everything else.
fn decode_single_recovery(k: usize, blocks: &mut [Block<'_>]) {
	let Some(e) = blocks.iter().position(|b| b.row as usize >= k) else {
		return;
	};
	let (left, rest) = blocks.split_at_mut(e);
	let Some((erased, right)) = rest.split_first_mut() else {
		return;
	};

	let mut present = [false; 256];
	for block in left.iter().chain(right.iter()) {
		present[block.row as usize] = true;
	}

	// Fold sources in pairs; xor_add makes one pass over the destination
	// where two xor_into calls would make two.
	let mut sources = left.iter().chain(right.iter());
	loop {
		match (sources.next(), sources.next()) {
			(Some(a), Some(b)) => xor_add(erased.data, &*a.data, &*b.data),
			(Some(a), None) => {
				xor_into(erased.data, &*a.data);
				break;
			}
			_ => break,
		}
	}

	erased.row = present[..k].iter().position(|p| !p).unwrap_or(0) as u8;
}

fn eliminate_known(
	gf: &GfTables,
	gen: &Generator,
	blocks: &mut [Block<'_>],
	originals: &[usize],
	recoveries: &[usize],
	k: usize,
	sub: usize,
) {
	for &ri in recoveries {
		let recovery_row = blocks[ri].row as usize - k;
		for &oj in originals {
			let (orig, rec) = pair_mut(blocks, oj, ri);
			let element = if recovery_row == 0 { 1 } else { gen.row(recovery_row - 1)[orig.row as usize] };

			if element == 1 {
				// Identity submatrix: one whole-block XOR.
				xor_into(rec.data, &*orig.data);
			} else {
				apply_slice(gf, element, &*orig.data, rec.data, sub);
			}
		}
	}
}

/// Windowed elimination: the tables are built once per original block and
/// amortized over all recovery rows.
fn eliminate_known_windowed(
	gf: &GfTables,
	gen: &Generator,
	blocks: &mut [Block<'_>],
	originals: &[usize],
	recoveries: &[usize],
	k: usize,
	sub: usize,
) {
	let mut scratch = WindowScratch::new(sub);

	for &oj in originals {
		{
			let src = &*blocks[oj].data;
			scratch.fill(0, &src[..4 * sub]);
			scratch.fill(1, &src[4 * sub..]);
		}

		for &ri in recoveries {
			let recovery_row = blocks[ri].row as usize - k;
			let (orig, rec) = pair_mut(blocks, oj, ri);
			let element = if recovery_row == 0 { 1 } else { gen.row(recovery_row - 1)[orig.row as usize] };

			if element == 1 {
				xor_into(rec.data, &*orig.data);
			} else {
				let mut slice = element;
				for bit_y in 0..8 {
					scratch.apply(&mut rec.data[bit_y * sub..][..sub], slice & 15, slice >> 4, &*orig.data);
					slice = gf.times2(slice);
				}
			}
		}
	}
}

/// Expand the generator rows still in play into an `(r*8) x (r*8)` binary
/// matrix over the erased columns, stored row-major in 64-bit words. Also
/// retags each recovery block with the original row it will reconstruct.
fn build_bitmatrix(
	gf: &GfTables,
	gen: &Generator,
	blocks: &mut [Block<'_>],
	recoveries: &[usize],
	erasures: &[u8],
	k: usize,
) -> (Vec<u64>, usize) {
	let rows = recoveries.len();
	let bit_rows = rows * 8;
	let stride = (bit_rows + 63) / 64;
	let mut matrix = vec![0_u64; stride * bit_rows];

	for (i, &ri) in recoveries.iter().enumerate() {
		let recovery_row = blocks[ri].row as usize - k;

		if recovery_row == 0 {
			// The all-XOR row expands to identity submatrices across the
			// whole strip.
			let mut pattern = 0x0101_0101_0101_0101_u64;
			for bit in 0..8 {
				matrix[(i * 8 + bit) * stride..][..stride].fill(pattern);
				pattern <<= 1;
			}
		} else {
			let row = gen.row(recovery_row - 1);
			for (word, chunk) in erasures.chunks(8).enumerate() {
				let mut expanded = [0_u64; 8];
				for (column, &erased) in chunk.iter().enumerate() {
					let mut slice = row[erased as usize];
					for w in &mut expanded {
						*w |= (slice as u64) << (8 * column);
						slice = gf.times2(slice);
					}
				}
				for (bit, w) in expanded.iter().enumerate() {
					matrix[(i * 8 + bit) * stride + word] = *w;
				}
			}
		}

		blocks[ri].row = erasures[i];
	}

	(matrix, stride)
}
