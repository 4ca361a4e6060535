//! Bit-matrix Gaussian elimination and back-substitution.
//!
//! Payload sub-blocks mirror the matrix rows: bit-row `p` is sub-block
//! `p % 8` of the recovery block at index `p / 8`, so every matrix row
//! operation has a payload twin. A pivot swap that moves only one of the
//! two silently corrupts the output.
//!
//! The plain forms do the payload XOR alongside each matrix update. The
//! windowed forms split the work: a pivot pass fixes the matrix while
//! leaving the bits at and below each pivot in place, then a deferred pass
//! walks the columns in strips of 8 and uses the 4-bit window tables to
//! batch the payload XORs, clearing each diagonal 8x8 block triangle by
//! triangle as it goes. The last three columns of either direction are too
//! narrow to win from windowing and finish in plain form.

use log::trace;

use crate::errors::*;
use crate::xor;

use super::util::{disjoint_pair_mut, pair_mut, xor_sub_within};
use super::window::{WindowScratch, WINDOW_THRESHOLD};
use super::Block;

/// Solve the assembled system in place: after this, recovery payloads hold
/// the erased originals.
pub(crate) fn solve(
	blocks: &mut [Block<'_>],
	recoveries: &[usize],
	matrix: &mut [u64],
	stride: usize,
	sub: usize,
) -> Result<()> {
	if recoveries.len() > WINDOW_THRESHOLD {
		let mut scratch = WindowScratch::new(sub);
		win_forward_elimination(blocks, recoveries, matrix, stride, sub, &mut scratch)?;
		win_back_substitution(blocks, recoveries, matrix, stride, sub, &mut scratch);
	} else {
		forward_elimination(blocks, recoveries, matrix, stride, sub)?;
		back_substitution(blocks, recoveries, matrix, stride, sub);
	}
	Ok(())
}

/// XOR payload sub-block `src_bit` into sub-block `dst_bit`.
fn payload_xor(blocks: &mut [Block<'_>], recoveries: &[usize], dst_bit: usize, src_bit: usize, sub: usize) {
	let (dst_block, dst_off) = (dst_bit >> 3, (dst_bit & 7) * sub);
	let (src_block, src_off) = (src_bit >> 3, (src_bit & 7) * sub);

	if dst_block == src_block {
		let data = &mut *blocks[recoveries[dst_block]].data;
		let (dst, src) = disjoint_pair_mut(data, dst_off, src_off, sub);
		xor::xor_into(dst, src);
	} else {
		let (dst, src) = pair_mut(blocks, recoveries[dst_block], recoveries[src_block]);
		xor::xor_into(&mut dst.data[dst_off..dst_off + sub], &src.data[src_off..src_off + sub]);
	}
}

/// Swap payload sub-blocks `a_bit` and `b_bit`.
fn payload_swap(blocks: &mut [Block<'_>], recoveries: &[usize], a_bit: usize, b_bit: usize, sub: usize) {
	let (a_block, a_off) = (a_bit >> 3, (a_bit & 7) * sub);
	let (b_block, b_off) = (b_bit >> 3, (b_bit & 7) * sub);

	if a_block == b_block {
		let data = &mut *blocks[recoveries[a_block]].data;
		let (a, b) = disjoint_pair_mut(data, a_off, b_off, sub);
		xor::swap(a, b);
	} else {
		let (a, b) = pair_mut(blocks, recoveries[a_block], recoveries[b_block]);
		xor::swap(&mut a.data[a_off..a_off + sub], &mut b.data[b_off..b_off + sub]);
	}
}

/// Mutable views of two distinct matrix rows, in argument order.
fn row_pair_mut(matrix: &mut [u64], stride: usize, a: usize, b: usize) -> (&mut [u64], &mut [u64]) {
	debug_assert_ne!(a, b);
	if a < b {
		let (head, tail) = matrix.split_at_mut(b * stride);
		(&mut head[a * stride..][..stride], &mut tail[..stride])
	} else {
		let (head, tail) = matrix.split_at_mut(a * stride);
		(&mut tail[..stride], &mut head[b * stride..][..stride])
	}
}

/// Locate the first row at or below `pivot` with the pivot bit set.
fn find_pivot(matrix: &[u64], stride: usize, pivot: usize, bit_rows: usize) -> Result<usize> {
	let pivot_word = pivot >> 6;
	let mask = 1_u64 << (pivot & 63);
	(pivot..bit_rows)
		.find(|&row| matrix[row * stride + pivot_word] & mask != 0)
		.ok_or(Error::SingularMatrix)
}

/// The solved system needs every diagonal bit; a missing final one means
/// the input rows were dependent.
fn check_final_pivot(matrix: &[u64], stride: usize, bit_rows: usize) -> Result<()> {
	let last = bit_rows - 1;
	if matrix[last * stride + (last >> 6)] & (1_u64 << (last & 63)) == 0 {
		return Err(Error::SingularMatrix);
	}
	Ok(())
}

fn forward_elimination(
	blocks: &mut [Block<'_>],
	recoveries: &[usize],
	matrix: &mut [u64],
	stride: usize,
	sub: usize,
) -> Result<()> {
	let bit_rows = recoveries.len() * 8;

	for pivot in 0..bit_rows - 1 {
		let pivot_word = pivot >> 6;
		let mask = 1_u64 << (pivot & 63);

		let found = find_pivot(matrix, stride, pivot, bit_rows)?;
		if found != pivot {
			trace!("pivot {} found in row {}", pivot, found);
			// Everything left of the pivot word is already zero in both
			// rows; swap the remainder, and the matching payloads.
			let (pivot_row, found_row) = row_pair_mut(matrix, stride, pivot, found);
			pivot_row[pivot_word..].swap_with_slice(&mut found_row[pivot_word..]);
			payload_swap(blocks, recoveries, pivot, found, sub);
		}

		for row in pivot + 1..bit_rows {
			if matrix[row * stride + pivot_word] & mask != 0 {
				let (pivot_row, other_row) = row_pair_mut(matrix, stride, pivot, row);
				for word in pivot_word..stride {
					other_row[word] ^= pivot_row[word];
				}
				payload_xor(blocks, recoveries, row, pivot, sub);
			}
		}
	}

	check_final_pivot(matrix, stride, bit_rows)
}

fn back_substitution(
	blocks: &mut [Block<'_>],
	recoveries: &[usize],
	matrix: &[u64],
	stride: usize,
	sub: usize,
) {
	let bit_rows = recoveries.len() * 8;

	for pivot in (1..bit_rows).rev() {
		let pivot_word = pivot >> 6;
		let mask = 1_u64 << (pivot & 63);

		for row in (0..pivot).rev() {
			if matrix[row * stride + pivot_word] & mask != 0 {
				payload_xor(blocks, recoveries, row, pivot, sub);
			}
		}
	}
}

/// Pivot pass of the windowed elimination. Payload XORs are deferred, so
/// row elimination must leave the bits at and below each pivot in place
/// inside the pivot word: those are exactly the window indices the
/// deferred pass reads. Row swaps consequently move whole rows.
fn win_forward_elimination(
	blocks: &mut [Block<'_>],
	recoveries: &[usize],
	matrix: &mut [u64],
	stride: usize,
	sub: usize,
	scratch: &mut WindowScratch,
) -> Result<()> {
	let rows = recoveries.len();
	let bit_rows = rows * 8;

	for pivot in 0..bit_rows - 1 {
		let pivot_word = pivot >> 6;
		let mask = 1_u64 << (pivot & 63);

		let found = find_pivot(matrix, stride, pivot, bit_rows)?;
		if found != pivot {
			trace!("pivot {} found in row {}", pivot, found);
			let (pivot_row, found_row) = row_pair_mut(matrix, stride, pivot, found);
			pivot_row.swap_with_slice(found_row);
			payload_swap(blocks, recoveries, pivot, found, sub);
		}

		// Bits strictly above the pivot within its word.
		let above = !(mask - 1) ^ mask;
		for row in pivot + 1..bit_rows {
			if matrix[row * stride + pivot_word] & mask != 0 {
				let (pivot_row, other_row) = row_pair_mut(matrix, stride, pivot, row);
				other_row[pivot_word] ^= pivot_row[pivot_word] & above;
				for word in pivot_word + 1..stride {
					other_row[word] ^= pivot_row[word];
				}
			}
		}
	}
	check_final_pivot(matrix, stride, bit_rows)?;

	// Deferred payload pass over all but the last three columns.
	for x in 0..rows - 3 {
		let word = x >> 3;
		let mut row = x * 8 + 1;
		let mut shift = (x & 7) * 8;

		for half in 0..2 {
			let data = &mut *blocks[recoveries[x]].data;

			if half == 1 {
				// Lower-left quadrant of the diagonal 8x8 block: fold the
				// low-half combinations into the high sub-blocks.
				for i in 0..4 {
					let nibble = ((matrix[row * stride + word] >> shift) & 15) as u8;
					row += 1;
					if nibble != 0 {
						scratch.xor_entry_into_sub(0, nibble, data, 4 + i);
					}
				}
				row -= 3;
				shift += 4;
			}

			// Clear this half's triangle below the diagonal.
			let base = half * 4;
			let nibble = (matrix[row * stride + word] >> shift) as u8 & 15;
			row += 1;
			if nibble & 1 != 0 {
				xor_sub_within(data, base + 1, base, sub);
			}
			let nibble = (matrix[row * stride + word] >> shift) as u8 & 15;
			row += 1;
			if nibble & 1 != 0 {
				xor_sub_within(data, base + 2, base, sub);
			}
			if nibble & 2 != 0 {
				xor_sub_within(data, base + 2, base + 1, sub);
			}
			let nibble = (matrix[row * stride + word] >> shift) as u8 & 15;
			row += 1;
			if nibble & 1 != 0 {
				xor_sub_within(data, base + 3, base, sub);
			}
			if nibble & 2 != 0 {
				xor_sub_within(data, base + 3, base + 1, sub);
			}
			if nibble & 4 != 0 {
				xor_sub_within(data, base + 3, base + 2, sub);
			}

			scratch.fill(half, &data[base * sub..][..4 * sub]);
		}
		shift -= 4;

		// Batch-apply column x to every row strip below it.
		for y in x + 1..rows {
			let (src, dst) = pair_mut(blocks, recoveries[x], recoveries[y]);
			for jj in 0..8 {
				let slice = (matrix[row * stride + word] >> shift) as u8;
				row += 1;
				scratch.apply(&mut dst.data[jj * sub..][..sub], slice & 15, slice >> 4, &*src.data);
			}
		}
	}

	// The last three columns go without windowing.
	for pivot in (rows - 3) * 8..bit_rows - 1 {
		let pivot_word = pivot >> 6;
		let mask = 1_u64 << (pivot & 63);
		for row in pivot + 1..bit_rows {
			if matrix[row * stride + pivot_word] & mask != 0 {
				payload_xor(blocks, recoveries, row, pivot, sub);
			}
		}
	}

	Ok(())
}

/// Windowed mirror of [`back_substitution`], walking columns right to left.
/// The matrix is read-only here; only payloads move.
fn win_back_substitution(
	blocks: &mut [Block<'_>],
	recoveries: &[usize],
	matrix: &[u64],
	stride: usize,
	sub: usize,
	scratch: &mut WindowScratch,
) {
	let rows = recoveries.len();

	for x in (3..rows).rev() {
		let word = x >> 3;
		let mut row = x * 8 + 7;
		let mut shift = (x & 7) * 8 + 4;

		for half_pass in 0..2 {
			let data = &mut *blocks[recoveries[x]].data;

			if half_pass == 1 {
				// Upper-right quadrant: fold the high-half combinations
				// into the low sub-blocks.
				for i in (0..4).rev() {
					row -= 1;
					let nibble = ((matrix[row * stride + word] >> shift) & 15) as u8;
					if nibble != 0 {
						scratch.xor_entry_into_sub(1, nibble, data, i);
					}
				}
				row += 3;
				shift -= 4;
			}

			// Clear this half's triangle above the diagonal.
			let base = if half_pass == 0 { 4 } else { 0 };
			row -= 1;
			let nibble = (matrix[row * stride + word] >> shift) as u8 & 15;
			if nibble & 8 != 0 {
				xor_sub_within(data, base + 2, base + 3, sub);
			}
			row -= 1;
			let nibble = (matrix[row * stride + word] >> shift) as u8 & 15;
			if nibble & 8 != 0 {
				xor_sub_within(data, base + 1, base + 3, sub);
			}
			if nibble & 4 != 0 {
				xor_sub_within(data, base + 1, base + 2, sub);
			}
			row -= 1;
			let nibble = (matrix[row * stride + word] >> shift) as u8 & 15;
			if nibble & 8 != 0 {
				xor_sub_within(data, base, base + 3, sub);
			}
			if nibble & 4 != 0 {
				xor_sub_within(data, base, base + 2, sub);
			}
			if nibble & 2 != 0 {
				xor_sub_within(data, base, base + 1, sub);
			}

			// High sub-blocks refresh the high tables and vice versa,
			// regardless of pass order.
			scratch.fill(if half_pass == 0 { 1 } else { 0 }, &data[base * sub..][..4 * sub]);
		}

		// Batch-apply column x to every row strip above it.
		for y in (0..x).rev() {
			let (src, dst) = pair_mut(blocks, recoveries[x], recoveries[y]);
			for jj in 0..8 {
				row -= 1;
				let slice = (matrix[row * stride + word] >> shift) as u8;
				scratch.apply(&mut dst.data[(7 - jj) * sub..][..sub], slice & 15, slice >> 4, &*src.data);
			}
		}
	}

	// First three columns finish in plain form.
	for pivot in (1..3 * 8).rev() {
		let pivot_word = pivot >> 6;
		let mask = 1_u64 << (pivot & 63);
		for row in (0..pivot).rev() {
			if matrix[row * stride + pivot_word] & mask != 0 {
				payload_xor(blocks, recoveries, row, pivot, sub);
			}
		}
	}
}
