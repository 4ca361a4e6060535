//! Generator matrix provider.
//!
//! The conceptual generator is `m x k`: an implicit all-ones first row (the
//! bulk-XOR recovery block) above `m - 1` stored rows. Entries come from the
//! normalized Cauchy form `G[y][x] = X_x / (X_x ^ Y_y)` over two disjoint
//! element sequences, with `X_0 = 1` and `Y_0 = 0` implicit. Normalizing by
//! the column element keeps every square submatrix of the stacked
//! `[identity; G]` system invertible while making row zero identically one.
//!
//! For `m` in `2..=6` the widest possible matrix (`k = 256 - m`) is built
//! once and shared; larger `m` builds an exact `(m-1) x k` matrix per call.

use std::borrow::Cow;

use static_init::dynamic;

use crate::field::{self, INV_TABLE};

const PRECOMP_MIN_M: usize = 2;
const PRECOMP_MAX_M: usize = 6;

#[dynamic(lazy)]
static SMALL_MATRICES: [Box<[u8]>; 5] = [
	build_rows(256 - 2, 2).into_boxed_slice(),
	build_rows(256 - 3, 3).into_boxed_slice(),
	build_rows(256 - 4, 4).into_boxed_slice(),
	build_rows(256 - 5, 5).into_boxed_slice(),
	build_rows(256 - 6, 6).into_boxed_slice(),
];

/// `X[j]`, the column sequence. Walks down from 255 so it stays disjoint
/// from `Y[]` and the implicit `{0, 1}` whenever `k + m <= 256`.
#[inline]
const fn cauchy_x(idx: usize) -> u8 {
	255 - idx as u8
}

/// `Y[i]`, the row sequence. Walks up from 2.
#[inline]
const fn cauchy_y(idx: usize) -> u8 {
	idx as u8 + 2
}

/// The stored `(m-1) x k` rows of a generator, either a shared precomputed
/// table (whose stride then exceeds `k`) or a heap matrix with stride `k`.
pub(crate) struct Generator {
	cells: Cow<'static, [u8]>,
	stride: usize,
}

impl Generator {
	/// Stored row `y` (`0..m-1`); the element for original column `x` is
	/// `row[x]`.
	#[inline]
	pub(crate) fn row(&self, y: usize) -> &[u8] {
		&self.cells[y * self.stride..][..self.stride]
	}
}

/// Generator for a given geometry. Callers have already validated
/// `2 <= m`, `2 <= k`, `k + m <= 256`.
pub(crate) fn generator(k: usize, m: usize) -> Generator {
	debug_assert!(k >= 2 && m >= 2 && k + m <= 256);

	if (PRECOMP_MIN_M..=PRECOMP_MAX_M).contains(&m) {
		Generator { cells: Cow::Borrowed(&SMALL_MATRICES[m - PRECOMP_MIN_M]), stride: 256 - m }
	} else {
		Generator { cells: Cow::Owned(build_rows(k, m)), stride: k }
	}
}

fn build_rows(k: usize, m: usize) -> Vec<u8> {
	let gf = field::tables();
	let mut cells = Vec::with_capacity(k * (m - 1));

	for y in 1..m {
		let g = cauchy_y(y - 1);

		// Column zero uses the implicit X_0 = 1.
		cells.push(INV_TABLE[(1 ^ g) as usize]);
		for x in 1..k {
			let b = cauchy_x(x - 1);
			cells.push(gf.div(b, b ^ g));
		}
	}

	cells
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn sequences_stay_disjoint_at_the_limit() {
		// Worst case k + m = 256: every X, every Y, 0 and 1 all distinct.
		for (k, m) in [(250, 6), (128, 128), (2, 254), (249, 7)] {
			let mut used = [false; 256];
			used[0] = true;
			used[1] = true;
			for i in 0..m - 1 {
				assert!(!used[cauchy_y(i) as usize], "Y[{}] collides for m={}", i, m);
				used[cauchy_y(i) as usize] = true;
			}
			for j in 0..k - 1 {
				assert!(!used[cauchy_x(j) as usize], "X[{}] collides for k={}", j, k);
				used[cauchy_x(j) as usize] = true;
			}
		}
	}

	#[test]
	fn precomputed_agrees_with_generated() {
		// The shared m <= 6 tables must be plain precomputation, not a
		// different code.
		for m in 2..=6 {
			let cached = generator(100, m);
			let built = Generator { cells: Cow::Owned(build_rows(100, m)), stride: 100 };
			for y in 0..m - 1 {
				assert_eq!(&cached.row(y)[..100], built.row(y));
			}
		}
	}

	#[test]
	fn entries_are_never_zero_or_one() {
		let gen = generator(249, 7);
		for y in 0..6 {
			for &c in &gen.row(y)[..249] {
				assert!(c > 1);
			}
		}
	}

	#[test]
	fn rows_are_pairwise_distinct() {
		let gen = generator(50, 20);
		for a in 0..19 {
			for b in a + 1..19 {
				assert_ne!(gen.row(a)[..50], gen.row(b)[..50]);
			}
		}
	}
}
