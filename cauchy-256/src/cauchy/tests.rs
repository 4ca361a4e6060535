use super::*;

use assert_matches::assert_matches;
use itertools::Itertools;
use rand::prelude::*;
use rand::rngs::SmallRng;

use cauchy_tester::{random_survivors, roundtrip_with, BYTES, SMALL_RNG_SEED};

use crate::field;
use crate::{decode, encode, Block, Error};

use super::bitslice::apply_slice;
use super::matrix::generator;

/// Encode, keep exactly `survivors`, decode, compare against the originals.
fn roundtrip(k: usize, m: usize, block_bytes: usize, survivors: &[u8]) {
	roundtrip_with(
		|data, recovery| encode(k, m, data, recovery, block_bytes),
		|received| {
			let mut blocks: Vec<Block> = received
				.iter_mut()
				.map(|(bytes, row)| Block { data: bytes.as_mut_slice(), row: *row })
				.collect();
			decode(k, m, &mut blocks, block_bytes)?;
			let rows: Vec<u8> = blocks.iter().map(|b| b.row).collect();
			drop(blocks);
			for (slot, row) in received.iter_mut().zip(rows) {
				slot.1 = row;
			}
			Ok(())
		},
		k,
		m,
		block_bytes,
		&BYTES[..k * block_bytes],
		survivors,
	)
	.unwrap()
}

/// Every way of keeping `k` of the `k + m` blocks must recover everything.
fn all_erasure_patterns(k: usize, m: usize, block_bytes: usize) {
	for survivors in (0..(k + m) as u8).combinations(k) {
		roundtrip(k, m, block_bytes, &survivors);
	}
}

macro_rules! exhaustive {
	($name:ident: k: $k:literal, m: $m:literal) => {
		#[test]
		fn $name() {
			all_erasure_patterns($k, $m, 8);
		}
	};
}

exhaustive!(all_patterns_k1_m1: k: 1, m: 1);
exhaustive!(all_patterns_k1_m5: k: 1, m: 5);
exhaustive!(all_patterns_k2_m2: k: 2, m: 2);
exhaustive!(all_patterns_k3_m2: k: 3, m: 2);
exhaustive!(all_patterns_k2_m3: k: 2, m: 3);
exhaustive!(all_patterns_k4_m4: k: 4, m: 4);
exhaustive!(all_patterns_k5_m4: k: 5, m: 4);
exhaustive!(all_patterns_k5_m5: k: 5, m: 5);
exhaustive!(all_patterns_k6_m6: k: 6, m: 6);
// m >= 7 leaves the precomputed tables for the generated matrix path.
exhaustive!(all_patterns_k3_m7: k: 3, m: 7);
exhaustive!(all_patterns_k5_m8: k: 5, m: 8);

#[test]
fn larger_block_sizes_roundtrip() {
	let mut rng = SmallRng::from_seed(SMALL_RNG_SEED);
	for block_bytes in [8, 16, 24, 64, 1304] {
		for (k, m) in [(2, 2), (5, 5), (11, 3)] {
			let survivors = random_survivors(&mut rng, k, m);
			roundtrip(k, m, block_bytes, &survivors);
		}
	}
}

// Concrete end-to-end scenarios with pinned payloads.

#[test]
fn erase_both_originals_of_two() {
	let d0: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
	let d1: [u8; 8] = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];

	let mut recovery = [0_u8; 16];
	encode(2, 2, &[&d0, &d1], &mut recovery, 8).unwrap();

	let mut expected_r0 = [0_u8; 8];
	for (e, (a, b)) in expected_r0.iter_mut().zip(d0.iter().zip(&d1)) {
		*e = a ^ b;
	}
	assert_eq!(&recovery[..8], &expected_r0);

	let (r0, r1) = recovery.split_at_mut(8);
	let mut blocks = [Block { data: r0, row: 2 }, Block { data: r1, row: 3 }];
	decode(2, 2, &mut blocks, 8).unwrap();

	let recovered: Vec<(u8, &[u8])> = blocks.iter().map(|b| (b.row, &*b.data)).collect();
	assert!(recovered.contains(&(0, &d0[..])));
	assert!(recovered.contains(&(1, &d1[..])));
}

#[test]
fn single_recovery_row_restores_middle_block() {
	let d0 = [0x00_u8; 8];
	let d1 = [0xFF_u8; 8];
	let d2 = [0xAA_u8; 8];

	let mut recovery = [0_u8; 8];
	encode(3, 1, &[&d0, &d1, &d2], &mut recovery, 8).unwrap();
	assert_eq!(recovery, [0x55; 8]);

	let mut b0 = d0;
	let mut b2 = d2;
	let mut blocks = [
		Block { data: &mut b0, row: 0 },
		Block { data: &mut recovery, row: 3 },
		Block { data: &mut b2, row: 2 },
	];
	decode(3, 1, &mut blocks, 8).unwrap();

	assert_eq!(blocks[1].row, 1);
	assert_eq!(blocks[1].data, &d1);
	assert_eq!(blocks[0].data, &d0);
	assert_eq!(blocks[2].data, &d2);
}

#[test]
fn single_data_block_replicates() {
	let d0: [u8; 16] = *b"erasure coding!!";
	let mut recovery = [0_u8; 5 * 16];
	encode(1, 5, &[&d0], &mut recovery, 16).unwrap();
	for copy in recovery.chunks_exact(16) {
		assert_eq!(copy, &d0);
	}

	// Any single survivor decodes to row 0 unchanged.
	let mut r3 = [0_u8; 16];
	r3.copy_from_slice(&recovery[3 * 16..][..16]);
	let mut blocks = [Block { data: &mut r3, row: 4 }];
	decode(1, 5, &mut blocks, 16).unwrap();
	assert_eq!(blocks[0].row, 0);
	assert_eq!(blocks[0].data, &d0);
}

#[test]
fn mixed_survivors_arbitrary_order() {
	// k = 4, m = 2, originals 1 and 3 erased, input deliberately shuffled.
	roundtrip(4, 2, 8, &[4, 0, 5, 2]);
	roundtrip(4, 2, 8, &[2, 5, 0, 4]);
	roundtrip(4, 2, 8, &[0, 2, 4, 5]);
}

#[test]
fn hundred_random_patterns_k29_m14() {
	let mut rng = SmallRng::from_seed(SMALL_RNG_SEED);
	for _ in 0..100 {
		let survivors = random_survivors(&mut rng, 29, 14);
		roundtrip(29, 14, 24, &survivors);
	}
}

#[test]
fn stress_k200_m50_erases_50_originals() {
	// Heap-allocated generator plus the windowed elimination and solver.
	let survivors: Vec<u8> = (50..250).map(|i| i as u8).collect();
	roundtrip(200, 50, 64, &survivors);
}

#[test]
fn burst_erasures_recover() {
	// Leading originals lost, recovery blocks fill in from the front.
	for (k, m) in [(10, 4), (16, 16), (40, 10)] {
		roundtrip(k, m, 16, &cauchy_tester::burst_survivors(k, m));
	}
}

#[test]
fn decode_with_no_erasures_is_identity() {
	let survivors: Vec<u8> = (0..7_u8).collect();
	roundtrip(7, 3, 16, &survivors);
}

// Algebraic properties.

#[test]
fn first_recovery_block_is_xor_of_data() {
	for k in [2_usize, 3, 10, 40] {
		let block_bytes = 16;
		let data: Vec<&[u8]> = BYTES.chunks(block_bytes).take(k).collect();
		let mut recovery = vec![0_u8; 4 * block_bytes];
		encode(k, 4, &data, &mut recovery, block_bytes).unwrap();

		let mut expected = vec![0_u8; block_bytes];
		for block in &data {
			for (e, b) in expected.iter_mut().zip(*block) {
				*e ^= b;
			}
		}
		assert_eq!(&recovery[..block_bytes], &expected);
	}
}

#[test]
fn encoder_is_linear_in_the_payload() {
	let (k, m, block_bytes) = (5, 6, 24);
	let len = k * block_bytes;
	let p = &BYTES[..len];
	let q = &BYTES[len..2 * len];
	let pq: Vec<u8> = p.iter().zip(q).map(|(a, b)| a ^ b).collect();

	let run = |payload: &[u8]| {
		let data: Vec<&[u8]> = payload.chunks(block_bytes).collect();
		let mut recovery = vec![0_u8; m * block_bytes];
		encode(k, m, &data, &mut recovery, block_bytes).unwrap();
		recovery
	};

	let (rp, rq, rpq) = (run(p), run(q), run(&pq));
	let folded: Vec<u8> = rp.iter().zip(&rq).map(|(a, b)| a ^ b).collect();
	itertools::assert_equal(folded, rpq);
}

#[test]
fn decode_is_input_order_independent() {
	let (k, m, block_bytes) = (6, 5, 16);
	let mut rng = SmallRng::from_seed(SMALL_RNG_SEED);
	let mut survivors = random_survivors(&mut rng, k, m);
	for _ in 0..6 {
		survivors.shuffle(&mut rng);
		roundtrip(k, m, block_bytes, &survivors);
	}
}

#[test]
fn repeated_encodes_are_deterministic() {
	let data: Vec<&[u8]> = BYTES.chunks(8).take(12).collect();
	let mut first = vec![0_u8; 6 * 8];
	let mut second = vec![0_u8; 6 * 8];
	encode(12, 6, &data, &mut first, 8).unwrap();
	encode(12, 6, &data, &mut second, 8).unwrap();
	assert_eq!(first, second);
}

#[test]
fn windowed_encoder_matches_bitslice_reference() {
	// The unwindowed expansion is the correctness reference for the m > 4
	// window path.
	let (k, m, block_bytes) = (5, 7, 32);
	let sub = block_bytes / 8;
	let data: Vec<&[u8]> = BYTES.chunks(block_bytes).take(k).collect();

	let mut recovery = vec![0_u8; m * block_bytes];
	encode(k, m, &data, &mut recovery, block_bytes).unwrap();

	let gf = field::tables();
	let gen = generator(k, m);
	let mut reference = vec![0_u8; m * block_bytes];
	let (first, rest) = reference.split_at_mut(block_bytes);
	for block in &data {
		for (e, b) in first.iter_mut().zip(*block) {
			*e ^= b;
		}
	}
	for y in 1..m {
		let row = gen.row(y - 1);
		let out = &mut rest[(y - 1) * block_bytes..][..block_bytes];
		for x in 0..k {
			apply_slice(gf, row[x], data[x], out, sub);
		}
	}

	itertools::assert_equal(recovery, reference);
}

// Rejection paths. Caller buffers must be untouched on every failure.

#[test]
fn rejects_invalid_parameters() {
	let d0 = [0_u8; 8];
	let sentinel = [0xCD_u8; 16];
	let mut recovery = sentinel;

	assert_matches!(encode(0, 2, &[], &mut recovery, 8), Err(Error::BlockCountTooLow));
	assert_matches!(encode(1, 0, &[&d0], &mut recovery, 8), Err(Error::RecoveryCountTooLow));
	assert_matches!(encode(255, 2, &[&d0], &mut recovery, 8), Err(Error::TooManyBlocks(257)));
	assert_matches!(encode(1, 2, &[&d0], &mut recovery, 12), Err(Error::InvalidBlockSize(12)));
	assert_matches!(encode(1, 2, &[&d0], &mut recovery, 0), Err(Error::InvalidBlockSize(0)));
	assert_matches!(
		encode(2, 2, &[&d0], &mut recovery, 8),
		Err(Error::WrongBlockCount { expected: 2, got: 1 })
	);
	assert_matches!(
		encode(1, 1, &[&d0], &mut recovery, 8),
		Err(Error::BufferSizeMismatch { expected: 8, got: 16 })
	);
	assert_eq!(recovery, sentinel, "failed encode must not write output");
}

#[test]
fn rejects_bad_block_descriptors() {
	let sentinel: [u8; 8] = *b"sentinel";

	let mut a = sentinel;
	let mut b = sentinel;
	let mut blocks = [Block { data: &mut a, row: 0 }, Block { data: &mut b, row: 4 }];
	assert_matches!(decode(2, 2, &mut blocks, 8), Err(Error::RowIdOutOfRange(4)));

	let mut a = sentinel;
	let mut b = sentinel;
	let mut blocks = [Block { data: &mut a, row: 1 }, Block { data: &mut b, row: 1 }];
	assert_matches!(decode(2, 2, &mut blocks, 8), Err(Error::DuplicateRowId(1)));

	let mut a = sentinel;
	let mut blocks = [Block { data: &mut a, row: 0 }];
	assert_matches!(decode(2, 2, &mut blocks, 8), Err(Error::WrongBlockCount { expected: 2, got: 1 }));

	let mut a = sentinel;
	let mut short = [0_u8; 4];
	let mut blocks = [Block { data: &mut a, row: 0 }, Block { data: &mut short, row: 1 }];
	assert_matches!(
		decode(2, 2, &mut blocks, 8),
		Err(Error::BufferSizeMismatch { expected: 8, got: 4 })
	);

	assert_eq!(a, sentinel, "failed decode must not write payloads");
}

#[test]
fn m1_decode_without_recovery_block_is_a_no_op() {
	let mut a: [u8; 8] = *b"aaaaaaaa";
	let mut b: [u8; 8] = *b"bbbbbbbb";
	let mut blocks = [Block { data: &mut a, row: 1 }, Block { data: &mut b, row: 0 }];
	decode(2, 1, &mut blocks, 8).unwrap();
	assert_eq!(blocks[0].data, b"aaaaaaaa");
	assert_eq!(blocks[0].row, 1);
	assert_eq!(blocks[1].data, b"bbbbbbbb");
}
