//! Shared helpers for exercising the cauchy-256 codec: deterministic
//! randomness, a pregenerated payload blob, survivor-set selection and a
//! generic round-trip driver.

use std::error;
use std::result;

use rand::prelude::*;

/// Fixed seed so failures reproduce across runs and machines.
pub static SMALL_RNG_SEED: [u8; 32] = [
	12, 87, 0xA6, 3, 41, 27, 9, 190, 74, 0b101, 0x3C, 88, 31, 145, 2, 66, 9, 9, 120, 14, 200, 55, 7, 81,
	33, 196, 0xEE, 5, 18, 61, 222, 170,
];

/// Pseudo-random payload bytes, generated once by `build.rs`.
pub const BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/rand_data.bin"));

/// Pick `k` surviving row ids out of the `k + m` encoded stream, uniformly.
pub fn random_survivors<G: Rng>(rng: &mut G, k: usize, m: usize) -> Vec<u8> {
	let mut ids = rand::seq::index::sample(rng, k + m, k).into_iter().map(|i| i as u8).collect::<Vec<u8>>();
	ids.shuffle(rng);
	ids
}

/// Deterministic pattern in the spirit of dropping from both ends: erase
/// the leading originals first, fill in from the recovery rows.
pub fn burst_survivors(k: usize, m: usize) -> Vec<u8> {
	let erased = m.min(k);
	(erased..k).chain(k..k + erased).map(|i| i as u8).collect()
}

/// Encode `k` blocks carved from `payload`, keep exactly the blocks named
/// by `survivors` (in that order), decode, and assert every recovered
/// payload is byte-identical to its original.
///
/// `encode` receives the data blocks and the recovery output region;
/// `decode` receives `(payload, row id)` pairs and must rewrite recovery
/// payloads and row ids in place.
pub fn roundtrip_with<E, Enc, Dec>(
	encode: Enc,
	decode: Dec,
	k: usize,
	m: usize,
	block_bytes: usize,
	payload: &[u8],
	survivors: &[u8],
) -> result::Result<(), E>
where
	E: error::Error + Send + Sync + 'static,
	Enc: Fn(&[&[u8]], &mut [u8]) -> result::Result<(), E>,
	Dec: Fn(&mut [(Vec<u8>, u8)]) -> result::Result<(), E>,
{
	assert!(payload.len() >= k * block_bytes, "payload too short for {} blocks of {}", k, block_bytes);
	assert_eq!(survivors.len(), k, "a decoder input is exactly k blocks");

	let data: Vec<&[u8]> = payload.chunks(block_bytes).take(k).collect();

	let mut recovery = vec![0_u8; m * block_bytes];
	encode(&data, &mut recovery)?;

	let mut received: Vec<(Vec<u8>, u8)> = survivors
		.iter()
		.map(|&row| {
			let bytes = if (row as usize) < k {
				data[row as usize].to_vec()
			} else {
				recovery[(row as usize - k) * block_bytes..][..block_bytes].to_vec()
			};
			(bytes, row)
		})
		.collect();

	decode(&mut received)?;

	for (bytes, row) in &received {
		assert_eq!(
			bytes.as_slice(),
			data[*row as usize],
			"decoded block for row {} must match the original",
			row
		);
	}
	Ok(())
}
