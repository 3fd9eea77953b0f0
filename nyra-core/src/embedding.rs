//! Embedding vector helpers.
//!
//! The inference service returns dense vectors from whatever backend is
//! loaded. This module holds the model-free pieces: normalization, cosine
//! similarity for callers ranking memories, and a deterministic hashed
//! embedding used as the zero-dependency backend and in tests.

use crate::keywords::raw_tokens;

// ---------------------------------------------------------------------------
// Vector math
// ---------------------------------------------------------------------------

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude < f32::EPSILON || !magnitude.is_finite() {
        return;
    }
    for x in vector.iter_mut() {
        *x /= magnitude;
    }
}

/// Compute the cosine similarity between two vectors.
///
/// Returns a value in \[-1.0, 1.0\]. Returns `0.0` when the lengths differ
/// or either vector has zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut mag_a = 0.0_f32;
    let mut mag_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

// ---------------------------------------------------------------------------
// Hashed embedding
// ---------------------------------------------------------------------------

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic feature-hashed embedding of `text`.
///
/// Each lowercase token and each character bigram inside a token is hashed
/// into one of `dimensions` buckets with a sign bit, then the vector is
/// L2-normalized. Same text, same vector; texts sharing tokens land close
/// together. Returns an all-zero vector for text with no tokens.
#[must_use]
pub fn hashed_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimensions];
    if dimensions == 0 {
        return vector;
    }

    let mut add = |feature: &str, weight: f32| {
        let hash = fnv1a(feature.as_bytes());
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (hash % dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    };

    for token in raw_tokens(text, usize::MAX) {
        let token = token.to_lowercase();
        add(&token, 1.0);
        let chars: Vec<char> = token.chars().collect();
        for pair in chars.windows(2) {
            let bigram: String = pair.iter().collect();
            add(&bigram, 0.5);
        }
    }

    l2_normalize(&mut vector);
    vector
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
