use md5::{Digest, Md5};

/// Deterministically maps an ordered list of object ids to a float in `[0, 100)`.
///
/// The same id sequence always yields the same value, and values are uniformly distributed across
/// varying inputs. The algorithm (MD5 over the comma-joined ids, the digest read as an unsigned
/// big integer, reduced modulo 9999 and scaled) is shared with the remote evaluation service and
/// the engines in other languages; changing any part of it would silently re-bucket every
/// percentage rollout.
pub fn hashed_percentage<S: AsRef<str>>(object_ids: &[S]) -> f64 {
    percentage_with_repetitions(object_ids, 1)
}

fn percentage_with_repetitions<S: AsRef<str>>(object_ids: &[S], repetitions: usize) -> f64 {
    let joined = object_ids
        .iter()
        .map(AsRef::as_ref)
        .cycle()
        .take(object_ids.len() * repetitions)
        .collect::<Vec<_>>()
        .join(",");

    let digest: [u8; 16] = Md5::digest(joined.as_bytes()).into();
    let value = (u128::from_be_bytes(digest) % 9999) as f64 / 9998.0 * 100.0;

    // The modulus boundary maps to exactly 100, which is outside the contract. Re-hash with the
    // id list repeated once more until the value lands inside [0, 100).
    if value == 100.0 {
        percentage_with_repetitions(object_ids, repetitions + 1)
    } else {
        value
    }
}
