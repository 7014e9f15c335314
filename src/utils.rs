use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

pub fn new_fast_hashmap<K, V>(cap: usize) -> ahash::HashMap<K, V> {
    ahash::HashMap::with_capacity_and_hasher(cap, ahash::RandomState::default())
}

pub fn new_fast_hashset<K>(cap: usize) -> ahash::HashSet<K> {
    ahash::HashSet::with_capacity_and_hasher(cap, ahash::RandomState::default())
}

/// Milliseconds since the Unix epoch. Used for `ClientState::lastActive` and the
/// heartbeat scheduler's staleness check, not for anything requiring wall-clock precision.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

/// A uniformly-random 6-digit hex color with a leading `#`, assigned to every fresh session.
pub fn random_color() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "#{:02x}{:02x}{:02x}",
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen::<u8>()
    )
}

const CLIENT_ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates `client-<epochMillis>-<9 base36 chars>` for connections that don't supply
/// their own `clientId` query parameter.
pub fn generate_client_id() -> Arc<str> {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CLIENT_ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    Arc::from(format!("client-{}-{}", epoch_millis(), suffix))
}
