use rand::RngCore;
use uuid::{Builder, Uuid};

/// Supplies fresh entity UUIDs. Injected so callers can swap in a
/// deterministic source.
pub trait UuidSource {
    fn next_uuid(&mut self) -> Uuid;
}

/// Random version-4 UUIDs drawn from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomUuids<R> {
    rng: R,
}

impl<R: RngCore> RandomUuids<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomUuids<rand::rngs::ThreadRng> {
    pub fn from_thread_rng() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl<R: RngCore> UuidSource for RandomUuids<R> {
    fn next_uuid(&mut self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Splits a UUID into the signed most/least significant halves stored in
/// `UUIDMost` / `UUIDLeast`.
pub fn uuid_to_halves(uuid: Uuid) -> (i64, i64) {
    let (most, least) = uuid.as_u64_pair();
    (most as i64, least as i64)
}

pub fn uuid_from_halves(most: i64, least: i64) -> Uuid {
    Uuid::from_u64_pair(most as u64, least as u64)
}
