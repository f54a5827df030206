use crate::pir_internals::{
    branch_opt_util,
    error::CuckooPirError,
    params::HASH_DIGEST_BYTE_LEN,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use turboshake::TurboShake128;

/// Digest family backing the cuckoo hash functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashFamily {
    Sha3_256,
    TurboShake128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashFamilyConfig {
    pub hash_family: HashFamily,
    pub seed: Vec<u8>,
}

/// Configuration supplied once to a database builder, before any insertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuckooHashingParams {
    pub num_buckets: u32,
    pub num_hash_functions: u32,
    pub hash_family_config: HashFamilyConfig,
}

impl CuckooHashingParams {
    pub fn validate(&self) -> Result<(), CuckooPirError> {
        if branch_opt_util::unlikely(self.num_buckets == 0) {
            return Err(CuckooPirError::InvalidNumBuckets);
        }
        if branch_opt_util::unlikely(self.num_hash_functions == 0) {
            return Err(CuckooPirError::InvalidNumHashFunctions);
        }

        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CuckooPirError> {
        bincode::serialize(&self).map_err(|err| CuckooPirError::FailedToSerializeParamsToBytes(err.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<CuckooHashingParams, CuckooPirError> {
        bincode::deserialize(bytes).map_err(|err| CuckooPirError::FailedToDeserializeParamsFromBytes(err.to_string()))
    }
}

/// A deterministic, seed-derived family of independent hash functions, each mapping an
/// arbitrary byte string to a bucket index in `[0, num_buckets)`.
///
/// Function `i` is domain-separated from its siblings by absorbing the little-endian
/// index between the seed and the input. No process-global randomness is involved, so
/// two hashers derived from equal configurations agree on every digest — the property
/// that makes placement reproducible across cloned builders.
#[derive(Clone, Debug)]
pub struct CuckooHasher {
    hash_family: HashFamily,
    seed: Vec<u8>,
    num_hash_functions: u32,
}

impl CuckooHasher {
    pub fn new(config: &HashFamilyConfig, num_hash_functions: u32) -> CuckooHasher {
        CuckooHasher {
            hash_family: config.hash_family,
            seed: config.seed.clone(),
            num_hash_functions,
        }
    }

    #[inline(always)]
    pub const fn num_hash_functions(&self) -> u32 {
        self.num_hash_functions
    }

    fn hash_to_u64(&self, hash_index: u32, input: &[u8]) -> u64 {
        let mut digest_bytes = [0u8; HASH_DIGEST_BYTE_LEN];

        match self.hash_family {
            HashFamily::Sha3_256 => {
                let mut hasher = Sha3_256::new();
                hasher.update(&self.seed);
                hasher.update(hash_index.to_le_bytes());
                hasher.update(input);

                digest_bytes.copy_from_slice(&hasher.finalize()[..HASH_DIGEST_BYTE_LEN]);
            }
            HashFamily::TurboShake128 => {
                let mut hasher = TurboShake128::default();
                hasher.absorb(&self.seed);
                hasher.absorb(&hash_index.to_le_bytes());
                hasher.absorb(input);
                hasher.finalize::<{ TurboShake128::DEFAULT_DOMAIN_SEPARATOR }>();

                hasher.squeeze(&mut digest_bytes);
            }
        }

        u64::from_le_bytes(digest_bytes)
    }

    /// Maps `input` to a bucket index under hash function `hash_index`, using the
    /// multiply-shift reduction, which spreads a 64-bit digest uniformly over
    /// `[0, num_buckets)` without modulo bias.
    pub fn hash_to_bucket(&self, hash_index: u32, input: &[u8], num_buckets: u32) -> u32 {
        let hash = self.hash_to_u64(hash_index, input);
        (((hash as u128) * (num_buckets as u128)) >> 64) as u32
    }

    /// Computes all candidate bucket indices for a key, one per hash function.
    pub fn bucket_indices(&self, key: &[u8], num_buckets: u32) -> Vec<u32> {
        (0..self.num_hash_functions).map(|hash_index| self.hash_to_bucket(hash_index, key, num_buckets)).collect()
    }
}
