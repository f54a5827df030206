#![cfg(test)]

use crate::{
    Block, CuckooHasher, CuckooHashingParams, HashFamily, HashFamilyConfig,
    cuckoo::{CuckooHashedDatabase, CuckooHashedDatabaseBuilder},
};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const NUM_DATABASE_ELEMENTS: usize = 1234;
const NUM_BUCKETS: u32 = (1.5 * NUM_DATABASE_ELEMENTS as f64) as u32;
const NUM_HASH_FUNCTIONS: u32 = 3;
const DATABASE_ELEMENT_BYTE_LEN: usize = 80;

fn params(hash_family: HashFamily) -> CuckooHashingParams {
    CuckooHashingParams {
        num_buckets: NUM_BUCKETS,
        num_hash_functions: NUM_HASH_FUNCTIONS,
        hash_family_config: HashFamilyConfig {
            hash_family,
            seed: b"A seed".to_vec(),
        },
    }
}

fn generate_counting_kv_database(num_kv_pairs: usize) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
    let mut rng = ChaCha8Rng::from_os_rng();

    let keys = (0..num_kv_pairs).map(|key_idx| format!("Key {}", key_idx).into_bytes()).collect::<Vec<Vec<u8>>>();
    let values = (0..num_kv_pairs)
        .map(|_| {
            let mut value = vec![0u8; DATABASE_ELEMENT_BYTE_LEN];
            rng.fill_bytes(&mut value);
            value
        })
        .collect::<Vec<Vec<u8>>>();

    (keys, values)
}

fn trim_zero_padding(bytes: &[u8]) -> &[u8] {
    let trimmed_len = bytes.len() - bytes.iter().rev().take_while(|&&byte| byte == 0).count();
    &bytes[..trimmed_len]
}

/// Probes each candidate bucket of `key` with a one-hot selection vector and returns
/// the stored pair of the bucket whose (trimmed) key matches — the lookup a PIR client
/// performs obliviously through the DPF layer.
fn lookup(database: &CuckooHashedDatabase, hasher: &CuckooHasher, key: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    for bucket_idx in hasher.bucket_indices(key, NUM_BUCKETS) {
        let mut bits = vec![false; database.num_selection_bits()];
        bits[bucket_idx as usize] = true;

        let mut results = database.inner_product_with(&[Block::pack_selection_bits(&bits)]).expect("One-hot query must succeed");
        let (recovered_key, recovered_value) = results.pop().expect("One query in, one result out");

        if trim_zero_padding(&recovered_key) == key {
            return Some((recovered_key, recovered_value));
        }
    }

    None
}

fn keyword_retrieval_with(hash_family: HashFamily) {
    let (keys, values) = generate_counting_kv_database(NUM_DATABASE_ELEMENTS);

    let mut builder = CuckooHashedDatabaseBuilder::new(params(hash_family));
    for (key, value) in keys.iter().zip(&values) {
        builder.insert(key.clone(), value.clone()).expect("Insertion must be recorded");
    }

    let database = builder.build().expect("Build must pass");
    assert_eq!(database.size(), NUM_DATABASE_ELEMENTS);
    assert_eq!(database.num_selection_bits(), NUM_BUCKETS as usize);

    let hasher = CuckooHasher::new(&params(hash_family).hash_family_config, NUM_HASH_FUNCTIONS);

    // The pair behind "Key 7", padding trimmed off the recovered key. Values occupy
    // the full fixed width here, so they come back exactly as inserted.
    let (recovered_key, recovered_value) = lookup(&database, &hasher, b"Key 7").expect("\"Key 7\" must be retrievable");
    assert_eq!(trim_zero_padding(&recovered_key), b"Key 7");
    assert_eq!(recovered_value, values[7]);

    for (key, value) in keys.iter().zip(&values).step_by(100) {
        let (_, recovered_value) = lookup(&database, &hasher, key).expect("Every inserted key must be retrievable");
        assert_eq!(&recovered_value, value);
    }
}

#[test]
fn keyword_retrieval_with_sha3_256_hash_family() {
    keyword_retrieval_with(HashFamily::Sha3_256);
}

#[test]
fn keyword_retrieval_with_turboshake128_hash_family() {
    keyword_retrieval_with(HashFamily::TurboShake128);
}

#[test]
fn batched_queries_aggregate_independently() {
    let (keys, values) = generate_counting_kv_database(NUM_DATABASE_ELEMENTS);

    let mut builder = CuckooHashedDatabaseBuilder::new(params(HashFamily::Sha3_256));
    for (key, value) in keys.iter().zip(&values) {
        builder.insert(key.clone(), value.clone()).expect("Insertion must be recorded");
    }
    let database = builder.build().expect("Build must pass");

    let hasher = CuckooHasher::new(&params(HashFamily::Sha3_256).hash_family_config, NUM_HASH_FUNCTIONS);

    // One one-hot vector per candidate bucket of several keys, evaluated in one call.
    let probed_keys: [&[u8]; 3] = [b"Key 0", b"Key 617", b"Key 1233"];
    let selections = probed_keys
        .iter()
        .flat_map(|key| hasher.bucket_indices(key, NUM_BUCKETS))
        .map(|bucket_idx| {
            let mut bits = vec![false; database.num_selection_bits()];
            bits[bucket_idx as usize] = true;
            Block::pack_selection_bits(&bits)
        })
        .collect::<Vec<Vec<Block>>>();

    let results = database.inner_product_with(&selections).expect("Batched query must succeed");
    assert_eq!(results.len(), probed_keys.len() * NUM_HASH_FUNCTIONS as usize);

    for (probe_idx, &key) in probed_keys.iter().enumerate() {
        let candidates = &results[probe_idx * NUM_HASH_FUNCTIONS as usize..(probe_idx + 1) * NUM_HASH_FUNCTIONS as usize];
        assert!(candidates.iter().any(|(recovered_key, _)| trim_zero_padding(recovered_key) == key));
    }
}

#[test]
fn cloned_builders_build_identically_behaving_databases() {
    let (keys, values) = generate_counting_kv_database(NUM_DATABASE_ELEMENTS);

    let mut builder = CuckooHashedDatabaseBuilder::new(params(HashFamily::TurboShake128));
    for (key, value) in keys.iter().zip(&values) {
        builder.insert(key.clone(), value.clone()).expect("Insertion must be recorded");
    }

    let mut cloned_builder = builder.clone();
    let database1 = builder.build().expect("Build must pass");
    let database2 = cloned_builder.build().expect("Build must pass");

    let mut rng = ChaCha8Rng::from_os_rng();
    let selections = (0..16)
        .map(|_| {
            let bits = (0..NUM_BUCKETS).map(|_| rng.random::<bool>()).collect::<Vec<bool>>();
            Block::pack_selection_bits(&bits)
        })
        .collect::<Vec<Vec<Block>>>();

    let inner_products1 = database1.inner_product_with(&selections).expect("Inner product must succeed");
    let inner_products2 = database2.inner_product_with(&selections).expect("Inner product must succeed");

    assert_eq!(inner_products1, inner_products2);
}
