//! Cuckoo-hashed key-value database engine for DPF-based **P**rivate **I**nformation **R**etrieval (PIR).
//!
//! This crate provides the server-side storage engine of a two-server PIR scheme built on Distributed Point Functions (DPF).
//! Arbitrary-length key-value pairs are placed into a fixed-size bucket array via cuckoo hashing with bounded eviction, then
//! stored as two bucket-aligned dense block arrays — one of keys, one of values. A query supplies packed selection bit-vectors
//! and receives one XOR-aggregate per vector, computed with identical work for every bucket: a one-hot vector recovers exactly
//! the selected bucket's pair, while the server's computation pattern reveals nothing about which bit was set.
//!
//! ## Features
//!
//! * **Oblivious retrieval by uniform scanning:** Every bucket contributes the same masked-XOR work to a query, so the
//!   per-bucket computation pattern is independent of the selected index.
//! * **Deterministic, seed-derived hashing:** Placement is purely a function of the configured hash family seed, so cloned
//!   builders produce byte-identical databases and therefore byte-identical query results.
//! * **Pluggable storage sub-builders:** The key and value databases are driven through a builder trait, letting tests and
//!   callers substitute instrumented implementations.
//!
//! ## Usage
//!
//! This crate is a library, designed to be driven by a request-handling layer which carries queries and responses between
//! PIR clients and servers. Add it as a dependency to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! cuckoo_pir = "=0.2.0"
//! ```
//!
//! Then, you can use it in your code:
//!
//! ```rust
//! use cuckoo_pir::{Block, CuckooHasher, CuckooHashingParams, HashFamily, HashFamilyConfig, cuckoo::CuckooHashedDatabaseBuilder};
//!
//! fn main() {
//!     let params = CuckooHashingParams {
//!         num_buckets: 16,
//!         num_hash_functions: 3,
//!         hash_family_config: HashFamilyConfig {
//!             hash_family: HashFamily::Sha3_256,
//!             seed: b"A seed".to_vec(),
//!         },
//!     };
//!
//!     let mut builder = CuckooHashedDatabaseBuilder::new(params.clone());
//!     builder.insert("apple", "red").expect("Insertion failed");
//!     builder.insert("banana", "yellow").expect("Insertion failed");
//!
//!     let database = builder.build().expect("Build failed");
//!     assert_eq!(database.size(), 2);
//!
//!     // "banana" lives in one of its candidate buckets; a one-hot selection vector
//!     // on that bucket recovers the (zero-padded) pair.
//!     let hasher = CuckooHasher::new(&params.hash_family_config, params.num_hash_functions);
//!
//!     let mut found = false;
//!     for bucket_idx in hasher.bucket_indices(b"banana", params.num_buckets) {
//!         let mut bits = vec![false; database.num_selection_bits()];
//!         bits[bucket_idx as usize] = true;
//!
//!         let results = database.inner_product_with(&[Block::pack_selection_bits(&bits)]).expect("Query failed");
//!         let (key, value) = &results[0];
//!
//!         if key.as_slice() == b"banana" {
//!             assert_eq!(value.as_slice(), b"yellow");
//!             found = true;
//!         }
//!     }
//!     assert!(found);
//! }
//! ```
//!
//! ## Modules
//!
//! * `cuckoo`: Contains the `CuckooHashedDatabaseBuilder` for placing key-value pairs into buckets, and the finalized,
//!   immutable `CuckooHashedDatabase` answering inner-product queries.
//! * `dense`: Contains the flat block-array `DenseDatabase` sub-engine and the `PirDatabaseBuilder` trait.
//! * `value_type`: Validation and encoding/ decoding of the tagged wire values exchanged with the surrounding DPF layer.

pub use pir_internals::block::Block;
pub use pir_internals::error::CuckooPirError;
pub use pir_internals::hashing::{CuckooHasher, CuckooHashingParams, HashFamily, HashFamilyConfig};
pub use pir_internals::value_type;

pub mod cuckoo;
pub mod dense;

mod pir_internals;

mod test_pir;
