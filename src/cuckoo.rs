use crate::{
    dense::{DenseDatabase, DenseDatabaseBuilder, PirDatabaseBuilder},
    pir_internals::{
        block::Block,
        branch_opt_util,
        error::CuckooPirError,
        hashing::{CuckooHasher, CuckooHashingParams},
        params::MAX_DISPLACEMENTS_PER_INSERTION,
    },
};
use std::collections::HashMap;

/// Builder lifecycle: mutable accumulation until the one successful `build`, then terminal.
///
/// Pending pairs keep their first-insertion order — placement walks them in order, so
/// two builders holding equal pending sets and params place identically.
#[derive(Clone)]
enum BuilderState {
    Unbuilt {
        pending: Vec<(Vec<u8>, Vec<u8>)>,
        pending_slot_of: HashMap<Vec<u8>, usize>,
    },
    Built,
}

/// Accumulates key-value pairs and places them into a fixed-size bucket array via
/// cuckoo hashing with bounded eviction, finalizing into a [`CuckooHashedDatabase`].
///
/// Keys and values need not be of uniform length; at build time both are zero-padded
/// to their respective maximum lengths and fed, bucket by bucket, into two pluggable
/// [`PirDatabaseBuilder`]s — one for keys, one for values. Empty buckets contribute
/// all-zero rows, so the finalized databases hold exactly `num_buckets` uniform slots.
pub struct CuckooHashedDatabaseBuilder {
    params: CuckooHashingParams,
    key_db_builder: Box<dyn PirDatabaseBuilder>,
    value_db_builder: Box<dyn PirDatabaseBuilder>,
    state: BuilderState,
}

impl Clone for CuckooHashedDatabaseBuilder {
    /// Deep-copies pending pairs, params, sub-builders and the lifecycle flag. A clone
    /// taken before building places identically to its source (same seed, same
    /// insertion order); a clone taken after a successful build inherits the terminal
    /// state and can no longer build.
    fn clone(&self) -> CuckooHashedDatabaseBuilder {
        CuckooHashedDatabaseBuilder {
            params: self.params.clone(),
            key_db_builder: self.key_db_builder.clone_box(),
            value_db_builder: self.value_db_builder.clone_box(),
            state: self.state.clone(),
        }
    }
}

impl CuckooHashedDatabaseBuilder {
    pub fn new(params: CuckooHashingParams) -> CuckooHashedDatabaseBuilder {
        CuckooHashedDatabaseBuilder {
            params,
            key_db_builder: Box::new(DenseDatabaseBuilder::new()),
            value_db_builder: Box::new(DenseDatabaseBuilder::new()),
            state: BuilderState::Unbuilt {
                pending: Vec::new(),
                pending_slot_of: HashMap::new(),
            },
        }
    }

    /// Substitutes the sub-builder receiving the per-bucket key rows. Substituting
    /// after a successful `build` has no effect on the already-built result.
    pub fn set_key_database_builder(&mut self, builder: Box<dyn PirDatabaseBuilder>) -> &mut CuckooHashedDatabaseBuilder {
        self.key_db_builder = builder;
        self
    }

    /// Substitutes the sub-builder receiving the per-bucket value rows.
    pub fn set_value_database_builder(&mut self, builder: Box<dyn PirDatabaseBuilder>) -> &mut CuckooHashedDatabaseBuilder {
        self.value_db_builder = builder;
        self
    }

    /// Records a key-value pair for placement at build time.
    ///
    /// Fails on an empty key, leaving no partial state behind. Re-inserting a pending
    /// key overwrites its value (last write wins). Fails on a builder that has already
    /// built its database.
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<(), CuckooPirError> {
        let BuilderState::Unbuilt { pending, pending_slot_of } = &mut self.state else {
            return Err(CuckooPirError::DatabaseAlreadyBuilt);
        };

        let key = key.into();
        if branch_opt_util::unlikely(key.is_empty()) {
            return Err(CuckooPirError::EmptyKey);
        }
        let value = value.into();

        match pending_slot_of.get(&key) {
            Some(&pending_idx) => pending[pending_idx].1 = value,
            None => {
                pending_slot_of.insert(key.clone(), pending.len());
                pending.push((key, value));
            }
        }

        Ok(())
    }

    /// Places every pending pair and finalizes the key and value databases.
    ///
    /// Placement probes each key's candidate buckets in hash-function order and takes
    /// the first empty one. When every candidate is occupied, the occupant of candidate
    /// `displacement_count % num_hash_functions` is evicted — a deterministic
    /// round-robin that cycles through candidate positions as the chain grows — and the
    /// displaced pair is re-placed the same way, in an explicit loop bounded by
    /// [`MAX_DISPLACEMENTS_PER_INSERTION`] steps. Exceeding the bound fails the build.
    ///
    /// Build is all-or-nothing: on any failure the builder stays `Unbuilt` with its
    /// pending pairs intact; on success it flips to the terminal built state, and every
    /// further `build` — on this builder or on a clone carrying the flag — fails with a
    /// precondition error without mutating state.
    pub fn build(&mut self) -> Result<CuckooHashedDatabase, CuckooPirError> {
        let BuilderState::Unbuilt { pending, .. } = &self.state else {
            return Err(CuckooPirError::DatabaseAlreadyBuilt);
        };

        self.params.validate()?;

        let num_buckets = self.params.num_buckets;
        let hasher = CuckooHasher::new(&self.params.hash_family_config, self.params.num_hash_functions);

        // Buckets hold indices into `pending`, so eviction chains shuffle fixed-width
        // indices instead of owned byte strings.
        let mut buckets: Vec<Option<usize>> = vec![None; num_buckets as usize];
        for pending_idx in 0..pending.len() {
            Self::place(&hasher, &mut buckets, pending, pending_idx, num_buckets)?;
        }

        let max_key_byte_len = pending.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        let max_value_byte_len = pending.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

        let mut size = 0;
        for bucket in &buckets {
            let mut key_row = vec![0u8; max_key_byte_len];
            let mut value_row = vec![0u8; max_value_byte_len];

            if let Some(pending_idx) = bucket {
                let (key, value) = &pending[*pending_idx];
                key_row[..key.len()].copy_from_slice(key);
                value_row[..value.len()].copy_from_slice(value);

                size += 1;
            }

            self.key_db_builder.insert(key_row);
            self.value_db_builder.insert(value_row);
        }

        let key_db = self.key_db_builder.build()?;
        let value_db = self.value_db_builder.build()?;

        if branch_opt_util::unlikely(key_db.num_selection_bits() != value_db.num_selection_bits()) {
            return Err(CuckooPirError::UnequalBucketCountInKeyAndValueDatabases);
        }

        self.state = BuilderState::Built;

        Ok(CuckooHashedDatabase { key_db, value_db, size })
    }

    fn place(
        hasher: &CuckooHasher,
        buckets: &mut [Option<usize>],
        pending: &[(Vec<u8>, Vec<u8>)],
        pending_idx: usize,
        num_buckets: u32,
    ) -> Result<(), CuckooPirError> {
        let mut displaced_idx = pending_idx;

        for displacement_count in 0..MAX_DISPLACEMENTS_PER_INSERTION {
            let candidates = hasher.bucket_indices(&pending[displaced_idx].0, num_buckets);

            if let Some(&empty_bucket) = candidates.iter().find(|&&bucket_idx| buckets[bucket_idx as usize].is_none()) {
                buckets[empty_bucket as usize] = Some(displaced_idx);
                return Ok(());
            }

            let victim_bucket = candidates[displacement_count % candidates.len()] as usize;
            let evicted = buckets[victim_bucket].replace(displaced_idx);

            // Every candidate was occupied, so the victim bucket held an occupant.
            displaced_idx = unsafe { evicted.unwrap_unchecked() };
        }

        branch_opt_util::cold();
        Err(CuckooPirError::ExhaustedDisplacementsDuringInsertion(MAX_DISPLACEMENTS_PER_INSERTION))
    }
}

/// The finalized, immutable cuckoo-hashed database: two bucket-aligned dense databases,
/// one of zero-padded keys and one of zero-padded values.
///
/// Safe to query concurrently without locking — nothing is mutated after `build`.
#[derive(Debug)]
pub struct CuckooHashedDatabase {
    key_db: DenseDatabase,
    value_db: DenseDatabase,
    size: usize,
}

impl CuckooHashedDatabase {
    /// Number of non-empty buckets, recorded at build time.
    #[inline(always)]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of selection bits per query, i.e. the bucket count.
    #[inline(always)]
    pub const fn num_selection_bits(&self) -> usize {
        self.key_db.num_selection_bits()
    }

    /// Runs the same packed selection vectors against the key and value databases and
    /// pairs same-index results into `(key_bytes, value_bytes)`, propagating any error
    /// from either delegate. A one-hot vector recovers the pair stored in the selected
    /// bucket, zero-padded to the fixed key/ value widths.
    pub fn inner_product_with(&self, selection_vectors: &[Vec<Block>]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CuckooPirError> {
        let keys = self.key_db.inner_product_with(selection_vectors)?;
        let values = self.value_db.inner_product_with(selection_vectors)?;

        Ok(keys.into_iter().zip(values).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pir_internals::hashing::{HashFamily, HashFamilyConfig};
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use std::{cell::Cell, rc::Rc};
    use test_case::test_case;

    const NUM_DATABASE_ELEMENTS: usize = 1234;
    const NUM_BUCKETS: u32 = (1.5 * NUM_DATABASE_ELEMENTS as f64) as u32;
    const NUM_HASH_FUNCTIONS: u32 = 3;
    const DATABASE_ELEMENT_BYTE_LEN: usize = 80;

    fn params(num_buckets: u32, num_hash_functions: u32) -> CuckooHashingParams {
        CuckooHashingParams {
            num_buckets,
            num_hash_functions,
            hash_family_config: HashFamilyConfig {
                hash_family: HashFamily::Sha3_256,
                seed: b"A seed".to_vec(),
            },
        }
    }

    fn insert_elements(builder: &mut CuckooHashedDatabaseBuilder) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
        let mut rng = ChaCha8Rng::from_os_rng();

        let keys = (0..NUM_DATABASE_ELEMENTS).map(|key_idx| format!("Key {}", key_idx).into_bytes()).collect::<Vec<Vec<u8>>>();
        let values = (0..NUM_DATABASE_ELEMENTS)
            .map(|_| {
                let mut value = vec![0u8; DATABASE_ELEMENT_BYTE_LEN];
                rng.fill_bytes(&mut value);
                value
            })
            .collect::<Vec<Vec<u8>>>();

        for (key, value) in keys.iter().zip(&values) {
            builder.insert(key.clone(), value.clone()).expect("Insertion must be recorded");
        }

        (keys, values)
    }

    /// Wraps a real dense builder while counting trait calls, so tests can observe how
    /// the composing builder drives its injected sub-builders.
    struct RecordingDatabaseBuilder {
        inner: DenseDatabaseBuilder,
        num_inserts: Rc<Cell<usize>>,
        num_builds: Rc<Cell<usize>>,
        num_clones: Rc<Cell<usize>>,
    }

    impl RecordingDatabaseBuilder {
        fn new() -> (RecordingDatabaseBuilder, Rc<Cell<usize>>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
            let num_inserts = Rc::new(Cell::new(0));
            let num_builds = Rc::new(Cell::new(0));
            let num_clones = Rc::new(Cell::new(0));

            let builder = RecordingDatabaseBuilder {
                inner: DenseDatabaseBuilder::new(),
                num_inserts: num_inserts.clone(),
                num_builds: num_builds.clone(),
                num_clones: num_clones.clone(),
            };

            (builder, num_inserts, num_builds, num_clones)
        }
    }

    impl PirDatabaseBuilder for RecordingDatabaseBuilder {
        fn insert(&mut self, element: Vec<u8>) {
            self.num_inserts.set(self.num_inserts.get() + 1);
            self.inner.insert(element);
        }

        fn build(&mut self) -> Result<DenseDatabase, CuckooPirError> {
            self.num_builds.set(self.num_builds.get() + 1);
            self.inner.build()
        }

        fn clone_box(&self) -> Box<dyn PirDatabaseBuilder> {
            self.num_clones.set(self.num_clones.get() + 1);

            Box::new(RecordingDatabaseBuilder {
                inner: self.inner.clone(),
                num_inserts: self.num_inserts.clone(),
                num_builds: self.num_builds.clone(),
                num_clones: self.num_clones.clone(),
            })
        }
    }

    #[test_case(0, 1 => matches Err(CuckooPirError::InvalidNumBuckets); "Build fails if number of buckets is zero")]
    #[test_case(1, 0 => matches Err(CuckooPirError::InvalidNumHashFunctions); "Build fails if number of hash functions is zero")]
    #[test_case(1, 1 => matches Ok(_); "Build passes for minimal valid params")]
    fn params_are_validated_at_build_time(num_buckets: u32, num_hash_functions: u32) -> Result<CuckooHashedDatabase, CuckooPirError> {
        CuckooHashedDatabaseBuilder::new(params(num_buckets, num_hash_functions)).build()
    }

    #[test]
    fn builds_empty_database() {
        let database = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS))
            .build()
            .expect("Empty database must build");

        assert_eq!(database.size(), 0);
        assert_eq!(database.num_selection_bits(), NUM_BUCKETS as usize);
    }

    #[test]
    fn fails_to_insert_empty_key() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));

        let result = builder.insert("", "Value");
        assert_eq!(result, Err(CuckooPirError::EmptyKey));
        assert!(CuckooPirError::EmptyKey.to_string().contains("empty"));

        // The failed insertion left nothing behind.
        assert_eq!(builder.build().expect("Build must pass").size(), 0);
    }

    #[test]
    fn inserts_one_element_correctly() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        builder.insert("Key 1", "Value 1").expect("Insertion must be recorded");

        assert_eq!(builder.build().expect("Build must pass").size(), 1);
    }

    #[test]
    fn inserts_one_element_with_empty_value_correctly() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        builder.insert("Key 1", "").expect("Insertion must be recorded");

        assert_eq!(builder.build().expect("Build must pass").size(), 1);
    }

    #[test]
    fn last_write_wins_for_duplicate_keys() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        builder.insert("Key 1", "Value 1").expect("Insertion must be recorded");
        builder.insert("Key 1", "Value 2").expect("Insertion must be recorded");

        let database = builder.build().expect("Build must pass");
        assert_eq!(database.size(), 1);

        // With a single occupied bucket, the all-ones aggregate is that bucket's pair.
        let selection = Block::pack_selection_bits(&vec![true; database.num_selection_bits()]);
        let results = database.inner_product_with(&[selection]).expect("Inner product must succeed");

        assert_eq!(results[0].0, b"Key 1");
        assert_eq!(results[0].1, b"Value 2");
    }

    #[test]
    fn uses_key_database_builder_correctly() {
        let (recording_builder, num_inserts, num_builds, _) = RecordingDatabaseBuilder::new();

        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        builder.insert("Key 1", "Value 1").expect("Insertion must be recorded");
        builder.set_key_database_builder(Box::new(recording_builder));

        assert_eq!(builder.build().expect("Build must pass").size(), 1);
        assert_eq!(num_inserts.get(), NUM_BUCKETS as usize);
        assert_eq!(num_builds.get(), 1);
    }

    #[test]
    fn uses_value_database_builder_correctly() {
        let (recording_builder, num_inserts, num_builds, _) = RecordingDatabaseBuilder::new();

        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        builder.insert("Key 1", "Value 1").expect("Insertion must be recorded");
        builder.set_value_database_builder(Box::new(recording_builder));

        assert_eq!(builder.build().expect("Build must pass").size(), 1);
        assert_eq!(num_inserts.get(), NUM_BUCKETS as usize);
        assert_eq!(num_builds.get(), 1);
    }

    #[test]
    fn cloning_the_builder_clones_both_sub_builders() {
        let (recording_key_builder, _, _, num_key_clones) = RecordingDatabaseBuilder::new();
        let (recording_value_builder, _, _, num_value_clones) = RecordingDatabaseBuilder::new();

        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        builder
            .set_key_database_builder(Box::new(recording_key_builder))
            .set_value_database_builder(Box::new(recording_value_builder));

        assert!(builder.clone().build().is_ok());
        assert_eq!(num_key_clones.get(), 1);
        assert_eq!(num_value_clones.get(), 1);
    }

    #[test]
    fn fails_to_build_database_twice() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        builder.insert("Key 1", "Value 1").expect("Insertion must be recorded");

        assert!(builder.build().is_ok());
        assert_eq!(builder.build().unwrap_err(), CuckooPirError::DatabaseAlreadyBuilt);
        assert!(CuckooPirError::DatabaseAlreadyBuilt.to_string().contains("already built"));

        // A clone taken after building inherits the terminal state, even with fresh
        // sub-builders substituted in.
        builder
            .set_key_database_builder(Box::new(DenseDatabaseBuilder::new()))
            .set_value_database_builder(Box::new(DenseDatabaseBuilder::new()));
        assert_eq!(builder.clone().build().unwrap_err(), CuckooPirError::DatabaseAlreadyBuilt);

        // Inserting into a built builder is rejected as well.
        assert_eq!(builder.insert("Key 2", "Value 2").unwrap_err(), CuckooPirError::DatabaseAlreadyBuilt);
    }

    #[test]
    fn inserts_many_elements_correctly() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        insert_elements(&mut builder);

        assert_eq!(builder.build().expect("Build must pass").size(), NUM_DATABASE_ELEMENTS);
    }

    #[test]
    fn overfilling_the_bucket_array_fails_with_placement_error() {
        // Nine pairs into four buckets cannot fit, no matter the eviction chain.
        let mut builder = CuckooHashedDatabaseBuilder::new(params(4, 2));
        for key_idx in 0..9usize {
            builder.insert(format!("Key {}", key_idx), "Value").expect("Insertion must be recorded");
        }

        assert_eq!(
            builder.build().unwrap_err(),
            CuckooPirError::ExhaustedDisplacementsDuringInsertion(MAX_DISPLACEMENTS_PER_INSERTION)
        );

        // The failed build left the builder unbuilt and its pending pairs intact.
        assert_eq!(builder.insert("Key 0", "Value"), Ok(()));
    }

    #[test]
    fn computes_inner_product_correctly() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        let (keys, values) = insert_elements(&mut builder);
        let database = builder.build().expect("Build must pass");

        let selection = Block::pack_selection_bits(&vec![true; database.num_selection_bits()]);
        let results = database.inner_product_with(&[selection]).expect("Inner product must succeed");

        let max_key_byte_len = keys.iter().map(|key| key.len()).max().unwrap();
        let expected_key_xor = keys.iter().fold(vec![0u8; max_key_byte_len], |mut acc, key| {
            acc.iter_mut().zip(key).for_each(|(acc_byte, &key_byte)| *acc_byte ^= key_byte);
            acc
        });
        let expected_value_xor = values.iter().fold(vec![0u8; DATABASE_ELEMENT_BYTE_LEN], |mut acc, value| {
            acc.iter_mut().zip(value).for_each(|(acc_byte, &value_byte)| *acc_byte ^= value_byte);
            acc
        });

        assert_eq!(results, [(expected_key_xor, expected_value_xor)]);
    }

    #[test]
    fn inner_product_from_cloned_builder_is_the_same() {
        let mut builder = CuckooHashedDatabaseBuilder::new(params(NUM_BUCKETS, NUM_HASH_FUNCTIONS));
        insert_elements(&mut builder);

        let mut cloned_builder = builder.clone();
        let database1 = builder.build().expect("Build must pass");
        let database2 = cloned_builder.build().expect("Build must pass");

        let mut rng = ChaCha8Rng::from_os_rng();
        let random_bits = (0..NUM_BUCKETS).map(|_| rng.random::<bool>()).collect::<Vec<bool>>();
        let selection = Block::pack_selection_bits(&random_bits);

        let inner_product1 = database1.inner_product_with(&[selection.clone()]).expect("Inner product must succeed");
        let inner_product2 = database2.inner_product_with(&[selection]).expect("Inner product must succeed");

        assert_eq!(inner_product1, inner_product2);
    }
}
