use crate::pir_internals::{block::Block, branch_opt_util, error::CuckooPirError, params::BLOCK_BYTE_LEN};
use rayon::prelude::*;

/// Builder capability for the flat databases composed by the cuckoo-hashed builder.
///
/// The cuckoo-hashed builder drives its key and value sub-builders exclusively through
/// this trait, so tests and callers can substitute instrumented or alternative storage
/// implementations. [`DenseDatabaseBuilder`] is the default implementation.
pub trait PirDatabaseBuilder {
    /// Appends one element; element index equals insertion order.
    fn insert(&mut self, element: Vec<u8>);

    /// Finalizes the accumulated elements into an immutable database.
    ///
    /// Building is terminal: a second call fails with a precondition error.
    fn build(&mut self) -> Result<DenseDatabase, CuckooPirError>;

    /// Deep-copies this builder, pending elements and lifecycle state included.
    fn clone_box(&self) -> Box<dyn PirDatabaseBuilder>;
}

/// Accumulates raw byte-string elements for a [`DenseDatabase`].
///
/// Elements may be inserted with differing lengths; at build time every element is
/// zero-padded to the longest inserted length, so all stored slots are uniform size.
#[derive(Clone, Default)]
pub struct DenseDatabaseBuilder {
    elements: Vec<Vec<u8>>,
    built: bool,
}

impl DenseDatabaseBuilder {
    pub fn new() -> DenseDatabaseBuilder {
        DenseDatabaseBuilder::default()
    }
}

impl PirDatabaseBuilder for DenseDatabaseBuilder {
    fn insert(&mut self, element: Vec<u8>) {
        self.elements.push(element);
    }

    fn build(&mut self) -> Result<DenseDatabase, CuckooPirError> {
        if branch_opt_util::unlikely(self.built) {
            return Err(CuckooPirError::DatabaseAlreadyBuilt);
        }

        let elements = std::mem::take(&mut self.elements);

        let num_elements = elements.len();
        let elem_byte_len = elements.iter().map(|element| element.len()).max().unwrap_or(0);
        let blocks_per_elem = elem_byte_len.div_ceil(BLOCK_BYTE_LEN);

        let mut blocks = Vec::with_capacity(num_elements * blocks_per_elem);
        for element in &elements {
            for chunk_idx in 0..blocks_per_elem {
                let begin = (chunk_idx * BLOCK_BYTE_LEN).min(element.len());
                let end = ((chunk_idx + 1) * BLOCK_BYTE_LEN).min(element.len());

                blocks.push(Block::from_padded_le_bytes(&element[begin..end]));
            }
        }

        self.built = true;

        Ok(DenseDatabase {
            num_elements,
            elem_byte_len,
            blocks_per_elem,
            blocks,
        })
    }

    fn clone_box(&self) -> Box<dyn PirDatabaseBuilder> {
        Box::new(self.clone())
    }
}

/// Immutable flat array of fixed-size blocks, one group of blocks per bucket slot.
///
/// This is the storage layout behind the oblivious retrieval primitive: a query
/// aggregates over every slot with identical per-slot work, so the memory access
/// pattern is independent of which selection bits are set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenseDatabase {
    num_elements: usize,
    elem_byte_len: usize,
    blocks_per_elem: usize,
    blocks: Vec<Block>,
}

impl DenseDatabase {
    #[inline(always)]
    pub const fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Number of selection bits a caller must supply per query, i.e. one per slot.
    #[inline(always)]
    pub const fn num_selection_bits(&self) -> usize {
        self.num_elements
    }

    /// Width in bytes of every stored (zero-padded) element, and of every query result.
    #[inline(always)]
    pub const fn elem_byte_len(&self) -> usize {
        self.elem_byte_len
    }

    /// Computes one XOR-aggregate per packed selection vector.
    ///
    /// Each vector must carry exactly `ceil(num_elements / 128)` blocks, one bit per
    /// slot. For each vector, the blocks of every slot are ANDed with a mask broadcast
    /// from the slot's selection bit and folded into the accumulator, touching all
    /// slots uniformly. A one-hot vector therefore recovers exactly the selected
    /// element; the all-ones vector recovers the XOR of all elements. Vectors are
    /// aggregated independently, in parallel.
    ///
    /// Results retain the fixed padded width; truncating a recovered element to its
    /// semantic length is the caller's responsibility.
    pub fn inner_product_with(&self, selection_vectors: &[Vec<Block>]) -> Result<Vec<Vec<u8>>, CuckooPirError> {
        let expected_num_blocks = self.num_elements.div_ceil(Block::BIT_LEN);
        if branch_opt_util::unlikely(selection_vectors.iter().any(|selection| selection.len() != expected_num_blocks)) {
            return Err(CuckooPirError::InvalidSelectionVectorLength);
        }

        let results = selection_vectors
            .par_iter()
            .map(|selection| {
                let mut acc = vec![Block::ZERO; self.blocks_per_elem];

                for elem_idx in 0..self.num_elements {
                    let mask = Block::broadcast(selection[elem_idx / Block::BIT_LEN].bit(elem_idx % Block::BIT_LEN));
                    let elem_blocks_begin_at = elem_idx * self.blocks_per_elem;

                    for (acc_block, &elem_block) in acc.iter_mut().zip(&self.blocks[elem_blocks_begin_at..elem_blocks_begin_at + self.blocks_per_elem]) {
                        *acc_block ^= elem_block & mask;
                    }
                }

                let mut elem_bytes = Vec::with_capacity(self.blocks_per_elem * BLOCK_BYTE_LEN);
                for acc_block in acc {
                    elem_bytes.extend_from_slice(&acc_block.to_le_bytes());
                }
                elem_bytes.truncate(self.elem_byte_len);

                elem_bytes
            })
            .collect();

        Ok(results)
    }
}
