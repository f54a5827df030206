use crate::pir_internals::{
    branch_opt_util,
    error::CuckooPirError,
    params::{BLOCK_BIT_LEN, BLOCK_BYTE_LEN},
    value_type::{EncodedValue, IntegerValue},
};
use std::ops::{BitAnd, BitXor, BitXorAssign};

/// A 128-bit algebraic block, forming a commutative group under XOR.
///
/// Blocks serve two roles: packed selection bit-vectors supplied by the DPF layer,
/// and the fixed-width storage/aggregation unit of the dense databases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Block(u128);

impl Block {
    pub const ZERO: Block = Block(0);
    pub const BYTE_LEN: usize = BLOCK_BYTE_LEN;
    pub const BIT_LEN: usize = BLOCK_BIT_LEN;

    #[inline(always)]
    pub const fn new(value: u128) -> Block {
        Block(value)
    }

    #[inline(always)]
    pub const fn to_u128(self) -> u128 {
        self.0
    }

    /// Builds a block from up to [`Block::BYTE_LEN`] little-endian bytes, zero-padding the rest.
    /// Slices longer than one block are truncated.
    #[inline]
    pub fn from_padded_le_bytes(bytes: &[u8]) -> Block {
        let mut buf = [0u8; BLOCK_BYTE_LEN];
        let readable_num_bytes = bytes.len().min(BLOCK_BYTE_LEN);
        buf[..readable_num_bytes].copy_from_slice(&bytes[..readable_num_bytes]);

        Block(u128::from_le_bytes(buf))
    }

    #[inline(always)]
    pub const fn to_le_bytes(self) -> [u8; BLOCK_BYTE_LEN] {
        self.0.to_le_bytes()
    }

    /// Returns the all-ones block if `bit` is set, else the all-zeros block.
    ///
    /// Selecting a bucket by ANDing with this mask costs the same whether or not
    /// the bit is set, which keeps the per-bucket work of a scan uniform.
    #[inline(always)]
    pub const fn broadcast(bit: bool) -> Block {
        Block(0u128.wrapping_sub(bit as u128))
    }

    /// Reads bit `index` of a packed selection vector, LSB first within each block.
    #[inline(always)]
    pub const fn bit(self, index: usize) -> bool {
        debug_assert!(index < BLOCK_BIT_LEN);
        (self.0 >> index) & 1 == 1
    }

    /// Packs selection bits into blocks: bit `i` lands in block `i / 128` at bit position `i % 128`.
    pub fn pack_selection_bits(bits: &[bool]) -> Vec<Block> {
        let mut packed = vec![Block::ZERO; bits.len().div_ceil(BLOCK_BIT_LEN)];

        for (bit_idx, &bit) in bits.iter().enumerate() {
            packed[bit_idx / BLOCK_BIT_LEN].0 |= (bit as u128) << (bit_idx % BLOCK_BIT_LEN);
        }

        packed
    }

    /// Encodes this block as a tagged integer value, split into high/ low 64-bit halves.
    pub const fn to_value(self) -> EncodedValue {
        EncodedValue::Integer(IntegerValue::ValueUint128 {
            high: (self.0 >> 64) as u64,
            low: self.0 as u64,
        })
    }

    /// Recovers a block from a tagged integer value; narrower payloads zero-extend.
    pub fn try_from_value(value: &EncodedValue) -> Result<Block, CuckooPirError> {
        match value {
            EncodedValue::Integer(IntegerValue::ValueUint128 { high, low }) => Ok(Block(((*high as u128) << 64) | (*low as u128))),
            EncodedValue::Integer(IntegerValue::ValueUint64(v)) => Ok(Block(*v as u128)),
            EncodedValue::Tuple(_) => {
                branch_opt_util::cold();
                Err(CuckooPirError::ValueNotAnInteger)
            }
        }
    }
}

impl BitXor for Block {
    type Output = Block;

    #[inline(always)]
    fn bitxor(self, rhs: Block) -> Block {
        Block(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    #[inline(always)]
    fn bitxor_assign(&mut self, rhs: Block) {
        self.0 ^= rhs.0;
    }
}

impl BitAnd for Block {
    type Output = Block;

    #[inline(always)]
    fn bitand(self, rhs: Block) -> Block {
        Block(self.0 & rhs.0)
    }
}
