pub const BLOCK_BYTE_LEN: usize = 16;
pub const BLOCK_BIT_LEN: usize = BLOCK_BYTE_LEN * 8;
pub const HASH_DIGEST_BYTE_LEN: usize = 8;
pub const MAX_DISPLACEMENTS_PER_INSERTION: usize = 500;
