use std::{error::Error, fmt::Display};

#[derive(Debug, PartialEq)]
pub enum CuckooPirError {
    // Value codec
    NonPositiveBitsize,
    BitsizeTooLarge,
    BitsizeNotPowerOfTwo,
    ValueNotAnInteger,
    ValueNotATuple,
    WrongNumberOfTupleElements,
    ValueTooLargeForType,

    // Cuckoo hashing
    InvalidNumBuckets,
    InvalidNumHashFunctions,
    EmptyKey,
    DatabaseAlreadyBuilt,
    ExhaustedDisplacementsDuringInsertion(usize),
    UnequalBucketCountInKeyAndValueDatabases,
    FailedToSerializeParamsToBytes(String),
    FailedToDeserializeParamsFromBytes(String),

    // Dense database
    InvalidSelectionVectorLength,
}

impl Display for CuckooPirError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveBitsize => write!(f, "`bitsize` must be positive"),
            Self::BitsizeTooLarge => write!(f, "`bitsize` must be less than or equal to 128"),
            Self::BitsizeNotPowerOfTwo => write!(f, "`bitsize` must be a power of 2"),
            Self::ValueNotAnInteger => write!(f, "The given value is not an integer"),
            Self::ValueNotATuple => write!(f, "The given value is not a tuple"),
            Self::WrongNumberOfTupleElements => write!(f, "The given value has the wrong number of tuple elements"),
            Self::ValueTooLargeForType => write!(f, "The given value is too large for the given type"),

            Self::InvalidNumBuckets => write!(f, "`num_buckets` must be greater than zero"),
            Self::InvalidNumHashFunctions => write!(f, "`num_hash_functions` must be greater than zero"),
            Self::EmptyKey => write!(f, "Database keys must not be empty"),
            Self::DatabaseAlreadyBuilt => write!(f, "This database was already built"),
            Self::ExhaustedDisplacementsDuringInsertion(max_num_displacements) => {
                write!(f, "Exhausted '{}' displacements while inserting into cuckoo hash table", max_num_displacements)
            }
            Self::UnequalBucketCountInKeyAndValueDatabases => write!(f, "Key and value databases must hold the same number of buckets"),
            Self::FailedToSerializeParamsToBytes(e) => write!(f, "Cuckoo hashing params serialization failed with: {}", e),
            Self::FailedToDeserializeParamsFromBytes(e) => write!(f, "Cuckoo hashing params deserialization failed with: {}", e),

            Self::InvalidSelectionVectorLength => write!(f, "Each packed selection vector must supply one bit per bucket"),
        }
    }
}

impl Error for CuckooPirError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
