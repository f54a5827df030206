//! Validation, structural comparison and encoding/ decoding of tagged wire values.
//!
//! A [`TypeDescriptor`] declares the shape of a value retrievable from the database:
//! a fixed-width integer of a power-of-two bitsize in `[1, 128]`, or a tuple of such
//! descriptors, nested arbitrarily. [`EncodedValue`] is the matching tagged wire
//! representation, carried over RPC by the surrounding PIR service layer.

use crate::pir_internals::{branch_opt_util, error::CuckooPirError};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDescriptor {
    Integer { bitsize: u32 },
    Tuple { elements: Vec<TypeDescriptor> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegerValue {
    ValueUint64(u64),
    ValueUint128 { high: u64, low: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodedValue {
    Integer(IntegerValue),
    Tuple(Vec<EncodedValue>),
}

/// Native-side counterpart of [`EncodedValue`]. All integer widths are carried as `u128`;
/// the declared [`TypeDescriptor`] bounds the admissible magnitude during decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlainValue {
    Integer(u128),
    Tuple(Vec<PlainValue>),
}

/// Validates a type descriptor and computes its total bit-size.
///
/// Integer descriptors must have a positive, power-of-two bitsize of at most 128.
/// Tuple descriptors validate each element recursively, propagating the first
/// child error, and sum the element bit-sizes.
pub fn validate_type_and_get_bit_size(value_type: &TypeDescriptor) -> Result<u32, CuckooPirError> {
    match value_type {
        TypeDescriptor::Integer { bitsize } => {
            if branch_opt_util::unlikely(*bitsize < 1) {
                return Err(CuckooPirError::NonPositiveBitsize);
            }
            if branch_opt_util::unlikely(*bitsize > 128) {
                return Err(CuckooPirError::BitsizeTooLarge);
            }
            if branch_opt_util::unlikely(!bitsize.is_power_of_two()) {
                return Err(CuckooPirError::BitsizeNotPowerOfTwo);
            }

            Ok(*bitsize)
        }
        TypeDescriptor::Tuple { elements } => {
            let mut bitsize = 0;
            for element in elements {
                bitsize += validate_type_and_get_bit_size(element)?;
            }

            Ok(bitsize)
        }
    }
}

/// Structural equality over type descriptors.
///
/// Integers compare by bitsize; tuples compare element-wise after an arity check,
/// as a full AND reduction over all elements. Any case mismatch compares unequal.
pub fn types_are_equal(lhs: &TypeDescriptor, rhs: &TypeDescriptor) -> bool {
    match (lhs, rhs) {
        (TypeDescriptor::Integer { bitsize: lhs_bitsize }, TypeDescriptor::Integer { bitsize: rhs_bitsize }) => lhs_bitsize == rhs_bitsize,
        (TypeDescriptor::Tuple { elements: lhs_elements }, TypeDescriptor::Tuple { elements: rhs_elements }) if lhs_elements.len() == rhs_elements.len() => {
            lhs_elements.iter().zip(rhs_elements).fold(true, |acc, (l, r)| acc & types_are_equal(l, r))
        }
        _ => false,
    }
}

/// Encodes a native value into its tagged wire representation.
///
/// Integers always encode as a 128-bit payload split into high/ low 64-bit halves;
/// tuples encode element-wise.
pub fn encode(value: &PlainValue) -> EncodedValue {
    match value {
        PlainValue::Integer(v) => EncodedValue::Integer(IntegerValue::ValueUint128 {
            high: (v >> 64) as u64,
            low: *v as u64,
        }),
        PlainValue::Tuple(elements) => EncodedValue::Tuple(elements.iter().map(encode).collect()),
    }
}

/// Decodes a tagged wire value against a target type descriptor.
///
/// Fails when the value's case does not match the target's shape, when a tuple
/// arity differs, or when a decoded integer magnitude does not fit the target
/// bitsize. The target descriptor itself is validated along the way.
pub fn decode(value: &EncodedValue, target_type: &TypeDescriptor) -> Result<PlainValue, CuckooPirError> {
    match target_type {
        TypeDescriptor::Integer { .. } => {
            let bitsize = validate_type_and_get_bit_size(target_type)?;

            let EncodedValue::Integer(integer) = value else {
                return Err(CuckooPirError::ValueNotAnInteger);
            };
            let decoded = match integer {
                IntegerValue::ValueUint64(v) => *v as u128,
                IntegerValue::ValueUint128 { high, low } => ((*high as u128) << 64) | (*low as u128),
            };

            if branch_opt_util::unlikely(bitsize < 128 && (decoded >> bitsize) != 0) {
                return Err(CuckooPirError::ValueTooLargeForType);
            }

            Ok(PlainValue::Integer(decoded))
        }
        TypeDescriptor::Tuple { elements: element_types } => {
            let EncodedValue::Tuple(elements) = value else {
                return Err(CuckooPirError::ValueNotATuple);
            };
            if branch_opt_util::unlikely(elements.len() != element_types.len()) {
                return Err(CuckooPirError::WrongNumberOfTupleElements);
            }

            let decoded = elements
                .iter()
                .zip(element_types)
                .map(|(element, element_type)| decode(element, element_type))
                .collect::<Result<Vec<PlainValue>, CuckooPirError>>()?;

            Ok(PlainValue::Tuple(decoded))
        }
    }
}
