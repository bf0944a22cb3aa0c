//! Decoding of raw dataset payloads into [ndarray] arrays.

use crate::error::Nh5Error;
use crate::models::DType;
use crate::types::NH5_BYTE_ORDER;

use bytes::Bytes;
use ndarray::{ArrayD, IxDyn};
use num_traits::ToPrimitive;

/// Trait for array elements.
pub trait Element: Clone + Copy + std::fmt::Debug + ToPrimitive + zerocopy::FromBytes {}

/// Blanket implementation of Element.
impl<T> Element for T where T: Clone + Copy + std::fmt::Debug + ToPrimitive + zerocopy::FromBytes {}

/// The decoded data of a dataset, typed by its [DType].
#[derive(Clone, Debug, PartialEq)]
pub enum DatasetData {
    Int8(ArrayD<i8>),
    Uint8(ArrayD<u8>),
    Int16(ArrayD<i16>),
    Uint16(ArrayD<u16>),
    Int32(ArrayD<i32>),
    Uint32(ArrayD<u32>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

/// Apply an expression to the array inside any [DatasetData] variant.
macro_rules! with_array {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            DatasetData::Int8($array) => $body,
            DatasetData::Uint8($array) => $body,
            DatasetData::Int16($array) => $body,
            DatasetData::Uint16($array) => $body,
            DatasetData::Int32($array) => $body,
            DatasetData::Uint32($array) => $body,
            DatasetData::Float32($array) => $body,
            DatasetData::Float64($array) => $body,
        }
    };
}

impl DatasetData {
    /// Data type of the elements.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int8(_) => DType::Int8,
            Self::Uint8(_) => DType::Uint8,
            Self::Int16(_) => DType::Int16,
            Self::Uint16(_) => DType::Uint16,
            Self::Int32(_) => DType::Int32,
            Self::Uint32(_) => DType::Uint32,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
        }
    }

    /// Shape of the array.
    pub fn shape(&self) -> &[usize] {
        with_array!(self, array => array.shape())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        with_array!(self, array => array.len())
    }

    /// Returns true if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements converted to [f64] in row-major order.
    ///
    /// Every supported dtype converts without loss.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        with_array!(self, array => array
            .iter()
            .map(|value| value.to_f64().unwrap_or(f64::NAN))
            .collect())
    }
}

/// Convert from Bytes to `&[T]`.
///
/// Zerocopy provides a mechanism for converting between types.
/// Correct alignment of the data is necessary.
///
/// # Arguments
///
/// * `data`: Bytes containing data to convert.
fn from_bytes<T: zerocopy::FromBytes>(data: &Bytes) -> Result<&[T], Nh5Error> {
    let layout = zerocopy::LayoutVerified::<_, [T]>::new_slice(&data[..]).ok_or(
        Nh5Error::FromBytes {
            type_name: std::any::type_name::<T>(),
        },
    )?;
    Ok(layout.into_slice())
}

/// Return the payload in native byte order with at least 8-byte alignment.
///
/// Data that already satisfies both is returned without copying.
///
/// # Arguments
///
/// * `data`: Raw payload bytes
/// * `element_size`: Size in bytes of each element
fn to_native_aligned(data: &Bytes, element_size: usize) -> Bytes {
    let swap = NH5_BYTE_ORDER.needs_swap() && element_size > 1;
    let aligned = data.as_ptr() as usize % std::mem::align_of::<u64>() == 0;
    if aligned && !swap {
        return data.clone();
    }
    let mut buf = maligned::align_first::<u8, maligned::A8>(data.len());
    buf.extend_from_slice(data);
    if swap {
        for element in buf.chunks_exact_mut(element_size) {
            element.reverse();
        }
    }
    buf.into()
}

/// Build an owned array of `T` with the given shape from raw bytes.
///
/// # Arguments
///
/// * `shape`: Shape of the array. An empty shape describes a scalar.
/// * `data`: Bytes containing data for the array, in native byte order.
pub fn build_array<T: Element>(shape: &[usize], data: &Bytes) -> Result<ArrayD<T>, Nh5Error> {
    // An empty Bytes may point at a static with byte alignment.
    let values = if data.is_empty() {
        Vec::new()
    } else {
        from_bytes::<T>(data)?.to_vec()
    };
    Ok(ArrayD::from_shape_vec(IxDyn(shape), values)?)
}

/// Decode the raw payload of a dataset.
///
/// # Arguments
///
/// * `dtype`: Data type of the elements
/// * `shape`: Shape of the array
/// * `data`: Raw payload bytes in NH5 byte order
pub fn decode(dtype: DType, shape: &[usize], data: &Bytes) -> Result<DatasetData, Nh5Error> {
    let data = to_native_aligned(data, dtype.size_of());
    // Convert runtime data type into concrete types.
    let decoded = match dtype {
        DType::Int8 => DatasetData::Int8(build_array(shape, &data)?),
        DType::Uint8 => DatasetData::Uint8(build_array(shape, &data)?),
        DType::Int16 => DatasetData::Int16(build_array(shape, &data)?),
        DType::Uint16 => DatasetData::Uint16(build_array(shape, &data)?),
        DType::Int32 => DatasetData::Int32(build_array(shape, &data)?),
        DType::Uint32 => DatasetData::Uint32(build_array(shape, &data)?),
        DType::Float32 => DatasetData::Float32(build_array(shape, &data)?),
        DType::Float64 => DatasetData::Float64(build_array(shape, &data)?),
    };
    Ok(decoded)
}
