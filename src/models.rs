//! Data types and associated functions and methods

use crate::error::Nh5Error;
use crate::range_downloader_http::HttpCredentials;
use crate::range_source;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::Display;
use tokio_util::sync::CancellationToken;
use validator::Validate;

/// Default number of bytes requested by the first header probe.
///
/// Large enough that the whole header almost always arrives in a single round trip.
pub const DEFAULT_INITIAL_PROBE_SIZE: usize = 100_000;

/// Arbitrary JSON metadata attached to a group or dataset, in producer order.
pub type Attrs = serde_json::Map<String, serde_json::Value>;

/// Supported numerical data types
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    /// [i8]
    Int8,
    /// [u8]
    Uint8,
    /// [i16]
    Int16,
    /// [u16]
    Uint16,
    /// [i32]
    Int32,
    /// [u32]
    Uint32,
    /// [f32]
    Float32,
    /// [f64]
    Float64,
}

impl DType {
    /// All type tags understood by the reader.
    pub const ALL: [DType; 8] = [
        Self::Int8,
        Self::Uint8,
        Self::Int16,
        Self::Uint16,
        Self::Int32,
        Self::Uint32,
        Self::Float32,
        Self::Float64,
    ];

    /// Returns the size of the associated type in bytes.
    pub fn size_of(self) -> usize {
        match self {
            Self::Int8 => std::mem::size_of::<i8>(),
            Self::Uint8 => std::mem::size_of::<u8>(),
            Self::Int16 => std::mem::size_of::<i16>(),
            Self::Uint16 => std::mem::size_of::<u16>(),
            Self::Int32 => std::mem::size_of::<i32>(),
            Self::Uint32 => std::mem::size_of::<u32>(),
            Self::Float32 => std::mem::size_of::<f32>(),
            Self::Float64 => std::mem::size_of::<f64>(),
        }
    }

    /// Returns the DType whose header tag is `tag`, if any.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dtype| dtype.to_string() == tag)
    }
}

/// A half-open `[start, end)` range over a single dimension of an array
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Slice {
    /// Start of the slice
    pub start: usize,
    /// End of the slice (exclusive)
    pub end: usize,
}

impl Slice {
    /// Return a new Slice object.
    pub fn new(start: usize, end: usize) -> Self {
        Slice { start, end }
    }
}

/// Accept any JSON value for `attrs`, keeping only objects.
///
/// Producers are required to emit the field but may use `null` for "no attributes".
fn deserialize_attrs<'de, D>(deserializer: D) -> Result<Attrs, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Object(attrs) => Ok(attrs),
        _ => Ok(Attrs::new()),
    }
}

/// A group record in the container header
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GroupRecord {
    /// `/`-delimited path of the group
    pub path: String,
    /// Group attributes
    #[serde(deserialize_with = "deserialize_attrs")]
    pub attrs: Attrs,
}

/// A dataset record in the container header
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DatasetRecord {
    /// `/`-delimited path of the dataset
    pub path: String,
    /// Dataset attributes
    #[serde(deserialize_with = "deserialize_attrs")]
    pub attrs: Attrs,
    /// Element type
    pub dtype: DType,
    /// Shape of the multi-dimensional array
    pub shape: Vec<usize>,
    /// Offset in bytes of the raw data, relative to the start of the data section
    pub position: u64,
}

impl DatasetRecord {
    /// Number of elements in the dataset. An empty shape describes a scalar.
    ///
    /// Returns `None` if the count does not fit in a `usize`.
    pub fn num_elements(&self) -> Option<usize> {
        if self.shape.contains(&0) {
            return Some(0);
        }
        self.shape
            .iter()
            .try_fold(1_usize, |count, dim| count.checked_mul(*dim))
    }

    /// Size in bytes of the raw data of the dataset.
    ///
    /// Returns `None` if the size does not fit in a `u64`.
    pub fn byte_length(&self) -> Option<u64> {
        let bytes = self.num_elements()?.checked_mul(self.dtype.size_of())?;
        u64::try_from(bytes).ok()
    }

    /// Absolute inclusive byte range of the raw data, given the offset of the data section.
    ///
    /// Returns `None` for a dataset with no elements.
    pub fn byte_range(&self, data_position: u64) -> Result<Option<(u64, u64)>, Nh5Error> {
        let extent_error = || Nh5Error::DatasetExtent {
            path: self.path.clone(),
        };
        let byte_length = self.byte_length().ok_or_else(extent_error)?;
        let offset = data_position
            .checked_add(self.position)
            .ok_or_else(extent_error)?;
        range_source::get_range(offset, byte_length).map_err(|_| extent_error())
    }
}

/// The index of an NH5 container
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Header {
    /// All groups in the container, in header order
    pub groups: Vec<GroupRecord>,
    /// All datasets in the container, in header order
    pub datasets: Vec<DatasetRecord>,
}

/// An immediate subgroup of a [Group]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Subgroup {
    /// Final path segment
    pub name: String,
    pub path: String,
    pub attrs: Attrs,
}

/// A dataset, without the location of its raw data
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dataset {
    /// Final path segment
    pub name: String,
    pub path: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub attrs: Attrs,
}

/// A group together with its immediate children
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Group {
    pub path: String,
    /// Immediate subgroups, ordered by name
    pub subgroups: Vec<Subgroup>,
    /// Immediate datasets, ordered by name
    pub datasets: Vec<Dataset>,
    pub attrs: Attrs,
}

/// Options for a dataset data request
#[derive(Clone, Debug, Default)]
pub struct DatasetDataOptions {
    /// Subset of the data to fetch, one range per dimension. Not yet supported.
    pub slice: Option<Vec<Slice>>,
    /// Return 64-bit integer types as big integers. Not yet supported.
    pub allow_big_int: bool,
    /// Accepted but ignored: in-flight fetches always run to completion.
    pub cancellation: Option<CancellationToken>,
}

impl DatasetDataOptions {
    /// Return options requesting the given slice.
    pub fn with_slice(slice: Vec<Slice>) -> Self {
        Self {
            slice: Some(slice),
            ..Default::default()
        }
    }
}

/// Configuration of a [Client](crate::client::Client)
#[derive(Clone, Debug, Validate)]
pub struct ClientConfig {
    /// Number of bytes requested by the first header probe
    #[validate(range(min = 16, message = "initial probe size must be at least 16 bytes"))]
    pub initial_probe_size: usize,
    /// Credentials attached to every range request
    pub credentials: HttpCredentials,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            initial_probe_size: DEFAULT_INITIAL_PROBE_SIZE,
            credentials: HttpCredentials::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serde_test::{assert_de_tokens, assert_de_tokens_error, Token};

    #[test]
    fn test_dtype_tokens() {
        assert_de_tokens(
            &DType::Uint16,
            &[
                Token::Enum { name: "DType" },
                Token::Str("uint16"),
                Token::Unit,
            ],
        );
        assert_de_tokens(
            &DType::Float64,
            &[
                Token::Enum { name: "DType" },
                Token::Str("float64"),
                Token::Unit,
            ],
        );
    }

    #[test]
    fn test_dtype_unknown() {
        assert_de_tokens_error::<DType>(
            &[
                Token::Enum { name: "DType" },
                Token::Str("int64"),
            ],
            "unknown variant `int64`, expected one of `int8`, `uint8`, `int16`, `uint16`, `int32`, `uint32`, `float32`, `float64`",
        );
    }

    #[test]
    fn test_dtype_size_of() {
        let sizes: Vec<usize> = DType::ALL.iter().map(|dtype| dtype.size_of()).collect();
        assert_eq!(vec![1, 1, 2, 2, 4, 4, 4, 8], sizes);
    }

    #[test]
    fn test_dtype_tags() {
        for dtype in DType::ALL {
            let tag = dtype.to_string();
            assert_eq!(Some(dtype), DType::from_tag(&tag));
            assert_eq!(json!(tag), serde_json::to_value(dtype).unwrap());
        }
        assert_eq!(None, DType::from_tag("Int8"));
    }

    #[test]
    fn test_dataset_record() {
        let record: DatasetRecord = serde_json::from_value(json!({
            "path": "/acquisition/ts",
            "attrs": {"units": "V", "rate": 30000.0},
            "dtype": "int32",
            "shape": [4, 2],
            "position": 100
        }))
        .unwrap();
        assert_eq!("/acquisition/ts", record.path);
        assert_eq!(DType::Int32, record.dtype);
        assert_eq!(Some(8), record.num_elements());
        assert_eq!(Some(32), record.byte_length());
        assert_eq!(Some((600, 631)), record.byte_range(500).unwrap());
        assert_eq!(Some(&json!("V")), record.attrs.get("units"));
    }

    #[test]
    fn test_dataset_record_scalar() {
        let record: DatasetRecord = serde_json::from_value(json!({
            "path": "/x",
            "attrs": {},
            "dtype": "float64",
            "shape": [],
            "position": 0
        }))
        .unwrap();
        assert_eq!(Some(1), record.num_elements());
        assert_eq!(Some(8), record.byte_length());
    }

    #[test]
    fn test_dataset_record_empty() {
        let record: DatasetRecord = serde_json::from_value(json!({
            "path": "/x",
            "attrs": {},
            "dtype": "uint16",
            "shape": [3, 0],
            "position": 0
        }))
        .unwrap();
        assert_eq!(Some(0), record.byte_length());
        assert_eq!(None, record.byte_range(10).unwrap());
    }

    fn huge_record(shape: Vec<usize>, position: u64) -> DatasetRecord {
        DatasetRecord {
            path: "/huge".to_string(),
            attrs: Attrs::new(),
            dtype: DType::Float64,
            shape,
            position,
        }
    }

    #[test]
    fn test_dataset_record_element_overflow() {
        let record = huge_record(vec![1 << 40, 1 << 40], 0);
        assert_eq!(None, record.num_elements());
        assert_eq!(None, record.byte_length());
        match record.byte_range(0).unwrap_err() {
            Nh5Error::DatasetExtent { path } => assert_eq!("/huge", path),
            error => panic!("unexpected error {error:?}"),
        }
    }

    #[test]
    fn test_dataset_record_byte_length_overflow() {
        let record = huge_record(vec![usize::MAX / 2], 0);
        assert_eq!(Some(usize::MAX / 2), record.num_elements());
        assert_eq!(None, record.byte_length());
    }

    #[test]
    fn test_dataset_record_zero_dim_with_huge_dims() {
        let record = huge_record(vec![1 << 40, 1 << 40, 0], 0);
        assert_eq!(Some(0), record.num_elements());
        assert_eq!(None, record.byte_range(0).unwrap());
    }

    #[test]
    fn test_dataset_record_position_overflow() {
        let record = huge_record(vec![2], u64::MAX - 1);
        assert!(record.byte_range(0).unwrap_err().is_format_error());
        // The offset itself overflows once the data section is added.
        let record = huge_record(vec![], u64::MAX - 1);
        assert!(record.byte_range(10).unwrap_err().is_format_error());
    }

    #[test]
    fn test_attrs_preserve_order() {
        let record: GroupRecord = serde_json::from_str(
            r#"{"path": "/", "attrs": {"zeta": 1, "alpha": 2, "mid": [1, 2]}}"#,
        )
        .unwrap();
        let keys: Vec<&String> = record.attrs.keys().collect();
        assert_eq!(vec!["zeta", "alpha", "mid"], keys);
    }

    #[test]
    fn test_attrs_null() {
        let record: GroupRecord =
            serde_json::from_value(json!({"path": "/a", "attrs": null})).unwrap();
        assert!(record.attrs.is_empty());
    }

    #[test]
    fn test_group_record_missing_attrs() {
        let result = serde_json::from_value::<GroupRecord>(json!({"path": "/a"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(100_000, config.initial_probe_size);
        assert_eq!(HttpCredentials::None, config.credentials);
        config.validate().unwrap()
    }

    #[test]
    #[should_panic(expected = "initial probe size must be at least 16 bytes")]
    fn test_client_config_probe_too_small() {
        let config = ClientConfig {
            initial_probe_size: 4,
            ..Default::default()
        };
        config.validate().unwrap()
    }

    #[test]
    fn test_options_with_slice() {
        let options = DatasetDataOptions::with_slice(vec![Slice::new(0, 1)]);
        assert_eq!(Some(vec![Slice::new(0, 1)]), options.slice);
        assert!(!options.allow_big_int);
        assert!(options.cancellation.is_none());
    }
}
