//! NH5 header retrieval, parsing and validation.
//!
//! An NH5 container starts with an ASCII prefix `nh5|<version>|<header length>|`, followed by
//! `<header length>` bytes of UTF-8 JSON describing the groups and datasets, followed by the
//! raw dataset payloads.

use crate::error::Nh5Error;
use crate::models::{DType, Header};
use crate::range_source::RangeSource;

use bytes::{Bytes, BytesMut};
use serde_json::Value;

/// Magic string at the start of every container.
pub const MAGIC: &[u8] = b"nh5";

/// The only container version understood by this reader.
pub const SUPPORTED_VERSION: &[u8] = b"1";

const SEPARATOR: u8 = b'|';

/// Longest slice of an unexpected magic field echoed back in errors.
const MAX_REPORTED_MAGIC: usize = 16;

/// The parsed text prefix of a container.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Prefix {
    /// Length of the header JSON in bytes
    pub header_length: usize,
    /// Absolute offset of the first byte of the header JSON
    pub header_json_start: usize,
}

impl Prefix {
    /// Absolute offset of the data section, to which dataset positions are relative.
    ///
    /// Never overflows for a prefix returned by [parse_prefix].
    pub fn data_position(&self) -> usize {
        self.header_json_start.saturating_add(self.header_length)
    }
}

/// A parsed and validated header, together with the base offset of the data section.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderInfo {
    pub header: Header,
    pub data_position: u64,
}

/// Parse the text prefix at the start of `probe`.
///
/// The header length is a byte count. Bytes after the third separator are not inspected.
pub fn parse_prefix(probe: &[u8]) -> Result<Prefix, Nh5Error> {
    let mut fields = probe.splitn(4, |b| *b == SEPARATOR);
    let magic = fields.next().unwrap_or_default();
    let version = fields.next();
    if magic != MAGIC {
        let found = &magic[..magic.len().min(MAX_REPORTED_MAGIC)];
        return Err(Nh5Error::BadMagic {
            found: String::from_utf8_lossy(found).into_owned(),
        });
    }
    let version = version.ok_or(Nh5Error::MalformedPrefix {
        reason: "missing version separator",
    })?;
    if version != SUPPORTED_VERSION {
        return Err(Nh5Error::UnsupportedVersion {
            version: String::from_utf8_lossy(version).into_owned(),
        });
    }
    let length = fields.next().ok_or(Nh5Error::MalformedPrefix {
        reason: "missing header length separator",
    })?;
    // The final field is the remainder of the probe, present only if the third separator is.
    if fields.next().is_none() {
        return Err(Nh5Error::MalformedPrefix {
            reason: "missing header separator",
        });
    }
    let header_length = std::str::from_utf8(length)
        .ok()
        .filter(|text| !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|text| text.parse::<usize>().ok())
        .ok_or_else(|| Nh5Error::InvalidHeaderLength {
            value: String::from_utf8_lossy(length).into_owned(),
        })?;
    let header_json_start = magic.len() + version.len() + length.len() + 3;
    // The data section must start at an addressable offset.
    header_json_start
        .checked_add(header_length)
        .filter(|end| u64::try_from(*end).is_ok())
        .ok_or_else(|| Nh5Error::InvalidHeaderLength {
            value: String::from_utf8_lossy(length).into_owned(),
        })?;
    Ok(Prefix {
        header_length,
        header_json_start,
    })
}

/// Returns true if `value` has the structure of an NH5 header.
///
/// Groups need a string `path` and an `attrs` field of any type. Datasets additionally need a
/// known `dtype` tag, a `shape` of non-negative integers and a non-negative integer `position`.
pub fn is_valid_header(value: &Value) -> bool {
    let Some(header) = value.as_object() else {
        return false;
    };
    let groups_valid = header
        .get("groups")
        .and_then(Value::as_array)
        .map_or(false, |groups| groups.iter().all(is_valid_group));
    let datasets_valid = header
        .get("datasets")
        .and_then(Value::as_array)
        .map_or(false, |datasets| datasets.iter().all(is_valid_dataset));
    groups_valid && datasets_valid
}

fn is_valid_group(value: &Value) -> bool {
    value.as_object().map_or(false, |group| {
        group.get("path").map_or(false, Value::is_string) && group.contains_key("attrs")
    })
}

fn is_valid_dataset(value: &Value) -> bool {
    let Some(dataset) = value.as_object() else {
        return false;
    };
    is_valid_group(value)
        && dataset
            .get("dtype")
            .and_then(Value::as_str)
            .and_then(DType::from_tag)
            .is_some()
        && dataset
            .get("shape")
            .and_then(Value::as_array)
            .map_or(false, |shape| shape.iter().all(|dim| dim.as_u64().is_some()))
        && dataset.get("position").and_then(Value::as_u64).is_some()
}

/// Parse and validate header JSON.
pub fn parse_header(json: &[u8]) -> Result<Header, Nh5Error> {
    let value: Value = serde_json::from_slice(json)?;
    if !is_valid_header(&value) {
        return Err(Nh5Error::InvalidHeader);
    }
    Ok(serde_json::from_value(value)?)
}

/// Fetch, parse and validate the header of a container.
///
/// Issues a probe for the first `probe_size` bytes, followed by exactly one continuation request
/// if the header extends past the end of the probe.
///
/// # Arguments
///
/// * `source`: Source of the container bytes
/// * `probe_size`: Number of bytes requested by the first probe
#[tracing::instrument(level = "DEBUG", skip(source))]
pub async fn fetch_header<S: RangeSource>(
    source: &S,
    probe_size: usize,
) -> Result<HeaderInfo, Nh5Error> {
    let probe_end = u64::try_from(probe_size.max(1))? - 1;
    let probe = source.get_range(0, probe_end).await?;
    let prefix = parse_prefix(&probe)?;
    let start = prefix.header_json_start;
    let available = probe.len() - start;
    let json = if available >= prefix.header_length {
        probe.slice(start..start + prefix.header_length)
    } else {
        let missing = prefix.header_length - available;
        tracing::debug!(missing, "header extends past probe, fetching remainder");
        let continuation = source
            .get_range(
                u64::try_from(start + available)?,
                u64::try_from(prefix.data_position())? - 1,
            )
            .await?;
        if continuation.len() != missing {
            return Err(Nh5Error::UnexpectedLength {
                expected: missing.try_into()?,
                actual: continuation.len().try_into()?,
            });
        }
        let mut json = BytesMut::with_capacity(prefix.header_length);
        json.extend_from_slice(&probe[start..]);
        json.extend_from_slice(&continuation);
        json.freeze()
    };
    let header = parse_header(&json)?;
    let data_position = prefix.data_position().try_into()?;
    // Every dataset must lie within the addressable range.
    for dataset in &header.datasets {
        dataset.byte_range(data_position)?;
    }
    Ok(HeaderInfo {
        header,
        data_position,
    })
}

/// Serialise a header into the text prefix and JSON of a container.
///
/// This is the inverse of [fetch_header]; the dataset payloads follow the returned bytes.
pub fn encode_header(header: &Header) -> Result<Bytes, Nh5Error> {
    let json = serde_json::to_vec(header)?;
    let mut buf = BytesMut::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[SEPARATOR]);
    buf.extend_from_slice(SUPPORTED_VERSION);
    buf.extend_from_slice(format!("|{}|", json.len()).as_bytes());
    buf.extend_from_slice(&json);
    Ok(buf.freeze())
}
