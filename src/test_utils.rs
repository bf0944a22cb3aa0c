use crate::error::Nh5Error;
use crate::header;
use crate::models::*;
use crate::range_source::RangeSource;

use bytes::Bytes;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// Create a group record with no attributes.
pub(crate) fn group(path: &str) -> GroupRecord {
    GroupRecord {
        path: path.to_string(),
        attrs: Attrs::new(),
    }
}

/// Create a header with groups `/`, `/a`, `/a/b`, `/a/c` and datasets in three of them.
pub(crate) fn get_test_header() -> Header {
    let mut a = group("/a");
    a.attrs.insert("label".to_string(), json!("alpha"));
    let mut units = Attrs::new();
    units.insert("units".to_string(), json!("counts"));
    Header {
        groups: vec![group("/"), a, group("/a/b"), group("/a/c")],
        datasets: vec![
            DatasetRecord {
                path: "/a/ds1".to_string(),
                attrs: units,
                dtype: DType::Int32,
                shape: vec![4],
                position: 0,
            },
            DatasetRecord {
                path: "/a/b/ds2".to_string(),
                attrs: Attrs::new(),
                dtype: DType::Float64,
                shape: vec![2, 3],
                position: 16,
            },
            DatasetRecord {
                path: "/scalar".to_string(),
                attrs: Attrs::new(),
                dtype: DType::Uint8,
                shape: vec![],
                position: 64,
            },
        ],
    }
}

/// Create the data section matching [get_test_header].
pub(crate) fn get_test_data() -> Vec<u8> {
    let mut data: Vec<u8> = [1_i32, 2, 3, 4]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    data.extend(
        [0.5_f64, 1.5, 2.5, 3.5, 4.5, 5.5]
            .iter()
            .flat_map(|v| v.to_le_bytes()),
    );
    data.push(255);
    data
}

/// Serialise a container from a header and data section.
pub(crate) fn build_container(header: &Header, data: &[u8]) -> Bytes {
    let mut file = header::encode_header(header).unwrap().to_vec();
    file.extend_from_slice(data);
    Bytes::from(file)
}

/// Serialise a container whose data section starts at `data_position`.
///
/// The header JSON is padded with trailing whitespace. Assumes a three digit header length.
pub(crate) fn build_container_at(header: &Header, data: &[u8], data_position: usize) -> Bytes {
    let mut json = serde_json::to_vec(header).unwrap();
    let prefix_len = "nh5|1|000|".len();
    assert!(prefix_len + json.len() <= data_position, "header too large");
    json.resize(data_position - prefix_len, b' ');
    let mut file = format!("nh5|1|{:03}|", json.len()).into_bytes();
    assert_eq!(prefix_len, file.len());
    file.extend_from_slice(&json);
    file.extend_from_slice(data);
    Bytes::from(file)
}

/// An in-memory [RangeSource] that records requests.
///
/// Requests may be held until released, and the next request may be made to fail.
#[derive(Debug)]
pub(crate) struct MemorySource {
    data: Bytes,
    requests: Mutex<Vec<(u64, u64)>>,
    held: AtomicBool,
    gate: Semaphore,
    fail_next: AtomicBool,
}

impl MemorySource {
    pub(crate) fn new(data: Bytes) -> Self {
        Self {
            data,
            requests: Mutex::new(vec![]),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    /// All requested ranges, in order of arrival.
    pub(crate) fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.lock().unwrap().clone()
    }

    /// Hold subsequent requests until [MemorySource::release] is called.
    pub(crate) fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// Let held requests proceed.
    pub(crate) fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(1);
    }

    /// Fail the next request with a server error.
    pub(crate) fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl RangeSource for MemorySource {
    async fn get_range(&self, start: u64, end: u64) -> Result<Bytes, Nh5Error> {
        self.requests.lock().unwrap().push((start, end));
        if self.held.load(Ordering::SeqCst) {
            // Permits are returned on drop so every held request passes once released.
            drop(self.gate.acquire().await.unwrap());
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Nh5Error::HttpRequest {
                url: "memory".to_string(),
                status: 503,
            });
        }
        let len = self.data.len() as u64;
        if start >= len {
            return Err(Nh5Error::HttpRequest {
                url: "memory".to_string(),
                status: 416,
            });
        }
        let end = end.min(len - 1);
        Ok(self.data.slice(start as usize..=end as usize))
    }
}
