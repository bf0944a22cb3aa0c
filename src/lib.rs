//! This crate provides a reader for NH5 containers served over HTTP. An NH5 container is a
//! single file holding a JSON header that describes a hierarchy of groups and datasets, followed
//! by the raw little-endian payload of every dataset.
//!
//! The header is fetched once with a small number of HTTP range requests. After that, group and
//! dataset metadata is answered locally, and dataset data is fetched on demand with exactly one
//! range request per dataset. Decoded datasets are cached, and concurrent requests for the same
//! dataset share a single download.
//!
//! The reader is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [reqwest] performs HTTP range requests.
//! * [Serde](serde) performs (de)serialisation of the JSON header.
//! * [ndarray] provides [NumPy](https://numpy.org)-like n-dimensional arrays used to return
//!   dataset data.
//!
//! ```no_run
//! # async fn example() -> Result<(), remote_nh5::Nh5Error> {
//! let client = remote_nh5::create_client("https://example.com/data.nh5").await?;
//! if let Some(group) = client.get_group("/") {
//!     println!("{} datasets", group.datasets.len());
//! }
//! let data = client
//!     .get_dataset_data("/x", &remote_nh5::models::DatasetDataOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod cli;
pub mod client;
pub mod error;
pub mod header;
pub mod hierarchy;
pub mod models;
pub mod range_downloader_http;
pub mod range_source;
pub mod request_cache;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod types;

pub use array::DatasetData;
pub use client::{create_client, create_client_with_config, Client};
pub use error::Nh5Error;
pub use range_downloader_http::HttpCredentials;
pub use range_source::RangeSource;
