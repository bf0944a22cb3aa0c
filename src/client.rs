//! Client for a remote NH5 container.

use crate::array::{self, DatasetData};
use crate::error::Nh5Error;
use crate::header;
use crate::hierarchy::Hierarchy;
use crate::models::{
    ClientConfig, Dataset, DatasetDataOptions, DatasetRecord, Group, Header, Slice,
};
use crate::range_downloader_http::HttpRangeDownloader;
use crate::range_source::RangeSource;
use crate::request_cache::RequestCache;

use bytes::Bytes;
use std::sync::Arc;
use url::Url;
use validator::Validate;

/// Open the container at `url` with the default configuration.
///
/// Fetches and validates the header. This is the usual way to construct a [Client].
pub async fn create_client(url: &str) -> Result<Client, Nh5Error> {
    create_client_with_config(url, ClientConfig::default()).await
}

/// Open the container at `url`.
///
/// # Arguments
///
/// * `url`: URL of the container. The server must support HTTP range requests.
/// * `config`: Client configuration
pub async fn create_client_with_config(
    url: &str,
    config: ClientConfig,
) -> Result<Client, Nh5Error> {
    let url = Url::parse(url)?;
    let source = HttpRangeDownloader::new(url.clone(), config.credentials.clone());
    Client::with_source(url, source, &config).await
}

/// Returns the request cache key for a dataset and optional slice.
fn cache_key(path: &str, slice: Option<&[Slice]>) -> Result<String, Nh5Error> {
    let slice = match slice {
        Some(slice) => serde_json::to_string(slice)?,
        None => String::new(),
    };
    Ok(format!("{}{}", path, slice))
}

/// A reader for a remote NH5 container.
///
/// The header is fetched once on construction and is immutable thereafter. Dataset payloads are
/// fetched on demand and memoised for the lifetime of the client; concurrent requests for the
/// same dataset share a single range request.
#[derive(Debug)]
pub struct Client<S = HttpRangeDownloader> {
    url: Url,
    source: S,
    hierarchy: Hierarchy,
    /// Absolute offset of the data section
    data_position: u64,
    cache: RequestCache<Arc<DatasetData>, Nh5Error>,
}

impl<S: RangeSource> Client<S> {
    /// Open a container using an arbitrary range source.
    ///
    /// # Arguments
    ///
    /// * `url`: URL of the container, used for identification only
    /// * `source`: Source of the container bytes
    /// * `config`: Client configuration. Credentials are the responsibility of `source`.
    #[tracing::instrument(level = "DEBUG", skip(url, source, config), fields(url = %url))]
    pub async fn with_source(url: Url, source: S, config: &ClientConfig) -> Result<Self, Nh5Error> {
        config.validate()?;
        let info = header::fetch_header(&source, config.initial_probe_size).await?;
        tracing::info!(
            groups = info.header.groups.len(),
            datasets = info.header.datasets.len(),
            data_position = info.data_position,
            "opened NH5 container {}",
            url
        );
        Ok(Self {
            url,
            source,
            hierarchy: Hierarchy::new(info.header),
            data_position: info.data_position,
            cache: RequestCache::new(),
        })
    }

    /// URL of the container.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The parsed header.
    pub fn header(&self) -> &Header {
        self.hierarchy.header()
    }

    /// Absolute offset of the data section.
    pub fn data_position(&self) -> u64 {
        self.data_position
    }

    /// The source of the container bytes.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the group at `path` with its immediate subgroups and datasets.
    ///
    /// Returns `None` if there is no such group.
    pub fn get_group(&self, path: &str) -> Option<Group> {
        self.hierarchy.get_group(path)
    }

    /// Return the dataset at `path`.
    ///
    /// Returns `None` if there is no such dataset.
    pub fn get_dataset(&self, path: &str) -> Option<Dataset> {
        self.hierarchy.get_dataset(path)
    }

    /// Return the data of the dataset at `path`.
    ///
    /// Returns `None` if there is no such dataset. Unsupported options fail before any request
    /// is made.
    ///
    /// # Arguments
    ///
    /// * `path`: Path of the dataset
    /// * `options`: Request options
    #[tracing::instrument(level = "DEBUG", skip(self, options), fields(url = %self.url))]
    pub async fn get_dataset_data(
        &self,
        path: &str,
        options: &DatasetDataOptions,
    ) -> Result<Option<Arc<DatasetData>>, Nh5Error> {
        if options.slice.is_some() {
            return Err(Nh5Error::NotImplemented { feature: "slice" });
        }
        if options.allow_big_int {
            return Err(Nh5Error::NotImplemented {
                feature: "allow_big_int",
            });
        }
        if options.cancellation.is_some() {
            tracing::warn!("cancellation is not supported, the fetch will run to completion");
        }
        let Some(record) = self.hierarchy.dataset_record(path) else {
            return Ok(None);
        };
        let key = cache_key(path, options.slice.as_deref())?;
        let data = self
            .cache
            .get_or_try_fetch(&key, || self.fetch_dataset_data(record))
            .await
            // Callers that shared a failed fetch see the same error.
            .map_err(|error| Arc::try_unwrap(error).unwrap_or_else(Nh5Error::Shared))?;
        Ok(Some(data))
    }

    /// Download and decode the payload of a dataset.
    async fn fetch_dataset_data(
        &self,
        record: &DatasetRecord,
    ) -> Result<Arc<DatasetData>, Nh5Error> {
        let data = match record.byte_range(self.data_position)? {
            Some((start, end)) => {
                let data = self.source.get_range(start, end).await?;
                let actual: u64 = data.len().try_into()?;
                if actual.checked_sub(1) != Some(end - start) {
                    return Err(Nh5Error::UnexpectedLength {
                        expected: (end - start).saturating_add(1),
                        actual,
                    });
                }
                data
            }
            // Nothing to fetch for an empty dataset.
            None => Bytes::new(),
        };
        let decoded = array::decode(record.dtype, &record.shape, &data)?;
        Ok(Arc::new(decoded))
    }
}
