//! Decodes screenshots before they are shown.
//!
//! A URL is only reported as loaded once its bytes decode as an image, so the
//! display never swaps to a broken or truncated frame.
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

use agent_core::PreloadId;
use agent_logging::{agent_debug, agent_warn};
use base64::Engine as _;
use image::ImageReader;
use tokio::task::AbortHandle;

use crate::{EngineEvent, EventSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreloadError {
    #[error("unsupported screenshot url")]
    UnsupportedUrl,
    #[error("malformed data uri")]
    MalformedDataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("image decode failed: {0}")]
    Decode(String),
}

/// Splits a `data:<mime>;base64,<payload>` URI and decodes the payload.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, PreloadError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or(PreloadError::MalformedDataUri)?;
    let (meta, payload) = rest.split_once(',').ok_or(PreloadError::MalformedDataUri)?;
    if !meta
        .split(';')
        .any(|part| part.trim().eq_ignore_ascii_case("base64"))
    {
        return Err(PreloadError::MalformedDataUri);
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|err| PreloadError::Base64(err.to_string()))
}

/// Fully decodes `bytes`, guessing the format from its magic number.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, PreloadError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| PreloadError::Decode(err.to_string()))?;
    let format = reader
        .format()
        .map(|format| format!("{format:?}").to_ascii_lowercase())
        .ok_or_else(|| PreloadError::Decode("unrecognised image format".to_string()))?;
    let image = reader
        .decode()
        .map_err(|err| PreloadError::Decode(err.to_string()))?;
    Ok(DecodedImage {
        format,
        width: image.width(),
        height: image.height(),
    })
}

struct InFlight {
    waiters: Vec<PreloadId>,
    handle: AbortHandle,
}

type InFlightMap = Arc<Mutex<HashMap<String, InFlight>>>;

/// Loads screenshot URLs off the executor and reports each outcome once per
/// requesting [`PreloadId`].
pub struct ImagePreloader {
    client: reqwest::Client,
    sink: Arc<dyn EventSink>,
    in_flight: InFlightMap,
}

impl ImagePreloader {
    pub fn new(client: reqwest::Client, sink: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            sink,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts loading `url`, or joins the load already running for it.
    pub fn preload(&self, id: PreloadId, url: String) {
        let mut in_flight = lock(&self.in_flight);
        if let Some(entry) = in_flight.get_mut(&url) {
            agent_debug!("Preload {} joins in-flight load", id);
            entry.waiters.push(id);
            return;
        }

        let client = self.client.clone();
        let sink = self.sink.clone();
        let shared = self.in_flight.clone();
        let key = url.clone();
        let task_key = url.clone();
        let task = tokio::spawn(async move {
            let result = load(&client, url).await;
            if let Err(err) = &result {
                agent_warn!("Screenshot preload failed: {}", err);
            }
            let waiters = lock(&shared)
                .remove(&task_key)
                .map(|entry| entry.waiters)
                .unwrap_or_default();
            for id in waiters {
                sink.emit(EngineEvent::PreloadFinished {
                    id,
                    result: result.clone(),
                });
            }
        });
        in_flight.insert(
            key,
            InFlight {
                waiters: vec![id],
                handle: task.abort_handle(),
            },
        );
    }

    /// Aborts every running load; nothing is reported for them.
    pub fn cancel_all(&self) {
        let drained: Vec<InFlight> = lock(&self.in_flight).drain().map(|(_, entry)| entry).collect();
        if !drained.is_empty() {
            agent_debug!("Cancelling {} screenshot preloads", drained.len());
        }
        for entry in drained {
            entry.handle.abort();
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

async fn load(client: &reqwest::Client, url: String) -> Result<DecodedImage, PreloadError> {
    let bytes = if url.starts_with("data:") {
        None
    } else if url.starts_with("http://") || url.starts_with("https://") {
        Some(download(client, &url).await?)
    } else {
        return Err(PreloadError::UnsupportedUrl);
    };

    tokio::task::spawn_blocking(move || {
        let bytes = match bytes {
            Some(bytes) => bytes,
            None => decode_data_uri(&url)?,
        };
        decode_image(&bytes)
    })
    .await
    .map_err(|err| PreloadError::Decode(err.to_string()))?
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, PreloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| PreloadError::Download(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PreloadError::Download(status.to_string()));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| PreloadError::Download(err.to_string()))?;
    Ok(bytes.to_vec())
}

fn lock(map: &InFlightMap) -> MutexGuard<'_, HashMap<String, InFlight>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
