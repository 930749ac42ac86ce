use crate::AssetError;
use crate::document::Document;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Everything a [`Loader`](crate::Loader) needs, fetched and decoded.
#[derive(Debug)]
pub struct Asset {
    pub document: Document,
    /// One entry per `buffers[]` item, in order.
    pub buffers: Vec<Arc<[u8]>>,
    /// One entry per `images[]` item, in order.
    pub images: Vec<image::RgbaImage>,
}

/// Where asset bytes come from.
pub trait AssetSource: Send + Sync + 'static {
    fn read(&self, uri: &str) -> impl Future<Output = Result<Vec<u8>, AssetError>> + Send;
}

/// Reads URIs as paths relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    base: PathBuf,
}

impl FileSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl AssetSource for FileSource {
    async fn read(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
        if uri.starts_with("data:") || uri.contains("://") {
            return Err(AssetError::UnsupportedUri(uri.to_owned()));
        }
        let path = self.base.join(uri);
        tracing::debug!(path = %path.display(), "reading asset file");
        Ok(tokio::fs::read(path).await?)
    }
}

/// Cancels an in-flight [`fetch_asset`]. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Fetch the JSON root at `uri`, then every buffer and image it lists.
///
/// Buffer and image fetches run concurrently; all of them must succeed
/// before this returns. Relative URIs resolve against the root's directory.
/// When `cancel` fires, outstanding fetches are aborted and
/// [`AssetError::Cancelled`] is returned.
pub async fn fetch_asset<S: AssetSource>(
    source: Arc<S>,
    uri: &str,
    cancel: &CancelToken,
) -> Result<Asset, AssetError> {
    let span = tracing::info_span!("fetch_asset", uri);
    async move {
        if cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }
        let root = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AssetError::Cancelled),
            root = source.read(uri) => root?,
        };
        let document = Document::from_slice(&root)?;
        let base = match uri.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/"),
            None => String::new(),
        };

        let mut buffer_tasks = JoinSet::new();
        for (i, def) in document.buffers().iter().enumerate() {
            let uri = resolve_uri(&base, def.uri.as_deref(), "buffer", i)?;
            let source = Arc::clone(&source);
            buffer_tasks.spawn(async move {
                let bytes = source.read(&uri).await?;
                Ok::<_, AssetError>((i, Arc::<[u8]>::from(bytes)))
            });
        }

        let mut image_tasks = JoinSet::new();
        for (i, def) in document.images().iter().enumerate() {
            let uri = resolve_uri(&base, def.uri.as_deref(), "image", i)?;
            let source = Arc::clone(&source);
            image_tasks.spawn(async move {
                let bytes = source.read(&uri).await?;
                let image = image::load_from_memory(&bytes)?.to_rgba8();
                Ok::<_, AssetError>((i, image))
            });
        }

        let buffers = join_ordered(buffer_tasks, document.buffers().len(), cancel).await?;
        let images = join_ordered(image_tasks, document.images().len(), cancel).await?;
        tracing::info!(buffers = buffers.len(), images = images.len(), "asset fetched");
        Ok(Asset {
            document,
            buffers,
            images,
        })
    }
    .instrument(span)
    .await
}

fn resolve_uri(
    base: &str,
    uri: Option<&str>,
    kind: &str,
    index: usize,
) -> Result<String, AssetError> {
    match uri {
        Some(uri) => Ok(format!("{base}{uri}")),
        None => Err(AssetError::UnsupportedUri(format!("<embedded {kind} {index}>"))),
    }
}

/// Await every task, placing results by the index each one reports.
async fn join_ordered<T: Send + 'static>(
    mut tasks: JoinSet<Result<(usize, T), AssetError>>,
    len: usize,
    cancel: &CancelToken,
) -> Result<Vec<T>, AssetError> {
    let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tasks.abort_all();
                tracing::debug!("fetch cancelled");
                return Err(AssetError::Cancelled);
            }
            next = tasks.join_next() => match next {
                None => break,
                Some(joined) => {
                    let (index, value) = joined.map_err(|e| AssetError::Task(e.to_string()))??;
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(value);
                    }
                }
            },
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;

    const ROOT: &str = r#"{
        "buffers": [{ "uri": "a.bin", "byteLength": 4 }, { "uri": "b.bin", "byteLength": 2 }],
        "images": [{ "uri": "tex.png" }]
    }"#;

    #[tokio::test]
    async fn fetches_buffers_and_images_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("models");
        std::fs::create_dir(&assets).unwrap();
        std::fs::write(assets.join("scene.gltf"), ROOT).unwrap();
        std::fs::write(assets.join("a.bin"), [1u8, 2, 3, 4]).unwrap();
        std::fs::write(assets.join("b.bin"), [9u8, 9]).unwrap();
        image::RgbaImage::from_pixel(2, 3, image::Rgba([255, 0, 0, 255]))
            .save(assets.join("tex.png"))
            .unwrap();

        let source = Arc::new(FileSource::new(dir.path()));
        let asset = fetch_asset(source, "models/scene.gltf", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(asset.buffers.len(), 2);
        assert_eq!(&asset.buffers[0][..], &[1, 2, 3, 4]);
        assert_eq!(&asset.buffers[1][..], &[9, 9]);
        assert_eq!(asset.images.len(), 1);
        assert_eq!(asset.images[0].dimensions(), (2, 3));
    }

    #[tokio::test]
    async fn missing_buffer_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scene.gltf"), ROOT).unwrap();
        let source = Arc::new(FileSource::new(dir.path()));
        let result = fetch_asset(source, "scene.gltf", &CancelToken::new()).await;
        assert!(matches!(result, Err(AssetError::Io(_))));
    }

    #[tokio::test]
    async fn embedded_buffers_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scene.gltf"),
            r#"{ "buffers": [{ "byteLength": 4 }] }"#,
        )
        .unwrap();
        let source = Arc::new(FileSource::new(dir.path()));
        let result = fetch_asset(source, "scene.gltf", &CancelToken::new()).await;
        assert!(matches!(result, Err(AssetError::UnsupportedUri(_))));
    }

    /// Serves the root immediately and never finishes anything else.
    struct Stalled;

    impl AssetSource for Stalled {
        async fn read(&self, uri: &str) -> Result<Vec<u8>, AssetError> {
            if uri == "root.gltf" {
                return Ok(ROOT.as_bytes().to_vec());
            }
            future::pending().await
        }
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_fetches() {
        let token = CancelToken::new();
        let trigger = token.clone();
        tokio::spawn(async move { trigger.cancel() });

        let result = fetch_asset(Arc::new(Stalled), "root.gltf", &token).await;
        assert!(matches!(result, Err(AssetError::Cancelled)));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let result = fetch_asset(Arc::new(Stalled), "root.gltf", &token).await;
        assert!(matches!(result, Err(AssetError::Cancelled)));
    }
}
