use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

use monoload::events::LoaderEvent;
use monoload::logging::init_logging;
use monoload::{LoadSource, Loader};

/// Demo source: loads a file's contents as a shared buffer.
///
/// Discarded buffers go back into a small pool so a reload reuses the
/// allocation instead of dropping it.
struct FileSource {
    path: PathBuf,
    pool: Mutex<Vec<Vec<u8>>>,
}

impl FileSource {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            pool: Mutex::new(Vec::new()),
        }
    }
}

impl LoadSource for FileSource {
    type Output = Arc<Vec<u8>>;

    async fn load(&self) -> Option<Arc<Vec<u8>>> {
        let mut buf = self
            .pool
            .lock()
            .ok()
            .and_then(|mut pool| pool.pop())
            .unwrap_or_default();
        buf.clear();

        match tokio::fs::read(&self.path).await {
            Ok(data) => {
                buf.extend_from_slice(&data);
                tracing::info!("Loaded {} bytes from {}", buf.len(), self.path.display());
                Some(Arc::new(buf))
            }
            Err(e) => {
                tracing::error!("Failed to read {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn discard(&self, result: Arc<Vec<u8>>) {
        // Reclaim the allocation once ours is the last handle
        if let Some(buf) = Arc::into_inner(result) {
            tracing::debug!("Recycling {}-byte buffer", buf.capacity());
            if let Ok(mut pool) = self.pool.lock() {
                pool.push(buf);
            }
        }
    }

    fn same_result(&self, a: &Arc<Vec<u8>>, b: &Arc<Vec<u8>>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

async fn file_mtime(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok())
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: monoload <file>"))?;

    let log_path = init_logging()?;
    eprintln!("logging to {}", log_path.display());
    tracing::info!("monoload demo starting");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let source = Arc::new(FileSource::new(path.clone()));
    let (mut loader, mut completion_rx) = Loader::new(source, event_tx);

    loader.start();

    let mut last_mtime = file_mtime(&path).await;
    let mut interval = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("ctrl-c received; resetting loader");
                loader.reset();
                break;
            }
            Some(completion) = completion_rx.recv() => {
                loader.handle_completion(completion);
            }
            Some(event) = event_rx.recv() => {
                match event {
                    LoaderEvent::Loaded(Some(data)) => {
                        println!("loaded {} bytes", data.len());
                    }
                    LoaderEvent::Loaded(None) => {
                        println!("no result (file unreadable?)");
                    }
                    LoaderEvent::Redelivered(data) => {
                        println!("re-delivered {} bytes from cache", data.len());
                    }
                }
            }
            _ = interval.tick() => {
                let mtime = file_mtime(&path).await;
                if mtime != last_mtime {
                    last_mtime = mtime;
                    tracing::info!("{} changed on disk", path.display());
                    loader.notify_content_changed();
                }
            }
        }
    }

    Ok(())
}
