use crate::archive;
use crate::error::{Error, Result};
use crate::http::{self, HttpClient};
use crate::models::{Descriptor, LocalArtifact, RemoteArtifact};
use crate::naming::derive_name;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use reqwest::{Response, Url};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

/// How a terminal URL was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    UpToDate { path: PathBuf },
    Downloaded { path: PathBuf, bytes: u64 },
}

/// Downloads terminal URLs into `<root>/<category>/`. The only component
/// that writes to the downloads tree.
#[derive(Clone)]
pub struct Downloader {
    client: HttpClient,
    root: PathBuf,
    progress: MultiProgress,
}

impl Downloader {
    pub fn new(client: HttpClient, root: impl Into<PathBuf>, show_progress: bool) -> Self {
        let progress = if show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        Self {
            client,
            root: root.into(),
            progress,
        }
    }

    pub async fn fetch(
        &self,
        url: &Url,
        descriptor: &Descriptor,
        referer: Option<&Url>,
    ) -> Result<FetchOutcome> {
        let category = descriptor.category().ok_or_else(|| Error::MissingCategory {
            url: url.to_string(),
        })?;
        debug!(%url, prefix = %descriptor.name_prefix, category, "Fetching");

        let dir = self.ensure_category_dir(category).await?;

        let head = self.client.head(url, referer).await?;
        let remote = RemoteArtifact::new(head.url(), http::content_length(head.headers()));
        debug!(%url, path = %remote.path, headers = ?head.headers(), "Getting name");

        let name = derive_name(
            &remote,
            &descriptor.name_prefix,
            descriptor.file_type.as_deref(),
        );
        let destination = dir.join(&name);

        let local = LocalArtifact::inspect(&destination)
            .await
            .map_err(|e| Error::io(&destination, e))?;
        debug!(
            name = %name,
            local_size = ?local.size(),
            remote_size = ?remote.size,
            "Comparing sizes"
        );

        if local.is_current(remote.size) {
            info!(category, name = %name, "Up-to-date");
            return Ok(FetchOutcome::UpToDate { path: destination });
        }

        // Many servers answer HEAD with a zero length, so check again on
        // the real response and drop it unread if nothing changed.
        let response = self.client.get(url, referer).await?;
        let size = http::content_length(response.headers()).filter(|s| *s > 0);
        if local.is_current(size) {
            info!(category, name = %name, "Up-to-date");
            return Ok(FetchOutcome::UpToDate { path: destination });
        }

        info!(
            name = %name,
            category,
            size = %HumanBytes(size.unwrap_or(0)),
            "Downloading"
        );
        let bytes = self.stream_to_file(response, &destination, &name, size).await?;
        info!(name = %name, category, "Written");

        if is_zip(&destination) {
            self.unpack(&destination).await;
        }

        Ok(FetchOutcome::Downloaded {
            path: destination,
            bytes,
        })
    }

    async fn ensure_category_dir(&self, category: &str) -> Result<PathBuf> {
        let dir = self.root.join(category);
        if fs::metadata(&dir).await.is_err() {
            fs::create_dir_all(&dir).await.map_err(|e| Error::io(&dir, e))?;
            info!(dir = %dir.display(), "Created directory");
        }
        Ok(dir)
    }

    /// Stream into `<destination>.part`, then rename over the destination.
    /// A failed transfer removes the partial file so a later size check never
    /// sees it.
    async fn stream_to_file(
        &self,
        response: Response,
        destination: &Path,
        name: &str,
        size: Option<u64>,
    ) -> Result<u64> {
        let partial_path = partial_path(destination);
        let pb = self.progress_bar(name, size);

        let result = match write_body(response, &partial_path, &pb).await {
            Ok(bytes) => fs::rename(&partial_path, destination)
                .await
                .map(|()| bytes)
                .map_err(|e| Error::io(destination, e)),
            Err(e) => Err(e),
        };
        pb.finish_and_clear();

        if result.is_err() {
            if let Err(remove_err) = fs::remove_file(&partial_path).await {
                debug!(
                    path = %partial_path.display(),
                    error = %remove_err,
                    "Could not remove partial file"
                );
            }
        }
        result
    }

    async fn unpack(&self, zip_path: &Path) {
        let path = zip_path.to_path_buf();
        match tokio::task::spawn_blocking(move || archive::extract(&path)).await {
            Ok(Ok(target)) => info!(dir = %target.display(), "Extracted"),
            Ok(Err(e)) => error!(kind = e.kind(), error = %e, "Extraction failed"),
            Err(e) => {
                error!(path = %zip_path.display(), error = %e, "Extraction task failed")
            }
        }
    }

    fn progress_bar(&self, name: &str, size: Option<u64>) -> ProgressBar {
        let pb = match size {
            Some(total) => {
                let pb = self.progress.add(ProgressBar::new(total));
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{msg:30} {bar:40} {bytes}/{total_bytes} ({bytes_per_sec})")
                {
                    pb.set_style(style.progress_chars("=>-"));
                }
                pb
            }
            None => {
                let pb = self.progress.add(ProgressBar::new_spinner());
                if let Ok(style) =
                    ProgressStyle::default_spinner().template("{msg:30} {spinner} {bytes}")
                {
                    pb.set_style(style);
                }
                pb
            }
        };
        pb.set_message(name.to_string());
        pb
    }
}

async fn write_body(mut response: Response, partial_path: &Path, pb: &ProgressBar) -> Result<u64> {
    let url = response.url().to_string();
    let mut file = fs::File::create(partial_path)
        .await
        .map_err(|e| Error::io(partial_path, e))?;

    let mut downloaded = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|source| Error::Request {
            url: url.clone(),
            source,
        })?
    {
        file.write_all(&chunk).await.map_err(|e| Error::io(partial_path, e))?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush().await.map_err(|e| Error::io(partial_path, e))?;
    Ok(downloaded)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn is_zip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}
