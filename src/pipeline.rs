//! Worklist driver: every page fetch or download is one item; items that
//! discover links push follow-up items. Entries never wait on each other.

use crate::config::Config;
use crate::downloader::{Downloader, FetchOutcome};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::models::Descriptor;
use crate::resolver;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub enum WorkItem {
    /// Fetch `url` and apply `descriptor.selectors[depth]`.
    Page {
        url: Url,
        depth: usize,
        descriptor: Arc<Descriptor>,
    },
    /// Hand `url` to the downloader.
    Download {
        url: Url,
        referer: Option<Url>,
        descriptor: Arc<Descriptor>,
    },
}

impl WorkItem {
    /// The first item for a catalogue entry. The start URL and every
    /// selector of the chain are checked here, before any request.
    pub fn seed(descriptor: Descriptor) -> Result<Self> {
        let url = Url::parse(&descriptor.start_url).map_err(|e| Error::InvalidUrl {
            url: descriptor.start_url.clone(),
            reason: e.to_string(),
        })?;
        for selector in &descriptor.selectors {
            resolver::parse_selector(selector)?;
        }
        let descriptor = Arc::new(descriptor);

        Ok(if descriptor.is_direct() {
            WorkItem::Download {
                url,
                referer: None,
                descriptor,
            }
        } else {
            WorkItem::Page {
                url,
                depth: 0,
                descriptor,
            }
        })
    }

    fn url(&self) -> &Url {
        match self {
            WorkItem::Page { url, .. } | WorkItem::Download { url, .. } => url,
        }
    }
}

/// Result of processing one work item.
#[derive(Debug)]
enum Step {
    FollowUps(Vec<WorkItem>),
    Fetched(FetchOutcome),
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub downloaded: usize,
    pub up_to_date: usize,
    pub failed: usize,
    /// Pages where the selector yielded no links.
    pub empty_pages: usize,
    /// Entries excluded by `--category`/`--filter`.
    pub skipped: usize,
}

pub struct Pipeline {
    client: HttpClient,
    downloader: Downloader,
    config: Arc<Config>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let client = HttpClient::new(config.proxy.as_deref())?;
        let downloader = Downloader::new(
            client.clone(),
            config.downloads_root.clone(),
            config.show_progress,
        );

        Ok(Self {
            client,
            downloader,
            config: Arc::new(config),
        })
    }

    /// Process every admitted entry until no work is left. Individual
    /// failures are logged and counted; they never stop the run.
    pub async fn run(&self, catalogue: Vec<Descriptor>) -> Summary {
        let mut summary = Summary::default();
        let semaphore = Arc::new(Semaphore::new(self.config.jobs.max(1)));
        let mut running: FuturesUnordered<JoinHandle<Step>> = FuturesUnordered::new();

        for descriptor in catalogue {
            if !self.config.filter.admits(&descriptor) {
                debug!(url = %descriptor.start_url, "Filtered out");
                summary.skipped += 1;
                continue;
            }
            if descriptor.category().is_none() {
                let err = Error::MissingCategory {
                    url: descriptor.start_url.clone(),
                };
                error!(kind = err.kind(), error = %err, "Skipping entry");
                summary.failed += 1;
                continue;
            }

            match WorkItem::seed(descriptor) {
                Ok(item) => running.push(self.spawn(item, &semaphore)),
                Err(e) => {
                    error!(kind = e.kind(), error = %e, "Skipping entry");
                    summary.failed += 1;
                }
            }
        }

        while let Some(joined) = running.next().await {
            match joined {
                Ok(Step::FollowUps(items)) => {
                    if items.is_empty() {
                        summary.empty_pages += 1;
                    }
                    for item in items {
                        running.push(self.spawn(item, &semaphore));
                    }
                }
                Ok(Step::Fetched(FetchOutcome::Downloaded { .. })) => summary.downloaded += 1,
                Ok(Step::Fetched(FetchOutcome::UpToDate { .. })) => summary.up_to_date += 1,
                Ok(Step::Failed) => summary.failed += 1,
                Err(e) => {
                    error!(error = %e, "Worker task failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            downloaded = summary.downloaded,
            up_to_date = summary.up_to_date,
            failed = summary.failed,
            empty_pages = summary.empty_pages,
            skipped = summary.skipped,
            "Done"
        );
        summary
    }

    fn spawn(&self, item: WorkItem, semaphore: &Arc<Semaphore>) -> JoinHandle<Step> {
        let client = self.client.clone();
        let downloader = self.downloader.clone();
        let semaphore = Arc::clone(semaphore);

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Step::Failed;
            };
            process(&client, &downloader, item).await
        })
    }
}

async fn process(client: &HttpClient, downloader: &Downloader, item: WorkItem) -> Step {
    let url = item.url().clone();
    let result = match item {
        WorkItem::Page {
            url,
            depth,
            descriptor,
        } => resolve(client, url, depth, descriptor).await.map(Step::FollowUps),
        WorkItem::Download {
            url,
            referer,
            descriptor,
        } => downloader
            .fetch(&url, &descriptor, referer.as_ref())
            .await
            .map(Step::Fetched),
    };

    result.unwrap_or_else(|e| {
        match e.headers() {
            Some(headers) => error!(%url, kind = e.kind(), error = %e, ?headers, "Failed"),
            None => error!(%url, kind = e.kind(), error = %e, "Failed"),
        }
        Step::Failed
    })
}

/// One hop of a selector chain: the links found on `url` become page items
/// for the next selector, or download items once the chain is used up.
async fn resolve(
    client: &HttpClient,
    url: Url,
    depth: usize,
    descriptor: Arc<Descriptor>,
) -> Result<Vec<WorkItem>> {
    let Some(selector) = descriptor.selectors.get(depth) else {
        return Ok(vec![WorkItem::Download {
            url,
            referer: None,
            descriptor,
        }]);
    };
    debug!(%url, selector = %selector, depth, "Parsing page");

    let links = resolver::resolve_page(client, &url, selector).await?;
    if links.is_empty() {
        warn!(%url, selector = %selector, "Nothing found");
    }

    let last_hop = depth + 1 >= descriptor.selectors.len();
    Ok(links
        .into_iter()
        .map(|link| {
            if last_hop {
                WorkItem::Download {
                    url: link,
                    referer: Some(url.clone()),
                    descriptor: Arc::clone(&descriptor),
                }
            } else {
                WorkItem::Page {
                    url: link,
                    depth: depth + 1,
                    descriptor: Arc::clone(&descriptor),
                }
            }
        })
        .collect())
}
