use crate::catalogue::category_dir;
use crate::cli::Args;
use crate::models::Descriptor;
use std::path::PathBuf;

/// Restrictions from `--category` and `--filter`, applied before any
/// network I/O for an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    category: Option<String>,
    needle: Option<String>,
}

impl CategoryFilter {
    pub fn new(category: Option<&str>, needle: Option<&str>) -> Self {
        Self {
            category: category.map(|c| category_dir(c).to_string()),
            needle: needle.filter(|n| !n.is_empty()).map(str::to_string),
        }
    }

    pub fn admits(&self, descriptor: &Descriptor) -> bool {
        if let Some(category) = &self.category {
            if descriptor.category() != Some(category.as_str()) {
                return false;
            }
        }
        match &self.needle {
            Some(needle) => {
                descriptor.start_url.contains(needle.as_str())
                    || descriptor.name_prefix.contains(needle.as_str())
            }
            None => true,
        }
    }
}

/// Everything a run needs, fixed before the first request goes out.
#[derive(Debug, Clone)]
pub struct Config {
    pub downloads_root: PathBuf,
    pub filter: CategoryFilter,
    /// Upper bound on requests in flight.
    pub jobs: usize,
    pub proxy: Option<String>,
    pub show_progress: bool,
}

impl Config {
    pub fn new(downloads_root: impl Into<PathBuf>) -> Self {
        Self {
            downloads_root: downloads_root.into(),
            filter: CategoryFilter::default(),
            jobs: 4,
            proxy: None,
            show_progress: false,
        }
    }

    pub fn from_args(args: &Args) -> Self {
        Self {
            downloads_root: PathBuf::from(&args.output),
            filter: CategoryFilter::new(args.category.as_deref(), args.filter.as_deref()),
            jobs: args.jobs.max(1),
            proxy: args.proxy.clone(),
            show_progress: !args.no_progress,
        }
    }
}
