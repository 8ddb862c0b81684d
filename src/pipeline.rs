use tracing::{debug, warn};

use crate::dedup::DedupSet;
use crate::error::PipelineError;
use crate::hooks::Hooks;
use crate::item::Item;
use crate::progress::SkipReason;

/// What the pipeline decided for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip(SkipReason),
    /// The item survived; `path` is its directory relative to the output root
    Keep { index: usize, path: String },
}

/// Filter and naming stages for one run.
///
/// Items must be fed in their final order: both the dedup set and the
/// survival index depend on it.
pub struct Pipeline<'a> {
    hooks: &'a Hooks,
    dedup: DedupSet,
    index: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(hooks: &'a Hooks) -> Self {
        Self {
            hooks,
            dedup: DedupSet::new(),
            index: 0,
        }
    }

    /// Number of items that passed every filter so far
    pub fn survivors(&self) -> usize {
        self.index
    }

    /// Run an item through normalize, dedup, include, exclude, item path
    /// and sanitize, stopping at the first rejection.
    ///
    /// The item's name is replaced by its normalized form.
    pub async fn evaluate(&mut self, item: &mut Item) -> Result<Decision, PipelineError> {
        item.name = self
            .hooks
            .normalize
            .transform(&item.name, &[])
            .await
            .map_err(PipelineError::Normalize)?;

        if self.dedup.seen(&item.name) {
            debug!(item = %item.name, "deduplicated");
            return Ok(Decision::Skip(SkipReason::Duplicate));
        }

        let included = self
            .hooks
            .include
            .matches(&item.name)
            .await
            .map_err(PipelineError::Include)?;
        if !included {
            debug!(item = %item.name, "+filtered");
            return Ok(Decision::Skip(SkipReason::NotIncluded));
        }

        let excluded = self
            .hooks
            .exclude
            .matches(&item.name)
            .await
            .map_err(PipelineError::Exclude)?;
        if excluded {
            debug!(item = %item.name, "-filtered");
            return Ok(Decision::Skip(SkipReason::Excluded));
        }

        let index = self.index;
        self.index += 1;

        let index_var = index.to_string();
        let env = [
            ("INDEX", index_var.as_str()),
            ("NAME", item.name.as_str()),
            ("FEED", item.feed_name.as_str()),
        ];
        let path = self
            .hooks
            .item_path
            .transform(&item.name, &env)
            .await
            .map_err(PipelineError::ItemPath)?;

        let path = self
            .hooks
            .sanitize
            .transform(&path, &[])
            .await
            .map_err(PipelineError::Sanitize)?;

        if path.trim().is_empty() {
            warn!(item = %item.name, "item path is empty after sanitizing");
            return Ok(Decision::Skip(SkipReason::EmptyPath));
        }

        Ok(Decision::Keep { index, path })
    }
}
