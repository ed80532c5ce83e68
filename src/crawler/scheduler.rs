use rand::seq::SliceRandom;
use tracing::debug;

use crate::crawler::model::{Newspaper, Page};

/// The fixed work-list of fetchable pages for one newspaper.
///
/// Built once per worker lifetime; every pass of the crawl loop drains a
/// freshly shuffled copy so the access pattern is not scrapable while each
/// page is still visited exactly once per pass.
pub struct WorkList {
    pages: Vec<Page>,
}

impl WorkList {
    /// Build the interleaved work-list for a newspaper.
    ///
    /// Top-level pages with a link template come first, in input order.
    /// Child pages follow breadth-first by child index: for each index i,
    /// every top-level page's i-th child (when present and fetchable), again
    /// iterating top-level pages in input order. This round-robins across
    /// sections so no single section's deep pagination starves the others.
    pub fn build(newspaper: &Newspaper) -> Self {
        let top_level: Vec<&Page> = newspaper
            .pages
            .iter()
            .filter(|page| page.is_top_level())
            .collect();

        // Ordered child list per top-level page.
        let child_lists: Vec<Vec<&Page>> = top_level
            .iter()
            .map(|parent| {
                newspaper
                    .pages
                    .iter()
                    .filter(|page| page.parent_page_id.as_deref() == Some(parent.id.as_str()))
                    .collect()
            })
            .collect();

        let max_children = child_lists.iter().map(|list| list.len()).max().unwrap_or(0);

        let mut pages = Vec::new();

        for page in &top_level {
            if page.is_fetchable() {
                pages.push((*page).clone());
            }
        }

        for i in 0..max_children {
            for children in &child_lists {
                if let Some(page) = children.get(i) {
                    if page.is_fetchable() {
                        pages.push((*page).clone());
                    }
                }
            }
        }

        debug!(
            "Built work-list of {} fetchable pages for newspaper {}",
            pages.len(),
            newspaper.id
        );

        Self { pages }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Pages in their canonical interleaved order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// A random permutation of the work-list for one pass of the crawl loop.
    ///
    /// Uses the thread rng (OS-reseeded) rather than a fixed-seed generator,
    /// so orderings are uncorrelated across passes and restarts.
    pub fn shuffled_pass(&self) -> Vec<Page> {
        let mut pass = self.pages.clone();
        pass.shuffle(&mut rand::thread_rng());
        pass
    }
}
