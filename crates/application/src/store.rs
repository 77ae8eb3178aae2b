use std::collections::HashMap;

use overtype_core::{RunId, TextRun};

/// Editable runs of one loaded document, in page then extraction order.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    runs: Vec<TextRun>,
    index: HashMap<RunId, usize>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_runs(runs: Vec<TextRun>) -> Self {
        let mut store = Self::new();
        store.replace_all(runs);
        store
    }

    /// Replaces the whole collection. A repeated id keeps its first run.
    pub fn replace_all(&mut self, runs: Vec<TextRun>) {
        let mut index = HashMap::with_capacity(runs.len());
        let mut kept = Vec::with_capacity(runs.len());
        for run in runs {
            if index.contains_key(&run.id) {
                continue;
            }
            index.insert(run.id.clone(), kept.len());
            kept.push(run);
        }
        self.runs = kept;
        self.index = index;
    }

    /// Updates only the text of `id`. Returns `false` for an unknown id.
    pub fn set_text(&mut self, id: &RunId, text: impl Into<String>) -> bool {
        let Some(&pos) = self.index.get(id) else {
            return false;
        };
        self.runs[pos].text = text.into();
        true
    }

    pub fn get(&self, id: &RunId) -> Option<&TextRun> {
        self.index.get(id).map(|&pos| &self.runs[pos])
    }

    pub fn all_for_page(&self, page_index: u32) -> PageRuns<'_> {
        PageRuns {
            runs: self.runs.iter(),
            page_index,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TextRun> {
        self.runs.iter()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Highest page index referenced by any run.
    pub fn max_page(&self) -> u32 {
        self.runs.iter().map(|r| r.page_index).max().unwrap_or(0)
    }

    pub fn to_vec(&self) -> Vec<TextRun> {
        self.runs.clone()
    }
}

/// Lazy view over one page's runs. Clone it to iterate again.
#[derive(Debug, Clone)]
pub struct PageRuns<'a> {
    runs: std::slice::Iter<'a, TextRun>,
    page_index: u32,
}

impl<'a> Iterator for PageRuns<'a> {
    type Item = &'a TextRun;

    fn next(&mut self) -> Option<Self::Item> {
        let page_index = self.page_index;
        self.runs.by_ref().find(|run| run.page_index == page_index)
    }
}
