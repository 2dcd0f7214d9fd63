//! Full-text search index, written as `searchindex.js` for the client-side
//! search in `searchtools.js`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::document::{blocks_text, plain_text, Block, Document};
use crate::error::BuildError;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}_]+").expect("valid word pattern");
    static ref STOPWORDS: HashSet<&'static str> = [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "near", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then",
        "there", "these", "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect();
}

/// Lowercased words of `text`, without stop words and one-letter words.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|word| word.chars().count() > 1 && !STOPWORDS.contains(word.as_str()))
}

#[derive(Debug, Default, Serialize)]
pub struct SearchIndex {
    pub docnames: Vec<String>,
    pub titles: Vec<String>,
    /// Word to indices into `docnames`.
    pub terms: BTreeMap<String, BTreeSet<usize>>,
    pub titleterms: BTreeMap<String, BTreeSet<usize>>,
}

impl SearchIndex {
    /// Index documents in the given order.
    pub fn build(documents: &[&Document]) -> Self {
        let mut index = Self::default();
        for (i, doc) in documents.iter().enumerate() {
            index.docnames.push(doc.docname.clone());
            index.titles.push(doc.title.clone());

            for word in tokenize(&doc.title).chain(section_titles(&doc.blocks).flat_map(|t| tokenize(&t).collect::<Vec<_>>())) {
                index.titleterms.entry(word).or_default().insert(i);
            }
            for word in tokenize(&blocks_text(&doc.blocks)) {
                index.terms.entry(word).or_default().insert(i);
            }
        }
        index
    }

    /// The `searchindex.js` payload.
    pub fn to_js(&self) -> Result<String, serde_json::Error> {
        Ok(format!("Search.setIndex({})", serde_json::to_string(self)?))
    }

    /// Write `searchindex.js`
    pub fn write(&self, output_dir: &Path) -> Result<(), BuildError> {
        let js = self
            .to_js()
            .map_err(|e| BuildError::Config(format!("cannot serialize search index: {}", e)))?;
        let path = output_dir.join("searchindex.js");
        std::fs::write(&path, js).map_err(|e| BuildError::io(path, e))
    }
}

fn section_titles(blocks: &[Block]) -> impl Iterator<Item = String> + '_ {
    blocks.iter().filter_map(|block| match block {
        Block::Title { inlines, level, .. } if *level > 1 => Some(plain_text(inlines)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writers::testing::project;
    use tempfile::TempDir;

    #[test]
    fn test_tokenize() {
        let words: Vec<String> = tokenize("The cut_rewriting of a MIG, in 2 steps").collect();
        assert_eq!(words, vec!["cut_rewriting", "mig", "steps"]);
    }

    #[test]
    fn test_build_index() {
        let docs = project();
        let refs: Vec<&Document> = docs.iter().collect();
        let index = SearchIndex::build(&refs);

        assert_eq!(index.docnames, vec!["index", "intro", "usage"]);
        assert_eq!(index.titles[1], "Introduction");
        assert_eq!(index.titleterms["introduction"], BTreeSet::from([1]));
        assert_eq!(index.titleterms["install"], BTreeSet::from([1]));
        assert_eq!(index.terms["cut_rewriting"], BTreeSet::from([2]));
        assert!(!index.terms.contains_key("the"));
    }

    #[test]
    fn test_write_searchindex_js() {
        let docs = project();
        let refs: Vec<&Document> = docs.iter().collect();
        let out = TempDir::new().unwrap();
        SearchIndex::build(&refs).write(out.path()).unwrap();

        let js = std::fs::read_to_string(out.path().join("searchindex.js")).unwrap();
        assert!(js.starts_with("Search.setIndex({\"docnames\":[\"index\",\"intro\",\"usage\"]"));
        assert!(js.ends_with("})"));
    }
}
