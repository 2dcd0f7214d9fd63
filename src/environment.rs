//! Project-wide data collected after directives are expanded: document
//! titles, section anchors, labels and the toctree hierarchy.

use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::document::{plain_text, Block, Document, TocTree};
use crate::error::{BuildWarning, WarningKind};
use crate::navigation::{NavigationBuilder, SectionEntry};
use crate::utils;

/// Where a `.. _label:` points.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelInfo {
    pub docname: String,
    pub anchor: String,
    /// Title of the section the label precedes, if any.
    pub title: Option<String>,
}

#[derive(Debug, Default)]
pub struct BuildEnvironment {
    titles: BTreeMap<String, String>,
    source_paths: HashMap<String, PathBuf>,
    labels: HashMap<String, LabelInfo>,
    navigation: NavigationBuilder,
}

impl BuildEnvironment {
    /// Collect project data from resolved documents. Returns the warnings
    /// about toctrees, orphans and duplicate labels.
    pub fn collect(master_doc: &str, documents: &[Document]) -> (Self, Vec<BuildWarning>) {
        let mut env = Self {
            navigation: NavigationBuilder::new(master_doc),
            ..Self::default()
        };
        let mut warnings = Vec::new();

        for doc in documents {
            env.titles.insert(doc.docname.clone(), doc.title.clone());
            env.source_paths
                .insert(doc.docname.clone(), doc.source_path.clone());
            env.navigation.register_document(&doc.docname, &doc.title);
            env.navigation
                .register_sections(&doc.docname, collect_sections(&doc.blocks));
        }

        for doc in documents {
            env.collect_labels(doc, &mut warnings);
            for toctree in collect_toctrees(&doc.blocks) {
                for entry in &toctree.entries {
                    if !entry.is_external() && !env.titles.contains_key(&entry.docname) {
                        warnings.push(BuildWarning::missing_toctree_ref(
                            doc.source_path.clone(),
                            Some(toctree.line),
                            &entry.docname,
                        ));
                    }
                }
                env.navigation.register_toctree(&doc.docname, toctree.clone());
            }
        }

        let included = env.navigation.included_documents();
        for doc in documents {
            if doc.docname != master_doc && !included.contains(&doc.docname) {
                warnings.push(BuildWarning::orphaned_document(doc.source_path.clone()));
            }
        }

        debug!(
            "Environment: {} documents, {} labels",
            env.titles.len(),
            env.labels.len()
        );
        (env, warnings)
    }

    fn collect_labels(&mut self, doc: &Document, warnings: &mut Vec<BuildWarning>) {
        let mut blocks = doc.blocks.iter().peekable();
        while let Some(block) = blocks.next() {
            let name = match block {
                Block::Target(name) => name,
                _ => continue,
            };

            // A label directly before a section title points at the section.
            let info = match blocks.peek() {
                Some(Block::Title { inlines, id, .. }) => LabelInfo {
                    docname: doc.docname.clone(),
                    anchor: id.clone(),
                    title: Some(plain_text(inlines)),
                },
                _ => LabelInfo {
                    docname: doc.docname.clone(),
                    anchor: utils::make_id(name),
                    title: None,
                },
            };

            if let Some(existing) = self.labels.get(name) {
                warnings.push(BuildWarning::new(
                    WarningKind::DuplicateLabel,
                    doc.source_path.clone(),
                    None,
                    format!(
                        "duplicate label {}, other instance in {}",
                        name, existing.docname
                    ),
                ));
                continue;
            }
            self.labels.insert(name.clone(), info);
        }
    }

    /// Whether `docname` is part of the build
    pub fn contains(&self, docname: &str) -> bool {
        self.titles.contains_key(docname)
    }

    pub fn title(&self, docname: &str) -> Option<&str> {
        self.titles.get(docname).map(String::as_str)
    }

    /// Target of a `:ref:` label
    pub fn label(&self, name: &str) -> Option<&LabelInfo> {
        self.labels.get(name)
    }

    pub fn source_path(&self, docname: &str) -> Option<&Path> {
        self.source_paths.get(docname).map(PathBuf::as_path)
    }

    pub fn docnames(&self) -> impl Iterator<Item = &str> {
        self.titles.keys().map(String::as_str)
    }

    pub fn navigation(&self) -> &NavigationBuilder {
        &self.navigation
    }

    /// Documents reachable from `start` through toctrees, in reading order.
    pub fn documents_under(&self, start: &str) -> Vec<String> {
        self.toc_walk(start).into_iter().map(|(docname, _)| docname).collect()
    }

    /// Like [`documents_under`](Self::documents_under), with each
    /// document's toctree depth below `start`.
    pub fn toc_walk(&self, start: &str) -> Vec<(String, usize)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.walk(start, 0, &mut seen, &mut out);
        out
    }

    fn walk(
        &self,
        docname: &str,
        depth: usize,
        seen: &mut HashSet<String>,
        out: &mut Vec<(String, usize)>,
    ) {
        if !self.contains(docname) || !seen.insert(docname.to_string()) {
            return;
        }
        out.push((docname.to_string(), depth));
        for toctree in self.navigation.toctrees(docname) {
            for entry in &toctree.entries {
                if !entry.is_external() {
                    self.walk(&entry.docname, depth + 1, seen, out);
                }
            }
        }
    }
}

/// Section titles below the document title.
fn collect_sections(blocks: &[Block]) -> Vec<SectionEntry> {
    blocks
        .iter()
        .filter_map(|block| match block {
            Block::Title { inlines, level, id, .. } if *level > 1 => Some(SectionEntry {
                title: plain_text(inlines),
                id: id.clone(),
                level: level - 1,
            }),
            _ => None,
        })
        .collect()
}

/// Toctrees anywhere in a block tree, in document order.
pub fn collect_toctrees(blocks: &[Block]) -> Vec<&TocTree> {
    let mut out = Vec::new();
    for block in blocks {
        match block {
            Block::TocTree(toctree) => out.push(toctree),
            Block::BlockQuote(body) | Block::Admonition { body, .. } => {
                out.extend(collect_toctrees(body))
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Inline, TocEntry};

    fn title(text: &str, level: usize) -> Block {
        Block::Title {
            inlines: vec![Inline::Text(text.to_string())],
            level,
            id: utils::make_id(text),
            line: 1,
        }
    }

    fn toctree(entries: &[&str]) -> Block {
        Block::TocTree(TocTree {
            caption: None,
            maxdepth: 2,
            hidden: false,
            titles_only: false,
            entries: entries.iter().map(|e| TocEntry::parse(e)).collect(),
            line: 5,
        })
    }

    fn doc(docname: &str, blocks: Vec<Block>) -> Document {
        let mut doc = Document::new(PathBuf::from(format!("{}.rst", docname)), docname);
        doc.title = crate::document::plain_text(match &blocks[0] {
            Block::Title { inlines, .. } => inlines,
            _ => panic!("first block must be a title"),
        });
        doc.blocks = blocks;
        doc
    }

    #[test]
    fn test_missing_references_and_orphans() {
        let documents = vec![
            doc("index", vec![title("mockturtle", 1), toctree(&["intro", "missing"])]),
            doc("intro", vec![title("Introduction", 1)]),
            doc("scratch", vec![title("Scratch", 1)]),
        ];
        let (env, warnings) = BuildEnvironment::collect("index", &documents);

        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, WarningKind::MissingToctreeRef);
        assert_eq!(warnings[0].line, Some(5));
        assert!(warnings[0].message.contains("'missing'"));
        assert_eq!(warnings[1].kind, WarningKind::OrphanedDocument);
        assert_eq!(warnings[1].file, PathBuf::from("scratch.rst"));
        assert_eq!(env.title("intro"), Some("Introduction"));
    }

    #[test]
    fn test_labels() {
        let documents = vec![
            doc(
                "index",
                vec![
                    title("mockturtle", 1),
                    Block::Target("getting started".to_string()),
                    title("Getting Started", 2),
                    Block::Target("loose".to_string()),
                    Block::Paragraph(vec![Inline::Text("text".to_string())]),
                ],
            ),
            doc("other", vec![title("Other", 1), Block::Target("loose".to_string())]),
        ];
        let (env, warnings) = BuildEnvironment::collect("index", &documents);

        assert_eq!(
            env.label("getting started"),
            Some(&LabelInfo {
                docname: "index".to_string(),
                anchor: "getting-started".to_string(),
                title: Some("Getting Started".to_string()),
            })
        );
        assert_eq!(env.label("loose").map(|l| l.anchor.as_str()), Some("loose"));
        assert!(warnings.iter().any(|w| w.kind == WarningKind::DuplicateLabel));
    }

    #[test]
    fn test_documents_under() {
        let documents = vec![
            doc("index", vec![title("mockturtle", 1), toctree(&["a", "b"])]),
            doc("a", vec![title("A", 1), toctree(&["a1"])]),
            doc("a1", vec![title("A1", 1)]),
            doc("b", vec![title("B", 1)]),
        ];
        let (env, _) = BuildEnvironment::collect("index", &documents);
        assert_eq!(env.documents_under("index"), vec!["index", "a", "a1", "b"]);
        assert_eq!(env.documents_under("a"), vec!["a", "a1"]);
        assert_eq!(
            env.toc_walk("index"),
            vec![
                ("index".to_string(), 0),
                ("a".to_string(), 1),
                ("a1".to_string(), 2),
                ("b".to_string(), 1)
            ]
        );
        assert!(env.documents_under("missing").is_empty());
    }
}
