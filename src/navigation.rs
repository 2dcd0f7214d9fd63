//! Navigation and document hierarchy management.
//!
//! The hierarchy is built from the toctrees found in each document, starting
//! at the master document. It provides the parent chain, previous and next
//! pages, and the toctree markup used by the sidebars. Links are relative to
//! the page they are rendered on.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::document::TocTree;
use crate::utils;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavLink {
    pub title: String,
    pub link: String,
}

impl NavLink {
    /// Create a navigation link
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Navigation context for a single page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageNavigation {
    /// Parent documents, outermost first
    pub parents: Vec<NavLink>,
    pub prev: Option<NavLink>,
    pub next: Option<NavLink>,
    pub children: Vec<NavLink>,
}

/// A section title inside a document, below the document title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub title: String,
    pub id: String,
    /// 1 for the document title's direct subsections.
    pub level: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocTreeNode {
    pub docname: String,
    pub title: String,
    /// Set for external links listed in a toctree.
    pub uri: Option<String>,
    /// Reached through a `:hidden:` toctree.
    pub hidden: bool,
    pub children: Vec<TocTreeNode>,
}

impl TocTreeNode {
    pub fn new(docname: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            docname: docname.into(),
            title: title.into(),
            uri: None,
            hidden: false,
            children: Vec::new(),
        }
    }

    /// Documents in reading order (depth-first), external links excluded.
    pub fn flatten(&self) -> Vec<(&str, &str)> {
        let mut result = Vec::new();
        if self.uri.is_none() {
            result.push((self.docname.as_str(), self.title.as_str()));
        }
        for child in &self.children {
            result.extend(child.flatten());
        }
        result
    }

    fn contains(&self, docname: &str) -> bool {
        self.uri.is_none()
            && (self.docname == docname || self.children.iter().any(|c| c.contains(docname)))
    }
}

#[derive(Debug, Default)]
pub struct NavigationBuilder {
    toctrees: HashMap<String, Vec<TocTree>>,
    titles: HashMap<String, String>,
    sections: HashMap<String, Vec<SectionEntry>>,
    master_doc: String,
}

impl NavigationBuilder {
    /// Create an empty builder rooted at `master_doc`
    pub fn new(master_doc: impl Into<String>) -> Self {
        Self {
            master_doc: master_doc.into(),
            ..Self::default()
        }
    }

    /// Record the title of a document
    pub fn register_document(&mut self, docname: &str, title: &str) {
        self.titles.insert(docname.to_string(), title.to_string());
    }

    pub fn register_sections(&mut self, docname: &str, sections: Vec<SectionEntry>) {
        self.sections.insert(docname.to_string(), sections);
    }

    /// Add a toctree found in `docname`
    pub fn register_toctree(&mut self, docname: &str, toctree: TocTree) {
        self.toctrees
            .entry(docname.to_string())
            .or_default()
            .push(toctree);
    }

    /// Title of `docname`, or the docname itself when it has none
    pub fn title(&self, docname: &str) -> String {
        self.titles
            .get(docname)
            .cloned()
            .unwrap_or_else(|| docname.to_string())
    }

    pub fn toctrees(&self, docname: &str) -> &[TocTree] {
        self.toctrees.get(docname).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build the document tree starting from the master document
    pub fn build_tree(&self) -> TocTreeNode {
        let mut visiting = HashSet::new();
        self.build_tree_for(&self.master_doc, &mut visiting)
    }

    fn build_tree_for(&self, docname: &str, visiting: &mut HashSet<String>) -> TocTreeNode {
        let mut node = TocTreeNode::new(docname, self.title(docname));
        visiting.insert(docname.to_string());

        for toctree in self.toctrees(docname) {
            for entry in &toctree.entries {
                if entry.is_external() {
                    let mut child = TocTreeNode::new(&entry.docname, entry.title.clone().unwrap_or_else(|| entry.docname.clone()));
                    child.uri = Some(entry.docname.clone());
                    child.hidden = toctree.hidden;
                    node.children.push(child);
                    continue;
                }
                // Unknown documents are reported elsewhere; cycles are cut.
                if !self.titles.contains_key(&entry.docname) || visiting.contains(&entry.docname) {
                    continue;
                }
                let mut child = self.build_tree_for(&entry.docname, visiting);
                if let Some(title) = &entry.title {
                    child.title = title.clone();
                }
                child.hidden = toctree.hidden;
                node.children.push(child);
            }
        }

        visiting.remove(docname);
        node
    }

    /// Every document reachable from the master document.
    pub fn included_documents(&self) -> HashSet<String> {
        self.build_tree()
            .flatten()
            .into_iter()
            .map(|(docname, _)| docname.to_string())
            .collect()
    }

    /// Documents in reading order.
    pub fn reading_order(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.build_tree()
            .flatten()
            .into_iter()
            .filter(|(docname, _)| seen.insert(docname.to_string()))
            .map(|(docname, _)| docname.to_string())
            .collect()
    }

    /// Get navigation context for a specific document
    pub fn get_page_navigation(&self, docname: &str) -> PageNavigation {
        let tree = self.build_tree();
        let order = self.reading_order();
        let link = |target: &str| utils::relative_uri(docname, &format!("{}.html", target));

        let mut nav = PageNavigation::default();
        if let Some(pos) = order.iter().position(|doc| doc == docname) {
            if pos > 0 {
                let prev = &order[pos - 1];
                nav.prev = Some(NavLink::new(self.title(prev), link(prev)));
            }
            if let Some(next) = order.get(pos + 1) {
                nav.next = Some(NavLink::new(self.title(next), link(next)));
            }
        }

        let mut path = Vec::new();
        if find_path_to(docname, &tree, &mut path) {
            path.pop();
        }
        nav.parents = path
            .into_iter()
            .map(|node| NavLink::new(&node.title, link(&node.docname)))
            .collect();

        if let Some(node) = find_node(&tree, docname) {
            nav.children = node
                .children
                .iter()
                .map(|child| match &child.uri {
                    Some(uri) => NavLink::new(&child.title, uri.clone()),
                    None => NavLink::new(&child.title, link(&child.docname)),
                })
                .collect();
        }

        nav
    }

    /// Render the global toctree as seen from `current`.
    pub fn render_toctree(&self, current: &str, options: &ToctreeOptions) -> String {
        let tree = self.build_tree();
        let mut html = String::new();
        for (caption, children) in self.top_level_groups(&tree) {
            let visible: Vec<&TocTreeNode> = children
                .into_iter()
                .filter(|child| options.includehidden || !child.hidden)
                .collect();
            if visible.is_empty() {
                continue;
            }
            if let Some(caption) = caption {
                html.push_str(&format!(
                    "<p class=\"caption\"><span class=\"caption-text\">{}</span></p>\n",
                    html_escape::encode_text(&caption)
                ));
            }
            let current_class = if visible.iter().any(|c| c.contains(current)) {
                " current"
            } else {
                ""
            };
            html.push_str(&format!("<ul class=\"{}\">\n", current_class.trim_start()));
            for child in visible {
                html.push_str(&self.render_toctree_node(child, 1, current, options));
            }
            html.push_str("</ul>\n");
        }
        html
    }

    /// Children of the master document, grouped by the toctree (and its
    /// caption) that lists them.
    fn top_level_groups<'t>(&self, tree: &'t TocTreeNode) -> Vec<(Option<String>, Vec<&'t TocTreeNode>)> {
        let mut groups = Vec::new();
        let mut remaining = tree.children.iter();
        for toctree in self.toctrees(&tree.docname) {
            let count = toctree
                .entries
                .iter()
                .filter(|e| e.is_external() || self.titles.contains_key(&e.docname))
                .count();
            let children: Vec<&TocTreeNode> = remaining.by_ref().take(count).collect();
            groups.push((toctree.caption.clone(), children));
        }
        groups
    }

    fn render_toctree_node(
        &self,
        node: &TocTreeNode,
        depth: usize,
        current: &str,
        options: &ToctreeOptions,
    ) -> String {
        if options.maxdepth > 0 && depth > options.maxdepth {
            return String::new();
        }

        if let Some(uri) = &node.uri {
            return format!(
                "<li class=\"toctree-l{}\"><a class=\"reference external\" href=\"{}\">{}</a></li>\n",
                depth,
                html_escape::encode_double_quoted_attribute(uri),
                html_escape::encode_text(&node.title)
            );
        }

        let on_path = node.contains(current);
        let is_current = node.docname == current;
        let href = utils::relative_uri(current, &format!("{}.html", node.docname));
        let mut html = format!(
            "<li class=\"toctree-l{}{}\"><a class=\"{}reference internal\" href=\"{}\">{}</a>",
            depth,
            if on_path { " current" } else { "" },
            if is_current { "current " } else { "" },
            html_escape::encode_double_quoted_attribute(&href),
            html_escape::encode_text(&node.title)
        );

        let expand = (options.maxdepth == 0 || depth < options.maxdepth) && (!options.collapse || on_path);
        if expand {
            let mut inner = String::new();
            if !options.titles_only {
                for section in self.sections.get(&node.docname).into_iter().flatten() {
                    if section.level == 1 {
                        inner.push_str(&format!(
                            "<li class=\"toctree-l{}\"><a class=\"reference internal\" href=\"{}#{}\">{}</a></li>\n",
                            depth + 1,
                            html_escape::encode_double_quoted_attribute(&href),
                            html_escape::encode_double_quoted_attribute(&section.id),
                            html_escape::encode_text(&section.title)
                        ));
                    }
                }
            }
            for child in &node.children {
                if options.includehidden || !child.hidden {
                    inner.push_str(&self.render_toctree_node(child, depth + 1, current, options));
                }
            }
            if !inner.is_empty() {
                html.push_str(&format!("\n<ul{}>\n", if on_path { " class=\"current\"" } else { "" }));
                html.push_str(&inner);
                html.push_str("</ul>\n");
            }
        }

        html.push_str("</li>\n");
        html
    }

    /// Markup for a `toctree` directive placed in the body of `current`.
    pub fn render_toctree_block(&self, current: &str, toctree: &TocTree) -> String {
        if toctree.hidden {
            return String::new();
        }
        let options = ToctreeOptions {
            maxdepth: toctree.maxdepth,
            collapse: false,
            includehidden: false,
            titles_only: toctree.titles_only,
        };

        let mut items = String::new();
        for entry in &toctree.entries {
            let node = if entry.is_external() {
                let mut node = TocTreeNode::new(&entry.docname, entry.title.clone().unwrap_or_else(|| entry.docname.clone()));
                node.uri = Some(entry.docname.clone());
                node
            } else if self.titles.contains_key(&entry.docname) && entry.docname != current {
                let mut visiting = HashSet::from([current.to_string()]);
                let mut node = self.build_tree_for(&entry.docname, &mut visiting);
                if let Some(title) = &entry.title {
                    node.title = title.clone();
                }
                node
            } else {
                continue;
            };
            items.push_str(&self.render_toctree_node(&node, 1, current, &options));
        }

        let mut html = String::from("<div class=\"toctree-wrapper compound\">\n");
        if let Some(caption) = &toctree.caption {
            html.push_str(&format!(
                "<p class=\"caption\" role=\"heading\"><span class=\"caption-text\">{}</span></p>\n",
                html_escape::encode_text(caption)
            ));
        }
        if !items.is_empty() {
            html.push_str("<ul>\n");
            html.push_str(&items);
            html.push_str("</ul>\n");
        }
        html.push_str("</div>\n");
        html
    }

    /// Nested list of the sections of one document.
    pub fn render_local_toc(&self, docname: &str) -> String {
        let sections = match self.sections.get(docname) {
            Some(sections) if !sections.is_empty() => sections,
            _ => return String::new(),
        };

        let mut html = format!(
            "<ul>\n<li><a class=\"reference internal\" href=\"#\">{}</a>\n<ul>\n",
            html_escape::encode_text(&self.title(docname))
        );
        let mut depth = 1;
        for section in sections {
            while depth < section.level {
                html.push_str("<ul>\n");
                depth += 1;
            }
            while depth > section.level {
                html.push_str("</ul>\n");
                depth -= 1;
            }
            html.push_str(&format!(
                "<li><a class=\"reference internal\" href=\"#{}\">{}</a></li>\n",
                html_escape::encode_double_quoted_attribute(&section.id),
                html_escape::encode_text(&section.title)
            ));
        }
        while depth > 1 {
            html.push_str("</ul>\n");
            depth -= 1;
        }
        html.push_str("</ul>\n</li>\n</ul>\n");
        html
    }

    pub fn master_doc(&self) -> &str {
        &self.master_doc
    }

    pub fn titles(&self) -> &HashMap<String, String> {
        &self.titles
    }
}

fn find_path_to<'t>(target: &str, node: &'t TocTreeNode, path: &mut Vec<&'t TocTreeNode>) -> bool {
    if node.uri.is_some() {
        return false;
    }
    path.push(node);
    if node.docname == target {
        return true;
    }
    for child in &node.children {
        if find_path_to(target, child, path) {
            return true;
        }
    }
    path.pop();
    false
}

fn find_node<'t>(tree: &'t TocTreeNode, docname: &str) -> Option<&'t TocTreeNode> {
    if tree.uri.is_none() && tree.docname == docname {
        return Some(tree);
    }
    tree.children.iter().find_map(|child| find_node(child, docname))
}

/// Options for rendering toctree
#[derive(Debug, Clone)]
pub struct ToctreeOptions {
    /// 0 means unlimited.
    pub maxdepth: usize,
    pub collapse: bool,
    pub includehidden: bool,
    pub titles_only: bool,
}

impl Default for ToctreeOptions {
    fn default() -> Self {
        Self {
            maxdepth: 4,
            collapse: true,
            includehidden: true,
            titles_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TocEntry;

    fn toctree(entries: &[&str]) -> TocTree {
        TocTree {
            caption: None,
            maxdepth: 0,
            hidden: false,
            titles_only: false,
            entries: entries.iter().map(|e| TocEntry::parse(e)).collect(),
            line: 1,
        }
    }

    fn builder() -> NavigationBuilder {
        let mut builder = NavigationBuilder::new("index");
        builder.register_document("index", "Welcome");
        builder.register_document("intro", "Introduction");
        builder.register_document("algorithms/index", "Algorithms");
        builder.register_document("algorithms/mig", "MIG rewriting");
        builder.register_toctree("index", toctree(&["intro", "algorithms/index"]));
        builder.register_toctree("algorithms/index", toctree(&["algorithms/mig"]));
        builder
    }

    #[test]
    fn test_navigation_builder() {
        let tree = builder().build_tree();
        assert_eq!(tree.title, "Welcome");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[1].children[0].docname, "algorithms/mig");
    }

    #[test]
    fn test_page_navigation_with_relative_links() {
        let nav = builder().get_page_navigation("algorithms/mig");

        assert_eq!(nav.prev, Some(NavLink::new("Algorithms", "index.html")));
        assert_eq!(nav.next, None);
        assert_eq!(
            nav.parents,
            vec![
                NavLink::new("Welcome", "../index.html"),
                NavLink::new("Algorithms", "index.html"),
            ]
        );

        let nav = builder().get_page_navigation("intro");
        assert_eq!(nav.prev.unwrap().title, "Welcome");
        assert_eq!(nav.next.unwrap().link, "algorithms/index.html");
    }

    #[test]
    fn test_explicit_title_and_cycles() {
        let mut builder = builder();
        builder.register_toctree("algorithms/mig", toctree(&["Home <index>"]));
        builder.register_toctree("intro", toctree(&["Getting Started <intro>"]));

        let tree = builder.build_tree();
        assert!(tree.children[0].children.is_empty());
        assert_eq!(builder.reading_order(), vec!["index", "intro", "algorithms/index", "algorithms/mig"]);
    }

    #[test]
    fn test_render_toctree_collapse() {
        let builder = builder();
        let collapsed = builder.render_toctree("intro", &ToctreeOptions::default());
        assert!(collapsed.contains("toctree-l1 current"));
        assert!(collapsed.contains("class=\"current reference internal\" href=\"intro.html\""));
        assert!(!collapsed.contains("MIG rewriting"));

        let expanded = builder.render_toctree(
            "intro",
            &ToctreeOptions {
                collapse: false,
                ..ToctreeOptions::default()
            },
        );
        assert!(expanded.contains("href=\"algorithms/mig.html\""));

        let shallow = builder.render_toctree(
            "algorithms/mig",
            &ToctreeOptions {
                maxdepth: 1,
                ..ToctreeOptions::default()
            },
        );
        assert!(!shallow.contains("toctree-l2"));
        assert!(shallow.contains("href=\"../intro.html\""));
    }

    #[test]
    fn test_hidden_toctree_and_caption() {
        let mut builder = NavigationBuilder::new("index");
        builder.register_document("index", "Welcome");
        builder.register_document("changelog", "Changelog");
        builder.register_document("intro", "Introduction");
        let mut hidden = toctree(&["changelog"]);
        hidden.hidden = true;
        let mut visible = toctree(&["intro"]);
        visible.caption = Some("Getting started".to_string());
        builder.register_toctree("index", hidden);
        builder.register_toctree("index", visible);

        let options = ToctreeOptions {
            includehidden: false,
            ..ToctreeOptions::default()
        };
        let html = builder.render_toctree("index", &options);
        assert!(!html.contains("Changelog"));
        assert!(html.contains("<span class=\"caption-text\">Getting started</span>"));
        assert!(builder.included_documents().contains("changelog"));
    }

    #[test]
    fn test_toctree_block_in_body() {
        let mut builder = builder();
        builder.register_sections(
            "intro",
            vec![SectionEntry { title: "Install".into(), id: "install".into(), level: 1 }],
        );
        let mut block = toctree(&["Intro <intro>", "algorithms/index", "missing"]);
        block.caption = Some("Contents".to_string());
        block.maxdepth = 2;

        let html = builder.render_toctree_block("index", &block);
        assert!(html.starts_with("<div class=\"toctree-wrapper compound\">"));
        assert!(html.contains("<span class=\"caption-text\">Contents</span>"));
        assert!(html.contains("href=\"intro.html\">Intro</a>"));
        assert!(html.contains("href=\"intro.html#install\">Install</a>"));
        assert!(html.contains("href=\"algorithms/mig.html\">MIG rewriting</a>"));
        assert!(!html.contains("missing"));

        block.hidden = true;
        assert_eq!(builder.render_toctree_block("index", &block), "");
    }

    #[test]
    fn test_local_toc() {
        let mut builder = builder();
        builder.register_sections(
            "intro",
            vec![
                SectionEntry { title: "Install".into(), id: "install".into(), level: 1 },
                SectionEntry { title: "From source".into(), id: "from-source".into(), level: 2 },
            ],
        );
        let html = builder.render_local_toc("intro");
        assert!(html.contains("href=\"#install\""));
        assert!(html.contains("<ul>\n<li><a class=\"reference internal\" href=\"#from-source\""));
        assert_eq!(builder.render_local_toc("index"), "");
    }
}
