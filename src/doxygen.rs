//! Doxygen XML access.
//!
//! Compound files (`namespacefoo.xml`, `classbar.xml`, ...) are parsed with
//! `roxmltree` into a flat list of member definitions in document order.
//! Lookups follow `compounddef/sectiondef/memberdef` and only ever return
//! the first definition with a given name.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use indexmap::IndexMap;
use log::{debug, info};
use roxmltree::{Node, ParsingOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{BuildConfig, DoxygenWhen};
use crate::document::MemberDescription;
use crate::error::BuildError;

/// XML directory used when no breathe project is configured.
pub const DEFAULT_XML_DIR: &str = "doxyxml/xml";

/// One `memberdef` element.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDef {
    /// Doxygen anchor id, used as the link target
    pub id: String,
    /// `function`, `typedef`, `variable`, ...
    pub kind: String,
    pub name: String,
    /// Declaration without arguments, e.g. `void mockturtle::refactoring`
    pub definition: String,
    /// Argument list and qualifiers
    pub argsstring: String,
    /// Text of the first `briefdescription/para`.
    pub brief: Option<String>,
    /// One entry per `detaileddescription/para`.
    pub detailed: Vec<String>,
}

impl MemberDef {
    /// Definition followed by the argument list
    pub fn signature(&self) -> String {
        let definition = if self.definition.is_empty() {
            self.name.as_str()
        } else {
            self.definition.as_str()
        };
        format!("{}{}", definition, self.argsstring)
    }

    pub fn to_description(&self) -> MemberDescription {
        MemberDescription {
            id: self.id.clone(),
            kind: self.kind.clone(),
            signature: self.signature(),
            brief: self.brief.clone(),
            detailed: self.detailed.clone(),
        }
    }
}

/// A parsed Doxygen compound file.
#[derive(Debug, Clone)]
pub struct CompoundFile {
    pub path: PathBuf,
    /// `compoundname` of each `compounddef`, in order.
    pub compounds: Vec<String>,
    members: Vec<MemberDef>,
}

impl CompoundFile {
    /// Read and parse a compound XML file
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let text = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Self::parse(path, &text)
    }

    /// Parse compound XML already in memory
    pub fn parse(path: &Path, xml: &str) -> Result<Self, BuildError> {
        let document = parse_xml(path, xml)?;
        let root = document.root_element();

        let mut compounds = Vec::new();
        let mut members = Vec::new();
        for compound in element_children(root, "compounddef") {
            if let Some(name) = child_text(compound, "compoundname") {
                compounds.push(name);
            }
            for section in element_children(compound, "sectiondef") {
                for member in element_children(section, "memberdef") {
                    members.push(parse_member(member));
                }
            }
        }

        debug!("Loaded {} members from {}", members.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            compounds,
            members,
        })
    }

    /// First member named `name`, in document order.
    pub fn find_member(&self, name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.name == name)
    }

    /// First member named `name` with the given kind
    pub fn find_member_of_kind(&self, name: &str, kind: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.name == name && m.kind == kind)
    }

    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }
}

/// Entry of `index.xml`: a member and the compound that documents it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// File stem of the compound XML, e.g. `namespacemockturtle`
    pub compound_refid: String,
    pub compound_name: String,
    pub name: String,
    pub kind: String,
}

/// The member table of a project's `index.xml`.
#[derive(Debug, Clone, Default)]
pub struct DoxygenIndex {
    entries: Vec<IndexEntry>,
}

impl DoxygenIndex {
    /// Parse the text of an `index.xml`
    pub fn parse(path: &Path, xml: &str) -> Result<Self, BuildError> {
        let document = parse_xml(path, xml)?;
        let mut entries = Vec::new();
        for compound in element_children(document.root_element(), "compound") {
            let refid = compound.attribute("refid").unwrap_or_default();
            let compound_name = child_text(compound, "name").unwrap_or_default();
            for member in element_children(compound, "member") {
                entries.push(IndexEntry {
                    compound_refid: refid.to_string(),
                    compound_name: compound_name.clone(),
                    name: child_text(member, "name").unwrap_or_default(),
                    kind: member.attribute("kind").unwrap_or_default().to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// Entries matching a possibly qualified name (`ns::member`).
    pub fn lookup<'a>(&'a self, name: &'a str, kind: &'a str) -> impl Iterator<Item = &'a IndexEntry> {
        self.entries.iter().filter(move |entry| {
            entry.kind == kind
                && (entry.name == name || format!("{}::{}", entry.compound_name, entry.name) == name)
        })
    }
}

/// The breathe project table with a cache of parsed files.
pub struct DoxygenProjects {
    source_dir: PathBuf,
    projects: IndexMap<String, PathBuf>,
    default_project: Option<String>,
    compounds: DashMap<PathBuf, Arc<CompoundFile>>,
    indexes: DashMap<PathBuf, Arc<DoxygenIndex>>,
    /// XML files read from disk so far.
    parses: AtomicUsize,
}

impl DoxygenProjects {
    /// Create an empty cache for the configured projects
    pub fn new(config: &BuildConfig, source_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            projects: config.breathe_projects.clone(),
            default_project: config.breathe_default_project.clone(),
            compounds: DashMap::new(),
            indexes: DashMap::new(),
            parses: AtomicUsize::new(0),
        }
    }

    /// XML directory of `project`, or of the default project.
    pub fn project_dir(&self, project: Option<&str>) -> Result<PathBuf, BuildError> {
        let dir = match project.or(self.default_project.as_deref()) {
            Some(name) => self
                .projects
                .get(name)
                .ok_or_else(|| BuildError::UnknownProject(name.to_string()))?,
            None => match self.projects.values().next() {
                Some(dir) => dir,
                None => Path::new(DEFAULT_XML_DIR),
            },
        };
        Ok(self.source_dir.join(dir))
    }

    /// Path of the XML file `stem` for a project
    pub fn xml_path(&self, project: Option<&str>, stem: &str) -> Result<PathBuf, BuildError> {
        Ok(self.project_dir(project)?.join(format!("{}.xml", stem)))
    }

    /// Load `<project dir>/<stem>.xml`, parsing it at most once.
    pub fn compound(&self, project: Option<&str>, stem: &str) -> Result<Arc<CompoundFile>, BuildError> {
        let path = self.xml_path(project, stem)?;
        self.compound_at(&path)
    }

    fn compound_at(&self, path: &Path) -> Result<Arc<CompoundFile>, BuildError> {
        self.load_once(&self.compounds, path, CompoundFile::load)
    }

    /// Parsed `index.xml` of a project
    pub fn index(&self, project: Option<&str>) -> Result<Arc<DoxygenIndex>, BuildError> {
        let path = self.project_dir(project)?.join("index.xml");
        self.load_once(&self.indexes, &path, |path| {
            let text = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
            DoxygenIndex::parse(path, &text)
        })
    }

    /// Cached value for `path`. The entry stays locked while `load` runs, so
    /// concurrent callers wait for the first parse instead of repeating it.
    fn load_once<T>(
        &self,
        cache: &DashMap<PathBuf, Arc<T>>,
        path: &Path,
        load: impl FnOnce(&Path) -> Result<T, BuildError>,
    ) -> Result<Arc<T>, BuildError> {
        if let Some(cached) = cache.get(path) {
            return Ok(Arc::clone(cached.value()));
        }
        match cache.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let value = Arc::new(load(path)?);
                self.parses.fetch_add(1, Ordering::Relaxed);
                entry.insert(Arc::clone(&value));
                Ok(value)
            }
        }
    }

    /// Find a member of `kind` anywhere in the project, through `index.xml`.
    pub fn find_member(
        &self,
        project: Option<&str>,
        name: &str,
        kind: &str,
    ) -> Result<Option<MemberDef>, BuildError> {
        let index = self.index(project)?;
        let short_name = name.rsplit("::").next().unwrap_or(name);
        for entry in index.lookup(name, kind) {
            let compound = self.compound(project, &entry.compound_refid)?;
            if let Some(member) = compound.find_member_of_kind(short_name, kind) {
                return Ok(Some(member.clone()));
            }
        }
        Ok(None)
    }

    /// Number of compound files cached
    pub fn cached_files(&self) -> usize {
        self.compounds.len()
    }

    /// Number of XML files parsed, compound files and indexes together.
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }
}

fn parse_xml<'a>(path: &Path, xml: &'a str) -> Result<roxmltree::Document<'a>, BuildError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    roxmltree::Document::parse_with_options(xml, options).map_err(|source| BuildError::Xml {
        path: path.to_path_buf(),
        source,
    })
}

fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.has_tag_name(tag))
}

fn child_text(node: Node<'_, '_>, tag: &'static str) -> Option<String> {
    element_children(node, tag)
        .next()
        .map(|child| normalize_whitespace(&collect_text(child, &[])))
}

fn parse_member(member: Node<'_, '_>) -> MemberDef {
    let brief = element_children(member, "briefdescription")
        .next()
        .and_then(|brief| element_children(brief, "para").next())
        .map(|para| normalize_whitespace(&collect_text(para, &[])))
        .filter(|text| !text.is_empty());

    let detailed = element_children(member, "detaileddescription")
        .next()
        .map(|detail| {
            element_children(detail, "para")
                .map(|para| {
                    normalize_whitespace(&collect_text(
                        para,
                        &["parameterlist", "simplesect", "programlisting"],
                    ))
                })
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default();

    MemberDef {
        id: member.attribute("id").unwrap_or_default().to_string(),
        kind: member.attribute("kind").unwrap_or_default().to_string(),
        name: child_text(member, "name").unwrap_or_default(),
        definition: child_text(member, "definition").unwrap_or_default(),
        argsstring: child_text(member, "argsstring").unwrap_or_default(),
        brief,
        detailed,
    }
}

/// Text of every descendant of `node`, skipping the subtrees named in `skip`.
fn collect_text(node: Node<'_, '_>, skip: &[&str]) -> String {
    let mut out = String::new();
    for child in node.children() {
        if child.is_text() {
            out.push_str(child.text().unwrap_or_default());
        } else if child.is_element() && !skip.contains(&child.tag_name().name()) {
            out.push_str(&collect_text(child, skip));
        }
    }
    out
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run the configured Doxygen command in `source_dir` if the configuration
/// asks for it. Returns whether the command ran.
pub async fn run_doxygen(config: &BuildConfig, source_dir: &Path) -> Result<bool, BuildError> {
    let command = match &config.doxygen_command {
        Some(command) => command,
        None => return Ok(false),
    };

    let should_run = match config.doxygen_when {
        DoxygenWhen::Never => false,
        DoxygenWhen::Always => true,
        DoxygenWhen::ReadTheDocs => std::env::var("READTHEDOCS").as_deref() == Ok("True"),
    };
    if !should_run {
        debug!("Skipping doxygen command `{}`", command);
        return Ok(false);
    }

    info!("Running `{}` in {}", command, source_dir.display());
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(source_dir)
        .status()
        .await
        .map_err(|e| BuildError::io(source_dir, e))?;

    if !status.success() {
        return Err(BuildError::Command {
            command: command.clone(),
            status: status.to_string(),
        });
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const NAMESPACE_XML: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='no'?>
<doxygen xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" version="1.8.17">
  <compounddef id="namespacemockturtle" kind="namespace" language="C++">
    <compoundname>mockturtle</compoundname>
    <sectiondef kind="func">
      <memberdef kind="function" id="namespacemockturtle_1a3e2f" prot="public" static="no">
        <type>void</type>
        <definition>void mockturtle::cut_rewriting</definition>
        <argsstring>(Ntk &amp;ntk, Library &amp;&amp;library)</argsstring>
        <name>cut_rewriting</name>
        <briefdescription>
          <para>Cut   rewriting   algorithm. </para>
        </briefdescription>
        <detaileddescription>
          <para>Rewrites cuts using a <ref refid="structx">library</ref>.</para>
          <para><parameterlist kind="param"><parameteritem>ntk</parameteritem></parameterlist></para>
        </detaileddescription>
      </memberdef>
      <memberdef kind="function" id="namespacemockturtle_1a9999" prot="public" static="no">
        <definition>void mockturtle::cut_rewriting</definition>
        <argsstring>(Ntk &amp;ntk)</argsstring>
        <name>cut_rewriting</name>
        <briefdescription><para>Overload.</para></briefdescription>
        <detaileddescription></detaileddescription>
      </memberdef>
      <memberdef kind="function" id="namespacemockturtle_1a0001" prot="public" static="no">
        <definition>void mockturtle::refactoring</definition>
        <argsstring>(Ntk &amp;ntk)</argsstring>
        <name>refactoring</name>
        <briefdescription></briefdescription>
        <detaileddescription></detaileddescription>
      </memberdef>
    </sectiondef>
  </compounddef>
</doxygen>
"#;

    const INDEX_XML: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='no'?>
<doxygenindex version="1.8.17">
  <compound refid="namespacemockturtle" kind="namespace"><name>mockturtle</name>
    <member refid="namespacemockturtle_1a3e2f" kind="function"><name>cut_rewriting</name></member>
  </compound>
</doxygenindex>
"#;

    #[test]
    fn test_parse_compound_members() {
        let file = CompoundFile::parse(Path::new("ns.xml"), NAMESPACE_XML).unwrap();
        assert_eq!(file.compounds, vec!["mockturtle"]);
        assert_eq!(file.members().len(), 3);

        let member = file.find_member("cut_rewriting").unwrap();
        assert_eq!(member.id, "namespacemockturtle_1a3e2f");
        assert_eq!(member.brief.as_deref(), Some("Cut rewriting algorithm."));
        assert_eq!(member.detailed, vec!["Rewrites cuts using a library."]);
        assert_eq!(
            member.signature(),
            "void mockturtle::cut_rewriting(Ntk &ntk, Library &&library)"
        );
    }

    #[test]
    fn test_find_member_returns_first_match() {
        let file = CompoundFile::parse(Path::new("ns.xml"), NAMESPACE_XML).unwrap();
        assert_eq!(file.find_member("cut_rewriting").unwrap().id, "namespacemockturtle_1a3e2f");
        assert!(file.find_member("missing").is_none());
        assert_eq!(file.find_member("refactoring").unwrap().brief, None);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let err = CompoundFile::parse(Path::new("bad.xml"), "<doxygen><compounddef>").unwrap_err();
        assert!(matches!(err, BuildError::Xml { .. }));
        assert!(err.to_string().contains("bad.xml"));
    }

    #[test]
    fn test_projects_cache_and_index_lookup() {
        let temp = TempDir::new().unwrap();
        let xml_dir = temp.path().join("doxyxml/xml");
        fs::create_dir_all(&xml_dir).unwrap();
        fs::write(xml_dir.join("namespacemockturtle.xml"), NAMESPACE_XML).unwrap();
        fs::write(xml_dir.join("index.xml"), INDEX_XML).unwrap();

        let mut config = BuildConfig::default();
        config
            .breathe_projects
            .insert("mockturtle".to_string(), PathBuf::from("doxyxml/xml"));
        config.breathe_default_project = Some("mockturtle".to_string());
        let projects = DoxygenProjects::new(&config, temp.path());

        let a = projects.compound(None, "namespacemockturtle").unwrap();
        let b = projects.compound(Some("mockturtle"), "namespacemockturtle").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(projects.cached_files(), 1);

        let member = projects
            .find_member(None, "mockturtle::cut_rewriting", "function")
            .unwrap()
            .unwrap();
        assert_eq!(member.id, "namespacemockturtle_1a3e2f");
        assert!(projects.find_member(None, "cut_rewriting", "variable").unwrap().is_none());

        assert!(matches!(
            projects.compound(Some("other"), "x"),
            Err(BuildError::UnknownProject(name)) if name == "other"
        ));
        assert!(matches!(
            projects.compound(None, "missing"),
            Err(BuildError::Io { .. })
        ));
    }

    #[test]
    fn test_concurrent_lookups_parse_each_file_once() {
        use rayon::prelude::*;

        let temp = TempDir::new().unwrap();
        let xml_dir = temp.path().join("doxyxml/xml");
        fs::create_dir_all(&xml_dir).unwrap();
        fs::write(xml_dir.join("namespacemockturtle.xml"), NAMESPACE_XML).unwrap();
        fs::write(xml_dir.join("index.xml"), INDEX_XML).unwrap();
        let projects = DoxygenProjects::new(&BuildConfig::default(), temp.path());

        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        let compounds: Vec<Arc<CompoundFile>> = pool.install(|| {
            (0..64)
                .into_par_iter()
                .map(|_| {
                    projects.index(None).unwrap();
                    projects.compound(None, "namespacemockturtle").unwrap()
                })
                .collect()
        });

        assert!(compounds.iter().all(|c| Arc::ptr_eq(c, &compounds[0])));
        assert_eq!(projects.cached_files(), 1);
        assert_eq!(projects.parse_count(), 2);
    }

    #[test]
    fn test_default_xml_dir_without_projects() {
        let projects = DoxygenProjects::new(&BuildConfig::default(), Path::new("/docs"));
        assert_eq!(
            projects.xml_path(None, "namespacemockturtle").unwrap(),
            PathBuf::from("/docs/doxyxml/xml/namespacemockturtle.xml")
        );
    }

    #[tokio::test]
    async fn test_run_doxygen_respects_when() {
        let temp = TempDir::new().unwrap();
        let mut config = BuildConfig {
            doxygen_command: Some("touch ran".to_string()),
            ..BuildConfig::default()
        };
        assert!(!run_doxygen(&config, temp.path()).await.unwrap());
        assert!(!temp.path().join("ran").exists());

        config.doxygen_when = DoxygenWhen::Always;
        assert!(run_doxygen(&config, temp.path()).await.unwrap());
        assert!(temp.path().join("ran").exists());

        config.doxygen_command = Some("exit 3".to_string());
        assert!(matches!(
            run_doxygen(&config, temp.path()).await,
            Err(BuildError::Command { .. })
        ));
    }
}
