//! XML directory sources.
//!
//! Layout, for a run scoped at a country:
//!
//! ```text
//! <root>/
//!   repo-001.xml          one record (EAG)
//!   repo-001/             children of repo-001.xml
//!     item-01.xml         one record (EAD)
//!     item-01/            children of item-01.xml
//!   repo-002/             no repo-002.xml: records scoped under the
//!     item-01.xml         existing entity "repo-002" of the run scope
//! ```
//!
//! Each file holds one record, plus any EAD components nested in it. Field
//! paths are element names below the root element joined with `/`;
//! attributes are `<element path>/@name`.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use arkiv_core::record::{ImportRecord, SourceFormat};
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{RecordSource, SourceEntry};
use crate::error::PipelineError;

const EXTENSION: &str = "xml";

/// A directory tree of XML record files.
#[derive(Debug, Clone)]
pub struct XmlSource {
    root: PathBuf,
}

impl XmlSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn location(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn list(&self, dir: &Path, allow_scope_units: bool) -> Result<Vec<SourceEntry>, PipelineError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| PipelineError::io(dir, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()
            .map_err(|e| PipelineError::io(dir, e))?;
        paths.sort();

        let stems: HashSet<String> = paths
            .iter()
            .filter(|p| is_record_file(p))
            .filter_map(|p| file_stem(p))
            .collect();

        let mut entries = Vec::new();
        for path in paths {
            if is_record_file(&path) {
                entries.push(SourceEntry::File {
                    location: self.location(&path),
                    path,
                });
            } else if path.is_dir() {
                if is_symlink(&path) {
                    tracing::warn!(dir = %self.location(&path), "Ignoring symlinked directory");
                    continue;
                }
                let Some(name) = file_name(&path) else { continue };
                if stems.contains(&name) {
                    continue;
                }
                if allow_scope_units {
                    entries.push(SourceEntry::ScopeUnit {
                        key: name,
                        location: self.location(&path),
                        dir: path,
                    });
                } else {
                    tracing::warn!(dir = %self.location(&path), "Ignoring directory without a parent record");
                }
            }
        }
        Ok(entries)
    }
}

impl RecordSource for XmlSource {
    fn roots(&self) -> Result<Vec<SourceEntry>, PipelineError> {
        if !self.root.is_dir() {
            return Err(PipelineError::Config(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        self.list(&self.root, true)
    }

    fn children(&self, dir: &Path) -> Result<Vec<SourceEntry>, PipelineError> {
        self.list(dir, false)
    }

    fn read(&self, path: &Path, location: &str) -> Result<ImportRecord, PipelineError> {
        let bytes = fs::read(path).map_err(|e| PipelineError::io(path, e))?;
        let source_id = file_stem(path).unwrap_or_default();
        let mut record = parse_record(&bytes, location, &source_id)?;
        let children = path.with_extension("");
        if children.is_dir() && !is_symlink(&children) {
            record.children = Some(children);
        }
        Ok(record)
    }

    /// Counts record files. Symlinked directories are not followed.
    fn count_records(&self, dir: &Path) -> u64 {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        entries
            .filter_map(Result::ok)
            .map(|entry| match entry.file_type() {
                Ok(t) if t.is_dir() => self.count_records(&entry.path()),
                Ok(t) if t.is_file() && has_record_extension(&entry.path()) => 1,
                _ => 0,
            })
            .sum()
    }
}

fn has_record_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION))
}

fn is_record_file(path: &Path) -> bool {
    path.is_file() && has_record_extension(path)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|s| s.to_string_lossy().into_owned())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Element whose field paths nested components reuse.
const COMPONENT_BASE: &str = "archdesc";

/// Document language, inherited by components.
const EAD_LANGUAGE_PATH: &str = "eadheader/profiledesc/langusage/language/@langcode";

/// One open element: its name and the text collected directly inside it.
struct Frame {
    name: String,
    text: String,
}

/// A record being collected: the document itself or a component nested in
/// it.
struct Pending {
    /// Stack index of the element that opened the record.
    opened_at: usize,
    base: &'static str,
    location: String,
    fields: Vec<(String, String)>,
    components: Vec<ImportRecord>,
    opened: usize,
}

impl Pending {
    fn new(opened_at: usize, base: &'static str, location: String) -> Self {
        Self {
            opened_at,
            base,
            location,
            fields: Vec::new(),
            components: Vec::new(),
            opened: 0,
        }
    }

    /// Path of the innermost open element, relative to this record.
    fn path(&self, stack: &[Frame]) -> String {
        let below = stack.get(self.opened_at + 1..).unwrap_or_default();
        std::iter::once(self.base)
            .chain(below.iter().map(|f| f.name.as_str()))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Location of the next component opened inside this record.
    fn next_component_location(&mut self, is_document: bool) -> String {
        self.opened += 1;
        let sep = if is_document { '#' } else { '.' };
        format!("{}{sep}{}", self.location, self.opened)
    }

    fn into_record(self, source_id: &str, format: SourceFormat) -> ImportRecord {
        let mut record = ImportRecord::new(self.location, source_id, format);
        record.fields = self.fields;
        record.components = self.components;
        record
    }
}

/// `c` or a numbered `c01`..`c12`.
fn is_component(name: &str) -> bool {
    name.strip_prefix('c')
        .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
}

fn local_name(e: &BytesStart<'_>, decoder: Decoder, location: &str) -> Result<String, PipelineError> {
    decoder
        .decode(e.local_name().as_ref())
        .map(Cow::into_owned)
        .map_err(|err| PipelineError::source_error(location, err))
}

fn innermost<'p>(pending: &'p mut [Pending], location: &str) -> Result<&'p mut Pending, PipelineError> {
    pending
        .last_mut()
        .ok_or_else(|| PipelineError::source_error(location, "content outside the root element"))
}

/// Parse one XML document into a record. The root element selects the
/// format; the document must be well formed. Text is decoded with the
/// encoding the document declares, UTF-8 if none.
///
/// EAD components (`c`, `c01`..`c12`) below `dsc` or another component
/// become nested child records, their fields mapped like `archdesc`.
pub fn parse_record(xml: &[u8], location: &str, source_id: &str) -> Result<ImportRecord, PipelineError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut pending: Vec<Pending> = Vec::new();
    let mut format: Option<SourceFormat> = None;
    let mut finished = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            PipelineError::source_error(
                location,
                format!("{e} at byte {}", reader.error_position()),
            )
        })?;
        let decoder = reader.decoder();
        match event {
            Event::Start(e) | Event::Empty(e) if finished => {
                return Err(PipelineError::source_error(
                    location,
                    format!(
                        "unexpected element <{}> after the root element",
                        local_name(&e, decoder, location)?
                    ),
                ));
            }
            Event::Start(e) => {
                let name = local_name(&e, decoder, location)?;
                if stack.is_empty() {
                    format = Some(SourceFormat::from_xml_root(&name).ok_or_else(|| {
                        PipelineError::source_error(location, format!("unsupported root element <{name}>"))
                    })?);
                    pending.push(Pending::new(0, "", location.to_string()));
                }
                let opens_component = format == Some(SourceFormat::Ead)
                    && is_component(&name)
                    && (stack.last().is_some_and(|parent| parent.name == "dsc")
                        || (pending.len() > 1
                            && pending.last().is_some_and(|p| p.opened_at + 1 == stack.len())));
                stack.push(Frame { name, text: String::new() });
                if opens_component {
                    let is_document = pending.len() == 1;
                    let child_location = innermost(&mut pending, location)?.next_component_location(is_document);
                    pending.push(Pending::new(stack.len() - 1, COMPONENT_BASE, child_location));
                }
                let current = innermost(&mut pending, location)?;
                let base = current.path(&stack);
                push_attributes(&e, decoder, &base, location, &mut current.fields)?;
            }
            Event::Empty(e) => {
                if stack.is_empty() {
                    return Err(PipelineError::source_error(location, "empty root element"));
                }
                let name = local_name(&e, decoder, location)?;
                stack.push(Frame { name, text: String::new() });
                let current = innermost(&mut pending, location)?;
                let base = current.path(&stack);
                push_attributes(&e, decoder, &base, location, &mut current.fields)?;
                stack.pop();
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| PipelineError::source_error(location, e))?;
                append_text(&mut stack, &text);
            }
            Event::CData(c) => {
                let text = decoder
                    .decode(&c)
                    .map_err(|e| PipelineError::source_error(location, e))?;
                append_text(&mut stack, &text);
            }
            Event::End(_) => {
                if stack.is_empty() {
                    continue;
                }
                let closes_component =
                    pending.len() > 1 && pending.last().is_some_and(|p| p.opened_at + 1 == stack.len());
                if closes_component {
                    stack.pop();
                    if let Some(done) = pending.pop() {
                        let component = done.into_record(source_id, SourceFormat::Ead);
                        innermost(&mut pending, location)?.components.push(component);
                    }
                } else {
                    let current = innermost(&mut pending, location)?;
                    let path = current.path(&stack);
                    if let Some(frame) = stack.pop() {
                        let text = frame.text.trim();
                        if !path.is_empty() && !text.is_empty() {
                            current.fields.push((path, text.to_string()));
                        }
                    }
                }
                if stack.is_empty() {
                    finished = true;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let Some(format) = format else {
        return Err(PipelineError::source_error(location, "document has no root element"));
    };
    if let Some(open) = stack.last() {
        return Err(PipelineError::source_error(
            location,
            format!("unclosed element <{}>", open.name),
        ));
    }
    let root = pending
        .pop()
        .ok_or_else(|| PipelineError::source_error(location, "document has no root element"))?;

    let mut record = root.into_record(source_id, format);
    let language = record.values(EAD_LANGUAGE_PATH).next().map(str::to_string);
    if let Some(language) = language {
        for component in &mut record.components {
            inherit_language(component, &language);
        }
    }
    Ok(record)
}

fn inherit_language(record: &mut ImportRecord, language: &str) {
    if record.values(EAD_LANGUAGE_PATH).next().is_none() {
        record
            .fields
            .push((EAD_LANGUAGE_PATH.to_string(), language.to_string()));
    }
    for component in &mut record.components {
        inherit_language(component, language);
    }
}

fn append_text(stack: &mut [Frame], text: &str) {
    if let Some(frame) = stack.last_mut() {
        if !frame.text.is_empty() {
            frame.text.push(' ');
        }
        frame.text.push_str(text);
    }
}

fn push_attributes(
    e: &BytesStart<'_>,
    decoder: Decoder,
    base: &str,
    location: &str,
    fields: &mut Vec<(String, String)>,
) -> Result<(), PipelineError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| PipelineError::source_error(location, err))?;
        let key = decoder
            .decode(attr.key.as_ref())
            .map_err(|err| PipelineError::source_error(location, err))?;
        if key == "xmlns" || key.starts_with("xmlns:") || key.starts_with("xsi:") {
            continue;
        }
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| PipelineError::source_error(location, err))?;
        let path = if base.is_empty() {
            format!("@{key}")
        } else {
            format!("{base}/@{key}")
        };
        fields.push((path, value.trim().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const EAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ead xmlns="urn:isbn:1-931666-22-9">
  <eadheader>
    <profiledesc><langusage><language langcode="eng">English</language></langusage></profiledesc>
  </eadheader>
  <archdesc level="fonds">
    <did>
      <unitid>item-01</unitid>
      <unittitle>Letters &amp; papers</unittitle>
    </did>
    <scopecontent><p>First.</p><p><![CDATA[Second <raw>.]]></p></scopecontent>
  </archdesc>
</ead>"#;

    fn value<'a>(record: &'a ImportRecord, path: &'a str) -> Vec<&'a str> {
        record.values(path).collect()
    }

    #[test]
    fn paths_are_relative_to_root_element() {
        let r = parse_record(EAD.as_bytes(), "repo-001/item-01.xml", "item-01").unwrap();
        assert_eq!(r.format, SourceFormat::Ead);
        assert_eq!(value(&r, "archdesc/did/unitid"), vec!["item-01"]);
        assert_eq!(value(&r, "archdesc/did/unittitle"), vec!["Letters & papers"]);
        assert_eq!(value(&r, "archdesc/@level"), vec!["fonds"]);
        assert_eq!(
            value(&r, "eadheader/profiledesc/langusage/language/@langcode"),
            vec!["eng"]
        );
        assert_eq!(value(&r, "archdesc/scopecontent/p"), vec!["First.", "Second <raw>."]);
        assert!(r.fields.iter().all(|(p, _)| !p.contains("xmlns")));
    }

    #[test]
    fn unknown_root_is_a_source_error() {
        let err = parse_record(b"<mods><title>x</title></mods>", "x.xml", "x").unwrap_err();
        assert_matches!(err, PipelineError::Source { .. });
    }

    #[test]
    fn malformed_document_is_a_source_error() {
        let err = parse_record(b"<ead><archdesc></ead>", "x.xml", "x").unwrap_err();
        assert_matches!(err, PipelineError::Source { .. });
    }

    #[test]
    fn components_become_nested_records() {
        let xml = br#"<ead>
  <eadheader><profiledesc><langusage><language langcode="deu"/></langusage></profiledesc></eadheader>
  <archdesc level="fonds">
    <did><unitid>f1</unitid><unittitle>Fonds</unittitle></did>
    <dsc>
      <c01 level="series">
        <did><unitid>s1</unitid><unittitle>Series</unittitle></did>
        <c02 level="file"><did><unitid>f1-1</unitid><unittitle>File</unittitle></did></c02>
      </c01>
      <c01><did><unitid>s2</unitid></did></c01>
    </dsc>
  </archdesc>
</ead>"#;
        let r = parse_record(xml, "repo-001/f1.xml", "f1").unwrap();
        assert_eq!(value(&r, "archdesc/did/unitid"), vec!["f1"]);
        assert!(r.fields.iter().all(|(p, _)| !p.contains("c01")));
        assert_eq!(r.components.len(), 2);
        assert_eq!(r.descendant_count(), 3);

        let series = &r.components[0];
        assert_eq!(series.location, "repo-001/f1.xml#1");
        assert_eq!(series.source_id, "f1");
        assert_eq!(value(series, "archdesc/did/unitid"), vec!["s1"]);
        assert_eq!(value(series, "archdesc/@level"), vec!["series"]);
        assert_eq!(value(series, EAD_LANGUAGE_PATH), vec!["deu"]);

        let file = &series.components[0];
        assert_eq!(file.location, "repo-001/f1.xml#1.1");
        assert_eq!(value(file, "archdesc/did/unittitle"), vec!["File"]);
        assert_eq!(value(file, EAD_LANGUAGE_PATH), vec!["deu"]);
        assert_eq!(r.components[1].location, "repo-001/f1.xml#2");
    }

    #[test]
    fn declared_encoding_is_honoured() {
        let mut xml = br#"<?xml version="1.0" encoding="ISO-8859-1"?><ead><archdesc><did><unitid>c1</unitid><unittitle>Fran"#.to_vec();
        xml.push(0xE7);
        xml.extend_from_slice(b"ais</unittitle></did></archdesc></ead>");
        let r = parse_record(&xml, "c1.xml", "c1").unwrap();
        assert_eq!(value(&r, "archdesc/did/unittitle"), vec!["Fran\u{e7}ais"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("repo-001.xml"), "<eag/>").unwrap();
        fs::create_dir(root.join("repo-001")).unwrap();
        fs::write(root.join("repo-001").join("item-01.xml"), "<ead/>").unwrap();
        std::os::unix::fs::symlink(root, root.join("repo-001").join("loop")).unwrap();

        let source = XmlSource::new(root);
        assert_eq!(source.count_records(root), 2);
        let children = source.children(&root.join("repo-001")).unwrap();
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn listing_separates_children_dirs_from_scope_units() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::write(root.join("repo-001.xml"), "<eag/>").unwrap();
        fs::create_dir(root.join("repo-001")).unwrap();
        fs::write(root.join("repo-001").join("item-01.xml"), "<ead/>").unwrap();
        fs::create_dir(root.join("repo-002")).unwrap();
        fs::write(root.join("notes.txt"), "ignored").unwrap();

        let source = XmlSource::new(root);
        let roots = source.roots().unwrap();
        assert_eq!(roots.len(), 2);
        assert_matches!(&roots[0], SourceEntry::File { location, .. } if location == "repo-001.xml");
        assert_matches!(&roots[1], SourceEntry::ScopeUnit { key, .. } if key == "repo-002");

        let children = source.children(&root.join("repo-001")).unwrap();
        assert_matches!(&children[0], SourceEntry::File { location, .. } if location == "repo-001/item-01.xml");
        assert_eq!(source.count_records(&root.join("repo-001")), 1);
    }
}
