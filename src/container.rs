//! Cached view of a multi-file e-book container.
//!
//! The container is a directory tree mirroring an extracted EPUB. This
//! module owns the mapping from logical names to on-disk paths and media
//! types, a per-name content cache, and the dirty set the packaging layer
//! uses to know which manifest entries changed.
//!
//! Nothing reaches disk until [`Container::flush`] is called; all transforms
//! mutate the in-memory cache only.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::clean;
use crate::dom::{self, Attr, Document, QName};
use crate::error::{Error, Result};
use crate::kobo::{divs, spans};
use crate::media::{self, MediaType};
use crate::util;

/// Font obfuscation algorithms that do not count as DRM.
const ADOBE_OBFUSCATION: &str = "http://ns.adobe.com/pdf/enc#RC";
const IDPF_OBFUSCATION: &str = "http://www.idpf.org/2008/embedding";

/// Optional Unicode normalization applied to decoded text.
///
/// Applied only to the returned value, never to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    None,
    Nfc,
}

/// A manifest entry: where a logical name lives on disk and what it is.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: PathBuf,
    pub media_type: MediaType,
}

/// Cached content for one logical name.
///
/// An explicit state machine rather than two independently-nullable fields:
/// the raw-byte cache and the parsed tree for the same name must never be
/// stale relative to each other. Handing out a mutable tree drops the raw
/// bytes; replacing the raw bytes drops the tree.
enum CacheState {
    Unloaded,
    Raw(Vec<u8>),
    Parsed(Document),
    Both(Vec<u8>, Document),
}

/// A KEPUB container rooted at an extracted directory tree.
pub struct Container {
    root: PathBuf,
    entries: BTreeMap<String, Entry>,
    cache: HashMap<String, CacheState>,
    dirty: BTreeSet<String>,
}

impl Container {
    /// Create an empty container rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
            cache: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// The container's on-disk root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record an existing on-disk entry. This is the packaging-layer
    /// boundary: whoever reads the manifest lists entries here.
    pub fn insert_entry(&mut self, name: &str, media_type: MediaType) {
        self.entries.insert(
            name.to_string(),
            Entry {
                path: self.root.join(name),
                media_type,
            },
        );
        self.cache.remove(name);
    }

    /// Remove an entry and its cached content. The name stays in the dirty
    /// set so the packaging layer notices the change.
    pub fn remove_entry(&mut self, name: &str) -> Result<()> {
        self.entries
            .remove(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.cache.remove(name);
        self.dirty.insert(name.to_string());
        Ok(())
    }

    /// Check whether a logical name exists.
    pub fn has_entry(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Media type of an entry.
    pub fn media_type(&self, name: &str) -> Option<MediaType> {
        self.entries.get(name).map(|e| e.media_type)
    }

    /// Iterate over all logical names.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Lazy iteration over entries with an HTML-family media type.
    pub fn html_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.media_type.is_html())
            .map(|(n, _)| n.as_str())
    }

    /// Copy an external file into the container.
    ///
    /// The logical name is derived from the source basename when not given,
    /// disambiguated (`name-1.ext`) if taken; an explicitly requested name
    /// that already exists fails with [`Error::DuplicateName`]. The media
    /// type is inferred from the extension, then from magic bytes.
    pub fn register(
        &mut self,
        source: &Path,
        name: Option<&str>,
        media_type: Option<MediaType>,
    ) -> Result<String> {
        let data = fs::read(source)?;

        let name = match name {
            Some(n) => {
                if self.entries.contains_key(n) {
                    return Err(Error::DuplicateName(n.to_string()));
                }
                n.to_string()
            }
            None => {
                let base = source
                    .file_name()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| {
                        Error::Io(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "source path has no usable file name",
                        ))
                    })?;
                self.disambiguate(base)
            }
        };

        let media_type = media_type.unwrap_or_else(|| media::detect_media_type(&name, &data));

        let path = self.root.join(&name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &data)?;

        info!(
            source = %source.display(),
            name = %name,
            media = media_type.mime_type(),
            "copied file into container"
        );

        self.entries.insert(name.clone(), Entry { path, media_type });
        self.cache.remove(&name);
        self.dirty.insert(name.clone());
        Ok(name)
    }

    fn disambiguate(&self, base: &str) -> String {
        if !self.entries.contains_key(base) {
            return base.to_string();
        }
        let (stem, ext) = match base.rsplit_once('.') {
            Some((s, e)) => (s, Some(e)),
            None => (base, None),
        };
        let mut i = 1;
        loop {
            let candidate = match ext {
                Some(e) => format!("{stem}-{i}.{e}"),
                None => format!("{stem}-{i}"),
            };
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    /// Mark a logical name as modified since load.
    pub fn mark_dirty(&mut self, name: &str) {
        self.dirty.insert(name.to_string());
    }

    /// Names modified since load. Flushing does not clear this set; the
    /// packaging layer calls [`Container::clear_dirty`] once it has
    /// re-registered the manifest.
    pub fn dirty_names(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    /// Reset the dirty set.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        self.entries
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn take_state(&mut self, name: &str) -> CacheState {
        self.cache.remove(name).unwrap_or(CacheState::Unloaded)
    }

    fn put_state(&mut self, name: &str, state: CacheState) {
        if !matches!(state, CacheState::Unloaded) {
            self.cache.insert(name.to_string(), state);
        }
    }

    /// Raw bytes of an entry. A pending parsed-tree mutation is serialized
    /// first (lazy re-serialization); otherwise bytes come from the cache or
    /// from disk.
    pub fn raw_bytes(&mut self, name: &str) -> Result<&[u8]> {
        let path = self.entry(name)?.path.clone();
        let state = match self.take_state(name) {
            CacheState::Unloaded => CacheState::Raw(fs::read(&path)?),
            CacheState::Parsed(doc) => {
                let bytes = dom::serialize(&doc);
                CacheState::Both(bytes, doc)
            }
            other => other,
        };
        self.put_state(name, state);

        match self.cache.get(name) {
            Some(CacheState::Raw(bytes) | CacheState::Both(bytes, _)) => Ok(bytes),
            _ => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Decoded text of an entry.
    ///
    /// Decoding uses the declared XML encoding when present, falling back to
    /// a permissive decode with a recorded warning rather than failing —
    /// one undecodable document must not block the rest of the container.
    pub fn raw_text(&mut self, name: &str, normalize: Normalize) -> Result<String> {
        let bytes = self.raw_bytes(name)?;
        let text = decode_bytes(name, bytes);
        Ok(match normalize {
            Normalize::Nfc => {
                use unicode_normalization::{UnicodeNormalization, is_nfc};
                if is_nfc(&text) {
                    text
                } else {
                    text.nfc().collect()
                }
            }
            Normalize::None => text,
        })
    }

    /// Replace the cached raw bytes of an entry, invalidating any parsed
    /// tree, and mark it dirty. Nothing is written to disk until `flush`.
    pub fn set_raw(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.entry(name)?;
        self.cache.insert(name.to_string(), CacheState::Raw(bytes));
        self.dirty.insert(name.to_string());
        Ok(())
    }

    fn ensure_parsed(&mut self, name: &str) -> Result<()> {
        let path = self.entry(name)?.path.clone();
        let state = match self.take_state(name) {
            CacheState::Unloaded => {
                let bytes = fs::read(&path)?;
                match parse_bytes(name, &bytes) {
                    Ok(doc) => CacheState::Both(bytes, doc),
                    Err(e) => {
                        self.put_state(name, CacheState::Raw(bytes));
                        return Err(e);
                    }
                }
            }
            CacheState::Raw(bytes) => match parse_bytes(name, &bytes) {
                Ok(doc) => CacheState::Both(bytes, doc),
                Err(e) => {
                    self.put_state(name, CacheState::Raw(bytes));
                    return Err(e);
                }
            },
            other => other,
        };
        self.put_state(name, state);
        Ok(())
    }

    /// Parsed tree of an entry, for inspection. Parses (and caches) on first
    /// access.
    pub fn parsed(&mut self, name: &str) -> Result<&Document> {
        self.ensure_parsed(name)?;
        match self.cache.get(name) {
            Some(CacheState::Parsed(doc) | CacheState::Both(_, doc)) => Ok(doc),
            _ => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Mutable parsed tree of an entry. Handing out the mutable tree drops
    /// the raw-byte cache for the name and marks it dirty, atomically with
    /// the hand-out — the two caches can never go stale against each other.
    pub fn parsed_mut(&mut self, name: &str) -> Result<&mut Document> {
        self.ensure_parsed(name)?;
        let state = match self.take_state(name) {
            CacheState::Both(_, doc) => CacheState::Parsed(doc),
            other => other,
        };
        self.put_state(name, state);
        self.dirty.insert(name.to_string());

        match self.cache.get_mut(name) {
            Some(CacheState::Parsed(doc)) => Ok(doc),
            _ => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Serialize any cached tree for `name` back to bytes and to disk, and
    /// drop the parse cache — a subsequent `parsed` re-parses the freshly
    /// serialized bytes, which guards against silent tree/byte divergence.
    pub fn flush(&mut self, name: &str) -> Result<()> {
        let path = self.entry(name)?.path.clone();
        match self.take_state(name) {
            CacheState::Unloaded => {}
            CacheState::Raw(bytes) => {
                if self.dirty.contains(name) {
                    fs::write(&path, &bytes)?;
                }
                self.put_state(name, CacheState::Raw(bytes));
            }
            CacheState::Both(bytes, doc) => {
                if self.dirty.contains(name) {
                    let out = dom::serialize(&doc);
                    fs::write(&path, &out)?;
                    self.put_state(name, CacheState::Raw(out));
                } else {
                    // Tree never mutated; the source bytes are still current
                    self.put_state(name, CacheState::Raw(bytes));
                }
            }
            CacheState::Parsed(doc) => {
                let out = dom::serialize(&doc);
                fs::write(&path, &out)?;
                self.put_state(name, CacheState::Raw(out));
            }
        }
        Ok(())
    }

    /// Flush every cached entry.
    pub fn flush_all(&mut self) -> Result<()> {
        let names: Vec<String> = self.cache.keys().cloned().collect();
        for name in names {
            self.flush(&name)?;
        }
        Ok(())
    }

    /// Whether the container is locked down with DRM.
    ///
    /// Looks for `META-INF/encryption.xml`; any encryption algorithm other
    /// than the Adobe/IDPF font obfuscation schemes means the book cannot be
    /// edited. An unparsable encryption.xml also counts as encumbered.
    pub fn is_drm_encumbered(&self) -> Result<bool> {
        let path = self.root.join("META-INF").join("encryption.xml");
        if !path.exists() {
            return Ok(false);
        }
        let bytes = fs::read(&path)?;
        let text = decode_bytes("META-INF/encryption.xml", &bytes);
        let doc = match dom::parse_document(&text) {
            Ok(doc) => doc,
            Err(e) => {
                error!(error = %e, "could not parse encryption.xml");
                return Ok(true);
            }
        };

        for id in doc.descendants(doc.document()) {
            if doc.element_local(id) == Some("EncryptionMethod")
                && let Some(alg) = doc.attr(id, "Algorithm")
                && alg != ADOBE_OBFUSCATION
                && alg != IDPF_OBFUSCATION
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Insert a reference to a registered CSS or JS asset into the head of
    /// every HTML document, exactly once per document.
    pub fn add_content_file_reference(&mut self, name: &str) -> Result<()> {
        #[derive(Clone, Copy)]
        enum RefKind {
            Stylesheet,
            Script,
        }

        let kind = match self.entry(name)?.media_type {
            MediaType::Css => RefKind::Stylesheet,
            MediaType::Javascript => RefKind::Script,
            other => return Err(Error::UnsupportedFormat(other.mime_type().to_string())),
        };

        for infile in self.html_name_list() {
            let href = util::relative_href(&infile, name);

            let doc = match self.parsed(&infile) {
                Ok(doc) => doc,
                Err(e @ Error::MalformedMarkup { .. }) => {
                    error!(name = %infile, error = %e, "skipping unparsable document");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(head) = doc.head() else {
                error!(name = %infile, "no <head> element; skipping");
                continue;
            };
            let already_referenced = doc.children(head).any(|id| match kind {
                RefKind::Stylesheet => {
                    doc.element_local(id) == Some("link")
                        && doc.attr(id, "href") == Some(href.as_str())
                }
                RefKind::Script => {
                    doc.element_local(id) == Some("script")
                        && doc.attr(id, "src") == Some(href.as_str())
                }
            });
            if already_referenced {
                continue;
            }

            info!(asset = %name, document = %infile, "adding content file reference");
            let doc = self.parsed_mut(&infile)?;
            let Some(head) = doc.head() else { continue };
            let prefix = doc
                .element_name(head)
                .and_then(|n| n.prefix.clone());
            let elem = match kind {
                RefKind::Stylesheet => doc.create_element(
                    QName::with_prefix(prefix, "link"),
                    vec![
                        attr("rel", "stylesheet"),
                        attr("type", "text/css"),
                        attr("href", &href),
                    ],
                ),
                RefKind::Script => doc.create_element(
                    QName::with_prefix(prefix, "script"),
                    vec![attr("type", "text/javascript"), attr("src", &href)],
                ),
            };
            doc.append(head, elem);
        }
        Ok(())
    }

    /// Strip office-suite cruft from every HTML document: text-level rules
    /// before parsing, empty-heading removal after.
    pub fn clean_markup(&mut self) -> Result<bool> {
        let mut changed = false;
        for name in self.html_name_list() {
            info!(name = %name, "cleaning markup");

            let html = self.raw_text(&name, Normalize::None)?;
            let cleaned = clean::clean_text(&html);
            if cleaned != html {
                self.set_raw(&name, cleaned.into_bytes())?;
                changed = true;
            }

            match self.parsed(&name) {
                Ok(doc) => {
                    if clean::has_empty_headings(doc) {
                        clean::remove_empty_headings(self.parsed_mut(&name)?);
                        changed = true;
                    }
                }
                Err(e @ Error::MalformedMarkup { .. }) => {
                    error!(name = %name, error = %e, "skipping unparsable document");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        self.flush_all()?;
        Ok(changed)
    }

    /// Repair markup a strict parse rejects: malformed self-closing tag
    /// forms and non-UTF-8 encoding declarations.
    pub fn forced_cleanup(&mut self) -> Result<bool> {
        let mut changed = false;
        for name in self.html_name_list() {
            info!(name = %name, "forcing cleanup");
            let html = self.raw_text(&name, Normalize::None)?;
            let fixed = clean::forced_cleanup_text(&html);
            if fixed != html {
                self.set_raw(&name, fixed.into_bytes())?;
                changed = true;
            }
        }
        self.flush_all()?;
        Ok(changed)
    }

    /// Smarten ASCII punctuation in every HTML document.
    pub fn smarten_punctuation(&mut self) -> Result<bool> {
        let mut changed = false;
        for name in self.html_name_list() {
            info!(name = %name, "smartening punctuation");
            let html = self.raw_text(&name, Normalize::None)?;
            let smart = clean::smarten_punctuation_text(&html);
            if smart != html {
                self.set_raw(&name, smart.into_bytes())?;
                changed = true;
            }
        }
        self.flush_all()?;
        Ok(changed)
    }

    /// Wrap every HTML document's body in the fixed two-level div pair.
    ///
    /// Documents already wrapped are skipped, as are div-heavy documents —
    /// books that use `div` as the paragraph element are known to render
    /// badly with the wrapper.
    pub fn add_kobo_divs(&mut self) -> Result<bool> {
        let mut changed = false;
        for name in self.html_name_list() {
            info!(name = %name, "adding kobo divs");
            let doc = match self.parsed(&name) {
                Ok(doc) => doc,
                Err(e @ Error::MalformedMarkup { .. }) => {
                    error!(name = %name, error = %e, "skipping unparsable document");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if divs::is_wrapped(doc) {
                info!(name = %name, "already wrapped; skipping");
                continue;
            }
            let div_count = count_elements(doc, "div");
            let p_count = count_elements(doc, "p");
            if div_count > p_count {
                info!(name = %name, div_count, p_count, "div-heavy document; skipping");
                continue;
            }

            if divs::ensure_wrapped(self.parsed_mut(&name)?)? {
                changed = true;
            }
        }
        self.flush_all()?;
        Ok(changed)
    }

    /// Inject reading-position spans into every HTML document with the
    /// default segmentation rules.
    pub fn add_kobo_spans(&mut self) -> Result<bool> {
        self.add_kobo_spans_with(&spans::Segmenter::default())
    }

    /// Inject reading-position spans using a custom [`spans::Segmenter`].
    pub fn add_kobo_spans_with(&mut self, segmenter: &spans::Segmenter) -> Result<bool> {
        let mut changed = false;
        for name in self.html_name_list() {
            info!(name = %name, "adding kobo spans");
            let doc = match self.parsed(&name) {
                Ok(doc) => doc,
                Err(e @ Error::MalformedMarkup { .. }) => {
                    error!(name = %name, error = %e, "skipping unparsable document");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if spans::has_markers(doc) {
                info!(name = %name, "already processed; skipping");
                continue;
            }

            if segmenter.add_spans(self.parsed_mut(&name)?) {
                changed = true;
            }
        }
        self.flush_all()?;
        Ok(changed)
    }

    fn html_name_list(&self) -> Vec<String> {
        self.html_names().map(String::from).collect()
    }
}

fn attr(name: &str, value: &str) -> Attr {
    Attr {
        name: QName::new(name),
        value: value.to_string(),
    }
}

fn count_elements(doc: &Document, tag: &str) -> usize {
    doc.descendants(doc.document())
        .filter(|&id| doc.element_local(id) == Some(tag))
        .count()
}

fn decode_bytes(name: &str, bytes: &[u8]) -> String {
    let declared = util::extract_xml_encoding(bytes);
    let (text, lossy) = util::decode_text(bytes, declared);
    if lossy {
        let err = Error::Encoding {
            name: name.to_string(),
            encoding: declared.unwrap_or("utf-8").to_string(),
        };
        warn!(error = %err, "falling back to permissive decode");
    }
    text.into_owned()
}

fn parse_bytes(name: &str, bytes: &[u8]) -> Result<Document> {
    let text = decode_bytes(name, bytes);
    dom::parse_document(&text).map_err(|e| e.into_markup_error(name))
}
