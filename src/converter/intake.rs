use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::format::kb_label;
use super::objects::{ObjectRef, ObjectStore};

/// Identity of an intake item. Two items with identical bytes and names are
/// still distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ItemId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A file handed over by a drop or pick gesture.
#[derive(Debug, Clone, Default)]
pub struct IncomingFile {
    pub name: String,
    pub path: Option<PathBuf>,
    pub bytes: Option<Arc<[u8]>>,
    pub media_type: Option<String>,
}

impl IncomingFile {
    pub fn from_path(path: PathBuf) -> Self {
        let name = file_name(&path);
        Self { name, path: Some(path), ..Default::default() }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { name: name.into(), bytes: Some(bytes.into()), ..Default::default() }
    }

    /// Declared media type, or one guessed from the file extension.
    pub fn effective_media_type(&self) -> Option<String> {
        if let Some(mime) = self.media_type.as_deref().filter(|m| !m.is_empty()) {
            return Some(mime.to_ascii_lowercase());
        }
        let name_path = Path::new(&self.name);
        let from_name = image::ImageFormat::from_path(name_path).ok();
        let from_path = self.path.as_deref().and_then(|p| image::ImageFormat::from_path(p).ok());
        from_name.or(from_path).map(|f| f.to_mime_type().to_string())
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .or_else(|| self.path.as_deref().and_then(Path::extension))
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AcceptToken {
    AnySubtype(String),
    Exact(String),
    Extension(String),
}

/// Accept pattern in the HTML `accept` attribute form, e.g. `image/*` or
/// `image/png, .webp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptFilter {
    tokens: Vec<AcceptToken>,
}

impl AcceptFilter {
    pub fn parse(pattern: &str) -> Self {
        let tokens = pattern
            .split(',')
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .filter_map(|t| {
                if let Some(ext) = t.strip_prefix('.') {
                    Some(AcceptToken::Extension(ext.to_string()))
                } else if let Some(kind) = t.strip_suffix("/*") {
                    Some(AcceptToken::AnySubtype(kind.to_string()))
                } else if t.contains('/') {
                    Some(AcceptToken::Exact(t))
                } else {
                    tracing::warn!(token = %t, "ignoring malformed accept token");
                    None
                }
            })
            .collect();
        Self { tokens }
    }

    pub fn images() -> Self {
        Self::parse("image/*")
    }

    pub fn accepts(&self, file: &IncomingFile) -> bool {
        let mime = file.effective_media_type();
        let ext = file.extension();
        self.tokens.iter().any(|token| match token {
            AcceptToken::AnySubtype(kind) => mime
                .as_deref()
                .and_then(|m| m.split_once('/'))
                .is_some_and(|(k, _)| k == kind.as_str()),
            AcceptToken::Exact(exact) => mime.as_deref() == Some(exact.as_str()),
            AcceptToken::Extension(wanted) => ext.as_deref() == Some(wanted.as_str()),
        })
    }
}

impl Default for AcceptFilter {
    fn default() -> Self {
        Self::images()
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub media_type: String,
}

/// One user-provided image awaiting possible conversion.
#[derive(Debug)]
pub struct IntakeItem {
    pub id: ItemId,
    pub name: String,
    pub file: Option<SourceFile>,
    pub size_bytes: u64,
    preview: Option<ObjectRef>,
}

impl IntakeItem {
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }

    pub fn size_label(&self) -> String {
        kb_label(self.size_bytes)
    }

    /// The displayed size, parsed back from its two-decimal label.
    pub fn rounded_size_kb(&self) -> f64 {
        self.size_label().parse().unwrap_or_else(|_| self.size_kb())
    }

    pub fn preview(&self) -> Option<&ObjectRef> {
        self.preview.as_ref()
    }
}

/// Turns a gesture's files into intake items, dropping everything the filter
/// rejects. Files whose bytes cannot be read become items without a source.
pub fn build_intake(
    files: Vec<IncomingFile>,
    filter: &AcceptFilter,
    store: &ObjectStore,
) -> Vec<IntakeItem> {
    let total = files.len();
    let items: Vec<IntakeItem> = files
        .into_iter()
        .filter(|f| {
            let accepted = filter.accepts(f);
            if !accepted {
                tracing::debug!(name = %f.name, "rejected by accept filter");
            }
            accepted
        })
        .map(|f| intake_one(f, store))
        .collect();

    tracing::info!(accepted = items.len(), offered = total, "intake replaced");
    items
}

fn intake_one(incoming: IncomingFile, store: &ObjectStore) -> IntakeItem {
    let media_type = incoming
        .effective_media_type()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let bytes = match (&incoming.bytes, &incoming.path) {
        (Some(bytes), _) => Some(Arc::clone(bytes)),
        (None, Some(path)) => match std::fs::read(path) {
            Ok(data) => Some(Arc::from(data)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read dropped file");
                None
            }
        },
        (None, None) => {
            tracing::warn!(name = %incoming.name, "dropped file carries neither a path nor bytes");
            None
        }
    };

    let size_bytes = match (&bytes, &incoming.path) {
        (Some(b), _) => b.len() as u64,
        (None, Some(path)) => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        (None, None) => 0,
    };

    let preview = bytes
        .as_ref()
        .map(|b| store.register(Arc::clone(b), media_type.clone()));

    let file = bytes.map(|bytes| SourceFile {
        name: incoming.name.clone(),
        bytes,
        media_type,
    });

    IntakeItem {
        id: ItemId::next(),
        name: incoming.name,
        file,
        size_bytes,
        preview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, len: usize) -> IncomingFile {
        IncomingFile::from_bytes(name, vec![0u8; len])
    }

    #[test]
    fn image_wildcard_accepts_by_extension_or_declared_type() {
        let filter = AcceptFilter::images();
        assert!(filter.accepts(&named("a.png", 1)));
        assert!(filter.accepts(&named("b.JPG", 1)));
        assert!(!filter.accepts(&named("notes.txt", 1)));

        let mut declared = named("blob", 1);
        declared.media_type = Some("image/avif".to_string());
        assert!(filter.accepts(&declared));
    }

    #[test]
    fn mixed_accept_pattern() {
        let filter = AcceptFilter::parse("image/png, .webp");
        assert!(filter.accepts(&named("a.png", 1)));
        assert!(filter.accepts(&named("a.webp", 1)));
        assert!(!filter.accepts(&named("a.jpeg", 1)));
    }

    #[test]
    fn intake_keeps_only_matching_files_and_labels_sizes() {
        let store = ObjectStore::new();
        let files = vec![named("a.png", 102_400), named("readme.md", 10), named("b.webp", 1_500)];
        let items = build_intake(files, &AcceptFilter::images(), &store);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].size_label(), "100.00");
        assert_eq!(items[1].size_label(), "1.46");
        assert_eq!(store.live_count(), 2);
        assert!(items.iter().all(|i| i.preview().is_some()));
    }

    #[test]
    fn unreadable_path_yields_item_without_source() {
        let store = ObjectStore::new();
        let missing = IncomingFile::from_path(PathBuf::from("/definitely/not/here.png"));
        let items = build_intake(vec![missing], &AcceptFilter::images(), &store);

        assert_eq!(items.len(), 1);
        assert!(items[0].file.is_none());
        assert!(items[0].preview().is_none());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn path_sources_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, vec![7u8; 2048]).unwrap();

        let store = ObjectStore::new();
        let items = build_intake(vec![IncomingFile::from_path(path)], &AcceptFilter::images(), &store);

        assert_eq!(items[0].name, "shot.png");
        assert_eq!(items[0].size_label(), "2.00");
        assert_eq!(items[0].file.as_ref().map(|f| f.media_type.as_str()), Some("image/png"));
    }

    #[test]
    fn identical_files_get_distinct_ids() {
        let store = ObjectStore::new();
        let items = build_intake(vec![named("a.png", 4), named("a.png", 4)], &AcceptFilter::images(), &store);
        assert_ne!(items[0].id, items[1].id);
    }
}
