//! Source buffer registry with line/column lookup.
//!
//! Every buffer a session lexes from is registered here: the main file,
//! included headers, the predefines buffer, `_Pragma` payloads and
//! host-supplied text. Sharing one map across all contexts keeps source
//! locations meaningful no matter where a token came from.

use std::fmt;
use std::path::PathBuf;

/// Handle for a registered source buffer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct SourceId(u32);

impl SourceId {
    /// Reserved id for tokens with no backing buffer (synthetic tokens).
    pub const SYNTHETIC: SourceId = SourceId(u32::MAX);

    /// Check whether this id denotes a synthetic (unbacked) token source.
    #[inline]
    pub const fn is_synthetic(self) -> bool {
        self.0 == u32::MAX
    }

    /// Get raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Whether a buffer came from a user or system search path.
///
/// Headers found in system directories (and everything they include) are
/// marked `System`; the distinction feeds back into header resolution.
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Debug)]
pub enum FileCharacteristic {
    User,
    System,
}

/// One registered source buffer.
pub struct SourceFile {
    name: String,
    path: Option<PathBuf>,
    text: String,
    /// Byte offset of the first character of each line.
    line_starts: Vec<u32>,
    characteristic: FileCharacteristic,
}

impl SourceFile {
    fn new(
        name: String,
        path: Option<PathBuf>,
        text: String,
        characteristic: FileCharacteristic,
    ) -> Self {
        let mut line_starts = vec![0u32];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "buffers are bounded by u32 spans"
                )]
                line_starts.push(idx as u32 + 1);
            }
        }
        SourceFile {
            name,
            path,
            text,
            line_starts,
            characteristic,
        }
    }

    /// Display name of the buffer (`<predefines>`, a path, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem path, if the buffer is backed by a real file.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// The buffer contents.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// User/system characteristic of the buffer.
    pub fn characteristic(&self) -> FileCharacteristic {
        self.characteristic
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        // partition_point returns at least 1 since line_starts[0] == 0
        let line_start = self.line_starts[line - 1];
        #[expect(
            clippy::cast_possible_truncation,
            reason = "line count is bounded by buffer size, which fits u32"
        )]
        let line_u32 = line as u32;
        (line_u32, offset - line_start + 1)
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("len", &self.text.len())
            .field("characteristic", &self.characteristic)
            .finish()
    }
}

/// Registry of every source buffer a session lexes from.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
    predefines: Option<SourceId>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        SourceMap::default()
    }

    /// Register a file-backed buffer.
    pub fn add_file(
        &mut self,
        path: PathBuf,
        text: String,
        characteristic: FileCharacteristic,
    ) -> SourceId {
        let name = path.display().to_string();
        self.push(SourceFile::new(name, Some(path), text, characteristic))
    }

    /// Register a virtual buffer (predefines, `_Pragma` payloads,
    /// host-supplied text).
    pub fn add_virtual(&mut self, name: impl Into<String>, text: String) -> SourceId {
        self.push(SourceFile::new(
            name.into(),
            None,
            text,
            FileCharacteristic::User,
        ))
    }

    fn push(&mut self, file: SourceFile) -> SourceId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "a session never registers anywhere near u32::MAX buffers"
        )]
        let id = SourceId(self.files.len() as u32);
        self.files.push(file);
        id
    }

    /// Mark a buffer as the session's predefines buffer.
    ///
    /// Tokens attributed to it are engine-internal and are skipped by the
    /// output token stream.
    pub fn set_predefines(&mut self, id: SourceId) {
        self.predefines = Some(id);
    }

    /// Check whether `id` is the predefines buffer.
    pub fn is_predefines(&self, id: SourceId) -> bool {
        self.predefines == Some(id)
    }

    /// Look up a registered buffer.
    pub fn get(&self, id: SourceId) -> Option<&SourceFile> {
        if id.is_synthetic() {
            return None;
        }
        self.files.get(id.raw() as usize)
    }

    /// 1-based line/column of an offset, if the buffer is registered.
    pub fn line_col(&self, id: SourceId, offset: u32) -> Option<(u32, u32)> {
        self.get(id).map(|file| file.line_col(offset))
    }
}
