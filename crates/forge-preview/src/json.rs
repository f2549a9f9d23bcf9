//! JSON rendering of the project library.
//!
//! # Example
//!
//! ```rust
//! use forge_preview::{LibraryEntry, LibraryJson};
//!
//! let entries: Vec<LibraryEntry> = Vec::new();
//! let json = LibraryJson::new(&entries).generate().unwrap();
//! assert_eq!(json, r#"{"count":0,"projects":[]}"#);
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::{LibraryEntry, Result};

#[derive(Serialize)]
struct LibraryDocument<'a> {
    count: usize,
    projects: &'a [LibraryEntry],
}

/// Serializes the saved-project library to JSON.
pub struct LibraryJson<'a> {
    entries: &'a [LibraryEntry],
}

impl<'a> LibraryJson<'a> {
    /// Creates a generator over `entries`.
    #[must_use]
    pub const fn new(entries: &'a [LibraryEntry]) -> Self {
        Self { entries }
    }

    const fn document(&self) -> LibraryDocument<'a> {
        LibraryDocument {
            count: self.entries.len(),
            projects: self.entries,
        }
    }

    /// Generates compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Serialization`](crate::PreviewError::Serialization)
    /// if serialization fails.
    pub fn generate(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.document())?)
    }

    /// Generates pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Serialization`](crate::PreviewError::Serialization)
    /// if serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }

    /// Writes the JSON to `path`, creating or overwriting the file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}
