//! Writes a site's sources to disk.

use std::fs;
use std::path::{Path, PathBuf};

use forge_client::GeneratedSite;

use crate::document::{PreviewDocument, PreviewOptions};
use crate::Result;

/// Paths written by [`CodeExport::write_to_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    /// Full standalone document.
    pub index_html: PathBuf,
    /// Site CSS.
    pub styles_css: PathBuf,
    /// Site JS.
    pub script_js: PathBuf,
    /// The whole site record as JSON.
    pub site_json: PathBuf,
}

impl ExportedFiles {
    /// Returns all paths in write order.
    #[must_use]
    pub fn paths(&self) -> [&Path; 4] {
        [
            &self.index_html,
            &self.styles_css,
            &self.script_js,
            &self.site_json,
        ]
    }
}

/// Exports the code view of a site.
pub struct CodeExport<'a> {
    site: &'a GeneratedSite,
    options: PreviewOptions,
}

impl<'a> CodeExport<'a> {
    /// Creates an exporter for `site`.
    #[must_use]
    pub fn new(site: &'a GeneratedSite) -> Self {
        Self {
            site,
            options: PreviewOptions::default(),
        }
    }

    /// Overrides the options used for `index.html`.
    #[must_use]
    pub fn with_options(mut self, options: PreviewOptions) -> Self {
        self.options = options;
        self
    }

    /// Writes `index.html`, `styles.css`, `script.js` and `site.json` into
    /// `dir`, creating it if needed. Existing files are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::Io`](crate::PreviewError::Io) if the directory
    /// or a file cannot be written.
    pub fn write_to_dir(&self, dir: &Path) -> Result<ExportedFiles> {
        fs::create_dir_all(dir)?;

        let files = ExportedFiles {
            index_html: dir.join("index.html"),
            styles_css: dir.join("styles.css"),
            script_js: dir.join("script.js"),
            site_json: dir.join("site.json"),
        };

        let document = PreviewDocument::new(self.site)
            .with_options(self.options.clone())
            .render();
        fs::write(&files.index_html, document)?;
        fs::write(&files.styles_css, &self.site.css)?;
        fs::write(&files.script_js, &self.site.js)?;
        fs::write(&files.site_json, serde_json::to_string_pretty(self.site)?)?;

        Ok(files)
    }
}
