//! Preview document composition.
//!
//! The site is always rendered whole into a fresh document; nothing is
//! patched in place.

use std::fmt::Write;
use std::str::FromStr;

use forge_client::GeneratedSite;
use serde::{Deserialize, Serialize};

use crate::PreviewError;

/// Tailwind CSS play CDN loaded by every preview.
pub const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// FontAwesome 6.4.0 stylesheet loaded by every preview.
pub const FONT_AWESOME_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css";

/// Base body style placed before the site's own CSS.
pub const BASE_BODY_STYLE: &str =
    "body { margin: 0; padding: 0; min-height: 100vh; font-family: sans-serif; }";

/// Sandbox flags for the framed preview.
const FRAME_SANDBOX: &str = "allow-scripts allow-forms allow-popups allow-modals";

/// Document-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewOptions {
    /// `lang` attribute.
    pub lang: String,
    /// `dir` attribute (`ltr` or `rtl`).
    pub dir: String,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            dir: "ltr".to_string(),
        }
    }
}

/// Device width the preview is framed at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewport {
    /// Full width.
    #[default]
    Desktop,
    /// 768px wide.
    Tablet,
    /// 390px wide, 844px tall.
    Mobile,
}

impl Viewport {
    /// Returns the frame's maximum width in pixels.
    #[must_use]
    pub const fn max_width(&self) -> Option<u32> {
        match self {
            Self::Desktop => None,
            Self::Tablet => Some(768),
            Self::Mobile => Some(390),
        }
    }

    /// Returns the frame's fixed height in pixels.
    #[must_use]
    pub const fn height(&self) -> Option<u32> {
        match self {
            Self::Mobile => Some(844),
            Self::Desktop | Self::Tablet => None,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Tablet => "tablet",
            Self::Mobile => "mobile",
        }
    }

    fn frame_style(self) -> String {
        let mut style = String::from("border:0;width:100%;background:#fff;");
        if let Some(width) = self.max_width() {
            let _ = write!(style, "max-width:{width}px;");
        }
        match self.height() {
            Some(height) => {
                let _ = write!(style, "height:{height}px;");
            }
            None => style.push_str("height:100vh;"),
        }
        style
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Viewport {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "tablet" => Ok(Self::Tablet),
            "mobile" => Ok(Self::Mobile),
            _ => Err(PreviewError::InvalidViewport(s.to_string())),
        }
    }
}

/// Escapes text for use inside a double-quoted HTML attribute.
#[must_use]
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes text for use as HTML element content.
#[must_use]
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// A generated site composed into a standalone HTML document.
#[derive(Debug, Clone)]
pub struct PreviewDocument<'a> {
    site: &'a GeneratedSite,
    options: PreviewOptions,
}

impl<'a> PreviewDocument<'a> {
    /// Creates a document for `site` with default options.
    #[must_use]
    pub fn new(site: &'a GeneratedSite) -> Self {
        Self {
            site,
            options: PreviewOptions::default(),
        }
    }

    /// Overrides the document options.
    #[must_use]
    pub fn with_options(mut self, options: PreviewOptions) -> Self {
        self.options = options;
        self
    }

    /// Renders the complete document.
    ///
    /// The site's html, css and js are inserted verbatim.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<!DOCTYPE html>");
        let _ = writeln!(
            out,
            r#"<html lang="{}" dir="{}">"#,
            escape_attribute(&self.options.lang),
            escape_attribute(&self.options.dir)
        );
        let _ = writeln!(out, "<head>");
        let _ = writeln!(out, r#"<meta charset="UTF-8">"#);
        let _ = writeln!(
            out,
            r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#
        );
        let _ = writeln!(out, "<title>{}</title>", escape_text(&self.site.metadata.title));
        let _ = writeln!(out, r#"<script src="{TAILWIND_CDN}"></script>"#);
        let _ = writeln!(out, r#"<link rel="stylesheet" href="{FONT_AWESOME_CSS}">"#);
        let _ = writeln!(out, "<style>");
        let _ = writeln!(out, "{BASE_BODY_STYLE}");
        let _ = writeln!(out, "{}", self.site.css);
        let _ = writeln!(out, "</style>");
        let _ = writeln!(out, "</head>");
        let _ = writeln!(out, "<body>");
        let _ = writeln!(out, "{}", self.site.html);
        let _ = writeln!(out, "<script>{}</script>", self.site.js);
        let _ = writeln!(out, "</body>");
        let _ = writeln!(out, "</html>");
        out
    }

    /// Renders a host page that shows the document in a sandboxed frame sized
    /// for `viewport`.
    #[must_use]
    pub fn render_frame(&self, viewport: Viewport) -> String {
        let title = escape_attribute(&self.site.metadata.title);
        let mut out = String::new();
        let _ = writeln!(out, "<!DOCTYPE html>");
        let _ = writeln!(
            out,
            r#"<html lang="{}" dir="{}">"#,
            escape_attribute(&self.options.lang),
            escape_attribute(&self.options.dir)
        );
        let _ = writeln!(out, "<head>");
        let _ = writeln!(out, r#"<meta charset="UTF-8">"#);
        let _ = writeln!(out, "<title>{title} ({viewport})</title>");
        let _ = writeln!(out, "</head>");
        let _ = writeln!(
            out,
            r#"<body style="margin:0;background:#050505;display:flex;justify-content:center;">"#
        );
        let _ = writeln!(
            out,
            r#"<iframe title="{title}" sandbox="{FRAME_SANDBOX}" style="{}" srcdoc="{}"></iframe>"#,
            viewport.frame_style(),
            escape_attribute(&self.render())
        );
        let _ = writeln!(out, "</body>");
        let _ = writeln!(out, "</html>");
        out
    }
}
