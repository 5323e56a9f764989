//! index::render
//!
//! Rendering of the two static index documents.
//!
//! # Layout
//!
//! ```text
//! <root_dir>/index.html              root: one link per package
//! <root_dir>/<normalized>/index.html package: one link per artifact
//! ```
//!
//! Output is a pure function of the state: no timestamps, stable ordering,
//! fixed whitespace. Byte equality between two renderings is therefore a
//! valid "nothing changed" test.
//!
//! Artifact links carry `data-platform` so the platform survives a
//! parse/render round trip.

use std::fmt::Write as _;

use thiserror::Error;

use super::state::PackageIndexState;
use crate::core::artifact::{check_filename_chars, Artifact};

/// Errors from rendering.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A value cannot be placed into the document safely.
    #[error("cannot encode {field} '{value}': {reason}")]
    EncodingError {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// One rendered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Slash-separated path inside the index branch
    pub path: String,
    pub body: String,
}

/// Both documents for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedIndex {
    pub root: Document,
    pub package: Document,
}

impl RenderedIndex {
    pub fn documents(&self) -> [&Document; 2] {
        [&self.root, &self.package]
    }
}

/// Renders index documents under a root directory.
///
/// # Example
///
/// ```
/// use simplepub::core::types::PackageName;
/// use simplepub::index::{IndexDocumentBuilder, PackageIndexState};
///
/// let builder = IndexDocumentBuilder::new("simple");
/// let state = PackageIndexState::new(PackageName::new("Deptry").unwrap());
/// let rendered = builder.render(&state).unwrap();
///
/// assert_eq!(rendered.root.path, "simple/index.html");
/// assert_eq!(rendered.package.path, "simple/deptry/index.html");
/// assert!(rendered.root.body.contains(r#"<a href="deptry/">Deptry</a>"#));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocumentBuilder {
    root_dir: String,
}

impl IndexDocumentBuilder {
    pub fn new(root_dir: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into().trim_matches('/').to_string(),
        }
    }

    /// Path of the root document.
    pub fn root_path(&self) -> String {
        self.join("index.html")
    }

    /// Path of a package document, by normalized package name.
    pub fn package_path(&self, normalized: &str) -> String {
        self.join(&format!("{normalized}/index.html"))
    }

    fn join(&self, rest: &str) -> String {
        if self.root_dir.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{}", self.root_dir, rest)
        }
    }

    /// Render both documents.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::EncodingError` if a filename or URL contains
    /// characters that cannot be represented safely.
    pub fn render(&self, state: &PackageIndexState) -> Result<RenderedIndex, RenderError> {
        Ok(RenderedIndex {
            root: Document {
                path: self.root_path(),
                body: render_root(state)?,
            },
            package: Document {
                path: self.package_path(&state.package().normalized()),
                body: render_package(state)?,
            },
        })
    }
}

fn render_root(state: &PackageIndexState) -> Result<String, RenderError> {
    let mut links = String::new();
    for (normalized, text) in state.known_packages() {
        check_link_text("package name", text)?;
        let _ = writeln!(
            links,
            "    <a href=\"{}/\">{}</a><br/>",
            escape(normalized),
            escape(text)
        );
    }
    Ok(page("Simple index", &links))
}

fn render_package(state: &PackageIndexState) -> Result<String, RenderError> {
    let mut links = String::new();
    for release in state.releases() {
        for artifact in release.artifacts() {
            links.push_str(&artifact_link(artifact)?);
        }
    }
    Ok(page(
        &format!("Links for {}", state.package().normalized()),
        &links,
    ))
}

fn artifact_link(artifact: &Artifact) -> Result<String, RenderError> {
    check_filename_chars(&artifact.filename).map_err(|reason| RenderError::EncodingError {
        field: "filename",
        value: artifact.filename.clone(),
        reason,
    })?;
    check_url(&artifact.url)?;
    Ok(format!(
        "    <a href=\"{}\" data-platform=\"{}\">{}</a><br/>\n",
        escape(&artifact.url),
        escape(artifact.platform.as_str()),
        escape(&artifact.filename)
    ))
}

fn page(title: &str, links: &str) -> String {
    let title = escape(title);
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         \x20 <head>\n\
         \x20   <meta name=\"pypi:repository-version\" content=\"1.0\">\n\
         \x20   <title>{title}</title>\n\
         \x20 </head>\n\
         \x20 <body>\n\
         \x20   <h1>{title}</h1>\n\
         {links}\
         \x20 </body>\n\
         </html>\n"
    )
}

/// Download URLs must be absolute http(s) URLs with no characters that
/// would need escaping in an attribute or break link scrapers.
fn check_url(url: &str) -> Result<(), RenderError> {
    let fail = |reason: &str| RenderError::EncodingError {
        field: "url",
        value: url.to_string(),
        reason: reason.to_string(),
    };
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| fail("must be an absolute http(s) URL"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(fail("missing host"));
    }
    if let Some(c) = url
        .chars()
        .find(|c| c.is_control() || c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '\\' | '`'))
    {
        return Err(fail(&format!("contains forbidden character {c:?}")));
    }
    Ok(())
}

fn check_link_text(field: &'static str, text: &str) -> Result<(), RenderError> {
    if text.is_empty() || text.chars().any(char::is_control) {
        return Err(RenderError::EncodingError {
            field,
            value: text.to_string(),
            reason: "must be non-empty without control characters".to_string(),
        });
    }
    Ok(())
}

/// HTML-escape text and attribute values.
pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
