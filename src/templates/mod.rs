//! Template engine
//!
//! Tera templates compiled into the binary from `templates/`. A configured
//! directory may override any embedded template by name, e.g. a file at
//! `<dir>/rango/index.html` replaces the embedded `rango/index.html`.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

use crate::config::TemplateConfig;

mod error;

pub use error::TemplateError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Renders the application's HTML templates
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Engine with only the embedded templates
    pub fn embedded() -> Result<Self> {
        Self::build(embedded_templates()?)
    }

    /// Engine with the embedded templates, overridden by every `.html` file
    /// under `dir`
    pub fn with_overrides(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TemplateError::DirectoryNotFound(dir.display().to_string()).into());
        }

        let mut templates = embedded_templates()?;
        let mut overrides = Vec::new();
        collect_templates_from_dir(dir, dir, &mut overrides)?;
        for (name, content) in overrides {
            tracing::debug!("Template override: {}", name);
            templates.insert(name, content);
        }

        Self::build(templates)
    }

    /// Engine as described by the configuration
    pub fn from_config(config: &TemplateConfig) -> Result<Self> {
        match &config.path {
            Some(dir) => {
                tracing::info!("Loading template overrides from {:?}", dir);
                Self::with_overrides(dir)
            }
            None => Self::embedded(),
        }
    }

    fn build(templates: BTreeMap<String, String>) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| TemplateError::Render(describe(&e)))?;
        Ok(Self { tera })
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            TemplateError::Render(format!("Failed to render '{}': {}", template, describe(&e)))
                .into()
        })
    }

    /// Check whether a template is loaded
    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }
}

fn embedded_templates() -> Result<BTreeMap<String, String>> {
    let mut templates = BTreeMap::new();
    for name in EmbeddedTemplates::iter() {
        let file = EmbeddedTemplates::get(&name)
            .with_context(|| format!("Embedded template disappeared: {}", name))?;
        let content = String::from_utf8(file.data.into_owned())
            .with_context(|| format!("Embedded template is not UTF-8: {}", name))?;
        templates.insert(name.into_owned(), content);
    }
    Ok(templates)
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path).map_err(TemplateError::IoError)? {
        let path = entry.map_err(TemplateError::IoError)?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .context("Template outside its base directory")?;
            let name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((name, content));
        }
    }

    Ok(())
}

/// Tera errors keep the useful detail in their source chain
fn describe(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGES: [&str; 10] = [
        "rango/base.html",
        "rango/index.html",
        "rango/about.html",
        "rango/category.html",
        "rango/add_category.html",
        "rango/add_page.html",
        "rango/register.html",
        "rango/login.html",
        "rango/restricted.html",
        "rango/error.html",
    ];

    #[test]
    fn test_embedded_templates_load() {
        let engine = TemplateEngine::embedded().expect("templates should compile");
        for page in PAGES {
            assert!(engine.has_template(page), "missing {}", page);
        }
    }

    #[test]
    fn test_render_about() {
        let engine = TemplateEngine::embedded().unwrap();
        let mut ctx = TeraContext::new();
        ctx.insert("boldmessage", "Hello there");
        ctx.insert("visits", &3);

        let html = engine.render("rango/about.html", &ctx).unwrap();
        assert!(html.contains("Hello there"));
        assert!(html.contains("Visits: 3"));
    }

    #[test]
    fn test_render_missing_template_is_error() {
        let engine = TemplateEngine::embedded().unwrap();
        let err = engine.render("rango/nope.html", &TeraContext::new()).unwrap_err();
        assert!(err.to_string().contains("rango/nope.html"));
    }

    #[test]
    fn test_override_directory_replaces_template() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("rango")).unwrap();
        fs::write(
            dir.path().join("rango/restricted.html"),
            "custom restricted {{ 1 + 1 }}",
        )
        .unwrap();

        let engine = TemplateEngine::with_overrides(dir.path()).unwrap();

        let html = engine.render("rango/restricted.html", &TeraContext::new()).unwrap();
        assert_eq!(html, "custom restricted 2");
        assert!(engine.has_template("rango/index.html"));
    }

    #[test]
    fn test_missing_override_directory() {
        let result = TemplateEngine::with_overrides(Path::new("/definitely/not/here"));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_defaults_to_embedded() {
        let engine = TemplateEngine::from_config(&TemplateConfig::default()).unwrap();
        assert!(engine.has_template("rango/base.html"));
    }
}
