//! Template engine
//!
//! This module provides HTML page rendering using Tera.
//! Features:
//! - Default templates embedded in the binary
//! - Per-name overrides loaded from a templates directory on disk
//! - Standard template variables (site name, request path, year)
//! - Fallback to `error.html`, then to a built-in error page

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::TemplateError;

/// Default templates, compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

/// Template engine for rendering pages
pub struct TemplateEngine {
    /// Tera template engine instance
    tera: Tera,
    /// Directory searched for template overrides
    templates_path: PathBuf,
    /// Templates loaded from disk instead of the embedded defaults
    overridden: Vec<String>,
}

impl TemplateEngine {
    /// Create a template engine
    ///
    /// Embedded defaults are loaded first; any `.html` file under
    /// `templates_path` replaces the default with the same relative name.
    /// A missing directory is not an error.
    pub fn new(templates_path: &Path) -> Result<Self> {
        let mut templates = embedded_templates()?;

        let mut overridden = Vec::new();
        if templates_path.is_dir() {
            let mut from_disk = Vec::new();
            collect_templates_from_dir(templates_path, templates_path, &mut from_disk)?;
            for (name, content) in from_disk {
                overridden.push(name.clone());
                templates.insert(name, content);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| TemplateError::Render(error_chain(&e)))?;

        if overridden.is_empty() {
            tracing::info!("Using embedded templates");
        } else {
            overridden.sort();
            tracing::info!(
                "Loaded template overrides from {:?}: {:?}",
                templates_path,
                overridden
            );
        }

        Ok(Self {
            tera,
            templates_path: templates_path.to_path_buf(),
            overridden,
        })
    }

    /// Render a template with context
    ///
    /// # Arguments
    /// * `template` - Template name (e.g., "index.html", "article.html")
    /// * `context` - Tera context with template variables
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            TemplateError::Render(format!(
                "Failed to render '{}': {}",
                template,
                error_chain(&e)
            ))
            .into()
        })
    }

    /// Render a template with standard variables automatically added
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        standard_vars.insert_into(&mut full_context);
        self.render(template, &full_context)
    }

    /// Render a template, falling back to `error.html` and then to a
    /// built-in page
    ///
    /// Always returns HTML.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(
                    "Failed to render template '{}': {}, trying error template",
                    template,
                    e
                );

                let mut error_context = context.clone();
                error_context.insert("error_message", &e.to_string());
                error_context.insert("requested_template", template);

                match self.render("error.html", &error_context) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::warn!(
                            "Failed to render error template: {}, returning simple HTML error page",
                            error_template_err
                        );
                        simple_error_page("Template Error", &e.to_string())
                    }
                }
            }
        }
    }

    /// Directory searched for overrides
    pub fn templates_path(&self) -> &Path {
        &self.templates_path
    }

    /// Names of templates loaded from disk
    pub fn overridden(&self) -> &[String] {
        &self.overridden
    }

    /// Whether a template with this name is loaded
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

fn embedded_templates() -> Result<BTreeMap<String, String>> {
    let mut templates = BTreeMap::new();
    for name in DefaultTemplates::iter() {
        let file = DefaultTemplates::get(&name)
            .with_context(|| format!("Embedded template disappeared: {}", name))?;
        let content = String::from_utf8(file.data.into_owned())
            .with_context(|| format!("Embedded template is not UTF-8: {}", name))?;
        templates.insert(name.to_string(), content);
    }
    Ok(templates)
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read templates directory: {:?}", current_path))?
    {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path.strip_prefix(base_path).map_err(|_| {
                TemplateError::Render("Failed to get relative path".to_string())
            })?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;

            templates.push((template_name, content));
        }
    }

    Ok(())
}

fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Minimal HTML error page that needs no templates
pub fn simple_error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 600px;
            margin: 50px auto;
            padding: 20px;
            background: #f5f5f5;
        }}
        .error-box {{
            background: white;
            border-left: 4px solid #e74c3c;
            padding: 20px;
            border-radius: 4px;
        }}
        h1 {{ color: #e74c3c; margin-top: 0; }}
    </style>
</head>
<body>
    <div class="error-box">
        <h1>{title}</h1>
        <p>{message}</p>
    </div>
</body>
</html>"#,
        title = tera::escape_html(title),
        message = tera::escape_html(message)
    )
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    pub site_description: String,
    /// Current request path
    pub request_path: String,
    /// Current year (for copyright)
    pub year: i32,
}

impl StandardTemplateVars {
    pub fn new(
        site_name: impl Into<String>,
        site_description: impl Into<String>,
        request_path: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            site_description: site_description.into(),
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    /// Add the variables to a context
    pub fn insert_into(&self, context: &mut TeraContext) {
        context.insert("site_name", &self.site_name);
        context.insert("site_description", &self.site_description);
        context.insert("request_path", &self.request_path);
        context.insert("year", &self.year);
    }
}
