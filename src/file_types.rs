// src/file_types.rs

//! Module type detection by file name
//!
//! CSS-like modules are loaded for their side effects only, so adaptive
//! stylesheets import every variant instead of switching between them.

use regex::Regex;
use std::sync::LazyLock;

// `.module.css` and friends export class names and behave like scripts.
static CSS_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(css|less|sass|scss|styl|stylus|pcss|postcss|sss)(?:$|\?)").unwrap()
});

static CSS_MODULE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.module\.(css|less|sass|scss|styl|stylus|pcss|postcss|sss)(?:$|\?)").unwrap()
});

static BUILTIN_MODULE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(?:[mc]?[tj]s|json|css|less|sass|scss|styl|stylus|pcss|postcss|sss)(?:\?|$)")
        .unwrap()
});

/// Global stylesheet (not a CSS module)
pub fn is_css_file(id: &str) -> bool {
    CSS_FILE.is_match(id) && !CSS_MODULE_FILE.is_match(id)
}

/// Script, JSON or stylesheet handled natively by the host bundler
pub fn is_builtin_module_type(id: &str) -> bool {
    BUILTIN_MODULE_TYPE.is_match(id)
}
