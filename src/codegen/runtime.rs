// src/codegen/runtime.rs
//! Runtime glue emitted into bundles

use super::manifest::{ASSETS_FUNCTION, FLAGS_FUNCTION};
use super::{GeneratedModule, SideEffects, js_string};
use crate::flags::FlagSet;
use crate::module_ref::is_entry_artifact;

/// Public runtime package imported by server code
pub const SERVER_RUNTIME: &str = "arc-server";

/// Marks where entry-variant documents split prepended and appended HTML
pub const DOCUMENT_MARKER: &str = "ARC_VITE";

/// Runtime global holding the web slots: `arc`, or `arc_<id>`
pub fn runtime_global(runtime_id: Option<&str>) -> String {
    match runtime_id {
        Some(id) if !id.is_empty() => format!("arc_{}", id),
        _ => "arc".to_string(),
    }
}

/// The `arc-server` shim for server builds
///
/// Publishes the flag source for the asset dispatch function, pins the flags
/// when a forced flag set is configured and exposes `getAssets`.
pub fn server_runtime_module(forced: Option<&FlagSet>) -> GeneratedModule {
    let runtime = js_string(SERVER_RUNTIME);
    let mut code = format!("import * as arc from {runtime};\nexport * from {runtime};\n");
    code.push_str(&format!("globalThis.{} = arc.getFlags;\n", FLAGS_FUNCTION));

    if let Some(forced) = forced {
        let fields: Vec<String> = forced
            .iter()
            .map(|flag| format!("{}:true", js_string(flag)))
            .collect();
        code.push_str(&format!("const forcedFlags = {{{}}};\n", fields.join(",")));
        code.push_str("export function setFlags() { return arc.setFlags(forcedFlags); }\n");
        code.push_str(
            "export function withFlags(_, fn) { return arc.withFlags(forcedFlags, fn); }\n",
        );
    }

    code.push_str(&format!(
        r#"export function getAssets(
  entry,
  {{ base = import.meta.env.BASE_URL, injectAttrs = "" }} = {{}}
) {{
  const manifest = {assets}(entry);
  return {{
    "head-prepend": partsToString(manifest["head-prepend"], base, injectAttrs),
    head: partsToString(manifest["head"], base, injectAttrs),
    "body-prepend": partsToString(manifest["body-prepend"], base, injectAttrs),
    body: partsToString(manifest["body"], base, injectAttrs)
  }};
}};

function partsToString(parts, base, injectAttrs) {{
  if (!parts) return;
  let html = "";
  for (const part of parts) {{
    html += part === 0 ? injectAttrs : part === 1 ? base : part;
  }}
  return html;
}}
"#,
        assets = ASSETS_FUNCTION,
    ));

    GeneratedModule::new(code, SideEffects::True)
}

/// Banner for an output chunk
///
/// Entry-variant chunks create the runtime global; every other entry chunk
/// waits until one of them has run.
pub fn chunk_banner(
    runtime_global: &str,
    is_entry: bool,
    facade_module_id: Option<&str>,
) -> String {
    if !is_entry {
        return String::new();
    }
    if facade_module_id.is_some_and(is_entry_artifact) {
        return format!("window.{}={{}};", runtime_global);
    }
    format!(
        "window.{g}_d || await new Promise(r => window.{g}_d = r);",
        g = runtime_global
    )
}

/// Footer for an output chunk: entry variants signal readiness
pub fn chunk_footer(
    runtime_global: &str,
    is_entry: bool,
    facade_module_id: Option<&str>,
) -> String {
    if is_entry && facade_module_id.is_some_and(is_entry_artifact) {
        return format!(
            "window.{g}_d?.();\nwindow.{g}_d = true;",
            g = runtime_global
        );
    }
    String::new()
}

/// HTML document wrapping an entry-variant script
pub fn entry_document(script: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><!--{m}--></head><body><!--{m}-->\
         <script async type=\"module\">{script}</script></body></html>",
        m = DOCUMENT_MARKER,
        script = script
    )
}

/// Entry-variant module importing the init modules of one flag set
///
/// Init modules are imported in reverse discovery order so that variants
/// found later (deeper in the graph) initialise first.
pub fn entry_variant_module(init_ids: &[String]) -> GeneratedModule {
    let mut script = String::new();
    for id in init_ids.iter().rev() {
        script.push_str(&format!("import {};\n", js_string(id)));
    }
    GeneratedModule::new(entry_document(&script), SideEffects::False)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_global() {
        assert_eq!(runtime_global(None), "arc");
        assert_eq!(runtime_global(Some("")), "arc");
        assert_eq!(runtime_global(Some("shop")), "arc_shop");
    }

    #[test]
    fn test_server_runtime_forced_flags() {
        let plain = server_runtime_module(None);
        assert!(plain.code.starts_with(
            "import * as arc from \"arc-server\";\nexport * from \"arc-server\";\n"
        ));
        assert!(plain.code.contains("globalThis.__ARC_FLAGS__ = arc.getFlags;"));
        assert!(plain.code.contains("const manifest = __ARC_ASSETS__(entry);"));
        assert!(!plain.code.contains("forcedFlags"));
        assert_eq!(plain.side_effects, SideEffects::True);

        let forced = server_runtime_module(Some(&FlagSet::normalize(["mobile", "ios"])));
        assert!(forced.code.contains("const forcedFlags = {\"ios\":true,\"mobile\":true};"));
        assert!(forced.code.contains("export function withFlags(_, fn)"));

        let forced_empty = server_runtime_module(Some(&FlagSet::empty()));
        assert!(forced_empty.code.contains("const forcedFlags = {};"));
    }

    #[test]
    fn test_chunk_banner_and_footer() {
        assert_eq!(
            chunk_banner("arc", true, Some("/src/index.arc.mobile.html")),
            "window.arc={};"
        );
        assert_eq!(
            chunk_banner("arc", true, Some("/src/index.ts")),
            "window.arc_d || await new Promise(r => window.arc_d = r);"
        );
        assert_eq!(chunk_banner("arc", false, Some("/src/index.arc.html")), "");

        assert_eq!(
            chunk_footer("arc", true, Some("/src/index.arc.html")),
            "window.arc_d?.();\nwindow.arc_d = true;"
        );
        assert_eq!(chunk_footer("arc", true, None), "");
    }

    #[test]
    fn test_entry_variant_imports_in_reverse() {
        let module = entry_variant_module(&["first".to_string(), "second".to_string()]);
        assert!(module.code.contains(
            "<script async type=\"module\">import \"second\";\nimport \"first\";\n</script>"
        ));
        assert!(module.code.starts_with("<!DOCTYPE html><html><head><!--ARC_VITE-->"));
    }
}
