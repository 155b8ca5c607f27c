// src/codegen/proxy.rs
//! Proxy and init modules for adaptive imports
//!
//! Server builds bundle every variant and pick one per request through
//! `createAdaptiveProxy`. Web builds bundle one variant per flag set: the
//! proxy reads a slot of the runtime global and the init module of the
//! chosen variant fills that slot before anything else runs.

use super::{
    ExportShape, GeneratedModule, SideEffects, SyntheticExports, index_to_id, js_string,
    switch_expression,
};
use crate::graph::{BindingSet, ExportInfo};
use crate::matcher::Matches;

/// Module providing `createAdaptiveProxy` at runtime
pub const SERVER_PROXY_RUNTIME: &str = "arc-server/proxy";

/// Stylesheet proxy: import every variant, default last
pub fn css_proxy(matches: &Matches) -> GeneratedModule {
    let mut code = String::new();
    for value in matches.values() {
        code.push_str(&format!("import {};\n", js_string(value)));
    }
    GeneratedModule::new(code, SideEffects::NoTreeshake)
}

/// Server proxy switching between namespaces of every variant per request
pub fn server_proxy(matches: &Matches, exports: Option<&ExportInfo>) -> GeneratedModule {
    let mut code = String::new();
    let mut aliases = Vec::with_capacity(matches.alternates.len());

    for (i, alternate) in matches.alternates.iter().enumerate() {
        let alias = format!("_{}", index_to_id(i));
        code.push_str(&format!(
            "import * as {} from {};\n",
            alias,
            js_string(&alternate.value)
        ));
        aliases.push(alias);
    }

    let default_alias = format!("_{}", index_to_id(matches.alternates.len()));
    code.push_str(&format!(
        "import * as {} from {};\n",
        default_alias,
        js_string(&matches.default)
    ));

    let switch = switch_expression(
        matches
            .alternates
            .iter()
            .zip(&aliases)
            .map(|(alternate, alias)| (&alternate.flags, alias.as_str())),
        default_alias.as_str(),
    );
    let proxy = format!(
        "/*@__PURE__*/createAdaptiveProxy({{default:{},match(f){{return {}}}}})",
        default_alias, switch
    );

    let runtime_import = format!(
        "import createAdaptiveProxy from {};\n",
        js_string(SERVER_PROXY_RUNTIME)
    );

    let mut synthetic = SyntheticExports::None;
    match ExportShape::decide(exports, None) {
        ExportShape::Empty => code.push_str("export {};\n"),
        ExportShape::DefaultOnly => {
            code.push_str(&runtime_import);
            code.push_str(&format!("export default {}.default;\n", proxy));
        }
        ExportShape::Named { has_default } => {
            code.push_str(&runtime_import);
            code.push_str(&format!("export const _ = {};\n", proxy));
            if has_default {
                code.push_str("export default _.default;\n");
            }
            synthetic = SyntheticExports::Key("_".to_string());
        }
        ExportShape::Namespace => {
            code.push_str(&runtime_import);
            code.push_str(&format!("export const _ = {};\n", proxy));
            code.push_str("export default _.default;\n");
            synthetic = SyntheticExports::Key("_".to_string());
        }
    }

    GeneratedModule::new(code, SideEffects::NoTreeshake).with_synthetic_exports(synthetic)
}

/// Web proxy reading the slot `<runtime_id>.<arc_id>`
pub fn web_proxy(runtime_id: &str, arc_id: &str, shape: ExportShape) -> GeneratedModule {
    let (code, synthetic) = match shape {
        ExportShape::Empty => ("export {};\n".to_string(), SyntheticExports::None),
        ExportShape::DefaultOnly => (
            format!("export default {}.{};\n", runtime_id, arc_id),
            SyntheticExports::Default,
        ),
        ExportShape::Named { has_default } => {
            let mut code = format!("export const {{{}}} = {};\n", arc_id, runtime_id);
            if has_default {
                code.push_str(&format!("export default {}.default;\n", arc_id));
            }
            (code, SyntheticExports::Key(arc_id.to_string()))
        }
        ExportShape::Namespace => (
            format!(
                "export const {{{}}} = {};\nexport default {}.default;\n",
                arc_id, runtime_id, arc_id
            ),
            SyntheticExports::Key(arc_id.to_string()),
        ),
    };

    GeneratedModule::new(code, SideEffects::False).with_synthetic_exports(synthetic)
}

/// Web init module filling the runtime slot from the chosen variant
///
/// Stylesheets and modules nobody binds from are imported for side effects
/// only.
pub fn init_module(
    runtime_id: &str,
    arc_id: &str,
    concrete: &str,
    bindings: Option<&BindingSet>,
    is_css: bool,
) -> GeneratedModule {
    let bindings = match bindings {
        Some(bindings) if !is_css => bindings,
        _ => {
            return GeneratedModule::new(
                format!("import {};\n", js_string(concrete)),
                SideEffects::NoTreeshake,
            );
        }
    };

    let namespace = format!("_{}", arc_id);
    let value = match bindings {
        BindingSet::WholeNamespace => namespace.clone(),
        BindingSet::Names(names) => {
            let fields: Vec<String> = names
                .iter()
                .map(|name| format!("{}:{}[{}]", js_string(name), namespace, js_string(name)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
    };

    let code = format!(
        "import * as {} from {}\n{}.{}={};\n",
        namespace,
        js_string(concrete),
        runtime_id,
        arc_id,
        value
    );
    GeneratedModule::new(code, SideEffects::NoTreeshake)
}
