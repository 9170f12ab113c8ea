// build.rs

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

const FALLBACK_LANG: &str = "en";

fn main() {
    println!("cargo:rerun-if-env-changed=ENVSCOPE_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    let lang = selected_language();
    println!("cargo:rustc-env=ENVSCOPE_LANG_EFFECTIVE={}", lang);

    let catalog = load_catalog(&lang);
    let macro_code = render_macro(&catalog);

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is always set for build scripts");
    let dest_path = Path::new(&out_dir).join("translations.rs");
    fs::write(&dest_path, macro_code).expect("Failed to write the generated translations");
}

/// Picks the message catalog language.
///
/// A `lang_*` cargo feature wins over the `ENVSCOPE_LANG` variable, which wins over English.
fn selected_language() -> String {
    let mut from_features: Vec<String> = env::vars()
        .filter_map(|(key, _)| {
            key.strip_prefix("CARGO_FEATURE_LANG_")
                .map(|l| l.to_lowercase())
        })
        .collect();
    from_features.sort();

    match from_features.first() {
        Some(first) => {
            if from_features.len() > 1 {
                println!(
                    "cargo:warning=Several language features enabled ({:?}); using '{}'.",
                    from_features, first
                );
            }
            first.clone()
        }
        None => env::var("ENVSCOPE_LANG").unwrap_or_else(|_| FALLBACK_LANG.to_string()),
    }
}

/// English is always loaded first so partial catalogs still resolve every key.
fn load_catalog(lang: &str) -> BTreeMap<String, String> {
    let fallback_path = format!("locales/{}.toml", FALLBACK_LANG);
    let fallback = fs::read_to_string(&fallback_path)
        .unwrap_or_else(|_| panic!("Failed to read fallback catalog {}", fallback_path));
    let mut catalog: BTreeMap<String, String> = toml::from_str(&fallback)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {}", fallback_path, e));

    if lang == FALLBACK_LANG {
        return catalog;
    }

    let path = format!("locales/{}.toml", lang);
    match fs::read_to_string(&path) {
        Ok(content) => {
            let specific: BTreeMap<String, String> = toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse {}: {}", path, e));
            catalog.extend(specific);
        }
        Err(_) => println!(
            "cargo:warning=Catalog '{}' not found. Falling back to '{}'.",
            path, FALLBACK_LANG
        ),
    }
    catalog
}

fn render_macro(catalog: &BTreeMap<String, String>) -> String {
    let mut code = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, value) in catalog {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        code.push_str(&format!("    (\"{}\") => {{ \"{}\" }};\n", key, escaped));
    }
    code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n",
    );
    code.push('}');
    code
}
