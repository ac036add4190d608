//! `qmldir` manifest tokenizer
//!
//! Each line is split on whitespace and dispatched on its leading keyword through
//! [`KEYWORDS`]. A line whose first token is not a keyword but starts with an
//! uppercase letter is a component declaration (`TypeName [version] path`).
//! Blank lines and `#` comments are skipped; anything else is dropped with a trace
//! log.

use tracing::trace;
use super::registry::parse_version;

/// One recognized manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `module Dotted.Name`
    Module { name: String },
    /// `TypeName [version] path`
    Component {
        name: String,
        version: Option<String>,
        path: String,
    },
    /// `singleton TypeName [version] path`
    Singleton {
        name: String,
        version: Option<String>,
        path: String,
    },
    /// `internal TypeName path`
    Internal { name: String, path: String },
    /// `depends Module [version]`
    Depends { module: String, version: Option<String> },
    /// `import Module [version]`
    Import { module: String, version: Option<String> },
    /// `[optional] plugin name [path]`
    Plugin {
        name: String,
        path: Option<String>,
        optional: bool,
    },
    ClassName(String),
    TypeInfo(String),
    DesignerSupported,
}

type DirectiveParser = fn(&[&str]) -> Option<Directive>;

/// Leading keyword → parser for the remaining tokens
const KEYWORDS: &[(&str, DirectiveParser)] = &[
    ("module", parse_module),
    ("singleton", parse_singleton),
    ("internal", parse_internal),
    ("depends", parse_depends),
    ("import", parse_import),
    ("plugin", parse_plugin),
    ("optional", parse_optional),
    ("classname", parse_classname),
    ("typeinfo", parse_typeinfo),
    ("designersupported", parse_designer_supported),
];

/// Tokenize a whole manifest
pub fn parse_manifest(text: &str) -> Vec<Directive> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let directive = parse_line(line);
            if directive.is_none() && !is_blank_or_comment(line) {
                trace!(line = index + 1, "skipping manifest line: {}", line.trim());
            }
            directive
        })
        .collect()
}

/// Tokenize one manifest line
pub fn parse_line(line: &str) -> Option<Directive> {
    if is_blank_or_comment(line) {
        return None;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (keyword, rest) = tokens.split_first()?;

    match KEYWORDS.iter().find(|(name, _)| name == keyword) {
        Some((_, parse)) => parse(rest),
        None => parse_component(&tokens),
    }
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// `Name path` or `Name version path`
fn type_declaration(tokens: &[&str]) -> Option<(String, Option<String>, String)> {
    match tokens {
        [name, path] => Some((name.to_string(), None, path.to_string())),
        [name, version, path] if parse_version(version).is_some() => {
            Some((name.to_string(), Some(version.to_string()), path.to_string()))
        }
        _ => None,
    }
}

/// `Module` or `Module version`
fn module_reference(tokens: &[&str]) -> Option<(String, Option<String>)> {
    match tokens {
        [module] => Some((module.to_string(), None)),
        [module, version] => Some((module.to_string(), Some(version.to_string()))),
        _ => None,
    }
}

fn single_argument(tokens: &[&str]) -> Option<String> {
    match tokens {
        [value] => Some(value.to_string()),
        _ => None,
    }
}

fn parse_component(tokens: &[&str]) -> Option<Directive> {
    let starts_uppercase = tokens
        .first()
        .and_then(|name| name.chars().next())
        .is_some_and(char::is_uppercase);
    if !starts_uppercase {
        return None;
    }
    let (name, version, path) = type_declaration(tokens)?;
    Some(Directive::Component { name, version, path })
}

fn parse_module(rest: &[&str]) -> Option<Directive> {
    single_argument(rest).map(|name| Directive::Module { name })
}

fn parse_singleton(rest: &[&str]) -> Option<Directive> {
    let (name, version, path) = type_declaration(rest)?;
    Some(Directive::Singleton { name, version, path })
}

fn parse_internal(rest: &[&str]) -> Option<Directive> {
    match rest {
        [name, path] => Some(Directive::Internal {
            name: name.to_string(),
            path: path.to_string(),
        }),
        _ => None,
    }
}

fn parse_depends(rest: &[&str]) -> Option<Directive> {
    let (module, version) = module_reference(rest)?;
    Some(Directive::Depends { module, version })
}

fn parse_import(rest: &[&str]) -> Option<Directive> {
    let (module, version) = module_reference(rest)?;
    Some(Directive::Import { module, version })
}

fn parse_plugin(rest: &[&str]) -> Option<Directive> {
    match rest {
        [name] => Some(Directive::Plugin {
            name: name.to_string(),
            path: None,
            optional: false,
        }),
        [name, path] => Some(Directive::Plugin {
            name: name.to_string(),
            path: Some(path.to_string()),
            optional: false,
        }),
        _ => None,
    }
}

fn parse_optional(rest: &[&str]) -> Option<Directive> {
    match rest.split_first() {
        Some((&"plugin", plugin)) => match parse_plugin(plugin)? {
            Directive::Plugin { name, path, .. } => Some(Directive::Plugin {
                name,
                path,
                optional: true,
            }),
            _ => None,
        },
        _ => None,
    }
}

fn parse_classname(rest: &[&str]) -> Option<Directive> {
    single_argument(rest).map(Directive::ClassName)
}

fn parse_typeinfo(rest: &[&str]) -> Option<Directive> {
    single_argument(rest).map(Directive::TypeInfo)
}

fn parse_designer_supported(rest: &[&str]) -> Option<Directive> {
    rest.is_empty().then_some(Directive::DesignerSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_manifest() {
        let text = "\
# Foo.Bar components
module Foo.Bar

singleton Theme 1.0 Theme.qml
Button 1.1 Button.qml
Button 1.0 ButtonLegacy.qml
Panel Panel.qml
internal Helper private/Helper.qml
depends QtQuick 2.15
import QtQuick.Controls auto
plugin foobarplugin
optional plugin extras lib
classname FooBarPlugin
typeinfo plugins.qmltypes
designersupported
";
        let directives = parse_manifest(text);
        assert_eq!(
            directives,
            vec![
                Directive::Module { name: "Foo.Bar".into() },
                Directive::Singleton {
                    name: "Theme".into(),
                    version: Some("1.0".into()),
                    path: "Theme.qml".into()
                },
                Directive::Component {
                    name: "Button".into(),
                    version: Some("1.1".into()),
                    path: "Button.qml".into()
                },
                Directive::Component {
                    name: "Button".into(),
                    version: Some("1.0".into()),
                    path: "ButtonLegacy.qml".into()
                },
                Directive::Component {
                    name: "Panel".into(),
                    version: None,
                    path: "Panel.qml".into()
                },
                Directive::Internal {
                    name: "Helper".into(),
                    path: "private/Helper.qml".into()
                },
                Directive::Depends {
                    module: "QtQuick".into(),
                    version: Some("2.15".into())
                },
                Directive::Import {
                    module: "QtQuick.Controls".into(),
                    version: Some("auto".into())
                },
                Directive::Plugin {
                    name: "foobarplugin".into(),
                    path: None,
                    optional: false
                },
                Directive::Plugin {
                    name: "extras".into(),
                    path: Some("lib".into()),
                    optional: true
                },
                Directive::ClassName("FooBarPlugin".into()),
                Directive::TypeInfo("plugins.qmltypes".into()),
                Directive::DesignerSupported,
            ]
        );
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        assert_eq!(parse_line("module"), None);
        assert_eq!(parse_line("module A B"), None);
        assert_eq!(parse_line("lowercase 1.0 file.qml"), None);
        assert_eq!(parse_line("Button notaversion Button.qml"), None);
        assert_eq!(parse_line("Button 1.0 Button.qml extra"), None);
        assert_eq!(parse_line("singleton Theme"), None);
        assert_eq!(parse_line("optional extras"), None);
        assert_eq!(parse_line("   # indented comment"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_empty_manifest() {
        assert!(parse_manifest("").is_empty());
        assert!(parse_manifest("# nothing here\n\n").is_empty());
    }
}
