//! Tree-sitter based Python declaration extraction.

use super::declarations::{body_digest, normalize_whitespace, Declaration};
use super::{LanguageParser, ParsedSource};
use crate::core::DeclarationKind;
use crate::errors::{Error, Result};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_tree(&self, content: &str, path: &Path) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| Error::parse(path, format!("Failed to set Python language: {}", e)))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| Error::parse(path, "Failed to parse Python source"))?;

        if tree.root_node().has_error() {
            let line = first_error_line(tree.root_node()).unwrap_or(1);
            return Err(Error::parse(path, format!("syntax error near line {}", line)));
        }
        Ok(tree)
    }
}

impl LanguageParser for PythonParser {
    fn language(&self) -> &'static str {
        "python"
    }

    fn handles(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("py")
    }

    fn parse(&self, content: &str, path: &Path) -> Result<ParsedSource> {
        let tree = self.parse_tree(content, path)?;
        let root = tree.root_node();
        let mut declarations = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            extract_declaration(child, content, &mut declarations);
        }

        Ok(ParsedSource {
            declarations,
            total_lines: content.lines().count(),
        })
    }

    fn test_names(&self, content: &str, path: &Path) -> Result<Vec<String>> {
        let tree = self.parse_tree(content, path)?;
        let root = tree.root_node();
        let mut names = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            let def = unwrap_decorated(child);
            match def.kind() {
                "function_definition" => {
                    if let Some(name) = field_text(def, "name", content) {
                        if name.starts_with("test") {
                            names.push(name.to_string());
                        }
                    }
                }
                "class_definition" => {
                    let Some(class_name) = field_text(def, "name", content) else {
                        continue;
                    };
                    if !class_name.starts_with("Test") {
                        continue;
                    }
                    let Some(body) = def.child_by_field_name("body") else {
                        continue;
                    };
                    let mut body_cursor = body.walk();
                    for member in body.named_children(&mut body_cursor) {
                        let member = unwrap_decorated(member);
                        if member.kind() != "function_definition" {
                            continue;
                        }
                        if let Some(method) = field_text(member, "name", content) {
                            if method.starts_with("test") {
                                names.push(format!("{}::{}", class_name, method));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(names)
    }
}

fn extract_declaration(node: Node, source: &str, out: &mut Vec<Declaration>) {
    match node.kind() {
        "decorated_definition" => {
            if let Some(def) = node.child_by_field_name("definition") {
                // Decorators are part of the declaration's content
                if let Some(mut decl) = definition(def, source) {
                    decl.digest = body_digest(node_text(node, source));
                    decl.start_line = node_line(node);
                    out.push(decl);
                }
            }
        }
        "function_definition" | "class_definition" => {
            if let Some(decl) = definition(node, source) {
                out.push(decl);
            }
        }
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                out.push(Declaration::import(imported_name(name, source), node_line(node)));
            }
        }
        "import_from_statement" => {
            let module = field_text(node, "module_name", source).unwrap_or_default();
            let mut has_names = false;
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                has_names = true;
                let imported = imported_name(name, source);
                out.push(Declaration::import(
                    join_module(module, &imported),
                    node_line(node),
                ));
            }
            if !has_names {
                // `from x import *`
                out.push(Declaration::import(join_module(module, "*"), node_line(node)));
            }
        }
        _ => {}
    }
}

fn definition(node: Node, source: &str) -> Option<Declaration> {
    let name = field_text(node, "name", source)?.to_string();
    let (kind, signature) = match node.kind() {
        "function_definition" => {
            let params = field_text(node, "parameters", source).unwrap_or("()");
            let signature = match field_text(node, "return_type", source) {
                Some(ret) => format!("{} -> {}", normalize_whitespace(params), ret.trim()),
                None => normalize_whitespace(params),
            };
            (DeclarationKind::Function, signature)
        }
        "class_definition" => {
            let bases = field_text(node, "superclasses", source).unwrap_or("");
            (DeclarationKind::Class, normalize_whitespace(bases))
        }
        _ => return None,
    };

    Some(Declaration {
        kind,
        name,
        signature,
        digest: body_digest(node_text(node, source)),
        start_line: node_line(node),
        end_line: node.end_position().row + 1,
    })
}

fn imported_name(node: Node, source: &str) -> String {
    // `import a.b as c` imports `a.b`
    if node.kind() == "aliased_import" {
        if let Some(inner) = field_text(node, "name", source) {
            return inner.to_string();
        }
    }
    node_text(node, source).to_string()
}

fn join_module(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else if module.ends_with('.') {
        format!("{}{}", module, name)
    } else {
        format!("{}.{}", module, name)
    }
}

fn unwrap_decorated(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node_line(node));
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

fn field_text<'a>(node: Node, field: &str, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field)
        .map(|child| node_text(child, source))
}

/// Get text for a tree-sitter node
fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Get the line number for a tree-sitter node (1-indexed)
fn node_line(node: Node) -> usize {
    node.start_position().row + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse(source: &str) -> ParsedSource {
        PythonParser::new()
            .parse(source, Path::new("sample.py"))
            .unwrap()
    }

    #[test]
    fn test_extracts_top_level_declarations() {
        let parsed = parse(indoc! {r#"
            import os
            import json as j
            from typing import Dict, List
            from .models import *

            @cache
            def load(path: str) -> Dict:
                return {}

            class Store(Base):
                def get(self, key):
                    return None
        "#});

        let names: Vec<(DeclarationKind, &str)> = parsed
            .declarations
            .iter()
            .map(|d| (d.kind, d.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                (DeclarationKind::Import, "os"),
                (DeclarationKind::Import, "json"),
                (DeclarationKind::Import, "typing.Dict"),
                (DeclarationKind::Import, "typing.List"),
                (DeclarationKind::Import, ".models.*"),
                (DeclarationKind::Function, "load"),
                (DeclarationKind::Class, "Store"),
            ]
        );

        let load = &parsed.declarations[5];
        assert_eq!(load.signature, "(path: str) -> Dict");
        assert_eq!(load.start_line, 6);
        assert_eq!(parsed.declarations[6].signature, "(Base)");
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = PythonParser::new()
            .parse("def broken(:\n    pass\n", Path::new("broken.py"))
            .unwrap_err();
        assert_eq!(err.code(), "E010");
        assert!(err.to_string().contains("broken.py"));
    }

    #[test]
    fn test_discovers_test_functions_and_methods() {
        let names = PythonParser::new()
            .test_names(
                indoc! {r#"
                    def helper():
                        pass

                    def test_login():
                        assert True

                    class TestSession:
                        def setup_method(self):
                            pass

                        def test_expiry(self):
                            assert True
                "#},
                Path::new("test_auth.py"),
            )
            .unwrap();
        assert_eq!(names, vec!["test_login", "TestSession::test_expiry"]);
    }

    #[test]
    fn test_handles_only_python_files() {
        let parser = PythonParser::new();
        assert!(parser.handles(Path::new("pkg/auth.py")));
        assert!(!parser.handles(Path::new("pkg/auth.rs")));
    }
}
