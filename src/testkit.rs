//! Test support: a tiny scriptable backend and assembly helpers.
//!
//! The real compiler is out of scope, so tests drive the loader with a
//! line-oriented toy language whose artifacts exercise every loader
//! feature: imports, defaults, shared context, inline sub-modules,
//! teardown hooks and both fault kinds.
//!
//! ```text
//! let NAME = 42            export a number (or "string")
//! let NAME = TITLE.FIELD   copy a field from an imported module
//! import TITLE             resolve TITLE at execution time
//! context NAME             export the ambient binding NAME
//! default NAME             default export = previously exported NAME
//! default fn TITLE.FIELD   default export = closure reading TITLE's FIELD
//! default props NAME       default export = closure returning props[NAME]
//! inline NAME = S; S; S    nested anonymous module, NAME = its default
//! teardown [fail]          teardown hook, optionally failing
//! fail MESSAGE             runtime fault
//! !...                     compile error at this line
//! ```

use futures_util::future::LocalBoxFuture;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::compile::{CompileBackend, CompiledArtifact, CompiledOutput, artifact_signature};
use crate::diag::{Diagnostic, SourcePos, SourceSpan};
use crate::fault::RuntimeFault;
use crate::loader::{ModuleLoader, Resolver};
use crate::module::{Exports, ModuleKind};
use crate::registry::ModuleRegistry;
use crate::store::MemoryStore;
use crate::value::{Value, ValueMap};

// =============================================================================
// ScriptBackend
// =============================================================================

/// One backend call, recorded for assertions on memoization and signatures.
#[derive(Debug, Clone)]
pub struct CompileCall {
    pub name: String,
    pub keys: Vec<String>,
    pub signature: String,
}

#[derive(Default)]
pub struct ScriptBackend {
    pub calls: RefCell<Vec<CompileCall>>,
    /// Names whose teardown hooks ran, in order.
    pub teardowns: Rc<RefCell<Vec<String>>>,
}

impl ScriptBackend {
    pub fn compile_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl CompileBackend for ScriptBackend {
    fn compile<'a>(
        &'a self,
        name: &'a str,
        source: &'a str,
        context_keys: &'a [String],
    ) -> LocalBoxFuture<'a, Result<CompiledOutput, Diagnostic>> {
        Box::pin(async move {
            let signature = artifact_signature(name, context_keys);
            self.calls.borrow_mut().push(CompileCall {
                name: name.to_string(),
                keys: context_keys.to_vec(),
                signature: signature.clone(),
            });

            let stmts = parse(source)?;
            let name = name.to_string();
            let sink = self.teardowns.clone();
            let artifact = CompiledArtifact::new(signature, move |ambient, resolver, _values| {
                let stmts = stmts.clone();
                let name = name.clone();
                let sink = sink.clone();
                Box::pin(async move { interpret(&name, &stmts, ambient, resolver, sink).await })
            });
            Ok(CompiledOutput {
                artifact,
                warnings: Vec::new(),
            })
        })
    }
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug, Clone)]
enum Stmt {
    Let { name: String, value: Value },
    Copy { name: String, title: String, field: String },
    Import { title: String },
    Context { name: String },
    Default { name: String },
    DefaultFn { title: String, field: String },
    DefaultProps { name: String },
    Inline { name: String, source: String },
    Teardown { fail: bool },
    Fail { message: String },
}

fn parse(source: &str) -> Result<Vec<Stmt>, Diagnostic> {
    let mut stmts = Vec::new();
    let mut offset = 0usize;
    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        match parse_line(trimmed) {
            Ok(Some(stmt)) => stmts.push(stmt),
            Ok(None) => {}
            Err(message) => {
                let line_no = index as u32 + 1;
                let start = offset + (line.len() - line.trim_start().len());
                let span = SourceSpan::new(
                    SourcePos::new(line_no, 1, start),
                    SourcePos::new(line_no, 1 + trimmed.len() as u32, start + trimmed.len()),
                );
                return Err(Diagnostic::error(message).with_span(span));
            }
        }
        offset += line.len() + 1;
    }
    Ok(stmts)
}

fn parse_line(line: &str) -> Result<Option<Stmt>, String> {
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line.starts_with('!') {
        return Err(format!("unexpected token `{line}`"));
    }
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    match head {
        "import" => Ok(Some(Stmt::Import {
            title: rest.trim().to_string(),
        })),
        "let" => {
            let (name, value) = rest.split_once('=').ok_or("malformed let")?;
            let name = name.trim().to_string();
            let value = value.trim();
            if let Some(quoted) = value.strip_prefix('"') {
                return Ok(Some(Stmt::Let {
                    name,
                    value: Value::str(quoted.trim_end_matches('"')),
                }));
            }
            if let Ok(number) = value.parse::<f64>() {
                return Ok(Some(Stmt::Let {
                    name,
                    value: Value::Num(number),
                }));
            }
            match value.split_once('.') {
                Some((title, field)) => Ok(Some(Stmt::Copy {
                    name,
                    title: title.trim().to_string(),
                    field: field.trim().to_string(),
                })),
                None => Err(format!("malformed value `{value}`")),
            }
        }
        "context" => Ok(Some(Stmt::Context {
            name: rest.trim().to_string(),
        })),
        "default" => {
            let rest = rest.trim();
            if let Some(target) = rest.strip_prefix("fn ") {
                let (title, field) = target.split_once('.').ok_or("malformed default fn")?;
                Ok(Some(Stmt::DefaultFn {
                    title: title.trim().to_string(),
                    field: field.trim().to_string(),
                }))
            } else if let Some(name) = rest.strip_prefix("props ") {
                Ok(Some(Stmt::DefaultProps {
                    name: name.trim().to_string(),
                }))
            } else {
                Ok(Some(Stmt::Default {
                    name: rest.to_string(),
                }))
            }
        }
        "inline" => {
            let (name, source) = rest.split_once('=').ok_or("malformed inline")?;
            Ok(Some(Stmt::Inline {
                name: name.trim().to_string(),
                source: source.trim().replace(';', "\n"),
            }))
        }
        "teardown" => Ok(Some(Stmt::Teardown {
            fail: rest.trim() == "fail",
        })),
        "fail" => Ok(Some(Stmt::Fail {
            message: rest.trim().to_string(),
        })),
        other => Err(format!("unknown statement `{other}`")),
    }
}

async fn interpret(
    name: &str,
    stmts: &[Stmt],
    ambient: ValueMap,
    resolver: Resolver,
    teardowns: Rc<RefCell<Vec<String>>>,
) -> Result<Exports, RuntimeFault> {
    let mut imports: BTreeMap<String, Exports> = BTreeMap::new();
    let mut locals = ValueMap::new();
    let mut default: Option<Value> = None;
    let mut teardown_fail: Option<bool> = None;
    let mut nested = Vec::new();

    for stmt in stmts {
        match stmt {
            Stmt::Let { name, value } => {
                locals.insert(name.clone(), value.clone());
            }
            Stmt::Import { title } => {
                let exports = resolver.resolve(title).await?;
                imports.insert(title.clone(), exports);
            }
            Stmt::Copy { name, title, field } => {
                let module = imports
                    .get(title)
                    .ok_or_else(|| RuntimeFault::new(format!("`{title}` is not imported")))?;
                locals.insert(name.clone(), module.get(field).cloned().unwrap_or_default());
            }
            Stmt::Context { name } => {
                locals.insert(name.clone(), ambient.get(name).cloned().unwrap_or_default());
            }
            Stmt::Default { name } => {
                default = Some(locals.get(name).cloned().unwrap_or_default());
            }
            Stmt::DefaultFn { title, field } => {
                let module = imports
                    .get(title)
                    .cloned()
                    .ok_or_else(|| RuntimeFault::new(format!("`{title}` is not imported")))?;
                let field = field.clone();
                default = Some(Value::func(move |_args| {
                    Ok(module.get(&field).cloned().unwrap_or_default())
                }));
            }
            Stmt::DefaultProps { name } => {
                let key = name.clone();
                default = Some(Value::func(move |args| {
                    let props = args
                        .first()
                        .and_then(Value::as_map)
                        .cloned()
                        .unwrap_or_default();
                    Ok(props.get(&key).cloned().unwrap_or_default())
                }));
            }
            Stmt::Inline { name, source } => {
                let result = resolver.load_literal(source).await?;
                let value = result
                    .exports()
                    .and_then(Exports::default_export)
                    .cloned()
                    .unwrap_or_default();
                locals.insert(name.clone(), value);
                nested.push(result);
            }
            Stmt::Teardown { fail } => {
                teardown_fail = Some(*fail);
            }
            Stmt::Fail { message } => return Err(RuntimeFault::new(message.clone())),
        }
    }

    let mut builder = Exports::builder();
    for (key, value) in locals {
        builder = builder.value(key, value);
    }
    if let Some(value) = default {
        builder = builder.default_export(value);
    }
    if let Some(fail) = teardown_fail {
        let name = name.to_string();
        builder = builder.teardown(move || {
            teardowns.borrow_mut().push(name.clone());
            if fail {
                Err(RuntimeFault::new("teardown failed"))
            } else {
                Ok(())
            }
        });
    }
    for result in nested {
        builder = builder.nested(result);
    }
    Ok(builder.build())
}

// =============================================================================
// Assembly helpers
// =============================================================================

pub struct TestSpace {
    pub store: Rc<MemoryStore>,
    pub backend: Rc<ScriptBackend>,
    pub registry: Rc<ModuleRegistry>,
    pub loader: Rc<ModuleLoader>,
}

pub fn space() -> TestSpace {
    space_with_context(ValueMap::new())
}

pub fn space_with_context(context: ValueMap) -> TestSpace {
    let store = Rc::new(MemoryStore::new());
    let backend = Rc::new(ScriptBackend::default());
    let registry = Rc::new(ModuleRegistry::new());
    let loader = Rc::new(
        ModuleLoader::new(registry.clone(), store.clone(), backend.clone())
            .with_base_context(context),
    );
    TestSpace {
        store,
        backend,
        registry,
        loader,
    }
}

/// Insert a markup document into the test store.
pub fn doc(space: &TestSpace, title: &str, text: &str) {
    space.store.insert(title, text, ModuleKind::markup());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_let_forms() {
        let stmts = parse("let a = 1\nlet b = \"text\"\nlet c = B.value").unwrap();
        assert_eq!(stmts.len(), 3);
        assert!(matches!(&stmts[2], Stmt::Copy { title, field, .. }
            if title == "B" && field == "value"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let stmts = parse("# heading\n\nlet a = 1").unwrap();
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_parse_error_spans_the_line() {
        let err = parse("let a = 1\n  !oops").unwrap_err();
        assert_eq!(err.span.start.line, 2);
        // Offset points at the trimmed statement, not the indentation.
        assert_eq!(err.span.start.offset, 12);
        assert_eq!(err.span.slice("let a = 1\n  !oops"), Some("!oops"));
    }

    #[test]
    fn test_parse_unknown_statement() {
        assert!(parse("frobnicate x").is_err());
    }
}
