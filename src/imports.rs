use anyhow::Result;
use rustpython_parser::ast::{ExceptHandler, Mod, Stmt};
use rustpython_parser::{Mode, parse};
use std::collections::BTreeSet;

/// Lowercased first segment of a dotted module path (`os.path` -> `os`).
pub fn root_module(module: &str) -> String {
    module
        .split('.')
        .next()
        .unwrap_or(module)
        .to_lowercase()
}

/// Collects the modules a statement imports, descending into
/// compound statements so function-local and guarded imports are seen too.
fn process_stmt(stmt: &Stmt, modules: &mut Vec<String>) {
    match stmt {
        Stmt::Import(import_stmt) => {
            modules.extend(import_stmt.names.iter().map(|alias| alias.name.to_string()));
        }
        Stmt::ImportFrom(import_from_stmt) => {
            // `from . import x` has no module and never names a distribution
            if let Some(module) = &import_from_stmt.module {
                modules.push(module.to_string());
            }
        }
        Stmt::FunctionDef(def) => process_body(&def.body, modules),
        Stmt::AsyncFunctionDef(def) => process_body(&def.body, modules),
        Stmt::ClassDef(def) => process_body(&def.body, modules),
        Stmt::If(if_stmt) => {
            process_body(&if_stmt.body, modules);
            process_body(&if_stmt.orelse, modules);
        }
        Stmt::For(for_stmt) => {
            process_body(&for_stmt.body, modules);
            process_body(&for_stmt.orelse, modules);
        }
        Stmt::AsyncFor(for_stmt) => {
            process_body(&for_stmt.body, modules);
            process_body(&for_stmt.orelse, modules);
        }
        Stmt::While(while_stmt) => {
            process_body(&while_stmt.body, modules);
            process_body(&while_stmt.orelse, modules);
        }
        Stmt::With(with_stmt) => process_body(&with_stmt.body, modules),
        Stmt::AsyncWith(with_stmt) => process_body(&with_stmt.body, modules),
        Stmt::Try(try_stmt) => {
            process_body(&try_stmt.body, modules);
            process_handlers(&try_stmt.handlers, modules);
            process_body(&try_stmt.orelse, modules);
            process_body(&try_stmt.finalbody, modules);
        }
        Stmt::TryStar(try_stmt) => {
            process_body(&try_stmt.body, modules);
            process_handlers(&try_stmt.handlers, modules);
            process_body(&try_stmt.orelse, modules);
            process_body(&try_stmt.finalbody, modules);
        }
        Stmt::Match(match_stmt) => {
            for case in &match_stmt.cases {
                process_body(&case.body, modules);
            }
        }
        _ => {}
    }
}

fn process_handlers(handlers: &[ExceptHandler], modules: &mut Vec<String>) {
    for handler in handlers {
        let ExceptHandler::ExceptHandler(handler) = handler;
        process_body(&handler.body, modules);
    }
}

fn process_body(body: &[Stmt], modules: &mut Vec<String>) {
    for stmt in body {
        process_stmt(stmt, modules);
    }
}

/// Dotted module paths imported by `python_code`, in source order.
///
/// `from pkg import a, b` yields `pkg` once. Relative imports without a module
/// (`from . import x`) yield nothing.
pub fn extract_imported_modules(python_code: &str) -> Result<Vec<String>> {
    let ast = parse(python_code, Mode::Module, "<string>")?;
    let mut modules = Vec::new();

    match ast {
        Mod::Module(module) => process_body(&module.body, &mut modules),
        Mod::Interactive(interactive) => process_body(&interactive.body, &mut modules),
        Mod::Expression(_) | Mod::FunctionType(_) => {}
    }

    Ok(modules)
}

/// Lowercased root module names imported anywhere in `python_code`.
pub fn extract_top_level_names(python_code: &str) -> Result<BTreeSet<String>> {
    Ok(extract_imported_modules(python_code)?
        .iter()
        .map(|module| root_module(module))
        .collect())
}
