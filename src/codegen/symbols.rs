//! Free-variable collection and identifier sanitization

use crate::codegen::types::TargetType;
use crate::error::{SimError, SimResult};
use std::collections::HashMap;

/// Prefix keeping argument identifiers apart from temporaries, helpers and keywords
const IDENT_PREFIX: &str = "v_";

/// One positional argument of the generated evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// Symbol name in the source formula
    pub name: String,
    /// Sanitized Rust identifier
    pub ident: String,
    pub ty: TargetType,
}

/// Map a symbol name to a valid Rust identifier
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, then [`IDENT_PREFIX`]
/// is prepended.
pub fn sanitize(name: &str) -> String {
    let body: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("{}{}", IDENT_PREFIX, body)
}

/// Assigns positional slots to symbols in first-encounter order
#[derive(Debug, Default)]
pub struct SymbolCollector {
    args: Vec<Argument>,
    by_name: HashMap<String, usize>,
    by_ident: HashMap<String, usize>,
}

impl SymbolCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, returning its identifier
    pub fn register(&mut self, name: &str, ty: TargetType) -> SimResult<String> {
        if let Some(&slot) = self.by_name.get(name) {
            let existing = &self.args[slot];
            if existing.ty != ty {
                return Err(SimError::IdentifierCollision {
                    first: format!("{}: {}", name, existing.ty),
                    second: format!("{}: {}", name, ty),
                    ident: existing.ident.clone(),
                });
            }
            return Ok(existing.ident.clone());
        }

        let ident = sanitize(name);
        if let Some(&slot) = self.by_ident.get(&ident) {
            return Err(SimError::IdentifierCollision {
                first: self.args[slot].name.clone(),
                second: name.to_string(),
                ident,
            });
        }

        let slot = self.args.len();
        self.by_name.insert(name.to_string(), slot);
        self.by_ident.insert(ident.clone(), slot);
        self.args.push(Argument {
            name: name.to_string(),
            ident: ident.clone(),
            ty,
        });
        Ok(ident)
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.args
    }

    pub fn into_arguments(self) -> Vec<Argument> {
        self.args
    }
}
