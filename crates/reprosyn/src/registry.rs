use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::ReproError;

/// Role a parameter plays in the public signature, as declared by the
/// framework (never inferred from naming).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRole {
    Receiver,
    Positional,
    Keyword,
    Output,
    /// A display-name parameter; carries no runtime value.
    DisplayOnly,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub role: ParamRole,
}

/// Metadata for one public entry point, joined with the parameter names of
/// the low-level implementation behind it.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSignature {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub method: bool,
    /// Requires a hand-authored binding; synthesis must not attempt it.
    #[serde(default)]
    pub manual_binding: bool,
    pub params: Vec<ParamSpec>,
    /// Ordered parameter names of the implementation that crashed. Used to
    /// name local variables and to validate arity, never for cross-signature
    /// positional guessing.
    pub impl_params: Vec<String>,
}

impl ApiSignature {
    pub fn receiver(&self) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.role == ParamRole::Receiver)
    }
}

/// Read-only registry of public entry point signatures, loaded once at
/// startup from the framework's declarative signature dump.
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    signatures: HashMap<String, ApiSignature>,
}

impl SignatureRegistry {
    pub fn from_signatures(signatures: Vec<ApiSignature>) -> Self {
        let signatures = signatures
            .into_iter()
            .map(|sig| (sig.name.clone(), sig))
            .collect();
        SignatureRegistry { signatures }
    }

    pub fn load(path: &Path) -> Result<Self, ReproError> {
        let content = fs::read_to_string(path)?;
        let signatures: Vec<ApiSignature> =
            serde_json::from_str(&content).map_err(|err| ReproError::InvalidRegistry {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        Ok(Self::from_signatures(signatures))
    }

    pub fn get(&self, entry_point: &str) -> Option<&ApiSignature> {
        self.signatures.get(entry_point)
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.signatures.contains_key(entry_point)
    }
}

/// The binding, dispatch and derivative relations, loaded once and read-only
/// for the engine's lifetime.
#[derive(Debug, Default)]
pub struct BindingTables {
    /// implementation identifier -> candidate public entry point names
    bindings: HashMap<String, Vec<String>>,
    /// backend-specialized identifier -> canonical grouping identifier
    dispatch: HashMap<String, String>,
    /// backward-flavored identifier -> forward entry point
    derivatives: HashMap<String, String>,
}

impl BindingTables {
    pub fn new(
        bindings: HashMap<String, Vec<String>>,
        dispatch: HashMap<String, String>,
        derivatives: HashMap<String, String>,
    ) -> Self {
        BindingTables {
            bindings,
            dispatch,
            derivatives,
        }
    }

    pub fn load(
        bindings_path: &Path,
        dispatch_path: Option<&Path>,
        derivatives_path: Option<&Path>,
    ) -> Result<Self, ReproError> {
        let mut tables = BindingTables::default();
        for (line_no, (impl_id, rest)) in read_pairs(bindings_path)? {
            if rest.is_empty() {
                return Err(table_error(bindings_path, line_no, "missing entry points"));
            }
            let entries = rest.split(',').map(str::to_string).collect();
            tables.bindings.insert(impl_id, entries);
        }
        if let Some(path) = dispatch_path {
            for (_, (impl_id, canonical)) in read_pairs(path)? {
                tables.dispatch.insert(impl_id, canonical);
            }
        }
        if let Some(path) = derivatives_path {
            for (_, (backward, forward)) in read_pairs(path)? {
                // Forward names may carry an overload suffix (`conv2d.padding`).
                let forward = forward
                    .split('.')
                    .next()
                    .unwrap_or(forward.as_str())
                    .to_string();
                tables.derivatives.insert(backward, forward);
            }
        }
        Ok(tables)
    }

    /// Candidate entry points for an implementation identifier: direct match
    /// first, then one retry through the dispatch relation.
    pub fn entry_candidates(&self, impl_id: &str) -> Option<&[String]> {
        if let Some(entries) = self.bindings.get(impl_id) {
            return Some(entries);
        }
        let canonical = self.dispatch.get(impl_id)?;
        self.bindings.get(canonical).map(Vec::as_slice)
    }

    pub fn forward_entry(&self, impl_id: &str) -> Option<&str> {
        self.derivatives.get(impl_id).map(String::as_str)
    }
}

fn read_pairs(path: &Path) -> Result<Vec<(usize, (String, String))>, ReproError> {
    let content = fs::read_to_string(path)?;
    let mut pairs = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(char::is_whitespace) else {
            return Err(table_error(path, idx + 1, "expected two fields"));
        };
        pairs.push((idx + 1, (key.to_string(), value.trim().to_string())));
    }
    Ok(pairs)
}

fn table_error(path: &Path, line: usize, message: &str) -> ReproError {
    ReproError::InvalidTable {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    }
}
