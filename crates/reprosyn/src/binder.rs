use crate::config::CampaignConfig;
use crate::crashlog::CrashOccurrence;
use crate::registry::{ApiSignature, BindingTables, ParamRole, SignatureRegistry};

/// Marker carried by backward-flavored implementation identifiers.
pub const BACKWARD_MARKER: &str = "_backward";

/// Marker for kernels that require the opaque-layout conversion.
pub const MKLDNN_MARKER: &str = "mkldnn";

/// Parameter carrying the synthetic upstream gradient of a backward kernel;
/// it has no counterpart in the forward signature.
const GRADIENT_PARAM: &str = "grad_output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// No public entry point reaches this implementation, even through the
    /// dispatch relation.
    NoEntryPoint,
    /// The implementation parameter names do not cover the public signature;
    /// positional guessing across mismatched signatures is never attempted.
    StructuralMismatch(String),
    /// The entry point is flagged as requiring a hand-authored binding.
    ManualBindingOnly,
}

impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindError::NoEntryPoint => write!(f, "no public entry point"),
            BindError::StructuralMismatch(detail) => {
                write!(f, "structural mismatch: {detail}")
            }
            BindError::ManualBindingOnly => write!(f, "manual binding only"),
        }
    }
}

impl std::error::Error for BindError {}

/// Outcome of entry-point resolution for one implementation identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub candidates: Vec<String>,
    pub backward: bool,
}

/// Resolves the candidate public entry points for an implementation
/// identifier.
///
/// Backward-flavored identifiers consult the derivative relation first; when
/// the forward entry point it names is itself unknown, the backward marker is
/// stripped and direct resolution is retried before failing.
pub fn resolve_entry_points(
    impl_id: &str,
    tables: &BindingTables,
    registry: &SignatureRegistry,
) -> Result<Resolution, BindError> {
    let backward = impl_id.contains(BACKWARD_MARKER);
    let mut candidates: Option<Vec<String>> =
        tables.entry_candidates(impl_id).map(<[String]>::to_vec);

    if backward {
        if let Some(forward) = tables.forward_entry(impl_id) {
            if registry.contains(forward) {
                candidates = Some(vec![forward.to_string()]);
            }
        }
        if candidates.is_none() {
            let stripped = impl_id.replace(BACKWARD_MARKER, "");
            candidates = tables.entry_candidates(&stripped).map(<[String]>::to_vec);
        }
    }

    candidates
        .filter(|candidates| !candidates.is_empty())
        .map(|candidates| Resolution {
            candidates,
            backward,
        })
        .ok_or(BindError::NoEntryPoint)
}

/// A crash occurrence bound to one public entry point: variable names for
/// every captured argument, attribute assignments, and the invocation text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundCall {
    pub entry_point: String,
    /// Name the artifact is filed under (`<entry>_backward` for backward
    /// occurrences).
    pub artifact_name: String,
    pub backward: bool,
    pub mkldnn: bool,
    /// Entry-point-level configuration assignments from the attribute block.
    pub attr_statements: Vec<String>,
    /// Local variable name per argument encoding position, taken from the
    /// implementation signature.
    pub var_names: Vec<String>,
    pub invocation: String,
}

/// Aligns one occurrence with the public signature of `entry_point`.
pub fn bind(
    occurrence: &CrashOccurrence,
    impl_id: &str,
    entry_point: &str,
    backward: bool,
    registry: &SignatureRegistry,
    config: &CampaignConfig,
) -> Result<BoundCall, BindError> {
    let sig = registry.get(entry_point).ok_or(BindError::NoEntryPoint)?;
    if sig.manual_binding {
        return Err(BindError::ManualBindingOnly);
    }

    if occurrence.encodings.len() != sig.impl_params.len() {
        return Err(BindError::StructuralMismatch(format!(
            "{} captured arguments against {} implementation parameters",
            occurrence.encodings.len(),
            sig.impl_params.len()
        )));
    }

    let (attr_statements, attr_bound) = bind_attributes(occurrence, sig, config);
    let invocation = build_invocation(sig, &attr_bound, backward, config)?;

    Ok(BoundCall {
        entry_point: entry_point.to_string(),
        artifact_name: if backward {
            format!("{entry_point}{BACKWARD_MARKER}")
        } else {
            entry_point.to_string()
        },
        backward,
        mkldnn: impl_id.contains(MKLDNN_MARKER),
        attr_statements,
        var_names: sig.impl_params.clone(),
        invocation,
    })
}

/// Attribute-block values matching a public parameter name become direct
/// assignments; those parameters are then satisfied without a captured
/// argument.
fn bind_attributes(
    occurrence: &CrashOccurrence,
    sig: &ApiSignature,
    config: &CampaignConfig,
) -> (Vec<String>, Vec<String>) {
    let mut statements = Vec::new();
    let mut bound = Vec::new();
    for param in &sig.params {
        if matches!(param.role, ParamRole::Receiver | ParamRole::DisplayOnly) {
            continue;
        }
        let Some(raw) = occurrence.attribute(&param.name) else {
            continue;
        };
        let Some(value) = normalize_attr_value(&param.name, raw, config) else {
            continue;
        };
        statements.push(format!("{} = {}", param.name, value));
        bound.push(param.name.clone());
    }
    (statements, bound)
}

const DTYPE_ATTRS: &[&str] = &[
    "dtype",
    "dt",
    "index_type",
    "output_dtype",
    "out_type",
    "out_values_type",
    "out_row_splits_type",
    "out_idx",
    "out_idx_type",
    "output_idx_type",
    "internal_type",
];

fn normalize_attr_value(name: &str, value: &str, config: &CampaignConfig) -> Option<String> {
    // Embedded value dumps inside the attribute block are not reproducible
    // as configuration; skip them.
    if value.starts_with("Tensor<") && value.ends_with('>') {
        return None;
    }

    if name == "dtypes" {
        let inner = value.trim_start_matches('[').trim_end_matches(']');
        let mapped: Vec<String> = inner
            .split(", ")
            .filter(|elem| !elem.is_empty())
            .map(|elem| element_type_literal(elem, config))
            .collect();
        return Some(format!("[{}]", mapped.join(", ")));
    }

    // Function-valued attributes cannot be reconstructed from the capture.
    if matches!(name, "cond" | "body") {
        return Some("[]".to_string());
    }

    if DTYPE_ATTRS.contains(&name) || name.starts_with('T') {
        return Some(element_type_literal(value, config));
    }

    match value {
        "true" => Some("True".to_string()),
        "false" => Some("False".to_string()),
        other => Some(other.to_string()),
    }
}

/// Maps a captured element-type name (`DT_FLOAT`, `float`, ...) to the dtype
/// literal user code spells.
fn element_type_literal(value: &str, config: &CampaignConfig) -> String {
    let name = match value.trim() {
        "DT_FLOAT" | "float" => "float32".to_string(),
        "DT_DOUBLE" | "double" => "float64".to_string(),
        "half" => "float16".to_string(),
        stripped if stripped.starts_with("DT_") => stripped[3..].to_lowercase(),
        other => other.to_string(),
    };
    config.dtype_literal(&name)
}

fn build_invocation(
    sig: &ApiSignature,
    attr_bound: &[String],
    backward: bool,
    config: &CampaignConfig,
) -> Result<String, BindError> {
    let mut positional = Vec::new();
    let mut keyword = Vec::new();

    for param in &sig.params {
        if param.role == ParamRole::DisplayOnly || param.role == ParamRole::Output {
            continue;
        }
        if backward && param.name == GRADIENT_PARAM {
            continue;
        }
        let satisfied =
            attr_bound.contains(&param.name) || sig.impl_params.contains(&param.name);
        if !satisfied {
            return Err(BindError::StructuralMismatch(format!(
                "public parameter '{}' has no implementation counterpart",
                param.name
            )));
        }
        match param.role {
            ParamRole::Keyword => keyword.push(format!("{}={}", param.name, param.name)),
            _ => positional.push(param.name.clone()),
        }
    }

    let namespace = sig.namespace.as_deref().unwrap_or(&config.namespace);
    if sig.method {
        let receiver = match sig.receiver() {
            Some(param) => {
                positional.retain(|name| name != &param.name);
                param.name.clone()
            }
            None if !positional.is_empty() => positional.remove(0),
            None => {
                return Err(BindError::StructuralMismatch(
                    "method-style entry point without a receiver argument".to_string(),
                ))
            }
        };
        let rest: Vec<String> = positional.into_iter().chain(keyword).collect();
        Ok(format!("{receiver}.{}({})", sig.name, rest.join(", ")))
    } else {
        let args: Vec<String> = positional.into_iter().chain(keyword).collect();
        Ok(format!("{namespace}.{}({})", sig.name, args.join(", ")))
    }
}
