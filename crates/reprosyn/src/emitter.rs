use crate::binder::BoundCall;
use crate::config::CampaignConfig;
use crate::value::{CompositeValue, Precision, TypedValue};

/// The value cannot be rendered; the caller must not substitute a
/// best-effort literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot emit value of kind '{0}'")]
pub struct EmitFailure(pub String);

/// Emission context for one occurrence. `emit_*` are pure functions of their
/// inputs: identical value and context always produce byte-identical text,
/// which the deduplication layer relies on.
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    pub config: &'a CampaignConfig,
    pub backward: bool,
    pub mkldnn: bool,
}

/// Renders a typed value as a target-language expression.
pub fn emit_expression(value: &TypedValue, ctx: &EmitContext<'_>) -> Result<String, EmitFailure> {
    let ns = &ctx.config.namespace;
    match value {
        TypedValue::AbsentOptional => Ok("None".to_string()),
        TypedValue::Composite(composite) => Ok(emit_composite(composite, ctx)),
        TypedValue::NumericScalar { text, boxed, .. } => {
            if *boxed {
                // The framework passes these positions as 0-d composites,
                // never as bare host-language numbers.
                Ok(format!("{ns}.tensor({text})"))
            } else {
                Ok(text.clone())
            }
        }
        TypedValue::TextScalar(text) => Ok(format!("\"{text}\"")),
        TypedValue::BoolScalar(b) => Ok(python_bool(*b).to_string()),
        TypedValue::NumericArray(elems) => Ok(format!("[{}]", elems.join(", "))),
        TypedValue::BoolArray(elems) => {
            let rendered: Vec<&str> = elems.iter().map(|b| python_bool(*b)).collect();
            Ok(format!("[{}]", rendered.join(", ")))
        }
        TypedValue::Unsupported(tag) => Err(EmitFailure(tag.clone())),
    }
}

/// Renders one argument-construction statement.
pub fn emit_statement(
    var: &str,
    value: &TypedValue,
    ctx: &EmitContext<'_>,
) -> Result<String, EmitFailure> {
    let mut statement = format!("{var} = {}", emit_expression(value, ctx)?);
    if ctx.mkldnn && converts_to_mkldnn(value) {
        statement.push_str(".to_mkldnn()");
    }
    Ok(statement)
}

fn converts_to_mkldnn(value: &TypedValue) -> bool {
    matches!(
        value,
        TypedValue::Composite(CompositeValue {
            precision: Precision::F32 | Precision::BF16,
            ..
        })
    )
}

fn emit_composite(composite: &CompositeValue, ctx: &EmitContext<'_>) -> String {
    let ns = &ctx.config.namespace;
    let dtype = ctx.config.dtype_literal(composite.precision.api_name());
    let shape = shape_tuple(&composite.shape);

    if composite.is_empty {
        return format!("{ns}.empty({shape}, dtype={dtype})");
    }

    let mut expr = format!(
        "{ns}.full({shape}, {}, dtype={dtype}, requires_grad={})",
        composite.value,
        python_bool(tracks_gradient(composite, ctx)),
    );
    if ctx.config.accelerated {
        expr.truncate(expr.len() - 1);
        expr.push_str(&format!(", device={})", ctx.config.device_argument));
    }
    expr
}

/// Values fed into a backward pass must track gradients; only floating
/// precisions can.
fn tracks_gradient(composite: &CompositeValue, ctx: &EmitContext<'_>) -> bool {
    (ctx.backward || composite.requires_grad) && composite.precision.is_float()
}

fn shape_tuple(shape: &[u64]) -> String {
    match shape {
        [] => "()".to_string(),
        [dim] => format!("({dim},)"),
        dims => {
            let rendered: Vec<String> = dims.iter().map(u64::to_string).collect();
            format!("({})", rendered.join(", "))
        }
    }
}

fn python_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Compact per-argument record for the validation form
/// (`kind` line followed by field lines).
pub fn emit_validation_record(
    value: &TypedValue,
    ctx: &EmitContext<'_>,
) -> Result<String, EmitFailure> {
    match value {
        TypedValue::AbsentOptional => Ok("opttensor".to_string()),
        TypedValue::Composite(composite) => {
            let dtype = ctx.config.dtype_literal(composite.precision.api_name());
            let shape: Vec<String> = composite.shape.iter().map(u64::to_string).collect();
            Ok(format!(
                "tensor\n{dtype}\n{}\n{}\n{}",
                composite.value,
                shape.join(","),
                python_bool(tracks_gradient(composite, ctx)),
            ))
        }
        TypedValue::NumericScalar { text, float, boxed } => {
            if *boxed {
                let kind = if *float { "float" } else { "int" };
                Ok(format!("scalar\n{kind}\n{text}"))
            } else if *float {
                Ok(format!("double\n{text}"))
            } else {
                Ok(format!("int\n{text}"))
            }
        }
        TypedValue::TextScalar(text) => Ok(format!("string\n\"{text}\"")),
        TypedValue::BoolScalar(b) => Ok(format!("bool\n{}", python_bool(*b))),
        TypedValue::NumericArray(elems) => Ok(format!("intarray\n{}", elems.join(","))),
        TypedValue::BoolArray(elems) => {
            let rendered: Vec<&str> = elems.iter().map(|b| python_bool(*b)).collect();
            Ok(format!("boolarray\n[{}]", rendered.join(", ")))
        }
        TypedValue::Unsupported(tag) => Err(EmitFailure(tag.clone())),
    }
}

/// Assembles the reproduction program body. The identifier header is not
/// part of the body: deduplication hashes the body alone, so the same
/// occurrence reached through differently named kernels stays one artifact.
pub fn assemble_program(
    bound: &BoundCall,
    arg_statements: &[String],
    ctx: &EmitContext<'_>,
) -> String {
    let ns = &ctx.config.namespace;
    let mut lines = Vec::new();
    lines.push(ctx.config.import_preamble.clone());
    lines.push(String::new());
    if ctx.config.accelerated {
        lines.extend(ctx.config.device_preamble.iter().cloned());
    }
    lines.extend(bound.attr_statements.iter().cloned());
    lines.extend(arg_statements.iter().cloned());
    if bound.backward {
        lines.push(format!("res = {}", bound.invocation));
        lines.push(format!("grad_out = {ns}.zeros_like(res)"));
        lines.push(format!("{ns}.autograd.backward(res, grad_tensors=grad_out)"));
    } else {
        lines.push(bound.invocation.clone());
    }
    lines.join("\n")
}

/// JSON artifact form: `{"args": [...], "binding_call": "..."}`.
pub fn assemble_json(bound: &BoundCall, arg_statements: &[String]) -> String {
    let mut args: Vec<&String> = Vec::new();
    args.extend(bound.attr_statements.iter());
    args.extend(arg_statements.iter());
    let call = if bound.backward {
        format!("res = {}", bound.invocation)
    } else {
        bound.invocation.clone()
    };
    serde_json::json!({
        "args": args,
        "binding_call": call,
    })
    .to_string()
}

/// Validation artifact form: one record per argument.
pub fn assemble_validation(records: &[String]) -> String {
    records.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Placement;

    fn ctx(config: &CampaignConfig) -> EmitContext<'_> {
        EmitContext {
            config,
            backward: false,
            mkldnn: false,
        }
    }

    fn composite(value: &str, shape: &[u64], precision: Precision) -> TypedValue {
        TypedValue::Composite(CompositeValue {
            value: value.to_string(),
            shape: shape.to_vec(),
            precision,
            placement: Placement::Host,
            requires_grad: false,
            is_empty: false,
        })
    }

    #[test]
    fn emission_is_deterministic() {
        let config = CampaignConfig::default();
        let value = composite("2.5", &[2, 3], Precision::F32);
        let first = emit_expression(&value, &ctx(&config)).unwrap();
        let second = emit_expression(&value, &ctx(&config)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn composite_construction_carries_all_fields() {
        let config = CampaignConfig::default();
        let value = composite("2.5", &[2, 3], Precision::F32);
        assert_eq!(
            emit_expression(&value, &ctx(&config)).unwrap(),
            "torch.full((2, 3), 2.5, dtype=torch.float32, requires_grad=False)"
        );
    }

    #[test]
    fn accelerated_campaign_adds_placement() {
        let config = CampaignConfig {
            accelerated: true,
            ..CampaignConfig::default()
        };
        let value = composite("1", &[4], Precision::F64);
        assert_eq!(
            emit_expression(&value, &ctx(&config)).unwrap(),
            "torch.full((4,), 1, dtype=torch.float64, requires_grad=False, device=gpu_dev)"
        );
    }

    #[test]
    fn backward_promotes_gradient_tracking_for_floats_only() {
        let config = CampaignConfig::default();
        let mut context = ctx(&config);
        context.backward = true;
        let float_value = composite("1", &[2], Precision::F32);
        assert!(emit_expression(&float_value, &context)
            .unwrap()
            .contains("requires_grad=True"));
        let int_value = composite("1", &[2], Precision::I64);
        assert!(emit_expression(&int_value, &context)
            .unwrap()
            .contains("requires_grad=False"));
    }

    #[test]
    fn empty_composite_uses_empty_construction() {
        let config = CampaignConfig::default();
        let value = TypedValue::Composite(CompositeValue {
            value: String::new(),
            shape: vec![0],
            precision: Precision::F32,
            placement: Placement::Host,
            requires_grad: false,
            is_empty: true,
        });
        assert_eq!(
            emit_expression(&value, &ctx(&config)).unwrap(),
            "torch.empty((0,), dtype=torch.float32)"
        );
    }

    #[test]
    fn boxed_scalars_wrap_in_a_trivial_composite() {
        let config = CampaignConfig::default();
        let value = TypedValue::NumericScalar {
            text: "2.5".to_string(),
            float: true,
            boxed: true,
        };
        assert_eq!(
            emit_expression(&value, &ctx(&config)).unwrap(),
            "torch.tensor(2.5)"
        );
    }

    #[test]
    fn absent_optional_renders_the_no_value_literal() {
        let config = CampaignConfig::default();
        assert_eq!(
            emit_statement("mask", &TypedValue::AbsentOptional, &ctx(&config)).unwrap(),
            "mask = None"
        );
    }

    #[test]
    fn unsupported_values_are_never_guessed() {
        let config = CampaignConfig::default();
        let value = TypedValue::Unsupported("Generator".to_string());
        assert_eq!(
            emit_expression(&value, &ctx(&config)),
            Err(EmitFailure("Generator".to_string()))
        );
    }

    #[test]
    fn mkldnn_conversion_applies_to_eligible_precisions() {
        let config = CampaignConfig::default();
        let mut context = ctx(&config);
        context.mkldnn = true;
        let eligible = composite("1", &[2], Precision::F32);
        assert!(emit_statement("x", &eligible, &context)
            .unwrap()
            .ends_with(".to_mkldnn()"));
        let ineligible = composite("1", &[2], Precision::F64);
        assert!(!emit_statement("x", &ineligible, &context)
            .unwrap()
            .ends_with(".to_mkldnn()"));
    }

    #[test]
    fn validation_record_for_composites() {
        let config = CampaignConfig::default();
        let value = composite("3", &[2, 2], Precision::I32);
        assert_eq!(
            emit_validation_record(&value, &ctx(&config)).unwrap(),
            "tensor\ntorch.int32\n3\n2,2\nFalse"
        );
    }
}
