use std::sync::OnceLock;

use regex::Regex;

use crate::value::{CompositeValue, Placement, Precision, TypedValue};

/// The encoding could not be decoded at all (malformed capture, not merely an
/// uncovered type tag).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized argument encoding: {0}")]
pub struct DecodeFailure(pub String);

const CONTENTS_MARKER: &str = "Contents: ";
const SIZES_MARKER: &str = "Sizes: ";
const DTYPE_MARKER: &str = "Dtype: ";
const DEVICE_MARKER: &str = "Device: ";
const GRAD_MARKER: &str = "Requires grad: ";
const ABSENT_MARKER: &str = "nullopt";
const EMPTY_MARKER: &str = "empty";

/// Decoded argument category, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    AbsentOptional,
    Composite,
    BoolArray,
    NumericArray,
    IntScalar,
    FloatScalar,
    BoxedScalar,
    TextScalar,
    BoolScalar,
    Unsupported,
}

/// Ordered classification table. The first matching rule wins, so precedence
/// is auditable here rather than buried in nested conditionals.
const CLASSIFICATION: &[(Category, fn(&str, &str) -> bool)] = &[
    (Category::AbsentOptional, |_, enc| enc.contains(ABSENT_MARKER)),
    (Category::Composite, |_, enc| {
        enc.contains(CONTENTS_MARKER) && enc.contains(SIZES_MARKER)
    }),
    (Category::BoolArray, |tag, _| {
        tag.starts_with("std::array<bool")
    }),
    (Category::NumericArray, |tag, _| {
        tag.starts_with("IntArrayRef")
            || tag.starts_with("OptionalIntArrayRef")
            || tag.starts_with("ArrayRef<double>")
    }),
    (Category::IntScalar, |tag, _| {
        matches!(
            tag,
            "int" | "long" | "long int" | "short int" | "int64_t" | "int?"
                | "long?" | "int64_t?" | "OptionalInt" | "OptionalLong"
        )
    }),
    (Category::FloatScalar, |tag, _| {
        matches!(tag, "double" | "double?")
    }),
    (Category::BoxedScalar, |tag, _| {
        matches!(tag, "Scalar" | "Scalar?" | "OptionalScalar")
    }),
    (Category::TextScalar, |tag, _| {
        matches!(
            tag,
            "std::string" | "std::string?" | "String" | "OptionalString"
        )
    }),
    (Category::BoolScalar, |tag, _| {
        matches!(tag, "bool" | "bool?" | "OptionalBool")
    }),
];

pub fn classify(encoding: &str) -> Category {
    let tag = type_tag(encoding);
    for (category, matches) in CLASSIFICATION {
        if matches(tag, encoding) {
            return *category;
        }
    }
    Category::Unsupported
}

/// Decodes one textual argument encoding into a typed value.
///
/// Uncovered type tags decode to [`TypedValue::Unsupported`]; only a
/// malformed capture (a composite missing its field markers) is an error.
pub fn decode(encoding: &str) -> Result<TypedValue, DecodeFailure> {
    let encoding = encoding.trim();
    match classify(encoding) {
        Category::AbsentOptional => Ok(TypedValue::AbsentOptional),
        Category::Composite => decode_composite(encoding).map(TypedValue::Composite),
        Category::BoolArray => Ok(TypedValue::BoolArray(bool_elements(payload(encoding)))),
        Category::NumericArray => Ok(TypedValue::NumericArray(numeric_elements(payload(
            encoding,
        )))),
        Category::IntScalar => Ok(TypedValue::NumericScalar {
            text: repair_numeric(payload(encoding)),
            float: false,
            boxed: false,
        }),
        Category::FloatScalar => Ok(TypedValue::NumericScalar {
            text: repair_numeric(payload(encoding)),
            float: true,
            boxed: false,
        }),
        Category::BoxedScalar => {
            let text = repair_numeric(payload(encoding));
            let float = text.contains('.') || text.contains('e');
            Ok(TypedValue::NumericScalar {
                text,
                float,
                boxed: true,
            })
        }
        Category::TextScalar => Ok(TypedValue::TextScalar(payload(encoding).to_string())),
        Category::BoolScalar => Ok(TypedValue::BoolScalar(payload(encoding).trim() != "0")),
        Category::Unsupported => Ok(TypedValue::Unsupported(type_tag(encoding).to_string())),
    }
}

fn type_tag(encoding: &str) -> &str {
    encoding.split_whitespace().next().unwrap_or_default()
}

fn payload(encoding: &str) -> &str {
    match encoding.find(' ') {
        Some(idx) => encoding[idx + 1..].trim(),
        None => "",
    }
}

/// Repairs a numeric literal mangled by the capture format, which can
/// concatenate truncated or repeated sub-tokens.
pub fn repair_numeric(value: &str) -> String {
    let mut value = value.trim().replace("...", "");

    // Repeated signs first, so negative decimals stay negative.
    if value.matches('-').count() > 1 && !value.contains('e') {
        let first = value.split('-').nth(1).unwrap_or_default();
        value = format!("-{first}");
    } else if value.matches('.').count() > 1 {
        let last = value.rsplit('.').next().unwrap_or_default();
        value = format!(".{last}");
    }

    if !value.contains('.') {
        while value.len() > 1 && value.starts_with('0') {
            value.remove(0);
        }
    }

    // Placeholders and digitless leftovers (`?`, a bare sign) are not valid
    // literals; resolve them to the neutral default.
    if !value.contains(|c: char| c.is_ascii_digit()) {
        value = "1".to_string();
    }

    value
}

fn bool_elements(payload: &str) -> Vec<bool> {
    payload
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ',' | ' '))
        .map(|c| c != '0')
        .collect()
}

fn numeric_elements(payload: &str) -> Vec<String> {
    payload
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|elem| elem.trim().trim_matches(|c| c == '[' || c == ']'))
        .filter(|elem| !elem.is_empty())
        .map(repair_numeric)
        .collect()
}

fn decode_composite(encoding: &str) -> Result<CompositeValue, DecodeFailure> {
    let contents_idx = marker_index(encoding, CONTENTS_MARKER)?;
    let sizes_idx = marker_index(encoding, SIZES_MARKER)?;
    let device_idx = marker_index(encoding, DEVICE_MARKER)?;
    let grad_idx = marker_index(encoding, GRAD_MARKER)?;
    if contents_idx > sizes_idx || sizes_idx > device_idx || device_idx > grad_idx {
        return Err(DecodeFailure(encoding.to_string()));
    }

    // The precision marker is optional and only meaningful between the
    // sizes and device fields.
    let dtype_idx = encoding
        .find(DTYPE_MARKER)
        .filter(|&idx| idx > sizes_idx && idx + DTYPE_MARKER.len() <= device_idx);

    let contents = &encoding[contents_idx + CONTENTS_MARKER.len()..sizes_idx];
    let sizes_end = dtype_idx.unwrap_or(device_idx);
    let sizes = &encoding[sizes_idx + SIZES_MARKER.len()..sizes_end];
    let precision = match dtype_idx {
        Some(idx) => {
            let name = encoding[idx + DTYPE_MARKER.len()..device_idx].trim();
            Precision::from_native(name).unwrap_or(Precision::F64)
        }
        None => Precision::F64,
    };
    let device = encoding[device_idx + DEVICE_MARKER.len()..grad_idx].trim();
    let grad = encoding[grad_idx + GRAD_MARKER.len()..].trim();

    let is_empty = contents.contains(EMPTY_MARKER);
    let value = if is_empty {
        String::new()
    } else {
        first_element(contents)
    };

    Ok(CompositeValue {
        value,
        shape: parse_shape(sizes),
        precision,
        placement: Placement::from_device(device),
        requires_grad: grad == "1",
        is_empty,
    })
}

fn marker_index(encoding: &str, marker: &str) -> Result<usize, DecodeFailure> {
    encoding
        .find(marker)
        .ok_or_else(|| DecodeFailure(encoding.to_string()))
}

/// Collapses a captured buffer to its first repaired element.
fn first_element(contents: &str) -> String {
    let first = contents
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|elem| elem.trim_matches(|c| c == '[' || c == ']'))
        .find(|elem| !elem.is_empty())
        .unwrap_or_default();
    repair_numeric(first)
}

fn parse_shape(sizes: &str) -> Vec<u64> {
    static DIMS: OnceLock<Regex> = OnceLock::new();
    let dims = DIMS.get_or_init(|| Regex::new(r"\d+").expect("shape pattern"));
    dims.find_iter(sizes)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_keeps_first_signed_token() {
        assert_eq!(repair_numeric("-1-2"), "-1");
    }

    #[test]
    fn repair_keeps_final_decimal_group() {
        assert_eq!(repair_numeric("0.5.3"), ".3");
        assert_eq!(repair_numeric("0.50.3"), ".3");
    }

    #[test]
    fn repair_strips_leading_zeros() {
        assert_eq!(repair_numeric("007"), "7");
        assert_eq!(repair_numeric("0"), "0");
        assert_eq!(repair_numeric("0.5"), "0.5");
    }

    #[test]
    fn repair_resolves_placeholders() {
        assert_eq!(repair_numeric("..."), "1");
        assert_eq!(repair_numeric("?"), "1");
    }

    #[test]
    fn repair_resolves_sign_only_captures() {
        assert_eq!(repair_numeric("-"), "1");
        assert_eq!(repair_numeric("--"), "1");
        assert_eq!(repair_numeric("-."), "1");
    }

    #[test]
    fn boolean_digits_normalize() {
        assert_eq!(
            decode("std::array<bool,3> [0]").unwrap(),
            TypedValue::BoolArray(vec![false])
        );
        assert_eq!(
            decode("std::array<bool,3> [1]").unwrap(),
            TypedValue::BoolArray(vec![true])
        );
        assert_eq!(
            decode("std::array<bool,3> 101").unwrap(),
            TypedValue::BoolArray(vec![true, false, true])
        );
    }

    #[test]
    fn empty_numeric_array_decodes() {
        assert_eq!(
            decode("IntArrayRef []").unwrap(),
            TypedValue::NumericArray(Vec::new())
        );
    }

    #[test]
    fn absent_marker_takes_precedence() {
        assert_eq!(classify("Tensor? nullopt"), Category::AbsentOptional);
        assert_eq!(decode("Tensor? nullopt").unwrap(), TypedValue::AbsentOptional);
    }

    #[test]
    fn composite_markers_beat_tag_rules() {
        let enc = "Tensor Contents: 1 Sizes: [2] Device: cpu Requires grad: 0";
        assert_eq!(classify(enc), Category::Composite);
    }

    #[test]
    fn composite_defaults_to_widest_float() {
        let enc = "Tensor Contents: 2.5 Sizes: [2, 3] Device: cpu Requires grad: 1";
        let TypedValue::Composite(composite) = decode(enc).unwrap() else {
            panic!("expected composite");
        };
        assert_eq!(composite.precision, Precision::F64);
        assert_eq!(composite.shape, vec![2, 3]);
        assert!(composite.requires_grad);
        assert_eq!(composite.value, "2.5");
    }

    #[test]
    fn composite_collapses_to_first_element() {
        let enc = "Tensor Contents: [3, 9, 9] Sizes: [3] Dtype: int Device: cpu Requires grad: 0";
        let TypedValue::Composite(composite) = decode(enc).unwrap() else {
            panic!("expected composite");
        };
        assert_eq!(composite.value, "3");
        assert_eq!(composite.precision, Precision::I32);
    }

    #[test]
    fn composite_empty_contents() {
        let enc = "Tensor Contents: empty... Sizes: [0] Dtype: float Device: cpu Requires grad: 0";
        let TypedValue::Composite(composite) = decode(enc).unwrap() else {
            panic!("expected composite");
        };
        assert!(composite.is_empty);
        assert_eq!(composite.shape, vec![0]);
    }

    #[test]
    fn composite_missing_marker_is_a_failure() {
        let enc = "Tensor Contents: 1 Sizes: [2]";
        assert!(decode(enc).is_err());
    }

    #[test]
    fn unknown_tag_is_recorded_not_guessed() {
        assert_eq!(
            decode("Generator something").unwrap(),
            TypedValue::Unsupported("Generator".to_string())
        );
    }

    #[test]
    fn boxed_scalar_keeps_float_detection() {
        assert_eq!(
            decode("Scalar 2.5").unwrap(),
            TypedValue::NumericScalar {
                text: "2.5".to_string(),
                float: true,
                boxed: true,
            }
        );
        assert_eq!(
            decode("Scalar 7").unwrap(),
            TypedValue::NumericScalar {
                text: "7".to_string(),
                float: false,
                boxed: true,
            }
        );
    }
}
