use serde::Serialize;

/// Element precision of a composite value, as captured by the instrumentation.
///
/// The capture format records the native element-type name (`float`,
/// `c10::Half`, ...); a missing precision marker defaults to the widest
/// floating precision the framework knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Precision {
    U8,
    I8,
    I16,
    I32,
    I64,
    F16,
    BF16,
    F32,
    F64,
    C64,
    C128,
    Bool,
}

impl Precision {
    pub fn from_native(name: &str) -> Option<Self> {
        match name.trim() {
            "unsigned char" => Some(Precision::U8),
            "signed char" => Some(Precision::I8),
            "short int" => Some(Precision::I16),
            "int" => Some(Precision::I32),
            "long" | "long int" => Some(Precision::I64),
            "c10::Half" | "half" => Some(Precision::F16),
            "c10::BFloat16" | "bfloat16" => Some(Precision::BF16),
            "float" => Some(Precision::F32),
            "double" => Some(Precision::F64),
            "c10::complex<float>" => Some(Precision::C64),
            "c10::complex<double>" => Some(Precision::C128),
            "bool" => Some(Precision::Bool),
            _ => None,
        }
    }

    /// Dtype name as exposed by the public API, without the namespace prefix.
    pub fn api_name(&self) -> &'static str {
        match self {
            Precision::U8 => "uint8",
            Precision::I8 => "int8",
            Precision::I16 => "int16",
            Precision::I32 => "int32",
            Precision::I64 => "int64",
            Precision::F16 => "float16",
            Precision::BF16 => "bfloat16",
            Precision::F32 => "float32",
            Precision::F64 => "float64",
            Precision::C64 => "cfloat",
            Precision::C128 => "cdouble",
            Precision::Bool => "bool",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Precision::F16 | Precision::BF16 | Precision::F32 | Precision::F64
        )
    }
}

/// Device the composite value lived on when the kernel crashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placement {
    Host,
    Accelerated,
}

impl Placement {
    pub fn from_device(device: &str) -> Self {
        if device.contains("cuda") {
            Placement::Accelerated
        } else {
            Placement::Host
        }
    }
}

/// A tensor-like value reconstructed from one captured argument.
///
/// Contents with more than one element are collapsed to the first repaired
/// element; the reproduction fills the full shape with it. This is a
/// deliberate fidelity reduction inherited from the capture format, which
/// truncates large buffers anyway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeValue {
    pub value: String,
    pub shape: Vec<u64>,
    pub precision: Precision,
    pub placement: Placement,
    pub requires_grad: bool,
    pub is_empty: bool,
}

/// Decoded form of one argument encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypedValue {
    /// An optional parameter the kernel received no value for.
    AbsentOptional,
    Composite(CompositeValue),
    /// `boxed` marks values the framework only ever passes as 0-d
    /// composites, never as bare host-language numbers.
    NumericScalar {
        text: String,
        float: bool,
        boxed: bool,
    },
    TextScalar(String),
    BoolScalar(bool),
    NumericArray(Vec<String>),
    BoolArray(Vec<bool>),
    /// A type tag the decoder does not cover; kept for reporting, never
    /// substituted with a guess.
    Unsupported(String),
}

impl TypedValue {
    pub fn kind(&self) -> &'static str {
        match self {
            TypedValue::AbsentOptional => "absent-optional",
            TypedValue::Composite(_) => "composite",
            TypedValue::NumericScalar { .. } => "numeric-scalar",
            TypedValue::TextScalar(_) => "textual-scalar",
            TypedValue::BoolScalar(_) => "boolean-scalar",
            TypedValue::NumericArray(_) => "numeric-array",
            TypedValue::BoolArray(_) => "boolean-array",
            TypedValue::Unsupported(_) => "unsupported",
        }
    }
}
