use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::binder::{bind, resolve_entry_points, BindError, BoundCall};
use crate::config::CampaignConfig;
use crate::crashlog::{self, CrashOccurrence};
use crate::decoder::{decode, DecodeFailure};
use crate::emitter::{
    assemble_json, assemble_program, assemble_validation, emit_statement,
    emit_validation_record, EmitContext, EmitFailure,
};
use crate::persist::{persist, PersistMode};
use crate::registry::{BindingTables, SignatureRegistry};
use crate::ReproError;

/// Fixed outcome taxonomy for one processed occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    EmptyLog,
    UnsupportedType,
    NoEntryPoint,
    StructuralMismatch,
    ManualBindingOnly,
    DecodeFailure,
    OtherError,
}

/// Output form selected for the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Reproduction programs, content-addressed.
    Standard,
    /// JSON form of the same, content-addressed.
    Json,
    /// One validation artifact per implementation identifier.
    Validate,
    /// Type-survey logs in, unhashed per-entry-point programs out.
    Survey,
}

impl OutputMode {
    fn log_extension(&self) -> &'static str {
        match self {
            OutputMode::Survey => crashlog::SURVEY_EXT,
            _ => crashlog::CRASH_EXT,
        }
    }
}

/// Accumulated batch state: outcome sets keyed by implementation identifier.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub success: BTreeSet<String>,
    pub empty_log: BTreeSet<String>,
    pub unsupported_type: BTreeSet<String>,
    pub no_entry_point: BTreeSet<String>,
    pub structural_mismatch: BTreeSet<String>,
    pub manual_binding_only: BTreeSet<String>,
    pub decode_failure: BTreeSet<String>,
    pub other_error: BTreeSet<String>,
    pub successful_entry_points: BTreeSet<String>,
    pub total_occurrences: usize,
}

/// Per-outcome counts. A successfully synthesized identifier is excluded
/// from every failure count: success suppresses earlier partial failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub success: usize,
    pub empty_log: usize,
    pub unsupported_type: usize,
    pub no_entry_point: usize,
    pub structural_mismatch: usize,
    pub manual_binding_only: usize,
    pub decode_failure: usize,
    pub other_error: usize,
    pub distinct_entry_points: usize,
    pub total_occurrences: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: Outcome, impl_id: &str) {
        let set = match outcome {
            Outcome::Success => &mut self.success,
            Outcome::EmptyLog => &mut self.empty_log,
            Outcome::UnsupportedType => &mut self.unsupported_type,
            Outcome::NoEntryPoint => &mut self.no_entry_point,
            Outcome::StructuralMismatch => &mut self.structural_mismatch,
            Outcome::ManualBindingOnly => &mut self.manual_binding_only,
            Outcome::DecodeFailure => &mut self.decode_failure,
            Outcome::OtherError => &mut self.other_error,
        };
        set.insert(impl_id.to_string());
    }

    pub fn summary(&self) -> ReportSummary {
        let surviving = |set: &BTreeSet<String>| set.difference(&self.success).count();
        ReportSummary {
            success: self.success.len(),
            empty_log: surviving(&self.empty_log),
            unsupported_type: surviving(&self.unsupported_type),
            no_entry_point: surviving(&self.no_entry_point),
            structural_mismatch: surviving(&self.structural_mismatch),
            manual_binding_only: surviving(&self.manual_binding_only),
            decode_failure: surviving(&self.decode_failure),
            other_error: surviving(&self.other_error),
            distinct_entry_points: self.successful_entry_points.len(),
            total_occurrences: self.total_occurrences,
        }
    }
}

impl ReportSummary {
    pub fn render_text(&self) -> String {
        format!(
            "Total empty logs: {}\n\
             Total unsupported type: {}\n\
             Total no entry point: {}\n\
             Total structural mismatch: {}\n\
             Total manual binding only: {}\n\
             Total decode failures: {}\n\
             Total other errors: {}\n\
             Total successful: {}\n\
             Total occurrences processed: {}\n\
             Total successful (unique entry points): {}",
            self.empty_log,
            self.unsupported_type,
            self.no_entry_point,
            self.structural_mismatch,
            self.manual_binding_only,
            self.decode_failure,
            self.other_error,
            self.success,
            self.total_occurrences,
            self.distinct_entry_points,
        )
    }
}

enum OccurrenceError {
    Bind(BindError),
    Decode(DecodeFailure),
    Emit(EmitFailure),
    Persist(ReproError),
}

impl std::fmt::Display for OccurrenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OccurrenceError::Bind(err) => write!(f, "{err}"),
            OccurrenceError::Decode(err) => write!(f, "{err}"),
            OccurrenceError::Emit(err) => write!(f, "{err}"),
            OccurrenceError::Persist(err) => write!(f, "{err}"),
        }
    }
}

impl OccurrenceError {
    fn outcome(&self) -> Outcome {
        match self {
            OccurrenceError::Bind(BindError::NoEntryPoint) => Outcome::NoEntryPoint,
            OccurrenceError::Bind(BindError::StructuralMismatch(_)) => {
                Outcome::StructuralMismatch
            }
            OccurrenceError::Bind(BindError::ManualBindingOnly) => Outcome::ManualBindingOnly,
            OccurrenceError::Decode(_) => Outcome::DecodeFailure,
            OccurrenceError::Emit(_) => Outcome::UnsupportedType,
            OccurrenceError::Persist(_) => Outcome::OtherError,
        }
    }
}

/// Runs the full synthesis batch over a crash-log directory.
///
/// Every failure is occurrence-local except persistence, which aborts with a
/// diagnostic naming the failing path.
pub fn run_batch(
    crashes_dir: &Path,
    out_dir: &Path,
    tables: &BindingTables,
    registry: &SignatureRegistry,
    config: &CampaignConfig,
    mode: OutputMode,
) -> Result<BatchReport, ReproError> {
    fs::create_dir_all(out_dir).map_err(|err| ReproError::Persistence {
        path: out_dir.to_path_buf(),
        source: err,
    })?;

    let mut report = BatchReport::default();
    for (path, impl_id) in crash_logs(crashes_dir, mode.log_extension())? {
        process_log(&path, &impl_id, out_dir, tables, registry, config, mode, &mut report)?;
    }
    Ok(report)
}

/// Crash logs in the directory, sorted by name so runs are deterministic.
fn crash_logs(dir: &Path, extension: &str) -> Result<Vec<(PathBuf, String)>, ReproError> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(impl_id) = name.strip_suffix(extension) else {
            continue;
        };
        if impl_id.is_empty() {
            continue;
        }
        logs.push((path.clone(), impl_id.to_string()));
    }
    logs.sort();
    Ok(logs)
}

#[allow(clippy::too_many_arguments)]
fn process_log(
    path: &Path,
    impl_id: &str,
    out_dir: &Path,
    tables: &BindingTables,
    registry: &SignatureRegistry,
    config: &CampaignConfig,
    mode: OutputMode,
    report: &mut BatchReport,
) -> Result<(), ReproError> {
    let content = match fs::read(path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => {
                report.record(Outcome::OtherError, impl_id);
                return Ok(());
            }
        },
        Err(_) => {
            report.record(Outcome::OtherError, impl_id);
            return Ok(());
        }
    };

    if content.trim().is_empty() {
        report.record(Outcome::EmptyLog, impl_id);
        return Ok(());
    }
    let occurrences = crashlog::split_occurrences(&content);
    if occurrences.is_empty() {
        report.record(Outcome::EmptyLog, impl_id);
        return Ok(());
    }

    let resolution = match resolve_entry_points(impl_id, tables, registry) {
        Ok(resolution) => resolution,
        Err(err) => {
            report.total_occurrences += occurrences.len();
            let err = OccurrenceError::Bind(err);
            eprintln!("{impl_id}: {err}");
            report.record(err.outcome(), impl_id);
            return Ok(());
        }
    };
    let candidates: &[String] = match mode {
        // The validation workflow keys one driver per implementation
        // identifier, so only the first candidate is used.
        OutputMode::Validate => &resolution.candidates[..1],
        _ => &resolution.candidates,
    };

    for slice in occurrences {
        report.total_occurrences += 1;
        let occurrence = crashlog::parse_occurrence(slice);
        if occurrence.encodings.is_empty() {
            report.record(Outcome::EmptyLog, impl_id);
            continue;
        }
        for entry_point in candidates {
            match synthesize_occurrence(
                &occurrence,
                impl_id,
                entry_point,
                resolution.backward,
                out_dir,
                registry,
                config,
                mode,
            ) {
                Ok(artifact_name) => {
                    report.record(Outcome::Success, impl_id);
                    report.successful_entry_points.insert(artifact_name);
                }
                Err(OccurrenceError::Persist(err)) => return Err(err),
                Err(err) => {
                    eprintln!("{impl_id}: {err}");
                    report.record(err.outcome(), impl_id);
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn synthesize_occurrence(
    occurrence: &CrashOccurrence,
    impl_id: &str,
    entry_point: &str,
    backward: bool,
    out_dir: &Path,
    registry: &SignatureRegistry,
    config: &CampaignConfig,
    mode: OutputMode,
) -> Result<String, OccurrenceError> {
    let bound = bind(occurrence, impl_id, entry_point, backward, registry, config)
        .map_err(OccurrenceError::Bind)?;
    let ctx = EmitContext {
        config,
        backward: bound.backward,
        mkldnn: bound.mkldnn,
    };

    let values = occurrence
        .encodings
        .iter()
        .map(|encoding| decode(encoding))
        .collect::<Result<Vec<_>, _>>()
        .map_err(OccurrenceError::Decode)?;

    let (name, artifact, persist_mode) = match mode {
        OutputMode::Validate => {
            let records = values
                .iter()
                .map(|value| emit_validation_record(value, &ctx))
                .collect::<Result<Vec<_>, _>>()
                .map_err(OccurrenceError::Emit)?;
            (
                impl_id.to_string(),
                assemble_validation(&records),
                PersistMode::Validate,
            )
        }
        _ => {
            let statements = argument_statements(&bound, &values, &ctx)?;
            match mode {
                OutputMode::Json => (
                    bound.artifact_name.clone(),
                    assemble_json(&bound, &statements),
                    PersistMode::Json,
                ),
                OutputMode::Survey => (
                    bound.artifact_name.clone(),
                    assemble_program(&bound, &statements, &ctx),
                    PersistMode::Survey,
                ),
                _ => (
                    bound.artifact_name.clone(),
                    assemble_program(&bound, &statements, &ctx),
                    PersistMode::Program,
                ),
            }
        }
    };

    // The identifier header is written outside the hashed body, so the same
    // occurrence reached through differently named kernels stays one file.
    let header = match persist_mode {
        PersistMode::Program | PersistMode::Survey => Some(format!("# {impl_id}")),
        PersistMode::Json | PersistMode::Validate => None,
    };

    persist(out_dir, &name, header.as_deref(), &artifact, persist_mode)
        .map_err(OccurrenceError::Persist)?;
    Ok(if mode == OutputMode::Validate {
        impl_id.to_string()
    } else {
        bound.artifact_name
    })
}

fn argument_statements(
    bound: &BoundCall,
    values: &[crate::value::TypedValue],
    ctx: &EmitContext<'_>,
) -> Result<Vec<String>, OccurrenceError> {
    bound
        .var_names
        .iter()
        .zip(values)
        .map(|(var, value)| emit_statement(var, value, ctx))
        .collect::<Result<Vec<_>, _>>()
        .map_err(OccurrenceError::Emit)
}
