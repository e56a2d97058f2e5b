use std::path::PathBuf;
use std::process::ExitCode;

use reprosyn::{
    run_batch, BindingTables, CampaignConfig, OutputMode, ReproError, SignatureRegistry,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ReproError> {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "synth" => cmd_synth(&rest),
        other => Err(ReproError::Usage(format!(
            "unknown command '{other}'; see `reprosyn --help`"
        ))),
    }
}

struct SynthArgs {
    crashes: PathBuf,
    out: PathBuf,
    bindings: PathBuf,
    signatures: PathBuf,
    dispatch: Option<PathBuf>,
    derivatives: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
    gpu: bool,
    validate: bool,
    types: bool,
    report_json: bool,
}

fn cmd_synth(rest: &[String]) -> Result<(), ReproError> {
    let args = parse_synth_args(rest)?;

    let mut config = match &args.config {
        Some(path) => CampaignConfig::load(path)?,
        None => CampaignConfig::default(),
    };
    if args.gpu {
        config.accelerated = true;
    }

    let tables = BindingTables::load(
        &args.bindings,
        args.dispatch.as_deref(),
        args.derivatives.as_deref(),
    )?;
    let registry = SignatureRegistry::load(&args.signatures)?;

    let mode = if args.validate {
        OutputMode::Validate
    } else if args.types {
        OutputMode::Survey
    } else if args.json {
        OutputMode::Json
    } else {
        OutputMode::Standard
    };

    let report = run_batch(&args.crashes, &args.out, &tables, &registry, &config, mode)?;
    let summary = report.summary();
    if args.report_json {
        let rendered = serde_json::to_string_pretty(&summary)
            .map_err(|err| ReproError::Io(std::io::Error::other(err)))?;
        println!("{rendered}");
    } else {
        println!("{}", summary.render_text());
    }
    Ok(())
}

fn parse_synth_args(rest: &[String]) -> Result<SynthArgs, ReproError> {
    let mut crashes = None;
    let mut out = None;
    let mut bindings = None;
    let mut signatures = None;
    let mut dispatch = None;
    let mut derivatives = None;
    let mut config = None;
    let mut json = false;
    let mut gpu = false;
    let mut validate = false;
    let mut types = false;
    let mut report_json = false;

    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--crashes" => crashes = Some(expect_value(&mut iter, "--crashes")?),
            "--out" => out = Some(expect_value(&mut iter, "--out")?),
            "--bindings" => bindings = Some(expect_value(&mut iter, "--bindings")?),
            "--signatures" => signatures = Some(expect_value(&mut iter, "--signatures")?),
            "--dispatch" => dispatch = Some(expect_value(&mut iter, "--dispatch")?),
            "--derivatives" => derivatives = Some(expect_value(&mut iter, "--derivatives")?),
            "--config" => config = Some(expect_value(&mut iter, "--config")?),
            "--json" => json = true,
            "--gpu" => gpu = true,
            "--validate" => validate = true,
            "--types" => types = true,
            "--report-json" => report_json = true,
            other => {
                return Err(ReproError::Usage(format!(
                    "unknown flag '{other}' for `reprosyn synth`"
                )))
            }
        }
    }

    if validate && types {
        return Err(ReproError::Usage(
            "--validate and --types are mutually exclusive".to_string(),
        ));
    }

    Ok(SynthArgs {
        crashes: required(crashes, "--crashes")?,
        out: required(out, "--out")?,
        bindings: required(bindings, "--bindings")?,
        signatures: required(signatures, "--signatures")?,
        dispatch,
        derivatives,
        config,
        json,
        gpu,
        validate,
        types,
        report_json,
    })
}

fn expect_value(
    iter: &mut std::slice::Iter<'_, String>,
    flag: &str,
) -> Result<PathBuf, ReproError> {
    iter.next()
        .map(PathBuf::from)
        .ok_or_else(|| ReproError::Usage(format!("{flag} requires a value")))
}

fn required(value: Option<PathBuf>, flag: &str) -> Result<PathBuf, ReproError> {
    value.ok_or_else(|| ReproError::Usage(format!("{flag} is required")))
}

fn print_help() {
    println!(
        "reprosyn - synthesize crash reproduction programs\n\
         \n\
         Usage:\n\
         \x20 reprosyn synth --crashes <dir> --out <dir> --bindings <file> --signatures <file>\n\
         \x20          [--dispatch <file>] [--derivatives <file>] [--config <file>]\n\
         \x20          [--json] [--gpu] [--validate] [--types] [--report-json]\n\
         \n\
         Flags:\n\
         \x20 --crashes      directory of crash logs (one per implementation identifier)\n\
         \x20 --out          destination directory for synthesized artifacts\n\
         \x20 --bindings     implementation identifier -> entry point map\n\
         \x20 --signatures   public signature registry (JSON)\n\
         \x20 --dispatch     specialized -> canonical identifier map\n\
         \x20 --derivatives  backward identifier -> forward entry point map\n\
         \x20 --config       campaign configuration (reprosyn.toml)\n\
         \x20 --json         emit JSON artifacts instead of programs\n\
         \x20 --gpu          target the accelerated execution path\n\
         \x20 --validate     emit per-identifier validation artifacts\n\
         \x20 --types        synthesize from type-survey logs\n\
         \x20 --report-json  print the final report as JSON"
    );
}
