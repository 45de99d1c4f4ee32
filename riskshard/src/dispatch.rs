// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{CLAP_STYLES, OutputContext, OutputOpts, OutputWriter, StdoutStyles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use riskshard_metadata::{CaseStatus, RiskshardExitCode, RunResult, ShardResultSummary};
use riskshard_runner::{
    config::RiskshardConfig,
    discovery::discover_with_config,
    errors::ShardSpecError,
    mapper::TestSourceMapper,
    partition::{ShardSpec, distribute},
    plural,
    prioritize::{PrioritizedTestPlan, RiskReport, SourceMapper, prioritize},
    shard_result::{
        combine_shard_results, read_plan, read_shard_result, write_plan, write_shard_result,
    },
};
use serde::Serialize;
use std::{collections::BTreeSet, io::Write};

/// Risk-ordered test sharding for CI.
///
/// Orders test files by the risk of the source files they exercise, splits them across shards so
/// that every shard gets a mix of high and low risk tests, and merges per-shard results back into
/// a single verdict.
#[derive(Debug, Parser)]
#[command(
    version,
    bin_name = "riskshard",
    styles = CLAP_STYLES,
    max_term_width = 100,
)]
pub struct RiskshardApp {
    #[clap(flatten)]
    common: CommonOpts,

    #[clap(subcommand)]
    command: Command,
}

impl RiskshardApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.common.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Map(opts) => {
                let base = BaseApp::new(output, &self.common)?;
                base.exec_map(opts, output_writer)
            }
            Command::Plan(opts) => {
                let base = BaseApp::new(output, &self.common)?;
                base.exec_plan(opts, output_writer)
            }
            Command::Shard(opts) => {
                let base = BaseApp::new(output, &self.common)?;
                base.exec_shard(opts, output_writer)
            }
            Command::Combine(opts) => exec_combine(output, opts, output_writer),
        }
    }
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// Project root [default: current directory]
    #[arg(long, global = true, value_name = "PATH", env = "RISKSHARD_PROJECT_ROOT")]
    project_root: Option<Utf8PathBuf>,

    /// Config file [default: project-root/.config/riskshard.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the source files each test file exercises
    ///
    /// Test files are mapped by naming convention (`test_foo.py` -> `foo.py`, `foo.spec.ts` ->
    /// `foo.ts`, `foo_test.go` -> `foo.go`) and by resolving their imports.
    Map(MapOpts),

    /// Order test files by risk
    ///
    /// Each test file is scored with the highest risk among the source files it exercises, as
    /// given by a risk report. Use --output-file to write a plan file for `riskshard shard`.
    Plan(PlanOpts),

    /// Print the test files assigned to one shard
    ///
    /// Files are dealt out round-robin in plan order, so each shard gets a mix of high and low
    /// risk tests.
    Shard(ShardOpts),

    /// Merge shard result files into a single result
    ///
    /// Exits with a non-zero code if any shard was unsuccessful, including a shard that crashed
    /// before reporting any test, or if any test failed or errored.
    Combine(CombineOpts),
}

#[derive(Debug, Args)]
struct MapOpts {
    /// Test files to map, relative to the project root [default: discover test files]
    #[arg(value_name = "TEST_FILES")]
    test_files: Vec<Utf8PathBuf>,

    #[clap(flatten)]
    message_format: MessageFormatOpts,
}

#[derive(Debug, Args)]
struct PlanOpts {
    #[clap(flatten)]
    scoring: ScoringOpts,

    /// Write the plan to this file instead of printing it
    #[arg(long, short = 'o', value_name = "PATH")]
    output_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    message_format: MessageFormatOpts,
}

#[derive(Debug, Args)]
struct ShardOpts {
    /// Zero-based index of this shard
    #[arg(long, value_name = "INDEX", required_unless_present = "shard")]
    shard_index: Option<usize>,

    /// Total number of shards
    #[arg(long, value_name = "COUNT", required_unless_present = "shard")]
    shard_count: Option<usize>,

    /// Shard to select, as zero-based index and count (e.g. 0/4)
    #[arg(
        long,
        value_name = "I/N",
        conflicts_with_all = ["shard_index", "shard_count"],
    )]
    shard: Option<String>,

    /// Read the plan from this file, as written by `riskshard plan --output-file`
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = ["risk_report", "no_mapper", "test_files"],
    )]
    plan: Option<Utf8PathBuf>,

    #[clap(flatten)]
    scoring: ScoringOpts,

    #[clap(flatten)]
    message_format: MessageFormatOpts,
}

impl ShardOpts {
    fn shard_spec(&self) -> Result<ShardSpec, ShardSpecError> {
        match (&self.shard, self.shard_index, self.shard_count) {
            (Some(shard), _, _) => shard.parse(),
            // clap requires both --shard-index and --shard-count unless --shard is passed.
            (None, index, count) => ShardSpec::new(index.unwrap_or(0), count.unwrap_or(0)),
        }
    }
}

#[derive(Clone, Debug, Args)]
#[command(next_help_heading = "SCORING OPTIONS")]
struct ScoringOpts {
    /// JSON file mapping source file paths to risk scores in [0, 1]
    #[arg(long, value_name = "PATH")]
    risk_report: Option<Utf8PathBuf>,

    /// Don't map test files to source files; every test gets the default score
    #[arg(long)]
    no_mapper: bool,

    /// Test files to plan, relative to the project root [default: discover test files]
    #[arg(value_name = "TEST_FILES")]
    test_files: Vec<Utf8PathBuf>,
}

#[derive(Debug, Args)]
struct CombineOpts {
    /// Shard result files to combine
    #[arg(value_name = "SHARD_FILES", required = true)]
    shard_files: Vec<Utf8PathBuf>,

    /// Also write the combined result to this file, in shard result format
    #[arg(long, short = 'o', value_name = "PATH")]
    output_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    message_format: MessageFormatOpts,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "OUTPUT OPTIONS")]
struct MessageFormatOpts {
    /// Output format
    #[arg(
        long,
        short = 'T',
        value_enum,
        default_value_t,
        value_name = "FMT"
    )]
    message_format: MessageFormat,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum MessageFormat {
    /// Human-readable output
    #[default]
    Human,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl MessageFormat {
    /// Writes `value` as JSON, or returns false if the format is human-readable.
    fn write_json(self, value: &impl Serialize, writer: &mut impl Write) -> Result<bool> {
        let res = match self {
            Self::Human => return Ok(false),
            Self::Json => serde_json::to_writer(&mut *writer, value),
            Self::JsonPretty => serde_json::to_writer_pretty(&mut *writer, value),
        };
        res.map_err(ExpectedError::serialize_error)?;
        writeln!(writer).map_err(ExpectedError::stdout_write_error)?;
        Ok(true)
    }
}

/// State shared by commands that operate on a project.
struct BaseApp {
    output: OutputContext,
    config: RiskshardConfig,
}

impl BaseApp {
    fn new(output: OutputContext, common: &CommonOpts) -> Result<Self> {
        let project_root = match &common.project_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => current_dir()?.join(root),
            None => current_dir()?,
        };
        let config = RiskshardConfig::from_sources(project_root, common.config_file.as_deref())?;
        Ok(Self { output, config })
    }

    fn project_root(&self) -> &Utf8Path {
        self.config.project_root()
    }

    /// Returns the given test files, or discovers them if none were given.
    fn test_files(&self, given: Vec<Utf8PathBuf>) -> Result<Vec<Utf8PathBuf>> {
        let test_files = if given.is_empty() {
            discover_with_config(self.project_root(), self.config.discovery())?
        } else {
            given
        };

        if test_files.is_empty() {
            return Err(ExpectedError::NoTestFiles {
                project_root: self.project_root().to_owned(),
            });
        }
        Ok(test_files)
    }

    fn mapper(&self) -> TestSourceMapper {
        TestSourceMapper::new(self.project_root(), self.config.mapper())
    }

    fn build_plan(&self, scoring: ScoringOpts) -> Result<PrioritizedTestPlan> {
        let ScoringOpts {
            risk_report,
            no_mapper,
            test_files,
        } = scoring;

        let test_files = self.test_files(test_files)?;
        let risk_report = risk_report
            .map(RiskReport::from_json_file)
            .transpose()?;
        let mapper = (!no_mapper).then(|| self.mapper());

        Ok(prioritize(
            &test_files,
            risk_report.as_ref(),
            mapper.as_ref().map(|mapper| mapper as &dyn SourceMapper),
        ))
    }

    fn exec_map(&self, opts: MapOpts, output_writer: &mut OutputWriter) -> Result<i32> {
        let test_files = self.test_files(opts.test_files)?;
        let mappings = self.mapper().map_all(&test_files);

        let mut writer = output_writer.stdout_writer();
        let summaries: Vec<_> = mappings.iter().map(|mapping| mapping.to_summary()).collect();
        if !opts.message_format.message_format.write_json(&summaries, &mut writer)? {
            let styles = self.output.stdout_styles();
            for mapping in &summaries {
                write!(
                    writer,
                    "{} [{}",
                    mapping.test_file.style(styles.bold),
                    mapping.confidence,
                )
                .map_err(ExpectedError::stdout_write_error)?;
                if self.output.verbose {
                    write!(writer, " {:.2}", mapping.confidence_score)
                        .map_err(ExpectedError::stdout_write_error)?;
                }
                writeln!(writer, "]").map_err(ExpectedError::stdout_write_error)?;
                for source_file in &mapping.source_files {
                    writeln!(writer, "    {}", source_file.style(styles.path))
                        .map_err(ExpectedError::stdout_write_error)?;
                }
            }
        }
        writer.flush().map_err(ExpectedError::stdout_write_error)?;

        Ok(RiskshardExitCode::OK)
    }

    fn exec_plan(&self, opts: PlanOpts, output_writer: &mut OutputWriter) -> Result<i32> {
        let plan = self.build_plan(opts.scoring)?;

        if let Some(output_file) = &opts.output_file {
            write_plan(output_file, &plan)?;
            tracing::info!(
                "wrote plan for {} {} to `{output_file}`",
                plan.len(),
                plural::test_files_str(plan.len()),
            );
            return Ok(RiskshardExitCode::OK);
        }

        let mut writer = output_writer.stdout_writer();
        if !opts
            .message_format
            .message_format
            .write_json(&plan.to_summary(), &mut writer)?
        {
            write_plan_human(&plan, &self.output, &mut writer)
                .map_err(ExpectedError::stdout_write_error)?;
        }
        writer.flush().map_err(ExpectedError::stdout_write_error)?;

        Ok(RiskshardExitCode::OK)
    }

    fn exec_shard(&self, opts: ShardOpts, output_writer: &mut OutputWriter) -> Result<i32> {
        let plan = match &opts.plan {
            Some(path) => read_plan(path)?,
            None => self.build_plan(opts.scoring.clone())?,
        };
        let spec = opts.shard_spec()?;
        let test_files = distribute(&plan, spec.index(), spec.count())?;
        if test_files.is_empty() {
            tracing::info!(
                "shard {spec} has no test files ({} {} across {} {})",
                plan.len(),
                plural::test_files_str(plan.len()),
                spec.count(),
                plural::shards_str(spec.count()),
            );
        }

        let mut writer = output_writer.stdout_writer();
        if !opts
            .message_format
            .message_format
            .write_json(&test_files, &mut writer)?
        {
            for test_file in &test_files {
                writeln!(writer, "{test_file}").map_err(ExpectedError::stdout_write_error)?;
            }
        }
        writer.flush().map_err(ExpectedError::stdout_write_error)?;

        Ok(RiskshardExitCode::OK)
    }
}

fn exec_combine(
    output: OutputContext,
    opts: CombineOpts,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let summaries = opts
        .shard_files
        .iter()
        .map(read_shard_result)
        .collect::<Result<Vec<_>, _>>()?;
    let shard_count = summaries.len();
    let adapter_name = combined_adapter_name(&summaries);
    let result = combine_shard_results(summaries);

    if let Some(output_file) = &opts.output_file {
        let combined = ShardResultSummary {
            shard_index: 0,
            shard_count,
            adapter_name,
            result: result.clone(),
        };
        write_shard_result(output_file, &combined)?;
        tracing::info!("wrote combined result to `{output_file}`");
    }

    let mut writer = output_writer.stdout_writer();
    if !opts
        .message_format
        .message_format
        .write_json(&result, &mut writer)?
    {
        write_result_human(&result, shard_count, &output, &mut writer)
            .map_err(ExpectedError::stdout_write_error)?;
    }
    writer.flush().map_err(ExpectedError::stdout_write_error)?;

    if result.success {
        Ok(RiskshardExitCode::OK)
    } else {
        Ok(RiskshardExitCode::TEST_RUN_FAILED)
    }
}

/// The adapter name recorded in a combined result: the shards' adapter if they agree, otherwise
/// their sorted names joined with `+`.
fn combined_adapter_name(summaries: &[ShardResultSummary]) -> String {
    let names: BTreeSet<&str> = summaries
        .iter()
        .map(|summary| summary.adapter_name.as_str())
        .collect();
    names.into_iter().collect::<Vec<_>>().join("+")
}

fn write_plan_human(
    plan: &PrioritizedTestPlan,
    output: &OutputContext,
    writer: &mut impl Write,
) -> std::io::Result<()> {
    let styles = output.stdout_styles();
    for risk_score in plan.risk_scores() {
        writeln!(
            writer,
            "{} {}",
            format!("{:.2}", risk_score.score).style(styles.score),
            risk_score.file_path.style(styles.bold),
        )?;
        if output.verbose {
            for reason in &risk_score.reasons {
                writeln!(writer, "     {reason}")?;
            }
        }
    }
    Ok(())
}

fn write_result_human(
    result: &RunResult,
    shard_count: usize,
    output: &OutputContext,
    writer: &mut impl Write,
) -> std::io::Result<()> {
    let styles = output.stdout_styles();
    write_failures(result, &styles, writer)?;

    let verdict = if result.success {
        "PASSED".style(styles.pass)
    } else {
        "FAILED".style(styles.fail)
    };
    writeln!(
        writer,
        "{verdict}: {} {} from {shard_count} {}: {} passed, {} failed, {} skipped, {} errors \
         ({:.0}ms)",
        result.total(),
        plural::tests_str(result.total()),
        plural::shards_str(shard_count),
        result.passed.style(styles.pass),
        result.failed.style(styles.fail),
        result.skipped.style(styles.skip),
        result.errors.style(styles.fail),
        result.duration_ms,
    )?;

    if let Some(coverage) = &result.coverage {
        writeln!(
            writer,
            "coverage: {:.1}% lines, {:.1}% functions, {:.1}% branches across {} files",
            coverage.overall_line_coverage(),
            coverage.overall_function_coverage(),
            coverage.overall_branch_coverage(),
            coverage.files.len(),
        )?;
    }
    Ok(())
}

fn write_failures(
    result: &RunResult,
    styles: &StdoutStyles,
    writer: &mut impl Write,
) -> std::io::Result<()> {
    for case in &result.test_cases {
        if !matches!(case.status, CaseStatus::Failed | CaseStatus::Error) {
            continue;
        }
        write!(
            writer,
            "{} {}",
            case.status.as_str().to_uppercase().style(styles.fail),
            case.name.style(styles.bold),
        )?;
        if let Some(file_path) = &case.file_path {
            write!(writer, " ({})", file_path.style(styles.path))?;
        }
        writeln!(writer)?;
        for line in case.failure_message.lines() {
            writeln!(writer, "    {line}")?;
        }
    }
    Ok(())
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    Utf8PathBuf::from_path_buf(dir).map_err(|path| ExpectedError::CurrentDirInvalidUtf8 { path })
}
