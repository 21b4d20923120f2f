use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;

use pbilens_core::error::PbilensError;
use pbilens_core::extract::SubprocessBackend;
use pbilens_core::pipeline::{AnalysisPipeline, AnalyzeOutcome, BatchReport, FileOutcome};
use pbilens_core::progress::{IndicatifReporter, NoopReporter, ProgressReporter};

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// .pbix files or glob patterns (e.g. "reports/**/*.pbix")
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Project name (default: file stem); only valid with a single file
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Serialize)]
struct FileRow<'a> {
    file: String,
    project: &'a str,
    status: &'static str,
    id: Option<i64>,
    error: Option<String>,
}

impl<'a> From<&'a FileOutcome> for FileRow<'a> {
    fn from(outcome: &'a FileOutcome) -> Self {
        let (status, id, error) = match &outcome.result {
            Ok(AnalyzeOutcome::Stored(id)) => ("stored", Some(id.0), None),
            Ok(AnalyzeOutcome::Unchanged(id)) => ("unchanged", Some(id.0), None),
            Err(e) => ("failed", None, Some(e.to_string())),
        };
        Self {
            file: outcome.path.display().to_string(),
            project: &outcome.project,
            status,
            id,
            error,
        }
    }
}

/// Expand literal paths and glob patterns into a de-duplicated file list.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.contains(['*', '?', '[']) {
            let matches = glob::glob(input).with_context(|| format!("Invalid pattern: {input}"))?;
            let before = files.len();
            for entry in matches {
                let path = entry.with_context(|| format!("Cannot read match for {input}"))?;
                if path.is_file() {
                    files.push(path);
                }
            }
            if files.len() == before {
                tracing::warn!(pattern = %input, "Pattern matched no files");
            }
        } else {
            files.push(PathBuf::from(input));
        }
    }
    let mut seen = std::collections::HashSet::new();
    files.retain(|f| seen.insert(f.clone()));
    Ok(files)
}

pub async fn run(args: AnalyzeArgs, ctx: &Context) -> anyhow::Result<()> {
    let files = expand_inputs(&args.paths)?;
    if files.is_empty() {
        anyhow::bail!("No files matched {}", args.paths.join(" "));
    }
    if args.name.is_some() && files.len() > 1 {
        anyhow::bail!("--name needs exactly one input file, got {}", files.len());
    }

    let backend = SubprocessBackend::new(ctx.config.extractor.clone());
    let pipeline = AnalysisPipeline::new(&backend, &ctx.store);

    let report = if let Some(name) = args.name.as_deref() {
        let path = files[0].clone();
        let result = pipeline.analyze_file(&path, Some(name)).await;
        BatchReport {
            files: vec![FileOutcome {
                path,
                project: name.to_string(),
                result,
            }],
            ..BatchReport::default()
        }
    } else {
        let bar;
        let reporter: &dyn ProgressReporter = if ctx.quiet() || ctx.json() || files.len() == 1 {
            &NoopReporter
        } else {
            bar = IndicatifReporter::new();
            &bar
        };
        pipeline.analyze_batch(&files, reporter).await
    };

    if ctx.json() {
        let rows: Vec<FileRow<'_>> = report.files.iter().map(FileRow::from).collect();
        print_json(&rows)?;
    } else if !ctx.quiet() {
        print_text(&report, ctx.opts.verbose > 0);
    }

    summarize(report)
}

fn print_text(report: &BatchReport, verbose: bool) {
    for outcome in &report.files {
        match &outcome.result {
            Ok(AnalyzeOutcome::Stored(id)) => println!("  stored     {} (#{id})", outcome.project),
            Ok(AnalyzeOutcome::Unchanged(id)) => {
                println!("  unchanged  {} (#{id})", outcome.project);
            }
            Err(e) => {
                println!("  failed     {}: {e}", outcome.project);
                if verbose {
                    if let PbilensError::Extract(inner) = e {
                        if let Some(diag) = inner.diagnostics() {
                            for line in diag.lines() {
                                println!("             {line}");
                            }
                        }
                    }
                }
            }
        }
    }
    if report.files.len() > 1 {
        println!();
        println!(
            "  {} stored, {} unchanged, {} failed in {:.2?}",
            report.stored(),
            report.unchanged(),
            report.failed(),
            report.duration
        );
    }
}

/// Turn failures into the command's error: a single failure propagates as-is,
/// a mixed batch is a partial success. When every file failed the same way,
/// the first error is kept in the chain so the exit code reflects it.
fn summarize(report: BatchReport) -> anyhow::Result<()> {
    let total = report.files.len();
    let mut failures: Vec<(PathBuf, PbilensError)> = report
        .files
        .into_iter()
        .filter_map(|f| f.result.err().map(|e| (f.path, e)))
        .collect();
    let failed = failures.len();
    if failed == 0 {
        return Ok(());
    }
    if failed < total {
        anyhow::bail!(
            "{}: {failed} of {total} files failed to analyze",
            crate::PARTIAL_SUCCESS
        );
    }
    if total == 1 {
        if let Some((path, e)) = failures.pop() {
            return Err(anyhow::Error::new(e)
                .context(format!("Cannot analyze {}", path.display())));
        }
    }

    let same_kind = failures
        .windows(2)
        .all(|w| std::mem::discriminant(&w[0].1) == std::mem::discriminant(&w[1].1));
    match failures.into_iter().next() {
        Some((_, first)) if same_kind => Err(anyhow::Error::new(first)
            .context(format!("All {total} files failed to analyze"))),
        _ => anyhow::bail!("All {total} files failed to analyze"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pbilens_core::error::{ExtractError, HashError};

    use super::*;

    fn failed(path: &str, err: impl Into<PbilensError>) -> FileOutcome {
        FileOutcome {
            path: PathBuf::from(path),
            project: path.trim_end_matches(".pbix").to_string(),
            result: Err(err.into()),
        }
    }

    fn timeout(path: &str) -> ExtractError {
        ExtractError::Timeout {
            path: PathBuf::from(path),
            timeout: Duration::from_secs(30),
        }
    }

    fn batch(files: Vec<FileOutcome>) -> BatchReport {
        BatchReport {
            files,
            ..BatchReport::default()
        }
    }

    #[test]
    fn all_extraction_failures_exit_as_extraction_error() {
        let err = summarize(batch(vec![
            failed("A.pbix", timeout("A.pbix")),
            failed("B.pbix", timeout("B.pbix")),
        ]))
        .unwrap_err();
        assert!(err.to_string().starts_with("All 2 files failed"));
        assert_eq!(crate::classify_exit_code(&err), 5);
    }

    #[test]
    fn mixed_failure_kinds_exit_as_general_error() {
        let unreadable = HashError::Io {
            path: PathBuf::from("B.pbix"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let err = summarize(batch(vec![
            failed("A.pbix", timeout("A.pbix")),
            failed("B.pbix", unreadable),
        ]))
        .unwrap_err();
        assert_eq!(err.to_string(), "All 2 files failed to analyze");
        assert_eq!(crate::classify_exit_code(&err), 1);
    }

    #[test]
    fn one_failure_among_successes_is_partial() {
        let ok = FileOutcome {
            path: PathBuf::from("A.pbix"),
            project: "A".into(),
            result: Ok(AnalyzeOutcome::Stored(pbilens_core::types::ProjectId(1))),
        };
        let err = summarize(batch(vec![ok, failed("B.pbix", timeout("B.pbix"))])).unwrap_err();
        assert_eq!(crate::classify_exit_code(&err), 10);
    }

    #[test]
    fn literal_paths_pass_through_and_deduplicate() {
        let files = expand_inputs(&["a.pbix".into(), "b.pbix".into(), "a.pbix".into()]).unwrap();
        assert_eq!(files, [PathBuf::from("a.pbix"), PathBuf::from("b.pbix")]);
    }

    #[test]
    fn globs_expand_to_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["one.pbix", "two.pbix", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let pattern = format!("{}/*.pbix", dir.path().display());
        let mut files = expand_inputs(&[pattern]).unwrap();
        files.sort();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() == "pbix"));
    }
}
