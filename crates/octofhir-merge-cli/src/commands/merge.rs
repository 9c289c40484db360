use anyhow::{Context, Result, bail};
use octofhir_merge::eligibility::{MergeCandidate, parse_request_body};
use octofhir_merge::merge::{merge_documents_named, merge_variables};
use octofhir_merge::{Document, Variables, parse};
use serde_json::Value;

use super::{RequestFile, RequestFormat};
use crate::cli::MergeArgs;
use crate::config::AppConfig;
use crate::output::{print_heading, print_json};

/// Result of merging request files offline.
#[derive(Debug)]
pub struct MergedRequest {
    pub document: Document,
    pub variables: Variables,
}

pub fn run(cfg: &AppConfig, args: &MergeArgs) -> Result<()> {
    let files = RequestFile::read_all(&args.files)?;
    let merged = merge_files(&files, &cfg.merge.operation_name)?;

    print_heading("Document");
    print!("{}", merged.document);
    println!();
    print_heading("Variables");
    print_json(&Value::Object(merged.variables));
    Ok(())
}

pub fn merge_files(files: &[RequestFile], operation_name: &str) -> Result<MergedRequest> {
    let candidates = files
        .iter()
        .map(load_candidate)
        .collect::<Result<Vec<_>>>()?;

    Ok(MergedRequest {
        document: merge_documents_named(candidates.iter().map(|c| &c.document), operation_name),
        variables: merge_variables(candidates.iter().map(|c| &c.variables)),
    })
}

fn load_candidate(file: &RequestFile) -> Result<MergeCandidate> {
    let candidate = match file.format {
        RequestFormat::Graphql => parse(&file.contents).map(|document| MergeCandidate {
            document,
            variables: Variables::new(),
        }),
        RequestFormat::Json => parse_request_body(file.contents.as_bytes()),
    }
    .with_context(|| format!("Failed to parse {}", file.display_name()))?;

    if !candidate.document.is_query() {
        bail!(
            "{}: {} operations are never merged",
            file.display_name(),
            candidate.document.operation_type
        );
    }
    Ok(candidate)
}
