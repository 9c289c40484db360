use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use futures_util::future::join_all;
use octofhir_merge::{HttpRequest, MergeEngine, ReqwestTransport};
use tracing::debug;

use super::{RequestFile, RequestFormat};
use crate::cli::SendArgs;
use crate::config::AppConfig;
use crate::output::{print_body, print_failure, print_heading, print_success};

pub async fn run(cfg: &AppConfig, endpoint: &str, args: &SendArgs) -> Result<()> {
    let files = RequestFile::read_all(&args.files)?;
    let requests: Vec<HttpRequest> = files
        .iter()
        .map(|file| build_request(file, endpoint, !args.no_merge))
        .collect();

    let transport = ReqwestTransport::new(&cfg.transport).context("Failed to create HTTP client")?;
    let engine = MergeEngine::new(Arc::new(transport), cfg.merge.clone());
    debug!(requests = requests.len(), endpoint, "Sending requests");

    let started = Instant::now();
    let results = join_all(requests.into_iter().map(|request| engine.execute(request))).await;
    let elapsed = started.elapsed();

    let mut failed = 0;
    for (file, result) in files.iter().zip(results) {
        print_heading(&file.display_name());
        match result {
            Ok(response) if response.is_success() => {
                print_success(&response.status.to_string());
                print_body(&response.body);
            }
            Ok(response) => {
                failed += 1;
                print_failure(&response.status.to_string().red().to_string());
                print_body(&response.body);
            }
            Err(e) => {
                failed += 1;
                print_failure(&format!("{e} [{}]", e.error_code()));
            }
        }
    }

    println!(
        "{} {} request(s) in {:.1?}",
        "Done:".cyan(),
        files.len(),
        elapsed
    );
    if failed > 0 {
        bail!("{failed} of {} requests failed", files.len());
    }
    Ok(())
}

fn build_request(file: &RequestFile, endpoint: &str, allow_merging: bool) -> HttpRequest {
    let request = match file.format {
        RequestFormat::Graphql => HttpRequest::graphql(endpoint, &file.contents, None),
        RequestFormat::Json => HttpRequest::json(endpoint, file.contents.clone()),
    };
    request.with_merging(allow_merging)
}
