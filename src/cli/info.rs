use anyhow::Result;
use serde::Serialize;

use pagewatch_cli::metrics::{self, PageWatchMetrics};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Serialize)]
struct BuildInfo {
    version: &'static str,
    build_date: &'static str,
    git_hash: &'static str,
    config: String,
    metrics: PageWatchMetrics,
}

pub fn cmd_info(ctx: &CliContext) -> Result<()> {
    let info = BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_hash: env!("GIT_HASH"),
        config: ctx.config_path().display().to_string(),
        metrics: metrics::snapshot(),
    };
    match ctx.output() {
        OutputFormat::Human => {
            println!("PageWatch v{}", info.version);
            println!("  build:  {}", info.build_date);
            println!("  commit: {}", info.git_hash);
            println!("  config: {}", info.config);
            Ok(())
        }
        format => emit(&info, format),
    }
}
