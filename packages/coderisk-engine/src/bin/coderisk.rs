//! Repository risk CLI: ingest staged history into the graph, assess
//! proposed changes against it.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use coderisk_engine::config::EngineConfig;
use coderisk_engine::features::graph::{CypherHttpStore, GraphStore};
use coderisk_engine::features::identity::infrastructure::GitExecutor;
use coderisk_engine::features::identity::FileIdentityResolver;
use coderisk_engine::features::llm::{LlmProvider, OpenAiCompatProvider};
use coderisk_engine::features::risk::{CheckOptions, CheckReport, RiskEngine};
use coderisk_engine::pipeline::{IngestPipeline, PipelineConfig};
use coderisk_storage::{PostgresStagingStore, StagingStore};

#[derive(Parser)]
#[command(name = "coderisk", about = "Repository change-risk assessment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the property graph from staged rows and link issues to PRs.
    Ingest {
        #[arg(long)]
        repo_id: i64,
        /// Run the per-commit LLM enrichment after the build.
        #[arg(long)]
        atomize: bool,
        /// Cross-check graph counts against staging after the build.
        #[arg(long)]
        verify: bool,
        /// Override the worker-pool size.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Assess the risk of changed files.
    Check {
        /// Files to assess; defaults to the working tree's changed files.
        files: Vec<String>,
        #[arg(long)]
        repo_id: i64,
        /// Exit 1 when any file lands HIGH or CRITICAL.
        #[arg(long)]
        pre_commit: bool,
        /// Phase-1 metrics only, no investigation.
        #[arg(long)]
        no_ai: bool,
        /// Machine-readable JSON output.
        #[arg(long)]
        ai_mode: bool,
        /// Include metric evidence and the investigation trace.
        #[arg(long)]
        explain: bool,
        /// One line per file.
        #[arg(long)]
        quiet: bool,
    },

    /// Staging and graph row counts plus link quality.
    Status {
        #[arg(long)]
        repo_id: i64,
    },

    /// Delete every staging row and graph node of a repository.
    Teardown {
        #[arg(long)]
        repo_id: i64,
        /// Required; teardown refuses to run without it.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("configuration")?;

    let staging: Arc<dyn StagingStore> = Arc::new(
        PostgresStagingStore::connect(&config.postgres.url)
            .await
            .context("staging store connection")?,
    );
    staging.ensure_schema().await.context("staging schema")?;

    let graph: Arc<dyn GraphStore> = Arc::new(CypherHttpStore::new(
        &config.graph.uri,
        &config.graph.user,
        &config.graph.password,
        &config.graph.database,
        config.graph.flavor,
    ));

    let llm: Option<Arc<dyn LlmProvider>> = config
        .llm
        .as_ref()
        .map(|llm| Arc::new(OpenAiCompatProvider::new(llm)) as Arc<dyn LlmProvider>);

    match cli.command {
        Command::Ingest {
            repo_id,
            atomize,
            verify,
            workers,
        } => {
            let mut pipeline_config = PipelineConfig::default();
            if let Some(workers) = workers {
                pipeline_config = pipeline_config.with_workers(workers);
            }

            let pipeline = IngestPipeline::new(
                staging,
                graph,
                llm,
                pipeline_config,
                config.timeouts,
                config.noreply_host.clone(),
            );
            let report = pipeline.run(repo_id, atomize, verify).await?;

            println!(
                "ingested repo {}: {} nodes, {} edges, {} commits, {} links ({} fixed_by)",
                repo_id,
                report.build.stats.nodes,
                report.build.stats.edges,
                report.build.commits_processed,
                report.links.fixed_by + report.links.associated_with,
                report.links.fixed_by,
            );
            if let Some(atomized) = report.atomize {
                println!(
                    "atomized {} commits ({} blocks)",
                    atomized.commits_processed, atomized.blocks_written
                );
            }
            for issue in &report.verify_issues {
                println!("verify: {}", issue);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Check {
            files,
            repo_id,
            pre_commit,
            no_ai,
            ai_mode,
            explain,
            quiet,
        } => {
            let repo = staging
                .get_repository(repo_id)
                .await?
                .with_context(|| format!("repository {} is not registered", repo_id))?;

            let git = GitExecutor::new(&repo.absolute_path).ok();
            let files = if files.is_empty() {
                changed_files(git.as_ref()).await?
            } else {
                files
            };
            if files.is_empty() {
                info!("no changed files to assess");
                return Ok(ExitCode::SUCCESS);
            }

            let resolver = FileIdentityResolver::new(staging.clone(), repo_id, git);
            let engine = RiskEngine::new(graph, llm, config.timeouts);
            let report = engine
                .check(
                    &repo,
                    &resolver,
                    &files,
                    CheckOptions { no_ai, pre_commit },
                )
                .await?;

            render_check(&report, ai_mode, explain, quiet)?;
            Ok(ExitCode::from(report.exit_code(pre_commit) as u8))
        }

        Command::Status { repo_id } => {
            let stats = staging.staging_stats(repo_id).await?;
            println!(
                "staging: {} commits ({} processed), {} PRs, {} issues, {} events",
                stats.commits, stats.commits_processed, stats.prs, stats.issues,
                stats.timeline_events,
            );
            println!(
                "derived: {} identities, {} candidate refs, {} validated links",
                stats.file_identities, stats.issue_commit_refs, stats.validated_links,
            );

            let counts = graph
                .read(coderisk_engine::features::graph::ReadQuery::CountsByLabel { repo_id })
                .await?;
            for row in counts {
                let label = row.get("label").and_then(|v| v.as_str()).unwrap_or("?");
                let count = row.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
                if count > 0 {
                    println!("graph: {} {}", count, label);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Teardown { repo_id, yes } => {
            anyhow::ensure!(yes, "refusing to tear down repo {} without --yes", repo_id);

            graph.delete_repo(repo_id).await?;
            staging.delete_repository_data(repo_id).await?;
            println!("removed repo {} from staging and graph", repo_id);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Changed files in the working tree relative to HEAD.
async fn changed_files(git: Option<&GitExecutor>) -> anyhow::Result<Vec<String>> {
    let Some(git) = git else {
        return Ok(Vec::new());
    };
    let output = git
        .run(&["diff", "--name-only", "HEAD"])
        .await
        .context("listing changed files")?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

fn render_check(report: &CheckReport, ai_mode: bool, explain: bool, quiet: bool) -> anyhow::Result<()> {
    if ai_mode {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for file in &report.files {
        println!(
            "{}  {}  (confidence {:.2})",
            file.assessment.risk_level.as_str(),
            file.resolution.canonical_path,
            file.assessment.confidence,
        );
        if quiet {
            continue;
        }

        if explain {
            for line in file.tier1.evidence() {
                println!("  - {}", line);
            }
            println!("  - reasoning: {}", file.assessment.reasoning);
            if let Some(trace) = &file.trace {
                for hop in &trace.hops {
                    println!("  - tool {} {} -> {}", hop.tool, hop.args, hop.result);
                }
            }
        }
    }

    if let Some(worst) = report.worst_level() {
        println!("overall: {}", worst.as_str());
    }
    Ok(())
}
