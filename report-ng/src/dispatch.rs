// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    display,
    errors::{ExpectedError, ReportNgExitCode, Result},
    output::{OutputContext, OutputOpts, OutputWriter, ReportStyles, clap_styles},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use report_stats::{
    config::ReportConfig,
    generator::{StatisticsGenerator, StatisticsGeneratorBuilder},
    source::ReportDirectory,
};
use tracing::{debug, warn};

/// Inspect statistics derived from a recorded test execution run.
#[derive(Debug, Parser)]
#[command(version, about, styles = clap_styles::style())]
pub struct ReportNgApp {
    /// Config file [default: built-in defaults]
    #[arg(long, global = true, value_name = "PATH", env = "REPORT_NG_CONFIG_FILE")]
    config_file: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl ReportNgApp {
    /// Initializes logging and colors.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the exit code.
    pub fn exec(self, output: OutputContext, writer: &mut OutputWriter) -> Result<i32> {
        let config = ReportConfig::from_sources(self.config_file.as_deref())?;
        debug!(
            "using cache TTL {:?}, fetch concurrency {}",
            config.cache_config().ttl(),
            config.fetch_concurrency()
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| ExpectedError::RuntimeCreateError { err })?;
        runtime.block_on(self.command.exec(&config, output, writer))
    }
}

#[derive(Debug, Args)]
struct ReportDirOpts {
    /// Path to the report directory
    #[arg(value_name = "REPORT_DIR")]
    report_dir: Utf8PathBuf,
}

impl ReportDirOpts {
    fn generator(&self, config: &ReportConfig) -> StatisticsGenerator<ReportDirectory> {
        StatisticsGeneratorBuilder::from_config(config)
            .build(ReportDirectory::new(self.report_dir.clone()))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print run-wide statistics, per-class statistics and the most common failure aspects
    Summary {
        #[command(flatten)]
        report: ReportDirOpts,

        /// Number of failure aspects to list
        #[arg(long, value_name = "N", default_value_t = 5)]
        aspects: usize,
    },

    /// Print the details of one method
    Method {
        #[command(flatten)]
        report: ReportDirOpts,

        /// Identifier of the method
        method_id: String,

        /// Also decode the custom context with this name as a layout comparison
        #[arg(long, value_name = "NAME")]
        layout_context: Option<String>,
    },

    /// Resolve files by identifier and print their corrected paths
    Files {
        #[command(flatten)]
        report: ReportDirOpts,

        /// Identifiers of the files, printed in this order
        #[arg(required = true)]
        file_ids: Vec<String>,
    },

    /// Print the screenshots recorded by a method, in recorded order
    Screenshots {
        #[command(flatten)]
        report: ReportDirOpts,

        /// Identifier of the method
        method_id: String,
    },
}

impl Command {
    async fn exec(
        self,
        config: &ReportConfig,
        output: OutputContext,
        writer: &mut OutputWriter,
    ) -> Result<i32> {
        let styles = output.stdout_styles();
        let text = match self {
            Command::Summary { report, aspects } => {
                let generator = report.generator(config);
                let statistics = generator.get_execution_statistics().await?;
                display::summary(&statistics, aspects, output.verbose, &styles)
            }
            Command::Method {
                report,
                method_id,
                layout_context,
            } => {
                let generator = report.generator(config);
                let details = generator
                    .get_method_details(&method_id)
                    .await?
                    .ok_or(ExpectedError::MethodNotFound { method_id })?;

                let mut text = display::method_details(&details, &styles);
                if let Some(name) = layout_context {
                    match details.layout_comparison(&name) {
                        Some(context) => {
                            text.push_str(&display::layout_comparison(&name, &context));
                        }
                        None => warn!("method has no layout comparison named `{name}`"),
                    }
                }
                text
            }
            Command::Files { report, file_ids } => {
                let generator = report.generator(config);
                resolve_files(&generator, &file_ids, &styles).await?
            }
            Command::Screenshots { report, method_id } => {
                let generator = report.generator(config);
                let details = generator
                    .get_method_details(&method_id)
                    .await?
                    .ok_or(ExpectedError::MethodNotFound { method_id })?;
                let screenshot_ids =
                    generator.screenshot_ids_from_method_context(details.method_context());
                if screenshot_ids.is_empty() {
                    debug!(
                        "method `{}` recorded no screenshots",
                        details.method_context().id()
                    );
                }
                resolve_files(&generator, &screenshot_ids, &styles).await?
            }
        };

        writer
            .write_stdout(&text)
            .map_err(|err| ExpectedError::WriteError { err })?;
        Ok(ReportNgExitCode::OK)
    }
}

async fn resolve_files(
    generator: &StatisticsGenerator<ReportDirectory>,
    file_ids: &[String],
    styles: &ReportStyles,
) -> Result<String> {
    let files = generator.get_files_for_ids(file_ids).await?;
    let files = display::in_request_order(files, file_ids);
    Ok(display::files(&files, styles))
}
