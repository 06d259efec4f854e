use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dxview_config::{AppConfig, ConfigError, OutputFormat};
use dxview_engine::hatch::HatchLimits;
use dxview_engine::scene::{RenderOptions, render_document};
use dxview_engine::stats::document_statistics;
use dxview_io::{DocumentLoader, DxfFacade};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod summary;

use summary::Summary;

/// 解析 DXF 文件，输出文档统计与渲染报告。
#[derive(Parser, Debug)]
#[command(name = "dxview", version, about, long_about = None)]
struct Cli {
    /// 要读取的 DXF 文件。
    file: PathBuf,
    /// 配置文件路径，缺省时按 DXVIEW_CONFIG、./config/default.toml 顺序查找。
    #[arg(long)]
    config: Option<PathBuf>,
    /// 输出格式，覆盖配置中的 output.format。
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// 同时列出图层表。
    #[arg(long)]
    layers: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, config_error) = match AppConfig::discover(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config);
    if let Some(err) = config_error {
        report_config_error(&err);
    }

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("错误: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let document = DxfFacade::new()
        .load(&cli.file)
        .with_context(|| format!("无法解析 DXF 文件 {}", cli.file.display()))?;
    info!(file = %cli.file.display(), entities = document.entities().len(), "DXF 已加载");

    let file_size = fs::metadata(&cli.file).map(|meta| meta.len()).ok();
    let statistics = document_statistics(&document, file_name(&cli.file).as_deref(), file_size);
    let output = render_document(&document, &render_options(config));
    if output.report.failed_entities > 0 {
        warn!(
            failed = output.report.failed_entities,
            total = output.report.total_entities,
            "部分实体渲染失败"
        );
    }

    let summary = Summary::new(statistics, &output, cli.layers.then(|| document.layers()));
    let format = cli.format.map(OutputFormat::from).unwrap_or(config.output.format);
    match format {
        OutputFormat::Text => print!("{}", summary.to_text()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary).context("序列化输出失败")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn render_options(config: &AppConfig) -> RenderOptions {
    RenderOptions {
        max_block_depth: config.render.max_block_depth,
        max_block_instances: config.render.max_block_instances,
        hatch_limits: HatchLimits {
            max_segments: config.render.max_hatch_segments,
            max_lines_per_pattern: config.render.max_hatch_lines_per_pattern,
        },
        linetype_scale: config.render.linetype_scale,
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn report_config_error(err: &ConfigError) {
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
        }
        ConfigError::Context { .. } => {
            warn!(error = %err, "加载配置失败，使用内建默认值");
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写到 stderr，避免与 JSON 输出混在一起
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
