use clap::Parser;
use log::{error, info};
use sitegen::build::build_site;
use sitegen::config::{split_extensions, Config, Overrides};
use sitegen::frontmatter::Format;
use std::path::PathBuf;
use std::process::ExitCode;

/// Builds a static site from a directory of Markdown documents, templates,
/// and static files.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// The project file. Defaults to the nearest `sitegen.yaml` in the
    /// current directory or one of its parents.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The source directory.
    #[arg(long)]
    src: Option<PathBuf>,

    /// The destination directory.
    #[arg(long)]
    dst: Option<PathBuf>,

    /// The absolute URL the site is served from.
    #[arg(long)]
    base_url: Option<String>,

    /// The analytics ID made available to every template.
    #[arg(long)]
    ga_id: Option<String>,

    /// Comma separated extensions of files that are neither processed nor
    /// copied (e.g., `.ico,.svg`).
    #[arg(long)]
    ignore_ext: Option<String>,

    /// The extension of template files.
    #[arg(long)]
    tmpl_ext: Option<String>,

    /// The header syntax of source documents: `yaml` or `key-value`.
    #[arg(long)]
    front_matter: Option<Format>,

    /// Don't write AMP variants.
    #[arg(long)]
    no_amp: bool,

    /// The number of worker threads. Defaults to one per CPU.
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            src: self.src.clone(),
            dst: self.dst.clone(),
            base_url: self.base_url.clone(),
            ga_id: self.ga_id.clone(),
            ignore_ext: self.ignore_ext.as_deref().map(split_extensions),
            tmpl_ext: self.tmpl_ext.clone(),
            front_matter: self.front_matter,
            amp: if self.no_amp { Some(false) } else { None },
            threads: self.threads,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match Config::load(args.config.as_deref(), args.overrides()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match build_site(&config) {
        Ok(report) => {
            info!(
                "wrote {} pages ({} posts), copied {} files, {} sitemap URLs to '{}'",
                report.pages,
                report.posts,
                report.copied,
                report.urls,
                config.dst.display()
            );
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                error!("{} files failed", report.failures.len());
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
