use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Error, anyhow};
use clap::{Parser, Subcommand};
use layout_store::StoreConfig;
use log::{info, warn};
use print_layout::{
    LayoutConfig, LayoutDocument, LayoutService, PrintSheet, ReferenceResolution, applier,
};
use spell_cache::{HttpSpellSource, SpellSourceConfig};
use tokio::runtime::Builder;

#[derive(Parser, Debug)]
#[command(name = "printsheet", version, about = "Persistent print layouts for character sheets")]
struct Cli {
    /// Store directory, or `memory` for a throwaway store.
    #[arg(long, global = true, env = "PRINTSHEET_STORE_DIR")]
    store: Option<String>,

    /// Reference endpoint (`http(s)://` or `file://`).
    #[arg(long, global = true, env = "PRINTSHEET_SPELL_ENDPOINT")]
    spell_endpoint: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a layout to a page and write the resulting HTML.
    Apply(ApplyArgs),
    /// Validate a layout document without applying it.
    Check(CheckArgs),
    /// Restore the stored layout onto a page and export it with embedded references.
    Export(ExportArgs),
    /// Look up one reference item, fetching and caching it on a miss.
    Spell(SpellArgs),
}

#[derive(Parser, Debug)]
struct PageArgs {
    /// Character sheet HTML.
    #[arg(long)]
    page: PathBuf,

    /// Layout configuration JSON; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Character whose legacy layout is used when no global layout is stored.
    #[arg(long)]
    character: Option<String>,
}

#[derive(Parser, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    page: PageArgs,

    /// Layout document to import; the stored layout is used when omitted.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Output HTML path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Layout document to validate.
    #[arg(long)]
    layout: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    page: PageArgs,

    /// Output JSON path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SpellArgs {
    /// Exact, case-sensitive name.
    name: String,
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let cli = Cli::parse();
    let runtime = Builder::new_current_thread().enable_all().build()?;
    match cli.cmd {
        Command::Check(ref args) => cmd_check(args),
        Command::Apply(ref args) => runtime.block_on(cmd_apply(&cli, args)),
        Command::Export(ref args) => runtime.block_on(cmd_export(&cli, args)),
        Command::Spell(ref args) => runtime.block_on(cmd_spell(&cli, args)),
    }
}

impl Cli {
    fn store_config(&self) -> StoreConfig {
        match self.store.as_deref() {
            Some(dir) if dir.eq_ignore_ascii_case("memory") => StoreConfig::memory(),
            Some(dir) => StoreConfig::directory(dir),
            None => StoreConfig::from_env(),
        }
    }

    async fn service(&self) -> Result<LayoutService<HttpSpellSource>, Error> {
        let mut source_config = SpellSourceConfig::from_env();
        if let Some(endpoint) = &self.spell_endpoint {
            source_config.endpoint.clone_from(endpoint);
        }
        let source = HttpSpellSource::new(&source_config)?;
        let service = LayoutService::open(self.store_config(), source).await?;
        if service.is_degraded() {
            warn!("running without persistent storage");
        }
        Ok(service)
    }
}

fn read_text(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).with_context(|| format!("read '{}'", path.display()))
}

/// Write to `out`, or stdout when no path is given.
fn emit(out: Option<&Path>, text: &str) -> Result<(), Error> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            fs::write(path, text).with_context(|| format!("write '{}'", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn load_sheet(args: &PageArgs) -> Result<PrintSheet, Error> {
    let config = match &args.config {
        Some(path) => serde_json::from_str::<LayoutConfig>(&read_text(path)?)
            .with_context(|| format!("parse layout config '{}'", path.display()))?,
        None => LayoutConfig::default(),
    };
    let mut sheet = PrintSheet::from_html(&read_text(&args.page)?, config)?;
    let installed = sheet.install_default_sections()?;
    info!("installed {} built-in sections", installed.len());
    Ok(sheet)
}

fn report_references(resolutions: &[ReferenceResolution]) {
    for resolution in resolutions {
        if let Err(err) = &resolution.outcome {
            warn!("reference `{}` not rendered: {err}", resolution.pending.ref_key);
        }
    }
}

async fn cmd_apply(cli: &Cli, args: &ApplyArgs) -> Result<(), Error> {
    let service = cli.service().await?;
    let mut sheet = load_sheet(&args.page)?;

    let outcome = match &args.layout {
        Some(path) => {
            let doc = LayoutDocument::from_json(&read_text(path)?)?;
            Some(service.import(&mut sheet, &doc).await?)
        }
        None => {
            service
                .restore(&mut sheet, args.page.character.as_deref())
                .await?
        }
    };
    match &outcome {
        Some((report, resolutions)) => {
            for dropped in &report.dropped {
                warn!("dropped {} `{}`: {}", dropped.kind, dropped.id, dropped.reason);
            }
            report_references(resolutions);
        }
        None => info!("no stored layout; writing the page with default sections only"),
    }
    emit(args.out.as_deref(), &sheet.to_html())
}

fn cmd_check(args: &CheckArgs) -> Result<(), Error> {
    let doc = LayoutDocument::from_json(&read_text(&args.layout)?)?;
    let compatibility = applier::check_version(&doc)?;
    let summary = format!(
        "version {} ({compatibility:?}): {} elements, {} clones, {} extractions, {} merges, {} shapes, {} references, {} embedded",
        doc.version,
        doc.sections.len(),
        doc.clones.len(),
        doc.extractions.len(),
        doc.merges.len(),
        doc.shapes.len(),
        doc.spell_details.len(),
        doc.spell_cache.len()
    );
    emit(None, &summary)
}

async fn cmd_export(cli: &Cli, args: &ExportArgs) -> Result<(), Error> {
    let service = cli.service().await?;
    let mut sheet = load_sheet(&args.page)?;
    let (_, resolutions) = service
        .restore(&mut sheet, args.page.character.as_deref())
        .await?
        .ok_or_else(|| anyhow!("no stored layout to export"))?;
    report_references(&resolutions);
    let doc = service.export(&sheet).await?;
    emit(args.out.as_deref(), &doc.to_json_pretty()?)
}

async fn cmd_spell(cli: &Cli, args: &SpellArgs) -> Result<(), Error> {
    let service = cli.service().await?;
    let spell = service.cache().fetch_with_cache(&args.name).await?;
    emit(None, &serde_json::to_string_pretty(&spell)?)
}
