//! strata - Export record-tagged binary data files to JSON and patch edits back
//!
//! This tool decodes binary object-graph data files, writes them out as
//! editable JSON documents, and writes edited documents back into the
//! original files without disturbing the bytes nobody changed.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use strata_core::{
    walk_records, Container, DataFile, DecoderConfig, FileStatus, PatchConfig, StatsVisitor,
};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Log file used with `--log_file`
const LOG_FILE: &str = "strata.log";

/// Export record-tagged binary data files to JSON and patch edits back
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File or directory to process
    path: PathBuf,

    /// Export file(s) to JSON; the output is named '<file>.json'
    #[arg(short, long)]
    export: bool,

    /// Patch file(s) from their '<file>.json' documents
    #[arg(short, long)]
    patch: bool,

    /// Check that file(s) survive an export/patch round trip unchanged
    #[arg(short, long)]
    validate: bool,

    /// Log level: 0=trace 1=debug 2=info 3=warn 4=error 5=critical 6=off
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=6))]
    loglevel: u8,

    /// Log to 'strata.log' instead of the console
    #[arg(long = "log_file")]
    log_file: bool,

    /// Treat unresolved class references as errors
    #[arg(long)]
    strict: bool,

    /// Apply string edits that change the length prefix width
    #[arg(long)]
    allow_resize: bool,
}

impl Cli {
    fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig::new().strict(self.strict)
    }

    fn patch_config(&self) -> PatchConfig {
        PatchConfig::new()
            .allow_resize(self.allow_resize)
            .decoder(self.decoder_config())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let files = collect_files(&cli.path)?;
    info!("Processing {} file(s) under {}", files.len(), cli.path.display());

    let mut failed = 0usize;
    for path in &files {
        if let Err(e) = process_file(&cli, path) {
            // Log error but continue with other files
            warn!("Error processing {}: {:#}", path.display(), e);
            failed += 1;
        }
    }

    info!("Processed {} file(s), {} failed", files.len(), failed);
    Ok(())
}

fn level_filter(loglevel: u8) -> LevelFilter {
    match loglevel {
        0 => LevelFilter::TRACE,
        1 => LevelFilter::DEBUG,
        2 => LevelFilter::INFO,
        3 => LevelFilter::WARN,
        4 | 5 => LevelFilter::ERROR,
        _ => LevelFilter::OFF,
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(level_filter(cli.loglevel).into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if cli.log_file {
        let file = fs::File::create(LOG_FILE)
            .with_context(|| format!("Failed to create log file: {}", LOG_FILE))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

/// Resolves the path argument to the list of data files to process
fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Path is neither a file nor a directory: {}", path.display());
    }

    let files = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_data_file(p))
        .collect();
    Ok(files)
}

/// Skips hidden files, exported documents and our own log
fn is_data_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || name == LOG_FILE {
        return false;
    }
    !path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// `<file>.json` next to `path`
fn json_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".json");
    path.with_file_name(name)
}

fn process_file(cli: &Cli, path: &Path) -> Result<()> {
    trace!("Reading {}", path.display());
    let mut file = DataFile::open(path)
        .with_context(|| format!("Failed to open data file: {}", path.display()))?;
    debug!("{}: {} container, {} byte stream", path.display(), file.file_type(), file.stream().len());

    if cli.patch {
        patch_file(cli, &mut file, path)?;
    }
    if cli.export {
        export_file(cli, &file, path)?;
    }
    if cli.validate {
        let ok = validate_file(cli, &file, path)?;
        println!("{}: {}", path.display(), if ok { "OK" } else { "FAILED" });
    }
    if !(cli.patch || cli.export || cli.validate) {
        let decoded = file.read_records(&cli.decoder_config());
        info!("{}: {} record(s), {} read", path.display(), decoded.records.len(), decoded.status);
    }
    Ok(())
}

fn export_file(cli: &Cli, file: &DataFile, path: &Path) -> Result<()> {
    let (document, status) = file.export(&cli.decoder_config());
    match status {
        FileStatus::FullRead => {}
        FileStatus::PartialRead => warn!("{}: partial read, export is incomplete", path.display()),
        FileStatus::Empty | FileStatus::Invalid => {
            bail!("Nothing to export from {} ({} read)", path.display(), status)
        }
    }

    let out = json_path(path);
    let text = serde_json::to_string_pretty(&document).context("Failed to serialize export")?;
    fs::write(&out, text).with_context(|| format!("Failed to write file: {}", out.display()))?;
    info!("Exported {} to {}", path.display(), out.display());
    Ok(())
}

fn patch_file(cli: &Cli, file: &mut DataFile, path: &Path) -> Result<()> {
    let source = json_path(path);
    let text = fs::read_to_string(&source)
        .with_context(|| format!("Failed to read file: {}", source.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse JSON: {}", source.display()))?;

    let report = file
        .patch(&document, &cli.patch_config())
        .with_context(|| format!("Failed to patch {}", path.display()))?;
    if report.skipped > 0 {
        warn!("{}: {} field(s) skipped", path.display(), report.skipped);
    }
    if report.is_unchanged() {
        info!("{}: no changes", path.display());
        return Ok(());
    }

    file.save(path)
        .with_context(|| format!("Failed to write patched file: {}", path.display()))?;
    info!(
        "Patched {}: {} value(s), {} string(s)",
        path.display(),
        report.scalars_written,
        report.strings_written
    );
    Ok(())
}

/// Decodes, then checks that an unmodified export patches back to the same bytes
fn validate_file(cli: &Cli, file: &DataFile, path: &Path) -> Result<bool> {
    let decoded = file.read_records(&cli.decoder_config());
    let mut stats = StatsVisitor::default();
    walk_records(&decoded.records, &mut stats);
    info!("{}: {} read; {}", path.display(), decoded.status, stats);

    if decoded.status != FileStatus::FullRead {
        error!("{}: {} read", path.display(), decoded.status);
        return Ok(false);
    }

    let (document, _) = file.export(&cli.decoder_config());
    let mut copy = file.clone();
    let report = copy
        .patch(&document, &cli.patch_config())
        .with_context(|| format!("Failed to patch {}", path.display()))?;

    let before = blake3::hash(file.stream());
    let after = blake3::hash(copy.stream());
    if before != after || !report.is_unchanged() {
        error!(
            "{}: round trip changed the stream ({} -> {})",
            path.display(),
            short_hash(&before),
            short_hash(&after)
        );
        return Ok(false);
    }

    if let Container::Gzip { .. } = file.container() {
        let framed = file.to_bytes().context("Failed to re-compress")?;
        let reopened = DataFile::from_bytes(&framed).context("Failed to re-open re-compressed data")?;
        if reopened.container() != file.container()
            || blake3::hash(reopened.stream()) != before
        {
            error!("{}: compressed container does not round trip", path.display());
            return Ok(false);
        }
    }

    debug!("{}: stream digest {}", path.display(), short_hash(&before));
    Ok(true)
}

/// First 8 hex chars of a blake3 digest
fn short_hash(hash: &blake3::Hash) -> String {
    hash.to_hex()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    /// Header, one `Item` class with an Int32 `hp` member set to 100, terminator
    fn sample_stream() -> Vec<u8> {
        let mut s = vec![0u8];
        for v in [1i32, -1, 1, 0] {
            s.extend_from_slice(&v.to_le_bytes());
        }
        s.push(12); // library
        s.extend_from_slice(&2i32.to_le_bytes());
        s.push(4);
        s.extend_from_slice(b"Game");
        s.push(5); // class with members and types
        s.extend_from_slice(&1i32.to_le_bytes());
        s.push(4);
        s.extend_from_slice(b"Item");
        s.extend_from_slice(&1i32.to_le_bytes());
        s.push(2);
        s.extend_from_slice(b"hp");
        s.push(0); // primitive
        s.push(8); // int32
        s.extend_from_slice(&2i32.to_le_bytes());
        s.extend_from_slice(&100i32.to_le_bytes());
        s.push(11);
        s
    }

    fn cli(path: &Path, args: &[&str]) -> Cli {
        let mut argv = vec!["strata".to_string(), path.display().to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::parse_from(argv)
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_loglevel_range() {
        assert!(Cli::try_parse_from(["strata", ".", "-l", "6"]).is_ok());
        assert!(Cli::try_parse_from(["strata", ".", "-l", "7"]).is_err());
        assert_eq!(level_filter(2), LevelFilter::INFO);
        assert_eq!(level_filter(5), LevelFilter::ERROR);
        assert_eq!(level_filter(6), LevelFilter::OFF);
    }

    #[test]
    fn test_json_path() {
        assert_eq!(json_path(Path::new("/d/items")), PathBuf::from("/d/items.json"));
        assert_eq!(json_path(Path::new("/d/a.dat")), PathBuf::from("/d/a.dat.json"));
    }

    #[test]
    fn test_collect_files_skips_hidden_and_json() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["a", "sub/b", ".hidden", "a.json", "sub/b.JSON"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let mut files = collect_files(dir.path()).unwrap();
        files.sort();
        assert_eq!(files, vec![dir.path().join("a"), dir.path().join("sub/b")]);
        assert!(collect_files(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_export_edit_patch() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("item");
        fs::write(&data, sample_stream()).unwrap();

        process_file(&cli(&data, &["-e"]), &data).unwrap();
        let json = json_path(&data);
        let text = fs::read_to_string(&json).unwrap();
        assert!(text.contains("\"hp\": 100"));

        fs::write(&json, text.replace("\"hp\": 100", "\"hp\": 7")).unwrap();
        process_file(&cli(&data, &["-p"]), &data).unwrap();

        let bytes = fs::read(&data).unwrap();
        assert_eq!(bytes.len(), sample_stream().len());
        assert_eq!(&bytes[bytes.len() - 5..bytes.len() - 1], &7i32.to_le_bytes());
    }

    #[test]
    fn test_validate_round_trip() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("item");
        fs::write(&data, sample_stream()).unwrap();
        let cli = cli(&data, &["-v"]);
        let file = DataFile::open(&data).unwrap();
        assert!(validate_file(&cli, &file, &data).unwrap());

        // truncated stream: no terminator
        let mut short = sample_stream();
        short.pop();
        let file = DataFile::from_bytes(&short).unwrap();
        assert!(!validate_file(&cli, &file, &data).unwrap());
    }

    #[test]
    fn test_patch_without_document_fails() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("item");
        fs::write(&data, sample_stream()).unwrap();
        assert!(process_file(&cli(&data, &["-p"]), &data).is_err());
    }
}
