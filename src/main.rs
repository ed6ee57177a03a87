//! # Text Adjuster (textadj)
//!
//! A CLI tool that reformats text deterministically: inserts line breaks
//! around configured tokens, converts characters between Japanese half-width
//! and full-width forms, decorates lines with prefixes/suffixes, and strips
//! blank lines. Works on stdin, individual files, or whole directory trees.
//!
//! ## Key Components
//!
//! - **Character Classification**: predicates for Latin letters, digits,
//!   spaces, symbols, and katakana across both half-width and full-width
//!   Unicode ranges.
//! - **Width Conversion**: ASCII ↔ full-width shifting plus an explicit
//!   katakana table that decomposes voiced (濁点) and semi-voiced (半濁点)
//!   syllables into half-width base + mark, and composes them back.
//! - **Line Protection**: lines matching a skip pattern are swapped for
//!   placeholder tokens so break insertion cannot touch them, then restored
//!   verbatim at the end of the pipeline.
//! - **Break Insertion**: literal substring tokens (with an exclusion list)
//!   or regular-expression patterns trigger newline insertion before, after,
//!   or around each match.
//!
//! ## Pipeline
//!
//! ```text
//! Input → Width Conversion → Line Protection → Break Insertion
//!       → Prefix/Suffix → Blank-Line Removal → Protection Restore → Output
//! ```
//!
//! The stage order is fixed. Width conversion is character-local so it runs
//! first; protection must wrap break insertion so a skipped line is never
//! split; decoration and blank removal run after breaks settle the final
//! line boundaries; restoration is always last so placeholders never leak.
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | General error (file not found, permission denied, I/O error) |
//! | 2 | Invalid command-line arguments |
//! | 3 | Dry-run mode: changes would be made |
//! | 4 | Parse error (invalid UTF-8 or binary input) |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::ValueEnum;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, DiffTag, TextDiff};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Exit Codes
// ─────────────────────────────────────────────────────────────────────────────

/// Semantic exit codes for scripting and CI integration
mod exit_codes {
    /// Success - completed without errors
    pub const SUCCESS: i32 = 0;
    /// General error (file not found, permission denied, I/O error)
    pub const ERROR: i32 = 1;
    /// Invalid command-line arguments
    pub const INVALID_ARGS: i32 = 2;
    /// Dry-run mode: changes would be made
    pub const WOULD_CHANGE: i32 = 3;
    /// Parse error (invalid UTF-8 or binary file detected)
    pub const PARSE_ERROR: i32 = 4;
}

#[derive(Debug)]
struct ArgError(String);

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ArgError {}

#[derive(Debug)]
struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug)]
struct RunOutcome {
    dry_run: bool,
    would_change: bool,
}

fn error_chain_has<T: std::error::Error + 'static>(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<T>())
}

fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if error_chain_has::<ArgError>(err) {
        exit_codes::INVALID_ARGS
    } else if error_chain_has::<ParseError>(err) {
        exit_codes::PARSE_ERROR
    } else {
        exit_codes::ERROR
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CLI Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Where a newline is inserted relative to each matched break token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BreakMode {
    /// Insert the newline immediately before the match
    Before,
    /// Insert the newline immediately after the match
    After,
    /// Insert newlines on both sides of the match
    Around,
}

/// Direction of half-width/full-width character conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum WidthMode {
    /// Leave character widths untouched
    None,
    /// Convert eligible full-width characters to half-width
    ToHalf,
    /// Convert eligible half-width characters to full-width
    ToFull,
}

/// Character category eligible for width conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WidthCategory {
    /// Latin letters A-Z / a-z in either width
    Latin,
    /// Decimal digits 0-9 in either width
    Digit,
    /// ASCII space and the ideographic space
    Space,
    /// Punctuation and symbols in either width
    Symbol,
    /// Katakana, full-width and half-width blocks
    Katakana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColorMode {
    /// Auto-detect color support
    Auto,
    /// Always emit colors (even when not a TTY)
    Always,
    /// Never emit colors
    Never,
}

/// Text Adjuster: break insertion, half/full-width conversion, line decoration
#[derive(Parser, Debug)]
#[command(
    name = "textadj",
    version,
    about,
    long_about = None,
    after_help = "EXIT CODES:\n  0  Success\n  1  General error (file not found, permission denied, I/O error)\n  2  Invalid command-line arguments\n  3  Dry-run mode: changes would be made\n  4  Parse error (invalid UTF-8 or binary input)\n"
)]
struct Args {
    /// Input file(s), or a single directory with --out-dir.
    /// Reads from stdin if not provided.
    #[arg(value_name = "PATH")]
    inputs: Vec<PathBuf>,

    /// Path to config file (default: search for .textadjrc)
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Ignore config files
    #[arg(long = "no-config")]
    no_config: bool,

    /// Mirror transformed files into this directory (batch mode;
    /// requires a single directory input)
    #[arg(
        short = 'o',
        long = "out-dir",
        value_name = "DIR",
        conflicts_with_all = ["in_place", "diff", "side_by_side", "dry_run", "json"]
    )]
    out_dir: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Extension allow-list for batch mode (comma-separated; default:
    /// built-in set of common text/code extensions)
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    ext: Vec<String>,

    /// Glob pattern to match files when recursing without --out-dir
    /// (comma-separated)
    #[arg(long, default_value = "*.txt,*.md", requires = "recursive")]
    glob: String,

    /// Do not respect .gitignore when recursing without --out-dir
    #[arg(long = "no-gitignore", requires = "recursive")]
    no_gitignore: bool,

    /// Maximum directory depth (0 = unlimited)
    #[arg(long, default_value = "0", requires = "recursive")]
    max_depth: usize,

    /// Insert a line break at every occurrence of this token (repeatable)
    #[arg(short = 'b', long = "break-token", value_name = "TOKEN")]
    break_token: Vec<String>,

    /// Treat break tokens as regular expressions
    #[arg(long = "break-regex")]
    break_regex: bool,

    /// Never insert a break inside this substring, even if it contains a
    /// break token (repeatable; literal mode only)
    #[arg(short = 'x', long = "break-exclude", value_name = "TOKEN")]
    break_exclude: Vec<String>,

    /// Where the newline goes relative to each match
    #[arg(long = "break-mode", value_enum, default_value = "after")]
    break_mode: BreakMode,

    /// Lines matching this regex are protected from break insertion and
    /// restored verbatim
    #[arg(short = 'k', long = "skip-lines", value_name = "REGEX")]
    skip_lines: Option<String>,

    /// Prepend this string to every line
    #[arg(short = 'p', long, default_value = "", hide_default_value = true)]
    prefix: String,

    /// Append this string to every line
    #[arg(short = 's', long, default_value = "", hide_default_value = true)]
    suffix: String,

    /// Drop lines that are empty or whitespace-only (after decoration)
    #[arg(short = 'B', long = "remove-blank-lines")]
    remove_blank_lines: bool,

    /// Half/full-width conversion direction
    #[arg(short = 'W', long = "width", value_enum, default_value = "none")]
    width: WidthMode,

    /// Convert only these exact characters (overrides --width-category)
    #[arg(long = "width-targets", default_value = "", hide_default_value = true)]
    width_targets: String,

    /// Character category to convert (repeatable; default: all categories)
    #[arg(long = "width-category", value_enum, value_name = "CATEGORY")]
    width_category: Vec<WidthCategory>,

    /// Edit file(s) in place
    #[arg(short = 'i', long)]
    in_place: bool,

    /// Create backup file before in-place editing
    #[arg(long, requires = "in_place")]
    backup: bool,

    /// Extension for backup files (default: .bak)
    #[arg(long, default_value = ".bak", requires = "backup")]
    backup_ext: String,

    /// Show unified diff of changes instead of full output
    #[arg(short = 'd', long)]
    diff: bool,

    /// Show original and transformed text side by side with change marks
    #[arg(long = "side-by-side", conflicts_with = "diff")]
    side_by_side: bool,

    /// Preview changes without modifying files (exit 0=no changes, 3=would change)
    #[arg(short = 'n', long, conflicts_with = "in_place")]
    dry_run: bool,

    /// Watch file for changes and reformat in place on each save
    #[arg(
        short = 'w',
        long,
        conflicts_with_all = ["in_place", "recursive", "diff", "side_by_side", "dry_run", "json", "out_dir"]
    )]
    watch: bool,

    /// Debounce interval in milliseconds (for --watch mode)
    #[arg(long, default_value = "500", requires = "watch")]
    debounce_ms: u64,

    /// Output results as JSON for programmatic processing
    #[arg(long, conflicts_with_all = ["verbose", "diff", "side_by_side"])]
    json: bool,

    /// Verbose output showing processing progress
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Color output: auto, always, or never
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,

    /// Subcommand (config management)
    #[command(subcommand)]
    command: Option<Commands>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config management actions
#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Initialize a new .textadjrc config file
    Init {
        /// Create in home directory instead of current
        #[arg(long)]
        global: bool,
    },
    /// Show effective configuration (merged file + CLI)
    Show,
    /// Show path to active config file
    Path,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transformation Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which character categories participate in width conversion.
///
/// Only consulted when the explicit target set is empty; a non-empty target
/// set decides eligibility on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct WidthCategories {
    latin: bool,
    digit: bool,
    space: bool,
    symbol: bool,
    katakana: bool,
}

impl WidthCategories {
    fn all() -> Self {
        Self {
            latin: true,
            digit: true,
            space: true,
            symbol: true,
            katakana: true,
        }
    }
}

fn categories_from_list(list: &[WidthCategory]) -> WidthCategories {
    if list.is_empty() {
        return WidthCategories::all();
    }
    let mut cats = WidthCategories::default();
    for item in list {
        match item {
            WidthCategory::Latin => cats.latin = true,
            WidthCategory::Digit => cats.digit = true,
            WidthCategory::Space => cats.space = true,
            WidthCategory::Symbol => cats.symbol = true,
            WidthCategory::Katakana => cats.katakana = true,
        }
    }
    cats
}

/// One run's worth of transformation rules. Immutable once built; the
/// pipeline never mutates it.
#[derive(Debug, Clone)]
struct TransformConfig {
    /// Drop empty/whitespace-only lines after decoration
    remove_blank_lines: bool,
    /// Tokens (or regex patterns) that trigger a line break
    break_tokens: Vec<String>,
    /// Interpret break tokens as regular expressions
    break_tokens_are_regex: bool,
    /// Substrings that never receive a break (literal mode only)
    break_exclude_tokens: Vec<String>,
    /// Where the newline goes relative to each match
    break_mode: BreakMode,
    /// Lines matching this regex bypass break insertion entirely
    skip_line_pattern: Option<String>,
    /// Prepended to every line
    line_prefix: String,
    /// Appended to every line
    line_suffix: String,
    /// Width conversion direction
    width_mode: WidthMode,
    /// Explicit character allow-list; overrides category flags when non-empty
    width_targets: HashSet<char>,
    /// Category flags; consulted only when the target set is empty
    width_categories: WidthCategories,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            remove_blank_lines: false,
            break_tokens: Vec::new(),
            break_tokens_are_regex: false,
            break_exclude_tokens: Vec::new(),
            break_mode: BreakMode::After,
            skip_line_pattern: None,
            line_prefix: String::new(),
            line_suffix: String::new(),
            width_mode: WidthMode::None,
            width_targets: HashSet::new(),
            width_categories: WidthCategories::all(),
        }
    }
}

/// Runtime configuration derived from CLI args and any config file
#[derive(Debug)]
struct Config {
    transform: TransformConfig,
    out_dir: Option<PathBuf>,
    recursive: bool,
    exts: Vec<String>,
    glob: String,
    gitignore: bool,
    max_depth: usize,
    color: ColorMode,
    verbose: bool,
    diff: bool,
    side_by_side: bool,
    dry_run: bool,
    watch: bool,
    debounce_ms: u64,
    backup: bool,
    backup_ext: String,
    json: bool,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        let transform = TransformConfig {
            remove_blank_lines: args.remove_blank_lines,
            break_tokens: args.break_token.clone(),
            break_tokens_are_regex: args.break_regex,
            break_exclude_tokens: args.break_exclude.clone(),
            break_mode: args.break_mode,
            skip_line_pattern: args.skip_lines.clone(),
            line_prefix: args.prefix.clone(),
            line_suffix: args.suffix.clone(),
            width_mode: args.width,
            width_targets: args.width_targets.chars().collect(),
            width_categories: categories_from_list(&args.width_category),
        };

        Self {
            transform,
            out_dir: args.out_dir.clone(),
            recursive: args.recursive,
            exts: args.ext.clone(),
            glob: args.glob.clone(),
            gitignore: !args.no_gitignore,
            max_depth: args.max_depth,
            color: args.color,
            verbose: args.verbose,
            diff: args.diff,
            side_by_side: args.side_by_side,
            dry_run: args.dry_run,
            watch: args.watch,
            debounce_ms: args.debounce_ms,
            backup: args.backup,
            backup_ext: args.backup_ext.clone(),
            json: args.json,
        }
    }
}

struct VerboseStyle {
    use_color: bool,
}

impl VerboseStyle {
    fn new(use_color: bool) -> Self {
        Self { use_color }
    }

    fn paint(&self, code: &str, text: impl fmt::Display) -> String {
        if self.use_color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: impl fmt::Display) -> String {
        self.paint("1", text)
    }

    fn dim(&self, text: impl fmt::Display) -> String {
        self.paint("2", text)
    }

    fn success(&self, text: impl fmt::Display) -> String {
        self.paint("1;32", text)
    }

    fn warn(&self, text: impl fmt::Display) -> String {
        self.paint("33", text)
    }

    fn stat_label(&self, text: impl fmt::Display) -> String {
        self.paint("1;34", text)
    }

    fn separator(&self) -> String {
        self.dim("───")
    }
}

fn color_enabled(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Never => false,
        ColorMode::Always => true,
        ColorMode::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                return false;
            }
            if std::env::var("FORCE_COLOR").is_ok() {
                return true;
            }
            io::stderr().is_terminal()
        }
    }
}

fn build_styles(color: ColorMode) -> VerboseStyle {
    VerboseStyle::new(color_enabled(color))
}

// ─────────────────────────────────────────────────────────────────────────────
// Config File Support
// ─────────────────────────────────────────────────────────────────────────────

/// Config file names searched in order
const CONFIG_FILENAMES: &[&str] = &[".textadjrc", ".textadjrc.toml", "textadjrc.toml"];

/// Configuration loaded from a .textadjrc file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    /// Break tokens (or regex patterns)
    break_tokens: Option<Vec<String>>,
    /// Substrings excluded from break insertion
    break_exclude: Option<Vec<String>>,
    /// Interpret break tokens as regular expressions
    break_regex: Option<bool>,
    /// Newline placement: before, after, around
    break_mode: Option<BreakMode>,
    /// Regex protecting matching lines from break insertion
    skip_lines: Option<String>,
    /// String prepended to every line
    prefix: Option<String>,
    /// String appended to every line
    suffix: Option<String>,
    /// Drop blank lines after decoration
    remove_blank_lines: Option<bool>,
    /// Width conversion: none, to-half, to-full
    width: Option<WidthMode>,
    /// Explicit width-conversion character allow-list
    width_targets: Option<String>,
    /// Width-conversion categories
    width_categories: Option<Vec<WidthCategory>>,
    /// Extension allow-list for batch mode
    ext: Option<Vec<String>>,
    /// Descend into subdirectories
    recursive: Option<bool>,
    /// Glob patterns for recursive discovery
    glob: Option<String>,
    /// Respect .gitignore during recursive discovery
    gitignore: Option<bool>,
    /// Maximum directory depth
    max_depth: Option<usize>,
    /// Show verbose output
    verbose: Option<bool>,
    /// Color mode: auto, always, never
    color: Option<ColorMode>,
    /// Output as JSON
    json: Option<bool>,
    /// Create backup before in-place edit
    backup: Option<bool>,
    /// Backup file extension
    backup_ext: Option<String>,
}

/// Search for a config file starting from the given directory
fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    // Search up the directory tree
    loop {
        for filename in CONFIG_FILENAMES {
            let config_path = current.join(filename);
            if config_path.exists() {
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    // Check home directory
    if let Some(home) = dirs::home_dir() {
        for filename in CONFIG_FILENAMES {
            let config_path = home.join(filename);
            if config_path.exists() {
                return Some(config_path);
            }
        }
    }

    None
}

/// Load and parse a config file
fn load_config_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Create Config by merging file config with CLI args (CLI wins)
fn create_config(args: &Args) -> Result<Config> {
    let mut config = Config::from(args);

    // Skip config file loading if --no-config is set
    if args.no_config {
        return Ok(config);
    }

    // Find and load config file
    let config_path = if let Some(ref path) = args.config_file {
        // Explicit config file specified
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }
        Some(path.clone())
    } else {
        // Search for config file
        let start_dir = args
            .inputs
            .first()
            .and_then(|p| {
                if p.is_dir() {
                    Some(p.clone())
                } else {
                    p.parent().map(|p| p.to_path_buf())
                }
            })
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

        find_config_file(&start_dir)
    };

    if let Some(path) = config_path {
        let file_config = load_config_file(&path)?;

        // Merge file config with CLI config (CLI wins)
        // Only apply file config values when CLI used defaults
        if args.break_token.is_empty() {
            if let Some(tokens) = file_config.break_tokens {
                config.transform.break_tokens = tokens;
            }
        }

        if args.break_exclude.is_empty() {
            if let Some(excludes) = file_config.break_exclude {
                config.transform.break_exclude_tokens = excludes;
            }
        }

        if !args.break_regex {
            if let Some(r) = file_config.break_regex {
                config.transform.break_tokens_are_regex = r;
            }
        }

        if args.break_mode == BreakMode::After {
            if let Some(mode) = file_config.break_mode {
                config.transform.break_mode = mode;
            }
        }

        if args.skip_lines.is_none() {
            if let Some(pattern) = file_config.skip_lines {
                config.transform.skip_line_pattern = Some(pattern);
            }
        }

        if args.prefix.is_empty() {
            if let Some(p) = file_config.prefix {
                config.transform.line_prefix = p;
            }
        }

        if args.suffix.is_empty() {
            if let Some(s) = file_config.suffix {
                config.transform.line_suffix = s;
            }
        }

        if !args.remove_blank_lines {
            if let Some(b) = file_config.remove_blank_lines {
                config.transform.remove_blank_lines = b;
            }
        }

        if args.width == WidthMode::None {
            if let Some(mode) = file_config.width {
                config.transform.width_mode = mode;
            }
        }

        if args.width_targets.is_empty() {
            if let Some(targets) = file_config.width_targets {
                config.transform.width_targets = targets.chars().collect();
            }
        }

        if args.width_category.is_empty() {
            if let Some(cats) = file_config.width_categories {
                config.transform.width_categories = categories_from_list(&cats);
            }
        }

        if args.ext.is_empty() {
            if let Some(exts) = file_config.ext {
                config.exts = exts;
            }
        }

        if !args.recursive {
            if let Some(r) = file_config.recursive {
                config.recursive = r;
            }
        }

        if args.glob == "*.txt,*.md" {
            if let Some(g) = file_config.glob {
                config.glob = g;
            }
        }

        if !args.no_gitignore {
            if let Some(gi) = file_config.gitignore {
                config.gitignore = gi;
            }
        }

        if args.max_depth == 0 {
            if let Some(d) = file_config.max_depth {
                config.max_depth = d;
            }
        }

        if !args.verbose {
            if let Some(v) = file_config.verbose {
                config.verbose = v;
            }
        }

        if args.color == ColorMode::Auto {
            if let Some(c) = file_config.color {
                config.color = c;
            }
        }

        if !args.json {
            if let Some(j) = file_config.json {
                config.json = j;
            }
        }

        if !args.backup {
            if let Some(b) = file_config.backup {
                config.backup = b;
            }
        }

        if args.backup_ext == ".bak" {
            if let Some(ext) = file_config.backup_ext {
                config.backup_ext = ext;
            }
        }
    }

    Ok(config)
}

/// Default config file content
const DEFAULT_CONFIG: &str = r#"# .textadjrc - textadj configuration file

# Break insertion
# break_tokens = ["END"]
# break_exclude = ["THE END"]
# break_regex = false
# break_mode = "after"        # before | after | around

# Line protection
# skip_lines = "^#"

# Line decoration
# prefix = ""
# suffix = ""
# remove_blank_lines = false

# Width conversion
# width = "none"              # none | to-half | to-full
# width_targets = ""
# width_categories = ["latin", "digit", "space", "symbol", "katakana"]

# Batch mode defaults
# ext = [".txt", ".md"]
# recursive = false
# glob = "*.txt,*.md"
# gitignore = true
# max_depth = 0

# Output options
# verbose = false
# color = "auto"
# json = false

# Backup options (for --in-place)
# backup = false
# backup_ext = ".bak"
"#;

/// Handle the config subcommand
fn run_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { global } => {
            let path = if *global {
                dirs::home_dir()
                    .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
                    .join(".textadjrc")
            } else {
                PathBuf::from(".textadjrc")
            };

            if path.exists() {
                return Err(anyhow::anyhow!(
                    "Config file already exists: {}",
                    path.display()
                ));
            }

            fs::write(&path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to create config file: {}", path.display()))?;

            eprintln!("Created config file: {}", path.display());
            Ok(())
        }

        ConfigAction::Show => {
            // Parse minimal args to get effective config
            let args = Args::parse_from(["textadj"]);
            let config = create_config(&args)?;

            eprintln!("Effective configuration:");
            eprintln!("  break_tokens: {:?}", config.transform.break_tokens);
            eprintln!(
                "  break_exclude: {:?}",
                config.transform.break_exclude_tokens
            );
            eprintln!("  break_regex: {}", config.transform.break_tokens_are_regex);
            eprintln!("  break_mode: {:?}", config.transform.break_mode);
            eprintln!("  skip_lines: {:?}", config.transform.skip_line_pattern);
            eprintln!("  prefix: {:?}", config.transform.line_prefix);
            eprintln!("  suffix: {:?}", config.transform.line_suffix);
            eprintln!(
                "  remove_blank_lines: {}",
                config.transform.remove_blank_lines
            );
            eprintln!("  width: {:?}", config.transform.width_mode);
            eprintln!(
                "  width_targets: {} char(s)",
                config.transform.width_targets.len()
            );
            eprintln!(
                "  width_categories: {:?}",
                config.transform.width_categories
            );
            eprintln!("  recursive: {}", config.recursive);
            eprintln!("  glob: {}", config.glob);
            eprintln!("  gitignore: {}", config.gitignore);
            eprintln!("  max_depth: {}", config.max_depth);
            eprintln!("  verbose: {}", config.verbose);
            eprintln!("  color: {:?}", config.color);
            eprintln!("  json: {}", config.json);
            eprintln!("  backup: {}", config.backup);
            eprintln!("  backup_ext: {}", config.backup_ext);

            // Show config file path if found
            let start_dir = std::env::current_dir().unwrap_or_default();
            if let Some(path) = find_config_file(&start_dir) {
                eprintln!();
                eprintln!("Config file: {}", path.display());
            }

            Ok(())
        }

        ConfigAction::Path => {
            let start_dir = std::env::current_dir().unwrap_or_default();
            if let Some(path) = find_config_file(&start_dir) {
                println!("{}", path.display());
                Ok(())
            } else {
                eprintln!("No config file found");
                std::process::exit(1);
            }
        }
    }
}

fn validate_args(args: &Args) -> Result<()> {
    if args.in_place && args.inputs.is_empty() {
        return Err(ArgError("--in-place requires at least one input file".to_string()).into());
    }

    if args.recursive && args.inputs.is_empty() {
        return Err(ArgError("--recursive requires at least one input path".to_string()).into());
    }

    if args.out_dir.is_some() && args.inputs.len() != 1 {
        return Err(ArgError("--out-dir requires exactly one input directory".to_string()).into());
    }

    if args.break_regex && !args.break_exclude.is_empty() {
        return Err(ArgError(
            "--break-exclude only applies to literal tokens (remove --break-regex)".to_string(),
        )
        .into());
    }

    if args.watch && args.inputs.len() != 1 {
        return Err(ArgError("--watch requires exactly one input file".to_string()).into());
    }

    Ok(())
}

/// Statistics collected while transforming
#[derive(Default, Clone)]
struct Stats {
    /// Lines in the input text
    lines_in: usize,
    /// Lines in the transformed text
    lines_out: usize,
    /// Processing elapsed time
    elapsed: Duration,
}

impl Stats {
    /// Merge another Stats into this one (for aggregating across files)
    fn merge(&mut self, other: &Stats) {
        self.lines_in += other.lines_in;
        self.lines_out += other.lines_out;
        self.elapsed += other.elapsed;
    }

    /// Calculate input lines processed per second
    fn lines_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.lines_in as f64 / secs
        } else {
            self.lines_in as f64
        }
    }
}

/// Print a statistics summary to stderr
fn print_stats_summary(
    stats: &Stats,
    files_processed: usize,
    files_changed: usize,
    errors: usize,
    styles: &VerboseStyle,
) {
    eprintln!();
    eprintln!("{} Summary {}", styles.separator(), styles.separator());

    if files_processed > 1 {
        eprintln!(
            "  {} {} processed, {} modified, {} unchanged",
            styles.stat_label("Files:"),
            files_processed,
            files_changed,
            files_processed.saturating_sub(files_changed)
        );
    }

    eprintln!(
        "  {} {} in, {} out",
        styles.stat_label("Lines:"),
        stats.lines_in,
        stats.lines_out
    );

    let elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0;
    eprintln!(
        "  {} {:.2}ms ({:.0} lines/sec)",
        styles.stat_label("Time:"),
        elapsed_ms,
        stats.lines_per_second()
    );

    if errors > 0 {
        eprintln!("  {} {}", styles.paint("1;31", "Errors:"), errors);
    }

    eprintln!();
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON Output Structures
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonOutput {
    version: &'static str,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    input: IoStats,
    output: IoStats,
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Serialize)]
struct IoStats {
    lines: usize,
    bytes: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Character Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Full-width punctuation recognized as symbols in addition to the shifted
/// ASCII block.
const FULLWIDTH_SYMBOLS: &str = "。、・「」『』（）［］｛｝〈〉《》【】—―…‥ー：；？！＝＋－×÷％〜＾￥｜";

/// Latin letter in either width (A-Z, a-z, Ａ-Ｚ, ａ-ｚ).
fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || ('Ａ'..='Ｚ').contains(&c) || ('ａ'..='ｚ').contains(&c)
}

/// Decimal digit in either width (0-9, ０-９).
fn is_digit_char(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

/// ASCII space or the ideographic (full-width) space.
fn is_space_char(c: char) -> bool {
    c == ' ' || c == '\u{3000}'
}

/// Printable punctuation in either width.
///
/// Covers printable ASCII punctuation (0x21-0x7E minus alphanumerics), the
/// corresponding shifted full-width block (minus full-width alphanumerics),
/// the half-width CJK punctuation marks ｡｢｣､･ (U+FF61-U+FF65), and an
/// explicit set of full-width Japanese/CJK punctuation marks. Never matches
/// letters, digits, or spaces in either width.
fn is_symbol_char(c: char) -> bool {
    let code = c as u32;
    if (0x21..=0x7E).contains(&code) && !c.is_ascii_alphanumeric() {
        return true;
    }
    if (0xFF01..=0xFF5E).contains(&code) && !is_latin_letter(c) && !is_digit_char(c) {
        return true;
    }
    if (0xFF61..=0xFF65).contains(&code) {
        return true;
    }
    FULLWIDTH_SYMBOLS.contains(c)
}

/// Katakana in the full-width block (U+30A0-U+30FF) or the half-width block
/// (U+FF66-U+FF9F, which includes the half-width voiced/semi-voiced marks).
fn is_katakana(c: char) -> bool {
    let code = c as u32;
    (0x30A0..=0x30FF).contains(&code) || (0xFF66..=0xFF9F).contains(&code)
}

/// Any character in the half-width kana block, punctuation included.
fn is_halfwidth_kana(c: char) -> bool {
    (0xFF61..=0xFF9F).contains(&(c as u32))
}

// ─────────────────────────────────────────────────────────────────────────────
// Width Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Half-width voiced sound mark (濁点)
const VOICED_MARK: char = '\u{FF9E}';
/// Half-width semi-voiced sound mark (半濁点)
const SEMI_VOICED_MARK: char = '\u{FF9F}';

/// Full-width katakana and punctuation mapped to half-width equivalents.
///
/// Voiced and semi-voiced syllables decompose into a base character plus a
/// half-width mark, so those entries are two characters long. To-full
/// composition searches this same table in reverse; canonical syllables are
/// listed before the small variants (ヵ, ヶ, ヮ, ヰ, ヱ) that share a
/// half-width form, so reverse lookups resolve to the canonical character.
///
/// The ：；！？ rows never match in either direction: the ±0xFEE0 ASCII
/// shift converts those characters before any table lookup. They stay to
/// keep the mapping complete; the shift path owns them.
static KANA_TABLE: &[(char, &str)] = &[
    ('。', "｡"),
    ('、', "､"),
    ('・', "･"),
    ('「', "｢"),
    ('」', "｣"),
    ('ー', "ｰ"),
    ('〜', "~"),
    ('：', ":"),
    ('；', ";"),
    ('！', "!"),
    ('？', "?"),
    ('ァ', "ｧ"),
    ('ア', "ｱ"),
    ('ィ', "ｨ"),
    ('イ', "ｲ"),
    ('ゥ', "ｩ"),
    ('ウ', "ｳ"),
    ('ェ', "ｪ"),
    ('エ', "ｴ"),
    ('ォ', "ｫ"),
    ('オ', "ｵ"),
    ('カ', "ｶ"),
    ('キ', "ｷ"),
    ('ク', "ｸ"),
    ('ケ', "ｹ"),
    ('コ', "ｺ"),
    ('サ', "ｻ"),
    ('シ', "ｼ"),
    ('ス', "ｽ"),
    ('セ', "ｾ"),
    ('ソ', "ｿ"),
    ('タ', "ﾀ"),
    ('チ', "ﾁ"),
    ('ツ', "ﾂ"),
    ('テ', "ﾃ"),
    ('ト', "ﾄ"),
    ('ナ', "ﾅ"),
    ('ニ', "ﾆ"),
    ('ヌ', "ﾇ"),
    ('ネ', "ﾈ"),
    ('ノ', "ﾉ"),
    ('ハ', "ﾊ"),
    ('ヒ', "ﾋ"),
    ('フ', "ﾌ"),
    ('ヘ', "ﾍ"),
    ('ホ', "ﾎ"),
    ('マ', "ﾏ"),
    ('ミ', "ﾐ"),
    ('ム', "ﾑ"),
    ('メ', "ﾒ"),
    ('モ', "ﾓ"),
    ('ヤ', "ﾔ"),
    ('ャ', "ｬ"),
    ('ユ', "ﾕ"),
    ('ュ', "ｭ"),
    ('ヨ', "ﾖ"),
    ('ョ', "ｮ"),
    ('ラ', "ﾗ"),
    ('リ', "ﾘ"),
    ('ル', "ﾙ"),
    ('レ', "ﾚ"),
    ('ロ', "ﾛ"),
    ('ワ', "ﾜ"),
    ('ヲ', "ｦ"),
    ('ン', "ﾝ"),
    ('ヴ', "ｳﾞ"),
    ('ガ', "ｶﾞ"),
    ('ギ', "ｷﾞ"),
    ('グ', "ｸﾞ"),
    ('ゲ', "ｹﾞ"),
    ('ゴ', "ｺﾞ"),
    ('ザ', "ｻﾞ"),
    ('ジ', "ｼﾞ"),
    ('ズ', "ｽﾞ"),
    ('ゼ', "ｾﾞ"),
    ('ゾ', "ｿﾞ"),
    ('ダ', "ﾀﾞ"),
    ('ヂ', "ﾁﾞ"),
    ('ヅ', "ﾂﾞ"),
    ('デ', "ﾃﾞ"),
    ('ド', "ﾄﾞ"),
    ('バ', "ﾊﾞ"),
    ('ビ', "ﾋﾞ"),
    ('ブ', "ﾌﾞ"),
    ('ベ', "ﾍﾞ"),
    ('ボ', "ﾎﾞ"),
    ('パ', "ﾊﾟ"),
    ('ピ', "ﾋﾟ"),
    ('プ', "ﾌﾟ"),
    ('ペ', "ﾍﾟ"),
    ('ポ', "ﾎﾟ"),
    ('ッ', "ｯ"),
    ('ヵ', "ｶ"),
    ('ヶ', "ｹ"),
    ('ヮ', "ﾜ"),
    ('ヰ', "ｲ"),
    ('ヱ', "ｴ"),
    ('゛', "ﾞ"),
    ('゜', "ﾟ"),
];

/// Look up the half-width form of a full-width katakana or punctuation mark.
fn kana_to_halfwidth(c: char) -> Option<&'static str> {
    KANA_TABLE
        .iter()
        .find(|(full, _)| *full == c)
        .map(|(_, half)| *half)
}

/// Look up the full-width form of a single half-width kana character.
fn kana_to_fullwidth(c: char) -> Option<char> {
    KANA_TABLE
        .iter()
        .find(|(_, half)| {
            let mut chars = half.chars();
            chars.next() == Some(c) && chars.next().is_none()
        })
        .map(|(full, _)| *full)
}

/// Compose a half-width base + voiced/semi-voiced mark pair into the
/// precomposed full-width syllable, if one exists.
fn compose_kana(base: char, mark: char) -> Option<char> {
    KANA_TABLE
        .iter()
        .find(|(_, half)| {
            let mut chars = half.chars();
            chars.next() == Some(base) && chars.next() == Some(mark) && chars.next().is_none()
        })
        .map(|(full, _)| *full)
}

/// Shift half-width ASCII (0x21-0x7E) into the full-width block; map the
/// ASCII space to the ideographic space. Other characters pass through.
fn ascii_to_fullwidth(c: char) -> char {
    if c == ' ' {
        return '\u{3000}';
    }
    let code = c as u32;
    if (0x21..=0x7E).contains(&code) {
        char::from_u32(code + 0xFEE0).unwrap_or(c)
    } else {
        c
    }
}

/// Shift full-width ASCII (U+FF01-U+FF5E) back to half-width; map the
/// ideographic space to the ASCII space. Other characters pass through.
fn fullwidth_to_ascii(c: char) -> char {
    if c == '\u{3000}' {
        return ' ';
    }
    let code = c as u32;
    if (0xFF01..=0xFF5E).contains(&code) {
        char::from_u32(code - 0xFEE0).unwrap_or(c)
    } else {
        c
    }
}

/// Decide whether a character participates in width conversion.
///
/// A non-empty target set fully overrides the category flags: the character
/// converts only if it is listed, no matter which categories are enabled.
fn char_eligible(c: char, cfg: &TransformConfig) -> bool {
    if !cfg.width_targets.is_empty() {
        return cfg.width_targets.contains(&c);
    }
    let cats = &cfg.width_categories;
    (cats.latin && is_latin_letter(c))
        || (cats.digit && is_digit_char(c))
        || (cats.space && is_space_char(c))
        || (cats.symbol && is_symbol_char(c))
        || (cats.katakana && is_katakana(c))
}

/// Apply the configured width conversion to every character of `text`.
///
/// Characters stream through one at a time. The single exception is to-full
/// kana composition: when an eligible half-width kana is followed by an
/// eligible voiced/semi-voiced mark that composes with it, both characters
/// are consumed and the precomposed syllable is emitted, so a prior to-half
/// decomposition round-trips exactly. Multi-character ligatures beyond those
/// mark pairs are not supported.
fn apply_width_transform(text: &str, cfg: &TransformConfig) -> String {
    if cfg.width_mode == WidthMode::None {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !char_eligible(c, cfg) {
            out.push(c);
            continue;
        }

        match cfg.width_mode {
            WidthMode::None => out.push(c),
            WidthMode::ToFull => {
                if is_halfwidth_kana(c) {
                    if let Some(&mark) = chars.peek() {
                        if (mark == VOICED_MARK || mark == SEMI_VOICED_MARK)
                            && char_eligible(mark, cfg)
                        {
                            if let Some(composed) = compose_kana(c, mark) {
                                chars.next();
                                out.push(composed);
                                continue;
                            }
                        }
                    }
                    out.push(kana_to_fullwidth(c).unwrap_or(c));
                } else {
                    out.push(ascii_to_fullwidth(c));
                }
            }
            WidthMode::ToHalf => {
                let c = fullwidth_to_ascii(c);
                match kana_to_halfwidth(c) {
                    Some(half) => out.push_str(half),
                    None => out.push(c),
                }
            }
        }
    }

    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Placeholders
// ─────────────────────────────────────────────────────────────────────────────

/// Private-use-area sentinel bracketing every placeholder token. Ordinary
/// text never contains it, so placeholders cannot collide with content.
const PLACEHOLDER_MARK: char = '\u{F8F0}';

/// Placeholder standing in for a protected (skipped) line.
fn skip_placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_MARK}S{index}{PLACEHOLDER_MARK}")
}

/// Placeholder standing in for an excluded substring during break insertion.
fn exclude_placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_MARK}E{index}{PLACEHOLDER_MARK}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Line Protection
// ─────────────────────────────────────────────────────────────────────────────

/// Replace every line matching `pattern` with a unique placeholder.
///
/// Returns the rewritten text plus the placeholder → original-line map
/// consumed by [`restore_protected_lines`]. An empty or invalid pattern
/// makes protection a no-op; the input text is returned untouched.
fn protect_skipped_lines(text: &str, pattern: &str) -> (String, Vec<(String, String)>) {
    if pattern.is_empty() {
        return (text.to_string(), Vec::new());
    }

    let re = match RegexBuilder::new(pattern).multi_line(true).build() {
        Ok(re) => re,
        // A malformed user pattern disables protection for this run
        Err(_) => return (text.to_string(), Vec::new()),
    };

    let mut protected = Vec::new();
    let kept: Vec<String> = text
        .lines()
        .enumerate()
        .map(|(i, line)| {
            if re.is_match(line) {
                let tag = skip_placeholder(i);
                protected.push((tag.clone(), line.to_string()));
                tag
            } else {
                line.to_string()
            }
        })
        .collect();

    if protected.is_empty() {
        return (text.to_string(), protected);
    }

    (kept.join("\n"), protected)
}

/// Swap every placeholder back for its original line.
fn restore_protected_lines(text: &str, protected: &[(String, String)]) -> String {
    let mut text = text.to_string();
    for (tag, line) in protected {
        text = text.replace(tag, line);
    }
    text
}

// ─────────────────────────────────────────────────────────────────────────────
// Break Insertion
// ─────────────────────────────────────────────────────────────────────────────

/// De-duplicate tokens and order them longest first, so a longer token is
/// never pre-empted by a shorter one it contains.
fn dedup_longest_first(tokens: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect();
    out.sort_unstable();
    out.dedup();
    out.sort_by_key(|t| std::cmp::Reverse(t.len()));
    out
}

fn break_replacement(token: &str, mode: BreakMode) -> String {
    match mode {
        BreakMode::Before => format!("\n{token}"),
        BreakMode::After => format!("{token}\n"),
        BreakMode::Around => format!("\n{token}\n"),
    }
}

/// Insert newlines at literal token occurrences.
///
/// Excluded substrings are swapped for placeholders first (longest first, so
/// a short exclusion cannot match inside a longer one), then each break
/// token is replaced, then the exclusions are restored. Exclusion therefore
/// takes precedence: an excluded substring never receives a break even when
/// it contains a break token.
fn insert_breaks_literal(
    text: &str,
    tokens: &[String],
    exclude_tokens: &[String],
    mode: BreakMode,
) -> String {
    if tokens.is_empty() {
        return text.to_string();
    }

    let mut text = text.to_string();

    let mut placeholders: Vec<(String, &str)> = Vec::new();
    for (i, excluded) in dedup_longest_first(exclude_tokens).into_iter().enumerate() {
        let tag = exclude_placeholder(i);
        text = text.replace(excluded, &tag);
        placeholders.push((tag, excluded));
    }

    for token in dedup_longest_first(tokens) {
        let replacement = break_replacement(token, mode);
        text = text.replace(token, &replacement);
    }

    for (tag, excluded) in placeholders {
        text = text.replace(&tag, excluded);
    }

    text
}

/// Insert newlines at regex pattern matches (multiline mode).
///
/// Patterns are de-duplicated and applied longest-pattern-first across the
/// whole text. A pattern that fails to compile is skipped silently; one bad
/// user-entered rule must not block the rest.
fn insert_breaks_regex(text: &str, patterns: &[String], mode: BreakMode) -> String {
    if patterns.is_empty() {
        return text.to_string();
    }

    let mut text = text.to_string();

    for pattern in dedup_longest_first(patterns) {
        let re = match RegexBuilder::new(pattern).multi_line(true).build() {
            Ok(re) => re,
            Err(_) => continue,
        };
        text = re
            .replace_all(&text, |caps: &regex::Captures| {
                break_replacement(&caps[0], mode)
            })
            .into_owned();
    }

    text
}

// ─────────────────────────────────────────────────────────────────────────────
// Line Decoration
// ─────────────────────────────────────────────────────────────────────────────

/// Prepend `prefix` and append `suffix` to every line, empty lines included.
fn add_prefix_suffix(text: &str, prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() && suffix.is_empty() {
        return text.to_string();
    }
    text.lines()
        .map(|line| format!("{prefix}{line}{suffix}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop every line whose content is empty or whitespace-only.
///
/// Runs on the decorated text: a line made non-blank by its prefix/suffix is
/// kept, a line whose decoration is itself only whitespace is still dropped.
fn remove_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Run the full transformation pipeline over `text`.
///
/// Stage order is fixed: width conversion, line protection, break insertion,
/// prefix/suffix decoration, optional blank-line removal, protection
/// restore. Malformed regexes in the skip pattern or break rules degrade to
/// no-ops inside their stage; this function does not fail.
fn process_text(text: &str, cfg: &TransformConfig) -> String {
    let text = apply_width_transform(text, cfg);

    let (text, protected) =
        protect_skipped_lines(&text, cfg.skip_line_pattern.as_deref().unwrap_or(""));

    let text = if cfg.break_tokens_are_regex {
        insert_breaks_regex(&text, &cfg.break_tokens, cfg.break_mode)
    } else {
        insert_breaks_literal(
            &text,
            &cfg.break_tokens,
            &cfg.break_exclude_tokens,
            cfg.break_mode,
        )
    };

    let text = add_prefix_suffix(&text, &cfg.line_prefix, &cfg.line_suffix);

    let text = if cfg.remove_blank_lines {
        remove_blank_lines(&text)
    } else {
        text
    };

    restore_protected_lines(&text, &protected)
}

// ─────────────────────────────────────────────────────────────────────────────
// Diff Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// One rendered diff line: its text and whether the line differs between the
/// two sides.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DiffLine {
    text: String,
    changed: bool,
}

impl DiffLine {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            changed: false,
        }
    }

    fn changed(text: &str) -> Self {
        Self {
            text: text.to_string(),
            changed: true,
        }
    }
}

/// Compute a line-level alignment of `original` and `transformed` and emit
/// two parallel marked sequences for side-by-side display.
///
/// Equal spans appear unmarked on both sides; deleted lines only on the
/// original side, inserted lines only on the transformed side, both marked;
/// replace spans are marked on both sides but are block-aligned only, not
/// line-aligned.
fn render_diff(original: &str, transformed: &str) -> (Vec<DiffLine>, Vec<DiffLine>) {
    let old_lines: Vec<&str> = original.lines().collect();
    let new_lines: Vec<&str> = transformed.lines().collect();
    let diff = TextDiff::from_slices(&old_lines, &new_lines);

    let mut left = Vec::new();
    let mut right = Vec::new();

    for op in diff.ops() {
        match op.tag() {
            DiffTag::Equal => {
                for i in op.old_range() {
                    left.push(DiffLine::unchanged(old_lines[i]));
                }
                for j in op.new_range() {
                    right.push(DiffLine::unchanged(new_lines[j]));
                }
            }
            DiffTag::Delete => {
                for i in op.old_range() {
                    left.push(DiffLine::changed(old_lines[i]));
                }
            }
            DiffTag::Insert => {
                for j in op.new_range() {
                    right.push(DiffLine::changed(new_lines[j]));
                }
            }
            DiffTag::Replace => {
                for i in op.old_range() {
                    left.push(DiffLine::changed(old_lines[i]));
                }
                for j in op.new_range() {
                    right.push(DiffLine::changed(new_lines[j]));
                }
            }
        }
    }

    (left, right)
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory Walking
// ─────────────────────────────────────────────────────────────────────────────

/// Built-in extension allow-list for batch mode, overridable with --ext.
static DEFAULT_TEXT_EXTS: &[&str] = &[
    ".txt", ".md", ".csv", ".tsv", ".log", ".json", ".jsonl", ".xml", ".yml", ".yaml", ".ini",
    ".cfg", ".conf", ".py", ".pyw", ".js", ".ts", ".tsx", ".jsx", ".html", ".htm", ".css",
    ".scss", ".less", ".bat", ".cmd", ".sh", ".ps1", ".rs", ".go", ".java", ".kt", ".c", ".h",
    ".cpp", ".hpp", ".cs", ".rb", ".php", ".pl", ".r", ".jl", ".lua",
];

/// Normalize an extension list to lowercase dot-prefixed form. An empty
/// input list falls back to the built-in allow-list.
fn normalize_extensions(exts: &[String]) -> HashSet<String> {
    let raw: Vec<&str> = if exts.is_empty() {
        DEFAULT_TEXT_EXTS.to_vec()
    } else {
        exts.iter().map(String::as_str).collect()
    };

    raw.into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| {
            let e = e.to_lowercase();
            if e.starts_with('.') { e } else { format!(".{e}") }
        })
        .collect()
}

/// Lazily enumerate files under `root` whose extension (case-insensitive) is
/// in `exts`. Without `recursive`, only direct children are yielded.
/// Enumeration order is deterministic (sorted by file name).
fn enumerate_target_files(
    root: &Path,
    exts: &HashSet<String>,
    recursive: bool,
) -> impl Iterator<Item = PathBuf> + use<> {
    let exts = exts.clone();
    let mut builder = WalkBuilder::new(root);
    // Enumeration is purely extension-driven; no gitignore or hidden-file
    // filtering applies here.
    builder
        .standard_filters(false)
        .sort_by_file_name(std::cmp::Ord::cmp);
    if !recursive {
        builder.max_depth(Some(1));
    }

    builder.build().filter_map(move |entry| {
        let entry = entry.ok()?;
        let path = entry.path();
        if !path.is_file() {
            return None;
        }
        let ext = path.extension()?.to_str()?.to_lowercase();
        if exts.contains(&format!(".{ext}")) {
            Some(path.to_path_buf())
        } else {
            None
        }
    })
}

/// Transform every qualifying file under `in_dir` into the mirrored relative
/// path under `out_dir`.
///
/// Cancellation is advisory and checked at file boundaries. A per-file read
/// or write failure skips that file and the batch continues. `on_progress`
/// fires exactly once per enumerated file, whether the file succeeded,
/// failed, or was the one at which cancellation was observed. Returns the
/// number of files successfully written.
fn process_directory(
    in_dir: &Path,
    out_dir: &Path,
    cfg: &TransformConfig,
    exts: &HashSet<String>,
    recursive: bool,
    mut on_progress: impl FnMut(&Path),
    is_canceled: impl Fn() -> bool,
) -> usize {
    let mut written = 0;

    for path in enumerate_target_files(in_dir, exts, recursive) {
        if is_canceled() {
            on_progress(&path);
            break;
        }

        let outcome = transform_one_file(&path, in_dir, out_dir, cfg);
        if outcome.is_ok() {
            written += 1;
        }
        on_progress(&path);
    }

    written
}

/// Read, transform, and write a single batch file. Batch reads decode
/// best-effort: undecodable bytes become replacement characters instead of
/// failing the file.
fn transform_one_file(
    path: &Path,
    in_dir: &Path,
    out_dir: &Path,
    cfg: &TransformConfig,
) -> io::Result<()> {
    let rel = path
        .strip_prefix(in_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));

    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let transformed = process_text(&content, cfg);

    let out_path = out_dir.join(rel);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&out_path, transformed)
}

// ─────────────────────────────────────────────────────────────────────────────
// Recursive File Discovery (in-place / multi-file mode)
// ─────────────────────────────────────────────────────────────────────────────

fn build_globset(patterns: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = 0;

    for raw in patterns.split(',') {
        let pattern = raw.trim();
        if pattern.is_empty() {
            continue;
        }

        let glob = Glob::new(pattern)
            .map_err(|err| ArgError(format!("Invalid glob pattern '{}': {}", pattern, err)))?;
        builder.add(glob);
        added += 1;
    }

    if added == 0 {
        return Err(ArgError("--glob must include at least one pattern".to_string()).into());
    }

    builder
        .build()
        .map_err(|err| ArgError(format!("Invalid glob set: {}", err)).into())
}

fn discover_recursive_files(
    paths: &[PathBuf],
    config: &Config,
    styles: &VerboseStyle,
) -> Result<Vec<PathBuf>> {
    let globs = build_globset(&config.glob)?;
    let mut files = std::collections::BTreeSet::new();

    for path in paths {
        if path.is_file() {
            files.insert(path.clone());
            continue;
        }

        if !path.is_dir() {
            if config.verbose {
                eprintln!(
                    "{}",
                    styles.dim(format!("Warning: path does not exist: {}", path.display()))
                );
            }
            continue;
        }

        let mut walker = WalkBuilder::new(path);
        walker.git_ignore(config.gitignore);
        walker.git_exclude(config.gitignore);
        walker.git_global(config.gitignore);
        walker.ignore(config.gitignore);
        walker.hidden(false);

        if config.max_depth > 0 {
            walker.max_depth(Some(config.max_depth));
        }

        for entry in walker.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if config.verbose {
                        eprintln!("{}", styles.dim(format!("Warning: {}", err)));
                    }
                    continue;
                }
            };

            let entry_path = entry.path();
            if entry_path.is_file() {
                if let Some(name) = entry_path.file_name() {
                    if globs.is_match(name) {
                        files.insert(entry_path.to_path_buf());
                    }
                }
            }
        }
    }

    Ok(files.into_iter().collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// File I/O
// ─────────────────────────────────────────────────────────────────────────────

/// Creates a backup of the file by appending the extension to the filename.
/// For example: "file.txt" with extension ".bak" becomes "file.txt.bak"
fn create_backup(path: &Path, ext: &str) -> Result<PathBuf> {
    let mut backup_name = path.as_os_str().to_owned();
    backup_name.push(ext);
    let backup_path = PathBuf::from(backup_name);

    fs::copy(path, &backup_path)
        .with_context(|| format!("Failed to create backup at {}", backup_path.display()))?;

    Ok(backup_path)
}

/// Maximum file size (100 MB) - reject larger files to prevent memory issues
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Read a single input file as UTF-8 text
fn read_file(path: &Path) -> Result<String> {
    // Check file size before reading
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read file metadata: {}", path.display()))?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(ParseError(format!(
            "File too large: {} ({} MB). Maximum supported size is {} MB.",
            path.display(),
            metadata.len() / (1024 * 1024),
            MAX_FILE_SIZE / (1024 * 1024)
        ))
        .into());
    }

    let source_label = path.display().to_string();
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))?;

    parse_bytes_to_text(bytes, &source_label)
}

/// Read content from stdin
fn read_stdin_content() -> Result<String> {
    let mut buf = Vec::new();
    io::stdin()
        .read_to_end(&mut buf)
        .context("Failed to read stdin")?;
    parse_bytes_to_text(buf, "stdin")
}

/// Convert raw bytes to text, checking for binary content and valid UTF-8.
///
/// Single-file inputs are strict; batch mode decodes lossily instead (see
/// [`transform_one_file`]).
fn parse_bytes_to_text(bytes: Vec<u8>, source_label: &str) -> Result<String> {
    if bytes.contains(&0) {
        return Err(ParseError(format!("Input appears to be binary: {}", source_label)).into());
    }

    String::from_utf8(bytes).map_err(|err| {
        let utf8_err = err.utf8_error();
        let valid_up_to = utf8_err.valid_up_to();
        let byte = err.as_bytes().get(valid_up_to).copied();
        let detail = match byte {
            Some(b) => format!(
                "Invalid UTF-8 at byte position {} (byte value: 0x{:02X}) in {}",
                valid_up_to, b, source_label
            ),
            None => format!("Invalid UTF-8 in {}", source_label),
        };
        ParseError(detail).into()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Single-Input Processing
// ─────────────────────────────────────────────────────────────────────────────

struct FileResult {
    filename: String,
    original: String,
    transformed: String,
    stats: Stats,
    would_change: bool,
}

/// Process a single input (file or stdin) and return the result
fn process_input(
    text: String,
    filename: String,
    config: &Config,
    styles: &VerboseStyle,
) -> FileResult {
    if config.verbose {
        eprintln!(
            "{}",
            styles.bold(format!(
                "Processing {} ({} lines)...",
                filename,
                text.lines().count()
            ))
        );
    }

    let start = Instant::now();
    let transformed = process_text(&text, &config.transform);
    let stats = Stats {
        lines_in: text.lines().count(),
        lines_out: transformed.lines().count(),
        elapsed: start.elapsed(),
    };
    let would_change = transformed != text;

    FileResult {
        filename,
        original: text,
        transformed,
        stats,
        would_change,
    }
}

/// Append a trailing newline to non-empty output, per Unix text convention
fn with_trailing_newline(text: &str) -> String {
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Output a unified diff for a file result
fn output_diff(result: &FileResult, proposed: bool) -> Result<()> {
    if !result.would_change {
        return Ok(());
    }

    let diff = TextDiff::from_lines(&result.original, &result.transformed);
    let mut stdout = io::stdout().lock();

    writeln!(stdout, "--- a/{}", result.filename)?;
    if proposed {
        writeln!(stdout, "+++ b/{} (proposed)", result.filename)?;
    } else {
        writeln!(stdout, "+++ b/{}", result.filename)?;
    }

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        writeln!(stdout, "{}", hunk.header())?;
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            let line = change.value();
            if line.ends_with('\n') {
                write!(stdout, "{}{}", sign, line)?;
            } else {
                writeln!(stdout, "{}{}", sign, line)?;
            }
        }
    }

    Ok(())
}

/// Output the original and transformed text side by side, changed lines
/// marked with `~` in the gutter. Blank lines still occupy a full row.
fn output_side_by_side(result: &FileResult) -> Result<()> {
    let (left, right) = render_diff(&result.original, &result.transformed);

    let width = left
        .iter()
        .map(|l| l.text.chars().count())
        .max()
        .unwrap_or(0)
        .max(8);
    let rows = left.len().max(right.len());

    let mut stdout = io::stdout().lock();
    for i in 0..rows {
        let (left_mark, left_text) = match left.get(i) {
            Some(line) => (if line.changed { '~' } else { ' ' }, line.text.as_str()),
            None => (' ', ""),
        };
        let (right_mark, right_text) = match right.get(i) {
            Some(line) => (if line.changed { '~' } else { ' ' }, line.text.as_str()),
            None => (' ', ""),
        };
        writeln!(
            stdout,
            "{left_mark} {left_text:<width$} | {right_mark} {right_text}"
        )?;
    }

    Ok(())
}

/// Output JSON for a single file result
fn output_json_single(args: &Args, config: &Config, result: &FileResult) -> Result<()> {
    let transformed = with_trailing_newline(&result.transformed);

    let json_output = JsonOutput {
        version: "1.0",
        status: if config.dry_run {
            "dry_run".to_string()
        } else {
            "success".to_string()
        },
        file: if result.filename == "stdin" {
            None
        } else {
            Some(result.filename.clone())
        },
        input: IoStats {
            lines: result.stats.lines_in,
            bytes: result.original.len(),
        },
        output: IoStats {
            lines: result.stats.lines_out,
            bytes: transformed.len(),
        },
        changed: result.would_change,
        content: if !config.dry_run && !args.in_place {
            Some(transformed.clone())
        } else {
            None
        },
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json_output).context("Failed to serialize JSON output")?
    );

    // If in-place mode with JSON, still write the file
    if args.in_place {
        if let Some(path) = args.inputs.first() {
            if config.backup {
                create_backup(path, &config.backup_ext)?;
            }
            fs::write(path, &transformed)
                .with_context(|| format!("Failed to write to file: {}", path.display()))?;
        }
    }

    Ok(())
}

/// Output dry-run info for a single file
fn output_dry_run_single(
    config: &Config,
    styles: &VerboseStyle,
    result: &FileResult,
) -> Result<()> {
    if config.diff && result.would_change {
        output_diff(result, true)?;
    }

    if config.verbose {
        if result.would_change {
            eprintln!(
                "{}",
                styles.warn(format!("Would modify: {}", result.filename))
            );
            eprintln!(
                "{}",
                styles.dim(format!(
                    "  {} line(s) in, {} line(s) out",
                    result.stats.lines_in, result.stats.lines_out
                ))
            );
        } else {
            eprintln!(
                "{}",
                styles.success(format!("No changes needed: {}", result.filename))
            );
        }
    }

    Ok(())
}

/// Handle output for a single file/stdin result
fn output_single_result(
    args: &Args,
    config: &Config,
    styles: &VerboseStyle,
    result: FileResult,
) -> Result<RunOutcome> {
    let would_change = result.would_change;

    if config.json {
        output_json_single(args, config, &result)?;
    } else if config.dry_run {
        output_dry_run_single(config, styles, &result)?;
    } else if config.diff {
        output_diff(&result, false)?;
    } else if config.side_by_side {
        output_side_by_side(&result)?;
    } else if args.in_place {
        // Must have a file path for in-place
        let path = args
            .inputs
            .first()
            .ok_or_else(|| ArgError("--in-place requires an input file".to_string()))?;

        if config.backup {
            let backup_path = create_backup(path, &config.backup_ext)?;
            if config.verbose {
                eprintln!(
                    "{}",
                    styles.dim(format!("Created backup: {}", backup_path.display()))
                );
            }
        }

        fs::write(path, with_trailing_newline(&result.transformed))
            .with_context(|| format!("Failed to write to file: {}", path.display()))?;
    } else {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}", with_trailing_newline(&result.transformed))?;
    }

    // Print summary in verbose mode for single file
    if config.verbose {
        print_stats_summary(&result.stats, 1, usize::from(would_change), 0, styles);
    }

    Ok(RunOutcome {
        dry_run: config.dry_run,
        would_change,
    })
}

/// Handle output for multiple files
fn output_multiple_results(
    args: &Args,
    config: &Config,
    styles: &VerboseStyle,
    paths: &[PathBuf],
) -> Result<RunOutcome> {
    let mut total_files_processed = 0;
    let mut total_files_changed = 0;
    let mut aggregated_stats = Stats::default();
    let mut any_would_change = false;
    let mut errors: Vec<(PathBuf, anyhow::Error)> = Vec::new();

    let show_file_headers =
        !args.in_place && !config.diff && !config.side_by_side && !config.json && paths.len() > 1;

    for path in paths {
        match read_file(path) {
            Ok(text) => {
                let result = process_input(text, path.display().to_string(), config, styles);

                if result.would_change {
                    any_would_change = true;
                    total_files_changed += 1;
                }
                total_files_processed += 1;
                aggregated_stats.merge(&result.stats);

                // Handle output based on mode
                if config.json {
                    // For JSON with multiple files, output each file's JSON separately
                    output_json_single(args, config, &result)?;
                } else if config.dry_run {
                    output_dry_run_single(config, styles, &result)?;
                } else if config.diff {
                    output_diff(&result, false)?;
                } else if config.side_by_side {
                    output_side_by_side(&result)?;
                } else if args.in_place {
                    if config.backup {
                        let backup_path = create_backup(path, &config.backup_ext)?;
                        if config.verbose {
                            eprintln!(
                                "{}",
                                styles.dim(format!("Created backup: {}", backup_path.display()))
                            );
                        }
                    }

                    fs::write(path, with_trailing_newline(&result.transformed))
                        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

                    if config.verbose {
                        if result.would_change {
                            eprintln!(
                                "{}",
                                styles.success(format!(
                                    "{}: {} line(s) in, {} line(s) out",
                                    path.display(),
                                    result.stats.lines_in,
                                    result.stats.lines_out
                                ))
                            );
                        } else {
                            eprintln!(
                                "{}",
                                styles.dim(format!("{}: No changes needed", path.display()))
                            );
                        }
                    }
                } else {
                    // Stdout mode - concatenate output with file headers
                    let mut stdout = io::stdout().lock();

                    if show_file_headers {
                        writeln!(stdout, "==> {} <==", path.display())?;
                    }

                    write!(stdout, "{}", with_trailing_newline(&result.transformed))?;

                    if show_file_headers {
                        writeln!(stdout)?; // Blank line between files
                    }
                }
            }
            Err(e) => {
                eprintln!("Error processing {}: {:#}", path.display(), e);
                errors.push((path.clone(), e));
            }
        }
    }

    // Print summary in verbose mode
    if config.verbose {
        print_stats_summary(
            &aggregated_stats,
            total_files_processed,
            total_files_changed,
            errors.len(),
            styles,
        );
    }

    // If any files had errors, report them
    if !errors.is_empty() {
        let files = errors
            .iter()
            .map(|(p, _)| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let has_parse_error = errors
            .iter()
            .any(|(_, err)| error_chain_has::<ParseError>(err));

        if has_parse_error {
            return Err(ParseError(format!(
                "{} file(s) had parse errors: {}",
                errors.len(),
                files
            ))
            .into());
        }

        anyhow::bail!("{} file(s) had errors: {}", errors.len(), files);
    }

    Ok(RunOutcome {
        dry_run: config.dry_run,
        would_change: any_would_change,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Mirror-transform a directory tree into --out-dir
fn run_batch(
    config: &Config,
    input: &Path,
    out_dir: &Path,
    styles: &VerboseStyle,
) -> Result<RunOutcome> {
    if !input.is_dir() {
        return Err(ArgError(format!(
            "--out-dir requires a directory input, got: {}",
            input.display()
        ))
        .into());
    }

    // Ctrl+C cancels at the next file boundary
    let canceled = Arc::new(AtomicBool::new(false));
    let flag = canceled.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let exts = normalize_extensions(&config.exts);
    let start = Instant::now();
    let mut enumerated = 0usize;

    let written = process_directory(
        input,
        out_dir,
        &config.transform,
        &exts,
        config.recursive,
        |path| {
            enumerated += 1;
            if config.verbose {
                eprintln!("{}", styles.dim(format!("  {}", path.display())));
            }
        },
        || canceled.load(Ordering::SeqCst),
    );

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    eprintln!(
        "{}",
        styles.success(format!(
            "{} of {} file(s) written to {} in {:.2}ms",
            written,
            enumerated,
            out_dir.display(),
            elapsed_ms
        ))
    );

    if canceled.load(Ordering::SeqCst) {
        eprintln!("{}", styles.warn("Canceled."));
    }

    Ok(RunOutcome {
        dry_run: false,
        would_change: written > 0,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Watch a file for changes and reformat it in place on each save
fn watch_and_transform(path: &Path, config: &Config, styles: &VerboseStyle) -> Result<RunOutcome> {
    // Validate that the file exists and is readable
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    if !path.is_file() {
        anyhow::bail!(
            "--watch requires a file, not a directory: {}",
            path.display()
        );
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    // Set up file watcher
    let (tx, rx) = mpsc::channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        notify::Config::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch file: {}", path.display()))?;

    let debounce = Duration::from_millis(config.debounce_ms);
    let mut last_event = Instant::now() - debounce; // Allow immediate first run

    eprintln!(
        "Watching {} for changes (Ctrl+C to stop)...",
        path.display()
    );

    let mut any_changes = false;

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                // Only process file modification events
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    let now = Instant::now();
                    if now.duration_since(last_event) >= debounce {
                        last_event = now;

                        // Re-read and process the file
                        match read_file(path) {
                            Ok(text) => {
                                let result = process_input(
                                    text,
                                    path.display().to_string(),
                                    config,
                                    styles,
                                );

                                if result.would_change {
                                    let output = with_trailing_newline(&result.transformed);
                                    match fs::write(path, &output) {
                                        Ok(()) => {
                                            eprintln!(
                                                "✓ Reformatted ({} -> {} lines)",
                                                result.stats.lines_in, result.stats.lines_out
                                            );
                                            any_changes = true;
                                        }
                                        Err(e) => {
                                            eprintln!("✗ Failed to write: {}", e);
                                        }
                                    }
                                } else {
                                    eprintln!("✓ No changes needed");
                                }
                            }
                            Err(e) => {
                                eprintln!("✗ Error reading file: {}", e);
                            }
                        }
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Just continue waiting
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Watcher disconnected, exit
                break;
            }
        }
    }

    eprintln!("\nWatch mode stopped.");

    Ok(RunOutcome {
        dry_run: false,
        would_change: any_changes,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry Point
// ─────────────────────────────────────────────────────────────────────────────

/// Run a subcommand
fn run_command(command: &Commands) -> Result<()> {
    match command {
        Commands::Config { action } => run_config_command(action),
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::INVALID_ARGS,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    // Handle subcommands first
    if let Some(command) = &args.command {
        let exit_code = match run_command(command) {
            Ok(()) => exit_codes::SUCCESS,
            Err(err) => {
                eprintln!("Error: {:#}", err);
                exit_code_for_error(&err)
            }
        };
        std::process::exit(exit_code);
    }

    let exit_code = match run(args) {
        Ok(outcome) => {
            if outcome.dry_run && outcome.would_change {
                exit_codes::WOULD_CHANGE
            } else {
                exit_codes::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            exit_code_for_error(&err)
        }
    };

    std::process::exit(exit_code);
}

fn run(args: Args) -> Result<RunOutcome> {
    validate_args(&args)?;

    let config = create_config(&args)?;
    let styles = build_styles(config.color);

    // Watch mode - validate_args guarantees exactly one input
    if config.watch {
        let path = &args.inputs[0];
        return watch_and_transform(path, &config, &styles);
    }

    // Batch mode - mirror a directory tree into --out-dir
    if let Some(out_dir) = &config.out_dir {
        let out_dir = out_dir.clone();
        let input = &args.inputs[0];
        return run_batch(&config, input, &out_dir, &styles);
    }

    if config.recursive {
        let files = discover_recursive_files(&args.inputs, &config, &styles)?;
        if files.is_empty() {
            let message = format!(
                "Warning: No files matched pattern '{}' in provided paths",
                config.glob
            );
            if config.verbose {
                eprintln!("{}", styles.dim(message));
            } else {
                eprintln!("{}", message);
            }
            return Ok(RunOutcome {
                dry_run: config.dry_run,
                would_change: false,
            });
        }

        return output_multiple_results(&args, &config, &styles, &files);
    }

    // Determine if we're processing stdin or files
    if args.inputs.is_empty() {
        // Stdin mode - single input
        let text = read_stdin_content()?;
        let result = process_input(text, "stdin".to_string(), &config, &styles);
        output_single_result(&args, &config, &styles, result)
    } else if args.inputs.len() == 1 {
        // Single file mode
        let path = &args.inputs[0];
        let text = read_file(path)?;
        let result = process_input(text, path.display().to_string(), &config, &styles);
        output_single_result(&args, &config, &styles, result)
    } else {
        // Multiple file mode
        output_multiple_results(&args, &config, &styles, &args.inputs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
