//! Page Compiler CLI
//!
//! Usage:
//!   page-compiler [OPTIONS] <COMMAND>
//!
//! Commands:
//!   compile      Validate and compile a layout without touching a document
//!   create-page  Create a new page in a document snapshot
//!   set-layout   Replace the layout of an existing page
//!   inspect      Show the layout of a page as a declarative tree
//!   grammar      Show the layout JSON reference
//!
//! Options:
//!   -c, --config <FILE>  Service configuration (TOML format)
//!   -v, --verbose        Log progress to stderr (repeat for more detail)
//!   -h, --help           Print help

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::Level;

use page_compiler::backend::MemoryDocument;
use page_compiler::layout::{compile, validate_json, ValidationMode};
use page_compiler::{
    compile_and_create_page, compile_and_set_layout, decompile_layout, parse_json, PageError, PageSelector,
    ServiceConfig, WidgetSelector,
};

#[derive(Parser)]
#[command(name = "page-compiler")]
#[command(about = "Compile declarative page layouts into document actions")]
struct Cli {
    /// Service configuration file (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log progress to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and compile a layout without touching a document
    Compile {
        /// Layout file (reads from stdin if not provided)
        input: Option<PathBuf>,

        /// Validate for a new page instead of an existing one
        #[arg(long)]
        new_page: bool,
    },

    /// Create a new page in a document snapshot
    CreatePage {
        /// Document snapshot (JSON), updated in place
        #[arg(long)]
        doc: PathBuf,

        /// Name of the new page
        #[arg(long)]
        name: String,

        /// Layout file (reads from stdin if not provided)
        input: Option<PathBuf>,
    },

    /// Replace the layout of an existing page
    SetLayout {
        /// Document snapshot (JSON), updated in place
        #[arg(long)]
        doc: PathBuf,

        /// Page id or name; prefix with `name:` for all-digit names or `id:` to force an id
        #[arg(long)]
        page: PageSelector,

        /// Widget id or title to delete from the page; prefix with `title:` for
        /// all-digit titles or `id:` to force an id
        #[arg(long = "remove")]
        remove: Vec<WidgetSelector>,

        /// Layout file (reads from stdin if not provided)
        input: Option<PathBuf>,
    },

    /// Show the layout of a page as a declarative tree
    Inspect {
        /// Document snapshot (JSON)
        #[arg(long)]
        doc: PathBuf,

        /// Page id or name; prefix with `name:` for all-digit names or `id:` to force an id
        #[arg(long)]
        page: PageSelector,
    },

    /// Show the layout JSON reference
    Grammar,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => match ServiceConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ServiceConfig::default(),
    };

    match cli.command {
        Command::Compile { input, new_page } => run_compile(input.as_deref(), new_page, &config),
        Command::CreatePage { doc, name, input } => {
            let layout = read_layout(input.as_deref());
            let document = load_document(&doc);
            let result = compile_and_create_page(&document, &name, &layout, &config).await;
            save_document(&document, &doc);
            finish(result);
        }
        Command::SetLayout {
            doc,
            page,
            remove,
            input,
        } => {
            let layout = read_layout(input.as_deref());
            let document = load_document(&doc);
            let result = compile_and_set_layout(&document, &page, &layout, &remove, &config).await;
            save_document(&document, &doc);
            finish(result);
        }
        Command::Inspect { doc, page } => {
            let document = load_document(&doc);
            finish(decompile_layout(&document, &page).await);
        }
        Command::Grammar => print_grammar(),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_compile(input: Option<&Path>, new_page: bool, config: &ServiceConfig) {
    let layout = read_layout(input);
    let mode = if new_page {
        ValidationMode::CreatePage
    } else {
        ValidationMode::ModifyPage
    };

    let validated = match validate_json(&layout, &config.limits, mode) {
        Ok(v) => v,
        Err(errors) => fail(PageError::Validation(errors)),
    };
    let titles = validated.titles();
    if !titles.is_empty() {
        eprintln!(
            "Error: widget titles need a document to resolve ({}); use numeric ids with compile",
            titles.join(", ")
        );
        std::process::exit(1);
    }

    let compiled = match compile(&validated, &config.limits) {
        Ok(c) => c,
        Err(e) => fail(PageError::Compile(e)),
    };
    let creation_order: Vec<Value> = validated
        .new_widgets
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            json!({
                "placeholder": i,
                "table": spec.table,
                "widget_type": spec.kind,
                "title": spec.title,
                "chart_type": spec.chart_kind,
            })
        })
        .collect();
    print_json(&json!({
        "layout": compiled.root.to_json(),
        "new_widgets": creation_order,
        "existing_widgets": validated.existing_ids(),
    }));
}

/// Read and parse the layout, printing a source diagnostic on bad JSON
fn read_layout(input: Option<&Path>) -> Value {
    let (source, filename) = match input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, path.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, "<stdin>".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    match parse_json(&source) {
        Ok(value) => value,
        Err(e) => {
            eprint!("{}", e.format(&source, &filename));
            std::process::exit(1);
        }
    }
}

fn load_document(path: &Path) -> MemoryDocument {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading document '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    };
    match MemoryDocument::from_json(&content) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error parsing document '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Write the document back. Runs on failure too: partial work is real.
fn save_document(document: &MemoryDocument, path: &Path) {
    let written = document
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|json| fs::write(path, json).map_err(|e| e.to_string()));
    if let Err(e) = written {
        eprintln!("Error writing document '{}': {}", path.display(), e);
        std::process::exit(1);
    }
}

fn finish<T: Serialize>(result: Result<T, PageError>) {
    match result {
        Ok(output) => print_json(&output),
        Err(e) => fail(e),
    }
}

fn fail(error: PageError) -> ! {
    eprintln!("Error: {}", error);
    if error.widgets_created() > 0 {
        eprintln!(
            "note: {} widget(s) were created and remain on the page without a layout",
            error.widgets_created()
        );
    }
    std::process::exit(1);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_grammar() {
    println!(
        r#"PAGE LAYOUT REFERENCE
=====================

A layout is a JSON tree. Every node is exactly one of:

EXISTING WIDGET
---------------
{{ "existing_widget": 12 }}           By id
{{ "existing_widget": "Sales chart" }} By title on the target page

NEW WIDGET
----------
{{ "new_widget": {{
    "table": "Sales",                 Table the widget shows (required)
    "widget_type": "chart",           grid | card | card_list | chart | form | custom
    "title": "Monthly sales",         Optional
    "chart_type": "bar",              Charts only, required for charts:
                                      bar | line | pie | area | scatter | donut | kaplan_meier
    "chart_options": {{ ... }},         Charts only
    "x_axis": "Month",                Charts only, column name
    "y_axis": ["Total"]               Charts only, column names
}} }}

SPLIT
-----
{{ "split": "horizontal",              horizontal | vertical
   "ratio": 0.3,                      Share of the first child, 0 < ratio < 1 (default 0.5)
   "children": [ ... ] }}               2 to 10 children

RULES
-----
- At most 8 levels of nesting and 50 new widgets (see --config)
- A widget may appear only once
- create-page layouts need at least one new widget and no existing ones
- set-layout must place every widget on the page or list it with --remove"#
    );
}
