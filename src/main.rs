//! product-dashboard CLI - rank product categories by count, photos and volume
//!

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor, EditMode};

use product_dashboard::dashboard::render::{
    DEFAULT_BAR_WIDTH, render_json, render_table, render_text,
};
use product_dashboard::dashboard::{
    DEFAULT_DATA_PATH, Dashboard, DashboardConfig, DashboardFrame, DataSession,
};
use product_dashboard::product::{DEFAULT_TOP_N, DashboardError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Horizontal bar charts
    Text,
    /// One table per chart
    Table,
    /// Machine-readable frame
    Json,
}

/// Product category dashboard
#[derive(Parser, Debug)]
#[command(name = "product-dashboard")]
#[command(version)]
#[command(about = "Rank product categories by product count, average photo count and average volume")]
#[command(
    long_about = "Loads a product CSV, drops rows missing any required field, derives\n\
volume_cm3 = length * height * width and prints the top categories for three metrics.\n\n\
REQUIRED COLUMNS:\n\
  product_category_name_english, product_length_cm, product_height_cm,\n\
  product_width_cm, product_photos_qty\n\n\
EXAMPLES:\n\
  product-dashboard -d data/products.csv                     All categories\n\
  product-dashboard -c toys -c books --format table          Two categories as tables\n\
  product-dashboard -i                                       Interactive selection"
)]
struct Args {
    /// Product CSV file
    #[arg(short = 'd', long = "data", env = "PRODUCT_DASHBOARD_DATA", default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,

    /// Restrict charts to this category (repeatable); all categories when omitted
    #[arg(short = 'c', long = "category")]
    categories: Vec<String>,

    /// Number of bars per chart
    #[arg(short = 'n', long = "top", default_value_t = DEFAULT_TOP_N)]
    top: usize,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Length of the longest bar in text output
    #[arg(short = 'w', long = "width", default_value_t = DEFAULT_BAR_WIDTH)]
    width: usize,

    /// Start an interactive session for changing the selection
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Nothing is rendered once loading fails
            eprintln!("\x1b[1;31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn run(args: Args) -> Result<(), DashboardError> {
    let config = DashboardConfig {
        data_path: args.data.clone(),
        top_n: args.top,
        select_all: args.categories.is_empty(),
        ..DashboardConfig::default()
    };
    let session = DataSession::new(config);
    let mut dashboard = Dashboard::open(&session)?;

    let frame = if args.categories.is_empty() {
        dashboard.frame()
    } else {
        dashboard.set_categories(args.categories.clone())
    };

    if args.interactive {
        let mut cli = Cli::new(session, dashboard, args.format, args.width)?;
        cli.print_frame(&frame)?;
        cli.run()
    } else {
        print_frame(&frame, args.format, args.width)
    }
}

fn print_frame(
    frame: &DashboardFrame,
    format: OutputFormat,
    width: usize,
) -> Result<(), DashboardError> {
    match format {
        OutputFormat::Text => print!("{}", render_text(frame, width)),
        OutputFormat::Table => print!("{}", render_table(frame)),
        OutputFormat::Json => println!("{}", render_json(frame)?),
    }
    Ok(())
}

/// Interactive session: every selection command recomputes and re-renders
struct Cli {
    session: DataSession,
    dashboard: Dashboard,
    format: OutputFormat,
    width: usize,
    editor: DefaultEditor,
}

impl Cli {
    fn new(
        session: DataSession,
        dashboard: Dashboard,
        format: OutputFormat,
        width: usize,
    ) -> Result<Self, DashboardError> {
        let config = Config::builder()
            .history_ignore_space(true)
            .edit_mode(EditMode::Emacs)
            .build();
        let editor =
            DefaultEditor::with_config(config).map_err(|e| io::Error::other(e.to_string()))?;

        Ok(Self {
            session,
            dashboard,
            format,
            width,
            editor,
        })
    }

    fn run(&mut self) -> Result<(), DashboardError> {
        println!("Enter 'help' for commands or 'exit' to quit.");

        loop {
            let line = match self.editor.readline("\x1b[1;36mdashboard>\x1b[0m ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(io::Error::other(e.to_string()).into()),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let _ = self.editor.add_history_entry(line);

            let mut words = line.split_whitespace();
            let command = words.next().unwrap_or_default().to_lowercase();
            let operands: Vec<String> = words.map(str::to_string).collect();

            let frame = match command.as_str() {
                "exit" | "quit" | "\\q" => break,
                "help" | "\\h" | "\\?" => {
                    print_help();
                    continue;
                }
                "categories" => {
                    self.print_categories();
                    continue;
                }
                "format" => {
                    match operands.first().map(|s| OutputFormat::from_str(s, true)) {
                        Some(Ok(format)) => self.format = format,
                        _ => eprintln!("usage: format text|table|json"),
                    }
                    continue;
                }
                "all" => self.dashboard.set_select_all(true),
                "none" => self.dashboard.set_select_all(false),
                "select" => {
                    self.warn_unknown(&operands);
                    self.dashboard.set_categories(operands)
                }
                "add" | "remove" => {
                    let Some(category) = operands.first() else {
                        eprintln!("usage: {command} <category>");
                        continue;
                    };
                    let selected = self.dashboard.selection().contains(category);
                    if selected == (command == "add") {
                        println!("'{category}' is already {}", if selected { "selected" } else { "not selected" });
                        continue;
                    }
                    self.warn_unknown(&operands[..1]);
                    self.dashboard.toggle_category(category)
                }
                "show" => self.dashboard.frame(),
                "reload" => {
                    self.session.clear_cache();
                    let table = self.session.table()?;
                    println!("Reloaded {} rows", table.row_count());
                    self.dashboard.replace_table(table)
                }
                other => {
                    eprintln!("Unknown command '{other}', try 'help'");
                    continue;
                }
            };

            self.print_frame(&frame)?;
        }

        Ok(())
    }

    fn print_frame(&self, frame: &DashboardFrame) -> Result<(), DashboardError> {
        print_frame(frame, self.format, self.width)
    }

    fn print_categories(&self) {
        let selection = self.dashboard.selection();
        for category in self.dashboard.all_categories() {
            let mark = if selection.contains(category) { 'x' } else { ' ' };
            println!("[{mark}] {category}");
        }
    }

    fn warn_unknown(&self, categories: &[String]) {
        let known = self.dashboard.all_categories();
        for category in categories {
            if !known.contains(category) {
                eprintln!("\x1b[1;33mWarning:\x1b[0m unknown category '{category}'");
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  categories           List categories, [x] marks the selection");
    println!("  all                  Select all categories");
    println!("  none                 Clear the selection");
    println!("  select <c> [<c>...]  Select exactly these categories");
    println!("  add <c>              Add a category to the selection");
    println!("  remove <c>           Remove a category from the selection");
    println!("  show                 Render the charts again");
    println!("  format <f>           Switch output: text, table or json");
    println!("  reload               Re-read the data file");
    println!("  exit, quit           Leave");
}
