use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use gridcalc_common::{LiteralValue, Reference, parse_reference};
use gridcalc_eval::{Engine, EvalConfig, Workbook, function_registry};

mod workbook_file;

use workbook_file::WorkbookFile;

#[derive(Parser, Debug)]
#[command(name = "gridcalc", version, about = "Evaluate spreadsheet formulas")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one formula, optionally against a JSON workbook.
    Eval(EvalArgs),
    /// Recalculate a JSON workbook and print the formula cells.
    Calc(CalcArgs),
    /// List the built-in functions.
    Functions,
}

#[derive(Args, Debug)]
struct Settings {
    /// Comparison rules: excel or openoffice.
    #[arg(long, default_value = "excel")]
    compat: String,

    /// Date system: 1900 or 1904.
    #[arg(long, default_value = "1900")]
    calendar: String,

    /// Shape of date results: excel, numeric or object.
    #[arg(long = "date-type", default_value = "excel")]
    date_type: String,

    /// IANA zone that numeric date results are computed in.
    #[arg(long, default_value = "UTC")]
    timezone: String,

    /// Worker threads; 1 evaluates on the calling thread.
    #[arg(long)]
    threads: Option<usize>,
}

impl Settings {
    fn config(&self) -> Result<EvalConfig> {
        let mut config = EvalConfig::default();
        if !config.set_compatibility_mode(&self.compat) {
            bail!("unknown compatibility mode `{}`", self.compat);
        }
        if !config.set_calendar(&self.calendar) {
            bail!("unknown calendar `{}`", self.calendar);
        }
        if !config.set_return_date_type(&self.date_type) {
            bail!("unknown date type `{}`", self.date_type);
        }
        if !config.set_timezone(&self.timezone) {
            bail!("unknown timezone `{}`", self.timezone);
        }
        Ok(match self.threads {
            Some(1) => config.with_parallel(false),
            threads => config.with_max_threads(threads),
        })
    }
}

#[derive(Args, Debug)]
struct EvalArgs {
    /// The formula, with or without a leading `=`.
    formula: String,

    /// JSON workbook the formula reads from.
    #[arg(long)]
    workbook: Option<PathBuf>,

    /// Cell the formula is evaluated from, e.g. `Sheet1!B2`.
    #[arg(long, default_value = "A1")]
    origin: String,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Args, Debug)]
struct CalcArgs {
    /// JSON workbook to recalculate.
    workbook: PathBuf,

    /// Only print these cells, e.g. `Sheet1!C3`. May be repeated.
    #[arg(long = "cell", value_delimiter = ',')]
    cells: Vec<String>,

    #[command(flatten)]
    settings: Settings,
}

fn main() -> Result<()> {
    #[cfg(feature = "tracing")]
    init_tracing();

    match Cli::parse().command {
        Command::Eval(args) => eval(args),
        Command::Calc(args) => calc(args),
        Command::Functions => {
            gridcalc_eval::builtins::load_builtins();
            for name in function_registry::names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn eval(args: EvalArgs) -> Result<()> {
    let config = args.settings.config()?;
    let engine = match &args.workbook {
        Some(path) => WorkbookFile::read(path)?.into_engine(config)?,
        None => Engine::new(Workbook::with_sheets(["Sheet1"]), config),
    };
    let formula = if args.formula.starts_with('=') {
        args.formula.clone()
    } else {
        format!("={}", args.formula)
    };
    let value = engine
        .evaluate(&formula, &args.origin)
        .with_context(|| format!("evaluating {formula}"))?;
    println!("{}", render(&value));
    Ok(())
}

fn calc(args: CalcArgs) -> Result<()> {
    let engine = WorkbookFile::read(&args.workbook)?.into_engine(args.settings.config()?)?;

    if args.cells.is_empty() {
        let summary = engine.evaluate_all()?;
        for (_, sheet) in engine.workbook().sheets() {
            for (row, col, _) in sheet.formula_cells() {
                let value = engine.evaluate_cell(sheet.name(), row, col)?;
                println!(
                    "{}!{}{row}\t{}",
                    sheet.name(),
                    gridcalc_common::column_to_letters(col),
                    render(&value)
                );
            }
        }
        eprintln!(
            "{} cells evaluated, {} circular, {:?}",
            summary.evaluated, summary.cycle_errors, summary.elapsed
        );
        return Ok(());
    }

    let targets = args
        .cells
        .iter()
        .map(|cell| target(&engine, cell))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<(&str, u32, u32)> = targets
        .iter()
        .map(|(sheet, row, col)| (sheet.as_str(), *row, *col))
        .collect();
    let values = engine.evaluate_cells(&refs)?;
    for (cell, value) in args.cells.iter().zip(values) {
        println!("{cell}\t{}", render(&value));
    }
    Ok(())
}

/// `Sheet!A1`, or `A1` on the first sheet.
fn target(engine: &Engine, cell: &str) -> Result<(String, u32, u32)> {
    match parse_reference(cell).with_context(|| format!("bad cell `{cell}`"))? {
        Reference::Cell(c) => {
            let sheet = match c.sheet {
                Some(name) => name,
                None => engine
                    .workbook()
                    .sheet_names()
                    .first()
                    .map(|s| s.to_string())
                    .context("workbook has no sheets")?,
            };
            Ok((sheet, c.row, c.col))
        }
        Reference::Range(_) => bail!("`{cell}` is a range, expected a single cell"),
    }
}

fn render(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Array(rows) => rows
            .iter()
            .map(|row| row.iter().map(render).collect::<Vec<_>>().join("\t"))
            .collect::<Vec<_>>()
            .join("\n"),
        LiteralValue::Number(n) => gridcalc_eval::coercion::format_number(*n),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(compat: &str, calendar: &str, threads: Option<usize>) -> Settings {
        Settings {
            compat: compat.into(),
            calendar: calendar.into(),
            date_type: "excel".into(),
            timezone: "UTC".into(),
            threads,
        }
    }

    #[test]
    fn settings_become_config() {
        let config = settings("openoffice", "1904", Some(1)).config().unwrap();
        assert_eq!(
            config.compatibility,
            gridcalc_eval::CompatibilityMode::OpenOffice
        );
        assert_eq!(config.calendar, gridcalc_common::Calendar::Mac1904);
        assert!(!config.enable_parallel);

        assert!(settings("lotus", "1900", None).config().is_err());
        assert!(settings("excel", "1901", None).config().is_err());

        let mut zoned = settings("excel", "1900", None);
        zoned.timezone = "Etc/GMT+10".into();
        assert!(zoned.config().is_err());
        zoned.timezone = "Europe/Prague".into();
        assert_eq!(zoned.config().unwrap().timezone.name(), "Europe/Prague");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "gridcalc", "eval", "SUM(1,2)", "--origin", "Sheet1!B2", "--compat", "openoffice",
        ])
        .unwrap();
        match cli.command {
            Command::Eval(args) => {
                assert_eq!(args.formula, "SUM(1,2)");
                assert_eq!(args.origin, "Sheet1!B2");
                assert_eq!(args.settings.compat, "openoffice");
            }
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::try_parse_from(["gridcalc", "calc", "book.json", "--cell", "A1,S!B2"]).unwrap();
        match cli.command {
            Command::Calc(args) => assert_eq!(args.cells, vec!["A1", "S!B2"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn targets_default_to_first_sheet() {
        let engine = Engine::new(
            Workbook::with_sheets(["First", "Second"]),
            EvalConfig::default().with_parallel(false),
        );
        assert_eq!(target(&engine, "B3").unwrap(), ("First".to_string(), 3, 2));
        assert_eq!(
            target(&engine, "Second!A1").unwrap(),
            ("Second".to_string(), 1, 1)
        );
        assert!(target(&engine, "A1:B2").is_err());
    }

    #[test]
    fn renders_general_numbers_and_arrays() {
        assert_eq!(render(&LiteralValue::Number(0.1 + 0.2)), "0.3");
        assert_eq!(
            render(&LiteralValue::Array(vec![
                vec![LiteralValue::Number(1.0), LiteralValue::Boolean(true)],
                vec![LiteralValue::Text("x".into()), LiteralValue::Empty],
            ])),
            "1\tTRUE\nx\t"
        );
    }
}
