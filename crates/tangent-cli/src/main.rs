//! Tangent CLI - differentiate spreadsheet formulas from the command line

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use tangent_core::{CellAddress, CellValue, Workbook};
use tangent_formula::deriv::TRACE_TARGET;
use tangent_formula::{
    builtin_registry, cell_derivative, cell_derivative_value, EvalPos, EvaluationContext,
};

#[derive(Parser)]
#[command(name = "tangent")]
#[command(
    author,
    version,
    about = "Symbolic partial derivatives of spreadsheet formulas"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the derivative of one cell with respect to another
    #[command(alias = "d")]
    Deriv {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Cell holding the variable, e.g. A1 or Data!A1
        #[arg(long)]
        wrt: String,

        /// Formula cell to differentiate
        #[arg(long)]
        of: String,

        /// Also print the derivative's value at the current cell values
        #[arg(long)]
        value: bool,

        /// Log each derivative computed along the way
        #[arg(long)]
        trace: bool,
    },

    /// Print the computed value of a cell
    Eval {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Cell to evaluate
        cell: String,
    },
}

#[derive(Args)]
struct SheetArgs {
    /// Cell contents as ADDRESS=CONTENT; CONTENT starting with '=' is a formula
    #[arg(short, long = "cell", value_name = "ADDRESS=CONTENT", value_parser = parse_assignment)]
    cells: Vec<Assignment>,
}

/// One `--cell` argument
#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    sheet: Option<String>,
    address: CellAddress,
    content: String,
}

fn parse_assignment(arg: &str) -> std::result::Result<Assignment, String> {
    let (target, content) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=CONTENT, got '{}'", arg))?;
    let (sheet, address) = split_sheet(target);
    let address = CellAddress::parse(address).map_err(|e| e.to_string())?;
    Ok(Assignment {
        sheet: sheet.map(str::to_string),
        address,
        content: content.to_string(),
    })
}

/// Split `Sheet!A1` into its sheet name and address
fn split_sheet(target: &str) -> (Option<&str>, &str) {
    match target.rsplit_once('!') {
        Some((sheet, address)) => {
            let sheet = sheet
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .unwrap_or(sheet);
            (Some(sheet), address)
        }
        None => (None, target),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let trace = matches!(cli.command, Commands::Deriv { trace: true, .. });
    init_logging(trace);

    match cli.command {
        Commands::Deriv {
            sheet,
            wrt,
            of,
            value,
            ..
        } => derivative(&sheet, &wrt, &of, value),
        Commands::Eval { sheet, cell } => eval(&sheet, &cell),
    }
}

fn init_logging(trace: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if trace {
        builder.filter_module(TRACE_TARGET, LevelFilter::Debug);
    }
    builder.init();
}

fn derivative(args: &SheetArgs, wrt: &str, of: &str, value: bool) -> Result<()> {
    let workbook = build_workbook(&args.cells)?;
    let x = position(&workbook, wrt).with_context(|| format!("Invalid --wrt cell '{}'", wrt))?;
    let y = position(&workbook, of).with_context(|| format!("Invalid --of cell '{}'", of))?;

    let registry = builtin_registry();
    let deriv = cell_derivative(&workbook, registry, &y, &x)
        .with_context(|| format!("Failed to differentiate '{}'", of))?;
    match deriv {
        Some(deriv) => println!("{}", deriv.to_formula_string(&y)),
        None => bail!("'{}' has no derivative with respect to '{}'", of, wrt),
    }

    if value {
        println!("{}", cell_derivative_value(&workbook, registry, &y, &x));
    }
    Ok(())
}

fn eval(args: &SheetArgs, cell: &str) -> Result<()> {
    let workbook = build_workbook(&args.cells)?;
    let pos = position(&workbook, cell).with_context(|| format!("Invalid cell '{}'", cell))?;

    let ctx = EvaluationContext::new(Some(&workbook), pos);
    let value = ctx
        .get_cell_value(None, pos.row, pos.col)
        .with_context(|| format!("Failed to evaluate '{}'", cell))?;
    println!("{}", value.as_string());
    Ok(())
}

/// Build a workbook from the `--cell` assignments, creating sheets as they are named
fn build_workbook(cells: &[Assignment]) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    for assignment in cells {
        let index = match &assignment.sheet {
            Some(name) => match workbook.sheet_index(name) {
                Some(index) => index,
                None => workbook
                    .add_worksheet_with_name(name)
                    .with_context(|| format!("Failed to add sheet '{}'", name))?,
            },
            None => 0,
        };
        let sheet = workbook
            .worksheet_mut(index)
            .ok_or_else(|| anyhow!("Sheet index {} not found", index))?;

        let (row, col) = (assignment.address.row, assignment.address.col);
        if assignment.content.starts_with('=') {
            sheet.set_cell_formula_at(row, col, &assignment.content)?;
        } else {
            sheet.set_cell_value_at(row, col, literal(&assignment.content))?;
        }
    }
    Ok(workbook)
}

/// Interpret literal cell content the way a spreadsheet would on entry
fn literal(content: &str) -> CellValue {
    if content.is_empty() {
        return CellValue::Empty;
    }
    if let Ok(n) = content.trim().parse::<f64>() {
        if n.is_finite() {
            return CellValue::Number(n);
        }
    }
    match content.to_ascii_uppercase().as_str() {
        "TRUE" => CellValue::Boolean(true),
        "FALSE" => CellValue::Boolean(false),
        _ => CellValue::from(content),
    }
}

/// Resolve `A1` or `Sheet!A1` against the workbook
fn position(workbook: &Workbook, target: &str) -> Result<EvalPos> {
    let (sheet, address) = split_sheet(target);
    let index = match sheet {
        Some(name) => workbook
            .sheet_index(name)
            .ok_or_else(|| anyhow!("Unknown sheet '{}'", name))?,
        None => 0,
    };
    let address = CellAddress::parse(address)?;
    Ok(EvalPos::from_address(index, address))
}
