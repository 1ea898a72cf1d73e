use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustrelmap::{AggregatePath, MappingContext, SqlGenerator};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "schema-tool")]
#[command(about = "Inspect how aggregates of a schema document map to tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every property path of an aggregate with its table naming
    Paths {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        root: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the statements issued for each table of an aggregate
    Sql {
        #[arg(long)]
        schema: PathBuf,
        #[arg(long)]
        root: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Paths { schema, root, out } => {
            let context = load_context(&schema)?;
            let report = render_paths(&context, &root)?;
            emit(&report, out.as_deref())
        }
        Command::Sql { schema, root, out } => {
            let context = load_context(&schema)?;
            let report = render_sql(&context, &root)?;
            emit(&report, out.as_deref())
        }
    }
}

fn load_context(path: &Path) -> Result<MappingContext> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema '{}'", path.display()))?;
    MappingContext::from_json_str(&raw)
        .with_context(|| format!("Invalid schema '{}'", path.display()))
}

fn emit(report: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directory '{}'", parent.display())
                })?;
            }
            fs::write(path, report)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            println!("Written {}", path.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}

fn describe(path: &AggregatePath) -> String {
    let info = path.table_info();
    let mut line = format!("table={}", info.qualified_table_name());
    if let Ok(reverse) = info.reverse_column_info() {
        let _ = write!(line, " reverse={}", reverse);
    }
    if let (Some(column), Some(sql_type)) = (info.qualifier_column_info(), info.qualifier_column_type()) {
        let _ = write!(line, " qualifier={} ({})", column, sql_type);
    }
    let ids: Vec<&str> = info.id_column_infos().iter().map(|c| c.name()).collect();
    if !ids.is_empty() {
        let _ = write!(line, " id={}", ids.join(","));
    }
    if let Ok(column) = path.column_info() {
        let _ = write!(line, " column={}", column);
    }
    line
}

fn render_paths(context: &MappingContext, root: &str) -> Result<String> {
    let root_path = context.root_path(root)?;
    let mut out = format!("{} {}\n", root_path, describe(&root_path));
    for path in context.paths(root)? {
        let _ = writeln!(out, "{} {}", path, describe(path));
    }
    Ok(out)
}

/// Back-reference column followed by the qualifier columns of every
/// collection between the id-defining parent and `path`, outermost first.
fn key_columns(path: &AggregatePath) -> Vec<String> {
    let Ok(id_parent) = path.id_defining_parent_path() else {
        return Vec::new();
    };
    let mut qualifiers = Vec::new();
    let mut current = Some(path);
    while let Some(step) = current {
        if step == id_parent {
            break;
        }
        if step.is_qualified()
            && let Some(column) = step.table_info().qualifier_column_info()
        {
            qualifiers.push(column.name().to_string());
        }
        current = step.parent_path();
    }
    qualifiers.reverse();

    let mut keys: Vec<String> = path
        .table_info()
        .reverse_column_info()
        .map(|c| vec![c.name().to_string()])
        .unwrap_or_default();
    keys.extend(qualifiers);
    keys
}

fn render_sql(context: &MappingContext, root: &str) -> Result<String> {
    let generator = SqlGenerator::new();
    let mut out = String::new();

    for path in context.table_paths(root)? {
        let info = path.table_info();
        let table = info.qualified_table_name();

        let keys = key_columns(&path);

        let mut columns: Vec<String> = keys.clone();
        columns.extend(
            context
                .scalar_columns(&path)
                .iter()
                .filter_map(|p| p.column_info().ok())
                .map(|c| c.name().to_string()),
        );

        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        let order_by = info.qualifier_column_info().map(|c| c.name());
        let (select, delete): (Vec<&str>, Vec<&str>) = if path.is_root() {
            let ids = info.id_column_infos().iter().map(|c| c.name()).collect::<Vec<_>>();
            (ids.clone(), ids)
        } else {
            let own = usize::from(path.is_qualified());
            (
                keys[..keys.len() - own].iter().map(String::as_str).collect(),
                keys.iter().take(1).map(String::as_str).collect(),
            )
        };

        let _ = writeln!(out, "-- {}", path);
        let _ = writeln!(out, "{};", generator.insert(table, &columns));
        let _ = writeln!(out, "{};", generator.select_where(table, &select, order_by));
        let _ = writeln!(out, "{};", generator.delete(table, &delete));
    }
    Ok(out)
}
