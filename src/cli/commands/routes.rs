//! Routes command - print the route table in priority order

use crate::access::{Access, ROUTE_TABLE};
use crate::cli::args::{OutputFormat, RoutesArgs};
use crate::error::SwgateResult;
use console::style;

/// Execute the routes command
pub async fn execute(args: RoutesArgs) -> SwgateResult<()> {
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ROUTE_TABLE)?),
        OutputFormat::Table => print_table(),
    }
    Ok(())
}

fn print_table() {
    println!("{:<4} {:<18} {:<10} {:<14}", "#", "PATTERN", "ACCESS", "VIEW");
    println!("{}", "-".repeat(48));

    for (i, rule) in ROUTE_TABLE.iter().enumerate() {
        let access = match rule.access {
            Access::Always => style(format!("{:<10}", rule.access)).green(),
            Access::RequiresApproval => style(format!("{:<10}", rule.access)).yellow(),
        };
        println!(
            "{:<4} {:<18} {} {:<14}",
            i + 1,
            rule.pattern,
            access,
            rule.view.as_str()
        );
    }

    println!();
    println!(
        "Unmatched paths: {} when approved, otherwise {} (denied)",
        style("dashboard").bold(),
        style("profile").bold()
    );
}
