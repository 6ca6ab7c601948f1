//! Resolve command - run one navigation through the access gate

use crate::access::{self, UserAccessContext};
use crate::cli::args::{OutputFormat, ResolveArgs};
use crate::error::SwgateResult;
use console::style;

/// Execute the resolve command
pub async fn execute(args: ResolveArgs) -> SwgateResult<()> {
    let ctx = UserAccessContext::new(args.role, args.status);
    let decision = access::decide(&args.path, &ctx);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decision)?),
        OutputFormat::Table => {
            let status = args
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string());
            let outcome = if decision.was_denied {
                style("denied").red().to_string()
            } else {
                style("permitted").green().to_string()
            };

            println!("{:<10} {}", "PATH", decision.requested_path);
            println!("{:<10} {}", "ROLE", args.role);
            println!("{:<10} {}", "STATUS", status);
            println!("{:<10} {}", "VIEW", style(decision.resolved_view).bold());
            println!("{:<10} {}", "OUTCOME", outcome);
        }
    }

    Ok(())
}
