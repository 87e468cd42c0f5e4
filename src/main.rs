/*!
 * cowpipe - Main Entry Point
 *
 * Sends text through an external command (cowsay by default) over a pair of
 * pipes and prints whatever the command wrote back.
 *
 * Usage: cowpipe [TEXT...]
 */

use std::error::Error;
use std::io::Write;
use tracing::{info, warn};

use cowpipe::core::limits::DEFAULT_INPUT;
use cowpipe::{init_tracing, Harness, HarnessConfig};

/// Print a JSON report instead of the raw output when set to `1` or `true`
const ENV_REPORT_JSON: &str = "COWPIPE_REPORT_JSON";

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = HarnessConfig::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let input = if args.is_empty() {
        DEFAULT_INPUT.to_string()
    } else {
        args.join(" ")
    };

    info!(command = %config.command, mode = ?config.mode, bytes = input.len(), "cowpipe starting");

    let harness = Harness::fork(config);
    let (output, report) = harness.run_with_report(input.as_bytes())?;

    if !report.launched {
        warn!("Command was not launched, output is empty");
    }

    let report_json = std::env::var(ENV_REPORT_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if report_json {
        let document = serde_json::json!({
            "report": report,
            "output": String::from_utf8_lossy(&output),
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&output)?;
        stdout.flush()?;
    }

    Ok(())
}
