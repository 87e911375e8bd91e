use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("missing required field") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Add your Spark credentials to the config file:");
        eprintln!("  {} healthflow config path", "$".dimmed());
        eprintln!("  or export SPARK_APP_ID, SPARK_API_KEY and SPARK_API_SECRET.");
    }

    if msg.contains("deadline") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  The service did not finish in time. Retry, or raise");
        eprintln!("  session.timeout_secs in the config file.");
    }

    if msg.contains("transport error") || msg.contains("connection refused") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and the configured host_url.");
    }

    std::process::exit(1);
}
