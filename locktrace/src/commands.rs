use clap::{arg, command};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("locktrace")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("locktrace")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("run")
                .about(
                    "Order the requests of a captured session and walk them through the \
                reasoning service toward an integration.",
                )
                .arg(
                    arg!(<TARGET>)
                        .required(true)
                        .help("What the captured session was trying to accomplish"),
                )
                .arg(
                    arg!(-t --"trace" <PATH>)
                        .required(false)
                        .help("HAR file captured from the session")
                        .default_value("./digital_vault.har"),
                )
                .arg(
                    arg!(-c --"credentials" <PATH>)
                        .required(false)
                        .help("Cookie store exported from the authenticated session")
                        .default_value("./master_keys.json"),
                )
                .arg(
                    arg!(-m --"max-steps" <STEPS>)
                        .required(false)
                        .help("Maximum number of frontier passes")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("20"),
                )
                .arg(
                    arg!(--"var" <KEY_VALUE>)
                        .required(false)
                        .help("Variable binding offered to the reasoning service, e.g. --var user=alice")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-s --"synthesize")
                        .required(false)
                        .help("Generate integration code once the frontier is exhausted")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"artifact" <PATH>)
                        .required(false)
                        .help("Where to write the generated integration code")
                        .default_value("./forged-integration.js"),
                )
                .arg(
                    arg!(-b --"batch-size" <SIZE>)
                        .required(false)
                        .help("Endpoints processed concurrently per pass (default: whole frontier, max 25)")
                        .value_parser(clap::value_parser!(usize))
                        .conflicts_with("single-step"),
                )
                .arg(
                    arg!(--"single-step")
                        .required(false)
                        .help("Process one endpoint per pass")
                        .action(clap::ArgAction::SetTrue)
                        .conflicts_with("batch-size"),
                )
                .arg(
                    arg!(--"model" <MODEL>)
                        .required(false)
                        .help("Primary model")
                        .default_value("gpt-4o"),
                )
                .arg(
                    arg!(--"fallback-model" <MODEL>)
                        .required(false)
                        .help("Model used after the second failed attempt")
                        .default_value("gpt-4o-mini"),
                )
                .arg(
                    arg!(--"max-retries" <ATTEMPTS>)
                        .required(false)
                        .help("Attempts per reasoning call")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Reasoning request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("120"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown", "md"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
