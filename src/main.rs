use clap::Parser;
use ipa_resign::config::{DEFAULT_CODESIGN, DEFAULT_COMPRESSION_LEVEL, DEFAULT_XCRUN};
use ipa_resign::{Resigner, Toolchain};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ipa-resign")]
#[command(about = "Re-sign an .ipa with a new provisioning profile")]
#[command(
    after_help = "Arguments: <IPA> <PROVISIONING_PROFILE> [<BUNDLE_IDENTIFIER>]\n\
                  Older forms such as `<IPA> provisioning-profile <P> bundle-identifier <B>` are accepted.\n\
                  Options may appear before or after the arguments."
)]
#[command(version)]
struct Cli {
    /// Logging filter (overridden by IPA_RESIGN_LOG)
    #[arg(long = "log", default_value = "info")]
    verbosity: String,

    /// Path to xcrun, used to locate codesign_allocate
    #[arg(long, default_value = DEFAULT_XCRUN)]
    xcrun: PathBuf,

    /// Path to codesign
    #[arg(long, default_value = DEFAULT_CODESIGN)]
    codesign: PathBuf,

    /// The compression level of the ipa (0-9, defaults to 6)
    #[arg(short = 'c', long, default_value_t = DEFAULT_COMPRESSION_LEVEL, value_parser = clap::value_parser!(u32).range(0..=9))]
    compress: u32,

    /// The ipa, the new provisioning profile and an optional bundle identifier
    #[arg(value_name = "ARGS")]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let env_filter = std::env::var("IPA_RESIGN_LOG").unwrap_or_else(|_| cli.verbosity.clone());
    fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_writer(std::io::stderr)
        .init();

    let toolchain = Toolchain {
        xcrun: cli.xcrun,
        codesign: cli.codesign,
    };
    let resigner = Resigner::new(toolchain, cli.compress);

    match resigner.run(&cli.args) {
        Ok(resigned) => print!("{}", resigned),
        Err(e) => {
            eprintln!("[!] {}", e);
            std::process::exit(1);
        }
    }
}
