use clap::Parser;

/// Flat CLI: a target URL plus an optional verbosity marker.
#[derive(Parser, Debug)]
#[command(
    name = "trustcheck",
    version,
    about = "Check whether a TLS endpoint's certificate chain is trusted"
)]
pub struct Cli {
    /// Target URL to probe
    #[arg(default_value = "https://www.pengdows.com")]
    pub url: String,

    /// Pass any second argument to enable verbose handshake tracing
    #[arg(value_name = "VERBOSE")]
    pub verbose: Option<String>,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose.is_some()
    }
}
