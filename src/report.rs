use crate::chain::{CapturedChain, ChainEntry};
use anyhow::Result;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Render the chain as report lines. Pure and deterministic: the same chain
/// always explains to the same lines. No trust judgments are made here.
pub fn explain(chain: &CapturedChain, untrusted: bool) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push("--- Certificate Chain Received ---".to_string());
    if untrusted {
        lines.push("(captured without validation; the chain below is NOT trusted)".to_string());
    }
    lines.push(String::new());
    for (i, entry) in chain.entries().iter().enumerate() {
        lines.push(format!("Certificate {}:", i + 1));
        lines.push(format!("  Subject: {}", entry.subject));
        lines.push(format!("  Issuer: {}", entry.issuer));
        lines.push(format!("  Valid From: {}", entry.not_before));
        lines.push(format!("  Valid To: {}", entry.not_after));
        lines.push(format!("  Signature Algorithm: {}", entry.signature_algorithm));
        lines.push(format!("  This is the {}.", classify(i, entry)));
        lines.push(String::new());
    }
    lines.push("--- End of Certificate Chain ---".to_string());
    lines
}

fn classify(index: usize, entry: &ChainEntry) -> &'static str {
    if index == 0 {
        "endpoint certificate"
    } else if entry.is_self_signed() {
        "root certificate"
    } else {
        "intermediate certificate"
    }
}

pub fn print(chain: &CapturedChain, untrusted: bool) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    writeln!(&mut stdout)?;
    for line in explain(chain, untrusted) {
        writeln!(&mut stdout, "{line}")?;
    }
    Ok(())
}

pub fn print_trusted() -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(&mut stdout, "✅ the certificate chain is trusted")?;
    stdout.reset()?;
    writeln!(&mut stdout)?;
    Ok(())
}

pub fn print_untrusted(reason: &str) -> Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(&mut stdout, "❌ TLS handshake failed: {reason}")?;
    stdout.reset()?;
    writeln!(&mut stdout)?;
    Ok(())
}
