use crate::chain::{display_name, CapturedChain};
use log::debug;
use openssl::error::ErrorStack;
use openssl::ssl::{SslConnectorBuilder, SslVerifyMode};
use openssl::x509::store::X509Store;
use openssl::x509::{X509StoreContextRef, X509};
use std::sync::{Arc, Mutex};

/// The two faces of peer verification. `Validating` delegates to OpenSSL
/// path validation against the supplied anchors; `Capturing` records
/// whatever the peer presents and accepts it unconditionally. The capturing
/// variant installs no trust anchors of its own and is only ever used for
/// the diagnostic re-attempt, never for the primary path.
pub enum Verifier {
    Validating { store: X509Store },
    Capturing { capture: ChainCapture },
}

impl Verifier {
    pub fn install(self, builder: &mut SslConnectorBuilder) -> Result<(), ErrorStack> {
        match self {
            Verifier::Validating { store } => {
                builder.set_verify_cert_store(store)?;
                builder.set_verify_callback(SslVerifyMode::PEER, |ok, ctx| {
                    trace_path_step(ok, ctx);
                    ok
                });
            }
            Verifier::Capturing { capture } => {
                builder.set_verify_callback(SslVerifyMode::PEER, move |ok, ctx| {
                    trace_path_step(ok, ctx);
                    capture.record(ctx);
                    true
                });
            }
        }
        Ok(())
    }
}

/// Holds the most recently captured chain. Constructed fresh per diagnostic
/// attempt; the mutex exists only to satisfy the callback bounds, nothing
/// runs concurrently.
#[derive(Clone, Default)]
pub struct ChainCapture {
    seen: Arc<Mutex<Option<Vec<X509>>>>,
}

impl ChainCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any prior capture; never raises.
    pub fn record(&self, ctx: &X509StoreContextRef) {
        if let Some(stack) = ctx.chain() {
            let certs: Vec<X509> = stack.iter().map(|c| c.to_owned()).collect();
            if !certs.is_empty() {
                *self.seen.lock().unwrap() = Some(certs);
            }
        }
    }

    /// The captured chain, if the verify callback ever fired.
    pub fn into_chain(self) -> Option<CapturedChain> {
        let certs = self.seen.lock().unwrap().take()?;
        CapturedChain::from_certs(&certs).ok()
    }
}

fn trace_path_step(preverify_ok: bool, ctx: &X509StoreContextRef) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let subject = ctx
        .current_cert()
        .map(|c| display_name(c.subject_name()))
        .unwrap_or_else(|| "<none>".to_string());
    if preverify_ok {
        debug!("certificate path depth {}: ok: {}", ctx.error_depth(), subject);
    } else {
        debug!(
            "certificate path depth {}: {}: {}",
            ctx.error_depth(),
            ctx.error().error_string(),
            subject
        );
    }
}
