pub mod challenge;
pub mod codec;
pub mod config;
pub mod error;
pub mod request;
pub mod service;
pub mod store;
pub mod webauthn;

pub use webauthn::{
    verify_assertion, AssertionResponse, ChallengeContext, CredentialLookup, RejectReason,
    StoredCredential, VerificationOutcome,
};

use anyhow::Context as _;

/// Verify the assertion described by `cfg.request` and print the outcome.
pub async fn run(cfg: config::Config) -> anyhow::Result<VerificationOutcome> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    let bytes = tokio::fs::read(&cfg.request)
        .await
        .with_context(|| format!("cannot read {}", cfg.request.display()))?;
    let (response, context, credential) = request::VerifyRequest::from_json(&bytes)?
        .into_parts()
        .with_context(|| format!("invalid request in {}", cfg.request.display()))?;
    tracing::info!(rp_id = %context.rp_id, "Verifying assertion");

    let outcome = tokio::task::spawn_blocking(move || {
        verify_assertion(&response, context, &credential)
    })
    .await??;

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        match &outcome {
            VerificationOutcome::Accepted { counter } => println!("accepted (counter {counter})"),
            VerificationOutcome::Rejected(reason) => println!("rejected: {reason}"),
        }
    }
    Ok(outcome)
}
