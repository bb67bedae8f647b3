use std::path::PathBuf;

/// `clientDataJSON.type` for an authentication ceremony.
pub const ASSERTION_CEREMONY_TYPE: &str = "webauthn.get";
/// `PublicKeyCredential.type` accepted on the wire.
pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";
/// rpIdHash(32) + flags(1) + signCount(4).
pub const AUTH_DATA_HEADER_LEN: usize = 37;
pub const P256_COORDINATE_WIDTH: usize = 32;
pub const CHALLENGE_LEN: usize = 32;
pub const CHALLENGE_TIMEOUT_SECS: u64 = 300;

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "keyproof", about = "Verify a WebAuthn assertion")]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// JSON file holding the assertion response, challenge context and stored credential.
    #[arg(long)]
    pub request: PathBuf,
    /// Print the outcome as JSON instead of a one-line summary.
    #[arg(long)]
    pub json: bool,
}
