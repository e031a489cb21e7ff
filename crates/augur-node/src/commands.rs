//! Client-side helpers for producing node input.
//!
//! `keygen` prints a fresh secret and its validator id. `sign` reads one
//! request JSON per stdin line and prints the [`TxEnvelope`] line the node
//! accepts, signed with the secret in [`SECRET_ENV`].

use augur_codec::SigningKey;
use augur_types::request::Request;
use augur_types::Height;
use serde::{Serialize, Serializer};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use zeroize::Zeroizing;

use crate::node::TxEnvelope;

/// Environment variable holding the hex signing secret for `sign`.
pub const SECRET_ENV: &str = "AUGUR_SECRET";

/// A fresh key as printed by `keygen`. The secret is wiped on drop.
#[derive(Serialize)]
pub struct GeneratedKey {
    #[serde(serialize_with = "serialize_secret")]
    pub secret: Zeroizing<String>,
    pub validator: String,
}

fn serialize_secret<S: Serializer>(
    secret: &Zeroizing<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret)
}

/// Generate a new signing key.
pub fn keygen() -> GeneratedKey {
    let key = SigningKey::generate();
    GeneratedKey {
        secret: key.to_hex(),
        validator: key.validator_id().to_string(),
    }
}

/// Wrap `request` for inclusion at `height`.
pub fn sign_request(key: &SigningKey, height: Height, request: &Request) -> anyhow::Result<TxEnvelope> {
    Ok(TxEnvelope {
        height,
        tx: key.sign(request)?,
    })
}

/// Sign every request read from stdin at `height`.
pub async fn sign_stdin(height: Height) -> anyhow::Result<()> {
    let secret = Zeroizing::new(
        std::env::var(SECRET_ENV)
            .map_err(|_| anyhow::anyhow!("{SECRET_ENV} must hold a hex signing secret"))?,
    );
    let key = SigningKey::from_hex(&secret)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = serde_json::from_str(&line)?;
        let envelope = sign_request(&key, height, &request)?;
        let mut out = serde_json::to_string(&envelope)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
    }
    stdout.flush().await?;
    Ok(())
}
