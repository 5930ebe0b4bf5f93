use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_PREFIX: &str = "sha1=";

/// `sha1=<hex>` signature of `body`, as GitHub sends in `X-Hub-Signature`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a GitHub webhook signature using constant-time comparison.
///
/// The whole `sha1=<hex>` string is compared, so a missing prefix, a length
/// mismatch or uppercase hex all fail.
pub fn verify(secret: &[u8], body: &[u8], supplied: &str) -> bool {
    let expected = sign(secret, body);
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
