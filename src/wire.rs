//! SASL XOAUTH2 initial-response encoding.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};

const CTRL_A: char = '\u{1}';

/// Encodes the XOAUTH2 initial client response for `user` and `access_token`.
///
/// The blob is `base64("user=" user ^A "auth=Bearer " token ^A ^A)` using the standard
/// padded alphabet.
pub fn encode(user: &str, access_token: &str) -> String {
	let raw = format!("user={user}{CTRL_A}auth=Bearer {access_token}{CTRL_A}{CTRL_A}");

	STANDARD.encode(raw)
}
