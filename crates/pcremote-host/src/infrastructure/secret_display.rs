//! Shows the shared secret to the user.
//!
//! The client learns the secret by scanning a QR code of its hex encoding.
//! The code is drawn in the terminal with Unicode half blocks, two module
//! rows per text line.  The hex string is printed underneath for manual
//! entry.

use pcremote_core::SharedSecret;
use qrcode::{types::QrError, Color, QrCode};
use tracing::warn;

use crate::application::ports::SecretDisplay;

/// Quiet zone around the code, in modules.
const QUIET_ZONE: usize = 2;

/// Prints the secret to stdout, optionally as a QR code.
#[derive(Debug, Clone)]
pub struct TerminalQrDisplay {
    show_qr: bool,
}

impl TerminalQrDisplay {
    pub fn new(show_qr: bool) -> Self {
        Self { show_qr }
    }
}

impl SecretDisplay for TerminalQrDisplay {
    fn display(&self, secret: &SharedSecret) {
        let hex = secret.to_hex();

        if self.show_qr {
            match render_terminal_qr(hex.as_bytes()) {
                Ok(qr) => println!("{qr}"),
                Err(error) => warn!(%error, "failed to render QR code"),
            }
        }
        println!("Pairing secret: {}", hex.as_str());
    }
}

/// Renders `data` as a terminal QR code, light modules on a dark
/// background.
pub fn render_terminal_qr(data: &[u8]) -> Result<String, QrError> {
    let code = QrCode::new(data)?;
    let width = code.width();
    let modules = code.to_colors();
    // Outside the symbol counts as light (the quiet zone).
    let is_dark = |row: isize, col: isize| -> bool {
        if row < 0 || col < 0 || row as usize >= width || col as usize >= width {
            return false;
        }
        modules[row as usize * width + col as usize] == Color::Dark
    };

    let zone = QUIET_ZONE as isize;
    let span = width as isize + zone;
    let mut output = String::new();
    let mut row = -zone;
    while row < span {
        for col in -zone..span {
            // Printed blocks are the light modules.
            let ch = match (!is_dark(row, col), !is_dark(row + 1, col)) {
                (true, true) => '\u{2588}',
                (true, false) => '\u{2580}',
                (false, true) => '\u{2584}',
                (false, false) => ' ',
            };
            output.push(ch);
        }
        output.push('\n');
        row += 2;
    }
    Ok(output)
}
