//! Portal QR code derived from the resolved IP address.
//!
//! Pure composition over the `qrcode` crate: the payload is always
//! `http://<address>`, encoded at the minimum version that fits, low error
//! correction, with a four-module quiet zone. An unknown address produces no
//! image, which the display sink treats as a clear signal.

use crate::traits::UNKNOWN;
use crate::Result;
use qrcode::{Color, EcLevel, QrCode};

/// Quiet-zone width in modules on every side of the symbol.
pub const QUIET_ZONE: usize = 4;

/// The page served by the board once it is on the network.
/// Returns `None` for an unresolved address.
pub fn portal_url(ip_address: &str) -> Option<String> {
    if ip_address == UNKNOWN {
        return None;
    }
    Some(format!("http://{ip_address}"))
}

/// Encode the portal URL for `ip_address`, or `Ok(None)` when the address is
/// unknown and any existing display should be cleared instead.
pub fn encode_portal(ip_address: &str) -> Result<Option<QrImage>> {
    let Some(url) = portal_url(ip_address) else {
        return Ok(None);
    };
    let code = QrCode::with_error_correction_level(&url, EcLevel::L)?;
    let size = code.width();
    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == Color::Dark)
        .collect();
    tracing::debug!("portal QR encoded for {} ({} modules per side)", url, size);
    Ok(Some(QrImage {
        payload: url,
        size,
        modules,
    }))
}

/// A rendered QR symbol: the module matrix plus the payload it encodes.
#[derive(Debug, Clone)]
pub struct QrImage {
    payload: String,
    size: usize,
    modules: Vec<bool>,
}

impl QrImage {
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Modules per side, excluding the quiet zone.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Side length including the quiet zone, i.e. the bitmap edge handed to
    /// the display sink.
    pub fn bitmap_size(&self) -> usize {
        self.size + QUIET_ZONE * 2
    }

    /// Whether the module at bitmap coordinates is dark. Quiet-zone
    /// coordinates are light.
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        if x < QUIET_ZONE || y < QUIET_ZONE {
            return false;
        }
        let (qx, qy) = (x - QUIET_ZONE, y - QUIET_ZONE);
        if qx >= self.size || qy >= self.size {
            return false;
        }
        self.modules[qy * self.size + qx]
    }

    /// Render for a terminal with Unicode half-blocks, two module rows per
    /// text line so the symbol stays roughly square in a ~2:1 cell font.
    pub fn to_half_block_lines(&self) -> Vec<String> {
        let edge = self.bitmap_size();
        let mut lines = Vec::with_capacity(edge.div_ceil(2));
        for row_pair in 0..edge.div_ceil(2) {
            let upper_y = row_pair * 2;
            let lower_y = upper_y + 1;
            let mut line = String::with_capacity(edge);
            for x in 0..edge {
                let upper = self.is_dark(x, upper_y);
                let lower = lower_y < edge && self.is_dark(x, lower_y);
                line.push(match (upper, lower) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                });
            }
            lines.push(line);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_address_produces_no_url() {
        assert_eq!(portal_url("unknown"), None);
    }

    #[test]
    fn unknown_address_clears_instead_of_encoding() {
        assert!(encode_portal("unknown").unwrap().is_none());
    }

    #[test]
    fn payload_is_exactly_the_portal_url() {
        let image = encode_portal("192.168.1.50").unwrap().unwrap();
        assert_eq!(image.payload(), "http://192.168.1.50");
    }

    #[test]
    fn bitmap_includes_the_quiet_zone() {
        let image = encode_portal("10.0.0.5").unwrap().unwrap();
        assert_eq!(image.bitmap_size(), image.size() + 2 * QUIET_ZONE);
        // the outer ring is all light
        assert!(!image.is_dark(0, 0));
        assert!(!image.is_dark(image.bitmap_size() - 1, 0));
        // a QR symbol always has a dark finder-pattern corner module
        assert!(image.is_dark(QUIET_ZONE, QUIET_ZONE));
    }

    #[test]
    fn half_block_rendering_covers_the_whole_symbol() {
        let image = encode_portal("10.0.0.5").unwrap().unwrap();
        let lines = image.to_half_block_lines();
        assert_eq!(lines.len(), image.bitmap_size().div_ceil(2));
        assert!(lines.iter().all(|l| l.chars().count() == image.bitmap_size()));
        // first two module rows are quiet zone
        assert!(lines[0].chars().all(|c| c == ' '));
        let body: String = lines.concat();
        assert!(body.contains('█') || body.contains('▀') || body.contains('▄'));
    }
}
