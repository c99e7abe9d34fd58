use async_trait::async_trait;
use configurator_core::qr::QrImage;
use configurator_core::traits::{DisplaySink, NetworkStatus};

/// Terminal stand-in for the desktop display surface: the log view, the
/// network list, the status labels and the QR panel all become stdout.
pub struct TerminalSink;

#[async_trait]
impl DisplaySink for TerminalSink {
    async fn append_log(&self, text: &str) {
        for line in text.lines() {
            println!("  | {}", line);
        }
    }

    async fn show_networks(&self, ssids: &[String]) {
        if ssids.is_empty() {
            println!("📡 No networks found.");
            return;
        }
        println!("📡 Available networks:");
        for ssid in ssids {
            println!("  - {}", ssid);
        }
    }

    async fn show_status(&self, status: &NetworkStatus) {
        println!("🌐 Connection: {}", status.connection);
        println!("🌐 IP address: {}", status.ip_address);
    }

    async fn show_qr(&self, image: Option<&QrImage>) {
        match image {
            Some(image) => {
                println!("Scan to open {}", image.payload());
                for line in image.to_half_block_lines() {
                    println!("{}", line);
                }
            }
            // Clear signal: nothing to scan until an address is known.
            None => println!("(no address resolved, QR code cleared)"),
        }
    }
}
