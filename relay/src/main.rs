use metrics_relay::core::RelayApp;

fn main() {
    if let Err(e) = RelayApp::run() {
        eprintln!("\nError: {}\n", e);
        std::process::exit(1);
    }
}
