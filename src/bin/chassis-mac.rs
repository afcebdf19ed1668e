use std::process::ExitCode;

use bsn_switchover::ifaddrs::get_chassis_mac;

// Prints the MAC of the first non-loopback link, or all zeros if there is none.
fn main() -> ExitCode {
    match get_chassis_mac() {
        Ok(mac) => {
            println!("{}", mac);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("chassis-mac: {}", e);
            ExitCode::FAILURE
        }
    }
}
