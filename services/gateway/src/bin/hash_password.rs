//! services/gateway/src/bin/hash_password.rs
//!
//! Prints an argon2 PHC hash for an entry of the credential file.
//!
//! Usage: `hash_password <password>`, or pipe the password on stdin.

use std::io::BufRead;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let password = match std::env::args().nth(1) {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    if password.is_empty() {
        return Err("password must not be empty".into());
    }

    println!("{}", file_search_core::access::hash_password(&password)?);
    Ok(())
}
