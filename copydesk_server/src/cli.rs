use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "CPD_HOST",
        "CPD_PORT",
        "CPD_DATABASE_URL",
        "CPD_USE_X_FORWARDED_FOR",
        "CPD_USE_FORWARDED",
        "CPD_PENDING_PAYMENT_TIMEOUT",
        "CPD_CHECKOUT_API_URL",
        "CPD_CHECKOUT_IP_WHITELIST",
        "CPD_CHECKOUT_HMAC_CHECKS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(v) => v,
            Err(VarError::NotPresent) => "(not set)".to_string(),
            Err(VarError::NotUnicode(_)) => "(not unicode)".to_string(),
        };
        println!("  {name} = {val}");
    });
}
