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
    // Only the variables listed here are printed. Secrets stay out of the terminal.
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "BZR_HOST",
        "BZR_PORT",
        "BZR_DATABASE_URL",
        "BZR_USE_X_FORWARDED_FOR",
        "BZR_USE_FORWARDED",
        "BZR_CATALOG_URL",
        "BZR_NOTIFICATION_URL",
        "BZR_CALLBACK_URL",
        "BZR_REDIRECT_URL",
        "BZR_CURRENCY",
        "BZR_DELIVERY_FEE",
        "BZR_REGISTRATION_FEE",
        "BZR_REFERENCE_PREFIX",
        "BZR_GATEWAY_BASE_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
