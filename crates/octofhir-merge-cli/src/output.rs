use colored::Colorize;
use serde_json::Value;

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => println!("{pretty}"),
        Err(_) => println!("{value}"),
    }
}

/// Prints a response body, pretty-printed when it is JSON.
pub fn print_body(body: &[u8]) {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => print_json(&value),
        Err(_) => println!("{}", String::from_utf8_lossy(body)),
    }
}

pub fn print_heading(msg: &str) {
    println!("{}", format!("# {msg}").cyan().bold());
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_failure(msg: &str) {
    println!("{} {}", "✗".red(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
