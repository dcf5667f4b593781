//! Output formatting for the CLI
//!
//! Everything here ends lines with `\r\n` so it renders the same whether or
//! not the terminal is in raw mode.

use tabled::{settings::Style, Table, Tabled};

use sr_relay::{NetworkView, PeerRow};

/// Format this node and its peers
///
/// The primary address is listed first. Peers without an address have no
/// connect target.
pub fn format_network(view: &NetworkView) -> String {
    let mut output = String::new();

    output.push_str(&format!("Name: {}\r\n", view.name));

    let addresses: Vec<String> = view.addresses.iter().map(|a| a.to_string()).collect();
    let addresses = if addresses.is_empty() {
        "-".to_string()
    } else {
        addresses.join(", ")
    };
    output.push_str(&format!("Addresses: {}\r\n", addresses));
    output.push_str(&format!(
        "Machine: {}, {}\r\n",
        view.machine_status,
        or_dash(&view.machine_key)
    ));
    output.push_str(&format!("Nodekey: {}\r\n", or_dash(&view.node_key)));
    output.push_str("\r\n");
    output.push_str(&format_peers(&view.peers));
    output.push_str("\r\n");

    output
}

/// Format the peer table
pub fn format_peers(peers: &[PeerRow]) -> String {
    if peers.is_empty() {
        return "No peers\r\n".to_string();
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "ADDRESS")]
        address: String,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "CONNECT")]
        target: String,
    }

    let rows: Vec<Row> = peers
        .iter()
        .map(|p| Row {
            address: p
                .address
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
            name: p.name.clone(),
            target: p.connect_target.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .to_string()
        .replace('\n', "\r\n")
}

/// Format an authentication link
pub fn format_login_prompt(url: &str, code: Option<&[u8]>) -> String {
    let mut output = format!("To log in, visit: {}\r\n", url);
    if let Some(code) = code {
        output.push_str(&format!("(scannable code available, {} bytes)\r\n", code.len()));
    }
    output
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\r\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\r\n")
    );
}

/// Print a warning message in yellow
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\r\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\r\n")
    );
}
