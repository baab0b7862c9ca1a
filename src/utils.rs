use crate::chain::{validate_address, PrivateKey};
use anyhow::{anyhow, Context, Result};
use ethers::types::{Address, U256};
use std::path::Path;

pub fn format_ether(wei: U256) -> String {
    ethers::utils::format_units(wei, "ether").unwrap_or_else(|_| "0.0".to_string())
}

/// Parse a string representing ETH to Wei
///
/// Handles decimal strings directly, so no float precision is lost.
///
/// # Errors
/// Returns an error if the string is not a valid decimal number or conversion fails
pub fn parse_eth_str_to_wei(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ETH amount cannot be empty"));
    }
    if trimmed.starts_with('-') {
        return Err(anyhow!("ETH amount cannot be negative: {}", trimmed));
    }

    ethers::utils::parse_ether(trimmed)
        .map_err(|e| anyhow!("Invalid ETH amount '{}': {}", trimmed, e))
}

fn parse_address(raw: &str, line_num: usize) -> Result<Address> {
    let trimmed = raw.trim().trim_matches('"').trim();
    if !validate_address(trimmed) {
        return Err(anyhow!("Line {}: Invalid address: {}", line_num, trimmed));
    }
    trimmed
        .parse()
        .map_err(|_| anyhow!("Line {}: Invalid address: {}", line_num, trimmed))
}

/// Parse one address per line. Blank lines are skipped; order and duplicates
/// are kept as given.
pub fn parse_recipients(input: &str) -> Result<Vec<Address>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_address(line, idx + 1))
        .collect()
}

/// Read recipients from the first column of a CSV file. A header row is
/// skipped when its first cell is not hex-shaped.
pub fn load_recipients_csv(path: &Path) -> Result<Vec<Address>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut recipients = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Line {}: malformed CSV", idx + 1))?;
        let first = record.get(0).unwrap_or("").trim_matches('"').trim();
        if first.is_empty() {
            continue;
        }
        if idx == 0 && !is_address_like(first) {
            continue;
        }
        recipients.push(parse_address(first, idx + 1)?);
    }
    Ok(recipients)
}

// Anything hex-shaped is an address attempt, not a header
fn is_address_like(cell: &str) -> bool {
    cell.starts_with("0x") || cell.chars().all(|c| c.is_ascii_hexdigit())
}

/// Load recipients from a `.csv` file or a plain one-per-line text file.
pub fn load_recipients(path: &Path) -> Result<Vec<Address>> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        load_recipients_csv(path)
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_recipients(&content)
    }
}

/// Split keys on newlines or commas, dropping blanks.
pub fn parse_private_keys(input: &str) -> Vec<PrivateKey> {
    input
        .split(|c: char| c == '\n' || c == ',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(PrivateKey::new)
        .collect()
}
