use crate::registers::abi_register;

// Helpers shared by the parser and the encoder.

/// Splits an operand list on commas and/or whitespace.
pub(crate) fn split_operands(rest: &str) -> Vec<String> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .map(|t| t.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `x0..x31` or an ABI name, case-insensitive.
pub(crate) fn parse_reg(s: &str) -> Option<u8> {
    let name = s.trim().to_lowercase();
    if let Some(n) = name.strip_prefix('x').and_then(|n| n.parse::<u8>().ok()) {
        return (n < 32).then_some(n);
    }
    abi_register(&name)
}

/// Decimal or `0x`-hex, either sign.
pub(crate) fn parse_imm64(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = s.strip_prefix("-0x") {
        return i64::from_str_radix(hex, 16).ok().map(|v| -v);
    }
    s.parse::<i64>().ok()
}

pub(crate) fn parse_imm(s: &str) -> Option<i32> {
    parse_imm64(s).and_then(|v| i32::try_from(v).ok())
}

/// Double-quoted string literal, no escape support.
pub(crate) fn parse_str_lit(s: &str) -> Option<String> {
    let body = s.trim().strip_prefix('"')?.strip_suffix('"')?;
    Some(body.to_string())
}

/// `imm(rs1)` memory operand; returns the offset normalized to decimal
/// and the base register text.
pub(crate) fn parse_memop(op: &str) -> Result<(String, String), String> {
    let (imm_s, rest) = op
        .split_once('(')
        .ok_or_else(|| format!("invalid memory operand: {op}"))?;
    let rs1_s = rest
        .strip_suffix(')')
        .ok_or_else(|| format!("missing ')': {op}"))?;
    let imm = parse_imm(imm_s.trim()).ok_or_else(|| format!("invalid offset: {imm_s}"))?;
    let rs1 = rs1_s.trim();
    if parse_reg(rs1).is_none() {
        return Err(format!("invalid base register: {rs1}"));
    }
    Ok((imm.to_string(), rs1.to_string()))
}
