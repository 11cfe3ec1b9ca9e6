use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Security utilities for validating inputs and preventing common vulnerabilities.

/// Rejects provider-file paths that attempt directory traversal, before any
/// read touches the filesystem. The raw path must not contain a `../`/`..\`
/// component, the resolved absolute path must not contain `..`, and the file
/// must exist.
pub fn validate_providers_path(path: &Path) -> Result<()> {
    let raw = path.to_string_lossy();
    if raw.contains("../") || raw.contains("..\\") {
        return Err(anyhow!("invalid_path: '{}' contains a traversal segment", raw));
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| anyhow!("invalid_path: cannot resolve current dir: {}", e))?
            .join(path)
    };

    if absolute
        .components()
        .any(|c| c == std::path::Component::ParentDir)
    {
        return Err(anyhow!(
            "invalid_path: resolved path '{}' contains '..'",
            absolute.display()
        ));
    }

    if !path.exists() {
        return Err(anyhow!("invalid_path: '{}' does not exist", raw));
    }

    Ok(())
}

/// Validates that a file path is safe and doesn't allow directory traversal.
/// 
/// # Arguments
/// * `path` - The path to validate
/// * `allowed_base` - Optional base directory that the path must be within
/// 
/// # Returns
/// Canonicalized path if valid, error otherwise
pub fn validate_file_path(path: &str, allowed_base: Option<&str>) -> Result<PathBuf> {
    let path_buf = PathBuf::from(path);
    
    // Prevent absolute paths from escaping the base
    if let Some(base) = allowed_base {
        let canon_path = std::fs::canonicalize(&path_buf)
            .map_err(|e| anyhow!("Failed to canonicalize path '{}': {}", path, e))?;
        
        let canon_base = std::fs::canonicalize(base)
            .map_err(|e| anyhow!("Failed to canonicalize base '{}': {}", base, e))?;
        
        if !canon_path.starts_with(canon_base) {
            return Err(anyhow!(
                "Path '{}' is outside allowed directory '{}'",
                path,
                base
            ));
        }
        
        Ok(canon_path)
    } else {
        // Just canonicalize without base restriction
        std::fs::canonicalize(&path_buf)
            .map_err(|e| anyhow!("Invalid path '{}': {}", path, e))
    }
}

/// Validates a command name against an allowlist.
/// This helps prevent command injection attacks.
/// 
/// # Arguments
/// * `command` - The command to validate
/// * `allowed_commands` - List of permitted command names or paths
/// 
/// # Returns
/// Ok if command is in allowlist, error otherwise
pub fn validate_command(command: &str, allowed_commands: &[&str]) -> Result<()> {
    // Check for shell metacharacters that could enable injection
    const DANGEROUS_CHARS: &[char] = &['|', '&', ';', '\n', '`', '$', '(', ')', '<', '>', '"', '\'', '\\'];
    
    if command.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(anyhow!(
            "Command contains dangerous characters: '{}'",
            command
        ));
    }
    
    // Extract just the command name (first component of path)
    let path_buf = PathBuf::from(command);
    let cmd_name = path_buf
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(command);
    
    // Check against allowlist
    if !allowed_commands.is_empty() && !allowed_commands.contains(&cmd_name) {
        return Err(anyhow!(
            "Command '{}' is not in the allowed list. Permitted commands: {:?}",
            cmd_name,
            allowed_commands
        ));
    }
    
    Ok(())
}

/// Validates command arguments for potentially dangerous content.
/// 
/// # Arguments
/// * `args` - The arguments to validate
/// 
/// # Returns
/// Ok if arguments appear safe, error otherwise
pub fn validate_command_args(args: &[String]) -> Result<()> {
    for arg in args {
        // Check for shell injection patterns
        if arg.contains("&&") || arg.contains("||") || arg.contains(";") || arg.contains("|") {
            return Err(anyhow!(
                "Argument contains dangerous shell operators: '{}'",
                arg
            ));
        }
        
        // Check for command substitution
        if arg.contains("$(") || arg.contains("`") {
            return Err(anyhow!(
                "Argument contains command substitution: '{}'",
                arg
            ));
        }
    }
    
    Ok(())
}

/// Validates that a URL uses a secure protocol (https://, wss://, etc.)
/// 
/// # Arguments
/// * `url` - The URL to validate
/// * `require_tls` - Whether to enforce TLS/SSL
/// 
/// # Returns
/// Ok if URL is valid and secure, error otherwise
pub fn validate_url_security(url: &str, require_tls: bool) -> Result<()> {
    let url_lower = url.to_lowercase();
    
    if require_tls {
        if !(url_lower.starts_with("https://")
            || url_lower.starts_with("wss://")
            || url_lower.starts_with("grpcs://"))
        {
            return Err(anyhow!(
                "URL must use TLS/SSL (https://, wss://, grpcs://): '{}'",
                url
            ));
        }
    }
    
    // Warn about localhost/127.0.0.1 in production (but allow it)
    if url_lower.contains("localhost") || url_lower.contains("127.0.0.1") {
        // This is just informational - don't fail
        tracing::warn!(url = %url, "URL uses localhost/127.0.0.1");
    }
    
    Ok(())
}

/// Validates the size of input data to prevent DoS attacks.
/// 
/// # Arguments
/// * `data` - The data to check
/// * `max_size` - Maximum allowed size in bytes
/// 
/// # Returns
/// Ok if data is within limits, error otherwise
pub fn validate_size_limit(data: &[u8], max_size: usize) -> Result<()> {
    if data.len() > max_size {
        return Err(anyhow!(
            "Data size {} bytes exceeds maximum allowed size {} bytes",
            data.len(),
            max_size
        ));
    }
    
    Ok(())
}

/// Validates a timeout value to ensure it's reasonable.
/// 
/// # Arguments
/// * `timeout_ms` - Timeout in milliseconds
/// * `max_timeout_ms` - Maximum allowed timeout
/// 
/// # Returns
/// Ok if timeout is within limits, error otherwise
pub fn validate_timeout(timeout_ms: u64, max_timeout_ms: u64) -> Result<()> {
    if timeout_ms == 0 {
        return Err(anyhow!("Timeout cannot be zero"));
    }
    
    if timeout_ms > max_timeout_ms {
        return Err(anyhow!(
            "Timeout {}ms exceeds maximum allowed {}ms",
            timeout_ms,
            max_timeout_ms
        ));
    }
    
    Ok(())
}

/// A single hit from [`scan_for_secrets`]: which pattern matched and where.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SensitiveDataFinding {
    pub field: String,
    pub kind: String,
    pub snippet: String,
}

/// Scans free text for patterns that look like leaked secrets, used by the
/// search engine's security-scan stage. Patterns are deliberately coarse
/// (keyword-adjacent `key: value` shapes) rather than exact validators.
pub fn scan_for_secrets(field: &str, text: &str) -> Vec<SensitiveDataFinding> {
    static PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
        vec![
            (
                "api_key",
                Regex::new(r#"(?i)api[_-]?key['"]?\s*[:=]\s*['"]?[A-Za-z0-9\-_]{8,}"#).unwrap(),
            ),
            (
                "password",
                Regex::new(r#"(?i)password['"]?\s*[:=]\s*['"]?\S{4,}"#).unwrap(),
            ),
            (
                "secret",
                Regex::new(r#"(?i)secret['"]?\s*[:=]\s*['"]?[A-Za-z0-9\-_]{6,}"#).unwrap(),
            ),
            (
                "token",
                Regex::new(r#"(?i)token['"]?\s*[:=]\s*['"]?[A-Za-z0-9\.\-_]{8,}"#).unwrap(),
            ),
            (
                "email",
                Regex::new(r"(?i)[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
            ),
        ]
    });

    let mut findings = Vec::new();
    for (kind, pattern) in PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            findings.push(SensitiveDataFinding {
                field: field.to_string(),
                kind: kind.to_string(),
                snippet: m.as_str().to_string(),
            });
        }
    }
    findings
}
