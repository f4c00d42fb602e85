use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use vigil_core::GuardPolicy;

/// Returns `text`, or all of stdin when it is absent or `-`.
pub fn read_text(text: Option<&str>) -> Result<String> {
    match text {
        Some(t) if t != "-" => Ok(t.to_string()),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// Loads a policy file; without one the built-in defaults apply. The default
/// CWE map is filled in when the file does not set one.
pub fn load_policy(path: Option<&Path>) -> Result<GuardPolicy> {
    let policy = match path {
        Some(p) => GuardPolicy::from_file(p)?,
        None => GuardPolicy::new(),
    };
    Ok(if policy.cwe_map.is_none() {
        policy.with_default_cwe_map()
    } else {
        policy
    })
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
