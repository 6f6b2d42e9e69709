//! Interactive prompts using dialoguer

use std::path::Path;

use anyhow::Result;
use dialoguer::Confirm;

/// Ask before replacing an existing output file.
///
/// Returns `true` without prompting when the file does not exist yet or when
/// `no_confirm` is set. The prompt defaults to keeping the existing file.
pub fn confirm_overwrite(path: &Path, no_confirm: bool) -> Result<bool> {
    if no_confirm || !path.exists() {
        return Ok(true);
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("{} already exists. Overwrite?", path.display()))
        .default(false)
        .interact()?;
    Ok(overwrite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_needs_no_prompt() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(confirm_overwrite(&dir.path().join("model.json"), false).unwrap());
    }

    #[test]
    fn test_no_confirm_skips_prompt_for_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(confirm_overwrite(&path, true).unwrap());
    }
}
