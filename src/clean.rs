//! Remove every indexed chunk from the store.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::config::Config;
use crate::pipeline;

pub async fn run_clean(config: &Config, yes: bool) -> Result<()> {
    let store = pipeline::open_store(config).await?;

    if !yes {
        let stdin = std::io::stdin();
        let confirmed = confirm(
            &mut stdin.lock(),
            &mut std::io::stdout(),
            &format!(
                "Delete all indexed chunks from {}?",
                config.store.path.display()
            ),
        )?;
        if !confirmed {
            println!("Aborted");
            store.close().await;
            return Ok(());
        }
    }

    let deleted = store.clear().await?;
    if deleted == 0 {
        println!("Database is already empty");
    } else {
        tracing::info!(deleted, "cleared store");
        println!("Deleted {} chunks from database", deleted);
    }

    store.close().await;
    Ok(())
}

/// Ask a yes/no question; anything but `y`/`yes` is a no.
fn confirm(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm() {
        let mut out = Vec::new();
        assert!(confirm(&mut "yes\n".as_bytes(), &mut out, "Go?").unwrap());
        assert!(confirm(&mut "Y\n".as_bytes(), &mut out, "Go?").unwrap());
        assert!(!confirm(&mut "\n".as_bytes(), &mut out, "Go?").unwrap());
        assert!(!confirm(&mut "".as_bytes(), &mut out, "Go?").unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("Go? [y/N] "));
    }
}
