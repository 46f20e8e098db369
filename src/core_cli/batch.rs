// Batch scripts: one subcommand per line, `#` starts a comment line.

use crate::core_cli::core_cli::Action;
use anyhow::{bail, Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct BatchLine {
    #[command(subcommand)]
    action: Action,
}

pub fn parse_batch(script: &str) -> Result<Vec<Action>> {
    let mut actions = Vec::new();
    for (idx, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = BatchLine::try_parse_from(line.split_whitespace())
            .with_context(|| format!("line {}: {}", idx + 1, line))?;
        if matches!(parsed.action, Action::Batch { .. }) {
            bail!("line {}: batch files cannot be nested", idx + 1);
        }
        actions.push(parsed.action);
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script = "\
# nightly upload
cd incoming

put report.csv
size report.csv
site chmod -R 755 .
";
        let actions = parse_batch(script).unwrap();
        assert_eq!(actions.len(), 4);
        assert_eq!(
            actions[0],
            Action::Cd {
                path: "incoming".to_string()
            }
        );
        assert_eq!(
            actions[3],
            Action::Site {
                command: vec!["chmod", "-R", "755", "."]
                    .into_iter()
                    .map(String::from)
                    .collect()
            }
        );
    }

    #[test]
    fn test_unknown_command_reports_line() {
        let err = parse_batch("pwd\nfrobnicate x\n").unwrap_err();
        assert!(err.to_string().starts_with("line 2"));
    }

    #[test]
    fn test_nested_batch_rejected() {
        assert!(parse_batch("batch other.txt").is_err());
    }
}
