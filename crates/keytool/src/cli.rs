use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "keytool",
    about = "Provision the field encryption key and encrypt legacy plaintext rows",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a new random encryption key
    GenerateKey,

    /// Back up the activities table, then encrypt every plaintext row in place
    ///
    /// Reads ENCRYPTION_KEY, DATABASE_PATH, BACKFILL_TABLE and LOG_LEVEL from
    /// the environment.
    EncryptData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["keytool", "generate-key"]).unwrap();
        assert!(matches!(cli.command, Command::GenerateKey));

        let cli = Cli::try_parse_from(["keytool", "encrypt-data"]).unwrap();
        assert!(matches!(cli.command, Command::EncryptData));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["keytool"]).is_err());
        assert!(Cli::try_parse_from(["keytool", "rotate"]).is_err());
    }
}
