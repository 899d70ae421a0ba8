use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use crate::core::errors::AppError;

/// Line-oriented dialogue with the end user.
#[async_trait]
pub trait Console: Send {
    /// Shows `prompt` and reads one line without its terminator.
    /// `None` means the input is exhausted.
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, AppError>;

    async fn say(&mut self, text: &str) -> Result<(), AppError>;
}

/// `Ja`/`Nein` prompts compare case-insensitively.
pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("ja")
}

pub fn is_no(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("nein")
}

pub struct StdConsole {
    input: Lines<BufReader<Stdin>>,
    output: Stdout,
}

impl StdConsole {
    pub fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
            output: tokio::io::stdout(),
        }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Console for StdConsole {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>, AppError> {
        if !prompt.is_empty() {
            self.output.write_all(prompt.as_bytes()).await?;
            self.output.write_all(b" ").await?;
            self.output.flush().await?;
        }
        let line = self.input.next_line().await?;
        Ok(line.map(|line| line.trim_end_matches('\r').to_string()))
    }

    async fn say(&mut self, text: &str) -> Result<(), AppError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }
}
