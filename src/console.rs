//! Line-oriented operator prompts
//!
//! Yes/no confirmation and the numbered exclusion prompt used before each
//! package action. Input and output are generic so the prompts can be
//! driven from in-memory buffers in tests.

use std::io::{self, BufRead, Stdout, Write};

use tracing::debug;

use crate::error::{Result, SetupError};
use crate::selection::ExclusionSpec;
use crate::theme::{Palette, Tone};

const EXCLUSION_PROMPT: &str = "Enter the numbers of any packages to exclude \
    (comma-separated, ranges like 2..4 allowed), or press Enter to keep all: ";

/// Reads operator answers from `input`, writes prompts to `output`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    palette: Palette,
}

impl Prompter<io::StdinLock<'static>, Stdout> {
    /// Prompter bound to the process's stdin and stdout.
    pub fn stdio(palette: Palette) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), palette)
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W, palette: Palette) -> Self {
        Self {
            input,
            output,
            palette,
        }
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// The operator output stream, for collaborators that report progress.
    pub fn writer(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }

    /// Print a line, optionally colored.
    pub fn say(&mut self, message: &str, tone: Option<Tone>) -> Result<()> {
        let text = match tone {
            Some(tone) => self.palette.paint(message, tone),
            None => message.to_string(),
        };
        writeln!(self.output, "{}", text)?;
        Ok(())
    }

    /// Read one trimmed line. `None` at end of input.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            debug!("Operator input reached end of stream");
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask a yes/no question. Only `y` and `yes` (any case) count as yes.
    pub fn confirm(&mut self, prompt: &str) -> Result<bool> {
        write!(self.output, "{} [y/N]: ", prompt)?;
        let answer = self.read_line()?.unwrap_or_default().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    /// Show `items` numbered from 1, read an exclusion expression, and return
    /// the items that were not excluded.
    pub fn prompt_for_exclusions<S: AsRef<str>>(&mut self, items: &[S]) -> Result<Vec<String>> {
        for (i, item) in items.iter().enumerate() {
            writeln!(self.output, "{:>2}. {}", i + 1, item.as_ref())?;
        }
        write!(self.output, "{}", EXCLUSION_PROMPT)?;

        let answer = self.read_line()?.ok_or(SetupError::InputClosed)?;
        let spec = ExclusionSpec::parse(&answer)?;
        let kept = spec.apply(items);
        debug!(
            "Exclusion {:?} kept {} of {} item(s)",
            answer,
            kept.len(),
            items.len()
        );
        Ok(kept)
    }
}
