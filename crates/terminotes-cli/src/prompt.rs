//! Terminal rendering of the sync resolution prompt

use std::io::{self, BufRead, BufReader, Write};

use terminotes_core::sync::SyncError;
use terminotes_core::{Divergence, Resolution, ResolutionPrompt};

/// Invalid answers tolerated before giving up
const MAX_ATTEMPTS: usize = 3;

/// Asks on stderr and reads the answer from stdin
pub struct TerminalPrompt {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl TerminalPrompt {
    /// Prompt over the process's stdin and stderr
    ///
    /// Stdin is locked per read only, so other readers keep working.
    pub fn stdio() -> Self {
        Self::new(Box::new(BufReader::new(io::stdin())), Box::new(io::stderr()))
    }

    pub fn new(input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Self { input, output }
    }

    fn render(&mut self, divergence: &Divergence) -> io::Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "The notes repository is {}.", divergence)?;
        match divergence {
            Divergence::RemoteAhead { .. } => writeln!(
                self.output,
                "Adopting the remote discards nothing local; keeping local overwrites the remote commits."
            )?,
            _ => writeln!(
                self.output,
                "Both sides changed. Whichever side wins replaces the other's database file."
            )?,
        }
        writeln!(self.output)?;
        writeln!(self.output, "  [l] local-wins   force-push the local database")?;
        writeln!(self.output, "  [r] remote-wins  reset to the remote database")?;
        writeln!(self.output, "  [a] abort        change nothing")?;
        Ok(())
    }
}

impl ResolutionPrompt for TerminalPrompt {
    fn ask_resolution(&mut self, divergence: &Divergence) -> Result<Resolution, SyncError> {
        self.render(divergence)?;

        for _ in 0..MAX_ATTEMPTS {
            write!(self.output, "Choice [l/r/a]: ")?;
            self.output.flush()?;

            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                // stdin closed while waiting
                return Err(SyncError::NonInteractiveAbort);
            }
            match answer.parse() {
                Ok(resolution) => return Ok(resolution),
                Err(e) => writeln!(self.output, "{}", e)?,
            }
        }

        Err(SyncError::InvalidResolution(format!(
            "no valid answer after {} attempts",
            MAX_ATTEMPTS
        )))
    }
}
