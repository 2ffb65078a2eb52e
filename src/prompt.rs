use std::io::{self, BufRead, Write};

pub(crate) trait Confirm {
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Asks on `output`, reads one line of `input`. Only `y`/`yes` confirm.
#[derive(Debug)]
pub(crate) struct Terminal<R, W> {
    input: R,
    output: W,
}

impl<R, W> Terminal<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for Terminal<R, W> {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        write!(self.output, "{question} [y/N]: ")?;
        self.output.flush()?;
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        let answer = answer.trim();
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}
