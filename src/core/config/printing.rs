use crate::core::config::data::Config;
use crate::core::constants::{DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, TITLE_MIN_CHARS};
use std::io::{self, Write};

impl Config {
    pub fn print_all(&self) {
        let _ = self.write_summary(&mut io::stdout().lock());
    }

    pub fn write_summary(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Current configuration:")?;
        match &self.base_url {
            Some(url) => writeln!(out, "  base-url: {url}")?,
            None => writeln!(out, "  base-url: (unset, default {DEFAULT_BASE_URL})")?,
        }
        match self.connect_timeout_secs {
            Some(secs) => writeln!(out, "  connect-timeout: {secs}s")?,
            None => writeln!(
                out,
                "  connect-timeout: (unset, default {DEFAULT_CONNECT_TIMEOUT_SECS}s)"
            )?,
        }
        match self.title_min_chars {
            Some(chars) => writeln!(out, "  title-min-chars: {chars}")?,
            None => writeln!(out, "  title-min-chars: (unset, default {TITLE_MIN_CHARS})")?,
        }
        match &self.log_file {
            Some(path) => writeln!(out, "  log-file: {path}")?,
            None => writeln!(out, "  log-file: (unset)")?,
        }
        Ok(())
    }
}
