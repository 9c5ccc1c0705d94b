pub mod deprecate;
pub mod duplicates;
pub mod gather;
pub mod lookup;

use std::io::Write;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;

/// Print `value` as a single line of JSON on stdout.
pub(crate) fn print_json_line(value: &impl Serialize) -> Result<()> {
    let line = serde_json::to_string(value).or_raise(|| ErrorKind::Output)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").or_raise(|| ErrorKind::Output)
}
