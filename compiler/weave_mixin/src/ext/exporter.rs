//! Debug export of transformed classes.

use std::fs;
use std::path::PathBuf;

use regex::{Regex, RegexBuilder};
use tracing::{info, warn};
use weave_ir::{dotted_name, ClassNode};

use super::Extension;
use crate::options::Options;

/// Writes transformed classes to `<export_dir>/class/<name>.class`.
///
/// Always active: a mixin can force the export of its targets even when
/// export is disabled. I/O failures are logged and never fail the target.
pub struct ClassExporter {
    dir: PathBuf,
    enabled: bool,
    filter: Option<Regex>,
}

impl ClassExporter {
    pub fn new(options: &Options) -> Self {
        let filter = options.debug_export_filter.as_deref().and_then(|glob| {
            match glob_regex(glob) {
                Ok(re) => Some(re),
                Err(err) => {
                    warn!(filter = glob, error = %err, "ignoring malformed export filter");
                    None
                }
            }
        });
        ClassExporter {
            dir: options.export_dir.clone(),
            enabled: options.debug_export,
            filter,
        }
    }

    /// Whether export is enabled for `name` by the options alone.
    pub fn matches(&self, name: &str) -> bool {
        self.enabled
            && self
                .filter
                .as_ref()
                .map_or(true, |re| re.is_match(&dotted_name(name)))
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join("class").join(format!("{name}.class"))
    }
}

impl Extension for ClassExporter {
    fn name(&self) -> &str {
        "export"
    }

    fn is_active(&self, _options: &Options) -> bool {
        true
    }

    fn export(&self, name: &str, force: bool, class: &ClassNode) {
        if !force && !self.matches(name) {
            return;
        }
        let path = self.path_for(name);
        let bytes = match class.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(class = name, error = %err, "could not encode class for export");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %err, "could not create export directory");
                return;
            }
        }
        match fs::write(&path, bytes) {
            Ok(()) => info!(class = name, path = %path.display(), "exported class"),
            Err(err) => warn!(path = %path.display(), error = %err, "could not export class"),
        }
    }
}

/// Compile an export filter. `**` matches anything, `*` anything within one
/// package segment and `?` one character. Matching ignores case.
fn glob_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                expr.push_str(".*");
            }
            '*' => expr.push_str("[^.]*"),
            '?' => expr.push('.'),
            _ => expr.push_str(&regex::escape(&ch.to_string())),
        }
    }
    expr.push('$');
    RegexBuilder::new(&expr).case_insensitive(true).build()
}
